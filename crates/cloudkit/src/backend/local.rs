//! File-backed cloud emulator.
//!
//! Keeps every resource in a JSON state file and enforces the provider's
//! rules: required attributes, catalog values, parent existence, immutable
//! attributes, cascade deletes. Useful for trying manifests without an
//! account, and as a realistic client in tests.

use crate::catalog::{self, Stack};
use crate::error::{Error, Result};
use crate::types::{CloudState, StoredResource};
use chrono::Utc;
use declarative::{
    CancellationToken, Change, CloudClient, Configuration, Mutability, Page, RUNTIME_OFF,
    RemoteError, ResourceConfig, ResourceIdentity, ResourceKind, ServicePlanConfig, WebAppConfig,
};
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Resource groups per listing page unless configured otherwise
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Cloud emulator implementing [`CloudClient`]
pub struct LocalCloud {
    /// `None` keeps the state in memory only
    path: Option<PathBuf>,
    state: Mutex<CloudState>,
    page_size: usize,
}

impl LocalCloud {
    /// An emulator that never touches the filesystem
    pub fn in_memory() -> Self {
        Self {
            path: None,
            state: Mutex::new(CloudState::default()),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Open (or start) the emulator state at `path`
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let state = if path.exists() {
            let content = fs::read_to_string(&path)?;
            let state: CloudState =
                serde_json::from_str(&content).map_err(|e| Error::CorruptState {
                    path: path.clone(),
                    message: e.to_string(),
                })?;
            debug!(
                "Loaded {} resource(s) from {}",
                state.resources.len(),
                path.display()
            );
            state
        } else {
            debug!("State file {} does not exist, starting empty", path.display());
            CloudState::default()
        };

        Ok(Self {
            path: Some(path),
            state: Mutex::new(state),
            page_size: DEFAULT_PAGE_SIZE,
        })
    }

    /// Set how many resource groups one listing page holds
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Every stored resource, loaded at once
    pub fn all_resources(&self) -> Vec<Configuration> {
        self.lock()
            .resources
            .values()
            .map(|stored| stored.resource.clone())
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, CloudState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Persist `next` and make it the current state
    ///
    /// The in-memory state only changes once the file is written.
    fn commit(
        &self,
        current: &mut CloudState,
        mut next: CloudState,
    ) -> std::result::Result<(), RemoteError> {
        next.last_updated = Utc::now();
        if let Some(path) = &self.path {
            write_state(path, &next).map_err(|e| {
                RemoteError::transient(format!("failed to save {}: {e}", path.display()))
            })?;
        }
        *current = next;
        Ok(())
    }
}

fn write_state(path: &Path, state: &CloudState) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, serde_json::to_string_pretty(state)?)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

// ============================================================================
// Provider rules
// ============================================================================

fn group_not_found(group: &str) -> RemoteError {
    RemoteError::not_found(
        "ResourceGroupNotFound",
        format!("Resource group '{group}' could not be found."),
    )
}

fn resource_not_found(identity: &ResourceIdentity) -> RemoteError {
    RemoteError::not_found(
        "ResourceNotFound",
        format!("The {} '{}' was not found.", identity.kind().label(), identity.name()),
    )
}

fn invalid(message: impl Into<String>) -> RemoteError {
    RemoteError::rejected("InvalidParameter", message)
}

fn conflict(message: impl Into<String>) -> RemoteError {
    RemoteError::rejected("Conflict", message)
}

fn check_cancelled(cancel: &CancellationToken) -> std::result::Result<(), RemoteError> {
    if cancel.is_cancelled() {
        return Err(RemoteError::Cancelled);
    }
    Ok(())
}

fn find<'s>(state: &'s CloudState, identity: &ResourceIdentity) -> Option<&'s StoredResource> {
    state.resources.get(&identity.key())
}

/// Children can only be addressed inside an existing group
fn require_group(
    state: &CloudState,
    identity: &ResourceIdentity,
) -> std::result::Result<(), RemoteError> {
    if identity.kind() != ResourceKind::ResourceGroup
        && find(state, &identity.group_identity()).is_none()
    {
        return Err(group_not_found(identity.group()));
    }
    Ok(())
}

fn required<'v>(value: Option<&'v str>, attribute: &str) -> std::result::Result<&'v str, RemoteError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| invalid(format!("{attribute} is required")))
}

fn check_region(region: Option<&str>) -> std::result::Result<(), RemoteError> {
    let region = required(region, "Region")?;
    if catalog::region(region).is_none() {
        return Err(invalid(format!("'{region}' is not a known region")));
    }
    Ok(())
}

fn check_runtime(stack: Stack, version: Option<&str>) -> std::result::Result<(), RemoteError> {
    match version {
        Some(v) if !catalog::is_runtime_version(stack, v) => Err(invalid(format!(
            "'{v}' is not a supported {stack} version"
        ))),
        _ => Ok(()),
    }
}

fn check_plan(plan: &ServicePlanConfig) -> std::result::Result<(), RemoteError> {
    check_region(plan.region.as_deref())?;
    let tier = required(plan.pricing_tier.as_deref(), "PricingTier")?;
    if catalog::pricing_tier(tier).is_none() {
        return Err(invalid(format!("'{tier}' is not a known pricing tier")));
    }
    if plan.capacity == Some(0) {
        return Err(invalid("Capacity must be at least 1"));
    }
    Ok(())
}

fn check_app(app: &WebAppConfig, state: &CloudState) -> std::result::Result<(), RemoteError> {
    let plan_name = required(app.plan_name.as_deref(), "PlanName")?;
    let plan = ResourceIdentity::service_plan(app.resource_group(), plan_name);
    if find(state, &plan).is_none() {
        return Err(invalid(format!(
            "App Service plan '{plan_name}' does not exist in resource group '{}'",
            app.resource_group()
        )));
    }

    check_runtime(Stack::NetFramework, app.net_framework_version.as_deref())?;
    check_runtime(Stack::Php, app.php_version.as_deref())?;
    check_runtime(Stack::Python, app.python_version.as_deref())?;
    check_runtime(Stack::Java, app.java_version.as_deref())?;

    if app.java_enabled() {
        match app.web_container.as_deref() {
            None => return Err(invalid("A web container is required when Java is enabled")),
            Some(container) if !catalog::is_web_container(container) => {
                return Err(invalid(format!("'{container}' is not a known web container")));
            }
            Some(_) => {}
        }
    }
    Ok(())
}

fn check(config: &Configuration, state: &CloudState) -> std::result::Result<(), RemoteError> {
    match config {
        Configuration::ResourceGroup(group) => check_region(group.region.as_deref()),
        Configuration::ServicePlan(plan) => check_plan(plan),
        Configuration::WebApp(app) => check_app(app, state),
    }
}

/// Fill in what the provider defaults when a create leaves it unset
fn with_defaults(desired: &Configuration) -> Configuration {
    match desired {
        Configuration::ResourceGroup(_) => desired.clone(),
        Configuration::ServicePlan(plan) => {
            let mut plan = plan.clone();
            plan.capacity.get_or_insert(1);
            plan.per_site_scaling.get_or_insert(false);
            plan.into()
        }
        Configuration::WebApp(app) => {
            let mut app = app.clone();
            app.always_on.get_or_insert(false);
            app.web_sockets.get_or_insert(false);
            app.net_framework_version
                .get_or_insert_with(|| catalog::DEFAULT_NET_FRAMEWORK.to_string());
            app.php_version
                .get_or_insert_with(|| catalog::DEFAULT_PHP.to_string());
            app.python_version
                .get_or_insert_with(|| RUNTIME_OFF.to_string());
            app.java_version
                .get_or_insert_with(|| RUNTIME_OFF.to_string());
            app.into()
        }
    }
}

// ============================================================================
// CloudClient
// ============================================================================

impl CloudClient for LocalCloud {
    fn get(
        &self,
        identity: &ResourceIdentity,
        cancel: &CancellationToken,
    ) -> std::result::Result<Option<Configuration>, RemoteError> {
        check_cancelled(cancel)?;
        let state = self.lock();
        require_group(&state, identity)?;
        find(&state, identity)
            .map(|stored| Some(catalog::normalize(&stored.resource)))
            .ok_or_else(|| resource_not_found(identity))
    }

    fn create(
        &self,
        desired: &Configuration,
        cancel: &CancellationToken,
    ) -> std::result::Result<Configuration, RemoteError> {
        check_cancelled(cancel)?;
        let identity = desired.identity();
        if !desired.exists() {
            return Err(invalid(format!("cannot create {identity} as absent")));
        }

        let mut state = self.lock();
        require_group(&state, &identity)?;
        if find(&state, &identity).is_some() {
            return Err(conflict(format!("{identity} already exists")));
        }

        let created = with_defaults(&catalog::normalize(desired));
        check(&created, &state)?;

        let mut next = state.clone();
        next.resources
            .insert(identity.key(), StoredResource::new(created.clone()));
        self.commit(&mut state, next)?;
        debug!("Created {identity}");
        Ok(created)
    }

    fn update(
        &self,
        identity: &ResourceIdentity,
        changes: &[Change],
        cancel: &CancellationToken,
    ) -> std::result::Result<Configuration, RemoteError> {
        check_cancelled(cancel)?;
        let mut state = self.lock();
        require_group(&state, identity)?;
        let stored = find(&state, identity).ok_or_else(|| resource_not_found(identity))?;

        let attributes = stored.resource.attributes();
        for change in changes {
            match attributes.iter().find(|a| a.name == change.attribute) {
                None => {
                    return Err(invalid(format!(
                        "{} has no attribute {}",
                        identity.kind().label(),
                        change.attribute
                    )));
                }
                Some(a) if a.mutability == Mutability::Immutable => {
                    return Err(invalid(format!(
                        "{} of {identity} cannot be changed",
                        change.attribute
                    )));
                }
                Some(_) => {}
            }
        }

        let updated = stored
            .resource
            .with_changes(changes)
            .map(|c| catalog::normalize(&c))
            .map_err(|e| invalid(e.to_string()))?;
        check(&updated, &state)?;

        let mut next = state.clone();
        if let Some(entry) = next.resources.get_mut(&identity.key()) {
            entry.touch(updated.clone());
        }
        self.commit(&mut state, next)?;
        debug!("Updated {identity}");
        Ok(updated)
    }

    fn delete(
        &self,
        identity: &ResourceIdentity,
        cancel: &CancellationToken,
    ) -> std::result::Result<(), RemoteError> {
        check_cancelled(cancel)?;
        let mut state = self.lock();
        require_group(&state, identity)?;
        if find(&state, identity).is_none() {
            return Err(resource_not_found(identity));
        }

        let mut next = state.clone();
        match identity.kind() {
            ResourceKind::ResourceGroup => {
                next.resources.retain(|_, stored| {
                    !stored
                        .resource
                        .identity()
                        .group()
                        .eq_ignore_ascii_case(identity.group())
                });
            }
            ResourceKind::ServicePlan => {
                let hosted = state.resources.values().any(|stored| match &stored.resource {
                    Configuration::WebApp(app) => {
                        app.resource_group().eq_ignore_ascii_case(identity.group())
                            && app
                                .plan_name
                                .as_deref()
                                .is_some_and(|p| p.eq_ignore_ascii_case(identity.name()))
                    }
                    _ => false,
                });
                if hosted {
                    return Err(conflict(format!("{identity} still hosts web apps")));
                }
                next.resources.remove(&identity.key());
            }
            ResourceKind::WebApp => {
                next.resources.remove(&identity.key());
            }
        }

        self.commit(&mut state, next)?;
        debug!("Deleted {identity}");
        Ok(())
    }

    fn canonicalize(&self, desired: &Configuration) -> Configuration {
        catalog::normalize(desired)
    }

    fn list_resource_groups(
        &self,
        token: Option<&str>,
        cancel: &CancellationToken,
    ) -> std::result::Result<Page<String>, RemoteError> {
        check_cancelled(cancel)?;
        let start = match token {
            None => 0,
            Some(t) => t
                .parse::<usize>()
                .map_err(|_| invalid(format!("'{t}' is not a valid continuation token")))?,
        };

        let state = self.lock();
        let names: Vec<String> = state
            .resources
            .values()
            .filter(|stored| stored.resource.kind() == ResourceKind::ResourceGroup)
            .map(|stored| stored.resource.identity().name().to_string())
            .collect();

        let start = start.min(names.len());
        let end = (start + self.page_size).min(names.len());
        let next = (end < names.len()).then(|| end.to_string());
        Ok(Page::new(names[start..end].to_vec(), next))
    }
}
