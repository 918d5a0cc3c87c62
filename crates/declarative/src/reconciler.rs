//! Reconciliation pass for a single resource
//!
//! A pass resolves the resource's parents, observes the remote state,
//! compares it with the desired configuration and then creates, updates,
//! deletes or leaves the resource alone. Simulation runs exactly the same
//! decision logic with every write suppressed.

use crate::client::CloudClient;
use crate::compare::{ComparisonResult, compare};
use crate::context::{CancellationToken, PassContext};
use crate::error::{ReconcileError, RemoteError, Step};
use crate::identity::ResourceIdentity;
use crate::model::{Configuration, ParentPolicy, ResourceConfig};
use crate::types::{Action, Change};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

/// What a recreate does after deleting the old resource
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecreatePolicy {
    /// Create the replacement in the same pass
    #[default]
    SamePass,
    /// Stop after the delete; the next pass creates the replacement
    NextPass,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ReconcileOptions {
    pub recreate: RecreatePolicy,
}

/// Result of reconciling one resource
#[derive(Debug, Clone)]
pub struct Outcome {
    pub identity: ResourceIdentity,
    pub action: Action,
    /// Desired against observed, as seen before acting
    pub comparison: ComparisonResult,
    pub simulated: bool,
    /// A recreate stopped after its delete
    pub deferred: bool,
    /// State after the pass; projected when simulated
    pub state: Configuration,
    /// Parents created on the way, in creation order
    pub prerequisites: Vec<Outcome>,
}

impl Outcome {
    /// One-line summary, identical for simulated and real passes
    pub fn summary(&self) -> String {
        let mut line = self.action.describe(&self.identity);
        if self.deferred {
            line.push_str(", create deferred to the next pass");
        }
        line
    }

    /// Summaries of the created parents followed by this resource's
    pub fn lines(&self) -> Vec<String> {
        let mut lines: Vec<String> = self.prerequisites.iter().flat_map(Self::lines).collect();
        lines.push(self.summary());
        lines
    }

    /// Whether this pass changed (or would change) anything
    pub fn changed(&self) -> bool {
        self.action.is_change() || self.prerequisites.iter().any(Self::changed)
    }
}

/// Decide what to do from a comparison
///
/// Only differences are acted on: an identical comparison is always a no-op,
/// and an update carries nothing but the changed settable attributes.
pub fn decide(
    desired: &Configuration,
    observed: &Configuration,
    comparison: &ComparisonResult,
) -> Action {
    if comparison.is_identical() {
        return Action::NoOp;
    }
    if !desired.exists() {
        return Action::Delete;
    }
    if !observed.exists() {
        return Action::Create;
    }
    if let Some(diff) = comparison.immutable_difference() {
        return Action::Recreate {
            attribute: diff.attribute.clone(),
        };
    }

    let changes = comparison
        .differences()
        .iter()
        .filter_map(|d| {
            d.desired
                .clone()
                .map(|value| Change::new(d.attribute.clone(), value))
        })
        .collect();
    Action::Update { changes }
}

/// One lock per parent identity, so concurrent passes that both find a
/// parent missing create it once
#[derive(Default)]
struct SingleFlight {
    slots: Mutex<HashMap<ResourceIdentity, Arc<Mutex<()>>>>,
}

impl SingleFlight {
    /// Run `f` while holding the lock for `identity`
    ///
    /// The last caller out removes the slot, so the map only holds parents
    /// that are being created right now.
    fn run<T>(&self, identity: &ResourceIdentity, f: impl FnOnce() -> T) -> T {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(slots.entry(identity.clone()).or_default())
        };

        let result = {
            let _held = slot.lock().unwrap_or_else(PoisonError::into_inner);
            f()
        };

        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        // One reference in the map, one here: nobody else is waiting
        if Arc::strong_count(&slot) == 2 {
            slots.remove(identity);
        }
        result
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Converges resources through a [`CloudClient`]
///
/// Shareable across threads; independent resources may be reconciled
/// concurrently through the same reconciler.
pub struct Reconciler<'a> {
    client: &'a dyn CloudClient,
    options: ReconcileOptions,
    parents: SingleFlight,
}

impl<'a> Reconciler<'a> {
    pub fn new(client: &'a dyn CloudClient) -> Self {
        Self::with_options(client, ReconcileOptions::default())
    }

    pub fn with_options(client: &'a dyn CloudClient, options: ReconcileOptions) -> Self {
        Self {
            client,
            options,
            parents: SingleFlight::default(),
        }
    }

    pub fn options(&self) -> ReconcileOptions {
        self.options
    }

    /// Reconcile one desired configuration in a pass of its own
    pub fn reconcile(
        &self,
        desired: &Configuration,
        simulation: bool,
        cancel: &CancellationToken,
    ) -> Result<Outcome, ReconcileError> {
        let mut pass = PassContext::new(simulation, cancel);
        self.reconcile_in(desired, &mut pass)
    }

    /// Observe the current remote state of the resource `desired` names
    ///
    /// Missing resources come back as the "does not exist" configuration.
    pub fn collect(
        &self,
        desired: &Configuration,
        cancel: &CancellationToken,
    ) -> Result<Configuration, ReconcileError> {
        let identity = desired.identity();
        self.fetch(&identity, cancel)
            .map_err(|e| failure(&identity, Step::Observe, e, &[]))
    }

    /// Reconcile within an existing pass
    ///
    /// Resources reconciled through the same context share the simulation
    /// projection and the journal of issued writes.
    pub fn reconcile_in(
        &self,
        desired: &Configuration,
        pass: &mut PassContext<'_>,
    ) -> Result<Outcome, ReconcileError> {
        let desired = &self.client.canonicalize(desired);
        let identity = desired.identity();
        debug!("Reconciling {identity}");

        let prerequisites = if desired.exists() {
            self.resolve_parents(desired, &identity, pass)?
        } else {
            Vec::new()
        };

        let observed = self.observe(&identity, pass)?;
        let comparison = compare(desired, &observed);
        let action = decide(desired, &observed, &comparison);
        debug!("{}", action.describe(&identity));

        let mut deferred = false;
        let state = match &action {
            Action::NoOp => observed,
            Action::Create => self.create(desired, pass)?,
            Action::Update { changes } => self.update(&observed, changes, pass)?,
            Action::Delete => self.delete(&identity, pass)?,
            Action::Recreate { attribute } => {
                info!("{attribute} of {identity} differs and cannot change in place");
                let gone = self.delete(&identity, pass)?;
                match self.options.recreate {
                    RecreatePolicy::SamePass => self.create(desired, pass)?,
                    RecreatePolicy::NextPass => {
                        deferred = true;
                        gone
                    }
                }
            }
        };

        Ok(Outcome {
            identity,
            action,
            comparison,
            simulated: pass.simulation,
            deferred,
            state,
            prerequisites,
        })
    }

    fn resolve_parents(
        &self,
        desired: &Configuration,
        identity: &ResourceIdentity,
        pass: &mut PassContext<'_>,
    ) -> Result<Vec<Outcome>, ReconcileError> {
        let dependencies = desired
            .dependencies()
            .map_err(|attribute| ReconcileError::Invalid {
                resource: identity.clone(),
                reason: format!("{attribute} must be set"),
            })?;

        let mut created = Vec::new();
        for dependency in dependencies {
            match dependency.policy {
                ParentPolicy::Require => {
                    if !self.observe(&dependency.identity, pass)?.exists() {
                        return Err(ReconcileError::MissingDependency {
                            resource: identity.clone(),
                            dependency: dependency.identity,
                        });
                    }
                }
                ParentPolicy::Ensure(parent) => {
                    if let Some(outcome) = self.ensure_parent(&parent, pass)? {
                        created.push(outcome);
                    }
                }
            }
        }
        Ok(created)
    }

    fn ensure_parent(
        &self,
        parent: &Configuration,
        pass: &mut PassContext<'_>,
    ) -> Result<Option<Outcome>, ReconcileError> {
        let identity = parent.identity();
        if self.observe(&identity, pass)?.exists() {
            return Ok(None);
        }

        self.parents.run(&identity, || -> Result<Option<Outcome>, ReconcileError> {
            // Another pass may have created it while we waited
            if !pass.simulation && self.observe(&identity, pass)?.exists() {
                return Ok(None);
            }

            info!("{identity} does not exist, creating it first");
            let prerequisites = self.resolve_parents(parent, &identity, pass)?;
            let comparison = compare(parent, &Configuration::absent(&identity));
            let state = self.create(parent, pass)?;
            Ok(Some(Outcome {
                identity: identity.clone(),
                action: Action::Create,
                comparison,
                simulated: pass.simulation,
                deferred: false,
                state,
                prerequisites,
            }))
        })
    }

    /// Observed state as this pass sees it
    fn observe(
        &self,
        identity: &ResourceIdentity,
        pass: &PassContext<'_>,
    ) -> Result<Configuration, ReconcileError> {
        if let Some(projected) = pass.projected(identity) {
            return Ok(projected.clone());
        }
        if pass.shadowed(identity) {
            debug!("{identity} belongs to a group that only changes in this simulation");
            return Ok(Configuration::absent(identity));
        }
        self.fetch(identity, pass.cancel)
            .map_err(|e| failure(identity, Step::Observe, e, pass.issued()))
    }

    fn fetch(
        &self,
        identity: &ResourceIdentity,
        cancel: &CancellationToken,
    ) -> Result<Configuration, RemoteError> {
        match self.client.get(identity, cancel) {
            Ok(Some(observed)) => Ok(observed),
            Ok(None) => Ok(Configuration::absent(identity)),
            Err(e) if e.is_not_found() => {
                debug!("{identity} not found ({e})");
                Ok(Configuration::absent(identity))
            }
            Err(e) => Err(e),
        }
    }

    fn check_cancelled(
        identity: &ResourceIdentity,
        step: Step,
        pass: &PassContext<'_>,
    ) -> Result<(), ReconcileError> {
        if pass.cancel.is_cancelled() {
            warn!("Cancellation requested, not going to {step} {identity}");
            return Err(ReconcileError::Cancelled {
                resource: identity.clone(),
                step,
                issued: pass.issued().to_vec(),
            });
        }
        Ok(())
    }

    fn create(
        &self,
        desired: &Configuration,
        pass: &mut PassContext<'_>,
    ) -> Result<Configuration, ReconcileError> {
        let identity = desired.identity();
        Self::check_cancelled(&identity, Step::Create, pass)?;

        if pass.simulation {
            info!("Would create {identity}");
            pass.project(desired.clone());
            return Ok(desired.clone());
        }

        info!("Creating {identity}");
        let created = self
            .client
            .create(desired, pass.cancel)
            .map_err(|e| failure(&identity, Step::Create, e, pass.issued()))?;
        pass.record_write(Action::Create.describe(&identity));
        Ok(created)
    }

    fn update(
        &self,
        observed: &Configuration,
        changes: &[Change],
        pass: &mut PassContext<'_>,
    ) -> Result<Configuration, ReconcileError> {
        let identity = observed.identity();
        Self::check_cancelled(&identity, Step::Update, pass)?;
        let action = Action::Update {
            changes: changes.to_vec(),
        };

        if pass.simulation {
            info!("Would update {identity}");
            let projected =
                observed
                    .with_changes(changes)
                    .map_err(|e| ReconcileError::Invalid {
                        resource: identity.clone(),
                        reason: e.to_string(),
                    })?;
            pass.project(projected.clone());
            return Ok(projected);
        }

        info!("{}", action.describe(&identity));
        let updated = self
            .client
            .update(&identity, changes, pass.cancel)
            .map_err(|e| failure(&identity, Step::Update, e, pass.issued()))?;
        pass.record_write(action.describe(&identity));
        Ok(updated)
    }

    fn delete(
        &self,
        identity: &ResourceIdentity,
        pass: &mut PassContext<'_>,
    ) -> Result<Configuration, ReconcileError> {
        Self::check_cancelled(identity, Step::Delete, pass)?;
        let gone = Configuration::absent(identity);

        if pass.simulation {
            info!("Would delete {identity}");
            pass.project(gone.clone());
            return Ok(gone);
        }

        info!("Deleting {identity}");
        match self.client.delete(identity, pass.cancel) {
            Ok(()) => pass.record_write(Action::Delete.describe(identity)),
            Err(e) if e.is_not_found() => debug!("{identity} was already gone"),
            Err(e) => return Err(failure(identity, Step::Delete, e, pass.issued())),
        }
        Ok(gone)
    }
}

fn failure(
    resource: &ResourceIdentity,
    step: Step,
    source: RemoteError,
    issued: &[String],
) -> ReconcileError {
    match source {
        RemoteError::Cancelled => ReconcileError::Cancelled {
            resource: resource.clone(),
            step,
            issued: issued.to_vec(),
        },
        source => ReconcileError::Remote {
            resource: resource.clone(),
            step,
            source,
        },
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::ErrorCategory;
    use crate::model::{ResourceGroupConfig, ServicePlanConfig, WebAppConfig};
    use crate::paging::Page;
    use crate::types::AttributeValue;

    /// In-memory client that records every call
    #[derive(Default)]
    pub(crate) struct FakeCloud {
        resources: Mutex<HashMap<ResourceIdentity, Configuration>>,
        calls: Mutex<Vec<String>>,
        /// Report missing resources as errors instead of `Ok(None)`
        not_found_errors: bool,
        /// Fail every read with this error
        read_failure: Option<RemoteError>,
        /// Cancelled after the first successful create
        cancel_after_create: Option<CancellationToken>,
    }

    impl FakeCloud {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn with(resources: Vec<Configuration>) -> Self {
            let cloud = Self::new();
            for resource in resources {
                cloud.put(resource);
            }
            cloud
        }

        pub(crate) fn put(&self, resource: Configuration) {
            self.resources
                .lock()
                .unwrap()
                .insert(resource.identity(), resource);
        }

        pub(crate) fn stored(&self, identity: &ResourceIdentity) -> Option<Configuration> {
            self.resources.lock().unwrap().get(identity).cloned()
        }

        pub(crate) fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        pub(crate) fn writes(&self) -> Vec<String> {
            self.calls()
                .into_iter()
                .filter(|c| !c.starts_with("get") && !c.starts_with("list"))
                .collect()
        }

        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }
    }

    impl CloudClient for FakeCloud {
        fn get(
            &self,
            identity: &ResourceIdentity,
            _cancel: &CancellationToken,
        ) -> Result<Option<Configuration>, RemoteError> {
            self.record(format!("get {}", identity.key()));
            if let Some(error) = &self.read_failure {
                return Err(error.clone());
            }
            match self.stored(identity) {
                Some(found) => Ok(Some(found)),
                None if self.not_found_errors => {
                    Err(RemoteError::not_found("ResourceNotFound", "no such resource"))
                }
                None => Ok(None),
            }
        }

        fn create(
            &self,
            desired: &Configuration,
            _cancel: &CancellationToken,
        ) -> Result<Configuration, RemoteError> {
            let identity = desired.identity();
            self.record(format!("create {}", identity.key()));
            if self.stored(&identity).is_some() {
                return Err(RemoteError::rejected("Conflict", "already exists"));
            }
            self.put(desired.clone());
            if let Some(token) = &self.cancel_after_create {
                token.cancel();
            }
            Ok(desired.clone())
        }

        fn update(
            &self,
            identity: &ResourceIdentity,
            changes: &[Change],
            _cancel: &CancellationToken,
        ) -> Result<Configuration, RemoteError> {
            self.record(format!("update {}", identity.key()));
            let current = self
                .stored(identity)
                .ok_or_else(|| RemoteError::not_found("ResourceNotFound", "gone"))?;
            let next = current
                .with_changes(changes)
                .map_err(|e| RemoteError::rejected("BadRequest", e.to_string()))?;
            self.put(next.clone());
            Ok(next)
        }

        fn delete(
            &self,
            identity: &ResourceIdentity,
            _cancel: &CancellationToken,
        ) -> Result<(), RemoteError> {
            self.record(format!("delete {}", identity.key()));
            let mut resources = self.resources.lock().unwrap();
            if resources.remove(identity).is_none() {
                return Err(RemoteError::not_found("ResourceNotFound", "gone"));
            }
            if identity.kind() == crate::identity::ResourceKind::ResourceGroup {
                resources.retain(|id, _| id.group() != identity.group());
            }
            Ok(())
        }

        fn list_resource_groups(
            &self,
            token: Option<&str>,
            _cancel: &CancellationToken,
        ) -> Result<Page<String>, RemoteError> {
            self.record("list resource groups".to_string());
            let mut names: Vec<String> = self
                .resources
                .lock()
                .unwrap()
                .keys()
                .filter(|id| id.kind() == crate::identity::ResourceKind::ResourceGroup)
                .map(|id| id.name().to_string())
                .collect();
            names.sort();
            let start: usize = token.map_or(0, |t| t.parse().unwrap());
            let next = (start + 1 < names.len()).then(|| (start + 1).to_string());
            Ok(Page::new(names.into_iter().skip(start).take(1).collect(), next))
        }
    }

    fn group(name: &str, region: &str) -> Configuration {
        ResourceGroupConfig::new(name).with_region(region).into()
    }

    fn plan() -> ServicePlanConfig {
        ServicePlanConfig::new("rg", "web")
            .with_region("East US")
            .with_pricing_tier("S1")
    }

    fn app() -> WebAppConfig {
        WebAppConfig::new("rg", "shop").on_plan("web")
    }

    #[test]
    fn test_create_plan_creates_missing_group() {
        let cloud = FakeCloud::new();
        let reconciler = Reconciler::new(&cloud);
        let token = CancellationToken::new();

        let outcome = reconciler
            .reconcile(&plan().into(), false, &token)
            .unwrap();

        assert_eq!(outcome.action, Action::Create);
        assert_eq!(outcome.prerequisites.len(), 1);
        assert_eq!(outcome.prerequisites[0].action, Action::Create);
        assert_eq!(
            outcome.lines(),
            vec![
                "Create resource group rg".to_string(),
                "Create service plan rg :: web".to_string()
            ]
        );

        let created = cloud
            .stored(&ResourceIdentity::resource_group("rg"))
            .unwrap();
        assert_eq!(created, group("rg", "East US"));
        assert_eq!(
            cloud.writes(),
            vec!["create resource_group/rg", "create service_plan/rg/web"]
        );
    }

    #[test]
    fn test_second_pass_is_noop() {
        let cloud = FakeCloud::new();
        let reconciler = Reconciler::new(&cloud);
        let token = CancellationToken::new();
        let desired: Configuration = plan().with_capacity(2).into();

        reconciler.reconcile(&desired, false, &token).unwrap();
        let writes = cloud.writes().len();

        let again = reconciler.reconcile(&desired, false, &token).unwrap();
        assert_eq!(again.action, Action::NoOp);
        assert!(!again.changed());
        assert!(again.comparison.is_identical());
        assert_eq!(cloud.writes().len(), writes);
    }

    #[test]
    fn test_update_sends_only_changed_attributes() {
        let existing = plan().with_capacity(1).with_per_site_scaling(false);
        let cloud = FakeCloud::with(vec![group("rg", "East US"), existing.into()]);
        let reconciler = Reconciler::new(&cloud);

        let desired = plan().with_capacity(3);
        let outcome = reconciler
            .reconcile(&desired.into(), false, &CancellationToken::new())
            .unwrap();

        assert_eq!(
            outcome.action,
            Action::Update {
                changes: vec![Change::new("Capacity", 3u32)]
            }
        );
        assert_eq!(
            outcome.summary(),
            "Update service plan rg :: web (Capacity = 3)"
        );
        assert_eq!(cloud.writes(), vec!["update service_plan/rg/web"]);
        let stored = cloud
            .stored(&ResourceIdentity::service_plan("rg", "web"))
            .unwrap();
        assert_eq!(
            crate::model::attribute_value(&stored, "PerSiteScaling"),
            Some(AttributeValue::Bool(false))
        );
    }

    #[test]
    fn test_region_change_recreates_same_pass() {
        let cloud = FakeCloud::with(vec![group("rg", "East US"), plan().into()]);
        let reconciler = Reconciler::new(&cloud);

        let desired = plan().with_region("West Europe");
        let outcome = reconciler
            .reconcile(&desired.into(), false, &CancellationToken::new())
            .unwrap();

        assert_eq!(
            outcome.action,
            Action::Recreate {
                attribute: "Region".into()
            }
        );
        assert!(!outcome.deferred);
        assert_eq!(
            cloud.writes(),
            vec!["delete service_plan/rg/web", "create service_plan/rg/web"]
        );
    }

    #[test]
    fn test_region_change_next_pass_policy() {
        let cloud = FakeCloud::with(vec![group("rg", "East US"), plan().into()]);
        let reconciler = Reconciler::with_options(
            &cloud,
            ReconcileOptions {
                recreate: RecreatePolicy::NextPass,
            },
        );
        let desired: Configuration = plan().with_region("West Europe").into();
        let token = CancellationToken::new();

        let first = reconciler.reconcile(&desired, false, &token).unwrap();
        assert!(first.deferred);
        assert!(!first.state.exists());
        assert!(first.summary().ends_with("deferred to the next pass"));
        assert_eq!(cloud.writes(), vec!["delete service_plan/rg/web"]);

        let second = reconciler.reconcile(&desired, false, &token).unwrap();
        assert_eq!(second.action, Action::Create);
    }

    #[test]
    fn test_delete_when_absent_only_reads() {
        let cloud = FakeCloud::new();
        let reconciler = Reconciler::new(&cloud);

        let desired: Configuration = WebAppConfig::absent("rg", "shop").into();
        let outcome = reconciler
            .reconcile(&desired, false, &CancellationToken::new())
            .unwrap();

        assert_eq!(outcome.action, Action::NoOp);
        assert_eq!(cloud.calls(), vec!["get web_app/rg/shop"]);
    }

    #[test]
    fn test_delete_existing() {
        let cloud = FakeCloud::with(vec![group("rg", "East US"), plan().into()]);
        let reconciler = Reconciler::new(&cloud);

        let outcome = reconciler
            .reconcile(
                &ServicePlanConfig::absent("rg", "web").into(),
                false,
                &CancellationToken::new(),
            )
            .unwrap();

        assert_eq!(outcome.action, Action::Delete);
        assert_eq!(outcome.summary(), "Delete service plan rg :: web");
        assert!(
            cloud
                .stored(&ResourceIdentity::service_plan("rg", "web"))
                .is_none()
        );
    }

    #[test]
    fn test_not_found_error_means_absent() {
        let cloud = FakeCloud {
            not_found_errors: true,
            ..FakeCloud::default()
        };
        let reconciler = Reconciler::new(&cloud);

        let observed = reconciler
            .collect(&app().into(), &CancellationToken::new())
            .unwrap();
        assert!(!observed.exists());
        assert_eq!(observed.identity(), ResourceIdentity::web_app("rg", "shop"));
    }

    #[test]
    fn test_app_requires_existing_plan() {
        let cloud = FakeCloud::with(vec![group("rg", "East US")]);
        let reconciler = Reconciler::new(&cloud);

        let err = reconciler
            .reconcile(&app().into(), false, &CancellationToken::new())
            .unwrap_err();

        assert_eq!(err.category(), ErrorCategory::MissingDependency);
        assert!(matches!(
            err,
            ReconcileError::MissingDependency { ref dependency, .. }
                if *dependency == ResourceIdentity::service_plan("rg", "web")
        ));
        assert!(cloud.writes().is_empty());
    }

    #[test]
    fn test_app_never_creates_its_group() {
        let cloud = FakeCloud::new();
        let reconciler = Reconciler::new(&cloud);

        let err = reconciler
            .reconcile(&app().into(), false, &CancellationToken::new())
            .unwrap_err();
        assert!(matches!(
            err,
            ReconcileError::MissingDependency { ref dependency, .. }
                if *dependency == ResourceIdentity::resource_group("rg")
        ));
        assert!(cloud.writes().is_empty());
    }

    #[test]
    fn test_app_without_plan_is_invalid() {
        let cloud = FakeCloud::new();
        let reconciler = Reconciler::new(&cloud);

        let err = reconciler
            .reconcile(
                &WebAppConfig::new("rg", "shop").into(),
                false,
                &CancellationToken::new(),
            )
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Invalid);
        assert!(err.to_string().contains("PlanName must be set"));
        assert!(cloud.calls().is_empty());
    }

    #[test]
    fn test_simulation_never_writes() {
        let cloud = FakeCloud::with(vec![group("rg", "East US"), plan().into()]);
        let reconciler = Reconciler::new(&cloud);
        let token = CancellationToken::new();

        for desired in [
            Configuration::from(plan().with_capacity(5)),
            plan().with_region("West US").into(),
            ServicePlanConfig::absent("rg", "web").into(),
            ServicePlanConfig::new("rg", "other").with_region("East US").into(),
        ] {
            let outcome = reconciler.reconcile(&desired, true, &token).unwrap();
            assert!(outcome.simulated);
            assert!(outcome.action.is_change());
        }
        assert!(cloud.writes().is_empty());
    }

    #[test]
    fn test_simulation_projects_within_pass() {
        let cloud = FakeCloud::new();
        let reconciler = Reconciler::new(&cloud);
        let token = CancellationToken::new();
        let mut pass = PassContext::new(true, &token);

        let plan_outcome = reconciler
            .reconcile_in(&plan().into(), &mut pass)
            .unwrap();
        let app_outcome = reconciler.reconcile_in(&app().into(), &mut pass).unwrap();

        assert_eq!(plan_outcome.action, Action::Create);
        assert_eq!(plan_outcome.prerequisites.len(), 1);
        assert_eq!(app_outcome.action, Action::Create);
        assert!(cloud.writes().is_empty());
        // The group only exists in the projection, so nothing below it is read
        assert_eq!(cloud.calls(), vec!["get resource_group/rg"]);
    }

    #[test]
    fn test_simulation_matches_real_descriptions() {
        let seed = || FakeCloud::with(vec![group("rg", "East US"), plan().into()]);
        let desired: Configuration = plan().with_capacity(4).with_pricing_tier("P1v2").into();
        let token = CancellationToken::new();

        let simulated_cloud = seed();
        let simulated = Reconciler::new(&simulated_cloud)
            .reconcile(&desired, true, &token)
            .unwrap();
        let real_cloud = seed();
        let real = Reconciler::new(&real_cloud)
            .reconcile(&desired, false, &token)
            .unwrap();

        assert_eq!(simulated.lines(), real.lines());
        assert_eq!(simulated.state, real.state);
    }

    #[test]
    fn test_cancelled_before_first_write() {
        let cloud = FakeCloud::new();
        let reconciler = Reconciler::new(&cloud);
        let token = CancellationToken::new();
        token.cancel();

        let err = reconciler
            .reconcile(&plan().into(), false, &token)
            .unwrap_err();
        assert!(err.is_cancelled());
        assert!(cloud.writes().is_empty());
    }

    #[test]
    fn test_cancelled_mid_pass_reports_issued_writes() {
        let token = CancellationToken::new();
        let cloud = FakeCloud {
            cancel_after_create: Some(token.clone()),
            ..FakeCloud::default()
        };
        let reconciler = Reconciler::new(&cloud);

        let err = reconciler
            .reconcile(&plan().into(), false, &token)
            .unwrap_err();

        match err {
            ReconcileError::Cancelled { step, issued, .. } => {
                assert_eq!(step, Step::Create);
                assert_eq!(issued, vec!["Create resource group rg".to_string()]);
            }
            other => panic!("expected cancellation, got {other}"),
        }
        assert_eq!(cloud.writes(), vec!["create resource_group/rg"]);
    }

    #[test]
    fn test_transient_read_is_retryable() {
        let cloud = FakeCloud {
            read_failure: Some(RemoteError::transient("connection reset")),
            ..FakeCloud::default()
        };
        let reconciler = Reconciler::new(&cloud);

        let err = reconciler
            .reconcile(&group("rg", "East US"), false, &CancellationToken::new())
            .unwrap_err();
        assert!(err.is_retryable());
        assert!(matches!(err, ReconcileError::Remote { step: Step::Observe, .. }));
    }

    #[test]
    fn test_concurrent_passes_create_parent_once() {
        let cloud = FakeCloud::new();
        let reconciler = Reconciler::new(&cloud);
        let token = CancellationToken::new();

        std::thread::scope(|scope| {
            for name in ["a", "b", "c", "d"] {
                let reconciler = &reconciler;
                let token = &token;
                scope.spawn(move || {
                    let desired = ServicePlanConfig::new("rg", name).with_region("East US");
                    reconciler
                        .reconcile(&desired.into(), false, token)
                        .unwrap();
                });
            }
        });

        let group_creates = cloud
            .writes()
            .into_iter()
            .filter(|c| c == "create resource_group/rg")
            .count();
        assert_eq!(group_creates, 1);
        assert_eq!(reconciler.parents.len(), 0);
    }

    #[test]
    fn test_parent_slots_released_after_create() {
        let cloud = FakeCloud::new();
        let reconciler = Reconciler::new(&cloud);
        let token = CancellationToken::new();

        for group in ["a", "b", "c"] {
            let desired = ServicePlanConfig::new(group, "web").with_region("East US");
            reconciler.reconcile(&desired.into(), false, &token).unwrap();
        }
        assert_eq!(cloud.writes().len(), 6);
        assert_eq!(reconciler.parents.len(), 0);
    }

    #[test]
    fn test_decide_update_omits_unset() {
        let desired: Configuration = plan().with_capacity(2).into();
        let observed: Configuration = plan().with_capacity(1).with_per_site_scaling(true).into();
        let comparison = compare(&desired, &observed);
        assert_eq!(
            decide(&desired, &observed, &comparison),
            Action::Update {
                changes: vec![Change::new("Capacity", 2u32)]
            }
        );
    }
}
