//! Existence-aware configuration model
//!
//! A configuration describes one resource. `exists` is the master switch:
//! when it is false every other attribute is meaningless and is ignored by
//! comparison and reconciliation. Attributes are optional; `None` means the
//! caller does not care, never "set to the default".

use crate::identity::{ResourceIdentity, ResourceKind};
use crate::types::{Attribute, AttributeValue, Change};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Sentinel runtime version meaning "runtime disabled"
pub const RUNTIME_OFF: &str = "off";

/// Name of the existence pseudo-attribute in differences
pub const EXISTS: &str = "Exists";

fn default_exists() -> bool {
    true
}

/// Error raised when applying a change to a configuration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttributeError {
    #[error("{kind} has no attribute {attribute}")]
    Unknown {
        kind: ResourceKind,
        attribute: String,
    },

    #[error("attribute {attribute} expects a {expected}, got {found}")]
    TypeMismatch {
        attribute: String,
        expected: &'static str,
        found: &'static str,
    },
}

/// Common behavior of every configuration kind
pub trait ResourceConfig: fmt::Debug + Clone + Send + Sync {
    fn identity(&self) -> ResourceIdentity;

    fn exists(&self) -> bool;

    /// The kind's attribute list, in evaluation order
    fn attributes(&self) -> Vec<Attribute>;

    /// Assign one attribute by name
    fn set_attribute(&mut self, change: &Change) -> Result<(), AttributeError>;
}

fn text(change: &Change) -> Result<String, AttributeError> {
    change
        .value
        .as_text()
        .map(str::to_string)
        .ok_or_else(|| mismatch(change, "string"))
}

fn boolean(change: &Change) -> Result<bool, AttributeError> {
    change.value.as_bool().ok_or_else(|| mismatch(change, "bool"))
}

fn count(change: &Change) -> Result<u32, AttributeError> {
    change
        .value
        .as_int()
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| mismatch(change, "non-negative integer"))
}

fn mismatch(change: &Change, expected: &'static str) -> AttributeError {
    AttributeError::TypeMismatch {
        attribute: change.attribute.clone(),
        expected,
        found: change.value.type_name(),
    }
}

fn unknown(kind: ResourceKind, change: &Change) -> AttributeError {
    AttributeError::Unknown {
        kind,
        attribute: change.attribute.clone(),
    }
}

// ============================================================================
// Resource group
// ============================================================================

/// Desired or observed state of a resource group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceGroupConfig {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default = "default_exists")]
    pub exists: bool,
}

impl ResourceGroupConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            region: None,
            exists: true,
        }
    }

    /// A resource group that must not exist
    pub fn absent(name: impl Into<String>) -> Self {
        Self {
            exists: false,
            ..Self::new(name)
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl ResourceConfig for ResourceGroupConfig {
    fn identity(&self) -> ResourceIdentity {
        ResourceIdentity::resource_group(self.name.clone())
    }

    fn exists(&self) -> bool {
        self.exists
    }

    fn attributes(&self) -> Vec<Attribute> {
        vec![Attribute::immutable("Region", self.region.as_deref())]
    }

    fn set_attribute(&mut self, change: &Change) -> Result<(), AttributeError> {
        match change.attribute.as_str() {
            "Region" => self.region = Some(text(change)?),
            _ => return Err(unknown(ResourceKind::ResourceGroup, change)),
        }
        Ok(())
    }
}

// ============================================================================
// Service plan
// ============================================================================

/// Desired or observed state of an app service plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServicePlanConfig {
    resource_group: String,
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pricing_tier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub per_site_scaling: Option<bool>,
    #[serde(default = "default_exists")]
    pub exists: bool,
}

impl ServicePlanConfig {
    pub fn new(resource_group: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            resource_group: resource_group.into(),
            name: name.into(),
            region: None,
            pricing_tier: None,
            capacity: None,
            per_site_scaling: None,
            exists: true,
        }
    }

    pub fn absent(resource_group: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            exists: false,
            ..Self::new(resource_group, name)
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_pricing_tier(mut self, tier: impl Into<String>) -> Self {
        self.pricing_tier = Some(tier.into());
        self
    }

    pub fn with_capacity(mut self, capacity: u32) -> Self {
        self.capacity = Some(capacity);
        self
    }

    pub fn with_per_site_scaling(mut self, enabled: bool) -> Self {
        self.per_site_scaling = Some(enabled);
        self
    }

    pub fn resource_group(&self) -> &str {
        &self.resource_group
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl ResourceConfig for ServicePlanConfig {
    fn identity(&self) -> ResourceIdentity {
        ResourceIdentity::service_plan(self.resource_group.clone(), self.name.clone())
    }

    fn exists(&self) -> bool {
        self.exists
    }

    fn attributes(&self) -> Vec<Attribute> {
        vec![
            Attribute::immutable("Region", self.region.as_deref()),
            Attribute::settable("PricingTier", self.pricing_tier.as_deref()),
            Attribute::settable("Capacity", self.capacity),
            Attribute::settable("PerSiteScaling", self.per_site_scaling),
        ]
    }

    fn set_attribute(&mut self, change: &Change) -> Result<(), AttributeError> {
        match change.attribute.as_str() {
            "Region" => self.region = Some(text(change)?),
            "PricingTier" => self.pricing_tier = Some(text(change)?),
            "Capacity" => self.capacity = Some(count(change)?),
            "PerSiteScaling" => self.per_site_scaling = Some(boolean(change)?),
            _ => return Err(unknown(ResourceKind::ServicePlan, change)),
        }
        Ok(())
    }
}

// ============================================================================
// Web app
// ============================================================================

/// Desired or observed state of a web app
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WebAppConfig {
    resource_group: String,
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub always_on: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_sockets: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub net_framework_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub php_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub python_version: Option<String>,
    /// When set to anything but `off`, `web_container` must be set too
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub java_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_container: Option<String>,
    #[serde(default = "default_exists")]
    pub exists: bool,
}

impl WebAppConfig {
    pub fn new(resource_group: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            resource_group: resource_group.into(),
            name: name.into(),
            plan_name: None,
            always_on: None,
            web_sockets: None,
            net_framework_version: None,
            php_version: None,
            python_version: None,
            java_version: None,
            web_container: None,
            exists: true,
        }
    }

    pub fn absent(resource_group: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            exists: false,
            ..Self::new(resource_group, name)
        }
    }

    pub fn on_plan(mut self, plan_name: impl Into<String>) -> Self {
        self.plan_name = Some(plan_name.into());
        self
    }

    pub fn with_always_on(mut self, enabled: bool) -> Self {
        self.always_on = Some(enabled);
        self
    }

    pub fn with_web_sockets(mut self, enabled: bool) -> Self {
        self.web_sockets = Some(enabled);
        self
    }

    pub fn with_php(mut self, version: impl Into<String>) -> Self {
        self.php_version = Some(version.into());
        self
    }

    pub fn with_python(mut self, version: impl Into<String>) -> Self {
        self.python_version = Some(version.into());
        self
    }

    pub fn with_net_framework(mut self, version: impl Into<String>) -> Self {
        self.net_framework_version = Some(version.into());
        self
    }

    pub fn with_java(mut self, version: impl Into<String>, container: impl Into<String>) -> Self {
        self.java_version = Some(version.into());
        self.web_container = Some(container.into());
        self
    }

    pub fn resource_group(&self) -> &str {
        &self.resource_group
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether a Java runtime is requested
    pub fn java_enabled(&self) -> bool {
        self.java_version
            .as_deref()
            .is_some_and(|v| !v.is_empty() && !v.eq_ignore_ascii_case(RUNTIME_OFF))
    }
}

impl ResourceConfig for WebAppConfig {
    fn identity(&self) -> ResourceIdentity {
        ResourceIdentity::web_app(self.resource_group.clone(), self.name.clone())
    }

    fn exists(&self) -> bool {
        self.exists
    }

    fn attributes(&self) -> Vec<Attribute> {
        vec![
            Attribute::settable("PlanName", self.plan_name.as_deref()),
            Attribute::settable("AlwaysOn", self.always_on),
            Attribute::settable("WebSockets", self.web_sockets),
            Attribute::settable("NetFrameworkVersion", self.net_framework_version.as_deref()),
            Attribute::settable("PhpVersion", self.php_version.as_deref()),
            Attribute::settable("JavaVersion", self.java_version.as_deref()),
            Attribute::settable("WebContainer", self.web_container.as_deref())
                .guarded(self.java_enabled()),
            Attribute::settable("PythonVersion", self.python_version.as_deref()),
        ]
    }

    fn set_attribute(&mut self, change: &Change) -> Result<(), AttributeError> {
        match change.attribute.as_str() {
            "PlanName" => self.plan_name = Some(text(change)?),
            "AlwaysOn" => self.always_on = Some(boolean(change)?),
            "WebSockets" => self.web_sockets = Some(boolean(change)?),
            "NetFrameworkVersion" => self.net_framework_version = Some(text(change)?),
            "PhpVersion" => self.php_version = Some(text(change)?),
            "JavaVersion" => self.java_version = Some(text(change)?),
            "WebContainer" => self.web_container = Some(text(change)?),
            "PythonVersion" => self.python_version = Some(text(change)?),
            _ => return Err(unknown(ResourceKind::WebApp, change)),
        }
        Ok(())
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// How a configuration relates to a resource it depends on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParentPolicy {
    /// Create the parent from this configuration when it is missing
    Ensure(Box<Configuration>),
    /// The parent must already exist
    Require,
}

/// A resource this configuration cannot exist without
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub identity: ResourceIdentity,
    pub policy: ParentPolicy,
}

/// Any managed resource's configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Configuration {
    ResourceGroup(ResourceGroupConfig),
    ServicePlan(ServicePlanConfig),
    WebApp(WebAppConfig),
}

impl Configuration {
    /// The "does not exist" configuration for an identity
    pub fn absent(identity: &ResourceIdentity) -> Self {
        match identity.kind() {
            ResourceKind::ResourceGroup => {
                Self::ResourceGroup(ResourceGroupConfig::absent(identity.name()))
            }
            ResourceKind::ServicePlan => Self::ServicePlan(ServicePlanConfig::absent(
                identity.group(),
                identity.name(),
            )),
            ResourceKind::WebApp => {
                Self::WebApp(WebAppConfig::absent(identity.group(), identity.name()))
            }
        }
    }

    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::ResourceGroup(_) => ResourceKind::ResourceGroup,
            Self::ServicePlan(_) => ResourceKind::ServicePlan,
            Self::WebApp(_) => ResourceKind::WebApp,
        }
    }

    /// Attributes explicitly set on this configuration, as changes
    ///
    /// This is what a create call sends: unset attributes stay at the
    /// provider's default.
    pub fn set_attributes(&self) -> Vec<Change> {
        if !self.exists() {
            return Vec::new();
        }
        self.attributes()
            .into_iter()
            .filter_map(|a| a.value.map(|v| Change::new(a.name, v)))
            .collect()
    }

    /// Resources that must exist before this one can
    ///
    /// Returns the name of the missing reference attribute when a required
    /// parent cannot be named.
    pub fn dependencies(&self) -> Result<Vec<Dependency>, &'static str> {
        match self {
            Self::ResourceGroup(_) => Ok(Vec::new()),
            Self::ServicePlan(plan) => {
                let mut group = ResourceGroupConfig::new(plan.resource_group.clone());
                group.region.clone_from(&plan.region);
                Ok(vec![Dependency {
                    identity: group.identity(),
                    policy: ParentPolicy::Ensure(Box::new(Self::ResourceGroup(group))),
                }])
            }
            Self::WebApp(app) => {
                let plan_name = app.plan_name.as_deref().ok_or("PlanName")?;
                Ok(vec![
                    Dependency {
                        identity: ResourceIdentity::resource_group(app.resource_group.clone()),
                        policy: ParentPolicy::Require,
                    },
                    Dependency {
                        identity: ResourceIdentity::service_plan(
                            app.resource_group.clone(),
                            plan_name,
                        ),
                        policy: ParentPolicy::Require,
                    },
                ])
            }
        }
    }

    /// Copy of this configuration with the given changes applied
    pub fn with_changes(&self, changes: &[Change]) -> Result<Self, AttributeError> {
        let mut next = self.clone();
        for change in changes {
            next.set_attribute(change)?;
        }
        Ok(next)
    }

    /// One-line description in the form "Ensure <resource> <details>"
    pub fn describe(&self) -> String {
        let identity = self.identity();
        if !self.exists() {
            return format!("Ensure {identity} does not exist");
        }

        let mut out = format!("Ensure {identity}");
        match self {
            Self::ResourceGroup(group) => {
                if let Some(region) = &group.region {
                    out.push_str(&format!(" in region {region}"));
                }
            }
            Self::ServicePlan(plan) => {
                if let Some(region) = &plan.region {
                    out.push_str(&format!(" in region {region}"));
                }
                if let Some(tier) = &plan.pricing_tier {
                    out.push_str(&format!(" with pricing tier {tier}"));
                }
                if let Some(capacity) = plan.capacity {
                    out.push_str(&format!(" with capacity {capacity}"));
                }
                match plan.per_site_scaling {
                    Some(true) => out.push_str(" with per-site scaling"),
                    Some(false) => out.push_str(" without per-site scaling"),
                    None => {}
                }
            }
            Self::WebApp(app) => {
                if let Some(plan) = &app.plan_name {
                    out.push_str(&format!(" on plan {plan}"));
                }
                let runtimes = [
                    (".NET", &app.net_framework_version),
                    ("PHP", &app.php_version),
                    ("Python", &app.python_version),
                    ("Java", &app.java_version),
                ];
                for (label, version) in runtimes {
                    if let Some(v) = version
                        && !v.eq_ignore_ascii_case(RUNTIME_OFF)
                    {
                        out.push_str(&format!(" with {label} {v}"));
                    }
                }
                if app.java_enabled()
                    && let Some(container) = &app.web_container
                {
                    out.push_str(&format!(" on {container}"));
                }
                if app.always_on == Some(true) {
                    out.push_str(" always on");
                }
                if app.web_sockets == Some(true) {
                    out.push_str(" with web sockets");
                }
            }
        }
        out
    }
}

impl ResourceConfig for Configuration {
    fn identity(&self) -> ResourceIdentity {
        match self {
            Self::ResourceGroup(c) => c.identity(),
            Self::ServicePlan(c) => c.identity(),
            Self::WebApp(c) => c.identity(),
        }
    }

    fn exists(&self) -> bool {
        match self {
            Self::ResourceGroup(c) => c.exists,
            Self::ServicePlan(c) => c.exists,
            Self::WebApp(c) => c.exists,
        }
    }

    fn attributes(&self) -> Vec<Attribute> {
        match self {
            Self::ResourceGroup(c) => c.attributes(),
            Self::ServicePlan(c) => c.attributes(),
            Self::WebApp(c) => c.attributes(),
        }
    }

    fn set_attribute(&mut self, change: &Change) -> Result<(), AttributeError> {
        match self {
            Self::ResourceGroup(c) => c.set_attribute(change),
            Self::ServicePlan(c) => c.set_attribute(change),
            Self::WebApp(c) => c.set_attribute(change),
        }
    }
}

impl From<ResourceGroupConfig> for Configuration {
    fn from(config: ResourceGroupConfig) -> Self {
        Self::ResourceGroup(config)
    }
}

impl From<ServicePlanConfig> for Configuration {
    fn from(config: ServicePlanConfig) -> Self {
        Self::ServicePlan(config)
    }
}

impl From<WebAppConfig> for Configuration {
    fn from(config: WebAppConfig) -> Self {
        Self::WebApp(config)
    }
}

/// Attribute value by name, if the attribute exists and is set
pub fn attribute_value(config: &impl ResourceConfig, name: &str) -> Option<AttributeValue> {
    config
        .attributes()
        .into_iter()
        .find(|a| a.name == name)
        .and_then(|a| a.value)
}
