//! Resource kinds and identities

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Kind of a managed resource
///
/// Variants are declared parent-first; `rank` follows declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// Grouping container for every other resource
    ResourceGroup,
    /// App service plan, lives in a resource group
    ServicePlan,
    /// Web app, hosted on a service plan
    WebApp,
}

impl ResourceKind {
    /// Dependency rank: parents have a lower rank than their children
    pub fn rank(self) -> u8 {
        match self {
            Self::ResourceGroup => 0,
            Self::ServicePlan => 1,
            Self::WebApp => 2,
        }
    }

    /// Human-readable label used in summaries
    pub fn label(self) -> &'static str {
        match self {
            Self::ResourceGroup => "resource group",
            Self::ServicePlan => "service plan",
            Self::WebApp => "web app",
        }
    }

    /// Stable machine name (matches the serde representation)
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ResourceGroup => "resource_group",
            Self::ServicePlan => "service_plan",
            Self::WebApp => "web_app",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Composite key naming one managed resource
///
/// Equality and hashing ignore ASCII case on the resource group and name,
/// matching how the provider resolves names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceIdentity {
    kind: ResourceKind,
    resource_group: String,
    name: String,
}

impl ResourceIdentity {
    /// Identity of a resource group
    pub fn resource_group(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            kind: ResourceKind::ResourceGroup,
            resource_group: name.clone(),
            name,
        }
    }

    /// Identity of a service plan
    pub fn service_plan(resource_group: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: ResourceKind::ServicePlan,
            resource_group: resource_group.into(),
            name: name.into(),
        }
    }

    /// Identity of a web app
    pub fn web_app(resource_group: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: ResourceKind::WebApp,
            resource_group: resource_group.into(),
            name: name.into(),
        }
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Name of the resource group containing this resource
    pub fn group(&self) -> &str {
        &self.resource_group
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Identity of the resource group this resource lives in
    ///
    /// For a resource group this is the group itself.
    pub fn group_identity(&self) -> Self {
        Self::resource_group(self.resource_group.clone())
    }

    /// Storage key: kind plus lowercased group and name
    pub fn key(&self) -> String {
        match self.kind {
            ResourceKind::ResourceGroup => {
                format!("{}/{}", self.kind, self.name.to_ascii_lowercase())
            }
            _ => format!(
                "{}/{}/{}",
                self.kind,
                self.resource_group.to_ascii_lowercase(),
                self.name.to_ascii_lowercase()
            ),
        }
    }
}

impl PartialEq for ResourceIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.resource_group.eq_ignore_ascii_case(&other.resource_group)
            && self.name.eq_ignore_ascii_case(&other.name)
    }
}

impl Eq for ResourceIdentity {}

impl Hash for ResourceIdentity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind.hash(state);
        self.resource_group.to_ascii_lowercase().hash(state);
        self.name.to_ascii_lowercase().hash(state);
    }
}

impl fmt::Display for ResourceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ResourceKind::ResourceGroup => write!(f, "{} {}", self.kind.label(), self.name),
            _ => write!(
                f,
                "{} {} :: {}",
                self.kind.label(),
                self.resource_group,
                self.name
            ),
        }
    }
}
