//! Static App Service catalogs.
//!
//! Regions, pricing tiers, runtime versions and Java web containers the
//! provider accepts. Lookups ignore ASCII case and work in both directions
//! (display name or programmatic name for regions, tier name or SKU for
//! pricing tiers).

use declarative::{Configuration, RUNTIME_OFF};
use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

/// An Azure region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    /// Human-readable name, e.g. `East US`
    pub display: &'static str,
    /// Programmatic name, e.g. `eastus`
    pub name: &'static str,
}

/// An App Service pricing tier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricingTier {
    /// Catalog name, e.g. `StandardS1`
    pub name: &'static str,
    /// Tier family, e.g. `Standard`
    pub tier: &'static str,
    /// SKU size, e.g. `S1`
    pub sku: &'static str,
}

/// Runtime stacks a web app can enable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stack {
    NetFramework,
    Php,
    Python,
    Java,
}

impl Stack {
    pub const ALL: [Self; 4] = [Self::NetFramework, Self::Php, Self::Python, Self::Java];

    /// Name of the web app attribute holding this stack's version
    pub fn attribute(self) -> &'static str {
        match self {
            Self::NetFramework => "NetFrameworkVersion",
            Self::Php => "PhpVersion",
            Self::Python => "PythonVersion",
            Self::Java => "JavaVersion",
        }
    }

    /// Parse a stack name as typed on the command line
    pub fn parse(text: &str) -> Option<Self> {
        match text.to_ascii_lowercase().as_str() {
            "net" | "dotnet" | ".net" | "net-framework" => Some(Self::NetFramework),
            "php" => Some(Self::Php),
            "python" => Some(Self::Python),
            "java" => Some(Self::Java),
            _ => None,
        }
    }
}

impl fmt::Display for Stack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NetFramework => ".NET Framework",
            Self::Php => "PHP",
            Self::Python => "Python",
            Self::Java => "Java",
        })
    }
}

const REGIONS: &[Region] = &[
    Region { display: "East US", name: "eastus" },
    Region { display: "East US 2", name: "eastus2" },
    Region { display: "Central US", name: "centralus" },
    Region { display: "North Central US", name: "northcentralus" },
    Region { display: "South Central US", name: "southcentralus" },
    Region { display: "West Central US", name: "westcentralus" },
    Region { display: "West US", name: "westus" },
    Region { display: "West US 2", name: "westus2" },
    Region { display: "Canada Central", name: "canadacentral" },
    Region { display: "Canada East", name: "canadaeast" },
    Region { display: "Brazil South", name: "brazilsouth" },
    Region { display: "North Europe", name: "northeurope" },
    Region { display: "West Europe", name: "westeurope" },
    Region { display: "UK South", name: "uksouth" },
    Region { display: "UK West", name: "ukwest" },
    Region { display: "East Asia", name: "eastasia" },
    Region { display: "Southeast Asia", name: "southeastasia" },
    Region { display: "Japan East", name: "japaneast" },
    Region { display: "Japan West", name: "japanwest" },
    Region { display: "Australia East", name: "australiaeast" },
    Region { display: "Australia Southeast", name: "australiasoutheast" },
    Region { display: "Central India", name: "centralindia" },
    Region { display: "South India", name: "southindia" },
    Region { display: "West India", name: "westindia" },
    Region { display: "Korea Central", name: "koreacentral" },
    Region { display: "Korea South", name: "koreasouth" },
];

const PRICING_TIERS: &[PricingTier] = &[
    PricingTier { name: "FreeF1", tier: "Free", sku: "F1" },
    PricingTier { name: "SharedD1", tier: "Shared", sku: "D1" },
    PricingTier { name: "BasicB1", tier: "Basic", sku: "B1" },
    PricingTier { name: "BasicB2", tier: "Basic", sku: "B2" },
    PricingTier { name: "BasicB3", tier: "Basic", sku: "B3" },
    PricingTier { name: "StandardS1", tier: "Standard", sku: "S1" },
    PricingTier { name: "StandardS2", tier: "Standard", sku: "S2" },
    PricingTier { name: "StandardS3", tier: "Standard", sku: "S3" },
    PricingTier { name: "PremiumP1", tier: "Premium", sku: "P1" },
    PricingTier { name: "PremiumP2", tier: "Premium", sku: "P2" },
    PricingTier { name: "PremiumP3", tier: "Premium", sku: "P3" },
    PricingTier { name: "PremiumP1v2", tier: "PremiumV2", sku: "P1v2" },
    PricingTier { name: "PremiumP2v2", tier: "PremiumV2", sku: "P2v2" },
    PricingTier { name: "PremiumP3v2", tier: "PremiumV2", sku: "P3v2" },
];

const NET_FRAMEWORK_VERSIONS: &[&str] = &["v3.5", "v4.0", "v4.6", "v4.7"];
const PHP_VERSIONS: &[&str] = &[RUNTIME_OFF, "5.5", "5.6", "7.0", "7.1", "7.2"];
const PYTHON_VERSIONS: &[&str] = &[RUNTIME_OFF, "2.7", "3.4", "3.6"];
const JAVA_VERSIONS: &[&str] = &[RUNTIME_OFF, "1.7", "1.8", "11"];

const WEB_CONTAINERS: &[&str] = &[
    "tomcat 7.0",
    "tomcat 8.0",
    "tomcat 8.5",
    "tomcat 9.0",
    "jetty 9.1",
    "jetty 9.3",
];

/// Default version a new web app gets for each stack
pub const DEFAULT_NET_FRAMEWORK: &str = "v4.0";
pub const DEFAULT_PHP: &str = "5.6";

static REGION_LOOKUP: LazyLock<HashMap<String, &'static Region>> = LazyLock::new(|| {
    REGIONS
        .iter()
        .flat_map(|r| [(r.display.to_ascii_lowercase(), r), (r.name.to_string(), r)])
        .collect()
});

static TIER_LOOKUP: LazyLock<HashMap<String, &'static PricingTier>> = LazyLock::new(|| {
    PRICING_TIERS
        .iter()
        .flat_map(|t| [(t.name.to_ascii_lowercase(), t), (t.sku.to_ascii_lowercase(), t)])
        .collect()
});

/// Every known region, in catalog order
pub fn regions() -> &'static [Region] {
    REGIONS
}

/// Look up a region by display or programmatic name
pub fn region(name: &str) -> Option<&'static Region> {
    REGION_LOOKUP.get(&name.trim().to_ascii_lowercase()).copied()
}

pub fn pricing_tiers() -> &'static [PricingTier] {
    PRICING_TIERS
}

/// Look up a pricing tier by catalog name or SKU
pub fn pricing_tier(name: &str) -> Option<&'static PricingTier> {
    TIER_LOOKUP.get(&name.trim().to_ascii_lowercase()).copied()
}

/// Spell catalog values the one way they are stored and compared
///
/// Regions become their display name (`eastus` -> `East US`) and pricing
/// tiers their SKU (`StandardS1` -> `S1`). Values the catalog does not know
/// are left alone.
pub fn normalize(config: &Configuration) -> Configuration {
    let region_of = |region: &mut Option<String>| {
        if let Some(found) = region.as_deref().and_then(self::region) {
            *region = Some(found.display.to_string());
        }
    };

    let mut config = config.clone();
    match &mut config {
        Configuration::ResourceGroup(group) => region_of(&mut group.region),
        Configuration::ServicePlan(plan) => {
            region_of(&mut plan.region);
            if let Some(found) = plan.pricing_tier.as_deref().and_then(pricing_tier) {
                plan.pricing_tier = Some(found.sku.to_string());
            }
        }
        Configuration::WebApp(_) => {}
    }
    config
}

/// Versions accepted for a stack; `off` disables the stack where allowed
pub fn runtime_versions(stack: Stack) -> &'static [&'static str] {
    match stack {
        Stack::NetFramework => NET_FRAMEWORK_VERSIONS,
        Stack::Php => PHP_VERSIONS,
        Stack::Python => PYTHON_VERSIONS,
        Stack::Java => JAVA_VERSIONS,
    }
}

pub fn is_runtime_version(stack: Stack, version: &str) -> bool {
    runtime_versions(stack)
        .iter()
        .any(|v| v.eq_ignore_ascii_case(version))
}

pub fn web_containers() -> &'static [&'static str] {
    WEB_CONTAINERS
}

pub fn is_web_container(name: &str) -> bool {
    WEB_CONTAINERS.iter().any(|c| c.eq_ignore_ascii_case(name))
}
