//! Desired-state manifests
//!
//! A manifest is a TOML file with `[[resource_group]]`, `[[service_plan]]`
//! and `[[web_app]]` tables. `collect` writes the observed state back in the
//! same shape, so its output can be fed to `apply` again.

use anyhow::{Context, Result, bail};
use cloudkit::catalog::{self, Stack};
use declarative::{
    Configuration, ResourceConfig, ResourceGroupConfig, ResourceIdentity,
    ServicePlanConfig, WebAppConfig,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use walkdir::WalkDir;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    #[serde(default, rename = "resource_group", skip_serializing_if = "Vec::is_empty")]
    pub resource_groups: Vec<ResourceGroupConfig>,
    #[serde(default, rename = "service_plan", skip_serializing_if = "Vec::is_empty")]
    pub service_plans: Vec<ServicePlanConfig>,
    #[serde(default, rename = "web_app", skip_serializing_if = "Vec::is_empty")]
    pub web_apps: Vec<WebAppConfig>,
}

impl Manifest {
    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load a manifest file, or every `*.toml` under a directory in path order
    pub fn load(path: &Path) -> Result<Self> {
        let mut manifest = Self::default();
        for file in manifest_files(path)? {
            log::debug!("Loading manifest {}", file.display());
            let content = fs::read_to_string(&file)
                .with_context(|| format!("Could not read {}", file.display()))?;
            let part =
                Self::parse(&content).with_context(|| format!("Invalid manifest {}", file.display()))?;
            manifest.merge(part);
        }
        Ok(manifest)
    }

    pub fn merge(&mut self, other: Self) {
        self.resource_groups.extend(other.resource_groups);
        self.service_plans.extend(other.service_plans);
        self.web_apps.extend(other.web_apps);
    }

    /// Every configuration, groups first, catalog values in catalog spelling
    pub fn configurations(&self) -> Vec<Configuration> {
        self.resource_groups
            .iter()
            .cloned()
            .map(Configuration::from)
            .chain(self.service_plans.iter().cloned().map(Configuration::from))
            .chain(self.web_apps.iter().cloned().map(Configuration::from))
            .map(|config| catalog::normalize(&config))
            .collect()
    }

    pub fn from_configurations<'a>(configs: impl IntoIterator<Item = &'a Configuration>) -> Self {
        let mut manifest = Self::default();
        for config in configs {
            match config {
                Configuration::ResourceGroup(c) => manifest.resource_groups.push(c.clone()),
                Configuration::ServicePlan(c) => manifest.service_plans.push(c.clone()),
                Configuration::WebApp(c) => manifest.web_apps.push(c.clone()),
            }
        }
        manifest
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to render manifest as TOML")
    }
}

fn manifest_files(path: &Path) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    if !path.is_dir() {
        bail!("Manifest path not found: {}", path.display());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(path).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Could not walk {}", path.display()))?;
        if entry.file_type().is_file()
            && entry.path().extension().is_some_and(|ext| ext == "toml")
        {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

// ============================================================================
// Validation
// ============================================================================

static RESOURCE_GROUP_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_().-]{0,89}[A-Za-z0-9_()-]$").expect("valid resource group pattern")
});
static SERVICE_PLAN_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9-]{1,40}$").expect("valid service plan pattern"));
static WEB_APP_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9-]{0,58}[A-Za-z0-9]$").expect("valid web app pattern")
});

/// A problem found in one resource before reconciling it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    pub identity: ResourceIdentity,
    pub message: String,
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.identity, self.message)
    }
}

/// Check names and attribute values against the provider's rules
pub fn validate(configs: &[Configuration]) -> Vec<Issue> {
    let mut issues: Vec<Issue> = configs.iter().flat_map(validate_one).collect();
    issues.extend(conflicts(configs));
    issues
}

/// Resources that should exist under a parent declared absent
fn conflicts(configs: &[Configuration]) -> Vec<Issue> {
    let absent: HashSet<ResourceIdentity> = configs
        .iter()
        .filter(|c| !c.exists())
        .map(|c| c.identity())
        .collect();
    if absent.is_empty() {
        return Vec::new();
    }

    configs
        .iter()
        .filter(|c| c.exists())
        .filter_map(|config| {
            let parent = config
                .dependencies()
                .unwrap_or_default()
                .into_iter()
                .map(|d| d.identity)
                .find(|p| absent.contains(p))?;
            Some(Issue {
                identity: config.identity(),
                message: format!("depends on {parent}, which is declared absent"),
            })
        })
        .collect()
}

/// Split configurations into valid ones and the issues of the rest
pub fn partition(configs: Vec<Configuration>) -> (Vec<Configuration>, Vec<Issue>) {
    let issues = validate(&configs);
    let invalid: HashSet<&ResourceIdentity> = issues.iter().map(|i| &i.identity).collect();
    let valid = configs
        .iter()
        .filter(|c| !invalid.contains(&c.identity()))
        .cloned()
        .collect();
    (valid, issues)
}

fn validate_one(config: &Configuration) -> Vec<Issue> {
    let identity = config.identity();
    let mut messages = Vec::new();

    match config {
        Configuration::ResourceGroup(group) => {
            check_group_name(group.name(), &mut messages);
            if config.exists() {
                check_region(group.region.as_deref(), &mut messages);
            }
        }
        Configuration::ServicePlan(plan) => {
            check_group_name(plan.resource_group(), &mut messages);
            if !SERVICE_PLAN_NAME.is_match(plan.name()) {
                messages.push(format!(
                    "invalid service plan name '{}' (1-40 letters, digits or hyphens)",
                    plan.name()
                ));
            }
            if config.exists() {
                check_region(plan.region.as_deref(), &mut messages);
                if let Some(tier) = &plan.pricing_tier
                    && catalog::pricing_tier(tier).is_none()
                {
                    messages.push(format!("unknown pricing tier '{tier}'"));
                }
                if plan.capacity == Some(0) {
                    messages.push("capacity must be at least 1".to_string());
                }
            }
        }
        Configuration::WebApp(app) => {
            check_group_name(app.resource_group(), &mut messages);
            if !WEB_APP_NAME.is_match(app.name()) {
                messages.push(format!(
                    "invalid web app name '{}' (2-60 letters, digits or inner hyphens)",
                    app.name()
                ));
            }
            if config.exists() {
                check_web_app(app, &mut messages);
            }
        }
    }

    messages
        .into_iter()
        .map(|message| Issue {
            identity: identity.clone(),
            message,
        })
        .collect()
}

fn check_group_name(name: &str, messages: &mut Vec<String>) {
    if !RESOURCE_GROUP_NAME.is_match(name) {
        messages.push(format!(
            "invalid resource group name '{name}' (1-90 characters, no trailing period)"
        ));
    }
}

fn check_region(region: Option<&str>, messages: &mut Vec<String>) {
    if let Some(region) = region
        && catalog::region(region).is_none()
    {
        messages.push(format!("unknown region '{region}'"));
    }
}

fn check_web_app(app: &WebAppConfig, messages: &mut Vec<String>) {
    if app.plan_name.is_none() {
        messages.push("plan_name must be set".to_string());
    }

    let versions = [
        (Stack::NetFramework, &app.net_framework_version),
        (Stack::Php, &app.php_version),
        (Stack::Python, &app.python_version),
        (Stack::Java, &app.java_version),
    ];
    for (stack, version) in versions {
        if let Some(version) = version
            && !catalog::is_runtime_version(stack, version)
        {
            messages.push(format!("unsupported {stack} version '{version}'"));
        }
    }

    if app.java_enabled() {
        match &app.web_container {
            None => messages.push("java_version requires web_container".to_string()),
            Some(container) if !catalog::is_web_container(container) => {
                messages.push(format!("unknown web container '{container}'"));
            }
            Some(_) => {}
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SITE: &str = r#"
[[resource_group]]
name = "shop-rg"
region = "East US"

[[service_plan]]
resource_group = "shop-rg"
name = "shop-plan"
region = "East US"
pricing_tier = "S1"
capacity = 2

[[web_app]]
resource_group = "shop-rg"
name = "shop"
plan_name = "shop-plan"
php_version = "7.1"
always_on = true
"#;

    #[test]
    fn test_parse_manifest() {
        let manifest = Manifest::parse(SITE).unwrap();
        assert_eq!(manifest.resource_groups.len(), 1);
        assert_eq!(manifest.service_plans[0].capacity, Some(2));
        assert_eq!(manifest.web_apps[0].php_version.as_deref(), Some("7.1"));
        assert!(manifest.web_apps[0].exists);

        let configs = manifest.configurations();
        assert_eq!(configs.len(), 3);
        assert!(validate(&configs).is_empty());
    }

    #[test]
    fn test_unknown_table_rejected() {
        assert!(Manifest::parse("[[storage_account]]\nname = \"x\"\n").is_err());
    }

    #[test]
    fn test_collect_output_reloads() {
        let manifest = Manifest::parse(SITE).unwrap();
        let rendered = manifest.to_toml().unwrap();
        assert_eq!(Manifest::parse(&rendered).unwrap(), manifest);
    }

    #[test]
    fn test_load_directory_sorted() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("apps")).unwrap();
        fs::write(
            dir.path().join("apps/web.toml"),
            "[[web_app]]\nresource_group = \"b\"\nname = \"site\"\nplan_name = \"p\"\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("00-groups.toml"),
            "[[resource_group]]\nname = \"a\"\n\n[[resource_group]]\nname = \"b\"\n",
        )
        .unwrap();
        fs::write(dir.path().join("notes.md"), "not a manifest").unwrap();

        let manifest = Manifest::load(dir.path()).unwrap();
        let names: Vec<&str> = manifest.resource_groups.iter().map(|g| g.name()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(manifest.web_apps.len(), 1);
    }

    #[test]
    fn test_load_missing_path() {
        let dir = TempDir::new().unwrap();
        assert!(Manifest::load(&dir.path().join("nope")).is_err());
    }

    #[test]
    fn test_name_rules() {
        assert!(RESOURCE_GROUP_NAME.is_match("my-rg_(1).prod"));
        assert!(!RESOURCE_GROUP_NAME.is_match("ends."));
        assert!(!RESOURCE_GROUP_NAME.is_match(""));
        assert!(SERVICE_PLAN_NAME.is_match("plan-1"));
        assert!(!SERVICE_PLAN_NAME.is_match("plan_1"));
        assert!(WEB_APP_NAME.is_match("ab"));
        assert!(!WEB_APP_NAME.is_match("a"));
        assert!(!WEB_APP_NAME.is_match("-shop"));
        assert!(!WEB_APP_NAME.is_match("shop-"));
    }

    #[test]
    fn test_catalog_checks() {
        let plan: Configuration = ServicePlanConfig::new("rg", "plan")
            .with_region("Mars North")
            .with_pricing_tier("Z9")
            .into();
        let issues = validate(&[plan]);
        assert_eq!(issues.len(), 2);
        assert!(issues[0].message.contains("Mars North"));
        assert!(issues[1].message.contains("Z9"));
    }

    #[test]
    fn test_java_needs_container() {
        let mut app = WebAppConfig::new("rg", "shop").on_plan("plan");
        app.java_version = Some("1.8".to_string());
        let issues = validate(&[app.into()]);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].message, "java_version requires web_container");

        let app = WebAppConfig::new("rg", "shop")
            .on_plan("plan")
            .with_java("1.8", "tomcat 8.5");
        assert!(validate(&[app.into()]).is_empty());
    }

    #[test]
    fn test_absent_resources_only_checked_for_names() {
        let mut gone = ResourceGroupConfig::absent("old-rg");
        gone.region = Some("Atlantis".to_string());
        assert!(validate(&[gone.into()]).is_empty());
    }

    #[test]
    fn test_configurations_use_catalog_spelling() {
        let manifest = Manifest::parse(
            r#"
[[resource_group]]
name = "rg"
region = "eastus"

[[service_plan]]
resource_group = "rg"
name = "web"
region = "East US"
pricing_tier = "StandardS1"
"#,
        )
        .unwrap();

        assert_eq!(
            manifest.configurations(),
            vec![
                ResourceGroupConfig::new("rg").with_region("East US").into(),
                ServicePlanConfig::new("rg", "web")
                    .with_region("East US")
                    .with_pricing_tier("S1")
                    .into(),
            ]
        );
    }

    #[test]
    fn test_present_child_of_absent_parent_dropped() {
        let configs: Vec<Configuration> = vec![
            ResourceGroupConfig::absent("rg").into(),
            ServicePlanConfig::new("rg", "web").with_region("East US").into(),
            ServicePlanConfig::absent("keep", "old").into(),
            WebAppConfig::new("keep", "shop").on_plan("old").into(),
            WebAppConfig::new("keep", "blog").on_plan("new").into(),
        ];

        let (valid, issues) = partition(configs);
        let flagged: Vec<String> = issues.iter().map(ToString::to_string).collect();
        assert_eq!(
            flagged,
            vec![
                "service plan rg :: web: depends on resource group rg, which is declared absent",
                "web app keep :: shop: depends on service plan keep :: old, which is declared absent",
            ]
        );
        assert_eq!(valid.len(), 3);
        assert!(declarative::ExecutionPlan::from_configs(valid).is_ok());
    }

    #[test]
    fn test_partition_drops_invalid() {
        let good: Configuration = ResourceGroupConfig::new("good").with_region("westus").into();
        let bad: Configuration = WebAppConfig::new("rg", "x").into();
        let (valid, issues) = partition(vec![good.clone(), bad]);
        assert_eq!(valid, vec![good]);
        // Name too short and no plan
        assert_eq!(issues.len(), 2);
        assert!(issues.iter().all(|i| i.identity == ResourceIdentity::web_app("rg", "x")));
    }
}
