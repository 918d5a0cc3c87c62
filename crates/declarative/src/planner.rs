//! Execution planner - groups desired configurations into resource trees

use crate::identity::{ResourceIdentity, ResourceKind};
use crate::model::{Configuration, ResourceConfig};
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("{0} is declared more than once")]
    Duplicate(ResourceIdentity),
    #[error("{child} depends on {parent}, which is declared absent")]
    Conflicting {
        parent: ResourceIdentity,
        child: ResourceIdentity,
    },
}

/// Every desired configuration under one resource group
///
/// Trees are independent of each other and can be converged concurrently;
/// resources inside a tree are converged one at a time.
#[derive(Debug, Clone)]
pub struct ResourceTree {
    group: String,
    resources: Vec<Configuration>,
}

impl ResourceTree {
    fn new(group: &str) -> Self {
        Self {
            group: group.to_string(),
            resources: Vec::new(),
        }
    }

    /// Group name as first declared
    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Resources in convergence order
    ///
    /// Configurations that should exist come first, parents before children;
    /// then configurations that should not exist, children before parents.
    /// Declaration order is kept within a kind.
    pub fn ordered(&self) -> Vec<&Configuration> {
        let (mut present, mut absent): (Vec<&Configuration>, Vec<&Configuration>) =
            self.resources.iter().partition(|c| c.exists());
        present.sort_by_key(|c| c.kind().rank());
        absent.sort_by_key(|c| std::cmp::Reverse(c.kind().rank()));
        present.extend(absent);
        present
    }
}

/// Desired configurations grouped into independent trees
#[derive(Debug, Clone, Default)]
pub struct ExecutionPlan {
    trees: Vec<ResourceTree>,
    seen: HashSet<ResourceIdentity>,
    absent: HashSet<ResourceIdentity>,
    /// (parent, child) for every configuration that should exist
    requires: Vec<(ResourceIdentity, ResourceIdentity)>,
}

impl ExecutionPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a plan from configurations
    ///
    /// Rejects duplicate identities, and resources that should exist under a
    /// parent that is declared absent.
    pub fn from_configs(
        configs: impl IntoIterator<Item = Configuration>,
    ) -> Result<Self, PlanError> {
        let mut plan = Self::new();
        for config in configs {
            plan.add(config)?;
        }
        Ok(plan)
    }

    /// Add a configuration to the tree of its resource group
    pub fn add(&mut self, config: Configuration) -> Result<(), PlanError> {
        let identity = config.identity();
        if self.seen.contains(&identity) {
            return Err(PlanError::Duplicate(identity));
        }
        self.check_conflicts(&config, &identity)?;
        self.seen.insert(identity.clone());

        let position = self
            .trees
            .iter()
            .position(|t| t.group.eq_ignore_ascii_case(identity.group()));
        let tree = match position {
            Some(index) => &mut self.trees[index],
            None => {
                self.trees.push(ResourceTree::new(identity.group()));
                let last = self.trees.len() - 1;
                &mut self.trees[last]
            }
        };
        tree.resources.push(config);
        Ok(())
    }

    fn check_conflicts(
        &mut self,
        config: &Configuration,
        identity: &ResourceIdentity,
    ) -> Result<(), PlanError> {
        if !config.exists() {
            if let Some((_, child)) = self.requires.iter().find(|(p, _)| p == identity) {
                return Err(PlanError::Conflicting {
                    parent: identity.clone(),
                    child: child.clone(),
                });
            }
            self.absent.insert(identity.clone());
            return Ok(());
        }

        // A missing reference is reported when the resource is reconciled
        let parents: Vec<ResourceIdentity> = config
            .dependencies()
            .unwrap_or_default()
            .into_iter()
            .map(|d| d.identity)
            .collect();
        if let Some(parent) = parents.iter().find(|p| self.absent.contains(p)) {
            return Err(PlanError::Conflicting {
                parent: parent.clone(),
                child: identity.clone(),
            });
        }
        self.requires
            .extend(parents.into_iter().map(|p| (p, identity.clone())));
        Ok(())
    }

    /// Filter plan to only include resources matching a predicate
    pub fn filter<F>(self, predicate: F) -> Self
    where
        F: Fn(&Configuration) -> bool,
    {
        let mut plan = Self::new();
        for tree in self.trees {
            for config in tree.resources.into_iter().filter(|c| predicate(c)) {
                // Identities were unique before filtering
                let _ = plan.add(config);
            }
        }
        plan
    }

    /// Filter plan to only include resources matching a target pattern
    ///
    /// Target format: "kind", "kind.name", or a resource group name.
    pub fn filter_by_target(self, target: Option<&str>) -> Self {
        match target {
            None => self,
            Some(t) => {
                let (kind, name) = parse_target(t);
                self.filter(|c| matches_filter(&c.identity(), kind, name.as_deref()))
            }
        }
    }

    pub fn trees(&self) -> &[ResourceTree] {
        &self.trees
    }

    /// Total number of resources in the plan
    pub fn total_resources(&self) -> usize {
        self.trees.iter().map(ResourceTree::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }
}

fn parse_kind(text: &str) -> Option<ResourceKind> {
    [
        ResourceKind::ResourceGroup,
        ResourceKind::ServicePlan,
        ResourceKind::WebApp,
    ]
    .into_iter()
    .find(|k| k.as_str() == text.replace('-', "_"))
}

/// Parse a target like "kind.name" into (kind, name)
///
/// Anything that is not a kind is taken as a resource group name.
fn parse_target(target: &str) -> (Option<ResourceKind>, Option<String>) {
    match target.split_once('.') {
        Some((kind, name)) => match parse_kind(kind) {
            Some(kind) => (Some(kind), Some(name.to_string())),
            None => (None, Some(target.to_string())),
        },
        None => match parse_kind(target) {
            Some(kind) => (Some(kind), None),
            None => (None, Some(target.to_string())),
        },
    }
}

fn matches_filter(
    identity: &ResourceIdentity,
    kind: Option<ResourceKind>,
    name: Option<&str>,
) -> bool {
    match (kind, name) {
        (Some(kind), None) => identity.kind() == kind,
        (Some(kind), Some(name)) => {
            identity.kind() == kind && identity.name().eq_ignore_ascii_case(name)
        }
        (None, Some(group)) => identity.group().eq_ignore_ascii_case(group),
        (None, None) => true,
    }
}
