//! Pass context and provider traits
//!
//! These let the engine run without depending on a particular UI or
//! signal-handling implementation.

use crate::identity::{ResourceIdentity, ResourceKind};
use crate::model::Configuration;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Cooperative cancellation signal shared by every call of a pass
///
/// Cloning is cheap; all clones observe the same flag. Cancellation is
/// one-way.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request that work stop before its next write
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Progress callback for batch execution
///
/// Called from worker threads, so implementations must be `Sync`.
pub trait ProgressCallback: Send + Sync {
    /// Called once before any tree starts
    fn on_batch_start(&self, trees: usize, resources: usize);

    fn on_resource_start(&self, identity: &ResourceIdentity, description: &str);

    /// Called after each resource, with its one-line summary
    fn on_resource_complete(&self, identity: &ResourceIdentity, summary: &str, success: bool);

    fn on_batch_complete(&self);
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_batch_start(&self, _trees: usize, _resources: usize) {}
    fn on_resource_start(&self, _identity: &ResourceIdentity, _description: &str) {}
    fn on_resource_complete(&self, _identity: &ResourceIdentity, _summary: &str, _success: bool) {}
    fn on_batch_complete(&self) {}
}

/// State carried through one reconciliation pass
///
/// In simulation the pass records the state every suppressed write would
/// have produced. Later resources in the same pass see that projected
/// world instead of the remote one, so a child of a would-be-created parent
/// plans a create instead of failing.
pub struct PassContext<'a> {
    pub simulation: bool,
    pub cancel: &'a CancellationToken,
    projection: HashMap<ResourceIdentity, Configuration>,
    issued: Vec<String>,
}

impl<'a> PassContext<'a> {
    pub fn new(simulation: bool, cancel: &'a CancellationToken) -> Self {
        Self {
            simulation,
            cancel,
            projection: HashMap::new(),
            issued: Vec::new(),
        }
    }

    /// Projected state of a resource touched earlier in this pass
    pub fn projected(&self, identity: &ResourceIdentity) -> Option<&Configuration> {
        self.projection.get(identity)
    }

    /// Whether the resource's group only exists (or only vanished) in the
    /// projection, so the remote system cannot be asked about it
    pub fn shadowed(&self, identity: &ResourceIdentity) -> bool {
        identity.kind() != ResourceKind::ResourceGroup
            && self.projection.contains_key(&identity.group_identity())
    }

    pub(crate) fn project(&mut self, state: Configuration) {
        use crate::model::ResourceConfig;
        self.projection.insert(state.identity(), state);
    }

    pub(crate) fn record_write(&mut self, summary: String) {
        self.issued.push(summary);
    }

    /// Summaries of the writes issued so far
    pub fn issued(&self) -> &[String] {
        &self.issued
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ResourceGroupConfig;

    #[test]
    fn test_cancellation_is_shared() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn test_projection_shadows_children() {
        let token = CancellationToken::new();
        let mut ctx = PassContext::new(true, &token);
        let app = ResourceIdentity::web_app("rg", "shop");
        assert!(!ctx.shadowed(&app));

        ctx.project(ResourceGroupConfig::new("RG").with_region("East US").into());
        assert!(ctx.shadowed(&app));
        assert!(!ctx.shadowed(&ResourceIdentity::resource_group("rg")));
        assert!(ctx.projected(&ResourceIdentity::resource_group("rg")).is_some());
    }
}
