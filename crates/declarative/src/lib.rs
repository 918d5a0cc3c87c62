//! # Declarative
//!
//! Desired-state reconciliation for remote resources.
//!
//! Callers describe how a resource should look, including whether it should
//! exist at all. The engine observes the remote state, compares the two, and
//! issues only the writes needed to converge. Running it again right away
//! changes nothing.
//!
//! ## Core Concepts
//!
//! - **Configuration**: Desired or observed state of one resource, with an
//!   `exists` switch and optional attributes (`None` means "don't care")
//! - **ComparisonResult**: The attributes where desired and observed differ
//! - **Reconciler**: Runs one pass per resource: resolve parents, observe,
//!   compare, act
//! - **ExecutionPlan**: Desired configurations grouped into independent
//!   trees, one per resource group
//! - **Executor**: Converges trees in parallel
//!
//! ## Example
//!
//! ```ignore
//! use declarative::{
//!     CancellationToken, ExecuteOptions, ExecutionPlan, NoProgress, Reconciler,
//!     ServicePlanConfig, execute, summarize,
//! };
//!
//! let desired = ServicePlanConfig::new("shop-rg", "shop-plan")
//!     .with_region("East US")
//!     .with_pricing_tier("S1");
//!
//! let plan = ExecutionPlan::from_configs([desired.into()])?;
//! let reconciler = Reconciler::new(&client);
//! let reports = execute(
//!     &reconciler,
//!     &plan,
//!     &ExecuteOptions::default(),
//!     &CancellationToken::new(),
//!     &NoProgress,
//! )?;
//! println!("{} changed", summarize(&reports).changed());
//! ```
//!
//! ## Provider Traits
//!
//! - [`CloudClient`]: Authenticated access to the remote system
//! - [`ProgressCallback`]: Receives progress updates
//!
//! The engine has no dependency on any particular SDK, UI, or signal
//! handling; hosts supply these.

pub mod client;
pub mod compare;
pub mod context;
pub mod error;
pub mod executor;
pub mod identity;
pub mod model;
pub mod paging;
pub mod planner;
pub mod reconciler;
pub mod types;

// Re-export main types at crate root
pub use client::{CloudClient, all_resource_groups, resource_groups};
pub use compare::{ComparisonResult, Difference, compare};
pub use context::{CancellationToken, NoProgress, PassContext, ProgressCallback};
pub use error::{ErrorCategory, ReconcileError, RemoteError, Step};
pub use executor::{
    ResourceReport, TreeReport, execute, execute_tree, execute_with, summarize,
};
pub use identity::{ResourceIdentity, ResourceKind};
pub use model::{
    AttributeError, Configuration, Dependency, EXISTS, ParentPolicy, RUNTIME_OFF,
    ResourceConfig, ResourceGroupConfig, ServicePlanConfig, WebAppConfig, attribute_value,
};
pub use paging::{Page, Pager, collect_all, collect_eager};
pub use planner::{ExecutionPlan, PlanError, ResourceTree};
pub use reconciler::{Outcome, ReconcileOptions, RecreatePolicy, Reconciler, decide};
pub use types::{
    Action, Attribute, AttributeValue, Change, ExecuteOptions, ExecuteSummary, Mutability,
};
