//! Execution engine - converges resource trees in parallel

use crate::context::{CancellationToken, PassContext, ProgressCallback};
use crate::error::{ReconcileError, Step};
use crate::identity::ResourceIdentity;
use crate::model::ResourceConfig;
use crate::planner::{ExecutionPlan, ResourceTree};
use crate::reconciler::{Outcome, Reconciler};
use crate::types::{ExecuteOptions, ExecuteSummary};
use anyhow::Result;
use log::{debug, warn};
use rayon::prelude::*;

/// Result of converging one resource in a batch
#[derive(Debug, Clone)]
pub struct ResourceReport {
    pub identity: ResourceIdentity,
    /// The desired configuration, described
    pub description: String,
    pub result: Result<Outcome, ReconcileError>,
}

impl ResourceReport {
    /// One-line summary of what happened
    pub fn summary(&self) -> String {
        match &self.result {
            Ok(outcome) => outcome.lines().join("; "),
            Err(e) => e.to_string(),
        }
    }
}

/// Results for every resource of one tree, in convergence order
#[derive(Debug, Clone)]
pub struct TreeReport {
    pub group: String,
    pub resources: Vec<ResourceReport>,
}

impl TreeReport {
    pub fn has_failures(&self) -> bool {
        self.resources.iter().any(|r| r.result.is_err())
    }

    /// Whether every failure in the tree is worth another attempt
    pub fn is_retryable(&self) -> bool {
        self.has_failures()
            && self
                .resources
                .iter()
                .filter_map(|r| r.result.as_ref().err())
                .all(ReconcileError::is_retryable)
    }
}

/// Tally of every resource across tree reports
pub fn summarize(reports: &[TreeReport]) -> ExecuteSummary {
    let mut summary = ExecuteSummary::default();
    for resource in reports.iter().flat_map(|t| &t.resources) {
        summary.add_result(&resource.result);
    }
    summary
}

/// Converge one tree, one resource at a time, in a single pass
///
/// A failed resource does not stop the rest of the tree: its children fail
/// on their own with a missing dependency. Once cancellation is requested
/// the remaining resources are reported as cancelled without being read.
pub fn execute_tree(
    reconciler: &Reconciler<'_>,
    tree: &ResourceTree,
    simulation: bool,
    cancel: &CancellationToken,
    progress: &dyn ProgressCallback,
) -> TreeReport {
    debug!("Converging resource group {}", tree.group());
    let mut pass = PassContext::new(simulation, cancel);
    let mut resources = Vec::with_capacity(tree.len());

    for desired in tree.ordered() {
        let identity = desired.identity();
        let description = desired.describe();

        if cancel.is_cancelled() {
            resources.push(ResourceReport {
                result: Err(ReconcileError::Cancelled {
                    resource: identity.clone(),
                    step: Step::Observe,
                    issued: pass.issued().to_vec(),
                }),
                identity,
                description,
            });
            continue;
        }

        progress.on_resource_start(&identity, &description);
        let result = reconciler.reconcile_in(desired, &mut pass);
        if let Err(e) = &result {
            warn!("{e}");
        }

        let report = ResourceReport {
            identity,
            description,
            result,
        };
        progress.on_resource_complete(&report.identity, &report.summary(), report.result.is_ok());
        resources.push(report);
    }

    TreeReport {
        group: tree.group().to_string(),
        resources,
    }
}

/// Run every tree of a plan through `run_tree`, `jobs` trees at a time
///
/// Reports come back in plan order regardless of completion order.
pub fn execute_with<F>(
    plan: &ExecutionPlan,
    jobs: usize,
    progress: &dyn ProgressCallback,
    run_tree: F,
) -> Result<Vec<TreeReport>>
where
    F: Fn(&ResourceTree) -> TreeReport + Sync,
{
    if plan.is_empty() {
        return Ok(Vec::new());
    }

    progress.on_batch_start(plan.trees().len(), plan.total_resources());

    let reports = if jobs <= 1 || plan.trees().len() == 1 {
        plan.trees().iter().map(&run_tree).collect()
    } else {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create thread pool: {}", e))?;
        pool.install(|| plan.trees().par_iter().map(&run_tree).collect())
    };

    progress.on_batch_complete();
    Ok(reports)
}

/// Converge a whole plan
pub fn execute(
    reconciler: &Reconciler<'_>,
    plan: &ExecutionPlan,
    opts: &ExecuteOptions,
    cancel: &CancellationToken,
    progress: &dyn ProgressCallback,
) -> Result<Vec<TreeReport>> {
    execute_with(plan, opts.jobs, progress, |tree| {
        execute_tree(reconciler, tree, opts.simulation, cancel, progress)
    })
}
