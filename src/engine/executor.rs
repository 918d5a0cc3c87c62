//! Execution engine - cirrus-specific executor with UI integration

use anyhow::Result;
use cloudkit::RetryConfig;
use cloudkit::retry::{LogCallback, Retryable, with_retry};
use colored::Colorize;
use declarative::{
    CancellationToken, ExecuteSummary, ExecutionPlan, ProgressCallback, Reconciler,
    ResourceIdentity, TreeReport, execute_tree, execute_with,
};
use indicatif::ProgressBar;
use std::fmt;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::progress;

/// Options for one converge run
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Compute actions without mutating anything
    pub simulation: bool,
    /// Number of resource groups converged in parallel
    pub jobs: usize,
    /// Per-tree retry of transient failures
    pub retry: RetryConfig,
}

/// Progress bar fed by the engine's callbacks
pub struct ApplyProgress {
    pb: ProgressBar,
}

impl ApplyProgress {
    pub fn bar() -> Self {
        Self {
            pb: progress::bar(0, "Applying"),
        }
    }

    pub fn hidden() -> Self {
        Self {
            pb: ProgressBar::hidden(),
        }
    }

    /// Take back the ticks of a tree that is about to run again
    fn rewind(&self, resources: usize) {
        self.pb.dec(resources as u64);
    }
}

impl ProgressCallback for ApplyProgress {
    fn on_batch_start(&self, _trees: usize, resources: usize) {
        self.pb.set_length(resources as u64);
    }

    fn on_resource_start(&self, identity: &ResourceIdentity, _description: &str) {
        self.pb.set_message(format!("→ {identity}"));
    }

    fn on_resource_complete(&self, identity: &ResourceIdentity, _summary: &str, success: bool) {
        let symbol = if success { "✓" } else { "✗" };
        self.pb.set_message(format!("{symbol} {identity}"));
        self.pb.inc(1);
    }

    fn on_batch_complete(&self) {
        self.pb.finish_and_clear();
    }
}

/// A tree report whose failures are all worth another attempt
struct FailedTree(TreeReport);

impl fmt::Display for FailedTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let first = self
            .0
            .resources
            .iter()
            .find_map(|r| r.result.as_ref().err());
        match first {
            Some(e) => write!(f, "resource group {}: {e}", self.0.group),
            None => write!(f, "resource group {}", self.0.group),
        }
    }
}

impl Retryable for FailedTree {
    fn is_retryable(&self) -> bool {
        self.0.is_retryable()
    }
}

/// Converge every tree of a plan, re-running trees that failed transiently
///
/// Re-running a tree is safe: resources that already converged are no-ops
/// on the next attempt.
pub fn converge(
    reconciler: &Reconciler<'_>,
    plan: &ExecutionPlan,
    opts: &RunOptions,
    cancel: &CancellationToken,
    progress: &ApplyProgress,
) -> Result<Vec<TreeReport>> {
    execute_with(plan, opts.jobs, progress, |tree| {
        let attempt = || {
            let report = execute_tree(reconciler, tree, opts.simulation, cancel, progress);
            if report.is_retryable() && !cancel.is_cancelled() {
                progress.rewind(tree.len());
                Err(FailedTree(report))
            } else {
                Ok(report)
            }
        };
        match with_retry(&opts.retry, Some(&LogCallback), attempt) {
            Ok(report) | Err(FailedTree(report)) => report,
        }
    })
}

// ============================================================================
// Timeout
// ============================================================================

/// Cancels a token once a deadline passes, unless disarmed first
pub struct Watchdog {
    disarm: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Watchdog {
    pub fn arm(timeout: Duration, cancel: CancellationToken) -> Self {
        let (tx, rx) = mpsc::channel::<()>();
        let handle = thread::spawn(move || {
            if let Err(RecvTimeoutError::Timeout) = rx.recv_timeout(timeout) {
                log::warn!("Timed out after {}s, cancelling", timeout.as_secs());
                cancel.cancel();
            }
        });
        Self {
            disarm: Some(tx),
            handle: Some(handle),
        }
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        // Dropping the sender wakes the thread with Disconnected
        self.disarm.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

// ============================================================================
// Confirmation and summary
// ============================================================================

/// Confirm with user
pub fn confirm_proceed() -> Result<bool> {
    use dialoguer::Confirm;

    let confirmed = Confirm::new()
        .with_prompt("Continue?")
        .default(true)
        .interact()?;

    Ok(confirmed)
}

/// Print final summary
pub fn print_summary(summary: &ExecuteSummary) {
    println!();
    if summary.is_success() {
        println!("  {} Resources converged successfully!", "✓".green().bold());
    } else {
        println!("  {} Resources converged with errors", "⚠".yellow().bold());
    }

    if summary.created > 0 {
        println!("    • {} resources created", summary.created);
    }
    if summary.updated > 0 {
        println!("    • {} resources updated", summary.updated);
    }
    if summary.deleted > 0 {
        println!("    • {} resources deleted", summary.deleted);
    }
    if summary.recreated > 0 {
        println!("    • {} resources recreated", summary.recreated);
    }
    if summary.deferred > 0 {
        println!(
            "    • {} {} (run apply again to create the replacements)",
            summary.deferred,
            "recreates deferred".yellow()
        );
    }
    if summary.no_change > 0 {
        println!("    • {} resources already up to date", summary.no_change);
    }
    if summary.cancelled > 0 {
        println!("    • {} {} cancelled", summary.cancelled, "resources".yellow());
    }
    if summary.failed > 0 {
        println!("    • {} {} failed", summary.failed, "resources".red());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cloudkit::LocalCloud;
    use declarative::{
        CloudClient, Configuration, ResourceGroupConfig, ServicePlanConfig, WebAppConfig,
        summarize,
    };
    use std::time::Instant;

    fn options() -> RunOptions {
        RunOptions {
            simulation: false,
            jobs: 2,
            retry: RetryConfig {
                max_attempts: 3,
                base_delay: Duration::from_millis(1),
                backoff_factor: 1.0,
                max_delay: Duration::from_millis(5),
            },
        }
    }

    fn site(group: &str) -> Vec<Configuration> {
        vec![
            ServicePlanConfig::new(group, "plan")
                .with_region("East US")
                .with_pricing_tier("S1")
                .into(),
            WebAppConfig::new(group, "site")
                .on_plan("plan")
                .with_php("7.1")
                .into(),
        ]
    }

    #[test]
    fn test_converge_creates_every_tree() {
        let cloud = LocalCloud::in_memory();
        let reconciler = Reconciler::new(&cloud);
        let plan =
            ExecutionPlan::from_configs(site("alpha").into_iter().chain(site("beta"))).unwrap();

        let reports = converge(
            &reconciler,
            &plan,
            &options(),
            &CancellationToken::new(),
            &ApplyProgress::hidden(),
        )
        .unwrap();

        let summary = summarize(&reports);
        assert!(summary.is_success());
        // Two groups auto-created, plus a plan and an app each
        assert_eq!(summary.created, 6);
        assert_eq!(cloud.all_resources().len(), 6);
    }

    #[test]
    fn test_second_converge_is_noop() {
        let cloud = LocalCloud::in_memory();
        let reconciler = Reconciler::new(&cloud);
        let plan = ExecutionPlan::from_configs(site("alpha")).unwrap();
        let cancel = CancellationToken::new();

        converge(&reconciler, &plan, &options(), &cancel, &ApplyProgress::hidden()).unwrap();
        let reports =
            converge(&reconciler, &plan, &options(), &cancel, &ApplyProgress::hidden()).unwrap();

        let summary = summarize(&reports);
        assert_eq!(summary.changed(), 0);
        assert_eq!(summary.no_change, 2);
    }

    #[test]
    fn test_absent_group_with_present_plan_settles() {
        let cloud = LocalCloud::in_memory();
        let reconciler = Reconciler::new(&cloud);
        let cancel = CancellationToken::new();
        cloud
            .create(&ResourceGroupConfig::new("rg").with_region("East US").into(), &cancel)
            .unwrap();

        let declared: Vec<Configuration> = vec![
            ResourceGroupConfig::absent("rg").into(),
            ServicePlanConfig::new("rg", "plan")
                .with_region("East US")
                .with_pricing_tier("S1")
                .into(),
        ];
        assert!(ExecutionPlan::from_configs(declared.clone()).is_err());

        let (valid, issues) = crate::manifest::partition(declared);
        assert_eq!(issues.len(), 1);
        let plan = ExecutionPlan::from_configs(valid).unwrap();

        let first =
            converge(&reconciler, &plan, &options(), &cancel, &ApplyProgress::hidden()).unwrap();
        assert_eq!(summarize(&first).deleted, 1);

        let second =
            converge(&reconciler, &plan, &options(), &cancel, &ApplyProgress::hidden()).unwrap();
        assert_eq!(summarize(&second).changed(), 0);
        assert!(cloud.all_resources().is_empty());
    }

    #[test]
    fn test_region_spelling_converges_to_noop() {
        let cloud = LocalCloud::in_memory();
        let reconciler = Reconciler::new(&cloud);
        let cancel = CancellationToken::new();

        let first = ExecutionPlan::from_configs(site("alpha")).unwrap();
        converge(&reconciler, &first, &options(), &cancel, &ApplyProgress::hidden()).unwrap();

        let respelled = ExecutionPlan::from_configs([
            Configuration::from(
                ServicePlanConfig::new("alpha", "plan")
                    .with_region("eastus")
                    .with_pricing_tier("StandardS1"),
            ),
            WebAppConfig::new("alpha", "site")
                .on_plan("plan")
                .with_php("7.1")
                .into(),
        ])
        .unwrap();
        let reports =
            converge(&reconciler, &respelled, &options(), &cancel, &ApplyProgress::hidden())
                .unwrap();

        let summary = summarize(&reports);
        assert_eq!(summary.changed(), 0);
        assert_eq!(summary.no_change, 2);
    }

    #[test]
    fn test_simulation_leaves_cloud_untouched() {
        let cloud = LocalCloud::in_memory();
        let reconciler = Reconciler::new(&cloud);
        let plan = ExecutionPlan::from_configs(site("alpha")).unwrap();
        let opts = RunOptions {
            simulation: true,
            ..options()
        };

        let reports = converge(
            &reconciler,
            &plan,
            &opts,
            &CancellationToken::new(),
            &ApplyProgress::hidden(),
        )
        .unwrap();

        assert_eq!(summarize(&reports).created, 3);
        assert!(cloud.all_resources().is_empty());
    }

    #[test]
    fn test_missing_dependency_is_not_retried() {
        let cloud = LocalCloud::in_memory();
        let reconciler = Reconciler::new(&cloud);
        let app: Configuration = WebAppConfig::new("rg", "site").on_plan("plan").into();
        let plan = ExecutionPlan::from_configs([app]).unwrap();

        let started = Instant::now();
        let opts = RunOptions {
            retry: RetryConfig {
                base_delay: Duration::from_secs(5),
                ..options().retry
            },
            ..options()
        };
        let reports = converge(
            &reconciler,
            &plan,
            &opts,
            &CancellationToken::new(),
            &ApplyProgress::hidden(),
        )
        .unwrap();

        assert_eq!(summarize(&reports).failed, 1);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_cancelled_token_skips_everything() {
        let cloud = LocalCloud::in_memory();
        let reconciler = Reconciler::new(&cloud);
        let plan = ExecutionPlan::from_configs([ResourceGroupConfig::new("rg")
            .with_region("West US")
            .into()])
        .unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let reports =
            converge(&reconciler, &plan, &options(), &cancel, &ApplyProgress::hidden()).unwrap();

        assert_eq!(summarize(&reports).cancelled, 1);
        assert!(cloud.all_resources().is_empty());
    }

    #[test]
    fn test_watchdog_fires_after_timeout() {
        let cancel = CancellationToken::new();
        let watchdog = Watchdog::arm(Duration::from_millis(10), cancel.clone());
        thread::sleep(Duration::from_millis(200));
        assert!(cancel.is_cancelled());
        drop(watchdog);
    }

    #[test]
    fn test_watchdog_disarmed_on_drop() {
        let cancel = CancellationToken::new();
        let watchdog = Watchdog::arm(Duration::from_secs(60), cancel.clone());
        drop(watchdog);
        assert!(!cancel.is_cancelled());
    }
}
