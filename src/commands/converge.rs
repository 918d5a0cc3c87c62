//! Declarative commands
//!
//! - `plan` - Show what apply would change
//! - `apply` - Make remote state match the manifest
//! - `collect` - Report observed state in manifest form
//! - `diff` - Desired vs observed state as a text diff

use anyhow::{Context as AnyhowContext, Result, bail};
use colored::Colorize;
use declarative::{
    CancellationToken, Configuration, ExecutionPlan, Reconciler, ResourceConfig, summarize,
};
use std::time::Duration;

use crate::Context;
use crate::cli::{ApplyArgs, CollectArgs, ManifestArgs, OutputFormat};
use crate::config::Settings;
use crate::engine::differ::{comparable_view, display_plan, show_text_diff};
use crate::engine::executor::{confirm_proceed, print_summary};
use crate::engine::{ApplyProgress, RunOptions, Watchdog, converge};
use crate::manifest::{self, Manifest};
use crate::ui;

use super::{open_backend, reconciler};

// ============================================================================
// Loading
// ============================================================================

/// Load, validate and filter the manifest into an execution plan
fn load_plan(ctx: &Context, args: &ManifestArgs) -> Result<ExecutionPlan> {
    let manifest = Manifest::load(&args.path)?;
    let mut configs = manifest.configurations();

    if !args.no_validate {
        let (valid, issues) = manifest::partition(configs);
        if !issues.is_empty() {
            for issue in &issues {
                ui::error(&issue.to_string());
            }
            if !ctx.quiet {
                ui::warn(&format!(
                    "{} problem(s) found; affected resources will be skipped",
                    issues.len()
                ));
            }
        }
        configs = valid;
    }

    let plan = ExecutionPlan::from_configs(configs)
        .with_context(|| format!("Invalid manifest {}", args.path.display()))?;
    Ok(plan.filter_by_target(args.target.as_deref()))
}

fn run_options(settings: &Settings, jobs: Option<usize>, simulation: bool) -> RunOptions {
    RunOptions {
        simulation,
        jobs: settings.jobs(jobs),
        retry: settings.retry.to_config(),
    }
}

/// Every desired configuration, parents first
fn desired(plan: &ExecutionPlan) -> Vec<&Configuration> {
    plan.trees().iter().flat_map(|t| t.ordered()).collect()
}

// ============================================================================
// Plan
// ============================================================================

pub fn plan(ctx: &Context, args: &ManifestArgs) -> Result<()> {
    let settings = Settings::load()?;
    let plan = load_plan(ctx, args)?;
    if plan.is_empty() {
        ui::info("No resources to plan.");
        return Ok(());
    }

    let cloud = open_backend(ctx, &settings)?;
    let reconciler = reconciler(&cloud, &settings);
    let reports = converge(
        &reconciler,
        &plan,
        &run_options(&settings, None, true),
        &CancellationToken::new(),
        &ApplyProgress::hidden(),
    )?;

    let summary = summarize(&reports);
    display_plan(&reports, &summary, "Execution Plan");

    if !summary.is_success() {
        bail!("{} resource(s) cannot be converged", summary.failed);
    }
    Ok(())
}

// ============================================================================
// Apply
// ============================================================================

pub fn apply(ctx: &Context, args: &ApplyArgs) -> Result<()> {
    let settings = Settings::load()?;
    let plan = load_plan(ctx, &args.manifest)?;
    if plan.is_empty() {
        ui::info("No resources to apply.");
        return Ok(());
    }

    let cloud = open_backend(ctx, &settings)?;
    let reconciler = reconciler(&cloud, &settings);

    // 1. Simulated pass: show what will change
    let preview = converge(
        &reconciler,
        &plan,
        &run_options(&settings, args.jobs, true),
        &CancellationToken::new(),
        &ApplyProgress::hidden(),
    )?;
    let preview_summary = summarize(&preview);
    display_plan(&preview, &preview_summary, "Execution Plan");

    if preview_summary.changed() == 0 {
        if !preview_summary.is_success() {
            bail!("{} resource(s) cannot be converged", preview_summary.failed);
        }
        return Ok(());
    }

    // 2. Confirm (unless --yes)
    if !args.yes && !console::user_attended() {
        bail!("Not running in a terminal; pass --yes to apply without confirmation");
    }
    if !args.yes && !confirm_proceed()? {
        println!();
        println!("  {} Aborted", "✗".red());
        return Ok(());
    }

    // 3. Real pass
    let cancel = CancellationToken::new();
    let _watchdog = args
        .timeout
        .map(|secs| Watchdog::arm(Duration::from_secs(secs), cancel.clone()));
    let progress = if ctx.quiet {
        ApplyProgress::hidden()
    } else {
        ApplyProgress::bar()
    };

    println!();
    println!(
        "  {} Converging {} resource(s) in {} resource group(s)...",
        "→".cyan(),
        plan.total_resources(),
        plan.trees().len()
    );
    let reports = converge(
        &reconciler,
        &plan,
        &run_options(&settings, args.jobs, false),
        &cancel,
        &progress,
    )?;

    // 4. Summary
    for report in reports.iter().flat_map(|t| &t.resources) {
        match &report.result {
            Ok(outcome) if outcome.changed() && ctx.verbose > 0 => {
                for line in outcome.lines() {
                    ui::dim(&line);
                }
            }
            Ok(_) => {}
            Err(e) => ui::error(&e.to_string()),
        }
    }

    let summary = summarize(&reports);
    print_summary(&summary);

    if summary.cancelled > 0 {
        bail!("Apply cancelled; run it again to finish converging");
    }
    if !summary.is_success() {
        bail!("{} resource(s) failed", summary.failed);
    }
    Ok(())
}

// ============================================================================
// Collect
// ============================================================================

/// Observed state of every resource the plan names
fn observe_all(
    reconciler: &Reconciler<'_>,
    plan: &ExecutionPlan,
    cancel: &CancellationToken,
) -> Result<Vec<(Configuration, Configuration)>> {
    desired(plan)
        .into_iter()
        .map(|config| {
            let observed = reconciler.collect(config, cancel)?;
            Ok::<_, anyhow::Error>((config.clone(), observed))
        })
        .collect()
}

pub fn collect(ctx: &Context, args: &CollectArgs) -> Result<()> {
    let settings = Settings::load()?;
    let plan = load_plan(ctx, &args.manifest)?;
    let cloud = open_backend(ctx, &settings)?;
    let reconciler = reconciler(&cloud, &settings);

    let observed = observe_all(&reconciler, &plan, &CancellationToken::new())?;
    let manifest = Manifest::from_configurations(observed.iter().map(|(_, o)| o));

    let rendered = match args.format {
        OutputFormat::Toml => format!(
            "# Observed state, collected {}\n\n{}",
            chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            manifest.to_toml()?
        ),
        OutputFormat::Json => serde_json::to_string_pretty(&manifest)?,
    };
    println!("{}", rendered.trim_end());
    Ok(())
}

// ============================================================================
// Diff
// ============================================================================

pub fn diff(ctx: &Context, args: &ManifestArgs) -> Result<()> {
    let settings = Settings::load()?;
    let plan = load_plan(ctx, args)?;
    let cloud = open_backend(ctx, &settings)?;
    let reconciler = reconciler(&cloud, &settings);

    let mut drifted = 0;
    for (desired, observed) in observe_all(&reconciler, &plan, &CancellationToken::new())? {
        let view = comparable_view(&desired, &observed);
        let observed_text = Manifest::from_configurations([&view]).to_toml()?;
        let desired_text = Manifest::from_configurations([&desired]).to_toml()?;
        if show_text_diff(&desired.identity().to_string(), &observed_text, &desired_text) {
            drifted += 1;
        }
    }

    println!();
    if drifted == 0 {
        ui::success("Observed state matches the manifest");
    } else {
        ui::info(&format!("{drifted} resource(s) differ from the manifest"));
    }
    Ok(())
}
