//! Plan and diff display - cirrus-specific UI

use colored::{ColoredString, Colorize};
use declarative::{
    Action, Change, Configuration, ExecuteSummary, Outcome, ResourceConfig, ResourceReport,
    TreeReport, attribute_value,
};
use similar::{ChangeTag, TextDiff};

/// One printable line of a plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Row {
    /// A decided action and its summary
    Action { verb: &'static str, text: String },
    /// An attribute difference under an update or recreate
    Detail(String),
    Failure(String),
}

/// Rows for one resource: created parents first, then the resource itself
pub fn rows(report: &ResourceReport) -> Vec<Row> {
    let mut rows = Vec::new();
    match &report.result {
        Ok(outcome) => push_outcome(&mut rows, outcome),
        Err(e) => rows.push(Row::Failure(e.to_string())),
    }
    rows
}

fn push_outcome(rows: &mut Vec<Row>, outcome: &Outcome) {
    for parent in &outcome.prerequisites {
        push_outcome(rows, parent);
    }
    rows.push(Row::Action {
        verb: outcome.action.verb(),
        text: outcome.summary(),
    });
    if matches!(
        outcome.action,
        Action::Update { .. } | Action::Recreate { .. }
    ) {
        for difference in outcome.comparison.differences() {
            rows.push(Row::Detail(difference.to_string()));
        }
    }
}

fn symbol(verb: &str) -> ColoredString {
    match verb {
        "create" => "+".green(),
        "delete" => "-".red(),
        "update" => "~".yellow(),
        "recreate" => "±".magenta(),
        _ => "○".dimmed(),
    }
}

/// Display what a pass did (or would do), grouped by resource group
pub fn display_plan(reports: &[TreeReport], summary: &ExecuteSummary, title: &str) {
    if summary.changed() == 0 && summary.is_success() {
        println!();
        println!("  {} No changes needed", "✓".green());
        return;
    }

    println!();
    println!(
        "┌─ {} ─────────────────────────────────────────┐",
        title.bold()
    );
    println!("│");

    for tree in reports {
        println!("│ {} {}", "resource group".dimmed(), tree.group.bold());
        for report in &tree.resources {
            for row in rows(report) {
                match row {
                    Row::Action { verb: "no-op", text } => {
                        println!("│   {} {}", symbol("no-op"), text.dimmed());
                    }
                    Row::Action { verb, text } => println!("│   {} {}", symbol(verb), text),
                    Row::Detail(text) => println!("│       {}", text.dimmed()),
                    Row::Failure(text) => println!("│   {} {}", "✗".red(), text.red()),
                }
            }
        }
        println!("│");
    }

    println!("├─────────────────────────────────────────────────────┤");
    println!(
        "│ Summary: {} changes ({} create, {} update, {} delete, {} recreate)",
        summary.changed().to_string().bold(),
        summary.created.to_string().green(),
        summary.updated.to_string().yellow(),
        summary.deleted.to_string().red(),
        summary.recreated.to_string().magenta()
    );
    if summary.failed > 0 {
        println!("│          {} failed", summary.failed.to_string().red());
    }
    println!("└─────────────────────────────────────────────────────┘");
}

// ============================================================================
// Text diff
// ============================================================================

/// Observed state trimmed to the attributes `desired` sets
///
/// Attributes left unset in a manifest are "don't care", so showing the
/// provider's values for them would only add noise.
pub fn comparable_view(desired: &Configuration, observed: &Configuration) -> Configuration {
    if !desired.exists() || !observed.exists() {
        return observed.clone();
    }
    let changes: Vec<Change> = desired
        .set_attributes()
        .into_iter()
        .filter_map(|c| {
            attribute_value(observed, &c.attribute).map(|value| Change {
                attribute: c.attribute,
                value,
            })
        })
        .collect();
    desired
        .with_changes(&changes)
        .unwrap_or_else(|_| observed.clone())
}

/// Changed lines going from `observed` to `desired`
pub fn changed_lines(observed: &str, desired: &str) -> Vec<(ChangeTag, String)> {
    TextDiff::from_lines(observed, desired)
        .iter_all_changes()
        .filter(|change| change.tag() != ChangeTag::Equal)
        .map(|change| (change.tag(), change.to_string()))
        .collect()
}

/// Print a unified diff; returns whether anything differed
pub fn show_text_diff(title: &str, observed: &str, desired: &str) -> bool {
    let lines = changed_lines(observed, desired);
    if lines.is_empty() {
        return false;
    }

    println!();
    println!("  {}", title.bold());
    for (tag, line) in lines {
        match tag {
            ChangeTag::Delete => print!("    {}", format!("- {line}").red()),
            ChangeTag::Insert => print!("    {}", format!("+ {line}").green()),
            ChangeTag::Equal => {}
        }
        if !line.ends_with('\n') {
            println!();
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use declarative::{
        ComparisonResult, Difference, Mutability, ReconcileError, ResourceGroupConfig,
        ResourceIdentity, ServicePlanConfig,
    };

    fn outcome(config: Configuration, action: Action, comparison: ComparisonResult) -> Outcome {
        Outcome {
            identity: config.identity(),
            action,
            comparison,
            simulated: true,
            deferred: false,
            state: config,
            prerequisites: Vec::new(),
        }
    }

    #[test]
    fn test_rows_list_parents_first() {
        let group = outcome(
            ResourceGroupConfig::new("rg").into(),
            Action::Create,
            ComparisonResult::Identical,
        );
        let mut plan = outcome(
            ServicePlanConfig::new("rg", "web").into(),
            Action::Create,
            ComparisonResult::Identical,
        );
        plan.prerequisites.push(group);

        let report = ResourceReport {
            identity: plan.identity.clone(),
            description: String::new(),
            result: Ok(plan),
        };
        let rows = rows(&report);
        assert_eq!(rows.len(), 2);
        assert_eq!(
            rows[0],
            Row::Action {
                verb: "create",
                text: "Create resource group rg".into()
            }
        );
    }

    #[test]
    fn test_rows_show_update_details() {
        let difference = Difference {
            attribute: "Capacity".into(),
            desired: Some(3u32.into()),
            observed: Some(1u32.into()),
            mutability: Mutability::Settable,
        };
        let update = outcome(
            ServicePlanConfig::new("rg", "web").into(),
            Action::Update {
                changes: vec![Change::new("Capacity", 3u32)],
            },
            ComparisonResult::Different(vec![difference]),
        );
        let report = ResourceReport {
            identity: update.identity.clone(),
            description: String::new(),
            result: Ok(update),
        };
        let rows = rows(&report);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1], Row::Detail("Capacity: 1 → 3".into()));
    }

    #[test]
    fn test_rows_failure() {
        let identity = ResourceIdentity::web_app("rg", "shop");
        let report = ResourceReport {
            identity: identity.clone(),
            description: String::new(),
            result: Err(ReconcileError::Invalid {
                resource: identity,
                reason: "PlanName must be set".into(),
            }),
        };
        assert!(matches!(rows(&report)[0], Row::Failure(ref text) if text.contains("PlanName")));
    }

    #[test]
    fn test_comparable_view_keeps_only_desired_attributes() {
        let desired: Configuration = ServicePlanConfig::new("rg", "web").with_capacity(2).into();
        let observed: Configuration = ServicePlanConfig::new("rg", "web")
            .with_region("East US")
            .with_pricing_tier("S1")
            .with_capacity(1)
            .into();

        let view = comparable_view(&desired, &observed);
        assert_eq!(
            view,
            Configuration::from(ServicePlanConfig::new("rg", "web").with_capacity(1))
        );
    }

    #[test]
    fn test_comparable_view_absent_is_observed() {
        let desired: Configuration = ResourceGroupConfig::new("rg").with_region("West US").into();
        let observed = Configuration::absent(&desired.identity());
        assert_eq!(comparable_view(&desired, &observed), observed);
    }

    #[test]
    fn test_changed_lines() {
        let lines = changed_lines("a = 1\nb = 2\n", "a = 1\nb = 3\n");
        assert_eq!(
            lines,
            vec![
                (ChangeTag::Delete, "b = 2\n".to_string()),
                (ChangeTag::Insert, "b = 3\n".to_string())
            ]
        );
        assert!(changed_lines("same\n", "same\n").is_empty());
    }
}
