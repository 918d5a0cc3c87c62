//! Value suggestions for manifest attributes

use anyhow::{Result, bail};
use cloudkit::catalog::{self, Stack};
use declarative::{CancellationToken, RUNTIME_OFF, resource_groups as list_resource_groups};

use crate::Context;
use crate::cli::SuggestCommand;
use crate::config::Settings;
use crate::ui;

use super::open_backend;

pub fn run(ctx: &Context, cmd: &SuggestCommand) -> Result<()> {
    match cmd {
        SuggestCommand::Regions => regions(),
        SuggestCommand::PricingTiers => pricing_tiers(),
        SuggestCommand::Runtimes { stack } => runtimes(stack),
        SuggestCommand::WebContainers => web_containers(),
        SuggestCommand::ResourceGroups => resource_groups(ctx),
    }
}

fn regions() -> Result<()> {
    ui::header("Regions");
    for region in catalog::regions() {
        ui::entry(region.display, region.name);
    }
    Ok(())
}

fn pricing_tiers() -> Result<()> {
    ui::header("Pricing tiers");
    for tier in catalog::pricing_tiers() {
        ui::entry(tier.name, &format!("{} {}", tier.tier, tier.sku));
    }
    println!();
    ui::dim("Manifests accept either the tier name or the SKU.");
    Ok(())
}

/// Versions for one stack; `off` entries are labelled as disabling it
fn runtime_entries(stack: Stack) -> Vec<(&'static str, &'static str)> {
    catalog::runtime_versions(stack)
        .iter()
        .map(|&version| {
            let note = if version == RUNTIME_OFF {
                "disables the stack"
            } else if (stack == Stack::NetFramework && version == catalog::DEFAULT_NET_FRAMEWORK)
                || (stack == Stack::Php && version == catalog::DEFAULT_PHP)
            {
                "default"
            } else {
                ""
            };
            (version, note)
        })
        .collect()
}

fn runtimes(stack: &str) -> Result<()> {
    let Some(stack) = Stack::parse(stack) else {
        bail!("Unknown stack '{stack}' (expected net, php, python or java)");
    };

    ui::header(&format!("{stack} versions"));
    for (version, note) in runtime_entries(stack) {
        ui::entry(version, note);
    }
    println!();
    ui::dim(&format!("Set with {} in a [[web_app]] table.", stack.attribute()));
    Ok(())
}

fn web_containers() -> Result<()> {
    ui::header("Java web containers");
    for container in catalog::web_containers() {
        ui::entry(container, "");
    }
    Ok(())
}

fn resource_groups(ctx: &Context) -> Result<()> {
    let settings = Settings::load()?;
    let cloud = open_backend(ctx, &settings)?;
    let cancel = CancellationToken::new();

    ui::header("Resource groups");
    let mut listed = 0;
    for group in list_resource_groups(&cloud, &cancel) {
        println!("  {}", group?);
        listed += 1;
    }
    if listed == 0 {
        ui::dim("(none)");
    }
    Ok(())
}
