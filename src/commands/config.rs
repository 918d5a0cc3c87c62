use anyhow::Result;

use crate::Context;
use crate::cli::ConfigCommand;
use crate::config::{Settings, config_file};
use crate::ui;

pub fn run(ctx: &Context, cmd: &ConfigCommand) -> Result<()> {
    match cmd {
        ConfigCommand::Show => show(ctx),
    }
}

fn show(ctx: &Context) -> Result<()> {
    ui::header("Configuration");

    let path = config_file()?;
    let settings = Settings::load_from(&path)?;

    println!();
    let status = if path.exists() { "" } else { " (not found, using defaults)" };
    ui::kv("Config file", &format!("{}{status}", path.display()));
    ui::kv(
        "State file",
        &settings.state_path(ctx.state.as_deref()).display().to_string(),
    );
    if ctx.state.is_some() {
        ui::dim("State file overridden by --state or CIRRUS_STATE");
    }
    ui::kv("Jobs", &settings.jobs.to_string());
    ui::kv("Page size", &settings.page_size.to_string());
    ui::kv(
        "Recreate",
        match settings.recreate {
            declarative::RecreatePolicy::SamePass => "same-pass",
            declarative::RecreatePolicy::NextPass => "next-pass",
        },
    );

    ui::section("Retry");
    let retry = &settings.retry;
    ui::kv("Max attempts", &retry.max_attempts.to_string());
    ui::kv("Base delay", &format!("{}ms", retry.base_delay_ms));
    ui::kv("Backoff factor", &retry.backoff_factor.to_string());
    ui::kv("Max delay", &format!("{}ms", retry.max_delay_ms));

    if ctx.verbose > 0 {
        ui::section("Effective settings (TOML)");
        println!("{}", toml::to_string_pretty(&settings)?.trim_end());
    }
    Ok(())
}
