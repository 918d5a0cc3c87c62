pub mod config;
pub mod converge;
pub mod suggest;

use anyhow::{Context as AnyhowContext, Result};
use cloudkit::LocalCloud;
use declarative::{ReconcileOptions, Reconciler};

use crate::Context;
use crate::config::Settings;

/// Open the emulator backend the settings (or `--state`) point at
pub fn open_backend(ctx: &Context, settings: &Settings) -> Result<LocalCloud> {
    let path = settings.state_path(ctx.state.as_deref());
    log::debug!("Using state file {}", path.display());
    cloudkit::default_backend(&path, settings.page_size)
        .with_context(|| format!("Could not open state file {}", path.display()))
}

pub fn reconciler<'a>(cloud: &'a LocalCloud, settings: &Settings) -> Reconciler<'a> {
    Reconciler::with_options(
        cloud,
        ReconcileOptions {
            recreate: settings.recreate,
        },
    )
}
