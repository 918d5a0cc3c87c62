//! Cloud backends.
//!
//! Every backend implements [`declarative::CloudClient`], so the engine and
//! the CLI never depend on which one is in use.

pub mod local;

pub use local::{DEFAULT_PAGE_SIZE, LocalCloud};

use crate::error::Result;
use std::path::Path;

/// Open the default backend: the file-backed emulator at `state_file`.
pub fn default_backend(state_file: &Path, page_size: usize) -> Result<LocalCloud> {
    Ok(LocalCloud::open(state_file)?.with_page_size(page_size))
}
