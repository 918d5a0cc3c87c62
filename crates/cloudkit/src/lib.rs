//! # cloudkit
//!
//! Provider-side support for App Service reconciliation.
//!
//! This crate provides:
//! - Static catalogs of regions, pricing tiers, runtime versions and web
//!   containers
//! - A file-backed cloud emulator implementing [`declarative::CloudClient`]
//! - Retry with exponential backoff for transient failures
//!
//! ## Example
//!
//! ```no_run
//! use cloudkit::LocalCloud;
//! use declarative::{CancellationToken, Reconciler, ServicePlanConfig};
//!
//! let cloud = LocalCloud::open("/tmp/cloud.json").expect("Failed to open state");
//! let reconciler = Reconciler::new(&cloud);
//!
//! let plan = ServicePlanConfig::new("shop-rg", "shop-plan")
//!     .with_region("East US")
//!     .with_pricing_tier("S1");
//! let outcome = reconciler
//!     .reconcile(&plan.into(), false, &CancellationToken::new())
//!     .expect("Reconcile failed");
//! println!("{}", outcome.summary());
//! ```
//!
//! ## Retry Logic
//!
//! Reconciliation is idempotent, so a whole pass can be re-run after a
//! transient failure. Configure retry behavior with [`RetryConfig`].
//!
//! ```no_run
//! use cloudkit::{RetryConfig, retry};
//! use std::time::Duration;
//!
//! let config = RetryConfig::new(3, Duration::from_millis(500), 2.0);
//! let value = retry::with_retry(&config, Some(&retry::LogCallback), || {
//!     Ok::<_, declarative::RemoteError>(42)
//! });
//! ```

pub mod backend;
pub mod catalog;
pub mod error;
pub mod retry;
pub mod types;

pub use backend::{DEFAULT_PAGE_SIZE, LocalCloud, default_backend};
pub use error::{Error, Result};
pub use retry::{LogCallback, NoCallback, RetryCallback, Retryable, with_retry};
pub use types::{CloudState, RetryConfig, StoredResource};
