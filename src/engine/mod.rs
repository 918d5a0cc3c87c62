//! Execution engine for cirrus
//!
//! The engine orchestrates:
//! 1. Planning - a simulated pass over every resource tree
//! 2. Diffing - display of planned actions and attribute differences
//! 3. Executing - the real pass, with per-tree retry, progress and timeout

pub mod differ;
pub mod executor;

pub use executor::{ApplyProgress, RunOptions, Watchdog, converge};
