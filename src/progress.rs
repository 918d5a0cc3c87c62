//! Progress indicators for the cirrus CLI.

use indicatif::{ProgressBar, ProgressStyle};

/// Bar counting resources, with the latest resource as its message
pub fn bar(len: u64, prefix: &str) -> ProgressBar {
    let pb = ProgressBar::new(len);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} {prefix:.bold} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .map_or_else(|_| ProgressStyle::default_bar(), |s| s.progress_chars("=>-"));
    pb.set_style(style);
    pb.set_prefix(prefix.to_string());
    pb
}
