// SPDX-License-Identifier: MIT

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use sqlvm_layout::Log;

/// Spinner shown while a blocking call runs; hidden when the log is quiet.
pub fn spinner(log: &Log, message: &str) -> ProgressBar {
    if log.is_quiet() {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    if let Ok(style) =
        ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")
    {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

/// Runs `f` under a spinner and clears it whatever the outcome.
pub fn with_spinner<T>(log: &Log, message: &str, f: impl FnOnce() -> T) -> T {
    let pb = spinner(log, message);
    let out = f();
    pb.finish_and_clear();
    out
}
