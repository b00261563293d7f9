//! Progress reporting for batch runs, using the indicatif crate.

use indicatif::{ProgressBar, ProgressStyle};

/// Style for the parameter-row progress bar
pub const ROW_PROGRESS_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} rows ({eta}) {msg}";

/// Progress bar over parameter rows
///
/// Hidden when `visible` is false so library callers and tests stay quiet.
#[must_use]
pub fn create_row_progress_bar(length: u64, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(length);
    let style = ProgressStyle::default_bar()
        .template(ROW_PROGRESS_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    pb.set_style(style);
    pb
}

/// Finish a progress bar, leaving `message` on screen
pub fn finish_progress_bar(pb: &ProgressBar, message: &str) {
    pb.finish_with_message(message.to_string());
}
