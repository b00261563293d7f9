//! Consistent log lines for file operations and batch rows.

use std::path::Path;
use std::time::Duration;

/// Log the start of a file operation
pub fn log_operation_start(operation: &str, path: &Path) {
    log::info!("{} {}", operation, path.display());
}

/// Log a finished file operation with the number of items touched
pub fn log_operation_complete(operation: &str, path: &Path, items: usize, elapsed: Option<Duration>) {
    match elapsed {
        Some(duration) => log::info!(
            "Successfully {} {} items at {} in {:?}",
            operation,
            items,
            path.display(),
            duration
        ),
        None => log::info!("Successfully {} {} items at {}", operation, items, path.display()),
    }
}

/// Log a warning, optionally tied to a path
pub fn log_warning(message: &str, path: Option<&Path>) {
    if let Some(path) = path {
        log::warn!("{}: {}", message, path.display());
    } else {
        log::warn!("{message}");
    }
}

/// Log how a parameter row finished
pub fn log_row_outcome(indicator_id: i64, reference_id: Option<i64>, rows: usize, elapsed: Duration) {
    log::debug!(
        "indicator {indicator_id} (reference {reference_id:?}) produced {rows} rates in {elapsed:?}"
    );
}
