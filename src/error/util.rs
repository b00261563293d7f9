//! Utility functions for error handling
//!
//! Filesystem checks that turn low-level IO failures into errors carrying
//! the path and what the file was needed for.

use std::fs;
use std::io;
use std::path::Path;

use crate::error::{IndicatorError, Result};

/// Open a file, reporting which input it was needed for on failure
pub fn safe_open_file(path: &Path, purpose: &str) -> Result<fs::File> {
    if !path.is_file() {
        return Err(IndicatorError::io(
            path,
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("{purpose}: file not found"),
            ),
        ));
    }

    fs::File::open(path).map_err(|e| {
        let message = match e.kind() {
            io::ErrorKind::PermissionDenied => format!("{purpose}: permission denied"),
            _ => format!("{purpose}: {e}"),
        };
        IndicatorError::io(path, io::Error::new(e.kind(), message))
    })
}

/// Check that a directory exists and is readable
pub fn validate_directory(path: &Path, purpose: &str) -> Result<()> {
    if !path.is_dir() {
        return Err(IndicatorError::io(
            path,
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("{purpose}: directory not found"),
            ),
        ));
    }
    fs::read_dir(path)
        .map(|_| ())
        .map_err(|e| IndicatorError::io(path, e))
}

/// Create a directory and its parents if missing
pub fn ensure_directory(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|e| IndicatorError::io(path, e))
}
