use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors raised before or while assembling a scan. Per-file parse
/// failures are not represented here; those files are skipped.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("path '{}' does not exist", .0.display())]
    PathNotFound(PathBuf),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to access '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
