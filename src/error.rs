use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum CaptureError {
    #[error("invalid date/time: {0}")]
    #[diagnostic(help("expected a date as MM/DD/YYYY and a 24-hour time as HH:MM"))]
    InvalidTimestamp(String),

    #[error("start time {0} is not on a 5 minute boundary")]
    #[diagnostic(help("the archive is indexed in 5 minute steps (:00, :05, ... :55)"))]
    InvalidAlignment(String),

    #[error("hours must be between 1 and {max}, got {requested}")]
    InvalidRange { requested: i64, max: u32 },

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("invalid config value: {0}")]
    ConfigInvalid(String),

    #[error("catalog request failed: {0}")]
    CatalogHttp(String),

    #[error("catalog page {page} unavailable: {reason}")]
    PageUnavailable { page: String, reason: String },

    #[error("archive window not available: found {found_secs}s of {required_secs}s ({reason})")]
    #[diagnostic(help("the archive may not reach that far back, or the show has not aired yet"))]
    WindowUnsatisfied {
        found_secs: f64,
        required_secs: f64,
        reason: String,
    },

    #[error("chunk {position} ({locator}) returned status {status}")]
    #[diagnostic(help("chunks already on disk are kept; run the same command again to resume"))]
    DownloadStatus {
        position: usize,
        locator: String,
        status: u16,
    },

    #[error("chunk request failed: {0}")]
    DownloadHttp(String),

    #[error("assembly failed: {0}")]
    #[diagnostic(help("intermediate chunk files were left in place"))]
    Assemble(String),

    #[error("required tool not found: {0}")]
    MissingTool(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}
