//! Error type for report generation.

use std::path::PathBuf;

/// Reasons a report could not be produced or located.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    /// The report index or settings store failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Building or rendering the PDF document failed.
    #[error("PDF rendering failed: {0}")]
    Pdf(#[from] genpdf::error::Error),

    /// Reading or writing a file under the reports directory failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The share link could not be encoded as a QR code.
    #[error("QR code generation failed: {0}")]
    Qr(#[from] qrcode::types::QrError),

    /// The trend chart could not be embedded.
    #[error("chart rendering failed: {0}")]
    Chart(String),

    /// The rendering task panicked or was cancelled.
    #[error("rendering task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// A filename outside the reports directory was requested.
    #[error("invalid report filename '{0}'")]
    InvalidFilename(String),

    /// The requested artifact does not exist.
    #[error("report '{0}' not found")]
    NotFound(String),
}

impl ReportError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
