//! Error types for the field masking library.
//!
//! Only conditions that stop an operation are errors. Runs that cannot be
//! aligned, fields that resolve to nothing and matches pointing past the last
//! page are reported through result structs and `tracing` warnings instead.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for masking operations.
pub type MaskResult<T> = Result<T, MaskError>;

type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

/// Error type for all mapping, locating and redaction operations.
#[derive(Debug, Error)]
pub enum MaskError {
    /// Error occurred while reading or writing files
    #[error("IO error for path '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A required input file (PDF, mapping, layout, markdown) is missing
    #[error("Input not found: '{}'", .path.display())]
    InputNotFound { path: PathBuf },

    /// Input could be read but does not have the expected shape
    #[error("Malformed input in {context}: {reason}")]
    MalformedInput { context: String, reason: String },

    /// Invalid configuration or parameters
    #[error("Invalid input for '{parameter}': {reason}")]
    InvalidInput { parameter: String, reason: String },

    /// Error occurred during PDF processing
    #[error("PDF processing error{}: {message}", page_suffix(.page))]
    PdfProcessing {
        message: String,
        page: Option<usize>,
        #[source]
        source: Option<BoxedSource>,
    },

    /// Backend-specific error (MuPDF, LoPDF, etc.)
    #[error("{backend} backend error: {message}")]
    BackendError {
        backend: String,
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },
}

fn page_suffix(page: &Option<usize>) -> String {
    match page {
        Some(p) => format!(" on page {}", p),
        None => String::new(),
    }
}

impl MaskError {
    /// Builds an `Io` error, turning `NotFound` into `InputNotFound`.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        let path = path.into();
        if source.kind() == io::ErrorKind::NotFound {
            Self::InputNotFound { path }
        } else {
            Self::Io { path, source }
        }
    }

    pub fn malformed(context: impl Into<String>, reason: impl ToString) -> Self {
        Self::MalformedInput {
            context: context.into(),
            reason: reason.to_string(),
        }
    }

    pub fn invalid(parameter: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            parameter: parameter.into(),
            reason: reason.into(),
        }
    }
}

impl From<io::Error> for MaskError {
    fn from(err: io::Error) -> Self {
        Self::BackendError {
            backend: "std::io".to_string(),
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

impl From<lopdf::Error> for MaskError {
    fn from(err: lopdf::Error) -> Self {
        Self::BackendError {
            backend: "LoPDF".to_string(),
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}
