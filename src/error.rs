//! Error and diagnostic types.

use thiserror::Error;

/// Result type for conversion operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Fatal conversion errors.
///
/// Most problems encountered while converting (missing images, malformed
/// tables, rejected elements) are *not* errors; they are recorded as
/// [`Diagnostic`]s and the conversion carries on.  An `Error` is only
/// returned when nothing useful can be produced at all.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O failure reading input or writing the output package.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The document sink failed in a way that prevents producing output.
    #[error("document sink error: {0}")]
    Sink(String),

    /// Failure assembling the output container file.
    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

/// How serious a recorded diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Something was skipped or approximated; output is still well formed.
    Warning,
    /// An element was lost because the sink rejected it.
    Error,
}

/// A single non-fatal conversion issue.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// Severity of the issue.
    pub severity: Severity,
    /// Human-readable description.
    pub message: String,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.severity {
            Severity::Warning => write!(f, "warning: {}", self.message),
            Severity::Error => write!(f, "error: {}", self.message),
        }
    }
}

/// The caller-visible warning channel: everything non-fatal that happened
/// during one conversion, in document order.
#[derive(Debug, Default)]
pub struct Report {
    diagnostics: Vec<Diagnostic>,
}

impl Report {
    /// Create an empty report.
    pub fn new() -> Report {
        Report::default()
    }

    /// Record a warning (element skipped or clamped).
    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        log::warn!("{}", message);
        self.diagnostics.push(Diagnostic {
            severity: Severity::Warning,
            message,
        });
    }

    /// Record a per-element failure propagated from the sink.
    pub fn element_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        log::error!("{}", message);
        self.diagnostics.push(Diagnostic {
            severity: Severity::Error,
            message,
        });
    }

    /// True if the conversion completed without recording anything.
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// The recorded diagnostics, oldest first.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Move the diagnostics out of the report.
    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}
