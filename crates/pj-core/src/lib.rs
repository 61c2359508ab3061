//! Shared primitives used across the PJAX crates.

pub mod cancel;

use core::fmt;

pub use cancel::Cancellation;
pub use cancel::Cancelled;

/// Result alias used across the workspace.
pub type PjaxResult<T> = Result<T, PjaxError>;

/// Origin of an error inside the navigation pipeline.
///
/// The layer is derived from the first segment of the error code, so callers
/// branch on where a failure came from without matching individual codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorLayer {
    /// User-facing aborts such as supersession by a newer navigation.
    Interface,
    /// Routing decisions: disabled scopes, rejected filters.
    Application,
    /// Failures of the navigation itself after it has been committed.
    Domain,
    /// Anything raised by the supporting crates (DOM, parser, network, script).
    Runtime,
}

impl ErrorLayer {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Interface => "interface",
            Self::Application => "application",
            Self::Domain => "domain",
            Self::Runtime => "runtime",
        }
    }
}

/// Top-level error type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PjaxError {
    pub code: &'static str,
    pub message: String,
}

impl PjaxError {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn layer(&self) -> ErrorLayer {
        match self.code.split('.').next() {
            Some("interface") => ErrorLayer::Interface,
            Some("application") => ErrorLayer::Application,
            Some("domain") => ErrorLayer::Domain,
            _ => ErrorLayer::Runtime,
        }
    }

    /// Re-labels a supporting-crate error as a pipeline error, keeping its text.
    pub fn within(self, code: &'static str) -> Self {
        Self {
            code,
            message: self.message,
        }
    }
}

impl fmt::Display for PjaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for PjaxError {}
