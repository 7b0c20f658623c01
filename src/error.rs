//! Error types
//!
//! Every failure, whether it comes from loading libpython, from the host-side
//! JSON codec or from a Python exception, is reported as a single [`Error`]
//! whose `Display` form is `pyexec: <context>: <message>`.

use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Category of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// No libpython candidate could be loaded
    Load,
    /// A required C ABI symbol is missing from the loaded library
    Bind,
    /// Runtime initialization or configuration failed
    Init,
    /// Sub-interpreter, thread-state or lock acquisition failed
    ContextCreation,
    /// Host input could not be represented as JSON, or `json.loads` rejected it
    Encode,
    /// A Python exception was raised while running the snippet
    Execution,
    /// The result could not be brought back as JSON
    Decode,
    /// Code was empty or whitespace only
    EmptyCode,
}

/// An error reported by the execution engine
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("pyexec: {context}: {message}")]
pub struct Error {
    kind: ErrorKind,
    context: String,
    message: String,
}

impl Error {
    pub(crate) fn new(
        kind: ErrorKind,
        context: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Error {
            kind,
            context: context.into(),
            message: message.into(),
        }
    }

    pub(crate) fn empty_code() -> Self {
        Error::new(ErrorKind::EmptyCode, "exec", "empty code")
    }

    /// The category of this error
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// The operation that failed, e.g. `execute python` or `json.dumps`
    pub fn context(&self) -> &str {
        &self.context
    }

    /// The underlying message, usually `str()` of the Python exception
    pub fn message(&self) -> &str {
        &self.message
    }
}
