//! pyexec - run Python snippets from Rust through a dynamically loaded libpython
//!
//! A snippet is a few lines of Python whose last non-blank line is an
//! expression. The caller passes a JSON-like input mapping; its keys are
//! visible as globals (and the whole mapping as `input`), and the value of
//! the final expression comes back as a [`serde_json::Value`].
//!
//! # Features
//! - libpython is found at runtime (`PYEXEC_LIBPYTHON`, the local `python3`,
//!   or well-known library names), nothing is linked at build time
//! - Every call gets a fresh sub-interpreter and globals dict
//! - Calls may come from any number of threads
//! - Values cross the boundary only as JSON, using Python's own `json` module
//!
//! This is not a sandbox: snippets can do anything Python can.
//!
//! # Example
//! ```ignore
//! use serde_json::json;
//!
//! let result = pyexec::exec("a = x * 2\na + 1", Some(&json!({"x": 20}))).unwrap();
//! assert_eq!(result, json!(41.0));
//! ```

pub mod bridge;
pub mod config;
pub mod context;
pub mod error;
pub mod ffi;
pub mod object;
pub mod runtime;
pub mod split;

pub use config::{Config, Isolation};
pub use context::ExecutionContext;
pub use error::{Error, ErrorKind, Result};
pub use runtime::{Runtime, Snippet, initialize, runtime};
pub use serde_json::Value;
pub use split::CodeUnit;

use serde::Serialize;

/// Run `code` with `input` bound as globals and return its last expression
///
/// Empty code and inputs that do not serialize to a JSON object are rejected
/// before libpython is loaded. The runtime is initialized from the
/// environment on first use; see [`config`].
pub fn exec<I>(code: &str, input: Option<&I>) -> Result<Value>
where
    I: Serialize + ?Sized,
{
    let snippet = Snippet::prepare(code, input)?;
    runtime()?.run(&snippet)
}
