//! The process-wide Python runtime
//!
//! libpython is loaded, bound and initialized at most once per process. The
//! first caller performs the work; every other caller, concurrent or later,
//! gets the same [`Runtime`] or a clone of the same initialization error.
//! There is no teardown: the runtime lives until the process exits.

use std::path::Path;

use once_cell::sync::OnceCell;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, instrument, warn};

use crate::bridge;
use crate::config::{Config, Isolation};
use crate::context::ExecutionContext;
use crate::error::{Error, ErrorKind, Result};
use crate::ffi::{Api, LoadedLibrary, loader};
use crate::split::{self, CodeUnit};

static RUNTIME: OnceCell<std::result::Result<Runtime, Error>> = OnceCell::new();

/// The loaded libpython and its function table
pub struct Runtime {
    // `api` points into `library`, which must outlive it.
    api: Api,
    library: LoadedLibrary,
    config: Config,
}

/// Get the runtime, initializing it from the environment on first use
pub fn runtime() -> Result<&'static Runtime> {
    get_or_init(Config::from_env)
}

/// Initialize the runtime with an explicit configuration
///
/// Only the first initialization in a process takes effect. If the runtime
/// already exists, `config` is ignored and the existing runtime is returned.
pub fn initialize(config: Config) -> Result<&'static Runtime> {
    let requested = config.clone();
    let rt = get_or_init(move || Ok(config))?;
    if rt.config != requested {
        warn!(ignored = ?requested, "runtime already initialized, configuration ignored");
    }
    Ok(rt)
}

fn get_or_init<F>(config: F) -> Result<&'static Runtime>
where
    F: FnOnce() -> Result<Config>,
{
    RUNTIME
        .get_or_init(|| config().and_then(Runtime::new))
        .as_ref()
        .map_err(Clone::clone)
}

impl Runtime {
    fn new(config: Config) -> Result<Self> {
        let library = loader::load(&config)?;
        let api = Api::bind(library.library())?;

        unsafe {
            if (api.py_is_initialized)() == 0 {
                (api.py_initialize)();
                if (api.py_is_initialized)() == 0 {
                    return Err(Error::new(
                        ErrorKind::Init,
                        "initialize",
                        "Py_Initialize did not initialize the interpreter",
                    ));
                }
                // Drop the lock Py_Initialize left with this thread so that
                // any thread can enter a context.
                (api.py_eval_save_thread)();
                debug!(path = %library.path().display(), "initialized python");
            } else {
                debug!(path = %library.path().display(), "python already initialized by host");
            }
        }

        Ok(Runtime { api, library, config })
    }

    /// The bound function table
    pub fn api(&self) -> &Api {
        &self.api
    }

    /// The path libpython was loaded from
    pub fn library(&self) -> &Path {
        self.library.path()
    }

    /// Isolation strategy used for every call
    pub fn isolation(&self) -> Isolation {
        self.config.isolation
    }

    /// The configuration the runtime was built with
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run a prepared snippet in a fresh execution context
    #[instrument(
        skip_all,
        fields(
            statements = snippet.unit.statements.len(),
            expression = %snippet.unit.expression,
        )
    )]
    pub fn run(&self, snippet: &Snippet) -> Result<Value> {
        let text = {
            let ctx = ExecutionContext::enter(&self.api, self.isolation())?;
            ctx.execute(&snippet.unit, &snippet.input)?
        };
        bridge::decode_result(&text)
    }

    /// Prepare and run `code` with `input`
    pub fn exec<I>(&self, code: &str, input: Option<&I>) -> Result<Value>
    where
        I: Serialize + ?Sized,
    {
        self.run(&Snippet::prepare(code, input)?)
    }
}

/// Code and input checked and encoded, ready to run
#[derive(Debug, Clone, PartialEq)]
pub struct Snippet {
    unit: CodeUnit,
    input: Map<String, Value>,
}

impl Snippet {
    /// Reject empty code, encode the input and split the code
    ///
    /// Nothing here touches Python, so these failures never need a runtime.
    pub fn prepare<I>(code: &str, input: Option<&I>) -> Result<Self>
    where
        I: Serialize + ?Sized,
    {
        let code = code.trim();
        if code.is_empty() {
            return Err(Error::empty_code());
        }
        let input = bridge::encode_input(input)?;
        Ok(Snippet {
            unit: split::split(code),
            input,
        })
    }

    /// The split code
    pub fn unit(&self) -> &CodeUnit {
        &self.unit
    }

    /// The encoded input mapping
    pub fn input(&self) -> &Map<String, Value> {
        &self.input
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_prepare_rejects_empty() {
        let err = Snippet::prepare::<Value>("", None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EmptyCode);

        let err = Snippet::prepare::<Value>(" \n\t\n", None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EmptyCode);
    }

    #[test]
    fn test_prepare_splits_and_encodes() {
        let snippet = Snippet::prepare("a = x\n\na * 2\n\n", Some(&json!({"x": 4}))).unwrap();
        assert_eq!(snippet.unit().statements, "a = x\n");
        assert_eq!(snippet.unit().expression, "a * 2");
        assert_eq!(snippet.input().get("x"), Some(&json!(4)));
    }

    #[test]
    fn test_prepare_rejects_bad_input_before_running() {
        let err = Snippet::prepare("x", Some(&json!([1, 2]))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Encode);
    }
}
