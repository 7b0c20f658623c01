//! Engine configuration
//!
//! Configuration is read once, when the process-wide runtime is first
//! initialized. It can be built explicitly or taken from the environment:
//!
//! - `PYEXEC_LIBPYTHON`: exact path of the shared library to load. If set,
//!   no other candidate is tried.
//! - `PYEXEC_PYTHON`: interpreter executable(s) to probe for their library
//!   directory, separated by the platform path separator.
//! - `PYEXEC_ISOLATION`: `subinterpreter` (default) or `shared`.

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{Error, ErrorKind, Result};

/// Environment variable naming an exact libpython path
pub const ENV_LIBPYTHON: &str = "PYEXEC_LIBPYTHON";

/// Environment variable naming the interpreter executable(s) to probe
pub const ENV_PYTHON: &str = "PYEXEC_PYTHON";

/// Environment variable selecting the isolation strategy
pub const ENV_ISOLATION: &str = "PYEXEC_ISOLATION";

/// Interpreters probed when none is configured
pub const DEFAULT_PYTHON_EXECUTABLES: &[&str] = &["python3", "python"];

/// How each call is isolated from the others
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Isolation {
    /// A fresh sub-interpreter per call
    #[default]
    SubInterpreter,
    /// A fresh globals dict in the main interpreter, under the shared lock
    SharedLock,
}

impl FromStr for Isolation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "subinterpreter" | "sub-interpreter" | "sub" => Ok(Isolation::SubInterpreter),
            "shared" | "shared-lock" | "gil" => Ok(Isolation::SharedLock),
            other => Err(Error::new(
                ErrorKind::Init,
                "configure",
                format!("unknown {} value {:?}", ENV_ISOLATION, other),
            )),
        }
    }
}

impl fmt::Display for Isolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Isolation::SubInterpreter => write!(f, "subinterpreter"),
            Isolation::SharedLock => write!(f, "shared"),
        }
    }
}

/// Runtime configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Exact shared library to load, bypassing discovery
    pub library_path: Option<PathBuf>,
    /// Interpreters to ask for their library directory, in order
    pub python_executables: Vec<String>,
    /// Isolation strategy for each call
    pub isolation: Isolation,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            library_path: None,
            python_executables: DEFAULT_PYTHON_EXECUTABLES.iter().map(|s| s.to_string()).collect(),
            isolation: Isolation::default(),
        }
    }
}

impl Config {
    /// Read configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read configuration through an arbitrary key lookup
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Config::default();

        if let Some(path) = get(ENV_LIBPYTHON) {
            config.library_path = Some(PathBuf::from(path));
        }
        if let Some(list) = get(ENV_PYTHON) {
            config.python_executables = env::split_paths(&list)
                .map(|p| p.to_string_lossy().into_owned())
                .filter(|p| !p.is_empty())
                .collect();
        }
        if let Some(mode) = get(ENV_ISOLATION) {
            config.isolation = mode.parse()?;
        }

        Ok(config)
    }

    /// Load exactly this library
    pub fn with_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.library_path = Some(path.into());
        self
    }

    /// Probe these interpreters instead of the defaults
    pub fn with_python_executables<I, S>(mut self, executables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.python_executables = executables.into_iter().map(Into::into).collect();
        self
    }

    /// Select the isolation strategy
    pub fn with_isolation(mut self, isolation: Isolation) -> Self {
        self.isolation = isolation;
        self
    }
}
