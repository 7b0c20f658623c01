//! libpython discovery and loading
//!
//! Resolution order:
//! 1. `Config::library_path` (or `PYEXEC_LIBPYTHON`), loaded directly. A
//!    failure here is final.
//! 2. Each configured interpreter executable is asked for its `LIBDIR` and
//!    version through `sysconfig`, and the resulting path is tried.
//! 3. A fixed list of versioned library names for the current platform,
//!    newest first, resolved through the system loader search path.

use std::env::consts::OS;
use std::path::{Path, PathBuf};
use std::process::Command;

use libloading::Library;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{Error, ErrorKind, Result};

/// Supported minor versions of Python 3, newest first
const MINOR_VERSIONS: &[u32] = &[13, 12, 11, 10, 9];

const PROBE_SCRIPT: &str = "import sysconfig; \
print(sysconfig.get_config_var('LIBDIR')); \
print(sysconfig.get_config_var('LDVERSION') or sysconfig.get_config_var('VERSION'))";

/// `3.12`, `3.13t`, `3.9d`
static VERSION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+\.\d+[a-z]*$").unwrap());

/// An opened libpython together with the path it was loaded from
pub struct LoadedLibrary {
    library: Library,
    path: PathBuf,
}

impl LoadedLibrary {
    /// The loaded library
    pub fn library(&self) -> &Library {
        &self.library
    }

    /// The path or name the library was opened with
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Locate and open libpython according to `config`
pub fn load(config: &Config) -> Result<LoadedLibrary> {
    if let Some(path) = &config.library_path {
        debug!(path = %path.display(), "loading libpython from explicit path");
        return open(path).map_err(|e| {
            let context = format!("dlopen {:?}", path.display().to_string());
            Error::new(ErrorKind::Load, context, e.to_string())
        });
    }

    let mut candidates: Vec<PathBuf> = Vec::new();
    for exe in &config.python_executables {
        match probe_interpreter(exe) {
            Ok(path) => {
                debug!(python = %exe, path = %path.display(), "interpreter reported libpython");
                candidates.push(path);
                break;
            }
            Err(e) => debug!(python = %exe, error = %e, "interpreter probe failed"),
        }
    }
    candidates.extend(library_candidates(OS).into_iter().map(PathBuf::from));

    let mut last_error = None;
    for candidate in candidates {
        match open(&candidate) {
            Ok(library) => {
                debug!(path = %candidate.display(), "loaded libpython");
                return Ok(library);
            }
            Err(e) => {
                warn!(path = %candidate.display(), error = %e, "libpython candidate failed");
                last_error = Some(e.to_string());
            }
        }
    }

    Err(Error::new(
        ErrorKind::Load,
        "unable to load libpython",
        last_error.unwrap_or_else(|| format!("no libpython candidates for {}", OS)),
    ))
}

/// Open a library with symbols made globally visible, so that extension
/// modules such as `_json` can link against the interpreter.
fn open(path: &Path) -> std::result::Result<LoadedLibrary, libloading::Error> {
    #[cfg(unix)]
    let library = unsafe {
        use libloading::os::unix::{Library as UnixLibrary, RTLD_GLOBAL, RTLD_NOW};
        UnixLibrary::open(Some(path), RTLD_NOW | RTLD_GLOBAL).map(Library::from)?
    };
    #[cfg(not(unix))]
    let library = unsafe { Library::new(path)? };

    Ok(LoadedLibrary {
        library,
        path: path.to_path_buf(),
    })
}

/// Ask an interpreter executable where its shared library lives
pub fn probe_interpreter(executable: &str) -> Result<PathBuf> {
    let output = Command::new(executable)
        .args(["-c", PROBE_SCRIPT])
        .output()
        .map_err(|e| Error::new(ErrorKind::Load, format!("probe {}", executable), e.to_string()))?;

    if !output.status.success() {
        return Err(Error::new(
            ErrorKind::Load,
            format!("probe {}", executable),
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    parse_probe_output(&stdout, OS).ok_or_else(|| {
        Error::new(
            ErrorKind::Load,
            format!("probe {}", executable),
            format!("unexpected sysconfig output {:?}", stdout.trim()),
        )
    })
}

/// Build the library path from the probe's `LIBDIR` and version lines
fn parse_probe_output(stdout: &str, os: &str) -> Option<PathBuf> {
    let mut lines = stdout.lines().map(str::trim);
    let libdir = lines.next()?;
    let version = lines.next()?;

    if libdir.is_empty() || libdir == "None" || !VERSION_RE.is_match(version) {
        return None;
    }
    Some(Path::new(libdir).join(shared_library_name(version, os)))
}

/// Platform file name of libpython for a `major.minor` version string
fn shared_library_name(version: &str, os: &str) -> String {
    match os {
        "macos" => format!("libpython{}.dylib", version),
        "windows" => format!("python{}.dll", version.replace('.', "")),
        _ => format!("libpython{}.so", version),
    }
}

/// Fallback library names for `os`, newest version first
pub fn library_candidates(os: &str) -> Vec<String> {
    let mut candidates = Vec::new();
    for minor in MINOR_VERSIONS {
        let version = format!("3.{}", minor);
        match os {
            "macos" | "windows" => candidates.push(shared_library_name(&version, os)),
            _ => {
                candidates.push(format!("libpython{}.so.1.0", version));
                candidates.push(shared_library_name(&version, os));
            }
        }
    }
    candidates
}
