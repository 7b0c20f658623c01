//! Foreign function interface to libpython
//!
//! libpython is never linked at build time. It is located and opened at
//! runtime by [`loader`], and every entry point the engine calls is resolved
//! up front into the [`Api`] function table.

pub mod api;
pub mod loader;

pub use api::Api;
pub use loader::{LoadedLibrary, library_candidates};

/// Opaque `PyObject`
#[repr(C)]
pub struct RawObject {
    _opaque: [u8; 0],
}

/// Opaque `PyThreadState`
#[repr(C)]
pub struct RawThreadState {
    _opaque: [u8; 0],
}

/// Opaque `PyInterpreterState`
#[repr(C)]
pub struct RawInterpreterState {
    _opaque: [u8; 0],
}

/// `PyGILState_STATE`
pub type GilState = std::os::raw::c_int;

/// `Py_file_input`: run the source as a sequence of statements
pub const PY_FILE_INPUT: std::os::raw::c_int = 257;

/// `Py_eval_input`: evaluate the source as a single expression
pub const PY_EVAL_INPUT: std::os::raw::c_int = 258;
