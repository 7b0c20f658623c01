//! The libpython function table
//!
//! All symbols are resolved eagerly when the runtime is built. A missing
//! symbol is a [`ErrorKind::Bind`] error naming it, never a per-call failure.

use std::os::raw::{c_char, c_int, c_void};

use libloading::{Library, Symbol};

use super::{GilState, RawInterpreterState, RawObject, RawThreadState};
use crate::error::{Error, ErrorKind, Result};

type Obj = *mut RawObject;
type Tstate = *mut RawThreadState;

macro_rules! python_api {
    ($( $field:ident => $symbol:literal : fn($($arg:ty),*) $(-> $ret:ty)?; )*) => {
        /// Typed entry points into libpython
        ///
        /// Every call requires the interpreter lock to be held by the calling
        /// thread, except `py_is_initialized`, `py_initialize`,
        /// `py_gil_state_ensure` and `py_gil_state_get_this_thread_state`.
        pub struct Api {
            $( pub $field: unsafe extern "C" fn($($arg),*) $(-> $ret)?, )*
        }

        impl Api {
            /// Resolve every entry point from `library`
            pub fn bind(library: &Library) -> Result<Self> {
                Ok(Api {
                    $( $field: unsafe { symbol(library, $symbol)? }, )*
                })
            }

            /// Names of every symbol the table requires
            pub fn symbols() -> &'static [&'static str] {
                &[$( $symbol ),*]
            }
        }
    };
}

python_api! {
    py_initialize => "Py_Initialize": fn();
    py_is_initialized => "Py_IsInitialized": fn() -> c_int;
    py_eval_save_thread => "PyEval_SaveThread": fn() -> Tstate;
    py_gil_state_ensure => "PyGILState_Ensure": fn() -> GilState;
    py_gil_state_release => "PyGILState_Release": fn(GilState);
    py_gil_state_get_this_thread_state => "PyGILState_GetThisThreadState": fn() -> Tstate;
    py_new_interpreter => "Py_NewInterpreter": fn() -> Tstate;
    py_end_interpreter => "Py_EndInterpreter": fn(Tstate);
    py_thread_state_new => "PyThreadState_New": fn(*mut RawInterpreterState) -> Tstate;
    py_thread_state_swap => "PyThreadState_Swap": fn(Tstate) -> Tstate;
    py_thread_state_clear => "PyThreadState_Clear": fn(Tstate);
    py_thread_state_get_interpreter => "PyThreadState_GetInterpreter":
        fn(Tstate) -> *mut RawInterpreterState;
    py_thread_state_delete_current => "PyThreadState_DeleteCurrent": fn();
    py_eval_get_builtins => "PyEval_GetBuiltins": fn() -> Obj;
    py_dict_new => "PyDict_New": fn() -> Obj;
    py_dict_set_item_string => "PyDict_SetItemString": fn(Obj, *const c_char, Obj) -> c_int;
    py_import_import_module => "PyImport_ImportModule": fn(*const c_char) -> Obj;
    py_object_get_attr_string => "PyObject_GetAttrString": fn(Obj, *const c_char) -> Obj;
    py_unicode_from_string => "PyUnicode_FromString": fn(*const c_char) -> Obj;
    py_unicode_as_utf8 => "PyUnicode_AsUTF8": fn(Obj) -> *const c_char;
    py_tuple_new => "PyTuple_New": fn(isize) -> Obj;
    py_tuple_set_item => "PyTuple_SetItem": fn(Obj, isize, Obj) -> c_int;
    py_object_call_object => "PyObject_CallObject": fn(Obj, Obj) -> Obj;
    py_run_string_flags => "PyRun_StringFlags":
        fn(*const c_char, c_int, Obj, Obj, *mut c_void) -> Obj;
    py_err_fetch => "PyErr_Fetch": fn(*mut Obj, *mut Obj, *mut Obj);
    py_err_normalize_exception => "PyErr_NormalizeException": fn(*mut Obj, *mut Obj, *mut Obj);
    py_object_str => "PyObject_Str": fn(Obj) -> Obj;
    py_dec_ref => "Py_DecRef": fn(Obj);
}

/// Resolve one symbol into a copied function pointer
///
/// # Safety
/// `T` must match the C signature of `name`.
unsafe fn symbol<T: Copy>(library: &Library, name: &str) -> Result<T> {
    let sym: Symbol<T> = unsafe { library.get(name.as_bytes()) }
        .map_err(|e| Error::new(ErrorKind::Bind, format!("bind {}", name), e.to_string()))?;
    Ok(*sym)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_symbol_set_is_complete() {
        let symbols: HashSet<_> = Api::symbols().iter().copied().collect();
        assert_eq!(symbols.len(), Api::symbols().len(), "duplicate symbol");
        for required in [
            "Py_Initialize",
            "Py_IsInitialized",
            "Py_NewInterpreter",
            "Py_EndInterpreter",
            "PyGILState_Ensure",
            "PyGILState_Release",
            "PyThreadState_New",
            "PyThreadState_Swap",
            "PyThreadState_Clear",
            "PyThreadState_GetInterpreter",
            "PyThreadState_DeleteCurrent",
            "PyEval_GetBuiltins",
            "PyDict_New",
            "PyDict_SetItemString",
            "PyImport_ImportModule",
            "PyObject_GetAttrString",
            "PyUnicode_FromString",
            "PyUnicode_AsUTF8",
            "PyTuple_New",
            "PyTuple_SetItem",
            "PyObject_CallObject",
            "PyRun_StringFlags",
            "PyErr_Fetch",
            "PyErr_NormalizeException",
            "PyObject_Str",
            "Py_DecRef",
        ] {
            assert!(symbols.contains(required), "missing {}", required);
        }
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_bind_names_missing_symbol() {
        let libc = unsafe { Library::new("libc.so.6") }.unwrap();
        let Err(err) = Api::bind(&libc) else {
            panic!("libc should not provide the Python API");
        };
        assert_eq!(err.kind(), ErrorKind::Bind);
        assert_eq!(err.context(), "bind Py_Initialize");
        assert!(err.to_string().starts_with("pyexec: bind Py_Initialize: "));
    }
}
