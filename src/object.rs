//! Owned Python references and the calls that produce them
//!
//! [`Interp`] is a copyable token proving that the calling thread is inside
//! an [`ExecutionContext`](crate::context::ExecutionContext). Its lifetime is
//! tied to the context, so no [`PyObject`] it hands out can outlive the
//! sub-interpreter or lock it was created under.

use std::ffi::{CStr, CString};
use std::marker::PhantomData;
use std::os::raw::{c_char, c_int};
use std::ptr::{self, NonNull};

use crate::error::{Error, ErrorKind, Result};
use crate::ffi::{Api, RawObject};

/// A strong reference to a Python object, released on drop
pub struct PyObject<'py> {
    ptr: NonNull<RawObject>,
    api: &'py Api,
}

impl<'py> PyObject<'py> {
    /// Raw pointer, still owned by `self`
    pub fn as_ptr(&self) -> *mut RawObject {
        self.ptr.as_ptr()
    }

    /// Give up ownership without releasing, for calls that steal a reference
    pub fn into_ptr(self) -> *mut RawObject {
        let ptr = self.ptr.as_ptr();
        std::mem::forget(self);
        ptr
    }
}

impl Drop for PyObject<'_> {
    fn drop(&mut self) {
        unsafe { (self.api.py_dec_ref)(self.ptr.as_ptr()) }
    }
}

/// Access to the Python C API for the duration of one execution context
#[derive(Clone, Copy)]
pub struct Interp<'py> {
    api: &'py Api,
    // Thread-affine: must stay on the thread that entered the context.
    _not_send: PhantomData<*const ()>,
}

impl<'py> Interp<'py> {
    /// # Safety
    /// The caller must hold the interpreter lock with a current thread-state
    /// for as long as `'py` lasts.
    pub(crate) unsafe fn assume_entered(api: &'py Api) -> Self {
        Interp {
            api,
            _not_send: PhantomData,
        }
    }

    /// Take ownership of a new reference, or fetch the pending exception
    fn own(&self, ptr: *mut RawObject, kind: ErrorKind, context: &str) -> Result<PyObject<'py>> {
        self.adopt(ptr).ok_or_else(|| self.fetch_error(kind, context))
    }

    /// `{}`
    pub fn new_dict(&self, kind: ErrorKind) -> Result<PyObject<'py>> {
        let ptr = unsafe { (self.api.py_dict_new)() };
        self.own(ptr, kind, "create globals")
    }

    /// `dict[key] = value`, without stealing `value`
    pub fn dict_set_item(
        &self,
        dict: &PyObject<'py>,
        key: &str,
        value: *mut RawObject,
        kind: ErrorKind,
    ) -> Result<()> {
        let context = format!("set dict {}", key);
        let key = c_string(key, kind, &context)?;
        let rc =
            unsafe { (self.api.py_dict_set_item_string)(dict.as_ptr(), key.as_ptr(), value) };
        self.check(rc, kind, &context)
    }

    /// The builtins of the current frame or interpreter, borrowed
    pub fn builtins(&self) -> Option<NonNull<RawObject>> {
        NonNull::new(unsafe { (self.api.py_eval_get_builtins)() })
    }

    /// `import name`
    pub fn import(&self, name: &str, kind: ErrorKind) -> Result<PyObject<'py>> {
        let context = format!("import module {}", name);
        let cname = c_string(name, kind, &context)?;
        let ptr = unsafe { (self.api.py_import_import_module)(cname.as_ptr()) };
        self.own(ptr, kind, &context)
    }

    /// `getattr(obj, name)`
    pub fn getattr(
        &self,
        obj: &PyObject<'py>,
        name: &str,
        kind: ErrorKind,
    ) -> Result<PyObject<'py>> {
        let context = format!("get attribute {}", name);
        let cname = c_string(name, kind, &context)?;
        let ptr = unsafe { (self.api.py_object_get_attr_string)(obj.as_ptr(), cname.as_ptr()) };
        self.own(ptr, kind, &context)
    }

    /// A Python `str` from UTF-8 text
    pub fn string(&self, text: &str, kind: ErrorKind) -> Result<PyObject<'py>> {
        let ctext = c_string(text, kind, "create string")?;
        let ptr = unsafe { (self.api.py_unicode_from_string)(ctext.as_ptr()) };
        self.own(ptr, kind, "create string")
    }

    /// Copy a `str` object out as UTF-8
    pub fn to_utf8(&self, obj: &PyObject<'py>, kind: ErrorKind, context: &str) -> Result<String> {
        let ptr = unsafe { (self.api.py_unicode_as_utf8)(obj.as_ptr()) };
        if ptr.is_null() {
            return Err(self.fetch_error(kind, context));
        }
        Ok(unsafe { copy_c_str(ptr) })
    }

    /// `callable(arg)`
    ///
    /// `arg` is moved into the argument tuple, which steals it.
    pub fn call1(
        &self,
        callable: &PyObject<'py>,
        arg: PyObject<'py>,
        kind: ErrorKind,
        context: &str,
    ) -> Result<PyObject<'py>> {
        let args = unsafe { (self.api.py_tuple_new)(1) };
        let args = self.own(args, kind, "create args")?;

        // PyTuple_SetItem consumes the item even when it fails.
        let rc = unsafe { (self.api.py_tuple_set_item)(args.as_ptr(), 0, arg.into_ptr()) };
        self.check(rc, kind, "set args")?;

        let ptr = unsafe { (self.api.py_object_call_object)(callable.as_ptr(), args.as_ptr()) };
        drop(args);
        self.own(ptr, kind, context)
    }

    /// Run `code` in `mode` with `globals` as both global and local scope
    pub fn run(
        &self,
        code: &str,
        mode: c_int,
        globals: &PyObject<'py>,
        kind: ErrorKind,
    ) -> Result<PyObject<'py>> {
        let ccode = c_string(code, kind, "execute python")?;
        let ptr = unsafe {
            (self.api.py_run_string_flags)(
                ccode.as_ptr(),
                mode,
                globals.as_ptr(),
                globals.as_ptr(),
                ptr::null_mut(),
            )
        };
        self.own(ptr, kind, "execute python")
    }

    fn check(&self, rc: c_int, kind: ErrorKind, context: &str) -> Result<()> {
        if rc == 0 {
            Ok(())
        } else {
            Err(self.fetch_error(kind, context))
        }
    }

    /// Turn the pending Python exception into an [`Error`]
    ///
    /// The exception is cleared and its type, value and traceback released.
    /// `str()` of the value becomes the message; without a value the message
    /// is the generic `python error`.
    pub fn fetch_error(&self, kind: ErrorKind, context: &str) -> Error {
        let mut ptype: *mut RawObject = ptr::null_mut();
        let mut pvalue: *mut RawObject = ptr::null_mut();
        let mut ptrace: *mut RawObject = ptr::null_mut();
        unsafe {
            (self.api.py_err_fetch)(&mut ptype, &mut pvalue, &mut ptrace);
            (self.api.py_err_normalize_exception)(&mut ptype, &mut pvalue, &mut ptrace);
        }
        let _ptype = self.adopt(ptype);
        let pvalue = self.adopt(pvalue);
        let _ptrace = self.adopt(ptrace);

        let message = pvalue.and_then(|value| self.describe(&value));
        let message = message.unwrap_or_else(|| "python error".to_string());
        Error::new(kind, context, message)
    }

    /// `str(obj)`, swallowing any secondary failure
    fn describe(&self, obj: &PyObject<'py>) -> Option<String> {
        let Some(text) = self.adopt(unsafe { (self.api.py_object_str)(obj.as_ptr()) }) else {
            self.clear_error();
            return None;
        };
        let utf8 = unsafe { (self.api.py_unicode_as_utf8)(text.as_ptr()) };
        if utf8.is_null() {
            self.clear_error();
            return None;
        }
        Some(unsafe { copy_c_str(utf8) })
    }

    /// Discard the pending exception, if any
    fn clear_error(&self) {
        let mut ptype: *mut RawObject = ptr::null_mut();
        let mut pvalue: *mut RawObject = ptr::null_mut();
        let mut ptrace: *mut RawObject = ptr::null_mut();
        unsafe { (self.api.py_err_fetch)(&mut ptype, &mut pvalue, &mut ptrace) };
        for obj in [ptype, pvalue, ptrace] {
            drop(self.adopt(obj));
        }
    }

    /// Take ownership of a possibly-null new reference
    fn adopt(&self, ptr: *mut RawObject) -> Option<PyObject<'py>> {
        NonNull::new(ptr).map(|ptr| PyObject { ptr, api: self.api })
    }
}

fn c_string(text: &str, kind: ErrorKind, context: &str) -> Result<CString> {
    CString::new(text).map_err(|_| Error::new(kind, context, "embedded NUL byte in text"))
}

/// # Safety
/// `ptr` must be a valid NUL-terminated string for the duration of the call.
unsafe fn copy_c_str(ptr: *const c_char) -> String {
    unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
}
