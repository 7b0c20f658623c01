//! Per-call execution context
//!
//! An [`ExecutionContext`] owns everything one call does inside Python: the
//! interpreter lock, an optional sub-interpreter and a fresh globals dict.
//! It moves through
//!
//! `Created → GlobalsReady → InputBound → StatementsRun →`
//! `ExpressionEvaluated → ResultBridged`
//!
//! and is torn down on drop from whichever state it reached, so every error
//! path releases the globals dict before leaving the sub-interpreter and
//! dropping the lock.
//!
//! Thread-state entry and exit are thread affine, so the context is `!Send`
//! and lives and dies on the OS thread that created it.

use std::cell::Cell;
use std::marker::PhantomData;
use std::ptr::NonNull;

use serde_json::{Map, Value};
use tracing::trace;

use crate::bridge;
use crate::config::Isolation;
use crate::error::{Error, ErrorKind, Result};
use crate::ffi::{Api, GilState, PY_EVAL_INPUT, PY_FILE_INPUT, RawThreadState};
use crate::object::{Interp, PyObject};
use crate::split::CodeUnit;

/// Name the whole input mapping is bound under
pub const INPUT_KEY: &str = "input";

/// Where a context is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ContextState {
    /// Lock held and, when isolated, the sub-interpreter entered
    Created,
    /// Fresh globals dict carrying `__builtins__`
    GlobalsReady,
    /// `input` bound and its keys merged into the globals
    InputBound,
    /// Every line before the last one executed
    StatementsRun,
    /// Last line evaluated to a Python object
    ExpressionEvaluated,
    /// Result serialized to JSON text by `json.dumps`
    ResultBridged,
}

/// Interpreter lock held on behalf of one call, plus the sub-interpreter
/// entered under it
struct Entered<'rt> {
    api: &'rt Api,
    gil: GilState,
    /// (sub-interpreter, thread-state to restore after ending it)
    sub: Option<(NonNull<RawThreadState>, NonNull<RawThreadState>)>,
}

impl<'rt> Entered<'rt> {
    fn enter(api: &'rt Api, isolation: Isolation) -> Result<Self> {
        let gil = unsafe { (api.py_gil_state_ensure)() };
        let mut entered = Entered { api, gil, sub: None };

        if isolation == Isolation::SubInterpreter {
            let main = unsafe { (api.py_gil_state_get_this_thread_state)() };
            let Some(main) = NonNull::new(main) else {
                return Err(Error::new(
                    ErrorKind::ContextCreation,
                    "create subinterpreter",
                    "no thread state after acquiring the interpreter lock",
                ));
            };
            let Some(sub) = NonNull::new(unsafe { (api.py_new_interpreter)() }) else {
                // Py_NewInterpreter restores the previous thread state on failure.
                let py = unsafe { Interp::assume_entered(api) };
                return Err(py.fetch_error(ErrorKind::ContextCreation, "create subinterpreter"));
            };
            entered.sub = Some((sub, main));
            let interp = unsafe { (api.py_thread_state_get_interpreter)(sub.as_ptr()) };
            trace!(?interp, "entered subinterpreter");
        }

        Ok(entered)
    }
}

impl Drop for Entered<'_> {
    fn drop(&mut self) {
        unsafe {
            if let Some((sub, main)) = self.sub.take() {
                (self.api.py_end_interpreter)(sub.as_ptr());
                (self.api.py_thread_state_swap)(main.as_ptr());
                trace!("ended subinterpreter");
            }
            (self.api.py_gil_state_release)(self.gil);
        }
    }
}

/// An isolated namespace for a single call
pub struct ExecutionContext<'rt> {
    // Field order is drop order: the globals dict must go before the
    // interpreter it belongs to.
    globals: Option<PyObject<'rt>>,
    state: Cell<ContextState>,
    entered: Entered<'rt>,
    _not_send: PhantomData<*const ()>,
}

impl<'rt> ExecutionContext<'rt> {
    /// Acquire the lock (and a sub-interpreter when `isolation` asks for one)
    /// and build a fresh globals dict with `__builtins__`
    pub fn enter(api: &'rt Api, isolation: Isolation) -> Result<Self> {
        let entered = Entered::enter(api, isolation)?;
        let mut ctx = ExecutionContext {
            globals: None,
            state: Cell::new(ContextState::Created),
            entered,
            _not_send: PhantomData,
        };
        trace!(%isolation, "context created");

        let py = unsafe { Interp::assume_entered(api) };
        let globals = py.new_dict(ErrorKind::ContextCreation)?;
        if let Some(builtins) = py.builtins() {
            py.dict_set_item(
                &globals,
                "__builtins__",
                builtins.as_ptr(),
                ErrorKind::ContextCreation,
            )?;
        }
        ctx.globals = Some(globals);
        ctx.advance(ContextState::GlobalsReady);

        Ok(ctx)
    }

    /// The C API token for this context
    pub fn interp(&self) -> Interp<'_> {
        unsafe { Interp::assume_entered(self.entered.api) }
    }

    /// Current lifecycle state
    pub fn state(&self) -> ContextState {
        self.state.get()
    }

    fn globals(&self) -> &PyObject<'rt> {
        match &self.globals {
            Some(globals) => globals,
            None => unreachable!("globals are created in ExecutionContext::enter"),
        }
    }

    fn advance(&self, next: ContextState) {
        debug_assert!(next > self.state.get(), "{:?} after {:?}", next, self.state.get());
        trace!(from = ?self.state.get(), to = ?next, "context transition");
        self.state.set(next);
    }

    /// Bind `input` under [`INPUT_KEY`] and merge its keys into the namespace
    ///
    /// Merged keys shadow builtins; a key named `input` replaces the mapping.
    pub fn bind_input(&self, input: &Map<String, Value>) -> Result<()> {
        let py = self.interp();
        let obj = bridge::to_foreign(py, input)?;
        py.dict_set_item(self.globals(), INPUT_KEY, obj.as_ptr(), ErrorKind::Encode)?;
        drop(obj);

        if !input.is_empty() {
            py.run("globals().update(input)", PY_FILE_INPUT, self.globals(), ErrorKind::Encode)?;
        }
        self.advance(ContextState::InputBound);
        Ok(())
    }

    /// Run the statement prefix, discarding its value
    pub fn run_statements(&self, statements: &str) -> Result<()> {
        if !statements.trim().is_empty() {
            let py = self.interp();
            py.run(statements, PY_FILE_INPUT, self.globals(), ErrorKind::Execution)?;
        }
        self.advance(ContextState::StatementsRun);
        Ok(())
    }

    /// Evaluate the trailing expression
    pub fn evaluate(&self, expression: &str) -> Result<PyObject<'_>> {
        let py = self.interp();
        let result = py.run(expression, PY_EVAL_INPUT, self.globals(), ErrorKind::Execution)?;
        self.advance(ContextState::ExpressionEvaluated);
        Ok(result)
    }

    /// Serialize a result object to JSON text
    pub fn bridge_result(&self, result: PyObject<'_>) -> Result<String> {
        let text = bridge::to_canonical(self.interp(), result)?;
        self.advance(ContextState::ResultBridged);
        Ok(text)
    }

    /// Bind, run, evaluate and bridge in one go
    pub fn execute(&self, unit: &CodeUnit, input: &Map<String, Value>) -> Result<String> {
        self.bind_input(input)?;
        self.run_statements(&unit.statements)?;
        let result = self.evaluate(&unit.expression)?;
        self.bridge_result(result)
    }
}

impl Drop for ExecutionContext<'_> {
    fn drop(&mut self) {
        trace!(state = ?self.state.get(), "context destroyed");
    }
}
