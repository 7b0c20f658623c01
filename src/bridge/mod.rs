//! JSON bridge between host values and Python objects
//!
//! Python objects are never assembled member by member. The host value is
//! written as JSON text and handed to Python's own `json.loads`; results go
//! back through `json.dumps` and are parsed with `serde_json`. The JSON text
//! is the only thing that crosses the boundary.
//!
//! JSON does not tell integers from floats on the way back, so every number
//! in a result is returned as an `f64`.

mod finite;

use serde::Serialize;
use serde_json::{Map, Number, Value};

use crate::error::{Error, ErrorKind, Result};
use crate::object::{Interp, PyObject};

/// Serialize a host input into the JSON object bound as `input`
///
/// `None` is an empty object. Anything that does not serialize to a JSON
/// object, or that carries a NaN or infinite float, is rejected here before
/// Python is involved.
pub fn encode_input<I>(input: Option<&I>) -> Result<Map<String, Value>>
where
    I: Serialize + ?Sized,
{
    let Some(input) = input else {
        return Ok(Map::new());
    };

    match finite::to_value(input) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(Value::Null) => Ok(Map::new()),
        Ok(other) => Err(Error::new(
            ErrorKind::Encode,
            "encode input",
            format!("input must be a JSON object, got {}", kind_name(&other)),
        )),
        Err(e) => Err(Error::new(ErrorKind::Encode, "encode input", e.to_string())),
    }
}

/// Parse the JSON text produced by `json.dumps`
pub fn decode_result(text: &str) -> Result<Value> {
    let mut value: Value = serde_json::from_str(text)
        .map_err(|e| Error::new(ErrorKind::Decode, "decode result", e.to_string()))?;
    numbers_to_f64(&mut value);
    Ok(value)
}

/// `json.loads(text)` for the encoded input
pub fn to_foreign<'py>(py: Interp<'py>, input: &Map<String, Value>) -> Result<PyObject<'py>> {
    let text = serde_json::to_string(input)
        .map_err(|e| Error::new(ErrorKind::Encode, "encode input", e.to_string()))?;

    let json = py.import("json", ErrorKind::Encode)?;
    let loads = py.getattr(&json, "loads", ErrorKind::Encode)?;
    let arg = py.string(&text, ErrorKind::Encode)?;
    py.call1(&loads, arg, ErrorKind::Encode, "json.loads")
}

/// `json.dumps(obj)`, copied out as a Rust string
///
/// Takes ownership of `obj`; it is released whether or not encoding succeeds.
pub fn to_canonical<'py>(py: Interp<'py>, obj: PyObject<'py>) -> Result<String> {
    let json = py.import("json", ErrorKind::Decode)?;
    let dumps = py.getattr(&json, "dumps", ErrorKind::Decode)?;
    let text = py.call1(&dumps, obj, ErrorKind::Decode, "json.dumps")?;
    py.to_utf8(&text, ErrorKind::Decode, "decode result")
}

fn numbers_to_f64(value: &mut Value) {
    match value {
        Value::Number(n) => {
            if let Some(float) = n.as_f64().and_then(Number::from_f64) {
                *n = float;
            }
        }
        Value::Array(items) => items.iter_mut().for_each(numbers_to_f64),
        Value::Object(map) => map.values_mut().for_each(numbers_to_f64),
        _ => {}
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
