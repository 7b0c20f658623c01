//! End-to-end snippet execution against a real libpython
//!
//! Each test returns early, with a note on stderr, when no libpython can be
//! loaded on this machine.

use std::collections::HashMap;

use pyexec::{ErrorKind, Value};
use serde::ser::{Error as _, Serialize, Serializer};
use serde_json::json;

fn python_available() -> bool {
    match pyexec::runtime() {
        Ok(_) => true,
        Err(e) => {
            eprintln!("skipping, libpython unavailable: {}", e);
            false
        }
    }
}

fn exec(code: &str) -> pyexec::Result<Value> {
    pyexec::exec::<Value>(code, None)
}

#[test]
fn test_basic_string() {
    if !python_available() {
        return;
    }
    assert_eq!(exec(r#""1""#).unwrap(), json!("1"));
}

#[test]
fn test_runtime_reports_library() {
    if !python_available() {
        return;
    }
    let rt = pyexec::runtime().unwrap();
    assert!(!rt.library().as_os_str().is_empty());
    assert_eq!(rt.isolation(), pyexec::Config::from_env().unwrap().isolation);
}

#[test]
fn test_statements_then_expression() {
    if !python_available() {
        return;
    }
    assert_eq!(exec("a = 2\nb = 3\na + b").unwrap(), json!(5.0));
}

#[test]
fn test_multiline_statements() {
    if !python_available() {
        return;
    }
    let code = r#"
def fib(n):
    a, b = 0, 1
    for _ in range(n):
        a, b = b, a + b
    return a

fib(20)
"#;
    assert_eq!(exec(code).unwrap(), json!(6765.0));
}

#[test]
fn test_trailing_blank_lines() {
    if !python_available() {
        return;
    }
    let result = pyexec::exec("x + y\n\n", Some(&json!({"x": 1, "y": 2}))).unwrap();
    assert_eq!(result, json!(3.0));
}

#[test]
fn test_absent_input() {
    if !python_available() {
        return;
    }
    assert_eq!(exec("1 + 1").unwrap(), json!(2.0));
    assert_eq!(exec("input").unwrap(), json!({}));
}

#[test]
fn test_empty_code_rejected() {
    for code in ["", " \n\t\n"] {
        let err = exec(code).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EmptyCode);
    }
}

struct Channel;

impl Serialize for Channel {
    fn serialize<S: Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
        Err(S::Error::custom("channel is not serializable"))
    }
}

#[test]
fn test_non_serializable_input_rejected() {
    let mut input = HashMap::new();
    input.insert("x", Channel);
    let err = pyexec::exec("x", Some(&input)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Encode);
    assert!(err.message().contains("channel is not serializable"));
}

#[test]
fn test_non_object_input_rejected() {
    let err = pyexec::exec("x", Some(&json!([1, 2]))).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Encode);
}

#[test]
fn test_division_by_zero() {
    if !python_available() {
        return;
    }
    let err = exec("1 / 0").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Execution);
    assert_eq!(err.context(), "execute python");
    assert!(err.message().contains("division by zero"), "{}", err);
    assert!(err.to_string().starts_with("pyexec: execute python: "));
}

#[test]
fn test_exception_in_statements() {
    if !python_available() {
        return;
    }
    let err = exec("raise ValueError('boom')\n1").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Execution);
    assert_eq!(err.message(), "boom");
}

#[test]
fn test_unprintable_exception_message() {
    if !python_available() {
        return;
    }
    let code = r#"
class Unprintable(Exception):
    def __str__(self):
        raise RuntimeError("no text")

raise Unprintable()
1
"#;
    let err = exec(code).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Execution);
    assert_eq!(err.message(), "python error");
}

#[test]
fn test_non_finite_input_rejected() {
    let mut input = HashMap::new();
    input.insert("x", f64::NAN);
    input.insert("y", 1.0);
    let err = pyexec::exec("y", Some(&input)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Encode);
    assert_eq!(err.context(), "encode input");

    let input = HashMap::from([("x", vec![1.0, f64::INFINITY])]);
    let err = pyexec::exec("x", Some(&input)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Encode);
}

#[test]
fn test_syntax_error() {
    if !python_available() {
        return;
    }
    let err = exec("x = = 1").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Execution);

    // An assignment on the last line is not an expression.
    let err = exec("x = 1").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Execution);
}

#[test]
fn test_unterminated_continuation_is_an_error() {
    if !python_available() {
        return;
    }
    let err = exec("values = [\n    1,\n    2,\n]").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Execution);
}

#[test]
fn test_runtime_usable_after_error() {
    if !python_available() {
        return;
    }
    assert!(exec("undefined_name").is_err());
    assert_eq!(exec("40 + 2").unwrap(), json!(42.0));
}

#[test]
fn test_return_none() {
    if !python_available() {
        return;
    }
    assert_eq!(exec("None").unwrap(), Value::Null);
}

#[test]
fn test_return_nested_structures() {
    if !python_available() {
        return;
    }
    let result = exec(r#"{"a": [1, 2], "b": {"c": "d"}}"#).unwrap();
    assert_eq!(result["a"], json!([1.0, 2.0]));
    assert_eq!(result["b"], json!({"c": "d"}));
}

#[test]
fn test_result_preserves_key_order() {
    if !python_available() {
        return;
    }
    let result = exec(r#"{"zeta": 1, "alpha": 2, "mid": 3}"#).unwrap();
    let keys: Vec<_> = result.as_object().unwrap().keys().cloned().collect();
    assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
}

#[test]
fn test_non_json_result() {
    if !python_available() {
        return;
    }
    let err = exec("{1, 2, 3}").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Decode);
    assert_eq!(err.context(), "json.dumps");

    let err = exec("float('nan')").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Decode);
}

#[test]
fn test_input_roundtrip() {
    if !python_available() {
        return;
    }
    let input = json!({
        "null": null,
        "flag": true,
        "off": false,
        "number": 1.5,
        "negative": -3.0,
        "text": "héllo \"quoted\" 😀\n",
        "list": [1.0, "two", [3.0], {"four": 4.0}],
        "nested": {"deep": {"deeper": [null, false]}},
        "empty_list": [],
        "empty_map": {},
    });
    let result = pyexec::exec("input", Some(&input)).unwrap();
    assert_eq!(result, input);
}

#[test]
fn test_integers_come_back_as_floats() {
    if !python_available() {
        return;
    }
    let result = pyexec::exec("[n, n * 2]", Some(&json!({"n": 21}))).unwrap();
    assert_eq!(result, json!([21.0, 42.0]));
    assert!(result[0].is_f64());
}

#[test]
fn test_input_overrides_builtins() {
    if !python_available() {
        return;
    }
    let result = pyexec::exec("len", Some(&json!({"len": 5}))).unwrap();
    assert_eq!(result, json!(5.0));

    // Only for that call.
    assert_eq!(exec("len([1, 2, 3])").unwrap(), json!(3.0));
}

#[test]
fn test_invalid_identifier_key() {
    if !python_available() {
        return;
    }
    let result = pyexec::exec(r#"globals()["x-y"]"#, Some(&json!({"x-y": 3}))).unwrap();
    assert_eq!(result, json!(3.0));
}

#[test]
fn test_input_mapping_and_names() {
    if !python_available() {
        return;
    }
    let result = pyexec::exec(r#"input["a"] + b"#, Some(&json!({"a": 1, "b": 2}))).unwrap();
    assert_eq!(result, json!(3.0));
}

#[test]
fn test_input_key_named_input() {
    if !python_available() {
        return;
    }
    let result = pyexec::exec("input", Some(&json!({"input": 9}))).unwrap();
    assert_eq!(result, json!(9.0));
}

#[test]
fn test_input_mutation_does_not_leak() {
    if !python_available() {
        return;
    }
    let mut input = HashMap::new();
    input.insert("x".to_string(), 1);
    let result = pyexec::exec("input[\"x\"] = 6\ninput[\"x\"]", Some(&input)).unwrap();
    assert_eq!(result, json!(6.0));
    assert_eq!(input["x"], 1);
}

#[test]
fn test_isolation_across_calls() {
    if !python_available() {
        return;
    }
    assert_eq!(exec("marker = 7\nmarker").unwrap(), json!(7.0));
    assert_eq!(exec(r#"globals().get("marker")"#).unwrap(), Value::Null);
}

#[test]
fn test_runtime_exec_method() {
    if !python_available() {
        return;
    }
    let rt = pyexec::runtime().unwrap();
    let result = rt.exec("sorted(words)", Some(&json!({"words": ["b", "c", "a"]}))).unwrap();
    assert_eq!(result, json!(["a", "b", "c"]));
}
