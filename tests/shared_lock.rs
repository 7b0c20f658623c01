//! Calls run in the main interpreter under the shared lock
//!
//! This binary initializes the process runtime with `Isolation::SharedLock`,
//! so namespaces are isolated by a fresh globals dict only.

use std::thread;

use pyexec::{Config, Isolation, Value};
use serde_json::json;

fn shared_runtime() -> bool {
    let config = match Config::from_env() {
        Ok(config) => config.with_isolation(Isolation::SharedLock),
        Err(e) => {
            eprintln!("skipping, bad environment: {}", e);
            return false;
        }
    };
    match pyexec::initialize(config) {
        Ok(rt) => {
            assert_eq!(rt.isolation(), Isolation::SharedLock);
            true
        }
        Err(e) => {
            eprintln!("skipping, libpython unavailable: {}", e);
            false
        }
    }
}

#[test]
fn test_shared_basic() {
    if !shared_runtime() {
        return;
    }
    let result = pyexec::exec("a = x * 2\na + 1", Some(&json!({"x": 20}))).unwrap();
    assert_eq!(result, json!(41.0));
}

#[test]
fn test_shared_isolation_across_calls() {
    if !shared_runtime() {
        return;
    }
    assert_eq!(pyexec::exec::<Value>("marker = 7\nmarker", None).unwrap(), json!(7.0));
    assert_eq!(pyexec::exec::<Value>(r#"globals().get("marker")"#, None).unwrap(), Value::Null);
}

#[test]
fn test_shared_builtin_override() {
    if !shared_runtime() {
        return;
    }
    assert_eq!(pyexec::exec("len", Some(&json!({"len": 5}))).unwrap(), json!(5.0));
    assert_eq!(pyexec::exec::<Value>("len('abcd')", None).unwrap(), json!(4.0));
}

#[test]
fn test_shared_error_surfacing() {
    if !shared_runtime() {
        return;
    }
    let err = pyexec::exec::<Value>("1 // 0", None).unwrap_err();
    assert_eq!(err.kind(), pyexec::ErrorKind::Execution);
    assert!(err.message().contains("division"), "{}", err);
}

#[test]
fn test_shared_concurrent_inputs() {
    if !shared_runtime() {
        return;
    }
    let handles: Vec<_> = (0..16)
        .map(|w| {
            thread::spawn(move || {
                let code = "import time\ntime.sleep(0.05)\nw * 10";
                let result = pyexec::exec(code, Some(&json!({"w": w}))).unwrap();
                assert_eq!(result, json!((w * 10) as f64));
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
}
