#![forbid(unsafe_code)]

//! Mocked HTTP responses.
//!
//! When a test resolves a pending HTTP request with `Ok(body)`, the driver
//! wraps the body in the full response record a real transport would have
//! produced and feeds it through the request's `expect` decoder. An
//! `Err(reason)` fails the task with the reason unchanged.

use serde_json::{Value, json};

use drydock_core::Task;
use drydock_core::task::TaskResult;

/// The response record a successful mocked request produces: a 200 OK
/// around the supplied body.
pub fn text_response(url: &str, body: Value) -> Value {
    json!({
        "url": url,
        "status": { "code": 200, "message": "OK" },
        "headers": {},
        "body": body,
    })
}

/// Adapt a raw test-supplied result to what the suspended task chain
/// expects from its leaf. HTTP leaves decode their response; every other
/// leaf takes the result unchanged.
pub fn adapt_leaf_result(leaf: &Task, result: TaskResult) -> TaskResult {
    match leaf {
        Task::HttpRequest { url, expect, .. } => match result {
            Ok(body) => expect(text_response(url, body)),
            Err(reason) => Err(reason),
        },
        _ => result,
    }
}
