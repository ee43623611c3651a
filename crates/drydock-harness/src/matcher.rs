#![forbid(unsafe_code)]

//! Matchers selecting which pending task a test wants to resolve.

use std::fmt;
use std::time::Duration;

use serde_json::Value;

use drydock_core::Task;
use drydock_core::task::millis;

/// Selects a pending task leaf by shape.
///
/// The named constructors cover the built-in leaf kinds; [`TaskMatcher::leaf`]
/// matches on the leaf's canonical JSON shape for anything custom.
pub struct TaskMatcher {
    description: String,
    predicate: Box<dyn Fn(&Task) -> bool>,
}

impl TaskMatcher {
    /// Match an HTTP request by method and URL.
    pub fn http_request(method: impl Into<String>, url: impl Into<String>) -> Self {
        let method = method.into();
        let url = url.into();
        Self {
            description: format!("httpRequest {method} {url}"),
            predicate: Box::new(move |leaf| {
                matches!(
                    leaf,
                    Task::HttpRequest { method: m, url: u, .. } if *m == method && *u == url
                )
            }),
        }
    }

    /// Match a sleep of exactly `duration`.
    pub fn sleep(duration: Duration) -> Self {
        Self {
            description: format!("sleep {}ms", millis(duration)),
            predicate: Box::new(move |leaf| {
                matches!(leaf, Task::Sleep(d) if *d == duration)
            }),
        }
    }

    /// Match a mock task by tag.
    pub fn mock(tag: impl Into<String>) -> Self {
        let tag = tag.into();
        Self {
            description: format!("mockTask {tag:?}"),
            predicate: Box::new(move |leaf| matches!(leaf, Task::Mock(t) if *t == tag)),
        }
    }

    /// Match a web socket open by URL.
    pub fn web_socket_open(url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            description: format!("webSocketOpen {url}"),
            predicate: Box::new(move |leaf| {
                matches!(leaf, Task::WebSocketOpen { url: u, .. } if *u == url)
            }),
        }
    }

    /// Match a web socket send by connection handle.
    pub fn web_socket_send(handle: Value) -> Self {
        Self {
            description: format!("webSocketSend {handle}"),
            predicate: Box::new(move |leaf| {
                matches!(leaf, Task::WebSocketSend { handle: h, .. } if *h == handle)
            }),
        }
    }

    /// Match on the leaf's canonical JSON shape.
    pub fn leaf(
        description: impl Into<String>,
        predicate: impl Fn(&Value) -> bool + 'static,
    ) -> Self {
        Self {
            description: description.into(),
            predicate: Box::new(move |leaf| predicate(&leaf.describe())),
        }
    }

    pub fn matches(&self, leaf: &Task) -> bool {
        (self.predicate)(leaf)
    }
}

impl fmt::Display for TaskMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description)
    }
}

impl fmt::Debug for TaskMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TaskMatcher({})", self.description)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn http_matcher_requires_both_method_and_url() {
        let matcher = TaskMatcher::http_request("GET", "/a");
        assert!(matcher.matches(&Task::http_text("GET", "/a")));
        assert!(!matcher.matches(&Task::http_text("POST", "/a")));
        assert!(!matcher.matches(&Task::http_text("GET", "/b")));
    }

    #[test]
    fn sleep_matcher_is_exact() {
        let matcher = TaskMatcher::sleep(Duration::from_millis(100));
        assert!(matcher.matches(&Task::sleep(Duration::from_millis(100))));
        assert!(!matcher.matches(&Task::sleep(Duration::from_millis(101))));
    }

    #[test]
    fn leaf_matcher_sees_canonical_shape() {
        let matcher = TaskMatcher::leaf("any mock", |shape| shape.get("mockTask").is_some());
        assert!(matcher.matches(&Task::mock("anything")));
        assert!(!matcher.matches(&Task::sleep(Duration::from_millis(1))));
    }

    #[test]
    fn display_names_the_shape() {
        assert_eq!(
            TaskMatcher::http_request("GET", "/a").to_string(),
            "httpRequest GET /a"
        );
    }

    #[test]
    fn web_socket_send_matches_on_handle() {
        let matcher = TaskMatcher::web_socket_send(json!("ws://a"));
        assert!(matcher.matches(&Task::web_socket_send(json!("ws://a"), json!("payload"))));
        assert!(!matcher.matches(&Task::web_socket_send(json!("ws://b"), json!("payload"))));
    }
}
