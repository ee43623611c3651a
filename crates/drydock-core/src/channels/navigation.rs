#![forbid(unsafe_code)]

//! The virtual navigation channel.
//!
//! The simulated browser location starts at a fixed test URL. The
//! `replace_state`/`push_state` commands rewrite it (replacing or growing
//! the history), and every change is delivered through `new_url`
//! subscriptions. Back/forward traversal and reloads are not modeled.
//!
//! Channel state shape: `{"location": url, "history": [urls...]}`.

use serde_json::{Value, json};

use crate::effect::Effect;
use crate::manager::{ChannelAction, EffectChannel};

/// The channel's registered name.
pub const CHANNEL: &str = "Navigation";

/// The location every simulation starts at.
pub const INITIAL_LOCATION: &str = "https://elm.testable/";

/// Replace the current history entry with `url`.
pub fn replace_state<Msg: 'static>(url: impl Into<String>) -> Effect<Msg> {
    Effect::manager(CHANNEL, json!({ "replaceState": url.into() }))
}

/// Push `url` as a new history entry.
pub fn push_state<Msg: 'static>(url: impl Into<String>) -> Effect<Msg> {
    Effect::manager(CHANNEL, json!({ "pushState": url.into() }))
}

/// Subscribe to location changes. The tagger receives the new URL.
pub fn new_url<Msg: 'static>(tagger: impl Fn(Value) -> Msg + 'static) -> Effect<Msg> {
    Effect::manager_sub(CHANNEL, sub_payload(), tagger)
}

/// The payload shape `new_url` subscriptions carry.
pub fn sub_payload() -> Value {
    json!("newUrl")
}

pub fn channel() -> EffectChannel {
    EffectChannel::new(
        CHANNEL,
        json!({ "location": INITIAL_LOCATION, "history": [INITIAL_LOCATION] }),
        on_effects,
        on_self_msg,
    )
}

fn on_effects(cmds: &[Value], _subs: &[Value], state: Value) -> (Value, Vec<ChannelAction>) {
    let mut location = state
        .get("location")
        .and_then(Value::as_str)
        .unwrap_or(INITIAL_LOCATION)
        .to_string();
    let mut history: Vec<Value> = state
        .get("history")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_else(|| vec![json!(INITIAL_LOCATION)]);
    let mut actions = Vec::new();

    for cmd in cmds {
        let changed = if let Some(url) = cmd.get("replaceState").and_then(Value::as_str) {
            history.pop();
            history.push(json!(url));
            Some(url)
        } else if let Some(url) = cmd.get("pushState").and_then(Value::as_str) {
            history.push(json!(url));
            Some(url)
        } else {
            None
        };
        if let Some(url) = changed {
            location = url.to_string();
            actions.push(ChannelAction::ToApp {
                sub: sub_payload(),
                value: json!(url),
            });
        }
    }

    (json!({ "location": location, "history": history }), actions)
}

fn on_self_msg(_msg: Value, state: Value) -> (Value, Vec<ChannelAction>) {
    (state, vec![])
}
