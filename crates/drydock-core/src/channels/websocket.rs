#![forbid(unsafe_code)]

//! The virtual web socket channel.
//!
//! `listen(url, tagger)` subscribes to frames arriving on a connection.
//! No socket is ever opened: a test injects a frame by sending this
//! channel a `{"message": {"url": ..., "data": ...}}` self message, and
//! the channel delivers the data through the matching listeners. Frames
//! for URLs nobody listens to are dropped, like a real socket manager
//! dropping traffic for closed connections.
//!
//! Channel state shape: `{"listening": [urls...]}`.

use serde_json::{Value, json};

use crate::effect::Effect;
use crate::manager::{ChannelAction, EffectChannel};

/// The channel's registered name.
pub const CHANNEL: &str = "WebSocket";

/// Subscribe to frames arriving on the connection to `url`. The tagger
/// receives each frame's data.
pub fn listen<Msg: 'static>(
    url: impl Into<String>,
    tagger: impl Fn(Value) -> Msg + 'static,
) -> Effect<Msg> {
    Effect::manager_sub(CHANNEL, sub_payload(url), tagger)
}

/// The payload shape `listen` subscriptions carry.
pub fn sub_payload(url: impl Into<String>) -> Value {
    json!({ "listen": url.into() })
}

/// The self message a test sends to inject an incoming frame.
pub fn message_msg(url: impl Into<String>, data: Value) -> Value {
    json!({ "message": { "url": url.into(), "data": data } })
}

pub fn channel() -> EffectChannel {
    EffectChannel::new(
        CHANNEL,
        json!({ "listening": [] }),
        on_effects,
        on_self_msg,
    )
}

fn on_effects(_cmds: &[Value], subs: &[Value], _state: Value) -> (Value, Vec<ChannelAction>) {
    let listening: Vec<Value> = subs
        .iter()
        .filter_map(|sub| sub.get("listen").cloned())
        .collect();
    (json!({ "listening": listening }), vec![])
}

fn on_self_msg(msg: Value, state: Value) -> (Value, Vec<ChannelAction>) {
    let Some(message) = msg.get("message") else {
        return (state, vec![]);
    };
    let (Some(url), Some(data)) = (message.get("url"), message.get("data")) else {
        return (state, vec![]);
    };

    let listening = state
        .get("listening")
        .and_then(Value::as_array)
        .is_some_and(|urls| urls.contains(url));
    if !listening {
        tracing::debug!(
            target: "drydock.channel",
            url = %url,
            "dropping web socket frame with no listener"
        );
        return (state, vec![]);
    }

    let actions = vec![ChannelAction::ToApp {
        sub: json!({ "listen": url }),
        value: data.clone(),
    }];
    (state, actions)
}
