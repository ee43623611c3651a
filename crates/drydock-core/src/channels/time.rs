#![forbid(unsafe_code)]

//! The virtual time channel.
//!
//! `every(interval, tagger)` subscribes to a repeating tick. No real timer
//! exists: the driver forwards each `advance_time` call to this channel as
//! an `{"advance": ms}` self message, and the channel fires one tick per
//! fully elapsed interval, delivering the accumulated virtual time (in
//! milliseconds) through the matching subscriptions.
//!
//! Channel state shape:
//! `{"now": ms, "intervals": {"<interval ms>": elapsed_ms}}` — one
//! accumulator per active interval, kept across cycles while the
//! subscription stays declared and dropped when it goes away.

use std::time::Duration;

use serde_json::{Map, Value, json};

use crate::effect::Effect;
use crate::manager::{ChannelAction, EffectChannel};
use crate::task::millis;

/// The channel's registered name.
pub const CHANNEL: &str = "Time";

/// Subscribe to a tick every `interval` of virtual time. The tagger
/// receives the current virtual time in milliseconds.
pub fn every<Msg: 'static>(
    interval: Duration,
    tagger: impl Fn(Value) -> Msg + 'static,
) -> Effect<Msg> {
    Effect::manager_sub(CHANNEL, sub_payload(interval), tagger)
}

/// The payload shape `every` subscriptions carry.
pub fn sub_payload(interval: Duration) -> Value {
    json!({ "every": millis(interval) })
}

/// The self message the driver sends when virtual time advances.
pub fn advance_msg(delta: Duration) -> Value {
    json!({ "advance": millis(delta) })
}

pub fn channel() -> EffectChannel {
    EffectChannel::new(
        CHANNEL,
        json!({ "now": 0.0, "intervals": {} }),
        on_effects,
        on_self_msg,
    )
}

fn on_effects(_cmds: &[Value], subs: &[Value], state: Value) -> (Value, Vec<ChannelAction>) {
    let now = field_f64(&state, "now");
    let old = interval_table(&state);

    // Keep accumulators for intervals still subscribed, start fresh ones
    // for new intervals, drop the rest.
    let mut intervals = Map::new();
    for sub in subs {
        if let Some(interval) = sub.get("every").and_then(Value::as_f64) {
            let key = interval.to_string();
            let elapsed = old.get(&key).and_then(Value::as_f64).unwrap_or(0.0);
            intervals.insert(key, json!(elapsed));
        }
    }

    (
        json!({ "now": now, "intervals": intervals }),
        vec![],
    )
}

fn on_self_msg(msg: Value, state: Value) -> (Value, Vec<ChannelAction>) {
    let Some(delta) = msg.get("advance").and_then(Value::as_f64) else {
        return (state, vec![]);
    };

    let now = field_f64(&state, "now") + delta;
    let mut actions = Vec::new();
    let mut intervals = Map::new();

    for (key, elapsed) in interval_table(&state) {
        let Ok(interval) = key.parse::<f64>() else {
            continue;
        };
        let mut elapsed = elapsed.as_f64().unwrap_or(0.0) + delta;
        if interval > 0.0 {
            while elapsed >= interval {
                elapsed -= interval;
                actions.push(ChannelAction::ToApp {
                    sub: json!({ "every": interval }),
                    value: json!(now - elapsed),
                });
            }
        }
        intervals.insert(key, json!(elapsed));
    }

    (json!({ "now": now, "intervals": intervals }), actions)
}

fn field_f64(state: &Value, field: &str) -> f64 {
    state.get(field).and_then(Value::as_f64).unwrap_or(0.0)
}

fn interval_table(state: &Value) -> Map<String, Value> {
    state
        .get("intervals")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default()
}
