#![forbid(unsafe_code)]

//! The effect-manager channel protocol.
//!
//! An [`EffectChannel`] is a test-controlled stand-in for a pluggable host
//! subsystem (timers, sockets, navigation). It keeps the host's
//! three-entry-point shape — an initial state, `on_effects` for the
//! commands and subscriptions of one cycle, and `on_self_msg` for messages
//! the channel sends itself — but never touches an OS resource.
//!
//! Channel state is a [`Value`] owned by the driver; each entry point
//! consumes the old state and returns the new one alongside the actions
//! the channel wants routed. Self-addressed actions re-enter the same
//! channel's `on_self_msg`: the driver attributes them by the channel's
//! own name, so a channel never has to know where it is registered.

use std::fmt;
use std::rc::Rc;

use serde_json::Value;

/// An action a channel asks the driver to route.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelAction {
    /// Deliver `value` to the application, through every active
    /// subscription of this channel whose payload equals `sub`.
    ToApp { sub: Value, value: Value },
    /// Re-enter this channel's own `on_self_msg` with `value`.
    ToSelf(Value),
}

type OnEffects = Rc<dyn Fn(&[Value], &[Value], Value) -> (Value, Vec<ChannelAction>)>;
type OnSelfMsg = Rc<dyn Fn(Value, Value) -> (Value, Vec<ChannelAction>)>;

/// A named, pluggable effect channel.
#[derive(Clone)]
pub struct EffectChannel {
    name: String,
    init: Value,
    on_effects: OnEffects,
    on_self_msg: OnSelfMsg,
}

impl EffectChannel {
    pub fn new(
        name: impl Into<String>,
        init: Value,
        on_effects: impl Fn(&[Value], &[Value], Value) -> (Value, Vec<ChannelAction>) + 'static,
        on_self_msg: impl Fn(Value, Value) -> (Value, Vec<ChannelAction>) + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            init,
            on_effects: Rc::new(on_effects),
            on_self_msg: Rc::new(on_self_msg),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The channel's initial state, snapshotted once per test run.
    pub fn init(&self) -> Value {
        self.init.clone()
    }

    /// Hand the channel one cycle's commands and active subscriptions.
    pub fn on_effects(
        &self,
        cmds: &[Value],
        subs: &[Value],
        state: Value,
    ) -> (Value, Vec<ChannelAction>) {
        tracing::trace!(
            target: "drydock.channel",
            channel = %self.name,
            cmds = cmds.len(),
            subs = subs.len(),
            "dispatching effects to channel"
        );
        (self.on_effects)(cmds, subs, state)
    }

    /// Deliver a self-addressed message to the channel.
    pub fn on_self_msg(&self, msg: Value, state: Value) -> (Value, Vec<ChannelAction>) {
        tracing::trace!(
            target: "drydock.channel",
            channel = %self.name,
            msg = %msg,
            "delivering self message to channel"
        );
        (self.on_self_msg)(msg, state)
    }
}

impl fmt::Debug for EffectChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectChannel")
            .field("name", &self.name)
            .field("init", &self.init)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn counting_channel() -> EffectChannel {
        EffectChannel::new(
            "Count",
            json!(0),
            |cmds, subs, state| {
                let next = state.as_i64().unwrap() + cmds.len() as i64 + subs.len() as i64;
                (json!(next), vec![])
            },
            |msg, state| {
                let next = state.as_i64().unwrap() + 1;
                (
                    json!(next),
                    vec![ChannelAction::ToApp {
                        sub: msg,
                        value: json!(next),
                    }],
                )
            },
        )
    }

    #[test]
    fn on_effects_threads_state() {
        let channel = counting_channel();
        let (state, actions) = channel.on_effects(&[json!("a")], &[json!("b")], channel.init());
        assert_eq!(state, json!(2));
        assert!(actions.is_empty());
    }

    #[test]
    fn on_self_msg_can_route_to_app() {
        let channel = counting_channel();
        let (state, actions) = channel.on_self_msg(json!("tick"), json!(4));
        assert_eq!(state, json!(5));
        assert_eq!(
            actions,
            vec![ChannelAction::ToApp {
                sub: json!("tick"),
                value: json!(5)
            }]
        );
    }
}
