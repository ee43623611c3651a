#![forbid(unsafe_code)]

//! The build-once, read-only table of virtualized effect channels.
//!
//! A registry is the simulation's snapshot of the host's pluggable
//! channel set: assembled by a builder, frozen by `build()`, and never
//! re-discovered mid-run. The task channel is not in the table (the task
//! algebra and driver handle it specially), and ports are not in the
//! table (they stay opaque named leaves).

use std::collections::HashMap;

use crate::channels;
use crate::error::SimulationError;
use crate::manager::EffectChannel;

/// An ordered, name-indexed, immutable set of effect channels.
#[derive(Debug, Clone)]
pub struct ChannelRegistry {
    channels: Vec<EffectChannel>,
    index: HashMap<String, usize>,
}

impl ChannelRegistry {
    pub fn builder() -> ChannelRegistryBuilder {
        ChannelRegistryBuilder {
            channels: Vec::new(),
        }
    }

    /// The built-in channel set: time, web socket, and navigation, in
    /// that order.
    pub fn standard() -> Self {
        fn assemble() -> Result<ChannelRegistry, SimulationError> {
            Ok(ChannelRegistry::builder()
                .register(channels::time::channel())?
                .register(channels::websocket::channel())?
                .register(channels::navigation::channel())?
                .build())
        }
        match assemble() {
            Ok(registry) => registry,
            // The built-in names are distinct by construction.
            Err(err) => unreachable!("standard registry failed to assemble: {err}"),
        }
    }

    pub fn get(&self, name: &str) -> Option<&EffectChannel> {
        self.index.get(name).map(|&i| &self.channels[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Channels in registration order.
    pub fn all(&self) -> impl Iterator<Item = &EffectChannel> {
        self.channels.iter()
    }
}

/// Assembles a [`ChannelRegistry`].
#[derive(Debug)]
pub struct ChannelRegistryBuilder {
    channels: Vec<EffectChannel>,
}

impl ChannelRegistryBuilder {
    /// Add a channel. Registering the same name twice is a defect.
    pub fn register(mut self, channel: EffectChannel) -> Result<Self, SimulationError> {
        if self.channels.iter().any(|c| c.name() == channel.name()) {
            return Err(SimulationError::DuplicateChannel {
                channel: channel.name().to_string(),
            });
        }
        tracing::debug!(target: "drydock.channel", channel = channel.name(), "registering effect channel");
        self.channels.push(channel);
        Ok(self)
    }

    /// Freeze the table.
    pub fn build(self) -> ChannelRegistry {
        let index = self
            .channels
            .iter()
            .enumerate()
            .map(|(i, c)| (c.name().to_string(), i))
            .collect();
        ChannelRegistry {
            channels: self.channels,
            index,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn noop_channel(name: &str) -> EffectChannel {
        EffectChannel::new(
            name,
            Value::Null,
            |_, _, state| (state, vec![]),
            |_, state| (state, vec![]),
        )
    }

    #[test]
    fn standard_registry_has_builtins_in_order() {
        let registry = ChannelRegistry::standard();
        let names: Vec<&str> = registry.all().map(EffectChannel::name).collect();
        assert_eq!(names, vec!["Time", "WebSocket", "Navigation"]);
    }

    #[test]
    fn standard_registry_excludes_task_channel() {
        assert!(!ChannelRegistry::standard().contains("Task"));
    }

    #[test]
    fn lookup_by_name() {
        let registry = ChannelRegistry::builder()
            .register(noop_channel("A"))
            .unwrap()
            .build();
        assert!(registry.get("A").is_some());
        assert!(registry.get("B").is_none());
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let err = ChannelRegistry::builder()
            .register(noop_channel("A"))
            .unwrap()
            .register(noop_channel("A"))
            .unwrap_err();
        assert!(matches!(err, SimulationError::DuplicateChannel { .. }));
    }

    #[test]
    fn initial_states_come_from_channel_init() {
        let registry = ChannelRegistry::builder()
            .register(EffectChannel::new(
                "Stateful",
                json!({"count": 0}),
                |_, _, state| (state, vec![]),
                |_, state| (state, vec![]),
            ))
            .unwrap()
            .build();
        assert_eq!(registry.get("Stateful").unwrap().init(), json!({"count": 0}));
    }
}
