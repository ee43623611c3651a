#![forbid(unsafe_code)]

//! drydock core
//!
//! This crate provides the building blocks for simulating a reactive
//! application's effects without performing any real I/O:
//!
//! - [`Task`] - an immutable description of an asynchronous computation,
//!   with synchronous reduction rules ([`resolve`])
//! - [`Effect`] - a tree of batched/mapped effect requests, flattened into
//!   an ordered list of leaves with composed message taggers ([`flatten`])
//! - [`EffectChannel`] - the three-entry-point protocol of a pluggable
//!   effect manager (init / on_effects / on_self_msg)
//! - [`ChannelRegistry`] - the build-once, read-only table of virtualized
//!   channels, with [`ChannelRegistry::standard`] providing the built-in
//!   time, web socket, and navigation channels
//!
//! # Role in drydock
//! `drydock-core` is pure bookkeeping: nothing here touches a clock,
//! socket, or timer. The `drydock-harness` crate owns the test driver
//! that applies a reducer, resolves tasks to a synchronous fixpoint, and
//! exposes the remaining leaves for inspection.

pub mod channels;
pub mod effect;
pub mod error;
pub mod manager;
pub mod registry;
pub mod task;

pub use effect::{Effect, FlatLeaf, MsgTagger, TaskTagger, flatten};
pub use error::SimulationError;
pub use manager::{ChannelAction, EffectChannel};
pub use registry::{ChannelRegistry, ChannelRegistryBuilder};
pub use task::{PendingTask, Resolution, Task, TaskResult, resolve};
