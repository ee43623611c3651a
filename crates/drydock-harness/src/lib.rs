#![forbid(unsafe_code)]

//! drydock harness
//!
//! The test driver for simulated reactive applications. Given a
//! [`SimulatedApp`] (init / update / subscriptions), a [`TestDriver`]
//! runs the application's full effect behavior with no real I/O:
//!
//! - `start` and `update` resolve every task the algebra can finish and
//!   feed the resulting messages back through the reducer until nothing
//!   more can happen without external input (the synchronous fixpoint)
//! - leaves that need external input accumulate as pending effects,
//!   inspectable with [`TestDriver::has_pending_effect`] and resolvable
//!   with [`TestDriver::resolve_task`] plus a [`TaskMatcher`]
//! - [`TestDriver::advance_time`] drives a virtual clock, firing due
//!   sleeps, intervals, and time-channel subscriptions in order
//! - [`TestDriver::send`] injects values arriving on ports or channels
//!
//! Everything is single-threaded and deterministic: two tests applying
//! the same messages from the same model observe the same pending set.

pub mod driver;
pub mod http;
pub mod matcher;
pub mod program;

pub use driver::TestDriver;
pub use matcher::TaskMatcher;
pub use program::SimulatedApp;

pub use drydock_core::{
    ChannelAction, ChannelRegistry, Effect, EffectChannel, SimulationError, Task, TaskResult,
    channels,
};
