#![forbid(unsafe_code)]

//! Simulation error taxonomy.
//!
//! Two of the three failure classes live here:
//!
//! - **Defects** mean the simulation itself is incomplete or misassembled
//!   (an unregistered channel, a subscription leaf in a command position).
//!   The driver halts on these immediately.
//! - **Usage errors** are caller mistakes in a test (a batched expectation,
//!   resolving a task that is not pending). These come back as `Err`.
//!
//! Application failures — a reducer path that resolves to `Fail` — are not
//! represented here: the driver records them as data and surfaces them
//! through `model()`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimulationError {
    /// Defect: an effect leaf was addressed to a channel the registry has
    /// never heard of.
    #[error("no effect channel named `{channel}` is registered with the simulation")]
    UnknownChannel { channel: String },

    /// Defect: two channels were registered under the same name. Channels
    /// are registered once per registry lifetime.
    #[error("effect channel `{channel}` is already registered")]
    DuplicateChannel { channel: String },

    /// Defect: a subscription produced a command-only leaf.
    #[error("command leaf `{leaf}` cannot appear in a subscription context")]
    CommandInSubscription { leaf: String },

    /// Defect: a subscription leaf appeared among requested commands.
    #[error("subscription leaf `{leaf}` cannot appear in a command context")]
    SubscriptionInCommand { leaf: String },

    /// Usage error: a pending-effect expectation must flatten to exactly
    /// one leaf. `count` is what it actually flattened to, so an empty
    /// expectation reports 0 and a batch reports its width.
    #[error("a pending-effect expectation must flatten to exactly one leaf, got {count}")]
    ExpectationNotSingleLeaf { count: usize },

    /// Usage error: `resolve_task` found nothing to resolve.
    #[error("no pending task matches {matcher}")]
    NoMatchingEffect { matcher: String },

    /// Usage error: `send` was addressed to neither a registered channel
    /// nor an active port subscription.
    #[error("`{name}` is neither a registered channel nor an active port subscription")]
    UnknownSendTarget { name: String },
}
