#![forbid(unsafe_code)]

//! Effect-request trees and the flattener.
//!
//! An [`Effect`] is the bag of work an `init`/`update` cycle asks the
//! environment to perform: nothing, a batch, a mapped subtree, or a leaf
//! (a task, an effect-manager request, or a port). [`flatten`] walks the
//! tree depth-first, left to right, emitting leaves in declaration order
//! with every wrapping tagger composed inside-out onto the leaf's result.
//!
//! Mapping genuinely changes the message type: `Effect<Child>::map(f)`
//! yields an `Effect<Parent>`, with the child subtree type-erased behind
//! the `Map` node until flattening composes `f` onto each leaf.

use std::rc::Rc;

use serde_json::{Value, json};

use crate::task::{Task, TaskResult};

/// A tagger lifting a channel's raw value into an application message.
pub type MsgTagger<Msg> = Rc<dyn Fn(Value) -> Msg>;

/// How a task's final result becomes an application message.
pub enum TaskTagger<Msg> {
    /// Tag the success value; a failure is recorded as an application
    /// error instead of producing a message.
    Perform(Rc<dyn Fn(Value) -> Msg>),
    /// Tag the full result, success or failure.
    Attempt(Rc<dyn Fn(TaskResult) -> Msg>),
    /// Discard the result entirely (spawned / fire-and-forget work).
    Discard,
}

impl<Msg> Clone for TaskTagger<Msg> {
    fn clone(&self) -> Self {
        match self {
            Self::Perform(f) => Self::Perform(f.clone()),
            Self::Attempt(f) => Self::Attempt(f.clone()),
            Self::Discard => Self::Discard,
        }
    }
}

impl<Msg: 'static> TaskTagger<Msg> {
    fn map<Out: 'static>(self, f: Rc<dyn Fn(Msg) -> Out>) -> TaskTagger<Out> {
        match self {
            Self::Perform(g) => TaskTagger::Perform(Rc::new(move |value| f(g(value)))),
            Self::Attempt(g) => TaskTagger::Attempt(Rc::new(move |result| f(g(result)))),
            Self::Discard => TaskTagger::Discard,
        }
    }
}

/// A tree of requested effects.
///
/// Trees are write-only values assembled by the application and consumed
/// by [`flatten`]; they never inspect their own payloads.
pub enum Effect<Msg: 'static> {
    /// No effect.
    None,
    /// An ordered batch of subtrees.
    Batch(Vec<Effect<Msg>>),
    /// A task leaf with its result tagger.
    Task { task: Task, tagger: TaskTagger<Msg> },
    /// A leaf addressed to a named effect-manager channel. Subscriptions
    /// carry a tagger for values the channel delivers; commands carry none.
    Manager {
        channel: String,
        payload: Value,
        tagger: Option<MsgTagger<Msg>>,
    },
    /// An outgoing message to an externally supplied port. Port commands
    /// never produce messages, so mapping leaves them untouched.
    Port { name: String, payload: Value },
    /// A subscription to values arriving on an externally supplied port.
    PortSub { name: String, tagger: MsgTagger<Msg> },
    /// A subtree whose message type has been remapped.
    Map(Box<dyn MappedEffect<Msg>>),
}

impl<Msg: 'static> Effect<Msg> {
    /// No effect.
    pub fn none() -> Self {
        Self::None
    }

    /// Batch `effects` in order. An empty batch collapses to [`Effect::None`]
    /// and a singleton collapses to its only child.
    pub fn batch(effects: Vec<Self>) -> Self {
        let mut effects = effects;
        match effects.len() {
            0 => Self::None,
            1 => effects.remove(0),
            _ => Self::Batch(effects),
        }
    }

    /// Run `task`, tagging its success value with `to_msg`. A failure is
    /// recorded as an application error.
    pub fn perform(task: Task, to_msg: impl Fn(Value) -> Msg + 'static) -> Self {
        Self::Task {
            task,
            tagger: TaskTagger::Perform(Rc::new(to_msg)),
        }
    }

    /// Run `task`, tagging its full result with `to_msg`.
    pub fn attempt(task: Task, to_msg: impl Fn(TaskResult) -> Msg + 'static) -> Self {
        Self::Task {
            task,
            tagger: TaskTagger::Attempt(Rc::new(to_msg)),
        }
    }

    /// Run `task` and discard its result.
    pub fn discard(task: Task) -> Self {
        Self::Task {
            task,
            tagger: TaskTagger::Discard,
        }
    }

    /// A command addressed to the effect-manager channel `channel`.
    pub fn manager(channel: impl Into<String>, payload: Value) -> Self {
        Self::Manager {
            channel: channel.into(),
            payload,
            tagger: None,
        }
    }

    /// A subscription to the effect-manager channel `channel`; delivered
    /// values are tagged with `tagger`.
    pub fn manager_sub(
        channel: impl Into<String>,
        payload: Value,
        tagger: impl Fn(Value) -> Msg + 'static,
    ) -> Self {
        Self::Manager {
            channel: channel.into(),
            payload,
            tagger: Some(Rc::new(tagger)),
        }
    }

    /// An outgoing port command.
    pub fn port(name: impl Into<String>, payload: Value) -> Self {
        Self::Port {
            name: name.into(),
            payload,
        }
    }

    /// A subscription to an incoming port.
    pub fn port_sub(name: impl Into<String>, tagger: impl Fn(Value) -> Msg + 'static) -> Self {
        Self::PortSub {
            name: name.into(),
            tagger: Rc::new(tagger),
        }
    }

    /// Remap this tree's messages through `f`.
    pub fn map<Out: 'static>(self, f: impl Fn(Msg) -> Out + 'static) -> Effect<Out> {
        Effect::Map(Box::new(Mapped {
            tagger: Rc::new(f),
            inner: self,
        }))
    }
}

impl<Msg: 'static> Default for Effect<Msg> {
    fn default() -> Self {
        Self::None
    }
}

/// A type-erased mapped subtree. The only thing a `Map` node can do is
/// flatten itself with the outer tagger composed on.
pub trait MappedEffect<Msg> {
    fn flatten_into(self: Box<Self>, out: &mut Vec<FlatLeaf<Msg>>);
}

struct Mapped<In: 'static, Out: 'static> {
    tagger: Rc<dyn Fn(In) -> Out>,
    inner: Effect<In>,
}

impl<In: 'static, Out: 'static> MappedEffect<Out> for Mapped<In, Out> {
    fn flatten_into(self: Box<Self>, out: &mut Vec<FlatLeaf<Out>>) {
        let Mapped { tagger, inner } = *self;
        for leaf in flatten(inner) {
            out.push(leaf.map(tagger.clone()));
        }
    }
}

/// A single leaf emitted by the flattener, with every wrapping tagger
/// already composed onto its result path.
pub enum FlatLeaf<Msg: 'static> {
    Task {
        task: Task,
        tagger: TaskTagger<Msg>,
    },
    Manager {
        channel: String,
        payload: Value,
        tagger: Option<MsgTagger<Msg>>,
    },
    Port {
        name: String,
        payload: Value,
    },
    PortSub {
        name: String,
        tagger: MsgTagger<Msg>,
    },
}

impl<Msg: 'static> FlatLeaf<Msg> {
    fn map<Out: 'static>(self, f: Rc<dyn Fn(Msg) -> Out>) -> FlatLeaf<Out> {
        match self {
            Self::Task { task, tagger } => FlatLeaf::Task {
                task,
                tagger: tagger.map(f),
            },
            Self::Manager {
                channel,
                payload,
                tagger,
            } => FlatLeaf::Manager {
                channel,
                payload,
                tagger: tagger.map(|g| {
                    let f = f.clone();
                    Rc::new(move |value| f(g(value))) as MsgTagger<Out>
                }),
            },
            Self::Port { name, payload } => FlatLeaf::Port { name, payload },
            Self::PortSub { name, tagger: g } => FlatLeaf::PortSub {
                name,
                tagger: Rc::new(move |value| f(g(value))),
            },
        }
    }

    /// Structural `(channel, payload)` shape, for pending-effect equality
    /// and log messages. Task leaves live on the reserved `Task` channel.
    pub fn descriptor(&self) -> Value {
        match self {
            Self::Task { task, .. } => json!({ "channel": "Task", "payload": task.describe() }),
            Self::Manager {
                channel, payload, ..
            } => json!({ "channel": channel, "payload": payload }),
            Self::Port { name, payload } => json!({ "channel": name, "payload": payload }),
            Self::PortSub { name, .. } => {
                json!({ "channel": name, "payload": "subscription" })
            }
        }
    }
}

/// Flatten `effect` into its leaves, depth-first and left to right.
///
/// Flattening is total and side-effect-free: it preserves declaration
/// order and never inspects leaf payload semantics, only tree shape.
pub fn flatten<Msg: 'static>(effect: Effect<Msg>) -> Vec<FlatLeaf<Msg>> {
    let mut out = Vec::new();
    flatten_into(effect, &mut out);
    out
}

fn flatten_into<Msg: 'static>(effect: Effect<Msg>, out: &mut Vec<FlatLeaf<Msg>>) {
    match effect {
        Effect::None => {}
        Effect::Batch(children) => {
            for child in children {
                flatten_into(child, out);
            }
        }
        Effect::Map(mapped) => mapped.flatten_into(out),
        Effect::Task { task, tagger } => out.push(FlatLeaf::Task { task, tagger }),
        Effect::Manager {
            channel,
            payload,
            tagger,
        } => out.push(FlatLeaf::Manager {
            channel,
            payload,
            tagger,
        }),
        Effect::Port { name, payload } => out.push(FlatLeaf::Port { name, payload }),
        Effect::PortSub { name, tagger } => out.push(FlatLeaf::PortSub { name, tagger }),
    }
}
