#![forbid(unsafe_code)]

//! The test driver.
//!
//! A [`TestDriver`] owns the application under simulation, its current
//! model, a virtual clock, the snapshotted states of every virtualized
//! effect channel, and the ordered list of leaf effects still waiting on
//! external resolution.
//!
//! # Sequencing guarantees
//!
//! - Leaves within one flattened batch are processed left to right.
//! - Every message producible without external input is drained before a
//!   driver call returns: self-resolving tasks cascade through the
//!   reducer, subscriptions are reconciled, channel actions are routed,
//!   and the loop repeats until nothing moves.
//! - Pending effects accumulate across updates; only `resolve_task`
//!   removes an entry, and only the entry it resolved.
//! - `advance_time` fires due sleeps and intervals in deadline order
//!   (ties broken by pending order), settling after each, then forwards
//!   the advance to the time channel for `every` subscriptions.
//!
//! # Failure semantics
//!
//! Defects — an unregistered channel, a subscription leaf among commands,
//! a command leaf among subscriptions — mean the simulation itself is
//! incomplete and halt immediately with a panic naming the construct.
//! Usage errors come back as [`SimulationError`]. Application failures
//! (a task chain resolving to `Fail` under `perform`) are recorded and
//! surfaced through [`TestDriver::model`], never silently swallowed.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use serde_json::{Value, json};

use drydock_core::channels::time;
use drydock_core::effect::{Effect, FlatLeaf, MsgTagger, TaskTagger, flatten};
use drydock_core::manager::{ChannelAction, EffectChannel};
use drydock_core::registry::ChannelRegistry;
use drydock_core::task::{PendingTask, Resolution, Task, TaskResult, millis, resolve};
use drydock_core::SimulationError;

use crate::http;
use crate::matcher::TaskMatcher;
use crate::program::SimulatedApp;

/// A leaf effect awaiting external resolution.
enum PendingEffect<Msg: 'static> {
    Task(PendingTaskEffect<Msg>),
    Manager { channel: String, payload: Value },
    Port { name: String, payload: Value },
}

struct PendingTaskEffect<Msg: 'static> {
    pending: PendingTask,
    tagger: TaskTagger<Msg>,
    /// Virtual-clock deadline, for sleep and interval leaves.
    due: Option<Duration>,
}

impl<Msg: 'static> PendingEffect<Msg> {
    fn descriptor(&self) -> Value {
        match self {
            Self::Task(entry) => {
                json!({ "channel": "Task", "payload": entry.pending.leaf().describe() })
            }
            Self::Manager { channel, payload } => {
                json!({ "channel": channel, "payload": payload })
            }
            Self::Port { name, payload } => json!({ "channel": name, "payload": payload }),
        }
    }
}

struct ManagerSub<Msg: 'static> {
    channel: String,
    payload: Value,
    tagger: Option<MsgTagger<Msg>>,
}

struct PortSubscription<Msg: 'static> {
    name: String,
    tagger: MsgTagger<Msg>,
}

/// Work queued within one driver call.
struct Drain<Msg> {
    msgs: VecDeque<Msg>,
    channel_cmds: Vec<(String, Value)>,
}

impl<Msg> Drain<Msg> {
    fn new() -> Self {
        Self {
            msgs: VecDeque::new(),
            channel_cmds: Vec::new(),
        }
    }
}

/// Drives a [`SimulatedApp`] to synchronous fixpoints under test control.
pub struct TestDriver<A: SimulatedApp> {
    app: A,
    model: A::Model,
    registry: ChannelRegistry,
    channel_states: HashMap<String, Value>,
    pending: Vec<PendingEffect<A::Msg>>,
    errors: Vec<String>,
    manager_subs: Vec<ManagerSub<A::Msg>>,
    port_subs: Vec<PortSubscription<A::Msg>>,
    last_flushed_subs: HashMap<String, Vec<Value>>,
    now: Duration,
    next_process: u64,
}

impl<A: SimulatedApp> TestDriver<A> {
    /// Start `app` against the standard channel set (time, web socket,
    /// navigation), cascading its init effects to a fixpoint.
    pub fn start(app: A) -> Self {
        Self::start_with_registry(app, ChannelRegistry::standard())
    }

    /// Start `app` against an explicit channel registry. The registry and
    /// the channel states snapshotted from it are immutable for the run.
    pub fn start_with_registry(app: A, registry: ChannelRegistry) -> Self {
        let channel_states = registry
            .all()
            .map(|channel| (channel.name().to_string(), channel.init()))
            .collect();
        let (model, effect) = app.init();
        let mut driver = Self {
            app,
            model,
            registry,
            channel_states,
            pending: Vec::new(),
            errors: Vec::new(),
            manager_subs: Vec::new(),
            port_subs: Vec::new(),
            last_flushed_subs: HashMap::new(),
            now: Duration::ZERO,
            next_process: 1,
        };
        tracing::debug!(target: "drydock.driver", "starting simulated application");
        let mut drain = Drain::new();
        driver.apply_command(effect, &mut drain);
        driver.settle(drain);
        driver
    }

    /// Apply one message through the reducer and cascade to a fixpoint.
    pub fn update(&mut self, msg: A::Msg) {
        let mut drain = Drain::new();
        drain.msgs.push_back(msg);
        self.settle(drain);
    }

    /// The current model, or the accumulated application failures.
    pub fn model(&self) -> Result<&A::Model, &[String]> {
        if self.errors.is_empty() {
            Ok(&self.model)
        } else {
            Err(&self.errors)
        }
    }

    /// Application failures recorded so far.
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// The current virtual time.
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Canonical `(channel, payload)` shapes of every pending effect, in
    /// arrival order.
    pub fn pending_effects(&self) -> Vec<Value> {
        self.pending.iter().map(PendingEffect::descriptor).collect()
    }

    /// The current state of a registered channel.
    pub fn channel_state(&self, name: &str) -> Option<&Value> {
        self.channel_states.get(name)
    }

    /// Whether a pending effect structurally equals `expected`.
    ///
    /// The expectation must flatten to exactly one leaf; an empty or
    /// batched expectation is a usage error. Equality is on
    /// `(channel, payload)` — taggers are not compared.
    pub fn has_pending_effect(&self, expected: Effect<A::Msg>) -> Result<bool, SimulationError> {
        let leaves = flatten(expected);
        match leaves.as_slice() {
            [leaf] => {
                let descriptor = leaf.descriptor();
                Ok(self
                    .pending
                    .iter()
                    .any(|entry| entry.descriptor() == descriptor))
            }
            other => Err(SimulationError::ExpectationNotSingleLeaf { count: other.len() }),
        }
    }

    /// Resolve the first pending task leaf matching `matcher` with
    /// `result`, removing it and continuing its chain to a fixpoint.
    ///
    /// HTTP leaves receive `Ok(body)` wrapped in a full 200 response and
    /// decoded by the request's `expect`; every other leaf takes the
    /// result as-is.
    pub fn resolve_task(
        &mut self,
        matcher: &TaskMatcher,
        result: TaskResult,
    ) -> Result<(), SimulationError> {
        let position = self.pending.iter().position(|entry| {
            matches!(entry, PendingEffect::Task(t) if matcher.matches(t.pending.leaf()))
        });
        let Some(position) = position else {
            return Err(SimulationError::NoMatchingEffect {
                matcher: matcher.to_string(),
            });
        };
        let PendingEffect::Task(entry) = self.pending.remove(position) else {
            unreachable!("position was selected from task entries");
        };
        tracing::debug!(
            target: "drydock.driver",
            leaf = %entry.pending.leaf().describe(),
            "resolving pending task"
        );

        let adapted = http::adapt_leaf_result(entry.pending.leaf(), result);
        let task = entry.pending.resume(adapted);
        let mut drain = Drain::new();
        self.run_task(task, entry.tagger, &mut drain);
        self.settle(drain);
        Ok(())
    }

    /// Advance the virtual clock by `delta`.
    ///
    /// Due sleep leaves resolve with `null` and interval leaves fire their
    /// child task once per elapsed tick, each cascading before the next
    /// deadline is considered. The advance is then forwarded to the time
    /// channel so `every` subscriptions tick.
    pub fn advance_time(&mut self, delta: Duration) {
        let target = self.now + delta;
        loop {
            let next = self
                .pending
                .iter()
                .enumerate()
                .filter_map(|(index, entry)| match entry {
                    PendingEffect::Task(t) => {
                        t.due.filter(|due| *due <= target).map(|due| (due, index))
                    }
                    _ => None,
                })
                .min();
            let Some((due, index)) = next else {
                break;
            };
            self.now = due;
            self.fire_due_task(index, due);
        }
        self.now = target;

        if let Some(channel) = self.registry.get(time::CHANNEL).cloned() {
            let mut drain = Drain::new();
            self.deliver_self_msg(&channel, time::advance_msg(delta), &mut drain);
            self.settle(drain);
        }
    }

    /// Deliver an externally arriving value.
    ///
    /// `name` may be a registered channel (the value goes through its
    /// `on_self_msg`) or an active port subscription (the value is tagged
    /// straight into the reducer).
    pub fn send(&mut self, name: &str, value: Value) -> Result<(), SimulationError> {
        if let Some(channel) = self.registry.get(name).cloned() {
            let mut drain = Drain::new();
            self.deliver_self_msg(&channel, value, &mut drain);
            self.settle(drain);
            return Ok(());
        }

        let taggers: Vec<MsgTagger<A::Msg>> = self
            .port_subs
            .iter()
            .filter(|sub| sub.name == name)
            .map(|sub| sub.tagger.clone())
            .collect();
        if taggers.is_empty() {
            return Err(SimulationError::UnknownSendTarget {
                name: name.to_string(),
            });
        }
        let mut drain = Drain::new();
        for tagger in taggers {
            drain.msgs.push_back(tagger(value.clone()));
        }
        self.settle(drain);
        Ok(())
    }

    // --- internal machinery ---

    /// Repeat reducer drain / subscription reconcile / channel flush until
    /// nothing moves.
    fn settle(&mut self, mut drain: Drain<A::Msg>) {
        loop {
            while let Some(msg) = drain.msgs.pop_front() {
                let (model, effect) = self.app.update(msg, &self.model);
                self.model = model;
                self.apply_command(effect, &mut drain);
            }
            self.reconcile_subscriptions();
            self.flush_channels(&mut drain);
            if drain.msgs.is_empty() {
                break;
            }
        }
    }

    /// Flatten one command tree, resolving task leaves and queueing the
    /// rest, in declaration order.
    fn apply_command(&mut self, effect: Effect<A::Msg>, drain: &mut Drain<A::Msg>) {
        for leaf in flatten(effect) {
            match leaf {
                FlatLeaf::Task { task, tagger } => self.run_task(task, tagger, drain),
                FlatLeaf::Manager {
                    channel,
                    payload,
                    tagger,
                } => {
                    if tagger.is_some() {
                        halt(SimulationError::SubscriptionInCommand { leaf: channel });
                    }
                    if !self.registry.contains(&channel) {
                        halt(SimulationError::UnknownChannel { channel });
                    }
                    tracing::debug!(
                        target: "drydock.driver",
                        channel = %channel,
                        payload = %payload,
                        "queueing channel command"
                    );
                    self.pending.push(PendingEffect::Manager {
                        channel: channel.clone(),
                        payload: payload.clone(),
                    });
                    drain.channel_cmds.push((channel, payload));
                }
                FlatLeaf::Port { name, payload } => {
                    tracing::debug!(
                        target: "drydock.driver",
                        port = %name,
                        payload = %payload,
                        "recording port command"
                    );
                    self.pending.push(PendingEffect::Port { name, payload });
                }
                FlatLeaf::PortSub { name, .. } => {
                    halt(SimulationError::SubscriptionInCommand { leaf: name });
                }
            }
        }
    }

    /// Reduce a task chain until it completes, suspends on an external
    /// leaf, or is discarded by `Never`.
    fn run_task(&mut self, task: Task, tagger: TaskTagger<A::Msg>, drain: &mut Drain<A::Msg>) {
        let mut task = task;
        loop {
            match resolve(&task) {
                Resolution::Done(result) => {
                    self.dispatch_result(result, &tagger, drain);
                    return;
                }
                Resolution::Pending(pending) => match pending.leaf().clone() {
                    Task::Now => {
                        task = pending.resume(Ok(json!(millis(self.now))));
                    }
                    Task::Spawn(child) => {
                        let process = self.next_process;
                        self.next_process += 1;
                        tracing::debug!(
                            target: "drydock.driver",
                            process,
                            "spawning detached child task"
                        );
                        self.run_task((*child).clone(), TaskTagger::Discard, drain);
                        task = pending.resume(Ok(json!(process)));
                    }
                    Task::Never => {
                        tracing::debug!(
                            target: "drydock.driver",
                            "dropping chain suspended on a task that never resolves"
                        );
                        return;
                    }
                    leaf => {
                        let due = match &leaf {
                            Task::Sleep(duration) => Some(self.now + *duration),
                            Task::SetInterval { interval, .. } => Some(self.now + *interval),
                            _ => None,
                        };
                        tracing::debug!(
                            target: "drydock.driver",
                            leaf = %leaf.describe(),
                            "task suspended; awaiting external resolution"
                        );
                        self.pending.push(PendingEffect::Task(PendingTaskEffect {
                            pending,
                            tagger,
                            due,
                        }));
                        return;
                    }
                },
            }
        }
    }

    fn dispatch_result(
        &mut self,
        result: TaskResult,
        tagger: &TaskTagger<A::Msg>,
        drain: &mut Drain<A::Msg>,
    ) {
        match tagger {
            TaskTagger::Perform(to_msg) => match result {
                Ok(value) => drain.msgs.push_back(to_msg(value)),
                Err(error) => {
                    tracing::warn!(
                        target: "drydock.driver",
                        error = %error,
                        "task chain failed"
                    );
                    self.errors.push(format!("task failed: {error}"));
                }
            },
            TaskTagger::Attempt(to_msg) => drain.msgs.push_back(to_msg(result)),
            TaskTagger::Discard => {}
        }
    }

    /// Re-read the application's subscriptions for the current model.
    fn reconcile_subscriptions(&mut self) {
        let mut manager_subs = Vec::new();
        let mut port_subs = Vec::new();
        for leaf in flatten(self.app.subscriptions(&self.model)) {
            match leaf {
                FlatLeaf::Manager {
                    channel,
                    payload,
                    tagger,
                } => {
                    if !self.registry.contains(&channel) {
                        halt(SimulationError::UnknownChannel { channel });
                    }
                    manager_subs.push(ManagerSub {
                        channel,
                        payload,
                        tagger,
                    });
                }
                FlatLeaf::PortSub { name, tagger } => {
                    port_subs.push(PortSubscription { name, tagger });
                }
                FlatLeaf::Task { task, .. } => {
                    halt(SimulationError::CommandInSubscription {
                        leaf: task.describe().to_string(),
                    });
                }
                FlatLeaf::Port { name, .. } => {
                    halt(SimulationError::CommandInSubscription { leaf: name });
                }
            }
        }
        self.manager_subs = manager_subs;
        self.port_subs = port_subs;
    }

    /// Hand each registered channel its queued commands and active
    /// subscriptions, routing the returned actions. A channel is only
    /// re-entered when it has commands or its subscription set changed.
    fn flush_channels(&mut self, drain: &mut Drain<A::Msg>) {
        let cmds = std::mem::take(&mut drain.channel_cmds);
        let channels: Vec<EffectChannel> = self.registry.all().cloned().collect();
        for channel in channels {
            let name = channel.name().to_string();
            let channel_cmds: Vec<Value> = cmds
                .iter()
                .filter(|(target, _)| *target == name)
                .map(|(_, payload)| payload.clone())
                .collect();
            let subs: Vec<Value> = self
                .manager_subs
                .iter()
                .filter(|sub| sub.channel == name)
                .map(|sub| sub.payload.clone())
                .collect();

            let unchanged = self
                .last_flushed_subs
                .get(&name)
                .is_some_and(|previous| *previous == subs);
            if channel_cmds.is_empty() && unchanged {
                continue;
            }
            self.last_flushed_subs.insert(name.clone(), subs.clone());

            let state = self.take_channel_state(&name);
            let (state, actions) = channel.on_effects(&channel_cmds, &subs, state);
            self.channel_states.insert(name, state);
            self.process_actions(&channel, actions, drain);
        }
    }

    fn deliver_self_msg(
        &mut self,
        channel: &EffectChannel,
        msg: Value,
        drain: &mut Drain<A::Msg>,
    ) {
        self.process_actions(channel, vec![ChannelAction::ToSelf(msg)], drain);
    }

    /// Route a channel's actions: self messages re-enter the same channel
    /// (attributed by its name), app deliveries go through every active
    /// subscription whose payload matches.
    fn process_actions(
        &mut self,
        channel: &EffectChannel,
        actions: Vec<ChannelAction>,
        drain: &mut Drain<A::Msg>,
    ) {
        let mut queue: VecDeque<ChannelAction> = actions.into();
        while let Some(action) = queue.pop_front() {
            match action {
                ChannelAction::ToSelf(value) => {
                    let state = self.take_channel_state(channel.name());
                    let (state, more) = channel.on_self_msg(value, state);
                    self.channel_states
                        .insert(channel.name().to_string(), state);
                    queue.extend(more);
                }
                ChannelAction::ToApp { sub, value } => {
                    let mut delivered = 0usize;
                    for active in &self.manager_subs {
                        if active.channel == channel.name() && active.payload == sub {
                            if let Some(tagger) = &active.tagger {
                                drain.msgs.push_back(tagger(value.clone()));
                                delivered += 1;
                            }
                        }
                    }
                    tracing::trace!(
                        target: "drydock.driver",
                        channel = channel.name(),
                        delivered,
                        "delivered channel value to application"
                    );
                }
            }
        }
    }

    fn fire_due_task(&mut self, index: usize, due: Duration) {
        let leaf = match &self.pending[index] {
            PendingEffect::Task(entry) => entry.pending.leaf().clone(),
            _ => unreachable!("due entries are task leaves"),
        };
        match leaf {
            Task::Sleep(_) => {
                let PendingEffect::Task(entry) = self.pending.remove(index) else {
                    unreachable!("index was selected from task entries");
                };
                tracing::debug!(
                    target: "drydock.driver",
                    at_ms = millis(due),
                    "sleep elapsed"
                );
                let task = entry.pending.resume(Ok(Value::Null));
                let mut drain = Drain::new();
                self.run_task(task, entry.tagger, &mut drain);
                self.settle(drain);
            }
            Task::SetInterval {
                interval,
                task: child,
            } => {
                if let PendingEffect::Task(entry) = &mut self.pending[index] {
                    entry.due = Some(due + interval);
                }
                tracing::debug!(
                    target: "drydock.driver",
                    at_ms = millis(due),
                    "interval elapsed"
                );
                let mut drain = Drain::new();
                self.run_task((*child).clone(), TaskTagger::Discard, &mut drain);
                self.settle(drain);
            }
            other => unreachable!("leaf {} cannot carry a deadline", other.kind()),
        }
    }

    fn take_channel_state(&mut self, name: &str) -> Value {
        self.channel_states
            .get(name)
            .cloned()
            .unwrap_or(Value::Null)
    }
}

/// A defect: the simulation itself is incomplete. Halt with a message
/// naming the offending construct.
fn halt(error: SimulationError) -> ! {
    tracing::error!(target: "drydock.driver", "{error}");
    panic!("{error}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Logs every message it receives; emits only on init.
    struct Collector<F: Fn() -> Effect<Value>> {
        effects: F,
    }

    impl<F: Fn() -> Effect<Value>> Collector<F> {
        fn new(effects: F) -> Self {
            Self { effects }
        }
    }

    impl<F: Fn() -> Effect<Value>> SimulatedApp for Collector<F> {
        type Model = Vec<Value>;
        type Msg = Value;

        fn init(&self) -> (Vec<Value>, Effect<Value>) {
            (Vec::new(), (self.effects)())
        }

        fn update(&self, msg: Value, model: &Vec<Value>) -> (Vec<Value>, Effect<Value>) {
            let mut next = model.clone();
            next.push(msg);
            (next, Effect::none())
        }
    }

    #[test]
    fn start_resolves_synchronous_chains_without_suspending() {
        let driver = TestDriver::start(Collector::new(|| {
            Effect::perform(
                Task::succeed(json!(1)).map(|v| json!(v.as_i64().unwrap() + 41)),
                |v| v,
            )
        }));
        assert_eq!(driver.model(), Ok(&vec![json!(42)]));
        assert!(driver.pending_effects().is_empty());
    }

    #[test]
    fn leaves_accumulate_in_declaration_order() {
        let driver = TestDriver::start(Collector::new(|| {
            Effect::batch(vec![
                Effect::discard(Task::mock("a")),
                Effect::discard(Task::mock("b")),
            ])
        }));
        assert_eq!(
            driver.pending_effects(),
            vec![
                json!({ "channel": "Task", "payload": { "mockTask": "a" } }),
                json!({ "channel": "Task", "payload": { "mockTask": "b" } }),
            ]
        );
    }

    #[test]
    fn resolve_task_removes_only_the_matched_entry() {
        let mut driver = TestDriver::start(Collector::new(|| {
            Effect::batch(vec![
                Effect::perform(Task::mock("a"), |v| v),
                Effect::perform(Task::mock("b"), |v| v),
            ])
        }));
        driver
            .resolve_task(&TaskMatcher::mock("a"), Ok(json!(10)))
            .unwrap();
        assert_eq!(driver.model(), Ok(&vec![json!(10)]));
        assert_eq!(
            driver.pending_effects(),
            vec![json!({ "channel": "Task", "payload": { "mockTask": "b" } })]
        );
    }

    #[test]
    fn resolve_task_without_a_match_is_a_usage_error() {
        let mut driver = TestDriver::start(Collector::new(Effect::none));
        let err = driver
            .resolve_task(&TaskMatcher::mock("missing"), Ok(Value::Null))
            .unwrap_err();
        assert!(matches!(err, SimulationError::NoMatchingEffect { .. }));
    }

    #[test]
    fn has_pending_effect_compares_leaf_shapes() {
        let driver = TestDriver::start(Collector::new(|| Effect::discard(Task::mock("a"))));
        assert!(driver
            .has_pending_effect(Effect::discard(Task::mock("a")))
            .unwrap());
        assert!(!driver
            .has_pending_effect(Effect::discard(Task::mock("other")))
            .unwrap());
    }

    #[test]
    fn has_pending_effect_rejects_batched_expectations() {
        let driver = TestDriver::start(Collector::new(Effect::none));
        let err = driver
            .has_pending_effect(Effect::Batch(vec![
                Effect::discard(Task::mock("a")),
                Effect::discard(Task::mock("b")),
            ]))
            .unwrap_err();
        assert!(matches!(
            err,
            SimulationError::ExpectationNotSingleLeaf { count: 2 }
        ));
    }

    #[test]
    fn has_pending_effect_rejects_empty_expectations() {
        let driver = TestDriver::start(Collector::new(Effect::none));
        let err = driver.has_pending_effect(Effect::none()).unwrap_err();
        assert!(matches!(
            err,
            SimulationError::ExpectationNotSingleLeaf { count: 0 }
        ));
        assert!(!err.to_string().contains("batch"));
    }

    #[test]
    fn performed_failures_are_recorded_not_delivered() {
        let driver = TestDriver::start(Collector::new(|| {
            Effect::perform(Task::fail(json!("boom")), |v| v)
        }));
        let errors = driver.model().unwrap_err();
        assert_eq!(errors, driver.errors());
        assert!(errors[0].contains("boom"));
    }

    #[test]
    fn attempted_failures_arrive_as_messages() {
        let driver = TestDriver::start(Collector::new(|| {
            Effect::attempt(Task::fail(json!("boom")), |result| match result {
                Ok(value) => json!({ "ok": value }),
                Err(error) => json!({ "err": error }),
            })
        }));
        assert_eq!(driver.model(), Ok(&vec![json!({ "err": "boom" })]));
    }

    #[test]
    fn spawn_resolves_with_a_process_id_and_detaches_the_child() {
        let mut driver = TestDriver::start(Collector::new(|| {
            Effect::perform(Task::spawn(Task::mock("child")), |pid| pid)
        }));
        assert_eq!(driver.model(), Ok(&vec![json!(1)]));
        assert_eq!(
            driver.pending_effects(),
            vec![json!({ "channel": "Task", "payload": { "mockTask": "child" } })]
        );

        // The child's eventual result is unobservable: no message, no error.
        driver
            .resolve_task(&TaskMatcher::mock("child"), Ok(json!("ignored")))
            .unwrap();
        assert_eq!(driver.model(), Ok(&vec![json!(1)]));
        assert!(driver.pending_effects().is_empty());
    }

    #[test]
    fn now_reads_the_virtual_clock() {
        struct NowApp;
        impl SimulatedApp for NowApp {
            type Model = Vec<Value>;
            type Msg = Value;
            fn init(&self) -> (Vec<Value>, Effect<Value>) {
                (Vec::new(), Effect::none())
            }
            fn update(&self, msg: Value, model: &Vec<Value>) -> (Vec<Value>, Effect<Value>) {
                if msg == json!("ask") {
                    (model.clone(), Effect::perform(Task::now(), |v| v))
                } else {
                    let mut next = model.clone();
                    next.push(msg);
                    (next, Effect::none())
                }
            }
        }

        let mut driver = TestDriver::start(NowApp);
        driver.advance_time(Duration::from_millis(1500));
        driver.update(json!("ask"));
        assert_eq!(driver.model(), Ok(&vec![json!(1500.0)]));
    }

    #[test]
    fn port_commands_are_recorded_as_pending() {
        let driver = TestDriver::start(Collector::new(|| {
            Effect::port("analytics", json!({ "event": "started" }))
        }));
        assert!(driver
            .has_pending_effect(Effect::port("analytics", json!({ "event": "started" })))
            .unwrap());
    }

    #[test]
    fn send_to_an_unknown_target_is_a_usage_error() {
        let mut driver = TestDriver::start(Collector::new(Effect::none));
        let err = driver.send("nowhere", json!(1)).unwrap_err();
        assert!(matches!(err, SimulationError::UnknownSendTarget { .. }));
    }

    #[test]
    #[should_panic(expected = "no effect channel named")]
    fn commands_to_unregistered_channels_halt() {
        TestDriver::start(Collector::new(|| Effect::manager("Bluetooth", json!({}))));
    }

    #[test]
    #[should_panic(expected = "cannot appear in a command context")]
    fn subscriptions_in_command_position_halt() {
        TestDriver::start(Collector::new(|| Effect::port_sub("in", |v| v)));
    }

    /// Collector whose `subscriptions` yields whatever the closure builds.
    struct BadSubs<F: Fn() -> Effect<Value>> {
        subs: F,
    }

    impl<F: Fn() -> Effect<Value>> SimulatedApp for BadSubs<F> {
        type Model = ();
        type Msg = Value;

        fn init(&self) -> ((), Effect<Value>) {
            ((), Effect::none())
        }

        fn update(&self, _msg: Value, _model: &()) -> ((), Effect<Value>) {
            ((), Effect::none())
        }

        fn subscriptions(&self, _model: &()) -> Effect<Value> {
            (self.subs)()
        }
    }

    #[test]
    #[should_panic(expected = "cannot appear in a subscription context")]
    fn task_leaves_in_subscription_position_halt() {
        TestDriver::start(BadSubs {
            subs: || Effect::discard(Task::mock("poll")),
        });
    }

    #[test]
    #[should_panic(expected = "cannot appear in a subscription context")]
    fn port_commands_in_subscription_position_halt() {
        TestDriver::start(BadSubs {
            subs: || Effect::port("out", json!({ "event": "tick" })),
        });
    }

    proptest! {
        #[test]
        fn pending_order_follows_declaration_order(tags in proptest::collection::vec("[a-z]{1,8}", 0..8)) {
            let effects = tags.clone();
            let driver = TestDriver::start(Collector::new(move || {
                Effect::batch(
                    effects
                        .iter()
                        .map(|tag| Effect::discard(Task::mock(tag.clone())))
                        .collect(),
                )
            }));
            let expected: Vec<Value> = tags
                .iter()
                .map(|tag| json!({ "channel": "Task", "payload": { "mockTask": tag } }))
                .collect();
            prop_assert_eq!(driver.pending_effects(), expected);
        }
    }
}
