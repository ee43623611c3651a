#![forbid(unsafe_code)]

//! The application interface the driver runs against.

use drydock_core::Effect;

/// A reactive application under simulation.
///
/// The reducer is pure: `update` consumes a message and the current model
/// and returns the new model plus the effects it wants performed. The
/// driver owns all effect execution, so implementations must not do any
/// I/O of their own.
///
/// # Example
///
/// ```ignore
/// struct Fetcher;
///
/// enum Msg {
///     GotBody(Value),
/// }
///
/// impl SimulatedApp for Fetcher {
///     type Model = Option<String>;
///     type Msg = Msg;
///
///     fn init(&self) -> (Self::Model, Effect<Msg>) {
///         (None, Effect::perform(Task::http_text("GET", "/a"), Msg::GotBody))
///     }
///
///     fn update(&self, msg: Msg, model: &Self::Model) -> (Self::Model, Effect<Msg>) {
///         match msg {
///             Msg::GotBody(body) => (Some(body.to_string()), Effect::none()),
///         }
///     }
/// }
/// ```
pub trait SimulatedApp {
    /// The application state.
    type Model;
    /// The message type driving the reducer.
    type Msg: 'static;

    /// The initial model and the effects issued at startup.
    fn init(&self) -> (Self::Model, Effect<Self::Msg>);

    /// The reducer: one message in, a new model and requested effects out.
    fn update(&self, msg: Self::Msg, model: &Self::Model) -> (Self::Model, Effect<Self::Msg>);

    /// The subscriptions active for `model`. Re-evaluated after every
    /// settled update.
    fn subscriptions(&self, model: &Self::Model) -> Effect<Self::Msg> {
        let _ = model;
        Effect::none()
    }
}
