#![forbid(unsafe_code)]

//! Built-in virtualized channels: the thin per-subsystem glue between the
//! effect-manager protocol and the driver.
//!
//! Each submodule exports a `channel()` constructor (the test-controlled
//! stand-in for the real subsystem) plus the effect helpers an application
//! uses to talk to it. Payloads are plain JSON shapes so pending-effect
//! assertions stay structural.

pub mod navigation;
pub mod time;
pub mod websocket;
