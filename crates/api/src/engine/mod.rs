//! Job execution engine.
//!
//! Contains the dispatcher that turns accepted job requests into pipeline
//! runner tasks and owns their cancellation tokens.

pub mod dispatcher;

pub use dispatcher::JobDispatcher;
