//! The slidecast pipeline: a fixed sequence of stages that turns a paper
//! into a slide deck and, in video modes, a narrated slideshow.
//!
//! - [`runner::PipelineRunner`] drives one job and is its only publisher.
//! - [`collaborators`] defines the traits each stage delegates to.
//! - [`fallback::ProviderChain`] tries interchangeable providers in order.
//! - [`builtin`] ships the collaborators the server wires up by default.

pub mod builtin;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod fallback;
pub mod runner;
pub mod stage;

pub use config::PipelineConfig;
pub use error::StageError;
pub use runner::{Collaborators, PipelineRunner};
pub use stage::Stage;
