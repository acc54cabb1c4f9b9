//! Feedback controller daemon.
//!
//! Listens for signals on UDP, decodes them, and routes them to a
//! loadable feedback handler that presents stimuli through the
//! `switcherator` timing engine. The wire protocol lives in the
//! `bcisignal` crate.
//!
//! # Modules
//!
//! - [`cli`] - Command-line interface definitions
//! - [`config`] - Configuration loading with fallback chain
//! - [`dispatch`] - Routing of decoded signals by kind and command
//! - [`feedback`] - The feedback trait, registry and built-ins
//! - [`lifecycle`] - Handler threads, states and commands
//! - [`modes`] - Trial response-collection strategies
//! - [`trigger`] - Timestamp-marker output

pub mod cli;
pub mod config;
pub mod dispatch;
pub mod feedback;
pub mod lifecycle;
pub mod modes;
pub mod trigger;

pub use config::Config;
pub use dispatch::SignalDispatcher;
pub use feedback::{Feedback, FeedbackRegistry, SignalData};
pub use lifecycle::{HandlerError, HandlerManager, HandlerState, RunHandle};
