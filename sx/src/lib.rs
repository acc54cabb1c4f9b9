//! Switcherator - cooperative-suspension iteration and stimulus timing
//!
//! This crate provides the timing-critical half of the feedback controller:
//! a shared tri-state flag that lets a control thread suspend, resume or
//! cancel a presentation run, an iterator adapter that observes the flag
//! between elements, and a painter that drives prepare/present cycles at a
//! controlled wall-clock cadence.
//!
//! # Core Concepts
//!
//! - **One checkpoint per element**: suspension and cancellation are observed
//!   at element-fetch and prepare boundaries, never mid-presentation
//! - **Permanent off**: once a flag is switched off the run is over; a new
//!   run resets the flag first
//! - **Two wait styles**: schedule-anchored (no cumulative drift) or
//!   actual-time-anchored (no interval compression after a slow frame)
//!
//! # Modules
//!
//! - [`flag`] - The shared suspend/resume/cancel flag
//! - [`switcher`] - The flag-gated iterator adapter
//! - [`painter`] - The timed prepare/present driver
//! - [`factory`] - Painter construction and duration normalization
//! - [`frames`] - Frame counting instrument
//! - [`input`] - Input events consumed from the rendering front end

pub mod factory;
pub mod flag;
pub mod frames;
pub mod input;
pub mod painter;
pub mod switcher;

pub use factory::StimulusSequenceFactory;
pub use flag::{CooperativeFlag, RunState};
pub use frames::FrameCounter;
pub use input::{InputEvent, Key};
pub use painter::{
    FnPrepare, IntoDurations, IterPrepare, Prepare, SharedView, StimulusPainter, StimulusView, WaitStyle,
};
pub use switcher::Switcherator;
