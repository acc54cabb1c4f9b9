//! StimulusSequenceFactory - painter construction
//!
//! Holds the shared view, flag and frame-debug switch so feedback code can
//! spawn painters without threading those through every call site. The
//! predicate and generator prepare variants get explicit constructors; a
//! scalar presentation duration is normalized to a one-element list.

use std::sync::Arc;

use crate::flag::CooperativeFlag;
use crate::frames::FrameCounter;
use crate::painter::{FnPrepare, IntoDurations, IterPrepare, SharedView, StimulusPainter, WaitStyle};

/// Creates [`StimulusPainter`]s bound to one view and one flag.
pub struct StimulusSequenceFactory {
    view: SharedView,
    flag: Arc<CooperativeFlag>,
    frame_counter: Arc<FrameCounter>,
    print_frames: bool,
}

impl StimulusSequenceFactory {
    pub fn new(view: SharedView, flag: Arc<CooperativeFlag>) -> Self {
        Self {
            view,
            flag,
            frame_counter: Arc::new(FrameCounter::new()),
            print_frames: false,
        }
    }

    /// Enable per-presentation frame-count debug logging
    pub fn print_frames(mut self, print_frames: bool) -> Self {
        self.print_frames = print_frames;
        self
    }

    /// The frame counter shared with painters; the rendering side ticks it
    /// once per drawn frame when frame debugging is wanted.
    pub fn frame_counter(&self) -> Arc<FrameCounter> {
        self.frame_counter.clone()
    }

    /// Create a painter driven by a one-shot predicate: `prepare` readies the
    /// next stimulus and returns true to continue, false to stop.
    pub fn create(
        &self,
        prepare: impl FnMut() -> bool + Send + 'static,
        durations: impl IntoDurations,
        wait_style: WaitStyle,
    ) -> StimulusPainter {
        StimulusPainter::new(
            Box::new(FnPrepare(prepare)),
            durations.into_durations(),
            self.view.clone(),
            self.flag.clone(),
            wait_style,
            self.print_frames,
            self.frame_counter.clone(),
        )
    }

    /// Create a painter driven by a generator: the iterator is advanced once
    /// per cycle and its exhaustion ends the sequence.
    pub fn create_iter<I>(&self, prepare: I, durations: impl IntoDurations, wait_style: WaitStyle) -> StimulusPainter
    where
        I: Iterator + Send + 'static,
    {
        StimulusPainter::new(
            Box::new(IterPrepare(prepare)),
            durations.into_durations(),
            self.view.clone(),
            self.flag.clone(),
            wait_style,
            self.print_frames,
            self.frame_counter.clone(),
        )
    }
}
