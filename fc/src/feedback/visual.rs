//! Scaffolding shared by visual feedbacks.
//!
//! Feedbacks embed a [`VisualFeedback`] and drive their presentation
//! through it: it binds the run's flag into painter factories and
//! switcherators, and maps quit keys onto the flag so a run can be
//! ended from the keyboard as well as from the network.

use std::sync::Arc;

use switcherator::{
    InputEvent, IntoDurations, SharedView, StimulusPainter, StimulusSequenceFactory, Switcherator,
    WaitStyle,
};
use tracing::debug;

use crate::lifecycle::RunHandle;

pub struct VisualFeedback {
    view: SharedView,
    wait_style: WaitStyle,
    print_frames: bool,
}

impl VisualFeedback {
    pub fn new(view: SharedView) -> Self {
        Self {
            view,
            wait_style: WaitStyle::default(),
            print_frames: false,
        }
    }

    pub fn wait_style(mut self, wait_style: WaitStyle) -> Self {
        self.wait_style = wait_style;
        self
    }

    pub fn print_frames(mut self, print_frames: bool) -> Self {
        self.print_frames = print_frames;
        self
    }

    /// A painter factory bound to this view and the run's flag.
    pub fn factory(&self, run: &RunHandle) -> StimulusSequenceFactory {
        StimulusSequenceFactory::new(self.view.clone(), run.flag())
            .print_frames(self.print_frames)
    }

    /// Shorthand for a predicate-driven stimulus sequence.
    pub fn stimulus_sequence(
        &self,
        run: &RunHandle,
        prepare: impl FnMut() -> bool + Send + 'static,
        durations: impl IntoDurations,
    ) -> StimulusPainter {
        self.factory(run).create(prepare, durations, self.wait_style)
    }

    /// Shorthand for a generator-driven stimulus sequence.
    pub fn stimulus_sequence_iter<I>(
        &self,
        run: &RunHandle,
        prepare: I,
        durations: impl IntoDurations,
    ) -> StimulusPainter
    where
        I: Iterator + Send + 'static,
    {
        self.factory(run)
            .create_iter(prepare, durations, self.wait_style)
    }

    /// Wrap an iterator so it honors the run's flag.
    pub fn switcherator<I: Iterator>(&self, run: &RunHandle, inner: I) -> Switcherator<I> {
        Switcherator::new(run.flag(), inner)
    }

    /// Route an input event. Quit keys turn the run flag off; returns
    /// true when the event was consumed here.
    pub fn handle_input(&self, run: &RunHandle, event: &InputEvent) -> bool {
        if event.is_quit() {
            debug!("handle_input: quit key, ending run");
            run.flag().off();
            true
        } else {
            false
        }
    }

    pub fn view(&self) -> SharedView {
        Arc::clone(&self.view)
    }
}
