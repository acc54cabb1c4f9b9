//! A minimal built-in feedback.
//!
//! Presents a configurable number of no-op stimuli on a short cadence.
//! Useful as a smoke test for the whole controller path and as the
//! smallest example of a feedback implementation.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use bcisignal::SignalValue;
use switcherator::StimulusView;
use tracing::info;

use crate::feedback::{Feedback, SignalData, VisualFeedback};
use crate::lifecycle::RunHandle;

struct CountingView {
    updates: u64,
}

impl StimulusView for CountingView {
    fn update(&mut self) {
        self.updates += 1;
    }
}

pub struct NopFeedback {
    visual: VisualFeedback,
    view: Arc<Mutex<CountingView>>,
    presentations: u64,
    interval: Duration,
}

impl NopFeedback {
    pub fn new() -> Self {
        let view = Arc::new(Mutex::new(CountingView { updates: 0 }));
        Self {
            visual: VisualFeedback::new(view.clone()),
            view,
            presentations: 3,
            interval: Duration::from_millis(10),
        }
    }

    /// Enable per-presentation frame-count logging.
    pub fn print_frames(mut self, print_frames: bool) -> Self {
        self.visual = self.visual.print_frames(print_frames);
        self
    }

    fn updates(&self) -> u64 {
        self.view.lock().unwrap_or_else(|e| e.into_inner()).updates
    }
}

impl Default for NopFeedback {
    fn default() -> Self {
        Self::new()
    }
}

impl Feedback for NopFeedback {
    fn on_play(&mut self, run: &RunHandle) {
        let mut remaining = self.presentations;
        let mut painter = self.visual.stimulus_sequence(
            run,
            move || {
                if remaining == 0 {
                    return false;
                }
                remaining -= 1;
                true
            },
            self.interval,
        );
        painter.run();
        info!("on_play: presented {} stimuli total", self.updates());
    }

    fn on_interaction_event(&mut self, data: &SignalData) {
        if let Some(SignalValue::Int(n)) = data.get("presentations") {
            if *n >= 0 {
                self.presentations = *n as u64;
            }
        }
    }

    fn variables(&self) -> SignalData {
        let mut vars = SignalData::new();
        vars.insert(
            "presentations".to_string(),
            SignalValue::Int(self.presentations as i64),
        );
        vars.insert(
            "updates".to_string(),
            SignalValue::Int(self.updates() as i64),
        );
        vars
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::{HandlerManager, HandlerState};
    use crate::feedback::FeedbackRegistry;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_nop_presents_and_reports() {
        let mut manager = HandlerManager::new(FeedbackRegistry::with_builtins());
        manager.init("nop").unwrap();
        manager.play().unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        loop {
            if manager.state() == HandlerState::Ready {
                if let Some(vars) = manager.variables() {
                    if vars.get("updates") == Some(&SignalValue::Int(3)) {
                        break;
                    }
                }
            }
            assert!(Instant::now() < deadline, "nop feedback never finished");
            thread::sleep(Duration::from_millis(10));
        }
        manager.quit();
    }

    #[test]
    fn test_presentations_configurable() {
        let mut nop = NopFeedback::new();
        let mut data = SignalData::new();
        data.insert("presentations".to_string(), SignalValue::Int(7));
        nop.on_interaction_event(&data);
        assert_eq!(
            nop.variables().get("presentations"),
            Some(&SignalValue::Int(7))
        );
    }
}
