//! Trial-based built-in feedback.
//!
//! Runs a configurable number of trials: each presents a short burst
//! of stimuli and then opens a response period collected through the
//! selected [`TrialMode`] strategy. Subject input arrives as live
//! control data (`trial` index + `response` string, `\n` for enter),
//! so answers reach the run without waiting on the queued hook path.
//! Marker codes bracket the run and the bursts and report answers.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use bcisignal::SignalValue;
use switcherator::{InputEvent, Key, StimulusView, Switcherator};
use tracing::{debug, info, warn};

use crate::feedback::{Feedback, SignalData, VisualFeedback};
use crate::lifecycle::RunHandle;
use crate::modes::{ModeStrategy, TrialMode, TrialResult};
use crate::trigger::{LogTrigger, Trigger, codes};

const RESPONSE_POLL: Duration = Duration::from_millis(5);

struct BurstView {
    presented: u64,
}

impl StimulusView for BurstView {
    fn update(&mut self) {
        self.presented += 1;
    }
}

pub struct TrialFeedback {
    visual: VisualFeedback,
    view: Arc<Mutex<BurstView>>,
    mode: TrialMode,
    trials: u64,
    stimuli_per_trial: u64,
    stimulus_interval: Duration,
    response_timeout: Duration,
    trigger: Box<dyn Trigger>,
    result: TrialResult,
}

impl TrialFeedback {
    pub fn new() -> Self {
        let view = Arc::new(Mutex::new(BurstView { presented: 0 }));
        Self {
            visual: VisualFeedback::new(view.clone()),
            view,
            mode: TrialMode::YesNo,
            trials: 2,
            stimuli_per_trial: 3,
            stimulus_interval: Duration::from_millis(10),
            response_timeout: Duration::from_secs(2),
            trigger: Box::new(LogTrigger),
            result: TrialResult::default(),
        }
    }

    /// Replace the marker sink (hardware trigger, test recorder).
    pub fn with_trigger(mut self, trigger: Box<dyn Trigger>) -> Self {
        self.trigger = trigger;
        self
    }

    pub fn print_frames(mut self, print_frames: bool) -> Self {
        self.visual = self.visual.print_frames(print_frames);
        self
    }

    fn presented(&self) -> u64 {
        self.view.lock().unwrap_or_else(|e| e.into_inner()).presented
    }

    fn key_event(c: char) -> InputEvent {
        match c {
            '\n' => InputEvent::KeyPress(Key::Enter),
            '\u{8}' => InputEvent::KeyPress(Key::Backspace),
            other => InputEvent::KeyPress(Key::Char(other)),
        }
    }

    /// The answer for `trial`, once the live control data carries it.
    fn response_for(control: &SignalData, trial: i64) -> Option<String> {
        if control.get("trial") != Some(&SignalValue::Int(trial)) {
            return None;
        }
        match control.get("response") {
            Some(SignalValue::Str(s)) => Some(s.clone()),
            _ => None,
        }
    }

    /// Feed one trial's answer string through the strategy and emit the
    /// answer marker. Returns false when the string did not complete an
    /// answer.
    fn collect_answer(
        &mut self,
        strategy: &mut dyn ModeStrategy,
        response: &str,
        target_present: bool,
    ) -> bool {
        let answered = response
            .chars()
            .any(|c| strategy.process_input(&Self::key_event(c)));
        if !answered {
            return false;
        }
        let mut snapshot = TrialResult::default();
        strategy.set_result(&mut snapshot);
        match self.mode {
            // 11/12 without a target, 21/22 with one; +1 when the
            // subject reported a detection.
            TrialMode::YesNo => {
                let base = if target_present {
                    codes::TARGET_PRESENT_OFFSET
                } else {
                    codes::TARGET_ABSENT_OFFSET
                };
                let detected = snapshot.detections.last().copied().unwrap_or(false);
                self.trigger.send(base + detected as u8);
            }
            TrialMode::Count => {
                if let Some(count) = snapshot.count {
                    let clamped = count.clamp(0, 100) as u8;
                    self.trigger.send(codes::COUNTED_OFFSET.saturating_add(clamped));
                }
            }
        }
        true
    }
}

impl Default for TrialFeedback {
    fn default() -> Self {
        Self::new()
    }
}

impl Feedback for TrialFeedback {
    fn on_play(&mut self, run: &RunHandle) {
        self.result = TrialResult::default();
        let mut strategy = self.mode.strategy();
        let flag = run.flag();

        self.trigger.send(codes::RUN_START);
        for trial in Switcherator::new(flag.clone(), 0..self.trials) {
            let target_present = trial % 2 == 0;
            strategy.start_trial(target_present);

            self.trigger.send(codes::BURST_START);
            let mut remaining = self.stimuli_per_trial;
            let mut painter = self.visual.stimulus_sequence(
                run,
                move || {
                    if remaining == 0 {
                        return false;
                    }
                    remaining -= 1;
                    true
                },
                self.stimulus_interval,
            );
            painter.run();
            self.trigger.send(codes::BURST_END);

            // Response period: wait for this trial's answer in the live
            // control data, ending the run early when the flag goes off.
            let deadline = Instant::now() + self.response_timeout;
            let mut answered = false;
            while Instant::now() < deadline {
                if !flag.sleep(RESPONSE_POLL) {
                    break;
                }
                if let Some(response) = Self::response_for(&run.latest_control(), trial as i64) {
                    answered = self.collect_answer(strategy.as_mut(), &response, target_present);
                    break;
                }
            }
            if flag.is_off() {
                break;
            }
            if !answered {
                debug!("on_play: trial {trial} ended without an answer");
            }
        }
        strategy.set_result(&mut self.result);
        self.trigger.send(codes::RUN_END);
        info!(
            "on_play: run finished after {} presentations, result {:?}",
            self.presented(),
            self.result
        );
    }

    fn on_interaction_event(&mut self, data: &SignalData) {
        if let Some(SignalValue::Str(name)) = data.get("mode") {
            match TrialMode::from_name(name) {
                Some(mode) => self.mode = mode,
                None => warn!("on_interaction_event: unknown mode '{name}'"),
            }
        }
        if let Some(SignalValue::Int(n)) = data.get("trials") {
            if *n > 0 {
                self.trials = *n as u64;
            }
        }
    }

    fn variables(&self) -> SignalData {
        let mut vars = SignalData::new();
        let mode = match self.mode {
            TrialMode::Count => "count",
            TrialMode::YesNo => "yesno",
        };
        vars.insert("mode".to_string(), SignalValue::Str(mode.to_string()));
        vars.insert("trials".to_string(), SignalValue::Int(self.trials as i64));
        vars.insert(
            "count".to_string(),
            self.result
                .count
                .map(SignalValue::Int)
                .unwrap_or(SignalValue::None),
        );
        vars.insert(
            "detections".to_string(),
            SignalValue::List(
                self.result
                    .detections
                    .iter()
                    .map(|d| SignalValue::Bool(*d))
                    .collect(),
            ),
        );
        vars.insert(
            "presented".to_string(),
            SignalValue::Int(self.presented() as i64),
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

    #[derive(Clone, Default)]
    struct MarkerLog(Arc<Mutex<Vec<u8>>>);

    impl MarkerLog {
        fn codes(&self) -> Vec<u8> {
            self.0.lock().unwrap().clone()
        }
    }

    struct RecordingTrigger(MarkerLog);

    impl Trigger for RecordingTrigger {
        fn send(&mut self, code: u8) {
            self.0.0.lock().unwrap().push(code);
        }
    }

    fn trial_registry(markers: MarkerLog) -> FeedbackRegistry {
        let mut registry = FeedbackRegistry::new();
        registry.register("trial", move || {
            Box::new(
                TrialFeedback::new().with_trigger(Box::new(RecordingTrigger(markers.clone()))),
            )
        });
        registry
    }

    fn wait_for_ready(manager: &HandlerManager) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while manager.state() != HandlerState::Ready {
            assert!(Instant::now() < deadline, "handler never became ready");
            thread::sleep(Duration::from_millis(5));
        }
    }

    fn answer(manager: &HandlerManager, trial: i64, response: &str) {
        let mut data = SignalData::new();
        data.insert("trial".to_string(), SignalValue::Int(trial));
        data.insert("response".to_string(), SignalValue::Str(response.to_string()));
        manager.control(&data);
    }

    #[test]
    fn test_yesno_run_records_detections_and_markers() {
        let markers = MarkerLog::default();
        let mut manager = HandlerManager::new(trial_registry(markers.clone()));
        manager.init("trial").unwrap();
        wait_for_ready(&manager);

        manager.play().unwrap();
        // Trial 0 has a target, trial 1 does not. The second answer
        // waits long enough that the first has surely been consumed
        // before the control data is replaced.
        answer(&manager, 0, "j");
        thread::sleep(Duration::from_millis(500));
        answer(&manager, 1, "f");
        wait_for_ready(&manager);

        let vars = manager.variables().unwrap();
        assert_eq!(
            vars.get("detections"),
            Some(&SignalValue::List(vec![
                SignalValue::Bool(true),
                SignalValue::Bool(false),
            ]))
        );

        let sent = markers.codes();
        assert_eq!(sent.first(), Some(&codes::RUN_START));
        assert_eq!(sent.last(), Some(&codes::RUN_END));
        // Answer markers: detection with target, rejection without.
        assert!(sent.contains(&(codes::TARGET_PRESENT_OFFSET + 1)));
        assert!(sent.contains(&codes::TARGET_ABSENT_OFFSET));
        let bursts = sent.iter().filter(|c| **c == codes::BURST_START).count();
        assert_eq!(bursts, 2);
        manager.quit();
    }

    #[test]
    fn test_count_run_reports_typed_count() {
        let markers = MarkerLog::default();
        let mut manager = HandlerManager::new(trial_registry(markers.clone()));
        manager.init("trial").unwrap();
        wait_for_ready(&manager);

        let mut setup = SignalData::new();
        setup.insert("mode".to_string(), SignalValue::Str("count".to_string()));
        setup.insert("trials".to_string(), SignalValue::Int(1));
        manager.interaction(&setup);

        manager.play().unwrap();
        answer(&manager, 0, "12\n");
        wait_for_ready(&manager);

        let vars = manager.variables().unwrap();
        assert_eq!(vars.get("count"), Some(&SignalValue::Int(12)));
        assert!(markers.codes().contains(&(codes::COUNTED_OFFSET + 12)));
        manager.quit();
    }

    #[test]
    fn test_stop_cuts_response_period_short() {
        let markers = MarkerLog::default();
        let mut manager = HandlerManager::new(trial_registry(markers.clone()));
        manager.init("trial").unwrap();
        wait_for_ready(&manager);

        manager.play().unwrap();
        // No answer arrives; stop must end the run well before the
        // response timeout runs its course.
        thread::sleep(Duration::from_millis(100));
        let stopped = Instant::now();
        manager.stop().unwrap();
        wait_for_ready(&manager);
        assert!(stopped.elapsed() < Duration::from_secs(1));

        let sent = markers.codes();
        assert_eq!(sent.last(), Some(&codes::RUN_END));
        manager.quit();
    }
}
