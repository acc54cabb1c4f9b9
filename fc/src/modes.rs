//! Experiment response modes.
//!
//! A trial-based feedback selects how subject responses are collected
//! by naming a mode; the mode maps to a concrete strategy through an
//! explicit table. Count mode accumulates a typed number of perceived
//! targets, yes/no mode records one present/absent judgement per
//! trial.

use switcherator::{InputEvent, Key};
use tracing::debug;

/// How subject responses are collected during a trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrialMode {
    /// Subject types the number of perceived targets, confirmed with
    /// enter.
    Count,
    /// Subject answers present/absent with a single key.
    YesNo,
}

impl TrialMode {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "count" => Some(Self::Count),
            "yesno" | "yes_no" => Some(Self::YesNo),
            _ => None,
        }
    }

    /// The strategy implementing this mode.
    pub fn strategy(self) -> Box<dyn ModeStrategy> {
        match self {
            Self::Count => Box::new(CountStrategy::default()),
            Self::YesNo => Box::new(YesNoStrategy::default()),
        }
    }
}

/// Accumulated responses of a run.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TrialResult {
    /// Final count entered in count mode.
    pub count: Option<i64>,
    /// Per-trial present/absent judgements in yes/no mode.
    pub detections: Vec<bool>,
}

/// Collects responses for one mode.
///
/// `process_input` returns true once the trial's answer is complete;
/// the caller then ends the response period and calls `set_result`.
pub trait ModeStrategy: Send {
    fn start_trial(&mut self, target_present: bool);

    fn process_input(&mut self, event: &InputEvent) -> bool;

    fn set_result(&self, result: &mut TrialResult);
}

/// Digit entry terminated by enter; backspace edits.
#[derive(Default)]
pub struct CountStrategy {
    digits: String,
    count: Option<i64>,
}

impl ModeStrategy for CountStrategy {
    fn start_trial(&mut self, _target_present: bool) {
        self.digits.clear();
    }

    fn process_input(&mut self, event: &InputEvent) -> bool {
        match event {
            InputEvent::KeyPress(Key::Char(c)) if c.is_ascii_digit() => {
                self.digits.push(*c);
                false
            }
            InputEvent::KeyPress(Key::Backspace) => {
                self.digits.pop();
                false
            }
            InputEvent::KeyPress(Key::Enter) => {
                self.count = self.digits.parse().ok();
                debug!("process_input: count entry complete: {:?}", self.count);
                true
            }
            _ => false,
        }
    }

    fn set_result(&self, result: &mut TrialResult) {
        result.count = self.count;
    }
}

/// One present/absent key per trial.
pub struct YesNoStrategy {
    key_yes: char,
    key_no: char,
    detections: Vec<bool>,
}

impl Default for YesNoStrategy {
    fn default() -> Self {
        Self {
            key_yes: 'j',
            key_no: 'f',
            detections: Vec::new(),
        }
    }
}

impl YesNoStrategy {
    pub fn with_keys(key_yes: char, key_no: char) -> Self {
        Self {
            key_yes,
            key_no,
            detections: Vec::new(),
        }
    }
}

impl ModeStrategy for YesNoStrategy {
    fn start_trial(&mut self, _target_present: bool) {}

    fn process_input(&mut self, event: &InputEvent) -> bool {
        let InputEvent::KeyPress(Key::Char(c)) = event else {
            return false;
        };
        if *c == self.key_yes {
            self.detections.push(true);
            true
        } else if *c == self.key_no {
            self.detections.push(false);
            true
        } else {
            false
        }
    }

    fn set_result(&self, result: &mut TrialResult) {
        result.detections = self.detections.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(c: char) -> InputEvent {
        InputEvent::KeyPress(Key::Char(c))
    }

    #[test]
    fn test_mode_names() {
        assert_eq!(TrialMode::from_name("count"), Some(TrialMode::Count));
        assert_eq!(TrialMode::from_name("yesno"), Some(TrialMode::YesNo));
        assert_eq!(TrialMode::from_name("yes_no"), Some(TrialMode::YesNo));
        assert_eq!(TrialMode::from_name("other"), None);
    }

    #[test]
    fn test_count_mode_digit_entry() {
        let mut strategy = TrialMode::Count.strategy();
        strategy.start_trial(true);
        assert!(!strategy.process_input(&key('1')));
        assert!(!strategy.process_input(&key('4')));
        assert!(!strategy.process_input(&InputEvent::KeyPress(Key::Backspace)));
        assert!(!strategy.process_input(&key('2')));
        assert!(strategy.process_input(&InputEvent::KeyPress(Key::Enter)));

        let mut result = TrialResult::default();
        strategy.set_result(&mut result);
        assert_eq!(result.count, Some(12));
    }

    #[test]
    fn test_count_mode_ignores_non_digits() {
        let mut strategy = CountStrategy::default();
        strategy.start_trial(false);
        assert!(!strategy.process_input(&key('x')));
        assert!(strategy.process_input(&InputEvent::KeyPress(Key::Enter)));
        let mut result = TrialResult::default();
        strategy.set_result(&mut result);
        // Empty entry parses to no count rather than zero.
        assert_eq!(result.count, None);
    }

    #[test]
    fn test_yesno_mode_records_per_trial() {
        let mut strategy = YesNoStrategy::with_keys('y', 'n');
        strategy.start_trial(true);
        assert!(!strategy.process_input(&key('q')));
        assert!(strategy.process_input(&key('y')));
        strategy.start_trial(false);
        assert!(strategy.process_input(&key('n')));

        let mut result = TrialResult::default();
        strategy.set_result(&mut result);
        assert_eq!(result.detections, vec![true, false]);
    }
}
