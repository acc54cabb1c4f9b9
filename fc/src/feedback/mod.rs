//! The feedback trait and the registry of loadable feedbacks.

use std::collections::BTreeMap;

use bcisignal::SignalValue;

use crate::config::TimingConfig;
use crate::lifecycle::RunHandle;

pub mod nop;
pub mod trial;
pub mod visual;

pub use nop::NopFeedback;
pub use trial::TrialFeedback;
pub use visual::VisualFeedback;

/// Named values carried by a decoded signal.
pub type SignalData = BTreeMap<String, SignalValue>;

/// A loadable stimulus-presentation handler.
///
/// All hooks run on the handler's dedicated thread, in the order the
/// corresponding commands arrived. `on_play` owns the thread for the
/// duration of a run; it must terminate promptly once the run flag
/// goes off.
pub trait Feedback: Send {
    /// Called once after loading, before any other hook.
    fn on_init(&mut self) {}

    /// Runs one presentation. Blocks until the run ends.
    fn on_play(&mut self, run: &RunHandle);

    /// Called on every pause toggle, both into and out of suspension.
    fn on_pause(&mut self) {}

    fn on_stop(&mut self) {}

    /// Called just before the handler is unloaded.
    fn on_quit(&mut self) {}

    /// A control signal arrived. The same data is also available live
    /// through [`RunHandle::latest_control`].
    fn on_control_event(&mut self, _data: &SignalData) {}

    /// Interaction data that was not a lifecycle command.
    fn on_interaction_event(&mut self, _data: &SignalData) {}

    /// Variables exposed to `get_variables` queries.
    fn variables(&self) -> SignalData {
        SignalData::new()
    }
}

type FeedbackCtor = Box<dyn Fn() -> Box<dyn Feedback> + Send + Sync>;

/// Maps feedback names to constructors.
#[derive(Default)]
pub struct FeedbackRegistry {
    table: BTreeMap<String, FeedbackCtor>,
}

impl FeedbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the built-in feedbacks.
    pub fn with_builtins() -> Self {
        Self::configured(&TimingConfig::default())
    }

    /// Built-in feedbacks with timing knobs from the config file.
    pub fn configured(timing: &TimingConfig) -> Self {
        let print_frames = timing.print_frames;
        let mut registry = Self::new();
        registry.register("nop", move || {
            Box::new(NopFeedback::new().print_frames(print_frames))
        });
        registry.register("trial", move || {
            Box::new(TrialFeedback::new().print_frames(print_frames))
        });
        registry
    }

    pub fn register(
        &mut self,
        name: &str,
        ctor: impl Fn() -> Box<dyn Feedback> + Send + Sync + 'static,
    ) {
        self.table.insert(name.to_string(), Box::new(ctor));
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> Vec<String> {
        self.table.keys().cloned().collect()
    }

    pub fn create(&self, name: &str) -> Option<Box<dyn Feedback>> {
        self.table.get(name).map(|ctor| ctor())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_names_sorted() {
        let mut registry = FeedbackRegistry::new();
        registry.register("zeta", || Box::new(NopFeedback::new()));
        registry.register("alpha", || Box::new(NopFeedback::new()));
        assert_eq!(registry.names(), vec!["alpha", "zeta"]);
    }

    #[test]
    fn test_builtins_contain_nop_and_trial() {
        let registry = FeedbackRegistry::with_builtins();
        assert!(registry.create("nop").is_some());
        assert!(registry.create("trial").is_some());
        assert!(registry.create("missing").is_none());
    }
}
