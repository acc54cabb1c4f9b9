//! StimulusPainter - timed prepare/present driver
//!
//! Emits a series of present calls at controlled wall-clock intervals. An
//! external prepare step decides whether another presentation should happen
//! and mutates the shared rendering state for it beforehand; the painter owns
//! the cadence: it sleeps out the remainder of each presentation slot, adds
//! back any time spent suspended, and anchors the schedule either to the
//! original start (fixed style) or to the actual presentation times
//! (drift-correcting style).

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::flag::{CooperativeFlag, RunState};
use crate::frames::FrameCounter;

/// Fallback inter-stimulus interval when an empty duration list is supplied
const DEFAULT_WAIT: Duration = Duration::from_millis(100);

/// The prepare step driving a painter.
///
/// `advance` readies the next stimulus (mutating shared rendering state) and
/// reports whether a presentation should follow. The two adapters below
/// replace the original runtime type inspection with explicit construction.
pub trait Prepare {
    fn advance(&mut self) -> bool;
}

/// One-shot-predicate prepare: the closure is called repeatedly, returning
/// true to continue and false to stop.
pub struct FnPrepare<F>(pub F);

impl<F: FnMut() -> bool> Prepare for FnPrepare<F> {
    fn advance(&mut self) -> bool {
        (self.0)()
    }
}

/// Generator prepare: the iterator is advanced each cycle and its natural
/// exhaustion stops the sequence. Yielded items are side effects of the
/// generator body; their values are not inspected.
pub struct IterPrepare<I>(pub I);

impl<I: Iterator> Prepare for IterPrepare<I> {
    fn advance(&mut self) -> bool {
        self.0.next().is_some()
    }
}

/// The present primitive consumed from the rendering collaborator.
/// `update` draws exactly one frame.
pub trait StimulusView {
    fn update(&mut self);
}

/// View handle shared between the painter and the rendering owner
pub type SharedView = Arc<Mutex<dyn StimulusView + Send>>;

/// How the inter-presentation schedule is anchored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaitStyle {
    /// Anchored to the original start: slow frames cannot accumulate drift,
    /// but a frame overrunning its slot makes the next slot arrive late
    /// exactly once.
    #[default]
    Fixed,
    /// Anchored to actual presentation time: intervals never compress after
    /// a slow frame, at the cost of drifting from an absolute schedule.
    DriftCorrecting,
}

/// Normalization of scalar-or-list presentation durations.
pub trait IntoDurations {
    fn into_durations(self) -> Vec<Duration>;
}

impl IntoDurations for Duration {
    fn into_durations(self) -> Vec<Duration> {
        vec![self]
    }
}

impl IntoDurations for f64 {
    fn into_durations(self) -> Vec<Duration> {
        vec![Duration::from_secs_f64(self)]
    }
}

impl IntoDurations for Vec<Duration> {
    fn into_durations(self) -> Vec<Duration> {
        self
    }
}

impl IntoDurations for Vec<f64> {
    fn into_durations(self) -> Vec<Duration> {
        self.into_iter().map(Duration::from_secs_f64).collect()
    }
}

impl IntoDurations for &[f64] {
    fn into_durations(self) -> Vec<Duration> {
        self.iter().copied().map(Duration::from_secs_f64).collect()
    }
}

/// Timed prepare/present driver for one stimulus sequence.
///
/// Built by [`StimulusSequenceFactory`](crate::StimulusSequenceFactory);
/// consumed by calling [`run`](Self::run) on the render/timing thread.
pub struct StimulusPainter {
    prepare: Box<dyn Prepare + Send>,
    wait_times: Vec<Duration>,
    next_wait: usize,
    view: SharedView,
    flag: Arc<CooperativeFlag>,
    wait_style: WaitStyle,
    print_frames: bool,
    suspendable: bool,
    pre_stimulus: Option<Box<dyn FnMut() + Send>>,
    frame_counter: Arc<FrameCounter>,
    last_start: Instant,
    suspended_time: Duration,
}

impl StimulusPainter {
    pub(crate) fn new(
        prepare: Box<dyn Prepare + Send>,
        durations: Vec<Duration>,
        view: SharedView,
        flag: Arc<CooperativeFlag>,
        wait_style: WaitStyle,
        print_frames: bool,
        frame_counter: Arc<FrameCounter>,
    ) -> Self {
        let wait_times = if durations.is_empty() {
            warn!("empty duration list, falling back to {:?}", DEFAULT_WAIT);
            vec![DEFAULT_WAIT]
        } else {
            durations
        };
        Self {
            prepare,
            wait_times,
            next_wait: 0,
            view,
            flag,
            wait_style,
            print_frames,
            suspendable: true,
            pre_stimulus: None,
            frame_counter,
            last_start: Instant::now(),
            suspended_time: Duration::ZERO,
        }
    }

    /// Control whether the painter parks while the flag is Suspended
    pub fn suspendable(mut self, suspendable: bool) -> Self {
        self.suspendable = suspendable;
        self
    }

    /// Hook invoked strictly before every view update, e.g. an external
    /// timestamp marker trigger.
    pub fn pre_stimulus(mut self, hook: impl FnMut() + Send + 'static) -> Self {
        self.pre_stimulus = Some(Box::new(hook));
        self
    }

    /// Drive the sequence to completion.
    ///
    /// Presents once per successful prepare, with one wait between
    /// presentations and one trailing wait after the last, so every
    /// presentation is displayed for its full slot before control returns.
    pub fn run(&mut self) {
        if self.print_frames {
            self.frame_counter.start();
        }
        if self.prepare() {
            self.last_start = Instant::now();
            self.frame_counter.lock();
            self.present();
            while self.prepare() {
                self.wait();
                self.present();
            }
            self.wait();
        }
    }

    /// Suspension-aware prepare check. Blocks while the flag is Suspended
    /// (accumulating the blocked span for the next wait), terminates on Off.
    fn prepare(&mut self) -> bool {
        if self.flag.is_off() {
            return false;
        }
        if self.suspendable && self.flag.is_suspended() {
            let suspend_start = Instant::now();
            if self.flag.wait() == RunState::Off {
                return false;
            }
            self.suspended_time += suspend_start.elapsed();
            debug!(suspended = ?self.suspended_time, "prepare: resumed after suspension");
        }
        self.prepare.advance()
    }

    /// Sleep out the remainder of the current presentation slot, then advance
    /// the schedule anchor according to the wait style.
    fn wait(&mut self) {
        let next_wait_time = self.next_wait_time() + self.suspended_time;
        self.suspended_time = Duration::ZERO;
        let deadline = self.last_start + next_wait_time;
        let now = Instant::now();
        if deadline > now {
            if !self.flag.sleep(deadline - now) {
                // Cancellation mid-wait; run() stops at the next prepare.
                debug!(remaining = ?(deadline - now), "wait: sleep cut short by off()");
            }
        }
        match self.wait_style {
            WaitStyle::Fixed => self.last_start += next_wait_time,
            WaitStyle::DriftCorrecting => self.last_start = Instant::now(),
        }
        if self.print_frames {
            debug!(frames = self.frame_counter.last_interval(), "wait: frames after waiting");
        }
    }

    fn present(&mut self) {
        if self.print_frames {
            debug!(
                frames = self.frame_counter.last_interval(),
                "present: frames before stimulus change"
            );
            self.frame_counter.lock();
        }
        if let Some(hook) = &mut self.pre_stimulus {
            hook();
        }
        self.view
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .update();
    }

    fn next_wait_time(&mut self) -> Duration {
        // Shorter-than-needed duration lists cycle from the start
        let duration = self.wait_times[self.next_wait];
        self.next_wait = (self.next_wait + 1) % self.wait_times.len();
        duration
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::StimulusSequenceFactory;
    use serial_test::serial;
    use std::thread;

    /// Records the instant of every update call
    struct RecordingView {
        updates: Vec<Instant>,
        render_delay: Duration,
    }

    impl RecordingView {
        fn new() -> Self {
            Self {
                updates: Vec::new(),
                render_delay: Duration::ZERO,
            }
        }

        fn with_delay(delay: Duration) -> Self {
            Self {
                updates: Vec::new(),
                render_delay: delay,
            }
        }
    }

    impl StimulusView for RecordingView {
        fn update(&mut self) {
            self.updates.push(Instant::now());
            if self.render_delay > Duration::ZERO {
                thread::sleep(self.render_delay);
            }
        }
    }

    fn shared(view: RecordingView) -> Arc<Mutex<RecordingView>> {
        Arc::new(Mutex::new(view))
    }

    fn factory(view: Arc<Mutex<RecordingView>>, flag: Arc<CooperativeFlag>) -> StimulusSequenceFactory {
        StimulusSequenceFactory::new(view, flag)
    }

    fn counting_prepare(n: usize) -> impl FnMut() -> bool {
        let mut remaining = n;
        move || {
            if remaining > 0 {
                remaining -= 1;
                true
            } else {
                false
            }
        }
    }

    #[test]
    #[serial]
    fn test_fixed_schedule_spacing() {
        let flag = Arc::new(CooperativeFlag::new());
        let view = shared(RecordingView::new());
        let fact = factory(view.clone(), flag);

        let mut painter = fact.create(counting_prepare(3), vec![0.1, 0.1, 0.1], WaitStyle::Fixed);
        painter.run();

        let updates = &view.lock().unwrap().updates;
        assert_eq!(updates.len(), 3);
        let span = updates[2] - updates[0];
        assert!(
            span >= Duration::from_millis(190) && span <= Duration::from_millis(260),
            "first->last span was {span:?}"
        );
    }

    #[test]
    #[serial]
    fn test_fixed_schedule_absorbs_render_jitter() {
        let flag = Arc::new(CooperativeFlag::new());
        // Each frame takes 30ms to draw; the schedule must not stretch
        let view = shared(RecordingView::with_delay(Duration::from_millis(30)));
        let fact = factory(view.clone(), flag);

        let mut painter = fact.create(counting_prepare(3), 0.1, WaitStyle::Fixed);
        painter.run();

        let updates = &view.lock().unwrap().updates;
        assert_eq!(updates.len(), 3);
        let span = updates[2] - updates[0];
        assert!(
            span >= Duration::from_millis(190) && span <= Duration::from_millis(260),
            "first->last span was {span:?}"
        );
    }

    #[test]
    #[serial]
    fn test_single_duration_cycles() {
        let flag = Arc::new(CooperativeFlag::new());
        let view = shared(RecordingView::new());
        let fact = factory(view.clone(), flag);

        let mut painter = fact.create(counting_prepare(5), vec![0.05], WaitStyle::Fixed);
        painter.run();

        let updates = &view.lock().unwrap().updates;
        assert_eq!(updates.len(), 5);
        for pair in updates.windows(2) {
            let gap = pair[1] - pair[0];
            assert!(
                gap >= Duration::from_millis(40) && gap <= Duration::from_millis(90),
                "inter-presentation gap was {gap:?}"
            );
        }
    }

    #[test]
    #[serial]
    fn test_trailing_wait_after_last_presentation() {
        let flag = Arc::new(CooperativeFlag::new());
        let view = shared(RecordingView::new());
        let fact = factory(view.clone(), flag);

        let mut painter = fact.create(counting_prepare(2), 0.08, WaitStyle::Fixed);
        let start = Instant::now();
        painter.run();
        let total = start.elapsed();

        // Two presentations, each followed by one 80ms wait
        assert!(total >= Duration::from_millis(150), "run took {total:?}");
    }

    #[test]
    fn test_prepare_false_first_means_no_presentation() {
        let flag = Arc::new(CooperativeFlag::new());
        let view = shared(RecordingView::new());
        let fact = factory(view.clone(), flag);

        let mut painter = fact.create(|| false, 0.05, WaitStyle::Fixed);
        let start = Instant::now();
        painter.run();

        assert!(view.lock().unwrap().updates.is_empty());
        // No trailing wait either
        assert!(start.elapsed() < Duration::from_millis(40));
    }

    #[test]
    fn test_off_terminates_endless_prepare() {
        let flag = Arc::new(CooperativeFlag::new());
        let view = shared(RecordingView::new());
        let fact = factory(view.clone(), flag.clone());

        // Prepare never stops by itself; the flag has to end the run
        let mut count = 0;
        let flag_inner = flag.clone();
        let mut painter = fact.create(
            move || {
                count += 1;
                if count == 3 {
                    flag_inner.off();
                }
                true
            },
            0.01,
            WaitStyle::Fixed,
        );
        painter.run();

        // The third prepare switched the flag off; its presentation still
        // completes, then the next prepare checkpoint terminates the run.
        assert_eq!(view.lock().unwrap().updates.len(), 3);
    }

    #[test]
    #[serial]
    fn test_iterator_prepare_stops_on_exhaustion() {
        let flag = Arc::new(CooperativeFlag::new());
        let view = shared(RecordingView::new());
        let fact = factory(view.clone(), flag);

        let mut painter = fact.create_iter(0..4, vec![0.01], WaitStyle::DriftCorrecting);
        painter.run();

        assert_eq!(view.lock().unwrap().updates.len(), 4);
    }

    #[test]
    fn test_pre_stimulus_fires_before_every_update() {
        let flag = Arc::new(CooperativeFlag::new());

        // One shared log receives both the hook and update markers
        let log = Arc::new(Mutex::new(Vec::new()));

        struct LogView(Arc<Mutex<Vec<&'static str>>>);
        impl StimulusView for LogView {
            fn update(&mut self) {
                self.0.lock().unwrap().push("update");
            }
        }

        let view: SharedView = Arc::new(Mutex::new(LogView(log.clone())));
        let fact = StimulusSequenceFactory::new(view, flag);

        let hook_log = log.clone();
        let mut painter = fact
            .create(counting_prepare(3), 0.01, WaitStyle::Fixed)
            .pre_stimulus(move || hook_log.lock().unwrap().push("pre"));
        painter.run();

        let entries = log.lock().unwrap().clone();
        assert_eq!(entries, vec!["pre", "update", "pre", "update", "pre", "update"]);
    }

    #[test]
    #[serial]
    fn test_suspension_extends_next_wait() {
        let flag = Arc::new(CooperativeFlag::new());
        let view = shared(RecordingView::new());
        let fact = factory(view.clone(), flag.clone());

        let mut painter = fact.create(counting_prepare(3), 0.05, WaitStyle::Fixed);

        let toggler = {
            let flag = flag.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(60));
                flag.toggle_suspension();
                thread::sleep(Duration::from_millis(100));
                flag.toggle_suspension();
            })
        };

        painter.run();
        toggler.join().unwrap();

        // All three presentations still happen despite the pause
        assert_eq!(view.lock().unwrap().updates.len(), 3);
    }
}
