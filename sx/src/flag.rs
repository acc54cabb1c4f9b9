//! CooperativeFlag - shared suspend/resume/cancel signal
//!
//! A tri-state register shared between the control context (which mutates it
//! on pause/resume/quit events) and the render/timing context (which polls it
//! between iteration elements and blocks on it while suspended). Implemented
//! as a mutex-guarded state with a condvar so that waiters wake promptly on
//! resume or cancellation.

use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tracing::debug;

/// The three states a presentation run can be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Iteration proceeds normally
    Running,
    /// Iteration blocks at the next checkpoint until resumed
    Suspended,
    /// Iteration terminates at the next checkpoint; permanent for the run
    Off,
}

/// Shared suspend/resume/cancel flag.
///
/// Created once per run by the session owner and handed out as
/// `Arc<CooperativeFlag>` to every [`Switcherator`](crate::Switcherator) and
/// [`StimulusPainter`](crate::StimulusPainter) in the same run. Only the
/// session owner mutates it.
#[derive(Debug)]
pub struct CooperativeFlag {
    state: Mutex<RunState>,
    cond: Condvar,
}

impl CooperativeFlag {
    /// Create a flag in the Running state
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RunState::Running),
            cond: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RunState> {
        // A poisoned lock only means a panicking thread held it; the state
        // itself is a plain enum and always valid.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Force the flag back to Running. Called at the start of a fresh run;
    /// this is the only way out of Off.
    pub fn reset(&self) {
        let mut state = self.lock();
        debug!(from = ?*state, "reset: flag forced to Running");
        *state = RunState::Running;
        self.cond.notify_all();
    }

    /// Switch the flag off, terminating every iteration tied to it at the
    /// next checkpoint. Permanent for the run.
    pub fn off(&self) {
        let mut state = self.lock();
        debug!(from = ?*state, "off: flag switched off");
        *state = RunState::Off;
        self.cond.notify_all();
    }

    /// Toggle between Running and Suspended. No-op when the flag is Off.
    pub fn toggle_suspension(&self) {
        let mut state = self.lock();
        match *state {
            RunState::Running => {
                debug!("toggle_suspension: Running -> Suspended");
                *state = RunState::Suspended;
            }
            RunState::Suspended => {
                debug!("toggle_suspension: Suspended -> Running");
                *state = RunState::Running;
                self.cond.notify_all();
            }
            RunState::Off => {
                debug!("toggle_suspension: flag is Off, ignoring");
            }
        }
    }

    /// Block the calling thread until the state leaves Suspended.
    ///
    /// Returns the state observed on wake-up, which is either Running or Off
    /// (quit can arrive while suspended).
    pub fn wait(&self) -> RunState {
        let mut state = self.lock();
        while *state == RunState::Suspended {
            state = self
                .cond
                .wait(state)
                .unwrap_or_else(|e| e.into_inner());
        }
        *state
    }

    /// Sleep for up to `duration`, waking early iff the flag goes Off.
    ///
    /// Returns `true` when the full duration elapsed, `false` when the sleep
    /// was cut short by cancellation. Suspension does not interrupt the
    /// sleep; it is observed at the next prepare/fetch checkpoint instead.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        let mut state = self.lock();
        loop {
            if *state == RunState::Off {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            let (guard, _timeout) = self
                .cond
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(|e| e.into_inner());
            state = guard;
        }
    }

    /// Current state snapshot
    pub fn state(&self) -> RunState {
        *self.lock()
    }

    pub fn is_running(&self) -> bool {
        self.state() == RunState::Running
    }

    pub fn is_suspended(&self) -> bool {
        self.state() == RunState::Suspended
    }

    pub fn is_off(&self) -> bool {
        self.state() == RunState::Off
    }
}

impl Default for CooperativeFlag {
    fn default() -> Self {
        Self::new()
    }
}
