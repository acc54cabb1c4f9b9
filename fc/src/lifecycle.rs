//! Handler lifecycle management.
//!
//! Each loaded feedback runs on its own dedicated OS thread so that a
//! long-running `on_play` (the stimulus loop) never blocks the network
//! dispatcher. The dispatcher talks to the thread through a bounded
//! command inbox and, for latency-critical operations (pause, stop),
//! mutates the run's [`CooperativeFlag`] directly instead of queueing.

use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, SyncSender, TrySendError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use switcherator::CooperativeFlag;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::feedback::{Feedback, FeedbackRegistry, SignalData};

/// Commands the dispatcher may queue on a handler thread.
///
/// Hook calls are delivered strictly in arrival order. Pause and stop
/// additionally act on the run flag out of band, so a handler stuck in
/// a stimulus wait still reacts within one wait interval.
pub enum HandlerCommand {
    Init,
    Play,
    Pause,
    Stop,
    Quit,
    Control(SignalData),
    Interaction(SignalData),
    Variables(SyncSender<SignalData>),
}

/// Lifecycle states of the (at most one) loaded handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerState {
    /// No handler loaded, or the handler has quit.
    Unloaded,
    /// Loaded and initialized, not presenting.
    Ready,
    /// `on_play` is executing.
    Running,
    /// Suspended mid-run; the run flag is in its suspended state.
    Paused,
}

#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("unknown feedback '{0}'")]
    UnknownFeedback(String),
    #[error("no handler is loaded")]
    NoActiveHandler,
}

/// Shared per-run context handed to a feedback's `on_play`.
///
/// The dispatcher keeps the latest control data here so the stimulus
/// loop can poll it without waiting for the queued hook call to drain.
pub struct RunHandle {
    flag: Arc<CooperativeFlag>,
    control: Mutex<SignalData>,
}

impl RunHandle {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            flag: Arc::new(CooperativeFlag::new()),
            control: Mutex::new(BTreeMap::new()),
        })
    }

    /// The run's cooperative flag. Clones share state.
    pub fn flag(&self) -> Arc<CooperativeFlag> {
        Arc::clone(&self.flag)
    }

    /// Snapshot of the most recent control-signal data.
    pub fn latest_control(&self) -> SignalData {
        self.control
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub(crate) fn set_control(&self, data: SignalData) {
        *self.control.lock().unwrap_or_else(|e| e.into_inner()) = data;
    }
}

struct ActiveHandler {
    name: String,
    tx: SyncSender<HandlerCommand>,
    thread: Option<thread::JoinHandle<()>>,
    run: Arc<RunHandle>,
    state: Arc<Mutex<HandlerState>>,
}

/// Owns the single active handler and its worker thread.
pub struct HandlerManager {
    registry: FeedbackRegistry,
    active: Option<ActiveHandler>,
    stop_timeout: Duration,
}

const INBOX_CAPACITY: usize = 64;
const VARIABLES_TIMEOUT: Duration = Duration::from_millis(500);

impl HandlerManager {
    pub fn new(registry: FeedbackRegistry) -> Self {
        Self {
            registry,
            active: None,
            stop_timeout: Duration::from_secs(2),
        }
    }

    /// Bound on how long `quit` waits for the handler thread to exit
    /// before detaching it.
    pub fn stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }

    pub fn registry(&self) -> &FeedbackRegistry {
        &self.registry
    }

    /// Name of the loaded handler, if any.
    pub fn active_name(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.name.as_str())
    }

    pub fn state(&self) -> HandlerState {
        match &self.active {
            Some(active) => *active.state.lock().unwrap_or_else(|e| e.into_inner()),
            None => HandlerState::Unloaded,
        }
    }

    /// Instantiate `name` on a fresh handler thread, replacing (and
    /// quitting) any previously loaded handler.
    pub fn init(&mut self, name: &str) -> Result<(), HandlerError> {
        let feedback = self
            .registry
            .create(name)
            .ok_or_else(|| HandlerError::UnknownFeedback(name.to_string()))?;
        self.quit();

        let run = RunHandle::new();
        let state = Arc::new(Mutex::new(HandlerState::Unloaded));
        let (tx, rx) = mpsc::sync_channel(INBOX_CAPACITY);
        let thread = thread::Builder::new()
            .name(format!("feedback-{name}"))
            .spawn({
                let run = Arc::clone(&run);
                let state = Arc::clone(&state);
                move || handler_thread(feedback, rx, run, state)
            })
            .map_err(|e| {
                error!("init: failed to spawn handler thread: {e}");
                HandlerError::NoActiveHandler
            })?;

        info!("init: loaded feedback '{name}'");
        let active = ActiveHandler {
            name: name.to_string(),
            tx,
            thread: Some(thread),
            run,
            state,
        };
        // Queue the init hook before anything else can arrive.
        send_or_warn(&active.tx, HandlerCommand::Init);
        self.active = Some(active);
        Ok(())
    }

    /// Start a run. Ignored with a warning while a run is in progress.
    pub fn play(&mut self) -> Result<(), HandlerError> {
        let active = self.active.as_ref().ok_or(HandlerError::NoActiveHandler)?;
        match self.state() {
            HandlerState::Running | HandlerState::Paused => {
                warn!("play: handler '{}' is already running", active.name);
                Ok(())
            }
            _ => {
                send_or_warn(&active.tx, HandlerCommand::Play);
                Ok(())
            }
        }
    }

    /// Toggle suspension of the current run.
    pub fn pause(&mut self) -> Result<(), HandlerError> {
        let active = self.active.as_ref().ok_or(HandlerError::NoActiveHandler)?;
        let mut state = active.state.lock().unwrap_or_else(|e| e.into_inner());
        match *state {
            HandlerState::Running => {
                active.run.flag.toggle_suspension();
                *state = HandlerState::Paused;
            }
            HandlerState::Paused => {
                active.run.flag.toggle_suspension();
                *state = HandlerState::Running;
            }
            other => {
                debug!("pause: ignored in state {other:?}");
                return Ok(());
            }
        }
        drop(state);
        send_or_warn(&active.tx, HandlerCommand::Pause);
        Ok(())
    }

    /// End the current run. The flag is turned off immediately so the
    /// stimulus loop terminates at its next checkpoint; the stop hook
    /// is queued behind any pending commands.
    pub fn stop(&mut self) -> Result<(), HandlerError> {
        let active = self.active.as_ref().ok_or(HandlerError::NoActiveHandler)?;
        active.run.flag.off();
        send_or_warn(&active.tx, HandlerCommand::Stop);
        Ok(())
    }

    /// Unload the handler entirely. The dispatcher itself keeps
    /// running; a later init can load a new handler.
    pub fn quit(&mut self) {
        let Some(mut active) = self.active.take() else {
            return;
        };
        debug!("quit: unloading feedback '{}'", active.name);
        active.run.flag.off();
        send_or_warn(&active.tx, HandlerCommand::Quit);

        let Some(thread) = active.thread.take() else {
            return;
        };
        // Bounded join. Dropping `active.tx` afterwards closes the
        // inbox, so even a thread that missed the quit command exits
        // once it drains.
        let deadline = Instant::now() + self.stop_timeout;
        while !thread.is_finished() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        if thread.is_finished() {
            let _ = thread.join();
        } else {
            warn!(
                "quit: handler '{}' did not stop within {:?}, detaching",
                active.name, self.stop_timeout
            );
        }
    }

    /// Store the latest control data live and queue the control hook.
    pub fn control(&self, data: &SignalData) {
        let Some(active) = &self.active else {
            debug!("control: no handler loaded, dropping signal");
            return;
        };
        active.run.set_control(data.clone());
        send_or_warn(&active.tx, HandlerCommand::Control(data.clone()));
    }

    /// Forward interaction data to the handler's hook.
    pub fn interaction(&self, data: &SignalData) {
        let Some(active) = &self.active else {
            debug!("interaction: no handler loaded, dropping signal");
            return;
        };
        send_or_warn(&active.tx, HandlerCommand::Interaction(data.clone()));
    }

    /// Ask the handler for its exposed variables. Returns `None` when
    /// no handler is loaded or the thread is busy in a run and does not
    /// answer within the timeout.
    pub fn variables(&self) -> Option<SignalData> {
        let active = self.active.as_ref()?;
        let (reply_tx, reply_rx) = mpsc::sync_channel(1);
        if let Err(e) = active.tx.try_send(HandlerCommand::Variables(reply_tx)) {
            warn!("variables: could not query handler: {e}");
            return None;
        }
        match reply_rx.recv_timeout(VARIABLES_TIMEOUT) {
            Ok(vars) => Some(vars),
            Err(_) => {
                debug!("variables: handler '{}' did not answer in time", active.name);
                None
            }
        }
    }
}

impl Drop for HandlerManager {
    fn drop(&mut self) {
        self.quit();
    }
}

fn send_or_warn(tx: &SyncSender<HandlerCommand>, cmd: HandlerCommand) {
    match tx.try_send(cmd) {
        Ok(()) => {}
        Err(TrySendError::Full(_)) => {
            warn!("handler inbox full, dropping command");
        }
        Err(TrySendError::Disconnected(_)) => {
            warn!("handler thread gone, dropping command");
        }
    }
}

fn handler_thread(
    mut feedback: Box<dyn Feedback>,
    rx: mpsc::Receiver<HandlerCommand>,
    run: Arc<RunHandle>,
    state: Arc<Mutex<HandlerState>>,
) {
    let set_state = |s: HandlerState| {
        *state.lock().unwrap_or_else(|e| e.into_inner()) = s;
    };
    while let Ok(cmd) = rx.recv() {
        match cmd {
            HandlerCommand::Init => {
                guard("on_init", || feedback.on_init());
                set_state(HandlerState::Ready);
            }
            HandlerCommand::Play => {
                // A previous run (or a stop that raced play) may have
                // left the flag off; each run starts from a fresh flag.
                run.flag.reset();
                set_state(HandlerState::Running);
                guard("on_play", || feedback.on_play(&run));
                let mut st = state.lock().unwrap_or_else(|e| e.into_inner());
                if matches!(*st, HandlerState::Running | HandlerState::Paused) {
                    *st = HandlerState::Ready;
                }
            }
            HandlerCommand::Pause => guard("on_pause", || feedback.on_pause()),
            HandlerCommand::Stop => guard("on_stop", || feedback.on_stop()),
            HandlerCommand::Quit => {
                guard("on_quit", || feedback.on_quit());
                set_state(HandlerState::Unloaded);
                break;
            }
            HandlerCommand::Control(data) => {
                guard("on_control_event", || feedback.on_control_event(&data));
            }
            HandlerCommand::Interaction(data) => {
                guard("on_interaction_event", || {
                    feedback.on_interaction_event(&data)
                });
            }
            HandlerCommand::Variables(reply) => {
                let _ = reply.try_send(feedback.variables());
            }
        }
    }
}

/// Runs a handler callback, containing panics so a faulty feedback
/// cannot take down its thread between hook calls.
fn guard(hook: &str, f: impl FnOnce()) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(f)) {
        let msg = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        error!("handler {hook} panicked: {msg}");
    }
}
