//! Signal routing.
//!
//! One dispatcher task consumes decoded signals in arrival order and
//! routes them by kind: control data goes to the active handler,
//! interaction signals carry lifecycle commands or handler data,
//! controller data replaces the local controller snapshot wholesale,
//! and reply signals are forwarded to the GUI port on the sender's
//! host. The dispatcher never blocks on a handler; all handler work
//! happens on the handler's own thread.

use std::net::SocketAddr;

use bcisignal::commands::{
    CMD_GET_FEEDBACKS, CMD_GET_VARIABLES, CMD_PAUSE, CMD_PLAY, CMD_QUIT, CMD_SEND_INIT, CMD_STOP,
};
use bcisignal::{Signal, SignalKind, SignalTransport, SignalValue};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::feedback::SignalData;
use crate::lifecycle::HandlerManager;

/// Key in a send_init interaction signal naming the feedback to load.
pub const FEEDBACK_KEY: &str = "_feedback";

pub struct SignalDispatcher {
    transport: SignalTransport,
    manager: HandlerManager,
    /// Latest fc-signal payload, replaced wholesale on arrival.
    fc_data: SignalData,
    gui_port: u16,
}

impl SignalDispatcher {
    pub fn new(transport: SignalTransport, manager: HandlerManager, gui_port: u16) -> Self {
        Self {
            transport,
            manager,
            fc_data: SignalData::new(),
            gui_port,
        }
    }

    pub fn manager(&self) -> &HandlerManager {
        &self.manager
    }

    pub fn fc_data(&self) -> &SignalData {
        &self.fc_data
    }

    /// Consume signals until the channel closes.
    pub async fn run(&mut self, rx: &mut mpsc::Receiver<Signal>) {
        while let Some(signal) = rx.recv().await {
            self.handle_signal(signal).await;
        }
        debug!("run: signal channel closed, dispatcher exiting");
    }

    /// Unload the active handler. The dispatcher itself stays usable.
    pub fn shutdown(&mut self) {
        self.manager.quit();
    }

    pub async fn handle_signal(&mut self, signal: Signal) {
        match signal.kind {
            SignalKind::Control => self.manager.control(&signal.data),
            SignalKind::Interaction => self.handle_interaction(signal).await,
            SignalKind::Controller => {
                debug!("handle_signal: replacing controller data ({} entries)", signal.data.len());
                self.fc_data = signal.data;
            }
            SignalKind::Reply => self.forward_reply(signal).await,
        }
    }

    async fn handle_interaction(&mut self, signal: Signal) {
        let command = signal.command().map(str::to_string);
        match command.as_deref() {
            Some(CMD_GET_FEEDBACKS) => {
                let names: Vec<SignalValue> = self
                    .manager
                    .registry()
                    .names()
                    .into_iter()
                    .map(SignalValue::Str)
                    .collect();
                let reply = Signal::new(SignalKind::Reply)
                    .with_data("feedbacks", SignalValue::List(names));
                self.reply_to(&signal, reply).await;
            }
            Some(CMD_GET_VARIABLES) => {
                let vars = self.manager.variables().unwrap_or_else(|| {
                    debug!("handle_interaction: no variables available, replying empty");
                    SignalData::new()
                });
                let reply = Signal::new(SignalKind::Reply)
                    .with_data("variables", SignalValue::Dict(vars));
                self.reply_to(&signal, reply).await;
            }
            Some(CMD_SEND_INIT) => {
                let Some(SignalValue::Str(name)) = signal.data.get(FEEDBACK_KEY) else {
                    warn!("handle_interaction: send_init without '{FEEDBACK_KEY}' entry");
                    return;
                };
                let name = name.clone();
                if let Err(e) = self.manager.init(&name) {
                    warn!("handle_interaction: init failed: {e}");
                    return;
                }
                // Initial parameters ride along with send_init.
                let mut params = signal.data;
                params.remove(FEEDBACK_KEY);
                if !params.is_empty() {
                    self.manager.interaction(&params);
                }
            }
            Some(CMD_PLAY) => {
                if let Err(e) = self.manager.play() {
                    warn!("handle_interaction: play failed: {e}");
                }
            }
            Some(CMD_PAUSE) => {
                if let Err(e) = self.manager.pause() {
                    warn!("handle_interaction: pause failed: {e}");
                }
            }
            Some(CMD_STOP) => {
                if let Err(e) = self.manager.stop() {
                    warn!("handle_interaction: stop failed: {e}");
                }
            }
            Some(CMD_QUIT) => {
                info!("handle_interaction: quit, unloading handler");
                self.manager.quit();
            }
            // Commands the controller does not claim are feedback-specific
            // (palette switches, word-list updates and the like): the data
            // goes to the handler verbatim.
            Some(other) => {
                debug!("handle_interaction: forwarding '{other}' data to handler");
                self.manager.interaction(&signal.data);
            }
            None => self.manager.interaction(&signal.data),
        }
    }

    /// Reply signals go to the GUI port on the originating host, not
    /// back to the ephemeral source port.
    async fn forward_reply(&self, signal: Signal) {
        let Some(peer) = signal.peer else {
            warn!("forward_reply: reply signal without peer, dropping");
            return;
        };
        let target = SocketAddr::new(peer.ip(), self.gui_port);
        self.transport.send_signal(&signal, target).await;
    }

    async fn reply_to(&self, origin: &Signal, reply: Signal) {
        let Some(peer) = origin.peer else {
            warn!("reply_to: request without peer, cannot reply");
            return;
        };
        let target = SocketAddr::new(peer.ip(), self.gui_port);
        debug!("reply_to: sending reply to {target}");
        self.transport.send_signal(&reply, target).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feedback::{Feedback, FeedbackRegistry};
    use crate::lifecycle::{HandlerState, RunHandle};
    use bcisignal::XmlDecoder;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::net::UdpSocket;
    use tokio::time::timeout;

    #[derive(Clone, Default)]
    struct EventLog(Arc<Mutex<Vec<SignalData>>>);

    /// Records every interaction hook call.
    struct RecordingFeedback {
        log: EventLog,
    }

    impl Feedback for RecordingFeedback {
        fn on_play(&mut self, _run: &RunHandle) {}
        fn on_interaction_event(&mut self, data: &SignalData) {
            self.log.0.lock().unwrap().push(data.clone());
        }
    }

    async fn gui_socket() -> (UdpSocket, SocketAddr) {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        (socket, addr)
    }

    async fn recv_signal(socket: &UdpSocket) -> Signal {
        let mut buf = vec![0u8; 65535];
        let len = timeout(Duration::from_secs(2), socket.recv(&mut buf))
            .await
            .expect("timed out waiting for reply")
            .unwrap();
        XmlDecoder::new().decode_packet(&buf[..len]).unwrap()
    }

    fn dispatcher_with_gui(gui_port: u16, transport: SignalTransport) -> SignalDispatcher {
        SignalDispatcher::new(
            transport,
            HandlerManager::new(FeedbackRegistry::with_builtins()),
            gui_port,
        )
    }

    #[tokio::test]
    async fn test_get_feedbacks_replies_to_gui_port() {
        let (gui, gui_addr) = gui_socket().await;
        let transport = SignalTransport::bind("127.0.0.1:0").await;
        let mut dispatcher = dispatcher_with_gui(gui_addr.port(), transport);

        // Request arrives from an ephemeral source port; the reply must
        // land on the GUI port regardless.
        let request = Signal::new(SignalKind::Interaction)
            .with_command(CMD_GET_FEEDBACKS)
            .with_peer("127.0.0.1:49152".parse().unwrap());
        dispatcher.handle_signal(request).await;

        let reply = recv_signal(&gui).await;
        assert_eq!(reply.kind, SignalKind::Reply);
        let Some(SignalValue::List(names)) = reply.data.get("feedbacks") else {
            panic!("missing feedbacks list: {:?}", reply.data);
        };
        assert!(names.contains(&SignalValue::Str("nop".to_string())));
    }

    #[tokio::test]
    async fn test_get_variables_without_handler_replies_empty() {
        let (gui, gui_addr) = gui_socket().await;
        let transport = SignalTransport::bind("127.0.0.1:0").await;
        let mut dispatcher = dispatcher_with_gui(gui_addr.port(), transport);

        let request = Signal::new(SignalKind::Interaction)
            .with_command(CMD_GET_VARIABLES)
            .with_peer("127.0.0.1:49152".parse().unwrap());
        dispatcher.handle_signal(request).await;

        let reply = recv_signal(&gui).await;
        assert_eq!(
            reply.data.get("variables"),
            Some(&SignalValue::Dict(SignalData::new()))
        );
    }

    #[tokio::test]
    async fn test_send_init_loads_named_feedback() {
        let transport = SignalTransport::degraded();
        let mut dispatcher = dispatcher_with_gui(0, transport);

        let signal = Signal::new(SignalKind::Interaction)
            .with_command(CMD_SEND_INIT)
            .with_data(FEEDBACK_KEY, "nop");
        dispatcher.handle_signal(signal).await;

        assert_eq!(dispatcher.manager().active_name(), Some("nop"));
    }

    #[tokio::test]
    async fn test_send_init_unknown_feedback_leaves_state() {
        let transport = SignalTransport::degraded();
        let mut dispatcher = dispatcher_with_gui(0, transport);

        let signal = Signal::new(SignalKind::Interaction)
            .with_command(CMD_SEND_INIT)
            .with_data(FEEDBACK_KEY, "missing");
        dispatcher.handle_signal(signal).await;

        assert_eq!(dispatcher.manager().state(), HandlerState::Unloaded);
    }

    #[tokio::test]
    async fn test_controller_data_replaced_wholesale() {
        let transport = SignalTransport::degraded();
        let mut dispatcher = dispatcher_with_gui(0, transport);

        let first = Signal::new(SignalKind::Controller)
            .with_data("a", 1i64)
            .with_data("b", 2i64);
        dispatcher.handle_signal(first).await;
        assert_eq!(dispatcher.fc_data().len(), 2);

        let second = Signal::new(SignalKind::Controller).with_data("c", 3i64);
        dispatcher.handle_signal(second).await;
        assert_eq!(dispatcher.fc_data().len(), 1);
        assert_eq!(dispatcher.fc_data().get("c"), Some(&SignalValue::Int(3)));
    }

    #[tokio::test]
    async fn test_reply_forwarded_to_gui_port() {
        let (gui, gui_addr) = gui_socket().await;
        let transport = SignalTransport::bind("127.0.0.1:0").await;
        let mut dispatcher = dispatcher_with_gui(gui_addr.port(), transport);

        let signal = Signal::new(SignalKind::Reply)
            .with_data("echo", "hello")
            .with_peer("127.0.0.1:49152".parse().unwrap());
        dispatcher.handle_signal(signal).await;

        let reply = recv_signal(&gui).await;
        assert_eq!(reply.data.get("echo"), Some(&SignalValue::Str("hello".to_string())));
    }

    #[tokio::test]
    async fn test_feedback_specific_command_forwarded_to_handler() {
        let log = EventLog::default();
        let mut registry = FeedbackRegistry::new();
        registry.register("recorder", {
            let log = log.clone();
            move || Box::new(RecordingFeedback { log: log.clone() })
        });
        let mut dispatcher = SignalDispatcher::new(
            SignalTransport::degraded(),
            HandlerManager::new(registry),
            0,
        );

        dispatcher
            .handle_signal(
                Signal::new(SignalKind::Interaction)
                    .with_command(CMD_SEND_INIT)
                    .with_data(FEEDBACK_KEY, "recorder"),
            )
            .await;
        dispatcher
            .handle_signal(
                Signal::new(SignalKind::Interaction)
                    .with_command("set_palette")
                    .with_data("color", "red"),
            )
            .await;

        // The hook runs on the handler thread; give it a moment.
        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        loop {
            let events = log.0.lock().unwrap().clone();
            if let Some(data) = events.first() {
                assert_eq!(data.get("color"), Some(&SignalValue::Str("red".to_string())));
                break;
            }
            assert!(
                std::time::Instant::now() < deadline,
                "interaction data never reached the handler"
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test]
    async fn test_command_without_handler_is_dropped() {
        let transport = SignalTransport::degraded();
        let mut dispatcher = dispatcher_with_gui(0, transport);

        let signal = Signal::new(SignalKind::Interaction).with_command("frobnicate");
        dispatcher.handle_signal(signal).await;
        assert_eq!(dispatcher.manager().state(), HandlerState::Unloaded);
    }

    #[tokio::test]
    async fn test_control_updates_run_handle() {
        let transport = SignalTransport::degraded();
        let mut dispatcher = dispatcher_with_gui(0, transport);

        let init = Signal::new(SignalKind::Interaction)
            .with_command(CMD_SEND_INIT)
            .with_data(FEEDBACK_KEY, "nop");
        dispatcher.handle_signal(init).await;

        let control = Signal::new(SignalKind::Control).with_data("cl_output", 0.75f64);
        dispatcher.handle_signal(control).await;

        // Latest control data is visible through the handler's variables
        // path indirectly; here we just confirm routing did not panic and
        // the handler stayed loaded.
        assert_eq!(dispatcher.manager().active_name(), Some("nop"));
    }
}
