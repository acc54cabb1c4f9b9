//! UDP signal transport
//!
//! One socket serves both directions: outgoing encoded signals and a receive
//! loop that decodes datagrams and hands them to the dispatcher through a
//! bounded channel, in receipt order. Delivery is unreliable by design;
//! undecodable packets are logged and dropped.
//!
//! When no socket can be bound the transport runs degraded: sends become
//! no-ops and the receive loop stays idle. The controller keeps working,
//! just unreachable.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{ToSocketAddrs, UdpSocket};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::codec::{XmlDecoder, XmlEncoder};
use crate::value::Signal;

/// Default port the feedback controller listens on
pub const FC_PORT: u16 = 12345;
/// Default port replies to a GUI peer are addressed to
pub const GUI_PORT: u16 = 12346;
/// Receive buffer size; a datagram larger than this is truncated by the OS
pub const BUFFER_SIZE: usize = 65535;

/// Bidirectional datagram transport for signals.
#[derive(Clone)]
pub struct SignalTransport {
    socket: Option<Arc<UdpSocket>>,
    encoder: XmlEncoder,
}

impl SignalTransport {
    /// Bind a socket, or fall back to the degraded no-op transport when the
    /// address is unavailable. The failure is surfaced once as a warning.
    pub async fn bind(addr: impl ToSocketAddrs) -> Self {
        match UdpSocket::bind(addr).await {
            Ok(socket) => {
                match socket.local_addr() {
                    Ok(local) => info!(%local, "control socket bound"),
                    Err(_) => info!("control socket bound"),
                }
                Self {
                    socket: Some(Arc::new(socket)),
                    encoder: XmlEncoder::new(),
                }
            }
            Err(e) => {
                warn!(error = %e, "could not bind control socket; continuing degraded (sends are no-ops)");
                Self::degraded()
            }
        }
    }

    /// A transport with no socket: sends are no-ops, receives never happen.
    pub fn degraded() -> Self {
        Self {
            socket: None,
            encoder: XmlEncoder::new(),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.socket.is_none()
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.as_ref().and_then(|s| s.local_addr().ok())
    }

    /// Encode and send one signal. Send failures are logged, not propagated;
    /// the channel is unreliable either way.
    pub async fn send_signal(&self, signal: &Signal, addr: SocketAddr) {
        let Some(socket) = &self.socket else {
            debug!(%addr, "degraded transport, dropping outgoing signal");
            return;
        };
        let payload = self.encoder.encode_packet(signal);
        match socket.send_to(payload.as_bytes(), addr).await {
            Ok(sent) => debug!(%addr, bytes = sent, kind = ?signal.kind, "signal sent"),
            Err(e) => warn!(%addr, error = %e, "failed to send signal"),
        }
    }

    /// Spawn the receive loop: decode each datagram, stamp the sender as the
    /// signal's peer, and forward it over `tx` in receipt order. Exits when
    /// the receiving side of the channel is dropped.
    pub fn spawn_recv_loop(&self, tx: mpsc::Sender<Signal>) -> tokio::task::JoinHandle<()> {
        let socket = self.socket.clone();
        tokio::spawn(async move {
            let Some(socket) = socket else {
                debug!("degraded transport, receive loop idle");
                return;
            };
            let decoder = XmlDecoder::new();
            let mut buf = vec![0u8; BUFFER_SIZE];
            loop {
                let (len, peer) = match socket.recv_from(&mut buf).await {
                    Ok(received) => received,
                    Err(e) => {
                        warn!(error = %e, "receive failed");
                        continue;
                    }
                };
                match decoder.decode_packet(&buf[..len]) {
                    Ok(mut signal) => {
                        signal.peer = Some(peer);
                        if tx.send(signal).await.is_err() {
                            debug!("dispatcher gone, stopping receive loop");
                            break;
                        }
                    }
                    // Corrupt or alien packet on an unreliable channel:
                    // drop it and move on, no reply.
                    Err(e) => warn!(%peer, error = %e, "dropping undecodable packet"),
                }
            }
        })
    }
}
