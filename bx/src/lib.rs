//! BciSignal - typed signal model, XML wire codec and UDP transport
//!
//! Feedback controllers and GUIs exchange self-describing XML datagrams over
//! UDP. This crate owns the three layers of that exchange:
//!
//! - [`value`] - the closed tagged-union value type and the [`Signal`]
//!   envelope (kind, data mapping, command tokens, peer address)
//! - [`codec`] - lossless encode/decode between signals and the
//!   `<bci-signal>` document format
//! - [`net`] - the datagram transport, including the degraded no-op mode
//!   used when no socket can be bound
//!
//! Delivery is assumed unreliable; a packet that cannot be decoded is logged
//! and dropped, never retried.

pub mod codec;
pub mod net;
pub mod value;

pub use codec::{DecodingError, XmlDecoder, XmlEncoder};
pub use net::{BUFFER_SIZE, FC_PORT, GUI_PORT, SignalTransport};
pub use value::{Signal, SignalKind, SignalValue};

/// Controller-level command tokens carried in interaction signals
pub mod commands {
    pub const CMD_GET_FEEDBACKS: &str = "get_feedbacks";
    pub const CMD_GET_VARIABLES: &str = "get_variables";
    pub const CMD_PLAY: &str = "play";
    pub const CMD_PAUSE: &str = "pause";
    pub const CMD_STOP: &str = "stop";
    pub const CMD_QUIT: &str = "quit";
    pub const CMD_SEND_INIT: &str = "send_init";
}
