//! Timestamp-marker output.
//!
//! Feedbacks emit numeric trigger codes at timing-relevant moments so
//! an external recording can be aligned with the presentation. Without
//! marker hardware attached the codes are only logged; the traced
//! timeline still makes run boundaries visible.

use tracing::debug;

/// Well-known trigger codes shared by the built-in feedbacks.
pub mod codes {
    pub const RUN_START: u8 = 252;
    pub const RUN_END: u8 = 253;
    pub const COUNTDOWN_START: u8 = 200;
    pub const COUNTDOWN_END: u8 = 201;
    pub const BURST_START: u8 = 105;
    pub const BURST_END: u8 = 106;
    /// Offset added to a typed count when reporting it as a marker.
    pub const COUNTED_OFFSET: u8 = 150;
    pub const TARGET_ABSENT_OFFSET: u8 = 11;
    pub const TARGET_PRESENT_OFFSET: u8 = 21;
}

/// Sink for trigger codes.
pub trait Trigger: Send {
    fn send(&mut self, code: u8);
}

/// Logs codes instead of driving hardware.
#[derive(Default)]
pub struct LogTrigger;

impl Trigger for LogTrigger {
    fn send(&mut self, code: u8) {
        debug!("trigger: {code}");
    }
}
