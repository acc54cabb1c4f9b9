//! FrameCounter - rendering instrument
//!
//! Counts frames drawn by the view so the painter can report how many frames
//! were rendered per presentation slot when frame debugging is enabled.

use std::sync::atomic::{AtomicU64, Ordering};

/// Shared frame counter.
///
/// The rendering side calls [`tick`](Self::tick) once per drawn frame; the
/// painter calls [`lock`](Self::lock) at each presentation boundary and reads
/// [`last_interval`](Self::last_interval) to learn how many frames elapsed
/// since the previous boundary.
#[derive(Debug, Default)]
pub struct FrameCounter {
    frames: AtomicU64,
    locked_at: AtomicU64,
}

impl FrameCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset both counters. Called when a painter run starts.
    pub fn start(&self) {
        self.frames.store(0, Ordering::Relaxed);
        self.locked_at.store(0, Ordering::Relaxed);
    }

    /// Record one drawn frame
    pub fn tick(&self) {
        self.frames.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot the current frame count as the new interval origin
    pub fn lock(&self) {
        self.locked_at.store(self.frames.load(Ordering::Relaxed), Ordering::Relaxed);
    }

    /// Frames drawn since the last [`lock`](Self::lock)
    pub fn last_interval(&self) -> u64 {
        self.frames
            .load(Ordering::Relaxed)
            .saturating_sub(self.locked_at.load(Ordering::Relaxed))
    }

    /// Total frames drawn since [`start`](Self::start)
    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_tracks_frames_since_lock() {
        let counter = FrameCounter::new();
        counter.start();
        counter.tick();
        counter.tick();
        counter.tick();
        assert_eq!(counter.last_interval(), 3);

        counter.lock();
        assert_eq!(counter.last_interval(), 0);

        counter.tick();
        assert_eq!(counter.last_interval(), 1);
        assert_eq!(counter.frames(), 4);
    }

    #[test]
    fn test_start_resets() {
        let counter = FrameCounter::new();
        counter.tick();
        counter.lock();
        counter.start();
        assert_eq!(counter.frames(), 0);
        assert_eq!(counter.last_interval(), 0);
    }
}
