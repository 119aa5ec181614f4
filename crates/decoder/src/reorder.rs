//! Reorder buffer: decode-order callbacks → presentation-order output.
//!
//! Hardware decode callbacks deliver frames in decode order; display
//! order differs by a bounded lookahead (B-frame depth, typically well
//! under 16). The buffer keeps an ascending-timestamp staging list. On
//! every insert, entries strictly older than the newcomer can no longer
//! be overtaken — a frame still to come was submitted after the newcomer
//! and cannot precede those entries — so they are returned for emission.
//!
//! This is a pure data structure; the hardware adapter does the paired
//! governor bookkeeping around it.

use pm_common::DecodedFrame;

/// Ascending-pts staging list with insert-in-order and prefix drain.
#[derive(Default)]
pub struct ReorderBuffer {
    /// Sorted ascending by `pts` (stream time-base ticks).
    entries: Vec<DecodedFrame>,
}

impl ReorderBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage `frame` in presentation order. Returns the entries that
    /// became safe to emit, oldest first; the newcomer itself stays
    /// staged until a later frame (or a drain) flushes it.
    pub fn insert(&mut self, frame: DecodedFrame) -> Vec<DecodedFrame> {
        let cut = self.entries.partition_point(|f| f.pts < frame.pts);
        let ready: Vec<DecodedFrame> = self.entries.drain(..cut).collect();
        self.entries.insert(0, frame);
        ready
    }

    /// Empty the buffer in presentation order (end of stream, or drop).
    pub fn drain(&mut self) -> Vec<DecodedFrame> {
        std::mem::take(&mut self.entries)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pm_common::{FramePayload, PixelFormat};

    fn f(pts: i64) -> DecodedFrame {
        DecodedFrame {
            payload: FramePayload::Software(Vec::new()),
            width: 2,
            height: 2,
            format: PixelFormat::Rgba8,
            pts,
            duration: None,
        }
    }

    fn pts_of(frames: &[DecodedFrame]) -> Vec<i64> {
        frames.iter().map(|f| f.pts).collect()
    }

    #[test]
    fn in_order_stream_emits_with_one_frame_lag() {
        let mut rb = ReorderBuffer::new();
        assert!(rb.insert(f(0)).is_empty());
        assert_eq!(pts_of(&rb.insert(f(1))), [0]);
        assert_eq!(pts_of(&rb.insert(f(2))), [1]);
        assert_eq!(pts_of(&rb.drain()), [2]);
    }

    #[test]
    fn b_frame_pattern_comes_out_ascending() {
        // Decode order I P B B: pts 0, 3, 1, 2.
        let mut rb = ReorderBuffer::new();
        let mut emitted = Vec::new();
        for pts in [0, 3, 1, 2] {
            emitted.extend(pts_of(&rb.insert(f(pts))));
        }
        emitted.extend(pts_of(&rb.drain()));
        assert_eq!(emitted, [0, 1, 2, 3]);
    }

    #[test]
    fn earlier_than_everything_never_emits() {
        let mut rb = ReorderBuffer::new();
        rb.insert(f(10));
        rb.insert(f(20)); // flushes 10
        // A late-arriving earlier frame is prepended, flushing nothing.
        assert!(rb.insert(f(5)).is_empty());
        assert_eq!(rb.len(), 2);
        assert_eq!(pts_of(&rb.drain()), [5, 20]);
    }

    #[test]
    fn newcomer_flushes_all_strictly_older_entries() {
        // Descending inserts stage without flushing: [10, 20, 30].
        let mut rb = ReorderBuffer::new();
        assert!(rb.insert(f(30)).is_empty());
        assert!(rb.insert(f(20)).is_empty());
        assert!(rb.insert(f(10)).is_empty());
        assert_eq!(rb.len(), 3);
        // 25 can no longer be overtaken by anything below it.
        assert_eq!(pts_of(&rb.insert(f(25))), [10, 20]);
        assert_eq!(pts_of(&rb.drain()), [25, 30]);
    }

    #[test]
    fn drain_on_empty_is_empty() {
        let mut rb = ReorderBuffer::new();
        assert!(rb.drain().is_empty());
        assert!(rb.is_empty());
    }
}
