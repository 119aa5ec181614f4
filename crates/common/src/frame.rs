//! Decoded frames and their payloads.

use std::fmt;

use crate::color::PixelFormat;
use crate::types::Timestamp;

/// Opaque hardware buffer handle plus its release hook.
///
/// Dropping the handle runs the hook exactly once; the hook returns the
/// buffer's credit to whatever is accounting for in-flight buffers (the
/// decode governor). The hook must never block.
pub struct HwFrameHandle {
    id: u64,
    release: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl HwFrameHandle {
    pub fn new(id: u64, release: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            id,
            release: Some(Box::new(release)),
        }
    }

    /// The backend-specific buffer identifier.
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for HwFrameHandle {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl fmt::Debug for HwFrameHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HwFrameHandle").field("id", &self.id).finish()
    }
}

impl PartialEq for HwFrameHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

/// Where a frame's pixels live.
#[derive(Debug, PartialEq)]
pub enum FramePayload {
    /// CPU pixel data, tightly packed for the frame's format.
    Software(Vec<u8>),
    /// Opaque hardware-decoded buffer.
    Hardware(HwFrameHandle),
}

/// A decoded frame as emitted by a decoder capability, still timestamped
/// in the stream's native time base. The frame sink rescales it into the
/// canonical base and applies the seek fixup before anything downstream
/// sees it.
#[derive(Debug, PartialEq)]
pub struct DecodedFrame {
    pub payload: FramePayload,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    /// Presentation timestamp in stream time-base ticks.
    pub pts: i64,
    /// Duration in stream time-base ticks, when known.
    pub duration: Option<i64>,
}

/// A presentation-ready frame, timestamped in the canonical time base.
///
/// Exactly one stage owns a frame at a time; ownership transfers through
/// queue sends. The client API wraps delivered frames in `Arc`, and the
/// last clone dropping releases the payload (for hardware frames, via
/// the handle's release hook).
#[derive(Debug, PartialEq)]
pub struct Frame {
    pub payload: FramePayload,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    /// Canonical presentation timestamp.
    pub pts: Timestamp,
    /// Canonical duration, when packet durations are propagated.
    pub duration: Option<Timestamp>,
}

impl Frame {
    pub fn is_hardware(&self) -> bool {
        matches!(self.payload, FramePayload::Hardware(_))
    }

    /// Software pixel data, if this frame carries any.
    pub fn pixels(&self) -> Option<&[u8]> {
        match &self.payload {
            FramePayload::Software(data) => Some(data),
            FramePayload::Hardware(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn handle_release_runs_once_on_drop() {
        let released = Arc::new(AtomicU32::new(0));
        let r = released.clone();
        let handle = HwFrameHandle::new(7, move || {
            r.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(handle.id(), 7);
        drop(handle);
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn pixels_only_for_software_payloads() {
        let sw = Frame {
            payload: FramePayload::Software(vec![0; 4]),
            width: 1,
            height: 1,
            format: PixelFormat::Rgba8,
            pts: Timestamp::ZERO,
            duration: None,
        };
        assert!(sw.pixels().is_some());
        assert!(!sw.is_hardware());

        let hw = Frame {
            payload: FramePayload::Hardware(HwFrameHandle::new(1, || {})),
            width: 1,
            height: 1,
            format: PixelFormat::Bgra8,
            pts: Timestamp::ZERO,
            duration: None,
        };
        assert!(hw.pixels().is_none());
        assert!(hw.is_hardware());
    }
}
