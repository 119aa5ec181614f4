//! The decode-side frame sink: timestamp rescale and seek fixup.
//!
//! Decoder capabilities do not talk to the frames queue directly; they
//! hand every output (and a `None` end-of-segment marker) to a
//! [`FrameSink`]. The sink is where "give me the frame at time t"
//! becomes deterministic:
//!
//! 1. the stream-native timestamp is rescaled to the canonical base,
//! 2. while a seek is armed, frames below the target are withheld — only
//!    the most recent one is kept, so a source that never reaches the
//!    target can still answer the query,
//! 3. the first frame at or past the target flushes that cached
//!    predecessor ahead of itself,
//! 4. with no predecessor cached, a frame that overshoots a positive
//!    target is clamped down onto it,
//! 5. the seek disarms once a frame passes.
//!
//! The cache and the clamp are a two-sided net: one covers undershoot
//! (the source lands on an earlier key frame and everything before the
//! target is dropped), the other overshoot (the nearest key frame sits
//! past the target, so the first frame is retimed to match).
//!
//! Hardware decoders call in from pool threads the engine does not own,
//! possibly late, so the fixup state sits behind its own mutex.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{error, trace};

use pm_common::{DecodedFrame, EngineError, EngineResult, Frame, Timebase, Timestamp};

use crate::queue::MsgQueue;

#[derive(Default)]
struct FixupState {
    /// Armed seek target; cleared when the first frame passes.
    seek_target: Option<Timestamp>,
    /// Most recent frame that fell below the target.
    skipped: Option<Frame>,
}

struct SinkInner {
    frames: Arc<MsgQueue<Frame>>,
    timebase: Timebase,
    use_pkt_duration: bool,
    state: Mutex<FixupState>,
}

/// Thread-safe emit path from a decoder capability into the frames queue.
#[derive(Clone)]
pub struct FrameSink {
    inner: Arc<SinkInner>,
}

impl FrameSink {
    pub fn new(frames: Arc<MsgQueue<Frame>>, timebase: Timebase, use_pkt_duration: bool) -> Self {
        Self {
            inner: Arc::new(SinkInner {
                frames,
                timebase,
                use_pkt_duration,
                state: Mutex::new(FixupState::default()),
            }),
        }
    }

    /// Arm the seek filter. Called by the decode worker after the
    /// capability has been drained, so no frame emitted for the old
    /// position can slip past the new target.
    pub fn arm_seek(&self, target: Timestamp) {
        trace!(target = %target, "arming seek filter");
        self.inner.state.lock().seek_target = Some(target);
    }

    /// Route one decoded frame through the fixup and into the frames
    /// queue. `None` marks the end of the current segment: the cached
    /// below-target frame (if any) is promoted and `Err(Eof)` returned.
    pub fn queue_frame(&self, frame: Option<DecodedFrame>) -> EngineResult<()> {
        match frame {
            None => self.end_of_segment(),
            Some(decoded) => self.push(decoded),
        }
    }

    fn end_of_segment(&self) -> EngineResult<()> {
        let pending = self.inner.state.lock().skipped.take();
        if let Some(prev) = pending {
            trace!(ts = %prev.pts, "promoting cached frame at end of segment");
            self.deliver(prev)?;
        }
        Err(EngineError::Eof)
    }

    fn push(&self, decoded: DecodedFrame) -> EngineResult<()> {
        let mut frame = self.rescale(decoded);
        trace!(ts = %frame.pts, "processing frame");

        let mut state = self.inner.state.lock();
        if let Some(target) = state.seek_target {
            if frame.pts < target {
                trace!(ts = %frame.pts, target = %target, "below seek target, caching");
                state.skipped = Some(frame);
                return Ok(());
            }
        }

        match state.skipped.take() {
            Some(prev) => {
                state.seek_target = None;
                drop(state);
                trace!(ts = %prev.pts, "flushing cached predecessor");
                self.deliver(prev)?;
                self.deliver(frame)
            }
            None => {
                if let Some(target) = state.seek_target {
                    if target > Timestamp::ZERO && frame.pts > target {
                        trace!(from = %frame.pts, to = %target, "first frame past target, clamping");
                        frame.pts = target;
                    }
                }
                state.seek_target = None;
                drop(state);
                self.deliver(frame)
            }
        }
    }

    fn rescale(&self, decoded: DecodedFrame) -> Frame {
        let pts = Timestamp::from_ticks(decoded.pts, self.inner.timebase);
        let duration = if self.inner.use_pkt_duration {
            decoded
                .duration
                .map(|d| Timestamp::from_ticks(d, self.inner.timebase))
        } else {
            None
        };
        Frame {
            payload: decoded.payload,
            width: decoded.width,
            height: decoded.height,
            format: decoded.format,
            pts,
            duration,
        }
    }

    fn deliver(&self, frame: Frame) -> EngineResult<()> {
        if let Err(err) = self.inner.frames.send(frame) {
            if !err.is_eof() {
                error!(%err, "unable to push frame");
            }
            // Latch toward the filterer so it drains and exits.
            self.inner.frames.finish(err.clone());
            return Err(err);
        }
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────────
