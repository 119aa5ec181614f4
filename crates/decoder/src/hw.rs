//! Asynchronous hardware-decoder adapter.
//!
//! Hardware sessions decode out-of-band: a submission returns at once
//! and the decoded buffer arrives later through a completion callback,
//! on a pool thread the engine does not own, in decode order rather
//! than presentation order, and possibly *after* an apparent drain wait.
//! This adapter turns that into the synchronous [`Decoder`] contract:
//!
//! - submissions are capped at `max_in_flight` concurrently in the
//!   session (default 3 — some platforms hard-deadlock beyond that when
//!   the app is backgrounded, so the cap is the workaround and stays
//!   configurable);
//! - the callback stages each buffer in a [`ReorderBuffer`] and emits
//!   the presentation-ordered prefix;
//! - a [`BufferGovernor`] bounds buffers alive outside the session: the
//!   callback's credit acquisition blocks when the client sits on too
//!   many undelivered frames, and each frame's release hook is the only
//!   credit back;
//! - `flush` finishes delayed frames, waits out the drain, then waits
//!   again on the in-flight counter — the platform drain wait alone
//!   does not guarantee the callbacks completed.
//!
//! The governor and the reorder state live behind `Arc`s owned by the
//! callback closure, so a straggler callback firing after a failed
//! submission or a completed drain lands on valid state and is absorbed.

use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, trace};

use pm_common::{
    DecodeOptions, DecodedFrame, EngineError, EngineResult, FramePayload, HwFrameHandle, Packet,
    PixelFormat,
};
use pm_pipeline::{Decoder, FrameSink};

use crate::governor::BufferGovernor;
use crate::reorder::ReorderBuffer;

/// Default cap on concurrent session submissions.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 3;

/// One compressed sample submitted to a session.
#[derive(Debug)]
pub struct HwSample {
    pub data: Vec<u8>,
    /// Presentation timestamp in stream time-base ticks; echoed back on
    /// the matching output.
    pub pts: i64,
    pub duration: Option<i64>,
}

/// One decoded buffer delivered by a session.
#[derive(Debug)]
pub struct HwOutput {
    /// Backend-specific buffer identifier, already retained for us.
    pub buffer_id: u64,
    pub pts: i64,
    pub width: u32,
    pub height: u32,
}

/// Completion callback. `None` means the sample produced no output
/// (dropped or corrupt). May run on any thread, at any time before the
/// session's `invalidate` returns.
pub type HwCallback = Arc<dyn Fn(Option<HwOutput>) + Send + Sync>;

/// An open platform decode session.
pub trait HwSession: Send {
    /// Submit one sample for asynchronous decode.
    fn submit(&mut self, sample: HwSample) -> EngineResult<()>;

    /// Ask the session to finish delayed frames (drain request).
    fn finish_delayed(&mut self);

    /// Block until the session's drain completes. Completion callbacks
    /// may still fire after this returns.
    fn wait_drained(&mut self);

    /// Tear the session down. No callback fires after this returns.
    fn invalidate(&mut self);
}

/// Factory for platform decode sessions.
pub trait HwBackend: Send {
    fn open(&mut self, opts: &DecodeOptions, callback: HwCallback) -> EngineResult<Box<dyn HwSession>>;
}

struct HwState {
    reorder: ReorderBuffer,
    /// Samples submitted whose callbacks have not completed yet.
    in_flight: i32,
}

struct HwShared {
    state: Mutex<HwState>,
    cond: Condvar,
    governor: Arc<BufferGovernor>,
    sink: FrameSink,
    format: PixelFormat,
}

/// Completion path; runs on the session's pool threads.
fn handle_output(shared: &Arc<HwShared>, output: Option<HwOutput>) {
    let Some(out) = output else {
        trace!("decode callback without output buffer");
        shared.state.lock().in_flight -= 1;
        shared.cond.notify_all();
        return;
    };
    trace!(pts = out.pts, buffer = out.buffer_id, "decode callback");

    let governor = shared.governor.clone();
    let decoded = DecodedFrame {
        payload: FramePayload::Hardware(HwFrameHandle::new(out.buffer_id, move || {
            governor.adjust_ref(-1);
        })),
        width: out.width,
        height: out.height,
        format: shared.format,
        pts: out.pts,
        duration: None,
    };

    let ready = {
        let mut st = shared.state.lock();
        let ready = st.reorder.insert(decoded);
        // The newcomer enlarges the in-air budget while it is staged.
        shared.governor.adjust_max(1);
        ready
    };
    // Emission happens outside the state lock: a full frames queue may
    // block here and the lock must stay available to other callbacks.
    for frame in ready {
        let _ = shared.sink.queue_frame(Some(frame));
        shared.governor.adjust_max(-1);
    }

    // Mark the submission complete before the potentially blocking
    // credit, so a drain waiting on the counter can proceed.
    shared.state.lock().in_flight -= 1;
    shared.cond.notify_all();
    shared.governor.adjust_ref(1);
}

/// [`Decoder`] adapter over an asynchronous hardware session.
pub struct HwAccelDecoder {
    backend: Box<dyn HwBackend>,
    max_in_flight: usize,
    session: Option<Box<dyn HwSession>>,
    shared: Option<Arc<HwShared>>,
}

impl HwAccelDecoder {
    pub fn new(backend: Box<dyn HwBackend>) -> Self {
        Self::with_max_in_flight(backend, DEFAULT_MAX_IN_FLIGHT)
    }

    /// # Panics
    ///
    /// Panics if `max_in_flight` is zero.
    pub fn with_max_in_flight(backend: Box<dyn HwBackend>, max_in_flight: usize) -> Self {
        assert!(max_in_flight > 0, "max_in_flight must be > 0");
        Self {
            backend,
            max_in_flight,
            session: None,
            shared: None,
        }
    }

    /// Current `(refcount, refmax)` of the session's governor, for
    /// diagnostics. `None` while uninitialized.
    pub fn buffer_counts(&self) -> Option<(i32, i32)> {
        self.shared.as_ref().map(|s| s.governor.counts())
    }
}

impl Decoder for HwAccelDecoder {
    fn init(&mut self, sink: FrameSink, opts: &DecodeOptions) -> EngineResult<()> {
        let shared = Arc::new(HwShared {
            state: Mutex::new(HwState {
                reorder: ReorderBuffer::new(),
                in_flight: 0,
            }),
            cond: Condvar::new(),
            governor: Arc::new(BufferGovernor::new(self.max_in_flight)),
            sink,
            format: opts.hw_pix_fmt,
        });
        let callback: HwCallback = {
            let shared = shared.clone();
            Arc::new(move |out| handle_output(&shared, out))
        };
        let session = self.backend.open(opts, callback)?;
        debug!(max_in_flight = self.max_in_flight, "hardware session open");
        self.session = Some(session);
        self.shared = Some(shared);
        Ok(())
    }

    fn push_packet(&mut self, packet: Option<Packet>) -> EngineResult<()> {
        let (Some(session), Some(shared)) = (self.session.as_mut(), self.shared.as_ref()) else {
            return Err(EngineError::Decoder("decoder not initialized".into()));
        };

        // Hard cap on samples in the air in this session.
        {
            let mut st = shared.state.lock();
            while st.in_flight >= self.max_in_flight as i32 {
                shared.cond.wait(&mut st);
            }
        }

        let Some(pkt) = packet else {
            session.finish_delayed();
            return Err(EngineError::Eof);
        };

        shared.state.lock().in_flight += 1;
        trace!(pts = pkt.pts, size = pkt.data.len(), "submitting sample");
        if let Err(err) = session.submit(HwSample {
            data: pkt.data,
            pts: pkt.pts,
            duration: pkt.duration,
        }) {
            error!(%err, "hardware decode submission failed");
            // The backend may or may not still fire a callback for the
            // failed sample; reset the counter so nothing waits on it.
            shared.state.lock().in_flight = 0;
            shared.cond.notify_all();
            return Err(EngineError::External(
                "hardware decode submission failed".into(),
            ));
        }
        Ok(())
    }

    fn flush(&mut self) {
        let (Some(session), Some(shared)) = (self.session.as_mut(), self.shared.as_ref()) else {
            return;
        };
        debug!("flushing hardware session");
        session.finish_delayed();
        session.wait_drained();

        // The drain wait does not guarantee the callbacks completed.
        {
            let mut st = shared.state.lock();
            while st.in_flight > 0 {
                shared.cond.wait(&mut st);
            }
        }

        let tail = { shared.state.lock().reorder.drain() };
        let staged = tail.len() as i32;
        trace!(staged, "emitting reordered tail");
        for frame in tail {
            let _ = shared.sink.queue_frame(Some(frame));
        }
        if staged > 0 {
            shared.governor.adjust_max(-staged);
        }
        let _ = shared.sink.queue_frame(None);
    }

    fn uninit(&mut self) {
        let Some(mut session) = self.session.take() else {
            return;
        };
        debug!("invalidating hardware session");
        session.invalidate();
        if let Some(shared) = self.shared.take() {
            let dropped = { shared.state.lock().reorder.drain() };
            let staged = dropped.len() as i32;
            if staged > 0 {
                debug!(staged, "dropping reordered frames");
                shared.governor.adjust_max(-staged);
            }
            // Dropping the frames runs their release hooks.
            drop(dropped);
            shared.governor.release_owner();
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
