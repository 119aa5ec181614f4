//! Async controller: owns the worker chain, the sink queue, and the
//! start/stop/seek lifecycle.
//!
//! Architecture:
//!
//! ```text
//! client thread            reader            decoder            filterer
//! ┌────────────┐   seek  ┌─────────┐ pkts  ┌──────────┐ frames ┌────────┐
//! │ controller │────────►│ source  │──────►│ capability│──────►│ graph  │
//! │ pop_frame ◄│─────────┴─────────┴───────┴───────────┴───────┴────────┘
//! └────────────┘                sink queue (bounded, Option<Frame>)
//! ```
//!
//! The controller spawns only the reader; the reader spawns the decoder,
//! which spawns the filterer, and joins cascade back in the same order on
//! stop. The source/decoder/filter objects migrate into the worker
//! threads for the duration of a run and are parked back in a shared
//! cell when the chain unwinds, so `stop(); start()` reuses them.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use tracing::{debug, trace};

use pm_common::{
    DecodeOptions, EngineError, EngineResult, Frame, MediaConfig, PixelFormat, Timebase,
    Timestamp,
};

use crate::queue::MsgQueue;
use crate::reader::{reader_main, ReaderCtl};
use crate::traits::{Decoder, FrameFilter, PacketSource};

/// Capacity of the client-facing sink queue.
const SINK_CAPACITY: usize = 3;

/// The three collaborator objects a pipeline run is built from.
pub struct PipelineParts {
    pub source: Box<dyn PacketSource>,
    pub decoder: Box<dyn Decoder>,
    pub filter: Box<dyn FrameFilter>,
}

/// Parking spots for the collaborators while no run is active (and while
/// each worker thread is handing them onward). A worker takes what it
/// needs at thread start and parks it back before exiting, so a spawn
/// failure or a completed run leaves everything reusable.
#[derive(Default)]
pub(crate) struct PartsCell {
    pub(crate) source: Mutex<Option<Box<dyn PacketSource>>>,
    pub(crate) decoder: Mutex<Option<Box<dyn Decoder>>>,
    pub(crate) filter: Mutex<Option<Box<dyn FrameFilter>>>,
}

/// Everything the workers need to know, snapshotted at start.
#[derive(Clone)]
pub struct PipelineParams {
    pub timebase: Timebase,
    pub max_nb_packets: usize,
    pub max_nb_frames: usize,
    pub sink_capacity: usize,
    pub use_pkt_duration: bool,
    pub pkt_skip_mod: i64,
    pub sw_pix_fmt: PixelFormat,
    pub decode: DecodeOptions,
}

impl PipelineParams {
    pub fn from_config(cfg: &MediaConfig, timebase: Timebase) -> Self {
        Self {
            timebase,
            max_nb_packets: cfg.max_nb_packets,
            max_nb_frames: cfg.max_nb_frames,
            sink_capacity: SINK_CAPACITY,
            use_pkt_duration: cfg.use_pkt_duration,
            pkt_skip_mod: cfg.pkt_skip_mod,
            sw_pix_fmt: cfg.sw_pix_fmt,
            decode: cfg.decode_options(),
        }
    }
}

/// Owns the worker chain and the sink queue.
pub struct Controller {
    params: PipelineParams,
    cell: Arc<PartsCell>,
    ctl: Arc<ReaderCtl>,
    sink: Option<Arc<MsgQueue<Option<Frame>>>>,
    worker: Option<JoinHandle<()>>,
}

impl Controller {
    pub fn new(parts: PipelineParts, params: PipelineParams) -> Self {
        let cell = PartsCell::default();
        *cell.source.lock() = Some(parts.source);
        *cell.decoder.lock() = Some(parts.decoder);
        *cell.filter.lock() = Some(parts.filter);
        Self {
            params,
            cell: Arc::new(cell),
            ctl: Arc::new(ReaderCtl::default()),
            sink: None,
            worker: None,
        }
    }

    pub fn started(&self) -> bool {
        self.worker.is_some()
    }

    /// Spawn the worker chain. A no-op when already started. A nonzero
    /// `skip` arms an initial seek before the reader's first pull, so the
    /// very first packets are already filtered against it.
    pub fn start(&mut self, skip: Option<Timestamp>) -> EngineResult<()> {
        if self.started() {
            return Ok(());
        }
        debug!("starting pipeline");

        if self.cell.source.lock().is_none()
            || self.cell.decoder.lock().is_none()
            || self.cell.filter.lock().is_none()
        {
            return Err(EngineError::External(
                "pipeline parts were lost by a previous run".into(),
            ));
        }

        let sink = Arc::new(MsgQueue::new(self.params.sink_capacity));

        if let Some(target) = skip {
            self.seek(target);
        }

        let handle = {
            let cell = self.cell.clone();
            let ctl = self.ctl.clone();
            let sink = sink.clone();
            let params = self.params.clone();
            thread::Builder::new()
                .name("playmill-reader".to_string())
                .spawn(move || reader_main(cell, ctl, sink, params))
                .map_err(|err| EngineError::External(err.to_string()))?
        };

        self.sink = Some(sink);
        self.worker = Some(handle);
        Ok(())
    }

    /// Request a seek. Cheap and idempotent within one source-poll cycle:
    /// a later target replaces an earlier pending one.
    pub fn seek(&self, target: Timestamp) {
        trace!(target = %target, "seek requested");
        *self.ctl.request_seek.lock() = Some(target);
    }

    /// Tear the worker chain down. A no-op when not started.
    pub fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            trace!("nothing is started");
            return;
        };
        debug!("stopping pipeline");

        let sink = self.sink.take().expect("sink present while started");
        // Tell the filterer to stop queueing frames, then empty what is
        // already there — releasing those frames unblocks any decode
        // callback waiting on a buffer credit.
        sink.cancel(EngineError::Eof);
        sink.flush();

        if worker.join().is_err() {
            tracing::error!("reader thread panicked");
        }
        *self.ctl.request_seek.lock() = None;
        debug!("pipeline stopped");
    }

    /// Blocking receive from the sink. `None` means end of stream or a
    /// latched failure; from then on the pipeline only drains.
    pub fn pop_frame(&self) -> Option<Frame> {
        let sink = self.sink.as_ref()?;
        match sink.recv() {
            Ok(Some(frame)) => {
                trace!(ts = %frame.pts, "popped frame");
                Some(frame)
            }
            Ok(None) => {
                trace!("sink reported end of stream");
                sink.finish(EngineError::Eof);
                sink.cancel(EngineError::Eof);
                None
            }
            Err(err) => {
                trace!(%err, "sink latched");
                sink.cancel(err);
                None
            }
        }
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.stop();
    }
}
