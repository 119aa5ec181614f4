//! Deterministic synthetic media, for development and tests.
//!
//! Real containers and codecs live outside the engine; what ships here
//! is a generator good enough to exercise every pipeline path without
//! touching a file: a packet source producing raw NV12 frames on an
//! exact timestamp grid, and a fake hardware backend whose completion
//! callbacks arrive on a pool thread, out of presentation order, and —
//! on request — after the drain wait has already returned.
//!
//! [`Player`](crate::Player) recognizes `sim:` media specifications of
//! the form `sim:WxH@FPS:DURs`, e.g. `sim:640x360@30:10s`.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace};

use pm_common::{
    DecodeOptions, EngineError, EngineResult, Packet, Resolution, StreamInfo, Timebase, Timestamp,
};
use pm_decoder::{HwBackend, HwCallback, HwOutput, HwSample, HwSession};
use pm_pipeline::PacketSource;

// ---------------------------------------------------------------------------
// Synthetic packet source
// ---------------------------------------------------------------------------

/// Packet source producing raw NV12 frames on a fixed grid.
///
/// Frame `i` carries pts tick `first + i` in a `fps_den/fps_num` time
/// base, so timestamps are exact. Seeking snaps back to the nearest
/// preceding key frame, like a real demuxer.
pub struct SyntheticSource {
    fps_num: u32,
    fps_den: u32,
    resolution: Resolution,
    /// Tick of the first frame (nonzero to model streams that start late).
    first: i64,
    /// Total number of frames.
    total: u64,
    /// Every Nth frame is a key frame (1 = all frames).
    keyframe_interval: i64,
    /// Report "try again" on every Nth pull, when set.
    again_period: Option<u64>,
    /// Next tick to produce.
    pos: i64,
    pulls: u64,
}

impl SyntheticSource {
    pub fn new(fps_num: u32, fps_den: u32, duration_secs: f64, resolution: Resolution) -> Self {
        assert!(fps_num > 0 && fps_den > 0);
        let total = (duration_secs * fps_num as f64 / fps_den as f64).round() as u64;
        Self {
            fps_num,
            fps_den,
            resolution,
            first: 0,
            total: total.max(1),
            keyframe_interval: 1,
            again_period: None,
            pos: 0,
            pulls: 0,
        }
    }

    /// A single-frame media (a still image).
    pub fn image(resolution: Resolution) -> Self {
        Self::new(1, 1, 1.0, resolution)
    }

    /// Start the stream at `tick` instead of zero.
    pub fn with_first_tick(mut self, tick: i64) -> Self {
        self.first = tick;
        self.pos = tick;
        self
    }

    /// Key frames every `interval` frames.
    pub fn with_keyframe_interval(mut self, interval: u32) -> Self {
        assert!(interval > 0);
        self.keyframe_interval = interval as i64;
        self
    }

    /// Fail every `period`-th pull with `Again` (source jitter).
    pub fn with_again_period(mut self, period: u64) -> Self {
        assert!(period > 1);
        self.again_period = Some(period);
        self
    }

    pub fn timebase(&self) -> Timebase {
        Timebase::new(self.fps_den as i32, self.fps_num as i32)
    }

    /// The stream description handed to [`Media::from_parts`].
    ///
    /// [`Media::from_parts`]: crate::Media::from_parts
    pub fn info(&self) -> StreamInfo {
        let tb = self.timebase();
        StreamInfo {
            timebase: tb,
            resolution: self.resolution,
            duration: Some(Timestamp::from_ticks(self.first + self.total as i64, tb)),
        }
    }

    fn payload(&self, index: u64) -> Vec<u8> {
        // Flat gray whose level identifies the frame; cheap and stable.
        let luma = 16 + (index % 200) as u8;
        let mut data = vec![luma; self.resolution.nv12_byte_size()];
        let uv_base = (self.resolution.width * self.resolution.height) as usize;
        for b in &mut data[uv_base..] {
            *b = 128;
        }
        data
    }
}

impl PacketSource for SyntheticSource {
    fn pull_packet(&mut self) -> EngineResult<Packet> {
        self.pulls += 1;
        if let Some(period) = self.again_period {
            if self.pulls % period == 0 {
                return Err(EngineError::Again);
            }
        }
        let end = self.first + self.total as i64;
        if self.pos >= end {
            return Err(EngineError::Eof);
        }
        let tick = self.pos;
        self.pos += 1;
        let index = (tick - self.first) as u64;
        trace!(tick, "producing packet");
        Ok(Packet {
            data: self.payload(index),
            pts: tick,
            duration: Some(1),
            keyframe: index % self.keyframe_interval as u64 == 0,
        })
    }

    fn seek(&mut self, target: Timestamp) -> EngineResult<()> {
        let end = self.first + self.total as i64;
        let tick = self.timebase().ticks_from(target).clamp(self.first, end - 1);
        let index = tick - self.first;
        self.pos = tick - index % self.keyframe_interval;
        debug!(target = %target, pos = self.pos, "source repositioned");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Simulated hardware decode backend
// ---------------------------------------------------------------------------

/// Fake hardware backend: sessions "decode" on a worker thread and
/// complete callbacks in batches whose delivery order is permuted
/// (first, third, second), modeling one frame of B-frame reordering.
///
/// The batch size must not exceed the adapter's in-flight cap or the
/// session would starve waiting for a full batch.
pub struct SimBackend {
    resolution: Resolution,
    batch: usize,
    straggler: bool,
}

impl SimBackend {
    pub fn new(resolution: Resolution) -> Self {
        Self {
            resolution,
            batch: 3,
            straggler: false,
        }
    }

    /// Report the drain complete *before* the final callbacks land, the
    /// way real platform sessions are allowed to.
    pub fn with_straggler(mut self) -> Self {
        self.straggler = true;
        self
    }
}

impl HwBackend for SimBackend {
    fn open(&mut self, opts: &DecodeOptions, callback: HwCallback) -> EngineResult<Box<dyn HwSession>> {
        let output = self.resolution.fit_max_pixels(opts.max_pixels);
        let session = SimSession::spawn(output, self.batch, self.straggler, callback)?;
        Ok(Box::new(session))
    }
}

struct SimQueue {
    pending: VecDeque<HwSample>,
    draining: bool,
    closed: bool,
    /// Worker is between batches with nothing taken out.
    idle: bool,
}

struct SimShared {
    q: Mutex<SimQueue>,
    cond: Condvar,
    next_buffer: AtomicU64,
}

struct SimSession {
    shared: Arc<SimShared>,
    worker: Option<JoinHandle<()>>,
}

impl SimSession {
    fn spawn(
        output: Resolution,
        batch: usize,
        straggler: bool,
        callback: HwCallback,
    ) -> EngineResult<Self> {
        let shared = Arc::new(SimShared {
            q: Mutex::new(SimQueue {
                pending: VecDeque::new(),
                draining: false,
                closed: false,
                idle: true,
            }),
            cond: Condvar::new(),
            next_buffer: AtomicU64::new(1),
        });
        let worker = {
            let shared = shared.clone();
            thread::Builder::new()
                .name("sim-decode-pool".to_string())
                .spawn(move || sim_worker(shared, output, batch, straggler, callback))
                .map_err(|err| EngineError::External(err.to_string()))?
        };
        Ok(Self {
            shared,
            worker: Some(worker),
        })
    }
}

fn sim_worker(
    shared: Arc<SimShared>,
    output: Resolution,
    batch: usize,
    straggler: bool,
    callback: HwCallback,
) {
    loop {
        let (samples, drained_early) = {
            let mut q = shared.q.lock();
            loop {
                if q.closed {
                    return;
                }
                if q.pending.len() >= batch || (q.draining && !q.pending.is_empty()) {
                    break;
                }
                q.idle = true;
                shared.cond.notify_all();
                shared.cond.wait(&mut q);
            }
            q.idle = false;
            let n = q.pending.len().min(batch);
            let samples: Vec<HwSample> = q.pending.drain(..n).collect();
            // Straggler mode: claim quiescence before the callbacks land.
            let early = straggler && q.draining && q.pending.is_empty();
            if early {
                q.idle = true;
                shared.cond.notify_all();
            }
            (samples, early)
        };

        if drained_early {
            // Give the drain wait a chance to return first.
            thread::sleep(std::time::Duration::from_millis(2));
        }

        // Permute full batches: deliver first, third, second.
        let mut order: Vec<usize> = (0..samples.len()).collect();
        if order.len() == 3 {
            order.swap(1, 2);
        }
        for i in order {
            let sample = &samples[i];
            let buffer_id = shared.next_buffer.fetch_add(1, Ordering::Relaxed);
            trace!(pts = sample.pts, buffer_id, "sim decode complete");
            callback(Some(HwOutput {
                buffer_id,
                pts: sample.pts,
                width: output.width,
                height: output.height,
            }));
        }
    }
}

impl HwSession for SimSession {
    fn submit(&mut self, sample: HwSample) -> EngineResult<()> {
        let mut q = self.shared.q.lock();
        if q.closed {
            return Err(EngineError::External("session invalidated".into()));
        }
        q.draining = false;
        q.pending.push_back(sample);
        self.shared.cond.notify_all();
        Ok(())
    }

    fn finish_delayed(&mut self) {
        let mut q = self.shared.q.lock();
        q.draining = true;
        self.shared.cond.notify_all();
    }

    fn wait_drained(&mut self) {
        let mut q = self.shared.q.lock();
        while !(q.idle && q.pending.is_empty()) {
            self.shared.cond.wait(&mut q);
        }
    }

    fn invalidate(&mut self) {
        {
            let mut q = self.shared.q.lock();
            q.closed = true;
            q.pending.clear();
            self.shared.cond.notify_all();
        }
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl Drop for SimSession {
    fn drop(&mut self) {
        if self.worker.is_some() {
            self.invalidate();
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_produces_the_configured_frame_count() {
        let mut src = SyntheticSource::new(30, 1, 1.0, Resolution::new(4, 2));
        let mut n = 0;
        loop {
            match src.pull_packet() {
                Ok(pkt) => {
                    assert_eq!(pkt.pts, n);
                    n += 1;
                }
                Err(EngineError::Eof) => break,
                Err(e) => panic!("{e}"),
            }
        }
        assert_eq!(n, 30);
    }

    #[test]
    fn seek_snaps_to_preceding_keyframe() {
        let mut src =
            SyntheticSource::new(30, 1, 2.0, Resolution::new(4, 2)).with_keyframe_interval(10);
        src.seek(Timestamp::from_secs(1.0)).unwrap(); // tick 30 → key 30
        assert_eq!(src.pull_packet().unwrap().pts, 30);
        src.seek(Timestamp::from_secs(0.5)).unwrap(); // tick 15 → key 10
        let pkt = src.pull_packet().unwrap();
        assert_eq!(pkt.pts, 10);
        assert!(pkt.keyframe);
    }

    #[test]
    fn seek_past_the_end_lands_on_the_tail() {
        let mut src = SyntheticSource::image(Resolution::new(4, 2));
        assert!(src.pull_packet().is_ok());
        assert_eq!(src.pull_packet(), Err(EngineError::Eof));
        src.seek(Timestamp::from_secs(10.2)).unwrap();
        assert_eq!(src.pull_packet().unwrap().pts, 0);
    }

    #[test]
    fn again_period_injects_retries() {
        let mut src =
            SyntheticSource::new(30, 1, 0.2, Resolution::new(4, 2)).with_again_period(2);
        let mut frames = 0;
        let mut agains = 0;
        loop {
            match src.pull_packet() {
                Ok(_) => frames += 1,
                Err(EngineError::Again) => agains += 1,
                Err(EngineError::Eof) => break,
                Err(e) => panic!("{e}"),
            }
        }
        assert_eq!(frames, 6);
        assert!(agains >= 5);
    }

    #[test]
    fn sim_session_completes_out_of_order_but_complete() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let cb: HwCallback = {
            let seen = seen.clone();
            Arc::new(move |out| {
                if let Some(out) = out {
                    seen.lock().push(out.pts);
                }
            })
        };
        let mut backend = SimBackend::new(Resolution::new(8, 8));
        let opts = DecodeOptions {
            max_pixels: 0,
            sw_pix_fmt: pm_common::PixelFormat::Rgba8,
            hw_pix_fmt: pm_common::PixelFormat::Bgra8,
            export_mvs: false,
        };
        let mut session = backend.open(&opts, cb).unwrap();
        for pts in 0..3 {
            session
                .submit(HwSample {
                    data: vec![0; 8],
                    pts,
                    duration: None,
                })
                .unwrap();
        }
        session.finish_delayed();
        session.wait_drained();
        session.invalidate();
        let seen = seen.lock().clone();
        assert_eq!(seen, vec![0, 2, 1], "full batches are permuted");
    }
}
