//! One playable media: configuration, lifecycle, and the get-frame
//! adapter.
//!
//! `Media` translates "give me the frame at time t" into seek/pull
//! decisions against the pipeline's sink:
//!
//! - a request behind the last delivered frame, or further ahead of it
//!   than the seek trigger distance, arms a pipeline seek first;
//! - otherwise the sink is drained forward until a frame past `t`
//!   appears; the last frame at or before `t` is delivered and the
//!   overshooting one is kept for the next call;
//! - at end of stream the most recent frame keeps being served, and the
//!   media only makes progress again through `stop` (or a fresh seek
//!   after it).
//!
//! Delivered frames are `Arc<Frame>`: cloning is cheap, and dropping the
//! last clone releases the payload (for hardware frames, the buffer
//! credit).

use std::sync::Arc;

use tracing::{debug, trace};

use pm_common::{
    EngineError, EngineResult, Frame, MediaConfig, StreamInfo, StreamSelect, Timestamp,
};
use pm_decoder::{HwAccelDecoder, HwBackend, RawVideoDecoder};
use pm_pipeline::{
    Controller, Decoder, FilterChain, PacketSource, PipelineParams, PipelineParts,
};

/// A single media object produced by [`Player::add_media`] or assembled
/// from parts by an embedder.
///
/// [`Player::add_media`]: crate::Player::add_media
pub struct Media {
    config: MediaConfig,
    info: StreamInfo,
    /// Present until the pipeline is configured at first start.
    source: Option<Box<dyn PacketSource>>,
    hw_backend: Option<Box<dyn HwBackend>>,
    controller: Option<Controller>,
    /// Client seek not yet consumed by a get-frame call.
    pending_seek: Option<Timestamp>,
    /// Timestamp of the last delivered frame (the "L" of the seek
    /// trigger rule).
    last_ts: Option<Timestamp>,
    /// Frame pulled past the last request, kept for the next call.
    pulled_ahead: Option<Arc<Frame>>,
    /// Most recently delivered frame, re-served while the request stays
    /// behind `pulled_ahead` and as the end-of-stream fallback.
    last_frame: Option<Arc<Frame>>,
}

impl Media {
    /// Assemble a media from a packet source and its stream description.
    pub fn from_parts(source: Box<dyn PacketSource>, info: StreamInfo) -> Self {
        Self {
            config: MediaConfig::default(),
            info,
            source: Some(source),
            hw_backend: None,
            controller: None,
            pending_seek: None,
            last_ts: None,
            pulled_ahead: None,
            last_frame: None,
        }
    }

    /// Attach a hardware decode backend, used when `auto_hwaccel` is on.
    pub fn with_hw_backend(mut self, backend: Box<dyn HwBackend>) -> Self {
        self.hw_backend = Some(backend);
        self
    }

    pub fn config(&self) -> &MediaConfig {
        &self.config
    }

    pub fn stream_info(&self) -> &StreamInfo {
        &self.info
    }

    /// Set a named option. Options are fixed once the pipeline has been
    /// configured (at the first start).
    pub fn set_option(
        &mut self,
        name: &str,
        value: impl Into<crate::OptionValue>,
    ) -> EngineResult<()> {
        if self.controller.is_some() {
            return Err(EngineError::Unsupported(
                "options are fixed once the pipeline is configured".into(),
            ));
        }
        crate::options::apply(&mut self.config, name, value.into())
    }

    fn ensure_controller(&mut self) -> EngineResult<()> {
        if self.controller.is_some() {
            return Ok(());
        }
        if self.config.avselect == StreamSelect::Audio {
            return Err(EngineError::Unsupported(
                "no audio decoder is built in".into(),
            ));
        }
        let source = self
            .source
            .take()
            .ok_or_else(|| EngineError::External("packet source already consumed".into()))?;

        let decoder: Box<dyn Decoder> = match (self.config.auto_hwaccel, self.hw_backend.take()) {
            (true, Some(backend)) => {
                debug!("using hardware decode backend");
                Box::new(HwAccelDecoder::new(backend))
            }
            (_, backend) => {
                self.hw_backend = backend;
                Box::new(RawVideoDecoder::new(self.info.resolution))
            }
        };

        let trim = (self.config.trim_duration >= 0.0)
            .then(|| Timestamp::from_secs(self.config.trim_duration));
        let filter = Box::new(FilterChain::new(self.config.filters.clone(), trim));

        let params = PipelineParams::from_config(&self.config, self.info.timebase);
        self.controller = Some(Controller::new(
            PipelineParts {
                source,
                decoder,
                filter,
            },
            params,
        ));
        Ok(())
    }

    fn started(&self) -> bool {
        self.controller.as_ref().is_some_and(Controller::started)
    }

    fn start_at(&mut self, skip: Option<Timestamp>) -> EngineResult<()> {
        self.ensure_controller()?;
        self.controller
            .as_mut()
            .expect("controller just ensured")
            .start(skip)
    }

    /// Start the pipeline. No-op when already running. A pending seek
    /// (or the `skip` option) arms the initial position; the seek is
    /// consumed by it, so a later get-frame call measures its own
    /// distance rules from scratch.
    pub fn start(&mut self) -> EngineResult<()> {
        let initial = self.pending_seek.take().or_else(|| {
            (self.config.skip > 0.0).then(|| Timestamp::from_secs(self.config.skip))
        });
        self.start_at(initial)
    }

    /// Stop the pipeline and forget the client-side frame caches.
    /// Idempotent; a later start or get-frame call re-enters cleanly.
    pub fn stop(&mut self) {
        if let Some(controller) = self.controller.as_mut() {
            controller.stop();
        }
        self.last_ts = None;
        self.pulled_ahead = None;
        self.last_frame = None;
    }

    /// Request a seek. Takes effect immediately on a running pipeline
    /// and is remembered either way for the next get-frame call (which
    /// will not re-seek to its own time on top of it).
    pub fn seek(&mut self, secs: f64) {
        let target = Timestamp::from_secs(secs.max(0.0));
        debug!(target = %target, "client seek");
        self.pending_seek = Some(target);
        self.last_ts = None;
        self.pulled_ahead = None;
        self.last_frame = None;
        if self.started() {
            let controller = self.controller.as_ref().expect("started implies controller");
            controller.seek(target);
        }
    }

    /// Deliver the frame whose effective presentation time is the
    /// closest one at or before `secs`. Returns `None` once the stream
    /// has ended before reaching `secs` with nothing buffered, or on a
    /// collapsed pipeline.
    pub fn get_frame(&mut self, secs: f64) -> Option<Arc<Frame>> {
        let target = Timestamp::from_secs(secs.max(0.0));
        trace!(target = %target, "get_frame");
        let explicit = self.pending_seek.take();

        if !self.started() {
            // Fresh entry positions at the explicit target if one is
            // pending, else at the request itself.
            let at = explicit.unwrap_or(target);
            if let Err(err) = self.start_at(Some(at)) {
                debug!(%err, "unable to start pipeline");
                return None;
            }
        } else if explicit.is_none() {
            let reseek = match self.last_ts {
                None => true,
                Some(last) => {
                    target < last
                        || (target - last)
                            > Timestamp::from_secs(self.config.dist_time_seek_trigger)
                }
            };
            if reseek {
                trace!(target = %target, last = ?self.last_ts, "distance triggers a seek");
                let controller = self.controller.as_ref().expect("started implies controller");
                controller.seek(target);
                self.last_ts = None;
                self.pulled_ahead = None;
            }
        }
        // else: a running pipeline was already pointed at the explicit
        // target by seek(); just drain toward the request.

        if let Some(ahead) = &self.pulled_ahead {
            if ahead.pts > target {
                trace!(ahead = %ahead.pts, "request still behind the pulled-ahead frame");
                let frame = self.last_frame.clone();
                if let Some(f) = &frame {
                    self.last_ts = Some(f.pts);
                }
                return frame;
            }
        }

        let mut candidate = self.pulled_ahead.take();
        let controller = self.controller.as_ref().expect("started or just started");
        loop {
            let Some(frame) = controller.pop_frame() else {
                trace!("sink ended before the request time");
                break;
            };
            let frame = Arc::new(frame);
            if frame.pts > target {
                self.pulled_ahead = Some(frame);
                break;
            }
            candidate = Some(frame);
        }

        // At end of stream the last buffered frame is the answer.
        let delivered = candidate.or_else(|| self.last_frame.clone());
        if let Some(frame) = &delivered {
            self.last_ts = Some(frame.pts);
            self.last_frame = Some(frame.clone());
        }
        delivered
    }
}

impl Drop for Media {
    fn drop(&mut self) {
        self.stop();
    }
}
