//! Built-in filter graph.
//!
//! A deliberately small reference implementation of the [`FrameFilter`]
//! contract: a comma-separated chain of pixel operations applied to
//! software RGBA frames, plus the trim cutoff that ends the stream at a
//! configured presentation time. Hardware frames pass through untouched
//! (their pixels are opaque to the CPU).

use std::sync::Arc;

use tracing::{debug, trace};

use pm_common::{
    EngineError, EngineResult, Frame, FramePayload, PixelFormat, Timestamp,
};

use crate::queue::MsgQueue;
use crate::traits::FrameFilter;

/// One parsed operation of the chain.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum FilterOp {
    Null,
    HFlip,
    VFlip,
    Gray,
}

impl FilterOp {
    fn parse(name: &str) -> EngineResult<Self> {
        match name {
            "null" => Ok(Self::Null),
            "hflip" => Ok(Self::HFlip),
            "vflip" => Ok(Self::VFlip),
            "gray" => Ok(Self::Gray),
            other => Err(EngineError::Unsupported(format!(
                "unknown filter '{other}'"
            ))),
        }
    }
}

/// Comma-separated chain of frame operations with a trim bound.
pub struct FilterChain {
    expr: String,
    /// Frames at or past this canonical ts end the stream.
    trim: Option<Timestamp>,
    ops: Vec<FilterOp>,
    input: Option<Arc<MsgQueue<Frame>>>,
    output: Option<Arc<MsgQueue<Option<Frame>>>>,
}

impl FilterChain {
    /// `expr` is parsed at init; `trim` is the maximum presentation time,
    /// or `None` for no trim.
    pub fn new(expr: impl Into<String>, trim: Option<Timestamp>) -> Self {
        Self {
            expr: expr.into(),
            trim,
            ops: Vec::new(),
            input: None,
            output: None,
        }
    }

    fn apply(&self, frame: &mut Frame) {
        if self.ops.is_empty() {
            return;
        }
        let (w, h) = (frame.width as usize, frame.height as usize);
        let rgba = frame.format == PixelFormat::Rgba8;
        let FramePayload::Software(data) = &mut frame.payload else {
            trace!("opaque hardware frame, chain skipped");
            return;
        };
        if !rgba {
            trace!("non-RGBA software frame, chain skipped");
            return;
        }
        for op in &self.ops {
            match op {
                FilterOp::Null => {}
                FilterOp::HFlip => {
                    for row in data.chunks_exact_mut(w * 4) {
                        for x in 0..w / 2 {
                            for c in 0..4 {
                                row.swap(x * 4 + c, (w - 1 - x) * 4 + c);
                            }
                        }
                    }
                }
                FilterOp::VFlip => {
                    let stride = w * 4;
                    for y in 0..h / 2 {
                        let (top, rest) = data.split_at_mut((h - 1 - y) * stride);
                        top[y * stride..y * stride + stride]
                            .swap_with_slice(&mut rest[..stride]);
                    }
                }
                FilterOp::Gray => {
                    for px in data.chunks_exact_mut(4) {
                        // BT.601 integer luma, close enough for a preview op.
                        let luma = (px[0] as u32 * 77 + px[1] as u32 * 150 + px[2] as u32 * 29)
                            >> 8;
                        px[0] = luma as u8;
                        px[1] = luma as u8;
                        px[2] = luma as u8;
                    }
                }
            }
        }
    }
}

impl FrameFilter for FilterChain {
    fn init(
        &mut self,
        input: Arc<MsgQueue<Frame>>,
        output: Arc<MsgQueue<Option<Frame>>>,
        _sw_pix_fmt: PixelFormat,
    ) -> EngineResult<()> {
        self.ops = self
            .expr
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(FilterOp::parse)
            .collect::<EngineResult<Vec<_>>>()?;
        self.input = Some(input);
        self.output = Some(output);
        Ok(())
    }

    fn run(&mut self) {
        let (Some(input), Some(output)) = (self.input.clone(), self.output.clone()) else {
            return;
        };
        debug!("filtering loop starting");
        let status = loop {
            match input.recv() {
                Err(err) => break err,
                Ok(mut frame) => {
                    if let Some(trim) = self.trim {
                        if frame.pts >= trim {
                            debug!(ts = %frame.pts, trim = %trim, "trim bound reached");
                            // Stop the upstream and release what it
                            // already queued; nothing past the bound is
                            // ever consumed, and queued frames must not
                            // keep holding decode-buffer credits.
                            input.cancel(EngineError::Eof);
                            input.flush();
                            break EngineError::Eof;
                        }
                    }
                    self.apply(&mut frame);
                    if let Err(err) = output.send(Some(frame)) {
                        input.cancel(err.clone());
                        input.flush();
                        break err;
                    }
                }
            }
        };
        // End-of-stream sentinel; the consumer may already be gone.
        let _ = output.send(None);
        debug!(%status, "filtering loop ending");
    }

    fn uninit(&mut self) {
        self.input = None;
        self.output = None;
        self.ops.clear();
    }
}

// ── Tests ────────────────────────────────────────────────────────────
