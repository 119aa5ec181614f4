//! Collaborator capability traits.
//!
//! The pipeline does not parse containers, decode bitstreams, or build
//! filter graphs itself; those live behind the three traits here. The
//! engine ships reference implementations (a raw-payload software
//! decoder, an asynchronous hardware adapter, a small filter chain), and
//! embedders can plug their own.

use std::sync::Arc;

use pm_common::{DecodeOptions, EngineResult, Frame, Packet, PixelFormat, Timestamp};

use crate::queue::MsgQueue;
use crate::sink::FrameSink;

/// Byte-layer packet source (the demuxer seam).
pub trait PacketSource: Send {
    /// Pull the next packet in decode order.
    ///
    /// # Errors
    ///
    /// `Err(Again)` means nothing is available yet and the reader should
    /// retry shortly; `Err(Eof)` ends the stream; anything else is fatal.
    fn pull_packet(&mut self) -> EngineResult<Packet>;

    /// Reposition the source so subsequent pulls start at (approximately)
    /// `target` — typically the nearest preceding key frame.
    fn seek(&mut self, target: Timestamp) -> EngineResult<()>;
}

/// Decoder capability (the codec seam).
///
/// Implementations emit every output frame through the [`FrameSink`]
/// received at init — synchronously from `push_packet`, or from decode
/// callbacks on threads the engine does not own.
pub trait Decoder: Send {
    /// Open the capability. Called on the decode worker thread, once per
    /// pipeline run.
    fn init(&mut self, sink: FrameSink, opts: &DecodeOptions) -> EngineResult<()>;

    /// Submit one packet. `None` requests a drain; once the capability
    /// has nothing further to emit it answers `Err(Eof)`.
    fn push_packet(&mut self, packet: Option<Packet>) -> EngineResult<()>;

    /// Synchronous drain without teardown: when this returns, every frame
    /// the capability was still holding has been emitted (and it will not
    /// emit again until a new packet is pushed).
    fn flush(&mut self);

    /// Tear the capability down. A later `init` must start it fresh.
    fn uninit(&mut self);
}

/// Filter-graph capability (the transform seam).
///
/// The graph pulls decoded frames from `input`, transforms them, and
/// pushes them to `output`. The output message type is `Option<Frame>`:
/// the graph emits a final `None` sentinel when its input ends, whatever
/// the reason.
pub trait FrameFilter: Send {
    /// Wire the graph between the two queues. `sw_pix_fmt` hints at the
    /// pixel format software frames arrive in.
    fn init(
        &mut self,
        input: Arc<MsgQueue<Frame>>,
        output: Arc<MsgQueue<Option<Frame>>>,
        sw_pix_fmt: PixelFormat,
    ) -> EngineResult<()>;

    /// Blocking transform loop; returns when the input ends or the
    /// output is cancelled.
    fn run(&mut self);

    /// Release graph resources. A later `init` must start fresh.
    fn uninit(&mut self);
}
