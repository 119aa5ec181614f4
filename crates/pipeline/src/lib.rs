//! `pm-pipeline` — The staged playback pipeline.
//!
//! Three workers per active media, connected by bounded queues:
//!
//! ```text
//! source ─ reader ─► packet queue ─► decoder ─► frames queue ─► filterer ─► sink ─► client
//! ```
//!
//! Seek requests cross all three stages: the controller arms the
//! reader's mailbox, the reader injects a marker into the packet queue
//! ahead of the source seek, and the decode worker — upon consuming the
//! marker — drains the codec, drops stale frames, and arms the sink's
//! timestamp filter. See the module docs of [`queue`], [`sink`],
//! [`reader`] and [`decode`] for the per-stage contracts.
//!
//! Collaborators (source, decoder, filter graph) are trait objects; see
//! [`traits`].

pub mod controller;
pub mod filter;
pub mod msg;
pub mod queue;
pub mod sink;
pub mod traits;

mod decode;
mod reader;

pub use controller::{Controller, PipelineParams, PipelineParts};
pub use filter::FilterChain;
pub use msg::PipelineMsg;
pub use queue::MsgQueue;
pub use sink::FrameSink;
pub use traits::{Decoder, FrameFilter, PacketSource};
