//! `pm-decoder` — Decoder capabilities for the Playmill playback engine.
//!
//! Two implementations of the pipeline's `Decoder` seam plus the shared
//! machinery the asynchronous one needs:
//!
//! - [`software`] — synchronous raw-NV12 path with BT.709 conversion and
//!   pixel-budget scaling
//! - [`hw`] — adapter turning an asynchronous platform decode session
//!   (out-of-order callbacks on pool threads) into the synchronous
//!   `Decoder` contract
//! - [`reorder`] — decode-order → presentation-order staging buffer
//! - [`governor`] — back-pressure budget for hardware buffers alive
//!   outside the session

pub mod governor;
pub mod hw;
pub mod reorder;
pub mod software;

pub use governor::BufferGovernor;
pub use hw::{
    HwAccelDecoder, HwBackend, HwCallback, HwOutput, HwSample, HwSession, DEFAULT_MAX_IN_FLIGHT,
};
pub use reorder::ReorderBuffer;
pub use software::RawVideoDecoder;
