//! `pm-common` — Shared types, errors, and configuration for the Playmill
//! playback engine.
//!
//! This crate is the foundation the other engine crates depend on:
//!
//! - **Types**: `Timestamp`, `Timebase`, `Resolution` (newtypes for safety)
//! - **Data flow**: `Packet`, `DecodedFrame`, `Frame`, `FramePayload`
//! - **Errors**: `EngineError` / `EngineResult` (thiserror-based)
//! - **Config**: `MediaConfig` and the decoder projection `DecodeOptions`

pub mod color;
pub mod config;
pub mod error;
pub mod frame;
pub mod packet;
pub mod types;

// Re-export commonly used items at crate root
pub use color::PixelFormat;
pub use config::{DecodeOptions, MediaConfig, StreamSelect};
pub use error::{EngineError, EngineResult};
pub use frame::{DecodedFrame, Frame, FramePayload, HwFrameHandle};
pub use packet::{Packet, StreamInfo};
pub use types::{Resolution, Timebase, Timestamp};
