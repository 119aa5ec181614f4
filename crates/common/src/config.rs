//! Per-media configuration record.
//!
//! One plain struct holds every client-tunable knob. The client API layer
//! mutates it through named `set_option` entries before the pipeline
//! starts; the pipeline snapshots what it needs when the workers spawn.

use serde::{Deserialize, Serialize};

use crate::color::PixelFormat;

/// Which elementary stream of the media to play. The engine produces one
/// stream at a time; selecting the other stream is a fresh media object.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamSelect {
    #[default]
    Video,
    Audio,
}

/// Per-media options.
///
/// Time-valued fields are seconds (as the client API exposes them) and
/// are converted to canonical microseconds when the pipeline starts.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Stream selection (video by default).
    pub avselect: StreamSelect,
    /// Attempt hardware-accelerated decoding when a backend is available.
    pub auto_hwaccel: bool,
    /// Report frame durations from packet-provided durations.
    pub use_pkt_duration: bool,
    /// Pixel budget for output frames; 0 means unlimited.
    pub max_pixels: u32,
    /// Pixel format requested from hardware decode sessions.
    pub hw_pix_fmt: PixelFormat,
    /// Pixel format emitted by the software decode path.
    pub sw_pix_fmt: PixelFormat,
    /// Honor rotation metadata carried by the stream, when present.
    pub autorotate: bool,
    /// Ask decoders to export motion vectors, when they can.
    pub export_mvs: bool,
    /// Initial seek armed at start, in seconds.
    pub skip: f64,
    /// End the stream at this presentation time, in seconds; negative
    /// means no trim.
    pub trim_duration: f64,
    /// How far ahead of the last delivered frame a get-frame request may
    /// point before the adapter seeks instead of draining, in seconds.
    pub dist_time_seek_trigger: f64,
    /// Capacity of the decoded-frames queue.
    pub max_nb_frames: usize,
    /// Capacity of the packet queue.
    pub max_nb_packets: usize,
    /// When > 1, the reader drops non-key packets whose index is not a
    /// multiple of this value (decode-load thinning).
    pub pkt_skip_mod: i64,
    /// Filter-graph expression applied between decode and the sink.
    pub filters: String,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            avselect: StreamSelect::Video,
            auto_hwaccel: true,
            use_pkt_duration: false,
            max_pixels: 0,
            hw_pix_fmt: PixelFormat::Bgra8,
            sw_pix_fmt: PixelFormat::Rgba8,
            autorotate: false,
            export_mvs: false,
            skip: 0.0,
            trim_duration: -1.0,
            dist_time_seek_trigger: 1.5,
            max_nb_frames: 3,
            max_nb_packets: 5,
            pkt_skip_mod: 0,
            filters: String::new(),
        }
    }
}

impl MediaConfig {
    /// The subset of options decoder capabilities care about.
    pub fn decode_options(&self) -> DecodeOptions {
        DecodeOptions {
            max_pixels: self.max_pixels,
            sw_pix_fmt: self.sw_pix_fmt,
            hw_pix_fmt: self.hw_pix_fmt,
            export_mvs: self.export_mvs,
        }
    }
}

/// Options handed to a decoder capability at init.
#[derive(Copy, Clone, Debug)]
pub struct DecodeOptions {
    pub max_pixels: u32,
    pub sw_pix_fmt: PixelFormat,
    pub hw_pix_fmt: PixelFormat,
    pub export_mvs: bool,
}
