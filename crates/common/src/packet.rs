//! Compressed packets — output of the source, input to the decoder.

use crate::types::{Resolution, Timebase, Timestamp};

/// An opaque compressed payload pulled from the media source.
///
/// The presentation timestamp is expressed in the source stream's own
/// time base; it is rescaled to the canonical base only after decode.
/// Ownership follows the pipeline: the reader owns a packet until it is
/// queued, the decoder worker owns it afterwards, and it is released
/// when decode submission completes.
#[derive(Clone, Debug, PartialEq)]
pub struct Packet {
    /// Compressed payload bytes.
    pub data: Vec<u8>,
    /// Presentation timestamp in `timebase` ticks.
    pub pts: i64,
    /// Duration in `timebase` ticks, when the container provides one.
    pub duration: Option<i64>,
    /// Whether this packet starts at a key frame.
    pub keyframe: bool,
}

impl Packet {
    pub fn new(data: Vec<u8>, pts: i64) -> Self {
        Self {
            data,
            pts,
            duration: None,
            keyframe: false,
        }
    }

    pub fn with_duration(mut self, duration: i64) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn key(mut self) -> Self {
        self.keyframe = true;
        self
    }
}

/// Static description of the selected stream, provided by the source
/// layer when a media is opened.
#[derive(Clone, Debug)]
pub struct StreamInfo {
    /// Time base of packet timestamps.
    pub timebase: Timebase,
    /// Coded frame size.
    pub resolution: Resolution,
    /// Total duration when known.
    pub duration: Option<Timestamp>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packet_builder() {
        let pkt = Packet::new(vec![1, 2, 3], 42).with_duration(1).key();
        assert_eq!(pkt.pts, 42);
        assert_eq!(pkt.duration, Some(1));
        assert!(pkt.keyframe);
    }
}
