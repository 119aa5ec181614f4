//! Pixel format descriptions.

use serde::{Deserialize, Serialize};

/// Pixel format of a decoded frame, in memory or behind a hardware handle.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelFormat {
    /// 4 channels, 8 bits each.
    Rgba8,
    /// BGRA8 (the ordering hardware surfaces usually prefer).
    Bgra8,
    /// NV12: Y plane + interleaved UV at half resolution (the usual
    /// hardware decoder output).
    Nv12,
}

impl PixelFormat {
    /// Bytes per pixel; for NV12 this is the Y-plane component only.
    pub fn bytes_per_pixel(self) -> u32 {
        match self {
            Self::Rgba8 | Self::Bgra8 => 4,
            Self::Nv12 => 1,
        }
    }

    pub fn is_planar(self) -> bool {
        matches!(self, Self::Nv12)
    }
}
