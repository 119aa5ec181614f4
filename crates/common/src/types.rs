//! Core time and geometry types with newtype pattern for type safety.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};

/// Canonical presentation timestamp in microseconds.
///
/// Every cross-stage comparison in the engine — seek targets, frame
/// filtering, client queries — happens in this single high-resolution
/// time base. Stream-native tick values are rescaled into it exactly
/// once, on the decode side, via [`Timestamp::from_ticks`].
#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub const ZERO: Self = Self(0);

    /// Ticks per second of the canonical time base.
    pub const PER_SEC: i64 = 1_000_000;

    pub fn from_secs(secs: f64) -> Self {
        Self((secs * Self::PER_SEC as f64).round() as i64)
    }

    pub fn as_secs(self) -> f64 {
        self.0 as f64 / Self::PER_SEC as f64
    }

    pub fn as_micros(self) -> i64 {
        self.0
    }

    /// Rescale a stream-native tick count into the canonical time base,
    /// rounding half away from zero.
    pub fn from_ticks(ticks: i64, tb: Timebase) -> Self {
        let num = ticks as i128 * tb.num as i128 * Self::PER_SEC as i128;
        let den = tb.den as i128;
        let half = if num >= 0 { den / 2 } else { -(den / 2) };
        Self(((num + half) / den) as i64)
    }
}

impl Add for Timestamp {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Timestamp {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}s", self.as_secs())
    }
}

/// Rational stream time base: one tick lasts `num/den` seconds
/// (e.g. `1/90000` for MPEG-TS, `1001/30000` for 29.97 fps samples).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Timebase {
    pub num: i32,
    pub den: i32,
}

impl Timebase {
    /// The canonical microsecond base expressed as a stream time base.
    pub const MICROSECONDS: Self = Self {
        num: 1,
        den: 1_000_000,
    };

    pub fn new(num: i32, den: i32) -> Self {
        assert!(num > 0 && den > 0, "time base must be positive");
        Self { num, den }
    }

    pub fn as_f64(self) -> f64 {
        self.num as f64 / self.den as f64
    }

    /// Convert a canonical timestamp back into ticks of this base,
    /// rounding toward negative infinity so the result never lands past
    /// the requested time.
    pub fn ticks_from(self, ts: Timestamp) -> i64 {
        let num = ts.0 as i128 * self.den as i128;
        let den = self.num as i128 * Timestamp::PER_SEC as i128;
        num.div_euclid(den) as i64
    }
}

impl fmt::Display for Timebase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

/// Video frame resolution.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const HD: Self = Self {
        width: 1920,
        height: 1080,
    };

    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn pixel_count(self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Byte size for RGBA8 pixel data.
    pub fn rgba_byte_size(self) -> usize {
        self.width as usize * self.height as usize * 4
    }

    /// Byte size for NV12 pixel data (Y plane + interleaved UV at half res).
    pub fn nv12_byte_size(self) -> usize {
        let y_size = self.width as usize * self.height as usize;
        let uv_size = self.width as usize * (self.height as usize / 2);
        y_size + uv_size
    }

    /// Shrink to fit under a pixel budget, preserving aspect ratio.
    ///
    /// Returns `self` unchanged when `max_pixels` is zero (unlimited) or
    /// already satisfied. Output dimensions are even-aligned, which the
    /// hardware decode paths require.
    pub fn fit_max_pixels(self, max_pixels: u32) -> Self {
        if max_pixels == 0 || self.pixel_count() <= max_pixels as u64 {
            return self;
        }
        let scale = (max_pixels as f64 / self.pixel_count() as f64).sqrt();
        let mut w = (((self.width as f64 * scale) / 2.0).round() as u32 * 2).max(2);
        let mut h = (((self.height as f64 * scale) / 2.0).round() as u32 * 2).max(2);
        // Rounding can land a hair over the budget; step the larger axis back.
        while w as u64 * h as u64 > max_pixels as u64 && (w > 2 || h > 2) {
            if w >= h && w > 2 {
                w -= 2;
            } else {
                h -= 2;
            }
        }
        Self::new(w, h)
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_secs_roundtrip() {
        let ts = Timestamp::from_secs(5.25);
        assert_eq!(ts.as_micros(), 5_250_000);
        assert!((ts.as_secs() - 5.25).abs() < 1e-9);
    }

    #[test]
    fn rescale_30fps_ticks() {
        // One tick of a 1/30 base is 33333.3... µs, rounded half away.
        let tb = Timebase::new(1, 30);
        assert_eq!(Timestamp::from_ticks(0, tb), Timestamp::ZERO);
        assert_eq!(Timestamp::from_ticks(1, tb).as_micros(), 33_333);
        assert_eq!(Timestamp::from_ticks(30, tb).as_micros(), 1_000_000);
        assert_eq!(Timestamp::from_ticks(-1, tb).as_micros(), -33_333);
    }

    #[test]
    fn rescale_mpegts_ticks() {
        let tb = Timebase::new(1, 90_000);
        assert_eq!(Timestamp::from_ticks(90_000, tb).as_micros(), 1_000_000);
        assert_eq!(Timestamp::from_ticks(45_000, tb).as_micros(), 500_000);
    }

    #[test]
    fn ticks_from_floors() {
        let tb = Timebase::new(1, 30);
        // 0.9s at 30 ticks/s is tick 27; anything short of tick 28 floors down.
        assert_eq!(tb.ticks_from(Timestamp::from_secs(0.9)), 27);
        assert_eq!(tb.ticks_from(Timestamp::from_secs(0.93)), 27);
        assert_eq!(tb.ticks_from(Timestamp::ZERO), 0);
    }

    #[test]
    fn fit_unlimited_is_identity() {
        assert_eq!(Resolution::HD.fit_max_pixels(0), Resolution::HD);
        assert_eq!(
            Resolution::HD.fit_max_pixels(u32::MAX),
            Resolution::HD
        );
    }

    #[test]
    fn fit_preserves_aspect() {
        // 1920x1080 under a 640*360 budget is exactly 640x360.
        let out = Resolution::HD.fit_max_pixels(640 * 360);
        assert_eq!(out, Resolution::new(640, 360));
    }

    #[test]
    fn fit_stays_under_budget_and_even() {
        for budget in [1_000, 12_345, 100_000, 500_000] {
            let out = Resolution::new(1280, 720).fit_max_pixels(budget);
            assert!(out.pixel_count() <= budget as u64, "budget {budget}: {out}");
            assert_eq!(out.width % 2, 0);
            assert_eq!(out.height % 2, 0);
        }
    }
}
