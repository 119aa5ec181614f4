//! Software decode path for raw NV12 payload packets.
//!
//! The engine's built-in "codec" for unaccelerated playback: each packet
//! carries one raw NV12 frame (Y plane followed by the interleaved UV
//! plane, tight pitch). Decode is a color-space conversion to RGBA8 —
//! BT.709, fixed-point — with an optional nearest-neighbor downscale to
//! honor the pixel budget, or an NV12 passthrough when the configured
//! software format asks for it. Compressed-bitstream codecs live behind
//! the same [`Decoder`] trait as external collaborators.
//!
//! # Color space
//!
//! BT.709, the standard matrix for HD content:
//!
//! ```text
//! R = 1.164 * (Y - 16) + 1.793 * (V - 128)
//! G = 1.164 * (Y - 16) - 0.213 * (U - 128) - 0.533 * (V - 128)
//! B = 1.164 * (Y - 16) + 2.112 * (U - 128)
//! ```

use tracing::debug;

use pm_common::{
    DecodeOptions, DecodedFrame, EngineError, EngineResult, FramePayload, Packet, PixelFormat,
    Resolution,
};
use pm_pipeline::{Decoder, FrameSink};

// Fixed-point BT.709 constants, 10 bits of fractional precision.
const Y_SCALE: i32 = 1192; // 1.164 * 1024
const V_TO_R: i32 = 1836; // 1.793 * 1024
const U_TO_G: i32 = 218; // 0.213 * 1024
const V_TO_G: i32 = 546; // 0.533 * 1024
const U_TO_B: i32 = 2163; // 2.112 * 1024

#[inline(always)]
fn clamp_u8(val: i32) -> u8 {
    val.clamp(0, 255) as u8
}

/// Convert one raw NV12 frame to RGBA8 while resampling to `dst`
/// (nearest neighbor). `src` must hold `src_res.nv12_byte_size()` bytes.
fn nv12_to_rgba_scaled(src: &[u8], src_res: Resolution, dst: Resolution) -> Vec<u8> {
    let (sw, sh) = (src_res.width as usize, src_res.height as usize);
    let (dw, dh) = (dst.width as usize, dst.height as usize);
    let uv_base = sw * sh;
    let mut out = vec![0u8; dst.rgba_byte_size()];

    for oy in 0..dh {
        let sy = oy * sh / dh;
        let y_row = sy * sw;
        let uv_row = uv_base + (sy / 2) * sw;
        let out_row = oy * dw * 4;
        for ox in 0..dw {
            let sx = ox * sw / dw;
            let y = src[y_row + sx] as i32;
            let uv_col = (sx / 2) * 2;
            let u = src[uv_row + uv_col] as i32;
            let v = src[uv_row + uv_col + 1] as i32;

            let y_scaled = Y_SCALE * (y - 16);
            let r = (y_scaled + V_TO_R * (v - 128) + 512) >> 10;
            let g = (y_scaled - U_TO_G * (u - 128) - V_TO_G * (v - 128) + 512) >> 10;
            let b = (y_scaled + U_TO_B * (u - 128) + 512) >> 10;

            let o = out_row + ox * 4;
            out[o] = clamp_u8(r);
            out[o + 1] = clamp_u8(g);
            out[o + 2] = clamp_u8(b);
            out[o + 3] = 255;
        }
    }
    out
}

/// Resample a raw NV12 frame to `dst` (nearest neighbor), staying NV12.
fn nv12_scale(src: &[u8], src_res: Resolution, dst: Resolution) -> Vec<u8> {
    let (sw, sh) = (src_res.width as usize, src_res.height as usize);
    let (dw, dh) = (dst.width as usize, dst.height as usize);
    let mut out = vec![0u8; dst.nv12_byte_size()];

    for oy in 0..dh {
        let sy = oy * sh / dh;
        for ox in 0..dw {
            let sx = ox * sw / dw;
            out[oy * dw + ox] = src[sy * sw + sx];
        }
    }
    let src_uv = &src[sw * sh..];
    let out_uv_base = dw * dh;
    for oy in 0..dh / 2 {
        let sy = oy * (sh / 2) / (dh / 2);
        for ox in 0..dw / 2 {
            let sx = ox * (sw / 2) / (dw / 2);
            out[out_uv_base + oy * dw + ox * 2] = src_uv[sy * sw + sx * 2];
            out[out_uv_base + oy * dw + ox * 2 + 1] = src_uv[sy * sw + sx * 2 + 1];
        }
    }
    out
}

/// Synchronous [`Decoder`] for raw NV12 payload packets.
pub struct RawVideoDecoder {
    /// Coded size of incoming frames.
    coded: Resolution,
    /// Output size after the pixel-budget fit; set at init.
    output: Resolution,
    out_format: PixelFormat,
    sink: Option<FrameSink>,
    frames_decoded: u64,
}

impl RawVideoDecoder {
    pub fn new(coded: Resolution) -> Self {
        Self {
            coded,
            output: coded,
            out_format: PixelFormat::Rgba8,
            sink: None,
            frames_decoded: 0,
        }
    }

    pub fn frames_decoded(&self) -> u64 {
        self.frames_decoded
    }
}

impl Decoder for RawVideoDecoder {
    fn init(&mut self, sink: FrameSink, opts: &DecodeOptions) -> EngineResult<()> {
        self.out_format = match opts.sw_pix_fmt {
            fmt @ (PixelFormat::Rgba8 | PixelFormat::Nv12) => fmt,
            other => {
                return Err(EngineError::Unsupported(format!(
                    "software pixel format {other:?}"
                )))
            }
        };
        self.output = self.coded.fit_max_pixels(opts.max_pixels);
        debug!(coded = %self.coded, output = %self.output, "software decoder ready");
        self.sink = Some(sink);
        self.frames_decoded = 0;
        Ok(())
    }

    fn push_packet(&mut self, packet: Option<Packet>) -> EngineResult<()> {
        let sink = self
            .sink
            .clone()
            .ok_or_else(|| EngineError::Decoder("decoder not initialized".into()))?;

        let Some(pkt) = packet else {
            // Drain request: nothing buffered, report end of segment.
            return sink.queue_frame(None).map(|_| ());
        };

        if pkt.data.len() < self.coded.nv12_byte_size() {
            return Err(EngineError::InvalidData);
        }

        let payload = match self.out_format {
            PixelFormat::Rgba8 => nv12_to_rgba_scaled(&pkt.data, self.coded, self.output),
            PixelFormat::Nv12 if self.output == self.coded => pkt.data,
            PixelFormat::Nv12 => nv12_scale(&pkt.data, self.coded, self.output),
            _ => unreachable!("validated at init"),
        };
        self.frames_decoded += 1;
        sink.queue_frame(Some(DecodedFrame {
            payload: FramePayload::Software(payload),
            width: self.output.width,
            height: self.output.height,
            format: self.out_format,
            pts: pkt.pts,
            duration: pkt.duration,
        }))
    }

    fn flush(&mut self) {
        // No internal frame buffer; the sink's cached state still needs
        // the end-of-segment marker.
        if let Some(sink) = &self.sink {
            let _ = sink.queue_frame(None);
        }
    }

    fn uninit(&mut self) {
        self.sink = None;
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pm_common::{Frame, Timebase};
    use pm_pipeline::MsgQueue;
    use std::sync::Arc;

    fn make_uniform_nv12(res: Resolution, y: u8, u: u8, v: u8) -> Vec<u8> {
        let mut data = vec![y; res.nv12_byte_size()];
        let uv = &mut data[(res.width * res.height) as usize..];
        for pair in uv.chunks_exact_mut(2) {
            pair[0] = u;
            pair[1] = v;
        }
        data
    }

    fn reference_bt709(y: u8, u: u8, v: u8) -> (u8, u8, u8) {
        let (yf, uf, vf) = (y as f64, u as f64, v as f64);
        let r = 1.164 * (yf - 16.0) + 1.793 * (vf - 128.0);
        let g = 1.164 * (yf - 16.0) - 0.213 * (uf - 128.0) - 0.533 * (vf - 128.0);
        let b = 1.164 * (yf - 16.0) + 2.112 * (uf - 128.0);
        (
            r.round().clamp(0.0, 255.0) as u8,
            g.round().clamp(0.0, 255.0) as u8,
            b.round().clamp(0.0, 255.0) as u8,
        )
    }

    fn ready(opts: DecodeOptions, coded: Resolution) -> (RawVideoDecoder, Arc<MsgQueue<Frame>>) {
        let q = Arc::new(MsgQueue::new(16));
        let sink = FrameSink::new(q.clone(), Timebase::new(1, 30), false);
        let mut dec = RawVideoDecoder::new(coded);
        dec.init(sink, &opts).unwrap();
        (dec, q)
    }

    fn opts() -> DecodeOptions {
        DecodeOptions {
            max_pixels: 0,
            sw_pix_fmt: PixelFormat::Rgba8,
            hw_pix_fmt: PixelFormat::Bgra8,
            export_mvs: false,
        }
    }

    #[test]
    fn black_frame_converts_to_black() {
        let res = Resolution::new(4, 2);
        let (mut dec, q) = ready(opts(), res);
        dec.push_packet(Some(Packet::new(make_uniform_nv12(res, 16, 128, 128), 0)))
            .unwrap();
        let frame = q.recv().unwrap();
        assert_eq!(frame.format, PixelFormat::Rgba8);
        for px in frame.pixels().unwrap().chunks_exact(4) {
            assert!(px[0] <= 2 && px[1] <= 2 && px[2] <= 2);
            assert_eq!(px[3], 255);
        }
    }

    #[test]
    fn conversion_tracks_reference_formula() {
        let res = Resolution::new(4, 2);
        let (mut dec, q) = ready(opts(), res);
        dec.push_packet(Some(Packet::new(make_uniform_nv12(res, 180, 100, 200), 0)))
            .unwrap();
        let frame = q.recv().unwrap();
        let px = frame.pixels().unwrap();
        let (r, g, b) = reference_bt709(180, 100, 200);
        assert!((px[0] as i32 - r as i32).abs() <= 2);
        assert!((px[1] as i32 - g as i32).abs() <= 2);
        assert!((px[2] as i32 - b as i32).abs() <= 2);
    }

    #[test]
    fn pixel_budget_shrinks_output() {
        let coded = Resolution::new(1920, 1080);
        let mut o = opts();
        o.max_pixels = 640 * 360;
        let (mut dec, q) = ready(o, coded);
        dec.push_packet(Some(Packet::new(
            make_uniform_nv12(coded, 128, 128, 128),
            0,
        )))
        .unwrap();
        let frame = q.recv().unwrap();
        assert_eq!((frame.width, frame.height), (640, 360));
        assert_eq!(frame.pixels().unwrap().len(), 640 * 360 * 4);
    }

    #[test]
    fn nv12_passthrough_keeps_payload() {
        let res = Resolution::new(4, 2);
        let mut o = opts();
        o.sw_pix_fmt = PixelFormat::Nv12;
        let (mut dec, q) = ready(o, res);
        let data = make_uniform_nv12(res, 42, 7, 9);
        dec.push_packet(Some(Packet::new(data.clone(), 0))).unwrap();
        let frame = q.recv().unwrap();
        assert_eq!(frame.format, PixelFormat::Nv12);
        assert_eq!(frame.pixels().unwrap(), &data[..]);
    }

    #[test]
    fn short_payload_is_invalid_data() {
        let res = Resolution::new(4, 2);
        let (mut dec, _q) = ready(opts(), res);
        assert_eq!(
            dec.push_packet(Some(Packet::new(vec![0; 3], 0))),
            Err(EngineError::InvalidData)
        );
    }

    #[test]
    fn unsupported_output_format_fails_init() {
        let q = Arc::new(MsgQueue::new(4));
        let sink = FrameSink::new(q, Timebase::new(1, 30), false);
        let mut dec = RawVideoDecoder::new(Resolution::new(4, 2));
        let mut o = opts();
        o.sw_pix_fmt = PixelFormat::Bgra8;
        assert!(matches!(
            dec.init(sink, &o),
            Err(EngineError::Unsupported(_))
        ));
    }

    #[test]
    fn drain_reports_end_of_segment() {
        let res = Resolution::new(4, 2);
        let (mut dec, _q) = ready(opts(), res);
        assert_eq!(dec.push_packet(None), Err(EngineError::Eof));
    }
}
