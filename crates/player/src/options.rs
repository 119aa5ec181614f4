//! Named option handling for the client API.
//!
//! The engine has no global option registry; options are named entries
//! mutating a plain [`MediaConfig`]. Values arrive as a small typed
//! union so C-style call sites (integers for booleans) keep working.

use pm_common::{EngineError, EngineResult, MediaConfig, PixelFormat, StreamSelect};

/// A value passed to `set_option`.
#[derive(Clone, Debug, PartialEq)]
pub enum OptionValue {
    Bool(bool),
    Int(i64),
    Double(f64),
    Str(String),
}

impl From<bool> for OptionValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}
impl From<i64> for OptionValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}
impl From<i32> for OptionValue {
    fn from(v: i32) -> Self {
        Self::Int(v as i64)
    }
}
impl From<f64> for OptionValue {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}
impl From<&str> for OptionValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}
impl From<String> for OptionValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl OptionValue {
    fn as_bool(&self, name: &str) -> EngineResult<bool> {
        match self {
            Self::Bool(v) => Ok(*v),
            Self::Int(v) => Ok(*v != 0),
            _ => Err(bad_value(name, self)),
        }
    }

    fn as_int(&self, name: &str) -> EngineResult<i64> {
        match self {
            Self::Int(v) => Ok(*v),
            _ => Err(bad_value(name, self)),
        }
    }

    fn as_double(&self, name: &str) -> EngineResult<f64> {
        match self {
            Self::Double(v) => Ok(*v),
            Self::Int(v) => Ok(*v as f64),
            _ => Err(bad_value(name, self)),
        }
    }

    fn as_str(&self, name: &str) -> EngineResult<&str> {
        match self {
            Self::Str(v) => Ok(v),
            _ => Err(bad_value(name, self)),
        }
    }
}

fn bad_value(name: &str, value: &OptionValue) -> EngineError {
    EngineError::Unsupported(format!("bad value {value:?} for option '{name}'"))
}

fn parse_pix_fmt(name: &str, value: &OptionValue) -> EngineResult<PixelFormat> {
    match value.as_str(name)? {
        "rgba" => Ok(PixelFormat::Rgba8),
        "bgra" => Ok(PixelFormat::Bgra8),
        "nv12" => Ok(PixelFormat::Nv12),
        other => Err(EngineError::Unsupported(format!(
            "unknown pixel format '{other}' for option '{name}'"
        ))),
    }
}

/// Apply one named option to the configuration record.
pub fn apply(cfg: &mut MediaConfig, name: &str, value: OptionValue) -> EngineResult<()> {
    match name {
        "auto_hwaccel" => cfg.auto_hwaccel = value.as_bool(name)?,
        "use_pkt_duration" => cfg.use_pkt_duration = value.as_bool(name)?,
        "autorotate" => cfg.autorotate = value.as_bool(name)?,
        "export_mvs" => cfg.export_mvs = value.as_bool(name)?,
        "max_pixels" => cfg.max_pixels = value.as_int(name)?.max(0) as u32,
        "max_nb_frames" => cfg.max_nb_frames = positive(name, &value)?,
        "max_nb_packets" => cfg.max_nb_packets = positive(name, &value)?,
        "pkt_skip_mod" => cfg.pkt_skip_mod = value.as_int(name)?,
        "skip" => cfg.skip = value.as_double(name)?,
        "trim_duration" => cfg.trim_duration = value.as_double(name)?,
        "dist_time_seek_trigger" => cfg.dist_time_seek_trigger = value.as_double(name)?,
        "filters" => cfg.filters = value.as_str(name)?.to_string(),
        // "vt_pix_fmt" is the historical name for the hardware surface format.
        "hw_pix_fmt" | "vt_pix_fmt" => cfg.hw_pix_fmt = parse_pix_fmt(name, &value)?,
        "sw_pix_fmt" => cfg.sw_pix_fmt = parse_pix_fmt(name, &value)?,
        "avselect" => {
            cfg.avselect = match value.as_str(name)? {
                "video" => StreamSelect::Video,
                "audio" => StreamSelect::Audio,
                other => {
                    return Err(EngineError::Unsupported(format!(
                        "unknown stream selection '{other}'"
                    )))
                }
            }
        }
        other => {
            return Err(EngineError::Unsupported(format!(
                "unknown option '{other}'"
            )))
        }
    }
    Ok(())
}

fn positive(name: &str, value: &OptionValue) -> EngineResult<usize> {
    let v = value.as_int(name)?;
    if v < 1 {
        return Err(EngineError::Unsupported(format!(
            "option '{name}' must be >= 1, got {v}"
        )));
    }
    Ok(v as usize)
}

// ── Tests ────────────────────────────────────────────────────────────
