//! `pm-player` — Client-facing API of the Playmill playback engine.
//!
//! A [`Player`] is the entry context: it owns the registry of source
//! factories and opens [`Media`] objects from media specifications.
//! Containers and codecs are external collaborators, so out of the box
//! only the deterministic [`sim`] scheme is understood; embedders
//! register factories for anything real, or assemble a [`Media`] from
//! parts directly.
//!
//! ```no_run
//! use pm_player::Player;
//!
//! let player = Player::new();
//! let mut media = player.add_media("sim:640x360@30:10s").unwrap();
//! media.set_option("max_pixels", 320 * 180).unwrap();
//! media.seek(2.0);
//! if let Some(frame) = media.get_frame(2.5) {
//!     println!("frame at {} ({}x{})", frame.pts, frame.width, frame.height);
//! }
//! // Frames are released by dropping them.
//! ```

pub mod media;
pub mod options;
pub mod sim;

pub use media::Media;
pub use options::OptionValue;

use pm_common::{EngineError, EngineResult, Resolution};
use sim::SyntheticSource;
use tracing::debug;

/// Opens a media specification, or declines it (`None`) so the next
/// registered factory gets a look.
pub trait SourceFactory: Send + Sync {
    fn open(&self, spec: &str) -> Option<EngineResult<Media>>;
}

/// Entry context: source-factory registry and media construction.
pub struct Player {
    factories: Vec<Box<dyn SourceFactory>>,
}

impl Player {
    pub fn new() -> Self {
        Self {
            factories: vec![Box::new(SimFactory)],
        }
    }

    /// Register a factory; later registrations take precedence.
    pub fn register_source(&mut self, factory: Box<dyn SourceFactory>) {
        self.factories.insert(0, factory);
    }

    /// Open a media. The spec is offered to each factory in precedence
    /// order; an unclaimed spec is `Unsupported`.
    pub fn add_media(&self, spec: &str) -> EngineResult<Media> {
        for factory in &self.factories {
            if let Some(result) = factory.open(spec) {
                debug!(spec, ok = result.is_ok(), "media opened");
                return result;
            }
        }
        Err(EngineError::Unsupported(format!(
            "no source can open '{spec}'"
        )))
    }
}

impl Default for Player {
    fn default() -> Self {
        Self::new()
    }
}

/// Built-in factory for `sim:WxH@FPS:DURs` specifications
/// (e.g. `sim:640x360@30:10s`, `sim:1920x1080@30000/1001:4.5s`).
struct SimFactory;

impl SourceFactory for SimFactory {
    fn open(&self, spec: &str) -> Option<EngineResult<Media>> {
        let rest = spec.strip_prefix("sim:")?;
        Some(parse_sim_spec(rest))
    }
}

fn parse_sim_spec(rest: &str) -> EngineResult<Media> {
    let bad = || EngineError::Unsupported(format!("malformed sim spec '{rest}'"));

    let (size, rate_dur) = rest.split_once('@').ok_or_else(bad)?;
    let (w, h) = size.split_once('x').ok_or_else(bad)?;
    let width: u32 = w.parse().map_err(|_| bad())?;
    let height: u32 = h.parse().map_err(|_| bad())?;

    let (rate, dur) = rate_dur.split_once(':').ok_or_else(bad)?;
    let (num, den) = match rate.split_once('/') {
        Some((n, d)) => (
            n.parse().map_err(|_| bad())?,
            d.parse().map_err(|_| bad())?,
        ),
        None => (rate.parse().map_err(|_| bad())?, 1u32),
    };
    let duration: f64 = dur.strip_suffix('s').ok_or_else(bad)?.parse().map_err(|_| bad())?;
    if width == 0 || height == 0 || num == 0 || den == 0 || duration <= 0.0 {
        return Err(bad());
    }

    let source = SyntheticSource::new(num, den, duration, Resolution::new(width, height));
    let info = source.info();
    Ok(Media::from_parts(Box::new(source), info))
}

// ── Tests ────────────────────────────────────────────────────────────
