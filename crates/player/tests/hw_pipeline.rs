//! End-to-end tests of the hardware decode path.
//!
//! The simulated backend completes decode callbacks on a pool thread,
//! out of presentation order, and (in straggler mode) after the drain
//! wait has returned — the full set of behaviors the reorder buffer,
//! the governor, and the adapter's second wait exist for.

use pm_common::{Resolution, Timestamp};
use pm_player::sim::{SimBackend, SyntheticSource};
use pm_player::Media;

const TEST_RES: Resolution = Resolution {
    width: 64,
    height: 36,
};

fn hw_media(duration_secs: f64, straggler: bool) -> Media {
    let source = SyntheticSource::new(30, 1, duration_secs, TEST_RES);
    let info = source.info();
    let backend = if straggler {
        SimBackend::new(TEST_RES).with_straggler()
    } else {
        SimBackend::new(TEST_RES)
    };
    Media::from_parts(Box::new(source), info).with_hw_backend(Box::new(backend))
}

#[test]
fn hardware_frames_arrive_in_presentation_order() {
    let mut media = hw_media(2.0, false);
    let mut last = None;
    for i in 0..30 {
        let t = i as f64 / 30.0;
        let frame = media.get_frame(t).unwrap_or_else(|| panic!("frame at {t}"));
        assert!(frame.is_hardware(), "hardware payload expected");
        assert!(
            last.map_or(true, |prev| frame.pts >= prev),
            "timestamps must not go backwards: {} after {:?}",
            frame.pts,
            last
        );
        assert_eq!(frame.pts, Timestamp::from_ticks(i, media.stream_info().timebase));
        last = Some(frame.pts);
    }
}

#[test]
fn hardware_path_honors_seeks() {
    let mut media = hw_media(5.0, false);
    media.seek(3.0);
    let frame = media.get_frame(3.1).expect("frame after seek");
    assert!(frame.pts >= Timestamp::from_secs(3.0 - 1.0 / 30.0), "got {}", frame.pts);
    assert!(frame.pts <= Timestamp::from_secs(3.1));
}

#[test]
fn straggler_callbacks_after_drain_are_absorbed() {
    // Every seek drains the session; in straggler mode the final
    // callbacks land after the drain wait reported quiescence, and the
    // adapter's in-flight wait has to absorb them.
    let mut media = hw_media(5.0, true);
    let first = media.get_frame(0.0).expect("first frame");
    assert_eq!(first.pts, Timestamp::ZERO);

    media.seek(2.0);
    let frame = media.get_frame(2.1).expect("frame after straggler drain");
    assert!(frame.pts >= Timestamp::from_secs(2.0 - 1.0 / 30.0));
    assert!(frame.pts <= Timestamp::from_secs(2.1));

    media.seek(4.0);
    let frame = media.get_frame(4.05).expect("second straggler drain");
    assert!(frame.pts >= Timestamp::from_secs(4.0 - 1.0 / 30.0));
    assert!(frame.pts <= Timestamp::from_secs(4.05));
}

#[test]
fn hardware_pixel_budget_shrinks_session_output() {
    let source = SyntheticSource::new(30, 1, 1.0, Resolution::new(1920, 1080));
    let info = source.info();
    let mut media = Media::from_parts(Box::new(source), info)
        .with_hw_backend(Box::new(SimBackend::new(Resolution::new(1920, 1080))));
    media.set_option("max_pixels", 640 * 360).unwrap();

    let frame = media.get_frame(0.0).expect("frame");
    assert!(frame.is_hardware());
    assert_eq!((frame.width, frame.height), (640, 360));
}

#[test]
fn hardware_lifecycle_restarts_cleanly() {
    let mut media = hw_media(2.0, false);
    let first = media.get_frame(0.5).expect("frame");
    assert_eq!(first.pts, Timestamp::from_secs(0.5));
    drop(first);

    media.stop();
    let again = media.get_frame(0.5).expect("frame after restart");
    assert_eq!(again.pts, Timestamp::from_secs(0.5));
}

#[test]
fn hardware_frames_release_on_drop_through_eof() {
    // Run a short stream to completion; every buffer the session handed
    // out is released by frame drops, so teardown does not wedge on the
    // governor.
    let mut media = hw_media(0.5, false);
    let mut frames = 0;
    let mut t = 0.0;
    while let Some(frame) = media.get_frame(t) {
        frames += 1;
        t = frame.pts.as_secs() + 1.0 / 30.0;
        if frame.pts >= Timestamp::from_secs(0.4) {
            break;
        }
    }
    assert!(frames >= 12, "expected most of the stream, got {frames}");
    media.stop();
}
