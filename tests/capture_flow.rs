use std::time::Duration;

use rusty_snap::camera::TestPatternSource;
use rusty_snap::config::CaptureConfig;
use rusty_snap::countdown::{CountdownEvent, ManualClock};
use rusty_snap::detector::LoadOutcome;
use rusty_snap::simulated::SimulatedLoader;
use rusty_snap::sink::{DirectorySink, SavedCapture};
use rusty_snap::types::{CaptureTrigger, ImageFormat};
use rusty_snap::{CaptureController, CapturePhase, FrameOutcome};

const WAIT: Duration = Duration::from_secs(5);

#[test]
fn gesture_capture_end_to_end() {
    let out = tempfile::tempdir().unwrap();
    let clock = ManualClock::new();
    let settings = CaptureConfig {
        image_format: ImageFormat::Png,
        ..CaptureConfig::default()
    };

    // Each count held for three frames, with a dropout in the middle.
    let script = vec![Some(0), Some(1), None, Some(2), Some(4), Some(3)];
    let loader = SimulatedLoader::new(script).with_frames_per_step(3);
    let mut controller = CaptureController::new(
        TestPatternSource::new(64, 48),
        Box::new(loader),
        DirectorySink::new(out.path()).unwrap(),
        clock.clone(),
        settings,
    );

    controller.open_capture().unwrap();
    assert_eq!(controller.wait_for_detector(WAIT), Some(LoadOutcome::Ready));
    assert!(controller.controls().gesture_enabled);

    let mut ticket = controller.start_gesture_capture().unwrap();
    let mut frames = 0;
    loop {
        frames += 1;
        clock.advance(Duration::from_millis(33));
        match controller.process_frame(ticket) {
            FrameOutcome::Continue(next) => ticket = next,
            FrameOutcome::CountdownStarted => break,
            FrameOutcome::Stale => panic!("loop went stale at frame {}", frames),
        }
        assert!(frames < 50, "sequence never completed");
    }
    assert_eq!(frames, 16, "third count is first seen on frame 16");
    assert_eq!(controller.phase(), CapturePhase::CountingDown);

    let mut shown = vec![controller.snapshot().countdown.unwrap()];
    let mut captured = false;
    for _ in 0..40 {
        clock.advance(Duration::from_millis(100));
        match controller.poll_countdown().unwrap() {
            Some(CountdownEvent::Tick(n)) => shown.push(n),
            Some(CountdownEvent::Finished) => {
                captured = true;
                break;
            }
            None => {}
        }
    }
    assert!(captured, "countdown should finish within 4 seconds");
    assert_eq!(shown, vec![3, 2, 1]);

    let image = controller.captured_image().unwrap();
    assert_eq!(image.trigger, CaptureTrigger::Gesture);
    assert_eq!((image.width, image.height), (64, 48));

    let receipt = controller.save().unwrap();
    let SavedCapture::File(path) = receipt else {
        panic!("directory sink returns a file");
    };
    assert!(path.exists());
    assert!(path.with_extension("json").exists());
    assert_eq!(controller.phase(), CapturePhase::Idle);
}

#[test]
fn manual_capture_survives_detector_failure() {
    let out = tempfile::tempdir().unwrap();
    let mut controller = CaptureController::new(
        TestPatternSource::new(32, 32),
        Box::new(SimulatedLoader::new(Vec::new()).failing("no model")),
        DirectorySink::new(out.path()).unwrap(),
        ManualClock::new(),
        CaptureConfig::default(),
    );

    controller.open_capture().unwrap();
    assert!(matches!(
        controller.wait_for_detector(WAIT),
        Some(LoadOutcome::Failed(_))
    ));

    controller.manual_capture().unwrap();
    assert_eq!(controller.phase(), CapturePhase::Reviewing);
    assert_eq!(
        controller.captured_image().map(|i| i.trigger),
        Some(CaptureTrigger::Manual)
    );
    assert!(controller.save().is_ok());
}
