//! Gesture capture controller.
//!
//! Owns the camera preview, the lazily loaded hand detector and the state of
//! one capture session. The caller drives it cooperatively: one
//! [`process_frame`](CaptureController::process_frame) per video frame while
//! detecting, and [`poll_countdown`](CaptureController::poll_countdown) on
//! every tick. Nothing here blocks longer than a single frame.

use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::camera::{encode_still, VideoSource};
use crate::config::CaptureConfig;
use crate::countdown::{Clock, Countdown, CountdownEvent};
use crate::detector::{DetectorLoader, DetectorSlot, DetectorState, LoadOutcome};
use crate::error::{CaptureError, Result};
use crate::fingers::count_fingers;
use crate::gesture::{GestureSequence, GestureStep};
use crate::sink::{PersistenceSink, SavedCapture};
use crate::status::CaptureStatus;
use crate::types::{CaptureTrigger, CapturedImage, Frame, HandLandmarks};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CapturePhase {
    Idle,
    /// Camera could not be opened. Every control is inert.
    CameraUnavailable,
    PreviewActive,
    Detecting,
    CountingDown,
    Reviewing,
}

/// Permission to process one frame of the detection loop started in
/// generation `generation`. Tickets from an older generation are no-ops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameTicket {
    generation: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Session moved on, or a countdown is running. Nothing was done.
    Stale,
    /// Keep going with the next frame.
    Continue(FrameTicket),
    /// Sequence complete. The loop stays suspended until the countdown ends.
    CountdownStarted,
}

/// State of the capture attempt currently on screen.
#[derive(Debug, Default)]
pub struct CaptureSession {
    pub is_capturing: bool,
    pub gesture: GestureSequence,
    pub finger_count: u8,
    pub countdown: Option<Countdown>,
    pub status: CaptureStatus,
    pub captured: Option<CapturedImage>,
}

/// Which buttons a UI should enable right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ControlAvailability {
    pub loading: bool,
    pub gesture_enabled: bool,
    pub manual_enabled: bool,
    pub cancel_enabled: bool,
    pub retake_enabled: bool,
    pub save_enabled: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CaptureSnapshot {
    pub phase: CapturePhase,
    pub detector: DetectorState,
    pub is_capturing: bool,
    pub finger_count: u8,
    pub gesture_sequence: Vec<u8>,
    pub countdown: Option<u32>,
    pub status: String,
    pub has_image: bool,
}

pub struct CaptureController<V, S, C> {
    video: V,
    detector: DetectorSlot,
    sink: S,
    clock: C,
    settings: CaptureConfig,
    phase: CapturePhase,
    session: CaptureSession,
    generation: u64,
    last_timestamp: Option<Duration>,
    latest_frame: Option<Frame>,
    latest_hand: Option<HandLandmarks>,
}

impl<V, S, C> CaptureController<V, S, C>
where
    V: VideoSource,
    S: PersistenceSink,
    C: Clock,
{
    pub fn new(
        video: V,
        loader: Box<dyn DetectorLoader>,
        sink: S,
        clock: C,
        settings: CaptureConfig,
    ) -> Self {
        Self {
            video,
            detector: DetectorSlot::new(loader),
            sink,
            clock,
            settings,
            phase: CapturePhase::Idle,
            session: CaptureSession::default(),
            generation: 0,
            last_timestamp: None,
            latest_frame: None,
            latest_hand: None,
        }
    }

    pub fn phase(&self) -> CapturePhase {
        self.phase
    }

    pub fn session(&self) -> &CaptureSession {
        &self.session
    }

    pub fn status(&self) -> &CaptureStatus {
        &self.session.status
    }

    pub fn captured_image(&self) -> Option<&CapturedImage> {
        self.session.captured.as_ref()
    }

    pub fn detector_state(&self) -> DetectorState {
        self.detector.state()
    }

    /// Most recent frame read from the video source.
    pub fn latest_frame(&self) -> Option<&Frame> {
        self.latest_frame.as_ref()
    }

    /// Hand found in the most recent detection frame, if any.
    pub fn latest_hand(&self) -> Option<&HandLandmarks> {
        self.latest_hand.as_ref()
    }

    pub fn video(&self) -> &V {
        &self.video
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn settings(&self) -> &CaptureConfig {
        &self.settings
    }

    fn camera_active(&self) -> bool {
        matches!(
            self.phase,
            CapturePhase::PreviewActive
                | CapturePhase::Detecting
                | CapturePhase::CountingDown
                | CapturePhase::Reviewing
        )
    }

    fn set_phase(&mut self, phase: CapturePhase) {
        if self.phase != phase {
            info!(from = ?self.phase, to = ?phase, "capture phase");
            self.phase = phase;
        }
    }

    fn detector_status(&self) -> CaptureStatus {
        match self.detector.state() {
            DetectorState::Ready => CaptureStatus::Ready,
            DetectorState::Failed(_) => CaptureStatus::DetectionUnavailable,
            DetectorState::Loading | DetectorState::NotLoaded => CaptureStatus::LoadingDetector,
        }
    }

    /// Opens the preview and starts loading the detector if it never was.
    pub fn open_capture(&mut self) -> Result<()> {
        if self.camera_active() {
            return Ok(());
        }

        if let Err(e) = self.video.open() {
            warn!(error = %e, "camera unavailable");
            self.set_phase(CapturePhase::CameraUnavailable);
            self.session.status = CaptureStatus::CameraUnavailable;
            return Err(match e {
                CaptureError::CameraUnavailable(_) => e,
                other => CaptureError::CameraUnavailable(other.to_string()),
            });
        }

        info!(source = %self.video.name(), "camera preview active");
        self.set_phase(CapturePhase::PreviewActive);
        self.detector.begin_load();
        self.session.status = self.detector_status();
        Ok(())
    }

    /// Picks up a finished detector load without blocking.
    pub fn poll_detector(&mut self) -> Option<LoadOutcome> {
        let outcome = self.detector.poll()?;
        self.on_detector_settled();
        Some(outcome)
    }

    /// Blocks up to `timeout` for a pending detector load.
    pub fn wait_for_detector(&mut self, timeout: Duration) -> Option<LoadOutcome> {
        let outcome = self.detector.wait(timeout)?;
        self.on_detector_settled();
        Some(outcome)
    }

    fn on_detector_settled(&mut self) {
        // Keep "photo captured" and friends on screen; only the idle preview
        // message depends on the detector.
        if self.phase == CapturePhase::PreviewActive {
            self.session.status = self.detector_status();
        }
    }

    pub fn start_gesture_capture(&mut self) -> Result<FrameTicket> {
        if !self.camera_active() {
            return Err(CaptureError::CameraNotActive);
        }
        self.poll_detector();
        match self.detector.state() {
            DetectorState::Ready => {}
            DetectorState::Failed(reason) => return Err(CaptureError::DetectionUnavailable(reason)),
            DetectorState::Loading | DetectorState::NotLoaded => {
                return Err(CaptureError::DetectorLoading)
            }
        }

        self.generation += 1;
        self.session.gesture.reset();
        self.session.finger_count = 0;
        self.session.countdown = None;
        self.session.is_capturing = true;
        self.session.status = CaptureStatus::ShowFingers(1);
        self.set_phase(CapturePhase::Detecting);
        Ok(FrameTicket {
            generation: self.generation,
        })
    }

    /// One iteration of the detection loop.
    pub fn process_frame(&mut self, ticket: FrameTicket) -> FrameOutcome {
        if ticket.generation != self.generation
            || !self.session.is_capturing
            || self.session.countdown.is_some()
        {
            return FrameOutcome::Stale;
        }

        let timestamp = self.next_timestamp();
        let count = match self.read_hand(timestamp) {
            Some(hand) => count_fingers(&hand, self.settings.finger_threshold),
            None => 0,
        };
        self.session.finger_count = count;

        match self.session.gesture.observe(count) {
            GestureStep::Unchanged => {}
            GestureStep::Advanced(step) => {
                debug!(step, sequence = ?self.session.gesture.steps(), "gesture step");
                if let Some(next) = self.session.gesture.next_expected() {
                    self.session.status = CaptureStatus::ShowFingers(next);
                }
            }
            GestureStep::Completed => {
                info!("gesture sequence complete, counting down");
                self.session.status = CaptureStatus::Capturing;
                self.session.countdown = Some(Countdown::start(
                    self.settings.countdown_seconds,
                    self.settings.countdown_interval(),
                    self.clock.now(),
                ));
                self.set_phase(CapturePhase::CountingDown);
                return FrameOutcome::CountdownStarted;
            }
        }

        FrameOutcome::Continue(ticket)
    }

    /// Video-mode detectors need strictly increasing timestamps.
    fn next_timestamp(&mut self) -> Duration {
        let now = self.clock.now();
        let timestamp = match self.last_timestamp {
            Some(last) if now <= last => last + Duration::from_micros(1),
            _ => now,
        };
        self.last_timestamp = Some(timestamp);
        timestamp
    }

    /// Grab and detection failures count as "no hand" and never escape the loop.
    fn read_hand(&mut self, timestamp: Duration) -> Option<HandLandmarks> {
        let frame = match self.video.frame() {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "frame grab failed");
                self.latest_hand = None;
                return None;
            }
        };

        let hand = match self.detector.detector_mut() {
            Some(detector) => match detector.detect(&frame, timestamp) {
                Ok(hand) => hand,
                Err(e) => {
                    warn!(error = %e, "hand detection failed on frame");
                    None
                }
            },
            None => None,
        };

        self.latest_frame = Some(frame);
        self.latest_hand = hand.clone();
        hand
    }

    /// Advances a running countdown. Takes the photo when it hits zero.
    pub fn poll_countdown(&mut self) -> Result<Option<CountdownEvent>> {
        let now = self.clock.now();
        let Some(countdown) = self.session.countdown.as_mut() else {
            return Ok(None);
        };

        let event = countdown.poll(now);
        match event {
            Some(CountdownEvent::Tick(remaining)) => debug!(remaining, "countdown"),
            Some(CountdownEvent::Finished) => {
                self.session.countdown = None;
                self.take_photo(CaptureTrigger::Gesture)?;
            }
            None => {}
        }
        Ok(event)
    }

    fn take_photo(&mut self, trigger: CaptureTrigger) -> Result<()> {
        let taken = self.video.frame().and_then(|frame| {
            let image = encode_still(
                &frame,
                self.settings.image_format,
                self.settings.jpeg_quality,
                trigger,
            )?;
            Ok((frame, image))
        });

        self.session.is_capturing = false;
        match taken {
            Ok((frame, image)) => {
                info!(
                    ?trigger,
                    width = image.width,
                    height = image.height,
                    bytes = image.bytes.len(),
                    "photo captured"
                );
                self.latest_frame = Some(frame);
                self.session.captured = Some(image);
                self.session.status = CaptureStatus::PhotoCaptured;
                self.set_phase(CapturePhase::Reviewing);
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "photo capture failed");
                self.session.status = CaptureStatus::Error(e.to_string());
                self.set_phase(CapturePhase::PreviewActive);
                Err(e)
            }
        }
    }

    fn stop_loop(&mut self) {
        self.generation += 1;
        self.session.is_capturing = false;
        self.session.countdown = None;
    }

    /// Stops detection or a countdown. A held photo is kept.
    pub fn cancel_capture(&mut self) -> Result<()> {
        match self.phase {
            CapturePhase::Detecting | CapturePhase::CountingDown => {}
            phase => return Err(CaptureError::InvalidPhase { op: "cancel", phase }),
        }
        self.stop_loop();
        self.session.status = CaptureStatus::Cancelled;
        self.set_phase(CapturePhase::PreviewActive);
        Ok(())
    }

    /// Takes a photo right away. Works whatever state the detector is in.
    pub fn manual_capture(&mut self) -> Result<()> {
        if !self.camera_active() {
            return Err(CaptureError::CameraNotActive);
        }
        self.stop_loop();
        self.session.gesture.reset();
        self.session.finger_count = 0;
        self.take_photo(CaptureTrigger::Manual)
    }

    /// Drops the photo under review and goes back to gesture detection.
    /// Returns `None` when only manual capture is possible.
    pub fn retake(&mut self) -> Result<Option<FrameTicket>> {
        if self.phase != CapturePhase::Reviewing {
            return Err(CaptureError::InvalidPhase {
                op: "retake",
                phase: self.phase,
            });
        }
        self.session.captured = None;
        self.poll_detector();

        if self.detector.is_ready() {
            return self.start_gesture_capture().map(Some);
        }

        self.stop_loop();
        self.session.gesture.reset();
        self.session.finger_count = 0;
        self.set_phase(CapturePhase::PreviewActive);
        self.session.status = self.detector_status();
        Ok(None)
    }

    /// Hands the photo to the sink and closes the flow.
    pub fn save(&mut self) -> Result<SavedCapture> {
        let Some(image) = self.session.captured.as_ref() else {
            return Err(CaptureError::NothingToSave);
        };

        let receipt = match self.sink.persist(image) {
            Ok(receipt) => receipt,
            Err(e) => {
                warn!(error = %e, "saving capture failed");
                self.session.status = CaptureStatus::Error(e.to_string());
                return Err(e);
            }
        };

        info!(?receipt, "capture saved");
        self.close();
        self.session.status = CaptureStatus::Saved;
        Ok(receipt)
    }

    /// Closes the camera and forgets the session. The detector stays loaded.
    pub fn close(&mut self) {
        self.stop_loop();
        self.session = CaptureSession::default();
        self.latest_frame = None;
        self.latest_hand = None;
        if self.video.is_open() {
            self.video.close();
        }
        self.set_phase(CapturePhase::Idle);
    }

    /// Reads a fresh frame for display when no detection loop is reading them.
    pub fn refresh_preview(&mut self) -> Result<()> {
        if !self.camera_active() {
            return Err(CaptureError::CameraNotActive);
        }
        let frame = self.video.frame()?;
        self.latest_frame = Some(frame);
        Ok(())
    }

    pub fn controls(&self) -> ControlAvailability {
        let active = self.camera_active();
        let detector = self.detector.state();
        ControlAvailability {
            loading: active && detector == DetectorState::Loading,
            gesture_enabled: self.phase == CapturePhase::PreviewActive
                && detector == DetectorState::Ready,
            manual_enabled: active,
            cancel_enabled: matches!(
                self.phase,
                CapturePhase::Detecting | CapturePhase::CountingDown
            ),
            retake_enabled: self.phase == CapturePhase::Reviewing,
            save_enabled: active && self.session.captured.is_some(),
        }
    }

    pub fn snapshot(&self) -> CaptureSnapshot {
        CaptureSnapshot {
            phase: self.phase,
            detector: self.detector.state(),
            is_capturing: self.session.is_capturing,
            finger_count: self.session.finger_count,
            gesture_sequence: self.session.gesture.steps().to_vec(),
            countdown: self.session.countdown.as_ref().map(Countdown::remaining),
            status: self.session.status.to_string(),
            has_image: self.session.captured.is_some(),
        }
    }
}

#[cfg(test)]
#[path = "controller_tests.rs"]
mod tests;
