//! Scripted stand-in for a real hand tracker, used when no model is available.

use std::thread;
use std::time::Duration;

use crate::detector::{BoxedDetector, DetectorLoader, HandDetector};
use crate::error::{CaptureError, Result};
use crate::types::{landmark, Frame, HandLandmarks, Point3D, HAND_LANDMARK_COUNT};

/// Order in which fingers are raised for a given count.
const RAISE_ORDER: [(usize, usize); 4] = [
    (landmark::INDEX_PIP, landmark::INDEX_TIP),
    (landmark::MIDDLE_PIP, landmark::MIDDLE_TIP),
    (landmark::RING_PIP, landmark::RING_TIP),
    (landmark::PINKY_PIP, landmark::PINKY_TIP),
];

/// Builds a plausible right hand showing `fingers` raised fingers (0..=5).
/// Index through pinky go up first, the thumb last.
pub fn synthetic_hand(fingers: u8) -> HandLandmarks {
    let mut points = [Point3D::default(); HAND_LANDMARK_COUNT];
    points[landmark::WRIST] = Point3D::new(0.5, 0.85, 0.0);

    // Thumb chain: CMC, MCP, IP, tip
    points[1] = Point3D::new(0.42, 0.78, 0.0);
    points[2] = Point3D::new(0.37, 0.72, 0.0);
    points[landmark::THUMB_IP] = Point3D::new(0.34, 0.67, 0.0);
    points[landmark::THUMB_TIP] = if fingers >= 5 {
        Point3D::new(0.26, 0.62, 0.0)
    } else {
        Point3D::new(0.35, 0.64, 0.0)
    };

    for (i, &(pip, tip)) in RAISE_ORDER.iter().enumerate() {
        let x = 0.42 + i as f32 * 0.06;
        let raised = (i as u8) < fingers;
        points[pip - 1] = Point3D::new(x, 0.62, 0.0); // MCP
        points[pip] = Point3D::new(x, 0.52, 0.0);
        if raised {
            points[pip + 1] = Point3D::new(x, 0.45, 0.0);
            points[tip] = Point3D::new(x, 0.38, 0.0);
        } else {
            points[pip + 1] = Point3D::new(x, 0.56, 0.0);
            points[tip] = Point3D::new(x, 0.60, 0.0);
        }
    }

    HandLandmarks::new(points)
}

/// Replays a script of finger counts, one entry per `frames_per_step`
/// frames. `None` entries and the time after the script are "no hand".
pub struct SimulatedHandDetector {
    script: Vec<Option<u8>>,
    frames_per_step: u32,
    frame_index: u64,
    repeat: bool,
}

impl SimulatedHandDetector {
    pub fn new(script: Vec<Option<u8>>) -> Self {
        Self {
            script,
            frames_per_step: 1,
            frame_index: 0,
            repeat: false,
        }
    }

    pub fn with_frames_per_step(mut self, frames: u32) -> Self {
        self.frames_per_step = frames.max(1);
        self
    }

    pub fn repeating(mut self) -> Self {
        self.repeat = true;
        self
    }

    fn current(&self) -> Option<u8> {
        if self.script.is_empty() {
            return None;
        }
        let mut step = (self.frame_index / self.frames_per_step as u64) as usize;
        if self.repeat {
            step %= self.script.len();
        }
        self.script.get(step).copied().flatten()
    }
}

impl HandDetector for SimulatedHandDetector {
    fn name(&self) -> String {
        "Simulated hand (scripted)".to_string()
    }

    fn detect(&mut self, _frame: &Frame, _timestamp: Duration) -> Result<Option<HandLandmarks>> {
        let count = self.current();
        self.frame_index += 1;
        Ok(count.map(synthetic_hand))
    }
}

pub struct SimulatedLoader {
    script: Vec<Option<u8>>,
    frames_per_step: u32,
    repeat: bool,
    delay: Duration,
    failure: Option<String>,
}

impl SimulatedLoader {
    pub fn new(script: Vec<Option<u8>>) -> Self {
        Self {
            script,
            frames_per_step: 1,
            repeat: false,
            delay: Duration::ZERO,
            failure: None,
        }
    }

    pub fn with_frames_per_step(mut self, frames: u32) -> Self {
        self.frames_per_step = frames;
        self
    }

    pub fn repeating(mut self) -> Self {
        self.repeat = true;
        self
    }

    /// Simulates slow model loading.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Makes the load fail with `reason`.
    pub fn failing(mut self, reason: impl Into<String>) -> Self {
        self.failure = Some(reason.into());
        self
    }
}

impl DetectorLoader for SimulatedLoader {
    fn load(self: Box<Self>) -> Result<BoxedDetector> {
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        if let Some(reason) = self.failure {
            return Err(CaptureError::Detector(reason));
        }

        let mut detector =
            SimulatedHandDetector::new(self.script).with_frames_per_step(self.frames_per_step);
        if self.repeat {
            detector = detector.repeating();
        }
        Ok(Box::new(detector))
    }
}

/// Parses a CLI script such as `0,1,1,2,-,3` (`-` is "no hand").
pub fn parse_script(text: &str) -> std::result::Result<Vec<Option<u8>>, String> {
    text.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            if s == "-" {
                return Ok(None);
            }
            match s.parse::<u8>() {
                Ok(n) if n <= 5 => Ok(Some(n)),
                _ => Err(format!("invalid finger count '{}', expected 0-5 or '-'", s)),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingers::{count_fingers, DEFAULT_EXTENSION_THRESHOLD};

    fn blank() -> Frame {
        Frame::new(4, 4)
    }

    #[test]
    fn test_synthetic_hand_matches_requested_count() {
        for n in 0..=5u8 {
            let hand = synthetic_hand(n);
            assert_eq!(
                count_fingers(&hand, DEFAULT_EXTENSION_THRESHOLD),
                n,
                "synthetic hand for {} fingers",
                n
            );
        }
    }

    #[test]
    fn test_script_plays_then_goes_quiet() {
        let mut det = SimulatedHandDetector::new(vec![Some(1), None, Some(2)]);
        let frame = blank();
        let mut seen = Vec::new();
        for i in 0..5u64 {
            let hand = det.detect(&frame, Duration::from_millis(i)).unwrap();
            seen.push(hand.map(|h| count_fingers(&h, DEFAULT_EXTENSION_THRESHOLD)));
        }
        assert_eq!(seen, vec![Some(1), None, Some(2), None, None]);
    }

    #[test]
    fn test_frames_per_step_holds_each_entry() {
        let mut det = SimulatedHandDetector::new(vec![Some(1), Some(2)])
            .with_frames_per_step(2)
            .repeating();
        let frame = blank();
        let counts: Vec<_> = (0..6u64)
            .map(|i| {
                det.detect(&frame, Duration::from_millis(i))
                    .unwrap()
                    .map(|h| count_fingers(&h, DEFAULT_EXTENSION_THRESHOLD))
            })
            .collect();
        assert_eq!(
            counts,
            vec![Some(1), Some(1), Some(2), Some(2), Some(1), Some(1)]
        );
    }

    #[test]
    fn test_parse_script() {
        assert_eq!(
            parse_script("0, 1,-,3").unwrap(),
            vec![Some(0), Some(1), None, Some(3)]
        );
        assert!(parse_script("1,7").is_err());
        assert!(parse_script("one").is_err());
    }
}
