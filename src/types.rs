use base64::Engine;
use chrono::{DateTime, Utc};
use image::{ImageBuffer, Rgb};
use serde::{Deserialize, Serialize};

use crate::error::CaptureError;

/// A single RGB video frame as handed out by a `VideoSource`.
pub type Frame = ImageBuffer<Rgb<u8>, Vec<u8>>;

/// Number of points in a hand landmark set.
pub const HAND_LANDMARK_COUNT: usize = 21;

/// Hand landmark indices (MediaPipe hand model convention)
pub mod landmark {
    pub const WRIST: usize = 0;
    pub const THUMB_IP: usize = 3;
    pub const THUMB_TIP: usize = 4;
    pub const INDEX_PIP: usize = 6;
    pub const INDEX_TIP: usize = 8;
    pub const MIDDLE_PIP: usize = 10;
    pub const MIDDLE_TIP: usize = 12;
    pub const RING_PIP: usize = 14;
    pub const RING_TIP: usize = 16;
    pub const PINKY_PIP: usize = 18;
    pub const PINKY_TIP: usize = 20;
}

/// Represents a single normalized point in frame space
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point3D {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Point3D {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// The 21 landmarks of one detected hand. Indices follow [`landmark`].
#[derive(Debug, Clone, PartialEq)]
pub struct HandLandmarks {
    points: [Point3D; HAND_LANDMARK_COUNT],
}

impl HandLandmarks {
    pub fn new(points: [Point3D; HAND_LANDMARK_COUNT]) -> Self {
        Self { points }
    }

    pub fn point(&self, index: usize) -> Point3D {
        self.points[index]
    }

    pub fn points(&self) -> &[Point3D; HAND_LANDMARK_COUNT] {
        &self.points
    }
}

impl TryFrom<Vec<Point3D>> for HandLandmarks {
    type Error = CaptureError;

    fn try_from(points: Vec<Point3D>) -> Result<Self, Self::Error> {
        let len = points.len();
        let points: [Point3D; HAND_LANDMARK_COUNT] = points
            .try_into()
            .map_err(|_| CaptureError::InvalidLandmarkCount(len))?;
        Ok(Self { points })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    #[default]
    Jpeg,
    Png,
}

impl ImageFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Png => "png",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
        }
    }
}

/// What caused a still frame to be taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureTrigger {
    Gesture,
    Manual,
}

/// An encoded still image taken from the live video.
#[derive(Debug, Clone)]
pub struct CapturedImage {
    pub bytes: Vec<u8>,
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
    pub captured_at: DateTime<Utc>,
    pub trigger: CaptureTrigger,
}

impl CapturedImage {
    /// `data:` URL form, for sinks that take inline images.
    pub fn to_data_url(&self) -> String {
        let encoded = base64::engine::general_purpose::STANDARD.encode(&self.bytes);
        format!("data:{};base64,{}", self.format.mime_type(), encoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_landmarks_require_exactly_21_points() {
        let short = vec![Point3D::default(); 20];
        match HandLandmarks::try_from(short) {
            Err(CaptureError::InvalidLandmarkCount(n)) => assert_eq!(n, 20),
            other => panic!("expected InvalidLandmarkCount, got {:?}", other),
        }

        let long = vec![Point3D::default(); 22];
        assert!(HandLandmarks::try_from(long).is_err());

        let mut exact = vec![Point3D::default(); HAND_LANDMARK_COUNT];
        exact[landmark::THUMB_TIP] = Point3D::new(0.4, 0.5, 0.0);
        let hand = HandLandmarks::try_from(exact).unwrap();
        assert_eq!(hand.point(landmark::THUMB_TIP).x, 0.4);
    }

    #[test]
    fn test_data_url_prefix() {
        let image = CapturedImage {
            bytes: vec![1, 2, 3],
            format: ImageFormat::Png,
            width: 1,
            height: 1,
            captured_at: Utc::now(),
            trigger: CaptureTrigger::Manual,
        };
        assert_eq!(image.to_data_url(), "data:image/png;base64,AQID");
    }
}
