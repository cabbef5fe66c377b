use image::imageops::FilterType;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::detector::{BoxedDetector, DetectorLoader, HandDetector};
use crate::error::{CaptureError, Result};
use crate::types::{Frame, HandLandmarks, Point3D, HAND_LANDMARK_COUNT};

const INPUT_SIZE: u32 = 224;

fn onnx_err(e: impl std::fmt::Display) -> CaptureError {
    CaptureError::Detector(e.to_string())
}

/// MediaPipe-style hand landmark model: 224x224 RGB in, 21 (x, y, z)
/// landmarks in input pixels plus a hand presence score out.
pub struct OnnxHandDetector {
    session: Session,
    min_confidence: f32,
    last_timestamp: Option<Duration>,
}

impl OnnxHandDetector {
    pub fn new(model_path: &Path, min_confidence: f32) -> Result<Self> {
        if !model_path.exists() {
            return Err(CaptureError::Detector(format!(
                "model not found at {}",
                model_path.display()
            )));
        }

        info!(model = %model_path.display(), "loading hand landmark model");
        let session = Session::builder()
            .map_err(onnx_err)?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(onnx_err)?
            .with_intra_threads(2)
            .map_err(onnx_err)?
            .commit_from_file(model_path)
            .map_err(onnx_err)?;

        Ok(Self {
            session,
            min_confidence,
            last_timestamp: None,
        })
    }

    /// Center square crop, resized to the model input, NHWC in [0, 1].
    fn preprocess(frame: &Frame) -> (Vec<f32>, f32, f32, f32) {
        let (w, h) = frame.dimensions();
        let side = w.min(h);
        let x0 = (w - side) / 2;
        let y0 = (h - side) / 2;
        let crop = image::imageops::crop_imm(frame, x0, y0, side, side).to_image();
        let resized = image::imageops::resize(&crop, INPUT_SIZE, INPUT_SIZE, FilterType::Triangle);

        let mut input = Vec::with_capacity((INPUT_SIZE * INPUT_SIZE * 3) as usize);
        for pixel in resized.pixels() {
            input.push(pixel[0] as f32 / 255.0);
            input.push(pixel[1] as f32 / 255.0);
            input.push(pixel[2] as f32 / 255.0);
        }
        (input, x0 as f32, y0 as f32, side as f32)
    }
}

/// Maps raw model output back into normalized full-frame coordinates.
fn decode_landmarks(
    raw: &[f32],
    (x0, y0, side): (f32, f32, f32),
    (width, height): (f32, f32),
) -> Option<HandLandmarks> {
    if raw.len() < HAND_LANDMARK_COUNT * 3 {
        return None;
    }
    let scale = side / INPUT_SIZE as f32;
    let points: Vec<Point3D> = raw
        .chunks_exact(3)
        .take(HAND_LANDMARK_COUNT)
        .map(|p| {
            Point3D::new(
                (x0 + p[0] * scale) / width,
                (y0 + p[1] * scale) / height,
                p[2] / INPUT_SIZE as f32,
            )
        })
        .collect();
    HandLandmarks::try_from(points).ok()
}

impl HandDetector for OnnxHandDetector {
    fn name(&self) -> String {
        "Hand Landmarks (ONNX)".to_string()
    }

    fn detect(&mut self, frame: &Frame, timestamp: Duration) -> Result<Option<HandLandmarks>> {
        if let Some(last) = self.last_timestamp {
            if timestamp <= last {
                return Err(CaptureError::Detector(format!(
                    "timestamp {:?} is not after {:?}",
                    timestamp, last
                )));
            }
        }
        self.last_timestamp = Some(timestamp);

        let (input, x0, y0, side) = Self::preprocess(frame);
        let tensor = Tensor::from_array((vec![1, 224, 224, 3], input)).map_err(onnx_err)?;
        let outputs = self
            .session
            .run(ort::inputs![tensor])
            .map_err(onnx_err)?;

        let (_shape, presence) = outputs[1]
            .try_extract_tensor::<f32>()
            .map_err(onnx_err)?;
        let score = presence.first().copied().unwrap_or(0.0);
        if score < self.min_confidence {
            return Ok(None);
        }

        let (_shape, raw) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(onnx_err)?;
        let (w, h) = frame.dimensions();
        Ok(decode_landmarks(raw, (x0, y0, side), (w as f32, h as f32)))
    }
}

pub struct OnnxLoader {
    model_path: PathBuf,
    min_confidence: f32,
}

impl OnnxLoader {
    pub fn new(model_path: impl Into<PathBuf>, min_confidence: f32) -> Self {
        Self {
            model_path: model_path.into(),
            min_confidence,
        }
    }
}

impl DetectorLoader for OnnxLoader {
    fn load(self: Box<Self>) -> Result<BoxedDetector> {
        let detector = OnnxHandDetector::new(&self.model_path, self.min_confidence)?;
        Ok(Box::new(detector))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_maps_crop_back_to_frame() {
        let mut raw = vec![0.0f32; HAND_LANDMARK_COUNT * 3];
        raw[0] = 112.0; // wrist x at input center
        raw[1] = 224.0; // wrist y at input bottom
        // 640x480 frame, 480 square crop starting at x=80
        let hand = decode_landmarks(&raw, (80.0, 0.0, 480.0), (640.0, 480.0)).unwrap();
        let wrist = hand.point(0);
        assert!((wrist.x - 0.5).abs() < 1e-5);
        assert!((wrist.y - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_decode_rejects_short_output() {
        let raw = vec![0.0f32; 30];
        assert!(decode_landmarks(&raw, (0.0, 0.0, 224.0), (224.0, 224.0)).is_none());
    }

    #[test]
    fn test_loader_reports_missing_model() {
        let loader = Box::new(OnnxLoader::new("definitely/missing.onnx", 0.5));
        match loader.load() {
            Err(CaptureError::Detector(msg)) => assert!(msg.contains("model not found")),
            Err(other) => panic!("unexpected error {:?}", other),
            Ok(_) => panic!("load should fail"),
        }
    }
}
