use thiserror::Error;

use crate::controller::CapturePhase;

pub type Result<T> = std::result::Result<T, CaptureError>;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("camera unavailable: {0}")]
    CameraUnavailable(String),

    #[error("camera preview is not active")]
    CameraNotActive,

    #[error("hand detector is still loading")]
    DetectorLoading,

    #[error("automatic detection unavailable: {0}")]
    DetectionUnavailable(String),

    #[error("cannot {op} while {phase:?}")]
    InvalidPhase { op: &'static str, phase: CapturePhase },

    #[error("no captured image to save")]
    NothingToSave,

    #[error("frame grab failed: {0}")]
    Frame(String),

    #[error("image encoding failed: {0}")]
    Encode(#[from] image::ImageError),

    #[error("persistence sink failed: {0}")]
    Sink(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("hand detector error: {0}")]
    Detector(String),

    #[error("hand landmark set must have 21 points, got {0}")]
    InvalidLandmarkCount(usize),
}
