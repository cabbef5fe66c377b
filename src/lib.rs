//! Webcam photo capture confirmed by showing 1, 2, then 3 fingers.
//!
//! [`controller::CaptureController`] ties a [`camera::VideoSource`], a lazily
//! loaded [`detector::HandDetector`] and a [`sink::PersistenceSink`] together.

pub mod camera;
pub mod config;
pub mod controller;
pub mod countdown;
pub mod detector;
pub mod error;
pub mod fingers;
pub mod gesture;
pub mod simulated;
pub mod sink;
pub mod status;
pub mod types;

#[cfg(feature = "onnx")]
pub mod inference;
#[cfg(feature = "preview")]
pub mod output;

pub use controller::{CaptureController, CapturePhase, FrameOutcome, FrameTicket};
pub use error::{CaptureError, Result};
