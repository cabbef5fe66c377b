use chrono::Utc;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, Rgb};

use crate::error::{CaptureError, Result};
use crate::types::{CaptureTrigger, CapturedImage, Frame, ImageFormat};

/// Live frame supplier for the capture controller.
pub trait VideoSource {
    fn name(&self) -> String;
    fn open(&mut self) -> Result<()>;
    fn close(&mut self);
    fn is_open(&self) -> bool;
    /// The current frame. Fails if the source is closed.
    fn frame(&mut self) -> Result<Frame>;
}

/// Encodes a frame into a still image payload.
pub fn encode_still(
    frame: &Frame,
    format: ImageFormat,
    jpeg_quality: u8,
    trigger: CaptureTrigger,
) -> Result<CapturedImage> {
    let (width, height) = frame.dimensions();
    let mut bytes = Vec::new();
    match format {
        ImageFormat::Jpeg => {
            let encoder = JpegEncoder::new_with_quality(&mut bytes, jpeg_quality.clamp(1, 100));
            encoder.write_image(frame.as_raw(), width, height, ExtendedColorType::Rgb8)?;
        }
        ImageFormat::Png => {
            let encoder = PngEncoder::new(&mut bytes);
            encoder.write_image(frame.as_raw(), width, height, ExtendedColorType::Rgb8)?;
        }
    }

    Ok(CapturedImage {
        bytes,
        format,
        width,
        height,
        captured_at: Utc::now(),
        trigger,
    })
}

/// Deterministic moving gradient, for running without a webcam.
pub struct TestPatternSource {
    width: u32,
    height: u32,
    open: bool,
    frames: u64,
    fail_open: Option<String>,
}

impl TestPatternSource {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            open: false,
            frames: 0,
            fail_open: None,
        }
    }

    /// Source whose `open` always fails, like a missing or blocked camera.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            fail_open: Some(reason.into()),
            ..Self::new(1, 1)
        }
    }

    pub fn frames_served(&self) -> u64 {
        self.frames
    }
}

impl VideoSource for TestPatternSource {
    fn name(&self) -> String {
        format!("Test pattern {}x{}", self.width, self.height)
    }

    fn open(&mut self) -> Result<()> {
        if let Some(reason) = &self.fail_open {
            return Err(CaptureError::CameraUnavailable(reason.clone()));
        }
        self.open = true;
        Ok(())
    }

    fn close(&mut self) {
        self.open = false;
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn frame(&mut self) -> Result<Frame> {
        if !self.open {
            return Err(CaptureError::Frame("source is closed".into()));
        }
        let shift = (self.frames % 256) as u32;
        self.frames += 1;
        let (w, h) = (self.width.max(1), self.height.max(1));
        Ok(Frame::from_fn(self.width, self.height, |x, y| {
            Rgb([
                ((x * 255 / w + shift) % 256) as u8,
                ((y * 255 / h) % 256) as u8,
                (shift % 256) as u8,
            ])
        }))
    }
}

#[cfg(feature = "camera")]
pub use webcam::CameraSource;

#[cfg(feature = "camera")]
mod webcam {
    use super::*;
    use nokhwa::{
        pixel_format::RgbFormat,
        utils::{ApiBackend, CameraIndex, RequestedFormat, RequestedFormatType},
        Camera,
    };
    use tracing::info;

    /// Webcam by index. The device is only held between `open` and `close`.
    pub struct CameraSource {
        index: u32,
        mirror: bool,
        camera: Option<Camera>,
    }

    impl CameraSource {
        pub fn new(index: u32, mirror: bool) -> Self {
            Self {
                index,
                mirror,
                camera: None,
            }
        }

        /// (index, human name) for every camera the OS reports.
        pub fn list() -> Result<Vec<(String, String)>> {
            let cameras = nokhwa::query(ApiBackend::Auto)
                .map_err(|e| CaptureError::CameraUnavailable(e.to_string()))?;
            Ok(cameras
                .into_iter()
                .map(|cam| (cam.index().to_string(), cam.human_name()))
                .collect())
        }
    }

    impl VideoSource for CameraSource {
        fn name(&self) -> String {
            match &self.camera {
                Some(camera) => camera.info().human_name(),
                None => format!("Camera #{}", self.index),
            }
        }

        fn open(&mut self) -> Result<()> {
            if self.camera.is_some() {
                return Ok(());
            }
            let requested =
                RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate);
            let mut camera = Camera::new(CameraIndex::Index(self.index), requested)
                .map_err(|e| CaptureError::CameraUnavailable(e.to_string()))?;
            camera
                .open_stream()
                .map_err(|e| CaptureError::CameraUnavailable(e.to_string()))?;

            info!(
                camera = %camera.info().human_name(),
                format = %camera.camera_format(),
                "opened camera"
            );
            self.camera = Some(camera);
            Ok(())
        }

        fn close(&mut self) {
            if let Some(mut camera) = self.camera.take() {
                let _ = camera.stop_stream();
            }
        }

        fn is_open(&self) -> bool {
            self.camera.is_some()
        }

        fn frame(&mut self) -> Result<Frame> {
            let camera = self
                .camera
                .as_mut()
                .ok_or_else(|| CaptureError::Frame("camera is closed".into()))?;
            let raw = camera
                .frame()
                .map_err(|e| CaptureError::Frame(e.to_string()))?;
            let mut decoded = raw
                .decode_image::<RgbFormat>()
                .map_err(|e| CaptureError::Frame(e.to_string()))?;
            if self.mirror {
                image::imageops::flip_horizontal_in_place(&mut decoded);
            }
            Ok(decoded)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_requires_open() {
        let mut source = TestPatternSource::new(8, 6);
        assert!(source.frame().is_err());
        source.open().unwrap();
        let frame = source.frame().unwrap();
        assert_eq!(frame.dimensions(), (8, 6));
        assert_eq!(source.frames_served(), 1);
        source.close();
        assert!(!source.is_open());
    }

    #[test]
    fn test_unavailable_source_refuses_open() {
        let mut source = TestPatternSource::unavailable("permission denied");
        match source.open() {
            Err(CaptureError::CameraUnavailable(reason)) => assert_eq!(reason, "permission denied"),
            other => panic!("expected CameraUnavailable, got {:?}", other),
        }
    }

    #[test]
    fn test_encode_still_formats() {
        let frame = Frame::from_pixel(16, 8, Rgb([200, 10, 10]));

        let jpeg = encode_still(&frame, ImageFormat::Jpeg, 85, CaptureTrigger::Manual).unwrap();
        assert_eq!(&jpeg.bytes[..2], &[0xFF, 0xD8]);
        assert_eq!((jpeg.width, jpeg.height), (16, 8));

        let png = encode_still(&frame, ImageFormat::Png, 85, CaptureTrigger::Gesture).unwrap();
        assert_eq!(&png.bytes[1..4], b"PNG");
        assert_eq!(png.trigger, CaptureTrigger::Gesture);
    }
}
