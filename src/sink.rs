use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{CaptureError, Result};
use crate::types::{CaptureTrigger, CapturedImage, ImageFormat};

/// Receives the accepted photo. The controller's job ends at the hand-off.
pub trait PersistenceSink {
    fn persist(&mut self, image: &CapturedImage) -> Result<SavedCapture>;
}

/// Where a saved capture ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SavedCapture {
    File(PathBuf),
    Memory(usize),
}

/// Metadata written next to every saved image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureRecord {
    pub file: String,
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
    pub bytes: usize,
    pub trigger: CaptureTrigger,
    pub captured_at: DateTime<Utc>,
}

/// Writes `capture_<millis>.<ext>` plus a `.json` sidecar into a directory.
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        if !dir.exists() {
            fs::create_dir_all(&dir)?;
        }
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn free_stem(&self, image: &CapturedImage) -> String {
        let base = format!("capture_{}", image.captured_at.timestamp_millis());
        let ext = image.format.extension();
        let mut stem = base.clone();
        let mut n = 1;
        while self.dir.join(format!("{}.{}", stem, ext)).exists() {
            stem = format!("{}_{}", base, n);
            n += 1;
        }
        stem
    }
}

impl PersistenceSink for DirectorySink {
    fn persist(&mut self, image: &CapturedImage) -> Result<SavedCapture> {
        let stem = self.free_stem(image);
        let filename = format!("{}.{}", stem, image.format.extension());
        let image_path = self.dir.join(&filename);
        fs::write(&image_path, &image.bytes)?;

        let record = CaptureRecord {
            file: filename,
            format: image.format,
            width: image.width,
            height: image.height,
            bytes: image.bytes.len(),
            trigger: image.trigger,
            captured_at: image.captured_at,
        };
        let json_file = File::create(self.dir.join(format!("{}.json", stem)))?;
        serde_json::to_writer_pretty(json_file, &record)?;

        info!(path = %image_path.display(), "saved capture");
        Ok(SavedCapture::File(image_path))
    }
}

/// Keeps saved images in memory.
#[derive(Default)]
pub struct MemorySink {
    saved: Vec<CapturedImage>,
    reject_with: Option<String>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that refuses every image, for exercising save failures.
    pub fn rejecting(reason: impl Into<String>) -> Self {
        Self {
            saved: Vec::new(),
            reject_with: Some(reason.into()),
        }
    }

    pub fn saved(&self) -> &[CapturedImage] {
        &self.saved
    }
}

impl PersistenceSink for MemorySink {
    fn persist(&mut self, image: &CapturedImage) -> Result<SavedCapture> {
        if let Some(reason) = &self.reject_with {
            return Err(CaptureError::Sink(reason.clone()));
        }
        self.saved.push(image.clone());
        Ok(SavedCapture::Memory(self.saved.len() - 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(format: ImageFormat) -> CapturedImage {
        CapturedImage {
            bytes: vec![9; 32],
            format,
            width: 4,
            height: 2,
            captured_at: Utc::now(),
            trigger: CaptureTrigger::Gesture,
        }
    }

    #[test]
    fn test_directory_sink_writes_image_and_sidecar() {
        let tmp = tempfile::tempdir().unwrap();
        let mut sink = DirectorySink::new(tmp.path().join("out")).unwrap();

        let image = sample(ImageFormat::Png);
        let saved = sink.persist(&image).unwrap();
        let SavedCapture::File(path) = saved else {
            panic!("expected a file receipt");
        };
        assert_eq!(path.extension().unwrap(), "png");
        assert_eq!(fs::read(&path).unwrap(), image.bytes);

        let sidecar = path.with_extension("json");
        let record: CaptureRecord =
            serde_json::from_reader(File::open(sidecar).unwrap()).unwrap();
        assert_eq!(record.width, 4);
        assert_eq!(record.bytes, 32);
        assert_eq!(record.trigger, CaptureTrigger::Gesture);
    }

    #[test]
    fn test_directory_sink_does_not_overwrite() {
        let tmp = tempfile::tempdir().unwrap();
        let mut sink = DirectorySink::new(tmp.path()).unwrap();
        let image = sample(ImageFormat::Jpeg);

        let first = sink.persist(&image).unwrap();
        let second = sink.persist(&image).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_memory_sink() {
        let mut sink = MemorySink::new();
        assert_eq!(sink.persist(&sample(ImageFormat::Jpeg)).unwrap(), SavedCapture::Memory(0));
        assert_eq!(sink.saved().len(), 1);

        let mut rejecting = MemorySink::rejecting("disk full");
        assert!(matches!(
            rejecting.persist(&sample(ImageFormat::Jpeg)),
            Err(CaptureError::Sink(_))
        ));
    }
}
