use serde::Serialize;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TryRecvError};
use std::thread;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::Result;
use crate::types::{Frame, HandLandmarks};

/// Single-hand landmark detector in video mode.
pub trait HandDetector {
    fn name(&self) -> String;

    /// `timestamp` must increase between calls.
    fn detect(&mut self, frame: &Frame, timestamp: Duration) -> Result<Option<HandLandmarks>>;
}

pub type BoxedDetector = Box<dyn HandDetector + Send>;

/// Builds a detector. Runs on a worker thread, so model loading never
/// blocks the frame loop.
pub trait DetectorLoader: Send + 'static {
    fn load(self: Box<Self>) -> Result<BoxedDetector>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum DetectorState {
    NotLoaded,
    Loading,
    Ready,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Ready,
    Failed(String),
}

/// Lazily loaded detector, cached once loaded.
pub struct DetectorSlot {
    loader: Option<Box<dyn DetectorLoader>>,
    pending: Option<Receiver<Result<BoxedDetector>>>,
    detector: Option<BoxedDetector>,
    failure: Option<String>,
}

impl DetectorSlot {
    pub fn new(loader: Box<dyn DetectorLoader>) -> Self {
        Self {
            loader: Some(loader),
            pending: None,
            detector: None,
            failure: None,
        }
    }

    pub fn state(&self) -> DetectorState {
        if self.detector.is_some() {
            DetectorState::Ready
        } else if let Some(reason) = &self.failure {
            DetectorState::Failed(reason.clone())
        } else if self.pending.is_some() {
            DetectorState::Loading
        } else {
            DetectorState::NotLoaded
        }
    }

    pub fn is_ready(&self) -> bool {
        self.detector.is_some()
    }

    /// Starts loading on a worker thread. Returns false if a load already
    /// ran or is running.
    pub fn begin_load(&mut self) -> bool {
        let Some(loader) = self.loader.take() else {
            return false;
        };

        let (tx, rx) = mpsc::channel();
        let spawned = thread::Builder::new()
            .name("hand-detector-loader".to_string())
            .spawn(move || {
                let _ = tx.send(loader.load());
            });

        match spawned {
            Ok(_) => {
                info!("loading hand detector");
                self.pending = Some(rx);
            }
            Err(e) => self.fail(format!("could not start loader thread: {}", e)),
        }
        true
    }

    /// Non-blocking check for a finished load.
    pub fn poll(&mut self) -> Option<LoadOutcome> {
        let received = match self.pending.as_ref()?.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Disconnected) => {
                Err(crate::error::CaptureError::Detector("loader exited without a result".into()))
            }
        };
        Some(self.settle(received))
    }

    /// Blocks up to `timeout` for a pending load.
    pub fn wait(&mut self, timeout: Duration) -> Option<LoadOutcome> {
        let received = match self.pending.as_ref()?.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => return None,
            Err(RecvTimeoutError::Disconnected) => {
                Err(crate::error::CaptureError::Detector("loader exited without a result".into()))
            }
        };
        Some(self.settle(received))
    }

    pub fn detector_mut(&mut self) -> Option<&mut BoxedDetector> {
        self.detector.as_mut()
    }

    fn settle(&mut self, received: Result<BoxedDetector>) -> LoadOutcome {
        self.pending = None;
        match received {
            Ok(detector) => {
                info!(detector = %detector.name(), "hand detector ready");
                self.detector = Some(detector);
                LoadOutcome::Ready
            }
            Err(e) => {
                let reason = e.to_string();
                self.fail(reason.clone());
                LoadOutcome::Failed(reason)
            }
        }
    }

    fn fail(&mut self, reason: String) {
        warn!(%reason, "hand detector failed to load, manual capture only");
        self.pending = None;
        self.failure = Some(reason);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CaptureError;
    use crate::simulated::SimulatedLoader;

    const WAIT: Duration = Duration::from_secs(5);

    struct PanickingLoader;

    impl DetectorLoader for PanickingLoader {
        fn load(self: Box<Self>) -> Result<BoxedDetector> {
            panic!("model file corrupt");
        }
    }

    struct BrokenLoader;

    impl DetectorLoader for BrokenLoader {
        fn load(self: Box<Self>) -> Result<BoxedDetector> {
            Err(CaptureError::Detector("missing model".into()))
        }
    }

    #[test]
    fn test_loads_once_and_caches() {
        let mut slot = DetectorSlot::new(Box::new(SimulatedLoader::new(vec![Some(1)])));
        assert_eq!(slot.state(), DetectorState::NotLoaded);

        assert!(slot.begin_load());
        assert!(!slot.begin_load(), "second load should be refused");
        assert_eq!(slot.wait(WAIT), Some(LoadOutcome::Ready));
        assert_eq!(slot.state(), DetectorState::Ready);
        assert!(slot.detector_mut().is_some());
        assert!(!slot.begin_load());
        assert_eq!(slot.poll(), None);
    }

    #[test]
    fn test_load_error_marks_failed() {
        let mut slot = DetectorSlot::new(Box::new(BrokenLoader));
        slot.begin_load();
        match slot.wait(WAIT) {
            Some(LoadOutcome::Failed(reason)) => assert!(reason.contains("missing model")),
            other => panic!("expected failure, got {:?}", other),
        }
        assert!(matches!(slot.state(), DetectorState::Failed(_)));
        assert!(slot.detector_mut().is_none());
    }

    #[test]
    fn test_loader_panic_counts_as_failure() {
        let mut slot = DetectorSlot::new(Box::new(PanickingLoader));
        slot.begin_load();
        assert!(matches!(slot.wait(WAIT), Some(LoadOutcome::Failed(_))));
        assert!(!slot.is_ready());
    }
}
