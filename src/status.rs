use std::fmt;

/// Text shown to the user under the preview.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CaptureStatus {
    #[default]
    Idle,
    LoadingDetector,
    Ready,
    /// Waiting for the given finger count during gesture detection.
    ShowFingers(u8),
    Capturing,
    PhotoCaptured,
    Cancelled,
    Saved,
    DetectionUnavailable,
    CameraUnavailable,
    Error(String),
}

impl fmt::Display for CaptureStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureStatus::Idle => write!(f, "Camera closed"),
            CaptureStatus::LoadingDetector => write!(f, "Loading hand detector..."),
            CaptureStatus::Ready => {
                write!(f, "Ready. Start gesture capture or take a photo manually")
            }
            CaptureStatus::ShowFingers(1) => write!(f, "Show 1 finger to start"),
            CaptureStatus::ShowFingers(n) => write!(f, "Great! Now show {} fingers", n),
            CaptureStatus::Capturing => write!(f, "Capturing..."),
            CaptureStatus::PhotoCaptured => {
                write!(f, "Photo captured! Review and save or retake")
            }
            CaptureStatus::Cancelled => write!(f, "Capture cancelled"),
            CaptureStatus::Saved => write!(f, "Photo saved"),
            CaptureStatus::DetectionUnavailable => write!(
                f,
                "Automatic detection unavailable. Use manual capture instead"
            ),
            CaptureStatus::CameraUnavailable => {
                write!(f, "Camera unavailable. Check the device and permissions")
            }
            CaptureStatus::Error(msg) => write!(f, "Error: {}", msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finger_prompts() {
        assert_eq!(CaptureStatus::ShowFingers(1).to_string(), "Show 1 finger to start");
        assert_eq!(
            CaptureStatus::ShowFingers(3).to_string(),
            "Great! Now show 3 fingers"
        );
    }
}
