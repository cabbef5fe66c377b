//! Finger counting from a single hand landmark set.

use crate::types::{landmark, HandLandmarks};

/// Separation (normalized frame units) a joint pair needs before a finger counts as extended.
pub const DEFAULT_EXTENSION_THRESHOLD: f32 = 0.03;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Finger {
    Thumb,
    Index,
    Middle,
    Ring,
    Pinky,
}

impl Finger {
    pub const ALL: [Finger; 5] = [
        Finger::Thumb,
        Finger::Index,
        Finger::Middle,
        Finger::Ring,
        Finger::Pinky,
    ];

    /// (tip, reference joint) indices used by the extension test.
    pub fn joints(&self) -> (usize, usize) {
        match self {
            Finger::Thumb => (landmark::THUMB_TIP, landmark::THUMB_IP),
            Finger::Index => (landmark::INDEX_TIP, landmark::INDEX_PIP),
            Finger::Middle => (landmark::MIDDLE_TIP, landmark::MIDDLE_PIP),
            Finger::Ring => (landmark::RING_TIP, landmark::RING_PIP),
            Finger::Pinky => (landmark::PINKY_TIP, landmark::PINKY_PIP),
        }
    }

    /// The thumb folds sideways, so it is judged on x. The other fingers
    /// are extended when the tip sits above the PIP joint (smaller y).
    pub fn is_extended(&self, hand: &HandLandmarks, threshold: f32) -> bool {
        let (tip, joint) = self.joints();
        let tip = hand.point(tip);
        let joint = hand.point(joint);
        match self {
            Finger::Thumb => (tip.x - joint.x).abs() > threshold,
            _ => joint.y - tip.y > threshold,
        }
    }
}

/// Number of extended fingers, 0..=5.
pub fn count_fingers(hand: &HandLandmarks, threshold: f32) -> u8 {
    Finger::ALL
        .iter()
        .filter(|finger| finger.is_extended(hand, threshold))
        .count() as u8
}
