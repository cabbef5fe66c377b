//! The 1 -> 2 -> 3 finger confirmation sequence.

use serde::Serialize;

/// Finger counts that must be shown, in order.
pub const REQUIRED_SEQUENCE: [u8; 3] = [1, 2, 3];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureStep {
    /// The count did not advance the sequence.
    Unchanged,
    /// The count was appended; the sequence is not complete yet.
    Advanced(u8),
    /// The final count was appended.
    Completed,
}

/// Edge-triggered record of recognized counts. Only ever holds a prefix
/// of [`REQUIRED_SEQUENCE`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GestureSequence {
    steps: Vec<u8>,
}

impl GestureSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.steps.clear();
    }

    pub fn steps(&self) -> &[u8] {
        &self.steps
    }

    pub fn is_complete(&self) -> bool {
        self.steps == REQUIRED_SEQUENCE
    }

    /// Count the user should show next, if any.
    pub fn next_expected(&self) -> Option<u8> {
        REQUIRED_SEQUENCE.get(self.steps.len()).copied()
    }

    pub fn observe(&mut self, finger_count: u8) -> GestureStep {
        if self.is_complete() {
            return GestureStep::Unchanged;
        }

        let last = self.steps.last().copied();
        let accepted = match finger_count {
            1 => self.steps.is_empty(),
            2 => last == Some(1),
            3 => last == Some(2),
            _ => false,
        };
        if !accepted {
            return GestureStep::Unchanged;
        }

        self.steps.push(finger_count);
        if self.is_complete() {
            GestureStep::Completed
        } else {
            GestureStep::Advanced(finger_count)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_counts_progress_in_order() {
        let mut seq = GestureSequence::new();
        let counts = [0, 1, 1, 2, 0, 2, 3];
        let expected: [&[u8]; 7] = [&[], &[1], &[1], &[1, 2], &[1, 2], &[1, 2], &[1, 2, 3]];

        for (count, want) in counts.iter().zip(expected.iter()) {
            seq.observe(*count);
            assert_eq!(seq.steps(), *want, "after count {}", count);
        }
        assert!(seq.is_complete());
    }

    #[test]
    fn test_out_of_order_counts_are_ignored() {
        let mut seq = GestureSequence::new();
        assert_eq!(seq.observe(2), GestureStep::Unchanged);
        assert_eq!(seq.observe(3), GestureStep::Unchanged);
        assert!(seq.steps().is_empty());

        assert_eq!(seq.observe(1), GestureStep::Advanced(1));
        assert_eq!(seq.observe(3), GestureStep::Unchanged);
        assert_eq!(seq.observe(5), GestureStep::Unchanged);
        assert_eq!(seq.steps(), &[1]);
    }

    #[test]
    fn test_going_back_to_one_does_not_restart() {
        let mut seq = GestureSequence::new();
        seq.observe(1);
        seq.observe(2);
        assert_eq!(seq.observe(1), GestureStep::Unchanged);
        assert_eq!(seq.steps(), &[1, 2]);
        assert_eq!(seq.observe(3), GestureStep::Completed);
    }

    #[test]
    fn test_complete_sequence_is_frozen() {
        let mut seq = GestureSequence::new();
        for count in REQUIRED_SEQUENCE {
            seq.observe(count);
        }
        assert_eq!(seq.observe(1), GestureStep::Unchanged);
        assert_eq!(seq.observe(3), GestureStep::Unchanged);
        assert_eq!(seq.steps(), &REQUIRED_SEQUENCE);
        assert_eq!(seq.next_expected(), None);
    }

    #[test]
    fn test_reset_clears_progress() {
        let mut seq = GestureSequence::new();
        seq.observe(1);
        seq.reset();
        assert!(seq.steps().is_empty());
        assert_eq!(seq.next_expected(), Some(1));
    }
}
