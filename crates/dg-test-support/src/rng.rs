//! Scripted dice for tests.

use dg_core::rng::DeterministicRng;

/// Always rolls the lowest face, so every `NdM+K` totals `N + K`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockRng;

impl DeterministicRng for MockRng {
    fn next_u32_range(&mut self, min: u32, _max: u32) -> u32 {
        min
    }
}

/// Plays back a fixed list of die faces in order.
///
/// Panics when the script runs out or a face does not fit the die being
/// rolled, so a test that miscounts its dice fails loudly.
#[derive(Debug, Clone)]
pub struct SequenceRng {
    faces: Vec<u32>,
    next: usize,
}

impl SequenceRng {
    /// Scripts the given faces.
    #[must_use]
    pub fn new(faces: Vec<u32>) -> Self {
        Self { faces, next: 0 }
    }

    /// Faces not yet rolled.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.faces.len() - self.next
    }
}

impl DeterministicRng for SequenceRng {
    fn next_u32_range(&mut self, min: u32, max: u32) -> u32 {
        let Some(&face) = self.faces.get(self.next) else {
            panic!("SequenceRng exhausted after {} rolls", self.next);
        };
        assert!(
            (min..=max).contains(&face),
            "scripted face {face} does not fit a {min}..={max} die"
        );
        self.next += 1;
        face
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_plays_back_in_order() {
        let mut rng = SequenceRng::new(vec![2, 5]);
        assert_eq!(rng.next_u32_range(1, 6), 2);
        assert_eq!(rng.next_u32_range(1, 6), 5);
        assert_eq!(rng.remaining(), 0);
    }

    #[test]
    #[should_panic(expected = "does not fit")]
    fn test_sequence_rejects_faces_off_the_die() {
        SequenceRng::new(vec![7]).next_u32_range(1, 6);
    }

    #[test]
    fn test_mock_rolls_lowest_face() {
        assert_eq!(MockRng.next_u32_range(1, 20), 1);
    }
}
