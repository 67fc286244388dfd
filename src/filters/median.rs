//! Five-tap median filter.
//!
//! Rejects single and double spikes (regen braking, BMS glitches) without the
//! lag an average would add.

const TAPS: usize = 5;

/// Median of the last five pushed values.
pub struct Median5 {
    buf: [f32; TAPS],
    index: usize,
    count: usize,
}

impl Median5 {
    /// Create an empty filter.
    pub const fn new() -> Self {
        Self {
            buf: [0.0; TAPS],
            index: 0,
            count: 0,
        }
    }

    /// Push a value over the oldest slot and return the median of held values.
    ///
    /// With fewer than five values held this is the middle of what is held
    /// (upper middle for an even count).
    pub fn push(
        &mut self,
        x: f32,
    ) -> f32 {
        self.buf[self.index] = x;
        self.index = (self.index + 1) % TAPS;
        if self.count < TAPS {
            self.count += 1;
        }

        let mut sorted = [0.0f32; TAPS];
        let held = &mut sorted[..self.count];
        held.copy_from_slice(&self.buf[..self.count]);
        held.sort_unstable_by(f32::total_cmp);
        held[self.count / 2]
    }
}

impl Default for Median5 {
    fn default() -> Self { Self::new() }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_value_passes_through() {
        let mut m = Median5::new();
        assert_eq!(m.push(-3.5), -3.5);
        assert_eq!(m.count, 1);
    }

    #[test]
    fn test_partial_fill_upper_middle() {
        let mut m = Median5::new();
        m.push(1.0);
        assert_eq!(m.push(3.0), 3.0);
        assert_eq!(m.push(2.0), 2.0);
        assert_eq!(m.push(10.0), 3.0);
    }

    #[test]
    fn test_rejects_two_spikes() {
        let mut m = Median5::new();
        for x in [-5.0, -5.0, -5.0] {
            m.push(x);
        }
        assert_eq!(m.push(20.0), -5.0);
        assert_eq!(m.push(20.0), -5.0);
    }

    #[test]
    fn test_constant_input_is_stable() {
        let mut m = Median5::new();
        for _ in 0..20 {
            assert_eq!(m.push(-7.25), -7.25);
        }
        assert_eq!(m.count, 5);
    }

    #[test]
    fn test_oldest_slot_overwritten() {
        let mut m = Median5::new();
        for x in [100.0, 100.0, 100.0, 0.0, 0.0] {
            m.push(x);
        }
        // Third zero evicts the first 100 and takes the majority
        assert_eq!(m.push(0.0), 0.0);
    }
}
