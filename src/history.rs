//! Long-window discharge history.
//!
//! Keeps the last 15 minutes of discharge draw at 1 Hz. When the pack is not
//! in a stable discharge (coasting, stopped at a light) the live current says
//! nothing about range, so the display falls back to a robust typical draw
//! computed from this window.

#[cfg(not(test))]
use micromath::F32Ext;

use crate::config::{HISTORY_CAPACITY, HistoryConfig};
use crate::estimate::MIN_DISCHARGE_CURRENT_A;
use crate::state_machine::DwellTimer;

// =============================================================================
// Ring Buffer
// =============================================================================

/// Fixed-capacity ring of discharge magnitudes (A), oldest evicted first.
pub struct DischargeHistory<const N: usize = HISTORY_CAPACITY> {
    config: HistoryConfig,
    buf: [f32; N],
    head: usize,
    count: usize,
    last_push_ms: Option<u64>,
}

impl<const N: usize> DischargeHistory<N> {
    pub const fn new(config: HistoryConfig) -> Self {
        Self {
            config,
            buf: [0.0; N],
            head: 0,
            count: 0,
            last_push_ms: None,
        }
    }

    /// Record a raw current reading if it is a real discharge and the push
    /// interval has elapsed. Returns true when a sample was stored.
    pub fn record(
        &mut self,
        current_a: f32,
        now_ms: u64,
    ) -> bool {
        if !(current_a < -MIN_DISCHARGE_CURRENT_A) {
            return false;
        }
        let draw_a = -current_a;
        if draw_a < self.config.keep_min_a {
            return false;
        }
        if let Some(last) = self.last_push_ms
            && now_ms.saturating_sub(last) < self.config.push_interval_ms
        {
            return false;
        }

        self.push(draw_a);
        self.last_push_ms = Some(now_ms);
        true
    }

    fn push(
        &mut self,
        draw_a: f32,
    ) {
        if N == 0 {
            return;
        }
        self.buf[self.head] = draw_a;
        self.head = (self.head + 1) % N;
        if self.count < N {
            self.count += 1;
        }
    }

    /// Robust typical draw: trimmed mean of the window.
    ///
    /// Sorts a copy, drops the lowest `trim_low` and highest `trim_high`
    /// fractions and averages the rest. Falls back to the median when the trim
    /// leaves nothing. `None` until `min_samples` have been recorded.
    pub fn typical_draw_a(&self) -> Option<f32> {
        let n = self.count;
        if n == 0 || n < self.config.min_samples {
            return None;
        }

        let mut sorted = [0.0f32; N];
        let held = &mut sorted[..n];
        for (slot, value) in held.iter_mut().zip(self.iter()) {
            *slot = value;
        }
        held.sort_unstable_by(f32::total_cmp);

        let lo = (n as f32 * self.config.trim_low).floor() as usize;
        let hi = n.saturating_sub((n as f32 * self.config.trim_high).ceil() as usize);
        if hi <= lo {
            return Some(held[n / 2]);
        }

        let kept = &held[lo..hi];
        let sum: f32 = kept.iter().sum();
        Some(sum / kept.len() as f32)
    }

    /// Iterate recorded draws from oldest to newest.
    pub fn iter(&self) -> DischargeHistoryIter<'_, N> {
        DischargeHistoryIter {
            history: self,
            index: (self.head + N - self.count) % N.max(1),
            remaining: self.count,
        }
    }

    #[inline]
    pub fn len(&self) -> usize { self.count }

    #[inline]
    pub fn is_empty(&self) -> bool { self.count == 0 }
}

/// Iterator over recorded draws, oldest to newest.
pub struct DischargeHistoryIter<'a, const N: usize> {
    history: &'a DischargeHistory<N>,
    index: usize,
    remaining: usize,
}

impl<const N: usize> Iterator for DischargeHistoryIter<'_, N> {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let value = self.history.buf[self.index];
        self.index = (self.index + 1) % N;
        self.remaining -= 1;
        Some(value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) { (self.remaining, Some(self.remaining)) }
}

// =============================================================================
// Display Gate
// =============================================================================

/// Debounces the conditions under which the historical estimate is shown.
pub struct HistoryGate {
    timer: DwellTimer,
}

impl HistoryGate {
    pub const fn new(dwell_ms: u64) -> Self {
        Self {
            timer: DwellTimer::new(dwell_ms),
        }
    }

    /// Feed this tick's base condition; true once it has held for the dwell.
    #[inline]
    pub fn update(
        &mut self,
        base_condition: bool,
        now_ms: u64,
    ) -> bool {
        self.timer.update(base_condition, now_ms)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
