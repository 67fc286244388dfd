//! Button debounce handling for the load switch.
//!
//! The button task wakes on every rising edge. Contact bounce produces a burst
//! of edges, so only the first edge of a burst is accepted: any edge within
//! the debounce window of the last accepted one is dropped.

use crate::config::BUTTON_DEBOUNCE_MS;

/// Time-based edge debouncer.
pub struct ButtonState {
    debounce_ms: u64,
    last_accepted_ms: Option<u64>,
}

impl ButtonState {
    /// Create a debouncer with the firmware debounce window.
    pub const fn new() -> Self { Self::with_window(BUTTON_DEBOUNCE_MS) }

    pub const fn with_window(debounce_ms: u64) -> Self {
        Self {
            debounce_ms,
            last_accepted_ms: None,
        }
    }

    /// Returns true when the edge at `now_ms` is a real press.
    pub fn accept_edge(
        &mut self,
        now_ms: u64,
    ) -> bool {
        // Apply debounce: only accept if enough time has passed
        if let Some(last) = self.last_accepted_ms
            && now_ms.saturating_sub(last) < self.debounce_ms
        {
            return false;
        }

        self.last_accepted_ms = Some(now_ms);
        true
    }
}

impl Default for ButtonState {
    fn default() -> Self { Self::new() }
}

/// Load switch and audio module toggled together by the button.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(target_arch = "arm", derive(defmt::Format))]
pub struct LoadSwitch {
    /// MOSFET gate level. High = load powered.
    pub gate_high: bool,
}

impl LoadSwitch {
    /// Load starts powered.
    pub const fn new() -> Self { Self { gate_high: true } }

    /// Flip the gate. Returns the new level.
    pub fn toggle(&mut self) -> bool {
        self.gate_high = !self.gate_high;
        self.gate_high
    }
}

impl Default for LoadSwitch {
    fn default() -> Self { Self::new() }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_edge_accepted() {
        let mut button = ButtonState::new();
        assert!(button.accept_edge(0));
    }

    #[test]
    fn test_bounce_rejected() {
        let mut button = ButtonState::new();
        assert!(button.accept_edge(1_000));
        assert!(!button.accept_edge(1_002));
        assert!(!button.accept_edge(1_499));
        assert!(button.accept_edge(1_500));
    }

    #[test]
    fn test_rejected_edges_do_not_extend_window() {
        let mut button = ButtonState::with_window(50);
        assert!(button.accept_edge(0));
        assert!(!button.accept_edge(40));
        assert!(button.accept_edge(50));
    }

    #[test]
    fn test_load_switch_toggle() {
        let mut switch = LoadSwitch::new();
        assert!(switch.gate_high);
        assert!(!switch.toggle());
        assert!(switch.toggle());
    }
}
