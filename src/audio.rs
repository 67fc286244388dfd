//! Audio cues for the DY-SV8F sound module.
//!
//! The module is driven in I/O trigger mode through three lines, IO0..IO2.
//! All lines idle high; pulling a combination low for a few milliseconds
//! plays the matching track. Holding IO2 low alone plays a silent track, which
//! is also used to park the module when audio is switched off.

/// Levels of the three trigger lines. `true` = high.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(target_arch = "arm", derive(defmt::Format))]
pub struct PinLevels {
    pub io0: bool,
    pub io1: bool,
    pub io2: bool,
}

impl PinLevels {
    /// All lines released.
    pub const IDLE: Self = Self::new(true, true, true);

    /// Silent track, held while muted.
    pub const SILENT: Self = Self::new(true, true, false);

    pub const fn new(
        io0: bool,
        io1: bool,
        io2: bool,
    ) -> Self {
        Self { io0, io1, io2 }
    }

    /// Levels as an array in IO0, IO1, IO2 order.
    #[inline]
    pub const fn as_array(&self) -> [bool; 3] { [self.io0, self.io1, self.io2] }
}

/// Track to play on this tick.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
#[cfg_attr(target_arch = "arm", derive(defmt::Format))]
pub enum AudioCue {
    #[default]
    None,
    /// "Charging"
    Charging,
    /// Jingle and "Battery full, charging complete"
    Full,
    /// "Battery low, please charge"
    Low,
    /// Silent track
    Silence,
}

impl AudioCue {
    /// Trigger levels for this cue, `None` when nothing should play.
    pub const fn pin_levels(self) -> Option<PinLevels> {
        match self {
            Self::None => None,
            Self::Charging => Some(PinLevels::new(true, false, true)),
            Self::Full => Some(PinLevels::new(false, false, true)),
            Self::Low => Some(PinLevels::new(false, true, true)),
            Self::Silence => Some(PinLevels::SILENT),
        }
    }
}

// =============================================================================
// Mute Gate
// =============================================================================

/// Tracks whether the audio module is switched on (toggled by the button).
pub struct AudioGate {
    enabled: bool,
}

impl AudioGate {
    /// Audio starts switched on.
    pub const fn new() -> Self { Self { enabled: true } }

    /// Flip the mute state. Returns true when audio is now on.
    pub fn toggle(&mut self) -> bool {
        self.enabled = !self.enabled;
        self.enabled
    }

    #[inline]
    pub fn is_enabled(&self) -> bool { self.enabled }

    /// Pulse levels for `cue`, or `None` when muted or nothing to play.
    pub fn pulse(
        &self,
        cue: AudioCue,
    ) -> Option<PinLevels> {
        if !self.enabled {
            return None;
        }
        cue.pin_levels()
    }

    /// Levels to hold between pulses.
    pub fn rest_levels(&self) -> PinLevels {
        if self.enabled { PinLevels::IDLE } else { PinLevels::SILENT }
    }
}

impl Default for AudioGate {
    fn default() -> Self { Self::new() }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cue_levels() {
        assert_eq!(AudioCue::None.pin_levels(), None);
        assert_eq!(AudioCue::Charging.pin_levels().unwrap().as_array(), [true, false, true]);
        assert_eq!(AudioCue::Full.pin_levels().unwrap().as_array(), [false, false, true]);
        assert_eq!(AudioCue::Low.pin_levels().unwrap().as_array(), [false, true, true]);
        assert_eq!(AudioCue::Silence.pin_levels().unwrap().as_array(), [true, true, false]);
    }

    #[test]
    fn test_every_cue_differs_from_idle() {
        for cue in [AudioCue::Charging, AudioCue::Full, AudioCue::Low, AudioCue::Silence] {
            assert_ne!(cue.pin_levels(), Some(PinLevels::IDLE));
        }
    }

    #[test]
    fn test_gate_mutes() {
        let mut gate = AudioGate::new();
        assert!(gate.is_enabled());
        assert_eq!(gate.pulse(AudioCue::Low), AudioCue::Low.pin_levels());
        assert_eq!(gate.rest_levels(), PinLevels::IDLE);

        assert!(!gate.toggle());
        assert_eq!(gate.pulse(AudioCue::Low), None);
        assert_eq!(gate.rest_levels(), PinLevels::SILENT);

        assert!(gate.toggle());
        assert_eq!(gate.pulse(AudioCue::None), None);
    }
}
