//! Status classification, the top-line narrative and the audio cue policy.
//!
//! What the user sees is a closed set of messages, so it is modelled as enums
//! and compared by value. Text is produced only at the edge, when a line has
//! to be drawn or logged.

use core::fmt::Write;

use heapless::String;

pub use crate::audio::AudioCue;
use crate::estimate::format_hours_hm;

/// Maximum length of a rendered narrative line.
pub const LINE_CAPACITY: usize = 48;

/// Rendered top-line text.
pub type LineText = String<LINE_CAPACITY>;

// =============================================================================
// Status
// =============================================================================

/// Battery status derived from SOC and the stable charging state.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
#[cfg_attr(target_arch = "arm", derive(defmt::Format))]
pub enum Status {
    #[default]
    None,
    Charging,
    Full,
    Low,
}

impl Status {
    /// First matching rule wins: charging below 100 %, charging at 100 %,
    /// at or below `low_soc_pct`, otherwise nothing to report.
    pub fn classify(
        soc: u8,
        charging: bool,
        low_soc_pct: u8,
    ) -> Self {
        if charging && soc < 100 {
            Self::Charging
        } else if charging && soc == 100 {
            Self::Full
        } else if soc <= low_soc_pct {
            Self::Low
        } else {
            Self::None
        }
    }

    /// Text shown in the status area.
    pub const fn message(self) -> &'static str {
        match self {
            Self::None => "",
            Self::Charging => "BATTERY CHARGING",
            Self::Full => "BATTERY FULL!",
            Self::Low => "BATTERY LOW PLEASE CHARGE",
        }
    }
}

// =============================================================================
// Narrative
// =============================================================================

/// Top-line message. Durations are whole minutes on the display grid.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
#[cfg_attr(target_arch = "arm", derive(defmt::Format))]
pub enum Narrative {
    #[default]
    Blank,
    LowBattery,
    ChargingTtf(u32),
    TimeLeft(u32),
    TimeLeftHistorical(u32),
    Status(Status),
}

impl Narrative {
    /// Status fallback; `Status::None` is a blank line.
    pub fn from_status(status: Status) -> Self {
        match status {
            Status::None => Self::Blank,
            other => Self::Status(other),
        }
    }

    /// Render the line as displayed.
    pub fn render(&self) -> LineText {
        let mut line = LineText::new();
        let duration = |minutes: u32| format_hours_hm(minutes as f32 / 60.0);
        // Every variant fits in LINE_CAPACITY
        let _ = match self {
            Self::Blank => Ok(()),
            Self::LowBattery => line.push_str(Status::Low.message()).map_err(|_| core::fmt::Error),
            Self::ChargingTtf(min) => write!(line, "BATTERY CHARGING - {} until full", duration(*min)),
            Self::TimeLeft(min) => write!(line, "Travel time left: {}", duration(*min)),
            Self::TimeLeftHistorical(min) => write!(line, "Travel time left (historical): {}", duration(*min)),
            Self::Status(status) => line.push_str(status.message()).map_err(|_| core::fmt::Error),
        };
        line
    }
}

// =============================================================================
// Display Line
// =============================================================================

/// Change detection for the top line. Only a changed value needs a redraw.
pub struct DisplayLine {
    current: Option<Narrative>,
    previous: Option<Narrative>,
}

impl DisplayLine {
    /// Starts blank, so a blank first narrative is not a change.
    pub const fn new() -> Self {
        Self {
            current: Some(Narrative::Blank),
            previous: None,
        }
    }

    /// Store `narrative`; true when it differs from what was last rendered.
    pub fn set(
        &mut self,
        narrative: Narrative,
    ) -> bool {
        if self.current == Some(narrative) {
            return false;
        }
        self.previous = self.current.replace(narrative);
        true
    }

    /// Forget what was rendered so the next `set` always reports a change.
    pub fn invalidate(&mut self) {
        self.previous = self.current.take();
    }

    #[inline]
    pub fn current(&self) -> Narrative { self.current.unwrap_or_default() }

    #[inline]
    pub fn previous(&self) -> Option<Narrative> { self.previous }
}

impl Default for DisplayLine {
    fn default() -> Self { Self::new() }
}

// =============================================================================
// Audio Policy
// =============================================================================

/// SOC values at which the low battery warning is spoken (plus every value
/// at or below the floor).
const LOW_CUE_STEPS: [u8; 2] = [20, 15];
const LOW_CUE_FLOOR: u8 = 10;

/// Decides which cue, if any, accompanies a status update.
pub struct AudioPolicy {
    low_soc_pct: u8,
    prev_soc: Option<u8>,
    prev_charging: Option<bool>,
    prev_status: Status,
    last_low_soc: Option<u8>,
}

impl AudioPolicy {
    pub const fn new(low_soc_pct: u8) -> Self {
        Self {
            low_soc_pct,
            prev_soc: None,
            prev_charging: None,
            prev_status: Status::None,
            last_low_soc: None,
        }
    }

    /// Evaluate one tick. At most one cue is returned.
    pub fn evaluate(
        &mut self,
        soc: u8,
        charging: bool,
        status: Status,
    ) -> AudioCue {
        let changed = self.prev_soc != Some(soc) || self.prev_charging != Some(charging);
        let prev_status = self.prev_status;

        self.prev_soc = Some(soc);
        self.prev_charging = Some(charging);
        self.prev_status = status;

        if soc > self.low_soc_pct {
            self.last_low_soc = None;
        }

        if changed {
            match status {
                Status::Full => return AudioCue::Full,
                Status::Low if !charging => {
                    let on_step = LOW_CUE_STEPS.contains(&soc) || soc <= LOW_CUE_FLOOR;
                    if on_step && self.last_low_soc != Some(soc) {
                        self.last_low_soc = Some(soc);
                        return AudioCue::Low;
                    }
                }
                Status::None if prev_status == Status::None => return AudioCue::Silence,
                _ => {}
            }
        }

        if status == Status::Charging && prev_status != Status::Charging {
            return AudioCue::Charging;
        }
        AudioCue::None
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
