//! BMS samples and the 16-byte link frame they travel in.
//!
//! The battery box sends one frame per BMS poll over the peer-to-peer radio.
//! Layout (little endian, C struct alignment):
//!
//! | Offset | Size | Field                      |
//! |--------|------|----------------------------|
//! | 0      | 1    | `valid` (0 or 1)           |
//! | 1      | 3    | padding                    |
//! | 4      | 4    | `soc_pct` (f32)            |
//! | 8      | 4    | `current_a` (f32)          |
//! | 12     | 4    | `remaining_mah` (f32)      |

use core::fmt;

#[cfg(not(test))]
use micromath::F32Ext;

/// Size of an encoded link frame in bytes.
pub const FRAME_LEN: usize = 16;

/// One reading from the BMS.
#[derive(Clone, Copy, PartialEq, Debug)]
#[cfg_attr(target_arch = "arm", derive(defmt::Format))]
pub struct Sample {
    /// Pack current in amps. Positive while charging, negative while discharging.
    pub current_a: f32,
    /// State of charge, 0..=100 %.
    pub soc_pct: f32,
    /// Remaining capacity in mAh, never negative.
    pub remaining_mah: f32,
    /// False when the BMS read failed. The other fields are then meaningless.
    pub valid: bool,
}

impl Sample {
    /// A valid sample. Negative or NaN remaining capacity is clamped to 0.
    pub fn new(
        current_a: f32,
        soc_pct: f32,
        remaining_mah: f32,
    ) -> Self {
        Self {
            current_a,
            soc_pct,
            remaining_mah: if remaining_mah >= 0.0 { remaining_mah } else { 0.0 },
            valid: true,
        }
    }

    /// A failed read.
    pub const fn invalid() -> Self {
        Self {
            current_a: 0.0,
            soc_pct: 0.0,
            remaining_mah: 0.0,
            valid: false,
        }
    }

    /// Whole-percent SOC as displayed: rounded up, then clamped to 0..=100.
    pub fn soc_int(&self) -> u8 {
        if !self.soc_pct.is_finite() {
            return 0;
        }
        self.soc_pct.ceil().clamp(0.0, 100.0) as u8
    }

    /// Decode a link frame.
    ///
    /// A flag byte other than 0 or 1, or non-zero padding, means the reader is
    /// off a frame boundary and is an error. A well-formed frame whose fields
    /// are non-finite or out of range decodes as an invalid sample: the link
    /// itself worked, the BMS reading did not.
    pub fn from_frame(bytes: &[u8]) -> Result<Self, FrameError> {
        let bytes: &[u8; FRAME_LEN] = bytes.try_into().map_err(|_| FrameError::WrongLength(bytes.len()))?;
        if bytes[0] > 1 || bytes[1..4] != [0; 3] {
            return Err(FrameError::Misaligned);
        }

        let field = |offset: usize| f32::from_le_bytes([bytes[offset], bytes[offset + 1], bytes[offset + 2], bytes[offset + 3]]);
        let soc_pct = field(4);
        let current_a = field(8);
        let remaining_mah = field(12);

        let plausible = current_a.is_finite()
            && (0.0..=100.0).contains(&soc_pct)
            && (0.0..=f32::MAX).contains(&remaining_mah);
        if bytes[0] == 0 || !plausible {
            return Ok(Self::invalid());
        }

        Ok(Self::new(current_a, soc_pct, remaining_mah))
    }

    /// Encode as a link frame. Padding bytes are zero.
    pub fn to_frame(&self) -> [u8; FRAME_LEN] {
        let mut frame = [0u8; FRAME_LEN];
        frame[0] = u8::from(self.valid);
        frame[4..8].copy_from_slice(&self.soc_pct.to_le_bytes());
        frame[8..12].copy_from_slice(&self.current_a.to_le_bytes());
        frame[12..16].copy_from_slice(&self.remaining_mah.to_le_bytes());
        frame
    }
}

/// Link frame decode errors.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(target_arch = "arm", derive(defmt::Format))]
pub enum FrameError {
    /// Received length differs from [`FRAME_LEN`].
    WrongLength(usize),
    /// Flag byte or padding is corrupt, so the frame boundary was lost.
    Misaligned,
}

impl fmt::Display for FrameError {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            Self::WrongLength(len) => write!(f, "link frame is {len} bytes, expected {FRAME_LEN}"),
            Self::Misaligned => write!(f, "link frame flag or padding is corrupt"),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
