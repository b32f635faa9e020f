use core::fmt;
use serde::{Deserialize, Serialize};

/// Largest speed magnitude carried in a 7-bit speed byte.
pub const MAX_SPEED: u8 = 0x7F;

/// Increment applied per `match_to_targets` call.
pub const SPEED_STEP: u8 = 15;

/// Direction of travel. On the wire, bit 7 of a speed byte set means forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Reverse,
    #[default]
    Forward,
}

impl Direction {
    pub fn from_bit(forward: bool) -> Self {
        if forward {
            Direction::Forward
        } else {
            Direction::Reverse
        }
    }

    pub fn is_forward(self) -> bool {
        self == Direction::Forward
    }

    pub fn flipped(self) -> Self {
        Self::from_bit(!self.is_forward())
    }

    /// Pack a magnitude and this direction into a speed/direction byte.
    pub fn speed_byte(self, speed: u8) -> u8 {
        (speed & MAX_SPEED) | if self.is_forward() { 0x80 } else { 0 }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Forward => f.write_str("forward"),
            Direction::Reverse => f.write_str("reverse"),
        }
    }
}
