use core::fmt;
use serde::{Deserialize, Serialize};

/// Both top bits of the address high byte set: long address.
pub const LONG_ADDRESS_FLAGS: u8 = 0xC0;
pub const MAX_SHORT_ADDRESS: u16 = 127;
pub const MAX_LONG_ADDRESS: u16 = 10239;

/// A DCC locomotive address together with its length tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DccAddress {
    pub number: u16,
    pub long: bool,
}

impl DccAddress {
    pub fn short(number: u16) -> Self {
        Self {
            number,
            long: false,
        }
    }

    pub fn long(number: u16) -> Self {
        Self { number, long: true }
    }

    /// Decode the 14-bit address carried in a (high, low) byte pair.
    ///
    /// Returns `None` when only one of the two length bits is set.
    pub fn from_bytes(hi: u8, lo: u8) -> Option<Self> {
        let long = match hi & LONG_ADDRESS_FLAGS {
            0 => false,
            LONG_ADDRESS_FLAGS => true,
            _ => return None,
        };
        Some(Self {
            number: (u16::from(hi & 0x3F) << 8) | u16::from(lo),
            long,
        })
    }

    pub fn hi(&self) -> u8 {
        let flags = if self.long { LONG_ADDRESS_FLAGS } else { 0 };
        ((self.number >> 8) as u8 & 0x3F) | flags
    }

    pub fn lo(&self) -> u8 {
        (self.number & 0xFF) as u8
    }

    pub fn is_valid(&self) -> bool {
        if self.long {
            self.number <= MAX_LONG_ADDRESS
        } else {
            self.number <= MAX_SHORT_ADDRESS
        }
    }
}

impl fmt::Display for DccAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = if self.long { 'L' } else { 'S' };
        write!(f, "{tag}{}", self.number)
    }
}
