use core::fmt;
use time::OffsetDateTime;

/// Default CBUS priority bits (major 0b10, minor 0b11) for ordinary traffic.
pub const CBUS_DEFAULT_PRIORITY: u8 = 0b1011;

/// 11-bit or 29-bit CAN identifier
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct CanId {
    raw: u32,
    extended: bool,
}

impl CanId {
    pub fn standard(id11: u16) -> Option<Self> {
        (id11 <= 0x7FF).then_some(Self {
            raw: u32::from(id11),
            extended: false,
        })
    }

    pub fn extended(id29: u32) -> Option<Self> {
        (id29 <= 0x1FFF_FFFF).then_some(Self {
            raw: id29,
            extended: true,
        })
    }

    /// CBUS header: 4 priority bits above the sender's 7-bit CANID.
    ///
    /// CANID 0 is reserved on CBUS and rejected along with anything above 127.
    pub fn cbus(priority: u8, can_id: u8) -> Option<Self> {
        if can_id == 0 || can_id > 0x7F || priority > 0x0F {
            return None;
        }
        Self::standard((u16::from(priority) << 7) | u16::from(can_id))
    }

    /// The sender CANID carried in a standard CBUS header.
    pub fn cbus_can_id(&self) -> Option<u8> {
        if self.extended {
            None
        } else {
            Some((self.raw & 0x7F) as u8)
        }
    }

    pub fn raw(&self) -> u32 {
        self.raw
    }

    pub fn is_extended(&self) -> bool {
        self.extended
    }
}

impl fmt::Display for CanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.extended {
            write!(f, "0x{raw:08X}", raw = self.raw)
        } else {
            write!(f, "0x{raw:03X}", raw = self.raw)
        }
    }
}

/// A classic CAN data frame (8 data bytes max)
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CanFrame {
    pub id: CanId,
    pub len: u8,
    pub data: [u8; 8],
    pub rtr: bool,
    pub timestamp: Option<Timestamp>,
}

impl CanFrame {
    pub fn new(id: CanId, data: &[u8]) -> Option<Self> {
        if data.len() > 8 {
            return None;
        }
        let mut buf = [0u8; 8];
        buf[..data.len()].copy_from_slice(data);
        Some(Self {
            id,
            len: data.len() as u8,
            data: buf,
            rtr: false,
            timestamp: None,
        })
    }

    /// The valid bytes of the frame.
    pub fn payload(&self) -> &[u8] {
        let len = usize::from(self.len.min(8));
        &self.data[..len]
    }

    /// Stamp the frame with the current wall-clock time.
    pub fn stamped(mut self) -> Self {
        self.timestamp = Some(Timestamp(OffsetDateTime::now_utc()));
        self
    }
}

impl fmt::Display for CanFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.id, self.len)?;
        for b in self.payload() {
            write!(f, " {b:02X}")?;
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CanFilter {
    pub id: CanId,
    pub mask: u32,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Timestamp(pub OffsetDateTime);

#[derive(Clone, Debug)]
pub struct BusInfo {
    pub name: String,
    pub driver: String,
}
