use crate::opcode;
use crate::{DccAddress, ErrorCode};

/// Every frame shape the node emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    /// Session allocated (or re-announced) for a locomotive.
    Ploc {
        session: u8,
        address: DccAddress,
        speed: u8,
    },
    /// Consist session allocated; its id is the consist address with bit 7 set.
    ConsistPloc { address: u8 },
    AddressError { address: DccAddress, code: ErrorCode },
    SessionError { session: u8, code: ErrorCode },
    Reset,
    BusOn,
    EmergencyStop,
    Speed { session: u8, speed: u8 },
}

impl Reply {
    pub fn opcode(&self) -> u8 {
        match self {
            Reply::Ploc { .. } | Reply::ConsistPloc { .. } => opcode::PLOC,
            Reply::AddressError { .. } | Reply::SessionError { .. } => opcode::ERR,
            Reply::Reset => opcode::ARST,
            Reply::BusOn => opcode::BON,
            Reply::EmergencyStop => opcode::ESTOP,
            Reply::Speed { .. } => opcode::DSPD,
        }
    }

    /// Data bytes following the opcode.
    pub fn payload(&self) -> Vec<u8> {
        match *self {
            Reply::Ploc {
                session,
                address,
                speed,
            } => vec![session, address.hi(), address.lo(), speed, 0, 0, 0],
            Reply::ConsistPloc { address } => vec![address | 0x80, 0, address, 0, 0, 0, 0],
            Reply::AddressError { address, code } => vec![address.hi(), address.lo(), code.code()],
            Reply::SessionError { session, code } => vec![session, 0, code.code()],
            Reply::Reset | Reply::BusOn | Reply::EmergencyStop => Vec::new(),
            Reply::Speed { session, speed } => vec![session, speed],
        }
    }

    /// Broadcasts go out even while an upstream command station owns allocation.
    pub fn is_broadcast(&self) -> bool {
        matches!(self, Reply::Reset | Reply::BusOn | Reply::EmergencyStop)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(8);
        out.push(self.opcode());
        out.extend(self.payload());
        out
    }
}
