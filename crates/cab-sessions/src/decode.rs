use crate::opcode;
use crate::{DccAddress, DecodeError};
use serde::Serialize;

/// A session-relevant command decoded from one bus frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    SystemReset,
    TrackOff,
    TrackOn,
    Release { session: u8 },
    Query { session: u8 },
    Keepalive { session: u8 },
    /// RLOC: plain session request.
    Request { address: DccAddress },
    /// GLOC: request with steal/share flags.
    GetLoco { address: DccAddress, flags: u8 },
    /// PLOC seen on the bus, i.e. some other node allocated a session.
    Allocated {
        session: u8,
        address: DccAddress,
        speed: u8,
    },
    QueryConsist { address: u8, index: u8 },
    SpeedStepMode { session: u8, mode: u8 },
    ConsistAdd { session: u8, consist: u8 },
    ConsistRemove { session: u8, consist: u8 },
    Speed { session: u8, speed: u8 },
    EmergencyStopAll,
    /// Accessory events and accessory responses; diagnostic only.
    Accessory { opcode: u8, node: u16, event: u16 },
}

/// Decode a raw CBUS frame (opcode byte first).
///
/// `Ok(None)` means the opcode is not one the session layer acts on.
pub fn decode(frame: &[u8]) -> Result<Option<Command>, DecodeError> {
    let (&op, data) = frame.split_first().ok_or(DecodeError::Empty)?;
    if !is_handled(op) {
        return Ok(None);
    }
    let needed = opcode::data_len(op);
    if data.len() < needed {
        return Err(DecodeError::Truncated {
            opcode: opcode::mnemonic(op),
            needed,
            got: data.len(),
        });
    }
    let address = |hi: u8, lo: u8| DccAddress::from_bytes(hi, lo).ok_or(DecodeError::AddressFlags(hi));
    let word = |hi: u8, lo: u8| (u16::from(hi) << 8) | u16::from(lo);

    let command = match op {
        opcode::ARST => Command::SystemReset,
        opcode::RTOF => Command::TrackOff,
        opcode::RTON => Command::TrackOn,
        opcode::RESTP => Command::EmergencyStopAll,
        opcode::KLOC => Command::Release { session: data[0] },
        opcode::QLOC => Command::Query { session: data[0] },
        opcode::DKEEP => Command::Keepalive { session: data[0] },
        opcode::RLOC => Command::Request {
            address: address(data[0], data[1])?,
        },
        opcode::QCON => Command::QueryConsist {
            address: data[0],
            index: data[1],
        },
        opcode::STMOD => Command::SpeedStepMode {
            session: data[0],
            mode: data[1],
        },
        opcode::PCON => Command::ConsistAdd {
            session: data[0],
            consist: data[1],
        },
        opcode::KCON => Command::ConsistRemove {
            session: data[0],
            consist: data[1],
        },
        opcode::DSPD => Command::Speed {
            session: data[0],
            speed: data[1],
        },
        opcode::GLOC => Command::GetLoco {
            address: address(data[0], data[1])?,
            flags: data[2],
        },
        opcode::PLOC => Command::Allocated {
            session: data[0],
            address: address(data[1], data[2])?,
            speed: data[3],
        },
        _ => Command::Accessory {
            opcode: op,
            node: word(data[0], data[1]),
            event: word(data[2], data[3]),
        },
    };
    Ok(Some(command))
}

fn is_handled(op: u8) -> bool {
    matches!(
        op,
        opcode::ARST
            | opcode::RTOF
            | opcode::RTON
            | opcode::RESTP
            | opcode::KLOC
            | opcode::QLOC
            | opcode::DKEEP
            | opcode::RLOC
            | opcode::QCON
            | opcode::STMOD
            | opcode::PCON
            | opcode::KCON
            | opcode::DSPD
            | opcode::GLOC
            | opcode::PLOC
            | opcode::ACON
            | opcode::ACOF
            | opcode::ASON
            | opcode::ASOF
            | opcode::ARON
            | opcode::AROF
            | opcode::ARSON
            | opcode::ARSOF
    )
}
