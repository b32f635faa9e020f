//! CBUS opcodes used by the session layer.
//!
//! The top three bits of a CBUS opcode give the number of data bytes that follow it.

pub const BON: u8 = 0x03;
pub const ESTOP: u8 = 0x06;
pub const ARST: u8 = 0x07;
pub const RTOF: u8 = 0x08;
pub const RTON: u8 = 0x09;
pub const RESTP: u8 = 0x0A;
pub const KLOC: u8 = 0x21;
pub const QLOC: u8 = 0x22;
pub const DKEEP: u8 = 0x23;
pub const RLOC: u8 = 0x40;
pub const QCON: u8 = 0x41;
pub const STMOD: u8 = 0x44;
pub const PCON: u8 = 0x45;
pub const KCON: u8 = 0x46;
pub const DSPD: u8 = 0x47;
pub const GLOC: u8 = 0x61;
pub const ERR: u8 = 0x63;
pub const ACON: u8 = 0x90;
pub const ACOF: u8 = 0x91;
pub const ARON: u8 = 0x93;
pub const AROF: u8 = 0x94;
pub const ASON: u8 = 0x98;
pub const ASOF: u8 = 0x99;
pub const ARSON: u8 = 0x9D;
pub const ARSOF: u8 = 0x9E;
pub const PLOC: u8 = 0xE1;

/// Number of data bytes a frame with this opcode carries.
pub fn data_len(opcode: u8) -> usize {
    usize::from(opcode >> 5)
}

/// Mnemonic for logs; opcodes this crate does not know are reported as `"?"`.
pub fn mnemonic(opcode: u8) -> &'static str {
    match opcode {
        BON => "BON",
        ESTOP => "ESTOP",
        ARST => "ARST",
        RTOF => "RTOF",
        RTON => "RTON",
        RESTP => "RESTP",
        KLOC => "KLOC",
        QLOC => "QLOC",
        DKEEP => "DKEEP",
        RLOC => "RLOC",
        QCON => "QCON",
        STMOD => "STMOD",
        PCON => "PCON",
        KCON => "KCON",
        DSPD => "DSPD",
        GLOC => "GLOC",
        ERR => "ERR",
        ACON => "ACON",
        ACOF => "ACOF",
        ARON => "ARON",
        AROF => "AROF",
        ASON => "ASON",
        ASOF => "ASOF",
        ARSON => "ARSON",
        ARSOF => "ARSOF",
        PLOC => "PLOC",
        _ => "?",
    }
}
