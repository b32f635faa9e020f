use core::fmt;
use serde::Serialize;
use thiserror::Error;

/// Error codes carried in the last byte of an ERR frame. Zero is the blank code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ErrorCode {
    Blank = 0,
    NoError,
    EmergencyStop,
    CanBusError,
    LocoStackFull,
    LocoTaken,
    NoSession,
    ConsistEmpty,
    LocoNotFound,
    InvalidRequest,
    SessionCancelled,
    MotorOverload,
    InvalidError,
}

impl ErrorCode {
    const ALL: [ErrorCode; 13] = [
        ErrorCode::Blank,
        ErrorCode::NoError,
        ErrorCode::EmergencyStop,
        ErrorCode::CanBusError,
        ErrorCode::LocoStackFull,
        ErrorCode::LocoTaken,
        ErrorCode::NoSession,
        ErrorCode::ConsistEmpty,
        ErrorCode::LocoNotFound,
        ErrorCode::InvalidRequest,
        ErrorCode::SessionCancelled,
        ErrorCode::MotorOverload,
        ErrorCode::InvalidError,
    ];

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(usize::from(code)).copied()
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ErrorCode::Blank => "blank",
            ErrorCode::NoError => "no error",
            ErrorCode::EmergencyStop => "emergency stop",
            ErrorCode::CanBusError => "CAN bus error",
            ErrorCode::LocoStackFull => "loco stack full",
            ErrorCode::LocoTaken => "loco taken",
            ErrorCode::NoSession => "no session",
            ErrorCode::ConsistEmpty => "consist empty",
            ErrorCode::LocoNotFound => "loco not found",
            ErrorCode::InvalidRequest => "invalid request",
            ErrorCode::SessionCancelled => "session cancelled",
            ErrorCode::MotorOverload => "motor overload",
            ErrorCode::InvalidError => "invalid error",
        };
        f.write_str(text)
    }
}

/// A received frame that could not be turned into a command.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("empty frame")]
    Empty,
    #[error("{opcode} frame too short: need {needed} data bytes, got {got}")]
    Truncated {
        opcode: &'static str,
        needed: usize,
        got: usize,
    },
    #[error("address high byte 0x{0:02X} has only one length bit set")]
    AddressFlags(u8),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("no controllers configured")]
    NoControllers,
    #[error("{0} controllers configured; at most 127 sessions can be addressed")]
    TooManyControllers(usize),
    #[error("address {0} is out of range for its length")]
    AddressOutOfRange(crate::DccAddress),
    #[error("address {0} is bound to more than one controller")]
    DuplicateAddress(crate::DccAddress),
    #[error("CANID {0} is outside 1..=127")]
    InvalidCanId(u8),
    #[error("timeout of {0} ticks can never be exceeded")]
    TimeoutUnreachable(u16),
}
