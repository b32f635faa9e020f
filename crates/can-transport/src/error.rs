use thiserror::Error;

pub type Result<T, E = TransportError> = core::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum TransportError {
    /// Opening or enumerating a serial adapter failed.
    #[error("serial adapter: {0}")]
    Serial(String),
    #[error("bus I/O: {0}")]
    Io(#[from] std::io::Error),
    /// The controller refuses to transmit (error-passive/bus-off, or a failing mock).
    #[error("{0}: bus off")]
    BusOff(String),
    #[error("{0} not supported by this backend")]
    Unsupported(&'static str),
    #[error("no frame before the receive timeout")]
    Timeout,
    #[error("malformed frame: {0}")]
    InvalidFrame(&'static str),
}

impl TransportError {
    /// True for the "nothing arrived in time" case, which polling loops treat as idle.
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Timeout)
    }
}
