use crate::{BusInfo, CanFilter, CanFrame, CanId, Result, TransportError};

/// A minimal blocking CAN bus interface.
pub trait CanBus {
    /// Open a CAN interface by name (e.g., "mock0", "/dev/ttyACM0").
    fn open(name: &str) -> Result<Self>
    where
        Self: Sized;

    /// Attempt to list available interfaces for this backend.
    fn list() -> Result<Vec<BusInfo>>;

    /// Set acceptance filters if supported.
    fn set_filters(&mut self, _filters: &[CanFilter]) -> Result<()> {
        let _ = _filters;
        Err(TransportError::Unsupported("acceptance filtering"))
    }

    /// Receive one frame, waiting at most `timeout_ms` when given.
    ///
    /// Returns [`TransportError::Timeout`] when nothing arrived in time.
    fn recv(&mut self, timeout_ms: Option<u64>) -> Result<CanFrame>;

    /// Send one frame.
    fn send(&mut self, frame: &CanFrame) -> Result<()>;

    /// Build a data frame for `id` and send it.
    fn send_data(&mut self, id: CanId, data: &[u8]) -> Result<()> {
        let frame = CanFrame::new(id, data).ok_or(TransportError::InvalidFrame("len > 8"))?;
        self.send(&frame)
    }
}
