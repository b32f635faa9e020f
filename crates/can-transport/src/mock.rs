use crate::{BusInfo, CanBus, CanFrame, Result, TransportError};
use std::collections::VecDeque;

/// A simple in-process mock bus. Each bus instance is independent.
///
/// Frames queued with [`MockBus::push_inbound`] are handed out by `recv` in order;
/// every frame passed to `send` is kept so tests can inspect what a node emitted.
#[derive(Debug, Default)]
pub struct MockBus {
    name: String,
    inbound: VecDeque<CanFrame>,
    sent: Vec<CanFrame>,
    fail_sends: bool,
}

impl MockBus {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn push_inbound(&mut self, frame: CanFrame) {
        self.inbound.push_back(frame);
    }

    pub fn pending(&self) -> usize {
        self.inbound.len()
    }

    pub fn sent(&self) -> &[CanFrame] {
        &self.sent
    }

    pub fn take_sent(&mut self) -> Vec<CanFrame> {
        std::mem::take(&mut self.sent)
    }

    /// Make every subsequent `send` fail, as a bus-off controller would.
    pub fn set_fail_sends(&mut self, fail: bool) {
        self.fail_sends = fail;
    }
}

impl CanBus for MockBus {
    fn open(name: &str) -> Result<Self> {
        Ok(Self {
            name: name.to_string(),
            ..Self::default()
        })
    }

    fn list() -> Result<Vec<BusInfo>> {
        Ok(vec![BusInfo {
            name: "mock0".to_string(),
            driver: "mock".to_string(),
        }])
    }

    fn recv(&mut self, _timeout_ms: Option<u64>) -> Result<CanFrame> {
        // Never blocks: an empty queue reads as an idle bus
        self.inbound
            .pop_front()
            .map(CanFrame::stamped)
            .ok_or(TransportError::Timeout)
    }

    fn send(&mut self, frame: &CanFrame) -> Result<()> {
        if self.fail_sends {
            return Err(TransportError::BusOff(self.name.clone()));
        }
        self.sent.push(frame.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CanId;

    #[test]
    fn recv_drains_inbound_then_times_out() -> anyhow::Result<()> {
        let mut bus = MockBus::open("mock0")?;
        let id = CanId::standard(0x5E4).ok_or(TransportError::InvalidFrame("id"))?;
        bus.push_inbound(CanFrame::new(id, &[0x23, 0x01]).ok_or(TransportError::InvalidFrame("len"))?);

        let frame = bus.recv(Some(10))?;
        assert_eq!(frame.payload(), &[0x23, 0x01]);
        assert!(frame.timestamp.is_some());
        assert!(bus.recv(Some(10)).is_err_and(|e| e.is_timeout()));
        Ok(())
    }

    #[test]
    fn sends_are_recorded_until_the_bus_fails() -> anyhow::Result<()> {
        let mut bus = MockBus::open("mock0")?;
        let id = CanId::cbus(crate::CBUS_DEFAULT_PRIORITY, 100).ok_or(TransportError::InvalidFrame("id"))?;
        bus.send_data(id, &[0x06])?;
        assert_eq!(bus.sent().len(), 1);

        bus.set_fail_sends(true);
        let err = bus.send_data(id, &[0x06]).err();
        assert!(matches!(err, Some(TransportError::BusOff(ref name)) if name == "mock0"));
        assert_eq!(bus.take_sent().len(), 1);
        assert!(bus.sent().is_empty());
        Ok(())
    }

    #[test]
    fn hardware_filters_are_unsupported() -> anyhow::Result<()> {
        let mut bus = MockBus::open("mock0")?;
        let id = CanId::standard(0x5E4).ok_or(TransportError::InvalidFrame("id"))?;
        let filter = crate::CanFilter { id, mask: 0x7F };
        assert!(matches!(
            bus.set_filters(&[filter]),
            Err(TransportError::Unsupported(_))
        ));
        Ok(())
    }
}
