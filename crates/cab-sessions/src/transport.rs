use crate::ConfigError;
use can_transport::{CanBus, CanId, CBUS_DEFAULT_PRIORITY};

/// Outgoing side of the bus as the session layer sees it.
pub trait BusTransport {
    /// Queue one frame. Fire-and-forget: `false` means it was not sent and will not be retried.
    fn send(&mut self, opcode: u8, payload: &[u8]) -> bool;
}

/// Sends CBUS frames on a [`CanBus`] under this node's CANID.
pub struct CanBusTransport<B> {
    bus: B,
    id: CanId,
}

impl<B: CanBus> CanBusTransport<B> {
    pub fn new(bus: B, can_id: u8) -> Result<Self, ConfigError> {
        let id = CanId::cbus(CBUS_DEFAULT_PRIORITY, can_id).ok_or(ConfigError::InvalidCanId(can_id))?;
        Ok(Self { bus, id })
    }

    pub fn id(&self) -> CanId {
        self.id
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    pub fn into_inner(self) -> B {
        self.bus
    }
}

impl<B: CanBus> BusTransport for CanBusTransport<B> {
    fn send(&mut self, opcode: u8, payload: &[u8]) -> bool {
        let mut data = Vec::with_capacity(1 + payload.len());
        data.push(opcode);
        data.extend_from_slice(payload);
        match self.bus.send_data(self.id, &data) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(opcode = crate::opcode::mnemonic(opcode), error = %e, "bus send failed");
                false
            }
        }
    }
}
