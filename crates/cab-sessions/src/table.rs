use crate::DccAddress;
use motor_driver::{Direction, MotorDriver};
use serde::Serialize;

/// Bit 7 of a session id marks a consist session.
pub const CONSIST_SESSION_FLAG: u8 = 0x80;

pub fn is_consist_session(session: u8) -> bool {
    session & CONSIST_SESSION_FLAG != 0
}

/// A slot's membership of a consist. `address == 0` means no membership.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConsistMembership {
    pub address: u8,
    /// Consist session id once the consist is allocated, 0 otherwise.
    pub session: u8,
    /// This member runs reversed relative to the consist.
    pub reverse: bool,
}

impl ConsistMembership {
    pub fn is_member(&self) -> bool {
        self.address != 0
    }
}

/// One physical output channel, bound at startup to a single DCC address.
#[derive(Debug)]
pub struct ControllerSlot<M> {
    address: DccAddress,
    pub(crate) session: Option<u8>,
    pub(crate) timeout: u16,
    pub(crate) shared: bool,
    pub(crate) consist: ConsistMembership,
    pub(crate) motor: M,
}

impl<M> ControllerSlot<M> {
    pub fn new(address: DccAddress, motor: M) -> Self {
        Self {
            address,
            session: None,
            timeout: 0,
            shared: false,
            consist: ConsistMembership::default(),
            motor,
        }
    }

    pub fn address(&self) -> DccAddress {
        self.address
    }

    pub fn session(&self) -> Option<u8> {
        self.session
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn timeout(&self) -> u16 {
        self.timeout
    }

    pub fn is_shared(&self) -> bool {
        self.shared
    }

    pub fn consist(&self) -> ConsistMembership {
        self.consist
    }

    pub fn motor(&self) -> &M {
        &self.motor
    }

    pub fn motor_mut(&mut self) -> &mut M {
        &mut self.motor
    }

    /// The session currently steering this slot: its own lease, else an allocated consist.
    pub fn controlling_session(&self) -> Option<u8> {
        self.session
            .or((self.consist.session != 0).then_some(self.consist.session))
    }

    pub(crate) fn bind(&mut self, session: u8) {
        self.session = Some(session);
        self.timeout = 0;
        self.shared = false;
    }

    pub(crate) fn free(&mut self) {
        self.session = None;
        self.timeout = 0;
        self.shared = false;
    }
}

/// Read-only snapshot of a slot, for logs, tests and the CLI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotView {
    pub index: usize,
    pub address: DccAddress,
    pub session: Option<u8>,
    pub timeout: u16,
    pub shared: bool,
    pub consist: ConsistMembership,
    pub speed: u8,
    pub direction: Direction,
}

impl<M: MotorDriver> ControllerSlot<M> {
    pub fn view(&self, index: usize) -> SlotView {
        SlotView {
            index,
            address: self.address,
            session: self.session,
            timeout: self.timeout,
            shared: self.shared,
            consist: self.consist,
            speed: self.motor.speed(),
            direction: self.motor.direction(),
        }
    }
}

/// The fixed set of slots; sized once at construction and never grown.
#[derive(Debug)]
pub struct ControllerTable<M> {
    slots: Vec<ControllerSlot<M>>,
}

impl<M> ControllerTable<M> {
    pub fn new(slots: Vec<ControllerSlot<M>>) -> Self {
        Self { slots }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ControllerSlot<M>> {
        self.slots.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut ControllerSlot<M>> {
        self.slots.get_mut(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ControllerSlot<M>> {
        self.slots.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ControllerSlot<M>> {
        self.slots.iter_mut()
    }

    /// Slot holding `session`, if any.
    pub fn session_index(&self, session: u8) -> Option<usize> {
        self.slots.iter().position(|s| s.session == Some(session))
    }

    /// Slot bound to `address`, if any.
    pub fn dcc_index(&self, address: DccAddress) -> Option<usize> {
        self.slots.iter().position(|s| s.address == address)
    }

    pub fn session_in_use(&self, session: u8) -> bool {
        self.session_index(session).is_some()
    }

    pub fn active_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_active()).count()
    }
}
