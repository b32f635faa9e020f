use crate::metrics::SessionMetrics;
use crate::table::{is_consist_session, ControllerSlot, ControllerTable, SlotView};
use crate::{
    BusTransport, ConfigError, DccAddress, ErrorCode, NodeConfig, Reply, SessionAllocator,
};
use motor_driver::{Direction, MotorDriver, MAX_SPEED};
use tracing::{debug, info, trace, warn};

/// Speed magnitude that means "emergency stop" rather than a crawl.
pub const EMERGENCY_STOP_SPEED: u8 = 1;

/// What a CAB asks for when the requested loco is already leased.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMode {
    Plain,
    Steal,
    Share,
}

impl RequestMode {
    pub fn from_flags(flags: u8) -> Option<Self> {
        match flags {
            0 => Some(RequestMode::Plain),
            1 => Some(RequestMode::Steal),
            2 => Some(RequestMode::Share),
            _ => None,
        }
    }
}

/// Owns the controller table and leases its slots to CABs on the bus.
///
/// One instance per node, built from a validated [`NodeConfig`]. Frames arrive through
/// [`SessionManager::handle`]; replies leave through the injected [`BusTransport`]; each
/// slot drives its own [`MotorDriver`].
pub struct SessionManager<T, M> {
    pub(crate) table: ControllerTable<M>,
    transport: T,
    allocator: Box<dyn SessionAllocator>,
    upstream_present: bool,
    device_address: u8,
    timeout_ticks: u16,
    mirror_upstream: bool,
    pub(crate) metrics: Option<SessionMetrics>,
}

impl<T: BusTransport, M: MotorDriver> SessionManager<T, M> {
    pub fn new(
        config: &NodeConfig,
        transport: T,
        mut make_motor: impl FnMut(usize, DccAddress) -> M,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let slots = config
            .addresses()
            .enumerate()
            .map(|(i, address)| ControllerSlot::new(address, make_motor(i, address)))
            .collect();
        Ok(Self {
            table: ControllerTable::new(slots),
            transport,
            allocator: config.session_ids.allocator(),
            upstream_present: false,
            device_address: config.device_address,
            timeout_ticks: config.timeout_ticks,
            mirror_upstream: config.mirror_upstream,
            metrics: None,
        })
    }

    pub fn with_metrics(mut self, metrics: SessionMetrics) -> Self {
        metrics.active_sessions.set(self.table.active_count() as i64);
        self.metrics = Some(metrics);
        self
    }

    pub fn with_allocator(mut self, allocator: Box<dyn SessionAllocator>) -> Self {
        self.allocator = allocator;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn slot(&self, index: usize) -> Option<&ControllerSlot<M>> {
        self.table.get(index)
    }

    pub fn slot_count(&self) -> usize {
        self.table.len()
    }

    pub fn slots(&self) -> Vec<SlotView> {
        self.table
            .iter()
            .enumerate()
            .map(|(i, slot)| slot.view(i))
            .collect()
    }

    pub fn is_standalone(&self) -> bool {
        !self.upstream_present
    }

    pub fn upstream_present(&self) -> bool {
        self.upstream_present
    }

    pub fn is_first_device(&self) -> bool {
        self.device_address == 0
    }

    pub fn session_index(&self, session: u8) -> Option<usize> {
        self.table.session_index(session)
    }

    pub fn dcc_index(&self, address: DccAddress) -> Option<usize> {
        self.table.dcc_index(address)
    }

    /// A CAB asks for `address`. Only answered when no upstream command station is present.
    pub fn loco_request(&mut self, address: DccAddress, flags: u8) {
        if !self.is_standalone() {
            trace!(%address, "loco request left to upstream command station");
            return;
        }
        let Some(index) = self.dcc_index(address) else {
            debug!(%address, "loco request for unbound address");
            self.emit(Reply::AddressError {
                address,
                code: ErrorCode::InvalidRequest,
            });
            return;
        };
        let Some(current) = self.table.get(index).and_then(ControllerSlot::session) else {
            self.allocate(index);
            return;
        };
        match RequestMode::from_flags(flags) {
            Some(RequestMode::Plain) => {
                debug!(%address, session = current, "loco already leased");
                self.emit(Reply::AddressError {
                    address,
                    code: ErrorCode::LocoTaken,
                });
            }
            Some(RequestMode::Steal) => {
                info!(%address, session = current, "session stolen");
                self.emit(Reply::SessionError {
                    session: current,
                    code: ErrorCode::SessionCancelled,
                });
                if let Some(slot) = self.table.get_mut(index) {
                    slot.free();
                }
                if let Some(m) = &self.metrics {
                    m.sessions_stolen.inc();
                }
                self.allocate(index);
            }
            Some(RequestMode::Share) => {
                info!(%address, session = current, "session shared");
                if let Some(slot) = self.table.get_mut(index) {
                    slot.shared = true;
                }
                self.send_ploc(index);
            }
            None => {
                debug!(%address, flags, "unknown request flags");
                self.emit(Reply::AddressError {
                    address,
                    code: ErrorCode::InvalidRequest,
                });
            }
        }
    }

    /// Lease a free slot under a fresh id and announce it.
    fn allocate(&mut self, index: usize) {
        let table = &self.table;
        let session = self
            .allocator
            .allocate(index, &|s| table.session_in_use(s));
        let Some(slot) = self.table.get_mut(index) else {
            return;
        };
        let address = slot.address();
        let Some(session) = session else {
            warn!(%address, allocator = self.allocator.name(), "no session id available");
            self.emit(Reply::AddressError {
                address,
                code: ErrorCode::LocoStackFull,
            });
            return;
        };
        slot.bind(session);
        slot.motor.set_speed_and_direction(Direction::Forward, 0);
        info!(%address, session, slot = index, "session allocated");
        if let Some(m) = &self.metrics {
            m.sessions_allocated.inc();
        }
        self.note_active();
        self.send_ploc(index);
    }

    /// Drop a lease. Unknown sessions are ignored; they may already have timed out.
    pub fn release_loco(&mut self, session: u8) {
        let Some(index) = self.session_index(session) else {
            trace!(session, "release for unknown session");
            return;
        };
        if let Some(slot) = self.table.get_mut(index) {
            slot.free();
            info!(session, address = %slot.address(), "session released");
        }
        self.note_active();
    }

    pub fn query_loco(&mut self, session: u8) {
        if !self.is_standalone() {
            return;
        }
        match self.session_index(session) {
            Some(index) => self.send_ploc(index),
            None => {
                self.emit(Reply::SessionError {
                    session,
                    code: ErrorCode::NoSession,
                });
            }
        }
    }

    pub fn keepalive_session(&mut self, session: u8) {
        if let Some(slot) = self
            .session_index(session)
            .and_then(|i| self.table.get_mut(i))
        {
            slot.timeout = 0;
        }
    }

    /// Age every driven slot, whether leased directly or through an allocated consist.
    pub fn increment_timeout_counters(&mut self) {
        for slot in self
            .table
            .iter_mut()
            .filter(|s| s.controlling_session().is_some())
        {
            slot.timeout = slot.timeout.saturating_add(1);
        }
    }

    /// Evict leases whose counter passed the threshold; with `apply_now`, step every motor
    /// one increment toward its target.
    pub fn update_processing(&mut self, apply_now: bool) {
        self.expire_consists(self.timeout_ticks);
        for index in 0..self.table.len() {
            let Some(slot) = self.table.get_mut(index) else {
                continue;
            };
            if let Some(session) = slot.session {
                if slot.timeout > self.timeout_ticks {
                    warn!(
                        session,
                        address = %slot.address(),
                        ticks = slot.timeout,
                        "session timed out"
                    );
                    slot.motor.set_speed(0);
                    self.release_loco(session);
                    self.emit(Reply::SessionError {
                        session,
                        code: ErrorCode::SessionCancelled,
                    });
                    if let Some(m) = &self.metrics {
                        m.sessions_evicted.inc();
                    }
                }
            }
            // Free slots too: a just-evicted loco still has to ramp down to its zero target
            if apply_now {
                if let Some(slot) = self.table.get_mut(index) {
                    slot.motor.match_to_targets();
                }
            }
        }
    }

    /// Periodic hook: age every lease, then sweep.
    pub fn tick(&mut self, apply_now: bool) {
        self.increment_timeout_counters();
        self.update_processing(apply_now);
    }

    /// Apply a wire speed byte to one slot. `reverse` flips the direction bit.
    pub fn set_speed_and_direction(&mut self, index: usize, requested_speed: u8, reverse: bool) {
        let Some(slot) = self.table.get_mut(index) else {
            return;
        };
        let magnitude = requested_speed & MAX_SPEED;
        if magnitude == EMERGENCY_STOP_SPEED {
            debug!(slot = index, "emergency stop requested");
            slot.motor.emergency_stop();
        } else {
            let forward = (requested_speed & 0x80 != 0) ^ reverse;
            let direction = Direction::from_bit(forward);
            debug!(slot = index, speed = magnitude, %direction, "setting speed");
            slot.motor.set_speed_and_direction(direction, magnitude);
        }
    }

    /// A speed frame for `session`, which may name a loco lease or an allocated consist.
    pub fn apply_speed(&mut self, session: u8, requested_speed: u8) {
        if is_consist_session(session) {
            self.apply_consist_speed(session, requested_speed);
            return;
        }
        let Some(index) = self.session_index(session) else {
            trace!(session, "speed for unknown session");
            return;
        };
        self.set_speed_and_direction(index, requested_speed, false);
        self.send_speed(index);
    }

    /// Stop every driven slot. Each controlling session gets one speed echo.
    pub fn stop_all(&mut self, emergency: bool) {
        info!(emergency, "stopping all controllers");
        let mut echoed = Vec::new();
        for index in 0..self.table.len() {
            let Some(slot) = self.table.get_mut(index) else {
                continue;
            };
            let Some(session) = slot.controlling_session() else {
                continue;
            };
            if emergency {
                slot.motor.emergency_stop();
            } else {
                slot.motor.set_speed(0);
            }
            if !echoed.contains(&session) {
                echoed.push(session);
                self.send_speed(index);
            }
        }
    }

    /// Emergency-stop every driven slot and broadcast one ESTOP.
    pub fn emergency_stop_all(&mut self) {
        warn!("emergency stop all");
        for slot in self.table.iter_mut() {
            if slot.controlling_session().is_some() {
                slot.motor.emergency_stop();
            }
        }
        self.emit(Reply::EmergencyStop);
    }

    /// Power-up announcement: one reset per slot, then bus on.
    pub fn announce_reset(&mut self) {
        for _ in 0..self.table.len() {
            self.emit(Reply::Reset);
        }
        self.emit(Reply::BusOn);
    }

    /// Another node announced a session. Consist announcements come from sibling DC
    /// nodes, so only loco announcements mark an upstream command station.
    pub fn upstream_allocated(&mut self, session: u8, address: DccAddress, speed: u8) {
        if is_consist_session(session) {
            trace!(session, "consist allocation from a peer node");
            return;
        }
        if !self.upstream_present {
            info!(session, %address, "upstream command station detected; deferring allocation");
            self.upstream_present = true;
        }
        if !self.mirror_upstream {
            return;
        }
        let Some(index) = self.dcc_index(address) else {
            return;
        };
        if let Some(other) = self.session_index(session).filter(|&i| i != index) {
            if let Some(slot) = self.table.get_mut(other) {
                slot.free();
            }
        }
        if let Some(slot) = self.table.get_mut(index) {
            slot.bind(session);
            info!(session, %address, slot = index, "mirroring upstream session");
        }
        self.set_speed_and_direction(index, speed, false);
        self.note_active();
    }

    pub(crate) fn send_ploc(&mut self, index: usize) {
        let Some(slot) = self.table.get(index) else {
            return;
        };
        let Some(session) = slot.session() else {
            return;
        };
        let reply = Reply::Ploc {
            session,
            address: slot.address(),
            speed: slot.motor().speed_byte(),
        };
        self.emit(reply);
    }

    pub(crate) fn send_speed(&mut self, index: usize) {
        let Some(slot) = self.table.get(index) else {
            return;
        };
        let Some(session) = slot.controlling_session() else {
            return;
        };
        let mut speed = slot.motor().speed_byte();
        if slot.session().is_none() && slot.consist().reverse {
            speed ^= 0x80;
        }
        self.emit(Reply::Speed { session, speed });
    }

    /// Put a reply on the bus. Non-broadcast replies are held back while an upstream
    /// command station is in charge.
    pub(crate) fn emit(&mut self, reply: Reply) -> bool {
        if self.upstream_present && !reply.is_broadcast() {
            trace!(?reply, "reply suppressed; upstream command station present");
            return false;
        }
        let sent = self.transport.send(reply.opcode(), &reply.payload());
        if let Some(m) = &self.metrics {
            if sent {
                m.frames_tx.inc();
            } else {
                m.tx_failures.inc();
            }
        }
        if !sent {
            warn!(?reply, "reply not sent");
        }
        sent
    }

    fn note_active(&self) {
        if let Some(m) = &self.metrics {
            m.active_sessions.set(self.table.active_count() as i64);
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{CanBusTransport, MetricsHub, SessionIdScheme};
    use can_transport::{CanBus, MockBus};
    use motor_driver::{MockMotor, MotorCall};

    pub(crate) type TestManager = SessionManager<CanBusTransport<MockBus>, MockMotor>;

    pub(crate) const L1001: DccAddress = DccAddress {
        number: 1001,
        long: true,
    };
    pub(crate) const L1002: DccAddress = DccAddress {
        number: 1002,
        long: true,
    };

    pub(crate) fn manager_with(config: NodeConfig) -> TestManager {
        let transport = CanBusTransport::new(MockBus::open("mock0").unwrap(), config.can_id).unwrap();
        SessionManager::new(&config, transport, |_, _| MockMotor::new()).unwrap()
    }

    pub(crate) fn manager() -> TestManager {
        manager_with(NodeConfig::with_default_controllers(0, 2))
    }

    /// Frames sent since the last call, as raw CBUS bytes.
    pub(crate) fn sent(manager: &mut TestManager) -> Vec<Vec<u8>> {
        manager
            .transport_mut()
            .bus_mut()
            .take_sent()
            .iter()
            .map(|f| f.payload().to_vec())
            .collect()
    }

    pub(crate) fn motor(manager: &mut TestManager, index: usize) -> Vec<MotorCall> {
        manager
            .table
            .get_mut(index)
            .map(|s| s.motor_mut().take_calls())
            .unwrap_or_default()
    }

    #[test]
    fn unbound_address_is_an_invalid_request() {
        let mut m = manager();
        m.loco_request(DccAddress::long(4242), 0);
        assert_eq!(sent(&mut m), vec![vec![0x63, 0xD0, 0x92, 9]]);
        assert!(m.slots().iter().all(|s| s.session.is_none()));
    }

    #[test]
    fn free_slot_is_allocated_once() {
        let mut m = manager();
        m.loco_request(L1001, 0);
        let session = m.slot(0).and_then(|s| s.session()).unwrap();
        assert_eq!(
            sent(&mut m),
            vec![vec![0xE1, session, 0xC3, 0xE9, 0x80, 0, 0, 0]]
        );
        assert_eq!(
            motor(&mut m, 0),
            vec![MotorCall::SetSpeedAndDirection(Direction::Forward, 0)]
        );

        m.loco_request(L1001, 0);
        assert_eq!(sent(&mut m), vec![vec![0x63, 0xC3, 0xE9, 5]]);
        assert_eq!(m.slot(0).and_then(|s| s.session()), Some(session));
    }

    #[test]
    fn steal_cancels_old_session_and_reallocates() {
        let mut m = manager();
        m.loco_request(L1001, 0);
        let first = m.slot(0).and_then(|s| s.session()).unwrap();
        sent(&mut m);

        m.loco_request(L1001, 1);
        let second = m.slot(0).and_then(|s| s.session()).unwrap();
        assert_ne!(first, second);
        assert_eq!(
            sent(&mut m),
            vec![
                vec![0x63, first, 0, 10],
                vec![0xE1, second, 0xC3, 0xE9, 0x80, 0, 0, 0],
            ]
        );
    }

    #[test]
    fn share_echoes_existing_session() {
        let mut m = manager();
        m.loco_request(L1002, 0);
        let session = m.slot(1).and_then(|s| s.session()).unwrap();
        sent(&mut m);

        m.loco_request(L1002, 2);
        m.loco_request(L1002, 2);
        let slot = m.slot(1).unwrap();
        assert!(slot.is_shared());
        assert_eq!(slot.session(), Some(session));
        let ploc = vec![0xE1, session, 0xC3, 0xEA, 0x80, 0, 0, 0];
        assert_eq!(sent(&mut m), vec![ploc.clone(), ploc]);
    }

    #[test]
    fn unknown_flags_on_leased_loco_are_invalid() {
        let mut m = manager();
        m.loco_request(L1001, 0);
        sent(&mut m);
        m.loco_request(L1001, 7);
        assert_eq!(sent(&mut m), vec![vec![0x63, 0xC3, 0xE9, 9]]);
    }

    #[test]
    fn slot_index_scheme_uses_positions() {
        let mut config = NodeConfig::with_default_controllers(0, 2);
        config.session_ids = SessionIdScheme::SlotIndex;
        let mut m = manager_with(config);
        m.loco_request(L1002, 0);
        assert_eq!(m.slot(1).and_then(|s| s.session()), Some(1));
        m.loco_request(L1001, 0);
        assert_eq!(m.slot(0).and_then(|s| s.session()), Some(0));
    }

    #[test]
    fn release_and_keepalive_ignore_unknown_sessions() {
        let mut m = manager();
        m.release_loco(99);
        m.keepalive_session(99);
        assert!(sent(&mut m).is_empty());

        m.loco_request(L1001, 0);
        let session = m.slot(0).and_then(|s| s.session()).unwrap();
        m.tick(false);
        m.tick(false);
        assert_eq!(m.slot(0).map(|s| s.timeout()), Some(2));
        m.keepalive_session(session);
        assert_eq!(m.slot(0).map(|s| s.timeout()), Some(0));

        m.release_loco(session);
        m.release_loco(session);
        assert!(!m.slot(0).unwrap().is_active());
    }

    #[test]
    fn query_answers_ploc_or_no_session() {
        let mut m = manager();
        m.loco_request(L1001, 0);
        let session = m.slot(0).and_then(|s| s.session()).unwrap();
        sent(&mut m);

        m.query_loco(session);
        m.query_loco(77);
        assert_eq!(
            sent(&mut m),
            vec![
                vec![0xE1, session, 0xC3, 0xE9, 0x80, 0, 0, 0],
                vec![0x63, 77, 0, 6],
            ]
        );
    }

    #[test]
    fn timeout_evicts_after_threshold() {
        let mut m = manager();
        m.loco_request(L1001, 0);
        let session = m.slot(0).and_then(|s| s.session()).unwrap();
        sent(&mut m);
        motor(&mut m, 0);

        for _ in 0..30 {
            m.tick(false);
        }
        assert!(m.slot(0).unwrap().is_active());
        assert!(sent(&mut m).is_empty());

        m.tick(false);
        assert!(!m.slot(0).unwrap().is_active());
        assert_eq!(m.slot(0).map(|s| s.timeout()), Some(0));
        assert_eq!(sent(&mut m), vec![vec![0x63, session, 0, 10]]);
        assert_eq!(motor(&mut m, 0), vec![MotorCall::SetSpeed(0)]);
    }

    #[test]
    fn speed_byte_and_reverse_bit_pick_direction() {
        let mut m = manager();
        m.set_speed_and_direction(0, 0x80 | 80, false);
        m.set_speed_and_direction(0, 80, false);
        m.set_speed_and_direction(0, 0x80 | 80, true);
        m.set_speed_and_direction(0, 0x80 | 1, false);
        m.set_speed_and_direction(0, 0, false);
        assert_eq!(
            motor(&mut m, 0),
            vec![
                MotorCall::SetSpeedAndDirection(Direction::Forward, 80),
                MotorCall::SetSpeedAndDirection(Direction::Reverse, 80),
                MotorCall::SetSpeedAndDirection(Direction::Reverse, 80),
                MotorCall::EmergencyStop,
                MotorCall::SetSpeedAndDirection(Direction::Reverse, 0),
            ]
        );
    }

    #[test]
    fn stop_all_echoes_each_active_slot() {
        let mut m = manager();
        m.loco_request(L1002, 0);
        let session = m.slot(1).and_then(|s| s.session()).unwrap();
        m.apply_speed(session, 0x80 | 60);
        sent(&mut m);
        motor(&mut m, 0);
        motor(&mut m, 1);

        m.stop_all(false);
        assert_eq!(sent(&mut m), vec![vec![0x47, session, 0x80]]);
        assert_eq!(motor(&mut m, 1), vec![MotorCall::SetSpeed(0)]);
        assert!(motor(&mut m, 0).is_empty());

        m.stop_all(true);
        assert_eq!(motor(&mut m, 1), vec![MotorCall::EmergencyStop]);
    }

    #[test]
    fn timeout_threshold_is_configurable() {
        let mut config = NodeConfig::with_default_controllers(0, 1);
        config.timeout_ticks = 2;
        let mut m = manager_with(config);
        m.loco_request(L1001, 0);
        sent(&mut m);
        m.tick(false);
        m.tick(false);
        assert!(m.slot(0).unwrap().is_active());
        m.tick(false);
        assert!(!m.slot(0).unwrap().is_active());
    }

    #[test]
    fn emergency_stop_all_broadcasts_once() {
        let mut m = manager();
        m.loco_request(L1001, 0);
        m.loco_request(L1002, 0);
        sent(&mut m);
        m.emergency_stop_all();
        assert_eq!(sent(&mut m), vec![vec![0x06]]);
        assert!(motor(&mut m, 0).contains(&MotorCall::EmergencyStop));
        assert!(motor(&mut m, 1).contains(&MotorCall::EmergencyStop));
    }

    #[test]
    fn reset_announcement_is_one_per_slot_then_bus_on() {
        let mut m = manager();
        m.announce_reset();
        assert_eq!(sent(&mut m), vec![vec![0x07], vec![0x07], vec![0x03]]);
    }

    #[test]
    fn upstream_station_silences_allocation() {
        let mut m = manager();
        m.upstream_allocated(3, DccAddress::short(3), 0);
        assert!(m.upstream_present());

        m.loco_request(L1001, 0);
        m.query_loco(3);
        assert!(sent(&mut m).is_empty());
        assert!(m.slots().iter().all(|s| s.session.is_none()));

        // Broadcasts still go out
        m.emergency_stop_all();
        assert_eq!(sent(&mut m), vec![vec![0x06]]);
    }

    #[test]
    fn upstream_station_silences_echoes_and_cancellations() {
        let mut m = manager();
        m.loco_request(L1001, 0);
        let session = m.slot(0).and_then(|s| s.session()).unwrap();
        m.upstream_allocated(3, DccAddress::short(3), 0);
        sent(&mut m);
        motor(&mut m, 0);

        m.apply_speed(session, 0x80 | 50);
        assert_eq!(
            motor(&mut m, 0),
            vec![MotorCall::SetSpeedAndDirection(Direction::Forward, 50)]
        );
        m.stop_all(false);
        assert!(sent(&mut m).is_empty());

        for _ in 0..31 {
            m.tick(false);
        }
        assert!(!m.slot(0).unwrap().is_active());
        assert!(sent(&mut m).is_empty());
    }

    #[test]
    fn consist_announcements_do_not_mark_upstream() {
        let mut m = manager();
        m.upstream_allocated(0x8A, DccAddress::short(10), 0);
        assert!(m.is_standalone());
    }

    #[test]
    fn mirroring_binds_upstream_sessions() {
        let mut config = NodeConfig::with_default_controllers(0, 2);
        config.mirror_upstream = true;
        let mut m = manager_with(config);
        m.upstream_allocated(42, L1002, 0x80 | 20);
        assert_eq!(m.session_index(42), Some(1));
        assert_eq!(
            motor(&mut m, 1),
            vec![MotorCall::SetSpeedAndDirection(Direction::Forward, 20)]
        );

        // Same id re-announced for the other loco moves the lease
        m.upstream_allocated(42, L1001, 0);
        assert_eq!(m.session_index(42), Some(0));
        assert!(!m.slot(1).unwrap().is_active());
    }

    #[test]
    fn exhausted_allocator_reports_stack_full() {
        struct Exhausted;
        impl SessionAllocator for Exhausted {
            fn allocate(&mut self, _: usize, _: &dyn Fn(u8) -> bool) -> Option<u8> {
                None
            }
            fn name(&self) -> &'static str {
                "exhausted"
            }
        }
        let mut m = manager().with_allocator(Box::new(Exhausted));
        m.loco_request(L1001, 0);
        assert_eq!(sent(&mut m), vec![vec![0x63, 0xC3, 0xE9, 4]]);
        assert!(!m.slot(0).unwrap().is_active());
    }

    #[test]
    fn metrics_track_lifecycle() {
        let hub = MetricsHub::new().unwrap();
        let mut m = manager().with_metrics(hub.sessions.clone());
        m.loco_request(L1001, 0);
        m.loco_request(L1001, 1);
        assert_eq!(hub.sessions.sessions_allocated.get(), 2);
        assert_eq!(hub.sessions.sessions_stolen.get(), 1);
        assert_eq!(hub.sessions.active_sessions.get(), 1);
        for _ in 0..31 {
            m.tick(true);
        }
        assert_eq!(hub.sessions.sessions_evicted.get(), 1);
        assert_eq!(hub.sessions.active_sessions.get(), 0);
        // PLOC, ERR + PLOC, ERR on eviction
        assert_eq!(hub.sessions.frames_tx.get(), 4);
    }
}
