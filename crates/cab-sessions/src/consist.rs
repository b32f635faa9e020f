use crate::table::{ConsistMembership, CONSIST_SESSION_FLAG};
use crate::{BusTransport, DccAddress, ErrorCode, Reply, SessionManager};
use motor_driver::MotorDriver;
use tracing::{debug, info, trace, warn};

impl<T: BusTransport, M: MotorDriver> SessionManager<T, M> {
    /// Put the slot leased by `session` into consist `consist & 0x7F`; bit 7 runs it reversed.
    pub fn add_session_consist(&mut self, session: u8, consist: u8) {
        let Some(index) = self.session_index(session) else {
            trace!(session, "consist add for unknown session");
            return;
        };
        self.remove_session_consist(session);
        if let Some(slot) = self.table.get_mut(index) {
            slot.consist = ConsistMembership {
                address: consist & 0x7F,
                session: 0,
                reverse: consist & 0x80 != 0,
            };
            debug!(session, consist = consist & 0x7F, reverse = slot.consist.reverse, "added to consist");
        }
    }

    /// Deallocate consist `session & 0x7F` on every slot carrying that consist address.
    /// Membership itself is kept.
    pub fn remove_session_consist(&mut self, session: u8) {
        let address = session & 0x7F;
        for slot in self.table.iter_mut() {
            if slot.consist.address == address {
                slot.consist.session = 0;
            }
        }
    }

    /// A CAB asks to drive consist `address`.
    pub fn consist_request(&mut self, address: u8) {
        if !self.is_standalone() {
            return;
        }
        // Consist errors are address-scoped, with the consist number as a short address
        let reject = |code| Reply::AddressError {
            address: DccAddress::short(u16::from(address)),
            code,
        };
        if address == 0 || address >= CONSIST_SESSION_FLAG {
            debug!(address, "consist address out of range");
            self.emit(reject(ErrorCode::InvalidRequest));
            return;
        }
        let members: Vec<usize> = self
            .table
            .iter()
            .enumerate()
            .filter(|(_, s)| s.consist.address == address)
            .map(|(i, _)| i)
            .collect();
        if members.is_empty() {
            debug!(address, "consist has no members here");
            self.emit(reject(ErrorCode::ConsistEmpty));
            return;
        }
        let taken = members
            .iter()
            .filter_map(|&i| self.table.get(i))
            .any(|s| s.consist.session != 0);
        if taken {
            debug!(address, "consist already allocated");
            self.emit(reject(ErrorCode::LocoTaken));
            return;
        }
        let session = address | CONSIST_SESSION_FLAG;
        for &i in &members {
            if let Some(slot) = self.table.get_mut(i) {
                slot.consist.session = session;
                if slot.session.is_none() {
                    slot.timeout = 0;
                }
            }
        }
        info!(address, members = members.len(), "consist allocated");
        // Identical nodes on one segment would all answer; only the first one does
        if self.is_first_device() {
            self.emit(Reply::ConsistPloc { address });
        }
    }

    /// Indices of slots currently driven by consist `session`.
    pub fn consist_members(&self, session: u8) -> Vec<usize> {
        let address = session & 0x7F;
        self.table
            .iter()
            .enumerate()
            .filter(|(_, s)| s.consist.address == address && s.consist.session == session)
            .map(|(i, _)| i)
            .collect()
    }

    pub(crate) fn apply_consist_speed(&mut self, session: u8, requested_speed: u8) {
        let members = self.consist_members(session);
        let Some(&first) = members.first() else {
            trace!(session, "speed for unallocated consist");
            return;
        };
        for &i in &members {
            let reverse = self.table.get(i).is_some_and(|s| s.consist.reverse);
            self.set_speed_and_direction(i, requested_speed, reverse);
        }
        let Some(slot) = self.table.get(first) else {
            return;
        };
        let mut speed = slot.motor().speed_byte();
        if slot.consist.reverse {
            speed ^= 0x80;
        }
        self.emit(Reply::Speed { session, speed });
    }

    pub(crate) fn keepalive_consist(&mut self, session: u8) {
        for i in self.consist_members(session) {
            if let Some(slot) = self.table.get_mut(i) {
                slot.timeout = 0;
            }
        }
    }

    /// Release of a consist session: members stay grouped but nobody drives them.
    pub fn release_consist(&mut self, session: u8) {
        let members = self.consist_members(session);
        for &i in &members {
            if let Some(slot) = self.table.get_mut(i) {
                slot.consist.session = 0;
                if slot.session.is_none() {
                    slot.timeout = 0;
                }
            }
        }
        if !members.is_empty() {
            info!(session, "consist released");
        }
    }

    /// Cancel consist sessions whose loco-less members went silent past the threshold.
    /// Members without a lease of their own are stopped; leased members keep their speed.
    pub(crate) fn expire_consists(&mut self, timeout_ticks: u16) {
        let mut expired: Vec<u8> = self
            .table
            .iter()
            .filter(|s| s.session.is_none() && s.consist.session != 0 && s.timeout > timeout_ticks)
            .map(|s| s.consist.session)
            .collect();
        expired.sort_unstable();
        expired.dedup();
        for session in expired {
            warn!(session, "consist session timed out");
            for i in self.consist_members(session) {
                if let Some(slot) = self.table.get_mut(i) {
                    slot.consist.session = 0;
                    if slot.session.is_none() {
                        slot.motor.set_speed(0);
                        slot.timeout = 0;
                    }
                }
            }
            self.emit(Reply::SessionError {
                session,
                code: ErrorCode::SessionCancelled,
            });
            if let Some(m) = &self.metrics {
                m.sessions_evicted.inc();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::session::tests::{manager, manager_with, motor, sent, L1001, L1002};
    use crate::{ConsistMembership, NodeConfig};
    use motor_driver::{Direction, MotorCall};

    #[test]
    fn add_then_remove_keeps_address_clears_session() {
        let mut m = manager();
        m.loco_request(L1001, 0);
        let s1 = m.slot(0).and_then(|s| s.session()).unwrap();
        m.add_session_consist(s1, 0x80 | 10);
        assert_eq!(
            m.slot(0).unwrap().consist(),
            ConsistMembership {
                address: 10,
                session: 0,
                reverse: true
            }
        );

        m.consist_request(10);
        assert_eq!(m.slot(0).unwrap().consist().session, 0x8A);

        m.remove_session_consist(0x8A);
        let consist = m.slot(0).unwrap().consist();
        assert_eq!(consist.session, 0);
        assert_eq!(consist.address, 10);
    }

    #[test]
    fn add_for_unknown_session_is_ignored() {
        let mut m = manager();
        m.add_session_consist(55, 10);
        assert!(m.slots().iter().all(|s| !s.consist.is_member()));
    }

    #[test]
    fn out_of_range_requests_are_invalid() {
        let mut m = manager();
        m.consist_request(0);
        m.consist_request(128);
        m.consist_request(200);
        assert_eq!(
            sent(&mut m),
            vec![vec![0x63, 0, 0, 9], vec![0x63, 0, 128, 9], vec![0x63, 0, 200, 9]]
        );
        assert!(m.slots().iter().all(|s| s.consist.session == 0));
    }

    #[test]
    fn empty_then_allocated_then_taken() {
        let mut m = manager();
        m.consist_request(10);
        assert_eq!(sent(&mut m), vec![vec![0x63, 0, 10, 7]]);

        m.loco_request(L1001, 0);
        m.loco_request(L1002, 0);
        let s1 = m.slot(0).and_then(|s| s.session()).unwrap();
        let s2 = m.slot(1).and_then(|s| s.session()).unwrap();
        m.add_session_consist(s1, 10);
        m.add_session_consist(s2, 0x80 | 10);
        sent(&mut m);

        m.consist_request(10);
        assert_eq!(sent(&mut m), vec![vec![0xE1, 0x8A, 0, 10, 0, 0, 0, 0]]);
        assert_eq!(m.consist_members(0x8A), vec![0, 1]);

        m.consist_request(10);
        assert_eq!(sent(&mut m), vec![vec![0x63, 0, 10, 5]]);
    }

    #[test]
    fn only_first_device_announces_consists() {
        let mut m = manager_with(NodeConfig::with_default_controllers(1, 2));
        m.loco_request(crate::DccAddress::long(2001), 0);
        let s = m.slot(0).and_then(|s| s.session()).unwrap();
        m.add_session_consist(s, 12);
        sent(&mut m);
        m.consist_request(12);
        assert!(sent(&mut m).is_empty());
        assert_eq!(m.slot(0).unwrap().consist().session, 0x8C);
    }

    #[test]
    fn consist_speed_drives_members_with_their_reverse_flag() {
        let mut m = manager();
        m.loco_request(L1001, 0);
        m.loco_request(L1002, 0);
        let s1 = m.slot(0).and_then(|s| s.session()).unwrap();
        let s2 = m.slot(1).and_then(|s| s.session()).unwrap();
        m.add_session_consist(s1, 10);
        m.add_session_consist(s2, 0x80 | 10);
        m.consist_request(10);
        sent(&mut m);
        motor(&mut m, 0);
        motor(&mut m, 1);

        m.apply_speed(0x8A, 0x80 | 40);
        assert_eq!(
            motor(&mut m, 0),
            vec![MotorCall::SetSpeedAndDirection(Direction::Forward, 40)]
        );
        assert_eq!(
            motor(&mut m, 1),
            vec![MotorCall::SetSpeedAndDirection(Direction::Reverse, 40)]
        );
        assert_eq!(sent(&mut m), vec![vec![0x47, 0x8A, 0x80 | 40]]);

        m.release_consist(0x8A);
        assert!(m.consist_members(0x8A).is_empty());
        m.apply_speed(0x8A, 0x80 | 40);
        assert!(sent(&mut m).is_empty());
    }

    /// Two locos in consist 10, slot 1 reversed, with their own leases released.
    fn consist_only(m: &mut crate::session::tests::TestManager) {
        m.loco_request(L1001, 0);
        m.loco_request(L1002, 0);
        let s1 = m.slot(0).and_then(|s| s.session()).unwrap();
        let s2 = m.slot(1).and_then(|s| s.session()).unwrap();
        m.add_session_consist(s1, 10);
        m.add_session_consist(s2, 0x80 | 10);
        m.consist_request(10);
        m.release_loco(s1);
        m.release_loco(s2);
        m.apply_speed(0x8A, 0x80 | 60);
        sent(m);
        motor(m, 0);
        motor(m, 1);
    }

    #[test]
    fn silent_consist_is_cancelled_once() {
        let mut m = manager();
        consist_only(&mut m);

        for _ in 0..20 {
            m.tick(false);
        }
        m.handle(&[0x23, 0x8A]);
        assert_eq!(m.slot(0).map(|s| s.timeout()), Some(0));
        motor(&mut m, 0);
        motor(&mut m, 1);

        for _ in 0..30 {
            m.tick(false);
        }
        assert_eq!(m.consist_members(0x8A), vec![0, 1]);
        assert!(sent(&mut m).is_empty());

        m.tick(false);
        assert_eq!(sent(&mut m), vec![vec![0x63, 0x8A, 0, 10]]);
        assert_eq!(motor(&mut m, 0), vec![MotorCall::SetSpeed(0)]);
        assert_eq!(motor(&mut m, 1), vec![MotorCall::SetSpeed(0)]);
        assert!(m.consist_members(0x8A).is_empty());
        assert_eq!(m.slot(1).unwrap().consist().address, 10);
        assert_eq!(m.slot(1).map(|s| s.timeout()), Some(0));

        for _ in 0..100 {
            m.tick(true);
        }
        assert!(sent(&mut m).is_empty());
    }

    #[test]
    fn consist_timeout_spares_members_with_their_own_lease() {
        let mut m = manager();
        consist_only(&mut m);
        m.loco_request(L1002, 0);
        let own = m.slot(1).and_then(|s| s.session()).unwrap();
        m.apply_speed(own, 0x80 | 20);
        sent(&mut m);
        motor(&mut m, 1);

        for _ in 0..31 {
            m.tick(false);
            m.keepalive_session(own);
        }
        assert_eq!(sent(&mut m), vec![vec![0x63, 0x8A, 0, 10]]);
        assert!(motor(&mut m, 1).is_empty());
        assert_eq!(m.slot(1).and_then(|s| s.session()), Some(own));
        assert_eq!(m.slot(1).unwrap().consist().session, 0);
    }

    #[test]
    fn stop_all_echoes_a_consist_once() {
        let mut m = manager();
        consist_only(&mut m);

        m.stop_all(true);
        assert_eq!(motor(&mut m, 0), vec![MotorCall::EmergencyStop]);
        assert_eq!(motor(&mut m, 1), vec![MotorCall::EmergencyStop]);
        assert_eq!(sent(&mut m), vec![vec![0x47, 0x8A, 0x80]]);
    }
}
