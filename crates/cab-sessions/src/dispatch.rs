use crate::table::is_consist_session;
use crate::{decode, opcode, BusTransport, Command, SessionManager};
use can_transport::CanFrame;
use motor_driver::MotorDriver;
use tracing::{debug, info, trace, warn};

impl<T: BusTransport, M: MotorDriver> SessionManager<T, M> {
    /// Process one received frame to completion. Malformed frames are logged and dropped.
    pub fn handle(&mut self, frame: &[u8]) {
        if let Some(m) = &self.metrics {
            m.frames_rx.inc();
        }
        match decode(frame) {
            Ok(Some(command)) => {
                debug!(?command, "frame decoded");
                self.execute(command);
            }
            Ok(None) => {
                if let Some(&op) = frame.first() {
                    trace!(opcode = opcode::mnemonic(op), "frame ignored");
                }
            }
            Err(e) => warn!(error = %e, "dropping malformed frame"),
        }
    }

    pub fn handle_frame(&mut self, frame: &CanFrame) {
        if frame.rtr {
            return;
        }
        self.handle(frame.payload());
    }

    pub fn execute(&mut self, command: Command) {
        match command {
            Command::SystemReset | Command::TrackOff => self.stop_all(true),
            Command::TrackOn => info!("track power on"),
            Command::Release { session } if is_consist_session(session) => {
                self.release_consist(session)
            }
            Command::Release { session } => self.release_loco(session),
            Command::Query { session } => self.query_loco(session),
            Command::Keepalive { session } => {
                self.keepalive(session);
                self.update_processing(true);
            }
            Command::Request { address } => {
                // Plain requests for other nodes' locos are not ours to refuse
                if self.dcc_index(address).is_some() {
                    self.loco_request(address, 0);
                }
            }
            Command::GetLoco { address, flags } => self.loco_request(address, flags),
            Command::Allocated {
                session,
                address,
                speed,
            } => self.upstream_allocated(session, address, speed),
            Command::QueryConsist { address, .. } => self.consist_request(address),
            Command::SpeedStepMode { session, mode } => {
                trace!(session, mode, "speed step mode has no effect on DC outputs");
            }
            Command::ConsistAdd { session, consist } => self.add_session_consist(session, consist),
            Command::ConsistRemove { session, .. } => self.remove_session_consist(session),
            Command::Speed { session, speed } => {
                self.apply_speed(session, speed);
                self.keepalive(session);
                self.update_processing(true);
            }
            Command::EmergencyStopAll => self.emergency_stop_all(),
            Command::Accessory {
                opcode: _op,
                node: _node,
                event: _event,
            } => {
                #[cfg(feature = "accessory-diagnostics")]
                debug!(
                    opcode = opcode::mnemonic(_op),
                    node = _node,
                    event = _event,
                    "accessory event"
                );
            }
        }
    }

    fn keepalive(&mut self, session: u8) {
        if is_consist_session(session) {
            self.keepalive_consist(session);
        } else {
            self.keepalive_session(session);
        }
    }
}
