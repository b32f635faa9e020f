use crate::{Direction, MotorDriver, MAX_SPEED};

/// One call made against a [`MockMotor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotorCall {
    SetSpeedAndDirection(Direction, u8),
    SetSpeed(u8),
    EmergencyStop,
    MatchToTargets,
}

/// Motor driver that applies targets instantly and records every call.
#[derive(Debug, Clone, Default)]
pub struct MockMotor {
    speed: u8,
    direction: Direction,
    calls: Vec<MotorCall>,
}

impl MockMotor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> &[MotorCall] {
        &self.calls
    }

    pub fn take_calls(&mut self) -> Vec<MotorCall> {
        std::mem::take(&mut self.calls)
    }

    /// Calls other than `MatchToTargets`, which most tests do not care about.
    pub fn commands(&self) -> Vec<MotorCall> {
        self.calls
            .iter()
            .copied()
            .filter(|c| *c != MotorCall::MatchToTargets)
            .collect()
    }
}

impl MotorDriver for MockMotor {
    fn set_speed_and_direction(&mut self, direction: Direction, speed: u8) {
        self.calls.push(MotorCall::SetSpeedAndDirection(direction, speed));
        self.direction = direction;
        self.speed = speed.min(MAX_SPEED);
    }

    fn set_speed(&mut self, speed: u8) {
        self.calls.push(MotorCall::SetSpeed(speed));
        self.speed = speed.min(MAX_SPEED);
    }

    fn emergency_stop(&mut self) {
        self.calls.push(MotorCall::EmergencyStop);
        self.speed = 0;
    }

    fn speed(&self) -> u8 {
        self.speed
    }

    fn direction(&self) -> Direction {
        self.direction
    }

    fn match_to_targets(&mut self) {
        self.calls.push(MotorCall::MatchToTargets);
    }
}
