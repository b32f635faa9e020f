use crate::{Direction, MotorDriver, MAX_SPEED, SPEED_STEP};

/// Software model of an analogue output channel.
///
/// Keeps separate target and actual speed/direction. The actual output only moves in
/// `SPEED_STEP` increments, and a direction change first brings the output down to zero.
#[derive(Debug, Clone, Default)]
pub struct RampedMotor {
    label: String,
    target_speed: u8,
    target_direction: Direction,
    current_speed: u8,
    current_direction: Direction,
    e_stopped: bool,
}

impl RampedMotor {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Speed currently applied to the output.
    pub fn output_speed(&self) -> u8 {
        self.current_speed
    }

    /// Direction currently applied to the output.
    pub fn output_direction(&self) -> Direction {
        self.current_direction
    }

    pub fn is_e_stopped(&self) -> bool {
        self.e_stopped
    }

    fn set_targets(&mut self, direction: Direction, speed: u8) {
        self.target_speed = speed.min(MAX_SPEED);
        self.target_direction = direction;
        self.e_stopped = false;
        tracing::trace!(
            motor = %self.label,
            %direction,
            speed = self.target_speed,
            "motor targets set"
        );
    }
}

impl MotorDriver for RampedMotor {
    fn set_speed_and_direction(&mut self, direction: Direction, speed: u8) {
        self.set_targets(direction, speed);
    }

    fn set_speed(&mut self, speed: u8) {
        self.set_targets(self.target_direction, speed);
    }

    fn emergency_stop(&mut self) {
        self.e_stopped = true;
        self.target_speed = 0;
        self.current_speed = 0;
        tracing::debug!(motor = %self.label, "motor emergency stop");
    }

    fn speed(&self) -> u8 {
        self.target_speed
    }

    fn direction(&self) -> Direction {
        self.target_direction
    }

    fn match_to_targets(&mut self) {
        if self.e_stopped {
            return;
        }
        if self.target_direction != self.current_direction {
            // Decelerate to zero before reversing
            if self.current_speed < SPEED_STEP {
                self.current_speed = 0;
                self.current_direction = self.target_direction;
            } else {
                self.current_speed -= SPEED_STEP;
            }
            return;
        }
        let (current, target) = (self.current_speed, self.target_speed);
        self.current_speed = if current > target {
            current.saturating_sub(SPEED_STEP).max(target)
        } else {
            current.saturating_add(SPEED_STEP).min(target)
        };
    }
}
