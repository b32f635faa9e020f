use crate::Direction;

/// Per-channel motor control as seen by the session layer.
///
/// Setters only move targets; the output approaches them one increment per
/// [`MotorDriver::match_to_targets`] call.
pub trait MotorDriver {
    fn set_speed_and_direction(&mut self, direction: Direction, speed: u8);

    /// Change the target speed, keeping the target direction.
    fn set_speed(&mut self, speed: u8);

    /// Cut output immediately and zero the target.
    fn emergency_stop(&mut self);

    /// Target speed magnitude.
    fn speed(&self) -> u8;

    /// Target direction.
    fn direction(&self) -> Direction;

    /// Advance the output one increment toward the targets.
    fn match_to_targets(&mut self);

    /// Target speed and direction packed as a wire speed byte.
    fn speed_byte(&self) -> u8 {
        self.direction().speed_byte(self.speed())
    }
}

impl<M: MotorDriver + ?Sized> MotorDriver for Box<M> {
    fn set_speed_and_direction(&mut self, direction: Direction, speed: u8) {
        (**self).set_speed_and_direction(direction, speed)
    }

    fn set_speed(&mut self, speed: u8) {
        (**self).set_speed(speed)
    }

    fn emergency_stop(&mut self) {
        (**self).emergency_stop()
    }

    fn speed(&self) -> u8 {
        (**self).speed()
    }

    fn direction(&self) -> Direction {
        (**self).direction()
    }

    fn match_to_targets(&mut self) {
        (**self).match_to_targets()
    }
}
