//! motor-driver: the speed/direction surface of a DC output channel
//!
//! The session layer never touches PWM, DAC or back-EMF hardware directly; it talks to a
//! [`MotorDriver`] per channel. [`RampedMotor`] is a pure-software driver that models
//! the stepped approach to a target speed, and the `mock` feature adds [`MockMotor`],
//! which records every call for tests.

mod types;
pub use types::{Direction, MAX_SPEED, SPEED_STEP};

mod traits;
pub use traits::MotorDriver;

mod ramped;
pub use ramped::RampedMotor;

#[cfg(feature = "mock")]
mod mock;

#[cfg(feature = "mock")]
pub use mock::{MockMotor, MotorCall};
