//! can-transport: CAN bus plumbing for CBUS nodes
//!
//! Frames, identifiers and a minimal blocking [`CanBus`] trait, with feature-gated
//! backends. The default build enables the in-process `mock` backend so the session
//! core and the CLI can be exercised on any host without an adapter attached.

mod types;
pub use types::{BusInfo, CanFilter, CanFrame, CanId, Timestamp, CBUS_DEFAULT_PRIORITY};

mod error;
pub use error::{Result, TransportError};

mod traits;
pub use traits::CanBus;

#[cfg(feature = "mock")]
mod mock;

#[cfg(feature = "mock")]
pub use mock::MockBus;

#[cfg(feature = "slcan")]
mod slcan;

#[cfg(feature = "slcan")]
pub use slcan::{SlcanBitrate, SlcanBus};
