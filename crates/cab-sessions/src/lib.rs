//! cab-sessions: locomotive session leasing for CBUS DC controller nodes
//!
//! A node owns a fixed table of output channels, each bound to one DCC address. CABs on
//! the bus lease those channels through sessions: [`SessionManager`] allocates, shares,
//! steals and evicts leases, groups slots into consists and answers with CBUS reply
//! frames. Frames come in through [`SessionManager::handle`]; replies go out through a
//! [`BusTransport`]; every slot drives a [`motor_driver::MotorDriver`].

pub mod opcode;

mod address;
pub use address::{DccAddress, LONG_ADDRESS_FLAGS, MAX_LONG_ADDRESS, MAX_SHORT_ADDRESS};

mod error;
pub use error::{ConfigError, DecodeError, ErrorCode};

mod decode;
pub use decode::{decode, Command};

mod encode;
pub use encode::Reply;

mod transport;
pub use transport::{BusTransport, CanBusTransport};

mod table;
pub use table::{
    is_consist_session, ConsistMembership, ControllerSlot, ControllerTable, SlotView,
    CONSIST_SESSION_FLAG,
};

mod allocator;
pub use allocator::{RotatingAllocator, SessionAllocator, SessionIdScheme, SlotIndexAllocator};

mod config;
pub use config::{
    load_config_file, parse_config, ControllerBinding, NodeConfig, ADDRESS_BLOCK,
    DEFAULT_CAN_ID, DEFAULT_TIMEOUT_TICKS, TIMEOUT_TICK,
};

mod metrics;
pub use metrics::{MetricsHub, SessionMetrics};

mod session;
pub use session::{RequestMode, SessionManager, EMERGENCY_STOP_SPEED};

mod consist;
mod dispatch;
