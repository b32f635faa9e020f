use crate::address::{DccAddress, MAX_LONG_ADDRESS};
use crate::{ConfigError, SessionIdScheme};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Eviction threshold: a lease is cancelled once its counter exceeds this many ticks.
/// Counters advance once per [`TIMEOUT_TICK`] of bus time.
pub const DEFAULT_TIMEOUT_TICKS: u16 = 30;

pub const TIMEOUT_TICK: Duration = Duration::from_secs(1);

/// Default DCC addresses are `ADDRESS_BLOCK * (device + 1) + channel + 1`.
pub const ADDRESS_BLOCK: u16 = 1000;

pub const DEFAULT_CAN_ID: u8 = 100;

/// Static binding of one output channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerBinding {
    pub address: u16,
    #[serde(default = "default_long")]
    pub long: bool,
}

impl ControllerBinding {
    pub fn dcc_address(&self) -> DccAddress {
        DccAddress {
            number: self.address,
            long: self.long,
        }
    }
}

fn default_long() -> bool {
    true
}

fn default_can_id() -> u8 {
    DEFAULT_CAN_ID
}

fn default_timeout_ticks() -> u16 {
    DEFAULT_TIMEOUT_TICKS
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeConfig {
    /// Position of this node among identical nodes; 0 is the "first device".
    #[serde(default)]
    pub device_address: u8,
    #[serde(default = "default_can_id")]
    pub can_id: u8,
    #[serde(default)]
    pub session_ids: SessionIdScheme,
    #[serde(default = "default_timeout_ticks")]
    pub timeout_ticks: u16,
    /// Bind sessions announced by an upstream command station to local slots.
    #[serde(default)]
    pub mirror_upstream: bool,
    pub controllers: Vec<ControllerBinding>,
}

impl NodeConfig {
    /// `count` channels on long addresses numbered from this device's address block.
    pub fn with_default_controllers(device_address: u8, count: u8) -> Self {
        let base = ADDRESS_BLOCK * (u16::from(device_address) + 1);
        Self {
            device_address,
            can_id: DEFAULT_CAN_ID,
            session_ids: SessionIdScheme::default(),
            timeout_ticks: DEFAULT_TIMEOUT_TICKS,
            mirror_upstream: false,
            controllers: (0..count)
                .map(|i| ControllerBinding {
                    address: (base + u16::from(i) + 1).min(MAX_LONG_ADDRESS),
                    long: true,
                })
                .collect(),
        }
    }

    pub fn addresses(&self) -> impl Iterator<Item = DccAddress> + '_ {
        self.controllers.iter().map(ControllerBinding::dcc_address)
    }

    pub fn is_first_device(&self) -> bool {
        self.device_address == 0
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.can_id == 0 || self.can_id > 0x7F {
            return Err(ConfigError::InvalidCanId(self.can_id));
        }
        // Counters saturate, so the maximum would never evict
        if self.timeout_ticks == u16::MAX {
            return Err(ConfigError::TimeoutUnreachable(self.timeout_ticks));
        }
        if self.controllers.is_empty() {
            return Err(ConfigError::NoControllers);
        }
        if self.controllers.len() > 0x7F {
            return Err(ConfigError::TooManyControllers(self.controllers.len()));
        }
        let mut seen = HashSet::new();
        for address in self.addresses() {
            if !address.is_valid() {
                return Err(ConfigError::AddressOutOfRange(address));
            }
            if !seen.insert(address) {
                return Err(ConfigError::DuplicateAddress(address));
            }
        }
        Ok(())
    }
}

pub fn parse_config(raw: &str) -> anyhow::Result<NodeConfig> {
    let config: NodeConfig = serde_yaml::from_str(raw).context("decoding node config")?;
    config.validate()?;
    Ok(config)
}

pub fn load_config_file(path: impl AsRef<Path>) -> anyhow::Result<NodeConfig> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading node config: {}", path.display()))?;
    parse_config(&raw).with_context(|| format!("loading node config: {}", path.display()))
}
