use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::thread;
use std::time::{Duration, Instant};
use tracing::info;

use cab_sessions::{
    opcode, CanBusTransport, MetricsHub, NodeConfig, SessionManager, TIMEOUT_TICK,
};
use can_transport as can;
use can_transport::CanBus;
use motor_driver::RampedMotor;

#[derive(Parser, Debug)]
#[command(
    name = "dc-node",
    version,
    about = "CBUS DC locomotive controller node",
    disable_help_subcommand = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Backend {
    Mock,
    Slcan,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a node against a CAN interface
    Run {
        /// Node configuration YAML (defaults to long addresses from the device's block)
        #[arg(long)]
        config: Option<String>,
        /// Device address used when no config file is given
        #[arg(long, default_value_t = 0u8)]
        device_address: u8,
        /// Output channels used when no config file is given
        #[arg(long, default_value_t = 2u8)]
        channels: u8,
        /// Backend to use
        #[arg(long, value_enum, default_value_t = Backend::Mock)]
        backend: Backend,
        /// Interface name or serial path (e.g., /dev/ttyACM0 or mock0)
        #[arg(long, default_value = "mock0")]
        device: String,
        /// Bitrate for SLCAN (CBUS runs at 125k)
        #[arg(long, value_enum)]
        bitrate: Option<Bitrate>,
        /// Milliseconds between motor steps; lease counters age once a second regardless
        #[arg(long, default_value_t = 100u64)]
        tick_ms: u64,
        /// Stop after this many motor steps (runs until killed otherwise)
        #[arg(long)]
        ticks: Option<u64>,
        /// Print Prometheus metrics on exit
        #[arg(long, action = ArgAction::SetTrue)]
        metrics: bool,
    },
    /// Decode one CBUS frame (opcode first)
    Decode {
        /// Data bytes as hex, space-separated (e.g., "E1 01 C3 E9 80 00 00 00")
        #[arg(long, value_delimiter = ' ')]
        data: Vec<String>,
        /// Print JSON instead of debug output
        #[arg(long, action = ArgAction::SetTrue)]
        json: bool,
    },
    /// Validate a node configuration and print its controller table
    ConfigCheck {
        /// YAML file path
        #[arg(long)]
        file: String,
        /// Print JSON after validation
        #[arg(long, action = ArgAction::SetTrue)]
        json: bool,
    },
    /// Drive a node on a mock bus from a script of frames and ticks
    Replay {
        /// Script path: hex frame lines, `tick [n]` lines (one second each), `#` comments
        #[arg(long)]
        from: String,
        /// Node configuration YAML
        #[arg(long)]
        config: Option<String>,
        /// Print the final slot table as JSON
        #[arg(long, action = ArgAction::SetTrue)]
        json: bool,
    },
    /// List available CAN interfaces
    CanList {
        /// Backend to query
        #[arg(long, value_enum, default_value_t = Backend::Mock)]
        backend: Backend,
    },
}

struct RunOpts {
    tick: Duration,
    ticks: Option<u64>,
    metrics: bool,
}

/// Motor steps every `step`; lease counters age once per [`TIMEOUT_TICK`].
struct Cadence {
    step: Duration,
    next_step: Instant,
    next_age: Instant,
}

impl Cadence {
    fn new(step: Duration, start: Instant) -> Self {
        Self {
            step,
            next_step: start + step,
            next_age: start + TIMEOUT_TICK,
        }
    }

    fn wait(&self, now: Instant) -> Duration {
        self.next_step.saturating_duration_since(now)
    }

    /// `None` until the next step is due, then whether lease counters age with it.
    fn poll(&mut self, now: Instant) -> Option<bool> {
        if now < self.next_step {
            return None;
        }
        self.next_step += self.step;
        let age = now >= self.next_age;
        if age {
            self.next_age += TIMEOUT_TICK;
        }
        Some(age)
    }
}

fn main() -> Result<()> {
    setup_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            device_address,
            channels,
            backend,
            device,
            bitrate,
            tick_ms,
            ticks,
            metrics,
        } => {
            let config = node_config(config.as_deref(), device_address, channels)?;
            let opts = RunOpts {
                tick: Duration::from_millis(tick_ms.max(1)),
                ticks,
                metrics,
            };
            match backend {
                Backend::Mock => run_node(can::MockBus::open(&device)?, &config, &opts),
                Backend::Slcan => {
                    let br = bitrate.map(|b| b.into_transport());
                    let bus = can::SlcanBus::open_with(&device, br)
                        .with_context(|| format!("opening {device}"))?;
                    run_node(bus, &config, &opts)
                }
            }
        }
        Commands::Decode { data, json } => decode_frame(&data, json),
        Commands::ConfigCheck { file, json } => config_check(&file, json),
        Commands::Replay { from, config, json } => replay(&from, config.as_deref(), json),
        Commands::CanList { backend } => can_list_backend(backend),
    }
}

fn setup_tracing() {
    // Best-effort; avoid panics if already set
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn node_config(path: Option<&str>, device_address: u8, channels: u8) -> Result<NodeConfig> {
    match path {
        Some(p) => cab_sessions::load_config_file(p),
        None => {
            let config = NodeConfig::with_default_controllers(device_address, channels);
            config.validate()?;
            Ok(config)
        }
    }
}

fn build_node<B: CanBus>(
    bus: B,
    config: &NodeConfig,
) -> Result<SessionManager<CanBusTransport<B>, RampedMotor>> {
    let transport = CanBusTransport::new(bus, config.can_id)?;
    let node = SessionManager::new(config, transport, |i, address| {
        RampedMotor::new(format!("ch{i}/{address}"))
    })?;
    Ok(node)
}

fn run_node<B: CanBus>(bus: B, config: &NodeConfig, opts: &RunOpts) -> Result<()> {
    let hub = MetricsHub::new()?;
    let mut node = build_node(bus, config)?.with_metrics(hub.sessions.clone());
    info!(
        slots = node.slot_count(),
        can_id = config.can_id,
        device_address = config.device_address,
        "node starting"
    );
    node.announce_reset();

    let mut cadence = Cadence::new(opts.tick, Instant::now());
    let mut ticks_done = 0u64;
    loop {
        let now = Instant::now();
        if let Some(age) = cadence.poll(now) {
            if age {
                node.increment_timeout_counters();
            }
            node.update_processing(true);
            ticks_done += 1;
            if opts.ticks.is_some_and(|n| ticks_done >= n) {
                break;
            }
            continue;
        }
        let wait_ms = u64::try_from(cadence.wait(now).as_millis())
            .unwrap_or(u64::MAX)
            .max(1);
        match node.transport_mut().bus_mut().recv(Some(wait_ms)) {
            Ok(frame) => node.handle_frame(&frame),
            // Backends that do not block on an idle bus return at once
            Err(e) if e.is_timeout() => thread::sleep(cadence.wait(Instant::now())),
            Err(e) => return Err(e).context("receiving from bus"),
        }
    }

    info!(ticks = ticks_done, "node stopped");
    println!("{}", serde_json::to_string_pretty(&node.slots())?);
    if opts.metrics {
        print!("{}", hub.encode_text());
    }
    Ok(())
}

fn decode_frame(data: &[String], json: bool) -> Result<()> {
    let bytes = parse_hex_bytes(data)?;
    let name = bytes.first().map(|&op| opcode::mnemonic(op)).unwrap_or("-");
    match cab_sessions::decode(&bytes)? {
        Some(command) if json => println!("{}", serde_json::to_string(&command)?),
        Some(command) => println!("{name}\t{command:?}"),
        None => println!("{name}\tnot a session command"),
    }
    Ok(())
}

fn config_check(path: &str, json: bool) -> Result<()> {
    let config = cab_sessions::load_config_file(path)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }
    println!(
        "ok: device_address={} can_id={} session_ids={:?} timeout_ticks={} mirror_upstream={}",
        config.device_address,
        config.can_id,
        config.session_ids,
        config.timeout_ticks,
        config.mirror_upstream
    );
    for (i, address) in config.addresses().enumerate() {
        println!("slot {i}\t{address}");
    }
    Ok(())
}

fn replay(from: &str, config: Option<&str>, json: bool) -> Result<()> {
    let config = node_config(config, 0, 2)?;
    let mut node = build_node(can::MockBus::open("replay0")?, &config)?;
    let file = File::open(from).with_context(|| format!("opening script {from}"))?;

    for (n, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        let step = line.split('#').next().unwrap_or_default().trim();
        if step.is_empty() {
            continue;
        }
        if let Some(count) = step.strip_prefix("tick") {
            let count: u32 = match count.trim() {
                "" => 1,
                c => c
                    .parse()
                    .with_context(|| format!("line {}: bad tick count '{c}'", n + 1))?,
            };
            for _ in 0..count {
                node.tick(true);
            }
            println!("tick x{count}");
        } else {
            let items: Vec<String> = step.split_whitespace().map(str::to_string).collect();
            let bytes = parse_hex_bytes(&items).with_context(|| format!("line {}", n + 1))?;
            let name = bytes.first().map(|&op| opcode::mnemonic(op)).unwrap_or("-");
            println!("< {name}\t{}", hex_line(&bytes));
            node.handle(&bytes);
        }
        for frame in node.transport_mut().bus_mut().take_sent() {
            print_frame(&frame);
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&node.slots())?);
    } else {
        for slot in node.slots() {
            let session = slot
                .session
                .map(|s| s.to_string())
                .unwrap_or_else(|| "-".into());
            println!(
                "slot {}\t{}\tsession={session}\ttimeout={}\t{} {}",
                slot.index, slot.address, slot.timeout, slot.direction, slot.speed
            );
        }
    }
    Ok(())
}

fn can_list_backend(backend: Backend) -> Result<()> {
    let buses = match backend {
        Backend::Mock => can::MockBus::list()?,
        Backend::Slcan => can::SlcanBus::list()?,
    };
    for bus in buses {
        println!("{}\t{}", bus.name, bus.driver);
    }
    Ok(())
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Bitrate {
    #[value(name = "10k")]
    B10k,
    #[value(name = "20k")]
    B20k,
    #[value(name = "50k")]
    B50k,
    #[value(name = "100k")]
    B100k,
    #[value(name = "125k")]
    B125k,
    #[value(name = "250k")]
    B250k,
    #[value(name = "500k")]
    B500k,
    #[value(name = "800k")]
    B800k,
    #[value(name = "1m")]
    B1M,
}

impl Bitrate {
    fn into_transport(self) -> can::SlcanBitrate {
        match self {
            Bitrate::B10k => can::SlcanBitrate::B10k,
            Bitrate::B20k => can::SlcanBitrate::B20k,
            Bitrate::B50k => can::SlcanBitrate::B50k,
            Bitrate::B100k => can::SlcanBitrate::B100k,
            Bitrate::B125k => can::SlcanBitrate::B125k,
            Bitrate::B250k => can::SlcanBitrate::B250k,
            Bitrate::B500k => can::SlcanBitrate::B500k,
            Bitrate::B800k => can::SlcanBitrate::B800k,
            Bitrate::B1M => can::SlcanBitrate::B1M,
        }
    }
}

fn parse_hex_bytes(items: &[String]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(items.len());
    for s in items {
        let t = s.trim();
        if t.is_empty() {
            continue;
        }
        let no_prefix = t.strip_prefix("0x").unwrap_or(t);
        let b = u8::from_str_radix(no_prefix, 16)
            .map_err(|e| anyhow::anyhow!("invalid hex byte '{t}': {e}"))?;
        out.push(b);
    }
    Ok(out)
}

fn hex_line(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn print_frame(f: &can::CanFrame) {
    let ts = f
        .timestamp
        .map(|t| {
            t.0.format(&time::format_description::well_known::Rfc3339)
                .unwrap_or_else(|_| "".into())
        })
        .unwrap_or_else(|| "".into());
    let name = f.payload().first().map(|&op| opcode::mnemonic(op)).unwrap_or("-");
    println!("> {name}\t{f}\t{ts}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_items_accept_prefixes_and_blanks() -> Result<()> {
        let items = vec!["0xE1".to_string(), "".to_string(), "c3".to_string()];
        assert_eq!(parse_hex_bytes(&items)?, vec![0xE1, 0xC3]);
        assert!(parse_hex_bytes(&["zz".to_string()]).is_err());
        Ok(())
    }

    #[test]
    fn default_config_is_valid() -> Result<()> {
        let config = node_config(None, 2, 4)?;
        assert_eq!(config.controllers.len(), 4);
        assert_eq!(config.controllers[0].address, 3001);
        Ok(())
    }

    #[test]
    fn mock_node_runs_for_a_few_ticks() -> Result<()> {
        let config = node_config(None, 0, 2)?;
        let mut bus = can::MockBus::open("mock0")?;
        let id = can::CanId::cbus(can::CBUS_DEFAULT_PRIORITY, 9)
            .ok_or_else(|| anyhow::anyhow!("id"))?;
        bus.push_inbound(
            can::CanFrame::new(id, &[0x40, 0xC3, 0xE9]).ok_or_else(|| anyhow::anyhow!("frame"))?,
        );
        let opts = RunOpts {
            tick: Duration::from_millis(1),
            ticks: Some(3),
            metrics: false,
        };
        run_node(bus, &config, &opts)
    }

    #[test]
    fn leases_age_once_a_second_at_any_step_rate() {
        let start = Instant::now();
        let mut cadence = Cadence::new(Duration::from_millis(100), start);
        assert_eq!(cadence.poll(start + Duration::from_millis(50)), None);

        let aged = (1..=30u32)
            .filter_map(|k| cadence.poll(start + Duration::from_millis(100) * k))
            .collect::<Vec<_>>();
        assert_eq!(aged.len(), 30);
        assert_eq!(aged.iter().filter(|&&a| a).count(), 3);
        assert!(aged[9]);
        assert!(!aged[8]);
    }
}
