use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};

#[derive(Clone)]
pub struct SessionMetrics {
    pub frames_rx: IntCounter,
    pub frames_tx: IntCounter,
    pub tx_failures: IntCounter,
    pub sessions_allocated: IntCounter,
    pub sessions_stolen: IntCounter,
    pub sessions_evicted: IntCounter,
    pub active_sessions: IntGauge,
}

#[derive(Clone)]
pub struct MetricsHub {
    pub registry: Registry,
    pub sessions: SessionMetrics,
}

impl MetricsHub {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();
        let counter = |name: &str, help: &str| -> prometheus::Result<IntCounter> {
            let c = IntCounter::new(name, help)?;
            registry.register(Box::new(c.clone()))?;
            Ok(c)
        };
        let sessions = SessionMetrics {
            frames_rx: counter("dcnode_frames_rx", "CBUS frames received")?,
            frames_tx: counter("dcnode_frames_tx", "CBUS frames sent")?,
            tx_failures: counter("dcnode_tx_failures", "CBUS frames the bus refused")?,
            sessions_allocated: counter("dcnode_sessions_allocated", "Loco sessions allocated")?,
            sessions_stolen: counter("dcnode_sessions_stolen", "Loco sessions taken over by steal")?,
            sessions_evicted: counter(
                "dcnode_sessions_evicted",
                "Loco sessions cancelled for missing keepalives",
            )?,
            active_sessions: IntGauge::new("dcnode_active_sessions", "Slots currently leased")?,
        };
        registry.register(Box::new(sessions.active_sessions.clone()))?;
        Ok(Self { registry, sessions })
    }

    pub fn encode_text(&self) -> String {
        let mut buf = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buf) {
            return format!("error encoding metrics: {e}");
        }
        String::from_utf8(buf).unwrap_or_default()
    }
}
