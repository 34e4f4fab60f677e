#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use anyhow::{anyhow, bail};
use ardulink::{
    Connection, ConnectionError, Inbound, LinkConfig, LinkFactory, LinkParts, LinkRegistry,
    protocol,
};
use parking_lot::Mutex;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// What a [`RecordingConnection`] saw, shared with the test.
#[derive(Default)]
pub struct ConnectionState {
    writes: Mutex<Vec<String>>,
    closes: AtomicUsize,
    inbound: Mutex<Option<Inbound>>,
}

impl ConnectionState {
    pub fn writes(&self) -> Vec<String> {
        self.writes.lock().clone()
    }

    /// How often exactly `record` (terminator excluded) was written.
    pub fn count(&self, record: &str) -> usize {
        self.writes
            .lock()
            .iter()
            .filter(|w| w.trim_end_matches('\n') == record)
            .count()
    }

    pub fn clear_writes(&self) {
        self.writes.lock().clear();
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Pushes bytes as if the device had sent them.
    pub fn feed(&self, bytes: &[u8]) -> bool {
        let inbound = self.inbound.lock().clone();
        inbound.expect("connection not attached").deliver(bytes)
    }
}

pub struct RecordingConnection {
    state: Arc<ConnectionState>,
}

impl Connection for RecordingConnection {
    fn write(&self, bytes: &[u8]) -> Result<(), ConnectionError> {
        if self.state.closes() > 0 {
            return Err(ConnectionError::Closed);
        }
        self.state
            .writes
            .lock()
            .push(String::from_utf8_lossy(bytes).into_owned());
        Ok(())
    }

    fn attach(&self, inbound: Inbound) {
        *self.state.inbound.lock() = Some(inbound);
    }

    fn close(&self) -> Result<(), ConnectionError> {
        self.state.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Connections opened by a [`DummyFactory`], in opening order.
#[derive(Clone, Default)]
pub struct Probe(Arc<Mutex<Vec<Arc<ConnectionState>>>>);

impl Probe {
    pub fn opened(&self) -> usize {
        self.0.lock().len()
    }

    pub fn connection(&self, index: usize) -> Arc<ConnectionState> {
        Arc::clone(&self.0.lock()[index])
    }

    pub fn last(&self) -> Arc<ConnectionState> {
        Arc::clone(self.0.lock().last().expect("no connection opened"))
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    strum_macros::EnumString,
    strum_macros::AsRefStr,
    strum_macros::VariantNames,
)]
pub enum Parity {
    No,
    Even,
    Odd,
}

#[derive(Debug, Clone, LinkConfig)]
pub struct DummyConfig {
    pub a: String,
    #[config(description = "Answer to everything")]
    pub b: i32,
    pub c: String,
    #[config(choices = Self::protocols)]
    pub proto: String,
    pub bus: String,
    #[config(choices = Self::ports, depends_on = ["bus"])]
    pub port: Option<String>,
    #[config(min = 1, max = 10)]
    pub retries: u8,
    pub timeout: Duration,
    pub verbose: bool,
    #[config(enumeration)]
    pub parity: Parity,
    #[config(skip)]
    pub opened_by: Option<String>,
}

impl DummyConfig {
    fn protocols(&self) -> Vec<String> {
        protocol::names()
    }

    fn ports(&self) -> Vec<&'static str> {
        match self.bus.as_str() {
            "usb" => vec!["/dev/ttyUSB0", "/dev/ttyUSB1"],
            "acm" => vec!["/dev/ttyACM0"],
            _ => Vec::new(),
        }
    }
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self {
            a: String::new(),
            b: 42,
            c: String::new(),
            proto: "ardulink2".to_string(),
            bus: "usb".to_string(),
            port: None,
            retries: 3,
            timeout: Duration::from_secs(1),
            verbose: false,
            parity: Parity::No,
            opened_by: None,
        }
    }
}

pub struct DummyFactory {
    name: &'static str,
    aliases: &'static [&'static str],
    fail: bool,
    probe: Probe,
}

impl DummyFactory {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            aliases: &[],
            fail: false,
            probe: Probe::default(),
        }
    }

    pub fn with_aliases(mut self, aliases: &'static [&'static str]) -> Self {
        self.aliases = aliases;
        self
    }

    /// Every `new_link` fails, as with an absent device.
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn probe(&self) -> Probe {
        self.probe.clone()
    }
}

impl LinkFactory for DummyFactory {
    type Config = DummyConfig;

    fn name(&self) -> &str {
        self.name
    }

    fn aliases(&self) -> &[&'static str] {
        self.aliases
    }

    fn new_config(&self) -> DummyConfig {
        DummyConfig::default()
    }

    fn new_link(&self, config: DummyConfig) -> anyhow::Result<LinkParts> {
        if self.fail {
            bail!("device {} not present", config.port.as_deref().unwrap_or("<none>"));
        }
        let protocol = protocol::by_name(&config.proto)
            .ok_or_else(|| anyhow!("unknown protocol {}", config.proto))?;

        let state = Arc::new(ConnectionState::default());
        self.probe.0.lock().push(Arc::clone(&state));
        Ok(LinkParts {
            connection: Box::new(RecordingConnection { state }),
            processor: protocol.new_processor(),
        })
    }
}

/// A registry holding one `dummy` factory, plus its probe.
pub fn dummy_registry() -> (LinkRegistry, Probe) {
    let factory = DummyFactory::new("dummy");
    let probe = factory.probe();
    let mut registry = LinkRegistry::new();
    registry.register(factory).unwrap();
    (registry, probe)
}
