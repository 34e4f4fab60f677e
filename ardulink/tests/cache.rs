#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use std::sync::{Arc, Barrier};

use anyhow::anyhow;
use ardulink::{
    ConfigValue, ConfigurationError, Connection, ConnectionError, Inbound, LinkConfig,
    LinkCreationError, LinkError, LinkFactory, LinkParts, LinkRegistry, Links, protocol,
};
use common::{DummyFactory, dummy_registry, init_tracing};

#[test]
fn defaulted_and_explicit_parameters_share_a_link() {
    init_tracing();
    let (registry, probe) = dummy_registry();
    let links = Links::new(registry);

    let explicit = links.get_link("ardulink://dummy?a=&b=42&c=").unwrap();
    let defaulted = links.get_link("ardulink://dummy").unwrap();

    assert!(explicit.shares_connection_with(&defaulted));
    assert_eq!(probe.opened(), 1);
    assert_eq!(links.cache().len(), 1);
}

#[test]
fn parameter_order_does_not_matter() {
    let (registry, probe) = dummy_registry();
    let links = Links::new(registry);

    let first = links.get_link("ardulink://dummy?b=7&retries=5").unwrap();
    let second = links.get_link("ardulink://dummy?retries=5&b=7").unwrap();

    assert!(first.shares_connection_with(&second));
    assert_eq!(probe.opened(), 1);
}

#[test]
fn different_values_open_different_links() {
    let (registry, probe) = dummy_registry();
    let links = Links::new(registry);

    let first = links.get_link("ardulink://dummy?b=1").unwrap();
    let second = links.get_link("ardulink://dummy?b=2").unwrap();

    assert!(!first.shares_connection_with(&second));
    assert_eq!(probe.opened(), 2);
    assert_eq!(links.cache().len(), 2);
}

#[test]
fn connection_closes_once_after_last_handle() {
    init_tracing();
    let (registry, probe) = dummy_registry();
    let links = Links::new(registry);

    let handles: Vec<_> = (0..3)
        .map(|_| links.get_link("ardulink://dummy").unwrap())
        .collect();
    let connection = probe.connection(0);

    handles[0].close().unwrap();
    handles[1].close().unwrap();
    assert_eq!(connection.closes(), 0);
    assert_eq!(links.cache().len(), 1);

    handles[2].close().unwrap();
    assert_eq!(connection.closes(), 1);
    assert!(links.cache().is_empty());

    // One close too many is a no-op.
    handles[2].close().unwrap();
    handles[0].close().unwrap();
    drop(handles);
    assert_eq!(connection.closes(), 1);
}

#[test]
fn dropping_a_handle_releases_it() {
    let (registry, probe) = dummy_registry();
    let links = Links::new(registry);

    let kept = links.get_link("ardulink://dummy").unwrap();
    drop(links.get_link("ardulink://dummy").unwrap());
    assert_eq!(probe.connection(0).closes(), 0);

    let mut configurer = links.registry().configurer("ardulink://dummy").unwrap();
    let identity = configurer.unique_identifier();
    assert_eq!(links.cache().ref_count(&identity), 1);

    drop(kept);
    assert_eq!(probe.connection(0).closes(), 1);
    assert!(!links.cache().contains(&identity));

    // A new request after eviction opens a fresh connection.
    let reopened = links.get_link_with(&mut configurer).unwrap();
    assert!(!reopened.is_closed());
    assert_eq!(probe.opened(), 2);
}

#[test]
fn failed_creation_leaves_nothing_cached() {
    let mut registry = LinkRegistry::new();
    registry
        .register(DummyFactory::new("dummy").failing())
        .unwrap();
    let links = Links::new(registry);

    let err = links.get_link("ardulink://dummy").unwrap_err();
    assert!(matches!(
        err,
        LinkError::Creation(LinkCreationError { ref factory, .. }) if factory == "dummy"
    ));
    assert!(err.to_string().contains("not present"));
    assert!(links.cache().is_empty());
}

#[test]
fn invalid_choice_fails_before_opening() {
    let (registry, probe) = dummy_registry();
    let links = Links::new(registry);

    let err = links
        .get_link("ardulink://dummy?port=/dev/ttyACM0")
        .unwrap_err();
    match err {
        LinkError::Configuration(ConfigurationError::InvalidChoice { attribute, .. }) => {
            assert_eq!(attribute, "port");
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(probe.opened(), 0);
    assert!(links.cache().is_empty());
}

#[test]
fn concurrent_requests_open_one_link() {
    init_tracing();
    let (registry, probe) = dummy_registry();
    let links = Links::new(registry);
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = std::thread::scope(|scope| {
        let workers: Vec<_> = (0..8)
            .map(|_| {
                let barrier = Arc::clone(&barrier);
                let links = &links;
                scope.spawn(move || {
                    barrier.wait();
                    links.get_link("ardulink://dummy?b=42").unwrap()
                })
            })
            .collect();
        workers.into_iter().map(|w| w.join().unwrap()).collect()
    });

    assert_eq!(probe.opened(), 1);
    assert!(handles.iter().all(|h| h.shares_connection_with(&handles[0])));

    let identity = links
        .registry()
        .configurer("ardulink://dummy")
        .unwrap()
        .unique_identifier();
    assert_eq!(links.cache().ref_count(&identity), 8);

    std::thread::scope(|scope| {
        for handle in &handles {
            scope.spawn(move || handle.close().unwrap());
        }
    });
    assert_eq!(probe.connection(0).closes(), 1);
    assert!(links.cache().is_empty());
}

#[test]
fn uncached_links_close_with_their_handle() {
    let (registry, probe) = dummy_registry();

    let mut configurer = registry.configurer("ardulink://dummy").unwrap();
    let first = configurer.new_link().unwrap();
    let second = configurer.new_link().unwrap();

    assert!(!first.shares_connection_with(&second));
    first.close().unwrap();
    assert_eq!(probe.connection(0).closes(), 1);
    assert_eq!(probe.connection(1).closes(), 0);
}

#[derive(Debug, Clone, Default, LinkConfig)]
struct BoardConfig {
    serial_number: u64,
}

struct SilentConnection;

impl Connection for SilentConnection {
    fn write(&self, _bytes: &[u8]) -> Result<(), ConnectionError> {
        Ok(())
    }

    fn attach(&self, _inbound: Inbound) {}

    fn close(&self) -> Result<(), ConnectionError> {
        Ok(())
    }
}

/// Opens one silent connection per distinct board serial number.
struct BoardFactory;

impl LinkFactory for BoardFactory {
    type Config = BoardConfig;

    fn name(&self) -> &str {
        "board"
    }

    fn new_config(&self) -> BoardConfig {
        BoardConfig::default()
    }

    fn new_link(&self, _config: BoardConfig) -> anyhow::Result<LinkParts> {
        let protocol = protocol::by_name("ardulink2").ok_or_else(|| anyhow!("no protocol"))?;
        Ok(LinkParts {
            connection: Box::new(SilentConnection),
            processor: protocol.new_processor(),
        })
    }
}

#[test]
fn large_unsigned_values_keep_links_apart() {
    let mut registry = LinkRegistry::new();
    registry.register(BoardFactory).unwrap();
    let links = Links::new(registry);

    let low = "ardulink://board?serial_number=9223372036854775808";
    let high = "ardulink://board?serial_number=18446744073709551615";
    let low_config = links.registry().configurer(low).unwrap();
    let high_config = links.registry().configurer(high).unwrap();

    assert_eq!(
        high_config.value("serial_number").unwrap(),
        Some(ConfigValue::from(u64::MAX))
    );
    assert_eq!(
        low_config.value("serial_number").unwrap(),
        Some(ConfigValue::from(1u64 << 63))
    );
    assert_ne!(low_config.unique_identifier(), high_config.unique_identifier());

    let first = links.get_link(low).unwrap();
    let second = links.get_link(high).unwrap();
    assert!(!first.shares_connection_with(&second));
    assert_eq!(links.cache().len(), 2);
}
