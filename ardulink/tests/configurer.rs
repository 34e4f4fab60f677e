#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use std::time::Duration;

use ardulink::{
    AttributeKind, ConfigValue, ConfigurationError, LinkConfig, LinkError, ValidationInfo,
};
use common::{DummyConfig, dummy_registry};

#[test]
fn attributes_keep_declaration_order() {
    let (registry, _) = dummy_registry();
    let configurer = registry.configurer("ardulink://dummy").unwrap();
    assert_eq!(
        configurer.attributes(),
        vec!["a", "b", "c", "proto", "bus", "port", "retries", "timeout", "verbose", "parity"]
    );
    assert_eq!(configurer.factory_name(), "dummy");
}

#[test]
fn attribute_describes_itself() {
    let (registry, _) = dummy_registry();
    let mut configurer = registry.configurer("ardulink://dummy?b=7").unwrap();

    let b = configurer.attribute("b").unwrap();
    assert_eq!(b.kind(), AttributeKind::Integer);
    assert_eq!(b.description(), Some("Answer to everything"));
    assert_eq!(b.value(), Some(ConfigValue::Int(7)));
    assert_eq!(b.default_value(), Some(ConfigValue::Int(42)));
    assert!(!b.has_choice_values());

    let retries = configurer.attribute("retries").unwrap();
    assert_eq!(retries.validation_info(), ValidationInfo::Number { min: 1.0, max: 10.0 });

    let timeout = configurer.attribute("timeout").unwrap();
    assert_eq!(timeout.kind(), AttributeKind::Duration);
    assert_eq!(timeout.validation_info(), ValidationInfo::None);

    let mut parity = configurer.attribute("parity").unwrap();
    assert_eq!(parity.kind(), AttributeKind::Enumeration);
    assert!(parity.has_choice_values());
    assert_eq!(
        parity.choice_values().unwrap(),
        vec![
            ConfigValue::Enum("No".into()),
            ConfigValue::Enum("Even".into()),
            ConfigValue::Enum("Odd".into()),
        ]
    );

    let port = configurer.attribute("port").unwrap();
    assert_eq!(port.kind(), AttributeKind::String);
    assert_eq!(port.value(), None);
    assert_eq!(port.choice_depends_on(), &["bus"]);
}

#[test]
fn unknown_attribute_lists_available_ones() {
    let (registry, _) = dummy_registry();
    let mut configurer = registry.configurer("ardulink://dummy").unwrap();
    match configurer.attribute("baudrate").unwrap_err() {
        ConfigurationError::UnknownAttribute { attribute, available } => {
            assert_eq!(attribute, "baudrate");
            assert_eq!(available.len(), 10);
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert!(configurer.set_value("opened_by", "me").is_err());
}

#[test]
fn dependent_choices_are_recomputed() {
    let (registry, _) = dummy_registry();
    let mut configurer = registry.configurer("ardulink://dummy").unwrap();

    assert_eq!(
        configurer.choice_values("port").unwrap().unwrap(),
        vec![
            ConfigValue::from("/dev/ttyUSB0"),
            ConfigValue::from("/dev/ttyUSB1")
        ]
    );
    configurer.set_value("bus", "acm").unwrap();
    assert_eq!(
        configurer.choice_values("port").unwrap().unwrap(),
        vec![ConfigValue::from("/dev/ttyACM0")]
    );
    assert_eq!(configurer.choice_values("b").unwrap(), None);
}

#[test]
fn choice_validation_is_deferred_to_link_creation() {
    let (registry, probe) = dummy_registry();
    let mut configurer = registry.configurer("ardulink://dummy").unwrap();

    // Accepted although not a current choice of port.
    configurer.set_value("port", "/dev/ttyACM0").unwrap();
    match configurer.new_link().unwrap_err() {
        LinkError::Configuration(ConfigurationError::InvalidChoice {
            attribute,
            value,
            valid,
        }) => {
            assert_eq!(attribute, "port");
            assert_eq!(value, "/dev/ttyACM0");
            assert_eq!(valid, vec!["/dev/ttyUSB0", "/dev/ttyUSB1"]);
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(probe.opened(), 0);

    // Setting the dependency afterwards makes the same value valid.
    configurer.set_value("bus", "acm").unwrap();
    configurer.validate().unwrap();
    let link = configurer.new_link().unwrap();
    assert!(!link.is_closed());
    assert_eq!(probe.opened(), 1);
}

#[test]
fn protocol_must_be_a_registered_one() {
    let (registry, _) = dummy_registry();
    let mut configurer = registry.configurer("ardulink://dummy?proto=firmata").unwrap();
    match configurer.validate().unwrap_err() {
        ConfigurationError::InvalidChoice { valid, .. } => {
            assert!(valid.contains(&"ardulink2".to_string()));
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn null_values_skip_choice_checks() {
    let (registry, _) = dummy_registry();
    let mut configurer = registry.configurer("ardulink://dummy?port=/dev/ttyUSB1").unwrap();
    configurer.clear_value("port").unwrap();
    assert_eq!(configurer.value("port").unwrap(), None);
    configurer.validate().unwrap();

    // Non-optional fields reject null.
    assert!(matches!(
        configurer.clear_value("b"),
        Err(ConfigurationError::InvalidValue { ref attribute, .. }) if attribute == "b"
    ));
}

#[test]
fn typed_values_are_accepted_directly() {
    let (registry, _) = dummy_registry();
    let mut configurer = registry.configurer("ardulink://dummy").unwrap();

    configurer.set_value("timeout", Duration::from_millis(250)).unwrap();
    configurer.set_value("retries", 9u8).unwrap();
    configurer.attribute("verbose").unwrap().set_value(true).unwrap();

    assert_eq!(
        configurer.value("timeout").unwrap(),
        Some(ConfigValue::Duration(Duration::from_millis(250)))
    );
    assert_eq!(configurer.value("retries").unwrap(), Some(ConfigValue::Int(9)));
    assert_eq!(configurer.value("verbose").unwrap(), Some(ConfigValue::Bool(true)));
    assert!(configurer.set_value("retries", 300).is_err());
}

#[test]
fn identities_follow_value_snapshots() {
    let (registry, _) = dummy_registry();
    let mut first = registry.configurer("ardulink://dummy").unwrap();
    let second = registry.configurer("ardulink://dummy?b=42&a=").unwrap();
    assert_eq!(first.unique_identifier(), second.unique_identifier());

    first.set_value("c", "changed").unwrap();
    assert_ne!(first.unique_identifier(), second.unique_identifier());

    let identity = first.unique_identifier();
    assert_eq!(identity.factory(), "dummy");
    assert_eq!(identity.values()[2], ("c", Some(ConfigValue::from("changed"))));
}

#[test]
fn schema_reports_defaults() {
    let (registry, _) = dummy_registry();
    let configurer = registry.configurer("ardulink://dummy?b=1").unwrap();
    let schema = configurer.schema();

    assert_eq!(schema.factory(), "dummy");
    assert_eq!(schema.names().count(), 10);
    let b = schema.get("b").unwrap();
    assert_eq!(b.default, Some(ConfigValue::Int(42)));
    assert_eq!(b.spec.kind, AttributeKind::Integer);
    assert_eq!(schema.get("port").unwrap().default, None);
}

#[test]
fn derived_table_matches_the_struct() {
    let specs = DummyConfig::attributes();
    assert_eq!(specs.len(), 10);
    assert!(specs.iter().all(|s| s.name != "opened_by"));

    let port = specs.iter().find(|s| s.name == "port").unwrap();
    assert!(port.has_choices);
    assert_eq!(port.depends_on, &["bus"]);

    let mut config = DummyConfig::default();
    LinkConfig::set_value(&mut config, "a", Some("x".into())).unwrap();
    assert_eq!(config.a, "x");
    assert_eq!(LinkConfig::value(&config, "missing"), None);
}
