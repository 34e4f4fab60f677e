//! Declarative configuration schemas.
//!
//! A configuration type lists its attributes once, at compile time, through
//! `#[derive(LinkConfig)]`:
//!
//! ```rust,ignore
//! #[derive(Debug, Clone, ardulink::LinkConfig)]
//! struct SerialConfig {
//!     #[config(choices = Self::ports)]
//!     port: Option<String>,
//!     #[config(min = 1)]
//!     baudrate: u32,
//!     #[config(choices = Self::protocols)]
//!     proto: String,
//! }
//! ```
//!
//! The derive emits an ordered [`AttributeSpec`] table plus get/set/choice
//! dispatch; the [`Configurer`](crate::Configurer) drives it without knowing
//! the concrete type.

use std::any::Any;

mod field;
mod value;

pub use field::{ConfigField, enum_choices, enum_from_value, enum_value, parse_duration};
pub use value::ConfigValue;

use crate::error::ConfigurationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display, strum_macros::AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum AttributeKind {
    String,
    Integer,
    Boolean,
    Enumeration,
    Float,
    Duration,
}

impl AttributeKind {
    pub const fn is_numeric(&self) -> bool {
        matches!(self, AttributeKind::Integer | AttributeKind::Float)
    }
}

/// Static descriptor of one attribute, in declaration order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttributeSpec {
    pub name: &'static str,
    pub kind: AttributeKind,
    pub description: Option<&'static str>,
    /// Attributes whose current values the choice list is computed from.
    pub depends_on: &'static [&'static str],
    pub has_choices: bool,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

/// Bounds surfaced for external validation; never enforced by the configurer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ValidationInfo {
    None,
    Number { min: f64, max: f64 },
}

impl AttributeSpec {
    #[allow(clippy::cast_precision_loss)]
    pub fn validation_info(&self) -> ValidationInfo {
        match self.kind {
            AttributeKind::Integer => ValidationInfo::Number {
                min: self.min.unwrap_or(i64::MIN as f64),
                max: self.max.unwrap_or(i64::MAX as f64),
            },
            AttributeKind::Float => ValidationInfo::Number {
                min: self.min.unwrap_or(f64::MIN),
                max: self.max.unwrap_or(f64::MAX),
            },
            _ => ValidationInfo::None,
        }
    }
}

/// Implemented by `#[derive(LinkConfig)]`.
pub trait LinkConfig: Clone + Send + 'static {
    fn attributes() -> &'static [AttributeSpec];

    /// Current value of `name`; `None` for null (or an unknown name).
    fn value(&self, name: &str) -> Option<ConfigValue>;

    fn set_value(
        &mut self,
        name: &str,
        value: Option<ConfigValue>,
    ) -> Result<(), ConfigurationError>;

    /// `None` when the attribute has no choice list.
    fn choices(&self, name: &str) -> Option<Vec<ConfigValue>>;
}

/// Object-safe view of a [`LinkConfig`], used behind `Box<dyn DynConfig>`.
pub trait DynConfig: Send {
    fn attributes(&self) -> &'static [AttributeSpec];
    fn value(&self, name: &str) -> Option<ConfigValue>;
    fn set_value(
        &mut self,
        name: &str,
        value: Option<ConfigValue>,
    ) -> Result<(), ConfigurationError>;
    fn choices(&self, name: &str) -> Option<Vec<ConfigValue>>;
    fn clone_box(&self) -> Box<dyn DynConfig>;
    /// Consumes the box so the owning factory can downcast to its config type.
    fn into_any(self: Box<Self>) -> Box<dyn Any + Send>;
}

impl<C: LinkConfig> DynConfig for C {
    fn attributes(&self) -> &'static [AttributeSpec] {
        C::attributes()
    }

    fn value(&self, name: &str) -> Option<ConfigValue> {
        LinkConfig::value(self, name)
    }

    fn set_value(
        &mut self,
        name: &str,
        value: Option<ConfigValue>,
    ) -> Result<(), ConfigurationError> {
        LinkConfig::set_value(self, name, value)
    }

    fn choices(&self, name: &str) -> Option<Vec<ConfigValue>> {
        LinkConfig::choices(self, name)
    }

    fn clone_box(&self) -> Box<dyn DynConfig> {
        Box::new(self.clone())
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }
}

/// One attribute of a [`ConfigSchema`], with the factory's default value.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaEntry {
    pub spec: AttributeSpec,
    pub default: Option<ConfigValue>,
}

/// The configurable attributes of one factory, in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigSchema {
    factory: String,
    entries: Vec<SchemaEntry>,
}

impl ConfigSchema {
    pub(crate) fn new(factory: String, defaults: &dyn DynConfig) -> Self {
        let entries = defaults
            .attributes()
            .iter()
            .map(|spec| SchemaEntry {
                spec: *spec,
                default: defaults.value(spec.name),
            })
            .collect();
        Self { factory, entries }
    }

    pub fn factory(&self) -> &str {
        &self.factory
    }

    pub fn entries(&self) -> &[SchemaEntry] {
        &self.entries
    }

    pub fn get(&self, name: &str) -> Option<&SchemaEntry> {
        self.entries.iter().find(|e| e.spec.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|e| e.spec.name)
    }
}
