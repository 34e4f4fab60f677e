//! Conversions between typed configuration fields and [`ConfigValue`].
//!
//! `#[derive(LinkConfig)]` dispatches through [`ConfigField`] for plain
//! fields and through the `enum_*` helpers for `#[config(enumeration)]`
//! fields.

use std::{str::FromStr, time::Duration};

use strum::VariantNames;

use super::{AttributeKind, ConfigValue};
use crate::error::ConfigurationError;

pub trait ConfigField: Sized {
    const KIND: AttributeKind;

    /// `None` is the null value.
    fn to_config_value(&self) -> Option<ConfigValue>;

    /// Converts a (possibly textual) value into the field type. The error is
    /// a human readable reason, the caller adds the attribute name.
    fn from_config_value(value: Option<ConfigValue>) -> Result<Self, String>;
}

fn null_rejected() -> String {
    "value must not be null".to_string()
}

impl ConfigField for String {
    const KIND: AttributeKind = AttributeKind::String;

    fn to_config_value(&self) -> Option<ConfigValue> {
        Some(ConfigValue::Str(self.clone()))
    }

    fn from_config_value(value: Option<ConfigValue>) -> Result<Self, String> {
        match value {
            Some(ConfigValue::Str(s)) | Some(ConfigValue::Enum(s)) => Ok(s),
            Some(other) => Ok(other.to_string()),
            None => Err(null_rejected()),
        }
    }
}

impl ConfigField for bool {
    const KIND: AttributeKind = AttributeKind::Boolean;

    fn to_config_value(&self) -> Option<ConfigValue> {
        Some(ConfigValue::Bool(*self))
    }

    fn from_config_value(value: Option<ConfigValue>) -> Result<Self, String> {
        match value {
            Some(ConfigValue::Bool(b)) => Ok(b),
            Some(ConfigValue::Str(raw)) => match raw.trim().to_ascii_lowercase().as_str() {
                "true" => Ok(true),
                "false" => Ok(false),
                _ => Err(format!("'{raw}' is not a boolean (expected true or false)")),
            },
            Some(other) => Err(format!("expected a boolean but got {other}")),
            None => Err(null_rejected()),
        }
    }
}

macro_rules! integer_field {
    ($($t:ty),*) => {
        $(
            impl ConfigField for $t {
                const KIND: AttributeKind = AttributeKind::Integer;

                fn to_config_value(&self) -> Option<ConfigValue> {
                    Some(ConfigValue::from(*self))
                }

                fn from_config_value(value: Option<ConfigValue>) -> Result<Self, String> {
                    match value {
                        Some(ConfigValue::Int(v)) => <$t>::try_from(v)
                            .map_err(|_| format!("{v} is out of range for {}", stringify!($t))),
                        Some(ConfigValue::Str(raw)) => raw
                            .trim()
                            .parse::<$t>()
                            .map_err(|e| format!("'{raw}' is not a valid {}: {e}", stringify!($t))),
                        Some(other) => Err(format!("expected an integer but got {other}")),
                        None => Err(null_rejected()),
                    }
                }
            }
        )*
    };
}

integer_field!(i8, i16, i32, i64, u8, u16, u32, u64, usize, isize);

macro_rules! float_field {
    ($($t:ty),*) => {
        $(
            impl ConfigField for $t {
                const KIND: AttributeKind = AttributeKind::Float;

                fn to_config_value(&self) -> Option<ConfigValue> {
                    Some(ConfigValue::from(*self))
                }

                #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
                fn from_config_value(value: Option<ConfigValue>) -> Result<Self, String> {
                    match value {
                        Some(ConfigValue::Float(v)) => Ok(v as $t),
                        Some(ConfigValue::Int(v)) => Ok(v as $t),
                        Some(ConfigValue::Str(raw)) => raw
                            .trim()
                            .parse::<$t>()
                            .map_err(|e| format!("'{raw}' is not a valid number: {e}")),
                        Some(other) => Err(format!("expected a number but got {other}")),
                        None => Err(null_rejected()),
                    }
                }
            }
        )*
    };
}

float_field!(f32, f64);

impl ConfigField for Duration {
    const KIND: AttributeKind = AttributeKind::Duration;

    fn to_config_value(&self) -> Option<ConfigValue> {
        Some(ConfigValue::Duration(*self))
    }

    fn from_config_value(value: Option<ConfigValue>) -> Result<Self, String> {
        match value {
            Some(ConfigValue::Duration(d)) => Ok(d),
            Some(ConfigValue::Int(ms)) => u64::try_from(ms)
                .map(Duration::from_millis)
                .map_err(|_| format!("{ms} is not a valid duration")),
            Some(ConfigValue::Str(raw)) => parse_duration(&raw),
            Some(other) => Err(format!("expected a duration but got {other}")),
            None => Err(null_rejected()),
        }
    }
}

impl<T: ConfigField> ConfigField for Option<T> {
    const KIND: AttributeKind = T::KIND;

    fn to_config_value(&self) -> Option<ConfigValue> {
        self.as_ref().and_then(T::to_config_value)
    }

    fn from_config_value(value: Option<ConfigValue>) -> Result<Self, String> {
        match value {
            None => Ok(None),
            Some(ConfigValue::Str(raw)) if raw.is_empty() => Ok(None),
            Some(v) => T::from_config_value(Some(v)).map(Some),
        }
    }
}

/// Parses `<integer>[ns|us|ms|s|m|h]`, a missing unit meaning milliseconds.
pub fn parse_duration(raw: &str) -> Result<Duration, String> {
    let trimmed = raw.trim();
    let split = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    let (digits, unit) = trimmed.split_at(split);
    let amount: u64 = digits
        .parse()
        .map_err(|_| format!("'{raw}' is not a valid duration"))?;
    let duration = match unit.trim() {
        "ns" => Duration::from_nanos(amount),
        "us" => Duration::from_micros(amount),
        "" | "ms" => Duration::from_millis(amount),
        "s" => Duration::from_secs(amount),
        "m" => Duration::from_secs(amount.saturating_mul(60)),
        "h" => Duration::from_secs(amount.saturating_mul(3600)),
        other => return Err(format!("unknown duration unit '{other}' in '{raw}'")),
    };
    Ok(duration)
}

pub fn enum_value<T: AsRef<str>>(value: &T) -> ConfigValue {
    ConfigValue::Enum(value.as_ref().to_string())
}

pub fn enum_choices<T: VariantNames>() -> Vec<ConfigValue> {
    T::VARIANTS
        .iter()
        .map(|name| ConfigValue::Enum((*name).to_string()))
        .collect()
}

pub fn enum_from_value<T>(
    attribute: &str,
    value: Option<ConfigValue>,
) -> Result<T, ConfigurationError>
where
    T: FromStr + VariantNames,
{
    match value {
        Some(ConfigValue::Enum(name)) | Some(ConfigValue::Str(name)) => {
            name.parse::<T>().map_err(|_| ConfigurationError::InvalidChoice {
                attribute: attribute.to_string(),
                value: name,
                valid: T::VARIANTS.iter().map(|v| (*v).to_string()).collect(),
            })
        }
        Some(other) => Err(ConfigurationError::InvalidValue {
            attribute: attribute.to_string(),
            reason: format!("expected one of {:?} but got {other}", T::VARIANTS),
        }),
        None => Err(ConfigurationError::InvalidValue {
            attribute: attribute.to_string(),
            reason: null_rejected(),
        }),
    }
}
