use std::{
    fmt,
    hash::{Hash, Hasher},
    time::Duration,
};

/// A dynamically typed attribute value.
///
/// Floats compare and hash by bit pattern so values can take part in a
/// [`ConfigurationIdentity`](crate::ConfigurationIdentity). Integers are
/// wide enough to hold every `i64` and `u64` without loss.
#[derive(Debug, Clone)]
pub enum ConfigValue {
    Str(String),
    Int(i128),
    Bool(bool),
    Float(f64),
    Duration(Duration),
    Enum(String),
}

impl PartialEq for ConfigValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ConfigValue::Str(a), ConfigValue::Str(b)) => a == b,
            (ConfigValue::Int(a), ConfigValue::Int(b)) => a == b,
            (ConfigValue::Bool(a), ConfigValue::Bool(b)) => a == b,
            (ConfigValue::Float(a), ConfigValue::Float(b)) => a.to_bits() == b.to_bits(),
            (ConfigValue::Duration(a), ConfigValue::Duration(b)) => a == b,
            (ConfigValue::Enum(a), ConfigValue::Enum(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for ConfigValue {}

impl Hash for ConfigValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            ConfigValue::Str(s) | ConfigValue::Enum(s) => s.hash(state),
            ConfigValue::Int(i) => i.hash(state),
            ConfigValue::Bool(b) => b.hash(state),
            ConfigValue::Float(f) => f.to_bits().hash(state),
            ConfigValue::Duration(d) => d.hash(state),
        }
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::Str(s) | ConfigValue::Enum(s) => f.write_str(s),
            ConfigValue::Int(i) => write!(f, "{i}"),
            ConfigValue::Bool(b) => write!(f, "{b}"),
            ConfigValue::Float(v) => write!(f, "{v}"),
            ConfigValue::Duration(d) => write!(f, "{d:?}"),
        }
    }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self {
        ConfigValue::Str(value)
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        ConfigValue::Str(value.to_string())
    }
}

impl From<&String> for ConfigValue {
    fn from(value: &String) -> Self {
        ConfigValue::Str(value.clone())
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        ConfigValue::Bool(value)
    }
}

impl From<f64> for ConfigValue {
    fn from(value: f64) -> Self {
        ConfigValue::Float(value)
    }
}

impl From<f32> for ConfigValue {
    fn from(value: f32) -> Self {
        ConfigValue::Float(f64::from(value))
    }
}

impl From<Duration> for ConfigValue {
    fn from(value: Duration) -> Self {
        ConfigValue::Duration(value)
    }
}

macro_rules! int_into_value {
    ($($t:ty),*) => {
        $(
            impl From<$t> for ConfigValue {
                fn from(value: $t) -> Self {
                    ConfigValue::Int(i128::from(value))
                }
            }
        )*
    };
}

int_into_value!(i8, i16, i32, i64, u8, u16, u32, u64);

// Pointer-sized integers have no `From` into `i128`; every supported target
// fits them.
impl From<usize> for ConfigValue {
    #[allow(clippy::cast_possible_wrap)]
    fn from(value: usize) -> Self {
        ConfigValue::Int(value as i128)
    }
}

impl From<isize> for ConfigValue {
    fn from(value: isize) -> Self {
        ConfigValue::Int(value as i128)
    }
}
