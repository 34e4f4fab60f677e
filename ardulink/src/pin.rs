use std::fmt;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    strum_macros::Display,
    strum_macros::AsRefStr,
)]
#[strum(serialize_all = "lowercase")]
pub enum PinKind {
    Digital,
    Analog,
}

/// An addressable I/O line on the device.
///
/// Equality and ordering are structural over `(kind, index)`, so
/// `Pin::digital(1)` and `Pin::analog(1)` are distinct pins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pin {
    kind: PinKind,
    index: u32,
}

impl Pin {
    pub const fn digital(index: u32) -> Self {
        Self {
            kind: PinKind::Digital,
            index,
        }
    }

    pub const fn analog(index: u32) -> Self {
        Self {
            kind: PinKind::Analog,
            index,
        }
    }

    pub const fn kind(&self) -> PinKind {
        self.kind
    }

    pub const fn index(&self) -> u32 {
        self.index
    }

    pub const fn is_digital(&self) -> bool {
        matches!(self.kind, PinKind::Digital)
    }

    pub const fn is_analog(&self) -> bool {
        matches!(self.kind, PinKind::Analog)
    }
}

impl fmt::Display for Pin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind, self.index)
    }
}

/// The state carried by a pin change, matching the pin's kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PinValue {
    Digital(bool),
    Analog(u32),
}

impl PinValue {
    pub const fn kind(&self) -> PinKind {
        match self {
            PinValue::Digital(_) => PinKind::Digital,
            PinValue::Analog(_) => PinKind::Analog,
        }
    }
}

impl fmt::Display for PinValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PinValue::Digital(state) => write!(f, "{state}"),
            PinValue::Analog(value) => write!(f, "{value}"),
        }
    }
}
