use std::time::Duration;

use crate::pin::{Pin, PinValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tone {
    pub pin: Pin,
    pub frequency_hz: u32,
    /// `None` plays until a matching `NoTone`.
    pub duration: Option<Duration>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPress {
    pub key_char: char,
    pub key_code: i32,
    pub key_location: i32,
    pub key_modifiers: i32,
    pub key_modifiers_ex: i32,
}

/// Messages sent from the host to the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToDeviceMessage {
    PinStateChange { pin: Pin, value: PinValue },
    StartListening(Pin),
    StopListening(Pin),
    Tone(Tone),
    NoTone(Pin),
    KeyPress(KeyPress),
    Custom(String),
}

/// A device's answer to a request, parameters kept in wire order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub id: u64,
    pub ok: bool,
    pub parameters: Vec<(String, String)>,
}

impl Reply {
    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.parameters
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Messages received from the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FromDeviceMessage {
    Ready,
    PinStateChanged { pin: Pin, value: PinValue },
    Reply(Reply),
    Custom(String),
}
