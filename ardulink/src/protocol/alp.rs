//! The Ardulink text protocol, version 2.
//!
//! Every record is a newline-terminated line of the form
//! `alp://<command>/<segment>/...?<key>=<value>&...`.
//!
//! | direction | record                               | message                 |
//! |-----------|--------------------------------------|-------------------------|
//! | in        | `alp://ready/`                       | `Ready`                 |
//! | in        | `alp://ared/<pin>/<value>`           | analog `PinStateChanged`|
//! | in        | `alp://dred/<pin>/<0\|1>`            | digital `PinStateChanged`|
//! | in        | `alp://rply/<ok\|ko>?id=<n>&k=v...`  | `Reply`                 |
//! | in        | `alp://cevnt/<payload>`              | `Custom`                |
//! | out       | `alp://ppsw/<pin>/<0\|1>`            | digital `PinStateChange`|
//! | out       | `alp://ppin/<pin>/<value>`           | analog `PinStateChange` |
//! | out       | `alp://srld/<pin>`, `alp://srla/<pin>` | `StartListening`      |
//! | out       | `alp://spld/<pin>`, `alp://spla/<pin>` | `StopListening`       |
//! | out       | `alp://tone/<pin>/<hz>/<ms\|-1>`     | `Tone`                  |
//! | out       | `alp://notn/<pin>`                   | `NoTone`                |
//! | out       | `alp://kprs/chr<c>cod<n>loc<n>mod<n>mex<n>` | `KeyPress`       |
//! | out       | `alp://cust/<payload>`               | `Custom`                |
//!
//! The mapping is asymmetric: outgoing commands are write-only and are not
//! accepted by the inbound grammar.

use super::{ByteStreamProcessor, Protocol, RecordGrammar, TerminatedProcessor};
use crate::{
    error::UnsupportedMessageError,
    message::{FromDeviceMessage, Reply, ToDeviceMessage},
    pin::{Pin, PinValue},
};

const PREFIX: &str = "alp://";
const ANALOG_TONES_ONLY: &str = "tones are only supported on analog pins";

#[derive(Debug, Clone, Copy, Default)]
pub struct ArdulinkProtocol2;

impl ArdulinkProtocol2 {
    pub const NAME: &'static str = "ardulink2";
}

impl Protocol for ArdulinkProtocol2 {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn new_processor(&self) -> Box<dyn ByteStreamProcessor> {
        Box::new(TerminatedProcessor::new(AlpGrammar))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AlpGrammar;

impl AlpGrammar {
    fn unsupported(&self, message: &ToDeviceMessage, reason: &str) -> UnsupportedMessageError {
        UnsupportedMessageError {
            protocol: ArdulinkProtocol2::NAME.to_string(),
            message: format!("{message:?}"),
            reason: reason.to_string(),
        }
    }
}

impl RecordGrammar for AlpGrammar {
    fn name(&self) -> &'static str {
        ArdulinkProtocol2::NAME
    }

    fn classify(&self, record: &[u8]) -> Option<FromDeviceMessage> {
        let line = std::str::from_utf8(record).ok()?;
        let line = line.strip_suffix('\r').unwrap_or(line);
        let rest = line.strip_prefix(PREFIX)?;

        let (command, remainder) = match rest.find(['/', '?']) {
            Some(i) => rest.split_at(i),
            None => (rest, ""),
        };

        match command {
            "ready" => matches!(remainder, "" | "/").then_some(FromDeviceMessage::Ready),
            "ared" => {
                let (pin, value) = pin_and_value(remainder)?;
                Some(FromDeviceMessage::PinStateChanged {
                    pin: Pin::analog(pin),
                    value: PinValue::Analog(value.parse().ok()?),
                })
            }
            "dred" => {
                let (pin, value) = pin_and_value(remainder)?;
                let state = match value {
                    "0" => false,
                    "1" => true,
                    _ => return None,
                };
                Some(FromDeviceMessage::PinStateChanged {
                    pin: Pin::digital(pin),
                    value: PinValue::Digital(state),
                })
            }
            "rply" => parse_reply(remainder).map(FromDeviceMessage::Reply),
            "cevnt" => {
                let payload = remainder.strip_prefix('/').unwrap_or(remainder);
                Some(FromDeviceMessage::Custom(payload.to_string()))
            }
            _ => None,
        }
    }

    fn serialize(&self, message: &ToDeviceMessage) -> Result<Vec<u8>, UnsupportedMessageError> {
        let body = match message {
            ToDeviceMessage::PinStateChange { pin, value } => {
                match (pin.is_analog(), value) {
                    (true, PinValue::Analog(v)) => format!("ppin/{}/{v}", pin.index()),
                    (false, PinValue::Digital(state)) => {
                        format!("ppsw/{}/{}", pin.index(), u8::from(*state))
                    }
                    _ => {
                        return Err(self.unsupported(message, "value kind does not match pin kind"));
                    }
                }
            }
            ToDeviceMessage::StartListening(pin) if pin.is_analog() => {
                format!("srla/{}", pin.index())
            }
            ToDeviceMessage::StartListening(pin) => format!("srld/{}", pin.index()),
            ToDeviceMessage::StopListening(pin) if pin.is_analog() => {
                format!("spla/{}", pin.index())
            }
            ToDeviceMessage::StopListening(pin) => format!("spld/{}", pin.index()),
            ToDeviceMessage::Tone(tone) => {
                if !tone.pin.is_analog() {
                    return Err(self.unsupported(message, ANALOG_TONES_ONLY));
                }
                let duration = tone
                    .duration
                    .map_or_else(|| "-1".to_string(), |d| d.as_millis().to_string());
                format!("tone/{}/{}/{duration}", tone.pin.index(), tone.frequency_hz)
            }
            ToDeviceMessage::NoTone(pin) => {
                if !pin.is_analog() {
                    return Err(self.unsupported(message, ANALOG_TONES_ONLY));
                }
                format!("notn/{}", pin.index())
            }
            ToDeviceMessage::KeyPress(key) => {
                if matches!(key.key_char, '\n' | '\r') {
                    return Err(self.unsupported(message, "key char must not be a line break"));
                }
                format!(
                    "kprs/chr{}cod{}loc{}mod{}mex{}",
                    key.key_char,
                    key.key_code,
                    key.key_location,
                    key.key_modifiers,
                    key.key_modifiers_ex
                )
            }
            ToDeviceMessage::Custom(payload) => {
                if payload.contains('\n') {
                    return Err(self.unsupported(message, "payload must not contain a line break"));
                }
                format!("cust/{payload}")
            }
        };

        let mut bytes = Vec::with_capacity(PREFIX.len() + body.len() + 1);
        bytes.extend_from_slice(PREFIX.as_bytes());
        bytes.extend_from_slice(body.as_bytes());
        bytes.push(self.terminator());
        Ok(bytes)
    }
}

fn pin_and_value(remainder: &str) -> Option<(u32, &str)> {
    let mut segments = remainder.strip_prefix('/')?.split('/');
    let pin = segments.next()?.parse().ok()?;
    let value = segments.next()?;
    segments.next().is_none().then_some((pin, value))
}

fn parse_reply(remainder: &str) -> Option<Reply> {
    let (status, query) = remainder.strip_prefix('/')?.split_once('?')?;
    let ok = match status {
        "ok" => true,
        "ko" => false,
        _ => return None,
    };

    let mut id = None;
    let mut parameters = Vec::new();
    for pair in query.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        if key == "id" && id.is_none() {
            id = Some(value.parse().ok()?);
        } else {
            parameters.push((key.to_string(), value.to_string()));
        }
    }

    Some(Reply {
        id: id?,
        ok,
        parameters,
    })
}
