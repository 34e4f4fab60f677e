//! Wire protocols: incremental parsing of device bytes and serialization of
//! outgoing messages.

use crate::{
    error::UnsupportedMessageError,
    message::{FromDeviceMessage, ToDeviceMessage},
};

mod alp;
mod terminated;

pub use alp::{AlpGrammar, ArdulinkProtocol2};
pub use terminated::{DEFAULT_MAX_FRAGMENT_LEN, RecordGrammar, TerminatedProcessor};

/// Protocol-specific parser/serializer owned by one shared link.
///
/// `parse` is stateful: input not yet terminated is retained for the next
/// call, and the messages found are identical however the stream is chunked.
pub trait ByteStreamProcessor: Send {
    fn protocol_name(&self) -> &str;

    fn parse(&mut self, chunk: &[u8]) -> Vec<FromDeviceMessage>;

    fn to_device(&self, message: &ToDeviceMessage) -> Result<Vec<u8>, UnsupportedMessageError>;
}

/// A named, selectable protocol.
pub trait Protocol: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    fn new_processor(&self) -> Box<dyn ByteStreamProcessor>;
}

pub struct ProtocolRegistration {
    protocol: &'static dyn Protocol,
}

impl ProtocolRegistration {
    pub const fn new(protocol: &'static dyn Protocol) -> Self {
        Self { protocol }
    }
}

inventory::collect!(ProtocolRegistration);

/// Registers a protocol so it is found by [`by_name`] and listed by [`names`].
#[macro_export]
macro_rules! submit_protocol {
    ($protocol:expr) => {
        $crate::inventory::submit! {
            $crate::protocol::ProtocolRegistration::new(&$protocol)
        }
    };
}

const BUILTIN: &[&dyn Protocol] = &[&ArdulinkProtocol2];

/// Built-in protocols first, then submitted ones; the first of a name wins.
pub fn all() -> Vec<&'static dyn Protocol> {
    let mut protocols: Vec<&'static dyn Protocol> = BUILTIN.to_vec();
    for registration in inventory::iter::<ProtocolRegistration> {
        if protocols.iter().all(|p| p.name() != registration.protocol.name()) {
            protocols.push(registration.protocol);
        }
    }
    protocols
}

pub fn by_name(name: &str) -> Option<&'static dyn Protocol> {
    all().into_iter().find(|p| p.name() == name)
}

/// Protocol names, usable as a choice provider for a `proto` attribute.
pub fn names() -> Vec<String> {
    all().iter().map(|p| p.name().to_string()).collect()
}
