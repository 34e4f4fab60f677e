//! # Ardulink
//!
//! Connection management and protocol framing for talking to microcontroller
//! boards over pluggable transports.
//!
//! ## Features
//!
//! - **URI-addressed links:** `ardulink://<factory>?key=value` picks a transport
//!   factory and configures it.
//! - **Shared connections:** handles whose configuration resolves to the same
//!   identity share one physical connection, reference counted.
//! - **Pin multiplexing:** the device is asked to report a pin once, however
//!   many handles listen on it.
//! - **Declarative configuration:** `#[derive(LinkConfig)]` describes a
//!   factory's attributes, choice lists and bounds.
//! - **Incremental protocols:** byte streams are parsed chunk by chunk, and
//!   noise on the line is skipped.
//!
//! ## Usage
//!
//! ```rust,ignore
//! #[derive(Debug, Clone, ardulink::LinkConfig)]
//! struct LoopbackConfig {
//!     #[config(choices = Self::protocols)]
//!     proto: String,
//! }
//!
//! impl LoopbackConfig {
//!     fn protocols(&self) -> Vec<String> {
//!         ardulink::protocol::names()
//!     }
//! }
//!
//! struct LoopbackFactory;
//!
//! impl ardulink::LinkFactory for LoopbackFactory {
//!     type Config = LoopbackConfig;
//!
//!     fn name(&self) -> &str {
//!         "loopback"
//!     }
//!
//!     fn new_config(&self) -> LoopbackConfig {
//!         LoopbackConfig { proto: "ardulink2".into() }
//!     }
//!
//!     fn new_link(&self, config: LoopbackConfig) -> anyhow::Result<ardulink::LinkParts> {
//!         /* open the transport */
//!     }
//! }
//!
//! ardulink::submit_link_factory!(LoopbackFactory);
//!
//! let links = ardulink::Links::installed();
//! let link = links.get_link("ardulink://loopback")?;
//! link.start_listening(ardulink::Pin::analog(3))?;
//! ```

extern crate self as ardulink;

pub use ardulink_macros::LinkConfig;

#[doc(hidden)]
pub use inventory;

pub mod cache;
pub mod config;
pub mod configurer;
pub mod connection;
pub mod error;
pub mod factory;
pub mod link;
pub mod links;
pub mod listener;
pub mod message;
pub mod pin;
pub mod protocol;
pub mod registry;

/// Scheme of every link URI.
pub const SCHEME: &str = "ardulink";

pub use cache::LinkCache;
pub use config::{AttributeKind, ConfigSchema, ConfigValue, LinkConfig, ValidationInfo};
pub use configurer::{ConfigAttribute, ConfigurationIdentity, Configurer};
pub use connection::{Connection, Inbound, StreamConnection};
pub use error::{
    ConfigurationError, ConnectionError, LinkCreationError, LinkError, UnsupportedMessageError,
};
pub use factory::{LinkFactory, LinkParts};
pub use link::Link;
pub use links::Links;
pub use listener::{EventListener, PinListener};
pub use message::{FromDeviceMessage, KeyPress, Reply, ToDeviceMessage, Tone};
pub use pin::{Pin, PinKind, PinValue};
pub use registry::LinkRegistry;
