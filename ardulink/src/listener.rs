use std::fmt;

use crate::{
    message::Reply,
    pin::{Pin, PinValue},
};

/// Receives device events for one [`Link`](crate::Link) handle.
///
/// Pin changes are delivered only for pins the handle listens on; the other
/// events go to every handle sharing the connection. Callbacks run on the
/// transport's delivery flow and must not block.
pub trait EventListener: Send + Sync {
    fn on_pin_changed(&self, _pin: Pin, _value: PinValue) {}

    fn on_ready(&self) {}

    fn on_reply(&self, _reply: &Reply) {}

    fn on_custom(&self, _payload: &str) {}
}

/// Adapts a closure to an [`EventListener`] receiving pin changes only.
pub struct PinListener<F> {
    callback: F,
}

impl<F> PinListener<F>
where
    F: Fn(Pin, PinValue) + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> EventListener for PinListener<F>
where
    F: Fn(Pin, PinValue) + Send + Sync,
{
    fn on_pin_changed(&self, pin: Pin, value: PinValue) {
        (self.callback)(pin, value)
    }
}

impl<F> fmt::Debug for PinListener<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PinListener")
    }
}
