use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace, warn};

use crate::{
    cache::Lease,
    connection::{Connection, Inbound},
    error::{ConnectionError, LinkError},
    factory::LinkParts,
    listener::EventListener,
    message::{FromDeviceMessage, KeyPress, ToDeviceMessage, Tone},
    pin::{Pin, PinValue},
    protocol::ByteStreamProcessor,
};

pub(crate) type HandleId = u64;

/// One physical connection plus its protocol processor, shared by every
/// [`Link`] handle of equal configuration identity.
pub(crate) struct SharedLink {
    factory: String,
    protocol: String,
    connection: Box<dyn Connection>,
    processor: Mutex<Box<dyn ByteStreamProcessor>>,
    /// Handles listening per pin; StartListening/StopListening are only sent
    /// on the empty/non-empty transitions of a pin's set.
    pins: Mutex<BTreeMap<Pin, BTreeSet<HandleId>>>,
    /// Serializes pin transitions together with their device command.
    /// `pins` itself is never held across a write, so a connection may
    /// deliver inbound bytes from inside `write`.
    transitions: Mutex<()>,
    listeners: RwLock<BTreeMap<HandleId, Vec<Arc<dyn EventListener>>>>,
    next_handle: AtomicU64,
    closed: AtomicBool,
}

impl SharedLink {
    pub(crate) fn assemble(factory: &str, parts: LinkParts) -> Arc<Self> {
        let LinkParts {
            connection,
            processor,
        } = parts;
        let link = Arc::new(Self {
            factory: factory.to_string(),
            protocol: processor.protocol_name().to_string(),
            connection,
            processor: Mutex::new(processor),
            pins: Mutex::new(BTreeMap::new()),
            transitions: Mutex::new(()),
            listeners: RwLock::new(BTreeMap::new()),
            next_handle: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        });
        link.connection.attach(Inbound::new(Arc::downgrade(&link)));
        debug!(factory = %link.factory, protocol = %link.protocol, "shared link assembled");
        link
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn next_handle_id(&self) -> HandleId {
        self.next_handle.fetch_add(1, Ordering::Relaxed)
    }

    fn send(&self, message: &ToDeviceMessage) -> Result<(), LinkError> {
        let bytes = self.processor.lock().to_device(message)?;
        trace!(factory = %self.factory, ?message, len = bytes.len(), "writing to device");
        self.connection.write(&bytes)?;
        Ok(())
    }

    fn start_listening(&self, handle: HandleId, pin: Pin) -> Result<(), LinkError> {
        let _transition = self.transitions.lock();
        {
            let mut pins = self.pins.lock();
            let listening = pins.entry(pin).or_default();
            let first = listening.is_empty();
            if !listening.insert(handle) || !first {
                return Ok(());
            }
        }

        if let Err(e) = self.send(&ToDeviceMessage::StartListening(pin)) {
            self.pins.lock().remove(&pin);
            return Err(e);
        }
        debug!(factory = %self.factory, %pin, "device starts reporting pin");
        Ok(())
    }

    fn stop_listening(&self, handle: HandleId, pin: Pin) -> Result<(), LinkError> {
        let _transition = self.transitions.lock();
        {
            let mut pins = self.pins.lock();
            let Some(listening) = pins.get_mut(&pin) else {
                return Ok(());
            };
            if !listening.remove(&handle) || !listening.is_empty() {
                return Ok(());
            }
            pins.remove(&pin);
        }

        self.send(&ToDeviceMessage::StopListening(pin))?;
        debug!(factory = %self.factory, %pin, "device stops reporting pin");
        Ok(())
    }

    fn is_listening(&self, handle: HandleId, pin: Pin) -> bool {
        self.pins
            .lock()
            .get(&pin)
            .is_some_and(|listening| listening.contains(&handle))
    }

    fn add_listener(&self, handle: HandleId, listener: Arc<dyn EventListener>) {
        self.listeners.write().entry(handle).or_default().push(listener);
    }

    fn remove_listener(&self, handle: HandleId, listener: &Arc<dyn EventListener>) -> bool {
        let mut listeners = self.listeners.write();
        let Some(registered) = listeners.get_mut(&handle) else {
            return false;
        };
        let before = registered.len();
        registered.retain(|l| !Arc::ptr_eq(l, listener));
        before != registered.len()
    }

    /// Drops everything `handle` registered, stopping pins nobody else listens on.
    fn release_handle(&self, handle: HandleId) -> Result<(), LinkError> {
        self.listeners.write().remove(&handle);

        let _transition = self.transitions.lock();
        let mut orphaned = Vec::new();
        self.pins.lock().retain(|pin, listening| {
            listening.remove(&handle);
            if listening.is_empty() {
                orphaned.push(*pin);
                false
            } else {
                true
            }
        });

        let mut result = Ok(());
        for pin in orphaned {
            if let Err(e) = self.send(&ToDeviceMessage::StopListening(pin)) {
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }
        result
    }

    pub(crate) fn close(&self) -> Result<(), ConnectionError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        debug!(factory = %self.factory, "closing connection");
        self.connection.close()
    }

    pub(crate) fn on_bytes(&self, chunk: &[u8]) {
        let messages = self.processor.lock().parse(chunk);
        for message in &messages {
            self.dispatch(message);
        }
    }

    fn dispatch(&self, message: &FromDeviceMessage) {
        match message {
            FromDeviceMessage::PinStateChanged { pin, value } => {
                let handles: Vec<HandleId> = self
                    .pins
                    .lock()
                    .get(pin)
                    .map(|listening| listening.iter().copied().collect())
                    .unwrap_or_default();
                let targets: Vec<Arc<dyn EventListener>> = {
                    let listeners = self.listeners.read();
                    handles
                        .iter()
                        .filter_map(|h| listeners.get(h))
                        .flatten()
                        .cloned()
                        .collect()
                };
                for listener in targets {
                    listener.on_pin_changed(*pin, *value);
                }
            }
            FromDeviceMessage::Ready => self.each_listener(|l| l.on_ready()),
            FromDeviceMessage::Reply(reply) => self.each_listener(|l| l.on_reply(reply)),
            FromDeviceMessage::Custom(payload) => self.each_listener(|l| l.on_custom(payload)),
        }
    }

    fn each_listener(&self, f: impl Fn(&dyn EventListener)) {
        let targets: Vec<Arc<dyn EventListener>> =
            self.listeners.read().values().flatten().cloned().collect();
        for listener in targets {
            f(listener.as_ref());
        }
    }
}

/// A caller-held handle to a (possibly shared) device connection.
///
/// Dropping a handle closes it. The underlying connection closes when the
/// last handle sharing it is closed.
pub struct Link {
    shared: Arc<SharedLink>,
    id: HandleId,
    lease: Option<Lease>,
    closed: AtomicBool,
}

impl Link {
    pub(crate) fn attach(shared: Arc<SharedLink>, lease: Option<Lease>) -> Self {
        let id = shared.next_handle_id();
        Self {
            shared,
            id,
            lease,
            closed: AtomicBool::new(false),
        }
    }

    fn ensure_open(&self) -> Result<(), LinkError> {
        if self.is_closed() {
            return Err(LinkError::Closed);
        }
        Ok(())
    }

    pub fn factory_name(&self) -> &str {
        &self.shared.factory
    }

    pub fn protocol_name(&self) -> &str {
        &self.shared.protocol
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Whether both handles sit on the same physical connection.
    pub fn shares_connection_with(&self, other: &Link) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    pub fn start_listening(&self, pin: Pin) -> Result<(), LinkError> {
        self.ensure_open()?;
        self.shared.start_listening(self.id, pin)
    }

    /// Stopping a pin this handle never listened on is a no-op.
    pub fn stop_listening(&self, pin: Pin) -> Result<(), LinkError> {
        self.ensure_open()?;
        self.shared.stop_listening(self.id, pin)
    }

    pub fn is_listening(&self, pin: Pin) -> bool {
        !self.is_closed() && self.shared.is_listening(self.id, pin)
    }

    pub fn add_listener(&self, listener: Arc<dyn EventListener>) -> Result<(), LinkError> {
        self.ensure_open()?;
        self.shared.add_listener(self.id, listener);
        Ok(())
    }

    pub fn remove_listener(&self, listener: &Arc<dyn EventListener>) -> bool {
        self.shared.remove_listener(self.id, listener)
    }

    pub fn send(&self, message: &ToDeviceMessage) -> Result<(), LinkError> {
        self.ensure_open()?;
        self.shared.send(message)
    }

    pub fn switch_analog_pin(&self, pin: u32, value: u32) -> Result<(), LinkError> {
        self.send(&ToDeviceMessage::PinStateChange {
            pin: Pin::analog(pin),
            value: PinValue::Analog(value),
        })
    }

    pub fn switch_digital_pin(&self, pin: u32, state: bool) -> Result<(), LinkError> {
        self.send(&ToDeviceMessage::PinStateChange {
            pin: Pin::digital(pin),
            value: PinValue::Digital(state),
        })
    }

    pub fn send_tone(&self, tone: Tone) -> Result<(), LinkError> {
        self.send(&ToDeviceMessage::Tone(tone))
    }

    pub fn send_no_tone(&self, pin: Pin) -> Result<(), LinkError> {
        self.send(&ToDeviceMessage::NoTone(pin))
    }

    pub fn send_key_press(&self, key: KeyPress) -> Result<(), LinkError> {
        self.send(&ToDeviceMessage::KeyPress(key))
    }

    pub fn send_custom_message(&self, payload: impl Into<String>) -> Result<(), LinkError> {
        self.send(&ToDeviceMessage::Custom(payload.into()))
    }

    /// Closes this handle; closing again is a no-op.
    ///
    /// Pins only this handle listened on are stopped first. The connection
    /// is closed once no other handle shares it.
    pub fn close(&self) -> Result<(), LinkError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let released = self.shared.release_handle(self.id);
        let closed = match &self.lease {
            Some(lease) => lease.release(&self.shared),
            None => self.shared.close().map_err(LinkError::from),
        };
        released.and(closed)
    }
}

impl Drop for Link {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(factory = %self.shared.factory, error = %e, "closing dropped link failed");
        }
    }
}

impl fmt::Debug for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Link")
            .field("factory", &self.shared.factory)
            .field("protocol", &self.shared.protocol)
            .field("handle", &self.id)
            .field("closed", &self.is_closed())
            .finish()
    }
}
