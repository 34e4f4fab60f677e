use std::{
    collections::{HashMap, hash_map::Entry},
    fmt,
    sync::Arc,
};

use parking_lot::Mutex;
use tracing::debug;

use crate::{
    configurer::{ConfigurationIdentity, Configurer},
    error::LinkError,
    link::{Link, SharedLink},
};

struct CacheEntry {
    shared: Arc<SharedLink>,
    refs: usize,
}

/// Shares one physical link between all handles of equal configuration
/// identity, counting references.
///
/// Lookup, creation and increment happen under one lock, as do decrement,
/// eviction and close, so a getter never attaches to a link being closed.
#[derive(Clone, Default)]
pub struct LinkCache {
    entries: Arc<Mutex<HashMap<ConfigurationIdentity, CacheEntry>>>,
}

impl LinkCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a handle on the cached link for this configuration, opening it
    /// on first request. A failed open leaves nothing in the cache.
    pub fn get(&self, configurer: &mut Configurer) -> Result<Link, LinkError> {
        configurer.validate()?;
        let key = configurer.unique_identifier();

        let shared = {
            let mut entries = self.entries.lock();
            match entries.entry(key.clone()) {
                Entry::Occupied(mut occupied) => {
                    let entry = occupied.get_mut();
                    entry.refs += 1;
                    debug!(factory = %key.factory(), refs = entry.refs, "reusing cached link");
                    Arc::clone(&entry.shared)
                }
                Entry::Vacant(vacant) => {
                    let shared = configurer.open_shared()?;
                    vacant.insert(CacheEntry {
                        shared: Arc::clone(&shared),
                        refs: 1,
                    });
                    debug!(factory = %key.factory(), "cached new link");
                    shared
                }
            }
        };

        Ok(Link::attach(
            shared,
            Some(Lease {
                cache: self.clone(),
                key,
            }),
        ))
    }

    /// Number of distinct physical links currently open.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn contains(&self, identity: &ConfigurationIdentity) -> bool {
        self.entries.lock().contains_key(identity)
    }

    /// References held on the link of `identity`, zero if not cached.
    pub fn ref_count(&self, identity: &ConfigurationIdentity) -> usize {
        self.entries.lock().get(identity).map_or(0, |entry| entry.refs)
    }
}

impl fmt::Debug for LinkCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkCache").field("links", &self.len()).finish()
    }
}

/// A handle's reference on a cached link.
pub(crate) struct Lease {
    cache: LinkCache,
    key: ConfigurationIdentity,
}

impl Lease {
    pub(crate) fn release(&self, shared: &Arc<SharedLink>) -> Result<(), LinkError> {
        let mut entries = self.cache.entries.lock();
        let Some(entry) = entries.get_mut(&self.key) else {
            return Err(LinkError::InternalInconsistency(format!(
                "No cached link for factory '{}'",
                self.key.factory()
            )));
        };
        if !Arc::ptr_eq(&entry.shared, shared) {
            return Err(LinkError::InternalInconsistency(format!(
                "Cached link for factory '{}' was replaced while referenced",
                self.key.factory()
            )));
        }

        entry.refs -= 1;
        if entry.refs > 0 {
            return Ok(());
        }

        entries.remove(&self.key);
        debug!(factory = %self.key.factory(), "evicting cached link");
        shared.close()?;
        Ok(())
    }
}
