use crate::{
    SCHEME,
    cache::LinkCache,
    configurer::Configurer,
    error::LinkError,
    link::Link,
    registry::{DEFAULT_AUTHORITY, LinkRegistry},
};

/// Entry point for obtaining shared links by URI.
///
/// ```rust,ignore
/// let links = Links::installed();
/// let link = links.get_link("ardulink://serial-jssc?port=/dev/ttyUSB0")?;
/// link.switch_digital_pin(13, true)?;
/// ```
#[derive(Debug)]
pub struct Links {
    registry: LinkRegistry,
    cache: LinkCache,
}

impl Links {
    pub fn new(registry: LinkRegistry) -> Self {
        Self {
            registry,
            cache: LinkCache::new(),
        }
    }

    /// Links over every installed factory.
    pub fn installed() -> Self {
        Self::new(LinkRegistry::installed())
    }

    pub fn registry(&self) -> &LinkRegistry {
        &self.registry
    }

    pub fn cache(&self) -> &LinkCache {
        &self.cache
    }

    /// Handles for URIs resolving to the same configuration share one
    /// connection.
    pub fn get_link(&self, uri: &str) -> Result<Link, LinkError> {
        let mut configurer = self.registry.configurer(uri)?;
        self.cache.get(&mut configurer)
    }

    pub fn get_link_with(&self, configurer: &mut Configurer) -> Result<Link, LinkError> {
        self.cache.get(configurer)
    }

    /// The link of the default factory, with its default configuration and
    /// the first value of every unset choice attribute.
    pub fn get_default(&self) -> Result<Link, LinkError> {
        self.get_link(&format!("{SCHEME}://{DEFAULT_AUTHORITY}"))
    }
}

impl Default for Links {
    fn default() -> Self {
        Self::installed()
    }
}
