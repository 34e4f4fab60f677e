use std::{fmt, sync::Arc};

use tracing::{debug, warn};
use url::Url;

use crate::{
    SCHEME,
    configurer::Configurer,
    error::ConfigurationError,
    factory::{self, DynLinkFactory, FactoryRegistration, LinkFactory},
};

/// Authority selecting a factory through [`LinkRegistry::default_factory_name`].
pub const DEFAULT_AUTHORITY: &str = "default";

const SERIAL: &str = "serial";
const SERIAL_PREFIX: &str = "serial-";

/// The known link factories, in registration order.
#[derive(Default)]
pub struct LinkRegistry {
    factories: Vec<Arc<dyn DynLinkFactory>>,
}

impl LinkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every factory submitted with [`submit_link_factory!`](crate::submit_link_factory).
    ///
    /// A factory whose name is already taken is skipped.
    pub fn installed() -> Self {
        let mut registry = Self::new();
        for registration in inventory::iter::<FactoryRegistration> {
            if let Err(e) = registry.register_dyn(registration.create()) {
                warn!(error = %e, "skipping installed link factory");
            }
        }
        registry
    }

    pub fn register<F: LinkFactory>(&mut self, factory: F) -> Result<(), ConfigurationError> {
        self.register_dyn(factory::erase(factory))
    }

    pub fn register_dyn(
        &mut self,
        factory: Arc<dyn DynLinkFactory>,
    ) -> Result<(), ConfigurationError> {
        if self.factories.iter().any(|f| f.name() == factory.name()) {
            return Err(ConfigurationError::DuplicateFactory(factory.name().to_string()));
        }
        debug!(factory = %factory.name(), aliases = ?factory.aliases(), "registered link factory");
        self.factories.push(factory);
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.factories.iter().map(|f| f.name().to_string()).collect()
    }

    /// Exact, case-sensitive name match first, then alias match.
    pub fn lookup(&self, name: &str) -> Option<Arc<dyn DynLinkFactory>> {
        self.factories
            .iter()
            .find(|f| f.name() == name)
            .or_else(|| self.factories.iter().find(|f| f.aliases().contains(&name)))
            .cloned()
    }

    /// One `ardulink://<name>` URI per factory.
    pub fn list_uris(&self) -> Vec<Url> {
        self.factories
            .iter()
            .filter_map(|f| Url::parse(&format!("{SCHEME}://{}", f.name())).ok())
            .collect()
    }

    /// `serial` if present, else the first `serial-*`, else the first factory.
    pub fn default_factory_name(&self) -> Result<&str, ConfigurationError> {
        self.factories
            .iter()
            .find(|f| f.name() == SERIAL)
            .or_else(|| self.factories.iter().find(|f| f.name().starts_with(SERIAL_PREFIX)))
            .or_else(|| self.factories.first())
            .map(|f| f.name())
            .ok_or(ConfigurationError::NoFactories)
    }

    fn resolve(&self, authority: &str) -> Result<Arc<dyn DynLinkFactory>, ConfigurationError> {
        if let Some(factory) = self.lookup(authority) {
            return Ok(factory);
        }

        let fallback = match authority {
            DEFAULT_AUTHORITY => Some(self.default_factory_name()?),
            SERIAL => self
                .factories
                .iter()
                .map(|f| f.name())
                .find(|name| name.starts_with(SERIAL_PREFIX)),
            _ => None,
        };

        fallback
            .and_then(|name| self.lookup(name))
            .ok_or_else(|| ConfigurationError::UnknownFactory {
                name: authority.to_string(),
                available: self.names(),
            })
    }

    pub fn configurer(&self, uri: &str) -> Result<Configurer, ConfigurationError> {
        let parsed = Url::parse(uri).map_err(|e| ConfigurationError::InvalidUri {
            uri: uri.to_string(),
            reason: e.to_string(),
        })?;
        self.configurer_for(&parsed)
    }

    /// Resolves the authority to a factory and applies the query parameters,
    /// in order, as attribute assignments.
    ///
    /// A parameter with an empty value only checks that the attribute exists.
    /// For the `default` authority, attributes still unset afterwards take
    /// their first choice.
    pub fn configurer_for(&self, uri: &Url) -> Result<Configurer, ConfigurationError> {
        if uri.scheme() != SCHEME {
            return Err(ConfigurationError::SchemeMismatch {
                uri: uri.to_string(),
                expected: SCHEME,
                found: uri.scheme().to_string(),
            });
        }
        let authority = uri
            .host_str()
            .filter(|host| !host.is_empty())
            .ok_or_else(|| ConfigurationError::InvalidUri {
                uri: uri.to_string(),
                reason: "missing factory name".to_string(),
            })?;

        let factory = self.resolve(authority)?;
        debug!(%uri, factory = %factory.name(), "resolved link factory");

        let mut configurer = Configurer::new(factory);
        for (key, value) in uri.query_pairs() {
            if value.is_empty() {
                configurer.attribute(&key)?;
            } else {
                configurer.set_value(&key, value.into_owned())?;
            }
        }
        if authority == DEFAULT_AUTHORITY {
            configurer.select_first_choices()?;
        }
        Ok(configurer)
    }
}

impl fmt::Debug for LinkRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.factories.iter()).finish()
    }
}
