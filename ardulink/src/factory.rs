use std::{any::TypeId, fmt, sync::Arc};

use crate::{
    config::{DynConfig, LinkConfig},
    connection::Connection,
    error::{LinkCreationError, LinkError},
    protocol::ByteStreamProcessor,
};

/// What a factory hands back for a validated configuration: the opened
/// connection and the processor speaking the configured protocol.
pub struct LinkParts {
    pub connection: Box<dyn Connection>,
    pub processor: Box<dyn ByteStreamProcessor>,
}

impl fmt::Debug for LinkParts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkParts")
            .field("protocol", &self.processor.protocol_name())
            .finish_non_exhaustive()
    }
}

/// A transport able to open links, one implementation per transport.
pub trait LinkFactory: Send + Sync + 'static {
    type Config: LinkConfig;

    fn name(&self) -> &str;

    fn aliases(&self) -> &[&'static str] {
        &[]
    }

    /// A fresh configuration populated with this factory's defaults.
    fn new_config(&self) -> Self::Config;

    fn new_link(&self, config: Self::Config) -> anyhow::Result<LinkParts>;
}

/// Type-erased [`LinkFactory`], as stored by the registry.
pub trait DynLinkFactory: Send + Sync {
    fn name(&self) -> &str;
    fn aliases(&self) -> &[&'static str];
    fn factory_type(&self) -> TypeId;
    fn factory_type_name(&self) -> &'static str;
    fn new_config(&self) -> Box<dyn DynConfig>;
    fn new_link(&self, config: Box<dyn DynConfig>) -> Result<LinkParts, LinkError>;
}

impl fmt::Debug for dyn DynLinkFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkFactory")
            .field("name", &self.name())
            .field("aliases", &self.aliases())
            .field("type", &self.factory_type_name())
            .finish()
    }
}

pub(crate) struct ConcreteFactory<F: LinkFactory> {
    pub factory: F,
}

impl<F: LinkFactory> DynLinkFactory for ConcreteFactory<F> {
    fn name(&self) -> &str {
        self.factory.name()
    }

    fn aliases(&self) -> &[&'static str] {
        self.factory.aliases()
    }

    fn factory_type(&self) -> TypeId {
        TypeId::of::<F>()
    }

    fn factory_type_name(&self) -> &'static str {
        std::any::type_name::<F>()
    }

    fn new_config(&self) -> Box<dyn DynConfig> {
        Box::new(self.factory.new_config())
    }

    fn new_link(&self, config: Box<dyn DynConfig>) -> Result<LinkParts, LinkError> {
        let config = config.into_any().downcast::<F::Config>().map_err(|_| {
            LinkError::InternalInconsistency(format!(
                "Configuration handed to factory '{}' is not a {}",
                self.factory.name(),
                std::any::type_name::<F::Config>()
            ))
        })?;

        self.factory.new_link(*config).map_err(|source| {
            LinkError::Creation(LinkCreationError {
                factory: self.factory.name().to_string(),
                source: source.into(),
            })
        })
    }
}

/// Wraps a factory for storage in a [`LinkRegistry`](crate::LinkRegistry).
pub fn erase<F: LinkFactory>(factory: F) -> Arc<dyn DynLinkFactory> {
    Arc::new(ConcreteFactory { factory })
}

/// A factory contributed to [`LinkRegistry::installed`](crate::LinkRegistry::installed).
pub struct FactoryRegistration {
    create: fn() -> Arc<dyn DynLinkFactory>,
}

impl FactoryRegistration {
    pub const fn new(create: fn() -> Arc<dyn DynLinkFactory>) -> Self {
        Self { create }
    }

    pub fn create(&self) -> Arc<dyn DynLinkFactory> {
        (self.create)()
    }
}

inventory::collect!(FactoryRegistration);

/// Registers a factory expression for [`LinkRegistry::installed`](crate::LinkRegistry::installed).
///
/// ```rust,ignore
/// ardulink::submit_link_factory!(SerialLinkFactory::default());
/// ```
#[macro_export]
macro_rules! submit_link_factory {
    ($factory:expr) => {
        $crate::inventory::submit! {
            $crate::factory::FactoryRegistration::new(|| $crate::factory::erase($factory))
        }
    };
}
