use std::{any::TypeId, collections::HashMap, fmt, sync::Arc};

use tracing::debug;

use crate::{
    config::{AttributeKind, AttributeSpec, ConfigSchema, ConfigValue, DynConfig, ValidationInfo},
    error::{ConfigurationError, LinkError},
    factory::DynLinkFactory,
    link::{Link, SharedLink},
};

/// Cache key of a configured link: the factory plus an ordered snapshot of
/// every attribute value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConfigurationIdentity {
    factory: String,
    factory_type: TypeId,
    values: Vec<(&'static str, Option<ConfigValue>)>,
}

impl ConfigurationIdentity {
    pub fn factory(&self) -> &str {
        &self.factory
    }

    pub fn values(&self) -> &[(&'static str, Option<ConfigValue>)] {
        &self.values
    }
}

/// A mutable configuration bound to one factory.
///
/// Not meant to be shared between threads: reading choice lists caches
/// them, and the identity snapshot assumes no concurrent mutation.
pub struct Configurer {
    factory: Arc<dyn DynLinkFactory>,
    config: Box<dyn DynConfig>,
    defaults: Box<dyn DynConfig>,
    /// Choice lists of attributes without dependencies, cleared on any set.
    choice_cache: HashMap<&'static str, Vec<ConfigValue>>,
}

impl Configurer {
    pub fn new(factory: Arc<dyn DynLinkFactory>) -> Self {
        let defaults = factory.new_config();
        let config = defaults.clone_box();
        Self {
            factory,
            config,
            defaults,
            choice_cache: HashMap::new(),
        }
    }

    pub fn factory_name(&self) -> &str {
        self.factory.name()
    }

    /// Attribute names in declaration order.
    pub fn attributes(&self) -> Vec<&'static str> {
        self.config.attributes().iter().map(|spec| spec.name).collect()
    }

    fn spec(&self, name: &str) -> Result<&'static AttributeSpec, ConfigurationError> {
        self.config
            .attributes()
            .iter()
            .find(|spec| spec.name == name)
            .ok_or_else(|| ConfigurationError::UnknownAttribute {
                attribute: name.to_string(),
                available: self.attributes().into_iter().map(String::from).collect(),
            })
    }

    pub fn attribute(&mut self, name: &str) -> Result<ConfigAttribute<'_>, ConfigurationError> {
        let spec = self.spec(name)?;
        Ok(ConfigAttribute {
            configurer: self,
            spec,
        })
    }

    pub fn value(&self, name: &str) -> Result<Option<ConfigValue>, ConfigurationError> {
        let spec = self.spec(name)?;
        Ok(self.config.value(spec.name))
    }

    /// Assigns an attribute. Membership in a choice list is not checked here
    /// but when a link is created.
    pub fn set_value(
        &mut self,
        name: &str,
        value: impl Into<ConfigValue>,
    ) -> Result<(), ConfigurationError> {
        self.assign(name, Some(value.into()))
    }

    /// Sets an attribute to null.
    pub fn clear_value(&mut self, name: &str) -> Result<(), ConfigurationError> {
        self.assign(name, None)
    }

    fn assign(&mut self, name: &str, value: Option<ConfigValue>) -> Result<(), ConfigurationError> {
        let spec = self.spec(name)?;
        self.choice_cache.clear();
        self.config.set_value(spec.name, value)
    }

    fn choices_of(&mut self, spec: &'static AttributeSpec) -> Option<Vec<ConfigValue>> {
        if !spec.depends_on.is_empty() {
            return self.config.choices(spec.name);
        }
        if let Some(cached) = self.choice_cache.get(spec.name) {
            return Some(cached.clone());
        }
        let choices = self.config.choices(spec.name)?;
        self.choice_cache.insert(spec.name, choices.clone());
        Some(choices)
    }

    pub fn choice_values(
        &mut self,
        name: &str,
    ) -> Result<Option<Vec<ConfigValue>>, ConfigurationError> {
        let spec = self.spec(name)?;
        Ok(self.choices_of(spec))
    }

    /// Sets every null attribute that has a non-empty choice list to its
    /// first choice, in declaration order so dependent lists see the
    /// choices made before them.
    pub fn select_first_choices(&mut self) -> Result<(), ConfigurationError> {
        for spec in self.config.attributes() {
            if !spec.has_choices || self.config.value(spec.name).is_some() {
                continue;
            }
            let first = self
                .choices_of(spec)
                .and_then(|choices| choices.into_iter().next());
            if let Some(first) = first {
                debug!(attribute = spec.name, value = %first, "selecting first choice");
                self.assign(spec.name, Some(first))?;
            }
        }
        Ok(())
    }

    pub fn schema(&self) -> ConfigSchema {
        ConfigSchema::new(self.factory.name().to_string(), &*self.defaults)
    }

    /// Checks every non-null value of a choice-constrained attribute against
    /// its current choice list.
    pub fn validate(&mut self) -> Result<(), ConfigurationError> {
        for spec in self.config.attributes() {
            let Some(value) = self.config.value(spec.name) else {
                continue;
            };
            let Some(choices) = self.choices_of(spec) else {
                continue;
            };
            if !choices.contains(&value) {
                return Err(ConfigurationError::InvalidChoice {
                    attribute: spec.name.to_string(),
                    value: value.to_string(),
                    valid: choices.iter().map(ToString::to_string).collect(),
                });
            }
        }
        Ok(())
    }

    pub fn unique_identifier(&self) -> ConfigurationIdentity {
        ConfigurationIdentity {
            factory: self.factory.name().to_string(),
            factory_type: self.factory.factory_type(),
            values: self
                .config
                .attributes()
                .iter()
                .map(|spec| (spec.name, self.config.value(spec.name)))
                .collect(),
        }
    }

    /// Validates, then opens a link owned solely by the returned handle.
    ///
    /// Links obtained this way bypass the cache; use
    /// [`Links`](crate::Links) to share connections.
    pub fn new_link(&mut self) -> Result<Link, LinkError> {
        self.validate()?;
        let shared = self.open_shared()?;
        Ok(Link::attach(shared, None))
    }

    /// Opens the connection without validating.
    pub(crate) fn open_shared(&self) -> Result<Arc<SharedLink>, LinkError> {
        debug!(factory = %self.factory.name(), "opening link");
        let parts = self.factory.new_link(self.config.clone_box())?;
        Ok(SharedLink::assemble(self.factory.name(), parts))
    }
}

impl fmt::Debug for Configurer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let values: Vec<_> = self
            .config
            .attributes()
            .iter()
            .map(|spec| (spec.name, self.config.value(spec.name)))
            .collect();
        f.debug_struct("Configurer")
            .field("factory", &self.factory.name())
            .field("values", &values)
            .finish()
    }
}

/// One attribute of a [`Configurer`].
pub struct ConfigAttribute<'a> {
    configurer: &'a mut Configurer,
    spec: &'static AttributeSpec,
}

impl ConfigAttribute<'_> {
    pub fn name(&self) -> &'static str {
        self.spec.name
    }

    pub fn kind(&self) -> AttributeKind {
        self.spec.kind
    }

    pub fn description(&self) -> Option<&'static str> {
        self.spec.description
    }

    pub fn value(&self) -> Option<ConfigValue> {
        self.configurer.config.value(self.spec.name)
    }

    /// The value a fresh configuration of this factory holds.
    pub fn default_value(&self) -> Option<ConfigValue> {
        self.configurer.defaults.value(self.spec.name)
    }

    pub fn set_value(&mut self, value: impl Into<ConfigValue>) -> Result<(), ConfigurationError> {
        self.configurer.assign(self.spec.name, Some(value.into()))
    }

    pub fn clear_value(&mut self) -> Result<(), ConfigurationError> {
        self.configurer.assign(self.spec.name, None)
    }

    pub fn has_choice_values(&self) -> bool {
        self.spec.has_choices
    }

    /// Recomputed on every call when the list depends on other attributes.
    pub fn choice_values(&mut self) -> Option<Vec<ConfigValue>> {
        self.configurer.choices_of(self.spec)
    }

    pub fn choice_depends_on(&self) -> &'static [&'static str] {
        self.spec.depends_on
    }

    pub fn validation_info(&self) -> ValidationInfo {
        self.spec.validation_info()
    }
}

impl fmt::Debug for ConfigAttribute<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigAttribute")
            .field("name", &self.spec.name)
            .field("kind", &self.spec.kind)
            .field("value", &self.value())
            .finish()
    }
}
