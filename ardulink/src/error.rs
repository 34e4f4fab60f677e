use std::error::Error as StdError;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("Invalid URI '{uri}': {reason}")]
    InvalidUri { uri: String, reason: String },

    #[error("Scheme of '{uri}' is not {expected} (was {found})")]
    SchemeMismatch {
        uri: String,
        expected: &'static str,
        found: String,
    },

    #[error("No factory registered for \"{name}\", available names are {available:?}")]
    UnknownFactory { name: String, available: Vec<String> },

    #[error("Factory \"{0}\" is already registered")]
    DuplicateFactory(String),

    #[error("No link factories registered")]
    NoFactories,

    #[error("Could not determine attribute {attribute}. Available attributes are {available:?}")]
    UnknownAttribute {
        attribute: String,
        available: Vec<String>,
    },

    #[error("Invalid value for {attribute}: {reason}")]
    InvalidValue { attribute: String, reason: String },

    #[error("{value} is not a valid value for {attribute}, valid values are {valid:?}")]
    InvalidChoice {
        attribute: String,
        value: String,
        valid: Vec<String>,
    },
}

/// The factory behind a configurer failed to open its connection.
#[derive(Debug, thiserror::Error)]
#[error("Factory \"{factory}\" failed to create a link: {source}")]
pub struct LinkCreationError {
    pub factory: String,
    #[source]
    pub source: Box<dyn StdError + Send + Sync>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Protocol {protocol} cannot serialize {message}: {reason}")]
pub struct UnsupportedMessageError {
    pub protocol: String,
    pub message: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectionError {
    #[error("IO Error: {0}")]
    Io(String),

    #[error("Connection is closed")]
    Closed,

    #[error("No tokio runtime available: {0}")]
    NoRuntime(String),

    #[error("Other: {0}")]
    Other(String),
}

impl From<std::io::Error> for ConnectionError {
    fn from(e: std::io::Error) -> Self {
        ConnectionError::Io(e.to_string())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Creation(#[from] LinkCreationError),

    #[error(transparent)]
    UnsupportedMessage(#[from] UnsupportedMessageError),

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error("Link handle is already closed")]
    Closed,

    #[error("Internal inconsistency: {0}")]
    InternalInconsistency(String),
}
