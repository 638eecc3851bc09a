//! Error types for mvaplug

/// Result type alias using mvaplug's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for mvaplug operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration errors (bad option strings, directive count mismatch,
    /// missing environment, missing training data)
    #[error("configuration error: {0}")]
    Config(String),

    /// A plugin key could not be derived from its input
    #[error("lookup error: {0}")]
    Lookup(String),

    /// No handler registered for the requested name
    #[error("no plugin handler for {family} and '{name}'")]
    PluginNotFound { family: String, name: String },

    /// A handler was found but could not be loaded
    #[error("failed to load plugin '{name}': {message}")]
    PluginLoad { name: String, message: String },

    /// A factory was registered twice under the same key
    #[error("'{0}' is already registered")]
    DuplicateRegistration(String),

    /// The singleton training engine belongs to another instance
    #[error("training engine already claimed by instance {owner}, instance {requested} cannot use it")]
    ResourceClaimed { owner: u32, requested: u32 },

    /// Operation called from the wrong lifecycle state
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Failure reported by the external engine
    #[error("engine error: {0}")]
    Engine(String),

    /// Reference record (de)serialization errors
    #[error("xml error: {0}")]
    Xml(String),

    /// Filesystem errors
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal errors
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new lookup error
    pub fn lookup(msg: impl Into<String>) -> Self {
        Self::Lookup(msg.into())
    }

    /// Create a new invalid state error
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    /// Create a new engine error
    pub fn engine(msg: impl Into<String>) -> Self {
        Self::Engine(msg.into())
    }

    /// Create a new xml error
    pub fn xml(msg: impl Into<String>) -> Self {
        Self::Xml(msg.into())
    }

    /// Create a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// True for errors the host should treat as fatal configuration problems
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}
