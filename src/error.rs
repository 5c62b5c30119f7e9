use thiserror::Error;

/// Failures surfaced by the stores and the connection manager.
///
/// Every variant is returned to the caller unchanged; nothing in this crate
/// retries or masks them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NetworkError {
    /// A required request field is missing or empty.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// An organization, instance, interface, service or record does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// A record with the same natural key is already stored.
    #[error("already exists: {0}")]
    AlreadyExists(String),
    /// The request is well formed but blocked by a safety rule.
    #[error("policy violation: {0}")]
    Policy(String),
    /// The underlying store could not be reached.
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, NetworkError>;

impl NetworkError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::AlreadyExists(message.into())
    }

    pub fn policy(message: impl Into<String>) -> Self {
        Self::Policy(message.into())
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Attach a short description to a storage-client failure, turning it into
/// [`NetworkError::Unavailable`].
pub trait StorageContext<T> {
    fn storage_context(self, context: &str) -> Result<T>;
}

impl<T, E: std::fmt::Display> StorageContext<T> for std::result::Result<T, E> {
    fn storage_context(self, context: &str) -> Result<T> {
        self.map_err(|e| NetworkError::Unavailable(format!("{}: {}", context, e)))
    }
}
