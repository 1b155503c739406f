//! Error types for the model bridge

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Address not resolvable: {0}")]
    AddressNotResolvable(String),

    #[error("Not addressable: {0}")]
    NotAddressable(String),

    #[error("Attribute not found: {0}")]
    AttributeNotFound(String),

    #[error("Attribute not writable: {0}")]
    AttributeNotWritable(String),

    #[error("Not authorized: {0}")]
    NotAuthorized(String),

    #[error("Operation not found: {0}")]
    OperationNotFound(String),

    #[error("Parameter count mismatch: expected {expected}, got {actual}")]
    ParameterCountMismatch { expected: usize, actual: usize },

    #[error("Type conversion error: {0}")]
    TypeConversion(String),

    #[error("Kernel execution failure: {0}")]
    KernelExecutionFailure(String),

    #[error("Malformed name: {0}")]
    MalformedName(String),

    #[error("Registration not found: {0}")]
    RegistrationNotFound(String),

    #[error("Listener not found: {0}")]
    ListenerNotFound(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Regex error: {0}")]
    RegexError(String),
}

impl From<regex::Error> for BridgeError {
    fn from(err: regex::Error) -> Self {
        BridgeError::RegexError(err.to_string())
    }
}

impl BridgeError {
    /// True for failures detected before anything was sent to the kernel
    pub fn is_pre_dispatch(&self) -> bool {
        !matches!(self, BridgeError::KernelExecutionFailure(_))
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
