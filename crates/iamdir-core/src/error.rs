//! Error types for the IAM directory bridge

use thiserror::Error;

#[derive(Error, Debug)]
pub enum IamDirError {
    #[error("Entity not found: {entity_type} {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Entry already exists: {path}")]
    AlreadyExists { path: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Directory error: {message}")]
    DirectoryError { message: String },

    #[error("IAM error: {message}")]
    IamError { message: String },

    #[error("Timed out after {secs}s: {operation}")]
    Timeout { operation: String, secs: u64 },

    #[error("ID allocation failed: {message}")]
    AllocationError { message: String },

    #[error("Bootstrap failed: {message}")]
    BootstrapError { message: String },

    #[error("Authentication error: {message}")]
    AuthError { message: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl IamDirError {
    pub fn not_found(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }

    pub fn already_exists(path: impl Into<String>) -> Self {
        Self::AlreadyExists { path: path.into() }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    pub fn directory(message: impl Into<String>) -> Self {
        Self::DirectoryError {
            message: message.into(),
        }
    }

    pub fn iam(message: impl Into<String>) -> Self {
        Self::IamError {
            message: message.into(),
        }
    }

    pub fn timeout(operation: impl Into<String>, secs: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            secs,
        }
    }

    pub fn allocation(message: impl Into<String>) -> Self {
        Self::AllocationError {
            message: message.into(),
        }
    }

    pub fn bootstrap(message: impl Into<String>) -> Self {
        Self::BootstrapError {
            message: message.into(),
        }
    }

    pub fn auth_error(message: impl Into<String>) -> Self {
        Self::AuthError {
            message: message.into(),
        }
    }

    pub fn config_error(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Directory lookups and deletes treat this as "absent" rather than a failure
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Bootstrap failures are the only errors that stop the scheduler
    pub fn is_bootstrap(&self) -> bool {
        matches!(self, Self::BootstrapError { .. })
    }
}

pub type Result<T> = std::result::Result<T, IamDirError>;
