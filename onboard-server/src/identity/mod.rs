//! Identity registration client
//!
//! The identity service owns user accounts. It rejects a duplicate registration
//! itself, so callers may register at least once per approval attempt.

mod http;

pub use http::HttpIdentityClient;

use async_trait::async_trait;
use shared::ProvisioningFields;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum IdentityError {
    /// An account with this username already exists
    #[error("Account already exists: {0}")]
    AlreadyExists(String),

    /// The identity service refused the registration
    #[error("Registration rejected: {0}")]
    Rejected(String),

    /// Network failure, timeout or 5xx
    #[error("Identity service unavailable: {0}")]
    Unavailable(String),
}

pub type IdentityResult<T> = Result<T, IdentityError>;

#[async_trait]
pub trait IdentityClient: Send + Sync {
    /// Register a tenant account, returning the identity service's account id
    async fn register(&self, account: &ProvisioningFields) -> IdentityResult<String>;

    /// Whether an account was created for `username`
    async fn account_exists(&self, username: &str, email: &str) -> IdentityResult<bool>;
}
