//! Verification Channels

use std::fmt;

use async_trait::async_trait;
use mockall::automock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::customers::PhoneNumber;

/// Handle for one code sent through a channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    /// Wrap a token issued by a channel.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Borrow the raw token.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Channel transport errors.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The provider could not be reached or refused the request.
    #[error("verification provider unavailable: {0}")]
    Unavailable(String),

    /// The provider no longer knows the token.
    #[error("verification session {0} has expired")]
    Expired(SessionToken),
}

/// One-time password delivery to the customer.
#[automock]
#[async_trait]
pub trait OtpChannel: Send + Sync {
    /// Send a code to `phone`.
    async fn send(&self, phone: &PhoneNumber) -> Result<SessionToken, ChannelError>;

    /// Check `code` against the one sent for `token`.
    async fn verify(&self, token: &SessionToken, code: &str) -> Result<bool, ChannelError>;
}

/// Confirmation by the referring customer.
#[automock]
#[async_trait]
pub trait ReferralChannel: Send + Sync {
    /// Send a confirmation code to the referring customer.
    async fn send(&self, phone: &PhoneNumber) -> Result<SessionToken, ChannelError>;

    /// Check `code` against the one sent for `token`.
    async fn verify(&self, token: &SessionToken, code: &str) -> Result<bool, ChannelError>;
}
