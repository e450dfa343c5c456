//! src/domain/subscriber_token.rs

use crate::domain::ValidationError;
use rand::distributions::{Alphanumeric, DistString};
use rand::rngs::OsRng;

const TOKEN_LENGTH: usize = 25;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriberToken(String);

impl AsRef<str> for SubscriberToken {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl SubscriberToken {
    /// Generate a random 25-characters-long case-sensitive subscription token.
    ///
    /// Every character is drawn uniformly from `[A-Za-z0-9]` using the
    /// operating system's cryptographically secure random source.
    pub fn generate() -> Self {
        Self(Alphanumeric.sample_string(&mut OsRng, TOKEN_LENGTH))
    }

    /// True iff `token` consists of exactly 25 ASCII alphanumeric characters.
    pub fn is_valid_shape(token: &str) -> bool {
        token.len() == TOKEN_LENGTH && token.bytes().all(|b| b.is_ascii_alphanumeric())
    }

    /// parse string as token
    pub fn parse(s: String) -> Result<SubscriberToken, ValidationError> {
        if Self::is_valid_shape(&s) {
            Ok(Self(s))
        } else {
            Err(ValidationError::InvalidToken(s))
        }
    }
}
