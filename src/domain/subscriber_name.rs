//! src/domain/subscriber_name.rs

use crate::domain::ValidationError;

const MAX_NAME_LENGTH: usize = 256;
const FORBIDDEN_CHARACTERS: [char; 11] = ['(', ')', '{', '}', '<', '>', '[', ']', '\\', '/', '"'];

#[derive(Debug)]
pub struct SubscriberName(String);

impl SubscriberName {
    /// Returns an instance of `SubscriberName` if the input satisfies all
    /// our validation constraints on subscriber names.
    /// The original input is kept, including surrounding whitespace.
    pub fn parse(s: String) -> Result<Self, ValidationError> {
        let is_empty_or_whitespace = s.trim().is_empty();
        // Length is counted in code points, not graphemes.
        let is_too_long = s.chars().count() > MAX_NAME_LENGTH;
        let contains_forbidden_characters = s.chars().any(|g| FORBIDDEN_CHARACTERS.contains(&g));

        if is_empty_or_whitespace || is_too_long || contains_forbidden_characters {
            Err(ValidationError::InvalidName(s))
        } else {
            Ok(Self(s))
        }
    }
}

impl AsRef<str> for SubscriberName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
