//! src/domain/newsletter_issue.rs

use crate::domain::ValidationError;

#[derive(serde::Deserialize)]
pub struct BodyData {
    title: String,
    content: Content,
}

#[derive(serde::Deserialize)]
pub struct Content {
    html: String,
    text: String,
}

/// A single newsletter broadcast. Never persisted.
#[derive(Debug)]
pub struct NewsletterIssue {
    pub title: String,
    pub html_content: String,
    pub text_content: String,
}

impl NewsletterIssue {
    /// Parse a JSON body of the shape `{"title": .., "content": {"html": .., "text": ..}}`.
    pub fn parse_json(body: &[u8]) -> Result<Self, ValidationError> {
        let body: BodyData = serde_json::from_slice(body)
            .map_err(|e| ValidationError::InvalidNewsletter(e.to_string()))?;
        Self::try_from(body)
    }
}

impl TryFrom<BodyData> for NewsletterIssue {
    type Error = ValidationError;

    fn try_from(value: BodyData) -> Result<Self, Self::Error> {
        if value.title.trim().is_empty() {
            return Err(ValidationError::InvalidNewsletter(
                "the title must not be empty".into(),
            ));
        }
        if value.content.html.trim().is_empty() || value.content.text.trim().is_empty() {
            return Err(ValidationError::InvalidNewsletter(
                "both html and text content must be set".into(),
            ));
        }
        Ok(Self {
            title: value.title,
            html_content: value.content.html,
            text_content: value.content.text,
        })
    }
}
