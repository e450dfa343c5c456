//! src/domain/mod.rs

mod new_subscriber;
mod newsletter_issue;
mod subscriber_email;
mod subscriber_name;
mod subscriber_token;
mod subscriptions_status;

pub use new_subscriber::NewSubscriber;
pub use newsletter_issue::NewsletterIssue;
pub use subscriber_email::SubscriberEmail;
pub use subscriber_name::SubscriberName;
pub use subscriber_token::SubscriberToken;
pub use subscriptions_status::SubscriptionsStatus;

/// Validation error for domain data
#[derive(thiserror::Error, Debug)]
pub enum ValidationError {
    #[error("`{0}` is not a valid subscriber email.")]
    InvalidEmail(String),
    #[error("`{0}` is not a valid subscriber name.")]
    InvalidName(String),
    #[error("Missing subscription token.")]
    MissingToken,
    #[error("`{0}` is not a valid subscriber token.")]
    InvalidToken(String),
    #[error("Invalid newsletter issue: {0}")]
    InvalidNewsletter(String),
}
