//! src/routes/newsletters.rs

use crate::authentication::{basic_authentication, validate_credentials};
use crate::domain::{NewsletterIssue, SubscriberEmail, SubscriptionsStatus};
use crate::email_client::EmailClient;
use crate::error::{AppResult, Error};
use actix_web::{web, HttpRequest, HttpResponse};
use anyhow::Context;
use sqlx::{PgPool, Row};

struct ConfirmedSubscriber {
    email: SubscriberEmail,
}

/// Broadcast an issue to every confirmed subscriber.
///
/// Delivery is fail-fast: the first failed send aborts the loop and the
/// remaining subscribers get nothing for this request.
#[tracing::instrument(
    name = "Publish a newsletter issue",
    skip(body, pool, email_client, request),
    fields(username=tracing::field::Empty, user_id=tracing::field::Empty)
)]
pub async fn publish_newsletter(
    body: web::Bytes,
    pool: web::Data<PgPool>,
    email_client: web::Data<EmailClient>,
    request: HttpRequest,
) -> AppResult<HttpResponse> {
    let credentials = basic_authentication(request.headers()).map_err(Error::AuthError)?;
    tracing::Span::current().record("username", tracing::field::display(&credentials.username));
    let user_id = validate_credentials(credentials, &pool).await?;
    tracing::Span::current().record("user_id", tracing::field::display(&user_id));

    // the body is only looked at once the caller is authenticated
    let issue = NewsletterIssue::parse_json(&body)?;
    let subscribers = get_confirmed_subscribers(&pool).await?;
    for subscriber in subscribers {
        match subscriber {
            Ok(subscriber) => {
                email_client
                    .send_email(
                        &subscriber.email,
                        &issue.title,
                        &issue.html_content,
                        &issue.text_content,
                    )
                    .await
                    .with_context(|| {
                        format!("Failed to send newsletter issue to {}", subscriber.email)
                    })
                    .map_err(Error::EmailDeliveryError)?;
            }
            Err(error) => {
                tracing::warn!(
                    // We record the error chain as a structured field
                    // on the log record.
                    error.cause_chain = ?error,
                    "Skipping a confirmed subscriber. \
                    Their stored contact details are invalid",
                );
            }
        }
    }
    Ok(HttpResponse::Ok().finish())
}

#[tracing::instrument(name = "Get confirmed subscribers", skip(pool))]
async fn get_confirmed_subscribers(
    pool: &PgPool,
) -> AppResult<Vec<Result<ConfirmedSubscriber, anyhow::Error>>> {
    let rows = sqlx::query("SELECT email FROM subscriptions WHERE status = $1")
        .bind(SubscriptionsStatus::Confirmed)
        .fetch_all(pool)
        .await
        .context("Failed to read confirmed subscribers from database.")?;
    let confirmed_subscribers = rows
        .into_iter()
        .map(|row| -> Result<ConfirmedSubscriber, anyhow::Error> {
            let email: String = row.try_get("email")?;
            match SubscriberEmail::parse(email) {
                Ok(email) => Ok(ConfirmedSubscriber { email }),
                Err(error) => Err(anyhow::anyhow!(error)),
            }
        })
        .collect();
    Ok(confirmed_subscribers)
}
