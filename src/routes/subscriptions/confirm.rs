//! src/routes/subscriptions/confirm.rs

use crate::domain::{SubscriberToken, ValidationError};
use crate::error::{AppResult, Error};
use actix_web::{web, HttpResponse};
use anyhow::Context;
use sqlx::{PgPool, Row};
use uuid::Uuid;

/// Body returned when a confirmation link is clicked more than once.
pub const ALREADY_CONFIRMED_MESSAGE: &str = "You've confirmed the email!";

#[derive(serde::Deserialize)]
pub struct Parameters {
    subscription_token: Option<String>,
}

#[tracing::instrument(name = "Confirm a pending subscriber", skip(parameters, pool))]
pub async fn confirm(
    parameters: web::Query<Parameters>,
    pool: web::Data<PgPool>,
) -> AppResult<HttpResponse> {
    let subscription_token = parameters
        .0
        .subscription_token
        .ok_or(ValidationError::MissingToken)?;
    // reject malformed tokens before touching the database
    let subscription_token = SubscriberToken::parse(subscription_token)?;
    let subscriber_id = get_subscriber_id_from_token(&pool, &subscription_token)
        .await?
        .ok_or(Error::UnknownToken)?;
    if confirm_subscriber(&pool, subscriber_id).await? {
        Ok(HttpResponse::Ok().finish())
    } else {
        tracing::info!(%subscriber_id, "Subscriber is already confirmed.");
        Ok(HttpResponse::Ok().body(ALREADY_CONFIRMED_MESSAGE))
    }
}

/// Move a pending subscriber to `confirmed`.
///
/// Check and update happen in one statement, so of several concurrent
/// confirmations exactly one returns `true`.
#[tracing::instrument(name = "Mark subscriber as confirmed", skip(subscriber_id, pool))]
pub async fn confirm_subscriber(pool: &PgPool, subscriber_id: Uuid) -> AppResult<bool> {
    let result = sqlx::query(
        r#"UPDATE subscriptions SET status = 'confirmed'
        WHERE id = $1 AND status = 'pending_confirmation'"#,
    )
    .bind(subscriber_id)
    .execute(pool)
    .await
    .context("Failed to update status of subscriber_id for confirmation of subscription.")?;
    Ok(result.rows_affected() == 1)
}

#[tracing::instrument(name = "Get subscriber_id from token", skip(subscription_token, pool))]
pub async fn get_subscriber_id_from_token(
    pool: &PgPool,
    subscription_token: &SubscriberToken,
) -> AppResult<Option<Uuid>> {
    let row = sqlx::query(
        "SELECT subscriber_id FROM subscription_tokens
        WHERE subscription_token = $1",
    )
    .bind(subscription_token.as_ref())
    .fetch_optional(pool)
    .await
    .context("Failed to read subscriber_id of subscription_token from database.")?;
    let subscriber_id = match row {
        Some(row) => Some(
            row.try_get("subscriber_id")
                .context("Failed to decode subscriber_id.")?,
        ),
        None => None,
    };
    Ok(subscriber_id)
}
