//! src/routes/subscriptions/post.rs

use actix_web::{web, HttpResponse};
use anyhow::Context;
use chrono::Utc;
use sqlx::postgres::PgDatabaseError;
use sqlx::{Executor, PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use crate::domain::{
    NewSubscriber, SubscriberEmail, SubscriberName, SubscriberToken, SubscriptionsStatus,
    ValidationError,
};
use crate::email_client::EmailClient;
use crate::error::{AppResult, Error};
use crate::startup::ApplicationBaseUrl;

/// Checks if sqlx::Error results from trying to subscribe the same email twice
fn is_email_subscribed_twice_err(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        if db_err.is_unique_violation() {
            if let Some(pg_err) = db_err.try_downcast_ref::<PgDatabaseError>() {
                return pg_err.table() == Some("subscriptions")
                    && pg_err.constraint() == Some("subscriptions_email_key");
            }
        }
    }
    false
}

#[derive(serde::Deserialize)]
pub struct FormData {
    // missing fields are handled like empty ones by the domain validation
    #[serde(default)]
    email: String,
    #[serde(default)]
    name: String,
}

impl TryFrom<FormData> for NewSubscriber {
    type Error = ValidationError;

    fn try_from(value: FormData) -> Result<Self, Self::Error> {
        let name = SubscriberName::parse(value.name)?;
        let email = SubscriberEmail::parse(value.email)?;
        Ok(Self { email, name })
    }
}

#[tracing::instrument(
    name = "Adding a new subscriber.",
    skip(form, pool, email_client, base_url),
    fields(
        subscriber_email = %form.email,
        subscriber_name = %form.name
    )
)]
pub async fn subscribe(
    form: web::Form<FormData>,
    pool: web::Data<PgPool>,
    email_client: web::Data<EmailClient>,
    base_url: web::Data<ApplicationBaseUrl>,
) -> AppResult<HttpResponse> {
    let new_subscriber: NewSubscriber = form.0.try_into()?;
    if let Some(status) = get_status_from_email(pool.as_ref(), &new_subscriber.email).await? {
        tracing::info!(
            subscriber_status = %status,
            "Email is already subscribed, nothing to do."
        );
        return Ok(HttpResponse::Ok().finish());
    }
    let (subscriber_id, subscription_token) =
        match subscribe_transaction(&new_subscriber, pool.as_ref()).await? {
            Some(stored) => stored,
            // a concurrent request inserted the same email first
            None => return Ok(HttpResponse::Ok().finish()),
        };
    if let Err(e) = send_confirmation_email(
        &email_client,
        &new_subscriber,
        &base_url.0,
        &subscription_token,
    )
    .await
    {
        // a stored pending subscriber must have been sent its link
        remove_pending_subscriber(pool.as_ref(), subscriber_id).await?;
        return Err(e);
    }
    Ok(HttpResponse::Ok().finish())
}

/// Insert subscriber and token in a single transaction and commit it.
///
/// Returns `None` without inserting anything if the email already exists.
/// Otherwise returns the new subscriber id together with its token.
#[tracing::instrument(
    name = "Executing the transaction to insert a new subscriber in the database.",
    skip(new_subscriber, pool)
)]
pub async fn subscribe_transaction(
    new_subscriber: &NewSubscriber,
    pool: &PgPool,
) -> AppResult<Option<(Uuid, SubscriberToken)>> {
    // init transaction
    let mut transaction = pool
        .begin()
        .await
        .context("Failed to acquire a Postgres connection from the pool")?;
    // insert subscriber in transaction
    let subscriber_id = match insert_subscriber(&mut transaction, new_subscriber).await {
        Ok(subscriber_id) => subscriber_id,
        Err(err) if is_email_subscribed_twice_err(&err) => {
            transaction
                .rollback()
                .await
                .context("Failed to roll back SQL transaction.")?;
            return Ok(None);
        }
        Err(err) => {
            return Err(Error::from(
                anyhow::Error::new(err).context("Failed to insert new subscriber in the database."),
            ))
        }
    };
    // insert token in transaction
    let subscription_token = SubscriberToken::generate();
    store_token(&mut transaction, subscriber_id, &subscription_token).await?;
    // commit transaction
    transaction
        .commit()
        .await
        .context("Failed to commit SQL transaction to store a new subscriber.")?;
    Ok(Some((subscriber_id, subscription_token)))
}

#[tracing::instrument(
    name = "Saving new subscriber details in the database.",
    skip(new_subscriber, transaction)
)]
pub async fn insert_subscriber(
    transaction: &mut Transaction<'_, Postgres>,
    new_subscriber: &NewSubscriber,
) -> Result<Uuid, sqlx::Error> {
    let subscriber_id = Uuid::new_v4();
    let query = sqlx::query(
        r#"INSERT INTO subscriptions (id, email, name, subscribed_at, status)
        VALUES ($1, $2, $3, $4, $5)"#,
    )
    .bind(subscriber_id)
    .bind(new_subscriber.email.as_ref())
    .bind(new_subscriber.name.as_ref())
    .bind(Utc::now())
    .bind(SubscriptionsStatus::PendingConfirmation);
    transaction.execute(query).await?;
    Ok(subscriber_id)
}

#[tracing::instrument(
    name = "Store subscription token in the database.",
    skip(subscription_token, transaction)
)]
pub async fn store_token(
    transaction: &mut Transaction<'_, Postgres>,
    subscriber_id: Uuid,
    subscription_token: &SubscriberToken,
) -> AppResult<()> {
    let query = sqlx::query(
        r#"INSERT INTO subscription_tokens (subscription_token, subscriber_id)
        VALUES ($1, $2)"#,
    )
    .bind(subscription_token.as_ref())
    .bind(subscriber_id);
    transaction
        .execute(query)
        .await
        .context("Failed to store the confirmation token for a new subscriber.")?;
    Ok(())
}

/// Delete a freshly stored subscriber and its token, so the same email can subscribe again.
#[tracing::instrument(name = "Remove pending subscriber", skip(pool))]
pub async fn remove_pending_subscriber(pool: &PgPool, subscriber_id: Uuid) -> AppResult<()> {
    let mut transaction = pool
        .begin()
        .await
        .context("Failed to acquire a Postgres connection from the pool")?;
    let query =
        sqlx::query("DELETE FROM subscription_tokens WHERE subscriber_id = $1").bind(subscriber_id);
    transaction
        .execute(query)
        .await
        .context("Failed to delete the token of a pending subscriber.")?;
    let query = sqlx::query(
        "DELETE FROM subscriptions WHERE id = $1 AND status = 'pending_confirmation'",
    )
    .bind(subscriber_id);
    transaction
        .execute(query)
        .await
        .context("Failed to delete a pending subscriber.")?;
    transaction
        .commit()
        .await
        .context("Failed to commit SQL transaction to remove a pending subscriber.")?;
    Ok(())
}

#[tracing::instrument(
    name = "Send a confirmation email to a new subscriber",
    skip(email_client, new_subscriber, base_url, subscription_token)
)]
pub async fn send_confirmation_email(
    email_client: &EmailClient,
    new_subscriber: &NewSubscriber,
    base_url: &str,
    subscription_token: &SubscriberToken,
) -> AppResult<()> {
    let confirmation_link = format!(
        "{}/subscriptions/confirm?subscription_token={}",
        base_url,
        subscription_token.as_ref()
    );
    let plain_body = format!(
        "Welcome to our newsletter!\nVisit {} to confirm your subscription.",
        confirmation_link
    );
    let html_body = format!(
        "Welcome to our newsletter!<br />\
        Click <a href=\"{}\">here</a> to confirm your subscription.",
        confirmation_link
    );
    email_client
        .send_email(&new_subscriber.email, "Welcome!", &html_body, &plain_body)
        .await
        .context("Failed to send a confirmation email.")
        .map_err(Error::EmailDeliveryError)
}

#[tracing::instrument(name = "Get status from email", skip(email, pool))]
pub async fn get_status_from_email(
    pool: &PgPool,
    email: &SubscriberEmail,
) -> AppResult<Option<SubscriptionsStatus>> {
    let row = sqlx::query("SELECT status FROM subscriptions WHERE email = $1")
        .bind(email.as_ref())
        .fetch_optional(pool)
        .await
        .context("Failed to read status of email from database.")?;
    let status = match row {
        Some(row) => Some(
            row.try_get("status")
                .context("Failed to decode status of subscriber.")?,
        ),
        None => None,
    };
    Ok(status)
}
