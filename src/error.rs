//! src/error.rs

use crate::authentication::CredentialsError;
use crate::domain::ValidationError;
use actix_web::http::{header, header::HeaderValue, StatusCode};
use actix_web::{HttpResponse, ResponseError};

pub type AppResult<T> = Result<T, Error>;

pub fn error_chain_fmt(
    e: &impl std::error::Error,
    f: &mut std::fmt::Formatter<'_>,
) -> std::fmt::Result {
    writeln!(f, "{}\n", e)?;
    let mut current = e.source();
    while let Some(cause) = current {
        writeln!(f, "Caused by:\n\t{}", cause)?;
        current = cause.source();
    }
    Ok(())
}

#[derive(thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    InvalidRequest(#[from] ValidationError),
    #[error("Authentication failed.")]
    AuthError(#[source] anyhow::Error),
    #[error("Unknown subscription token.")]
    UnknownToken,
    #[error("Failed to deliver an email.")]
    EmailDeliveryError(#[source] anyhow::Error),
    #[error(transparent)]
    UnexpectedError(#[from] anyhow::Error),
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Error::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Error::AuthError(_) => StatusCode::UNAUTHORIZED,
            Error::UnknownToken => StatusCode::NOT_FOUND,
            Error::EmailDeliveryError(_) | Error::UnexpectedError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            Error::InvalidRequest(_) | Error::UnknownToken => {
                HttpResponse::build(self.status_code()).body(self.to_string())
            }
            Error::AuthError(_) => {
                let mut response = HttpResponse::new(StatusCode::UNAUTHORIZED);
                let header_value = HeaderValue::from_static(r#"Basic realm="publish""#);
                response
                    .headers_mut()
                    // actix_web::http::header provides a collection of constants
                    // for the names of several well-known/standard HTTP headers
                    .insert(header::WWW_AUTHENTICATE, header_value);
                response
            }
            Error::EmailDeliveryError(_) | Error::UnexpectedError(_) => {
                HttpResponse::new(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }
}

impl From<CredentialsError> for Error {
    fn from(err: CredentialsError) -> Self {
        match err {
            CredentialsError::UnexpectedError(err) => Error::UnexpectedError(err),
            err => Error::AuthError(err.into()),
        }
    }
}
