//! src/session_state.rs

use actix_session::{Session, SessionExt, SessionInsertError};
use actix_web::{dev::Payload, FromRequest, HttpRequest};
use std::future::{ready, Ready};
use uuid::Uuid;

/// Typed wrapper around the cookie session, so keys are not spelled out at call sites.
pub struct TypedSession(Session);

impl TypedSession {
    const USER_ID_KEY: &'static str = "user_id";

    pub fn renew(&self) {
        self.0.renew();
    }

    pub fn insert_user_id(&self, user_id: Uuid) -> Result<(), SessionInsertError> {
        self.0.insert(Self::USER_ID_KEY, user_id)
    }
}

impl FromRequest for TypedSession {
    // Same error as the `FromRequest` implementation of `Session`.
    type Error = <Session as FromRequest>::Error;
    // Nothing to await here, so the value is wrapped into an already resolved future.
    type Future = Ready<Result<TypedSession, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(Ok(TypedSession(req.get_session())))
    }
}
