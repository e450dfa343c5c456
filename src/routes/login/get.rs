//! src/routes/login/get.rs

use actix_web::Responder;
use actix_web_flash_messages::{IncomingFlashMessages, Level};
use askama_actix::Template;

#[derive(Template)]
#[template(path = "login.html")]
struct LoginTemplate {
    error_messages: Vec<String>,
}

/// Publisher login page, listing the errors of the previous attempt.
#[tracing::instrument(name = "Render publisher login form", skip(flash_messages))]
pub async fn login_form(flash_messages: IncomingFlashMessages) -> impl Responder {
    let error_messages = flash_messages
        .iter()
        .filter(|m| m.level() == Level::Error)
        .map(|m| m.content().to_string())
        .collect();
    LoginTemplate { error_messages }
}
