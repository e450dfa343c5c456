//! src/routes/health_check.rs

use actix_web::HttpResponse;

/// Liveness probe, always 200 with an empty body.
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().finish()
}
