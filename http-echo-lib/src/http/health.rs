use rama::http::{
    Response,
    service::web::response::{IntoResponse, Json},
};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct HealthStatus {
    status: &'static str,
}

/// Liveness payload, `{"status":"ok"}` with an implicit 200.
pub fn health_response() -> Response {
    Json(HealthStatus { status: "ok" }).into_response()
}
