use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Json, Router, routing::get};
use serde::Serialize;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub chat_loop: bool,
    pub file_loop: bool,
    pub database: bool,
}

impl HealthResponse {
    fn from_checks(chat_loop: bool, file_loop: bool, database: bool) -> (StatusCode, Self) {
        let healthy = chat_loop && file_loop && database;
        let (http_status, status) = if healthy {
            (StatusCode::OK, "ok")
        } else {
            (StatusCode::SERVICE_UNAVAILABLE, "degraded")
        };

        (
            http_status,
            Self {
                status,
                version: env!("CARGO_PKG_VERSION"),
                chat_loop,
                file_loop,
                database,
            },
        )
    }
}

/// Reports both subscription loops and the document store. A stopped loop
/// is never restarted in-process, so 503 here means the supervisor should
/// restart the worker.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let db_ok = sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(&state.db)
        .await
        .is_ok();

    let (http_status, body) = HealthResponse::from_checks(
        state.loops.chat.is_alive(),
        state.loops.files.is_alive(),
        db_ok,
    );
    (http_status, Json(body))
}
