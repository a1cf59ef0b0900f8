use std::sync::Arc;

use axum::{Json, Router, extract::Extension, response::IntoResponse, routing::post};
use chrono::Utc;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new().route("/sweep", post(sweep))
}

/// Fire every reminder due at `now` (defaults to the current time).
pub async fn sweep(
    Extension(services): Extension<Arc<AppServices>>,
    body: Option<Json<dto::SweepRequest>>,
) -> axum::response::Response {
    let now = body.and_then(|Json(b)| b.now).unwrap_or_else(Utc::now);
    match services.dispatcher.sweep(now) {
        Ok(report) => Json(report).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}
