//! Pure helpers: row validation, date normalisation, schedule preview.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Query},
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;

use dunning_reminders::{RawRow, compute_schedule_from_text, normalize_date, validate_row};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/rows/validate", post(validate))
        .route("/dates/normalize", post(normalize))
        .route("/schedule", get(schedule))
}

pub async fn validate(Json(body): Json<dto::ValidateRowRequest>) -> axum::response::Response {
    let row: RawRow = body.row.into_iter().collect();
    let errors = validate_row(&row, body.index);
    Json(dto::ValidateRowResponse {
        valid: errors.is_empty(),
        errors,
    })
    .into_response()
}

pub async fn normalize(Json(body): Json<dto::NormalizeDateRequest>) -> axum::response::Response {
    match normalize_date(&body.value) {
        Ok(date) => Json(dto::NormalizeDateResponse { date }).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn schedule(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::ScheduleQuery>,
) -> axum::response::Response {
    let now = query.now.unwrap_or_else(Utc::now);
    match compute_schedule_from_text(&query.due, now, services.window()) {
        Ok(schedule) => Json(schedule).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}
