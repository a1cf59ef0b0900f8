use std::sync::Arc;

use axum::{Json, Router, extract::Extension, response::IntoResponse, routing::get};
use chrono::Utc;

use dunning_app::RecoveryStats;

use crate::app::errors;
use crate::app::services::AppServices;
use crate::context::OwnerContext;

pub fn router() -> Router {
    Router::new().route("/recovery", get(recovery))
}

pub async fn recovery(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(owner): Extension<OwnerContext>,
) -> axum::response::Response {
    let invoices = match services.dispatcher.list(owner.owner_id()) {
        Ok(v) => v,
        Err(e) => return errors::dispatch_error_to_response(e),
    };
    let today = services.window().local_date(Utc::now());
    Json(RecoveryStats::compute(&invoices, today)).into_response()
}
