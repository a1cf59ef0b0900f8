use axum::{Router, routing::get};

pub mod invoices;
pub mod reminders;
pub mod stats;
pub mod system;
pub mod tools;

/// Router for all owner-scoped endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/invoices", invoices::router())
        .nest("/stats", stats::router())
}

/// Stateless helpers and the operator-triggered sweep; no owner required.
pub fn public_router() -> Router {
    Router::new()
        .merge(tools::router())
        .nest("/reminders", reminders::router())
}
