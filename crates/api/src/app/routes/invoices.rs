use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Extension, Path, Query},
    http::{HeaderMap, StatusCode, header::CONTENT_TYPE},
    response::IntoResponse,
    routing::{get, patch, post},
};
use chrono::Utc;

use dunning_core::{DomainError, InvoiceId};
use dunning_reminders::{
    Checkpoint, CurrencyCode, DeleteInvoice, EditEmail, Invoice, InvoiceCommand, MarkPaid,
    PauseDuration, PauseReminders, ResumeReminders, Tone,
};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::OwnerContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_invoices).post(create_invoice))
        .route("/upload", post(upload_invoices))
        .route(
            "/:id",
            get(get_invoice).put(update_invoice).delete(delete_invoice),
        )
        .route("/:id/history", get(invoice_history))
        .route("/:id/pause", patch(pause_reminders))
        .route("/:id/resume", patch(resume_reminders))
        .route("/:id/paid", patch(mark_paid))
        .route("/:id/edit-email", patch(edit_email))
        .route("/:id/preview-email", post(preview_email))
}

fn parse_id(id: &str) -> Result<InvoiceId, axum::response::Response> {
    id.parse().map_err(|_| {
        errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid invoice id")
    })
}

fn parse_currency(
    raw: Option<&str>,
    default: &CurrencyCode,
) -> Result<CurrencyCode, axum::response::Response> {
    match raw {
        Some(code) => code.parse().map_err(errors::domain_error_to_response),
        None => Ok(default.clone()),
    }
}

fn invoice_response(services: &AppServices, invoice: Invoice) -> axum::response::Response {
    Json(dto::InvoiceResponse::new(invoice, Utc::now(), services.window())).into_response()
}

fn run(
    services: &AppServices,
    owner: OwnerContext,
    id: String,
    command: impl FnOnce() -> Result<InvoiceCommand, DomainError>,
) -> axum::response::Response {
    let invoice_id = match parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let command = match command() {
        Ok(c) => c,
        Err(e) => return errors::domain_error_to_response(e),
    };
    match services
        .dispatcher
        .execute(owner.owner_id(), invoice_id, command)
    {
        Ok(invoice) => invoice_response(services, invoice),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn list_invoices(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(owner): Extension<OwnerContext>,
) -> axum::response::Response {
    let invoices = match services.dispatcher.list(owner.owner_id()) {
        Ok(v) => v,
        Err(e) => return errors::dispatch_error_to_response(e),
    };
    let now = Utc::now();
    let body: Vec<dto::InvoiceResponse> = invoices
        .into_iter()
        .map(|invoice| dto::InvoiceResponse::new(invoice, now, services.window()))
        .collect();
    Json(body).into_response()
}

pub async fn create_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(owner): Extension<OwnerContext>,
    Json(body): Json<dto::CreateInvoiceRequest>,
) -> axum::response::Response {
    let currency = match parse_currency(body.currency.as_deref(), &services.default_currency) {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    match services.dispatcher.create(
        owner.owner_id(),
        &body.to_row(),
        &currency,
        body.late_fee,
        Utc::now(),
    ) {
        Ok(invoice) => {
            let body = dto::InvoiceResponse::new(invoice, Utc::now(), services.window());
            (StatusCode::CREATED, Json(body)).into_response()
        }
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

/// Import a batch: a JSON `{ "rows": [...] }` body, or a raw file handed to
/// the row extractor (`?file_name=` selects the format, default CSV).
pub async fn upload_invoices(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(owner): Extension<OwnerContext>,
    Query(query): Query<dto::UploadQuery>,
    headers: HeaderMap,
    bytes: Bytes,
) -> axum::response::Response {
    let is_json = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"));

    let (rows, currency) = if is_json {
        let body: dto::UploadRequest = match serde_json::from_slice(&bytes) {
            Ok(v) => v,
            Err(e) => {
                return errors::json_error(StatusCode::BAD_REQUEST, "invalid_body", e.to_string());
            }
        };
        (dto::rows_from_maps(body.rows), body.currency.or(query.currency))
    } else {
        let file_name = query.file_name.as_deref().unwrap_or("upload.csv");
        match services.extractor.extract(file_name, &bytes) {
            Ok(rows) => (rows, query.currency),
            Err(e) => return errors::dispatch_error_to_response(e),
        }
    };

    let currency = match parse_currency(currency.as_deref(), &services.default_currency) {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    match services
        .dispatcher
        .import(owner.owner_id(), &rows, &currency, Utc::now())
    {
        Ok(report) => Json(report).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn get_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(owner): Extension<OwnerContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let invoice_id = match parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.dispatcher.get(owner.owner_id(), invoice_id) {
        Ok(invoice) => invoice_response(&services, invoice),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn update_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(owner): Extension<OwnerContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateInvoiceRequest>,
) -> axum::response::Response {
    let invoice_id = match parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let current = match services.dispatcher.get(owner.owner_id(), invoice_id) {
        Ok(v) => v,
        Err(e) => return errors::dispatch_error_to_response(e),
    };
    let details = match dto::merge_details(current.details(), body) {
        Ok(d) => d,
        Err(errs) => return errors::domain_error_to_response(DomainError::validation(errs)),
    };

    match services
        .dispatcher
        .update_details(owner.owner_id(), invoice_id, details, Utc::now())
    {
        Ok(invoice) => invoice_response(&services, invoice),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn delete_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(owner): Extension<OwnerContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let invoice_id = match parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let command = InvoiceCommand::Delete(DeleteInvoice {
        occurred_at: Utc::now(),
    });
    match services
        .dispatcher
        .execute(owner.owner_id(), invoice_id, command)
    {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn invoice_history(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(owner): Extension<OwnerContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let invoice_id = match parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.dispatcher.history(owner.owner_id(), invoice_id) {
        Ok(history) => Json(history).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn pause_reminders(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(owner): Extension<OwnerContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::PauseRequest>,
) -> axum::response::Response {
    run(&services, owner, id, || {
        Ok(InvoiceCommand::Pause(PauseReminders {
            duration: body.duration.parse::<PauseDuration>()?,
            reason: body.reason,
            occurred_at: Utc::now(),
        }))
    })
}

pub async fn resume_reminders(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(owner): Extension<OwnerContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    run(&services, owner, id, || {
        Ok(InvoiceCommand::Resume(ResumeReminders {
            occurred_at: Utc::now(),
        }))
    })
}

pub async fn mark_paid(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(owner): Extension<OwnerContext>,
    Path(id): Path<String>,
    body: Option<Json<dto::MarkPaidRequest>>,
) -> axum::response::Response {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    run(&services, owner, id, || {
        Ok(InvoiceCommand::MarkPaid(MarkPaid {
            paid_at: body.paid_at,
            method: body.payment_method,
            proof: body.proof,
            send_thank_you: body.send_thank_you,
            occurred_at: Utc::now(),
        }))
    })
}

pub async fn edit_email(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(owner): Extension<OwnerContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::EditEmailRequest>,
) -> axum::response::Response {
    run(&services, owner, id, || {
        Ok(InvoiceCommand::EditEmail(EditEmail {
            checkpoint: body.checkpoint.parse::<Checkpoint>()?,
            subject: body.subject,
            body: body.body,
            occurred_at: Utc::now(),
        }))
    })
}

pub async fn preview_email(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(owner): Extension<OwnerContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::PreviewEmailRequest>,
) -> axum::response::Response {
    let invoice_id = match parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let checkpoint = match body.checkpoint.parse::<Checkpoint>() {
        Ok(c) => c,
        Err(e) => return errors::domain_error_to_response(e),
    };
    let tone = match body.tone.as_deref().map(str::parse::<Tone>).transpose() {
        Ok(t) => t,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services
        .dispatcher
        .preview(owner.owner_id(), invoice_id, checkpoint, tone, Utc::now())
    {
        Ok(preview) => Json(preview).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}
