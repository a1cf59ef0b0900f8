use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use reqwest::StatusCode;
use serde_json::{Value, json};

use dunning_api::app::{AppServices, build_app_with};
use dunning_api::config::ApiConfig;
use dunning_core::OwnerId;
use dunning_infra::{CsvExtractor, EmailKind, InMemoryInvoiceStore, InMemoryNotifier};

struct TestServer {
    base_url: String,
    notifier: Arc<InMemoryNotifier>,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod, with an inspectable mailbox, on an ephemeral port.
        let notifier = Arc::new(InMemoryNotifier::new());
        let services = AppServices::new(
            Arc::new(InMemoryInvoiceStore::new()),
            notifier.clone(),
            Arc::new(CsvExtractor::new()),
            &ApiConfig::default(),
        );
        let app = build_app_with(Arc::new(services));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            notifier,
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

const OWNER: &str = "x-owner-id";

async fn create_invoice(
    client: &reqwest::Client,
    srv: &TestServer,
    owner: OwnerId,
    number: &str,
    due: &str,
) -> Value {
    let res = client
        .post(srv.url("/invoices"))
        .header(OWNER, owner.to_string())
        .json(&json!({
            "invoice_number": number,
            "client_name": "Acme Ltd",
            "client_email": "ap@acme.test",
            "amount": "250.00",
            "due_date": due,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    res.json().await.unwrap()
}

#[tokio::test]
async fn owner_header_required_for_invoice_endpoints() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client.get(srv.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client.get(srv.url("/invoices")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .get(srv.url("/invoices"))
        .header(OWNER, "not-a-uuid")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let owner = OwnerId::new();
    let res = client
        .get(srv.url("/whoami"))
        .header(OWNER, owner.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["owner_id"].as_str().unwrap(), owner.to_string());
}

#[tokio::test]
async fn stateless_helpers_normalize_validate_and_schedule() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .post(srv.url("/dates/normalize"))
        .json(&json!({ "value": "15/03/2025" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["date"], "2025-03-15");

    let res = client
        .post(srv.url("/dates/normalize"))
        .json(&json!({ "value": "next tuesday" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_date");

    let res = client
        .post(srv.url("/rows/validate"))
        .json(&json!({
            "row": { "Invoice": "INV-1", "Client": "", "Email": "nope", "Amount": "10", "Due": "2025-03-20" },
            "index": 4
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["valid"], false);
    assert_eq!(
        body["errors"],
        json!(["Row 5: Missing Client", "Row 5: Invalid email format"])
    );

    let res = client
        .get(srv.url("/schedule"))
        .query(&[("due", "2025-03-20"), ("now", "2025-03-10T08:00:00Z")])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["upcoming"], "2025-03-17T09:00:00Z");
    assert_eq!(body["day1"], "2025-03-21T09:00:00Z");
    assert_eq!(body["day14"], "2025-04-03T09:00:00Z");
    assert_eq!(body["first_checkpoint"], "upcoming");
}

#[tokio::test]
async fn csv_upload_imports_valid_rows_and_reports_the_rest() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let owner = OwnerId::new();

    let csv = "Invoice,Client,Email,Amount,Due\n\
               INV-1,Acme Ltd,ap@acme.test,100,15/04/2030\n\
               INV-2,Beta,not-an-email,50,2030-04-20\n\
               INV-3,Gamma,ap@gamma.test,75.50,2030/05/01\n";

    let res = client
        .post(srv.url("/invoices/upload"))
        .header(OWNER, owner.to_string())
        .header("content-type", "text/csv")
        .body(csv)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let report: Value = res.json().await.unwrap();
    assert_eq!(report["accepted"].as_array().unwrap().len(), 2);
    assert_eq!(report["errors"], json!(["Row 2: Invalid email format"]));
    assert!(report["first_send"].is_string());

    let res = client
        .get(srv.url("/invoices"))
        .header(OWNER, owner.to_string())
        .send()
        .await
        .unwrap();
    let invoices: Vec<Value> = res.json().await.unwrap();
    assert_eq!(invoices.len(), 2);
    for invoice in &invoices {
        assert_eq!(invoice["status"], "pending");
        assert_eq!(invoice["reminder_status"], "active");
        assert_eq!(invoice["currency"], "USD");
        assert_eq!(invoice["next_checkpoint"], "upcoming");
    }

    // Same file again: every number already exists for this owner.
    let res = client
        .post(srv.url("/invoices/upload"))
        .header(OWNER, owner.to_string())
        .header("content-type", "application/json")
        .body(
            json!({
                "rows": [{ "Invoice": "INV-1", "Client": "Acme Ltd", "Email": "ap@acme.test", "Amount": "100", "Due": "2030-04-15" }],
                "currency": "eur"
            })
            .to_string(),
        )
        .send()
        .await
        .unwrap();
    let report: Value = res.json().await.unwrap();
    assert!(report["accepted"].as_array().unwrap().is_empty());
    assert_eq!(
        report["errors"],
        json!(["Row 1: invoice number already exists"])
    );
    assert!(report["first_send"].is_null());
}

#[tokio::test]
async fn single_create_rejects_invalid_fields_with_the_full_list() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .post(srv.url("/invoices"))
        .header(OWNER, OwnerId::new().to_string())
        .json(&json!({
            "invoice_number": "INV-1",
            "client_name": "Acme Ltd",
            "client_email": "nope",
            "amount": "abc",
            "due_date": "2030-01-01",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "validation_error");
    assert_eq!(
        body["errors"],
        json!(["Row 1: Invalid email format", "Row 1: Invalid amount"])
    );
}

#[tokio::test]
async fn extreme_due_years_are_rejected_and_listing_keeps_working() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let owner = OwnerId::new();

    for due in ["Dec 31, +262142", "Jan 02, -262143"] {
        let res = client
            .post(srv.url("/invoices"))
            .header(OWNER, owner.to_string())
            .json(&json!({
                "invoice_number": "INV-X",
                "client_name": "Acme Ltd",
                "client_email": "ap@acme.test",
                "amount": "100",
                "due_date": due,
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["errors"], json!(["Row 1: Invalid date format"]));
    }

    let res = client
        .get(srv.url("/invoices"))
        .header(OWNER, owner.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let invoices: Vec<Value> = res.json().await.unwrap();
    assert!(invoices.is_empty());
}

#[tokio::test]
async fn lifecycle_pause_resume_pay_and_guards() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let owner = OwnerId::new();

    let created = create_invoice(&client, &srv, owner, "INV-7", "2030-06-01").await;
    let id = created["id"].as_str().unwrap().to_string();
    assert_eq!(created["total_due"], "250.00");

    let res = client
        .patch(srv.url(&format!("/invoices/{id}/pause")))
        .header(OWNER, owner.to_string())
        .json(&json!({ "duration": "indefinite", "reason": "client disputes amount" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["reminder_status"], "paused");
    assert!(body["next_send_at"].is_null());

    let res = client
        .patch(srv.url(&format!("/invoices/{id}/resume")))
        .header(OWNER, owner.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["reminder_status"], "active");

    let res = client
        .patch(srv.url(&format!("/invoices/{id}/resume")))
        .header(OWNER, owner.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "guard_violation");

    let res = client
        .patch(srv.url(&format!("/invoices/{id}/paid")))
        .header(OWNER, owner.to_string())
        .json(&json!({ "payment_method": "bank transfer", "send_thank_you": true }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "paid");
    assert_eq!(body["payment_method"], "bank transfer");

    let sent = srv.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].kind, EmailKind::ThankYou);
    assert_eq!(sent[0].to, "ap@acme.test");

    let res = client
        .patch(srv.url(&format!("/invoices/{id}/pause")))
        .header(OWNER, owner.to_string())
        .json(&json!({ "duration": "7d" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let res = client
        .get(srv.url(&format!("/invoices/{id}/history")))
        .header(OWNER, owner.to_string())
        .send()
        .await
        .unwrap();
    let history: Vec<Value> = res.json().await.unwrap();
    let types: Vec<&str> = history
        .iter()
        .map(|e| e["event_type"].as_str().unwrap())
        .collect();
    assert_eq!(
        types,
        vec![
            "reminders.invoice.created",
            "reminders.invoice.paused",
            "reminders.invoice.resumed",
            "reminders.invoice.paid",
        ]
    );
}

#[tokio::test]
async fn edited_email_is_previewed_verbatim_until_regenerated() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let owner = OwnerId::new();

    let created = create_invoice(&client, &srv, owner, "INV-8", "2030-06-01").await;
    let id = created["id"].as_str().unwrap().to_string();

    let res = client
        .patch(srv.url(&format!("/invoices/{id}/edit-email")))
        .header(OWNER, owner.to_string())
        .json(&json!({ "checkpoint": "day7", "subject": "Quick nudge", "body": "Hi, any update?" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .post(srv.url(&format!("/invoices/{id}/preview-email")))
        .header(OWNER, owner.to_string())
        .json(&json!({ "checkpoint": "day7" }))
        .send()
        .await
        .unwrap();
    let preview: Value = res.json().await.unwrap();
    assert_eq!(preview["user_edited"], true);
    assert_eq!(preview["subject"], "Quick nudge");

    let res = client
        .post(srv.url(&format!("/invoices/{id}/preview-email")))
        .header(OWNER, owner.to_string())
        .json(&json!({ "checkpoint": "day7", "tone": "firm" }))
        .send()
        .await
        .unwrap();
    let preview: Value = res.json().await.unwrap();
    assert_eq!(preview["user_edited"], false);
    assert_eq!(preview["tone"], "firm");
    assert!(preview["body"].as_str().unwrap().contains("INV-8"));

    let res = client
        .post(srv.url(&format!("/invoices/{id}/preview-email")))
        .header(OWNER, owner.to_string())
        .json(&json!({ "checkpoint": "day30" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn invoices_are_scoped_to_their_owner() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let owner = OwnerId::new();

    let created = create_invoice(&client, &srv, owner, "INV-1", "2030-06-01").await;
    let id = created["id"].as_str().unwrap().to_string();

    let stranger = OwnerId::new();
    let res = client
        .get(srv.url(&format!("/invoices/{id}")))
        .header(OWNER, stranger.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    // Numbers are unique per owner, not globally.
    create_invoice(&client, &srv, stranger, "INV-1", "2030-06-01").await;

    let res = client
        .get(srv.url("/invoices/not-a-uuid"))
        .header(OWNER, owner.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn edit_and_delete_invoice() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let owner = OwnerId::new();

    let created = create_invoice(&client, &srv, owner, "INV-1", "2030-06-01").await;
    let id = created["id"].as_str().unwrap().to_string();
    create_invoice(&client, &srv, owner, "INV-2", "2030-06-01").await;

    let res = client
        .put(srv.url(&format!("/invoices/{id}")))
        .header(OWNER, owner.to_string())
        .json(&json!({ "due_date": "01/07/2030", "amount": "300", "late_fee": "25" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["due_date"], "2030-07-01");
    assert_eq!(body["total_due"], "325");

    let res = client
        .put(srv.url(&format!("/invoices/{id}")))
        .header(OWNER, owner.to_string())
        .json(&json!({ "invoice_number": "INV-2" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let res = client
        .delete(srv.url(&format!("/invoices/{id}")))
        .header(OWNER, owner.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let res = client
        .get(srv.url(&format!("/invoices/{id}")))
        .header(OWNER, owner.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = client
        .get(srv.url("/invoices"))
        .header(OWNER, owner.to_string())
        .send()
        .await
        .unwrap();
    let invoices: Vec<Value> = res.json().await.unwrap();
    assert_eq!(invoices.len(), 1);
}

#[tokio::test]
async fn sweep_sends_overdue_reminders_once_and_feeds_stats() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let owner = OwnerId::new();

    let created = create_invoice(&client, &srv, owner, "INV-OLD", "2020-01-01").await;
    let id = created["id"].as_str().unwrap().to_string();
    // Overdue on import: nothing goes out before the next daily slot.
    assert_eq!(created["next_checkpoint"], "day1");

    let later = Utc::now() + ChronoDuration::days(2);
    let res = client
        .post(srv.url("/reminders/sweep"))
        .json(&json!({ "now": later }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let report: Value = res.json().await.unwrap();
    assert_eq!(report["sent"].as_array().unwrap().len(), 1);
    assert_eq!(report["sent"][0]["checkpoint"], "day1");
    assert_eq!(report["sent"][0]["invoice_id"], id);

    // Same instant again: already sent for this slot.
    let res = client
        .post(srv.url("/reminders/sweep"))
        .json(&json!({ "now": later }))
        .send()
        .await
        .unwrap();
    let report: Value = res.json().await.unwrap();
    assert!(report["sent"].as_array().unwrap().is_empty());

    let sent = srv.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].kind, EmailKind::Reminder(dunning_reminders::Checkpoint::Day1));

    let res = client
        .get(srv.url(&format!("/invoices/{id}")))
        .header(OWNER, owner.to_string())
        .send()
        .await
        .unwrap();
    let invoice: Value = res.json().await.unwrap();
    assert_eq!(invoice["status"], "day1_sent");
    assert_eq!(invoice["emails_sent"], 1);
    assert_eq!(invoice["next_checkpoint"], "day7");

    let res = client
        .get(srv.url("/stats/recovery"))
        .header(OWNER, owner.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let stats: Value = res.json().await.unwrap();
    assert_eq!(stats["reminders_sent"], 1);
    assert_eq!(stats["outstanding_count"], 1);
    assert_eq!(stats["active_reminders"], 1);
}
