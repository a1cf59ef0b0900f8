//! In-process service implementations backed by a [`ReminderDispatcher`].

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use dunning_core::{InvoiceId, OwnerId};
use dunning_infra::{InvoiceStore, Notifier, ReminderDispatcher};
use dunning_reminders::{
    Checkpoint, CurrencyCode, DeleteInvoice, EditEmail, ImportReport, Invoice, InvoiceCommand,
    InvoiceDetails, MarkPaid, PauseDuration, PauseReminders, RawRow, ResumeReminders,
};

use crate::services::{
    AuthService, InvoiceService, Payment, ServiceError, StatsService, UserProfile,
};
use crate::stats::RecoveryStats;

/// Services for one signed-in owner, talking to the dispatcher directly.
pub struct LocalServices<S, N> {
    dispatcher: Arc<ReminderDispatcher<S, N>>,
    owner_id: OwnerId,
    currency: CurrencyCode,
    now: fn() -> DateTime<Utc>,
}

impl<S, N> LocalServices<S, N> {
    pub fn new(dispatcher: Arc<ReminderDispatcher<S, N>>, owner_id: OwnerId) -> Self {
        Self {
            dispatcher,
            owner_id,
            currency: CurrencyCode::default(),
            now: Utc::now,
        }
    }

    pub fn with_currency(mut self, currency: CurrencyCode) -> Self {
        self.currency = currency;
        self
    }

    pub fn with_clock(mut self, now: fn() -> DateTime<Utc>) -> Self {
        self.now = now;
        self
    }
}

impl<S, N> LocalServices<S, N>
where
    S: InvoiceStore,
    N: Notifier,
{
    fn execute(&self, id: InvoiceId, command: InvoiceCommand) -> Result<Invoice, ServiceError> {
        Ok(self.dispatcher.execute(self.owner_id, id, command)?)
    }
}

#[async_trait]
impl<S, N> InvoiceService for LocalServices<S, N>
where
    S: InvoiceStore + 'static,
    N: Notifier + 'static,
{
    async fn list(&self) -> Result<Vec<Invoice>, ServiceError> {
        Ok(self.dispatcher.list(self.owner_id)?)
    }

    async fn upload(&self, rows: Vec<RawRow>) -> Result<ImportReport, ServiceError> {
        Ok(self
            .dispatcher
            .import(self.owner_id, &rows, &self.currency, (self.now)())?)
    }

    async fn update(&self, id: InvoiceId, details: InvoiceDetails) -> Result<Invoice, ServiceError> {
        Ok(self
            .dispatcher
            .update_details(self.owner_id, id, details, (self.now)())?)
    }

    async fn delete(&self, id: InvoiceId) -> Result<(), ServiceError> {
        self.execute(
            id,
            InvoiceCommand::Delete(DeleteInvoice {
                occurred_at: (self.now)(),
            }),
        )
        .map(drop)
    }

    async fn mark_paid(&self, id: InvoiceId, payment: Payment) -> Result<Invoice, ServiceError> {
        self.execute(
            id,
            InvoiceCommand::MarkPaid(MarkPaid {
                paid_at: payment.paid_at,
                method: payment.method,
                proof: payment.proof,
                send_thank_you: payment.send_thank_you,
                occurred_at: (self.now)(),
            }),
        )
    }

    async fn pause(
        &self,
        id: InvoiceId,
        duration: PauseDuration,
        reason: Option<String>,
    ) -> Result<Invoice, ServiceError> {
        self.execute(
            id,
            InvoiceCommand::Pause(PauseReminders {
                duration,
                reason,
                occurred_at: (self.now)(),
            }),
        )
    }

    async fn resume(&self, id: InvoiceId) -> Result<Invoice, ServiceError> {
        self.execute(
            id,
            InvoiceCommand::Resume(ResumeReminders {
                occurred_at: (self.now)(),
            }),
        )
    }

    async fn edit_email(
        &self,
        id: InvoiceId,
        checkpoint: Checkpoint,
        subject: String,
        body: String,
    ) -> Result<Invoice, ServiceError> {
        self.execute(
            id,
            InvoiceCommand::EditEmail(EditEmail {
                checkpoint,
                subject,
                body,
                occurred_at: (self.now)(),
            }),
        )
    }
}

#[async_trait]
impl<S, N> StatsService for LocalServices<S, N>
where
    S: InvoiceStore + 'static,
    N: Notifier + 'static,
{
    async fn recovery(&self) -> Result<RecoveryStats, ServiceError> {
        let invoices = self.dispatcher.list(self.owner_id)?;
        Ok(RecoveryStats::compute(&invoices, (self.now)().date_naive()))
    }
}

/// Fixed session: a profile when signed in, `None` when not.
#[derive(Debug, Clone, Default)]
pub struct StaticAuth {
    profile: Option<UserProfile>,
}

impl StaticAuth {
    pub fn signed_in(profile: UserProfile) -> Self {
        Self {
            profile: Some(profile),
        }
    }

    pub fn signed_out() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuthService for StaticAuth {
    async fn me(&self) -> Result<UserProfile, ServiceError> {
        self.profile.clone().ok_or(ServiceError::Unauthorized)
    }

    async fn logout(&self) {}
}
