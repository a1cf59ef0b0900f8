//! Service interfaces injected into the runtime.
//!
//! Each trait is the request/response contract of one remote concern; the
//! runtime never knows whether it talks to HTTP or to an in-process dispatcher.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use dunning_core::{DomainError, InvoiceId};
use dunning_infra::DispatchError;
use dunning_reminders::{
    Checkpoint, ImportReport, Invoice, InvoiceDetails, PauseDuration, RawRow,
};

use crate::stats::RecoveryStats;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// The session is missing or expired.
    #[error("unauthorized")]
    Unauthorized,
    /// The request was understood and refused.
    #[error("{0}")]
    Rejected(String),
    /// The service could not be reached or failed internally.
    #[error("service unavailable: {0}")]
    Unavailable(String),
}

impl From<DispatchError> for ServiceError {
    fn from(value: DispatchError) -> Self {
        match value {
            DispatchError::Domain(e) => ServiceError::Rejected(e.to_string()),
            DispatchError::External(e) => ServiceError::Unavailable(e.to_string()),
        }
    }
}

impl From<DomainError> for ServiceError {
    fn from(value: DomainError) -> Self {
        ServiceError::Rejected(value.to_string())
    }
}

/// The signed-in account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub name: String,
    pub email: String,
    pub subscription_status: Option<String>,
}

impl UserProfile {
    pub fn is_subscribed(&self) -> bool {
        self.subscription_status.as_deref() == Some("active")
    }
}

/// Payment confirmation details.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub paid_at: Option<DateTime<Utc>>,
    pub method: Option<String>,
    pub proof: Option<String>,
    pub send_thank_you: bool,
}

#[async_trait]
pub trait InvoiceService: Send + Sync {
    async fn list(&self) -> Result<Vec<Invoice>, ServiceError>;

    async fn upload(&self, rows: Vec<RawRow>) -> Result<ImportReport, ServiceError>;

    async fn update(&self, id: InvoiceId, details: InvoiceDetails) -> Result<Invoice, ServiceError>;

    async fn delete(&self, id: InvoiceId) -> Result<(), ServiceError>;

    async fn mark_paid(&self, id: InvoiceId, payment: Payment) -> Result<Invoice, ServiceError>;

    async fn pause(
        &self,
        id: InvoiceId,
        duration: PauseDuration,
        reason: Option<String>,
    ) -> Result<Invoice, ServiceError>;

    async fn resume(&self, id: InvoiceId) -> Result<Invoice, ServiceError>;

    async fn edit_email(
        &self,
        id: InvoiceId,
        checkpoint: Checkpoint,
        subject: String,
        body: String,
    ) -> Result<Invoice, ServiceError>;
}

#[async_trait]
pub trait AuthService: Send + Sync {
    /// Resolve the current session to a profile.
    async fn me(&self) -> Result<UserProfile, ServiceError>;

    /// Drop the stored session.
    async fn logout(&self);
}

#[async_trait]
pub trait StatsService: Send + Sync {
    async fn recovery(&self) -> Result<RecoveryStats, ServiceError>;
}
