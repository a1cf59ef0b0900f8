//! Effect runtime: performs reducer effects against the injected services.

use std::collections::VecDeque;
use std::sync::Arc;

use tracing::debug;

use crate::services::{AuthService, InvoiceService, StatsService};
use crate::state::{Action, AppState, Effect, reduce};

pub struct Runtime {
    state: AppState,
    invoices: Arc<dyn InvoiceService>,
    auth: Arc<dyn AuthService>,
    stats: Arc<dyn StatsService>,
}

impl Runtime {
    pub fn new(
        invoices: Arc<dyn InvoiceService>,
        auth: Arc<dyn AuthService>,
        stats: Arc<dyn StatsService>,
    ) -> Self {
        Self {
            state: AppState::default(),
            invoices,
            auth,
            stats,
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Reduce `action`, then perform effects until no follow-up actions remain.
    pub async fn dispatch(&mut self, action: Action) -> &AppState {
        let mut queue = VecDeque::from([action]);
        while let Some(action) = queue.pop_front() {
            let (next, effects) = reduce(std::mem::take(&mut self.state), action);
            self.state = next;
            for effect in effects {
                if let Some(follow_up) = self.perform(effect).await {
                    queue.push_back(follow_up);
                }
            }
        }
        &self.state
    }

    async fn perform(&self, effect: Effect) -> Option<Action> {
        debug!(effect = effect_name(&effect), "performing effect");
        let action = match effect {
            Effect::LoadProfile => Action::ProfileLoaded(self.auth.me().await),
            Effect::ClearSession => {
                self.auth.logout().await;
                return None;
            }
            Effect::FetchInvoices => Action::InvoicesLoaded(self.invoices.list().await),
            Effect::FetchStats => Action::StatsLoaded(self.stats.recovery().await),
            Effect::Upload(rows) => Action::UploadFinished(self.invoices.upload(rows).await),
            Effect::UpdateDetails { id, details } => Action::MutationFinished {
                result: self.invoices.update(id, details).await.map(drop),
                refresh_stats: true,
            },
            Effect::Delete(id) => Action::MutationFinished {
                result: self.invoices.delete(id).await,
                refresh_stats: true,
            },
            Effect::MarkPaid { id, payment } => Action::MutationFinished {
                result: self.invoices.mark_paid(id, payment).await.map(drop),
                refresh_stats: true,
            },
            Effect::Pause {
                id,
                duration,
                reason,
            } => Action::MutationFinished {
                result: self.invoices.pause(id, duration, reason).await.map(drop),
                refresh_stats: false,
            },
            Effect::Resume(id) => Action::MutationFinished {
                result: self.invoices.resume(id).await.map(drop),
                refresh_stats: false,
            },
            Effect::EditEmail {
                id,
                checkpoint,
                subject,
                body,
            } => Action::MutationFinished {
                result: self
                    .invoices
                    .edit_email(id, checkpoint, subject, body)
                    .await
                    .map(drop),
                refresh_stats: false,
            },
        };
        Some(action)
    }
}

fn effect_name(effect: &Effect) -> &'static str {
    match effect {
        Effect::LoadProfile => "load_profile",
        Effect::ClearSession => "clear_session",
        Effect::FetchInvoices => "fetch_invoices",
        Effect::FetchStats => "fetch_stats",
        Effect::Upload(_) => "upload",
        Effect::UpdateDetails { .. } => "update_details",
        Effect::Delete(_) => "delete",
        Effect::MarkPaid { .. } => "mark_paid",
        Effect::Pause { .. } => "pause",
        Effect::Resume(_) => "resume",
        Effect::EditEmail { .. } => "edit_email",
    }
}
