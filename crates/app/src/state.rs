//! Application state and the pure reducer.

use dunning_core::InvoiceId;
use dunning_reminders::{
    Checkpoint, ImportReport, Invoice, InvoiceDetails, PauseDuration, RawRow,
};

use crate::services::{Payment, ServiceError, UserProfile};
use crate::stats::RecoveryStats;

/// Everything the client shows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppState {
    pub user: Option<UserProfile>,
    pub invoices: Vec<Invoice>,
    pub stats: Option<RecoveryStats>,
    pub loading: bool,
    pub stats_loading: bool,
    pub error: Option<String>,
    /// Result of the most recent upload, for the import summary.
    pub last_import: Option<ImportReport>,
}

impl AppState {
    pub fn is_subscribed(&self) -> bool {
        self.user.as_ref().is_some_and(UserProfile::is_subscribed)
    }

    pub fn invoice(&self, id: InvoiceId) -> Option<&Invoice> {
        self.invoices.iter().find(|i| i.id_typed() == id)
    }
}

/// A user intent or a service response.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    SessionStarted,
    Logout,
    RefreshInvoices,
    RefreshStats,
    ClearInvoices,
    Upload(Vec<RawRow>),
    UpdateDetails {
        id: InvoiceId,
        details: InvoiceDetails,
    },
    Delete(InvoiceId),
    MarkPaid {
        id: InvoiceId,
        payment: Payment,
    },
    Pause {
        id: InvoiceId,
        duration: PauseDuration,
        reason: Option<String>,
    },
    Resume(InvoiceId),
    EditEmail {
        id: InvoiceId,
        checkpoint: Checkpoint,
        subject: String,
        body: String,
    },

    ProfileLoaded(Result<UserProfile, ServiceError>),
    InvoicesLoaded(Result<Vec<Invoice>, ServiceError>),
    StatsLoaded(Result<RecoveryStats, ServiceError>),
    UploadFinished(Result<ImportReport, ServiceError>),
    MutationFinished {
        result: Result<(), ServiceError>,
        refresh_stats: bool,
    },
}

/// A service call the runtime must perform.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    LoadProfile,
    ClearSession,
    FetchInvoices,
    FetchStats,
    Upload(Vec<RawRow>),
    UpdateDetails {
        id: InvoiceId,
        details: InvoiceDetails,
    },
    Delete(InvoiceId),
    MarkPaid {
        id: InvoiceId,
        payment: Payment,
    },
    Pause {
        id: InvoiceId,
        duration: PauseDuration,
        reason: Option<String>,
    },
    Resume(InvoiceId),
    EditEmail {
        id: InvoiceId,
        checkpoint: Checkpoint,
        subject: String,
        body: String,
    },
}

fn start_mutation(mut state: AppState, effect: Effect) -> (AppState, Vec<Effect>) {
    state.loading = true;
    state.error = None;
    (state, vec![effect])
}

/// Apply one action. Pure: no IO, no clock.
pub fn reduce(mut state: AppState, action: Action) -> (AppState, Vec<Effect>) {
    match action {
        Action::SessionStarted => (state, vec![Effect::LoadProfile]),
        Action::Logout => {
            state.user = None;
            state.invoices.clear();
            state.stats = None;
            state.last_import = None;
            (state, vec![Effect::ClearSession])
        }
        Action::RefreshInvoices => {
            state.loading = true;
            state.error = None;
            (state, vec![Effect::FetchInvoices])
        }
        Action::RefreshStats => {
            state.stats_loading = true;
            (state, vec![Effect::FetchStats])
        }
        Action::ClearInvoices => {
            state.invoices.clear();
            (state, vec![])
        }

        Action::Upload(rows) => start_mutation(state, Effect::Upload(rows)),
        Action::UpdateDetails { id, details } => {
            start_mutation(state, Effect::UpdateDetails { id, details })
        }
        Action::Delete(id) => start_mutation(state, Effect::Delete(id)),
        Action::MarkPaid { id, payment } => start_mutation(state, Effect::MarkPaid { id, payment }),
        Action::Pause {
            id,
            duration,
            reason,
        } => start_mutation(
            state,
            Effect::Pause {
                id,
                duration,
                reason,
            },
        ),
        Action::Resume(id) => start_mutation(state, Effect::Resume(id)),
        Action::EditEmail {
            id,
            checkpoint,
            subject,
            body,
        } => start_mutation(
            state,
            Effect::EditEmail {
                id,
                checkpoint,
                subject,
                body,
            },
        ),

        Action::ProfileLoaded(Ok(user)) => {
            state.user = Some(user);
            state.loading = true;
            state.stats_loading = true;
            (state, vec![Effect::FetchInvoices, Effect::FetchStats])
        }
        Action::ProfileLoaded(Err(ServiceError::Unauthorized)) => reduce(state, Action::Logout),
        Action::ProfileLoaded(Err(_)) => (state, vec![]),

        Action::InvoicesLoaded(result) => {
            state.loading = false;
            match result {
                Ok(invoices) => state.invoices = invoices,
                // Keep the last known list on screen.
                Err(e) => state.error = Some(e.to_string()),
            }
            (state, vec![])
        }
        Action::StatsLoaded(result) => {
            state.stats_loading = false;
            if let Ok(stats) = result {
                state.stats = Some(stats);
            }
            (state, vec![])
        }
        Action::UploadFinished(Ok(report)) => {
            state.last_import = Some(report);
            state.stats_loading = true;
            (state, vec![Effect::FetchInvoices, Effect::FetchStats])
        }
        Action::MutationFinished {
            result: Ok(()),
            refresh_stats,
        } => {
            let mut effects = vec![Effect::FetchInvoices];
            if refresh_stats {
                state.stats_loading = true;
                effects.push(Effect::FetchStats);
            }
            (state, effects)
        }
        Action::UploadFinished(Err(e)) | Action::MutationFinished { result: Err(e), .. } => {
            state.loading = false;
            state.error = Some(e.to_string());
            (state, vec![])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> UserProfile {
        UserProfile {
            name: "Dana".to_string(),
            email: "dana@studio.test".to_string(),
            subscription_status: Some("active".to_string()),
        }
    }

    #[test]
    fn profile_load_fetches_invoices_and_stats() {
        let (state, effects) = reduce(AppState::default(), Action::ProfileLoaded(Ok(profile())));
        assert!(state.is_subscribed());
        assert!(state.loading);
        assert_eq!(effects, vec![Effect::FetchInvoices, Effect::FetchStats]);
    }

    #[test]
    fn unauthorized_profile_logs_out() {
        let state = AppState {
            user: Some(profile()),
            ..AppState::default()
        };
        let (state, effects) = reduce(state, Action::ProfileLoaded(Err(ServiceError::Unauthorized)));
        assert!(state.user.is_none());
        assert_eq!(effects, vec![Effect::ClearSession]);
    }

    #[test]
    fn failed_fetch_keeps_previous_invoices() {
        let (state, _) = reduce(AppState::default(), Action::RefreshInvoices);
        assert!(state.loading);
        let (state, effects) = reduce(
            state,
            Action::InvoicesLoaded(Err(ServiceError::Unavailable("timeout".to_string()))),
        );
        assert!(!state.loading);
        assert_eq!(state.error.as_deref(), Some("service unavailable: timeout"));
        assert!(effects.is_empty());
    }

    #[test]
    fn mutations_refresh_what_they_affect() {
        let id = InvoiceId::new();
        let (state, effects) = reduce(AppState::default(), Action::Resume(id));
        assert!(state.loading);
        assert_eq!(effects, vec![Effect::Resume(id)]);

        let (_, effects) = reduce(
            state.clone(),
            Action::MutationFinished {
                result: Ok(()),
                refresh_stats: false,
            },
        );
        assert_eq!(effects, vec![Effect::FetchInvoices]);

        let (_, effects) = reduce(
            state.clone(),
            Action::MutationFinished {
                result: Ok(()),
                refresh_stats: true,
            },
        );
        assert_eq!(effects, vec![Effect::FetchInvoices, Effect::FetchStats]);

        let (state, effects) = reduce(
            state,
            Action::MutationFinished {
                result: Err(ServiceError::Rejected("guard violation: cannot resume".to_string())),
                refresh_stats: false,
            },
        );
        assert!(effects.is_empty());
        assert!(!state.loading);
        assert!(state.error.is_some());
    }
}
