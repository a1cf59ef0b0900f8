//! Client-side application state.
//!
//! The state container is a plain struct driven by a pure reducer:
//! `reduce(state, action) -> (state', effects)`. Effects name the service call
//! to make; the [`Runtime`] performs them against injected services and feeds
//! the responses back in as actions. Tests drive the reducer directly or the
//! runtime with in-process services, with no network involved.

pub mod local;
pub mod runtime;
pub mod services;
pub mod state;
pub mod stats;

pub use local::{LocalServices, StaticAuth};
pub use runtime::Runtime;
pub use services::{AuthService, InvoiceService, Payment, ServiceError, StatsService, UserProfile};
pub use state::{Action, AppState, Effect, reduce};
pub use stats::RecoveryStats;
