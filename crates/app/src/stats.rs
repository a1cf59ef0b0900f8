//! Recovery statistics for the dashboard.

use chrono::{Days, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use dunning_reminders::Invoice;

/// Forecast horizon for `expected_recovery`.
pub const FORECAST_DAYS: u64 = 14;

/// Aggregate figures over one owner's live invoices.
///
/// Every amount is an invoice's total due (principal plus late fee), summed
/// as-is across currencies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryStats {
    pub total_amount: Decimal,
    pub paid_amount: Decimal,
    /// `paid_amount / total_amount` as a percentage (one decimal), 0 when empty.
    pub recovery_rate: Decimal,
    /// Outstanding amount of unpaid invoices due within the next 14 days.
    pub expected_recovery: Decimal,
    /// Invoices that still have a reminder ahead of them.
    pub active_reminders: usize,
    /// Overdue-stage reminders sent, across all invoices.
    pub reminders_sent: u32,
    pub paid_count: usize,
    pub outstanding_count: usize,
}

impl RecoveryStats {
    pub fn compute(invoices: &[Invoice], today: NaiveDate) -> Self {
        let horizon = today
            .checked_add_days(Days::new(FORECAST_DAYS))
            .unwrap_or(NaiveDate::MAX);
        let mut stats = RecoveryStats::default();

        for invoice in invoices.iter().filter(|i| i.is_created() && !i.is_deleted()) {
            let due = invoice.total_due();
            stats.total_amount += due;
            stats.reminders_sent += invoice.emails_sent();

            if invoice.is_paid() {
                stats.paid_amount += due;
                stats.paid_count += 1;
                continue;
            }

            stats.outstanding_count += 1;
            if (today..=horizon).contains(&invoice.due_date()) {
                stats.expected_recovery += due;
            }
            if invoice.is_schedulable() && invoice.next_checkpoint().is_some() {
                stats.active_reminders += 1;
            }
        }

        if !stats.total_amount.is_zero() {
            stats.recovery_rate =
                (stats.paid_amount * Decimal::ONE_HUNDRED / stats.total_amount).round_dp(1);
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use dunning_core::OwnerId;
    use dunning_reminders::{
        CurrencyCode, InvoiceCommand, InvoiceDetails, MarkPaid, PauseDuration, PauseReminders,
        apply_transition, new_invoice,
    };

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 8, 0, 0).unwrap()
    }

    fn invoice(number: &str, amount: i64, due: (u32, u32)) -> Invoice {
        with_fee(number, amount, due, None)
    }

    fn with_fee(number: &str, amount: i64, due: (u32, u32), late_fee: Option<i64>) -> Invoice {
        let details = InvoiceDetails {
            invoice_number: number.to_string(),
            client_name: "Acme Ltd".to_string(),
            client_email: "ap@acme.test".to_string(),
            amount: Decimal::from(amount),
            currency: CurrencyCode::usd(),
            due_date: NaiveDate::from_ymd_opt(2025, due.0, due.1).unwrap(),
            late_fee: late_fee.map(Decimal::from),
        };
        new_invoice(details, OwnerId::new(), now()).unwrap()
    }

    fn paid(invoice: &Invoice) -> Invoice {
        apply_transition(
            invoice,
            &InvoiceCommand::MarkPaid(MarkPaid {
                paid_at: None,
                method: None,
                proof: None,
                send_thank_you: false,
                occurred_at: now(),
            }),
        )
        .unwrap()
    }

    #[test]
    fn empty_portfolio_has_zero_rate() {
        let stats = RecoveryStats::compute(&[], now().date_naive());
        assert_eq!(stats.recovery_rate, Decimal::ZERO);
        assert_eq!(stats.expected_recovery, Decimal::ZERO);
    }

    #[test]
    fn figures_cover_paid_outstanding_and_forecast() {
        let today = now().date_naive();
        let soon = invoice("INV-1", 100, (3, 20));
        let later = invoice("INV-2", 200, (4, 30));
        let settled = paid(&invoice("INV-3", 300, (3, 1)));
        let paused = apply_transition(
            &invoice("INV-4", 400, (3, 12)),
            &InvoiceCommand::Pause(PauseReminders {
                duration: PauseDuration::Indefinite,
                reason: None,
                occurred_at: now(),
            }),
        )
        .unwrap();

        let stats = RecoveryStats::compute(&[soon, later, settled, paused], today);
        assert_eq!(stats.total_amount, Decimal::from(1000));
        assert_eq!(stats.paid_amount, Decimal::from(300));
        assert_eq!(stats.recovery_rate, Decimal::from(30));
        assert_eq!(stats.expected_recovery, Decimal::from(500));
        assert_eq!(stats.paid_count, 1);
        assert_eq!(stats.outstanding_count, 3);
        assert_eq!(stats.active_reminders, 2);
    }

    #[test]
    fn late_fees_count_on_every_figure() {
        let today = now().date_naive();
        let soon = with_fee("INV-1", 100, (3, 20), Some(20));
        let settled = paid(&with_fee("INV-2", 100, (3, 1), Some(20)));

        let stats = RecoveryStats::compute(&[soon, settled], today);
        assert_eq!(stats.total_amount, Decimal::from(240));
        assert_eq!(stats.paid_amount, Decimal::from(120));
        assert_eq!(stats.expected_recovery, Decimal::from(120));
        assert_eq!(stats.recovery_rate, Decimal::from(50));
    }
}
