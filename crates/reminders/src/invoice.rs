use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use core::str::FromStr;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use dunning_core::{Aggregate, AggregateRoot, DomainError, DomainResult, InvoiceId, OwnerId};
use dunning_events::Event;

use crate::email::{EmailDraft, Tone};
use crate::money::CurrencyCode;
use crate::schedule::{Checkpoint, PlannedSend, SendWindow, plan_send};

/// Invoice status lifecycle (forward-only, `Paid` is terminal).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    #[default]
    Pending,
    Day1Sent,
    Day7Sent,
    Day14Sent,
    Paid,
}

impl InvoiceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            InvoiceStatus::Pending => "pending",
            InvoiceStatus::Day1Sent => "day1_sent",
            InvoiceStatus::Day7Sent => "day7_sent",
            InvoiceStatus::Day14Sent => "day14_sent",
            InvoiceStatus::Paid => "paid",
        }
    }

    /// Status reached by firing `checkpoint`, if it advances the chain.
    fn after(checkpoint: Checkpoint) -> Option<Self> {
        match checkpoint {
            Checkpoint::Upcoming => None,
            Checkpoint::Day1 => Some(InvoiceStatus::Day1Sent),
            Checkpoint::Day7 => Some(InvoiceStatus::Day7Sent),
            Checkpoint::Day14 => Some(InvoiceStatus::Day14Sent),
        }
    }
}

impl core::fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether scheduled reminders may go out. Orthogonal to [`InvoiceStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReminderStatus {
    #[default]
    Active,
    Paused,
}

/// End of a pause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PausedUntil {
    Indefinite,
    At(DateTime<Utc>),
}

impl PausedUntil {
    pub fn has_elapsed(&self, now: DateTime<Utc>) -> bool {
        match self {
            PausedUntil::Indefinite => false,
            PausedUntil::At(until) => *until <= now,
        }
    }
}

impl TryFrom<String> for PausedUntil {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.eq_ignore_ascii_case("indefinite") {
            return Ok(PausedUntil::Indefinite);
        }
        DateTime::parse_from_rfc3339(&value)
            .map(|dt| PausedUntil::At(dt.with_timezone(&Utc)))
            .map_err(|_| DomainError::invalid_date(value))
    }
}

impl From<PausedUntil> for String {
    fn from(value: PausedUntil) -> Self {
        match value {
            PausedUntil::Indefinite => "indefinite".to_string(),
            PausedUntil::At(until) => until.to_rfc3339(),
        }
    }
}

/// Requested pause length, as supplied by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseDuration {
    Indefinite,
    Days(u32),
    Until(DateTime<Utc>),
}

impl PauseDuration {
    /// Resolve to a concrete end relative to `now`. A fixed end must be in the
    /// future.
    pub fn resolve(self, now: DateTime<Utc>) -> Result<PausedUntil, DomainError> {
        match self {
            PauseDuration::Indefinite => Ok(PausedUntil::Indefinite),
            PauseDuration::Days(0) => Err(DomainError::validation(vec![
                "pause duration must be at least one day".to_string(),
            ])),
            PauseDuration::Days(days) => Ok(PausedUntil::At(now + Duration::days(i64::from(days)))),
            PauseDuration::Until(until) if until <= now => Err(DomainError::validation(vec![
                "pause end must be in the future".to_string(),
            ])),
            PauseDuration::Until(until) => Ok(PausedUntil::At(until)),
        }
    }
}

impl FromStr for PauseDuration {
    type Err = DomainError;

    /// Accepts `indefinite`, `<n>d` or an RFC 3339 instant.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        if text.eq_ignore_ascii_case("indefinite") {
            return Ok(PauseDuration::Indefinite);
        }
        if let Some(days) = text.strip_suffix(['d', 'D']) {
            if let Ok(days) = days.trim().parse::<u32>() {
                return Ok(PauseDuration::Days(days));
            }
        }
        DateTime::parse_from_rfc3339(text)
            .map(|dt| PauseDuration::Until(dt.with_timezone(&Utc)))
            .map_err(|_| {
                DomainError::validation(vec![format!(
                    "pause duration must be 'indefinite', '<n>d' or an RFC 3339 time (got {text})"
                )])
            })
    }
}

/// The user-editable facts of an invoice.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InvoiceDetails {
    pub invoice_number: String,
    pub client_name: String,
    pub client_email: String,
    pub amount: Decimal,
    pub currency: CurrencyCode,
    pub due_date: NaiveDate,
    pub late_fee: Option<Decimal>,
}

impl InvoiceDetails {
    fn check(&self) -> Result<(), DomainError> {
        let mut errors = Vec::new();
        if self.invoice_number.trim().is_empty() {
            errors.push("invoice number must not be blank".to_string());
        }
        if self.amount <= Decimal::ZERO {
            errors.push("amount must be positive".to_string());
        }
        if self.late_fee.is_some_and(|fee| fee < Decimal::ZERO) {
            errors.push("late fee must not be negative".to_string());
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(DomainError::validation(errors))
        }
    }
}

/// Aggregate root: Invoice (one record per uploaded invoice).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    id: InvoiceId,
    owner_id: Option<OwnerId>,
    #[serde(flatten)]
    details: InvoiceDetails,
    status: InvoiceStatus,
    reminder_status: ReminderStatus,
    paused_until: Option<PausedUntil>,
    pause_reason: Option<String>,
    emails_sent: u32,
    last_email_sent_at: Option<DateTime<Utc>>,
    upcoming_sent_at: Option<DateTime<Utc>>,
    paid_at: Option<DateTime<Utc>>,
    payment_method: Option<String>,
    payment_proof: Option<String>,
    created_at: Option<DateTime<Utc>>,
    deleted_at: Option<DateTime<Utc>>,
    schedule_anchor: Option<DateTime<Utc>>,
    drafts: BTreeMap<Checkpoint, EmailDraft>,
    version: u64,
}

impl Invoice {
    /// Create an empty, not-yet-created instance (the target of `Create`).
    pub fn empty(id: InvoiceId) -> Self {
        Self {
            id,
            owner_id: None,
            details: InvoiceDetails::default(),
            status: InvoiceStatus::Pending,
            reminder_status: ReminderStatus::Active,
            paused_until: None,
            pause_reason: None,
            emails_sent: 0,
            last_email_sent_at: None,
            upcoming_sent_at: None,
            paid_at: None,
            payment_method: None,
            payment_proof: None,
            created_at: None,
            deleted_at: None,
            schedule_anchor: None,
            drafts: BTreeMap::new(),
            version: 0,
        }
    }

    pub fn id_typed(&self) -> InvoiceId {
        self.id
    }

    pub fn owner_id(&self) -> Option<OwnerId> {
        self.owner_id
    }

    pub fn details(&self) -> &InvoiceDetails {
        &self.details
    }

    pub fn invoice_number(&self) -> &str {
        &self.details.invoice_number
    }

    pub fn client_name(&self) -> &str {
        &self.details.client_name
    }

    pub fn client_email(&self) -> &str {
        &self.details.client_email
    }

    pub fn amount(&self) -> Decimal {
        self.details.amount
    }

    pub fn currency(&self) -> &CurrencyCode {
        &self.details.currency
    }

    pub fn due_date(&self) -> NaiveDate {
        self.details.due_date
    }

    pub fn late_fee(&self) -> Decimal {
        self.details.late_fee.unwrap_or(Decimal::ZERO)
    }

    /// Amount plus late fee.
    pub fn total_due(&self) -> Decimal {
        self.details.amount + self.late_fee()
    }

    pub fn status(&self) -> InvoiceStatus {
        self.status
    }

    pub fn reminder_status(&self) -> ReminderStatus {
        self.reminder_status
    }

    pub fn paused_until(&self) -> Option<PausedUntil> {
        self.paused_until
    }

    pub fn pause_reason(&self) -> Option<&str> {
        self.pause_reason.as_deref()
    }

    pub fn emails_sent(&self) -> u32 {
        self.emails_sent
    }

    pub fn last_email_sent_at(&self) -> Option<DateTime<Utc>> {
        self.last_email_sent_at
    }

    pub fn upcoming_sent_at(&self) -> Option<DateTime<Utc>> {
        self.upcoming_sent_at
    }

    pub fn paid_at(&self) -> Option<DateTime<Utc>> {
        self.paid_at
    }

    pub fn payment_method(&self) -> Option<&str> {
        self.payment_method.as_deref()
    }

    pub fn payment_proof(&self) -> Option<&str> {
        self.payment_proof.as_deref()
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }

    pub fn is_created(&self) -> bool {
        self.created_at.is_some()
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn is_paid(&self) -> bool {
        self.status == InvoiceStatus::Paid
    }

    /// Upload time, last send or last resume: what the next slot is computed from.
    pub fn schedule_anchor(&self) -> Option<DateTime<Utc>> {
        self.schedule_anchor
    }

    /// Draft for `checkpoint` (generated with the default tone if never touched).
    pub fn draft(&self, checkpoint: Checkpoint) -> EmailDraft {
        self.drafts
            .get(&checkpoint)
            .cloned()
            .unwrap_or_else(|| EmailDraft::generated_for(checkpoint))
    }

    /// `max(0, today - due)` in days.
    pub fn days_late(&self, today: NaiveDate) -> i64 {
        self.days_relative(today).max(0)
    }

    /// Signed `today - due`: negative while the invoice is not yet due.
    pub fn days_relative(&self, today: NaiveDate) -> i64 {
        (today - self.details.due_date).num_days()
    }

    /// Live, unpaid and not paused.
    pub fn is_schedulable(&self) -> bool {
        self.is_created()
            && !self.is_deleted()
            && self.status != InvoiceStatus::Paid
            && self.reminder_status == ReminderStatus::Active
    }

    /// `true` when paused with a fixed end that has passed.
    pub fn pause_expired(&self, now: DateTime<Utc>) -> bool {
        self.reminder_status == ReminderStatus::Paused
            && self.paused_until.is_some_and(|until| until.has_elapsed(now))
    }

    /// Next stage in the chain, ignoring pause state.
    pub fn next_checkpoint(&self) -> Option<Checkpoint> {
        if self.is_deleted() {
            return None;
        }
        match self.status {
            InvoiceStatus::Pending if self.upcoming_sent_at.is_none() => Some(Checkpoint::Upcoming),
            InvoiceStatus::Pending => Some(Checkpoint::Day1),
            InvoiceStatus::Day1Sent => Some(Checkpoint::Day7),
            InvoiceStatus::Day7Sent => Some(Checkpoint::Day14),
            InvoiceStatus::Day14Sent | InvoiceStatus::Paid => None,
        }
    }

    /// What goes out next and when, or `None` if nothing is scheduled.
    ///
    /// Fails with [`DomainError::InvalidDate`] when the due date sits too close
    /// to the calendar edge to place the checkpoint.
    pub fn planned_send(&self, window: &SendWindow) -> DomainResult<Option<PlannedSend>> {
        if !self.is_schedulable() {
            return Ok(None);
        }
        let (Some(next), Some(anchor)) = (self.next_checkpoint(), self.schedule_anchor) else {
            return Ok(None);
        };
        plan_send(self.details.due_date, next, anchor, window).map(Some)
    }
}

impl AggregateRoot for Invoice {
    type Id = InvoiceId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateInvoice (batch import or single creation).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateInvoice {
    pub invoice_id: InvoiceId,
    pub owner_id: OwnerId,
    pub details: InvoiceDetails,
    pub occurred_at: DateTime<Utc>,
}

/// Command: FireCheckpoint (external scheduler trigger).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FireCheckpoint {
    pub checkpoint: Checkpoint,
    pub occurred_at: DateTime<Utc>,
}

/// Command: PauseReminders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PauseReminders {
    pub duration: PauseDuration,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ResumeReminders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumeReminders {
    pub occurred_at: DateTime<Utc>,
}

/// Command: MarkPaid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkPaid {
    /// Payment date supplied by the user; defaults to `occurred_at`.
    pub paid_at: Option<DateTime<Utc>>,
    pub method: Option<String>,
    /// Key of the uploaded proof in the file-storage collaborator.
    pub proof: Option<String>,
    pub send_thank_you: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Command: EditEmail (manual override for one checkpoint).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditEmail {
    pub checkpoint: Checkpoint,
    pub subject: String,
    pub body: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RegenerateEmail (drop any override for one checkpoint).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegenerateEmail {
    pub checkpoint: Checkpoint,
    pub tone: Tone,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateDetails (manual edit of invoice fields).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateDetails {
    pub details: InvoiceDetails,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DeleteInvoice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteInvoice {
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvoiceCommand {
    Create(CreateInvoice),
    Fire(FireCheckpoint),
    Pause(PauseReminders),
    Resume(ResumeReminders),
    MarkPaid(MarkPaid),
    EditEmail(EditEmail),
    RegenerateEmail(RegenerateEmail),
    UpdateDetails(UpdateDetails),
    Delete(DeleteInvoice),
}

impl InvoiceCommand {
    pub fn name(&self) -> &'static str {
        match self {
            InvoiceCommand::Create(_) => "create",
            InvoiceCommand::Fire(_) => "fire",
            InvoiceCommand::Pause(_) => "pause",
            InvoiceCommand::Resume(_) => "resume",
            InvoiceCommand::MarkPaid(_) => "mark_paid",
            InvoiceCommand::EditEmail(_) => "edit_email",
            InvoiceCommand::RegenerateEmail(_) => "regenerate_email",
            InvoiceCommand::UpdateDetails(_) => "update_details",
            InvoiceCommand::Delete(_) => "delete",
        }
    }
}

/// Event: InvoiceCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceCreated {
    pub invoice_id: InvoiceId,
    pub owner_id: OwnerId,
    pub details: InvoiceDetails,
    pub occurred_at: DateTime<Utc>,
}

/// Event: CheckpointFired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointFired {
    pub checkpoint: Checkpoint,
    pub emails_sent: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Event: RemindersPaused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemindersPaused {
    pub paused_until: PausedUntil,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: RemindersResumed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemindersResumed {
    pub occurred_at: DateTime<Utc>,
}

/// Event: InvoicePaid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoicePaid {
    pub paid_at: DateTime<Utc>,
    pub method: Option<String>,
    pub proof: Option<String>,
    pub send_thank_you: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Event: EmailEdited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailEdited {
    pub checkpoint: Checkpoint,
    pub subject: String,
    pub body: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: EmailRegenerated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailRegenerated {
    pub checkpoint: Checkpoint,
    pub tone: Tone,
    pub occurred_at: DateTime<Utc>,
}

/// Event: DetailsUpdated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailsUpdated {
    pub details: InvoiceDetails,
    pub occurred_at: DateTime<Utc>,
}

/// Event: InvoiceDeleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceDeleted {
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceEvent {
    InvoiceCreated(InvoiceCreated),
    CheckpointFired(CheckpointFired),
    RemindersPaused(RemindersPaused),
    RemindersResumed(RemindersResumed),
    InvoicePaid(InvoicePaid),
    EmailEdited(EmailEdited),
    EmailRegenerated(EmailRegenerated),
    DetailsUpdated(DetailsUpdated),
    InvoiceDeleted(InvoiceDeleted),
}

impl Event for InvoiceEvent {
    fn event_type(&self) -> &'static str {
        match self {
            InvoiceEvent::InvoiceCreated(_) => "reminders.invoice.created",
            InvoiceEvent::CheckpointFired(_) => "reminders.invoice.checkpoint_fired",
            InvoiceEvent::RemindersPaused(_) => "reminders.invoice.paused",
            InvoiceEvent::RemindersResumed(_) => "reminders.invoice.resumed",
            InvoiceEvent::InvoicePaid(_) => "reminders.invoice.paid",
            InvoiceEvent::EmailEdited(_) => "reminders.invoice.email_edited",
            InvoiceEvent::EmailRegenerated(_) => "reminders.invoice.email_regenerated",
            InvoiceEvent::DetailsUpdated(_) => "reminders.invoice.details_updated",
            InvoiceEvent::InvoiceDeleted(_) => "reminders.invoice.deleted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            InvoiceEvent::InvoiceCreated(e) => e.occurred_at,
            InvoiceEvent::CheckpointFired(e) => e.occurred_at,
            InvoiceEvent::RemindersPaused(e) => e.occurred_at,
            InvoiceEvent::RemindersResumed(e) => e.occurred_at,
            InvoiceEvent::InvoicePaid(e) => e.occurred_at,
            InvoiceEvent::EmailEdited(e) => e.occurred_at,
            InvoiceEvent::EmailRegenerated(e) => e.occurred_at,
            InvoiceEvent::DetailsUpdated(e) => e.occurred_at,
            InvoiceEvent::InvoiceDeleted(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Invoice {
    type Command = InvoiceCommand;
    type Event = InvoiceEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            InvoiceEvent::InvoiceCreated(e) => {
                self.id = e.invoice_id;
                self.owner_id = Some(e.owner_id);
                self.details = e.details.clone();
                self.status = InvoiceStatus::Pending;
                self.reminder_status = ReminderStatus::Active;
                self.created_at = Some(e.occurred_at);
                self.schedule_anchor = Some(e.occurred_at);
            }
            InvoiceEvent::CheckpointFired(e) => {
                match InvoiceStatus::after(e.checkpoint) {
                    Some(status) => self.status = status,
                    None => self.upcoming_sent_at = Some(e.occurred_at),
                }
                self.emails_sent = e.emails_sent;
                self.last_email_sent_at = Some(e.occurred_at);
                self.schedule_anchor = Some(e.occurred_at);
            }
            InvoiceEvent::RemindersPaused(e) => {
                self.reminder_status = ReminderStatus::Paused;
                self.paused_until = Some(e.paused_until);
                self.pause_reason = e.reason.clone();
            }
            InvoiceEvent::RemindersResumed(e) => {
                self.reminder_status = ReminderStatus::Active;
                self.paused_until = None;
                self.pause_reason = None;
                self.schedule_anchor = Some(e.occurred_at);
            }
            InvoiceEvent::InvoicePaid(e) => {
                self.status = InvoiceStatus::Paid;
                self.paid_at = Some(e.paid_at);
                self.payment_method = e.method.clone();
                self.payment_proof = e.proof.clone();
            }
            InvoiceEvent::EmailEdited(e) => {
                self.drafts.insert(
                    e.checkpoint,
                    EmailDraft::UserEdited {
                        subject: e.subject.clone(),
                        body: e.body.clone(),
                        edited_at: e.occurred_at,
                    },
                );
            }
            InvoiceEvent::EmailRegenerated(e) => {
                self.drafts
                    .insert(e.checkpoint, EmailDraft::Generated { tone: e.tone });
            }
            InvoiceEvent::DetailsUpdated(e) => {
                self.details = e.details.clone();
            }
            InvoiceEvent::InvoiceDeleted(e) => {
                self.deleted_at = Some(e.occurred_at);
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            InvoiceCommand::Create(cmd) => self.handle_create(cmd),
            InvoiceCommand::Fire(cmd) => self.handle_fire(cmd),
            InvoiceCommand::Pause(cmd) => self.handle_pause(cmd),
            InvoiceCommand::Resume(cmd) => self.handle_resume(cmd),
            InvoiceCommand::MarkPaid(cmd) => self.handle_mark_paid(cmd),
            InvoiceCommand::EditEmail(cmd) => self.handle_edit_email(cmd),
            InvoiceCommand::RegenerateEmail(cmd) => self.handle_regenerate_email(cmd),
            InvoiceCommand::UpdateDetails(cmd) => self.handle_update_details(cmd),
            InvoiceCommand::Delete(cmd) => self.handle_delete(cmd),
        }
    }
}

impl Invoice {
    /// Every command except `Create` targets an existing, undeleted invoice.
    fn ensure_live(&self) -> Result<(), DomainError> {
        if !self.is_created() {
            return Err(DomainError::not_found());
        }
        if self.is_deleted() {
            return Err(DomainError::guard("invoice has been deleted"));
        }
        Ok(())
    }

    fn ensure_not_paid(&self, action: &str) -> Result<(), DomainError> {
        if self.is_paid() {
            return Err(DomainError::guard(format!(
                "cannot {action}: invoice is already paid"
            )));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateInvoice) -> Result<Vec<InvoiceEvent>, DomainError> {
        if self.is_created() {
            return Err(DomainError::conflict("invoice already exists"));
        }
        cmd.details.check()?;

        Ok(vec![InvoiceEvent::InvoiceCreated(InvoiceCreated {
            invoice_id: cmd.invoice_id,
            owner_id: cmd.owner_id,
            details: cmd.details.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_fire(&self, cmd: &FireCheckpoint) -> Result<Vec<InvoiceEvent>, DomainError> {
        self.ensure_live()?;
        self.ensure_not_paid("send reminder")?;
        if self.reminder_status == ReminderStatus::Paused {
            return Err(DomainError::guard("cannot send reminder: reminders are paused"));
        }

        let allowed = match cmd.checkpoint {
            Checkpoint::Upcoming => {
                self.status == InvoiceStatus::Pending && self.upcoming_sent_at.is_none()
            }
            Checkpoint::Day1 => self.status == InvoiceStatus::Pending,
            Checkpoint::Day7 => self.status == InvoiceStatus::Day1Sent,
            Checkpoint::Day14 => self.status == InvoiceStatus::Day7Sent,
        };
        if !allowed {
            return Err(DomainError::guard(format!(
                "cannot send {} reminder from status {}",
                cmd.checkpoint, self.status
            )));
        }

        let emails_sent = if cmd.checkpoint.is_overdue_stage() {
            self.emails_sent + 1
        } else {
            self.emails_sent
        };

        Ok(vec![InvoiceEvent::CheckpointFired(CheckpointFired {
            checkpoint: cmd.checkpoint,
            emails_sent,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_pause(&self, cmd: &PauseReminders) -> Result<Vec<InvoiceEvent>, DomainError> {
        self.ensure_live()?;
        self.ensure_not_paid("pause reminders")?;
        let paused_until = cmd.duration.resolve(cmd.occurred_at)?;
        let reason = cmd
            .reason
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string);

        Ok(vec![InvoiceEvent::RemindersPaused(RemindersPaused {
            paused_until,
            reason,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_resume(&self, cmd: &ResumeReminders) -> Result<Vec<InvoiceEvent>, DomainError> {
        self.ensure_live()?;
        self.ensure_not_paid("resume reminders")?;
        if self.reminder_status != ReminderStatus::Paused {
            return Err(DomainError::guard("cannot resume: reminders are not paused"));
        }

        Ok(vec![InvoiceEvent::RemindersResumed(RemindersResumed {
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_mark_paid(&self, cmd: &MarkPaid) -> Result<Vec<InvoiceEvent>, DomainError> {
        self.ensure_live()?;
        self.ensure_not_paid("mark as paid")?;

        Ok(vec![InvoiceEvent::InvoicePaid(InvoicePaid {
            paid_at: cmd.paid_at.unwrap_or(cmd.occurred_at),
            method: cmd.method.clone(),
            proof: cmd.proof.clone(),
            send_thank_you: cmd.send_thank_you,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_edit_email(&self, cmd: &EditEmail) -> Result<Vec<InvoiceEvent>, DomainError> {
        self.ensure_live()?;
        let mut errors = Vec::new();
        if cmd.subject.trim().is_empty() {
            errors.push("email subject must not be blank".to_string());
        }
        if cmd.body.trim().is_empty() {
            errors.push("email body must not be blank".to_string());
        }
        if !errors.is_empty() {
            return Err(DomainError::validation(errors));
        }

        Ok(vec![InvoiceEvent::EmailEdited(EmailEdited {
            checkpoint: cmd.checkpoint,
            subject: cmd.subject.clone(),
            body: cmd.body.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_regenerate_email(
        &self,
        cmd: &RegenerateEmail,
    ) -> Result<Vec<InvoiceEvent>, DomainError> {
        self.ensure_live()?;

        Ok(vec![InvoiceEvent::EmailRegenerated(EmailRegenerated {
            checkpoint: cmd.checkpoint,
            tone: cmd.tone,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_delete(&self, cmd: &DeleteInvoice) -> Result<Vec<InvoiceEvent>, DomainError> {
        self.ensure_live()?;

        Ok(vec![InvoiceEvent::InvoiceDeleted(InvoiceDeleted {
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update_details(&self, cmd: &UpdateDetails) -> Result<Vec<InvoiceEvent>, DomainError> {
        self.ensure_live()?;
        self.ensure_not_paid("edit invoice")?;
        cmd.details.check()?;

        Ok(vec![InvoiceEvent::DetailsUpdated(DetailsUpdated {
            details: cmd.details.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}

/// Apply one lifecycle command to a snapshot, returning the successor.
///
/// On error the caller's invoice is untouched.
pub fn apply_transition(invoice: &Invoice, command: &InvoiceCommand) -> Result<Invoice, DomainError> {
    invoice.execute(command).map(|(next, _events)| next)
}
