//! Reminder timeline and send-slot computation.
//!
//! Every checkpoint is pinned to the daily send hour (09:00 by default) in the
//! owner's time zone. Nothing is sent immediately on import: the earliest slot
//! is the next occurrence of the send hour after the anchor time. A checkpoint
//! whose nominal time already passed is sent at that slot instead of being
//! skipped or backfilled.

use core::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use dunning_core::{DomainError, DomainResult};

use crate::date::normalize_date;

/// A reminder stage, defined by its offset from the due date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Checkpoint {
    Upcoming,
    Day1,
    Day7,
    Day14,
}

impl Checkpoint {
    pub const ALL: [Checkpoint; 4] = [
        Checkpoint::Upcoming,
        Checkpoint::Day1,
        Checkpoint::Day7,
        Checkpoint::Day14,
    ];

    /// Days relative to the due date.
    pub fn offset_days(self) -> i64 {
        match self {
            Checkpoint::Upcoming => -3,
            Checkpoint::Day1 => 1,
            Checkpoint::Day7 => 7,
            Checkpoint::Day14 => 14,
        }
    }

    /// `due` shifted by the offset; fails past the end of the calendar.
    pub fn nominal_date(self, due: NaiveDate) -> DomainResult<NaiveDate> {
        due.checked_add_signed(Duration::days(self.offset_days()))
            .ok_or_else(|| DomainError::invalid_date(due.to_string()))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Checkpoint::Upcoming => "upcoming",
            Checkpoint::Day1 => "day1",
            Checkpoint::Day7 => "day7",
            Checkpoint::Day14 => "day14",
        }
    }

    /// `true` for the stages that advance the invoice status and count
    /// towards `emails_sent`.
    pub fn is_overdue_stage(self) -> bool {
        self != Checkpoint::Upcoming
    }
}

impl core::fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Checkpoint {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "upcoming" => Ok(Checkpoint::Upcoming),
            "day1" => Ok(Checkpoint::Day1),
            "day7" => Ok(Checkpoint::Day7),
            "day14" => Ok(Checkpoint::Day14),
            other => Err(DomainError::validation(vec![format!(
                "Unknown checkpoint: {other}"
            )])),
        }
    }
}

/// The daily send hour and the zone it is interpreted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendWindow {
    send_hour: u32,
    timezone: Tz,
}

impl Default for SendWindow {
    fn default() -> Self {
        Self {
            send_hour: 9,
            timezone: Tz::UTC,
        }
    }
}

impl SendWindow {
    pub fn new(send_hour: u32, timezone: Tz) -> DomainResult<Self> {
        if send_hour > 23 {
            return Err(DomainError::validation(vec![format!(
                "send hour must be between 0 and 23 (got {send_hour})"
            )]));
        }
        Ok(Self {
            send_hour,
            timezone,
        })
    }

    pub fn send_hour(&self) -> u32 {
        self.send_hour
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// The send hour on `date`, local to the window's zone.
    ///
    /// A send hour swallowed by a DST gap moves one hour later.
    pub fn slot_on(&self, date: NaiveDate) -> DateTime<Utc> {
        let time = NaiveTime::from_hms_opt(self.send_hour, 0, 0).unwrap_or(NaiveTime::MIN);
        let naive = date.and_time(time);
        self.timezone
            .from_local_datetime(&naive)
            .earliest()
            .or_else(|| {
                self.timezone
                    .from_local_datetime(&(naive + Duration::hours(1)))
                    .earliest()
            })
            .map(|local| local.with_timezone(&Utc))
            .unwrap_or_else(|| Utc.from_utc_datetime(&naive))
    }

    /// Calendar date of `instant` in the window's zone.
    pub fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.timezone).date_naive()
    }

    /// Today's slot if `now` is before it, otherwise tomorrow's.
    pub fn next_business_slot(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let today = self.local_date(now);
        let slot = self.slot_on(today);
        if now < slot {
            slot
        } else {
            self.slot_on(today + Duration::days(1))
        }
    }

    /// `max(nominal, next slot after anchor)`.
    pub fn effective_send(&self, nominal: DateTime<Utc>, anchor: DateTime<Utc>) -> DateTime<Utc> {
        nominal.max(self.next_business_slot(anchor))
    }
}

/// The checkpoint that goes out next and when.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedSend {
    pub checkpoint: Checkpoint,
    pub send_at: DateTime<Utc>,
}

/// Full reminder timeline for one due date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub due_date: NaiveDate,
    pub upcoming: DateTime<Utc>,
    pub day1: DateTime<Utc>,
    pub day7: DateTime<Utc>,
    pub day14: DateTime<Utc>,
    pub first_checkpoint: Checkpoint,
    pub effective_first_send: DateTime<Utc>,
}

impl Schedule {
    pub fn nominal(&self, checkpoint: Checkpoint) -> DateTime<Utc> {
        match checkpoint {
            Checkpoint::Upcoming => self.upcoming,
            Checkpoint::Day1 => self.day1,
            Checkpoint::Day7 => self.day7,
            Checkpoint::Day14 => self.day14,
        }
    }

    pub fn checkpoints(&self) -> [(Checkpoint, DateTime<Utc>); 4] {
        Checkpoint::ALL.map(|cp| (cp, self.nominal(cp)))
    }
}

/// Compute the timeline for `due` as seen at `now` (the upload time).
pub fn compute_schedule(
    due: NaiveDate,
    now: DateTime<Utc>,
    window: &SendWindow,
) -> DomainResult<Schedule> {
    let nominal = |cp: Checkpoint| cp.nominal_date(due).map(|date| window.slot_on(date));
    let first = plan_send(due, Checkpoint::Upcoming, now, window)?;
    Ok(Schedule {
        due_date: due,
        upcoming: nominal(Checkpoint::Upcoming)?,
        day1: nominal(Checkpoint::Day1)?,
        day7: nominal(Checkpoint::Day7)?,
        day14: nominal(Checkpoint::Day14)?,
        first_checkpoint: first.checkpoint,
        effective_first_send: first.send_at,
    })
}

/// [`compute_schedule`] for a due date still in text form.
pub fn compute_schedule_from_text(
    due: &str,
    now: DateTime<Utc>,
    window: &SendWindow,
) -> DomainResult<Schedule> {
    compute_schedule(normalize_date(due)?, now, window)
}

/// When `next` should go out, given the time the invoice was last touched by
/// the scheduler (`anchor`: upload, previous send, or resume).
///
/// An `upcoming` reminder whose slot would land after the due date is dropped
/// in favour of `day1`.
pub fn plan_send(
    due: NaiveDate,
    next: Checkpoint,
    anchor: DateTime<Utc>,
    window: &SendWindow,
) -> DomainResult<PlannedSend> {
    let send_at = window.effective_send(window.slot_on(next.nominal_date(due)?), anchor);
    if next == Checkpoint::Upcoming && window.local_date(send_at) > due {
        return plan_send(due, Checkpoint::Day1, anchor, window);
    }
    Ok(PlannedSend {
        checkpoint: next,
        send_at,
    })
}

/// Earliest effective first send across a batch of due dates.
///
/// Dates that cannot be planned are left out.
pub fn batch_first_send(
    due_dates: impl IntoIterator<Item = NaiveDate>,
    now: DateTime<Utc>,
    window: &SendWindow,
) -> Option<DateTime<Utc>> {
    due_dates
        .into_iter()
        .filter_map(|due| plan_send(due, Checkpoint::Upcoming, now, window).ok())
        .map(|plan| plan.send_at)
        .min()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn checkpoints_are_pinned_to_nine() {
        let s = compute_schedule(date(2025, 3, 20), at(2025, 3, 1, 12, 0), &SendWindow::default())
            .unwrap();
        assert_eq!(s.upcoming, at(2025, 3, 17, 9, 0));
        assert_eq!(s.day1, at(2025, 3, 21, 9, 0));
        assert_eq!(s.day7, at(2025, 3, 27, 9, 0));
        assert_eq!(s.day14, at(2025, 4, 3, 9, 0));
    }

    #[test]
    fn next_slot_is_today_before_nine_and_tomorrow_after() {
        let w = SendWindow::default();
        assert_eq!(w.next_business_slot(at(2025, 3, 10, 8, 59)), at(2025, 3, 10, 9, 0));
        assert_eq!(w.next_business_slot(at(2025, 3, 10, 9, 0)), at(2025, 3, 11, 9, 0));
        assert_eq!(w.next_business_slot(at(2025, 3, 10, 17, 30)), at(2025, 3, 11, 9, 0));
    }

    #[test]
    fn overdue_upload_is_sent_at_next_slot_not_backfilled() {
        let now = at(2025, 3, 20, 8, 0);
        let s = compute_schedule(date(2025, 3, 10), now, &SendWindow::default()).unwrap();
        assert_eq!(s.effective_first_send, at(2025, 3, 20, 9, 0));
        assert_eq!(s.first_checkpoint, Checkpoint::Day1);
    }

    #[test]
    fn future_due_date_sends_upcoming_on_time() {
        let now = at(2025, 3, 10, 15, 0);
        let s = compute_schedule(date(2025, 3, 20), now, &SendWindow::default()).unwrap();
        assert_eq!(s.first_checkpoint, Checkpoint::Upcoming);
        assert_eq!(s.effective_first_send, at(2025, 3, 17, 9, 0));
    }

    #[test]
    fn late_upcoming_is_compressed_into_next_slot_while_still_before_due() {
        // Due in two days: upcoming nominal passed yesterday, tomorrow's slot is
        // still before the due date.
        let now = at(2025, 3, 18, 10, 0);
        let plan = plan_send(date(2025, 3, 20), Checkpoint::Upcoming, now, &SendWindow::default())
            .unwrap();
        assert_eq!(plan.checkpoint, Checkpoint::Upcoming);
        assert_eq!(plan.send_at, at(2025, 3, 19, 9, 0));
    }

    #[test]
    fn timezone_moves_the_slot() {
        let w = SendWindow::new(9, chrono_tz::Asia::Kolkata).unwrap();
        // 09:00 IST is 03:30 UTC.
        assert_eq!(w.slot_on(date(2025, 3, 10)), at(2025, 3, 10, 3, 30));
        assert_eq!(w.next_business_slot(at(2025, 3, 10, 4, 0)), at(2025, 3, 11, 3, 30));
    }

    #[test]
    fn invalid_send_hour_is_rejected() {
        assert!(SendWindow::new(24, Tz::UTC).is_err());
    }

    #[test]
    fn unparseable_due_text_is_invalid_date() {
        match compute_schedule_from_text("soon", at(2025, 1, 1, 0, 0), &SendWindow::default()) {
            Err(DomainError::InvalidDate(_)) => {}
            other => panic!("expected InvalidDate, got {other:?}"),
        }
    }

    #[test]
    fn batch_first_send_is_the_earliest() {
        let now = at(2025, 3, 10, 10, 0);
        let w = SendWindow::default();
        let first = batch_first_send([date(2025, 4, 30), date(2025, 3, 16), date(2025, 5, 1)], now, &w);
        assert_eq!(first, Some(at(2025, 3, 13, 9, 0)));
        assert_eq!(batch_first_send(Vec::new(), now, &w), None);
    }

    #[test]
    fn checkpoints_past_the_calendar_edge_are_invalid_dates() {
        let now = at(2025, 3, 10, 10, 0);
        let w = SendWindow::default();
        match Checkpoint::Day1.nominal_date(NaiveDate::MAX) {
            Err(DomainError::InvalidDate(_)) => {}
            other => panic!("expected InvalidDate, got {other:?}"),
        }
        match Checkpoint::Upcoming.nominal_date(NaiveDate::MIN) {
            Err(DomainError::InvalidDate(_)) => {}
            other => panic!("expected InvalidDate, got {other:?}"),
        }
        assert!(compute_schedule(NaiveDate::MAX, now, &w).is_err());
        assert!(plan_send(NaiveDate::MIN, Checkpoint::Upcoming, now, &w).is_err());
        assert_eq!(
            batch_first_send([NaiveDate::MAX, date(2025, 3, 16)], now, &w),
            Some(at(2025, 3, 13, 9, 0))
        );
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: the schedule is a pure function of (due, now).
        #[test]
        fn schedule_is_idempotent(due_offset in -60i64..60, minutes in 0i64..1440) {
            let now = at(2025, 6, 1, 0, 0) + Duration::minutes(minutes);
            let due = date(2025, 6, 1) + Duration::days(due_offset);
            let w = SendWindow::default();
            prop_assert_eq!(compute_schedule(due, now, &w), compute_schedule(due, now, &w));
            prop_assert!(compute_schedule(due, now, &w).is_ok());
        }

        /// Property: the first send is never before the next business slot and
        /// never before the nominal time of the chosen checkpoint.
        #[test]
        fn first_send_respects_review_hold(due_offset in -60i64..60, minutes in 0i64..1440) {
            let now = at(2025, 6, 1, 0, 0) + Duration::minutes(minutes);
            let due = date(2025, 6, 1) + Duration::days(due_offset);
            let w = SendWindow::default();
            let s = compute_schedule(due, now, &w).unwrap();
            prop_assert!(s.effective_first_send > now);
            prop_assert!(s.effective_first_send >= w.next_business_slot(now));
            prop_assert!(s.effective_first_send >= s.nominal(s.first_checkpoint));
        }
    }
}
