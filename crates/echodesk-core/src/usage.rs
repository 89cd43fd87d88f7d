//! Call usage, billing periods and overage math.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{CallUsageId, ReceptionistId, UserId};

// ============================================================================
// Call events
// ============================================================================

/// One completed call. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallUsageEvent {
    /// Row ID.
    pub id: CallUsageId,
    /// Receptionist that answered.
    pub receptionist_id: ReceptionistId,
    /// Call ID from the voice or telephony platform. Unique.
    pub external_call_id: String,
    /// When the call started.
    pub started_at: DateTime<Utc>,
    /// When the call ended.
    pub ended_at: DateTime<Utc>,
    /// Billable length in whole seconds.
    pub duration_seconds: i64,
    /// Call transcript, when the platform sent one.
    pub transcript: Option<String>,
}

impl CallUsageEvent {
    /// Build an event from platform timestamps.
    ///
    /// Duration is the rounded difference, floored at zero. When either
    /// timestamp is missing both collapse to `now` and the duration is zero.
    #[must_use]
    pub fn from_timestamps(
        receptionist_id: ReceptionistId,
        external_call_id: impl Into<String>,
        started_at: Option<DateTime<Utc>>,
        ended_at: Option<DateTime<Utc>>,
        transcript: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        let (started_at, ended_at) = match (started_at, ended_at) {
            (Some(start), Some(end)) => (start, end),
            _ => (now, now),
        };
        Self {
            id: CallUsageId::generate(),
            receptionist_id,
            external_call_id: external_call_id.into(),
            started_at,
            ended_at,
            duration_seconds: duration_seconds(started_at, ended_at),
            transcript,
        }
    }
}

/// Whole seconds between two instants, rounded half up and floored at zero.
#[must_use]
pub fn duration_seconds(started_at: DateTime<Utc>, ended_at: DateTime<Utc>) -> i64 {
    let millis = (ended_at - started_at).num_milliseconds();
    if millis <= 0 {
        return 0;
    }
    (millis + 500) / 1000
}

// ============================================================================
// Billing periods
// ============================================================================

/// A calendar-month billing period. Both ends are inclusive UTC dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BillingPeriod {
    /// First day of the month.
    pub start: NaiveDate,
    /// Last day of the month.
    pub end: NaiveDate,
}

impl BillingPeriod {
    /// The month containing `date`.
    #[must_use]
    pub fn month_of(date: NaiveDate) -> Self {
        let start = date.with_day(1).unwrap_or(date);
        let next = if start.month() == 12 {
            NaiveDate::from_ymd_opt(start.year() + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(start.year(), start.month() + 1, 1)
        };
        let end = next.map_or(start, |n| n - Duration::days(1));
        Self { start, end }
    }

    /// The UTC month containing `now`.
    #[must_use]
    pub fn current_month(now: DateTime<Utc>) -> Self {
        Self::month_of(now.date_naive())
    }

    /// The UTC month before the one containing `now`.
    #[must_use]
    pub fn previous_month(now: DateTime<Utc>) -> Self {
        let current = Self::current_month(now);
        Self::month_of(current.start - Duration::days(1))
    }

    /// Whether `at` falls on a day inside the period.
    #[must_use]
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        let day = at.date_naive();
        day >= self.start && day <= self.end
    }
}

// ============================================================================
// Totals
// ============================================================================

/// Minutes billed for `total_seconds`; any started minute counts.
#[must_use]
pub fn billable_minutes(total_seconds: i64) -> i64 {
    if total_seconds <= 0 {
        return 0;
    }
    (total_seconds + 59) / 60
}

/// Minutes beyond the plan allowance. Uncapped plans never overrun.
#[must_use]
pub fn overage_minutes(total_seconds: i64, included_minutes: Option<i64>) -> i64 {
    included_minutes.map_or(0, |included| {
        (billable_minutes(total_seconds) - included).max(0)
    })
}

/// Aggregated totals for one receptionist and period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageTotals {
    /// Sum of call durations.
    pub total_seconds: i64,
    /// Minutes beyond the plan allowance.
    pub overage_minutes: i64,
}

/// Stored usage for one receptionist and period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageSnapshot {
    /// Receptionist the usage belongs to.
    pub receptionist_id: ReceptionistId,
    /// Owner at aggregation time.
    pub user_id: UserId,
    /// First day of the period.
    pub period_start: NaiveDate,
    /// Last day of the period.
    pub period_end: NaiveDate,
    /// Sum of call durations.
    pub total_seconds: i64,
    /// Owner's billing plan at aggregation time.
    pub billing_plan: Option<String>,
    /// Plan allowance, `None` for uncapped plans.
    pub included_minutes: Option<i64>,
    /// Minutes beyond the allowance.
    pub overage_minutes: i64,
    /// When the snapshot was last written.
    pub updated_at: DateTime<Utc>,
}

impl UsageSnapshot {
    /// Whether `other` carries the same aggregated values, ignoring `updated_at`.
    #[must_use]
    pub fn same_totals(&self, other: &Self) -> bool {
        self.receptionist_id == other.receptionist_id
            && self.user_id == other.user_id
            && self.period_start == other.period_start
            && self.period_end == other.period_end
            && self.total_seconds == other.total_seconds
            && self.billing_plan == other.billing_plan
            && self.included_minutes == other.included_minutes
            && self.overage_minutes == other.overage_minutes
    }

    /// The totals carried by this snapshot.
    #[must_use]
    pub const fn totals(&self) -> UsageTotals {
        UsageTotals {
            total_seconds: self.total_seconds,
            overage_minutes: self.overage_minutes,
        }
    }
}
