//! Usage aggregation.
//!
//! Call events are written once per external call ID. Monthly per-receptionist
//! snapshots are derived from them and upserted by natural key, so both the
//! webhook path and the aggregation job are safe to retry.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use echodesk_core::usage::overage_minutes;
use echodesk_core::{BillingPeriod, CallUsageEvent, ReceptionistId, UsageSnapshot, UsageTotals};
use echodesk_store::{Store, StoreError};

/// Outcome of recording a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// A new row was written.
    Recorded,
    /// The call was already recorded.
    Duplicate,
}

/// Counts from a batch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchOutcome {
    /// Receptionists aggregated.
    pub updated: u64,
    /// Receptionists that failed.
    pub errors: u64,
}

/// Aggregates call events into usage snapshots.
#[derive(Clone)]
pub struct UsageAggregator {
    store: Arc<dyn Store>,
}

impl UsageAggregator {
    /// Create an aggregator over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Record a completed call. A repeat of the same external call ID is not an error.
    pub async fn record_call(&self, event: &CallUsageEvent) -> Result<RecordOutcome, StoreError> {
        match self.store.insert_call_usage(event).await {
            Ok(()) => {
                tracing::info!(
                    receptionist_id = %event.receptionist_id,
                    external_call_id = %event.external_call_id,
                    duration_seconds = event.duration_seconds,
                    "Call usage recorded"
                );
                Ok(RecordOutcome::Recorded)
            }
            Err(StoreError::DuplicateEvent { event_id }) => {
                tracing::debug!(external_call_id = %event_id, "Call already recorded");
                Ok(RecordOutcome::Duplicate)
            }
            Err(e) => Err(e),
        }
    }

    /// Recompute the snapshot of one receptionist for `period`.
    ///
    /// Returns `None` when the receptionist does not exist. The snapshot is
    /// only written when its values changed.
    pub async fn aggregate(
        &self,
        receptionist_id: &ReceptionistId,
        period: &BillingPeriod,
        now: DateTime<Utc>,
    ) -> Result<Option<UsageTotals>, StoreError> {
        let Some(receptionist) = self.store.get_receptionist(receptionist_id).await? else {
            return Ok(None);
        };

        let owner = self.store.get_user(&receptionist.user_id).await?;
        let billing_plan = owner.as_ref().and_then(|u| u.billing_plan.clone());
        let included_minutes = owner.as_ref().and_then(echodesk_core::User::included_minutes);

        let total_seconds = self.store.sum_call_seconds(receptionist_id, period).await?;

        let snapshot = UsageSnapshot {
            receptionist_id: *receptionist_id,
            user_id: receptionist.user_id,
            period_start: period.start,
            period_end: period.end,
            total_seconds,
            billing_plan,
            included_minutes,
            overage_minutes: overage_minutes(total_seconds, included_minutes),
            updated_at: now,
        };

        let existing = self
            .store
            .get_usage_snapshot(receptionist_id, period.start)
            .await?;

        if existing.is_some_and(|e| e.same_totals(&snapshot)) {
            tracing::debug!(receptionist_id = %receptionist_id, "Usage snapshot unchanged");
        } else {
            self.store.put_usage_snapshot(&snapshot).await?;
            tracing::debug!(
                receptionist_id = %receptionist_id,
                period_start = %period.start,
                total_seconds,
                overage_minutes = snapshot.overage_minutes,
                "Usage snapshot written"
            );
        }

        Ok(Some(snapshot.totals()))
    }

    /// Aggregate every receptionist for the month containing `now`.
    ///
    /// Per-receptionist failures are counted, never propagated.
    ///
    /// # Errors
    ///
    /// Returns an error only if the receptionists cannot be listed.
    pub async fn aggregate_current_month(
        &self,
        now: DateTime<Utc>,
    ) -> Result<BatchOutcome, StoreError> {
        let period = BillingPeriod::current_month(now);
        let ids = self.store.list_receptionist_ids().await?;
        let mut outcome = BatchOutcome::default();

        for id in &ids {
            match self.aggregate(id, &period, now).await {
                Ok(Some(_)) => outcome.updated += 1,
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(receptionist_id = %id, error = %e, "Usage aggregation failed");
                    outcome.errors += 1;
                }
            }
        }

        tracing::info!(
            period_start = %period.start,
            updated = outcome.updated,
            errors = outcome.errors,
            "Usage aggregation finished"
        );
        Ok(outcome)
    }
}
