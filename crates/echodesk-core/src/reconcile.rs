//! Subscription reconciliation.
//!
//! Webhook pushes, checkout-return pulls, and lazy backfills all describe the
//! billing platform's view of a subscription as a [`SubscriptionSnapshot`] and
//! apply it with [`reconcile`]. Applying the same snapshot twice is a no-op, so
//! the triggers can arrive in any order.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::account::{SubscriptionStatus, User};
use crate::plans::{PlanCatalog, PriceRef};

/// The billing platform's view of one subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionSnapshot {
    /// Status as reported by the platform.
    pub status: SubscriptionStatus,
    /// Billing customer ID, when known.
    pub customer_id: Option<String>,
    /// Subscription ID, when known.
    pub subscription_id: Option<String>,
    /// The subscribed price, when the platform returned it.
    pub price: Option<PriceRef>,
    /// The subscription no longer exists.
    pub deleted: bool,
}

impl SubscriptionSnapshot {
    /// A snapshot for a subscription that was deleted.
    #[must_use]
    pub fn deleted(customer_id: Option<String>) -> Self {
        Self {
            status: SubscriptionStatus::Canceled,
            customer_id,
            subscription_id: None,
            price: None,
            deleted: true,
        }
    }
}

/// What happened to the plan fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "billing_plan", rename_all = "snake_case")]
pub enum PlanResolution {
    /// A plan was derived and stored.
    Resolved(String),
    /// Plan fields were cleared because the subscription ended.
    Cleared,
    /// The price could not be mapped; stored plan fields were left untouched.
    Unresolved,
    /// The snapshot carried no price; stored plan fields were left untouched.
    NotProvided,
}

/// Result of applying a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconcileOutcome {
    /// Whether any stored field changed.
    pub changed: bool,
    /// Plan derivation result.
    pub plan: PlanResolution,
}

/// Apply `snapshot` to `user`.
///
/// Status always follows the snapshot. Customer and subscription IDs are only
/// overwritten when the snapshot carries them. Plan fields are replaced on a
/// successful derivation, cleared on deletion, and otherwise kept.
pub fn reconcile(
    user: &mut User,
    snapshot: &SubscriptionSnapshot,
    catalog: &PlanCatalog,
    now: DateTime<Utc>,
) -> ReconcileOutcome {
    let before = user.clone();

    user.subscription_status = if snapshot.deleted {
        SubscriptionStatus::Canceled
    } else {
        snapshot.status
    };

    if let Some(customer_id) = &snapshot.customer_id {
        user.stripe_customer_id = Some(customer_id.clone());
    }

    let plan = if snapshot.deleted {
        user.stripe_subscription_id = None;
        user.billing_plan = None;
        user.billing_plan_metadata = None;
        PlanResolution::Cleared
    } else {
        if let Some(subscription_id) = &snapshot.subscription_id {
            user.stripe_subscription_id = Some(subscription_id.clone());
        }
        match snapshot.price.as_ref().map(|p| catalog.resolve(p)) {
            Some(Some(resolved)) => {
                user.billing_plan = Some(resolved.billing_plan.clone());
                user.billing_plan_metadata =
                    (!resolved.metadata.is_empty()).then_some(resolved.metadata);
                PlanResolution::Resolved(resolved.billing_plan)
            }
            Some(None) => PlanResolution::Unresolved,
            None => PlanResolution::NotProvided,
        }
    };

    let changed = *user != before;
    if changed {
        user.updated_at = now;
    }

    ReconcileOutcome { changed, plan }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::PlanMetadata;
    use crate::plans::PlanId;
    use crate::UserId;

    fn catalog() -> PlanCatalog {
        PlanCatalog::new([(PlanId::Starter, "price_starter".to_string())], None)
    }

    fn active(price: Option<&str>) -> SubscriptionSnapshot {
        SubscriptionSnapshot {
            status: SubscriptionStatus::Active,
            customer_id: Some("cus_1".into()),
            subscription_id: Some("sub_1".into()),
            price: price.map(PriceRef::new),
            deleted: false,
        }
    }

    fn user() -> User {
        User::new(UserId::generate(), Some("owner@example.com".into()), Utc::now())
    }

    #[test]
    fn active_snapshot_sets_status_ids_and_plan() {
        let mut user = user();
        let outcome = reconcile(&mut user, &active(Some("price_starter")), &catalog(), Utc::now());

        assert!(outcome.changed);
        assert_eq!(
            outcome.plan,
            PlanResolution::Resolved("subscription_starter".into())
        );
        assert_eq!(user.subscription_status, SubscriptionStatus::Active);
        assert_eq!(user.stripe_customer_id.as_deref(), Some("cus_1"));
        assert_eq!(user.stripe_subscription_id.as_deref(), Some("sub_1"));
        assert_eq!(user.billing_plan_metadata, Some(PlanMetadata::capped(300)));
    }

    #[test]
    fn reapplying_the_same_snapshot_is_a_noop() {
        let mut user = user();
        let snapshot = active(Some("price_starter"));
        reconcile(&mut user, &snapshot, &catalog(), Utc::now());
        let stamped = user.updated_at;

        let outcome = reconcile(&mut user, &snapshot, &catalog(), Utc::now());
        assert!(!outcome.changed);
        assert_eq!(user.updated_at, stamped);
    }

    #[test]
    fn unknown_price_keeps_existing_plan() {
        let mut user = user();
        reconcile(&mut user, &active(Some("price_starter")), &catalog(), Utc::now());

        let outcome = reconcile(&mut user, &active(Some("price_unknown")), &catalog(), Utc::now());
        assert_eq!(outcome.plan, PlanResolution::Unresolved);
        assert_eq!(user.billing_plan.as_deref(), Some("subscription_starter"));
    }

    #[test]
    fn unknown_plan_with_active_subscription_is_representable() {
        let mut user = user();
        let outcome = reconcile(&mut user, &active(Some("price_unknown")), &catalog(), Utc::now());
        assert_eq!(outcome.plan, PlanResolution::Unresolved);
        assert!(user.is_active());
        assert!(user.billing_plan.is_none());
        assert!(user.needs_plan_backfill());
    }

    #[test]
    fn deletion_cancels_and_clears_plan() {
        let mut user = user();
        reconcile(&mut user, &active(Some("price_starter")), &catalog(), Utc::now());

        let outcome = reconcile(
            &mut user,
            &SubscriptionSnapshot::deleted(Some("cus_1".into())),
            &catalog(),
            Utc::now(),
        );
        assert_eq!(outcome.plan, PlanResolution::Cleared);
        assert_eq!(user.subscription_status, SubscriptionStatus::Canceled);
        assert!(user.billing_plan.is_none());
        assert!(user.billing_plan_metadata.is_none());
        assert!(user.stripe_subscription_id.is_none());
        assert_eq!(user.stripe_customer_id.as_deref(), Some("cus_1"));
    }

    #[test]
    fn push_then_pull_equals_pull_then_push() {
        let push = SubscriptionSnapshot {
            subscription_id: None,
            price: None,
            ..active(None)
        };
        let pull = active(Some("price_starter"));

        let mut a = user();
        let mut b = a.clone();
        reconcile(&mut a, &push, &catalog(), Utc::now());
        reconcile(&mut a, &pull, &catalog(), Utc::now());
        reconcile(&mut b, &pull, &catalog(), Utc::now());
        reconcile(&mut b, &push, &catalog(), Utc::now());

        assert_eq!(a.subscription_status, b.subscription_status);
        assert_eq!(a.billing_plan, b.billing_plan);
        assert_eq!(a.billing_plan_metadata, b.billing_plan_metadata);
        assert_eq!(a.stripe_customer_id, b.stripe_customer_id);
        assert_eq!(a.stripe_subscription_id, b.stripe_subscription_id);
    }
}
