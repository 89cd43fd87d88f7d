//! Subscription reconciliation triggers.
//!
//! Webhook pushes, checkout-return pulls, and the lazy backfill on profile
//! reads all reduce the billing platform's view to a [`SubscriptionSnapshot`]
//! and hand it to [`echodesk_core::reconcile`]. The row is only written when
//! something changed.

use chrono::{DateTime, Utc};
use echodesk_core::{
    reconcile, PlanCatalog, PlanResolution, ReconcileOutcome, SubscriptionSnapshot,
    SubscriptionStatus, User, UserId,
};
use echodesk_store::{Store, StoreError};

use crate::error::ApiError;
use crate::platform::BillingPlatform;
use crate::stripe::{CheckoutSession, Subscription, WebhookEvent};

/// What a webhook event did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    /// The snapshot was applied to a user.
    Applied {
        /// User it was applied to.
        user_id: UserId,
        /// Whether anything changed.
        changed: bool,
    },
    /// Nothing to do.
    Ignored(&'static str),
}

/// Result of a checkout-return sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The subscription was reconciled.
    Synced {
        /// Derived billing plan, if the price resolved.
        billing_plan: Option<String>,
    },
    /// Nothing was written.
    NotSynced {
        /// Why.
        reason: &'static str,
    },
}

impl SyncOutcome {
    /// Whether the sync wrote through.
    #[must_use]
    pub const fn is_synced(&self) -> bool {
        matches!(self, Self::Synced { .. })
    }
}

/// Apply a snapshot to `user` and persist it when it changed.
pub async fn apply_snapshot(
    store: &dyn Store,
    catalog: &PlanCatalog,
    user: &mut User,
    snapshot: &SubscriptionSnapshot,
    now: DateTime<Utc>,
) -> Result<ReconcileOutcome, StoreError> {
    let outcome = reconcile(user, snapshot, catalog, now);

    if outcome.plan == PlanResolution::Unresolved {
        tracing::warn!(
            user_id = %user.id,
            price_id = ?snapshot.price.as_ref().map(|p| p.id.as_str()),
            "Subscription price did not resolve to a plan; keeping stored plan"
        );
    }

    if outcome.changed {
        store.put_user(user).await?;
        tracing::info!(
            user_id = %user.id,
            status = user.subscription_status.as_str(),
            billing_plan = ?user.billing_plan,
            "Subscription reconciled"
        );
    }

    Ok(outcome)
}

/// Snapshot of a completed checkout.
///
/// A completed checkout means the subscription is live, so the status is
/// active regardless of what the expanded subscription reports.
#[must_use]
pub fn checkout_snapshot(session: &CheckoutSession) -> SubscriptionSnapshot {
    let subscription = session.expanded_subscription();
    SubscriptionSnapshot {
        status: SubscriptionStatus::Active,
        customer_id: session
            .customer
            .clone()
            .or_else(|| subscription.and_then(|s| s.customer.clone())),
        subscription_id: session.subscription_id().map(str::to_string),
        price: subscription
            .and_then(Subscription::price)
            .map(crate::stripe::Price::price_ref),
        deleted: false,
    }
}

// ============================================================================
// Push
// ============================================================================

/// Apply a verified Stripe webhook event.
///
/// # Errors
///
/// `BadRequest` when the event object does not parse, `Internal` when the
/// user row cannot be read or written.
pub async fn handle_event(
    store: &dyn Store,
    billing: Option<&dyn BillingPlatform>,
    catalog: &PlanCatalog,
    event: &WebhookEvent,
    now: DateTime<Utc>,
) -> Result<EventOutcome, ApiError> {
    match event.event_type.as_str() {
        "checkout.session.completed" => {
            let session: CheckoutSession = parse_object(event)?;
            checkout_completed(store, billing, catalog, &session, now).await
        }
        "customer.subscription.created" | "customer.subscription.updated" => {
            let subscription: Subscription = parse_object(event)?;
            let Some(mut user) = subscription_owner(store, &subscription).await? else {
                return Ok(EventOutcome::Ignored("no user for subscription"));
            };
            let outcome =
                apply_snapshot(store, catalog, &mut user, &subscription.snapshot(), now).await?;
            Ok(EventOutcome::Applied {
                user_id: user.id,
                changed: outcome.changed,
            })
        }
        "customer.subscription.deleted" => {
            let subscription: Subscription = parse_object(event)?;
            let Some(mut user) = subscription_owner(store, &subscription).await? else {
                return Ok(EventOutcome::Ignored("no user for subscription"));
            };
            let snapshot = SubscriptionSnapshot::deleted(subscription.customer.clone());
            let outcome = apply_snapshot(store, catalog, &mut user, &snapshot, now).await?;
            Ok(EventOutcome::Applied {
                user_id: user.id,
                changed: outcome.changed,
            })
        }
        "invoice.payment_failed" => {
            let customer = event
                .data
                .object
                .get("customer")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("unknown");
            tracing::warn!(customer_id = %customer, event_id = %event.id, "Invoice payment failed");
            Ok(EventOutcome::Ignored("payment failure logged"))
        }
        other => {
            tracing::debug!(event_type = %other, "Ignoring Stripe event");
            Ok(EventOutcome::Ignored("unhandled event type"))
        }
    }
}

fn parse_object<T: serde::de::DeserializeOwned>(event: &WebhookEvent) -> Result<T, ApiError> {
    serde_json::from_value(event.data.object.clone()).map_err(|e| {
        tracing::warn!(event_id = %event.id, error = %e, "Malformed Stripe event object");
        ApiError::BadRequest("Invalid event object".into())
    })
}

async fn checkout_completed(
    store: &dyn Store,
    billing: Option<&dyn BillingPlatform>,
    catalog: &PlanCatalog,
    session: &CheckoutSession,
    now: DateTime<Utc>,
) -> Result<EventOutcome, ApiError> {
    let Some(mut user) = checkout_owner(store, session).await? else {
        tracing::warn!(session_id = %session.id, "Checkout completed for unknown user");
        return Ok(EventOutcome::Ignored("no user for checkout session"));
    };
    if session.customer.is_none() {
        tracing::warn!(session_id = %session.id, "Checkout session has no customer");
        return Ok(EventOutcome::Ignored("checkout session has no customer"));
    }

    let snapshot = match billing {
        Some(billing) => match billing.get_checkout_session(&session.id).await {
            Ok(expanded) => checkout_snapshot(&expanded),
            Err(e) => {
                tracing::warn!(session_id = %session.id, error = %e, "Checkout session fetch failed; marking active");
                checkout_snapshot(session)
            }
        },
        None => checkout_snapshot(session),
    };

    let outcome = apply_snapshot(store, catalog, &mut user, &snapshot, now).await?;
    Ok(EventOutcome::Applied {
        user_id: user.id,
        changed: outcome.changed,
    })
}

/// Owner of a checkout: `metadata.userId`, then `client_reference_id`, then email.
async fn checkout_owner(
    store: &dyn Store,
    session: &CheckoutSession,
) -> Result<Option<User>, StoreError> {
    if let Some(user_id) = session
        .user_reference()
        .and_then(|r| r.parse::<UserId>().ok())
    {
        return store.ensure_user(&user_id, session.email()).await.map(Some);
    }
    match session.email() {
        Some(email) => store.find_user_by_email(email).await,
        None => Ok(None),
    }
}

/// Owner of a subscription: by customer ID, then `metadata.userId`.
async fn subscription_owner(
    store: &dyn Store,
    subscription: &Subscription,
) -> Result<Option<User>, StoreError> {
    if let Some(customer) = &subscription.customer {
        if let Some(user) = store.find_user_by_customer(customer).await? {
            return Ok(Some(user));
        }
    }
    match subscription
        .metadata
        .get("userId")
        .and_then(|id| id.parse::<UserId>().ok())
    {
        Some(user_id) => store.get_user(&user_id).await,
        None => Ok(None),
    }
}

// ============================================================================
// Pull
// ============================================================================

/// Reconcile from a checkout session the caller returned with.
///
/// Remote failures and sessions that are unpaid or belong to someone else
/// produce `NotSynced` without writing.
///
/// # Errors
///
/// `Internal` when the user row cannot be read or written.
pub async fn sync_checkout_session(
    store: &dyn Store,
    billing: &dyn BillingPlatform,
    catalog: &PlanCatalog,
    user: &mut User,
    session_id: &str,
    now: DateTime<Utc>,
) -> Result<SyncOutcome, ApiError> {
    let session = match billing.get_checkout_session(session_id).await {
        Ok(session) => session,
        Err(e) => {
            tracing::warn!(session_id = %session_id, error = %e, "Checkout session lookup failed");
            return Ok(SyncOutcome::NotSynced {
                reason: "session lookup failed",
            });
        }
    };

    if !session.is_settled() {
        return Ok(SyncOutcome::NotSynced {
            reason: "session not paid",
        });
    }
    if session.user_reference() != Some(user.id.to_string().as_str()) {
        tracing::warn!(session_id = %session_id, user_id = %user.id, "Checkout session belongs to another user");
        return Ok(SyncOutcome::NotSynced {
            reason: "session belongs to another user",
        });
    }

    let snapshot = checkout_snapshot(&session);
    if snapshot.customer_id.is_none() {
        return Ok(SyncOutcome::NotSynced {
            reason: "session has no customer",
        });
    }

    apply_snapshot(store, catalog, user, &snapshot, now).await?;
    Ok(SyncOutcome::Synced {
        billing_plan: user.billing_plan.clone(),
    })
}

// ============================================================================
// Lazy backfill
// ============================================================================

/// Fill in the plan of an active subscriber that has none recorded.
///
/// Returns whether the user changed. Remote failures are logged and leave the
/// user as it was.
///
/// # Errors
///
/// `Internal` when the user row cannot be written.
pub async fn backfill_plan(
    store: &dyn Store,
    billing: &dyn BillingPlatform,
    catalog: &PlanCatalog,
    user: &mut User,
    now: DateTime<Utc>,
) -> Result<bool, StoreError> {
    if !user.needs_plan_backfill() {
        return Ok(false);
    }

    let subscription = if let Some(subscription_id) = user.stripe_subscription_id.clone() {
        billing.get_subscription(&subscription_id).await.map(Some)
    } else if let Some(customer_id) = user.stripe_customer_id.clone() {
        billing
            .list_active_subscriptions(&customer_id)
            .await
            .map(|subs| subs.into_iter().next())
    } else {
        return Ok(false);
    };

    let subscription = match subscription {
        Ok(Some(subscription)) => subscription,
        Ok(None) => return Ok(false),
        Err(e) => {
            tracing::warn!(user_id = %user.id, error = %e, "Plan backfill lookup failed");
            return Ok(false);
        }
    };

    let outcome = apply_snapshot(store, catalog, user, &subscription.snapshot(), now).await?;
    Ok(outcome.changed)
}
