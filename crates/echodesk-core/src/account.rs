//! Tenant accounts.
//!
//! One [`User`] exists per tenant. It carries the subscription state mirrored
//! from the billing platform, the derived billing plan, and the calendar
//! connection used by every receptionist the tenant owns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::UserId;

/// A tenant account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// The user ID (from the hosted auth provider).
    pub id: UserId,

    /// Email address, used as a fallback when checkout events carry no user reference.
    pub email: Option<String>,

    /// Default business phone number (E.164).
    pub phone: Option<String>,

    /// Default Google Calendar identifier.
    pub calendar_id: Option<String>,

    /// Google OAuth refresh token.
    pub calendar_refresh_token: Option<String>,

    /// Subscription status mirrored from the billing platform.
    pub subscription_status: SubscriptionStatus,

    /// Billing plan identifier, e.g. `subscription_starter` or `per_minute`.
    pub billing_plan: Option<String>,

    /// Plan parameters captured when the plan was derived.
    pub billing_plan_metadata: Option<PlanMetadata>,

    /// Stripe customer ID.
    pub stripe_customer_id: Option<String>,

    /// Stripe subscription ID.
    pub stripe_subscription_id: Option<String>,

    /// When the tenant finished onboarding. Set once, never cleared.
    pub onboarding_completed_at: Option<DateTime<Utc>>,

    /// When the account was created.
    pub created_at: DateTime<Utc>,

    /// When the account was last updated.
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a fresh account with no subscription.
    #[must_use]
    pub fn new(id: UserId, email: Option<String>, now: DateTime<Utc>) -> Self {
        Self {
            id,
            email,
            phone: None,
            calendar_id: None,
            calendar_refresh_token: None,
            subscription_status: SubscriptionStatus::None,
            billing_plan: None,
            billing_plan_metadata: None,
            stripe_customer_id: None,
            stripe_subscription_id: None,
            onboarding_completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the subscription is currently active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.subscription_status == SubscriptionStatus::Active
    }

    /// Whether a calendar has been connected through OAuth.
    #[must_use]
    pub fn has_calendar(&self) -> bool {
        self.calendar_refresh_token
            .as_deref()
            .is_some_and(|t| !t.is_empty())
    }

    /// Whether the user is on the pay-as-you-go plan.
    #[must_use]
    pub fn is_per_minute(&self) -> bool {
        self.billing_plan.as_deref() == Some(crate::plans::PER_MINUTE_BILLING_PLAN)
    }

    /// Included minutes from the stored plan, or `None` for uncapped plans.
    #[must_use]
    pub fn included_minutes(&self) -> Option<i64> {
        self.billing_plan_metadata
            .as_ref()
            .and_then(|m| m.included_minutes)
    }

    /// Active subscriber whose plan was never recorded.
    #[must_use]
    pub fn needs_plan_backfill(&self) -> bool {
        self.is_active() && self.billing_plan.is_none()
    }
}

/// Subscription status as stored for a tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// Never subscribed, or status unknown.
    #[default]
    None,
    /// Subscription is active.
    Active,
    /// Payment is past due.
    PastDue,
    /// Subscription was canceled.
    Canceled,
}

impl SubscriptionStatus {
    /// Map a Stripe subscription status string.
    #[must_use]
    pub fn from_stripe(status: &str) -> Self {
        match status {
            "active" | "trialing" => Self::Active,
            "past_due" | "unpaid" => Self::PastDue,
            "canceled" | "incomplete_expired" => Self::Canceled,
            _ => Self::None,
        }
    }

    /// Stable string form used in storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Active => "active",
            Self::PastDue => "past_due",
            Self::Canceled => "canceled",
        }
    }

    /// Parse the storage string form. Unknown values map to `None`.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "active" => Self::Active,
            "past_due" => Self::PastDue,
            "canceled" => Self::Canceled,
            _ => Self::None,
        }
    }
}

/// Parameters of a billing plan. All fields are plan-dependent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanMetadata {
    /// Minutes included per month (subscription plans).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub included_minutes: Option<i64>,

    /// Flat monthly fee in cents (pay-as-you-go).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monthly_fee_cents: Option<i64>,

    /// Per-minute rate in cents (pay-as-you-go).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub per_minute_cents: Option<i64>,
}

impl PlanMetadata {
    /// Metadata with only an included-minutes cap.
    #[must_use]
    pub const fn capped(included_minutes: i64) -> Self {
        Self {
            included_minutes: Some(included_minutes),
            monthly_fee_cents: None,
            per_minute_cents: None,
        }
    }

    /// Metadata for a pay-as-you-go tier.
    #[must_use]
    pub const fn per_minute(monthly_fee_cents: i64, per_minute_cents: i64) -> Self {
        Self {
            included_minutes: None,
            monthly_fee_cents: Some(monthly_fee_cents),
            per_minute_cents: Some(per_minute_cents),
        }
    }

    /// Whether no field is set.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.included_minutes.is_none()
            && self.monthly_fee_cents.is_none()
            && self.per_minute_cents.is_none()
    }
}
