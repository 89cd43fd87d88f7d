//! Plan catalog and plan derivation.
//!
//! Two families of plans exist:
//!
//! - **Subscription plans**: flat monthly price with an included-minutes cap.
//! - **Pay-as-you-go tiers**: small monthly fee plus a per-minute rate,
//!   invoiced after the month closes.
//!
//! Stripe price IDs are deployment configuration, so the catalog is built at
//! startup from a `PlanId -> price_id` table.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::account::PlanMetadata;
use crate::money::{format_cents, format_whole_dollars};

// ============================================================================
// Constants
// ============================================================================

/// Billing plan identifier stored for every pay-as-you-go tier.
pub const PER_MINUTE_BILLING_PLAN: &str = "per_minute";

/// Monthly fee charged when a pay-as-you-go user has no stored fee (cents).
pub const DEFAULT_MONTHLY_FEE_CENTS: i64 = 500;

/// Per-minute rate used when a pay-as-you-go user has no stored rate (cents).
pub const DEFAULT_PER_MINUTE_CENTS: i64 = 35;

/// Plans a tenant can check out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanId {
    /// Internal testing plan.
    DevTest,
    /// Starter subscription.
    Starter,
    /// Pro subscription.
    Pro,
    /// Business subscription.
    Business,
    /// Enterprise subscription.
    Enterprise,
    /// Pay-as-you-go tier 1.
    #[serde(rename = "per_minute_1")]
    PerMinute1,
    /// Pay-as-you-go tier 2.
    #[serde(rename = "per_minute_2")]
    PerMinute2,
    /// Pay-as-you-go tier 3.
    #[serde(rename = "per_minute_3")]
    PerMinute3,
}

impl PlanId {
    /// Every plan, subscription plans first.
    pub const ALL: [Self; 8] = [
        Self::DevTest,
        Self::Starter,
        Self::Pro,
        Self::Business,
        Self::Enterprise,
        Self::PerMinute1,
        Self::PerMinute2,
        Self::PerMinute3,
    ];

    /// Stable string form.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::DevTest => "dev_test",
            Self::Starter => "starter",
            Self::Pro => "pro",
            Self::Business => "business",
            Self::Enterprise => "enterprise",
            Self::PerMinute1 => "per_minute_1",
            Self::PerMinute2 => "per_minute_2",
            Self::PerMinute3 => "per_minute_3",
        }
    }

    /// Environment variable holding this plan's Stripe price ID.
    #[must_use]
    pub const fn env_key(&self) -> &'static str {
        match self {
            Self::DevTest => "STRIPE_PRICE_DEV_TEST",
            Self::Starter => "STRIPE_PRICE_STARTER",
            Self::Pro => "STRIPE_PRICE_PRO",
            Self::Business => "STRIPE_PRICE_BUSINESS",
            Self::Enterprise => "STRIPE_PRICE_ENTERPRISE",
            Self::PerMinute1 => "STRIPE_PRICE_PER_MINUTE_1",
            Self::PerMinute2 => "STRIPE_PRICE_PER_MINUTE_2",
            Self::PerMinute3 => "STRIPE_PRICE_PER_MINUTE_3",
        }
    }

    /// Definition of this plan.
    #[must_use]
    pub const fn definition(&self) -> PlanDefinition {
        match self {
            Self::DevTest => PlanDefinition::Subscription(SUBSCRIPTION_PLANS[0]),
            Self::Starter => PlanDefinition::Subscription(SUBSCRIPTION_PLANS[1]),
            Self::Pro => PlanDefinition::Subscription(SUBSCRIPTION_PLANS[2]),
            Self::Business => PlanDefinition::Subscription(SUBSCRIPTION_PLANS[3]),
            Self::Enterprise => PlanDefinition::Subscription(SUBSCRIPTION_PLANS[4]),
            Self::PerMinute1 => PlanDefinition::PerMinute(PER_MINUTE_TIERS[0]),
            Self::PerMinute2 => PlanDefinition::PerMinute(PER_MINUTE_TIERS[1]),
            Self::PerMinute3 => PlanDefinition::PerMinute(PER_MINUTE_TIERS[2]),
        }
    }
}

impl fmt::Display for PlanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlanId {
    type Err = UnknownPlan;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| UnknownPlan(s.to_string()))
    }
}

/// A plan identifier that is not in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown plan: {0}")]
pub struct UnknownPlan(pub String);

/// A flat-price subscription plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SubscriptionPlan {
    /// Plan identifier.
    pub id: PlanId,
    /// Display name.
    pub name: &'static str,
    /// Monthly price in cents.
    pub price_cents: i64,
    /// Minutes included per month.
    pub included_minutes: i64,
    /// Value stored in `User::billing_plan`.
    pub billing_plan: &'static str,
}

/// A pay-as-you-go tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PerMinuteTier {
    /// Plan identifier.
    pub id: PlanId,
    /// Display name.
    pub name: &'static str,
    /// Monthly base fee in cents.
    pub monthly_fee_cents: i64,
    /// Rate per billable minute in cents.
    pub per_minute_cents: i64,
}

/// Either kind of plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanDefinition {
    /// Flat subscription.
    Subscription(SubscriptionPlan),
    /// Pay-as-you-go.
    PerMinute(PerMinuteTier),
}

impl PlanDefinition {
    /// The plan as it is stored on a user once derived.
    #[must_use]
    pub fn resolved(&self) -> ResolvedPlan {
        match self {
            Self::Subscription(p) => ResolvedPlan {
                billing_plan: p.billing_plan.to_string(),
                metadata: PlanMetadata::capped(p.included_minutes),
            },
            Self::PerMinute(t) => ResolvedPlan {
                billing_plan: PER_MINUTE_BILLING_PLAN.to_string(),
                metadata: PlanMetadata::per_minute(t.monthly_fee_cents, t.per_minute_cents),
            },
        }
    }
}

/// Subscription plans, cheapest first.
pub const SUBSCRIPTION_PLANS: [SubscriptionPlan; 5] = [
    SubscriptionPlan {
        id: PlanId::DevTest,
        name: "DEV Test",
        price_cents: 100,
        included_minutes: 60,
        billing_plan: "subscription_dev_test",
    },
    SubscriptionPlan {
        id: PlanId::Starter,
        name: "Starter",
        price_cents: 6900,
        included_minutes: 300,
        billing_plan: "subscription_starter",
    },
    SubscriptionPlan {
        id: PlanId::Pro,
        name: "Pro",
        price_cents: 14900,
        included_minutes: 800,
        billing_plan: "subscription_pro",
    },
    SubscriptionPlan {
        id: PlanId::Business,
        name: "Business",
        price_cents: 24900,
        included_minutes: 1500,
        billing_plan: "subscription_business",
    },
    SubscriptionPlan {
        id: PlanId::Enterprise,
        name: "Enterprise",
        price_cents: 49900,
        included_minutes: 3000,
        billing_plan: "subscription_enterprise",
    },
];

/// Pay-as-you-go tiers.
pub const PER_MINUTE_TIERS: [PerMinuteTier; 3] = [
    PerMinuteTier {
        id: PlanId::PerMinute1,
        name: "Pay as you go (Tier 1)",
        monthly_fee_cents: 500,
        per_minute_cents: 35,
    },
    PerMinuteTier {
        id: PlanId::PerMinute2,
        name: "Pay as you go (Tier 2)",
        monthly_fee_cents: 700,
        per_minute_cents: 30,
    },
    PerMinuteTier {
        id: PlanId::PerMinute3,
        name: "Pay as you go (Tier 3)",
        monthly_fee_cents: 1000,
        per_minute_cents: 25,
    },
];

// ============================================================================
// Plan derivation
// ============================================================================

/// A plan derived for a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedPlan {
    /// Value for `User::billing_plan`.
    pub billing_plan: String,
    /// Value for `User::billing_plan_metadata`.
    pub metadata: PlanMetadata,
}

/// The price attached to a subscription, as reported by the billing platform.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PriceRef {
    /// Stripe price ID.
    pub id: String,
    /// Price metadata key/value pairs.
    pub metadata: HashMap<String, String>,
}

impl PriceRef {
    /// A price with no metadata.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            metadata: HashMap::new(),
        }
    }
}

/// Maps configured price IDs to plans.
#[derive(Debug, Clone, Default)]
pub struct PlanCatalog {
    price_ids: BTreeMap<PlanId, String>,
    legacy_price_id: Option<String>,
}

impl PlanCatalog {
    /// Build a catalog from configured price IDs.
    ///
    /// `legacy_price_id` is the single price used before multiple plans existed;
    /// it resolves to the starter plan unless starter has its own price.
    #[must_use]
    pub fn new(
        price_ids: impl IntoIterator<Item = (PlanId, String)>,
        legacy_price_id: Option<String>,
    ) -> Self {
        Self {
            price_ids: price_ids
                .into_iter()
                .filter(|(_, id)| !id.trim().is_empty())
                .collect(),
            legacy_price_id: legacy_price_id.filter(|id| !id.trim().is_empty()),
        }
    }

    /// Stripe price ID to use when checking out `plan`.
    #[must_use]
    pub fn price_id_for(&self, plan: PlanId) -> Option<&str> {
        self.price_ids.get(&plan).map(String::as_str).or_else(|| {
            if plan == PlanId::Starter {
                self.legacy_price_id.as_deref()
            } else {
                None
            }
        })
    }

    /// Whether `price_id` belongs to any configured plan.
    #[must_use]
    pub fn is_known_price(&self, price_id: &str) -> bool {
        self.lookup(price_id).is_some()
    }

    /// Resolve a price through the static table only.
    #[must_use]
    pub fn lookup(&self, price_id: &str) -> Option<ResolvedPlan> {
        let by_table = PER_MINUTE_TIERS
            .iter()
            .map(|t| t.id)
            .chain(SUBSCRIPTION_PLANS.iter().map(|p| p.id))
            .find(|plan| self.price_ids.get(plan).is_some_and(|id| id == price_id));

        if let Some(plan) = by_table {
            return Some(plan.definition().resolved());
        }

        if self.legacy_price_id.as_deref() == Some(price_id) {
            return Some(PlanId::Starter.definition().resolved());
        }

        None
    }

    /// Resolve a price: static table first, then price metadata.
    ///
    /// Returns `None` when neither source names a plan. Callers must treat
    /// that as "active subscription, unknown plan".
    #[must_use]
    pub fn resolve(&self, price: &PriceRef) -> Option<ResolvedPlan> {
        self.lookup(&price.id)
            .or_else(|| plan_from_price_metadata(&price.metadata))
    }

    /// Plans that have a checkout price configured.
    pub fn purchasable(&self) -> impl Iterator<Item = (PlanId, &str)> {
        PlanId::ALL
            .into_iter()
            .filter_map(|plan| self.price_id_for(plan).map(|id| (plan, id)))
    }
}

/// Read a plan from price metadata keys.
///
/// Recognised keys: `billing_plan` (or `plan`), `included_minutes`,
/// `monthly_fee_cents`, `per_minute_cents`. A plan name that matches a catalog
/// plan, by ID (`starter`, `per_minute_2`) or by stored plan name
/// (`subscription_pro`, `per_minute`), takes the catalog's values for any key
/// the metadata leaves out. Bare `per_minute` means tier 1.
#[must_use]
pub fn plan_from_price_metadata(metadata: &HashMap<String, String>) -> Option<ResolvedPlan> {
    let name = metadata
        .get("billing_plan")
        .or_else(|| metadata.get("plan"))
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())?;

    let number = |key: &str| metadata.get(key).and_then(|v| v.trim().parse::<i64>().ok());
    let explicit = PlanMetadata {
        included_minutes: number("included_minutes"),
        monthly_fee_cents: number("monthly_fee_cents"),
        per_minute_cents: number("per_minute_cents"),
    };

    let base = catalog_plan_named(name).map(|p| p.definition().resolved());

    Some(match base {
        Some(base) => ResolvedPlan {
            billing_plan: base.billing_plan,
            metadata: PlanMetadata {
                included_minutes: explicit.included_minutes.or(base.metadata.included_minutes),
                monthly_fee_cents: explicit
                    .monthly_fee_cents
                    .or(base.metadata.monthly_fee_cents),
                per_minute_cents: explicit.per_minute_cents.or(base.metadata.per_minute_cents),
            },
        },
        None => ResolvedPlan {
            billing_plan: name.to_string(),
            metadata: explicit,
        },
    })
}

fn catalog_plan_named(name: &str) -> Option<PlanId> {
    if let Ok(id) = name.parse::<PlanId>() {
        return Some(id);
    }
    if name == PER_MINUTE_BILLING_PLAN {
        return Some(PlanId::PerMinute1);
    }
    SUBSCRIPTION_PLANS
        .iter()
        .find(|p| p.billing_plan == name)
        .map(|p| p.id)
}

// ============================================================================
// Display labels
// ============================================================================

/// Human-readable plan label, e.g. `Starter (300 min)` or `Pay as you go (Tier 1)`.
#[must_use]
pub fn plan_display_label(billing_plan: Option<&str>, metadata: Option<&PlanMetadata>) -> String {
    let Some(billing_plan) = billing_plan else {
        return "Free".to_string();
    };

    if let Some(plan) = SUBSCRIPTION_PLANS
        .iter()
        .find(|p| p.billing_plan == billing_plan)
    {
        let minutes = metadata
            .and_then(|m| m.included_minutes)
            .unwrap_or(plan.included_minutes);
        return format!("{} ({minutes} min)", plan.name);
    }

    if billing_plan == PER_MINUTE_BILLING_PLAN {
        let (fee, rate) = per_minute_rates(metadata);
        if let Some(tier) = PER_MINUTE_TIERS
            .iter()
            .find(|t| t.monthly_fee_cents == fee && t.per_minute_cents == rate)
        {
            return tier.name.to_string();
        }
        return format!(
            "Pay as you go (${} + ${}/min)",
            format_whole_dollars(fee),
            format_cents(rate)
        );
    }

    billing_plan.to_string()
}

/// Short price label, e.g. `$69/mo` or `$5 + $0.35/min`. Empty when unknown.
#[must_use]
pub fn plan_price_label(billing_plan: Option<&str>, metadata: Option<&PlanMetadata>) -> String {
    let Some(billing_plan) = billing_plan else {
        return String::new();
    };

    if let Some(plan) = SUBSCRIPTION_PLANS
        .iter()
        .find(|p| p.billing_plan == billing_plan)
    {
        return format!("${}/mo", format_whole_dollars(plan.price_cents));
    }

    if billing_plan == PER_MINUTE_BILLING_PLAN {
        let (fee, rate) = per_minute_rates(metadata);
        return format!("${} + ${}/min", format_whole_dollars(fee), format_cents(rate));
    }

    String::new()
}

/// Monthly fee and per-minute rate, falling back to the defaults.
#[must_use]
pub fn per_minute_rates(metadata: Option<&PlanMetadata>) -> (i64, i64) {
    (
        metadata
            .and_then(|m| m.monthly_fee_cents)
            .unwrap_or(DEFAULT_MONTHLY_FEE_CENTS),
        metadata
            .and_then(|m| m.per_minute_cents)
            .unwrap_or(DEFAULT_PER_MINUTE_CENTS),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> PlanCatalog {
        PlanCatalog::new(
            [
                (PlanId::Starter, "price_starter".to_string()),
                (PlanId::Pro, "price_pro".to_string()),
                (PlanId::PerMinute2, "price_ppm2".to_string()),
            ],
            Some("price_legacy".to_string()),
        )
    }

    #[test]
    fn table_lookup_resolves_subscription_plan() {
        let plan = catalog().lookup("price_pro").unwrap();
        assert_eq!(plan.billing_plan, "subscription_pro");
        assert_eq!(plan.metadata, PlanMetadata::capped(800));
    }

    #[test]
    fn table_lookup_resolves_per_minute_tier() {
        let plan = catalog().lookup("price_ppm2").unwrap();
        assert_eq!(plan.billing_plan, "per_minute");
        assert_eq!(plan.metadata, PlanMetadata::per_minute(700, 30));
    }

    #[test]
    fn legacy_price_maps_to_starter() {
        let plan = catalog().lookup("price_legacy").unwrap();
        assert_eq!(plan.billing_plan, "subscription_starter");
        assert_eq!(plan.metadata.included_minutes, Some(300));
    }

    #[test]
    fn starter_checkout_falls_back_to_legacy_price() {
        let catalog = PlanCatalog::new([], Some("price_legacy".to_string()));
        assert_eq!(catalog.price_id_for(PlanId::Starter), Some("price_legacy"));
        assert_eq!(catalog.price_id_for(PlanId::Pro), None);
    }

    #[test]
    fn table_wins_over_metadata() {
        let mut price = PriceRef::new("price_pro");
        price
            .metadata
            .insert("billing_plan".into(), "subscription_enterprise".into());
        let plan = catalog().resolve(&price).unwrap();
        assert_eq!(plan.billing_plan, "subscription_pro");
    }

    #[test]
    fn metadata_fallback_reads_numbers() {
        let mut price = PriceRef::new("price_custom");
        price.metadata.insert("plan".into(), "custom_gold".into());
        price.metadata.insert("included_minutes".into(), "2000".into());
        let plan = catalog().resolve(&price).unwrap();
        assert_eq!(plan.billing_plan, "custom_gold");
        assert_eq!(plan.metadata.included_minutes, Some(2000));
        assert_eq!(plan.metadata.per_minute_cents, None);
    }

    #[test]
    fn metadata_naming_a_catalog_plan_fills_defaults() {
        let mut price = PriceRef::new("price_other");
        price.metadata.insert("billing_plan".into(), "per_minute_3".into());
        price.metadata.insert("per_minute_cents".into(), "20".into());
        let plan = catalog().resolve(&price).unwrap();
        assert_eq!(plan.billing_plan, "per_minute");
        assert_eq!(plan.metadata, PlanMetadata::per_minute(1000, 20));
    }

    #[test]
    fn metadata_with_stored_plan_name_fills_defaults() {
        let mut price = PriceRef::new("price_other");
        price.metadata.insert("billing_plan".into(), "subscription_pro".into());
        let plan = catalog().resolve(&price).unwrap();
        assert_eq!(plan.billing_plan, "subscription_pro");
        assert_eq!(plan.metadata, PlanMetadata::capped(800));

        let mut price = PriceRef::new("price_ppm");
        price.metadata.insert("plan".into(), "per_minute".into());
        price.metadata.insert("monthly_fee_cents".into(), "0".into());
        let plan = catalog().resolve(&price).unwrap();
        assert_eq!(plan.billing_plan, "per_minute");
        assert_eq!(plan.metadata, PlanMetadata::per_minute(0, 35));
    }

    #[test]
    fn unrecognised_plan_name_keeps_only_explicit_values() {
        let mut price = PriceRef::new("price_custom");
        price.metadata.insert("billing_plan".into(), "subscription_custom".into());
        let plan = catalog().resolve(&price).unwrap();
        assert_eq!(plan.billing_plan, "subscription_custom");
        assert!(plan.metadata.is_empty());
    }

    #[test]
    fn unknown_price_without_metadata_is_unresolved() {
        assert_eq!(catalog().resolve(&PriceRef::new("price_mystery")), None);
    }

    #[test]
    fn display_labels() {
        assert_eq!(plan_display_label(None, None), "Free");
        assert_eq!(
            plan_display_label(Some("subscription_starter"), None),
            "Starter (300 min)"
        );
        assert_eq!(
            plan_display_label(Some("per_minute"), Some(&PlanMetadata::per_minute(700, 30))),
            "Pay as you go (Tier 2)"
        );
        assert_eq!(
            plan_display_label(Some("per_minute"), Some(&PlanMetadata::per_minute(900, 40))),
            "Pay as you go ($9 + $0.40/min)"
        );
        assert_eq!(plan_display_label(Some("custom"), None), "custom");
    }

    #[test]
    fn price_labels() {
        assert_eq!(plan_price_label(Some("subscription_pro"), None), "$149/mo");
        assert_eq!(plan_price_label(Some("per_minute"), None), "$5 + $0.35/min");
        assert_eq!(plan_price_label(None, None), "");
    }

    #[test]
    fn plan_ids_parse_from_strings() {
        for plan in PlanId::ALL {
            assert_eq!(plan.as_str().parse::<PlanId>(), Ok(plan));
        }
        assert!("platinum".parse::<PlanId>().is_err());
    }
}
