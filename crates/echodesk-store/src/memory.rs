//! In-memory storage implementation.
//!
//! Backs integration tests and local runs without a database. All state sits
//! behind one `RwLock`, so each trait call is atomic.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::RwLock;

use echodesk_core::{
    BillingInvoiceRecord, BillingPeriod, CallUsageEvent, ConfigEntry, ConfigKind, EntryId,
    Receptionist, ReceptionistConfig, ReceptionistId, ReceptionistStatus, UsageSnapshot, User,
    UserId, PER_MINUTE_BILLING_PLAN,
};

use crate::error::{Result, StoreError};
use crate::Store;

#[derive(Default)]
struct Inner {
    users: HashMap<UserId, User>,
    receptionists: BTreeMap<ReceptionistId, Receptionist>,
    config: HashMap<(ConfigKind, EntryId), ConfigEntry>,
    calls: HashMap<String, CallUsageEvent>,
    snapshots: HashMap<(ReceptionistId, NaiveDate), UsageSnapshot>,
    invoices: HashMap<(UserId, NaiveDate), BillingInvoiceRecord>,
}

/// Map-backed storage implementation.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn sorted_by_created(mut list: Vec<Receptionist>) -> Vec<Receptionist> {
    list.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
    list
}

#[async_trait]
impl Store for MemoryStore {
    // =========================================================================
    // User Operations
    // =========================================================================

    async fn get_user(&self, user_id: &UserId) -> Result<Option<User>> {
        Ok(self.inner.read().await.users.get(user_id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let inner = self.inner.read().await;
        Ok(inner
            .users
            .values()
            .find(|u| {
                u.email
                    .as_deref()
                    .is_some_and(|e| e.eq_ignore_ascii_case(email))
            })
            .cloned())
    }

    async fn find_user_by_customer(&self, customer_id: &str) -> Result<Option<User>> {
        let inner = self.inner.read().await;
        Ok(inner
            .users
            .values()
            .find(|u| u.stripe_customer_id.as_deref() == Some(customer_id))
            .cloned())
    }

    async fn put_user(&self, user: &User) -> Result<()> {
        self.inner
            .write()
            .await
            .users
            .insert(user.id, user.clone());
        Ok(())
    }

    async fn ensure_user(&self, user_id: &UserId, email: Option<&str>) -> Result<User> {
        let mut inner = self.inner.write().await;
        let user = inner
            .users
            .entry(*user_id)
            .or_insert_with(|| User::new(*user_id, email.map(str::to_string), Utc::now()));
        if user.email.is_none() {
            user.email = email.map(str::to_string);
        }
        Ok(user.clone())
    }

    async fn list_per_minute_users(&self) -> Result<Vec<User>> {
        let inner = self.inner.read().await;
        let mut users: Vec<User> = inner
            .users
            .values()
            .filter(|u| {
                u.billing_plan.as_deref() == Some(PER_MINUTE_BILLING_PLAN)
                    && u.stripe_customer_id.is_some()
            })
            .cloned()
            .collect();
        users.sort_by_key(|u| u.id);
        Ok(users)
    }

    async fn mark_onboarding_complete(&self, user_id: &UserId, at: DateTime<Utc>) -> Result<bool> {
        let mut inner = self.inner.write().await;
        let user = inner
            .users
            .get_mut(user_id)
            .ok_or_else(|| StoreError::not_found("user", user_id))?;
        if user.onboarding_completed_at.is_some() {
            return Ok(false);
        }
        user.onboarding_completed_at = Some(at);
        user.updated_at = at;
        Ok(true)
    }

    // =========================================================================
    // Receptionist Operations
    // =========================================================================

    async fn insert_receptionist(&self, receptionist: &Receptionist) -> Result<()> {
        let mut inner = self.inner.write().await;
        if inner.receptionists.contains_key(&receptionist.id) {
            return Err(StoreError::Conflict(format!(
                "receptionist {} already exists",
                receptionist.id
            )));
        }
        inner
            .receptionists
            .insert(receptionist.id, receptionist.clone());
        Ok(())
    }

    async fn get_receptionist(&self, id: &ReceptionistId) -> Result<Option<Receptionist>> {
        Ok(self.inner.read().await.receptionists.get(id).cloned())
    }

    async fn list_receptionists(&self, user_id: &UserId) -> Result<Vec<Receptionist>> {
        let inner = self.inner.read().await;
        Ok(sorted_by_created(
            inner
                .receptionists
                .values()
                .filter(|r| r.is_owned_by(user_id))
                .cloned()
                .collect(),
        ))
    }

    async fn list_receptionist_ids(&self) -> Result<Vec<ReceptionistId>> {
        Ok(self.inner.read().await.receptionists.keys().copied().collect())
    }

    async fn update_receptionist(&self, receptionist: &Receptionist) -> Result<()> {
        let mut inner = self.inner.write().await;
        let slot = inner
            .receptionists
            .get_mut(&receptionist.id)
            .ok_or_else(|| StoreError::not_found("receptionist", receptionist.id))?;
        *slot = receptionist.clone();
        Ok(())
    }

    async fn delete_receptionist(&self, id: &ReceptionistId) -> Result<()> {
        let mut inner = self.inner.write().await;
        if inner.receptionists.remove(id).is_none() {
            return Err(StoreError::not_found("receptionist", id));
        }
        inner.config.retain(|_, e| e.receptionist_id() != *id);
        inner.calls.retain(|_, c| c.receptionist_id != *id);
        inner.snapshots.retain(|(r, _), _| r != id);
        Ok(())
    }

    async fn find_receptionist_by_assistant(
        &self,
        assistant_id: &str,
    ) -> Result<Option<Receptionist>> {
        let inner = self.inner.read().await;
        Ok(inner
            .receptionists
            .values()
            .find(|r| r.vapi_assistant_id.as_deref() == Some(assistant_id))
            .cloned())
    }

    async fn find_receptionist_by_vapi_phone(
        &self,
        phone_number_id: &str,
    ) -> Result<Option<Receptionist>> {
        let inner = self.inner.read().await;
        Ok(inner
            .receptionists
            .values()
            .find(|r| r.vapi_phone_number_id.as_deref() == Some(phone_number_id))
            .cloned())
    }

    async fn find_active_receptionist_by_number(
        &self,
        number: &str,
    ) -> Result<Option<Receptionist>> {
        let inner = self.inner.read().await;
        let active = || {
            inner
                .receptionists
                .values()
                .filter(|r| r.status == ReceptionistStatus::Active)
        };
        Ok(active()
            .find(|r| r.twilio_phone_number.as_deref() == Some(number))
            .or_else(|| active().find(|r| r.inbound_phone_number.as_deref() == Some(number)))
            .cloned())
    }

    // =========================================================================
    // Configuration Operations
    // =========================================================================

    async fn get_config(&self, receptionist_id: &ReceptionistId) -> Result<ReceptionistConfig> {
        let inner = self.inner.read().await;
        let mut config = ReceptionistConfig::default();
        for entry in inner
            .config
            .values()
            .filter(|e| e.receptionist_id() == *receptionist_id)
        {
            match entry.clone() {
                ConfigEntry::Staff(e) => config.staff.push(e),
                ConfigEntry::Service(e) => config.services.push(e),
                ConfigEntry::Location(e) => config.locations.push(e),
                ConfigEntry::Promo(e) => config.promos.push(e),
                ConfigEntry::Rule(e) => config.rules.push(e),
            }
        }
        config.sort();
        Ok(config)
    }

    async fn put_config_entry(&self, entry: &ConfigEntry) -> Result<()> {
        self.inner
            .write()
            .await
            .config
            .insert((entry.kind(), entry.id()), entry.clone());
        Ok(())
    }

    async fn get_config_entry(
        &self,
        receptionist_id: &ReceptionistId,
        kind: ConfigKind,
        entry_id: &EntryId,
    ) -> Result<Option<ConfigEntry>> {
        let inner = self.inner.read().await;
        Ok(inner
            .config
            .get(&(kind, *entry_id))
            .filter(|e| e.receptionist_id() == *receptionist_id)
            .cloned())
    }

    async fn delete_config_entry(
        &self,
        receptionist_id: &ReceptionistId,
        kind: ConfigKind,
        entry_id: &EntryId,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;
        let key = (kind, *entry_id);
        match inner.config.get(&key) {
            Some(e) if e.receptionist_id() == *receptionist_id => {
                inner.config.remove(&key);
                Ok(())
            }
            _ => Err(StoreError::not_found(kind.as_str(), entry_id)),
        }
    }

    // =========================================================================
    // Usage Operations
    // =========================================================================

    async fn insert_call_usage(&self, event: &CallUsageEvent) -> Result<()> {
        let mut inner = self.inner.write().await;
        if inner.calls.contains_key(&event.external_call_id) {
            return Err(StoreError::DuplicateEvent {
                event_id: event.external_call_id.clone(),
            });
        }
        if !inner.receptionists.contains_key(&event.receptionist_id) {
            return Err(StoreError::not_found("receptionist", event.receptionist_id));
        }
        inner
            .calls
            .insert(event.external_call_id.clone(), event.clone());
        Ok(())
    }

    async fn count_call_usage(&self, receptionist_id: &ReceptionistId) -> Result<u64> {
        let inner = self.inner.read().await;
        Ok(inner
            .calls
            .values()
            .filter(|c| c.receptionist_id == *receptionist_id)
            .count() as u64)
    }

    async fn sum_call_seconds(
        &self,
        receptionist_id: &ReceptionistId,
        period: &BillingPeriod,
    ) -> Result<i64> {
        let inner = self.inner.read().await;
        Ok(inner
            .calls
            .values()
            .filter(|c| c.receptionist_id == *receptionist_id && period.contains(c.started_at))
            .map(|c| c.duration_seconds)
            .sum())
    }

    async fn get_usage_snapshot(
        &self,
        receptionist_id: &ReceptionistId,
        period_start: NaiveDate,
    ) -> Result<Option<UsageSnapshot>> {
        let inner = self.inner.read().await;
        Ok(inner
            .snapshots
            .get(&(*receptionist_id, period_start))
            .cloned())
    }

    async fn put_usage_snapshot(&self, snapshot: &UsageSnapshot) -> Result<()> {
        self.inner.write().await.snapshots.insert(
            (snapshot.receptionist_id, snapshot.period_start),
            snapshot.clone(),
        );
        Ok(())
    }

    async fn sum_user_snapshot_seconds(
        &self,
        user_id: &UserId,
        period_start: NaiveDate,
    ) -> Result<i64> {
        let inner = self.inner.read().await;
        Ok(inner
            .snapshots
            .values()
            .filter(|s| s.user_id == *user_id && s.period_start == period_start)
            .map(|s| s.total_seconds)
            .sum())
    }

    // =========================================================================
    // Invoice Ledger
    // =========================================================================

    async fn get_invoice_record(
        &self,
        user_id: &UserId,
        period_start: NaiveDate,
    ) -> Result<Option<BillingInvoiceRecord>> {
        let inner = self.inner.read().await;
        Ok(inner.invoices.get(&(*user_id, period_start)).cloned())
    }

    async fn reserve_invoice_record(&self, record: &BillingInvoiceRecord) -> Result<bool> {
        let mut inner = self.inner.write().await;
        let key = (record.user_id, record.period_start);
        if inner.invoices.contains_key(&key) {
            return Ok(false);
        }
        inner.invoices.insert(key, record.clone());
        Ok(true)
    }

    async fn complete_invoice_record(
        &self,
        user_id: &UserId,
        period_start: NaiveDate,
        stripe_invoice_id: &str,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;
        let record = inner
            .invoices
            .get_mut(&(*user_id, period_start))
            .ok_or_else(|| StoreError::not_found("invoice reservation", user_id))?;
        if let Some(existing) = &record.stripe_invoice_id {
            return Err(StoreError::Conflict(format!(
                "user {user_id} already invoiced for {period_start} as {existing}"
            )));
        }
        record.stripe_invoice_id = Some(stripe_invoice_id.to_string());
        Ok(())
    }

    async fn release_invoice_record(
        &self,
        user_id: &UserId,
        period_start: NaiveDate,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;
        let key = (*user_id, period_start);
        if inner.invoices.get(&key).is_some_and(|r| !r.is_complete()) {
            inner.invoices.remove(&key);
        }
        Ok(())
    }
}
