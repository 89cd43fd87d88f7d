//! PostgreSQL storage implementation.
//!
//! This module provides the `PgStore` implementation of the `Store` trait.
//! Queries are plain `sqlx::query` calls bound at runtime; the schema is
//! applied from the embedded `migrations/` directory on connect.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::Row;
use uuid::Uuid;

use echodesk_core::{
    BillingInvoiceRecord, BillingPeriod, CallUsageEvent, ConfigEntry, ConfigKind, EntryId,
    Location, PaymentSettings, PlanMetadata, Promo, Receptionist, ReceptionistConfig,
    ReceptionistId, ReceptionistStatus, ReminderRule, RuleKind, ServiceOffering, Specialties,
    StaffMember, SubscriptionStatus, UsageSnapshot, User, UserId, PER_MINUTE_BILLING_PLAN,
};

use crate::error::{Result, StoreError};
use crate::schema::{table, UNIQUE_VIOLATION};
use crate::Store;

const USER_COLUMNS: &str = "id, email, phone, calendar_id, calendar_refresh_token, \
    subscription_status, billing_plan, billing_plan_metadata, stripe_customer_id, \
    stripe_subscription_id, onboarding_completed_at, created_at, updated_at";

const RECEPTIONIST_COLUMNS: &str = "id, user_id, name, phone_number, inbound_phone_number, \
    calendar_id, vapi_assistant_id, vapi_phone_number_id, twilio_phone_number_sid, \
    twilio_phone_number, status, extra_instructions, website_url, website_content, \
    website_content_updated_at, payment_settings, applied_prompt_sha256, created_at, updated_at";

/// PostgreSQL-backed storage implementation.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect to `database_url` and apply pending migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection or a migration fails.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Wrap an existing pool without running migrations.
    #[must_use]
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply embedded migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if a migration fails.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        tracing::info!("Database migrations applied");
        Ok(())
    }
}

// ============================================================================
// Row mapping
// ============================================================================

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.code().as_deref() == Some(UNIQUE_VIOLATION))
}

fn user_from_row(r: &PgRow) -> Result<User> {
    let status: String = r.try_get("subscription_status")?;
    let metadata: Option<Json<PlanMetadata>> = r.try_get("billing_plan_metadata")?;
    Ok(User {
        id: UserId::from_uuid(r.try_get("id")?),
        email: r.try_get("email")?,
        phone: r.try_get("phone")?,
        calendar_id: r.try_get("calendar_id")?,
        calendar_refresh_token: r.try_get("calendar_refresh_token")?,
        subscription_status: SubscriptionStatus::parse(&status),
        billing_plan: r.try_get("billing_plan")?,
        billing_plan_metadata: metadata.map(|m| m.0),
        stripe_customer_id: r.try_get("stripe_customer_id")?,
        stripe_subscription_id: r.try_get("stripe_subscription_id")?,
        onboarding_completed_at: r.try_get("onboarding_completed_at")?,
        created_at: r.try_get("created_at")?,
        updated_at: r.try_get("updated_at")?,
    })
}

fn receptionist_from_row(r: &PgRow) -> Result<Receptionist> {
    let status: String = r.try_get("status")?;
    let payment: Option<Json<PaymentSettings>> = r.try_get("payment_settings")?;
    Ok(Receptionist {
        id: ReceptionistId::from_uuid(r.try_get("id")?),
        user_id: UserId::from_uuid(r.try_get("user_id")?),
        name: r.try_get("name")?,
        phone_number: r.try_get("phone_number")?,
        inbound_phone_number: r.try_get("inbound_phone_number")?,
        calendar_id: r.try_get("calendar_id")?,
        vapi_assistant_id: r.try_get("vapi_assistant_id")?,
        vapi_phone_number_id: r.try_get("vapi_phone_number_id")?,
        twilio_phone_number_sid: r.try_get("twilio_phone_number_sid")?,
        twilio_phone_number: r.try_get("twilio_phone_number")?,
        status: ReceptionistStatus::parse(&status),
        extra_instructions: r.try_get("extra_instructions")?,
        website_url: r.try_get("website_url")?,
        website_content: r.try_get("website_content")?,
        website_content_updated_at: r.try_get("website_content_updated_at")?,
        payment_settings: payment.map(|p| p.0),
        applied_prompt_sha256: r.try_get("applied_prompt_sha256")?,
        created_at: r.try_get("created_at")?,
        updated_at: r.try_get("updated_at")?,
    })
}

fn entry_ids(r: &PgRow) -> Result<(EntryId, ReceptionistId)> {
    Ok((
        EntryId::from_uuid(r.try_get("id")?),
        ReceptionistId::from_uuid(r.try_get("receptionist_id")?),
    ))
}

fn staff_from_row(r: &PgRow) -> Result<StaffMember> {
    let (id, receptionist_id) = entry_ids(r)?;
    let specialties: Option<Json<Specialties>> = r.try_get("specialties")?;
    Ok(StaffMember {
        id,
        receptionist_id,
        name: r.try_get("name")?,
        role: r.try_get("role")?,
        specialties: specialties.map(|s| s.0),
        is_active: r.try_get("is_active")?,
        created_at: r.try_get("created_at")?,
    })
}

fn service_from_row(r: &PgRow) -> Result<ServiceOffering> {
    let (id, receptionist_id) = entry_ids(r)?;
    Ok(ServiceOffering {
        id,
        receptionist_id,
        name: r.try_get("name")?,
        description: r.try_get("description")?,
        price_cents: r.try_get("price_cents")?,
        duration_minutes: r.try_get("duration_minutes")?,
        category: r.try_get("category")?,
        created_at: r.try_get("created_at")?,
    })
}

fn location_from_row(r: &PgRow) -> Result<Location> {
    let (id, receptionist_id) = entry_ids(r)?;
    Ok(Location {
        id,
        receptionist_id,
        name: r.try_get("name")?,
        address: r.try_get("address")?,
        notes: r.try_get("notes")?,
        created_at: r.try_get("created_at")?,
    })
}

fn promo_from_row(r: &PgRow) -> Result<Promo> {
    let (id, receptionist_id) = entry_ids(r)?;
    Ok(Promo {
        id,
        receptionist_id,
        code: r.try_get("code")?,
        description: r.try_get("description")?,
        discount_type: r.try_get("discount_type")?,
        discount_value: r.try_get("discount_value")?,
        valid_from: r.try_get("valid_from")?,
        valid_until: r.try_get("valid_until")?,
        created_at: r.try_get("created_at")?,
    })
}

fn rule_from_row(r: &PgRow) -> Result<ReminderRule> {
    let (id, receptionist_id) = entry_ids(r)?;
    let kind: String = r.try_get("type")?;
    Ok(ReminderRule {
        id,
        receptionist_id,
        kind: RuleKind::parse(&kind),
        content: r.try_get("content")?,
        trigger: r.try_get("trigger")?,
        channel: r.try_get("channel")?,
        created_at: r.try_get("created_at")?,
    })
}

fn entry_from_row(kind: ConfigKind, r: &PgRow) -> Result<ConfigEntry> {
    Ok(match kind {
        ConfigKind::Staff => ConfigEntry::Staff(staff_from_row(r)?),
        ConfigKind::Services => ConfigEntry::Service(service_from_row(r)?),
        ConfigKind::Locations => ConfigEntry::Location(location_from_row(r)?),
        ConfigKind::Promos => ConfigEntry::Promo(promo_from_row(r)?),
        ConfigKind::Rules => ConfigEntry::Rule(rule_from_row(r)?),
    })
}

fn snapshot_from_row(r: &PgRow) -> Result<UsageSnapshot> {
    Ok(UsageSnapshot {
        receptionist_id: ReceptionistId::from_uuid(r.try_get("receptionist_id")?),
        user_id: UserId::from_uuid(r.try_get("user_id")?),
        period_start: r.try_get("period_start")?,
        period_end: r.try_get("period_end")?,
        total_seconds: r.try_get("total_seconds")?,
        billing_plan: r.try_get("billing_plan")?,
        included_minutes: r.try_get("included_minutes")?,
        overage_minutes: r.try_get("overage_minutes")?,
        updated_at: r.try_get("updated_at")?,
    })
}

const fn config_table(kind: ConfigKind) -> &'static str {
    match kind {
        ConfigKind::Staff => table::STAFF,
        ConfigKind::Services => table::SERVICES,
        ConfigKind::Locations => table::LOCATIONS,
        ConfigKind::Promos => table::PROMOS,
        ConfigKind::Rules => table::REMINDER_RULES,
    }
}

const fn config_order(kind: ConfigKind) -> &'static str {
    match kind {
        ConfigKind::Staff | ConfigKind::Services | ConfigKind::Locations => "name, id",
        ConfigKind::Promos => "valid_until DESC NULLS FIRST, code",
        ConfigKind::Rules => "type, created_at",
    }
}

impl PgStore {
    async fn fetch_user_where(&self, clause: &str, value: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM {} WHERE {clause} LIMIT 1", table::USERS);
        sqlx::query(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?
            .as_ref()
            .map(user_from_row)
            .transpose()
    }

    async fn fetch_receptionist_where(
        &self,
        clause: &str,
        value: &str,
    ) -> Result<Option<Receptionist>> {
        let sql = format!(
            "SELECT {RECEPTIONIST_COLUMNS} FROM {} WHERE {clause} LIMIT 1",
            table::RECEPTIONISTS
        );
        sqlx::query(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?
            .as_ref()
            .map(receptionist_from_row)
            .transpose()
    }

    async fn list_entries(
        &self,
        receptionist_id: &ReceptionistId,
        kind: ConfigKind,
    ) -> Result<Vec<ConfigEntry>> {
        let sql = format!(
            "SELECT * FROM {} WHERE receptionist_id = $1 ORDER BY {}",
            config_table(kind),
            config_order(kind)
        );
        sqlx::query(&sql)
            .bind(*receptionist_id.as_uuid())
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(|r| entry_from_row(kind, r))
            .collect()
    }
}

#[async_trait]
impl Store for PgStore {
    // =========================================================================
    // User Operations
    // =========================================================================

    async fn get_user(&self, user_id: &UserId) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM {} WHERE id = $1", table::USERS);
        sqlx::query(&sql)
            .bind(*user_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .as_ref()
            .map(user_from_row)
            .transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.fetch_user_where("lower(email) = lower($1)", email).await
    }

    async fn find_user_by_customer(&self, customer_id: &str) -> Result<Option<User>> {
        self.fetch_user_where("stripe_customer_id = $1", customer_id)
            .await
    }

    async fn put_user(&self, user: &User) -> Result<()> {
        sqlx::query(
            "INSERT INTO users (id, email, phone, calendar_id, calendar_refresh_token, \
                 subscription_status, billing_plan, billing_plan_metadata, stripe_customer_id, \
                 stripe_subscription_id, onboarding_completed_at, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
             ON CONFLICT (id) DO UPDATE SET \
                 email = EXCLUDED.email, \
                 phone = EXCLUDED.phone, \
                 calendar_id = EXCLUDED.calendar_id, \
                 calendar_refresh_token = EXCLUDED.calendar_refresh_token, \
                 subscription_status = EXCLUDED.subscription_status, \
                 billing_plan = EXCLUDED.billing_plan, \
                 billing_plan_metadata = EXCLUDED.billing_plan_metadata, \
                 stripe_customer_id = EXCLUDED.stripe_customer_id, \
                 stripe_subscription_id = EXCLUDED.stripe_subscription_id, \
                 onboarding_completed_at = COALESCE(users.onboarding_completed_at, EXCLUDED.onboarding_completed_at), \
                 updated_at = EXCLUDED.updated_at",
        )
        .bind(*user.id.as_uuid())
        .bind(&user.email)
        .bind(&user.phone)
        .bind(&user.calendar_id)
        .bind(&user.calendar_refresh_token)
        .bind(user.subscription_status.as_str())
        .bind(&user.billing_plan)
        .bind(user.billing_plan_metadata.as_ref().map(Json))
        .bind(&user.stripe_customer_id)
        .bind(&user.stripe_subscription_id)
        .bind(user.onboarding_completed_at)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn ensure_user(&self, user_id: &UserId, email: Option<&str>) -> Result<User> {
        let sql = format!(
            "INSERT INTO {0} (id, email) VALUES ($1, $2) \
             ON CONFLICT (id) DO UPDATE SET email = COALESCE({0}.email, EXCLUDED.email) \
             RETURNING {USER_COLUMNS}",
            table::USERS
        );
        let row = sqlx::query(&sql)
            .bind(*user_id.as_uuid())
            .bind(email)
            .fetch_one(&self.pool)
            .await?;
        user_from_row(&row)
    }

    async fn list_per_minute_users(&self) -> Result<Vec<User>> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM {} \
             WHERE billing_plan = $1 AND stripe_customer_id IS NOT NULL ORDER BY id",
            table::USERS
        );
        sqlx::query(&sql)
            .bind(PER_MINUTE_BILLING_PLAN)
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(user_from_row)
            .collect()
    }

    async fn mark_onboarding_complete(&self, user_id: &UserId, at: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE users SET onboarding_completed_at = $2, updated_at = $2 \
             WHERE id = $1 AND onboarding_completed_at IS NULL",
        )
        .bind(*user_id.as_uuid())
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    // =========================================================================
    // Receptionist Operations
    // =========================================================================

    async fn insert_receptionist(&self, r: &Receptionist) -> Result<()> {
        sqlx::query(
            "INSERT INTO receptionists (id, user_id, name, phone_number, inbound_phone_number, \
                 calendar_id, vapi_assistant_id, vapi_phone_number_id, twilio_phone_number_sid, \
                 twilio_phone_number, status, extra_instructions, website_url, website_content, \
                 website_content_updated_at, payment_settings, applied_prompt_sha256, created_at, \
                 updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)",
        )
        .bind(*r.id.as_uuid())
        .bind(*r.user_id.as_uuid())
        .bind(&r.name)
        .bind(&r.phone_number)
        .bind(&r.inbound_phone_number)
        .bind(&r.calendar_id)
        .bind(&r.vapi_assistant_id)
        .bind(&r.vapi_phone_number_id)
        .bind(&r.twilio_phone_number_sid)
        .bind(&r.twilio_phone_number)
        .bind(r.status.as_str())
        .bind(&r.extra_instructions)
        .bind(&r.website_url)
        .bind(&r.website_content)
        .bind(r.website_content_updated_at)
        .bind(r.payment_settings.as_ref().map(Json))
        .bind(&r.applied_prompt_sha256)
        .bind(r.created_at)
        .bind(r.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::Conflict(format!("receptionist {} already exists", r.id))
            } else {
                e.into()
            }
        })?;
        Ok(())
    }

    async fn get_receptionist(&self, id: &ReceptionistId) -> Result<Option<Receptionist>> {
        let sql = format!(
            "SELECT {RECEPTIONIST_COLUMNS} FROM {} WHERE id = $1",
            table::RECEPTIONISTS
        );
        sqlx::query(&sql)
            .bind(*id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .as_ref()
            .map(receptionist_from_row)
            .transpose()
    }

    async fn list_receptionists(&self, user_id: &UserId) -> Result<Vec<Receptionist>> {
        let sql = format!(
            "SELECT {RECEPTIONIST_COLUMNS} FROM {} WHERE user_id = $1 ORDER BY created_at, id",
            table::RECEPTIONISTS
        );
        sqlx::query(&sql)
            .bind(*user_id.as_uuid())
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(receptionist_from_row)
            .collect()
    }

    async fn list_receptionist_ids(&self) -> Result<Vec<ReceptionistId>> {
        let rows = sqlx::query("SELECT id FROM receptionists ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|r| -> Result<ReceptionistId> {
                Ok(ReceptionistId::from_uuid(r.try_get::<Uuid, _>("id")?))
            })
            .collect()
    }

    async fn update_receptionist(&self, r: &Receptionist) -> Result<()> {
        let result = sqlx::query(
            "UPDATE receptionists SET name = $2, phone_number = $3, inbound_phone_number = $4, \
                 calendar_id = $5, vapi_assistant_id = $6, vapi_phone_number_id = $7, \
                 twilio_phone_number_sid = $8, twilio_phone_number = $9, status = $10, \
                 extra_instructions = $11, website_url = $12, website_content = $13, \
                 website_content_updated_at = $14, payment_settings = $15, \
                 applied_prompt_sha256 = $16, updated_at = $17 \
             WHERE id = $1",
        )
        .bind(*r.id.as_uuid())
        .bind(&r.name)
        .bind(&r.phone_number)
        .bind(&r.inbound_phone_number)
        .bind(&r.calendar_id)
        .bind(&r.vapi_assistant_id)
        .bind(&r.vapi_phone_number_id)
        .bind(&r.twilio_phone_number_sid)
        .bind(&r.twilio_phone_number)
        .bind(r.status.as_str())
        .bind(&r.extra_instructions)
        .bind(&r.website_url)
        .bind(&r.website_content)
        .bind(r.website_content_updated_at)
        .bind(r.payment_settings.as_ref().map(Json))
        .bind(&r.applied_prompt_sha256)
        .bind(r.updated_at)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("receptionist", r.id));
        }
        Ok(())
    }

    async fn delete_receptionist(&self, id: &ReceptionistId) -> Result<()> {
        // Child rows go with the receptionist through ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM receptionists WHERE id = $1")
            .bind(*id.as_uuid())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("receptionist", id));
        }
        Ok(())
    }

    async fn find_receptionist_by_assistant(
        &self,
        assistant_id: &str,
    ) -> Result<Option<Receptionist>> {
        self.fetch_receptionist_where("vapi_assistant_id = $1", assistant_id)
            .await
    }

    async fn find_receptionist_by_vapi_phone(
        &self,
        phone_number_id: &str,
    ) -> Result<Option<Receptionist>> {
        self.fetch_receptionist_where("vapi_phone_number_id = $1", phone_number_id)
            .await
    }

    async fn find_active_receptionist_by_number(
        &self,
        number: &str,
    ) -> Result<Option<Receptionist>> {
        self.fetch_receptionist_where(
            "status = 'active' AND (twilio_phone_number = $1 OR inbound_phone_number = $1) \
             ORDER BY COALESCE(twilio_phone_number = $1, FALSE) DESC, created_at",
            number,
        )
        .await
    }

    // =========================================================================
    // Configuration Operations
    // =========================================================================

    async fn get_config(&self, receptionist_id: &ReceptionistId) -> Result<ReceptionistConfig> {
        let mut config = ReceptionistConfig::default();
        for kind in [
            ConfigKind::Staff,
            ConfigKind::Services,
            ConfigKind::Locations,
            ConfigKind::Promos,
            ConfigKind::Rules,
        ] {
            for entry in self.list_entries(receptionist_id, kind).await? {
                match entry {
                    ConfigEntry::Staff(e) => config.staff.push(e),
                    ConfigEntry::Service(e) => config.services.push(e),
                    ConfigEntry::Location(e) => config.locations.push(e),
                    ConfigEntry::Promo(e) => config.promos.push(e),
                    ConfigEntry::Rule(e) => config.rules.push(e),
                }
            }
        }
        // Collation can differ from byte order; settle on one order everywhere.
        config.sort();
        Ok(config)
    }

    async fn put_config_entry(&self, entry: &ConfigEntry) -> Result<()> {
        let query = match entry {
            ConfigEntry::Staff(e) => sqlx::query(
                "INSERT INTO staff (id, receptionist_id, name, role, specialties, is_active, created_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7) \
                 ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name, role = EXCLUDED.role, \
                     specialties = EXCLUDED.specialties, is_active = EXCLUDED.is_active \
                 WHERE staff.receptionist_id = EXCLUDED.receptionist_id",
            )
            .bind(*e.id.as_uuid())
            .bind(*e.receptionist_id.as_uuid())
            .bind(&e.name)
            .bind(&e.role)
            .bind(e.specialties.as_ref().map(Json))
            .bind(e.is_active)
            .bind(e.created_at),
            ConfigEntry::Service(e) => sqlx::query(
                "INSERT INTO services (id, receptionist_id, name, description, price_cents, \
                     duration_minutes, category, created_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
                 ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name, \
                     description = EXCLUDED.description, price_cents = EXCLUDED.price_cents, \
                     duration_minutes = EXCLUDED.duration_minutes, category = EXCLUDED.category \
                 WHERE services.receptionist_id = EXCLUDED.receptionist_id",
            )
            .bind(*e.id.as_uuid())
            .bind(*e.receptionist_id.as_uuid())
            .bind(&e.name)
            .bind(&e.description)
            .bind(e.price_cents)
            .bind(e.duration_minutes)
            .bind(&e.category)
            .bind(e.created_at),
            ConfigEntry::Location(e) => sqlx::query(
                "INSERT INTO locations (id, receptionist_id, name, address, notes, created_at) \
                 VALUES ($1, $2, $3, $4, $5, $6) \
                 ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name, \
                     address = EXCLUDED.address, notes = EXCLUDED.notes \
                 WHERE locations.receptionist_id = EXCLUDED.receptionist_id",
            )
            .bind(*e.id.as_uuid())
            .bind(*e.receptionist_id.as_uuid())
            .bind(&e.name)
            .bind(&e.address)
            .bind(&e.notes)
            .bind(e.created_at),
            ConfigEntry::Promo(e) => sqlx::query(
                "INSERT INTO promos (id, receptionist_id, code, description, discount_type, \
                     discount_value, valid_from, valid_until, created_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
                 ON CONFLICT (id) DO UPDATE SET code = EXCLUDED.code, \
                     description = EXCLUDED.description, discount_type = EXCLUDED.discount_type, \
                     discount_value = EXCLUDED.discount_value, valid_from = EXCLUDED.valid_from, \
                     valid_until = EXCLUDED.valid_until \
                 WHERE promos.receptionist_id = EXCLUDED.receptionist_id",
            )
            .bind(*e.id.as_uuid())
            .bind(*e.receptionist_id.as_uuid())
            .bind(&e.code)
            .bind(&e.description)
            .bind(&e.discount_type)
            .bind(e.discount_value)
            .bind(e.valid_from)
            .bind(e.valid_until)
            .bind(e.created_at),
            ConfigEntry::Rule(e) => sqlx::query(
                "INSERT INTO reminder_rules (id, receptionist_id, type, content, trigger, channel, created_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7) \
                 ON CONFLICT (id) DO UPDATE SET type = EXCLUDED.type, content = EXCLUDED.content, \
                     trigger = EXCLUDED.trigger, channel = EXCLUDED.channel \
                 WHERE reminder_rules.receptionist_id = EXCLUDED.receptionist_id",
            )
            .bind(*e.id.as_uuid())
            .bind(*e.receptionist_id.as_uuid())
            .bind(e.kind.as_str())
            .bind(&e.content)
            .bind(&e.trigger)
            .bind(&e.channel)
            .bind(e.created_at),
        };
        query.execute(&self.pool).await?;
        Ok(())
    }

    async fn get_config_entry(
        &self,
        receptionist_id: &ReceptionistId,
        kind: ConfigKind,
        entry_id: &EntryId,
    ) -> Result<Option<ConfigEntry>> {
        let sql = format!(
            "SELECT * FROM {} WHERE id = $1 AND receptionist_id = $2",
            config_table(kind)
        );
        sqlx::query(&sql)
            .bind(*entry_id.as_uuid())
            .bind(*receptionist_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .as_ref()
            .map(|r| entry_from_row(kind, r))
            .transpose()
    }

    async fn delete_config_entry(
        &self,
        receptionist_id: &ReceptionistId,
        kind: ConfigKind,
        entry_id: &EntryId,
    ) -> Result<()> {
        let sql = format!(
            "DELETE FROM {} WHERE id = $1 AND receptionist_id = $2",
            config_table(kind)
        );
        let result = sqlx::query(&sql)
            .bind(*entry_id.as_uuid())
            .bind(*receptionist_id.as_uuid())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(kind.as_str(), entry_id));
        }
        Ok(())
    }

    // =========================================================================
    // Usage Operations
    // =========================================================================

    async fn insert_call_usage(&self, event: &CallUsageEvent) -> Result<()> {
        sqlx::query(
            "INSERT INTO call_usage (id, receptionist_id, external_call_id, started_at, ended_at, \
                 duration_seconds, transcript) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(event.id.to_string())
        .bind(*event.receptionist_id.as_uuid())
        .bind(&event.external_call_id)
        .bind(event.started_at)
        .bind(event.ended_at)
        .bind(event.duration_seconds)
        .bind(&event.transcript)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::DuplicateEvent {
                    event_id: event.external_call_id.clone(),
                }
            } else {
                e.into()
            }
        })?;
        Ok(())
    }

    async fn count_call_usage(&self, receptionist_id: &ReceptionistId) -> Result<u64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM call_usage WHERE receptionist_id = $1")
            .bind(*receptionist_id.as_uuid())
            .fetch_one(&self.pool)
            .await?;
        let n: i64 = row.try_get("n")?;
        Ok(u64::try_from(n).unwrap_or(0))
    }

    async fn sum_call_seconds(
        &self,
        receptionist_id: &ReceptionistId,
        period: &BillingPeriod,
    ) -> Result<i64> {
        let row = sqlx::query(
            "SELECT COALESCE(SUM(duration_seconds), 0)::BIGINT AS total FROM call_usage \
             WHERE receptionist_id = $1 \
               AND (started_at AT TIME ZONE 'UTC')::date BETWEEN $2 AND $3",
        )
        .bind(*receptionist_id.as_uuid())
        .bind(period.start)
        .bind(period.end)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_get("total")?)
    }

    async fn get_usage_snapshot(
        &self,
        receptionist_id: &ReceptionistId,
        period_start: NaiveDate,
    ) -> Result<Option<UsageSnapshot>> {
        sqlx::query(
            "SELECT * FROM usage_snapshots WHERE receptionist_id = $1 AND period_start = $2",
        )
        .bind(*receptionist_id.as_uuid())
        .bind(period_start)
        .fetch_optional(&self.pool)
        .await?
        .as_ref()
        .map(snapshot_from_row)
        .transpose()
    }

    async fn put_usage_snapshot(&self, s: &UsageSnapshot) -> Result<()> {
        sqlx::query(
            "INSERT INTO usage_snapshots (receptionist_id, period_start, user_id, period_end, \
                 total_seconds, billing_plan, included_minutes, overage_minutes, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             ON CONFLICT (receptionist_id, period_start) DO UPDATE SET \
                 user_id = EXCLUDED.user_id, period_end = EXCLUDED.period_end, \
                 total_seconds = EXCLUDED.total_seconds, billing_plan = EXCLUDED.billing_plan, \
                 included_minutes = EXCLUDED.included_minutes, \
                 overage_minutes = EXCLUDED.overage_minutes, updated_at = EXCLUDED.updated_at",
        )
        .bind(*s.receptionist_id.as_uuid())
        .bind(s.period_start)
        .bind(*s.user_id.as_uuid())
        .bind(s.period_end)
        .bind(s.total_seconds)
        .bind(&s.billing_plan)
        .bind(s.included_minutes)
        .bind(s.overage_minutes)
        .bind(s.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn sum_user_snapshot_seconds(
        &self,
        user_id: &UserId,
        period_start: NaiveDate,
    ) -> Result<i64> {
        let row = sqlx::query(
            "SELECT COALESCE(SUM(total_seconds), 0)::BIGINT AS total FROM usage_snapshots \
             WHERE user_id = $1 AND period_start = $2",
        )
        .bind(*user_id.as_uuid())
        .bind(period_start)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_get("total")?)
    }

    // =========================================================================
    // Invoice Ledger
    // =========================================================================

    async fn get_invoice_record(
        &self,
        user_id: &UserId,
        period_start: NaiveDate,
    ) -> Result<Option<BillingInvoiceRecord>> {
        let row = sqlx::query(
            "SELECT user_id, period_start, stripe_invoice_id, created_at FROM billing_invoices \
             WHERE user_id = $1 AND period_start = $2",
        )
        .bind(*user_id.as_uuid())
        .bind(period_start)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| -> Result<BillingInvoiceRecord> {
            Ok(BillingInvoiceRecord {
                user_id: UserId::from_uuid(r.try_get("user_id")?),
                period_start: r.try_get("period_start")?,
                stripe_invoice_id: r.try_get("stripe_invoice_id")?,
                created_at: r.try_get("created_at")?,
            })
        })
        .transpose()
    }

    async fn reserve_invoice_record(&self, record: &BillingInvoiceRecord) -> Result<bool> {
        let result = sqlx::query(
            "INSERT INTO billing_invoices (user_id, period_start, stripe_invoice_id, created_at) \
             VALUES ($1, $2, $3, $4) ON CONFLICT (user_id, period_start) DO NOTHING",
        )
        .bind(*record.user_id.as_uuid())
        .bind(record.period_start)
        .bind(record.stripe_invoice_id.as_deref())
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn complete_invoice_record(
        &self,
        user_id: &UserId,
        period_start: NaiveDate,
        stripe_invoice_id: &str,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE billing_invoices SET stripe_invoice_id = $3 \
             WHERE user_id = $1 AND period_start = $2 AND stripe_invoice_id IS NULL",
        )
        .bind(*user_id.as_uuid())
        .bind(period_start)
        .bind(stripe_invoice_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return match self.get_invoice_record(user_id, period_start).await? {
                Some(_) => Err(StoreError::Conflict(format!(
                    "user {user_id} already invoiced for {period_start}"
                ))),
                None => Err(StoreError::not_found("invoice reservation", user_id)),
            };
        }
        Ok(())
    }

    async fn release_invoice_record(
        &self,
        user_id: &UserId,
        period_start: NaiveDate,
    ) -> Result<()> {
        sqlx::query(
            "DELETE FROM billing_invoices \
             WHERE user_id = $1 AND period_start = $2 AND stripe_invoice_id IS NULL",
        )
        .bind(*user_id.as_uuid())
        .bind(period_start)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
