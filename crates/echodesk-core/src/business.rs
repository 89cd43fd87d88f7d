//! Business configuration attached to a receptionist.
//!
//! Five kinds of rows feed the prompt builder: staff, services, locations,
//! promos and reminder/policy rules. Each row belongs to exactly one
//! receptionist.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DeskError, Result};
use crate::receptionist::{non_blank, required};
use crate::{EntryId, ReceptionistId};

/// The five configuration kinds, as they appear in URLs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigKind {
    /// Staff members.
    Staff,
    /// Service offerings.
    Services,
    /// Business locations.
    Locations,
    /// Promo codes.
    Promos,
    /// Reminders and policies.
    Rules,
}

impl ConfigKind {
    /// Stable string form.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Staff => "staff",
            Self::Services => "services",
            Self::Locations => "locations",
            Self::Promos => "promos",
            Self::Rules => "rules",
        }
    }
}

impl fmt::Display for ConfigKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConfigKind {
    type Err = DeskError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "staff" => Ok(Self::Staff),
            "services" => Ok(Self::Services),
            "locations" => Ok(Self::Locations),
            "promos" => Ok(Self::Promos),
            "rules" | "reminder_rules" => Ok(Self::Rules),
            other => Err(DeskError::UnknownConfigKind(other.to_string())),
        }
    }
}

// ============================================================================
// Rows
// ============================================================================

/// Specialties may be stored as one string or a list of strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Specialties {
    /// A single free-text value.
    Text(String),
    /// A list of values.
    List(Vec<String>),
}

impl Specialties {
    /// Comma-joined form, or `None` when nothing non-blank remains.
    #[must_use]
    pub fn joined(&self) -> Option<String> {
        let joined = match self {
            Self::Text(s) => s.trim().to_string(),
            Self::List(items) => items
                .iter()
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join(", "),
        };
        (!joined.is_empty()).then_some(joined)
    }
}

/// A staff member callers can book with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaffMember {
    /// Row ID.
    pub id: EntryId,
    /// Owning receptionist.
    pub receptionist_id: ReceptionistId,
    /// Name.
    pub name: String,
    /// Role, e.g. `stylist`.
    pub role: Option<String>,
    /// What the staff member specialises in.
    pub specialties: Option<Specialties>,
    /// Whether the staff member takes bookings.
    pub is_active: bool,
    /// When the row was created.
    pub created_at: DateTime<Utc>,
}

/// A bookable service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceOffering {
    /// Row ID.
    pub id: EntryId,
    /// Owning receptionist.
    pub receptionist_id: ReceptionistId,
    /// Name.
    pub name: String,
    /// Optional description.
    pub description: Option<String>,
    /// Price in cents.
    pub price_cents: i64,
    /// Duration in minutes. Zero means unspecified.
    pub duration_minutes: i64,
    /// Optional grouping.
    pub category: Option<String>,
    /// When the row was created.
    pub created_at: DateTime<Utc>,
}

/// A business location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Row ID.
    pub id: EntryId,
    /// Owning receptionist.
    pub receptionist_id: ReceptionistId,
    /// Name.
    pub name: String,
    /// Street address.
    pub address: Option<String>,
    /// Parking, access or other notes.
    pub notes: Option<String>,
    /// When the row was created.
    pub created_at: DateTime<Utc>,
}

/// A promo code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Promo {
    /// Row ID.
    pub id: EntryId,
    /// Owning receptionist.
    pub receptionist_id: ReceptionistId,
    /// Code callers quote.
    pub code: String,
    /// What the promo offers.
    pub description: String,
    /// `percent` or `fixed`.
    pub discount_type: Option<String>,
    /// Discount amount.
    pub discount_value: Option<f64>,
    /// First valid day.
    pub valid_from: Option<NaiveDate>,
    /// Last valid day.
    pub valid_until: Option<NaiveDate>,
    /// When the row was created.
    pub created_at: DateTime<Utc>,
}

/// Whether a rule is a reminder or a standing policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    /// Something to remind callers of.
    Reminder,
    /// A business policy.
    #[default]
    Rule,
}

impl RuleKind {
    /// Stable string form used in storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Reminder => "reminder",
            Self::Rule => "rule",
        }
    }

    /// Parse the storage string form. Unknown values map to `Rule`.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        if s == "reminder" {
            Self::Reminder
        } else {
            Self::Rule
        }
    }
}

/// A reminder or policy rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReminderRule {
    /// Row ID.
    pub id: EntryId,
    /// Owning receptionist.
    pub receptionist_id: ReceptionistId,
    /// Reminder or rule.
    #[serde(rename = "type")]
    pub kind: RuleKind,
    /// Rule text.
    pub content: String,
    /// When a reminder fires, e.g. `24h_before`.
    pub trigger: Option<String>,
    /// Delivery channel, e.g. `sms`.
    pub channel: Option<String>,
    /// When the row was created.
    pub created_at: DateTime<Utc>,
}

/// Any configuration row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ConfigEntry {
    /// Staff row.
    Staff(StaffMember),
    /// Service row.
    Service(ServiceOffering),
    /// Location row.
    Location(Location),
    /// Promo row.
    Promo(Promo),
    /// Rule row.
    Rule(ReminderRule),
}

impl ConfigEntry {
    /// The row's kind.
    #[must_use]
    pub const fn kind(&self) -> ConfigKind {
        match self {
            Self::Staff(_) => ConfigKind::Staff,
            Self::Service(_) => ConfigKind::Services,
            Self::Location(_) => ConfigKind::Locations,
            Self::Promo(_) => ConfigKind::Promos,
            Self::Rule(_) => ConfigKind::Rules,
        }
    }

    /// The row ID.
    #[must_use]
    pub const fn id(&self) -> EntryId {
        match self {
            Self::Staff(e) => e.id,
            Self::Service(e) => e.id,
            Self::Location(e) => e.id,
            Self::Promo(e) => e.id,
            Self::Rule(e) => e.id,
        }
    }

    /// The owning receptionist.
    #[must_use]
    pub const fn receptionist_id(&self) -> ReceptionistId {
        match self {
            Self::Staff(e) => e.receptionist_id,
            Self::Service(e) => e.receptionist_id,
            Self::Location(e) => e.receptionist_id,
            Self::Promo(e) => e.receptionist_id,
            Self::Rule(e) => e.receptionist_id,
        }
    }

    /// When the row was first created.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        match self {
            Self::Staff(e) => e.created_at,
            Self::Service(e) => e.created_at,
            Self::Location(e) => e.created_at,
            Self::Promo(e) => e.created_at,
            Self::Rule(e) => e.created_at,
        }
    }

    /// Build a row of `kind` from a JSON request body.
    ///
    /// # Errors
    ///
    /// Returns [`DeskError::InvalidPayload`] when the body does not match the
    /// kind's shape, or a field error when validation fails.
    pub fn from_input(
        kind: ConfigKind,
        id: EntryId,
        receptionist_id: ReceptionistId,
        body: serde_json::Value,
        created_at: DateTime<Utc>,
    ) -> Result<Self> {
        fn parse<T: serde::de::DeserializeOwned>(body: serde_json::Value) -> Result<T> {
            serde_json::from_value(body).map_err(|e| DeskError::InvalidPayload(e.to_string()))
        }

        Ok(match kind {
            ConfigKind::Staff => {
                let input: StaffInput = parse(body)?;
                Self::Staff(StaffMember {
                    id,
                    receptionist_id,
                    name: required("name", &input.name)?,
                    role: non_blank(input.role),
                    specialties: input.specialties,
                    is_active: input.is_active.unwrap_or(true),
                    created_at,
                })
            }
            ConfigKind::Services => {
                let input: ServiceInput = parse(body)?;
                if input.price_cents < 0 {
                    return Err(DeskError::invalid("price_cents", "must not be negative"));
                }
                if input.duration_minutes < 0 {
                    return Err(DeskError::invalid(
                        "duration_minutes",
                        "must not be negative",
                    ));
                }
                Self::Service(ServiceOffering {
                    id,
                    receptionist_id,
                    name: required("name", &input.name)?,
                    description: non_blank(input.description),
                    price_cents: input.price_cents,
                    duration_minutes: input.duration_minutes,
                    category: non_blank(input.category),
                    created_at,
                })
            }
            ConfigKind::Locations => {
                let input: LocationInput = parse(body)?;
                Self::Location(Location {
                    id,
                    receptionist_id,
                    name: required("name", &input.name)?,
                    address: non_blank(input.address),
                    notes: non_blank(input.notes),
                    created_at,
                })
            }
            ConfigKind::Promos => {
                let input: PromoInput = parse(body)?;
                if let (Some(from), Some(until)) = (input.valid_from, input.valid_until) {
                    if until < from {
                        return Err(DeskError::invalid(
                            "valid_until",
                            "must not be before valid_from",
                        ));
                    }
                }
                Self::Promo(Promo {
                    id,
                    receptionist_id,
                    code: required("code", &input.code)?,
                    description: required("description", &input.description)?,
                    discount_type: non_blank(input.discount_type),
                    discount_value: input.discount_value,
                    valid_from: input.valid_from,
                    valid_until: input.valid_until,
                    created_at,
                })
            }
            ConfigKind::Rules => {
                let input: RuleInput = parse(body)?;
                Self::Rule(ReminderRule {
                    id,
                    receptionist_id,
                    kind: input.kind,
                    content: required("content", &input.content)?,
                    trigger: non_blank(input.trigger),
                    channel: non_blank(input.channel),
                    created_at,
                })
            }
        })
    }
}

#[derive(Deserialize)]
struct StaffInput {
    #[serde(default)]
    name: String,
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    specialties: Option<Specialties>,
    #[serde(default)]
    is_active: Option<bool>,
}

#[derive(Deserialize)]
struct ServiceInput {
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    price_cents: i64,
    #[serde(default)]
    duration_minutes: i64,
    #[serde(default)]
    category: Option<String>,
}

#[derive(Deserialize)]
struct LocationInput {
    #[serde(default)]
    name: String,
    #[serde(default)]
    address: Option<String>,
    #[serde(default)]
    notes: Option<String>,
}

#[derive(Deserialize)]
struct PromoInput {
    #[serde(default)]
    code: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    discount_type: Option<String>,
    #[serde(default)]
    discount_value: Option<f64>,
    #[serde(default)]
    valid_from: Option<NaiveDate>,
    #[serde(default)]
    valid_until: Option<NaiveDate>,
}

#[derive(Deserialize)]
struct RuleInput {
    #[serde(default, rename = "type")]
    kind: RuleKind,
    #[serde(default)]
    content: String,
    #[serde(default)]
    trigger: Option<String>,
    #[serde(default)]
    channel: Option<String>,
}

/// All configuration of one receptionist, each list in display order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReceptionistConfig {
    /// Staff, by name.
    pub staff: Vec<StaffMember>,
    /// Services, by name.
    pub services: Vec<ServiceOffering>,
    /// Locations, by name.
    pub locations: Vec<Location>,
    /// Promos, latest expiry first with open-ended promos leading.
    pub promos: Vec<Promo>,
    /// Rules, reminders first then by creation time.
    pub rules: Vec<ReminderRule>,
}

impl ReceptionistConfig {
    /// Sort every list into display order.
    pub fn sort(&mut self) {
        self.staff.sort_by(|a, b| a.name.cmp(&b.name));
        self.services.sort_by(|a, b| a.name.cmp(&b.name));
        self.locations.sort_by(|a, b| a.name.cmp(&b.name));
        self.promos.sort_by(|a, b| match (a.valid_until, b.valid_until) {
            (None, None) => a.code.cmp(&b.code),
            (None, Some(_)) => std::cmp::Ordering::Less,
            (Some(_), None) => std::cmp::Ordering::Greater,
            (Some(x), Some(y)) => y.cmp(&x).then_with(|| a.code.cmp(&b.code)),
        });
        self.rules
            .sort_by(|a, b| a.kind.cmp(&b.kind).then_with(|| a.created_at.cmp(&b.created_at)));
    }

    /// Rows of one kind, in display order.
    #[must_use]
    pub fn entries(&self, kind: ConfigKind) -> Vec<ConfigEntry> {
        match kind {
            ConfigKind::Staff => self.staff.iter().cloned().map(ConfigEntry::Staff).collect(),
            ConfigKind::Services => self
                .services
                .iter()
                .cloned()
                .map(ConfigEntry::Service)
                .collect(),
            ConfigKind::Locations => self
                .locations
                .iter()
                .cloned()
                .map(ConfigEntry::Location)
                .collect(),
            ConfigKind::Promos => self.promos.iter().cloned().map(ConfigEntry::Promo).collect(),
            ConfigKind::Rules => self.rules.iter().cloned().map(ConfigEntry::Rule).collect(),
        }
    }
}
