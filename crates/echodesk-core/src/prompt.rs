//! System prompt rendering for the voice assistant.
//!
//! [`build_prompt`] is a pure function of its input: the same receptionist and
//! configuration always render the same text, and the result never exceeds
//! [`MAX_PROMPT_CHARS`] characters.

use crate::business::{Location, Promo, ReceptionistConfig, ReminderRule, ServiceOffering, StaffMember};
use crate::money::format_cents;
use crate::receptionist::{PaymentSettings, Receptionist};

/// Upper bound on the rendered prompt, in characters.
pub const MAX_PROMPT_CHARS: usize = 28_000;

/// Staff entries kept in compact mode.
pub const COMPACT_STAFF_LIMIT: usize = 15;

/// Service entries kept in compact mode.
pub const COMPACT_SERVICES_LIMIT: usize = 10;

/// Appended when the prompt had to be cut.
pub const TRUNCATION_NOTICE: &str =
    "\n\n[Prompt truncated for length. Consider using compact mode or fewer items.]";

const PAYMENT_LINK_SENTENCE: &str =
    "Tell callers you'll send a secure payment link via text after you confirm their booking.";

/// Everything the prompt is rendered from.
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptInput<'a> {
    /// Receptionist name.
    pub name: &'a str,
    /// Business phone number.
    pub phone_number: &'a str,
    /// Calendar the assistant books into.
    pub calendar_id: &'a str,
    /// Staff, in display order.
    pub staff: &'a [StaffMember],
    /// Services, in display order.
    pub services: &'a [ServiceOffering],
    /// Locations, in display order.
    pub locations: &'a [Location],
    /// Promos, in display order.
    pub promos: &'a [Promo],
    /// Reminders and policies, in display order.
    pub rules: &'a [ReminderRule],
    /// Payment instructions.
    pub payment_settings: Option<&'a PaymentSettings>,
    /// Cached website text.
    pub website_content: Option<&'a str>,
    /// Free-text owner instructions.
    pub extra_instructions: Option<&'a str>,
    /// Trim long lists and drop service descriptions.
    pub compact: bool,
}

impl<'a> PromptInput<'a> {
    /// Input with only the identity fields set.
    #[must_use]
    pub fn bare(name: &'a str, phone_number: &'a str, calendar_id: &'a str) -> Self {
        Self {
            name,
            phone_number,
            calendar_id,
            ..Self::default()
        }
    }

    /// Input for a stored receptionist and its configuration.
    #[must_use]
    pub fn for_receptionist(
        receptionist: &'a Receptionist,
        config: &'a ReceptionistConfig,
        compact: bool,
    ) -> Self {
        Self {
            name: &receptionist.name,
            phone_number: &receptionist.phone_number,
            calendar_id: receptionist.calendar_id.as_deref().unwrap_or(""),
            staff: &config.staff,
            services: &config.services,
            locations: &config.locations,
            promos: &config.promos,
            rules: &config.rules,
            payment_settings: receptionist.payment_settings.as_ref(),
            website_content: receptionist.website_content.as_deref(),
            extra_instructions: receptionist.extra_instructions.as_deref(),
            compact,
        }
    }
}

/// Render the system prompt.
#[must_use]
pub fn build_prompt(input: &PromptInput<'_>) -> String {
    let mut sections = vec![format!(
        "You are an AI receptionist named {}. You answer calls professionally and help callers \
         book appointments. The business phone number is {}. You have access to the business \
         Google Calendar (calendar ID: {}) to check availability and create events. Be friendly, \
         concise, and confirm the appointment details before ending the call.",
        input.name, input.phone_number, input.calendar_id
    )];

    sections.extend(staff_section(input));
    sections.extend(services_section(input));
    sections.extend(locations_section(input.locations));
    sections.extend(input.payment_settings.map(payment_section));
    sections.extend(rules_section(input.rules));
    sections.extend(promos_section(input.promos));
    sections.extend(
        present(input.website_content).map(|text| format!("Website context: {text}")),
    );
    sections.extend(
        present(input.extra_instructions).map(|text| format!("Additional instructions: {text}")),
    );

    truncate(sections.join("\n\n"))
}

fn present(text: Option<&str>) -> Option<&str> {
    text.map(str::trim).filter(|t| !t.is_empty())
}

fn staff_section(input: &PromptInput<'_>) -> Option<String> {
    if input.staff.is_empty() {
        return None;
    }
    let limit = if input.compact {
        COMPACT_STAFF_LIMIT
    } else {
        usize::MAX
    };
    let list = input
        .staff
        .iter()
        .take(limit)
        .map(|s| {
            let role = s.role.as_deref().filter(|r| !r.is_empty());
            match s.specialties.as_ref().and_then(|sp| sp.joined()) {
                Some(spec) => format!("{} ({}): {spec}", s.name, role.unwrap_or("staff")),
                None => match role {
                    Some(role) => format!("{}, {role}", s.name),
                    None => s.name.clone(),
                },
            }
        })
        .collect::<Vec<_>>()
        .join(". ");
    Some(format!(
        "Staff: {list}. When relevant, suggest booking with a specific staff member or \"anyone available.\""
    ))
}

fn services_section(input: &PromptInput<'_>) -> Option<String> {
    if input.services.is_empty() {
        return None;
    }
    let limit = if input.compact {
        COMPACT_SERVICES_LIMIT
    } else {
        usize::MAX
    };
    let list = input
        .services
        .iter()
        .take(limit)
        .map(|s| {
            let mut entry = format!("{}: ${}", s.name, format_cents(s.price_cents));
            if s.duration_minutes > 0 {
                entry.push_str(&format!(", {} min", s.duration_minutes));
            }
            if !input.compact {
                if let Some(description) = s.description.as_deref().filter(|d| !d.is_empty()) {
                    entry.push_str(&format!(" ({description})"));
                }
            }
            entry
        })
        .collect::<Vec<_>>()
        .join("; ");
    Some(format!("Services: {list}. Quote prices and duration when asked."))
}

fn locations_section(locations: &[Location]) -> Option<String> {
    if locations.is_empty() {
        return None;
    }
    let list = locations
        .iter()
        .map(|l| match l.address.as_deref().filter(|a| !a.is_empty()) {
            Some(address) => match l.notes.as_deref().filter(|n| !n.is_empty()) {
                Some(notes) => format!("{} at {address} ({notes})", l.name),
                None => format!("{} at {address}", l.name),
            },
            None => l.name.clone(),
        })
        .collect::<Vec<_>>()
        .join(". ");
    Some(format!("Locations: {list}."))
}

fn payment_section(settings: &PaymentSettings) -> String {
    let mut parts = Vec::new();
    if !settings.payment_methods.is_empty() {
        parts.push(format!("Accepted: {}.", settings.payment_methods.join(", ")));
    }
    if settings.accept_deposit && settings.deposit_amount_cents > 0 {
        parts.push(format!(
            "Deposit to secure booking: ${}.",
            format_cents(settings.deposit_amount_cents)
        ));
    }
    parts.push(PAYMENT_LINK_SENTENCE.to_string());
    if let Some(policy) = present(settings.refund_policy.as_deref()) {
        parts.push(format!("Refund policy: {policy}"));
    }
    format!("Payment: {}", parts.join(" "))
}

fn rules_section(rules: &[ReminderRule]) -> Option<String> {
    if rules.is_empty() {
        return None;
    }
    let list = rules
        .iter()
        .map(|r| r.content.as_str())
        .collect::<Vec<_>>()
        .join(". ");
    Some(format!("Policies and rules: {list}"))
}

fn promos_section(promos: &[Promo]) -> Option<String> {
    if promos.is_empty() {
        return None;
    }
    let list = promos
        .iter()
        .map(|p| {
            let mut entry = format!("{}: {}", p.code, p.description);
            if let Some(value) = p.discount_value {
                let unit = if p.discount_type.as_deref() == Some("percent") {
                    "%"
                } else {
                    ""
                };
                entry.push_str(&format!(" ({value}{unit} off)"));
            }
            entry
        })
        .collect::<Vec<_>>()
        .join("; ");
    Some(format!("Current promos: {list}."))
}

/// Cut `text` on a character boundary so that it plus the notice fits.
fn truncate(text: String) -> String {
    if text.chars().count() <= MAX_PROMPT_CHARS {
        return text;
    }
    let keep = MAX_PROMPT_CHARS - TRUNCATION_NOTICE.chars().count();
    let mut cut: String = text.chars().take(keep).collect();
    cut.push_str(TRUNCATION_NOTICE);
    cut
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::business::{RuleKind, Specialties};
    use crate::{EntryId, ReceptionistId};
    use chrono::Utc;

    fn service(name: &str, price_cents: i64, duration: i64, description: Option<&str>) -> ServiceOffering {
        ServiceOffering {
            id: EntryId::generate(),
            receptionist_id: ReceptionistId::generate(),
            name: name.into(),
            description: description.map(Into::into),
            price_cents,
            duration_minutes: duration,
            category: None,
            created_at: Utc::now(),
        }
    }

    fn staff(name: &str, role: Option<&str>, specialties: Option<Specialties>) -> StaffMember {
        StaffMember {
            id: EntryId::generate(),
            receptionist_id: ReceptionistId::generate(),
            name: name.into(),
            role: role.map(Into::into),
            specialties,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    fn base() -> PromptInput<'static> {
        PromptInput::bare("Ava", "+15551234567", "shop@example.com")
    }

    #[test]
    fn bare_prompt_is_just_the_base_sentence() {
        let prompt = build_prompt(&base());
        assert!(prompt.starts_with("You are an AI receptionist named Ava."));
        assert!(prompt.contains("The business phone number is +15551234567."));
        assert!(prompt.contains("(calendar ID: shop@example.com)"));
        assert!(!prompt.contains("\n\n"));
    }

    #[test]
    fn services_render_price_and_duration() {
        let services = [service("Haircut", 3000, 30, None)];
        let prompt = build_prompt(&PromptInput {
            services: &services,
            ..base()
        });
        assert!(prompt.contains(
            "\n\nServices: Haircut: $30.00, 30 min. Quote prices and duration when asked."
        ));
    }

    #[test]
    fn compact_drops_descriptions_and_limits_lists() {
        let services: Vec<_> = (0..12)
            .map(|i| service(&format!("Service {i:02}"), 1000, 0, Some("long description")))
            .collect();
        let full = build_prompt(&PromptInput {
            services: &services,
            ..base()
        });
        let compact = build_prompt(&PromptInput {
            services: &services,
            compact: true,
            ..base()
        });
        assert!(full.contains("(long description)"));
        assert!(!compact.contains("(long description)"));
        assert!(compact.contains("Service 09"));
        assert!(!compact.contains("Service 10"));
        assert!(compact.len() <= full.len());
    }

    #[test]
    fn staff_entries_use_specialties_or_role() {
        let members = [
            staff("Jo", Some("stylist"), Some(Specialties::List(vec!["color".into(), "cuts".into()]))),
            staff("Sam", None, Some(Specialties::Text("fades".into()))),
            staff("Lee", Some("manager"), None),
            staff("Kim", None, Some(Specialties::List(vec![]))),
        ];
        let prompt = build_prompt(&PromptInput {
            staff: &members,
            ..base()
        });
        assert!(prompt.contains(
            "Staff: Jo (stylist): color, cuts. Sam (staff): fades. Lee, manager. Kim. When relevant"
        ));
    }

    #[test]
    fn compact_keeps_first_fifteen_staff() {
        let members: Vec<_> = (0..16)
            .map(|i| staff(&format!("Member {i:02}"), None, None))
            .collect();
        let full = build_prompt(&PromptInput {
            staff: &members,
            ..base()
        });
        let compact = build_prompt(&PromptInput {
            staff: &members,
            compact: true,
            ..base()
        });
        assert!(full.contains("Member 15"));
        assert!(compact.contains("Member 00. "));
        assert!(compact.contains("Member 14. When relevant"));
        assert!(!compact.contains("Member 15"));
    }

    #[test]
    fn empty_role_reads_as_staff_or_is_omitted() {
        let members = [
            staff("Jo", Some(""), Some(Specialties::Text("color".into()))),
            staff("Lee", Some(""), None),
        ];
        let prompt = build_prompt(&PromptInput {
            staff: &members,
            ..base()
        });
        assert!(prompt.contains("Staff: Jo (staff): color. Lee. When relevant"));
        assert!(!prompt.contains("()"));
    }

    #[test]
    fn sections_follow_fixed_order() {
        let services = [service("Haircut", 3000, 30, None)];
        let rules = [ReminderRule {
            id: EntryId::generate(),
            receptionist_id: ReceptionistId::generate(),
            kind: RuleKind::Rule,
            content: "No walk-ins".into(),
            trigger: None,
            channel: None,
            created_at: Utc::now(),
        }];
        let settings = PaymentSettings {
            accept_deposit: true,
            deposit_amount_cents: 2500,
            payment_methods: vec!["card".into(), "cash".into()],
            refund_policy: Some("24h notice".into()),
        };
        let prompt = build_prompt(&PromptInput {
            services: &services,
            rules: &rules,
            payment_settings: Some(&settings),
            website_content: Some("We cut hair."),
            extra_instructions: Some("Speak slowly."),
            ..base()
        });

        let order = [
            "Services:",
            "Payment: Accepted: card, cash. Deposit to secure booking: $25.00. Tell callers",
            "Refund policy: 24h notice",
            "Policies and rules: No walk-ins",
            "Website context: We cut hair.",
            "Additional instructions: Speak slowly.",
        ];
        let positions: Vec<_> = order.iter().map(|s| prompt.find(s).unwrap()).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn empty_lists_emit_no_paragraphs() {
        let prompt = build_prompt(&PromptInput {
            website_content: Some("   "),
            ..base()
        });
        for heading in ["Staff:", "Services:", "Locations:", "Payment:", "Policies", "promos", "Website"] {
            assert!(!prompt.contains(heading), "unexpected {heading}");
        }
    }

    #[test]
    fn promos_mark_percent_discounts() {
        let promo = |code: &str, kind: Option<&str>, value: Option<f64>| Promo {
            id: EntryId::generate(),
            receptionist_id: ReceptionistId::generate(),
            code: code.into(),
            description: "Deal".into(),
            discount_type: kind.map(Into::into),
            discount_value: value,
            valid_from: None,
            valid_until: None,
            created_at: Utc::now(),
        };
        let promos = [
            promo("TEN", Some("percent"), Some(10.0)),
            promo("FIVE", Some("fixed"), Some(5.0)),
            promo("FREE", None, None),
        ];
        let prompt = build_prompt(&PromptInput {
            promos: &promos,
            ..base()
        });
        assert!(prompt.contains(
            "Current promos: TEN: Deal (10% off); FIVE: Deal (5 off); FREE: Deal."
        ));
    }

    #[test]
    fn long_prompts_are_cut_to_the_ceiling() {
        let long = "x".repeat(40_000);
        let prompt = build_prompt(&PromptInput {
            extra_instructions: Some(&long),
            ..base()
        });
        assert_eq!(prompt.chars().count(), MAX_PROMPT_CHARS);
        assert!(prompt.ends_with(TRUNCATION_NOTICE));
    }

    #[test]
    fn truncation_respects_multibyte_characters() {
        let long = "é".repeat(30_000);
        let prompt = build_prompt(&PromptInput {
            website_content: Some(&long),
            ..base()
        });
        assert!(prompt.chars().count() <= MAX_PROMPT_CHARS);
    }

    #[test]
    fn rendering_is_deterministic() {
        let services = [service("Haircut", 3000, 30, Some("wash included"))];
        let input = PromptInput {
            services: &services,
            ..base()
        };
        assert_eq!(build_prompt(&input), build_prompt(&input));
    }
}
