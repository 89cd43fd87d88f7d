//! Formatting of integer cent amounts.
//!
//! All money is stored as `i64` cents. Rendering never goes through floating
//! point, so `$0.35` stays `$0.35`.

/// Render cents as a decimal dollar amount with two places, e.g. `3000` -> `30.00`.
#[must_use]
pub fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}

/// Render cents as whole dollars, rounding half up, e.g. `750` -> `8`.
#[must_use]
pub fn format_whole_dollars(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{sign}{}", (abs + 50) / 100)
}
