//! Text parsing shared by normalization and patch validation.

use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%d/%m/%Y",
    "%d-%m-%Y",
    "%d.%m.%Y",
    "%d/%m/%y",
    "%d %b %Y",
];

/// Parse a money amount, ignoring currency symbols, a `GBP` marker,
/// thousands separators and whitespace. `"£12,500"` → `12500`.
///
/// Negative values parse; rejecting them is the caller's decision.
pub fn parse_amount(text: &str) -> Option<Decimal> {
    let trimmed = text.trim();
    let without_code = trimmed
        .strip_prefix("GBP")
        .or_else(|| trimmed.strip_suffix("GBP"))
        .unwrap_or(trimmed);
    let cleaned: String = without_code
        .chars()
        .filter(|c| !matches!(c, '£' | '$' | '€' | ',' | '_') && !c.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    Decimal::from_str(&cleaned).ok()
}

/// Parse ISO `yyyy-MM-dd` (optionally with a time part) or UK day-first
/// dates. Unparseable input is `None`, not an error.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(stamp) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S") {
        return Some(stamp.date());
    }
    if let Some((date, _)) = trimmed.split_once('T') {
        if let Ok(date) = NaiveDate::parse_from_str(date, "%Y-%m-%d") {
            return Some(date);
        }
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
}

/// Raw percentage value: trailing `%` stripped, no clamping. Decimal input
/// is rounded to the nearest whole point.
pub fn parse_percent(text: &str) -> Option<i64> {
    let trimmed = text.trim();
    let number = trimmed.strip_suffix('%').unwrap_or(trimmed).trim();
    if number.is_empty() {
        return None;
    }
    if let Ok(value) = number.parse::<i64>() {
        return Some(value);
    }
    let value = number.parse::<f64>().ok()?;
    value.is_finite().then(|| value.round() as i64)
}

/// Probability in `[0, 100]`; out-of-range input is clamped.
pub fn parse_probability(text: &str) -> Option<u8> {
    parse_percent(text).map(clamp_probability)
}

/// Clamp a raw percentage into `[0, 100]`.
pub fn clamp_probability(value: i64) -> u8 {
    value.clamp(0, 100) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amounts_accept_currency_and_separators() {
        assert_eq!(parse_amount("£12,500"), Some(Decimal::from(12_500)));
        assert_eq!(parse_amount(" 1 250.50 "), Some(Decimal::new(125_050, 2)));
        assert_eq!(parse_amount("GBP 3,000"), Some(Decimal::from(3_000)));
        assert_eq!(parse_amount("-£40"), Some(Decimal::from(-40)));
        assert_eq!(parse_amount("£"), None);
        assert_eq!(parse_amount("twelve"), None);
    }

    #[test]
    fn dates_accept_iso_and_uk_forms() {
        let expected = NaiveDate::from_ymd_opt(2025, 3, 4);
        assert_eq!(parse_date("2025-03-04"), expected);
        assert_eq!(parse_date("04/03/2025"), expected);
        assert_eq!(parse_date("04-03-2025"), expected);
        assert_eq!(parse_date("04.03.2025"), expected);
        assert_eq!(parse_date("2025-03-04T09:30:00"), expected);
        assert_eq!(parse_date("4 Mar 2025"), expected);
        assert_eq!(parse_date("31/02/2025"), None);
        assert_eq!(parse_date("soon"), None);
        assert_eq!(parse_date(""), None);
    }

    #[test]
    fn probability_strips_percent_and_clamps() {
        assert_eq!(parse_probability("60%"), Some(60));
        assert_eq!(parse_probability(" 45 "), Some(45));
        assert_eq!(parse_probability("150"), Some(100));
        assert_eq!(parse_probability("-5"), Some(0));
        assert_eq!(parse_probability("33.6"), Some(34));
        assert_eq!(parse_probability("%"), None);
        assert_eq!(parse_percent("150%"), Some(150));
    }
}
