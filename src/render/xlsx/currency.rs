//! Currency column detection and conversion.

use regex::Regex;
use std::sync::OnceLock;

/// Number format applied to currency cells.
pub const CURRENCY_FORMAT: &str = r##""$"#,##0.00"##;

/// Currency symbols that mark a sampled value as money.
const SYMBOLS: &[char] = &['$', '€', '£', '¥'];

/// Number of data values sampled when the header is inconclusive.
const SAMPLE_SIZE: usize = 10;

fn keyword_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(cost|price|amount|fee|budget|revenue|subtotal|investment)s?\b|\$")
            .expect("currency keyword regex is valid")
    })
}

/// `total` and `rate` name money only when no other unit is named.
fn weak_keyword_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(total|rate)s?\b").expect("weak keyword regex is valid"))
}

fn unit_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\b(hours?|hrs?|days?|weeks?|months?|years?|count|qty|quantity|units?|items?|points?|users?|seats?|percent|pct|score)\b|%",
        )
        .expect("unit regex is valid")
    })
}

/// Whether a column holds currency: its name matches a currency keyword
/// (`total` or `rate` only without another unit, as in "Total Hours"),
/// or one of the first sampled values carries a currency symbol.
pub fn is_currency_column<'a>(header: &str, values: impl IntoIterator<Item = &'a str>) -> bool {
    if keyword_regex().is_match(header)
        || (weak_keyword_regex().is_match(header) && !unit_regex().is_match(header))
    {
        return true;
    }
    values
        .into_iter()
        .take(SAMPLE_SIZE)
        .any(|v| v.contains(SYMBOLS))
}

/// Parse currency text such as `$1,234.56`, `€ 99` or `(1,200)`.
///
/// Returns `None` for empty or non-numeric text. Parentheses and a
/// leading minus mark negative amounts.
pub fn parse_currency(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    let (negative, body) = match trimmed
        .strip_prefix('(')
        .and_then(|t| t.strip_suffix(')'))
    {
        Some(inner) => (true, inner),
        None => (false, trimmed),
    };

    let cleaned: String = body
        .chars()
        .filter(|c| !SYMBOLS.contains(c) && *c != ',' && !c.is_whitespace())
        .collect();
    let (negative, cleaned) = match cleaned.strip_prefix('-') {
        Some(rest) => (!negative, rest.to_string()),
        None => (negative, cleaned),
    };
    if cleaned.is_empty() || !cleaned.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return None;
    }

    let value: f64 = cleaned.parse().ok()?;
    Some(if negative { -value } else { value })
}

/// Parse a plain number (`12`, `3.5`, `1,200`). Text with letters,
/// symbols or leading zeros (identifiers such as `007`) stays text.
pub fn parse_number(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    let digits = trimmed.strip_prefix('-').unwrap_or(trimmed);
    if digits.len() > 1 && digits.starts_with('0') && !digits.starts_with("0.") {
        return None;
    }
    if !digits
        .chars()
        .all(|c| c.is_ascii_digit() || c == '.' || c == ',')
        || !digits.starts_with(|c: char| c.is_ascii_digit())
    {
        return None;
    }
    trimmed.replace(',', "").parse().ok()
}

/// Display form of an amount: `$1,234.56`.
pub fn format_currency(value: f64) -> String {
    let cents = (value.abs() * 100.0).round() as u64;
    let whole = (cents / 100).to_string();
    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, c) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    let sign = if value < 0.0 && cents > 0 { "-" } else { "" };
    format!("{}${}.{:02}", sign, grouped, cents % 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let value = parse_currency("$1,234.56").unwrap();
        assert!((value - 1234.56).abs() < 1e-9);
        assert_eq!(format_currency(value), "$1,234.56");
    }

    #[test]
    fn test_total_cost_column() {
        let values = ["$1,000", "", "$2,500.50"];
        assert!(is_currency_column("Total Cost", values));
        let parsed: Vec<Option<f64>> = values.iter().map(|v| parse_currency(v)).collect();
        assert_eq!(parsed, vec![Some(1000.0), None, Some(2500.50)]);
    }

    #[test]
    fn test_detection() {
        assert!(is_currency_column("Hourly Rate", ["150"]));
        assert!(is_currency_column("Fees", ["n/a"]));
        assert!(is_currency_column("Amount ($)", [""]));
        assert!(is_currency_column("Line item", ["£40", "£10"]));
        assert!(!is_currency_column("Separate", ["yes"]));
        assert!(!is_currency_column("Hours", ["40", "12"]));
        assert!(is_currency_column("Total", ["1200"]));
    }

    #[test]
    fn test_total_of_other_units() {
        assert!(!is_currency_column("Total Hours", ["40"]));
        assert!(!is_currency_column("Total Days", ["5", "3"]));
        assert!(!is_currency_column("Completion Rate (%)", ["80"]));
        assert!(is_currency_column("Total Hours", ["$40"]));
        assert!(is_currency_column("Total Cost (Hours x Rate)", ["4000"]));
    }

    #[test]
    fn test_negative_and_invalid() {
        assert_eq!(parse_currency("(1,234)"), Some(-1234.0));
        assert_eq!(parse_currency("-$5.50"), Some(-5.5));
        assert_eq!(parse_currency("€ 99"), Some(99.0));
        assert_eq!(parse_currency("TBD"), None);
        assert_eq!(parse_currency("   "), None);
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("12"), Some(12.0));
        assert_eq!(parse_number("1,200"), Some(1200.0));
        assert_eq!(parse_number("-3.5"), Some(-3.5));
        assert_eq!(parse_number("0.25"), Some(0.25));
        assert_eq!(parse_number("007"), None);
        assert_eq!(parse_number("v1"), None);
        assert_eq!(parse_number("2-3"), None);
    }

    #[test]
    fn test_format_currency() {
        assert_eq!(format_currency(0.0), "$0.00");
        assert_eq!(format_currency(999.999), "$1,000.00");
        assert_eq!(format_currency(1234567.0), "$1,234,567.00");
        assert_eq!(format_currency(-42.1), "-$42.10");
    }
}
