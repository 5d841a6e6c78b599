//! Built-in helpers callable from templates.
//!
//! Helpers never fail at render time. When an argument cannot be interpreted
//! (a non-numeric amount, an unparseable date) the helper returns the
//! argument's plain string form.

use std::cmp::Ordering;
use std::fmt::Write as _;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;

use super::parser::TemplateError;
use super::render::{as_number, is_truthy, to_text};

const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d %H:%M";
const DEFAULT_CURRENCY: &str = "USD";
const MAX_DECIMALS: usize = 10;

/// A helper that can appear at the head of a tag or sub-expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Helper {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    And,
    Or,
    Not,
    FormatDate,
    FormatCurrency,
    FormatNumber,
    Uppercase,
    Lowercase,
    Capitalize,
    Pluralize,
    Default,
}

impl Helper {
    pub const ALL: &'static [Helper] = &[
        Helper::Eq,
        Helper::Ne,
        Helper::Gt,
        Helper::Gte,
        Helper::Lt,
        Helper::Lte,
        Helper::And,
        Helper::Or,
        Helper::Not,
        Helper::FormatDate,
        Helper::FormatCurrency,
        Helper::FormatNumber,
        Helper::Uppercase,
        Helper::Lowercase,
        Helper::Capitalize,
        Helper::Pluralize,
        Helper::Default,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|h| h.name() == name)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Helper::Eq => "eq",
            Helper::Ne => "ne",
            Helper::Gt => "gt",
            Helper::Gte => "gte",
            Helper::Lt => "lt",
            Helper::Lte => "lte",
            Helper::And => "and",
            Helper::Or => "or",
            Helper::Not => "not",
            Helper::FormatDate => "formatDate",
            Helper::FormatCurrency => "formatCurrency",
            Helper::FormatNumber => "formatNumber",
            Helper::Uppercase => "uppercase",
            Helper::Lowercase => "lowercase",
            Helper::Capitalize => "capitalize",
            Helper::Pluralize => "pluralize",
            Helper::Default => "default",
        }
    }

    /// Accepted argument count as `(min, max)`.
    fn arity(&self) -> (usize, usize) {
        match self {
            Helper::Eq | Helper::Ne | Helper::Gt | Helper::Gte | Helper::Lt | Helper::Lte => (2, 2),
            Helper::And | Helper::Or => (2, usize::MAX),
            Helper::Not | Helper::Uppercase | Helper::Lowercase | Helper::Capitalize => (1, 1),
            Helper::FormatDate | Helper::FormatCurrency | Helper::FormatNumber => (1, 2),
            Helper::Pluralize => (2, 3),
            Helper::Default => (2, 2),
        }
    }

    pub(crate) fn check_arity(&self, got: usize) -> Result<(), TemplateError> {
        let (min, max) = self.arity();
        if (min..=max).contains(&got) {
            return Ok(());
        }
        let expected = if min == max {
            min.to_string()
        } else if max == usize::MAX {
            format!("at least {min}")
        } else {
            format!("{min} to {max}")
        };
        Err(TemplateError::Arity {
            helper: self.name(),
            expected,
            got,
        })
    }

    /// Apply the helper to already-evaluated arguments. Arity has been
    /// checked at compile time.
    pub(crate) fn call(&self, args: &[Value]) -> Value {
        let arg = |i: usize| args.get(i).unwrap_or(&Value::Null);
        match self {
            Helper::Eq => Value::Bool(loose_eq(arg(0), arg(1))),
            Helper::Ne => Value::Bool(!loose_eq(arg(0), arg(1))),
            Helper::Gt => Value::Bool(compare(arg(0), arg(1)) == Some(Ordering::Greater)),
            Helper::Gte => Value::Bool(matches!(
                compare(arg(0), arg(1)),
                Some(Ordering::Greater | Ordering::Equal)
            )),
            Helper::Lt => Value::Bool(compare(arg(0), arg(1)) == Some(Ordering::Less)),
            Helper::Lte => Value::Bool(matches!(
                compare(arg(0), arg(1)),
                Some(Ordering::Less | Ordering::Equal)
            )),
            Helper::And => Value::Bool(args.iter().all(is_truthy)),
            Helper::Or => Value::Bool(args.iter().any(is_truthy)),
            Helper::Not => Value::Bool(!is_truthy(arg(0))),
            Helper::FormatDate => {
                let format = args.get(1).map(to_text);
                Value::String(format_date(arg(0), format.as_deref().unwrap_or(DEFAULT_DATE_FORMAT)))
            }
            Helper::FormatCurrency => {
                let code = args.get(1).map(to_text);
                Value::String(format_currency(arg(0), code.as_deref().unwrap_or(DEFAULT_CURRENCY)))
            }
            Helper::FormatNumber => {
                let decimals = args
                    .get(1)
                    .and_then(as_number)
                    .map(|d| (d.max(0.0) as usize).min(MAX_DECIMALS))
                    .unwrap_or(0);
                Value::String(format_number(arg(0), decimals))
            }
            Helper::Uppercase => Value::String(to_text(arg(0)).to_uppercase()),
            Helper::Lowercase => Value::String(to_text(arg(0)).to_lowercase()),
            Helper::Capitalize => Value::String(capitalize(&to_text(arg(0)))),
            Helper::Pluralize => {
                let singular = to_text(arg(1));
                let is_one = as_number(arg(0)) == Some(1.0);
                let word = match (is_one, args.get(2)) {
                    (true, _) => singular,
                    (false, Some(plural)) => to_text(plural),
                    (false, None) => format!("{singular}s"),
                };
                Value::String(word)
            }
            Helper::Default => {
                if is_truthy(arg(0)) {
                    arg(0).clone()
                } else {
                    arg(1).clone()
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Comparison
// ---------------------------------------------------------------------------

fn loose_eq(a: &Value, b: &Value) -> bool {
    match (as_number(a), as_number(b)) {
        (Some(x), Some(y)) => x == y,
        _ => to_text(a) == to_text(b),
    }
}

/// Numbers (and numeric strings) compare numerically, anything else by its
/// text form.
fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (as_number(a), as_number(b)) {
        (Some(x), Some(y)) => x.partial_cmp(&y),
        _ => Some(to_text(a).cmp(&to_text(b))),
    }
}

// ---------------------------------------------------------------------------
// Formatting
// ---------------------------------------------------------------------------

fn parse_datetime(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(&Utc));
            }
            for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"] {
                if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
                    return Some(naive.and_utc());
                }
            }
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|naive| naive.and_utc())
        }
        // Epoch milliseconds.
        Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    }
}

fn format_date(value: &Value, format: &str) -> String {
    let Some(dt) = parse_datetime(value) else {
        return to_text(value);
    };
    let mut out = String::new();
    // Invalid strftime specifiers surface as a fmt error rather than a panic
    // when written through `write!`.
    match write!(out, "{}", dt.format(format)) {
        Ok(()) => out,
        Err(_) => to_text(value),
    }
}

fn currency_symbol(code: &str) -> Option<&'static str> {
    match code {
        "USD" => Some("$"),
        "EUR" => Some("€"),
        "GBP" => Some("£"),
        "JPY" => Some("¥"),
        "INR" => Some("₹"),
        _ => None,
    }
}

fn format_currency(value: &Value, code: &str) -> String {
    let Some(amount) = as_number(value) else {
        return to_text(value);
    };
    let code = code.trim().to_uppercase();
    let decimals = if code == "JPY" { 0 } else { 2 };
    let digits = group_thousands(&format!("{:.*}", decimals, amount.abs()));
    let sign = if amount < 0.0 { "-" } else { "" };
    match currency_symbol(&code) {
        Some(symbol) => format!("{sign}{symbol}{digits}"),
        None => format!("{sign}{code} {digits}"),
    }
}

fn format_number(value: &Value, decimals: usize) -> String {
    let Some(n) = as_number(value) else {
        return to_text(value);
    };
    let digits = group_thousands(&format!("{:.*}", decimals, n.abs()));
    if n < 0.0 && digits.chars().any(|c| c.is_ascii_digit() && c != '0') {
        format!("-{digits}")
    } else {
        digits
    }
}

/// Insert `,` separators into the integer part of an unsigned decimal string.
fn group_thousands(unsigned: &str) -> String {
    let (int_part, frac_part) = match unsigned.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (unsigned, None),
    };
    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3 + 4);
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    if let Some(frac) = frac_part {
        grouped.push('.');
        grouped.push_str(frac);
    }
    grouped
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn every_helper_round_trips_its_name() {
        for helper in Helper::ALL {
            assert_eq!(Helper::from_name(helper.name()), Some(*helper));
        }
        assert_eq!(Helper::from_name("shout"), None);
    }

    #[test]
    fn arity_messages() {
        let err = Helper::Pluralize.check_arity(1).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Helper 'pluralize' expects 2 to 3 argument(s), got 1"
        );
        assert!(Helper::And.check_arity(5).is_ok());
    }

    #[test]
    fn grouping() {
        assert_eq!(group_thousands("1"), "1");
        assert_eq!(group_thousands("123"), "123");
        assert_eq!(group_thousands("1234"), "1,234");
        assert_eq!(group_thousands("123456.78"), "123,456.78");
    }

    #[test]
    fn yen_has_no_minor_units() {
        assert_eq!(format_currency(&json!(1500), "JPY"), "¥1,500");
    }

    #[test]
    fn epoch_millis_dates() {
        assert_eq!(
            format_date(&json!(0), "%Y-%m-%d"),
            "1970-01-01"
        );
    }

    #[test]
    fn negative_numbers_keep_sign() {
        assert_eq!(format_number(&json!(-1234.4), 0), "-1,234");
        assert_eq!(format_number(&json!(-0.2), 0), "0");
    }
}
