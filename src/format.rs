//! Number formatting for report tables.

use rust_decimal::Decimal;

use crate::model::{to_cents, MONEY_SCALE};

/// Formats `value` as dollars with thousands separators, e.g. `$1,234.56`.
pub fn currency(value: Decimal) -> String {
    let mut amount = to_cents(value).abs();
    amount.rescale(MONEY_SCALE);
    let text = amount.to_string();
    let (whole, fraction) = text.split_once('.').unwrap_or((text.as_str(), "00"));
    let sign = if value.is_sign_negative() && !amount.is_zero() {
        "-"
    } else {
        ""
    };
    format!("{sign}${}.{fraction}", group_thousands(whole))
}

/// Formats an integer count with thousands separators.
pub fn count(value: i64) -> String {
    let grouped = group_thousands(&value.unsigned_abs().to_string());
    if value < 0 {
        format!("-{grouped}")
    } else {
        grouped
    }
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
