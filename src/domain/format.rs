//! Rendering of values next to their lines.

use chrono::{DateTime, Local, Timelike};
use serde::Deserialize;

use super::units::Quantity;
use super::value::Value;

/// Decimal exponents outside `lower_exp..upper_exp` switch numbers to
/// exponential notation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FormatConfig {
    pub lower_exp: i32,
    pub upper_exp: i32,
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            lower_exp: -9,
            upper_exp: 15,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Formatter {
    config: FormatConfig,
}

impl Formatter {
    pub fn new(config: FormatConfig) -> Self {
        Self { config }
    }

    /// Formats a value for display.
    ///
    /// ```
    /// use mathpad::domain::{Formatter, Value};
    ///
    /// let formatter = Formatter::default();
    /// assert_eq!(formatter.format(&Value::Number(1234567.0)), "1,234,567");
    /// assert_eq!(formatter.format(&Value::Number(1e15)), "1e+15");
    /// ```
    pub fn format(&self, value: &Value) -> String {
        match value {
            Value::Number(n) => self.format_number(*n),
            Value::Date(date) => format_date(date),
            Value::Quantity(q) => self.format_quantity(q),
            Value::Function(callable) => callable.to_string(),
            Value::Undefined => "undefined".to_string(),
            Value::Error(message) => format!("Error: {}", message),
        }
    }

    pub fn format_number(&self, n: f64) -> String {
        if n.is_nan() {
            return "NaN".to_string();
        }
        if n.is_infinite() {
            return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
        }
        if n == 0.0 {
            return "0".to_string();
        }

        // `{:e}` yields the shortest round-trip digits, e.g. `-1.5e-10`.
        let scientific = format!("{:e}", n);
        let (mantissa, exponent) = match scientific.split_once('e') {
            Some((mantissa, exponent)) => (mantissa, exponent.parse::<i32>().unwrap_or(0)),
            None => (scientific.as_str(), 0),
        };

        if exponent < self.config.lower_exp || exponent >= self.config.upper_exp {
            let sign = if exponent < 0 { '-' } else { '+' };
            return format!("{}e{}{}", mantissa, sign, exponent.abs());
        }

        group_thousands(&n.to_string())
    }

    fn format_quantity(&self, quantity: &Quantity) -> String {
        let number = self.format_number(quantity.value());
        if quantity.units.is_empty() {
            number
        } else {
            format!("{} {}", number, quantity.units)
        }
    }
}

/// `M/D/YYYY` at midnight, `M/D/YYYY, h:mm:ss AM` otherwise.
fn format_date(date: &DateTime<Local>) -> String {
    let midnight = date.hour() == 0
        && date.minute() == 0
        && date.second() == 0
        && date.nanosecond() / 1_000_000 == 0;
    if midnight {
        date.format("%-m/%-d/%Y").to_string()
    } else {
        date.format("%-m/%-d/%Y, %-I:%M:%S %p").to_string()
    }
}

/// Inserts `,` every three digits of the integer part. Only plain unsigned
/// decimals are touched; anything else is returned unchanged.
fn group_thousands(s: &str) -> String {
    let (integer, fraction) = match s.split_once('.') {
        Some((integer, fraction)) => (integer, Some(fraction)),
        None => (s, None),
    };

    let plain = |part: &str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());
    if !plain(integer) || !fraction.is_none_or(plain) {
        return s.to_string();
    }

    let mut grouped = String::with_capacity(s.len() + integer.len() / 3);
    for (i, digit) in integer.chars().enumerate() {
        if i > 0 && (integer.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    if let Some(fraction) = fraction {
        grouped.push('.');
        grouped.push_str(fraction);
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::units::{UnitExpr, UnitTable};
    use crate::domain::value::Callable;
    use chrono::TimeZone;

    fn format(n: f64) -> String {
        Formatter::default().format(&Value::Number(n))
    }

    #[test]
    fn test_fixed_numbers_get_separators() {
        assert_eq!(format(1234567.0), "1,234,567");
        assert_eq!(format(1234.5678), "1,234.5678");
        assert_eq!(format(999.0), "999");
        assert_eq!(format(0.000123456789), "0.000123456789");
        assert_eq!(format(0.1 + 0.2), "0.30000000000000004");
        assert_eq!(format(0.0), "0");
    }

    #[test]
    fn test_negative_numbers_are_not_grouped() {
        assert_eq!(format(-1234567.0), "-1234567");
        assert_eq!(format(-2.5), "-2.5");
    }

    #[test]
    fn test_exponential_outside_band() {
        assert_eq!(format(1.5e-10), "1.5e-10");
        assert_eq!(format(1e15), "1e+15");
        assert_eq!(format(-2.5e20), "-2.5e+20");
        assert_eq!(format(1e-9), "0.000000001");
        assert_eq!(format(999_999_999_999_999.0), "999,999,999,999,999");
    }

    #[test]
    fn test_band_is_configurable() {
        let formatter = Formatter::new(FormatConfig { lower_exp: -3, upper_exp: 5 });
        assert_eq!(formatter.format_number(123456.0), "1.23456e+5");
        assert_eq!(formatter.format_number(0.0001), "1e-4");
        assert_eq!(formatter.format_number(12345.0), "12,345");
    }

    #[test]
    fn test_special_numbers() {
        assert_eq!(format(f64::INFINITY), "Infinity");
        assert_eq!(format(f64::NEG_INFINITY), "-Infinity");
    }

    #[test]
    fn test_dates() {
        let formatter = Formatter::default();
        let midnight = Local.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let afternoon = Local.with_ymd_and_hms(2024, 1, 1, 15, 30, 0).unwrap();
        let morning = Local.with_ymd_and_hms(2024, 12, 25, 9, 5, 7).unwrap();

        assert_eq!(formatter.format(&Value::Date(midnight)), "1/1/2024");
        assert_eq!(formatter.format(&Value::Date(afternoon)), "1/1/2024, 3:30:00 PM");
        assert_eq!(formatter.format(&Value::Date(morning)), "12/25/2024, 9:05:07 AM");
    }

    #[test]
    fn test_quantities() {
        let formatter = Formatter::default();
        let table = UnitTable::new();
        let seconds = Quantity::new(86_400.0, UnitExpr::single(table.lookup("s").unwrap()));
        assert_eq!(formatter.format(&Value::Quantity(seconds)), "86,400 s");

        let m = UnitExpr::single(table.lookup("m").unwrap());
        let s = UnitExpr::single(table.lookup("s").unwrap());
        let speed = Quantity::new(5.0, m.div(&s).unwrap());
        assert_eq!(formatter.format(&Value::Quantity(speed)), "5 m / s");
    }

    #[test]
    fn test_other_values() {
        let formatter = Formatter::default();
        assert_eq!(formatter.format(&Value::Undefined), "undefined");
        assert_eq!(
            formatter.format(&Value::Error("not a number".to_string())),
            "Error: not a number"
        );
        assert_eq!(
            formatter.format(&Value::Function(Callable::Builtin("sqrt"))),
            "sqrt(...)"
        );
    }

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands("1000"), "1,000");
        assert_eq!(group_thousands("100"), "100");
        assert_eq!(group_thousands("123456.123456"), "123,456.123456");
        assert_eq!(group_thousands("1e5"), "1e5");
    }
}
