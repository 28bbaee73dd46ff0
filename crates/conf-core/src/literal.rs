//! Literal decoder
//!
//! Pure text -> value conversions applied to the exact token text the parser
//! matched. The lexer already guarantees the general shape of each token, so
//! the error paths here only fire on overflow or on degenerate tokens such as
//! an ISO duration with no components (`P`).

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ast::{DurationForm, Literal, LiteralKind};
use crate::value::Value;

const BOOLEAN_TRUE_VALUES: &[&str] = &["true", "on", "enabled", "yes"];

/// Simple-form duration units in the order they must appear.
/// Longer spellings first so `minutes` is not read as `minute`.
pub(crate) const DURATION_UNITS: &[(&str, PeriodField)] = &[
    ("years", PeriodField::Years),
    ("year", PeriodField::Years),
    ("months", PeriodField::Months),
    ("month", PeriodField::Months),
    ("days", PeriodField::Days),
    ("day", PeriodField::Days),
    ("hours", PeriodField::Hours),
    ("hour", PeriodField::Hours),
    ("minutes", PeriodField::Minutes),
    ("minute", PeriodField::Minutes),
    ("seconds", PeriodField::Seconds),
    ("second", PeriodField::Seconds),
    ("milliseconds", PeriodField::Millis),
    ("millisecond", PeriodField::Millis),
    ("millis", PeriodField::Millis),
    ("milli", PeriodField::Millis),
];

/// Size units, case-sensitive
pub(crate) const SIZE_UNITS: &[&str] = &[
    "KiB", "MiB", "GiB", "TiB", "PiB", "KB", "MB", "GB", "TB", "PB", "B",
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LiteralError {
    #[error("{kind} value {text} can not be parsed")]
    Number { kind: &'static str, text: String },

    #[error("Unable to parse duration value:'{text}' - Not in a known format")]
    Duration { text: String },
}

// =============================================================================
// PERIOD
// =============================================================================

/// Structured duration value. Fields are kept exactly as written; no
/// normalization between units is performed (`90 minutes` stays 90 minutes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Period {
    pub years: i64,
    pub months: i64,
    pub days: i64,
    pub hours: i64,
    pub minutes: i64,
    pub seconds: i64,
    pub millis: i64,
}

/// Addressable field of a [`Period`], ordered largest unit first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum PeriodField {
    Years,
    Months,
    Days,
    Hours,
    Minutes,
    Seconds,
    Millis,
}

impl Period {
    pub fn is_zero(&self) -> bool {
        *self == Period::default()
    }

    fn set(&mut self, field: PeriodField, amount: i64) {
        match field {
            PeriodField::Years => self.years = amount,
            PeriodField::Months => self.months = amount,
            PeriodField::Days => self.days = amount,
            PeriodField::Hours => self.hours = amount,
            PeriodField::Minutes => self.minutes = amount,
            PeriodField::Seconds => self.seconds = amount,
            PeriodField::Millis => self.millis = amount,
        }
    }
}

impl fmt::Display for Period {
    /// ISO-8601 rendering, for logs and diagnostics
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_zero() {
            return write!(f, "PT0S");
        }
        write!(f, "P")?;
        for (amount, suffix) in [(self.years, 'Y'), (self.months, 'M'), (self.days, 'D')] {
            if amount != 0 {
                write!(f, "{}{}", amount, suffix)?;
            }
        }
        if self.hours != 0 || self.minutes != 0 || self.seconds != 0 || self.millis != 0 {
            write!(f, "T")?;
            if self.hours != 0 {
                write!(f, "{}H", self.hours)?;
            }
            if self.minutes != 0 {
                write!(f, "{}M", self.minutes)?;
            }
            if self.millis != 0 {
                write!(f, "{}.{:03}S", self.seconds, self.millis)?;
            } else if self.seconds != 0 {
                write!(f, "{}S", self.seconds)?;
            }
        }
        Ok(())
    }
}

// =============================================================================
// DECODERS
// =============================================================================

/// Decode a literal token according to the alternative that matched it
pub fn decode(literal: &Literal) -> Result<Value, LiteralError> {
    let text = literal.text.as_str();
    Ok(match literal.kind {
        LiteralKind::String => Value::String(decode_string(text)),
        LiteralKind::Integer => Value::Integer(decode_integer(text)?),
        LiteralKind::Long => Value::Long(decode_long(text)?),
        LiteralKind::Float => Value::Float(decode_float(text)?),
        LiteralKind::Double => Value::Double(decode_double(text)?),
        LiteralKind::Boolean => Value::Boolean(decode_boolean(text)),
        LiteralKind::Size => Value::Size(decode_size(text)),
        LiteralKind::Duration(form) => Value::Duration(decode_duration(text, form)?),
    })
}

/// Strip the surrounding quotes and apply backslash escapes.
/// Unknown or malformed escapes are kept verbatim.
pub fn decode_string(token: &str) -> String {
    let body = token
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(token);

    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some('/') => out.push('/'),
            Some('\'') => out.push('\''),
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('b') => out.push('\u{0008}'),
            Some('f') => out.push('\u{000C}'),
            Some('0') => out.push('\0'),
            Some('u') => {
                let hex: String = chars.clone().take(4).collect();
                let decoded = (hex.len() == 4)
                    .then(|| u32::from_str_radix(&hex, 16).ok())
                    .flatten()
                    .and_then(char::from_u32);
                match decoded {
                    Some(ch) => {
                        out.push(ch);
                        for _ in 0..4 {
                            chars.next();
                        }
                    }
                    None => out.push_str("\\u"),
                }
            }
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

pub fn decode_integer(token: &str) -> Result<i32, LiteralError> {
    number_part(token, &[], false)
        .and_then(|n| n.parse::<i32>().ok())
        .ok_or_else(|| number_error("Integer", token))
}

pub fn decode_long(token: &str) -> Result<i64, LiteralError> {
    number_part(token, &['l', 'L'], false)
        .and_then(|n| n.parse::<i64>().ok())
        .ok_or_else(|| number_error("Long", token))
}

pub fn decode_float(token: &str) -> Result<f32, LiteralError> {
    number_part(token, &['f', 'F'], true)
        .and_then(|n| n.parse::<f32>().ok())
        .filter(|f| f.is_finite())
        .ok_or_else(|| number_error("Float", token))
}

pub fn decode_double(token: &str) -> Result<f64, LiteralError> {
    number_part(token, &['d', 'D'], true)
        .and_then(|n| n.parse::<f64>().ok())
        .filter(|f| f.is_finite())
        .ok_or_else(|| number_error("Double", token))
}

/// Anything not in the accepted "true" set is `false`
pub fn decode_boolean(token: &str) -> bool {
    BOOLEAN_TRUE_VALUES.contains(&token)
}

/// Sizes are returned verbatim; byte-count normalization is left to consumers
pub fn decode_size(token: &str) -> String {
    token.to_string()
}

pub fn decode_duration(token: &str, form: DurationForm) -> Result<Period, LiteralError> {
    let parsed = match form {
        DurationForm::Simple => parse_simple_duration(token),
        DurationForm::Iso8601 => parse_iso_duration(token),
    };
    parsed.ok_or_else(|| LiteralError::Duration {
        text: token.to_string(),
    })
}

// =============================================================================
// INTERNAL HELPERS
// =============================================================================

fn number_error(kind: &'static str, token: &str) -> LiteralError {
    LiteralError::Number {
        kind,
        text: token.to_string(),
    }
}

/// `<digits>[.<digits>][ws][suffix]` -> the numeric part, or None if the
/// token does not have that shape
fn number_part<'a>(token: &'a str, suffixes: &[char], allow_fraction: bool) -> Option<&'a str> {
    let number = token
        .strip_suffix(|c: char| suffixes.contains(&c))
        .unwrap_or(token)
        .trim_end();

    let (whole, fraction) = match number.split_once('.') {
        Some((whole, fraction)) if allow_fraction => (whole, Some(fraction)),
        Some(_) => return None,
        None => (number, None),
    };
    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if all_digits(whole) && fraction.map_or(true, all_digits) {
        Some(number)
    } else {
        None
    }
}

/// `1 hour 30 minutes`: pairs in strictly increasing unit order
fn parse_simple_duration(token: &str) -> Option<Period> {
    let mut period = Period::default();
    let mut last: Option<PeriodField> = None;
    let mut words = token.split_whitespace();

    while let Some(amount) = words.next() {
        let amount: i64 = amount.parse().ok()?;
        let unit = words.next()?;
        let field = DURATION_UNITS
            .iter()
            .find(|(name, _)| *name == unit)
            .map(|(_, field)| *field)?;
        if last.is_some_and(|previous| field <= previous) {
            return None;
        }
        period.set(field, amount);
        last = Some(field);
    }

    last.map(|_| period)
}

/// `P[nY][nM][nD][T[nH][nM][n[.fff]S]]` with at least one component
fn parse_iso_duration(token: &str) -> Option<Period> {
    let rest = token.strip_prefix('P')?;
    let (date, time) = match rest.split_once('T') {
        Some((date, time)) => (date, Some(time)),
        None => (rest, None),
    };

    let mut period = Period::default();
    let mut components = 0;

    let mut date_part = date;
    for (suffix, field) in [
        ('Y', PeriodField::Years),
        ('M', PeriodField::Months),
        ('D', PeriodField::Days),
    ] {
        if let Some((amount, rest)) = take_component(date_part, suffix) {
            period.set(field, amount.parse().ok()?);
            date_part = rest;
            components += 1;
        }
    }
    if !date_part.is_empty() {
        return None;
    }

    if let Some(time) = time {
        let mut time_part = time;
        let mut time_components = 0;
        for (suffix, field) in [('H', PeriodField::Hours), ('M', PeriodField::Minutes)] {
            if let Some((amount, rest)) = take_component(time_part, suffix) {
                period.set(field, amount.parse().ok()?);
                time_part = rest;
                time_components += 1;
            }
        }
        if let Some((amount, rest)) = take_component(time_part, 'S') {
            let (seconds, millis) = split_seconds(amount)?;
            period.seconds = seconds;
            period.millis = millis;
            time_part = rest;
            time_components += 1;
        }
        if !time_part.is_empty() || time_components == 0 {
            return None;
        }
        components += time_components;
    }

    (components > 0).then_some(period)
}

/// Leading `<number><suffix>` of `input`, if present
fn take_component(input: &str, suffix: char) -> Option<(&str, &str)> {
    let end = input.find(|c: char| !(c.is_ascii_digit() || c == '.'))?;
    if end == 0 || !input[end..].starts_with(suffix) {
        return None;
    }
    Some((&input[..end], &input[end + suffix.len_utf8()..]))
}

/// `6.25` -> (6, 250); fractions beyond milliseconds are truncated
fn split_seconds(amount: &str) -> Option<(i64, i64)> {
    let (whole, fraction) = match amount.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (amount, ""),
    };
    let seconds = whole.parse().ok()?;
    if !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let mut millis_digits: String = fraction.chars().take(3).collect();
    if millis_digits.is_empty() {
        return Some((seconds, 0));
    }
    while millis_digits.len() < 3 {
        millis_digits.push('0');
    }
    Some((seconds, millis_digits.parse().ok()?))
}
