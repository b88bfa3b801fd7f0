use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::row::ValueType;
use crate::sql::sql_common::strip_quotes;

/// A literal with its inferred type, produced by constant extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TypedValue {
    Str(String),
    Date(NaiveDateTime),
    Bool(bool),
    Int(i64),
    Num(f64),
    /// A numeric literal an f64 could not carry without losing precision,
    /// kept as its text for downstream conversion.
    BigNum(String),
}

impl TypedValue {
    pub fn value_type(&self) -> ValueType {
        match self {
            TypedValue::Str(_) => ValueType::String,
            TypedValue::Date(_) => ValueType::Date,
            TypedValue::Bool(_) => ValueType::Boolean,
            TypedValue::Int(_) => ValueType::Integer,
            TypedValue::Num(_) => ValueType::Number,
            TypedValue::BigNum(_) => ValueType::BigNumber,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            TypedValue::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypedValue::Str(s) => write!(f, "'{}'", s),
            TypedValue::Date(d) => write!(f, "[{}]", d.format("%Y/%m/%d %H:%M:%S%.3f")),
            TypedValue::Bool(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            TypedValue::Int(i) => write!(f, "{}", i),
            TypedValue::Num(n) => write!(f, "{}", n),
            TypedValue::BigNum(s) => write!(f, "{}", s),
        }
    }
}

/// Classify a raw token as a literal, trying date, quoted string, boolean,
/// integer, number and big number in that order. None means the token is not
/// a recognizable literal; callers then resolve it as a field name instead.
pub fn extract_constant(token: &str) -> Option<TypedValue> {
    let token = token.trim();
    if token.is_empty() {
        return None;
    }
    attempt_date(token)
        .or_else(|| attempt_string(token))
        .or_else(|| attempt_boolean(token))
        .or_else(|| attempt_integer(token))
        .or_else(|| attempt_number(token))
        .or_else(|| attempt_big_number(token))
}

// Date literals use the bracketed service form, e.g. [2024/01/15 10:30:00].
fn attempt_date(token: &str) -> Option<TypedValue> {
    if token.len() < 2 || !token.starts_with('[') || !token.ends_with(']') {
        return None;
    }
    let inner = &token[1..token.len() - 1];
    if let Ok(dt) = NaiveDateTime::parse_from_str(inner, "%Y/%m/%d %H:%M:%S%.f") {
        return Some(TypedValue::Date(dt));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(inner, "%Y/%m/%d %H:%M:%S") {
        return Some(TypedValue::Date(dt));
    }
    if let Ok(d) = NaiveDate::parse_from_str(inner, "%Y/%m/%d") {
        return d.and_hms_opt(0, 0, 0).map(TypedValue::Date);
    }
    None
}

fn attempt_string(token: &str) -> Option<TypedValue> {
    if token.len() >= 2 && token.starts_with('\'') && token.ends_with('\'') {
        let inner = strip_quotes(token, '\'');
        return Some(TypedValue::Str(inner.replace("''", "'")));
    }
    None
}

fn attempt_boolean(token: &str) -> Option<TypedValue> {
    if token.eq_ignore_ascii_case("TRUE") {
        return Some(TypedValue::Bool(true));
    }
    if token.eq_ignore_ascii_case("FALSE") {
        return Some(TypedValue::Bool(false));
    }
    None
}

fn attempt_integer(token: &str) -> Option<TypedValue> {
    token.parse::<i64>().ok().map(TypedValue::Int)
}

fn attempt_number(token: &str) -> Option<TypedValue> {
    let d: f64 = token.parse().ok()?;
    if !d.is_finite() {
        return None;
    }
    // Beyond 15 significant digits an f64 silently loses precision; such
    // literals fall through to the big-number form.
    if mantissa_digits(token) > 15 {
        return None;
    }
    Some(TypedValue::Num(d))
}

fn mantissa_digits(token: &str) -> usize {
    let mantissa = token.split(&['e', 'E'][..]).next().unwrap_or(token);
    let digits: Vec<u8> = mantissa.bytes().filter(|b| b.is_ascii_digit()).collect();
    let first_significant = digits.iter().position(|&b| b != b'0').unwrap_or(digits.len());
    digits.len() - first_significant
}

fn attempt_big_number(token: &str) -> Option<TypedValue> {
    if is_decimal_literal(token) {
        Some(TypedValue::BigNum(token.to_string()))
    } else {
        None
    }
}

fn is_decimal_literal(token: &str) -> bool {
    let bytes = token.as_bytes();
    let mut i = 0usize;
    if i < bytes.len() && (bytes[i] == b'+' || bytes[i] == b'-') {
        i += 1;
    }
    let mut digits = 0usize;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
        digits += 1;
    }
    if i < bytes.len() && bytes[i] == b'.' {
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
            digits += 1;
        }
    }
    if digits == 0 {
        return false;
    }
    if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
        i += 1;
        if i < bytes.len() && (bytes[i] == b'+' || bytes[i] == b'-') {
            i += 1;
        }
        let mut exp_digits = 0usize;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
            exp_digits += 1;
        }
        if exp_digits == 0 {
            return false;
        }
    }
    i == bytes.len()
}
