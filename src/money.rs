use std::fmt;
use std::str::FromStr;

use bigdecimal::{BigDecimal, Zero};
use serde::de::{self, Visitor};
use serde::{Deserializer, Serializer};

/// Largest absolute amount a `NUMERIC(15,2)` column can hold is just below 10^13.
const MAX_INTEGER_DIGITS: u32 = 13;

/// Serialize an amount as a JSON number.
pub fn serialize<S>(value: &BigDecimal, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    // Going through the decimal text picks the f64 nearest to the stored value,
    // whose shortest representation is that same value for NUMERIC(15,2).
    let text = value.to_string();
    match text.parse::<f64>() {
        Ok(n) if n.is_finite() => serializer.serialize_f64(n),
        _ => serializer.serialize_str(&text),
    }
}

/// Deserialize an amount from a JSON number or a numeric string.
///
/// Numbers are parsed through their shortest decimal representation so that
/// `1200.5` arrives as exactly `1200.5` and not as the nearest binary fraction.
pub fn deserialize<'de, D>(deserializer: D) -> Result<BigDecimal, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_any(AmountVisitor)
}

struct AmountVisitor;

impl<'de> Visitor<'de> for AmountVisitor {
    type Value = BigDecimal;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a decimal amount")
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        Ok(BigDecimal::from(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        Ok(BigDecimal::from(v))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
        parse_decimal(&v.to_string()).ok_or_else(|| E::custom(format!("invalid amount {}", v)))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        parse_decimal(v).ok_or_else(|| E::custom(format!("invalid amount {:?}", v)))
    }
}

pub fn parse_decimal(raw: &str) -> Option<BigDecimal> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    BigDecimal::from_str(trimmed).ok()
}

/// Amount from a JSON number value, keeping its decimal text.
pub fn from_json_number(number: &serde_json::Number) -> Option<BigDecimal> {
    parse_decimal(&number.to_string())
}

/// Round to cents, half away from zero.
pub fn round_currency(value: &BigDecimal) -> BigDecimal {
    let half_cent = BigDecimal::from(5_i32) / BigDecimal::from(1000_i32);
    if value < &BigDecimal::zero() {
        -((-value.clone()) + half_cent).with_scale(2)
    } else {
        (value.clone() + half_cent).with_scale(2)
    }
}

pub fn has_at_most_two_decimals(value: &BigDecimal) -> bool {
    value.with_scale(2) == *value
}

pub fn fits_storage(value: &BigDecimal) -> bool {
    value.abs() < BigDecimal::from(10_i64.pow(MAX_INTEGER_DIGITS))
}

/// Validation messages for a user supplied amount, empty when valid.
pub fn amount_problems(value: &BigDecimal) -> Vec<String> {
    let mut problems = Vec::new();
    if value <= &BigDecimal::zero() {
        problems.push("Amount must be a positive number".to_string());
    }
    if !has_at_most_two_decimals(value) {
        problems.push("Amount must have at most 2 decimal places".to_string());
    }
    if !fits_storage(value) {
        problems.push("Amount is too large".to_string());
    }
    problems
}

pub mod option {
    use bigdecimal::BigDecimal;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<BigDecimal>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(v) => super::serialize(v, serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<BigDecimal>, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Wrapped(#[serde(deserialize_with = "super::deserialize")] BigDecimal);

        Ok(Option::<Wrapped>::deserialize(deserializer)?.map(|Wrapped(v)| v))
    }
}
