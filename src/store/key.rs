//! The cross-source driver key.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Shortest key length iRacing hands out.
pub const MIN_CANONICAL_DIGITS: usize = 5;
/// Longest key length iRacing hands out.
pub const MAX_CANONICAL_DIGITS: usize = 8;

/// A driver's iRacing customer id as a string of decimal digits.
///
/// iOverlay stores it as the string `identifier`, CrewChief as the integer
/// `customer_id`. Both deserialize into the same value so the two sides
/// compare as strings of digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DriverKey(String);

impl DriverKey {
    /// Parses a key from text, rejecting anything but ASCII digits.
    ///
    /// # Errors
    ///
    /// Returns a message describing why `raw` is not a key.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err("driver key is empty".to_string());
        }
        if !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(format!("driver key '{raw}' is not a decimal number"));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// The digits.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric value, if the key fits in a `u64` without losing leading zeros.
    #[must_use]
    pub fn as_u64(&self) -> Option<u64> {
        if self.0.len() > 1 && self.0.starts_with('0') {
            return None;
        }
        self.0.parse().ok()
    }

    /// Whether the key has the 5-8 digits of a real customer id.
    #[must_use]
    pub fn has_canonical_length(&self) -> bool {
        (MIN_CANONICAL_DIGITS..=MAX_CANONICAL_DIGITS).contains(&self.0.len())
    }
}

impl fmt::Display for DriverKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<u64> for DriverKey {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

impl Serialize for DriverKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

/// Serializes a key as a JSON integer, falling back to a string when the
/// digits do not survive the conversion.
///
/// # Errors
///
/// Propagates serializer errors.
pub fn serialize_as_number<S: Serializer>(key: &DriverKey, serializer: S) -> Result<S::Ok, S::Error> {
    match key.as_u64() {
        Some(n) => serializer.serialize_u64(n),
        None => serializer.serialize_str(key.as_str()),
    }
}

impl<'de> Deserialize<'de> for DriverKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(KeyVisitor)
    }
}

struct KeyVisitor;

impl Visitor<'_> for KeyVisitor {
    type Value = DriverKey;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a driver id as a string of digits or a non-negative integer")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<DriverKey, E> {
        Ok(DriverKey::from(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<DriverKey, E> {
        u64::try_from(v)
            .map(DriverKey::from)
            .map_err(|_| E::custom(format!("driver key {v} is negative")))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<DriverKey, E> {
        DriverKey::parse(v).map_err(E::custom)
    }
}
