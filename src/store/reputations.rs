//! Typed view of the CrewChief `iracing_reputations.json` array.

use super::key::{self, DriverKey};
use super::overlay::duplicates;
use crate::error::SyncError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::path::Path;

/// Comment stamped on records created from iOverlay tags.
pub const ADDED_FROM_OVERLAY_COMMENT: &str = "Added from iOverlay";

/// One driver reputation entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReputationRecord {
    #[serde(serialize_with = "key::serialize_as_number")]
    pub customer_id: DriverKey,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(rename = "carClass", default, skip_serializing_if = "Option::is_none")]
    pub car_class: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ReputationRecord {
    /// A record mirrored from an iOverlay tag on `date`.
    #[must_use]
    pub fn from_overlay(customer_id: DriverKey, name: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            customer_id,
            name: name.into(),
            date: Some(date.format("%Y-%m-%d").to_string()),
            car_class: Some(String::new()),
            comment: Some(ADDED_FROM_OVERLAY_COMMENT.to_string()),
            extra: Map::new(),
        }
    }
}

/// The whole reputations array.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reputations {
    pub records: Vec<ReputationRecord>,
}

impl Reputations {
    /// Reads and validates the reputations file.
    ///
    /// # Errors
    ///
    /// Returns read/parse errors from [`super::read_json`] or a
    /// [`SyncError::Validation`] from [`Self::from_value`].
    pub fn load(path: &Path) -> Result<Self, SyncError> {
        Self::from_value(super::read_json(path)?)
    }

    /// Validates and parses a raw document.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Validation`] if the document is not an array of
    /// records with `customer_id` and `name`, or a field has the wrong type.
    pub fn from_value(document: Value) -> Result<Self, SyncError> {
        if !super::validate_source_b(&document) {
            return Err(SyncError::Validation(
                "CrewChief reputations must be a list of records with 'customer_id' and 'name'"
                    .to_string(),
            ));
        }
        let Value::Array(items) = document else {
            return Err(SyncError::Validation(
                "CrewChief reputations must be a list".to_string(),
            ));
        };

        let records = items
            .into_iter()
            .enumerate()
            .map(|(index, item)| {
                serde_json::from_value(item)
                    .map_err(|e| SyncError::Validation(format!("reputation[{index}]: {e}")))
            })
            .collect::<Result<_, _>>()?;
        Ok(Self { records })
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether there are no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Every customer id present.
    #[must_use]
    pub fn keys(&self) -> HashSet<&DriverKey> {
        self.records.iter().map(|r| &r.customer_id).collect()
    }

    /// Customer ids that occur more than once, in order of first repeat.
    #[must_use]
    pub fn duplicate_keys(&self) -> Vec<DriverKey> {
        duplicates(self.records.iter().map(|r| &r.customer_id))
    }

    /// Drops every record whose customer id already appeared earlier.
    /// Returns how many were removed.
    pub fn remove_duplicates(&mut self) -> usize {
        let before = self.records.len();
        let mut seen = HashSet::new();
        self.records
            .retain(|record| seen.insert(record.customer_id.clone()));
        before - self.records.len()
    }

    /// Atomically writes the array to `path`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Encode`] or [`SyncError::Io`].
    pub fn save(&self, path: &Path) -> Result<(), SyncError> {
        let value = serde_json::to_value(&self.records).map_err(|source| SyncError::Encode {
            path: path.to_path_buf(),
            source,
        })?;
        super::write_json(path, Some(&value))
    }
}
