//! Typed view of the iOverlay `settings.dat` driver tagging module.

use super::key::DriverKey;
use crate::error::SyncError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::Path;

/// Name of the category CrewChief drivers are filed under.
pub const RESERVED_CATEGORY: &str = "CrewChief";

/// Colour given to the reserved category when it is created.
pub const RESERVED_CATEGORY_COLOR: &str = "#00FF00";

/// Message for documents without the driver tagging lists.
pub(crate) const STRUCTURE_MESSAGE: &str = "iOverlay settings must contain 'modules.drivertagging' with 'tagcategory' and 'drivertag' lists";

/// A named tag category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagCategory {
    pub id: i64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A tagged driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverTag {
    pub id: i64,
    pub identifier: DriverKey,
    pub name: String,
    #[serde(rename = "tagId")]
    pub tag_id: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DriverTag {
    /// A new entry with no extra fields.
    #[must_use]
    pub fn new(id: i64, identifier: DriverKey, name: impl Into<String>, tag_id: i64) -> Self {
        Self {
            id,
            identifier,
            name: name.into(),
            tag_id,
            extra: Map::new(),
        }
    }
}

/// Reassigns ids 1..N in list order.
#[must_use]
pub fn renumber(drivers: Vec<DriverTag>) -> Vec<DriverTag> {
    drivers
        .into_iter()
        .zip(1_i64..)
        .map(|(mut tag, id)| {
            tag.id = id;
            tag
        })
        .collect()
}

/// A whole `settings.dat` document with its driver tagging lists parsed.
///
/// Everything outside the two lists is kept in `document` and written back
/// verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlaySettings {
    document: Value,
    pub categories: Vec<TagCategory>,
    pub drivers: Vec<DriverTag>,
}

impl OverlaySettings {
    /// Reads and validates `settings.dat`.
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
    /// Checks the structure, every element's fields and types, that
    /// category ids and names are unique, and that every `tagId` names an
    /// existing category.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Validation`] describing the first problem found.
    pub fn from_value(document: Value) -> Result<Self, SyncError> {
        if !super::validate_source_a(&document) {
            return Err(SyncError::Validation(STRUCTURE_MESSAGE.to_string()));
        }
        let categories: Vec<TagCategory> = parse_list(&document, "tagcategory")?;
        let drivers: Vec<DriverTag> = parse_list(&document, "drivertag")?;

        let mut ids = HashSet::new();
        let mut names = HashSet::new();
        for category in &categories {
            if !ids.insert(category.id) {
                return Err(SyncError::Validation(format!(
                    "tagcategory id {} is used more than once",
                    category.id
                )));
            }
            if !names.insert(category.name.as_str()) {
                return Err(SyncError::Validation(format!(
                    "tagcategory name '{}' is used more than once",
                    category.name
                )));
            }
        }

        if let Some((index, tag)) = drivers
            .iter()
            .enumerate()
            .find(|(_, tag)| !ids.contains(&tag.tag_id))
        {
            return Err(SyncError::Validation(format!(
                "drivertag[{index}] ('{}', {}) references unknown tagId {}",
                tag.name, tag.identifier, tag.tag_id
            )));
        }

        Ok(Self {
            document,
            categories,
            drivers,
        })
    }

    /// Adds the reserved category if missing and returns the id it was
    /// given, or `None` if it already existed.
    pub fn ensure_reserved_category(&mut self) -> Option<i64> {
        if self.reserved_category_id().is_some() {
            return None;
        }
        let id = self.categories.iter().map(|c| c.id).max().unwrap_or(0) + 1;
        self.categories.push(TagCategory {
            id,
            name: RESERVED_CATEGORY.to_string(),
            color: Some(RESERVED_CATEGORY_COLOR.to_string()),
            extra: Map::new(),
        });
        Some(id)
    }

    /// Id of the reserved category.
    #[must_use]
    pub fn reserved_category_id(&self) -> Option<i64> {
        self.category_id(RESERVED_CATEGORY)
    }

    /// Id of the category called `name`.
    #[must_use]
    pub fn category_id(&self, name: &str) -> Option<i64> {
        self.categories
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.id)
    }

    /// Ids of categories enabled in `enabled`. Names missing from the map
    /// are disabled.
    #[must_use]
    pub fn enabled_tag_ids(&self, enabled: &BTreeMap<String, bool>) -> BTreeSet<i64> {
        self.categories
            .iter()
            .filter(|c| enabled.get(&c.name).copied().unwrap_or(false))
            .map(|c| c.id)
            .collect()
    }

    /// Every category paired with its enabled flag, in document order.
    #[must_use]
    pub fn category_status<'a>(
        &'a self,
        enabled: &BTreeMap<String, bool>,
    ) -> Vec<(&'a TagCategory, bool)> {
        self.categories
            .iter()
            .map(|c| (c, enabled.get(&c.name).copied().unwrap_or(false)))
            .collect()
    }

    /// Number of drivers per category id.
    #[must_use]
    pub fn drivers_per_category(&self) -> HashMap<i64, usize> {
        let mut counts = HashMap::new();
        for tag in &self.drivers {
            *counts.entry(tag.tag_id).or_insert(0) += 1;
        }
        counts
    }

    /// Identifiers that occur more than once, in order of first repeat.
    #[must_use]
    pub fn duplicate_identifiers(&self) -> Vec<DriverKey> {
        duplicates(self.drivers.iter().map(|tag| &tag.identifier))
    }

    /// Drops every driver whose identifier already appeared earlier in the
    /// list. Returns how many were removed.
    pub fn remove_duplicates(&mut self) -> usize {
        let before = self.drivers.len();
        let mut seen = HashSet::new();
        let kept = std::mem::take(&mut self.drivers)
            .into_iter()
            .filter(|tag| seen.insert(tag.identifier.clone()))
            .collect();
        self.replace_drivers(kept);
        before - self.drivers.len()
    }

    /// Replaces the driver list, renumbering ids 1..N.
    pub fn replace_drivers(&mut self, drivers: Vec<DriverTag>) {
        self.drivers = renumber(drivers);
    }

    /// The full document with both lists written back.
    ///
    /// # Errors
    ///
    /// Returns the serializer error if a record cannot be encoded.
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        let mut document = self.document.clone();
        let categories = serde_json::to_value(&self.categories)?;
        let drivers = serde_json::to_value(&self.drivers)?;
        if let Some(tagging) = document
            .pointer_mut("/modules/drivertagging")
            .and_then(Value::as_object_mut)
        {
            tagging.insert("tagcategory".to_string(), categories);
            tagging.insert("drivertag".to_string(), drivers);
        }
        Ok(document)
    }

    /// Atomically writes the document to `path`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Encode`] or [`SyncError::Io`].
    pub fn save(&self, path: &Path) -> Result<(), SyncError> {
        let value = self.to_value().map_err(|source| SyncError::Encode {
            path: path.to_path_buf(),
            source,
        })?;
        super::write_json(path, Some(&value))
    }
}

/// Parses `modules.drivertagging.<list>` element by element so errors name
/// the offending index.
fn parse_list<T: serde::de::DeserializeOwned>(
    document: &Value,
    list: &str,
) -> Result<Vec<T>, SyncError> {
    let items = document
        .pointer(&format!("/modules/drivertagging/{list}"))
        .and_then(Value::as_array)
        .ok_or_else(|| SyncError::Validation(STRUCTURE_MESSAGE.to_string()))?;

    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            T::deserialize(item)
                .map_err(|e| SyncError::Validation(format!("{list}[{index}]: {e}")))
        })
        .collect()
}

/// Keys that occur more than once, in order of first repeat.
pub(crate) fn duplicates<'a>(keys: impl Iterator<Item = &'a DriverKey>) -> Vec<DriverKey> {
    let mut seen = HashSet::new();
    let mut reported = HashSet::new();
    let mut out = Vec::new();
    for key in keys {
        if !seen.insert(key) && reported.insert(key) {
            out.push(key.clone());
        }
    }
    out
}
