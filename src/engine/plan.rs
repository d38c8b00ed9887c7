//! Pure planning and application steps of a synchronization.
//!
//! [`build_plan`] decides which drivers to add on each side without touching
//! any file; [`apply`] rebuilds both lists from a plan.

use crate::events::{EventSink, Source, SyncEvent};
use crate::store::reputations::ReputationRecord;
use crate::store::{DriverKey, DriverTag, OverlaySettings, Reputations};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};

/// Direction of a planned addition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PlanAction {
    /// A CrewChief driver missing from iOverlay
    AddToOverlay,
    /// An iOverlay driver missing from CrewChief
    AddToCrewChief,
}

/// One proposed addition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanItem {
    pub action: PlanAction,
    pub identifier: DriverKey,
    pub name: String,
}

impl PlanItem {
    /// Always "Add"; nothing is ever removed.
    #[must_use]
    pub const fn action_label(&self) -> &'static str {
        "Add"
    }

    /// Side the driver comes from.
    #[must_use]
    pub const fn source(&self) -> Source {
        match self.action {
            PlanAction::AddToOverlay => Source::CrewChief,
            PlanAction::AddToCrewChief => Source::Overlay,
        }
    }

    /// Side the driver is added to.
    #[must_use]
    pub const fn target(&self) -> Source {
        match self.action {
            PlanAction::AddToOverlay => Source::Overlay,
            PlanAction::AddToCrewChief => Source::CrewChief,
        }
    }

    /// Human-readable description, e.g. `Add driver 'Alice' to CrewChief`.
    #[must_use]
    pub fn details(&self) -> String {
        format!("Add driver '{}' to {}", self.name, self.target().label())
    }
}

/// Additions for both sides, each in source-file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncPlan {
    pub to_overlay: Vec<PlanItem>,
    pub to_crewchief: Vec<PlanItem>,
}

impl SyncPlan {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.to_overlay.is_empty() && self.to_crewchief.is_empty()
    }

    /// CrewChief-to-iOverlay items first, then iOverlay-to-CrewChief.
    pub fn items(&self) -> impl Iterator<Item = &PlanItem> {
        self.to_overlay.iter().chain(&self.to_crewchief)
    }

    /// Owned copy of [`Self::items`].
    #[must_use]
    pub fn into_items(self) -> Vec<PlanItem> {
        let mut items = self.to_overlay;
        items.extend(self.to_crewchief);
        items
    }
}

/// Computes which drivers each side is missing.
///
/// - A CrewChief record is planned for iOverlay when its key is not tagged
///   under an enabled category. Keys already tagged under a disabled
///   category are skipped and reported, so iOverlay never holds a key twice.
/// - An iOverlay driver in an enabled category is planned for CrewChief when
///   its key is not in CrewChief.
///
/// Each key is planned at most once per side.
pub fn build_plan(
    overlay: &OverlaySettings,
    reputations: &Reputations,
    enabled_tag_ids: &BTreeSet<i64>,
    events: &dyn EventSink,
) -> SyncPlan {
    let enabled_keys: HashSet<&DriverKey> = overlay
        .drivers
        .iter()
        .filter(|tag| enabled_tag_ids.contains(&tag.tag_id))
        .map(|tag| &tag.identifier)
        .collect();
    let all_overlay_keys: HashSet<&DriverKey> =
        overlay.drivers.iter().map(|tag| &tag.identifier).collect();
    let crewchief_keys = reputations.keys();

    let mut plan = SyncPlan::default();

    let mut planned: HashSet<&DriverKey> = HashSet::new();
    for record in &reputations.records {
        let key = &record.customer_id;
        if enabled_keys.contains(key) {
            continue;
        }
        if all_overlay_keys.contains(key) {
            events.emit(&SyncEvent::DuplicateSkipped {
                identifier: key.to_string(),
                target: Source::Overlay,
            });
            continue;
        }
        if planned.insert(key) {
            plan.to_overlay.push(PlanItem {
                action: PlanAction::AddToOverlay,
                identifier: key.clone(),
                name: record.name.clone(),
            });
        }
    }

    let mut planned: HashSet<&DriverKey> = HashSet::new();
    for tag in &overlay.drivers {
        if !enabled_tag_ids.contains(&tag.tag_id) || crewchief_keys.contains(&tag.identifier) {
            continue;
        }
        if planned.insert(&tag.identifier) {
            plan.to_crewchief.push(PlanItem {
                action: PlanAction::AddToCrewChief,
                identifier: tag.identifier.clone(),
                name: tag.name.clone(),
            });
        } else {
            events.emit(&SyncEvent::DuplicateSkipped {
                identifier: tag.identifier.to_string(),
                target: Source::CrewChief,
            });
        }
    }

    plan
}

/// Rebuilds both lists with the planned additions.
///
/// New iOverlay entries get ids counting up from the current maximum and are
/// filed under `reserved_category_id`; the final list is renumbered 1..N.
/// New CrewChief records are stamped with `today`.
pub fn apply(
    plan: &SyncPlan,
    overlay: &mut OverlaySettings,
    reputations: &mut Reputations,
    reserved_category_id: i64,
    today: NaiveDate,
) {
    let mut drivers = overlay.drivers.clone();
    let mut next_id = drivers.iter().map(|tag| tag.id).max().unwrap_or(0) + 1;
    for item in &plan.to_overlay {
        drivers.push(DriverTag::new(
            next_id,
            item.identifier.clone(),
            item.name.clone(),
            reserved_category_id,
        ));
        next_id += 1;
    }
    overlay.replace_drivers(drivers);

    reputations.records.extend(
        plan.to_crewchief
            .iter()
            .map(|item| ReputationRecord::from_overlay(item.identifier.clone(), item.name.clone(), today)),
    );
}
