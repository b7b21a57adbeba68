//! Cottage domain model: static reference data about the rental units.
//!
//! The registry is built once at startup and shared read-only (behind an
//! `Arc`) by every session. All capacity figures pass through the
//! [`CapacityMap`], which enforces the per-unit hard maximum.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ConciergeError, Result};

/// Guests a unit hosts comfortably at the base price.
pub const BASE_CAPACITY: u32 = 6;

/// Absolute per-unit guest limit, regardless of bedroom count.
pub const HARD_MAX_CAPACITY: u32 = 9;

// =============================================================================
// CapacityMap
// =============================================================================

/// Comfortable vs. confirmation-required guest thresholds per unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapacityMap {
    /// Guests covered by the base price.
    pub base_capacity: u32,
    /// Guests allowed with confirmation and adjusted pricing.
    pub max_capacity: u32,
}

impl Default for CapacityMap {
    fn default() -> Self {
        Self {
            base_capacity: BASE_CAPACITY,
            max_capacity: HARD_MAX_CAPACITY,
        }
    }
}

/// Where a group size falls relative to a unit's thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OccupancyBand {
    /// At or below base capacity.
    Comfortable,
    /// Above base capacity, at or below the maximum.
    ConfirmationRequired,
    /// Above the maximum; needs more than one booking.
    OverCapacity,
}

impl CapacityMap {
    /// Build a map, clamping both thresholds to the hard maximum.
    pub fn new(base_capacity: u32, max_capacity: u32) -> Self {
        let max_capacity = max_capacity.min(HARD_MAX_CAPACITY);
        Self {
            base_capacity: base_capacity.min(max_capacity),
            max_capacity,
        }
    }

    /// Clamp a capacity figure taken from reference material.
    ///
    /// Larger figures (e.g. "10 guests" for three-bedroom units) are
    /// overridden by the configured maximum.
    pub fn effective_max(&self, figure: u32) -> u32 {
        let limit = self.max_capacity.min(HARD_MAX_CAPACITY);
        if figure > limit {
            debug!(figure, limit, "Capacity figure clamped to hard maximum");
        }
        figure.min(limit)
    }

    /// Classify a group size against the thresholds.
    pub fn classify(&self, group_size: u32) -> OccupancyBand {
        if group_size <= self.base_capacity {
            OccupancyBand::Comfortable
        } else if group_size <= self.max_capacity {
            OccupancyBand::ConfirmationRequired
        } else {
            OccupancyBand::OverCapacity
        }
    }

    /// Number of units needed to host `group_size` guests at maximum occupancy.
    pub fn units_needed(&self, group_size: u32) -> u32 {
        if self.max_capacity == 0 {
            return 0;
        }
        group_size.div_ceil(self.max_capacity)
    }
}

// =============================================================================
// CottageInfo
// =============================================================================

/// Immutable reference record for one cottage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CottageInfo {
    /// Identifier as guests refer to it ("9" for "cottage 9").
    pub number: String,
    pub bedrooms: u8,
    pub base_capacity: u32,
    pub max_capacity: u32,
    pub description: String,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub recommended: bool,
    /// Whether the cottage is listed when nobody asks for it by name.
    #[serde(default = "default_visible")]
    pub visible_by_default: bool,
}

fn default_visible() -> bool {
    true
}

impl CottageInfo {
    /// Human-readable name, e.g. "Cottage 9".
    pub fn display_name(&self) -> String {
        format!("Cottage {}", self.number)
    }
}

// =============================================================================
// CottageRegistry
// =============================================================================

/// Summary of the cottage inventory for "how many cottages" questions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventorySummary {
    pub total: usize,
    pub recommended: Vec<String>,
    pub visible: Vec<String>,
}

/// Read-only registry of known cottages.
#[derive(Debug, Clone)]
pub struct CottageRegistry {
    cottages: Vec<CottageInfo>,
    capacity: CapacityMap,
}

impl CottageRegistry {
    /// Build a registry from explicit records.
    ///
    /// Every record's capacity is normalized through `capacity`. Fails on
    /// an empty list, a blank identifier or a duplicate identifier.
    pub fn from_records(records: Vec<CottageInfo>, capacity: CapacityMap) -> Result<Self> {
        if records.is_empty() {
            return Err(ConciergeError::Registry(
                "at least one cottage is required".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        let mut cottages = Vec::with_capacity(records.len());
        for mut record in records {
            let number = record.number.trim().to_string();
            if number.is_empty() {
                return Err(ConciergeError::Registry(
                    "cottage number must not be empty".to_string(),
                ));
            }
            if !seen.insert(number.clone()) {
                return Err(ConciergeError::Registry(format!(
                    "duplicate cottage {}",
                    number
                )));
            }
            record.number = number;
            record.max_capacity = capacity.effective_max(record.max_capacity);
            record.base_capacity = record.base_capacity.min(record.max_capacity);
            cottages.push(record);
        }

        Ok(Self { cottages, capacity })
    }

    /// The built-in resort inventory.
    pub fn builtin(capacity: CapacityMap) -> Self {
        let cottages = builtin_cottages()
            .into_iter()
            .map(|mut c| {
                c.max_capacity = capacity.effective_max(c.max_capacity);
                c.base_capacity = c.base_capacity.min(capacity.base_capacity);
                c
            })
            .collect();
        Self { cottages, capacity }
    }

    pub fn capacity(&self) -> CapacityMap {
        self.capacity
    }

    pub fn get(&self, number: &str) -> Option<&CottageInfo> {
        let number = number.trim();
        self.cottages.iter().find(|c| c.number == number)
    }

    pub fn contains(&self, number: &str) -> bool {
        self.get(number).is_some()
    }

    pub fn numbers(&self) -> Vec<&str> {
        self.cottages.iter().map(|c| c.number.as_str()).collect()
    }

    pub fn all(&self) -> &[CottageInfo] {
        &self.cottages
    }

    pub fn recommended(&self) -> Vec<&CottageInfo> {
        self.cottages.iter().filter(|c| c.recommended).collect()
    }

    pub fn visible(&self) -> Vec<&CottageInfo> {
        self.cottages
            .iter()
            .filter(|c| c.visible_by_default)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.cottages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cottages.is_empty()
    }

    pub fn inventory(&self) -> InventorySummary {
        InventorySummary {
            total: self.cottages.len(),
            recommended: self
                .recommended()
                .iter()
                .map(|c| c.display_name())
                .collect(),
            visible: self.visible().iter().map(|c| c.display_name()).collect(),
        }
    }
}

impl Default for CottageRegistry {
    fn default() -> Self {
        Self::builtin(CapacityMap::default())
    }
}

/// Raw inventory as described in the property brochure.
///
/// Three-bedroom units are listed with 10 guests there; the registry
/// clamps that to the hard maximum.
fn builtin_cottages() -> Vec<CottageInfo> {
    let cottage = |number: &str,
                   bedrooms: u8,
                   max_capacity: u32,
                   description: &str,
                   features: &[&str],
                   recommended: bool,
                   visible: bool| CottageInfo {
        number: number.to_string(),
        bedrooms,
        base_capacity: BASE_CAPACITY,
        max_capacity,
        description: description.to_string(),
        features: features.iter().map(|f| f.to_string()).collect(),
        recommended,
        visible_by_default: visible,
    };

    vec![
        cottage(
            "3",
            2,
            9,
            "Garden cottage close to the main lawn and dining hall.",
            &["garden view", "sit-out", "attached bathrooms"],
            false,
            true,
        ),
        cottage(
            "5",
            2,
            9,
            "Quiet cottage at the edge of the orchard.",
            &["orchard view", "sit-out", "attached bathrooms"],
            false,
            true,
        ),
        cottage(
            "7",
            2,
            9,
            "Family cottage next to the children's play area.",
            &["play area access", "kitchenette", "attached bathrooms"],
            false,
            true,
        ),
        cottage(
            "9",
            3,
            10,
            "Spacious lake-facing cottage with a large private deck.",
            &["lake view", "private deck", "kitchenette", "bonfire pit"],
            true,
            true,
        ),
        cottage(
            "10",
            2,
            9,
            "Cottage near the staff quarters, opened during peak season.",
            &["attached bathrooms"],
            false,
            false,
        ),
        cottage(
            "11",
            3,
            10,
            "Hilltop cottage with a panoramic valley view and two decks.",
            &["valley view", "two decks", "kitchenette", "bonfire pit"],
            true,
            true,
        ),
        cottage(
            "12",
            2,
            9,
            "Compact cottage by the parking area, used for overflow groups.",
            &["parking access"],
            false,
            false,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(number: &str, max: u32) -> CottageInfo {
        CottageInfo {
            number: number.to_string(),
            bedrooms: 2,
            base_capacity: 6,
            max_capacity: max,
            description: "test".to_string(),
            features: vec![],
            recommended: false,
            visible_by_default: true,
        }
    }

    #[test]
    fn test_capacity_defaults() {
        let map = CapacityMap::default();
        assert_eq!(map.base_capacity, 6);
        assert_eq!(map.max_capacity, 9);
    }

    #[test]
    fn test_capacity_new_clamps_to_hard_maximum() {
        let map = CapacityMap::new(8, 12);
        assert_eq!(map.max_capacity, 9);
        assert_eq!(map.base_capacity, 8);

        let map = CapacityMap::new(11, 12);
        assert_eq!(map.base_capacity, 9);
    }

    #[test]
    fn test_effective_max_overrides_larger_figures() {
        let map = CapacityMap::default();
        assert_eq!(map.effective_max(10), 9);
        assert_eq!(map.effective_max(9), 9);
        assert_eq!(map.effective_max(4), 4);
    }

    #[test]
    fn test_classify_bands() {
        let map = CapacityMap::default();
        for g in 1..=6 {
            assert_eq!(map.classify(g), OccupancyBand::Comfortable, "g={}", g);
        }
        for g in 7..=9 {
            assert_eq!(map.classify(g), OccupancyBand::ConfirmationRequired, "g={}", g);
        }
        for g in 10..=30 {
            assert_eq!(map.classify(g), OccupancyBand::OverCapacity, "g={}", g);
        }
    }

    #[test]
    fn test_units_needed() {
        let map = CapacityMap::default();
        assert_eq!(map.units_needed(9), 1);
        assert_eq!(map.units_needed(10), 2);
        assert_eq!(map.units_needed(19), 3);
    }

    #[test]
    fn test_builtin_inventory() {
        let registry = CottageRegistry::default();
        let inventory = registry.inventory();
        assert_eq!(inventory.total, 7);
        assert_eq!(inventory.recommended, vec!["Cottage 9", "Cottage 11"]);
        assert_eq!(inventory.visible.len(), 5);
        assert!(!inventory.visible.contains(&"Cottage 12".to_string()));
    }

    #[test]
    fn test_builtin_three_bedroom_units_capped_at_nine() {
        let registry = CottageRegistry::default();
        let nine = registry.get("9").unwrap();
        assert_eq!(nine.bedrooms, 3);
        assert_eq!(nine.max_capacity, 9);
        assert!(registry.all().iter().all(|c| c.max_capacity <= 9));
    }

    #[test]
    fn test_lookup() {
        let registry = CottageRegistry::default();
        assert!(registry.contains("7"));
        assert!(registry.contains(" 11 "));
        assert!(!registry.contains("20"));
        assert_eq!(registry.get("7").unwrap().display_name(), "Cottage 7");
        assert_eq!(registry.numbers(), vec!["3", "5", "7", "9", "10", "11", "12"]);
    }

    #[test]
    fn test_from_records_normalizes_capacity() {
        let registry =
            CottageRegistry::from_records(vec![record("A", 12)], CapacityMap::default()).unwrap();
        assert_eq!(registry.get("A").unwrap().max_capacity, 9);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_from_records_rejects_duplicates() {
        let err = CottageRegistry::from_records(
            vec![record("1", 9), record("1", 9)],
            CapacityMap::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("duplicate cottage 1"));
    }

    #[test]
    fn test_from_records_rejects_empty() {
        assert!(CottageRegistry::from_records(vec![], CapacityMap::default()).is_err());
        let blank = vec![record("  ", 9)];
        assert!(CottageRegistry::from_records(blank, CapacityMap::default()).is_err());
    }

    #[test]
    fn test_cottage_info_deserializes_with_defaults() {
        let json = r#"{"number":"4","bedrooms":2,"base_capacity":6,"max_capacity":9,"description":"d"}"#;
        let info: CottageInfo = serde_json::from_str(json).unwrap();
        assert!(info.visible_by_default);
        assert!(!info.recommended);
        assert!(info.features.is_empty());
    }
}
