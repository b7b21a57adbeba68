//! Deterministic occupancy reasoning.
//!
//! Every unit hosts up to the base capacity at the base price and up to
//! the hard maximum with confirmation. Larger groups need more than one
//! booking. No generation is involved.

use std::fmt;
use std::sync::Arc;

use concierge_core::{CapacityMap, CottageInfo, CottageRegistry, OccupancyBand};
use serde::{Deserialize, Serialize};

use crate::entity::{strip_cottage_reference, EntityExtractor, ExtractedEntities};
use crate::types::RetrievedDocument;

/// Outcome category of a capacity check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapacityVerdict {
    /// Not enough information to decide.
    Indeterminate,
    /// Fits at the base price.
    SuitableBasePrice,
    /// Fits with confirmation and adjusted pricing.
    ConfirmationRequired,
    /// Exceeds the per-unit maximum.
    NotSuitable,
}

impl CapacityVerdict {
    fn from_band(band: OccupancyBand) -> Self {
        match band {
            OccupancyBand::Comfortable => CapacityVerdict::SuitableBasePrice,
            OccupancyBand::ConfirmationRequired => CapacityVerdict::ConfirmationRequired,
            OccupancyBand::OverCapacity => CapacityVerdict::NotSuitable,
        }
    }

    pub fn suitable(&self) -> Option<bool> {
        match self {
            CapacityVerdict::Indeterminate => None,
            CapacityVerdict::SuitableBasePrice | CapacityVerdict::ConfirmationRequired => {
                Some(true)
            }
            CapacityVerdict::NotSuitable => Some(false),
        }
    }
}

impl fmt::Display for CapacityVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CapacityVerdict::Indeterminate => "insufficient information",
            CapacityVerdict::SuitableBasePrice => "suitable at base price",
            CapacityVerdict::ConfirmationRequired => "suitable with confirmation required",
            CapacityVerdict::NotSuitable => "not suitable",
        };
        f.write_str(s)
    }
}

/// Result of one capacity check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapacityResult {
    pub group_size: Option<u32>,
    pub cottage_id: Option<String>,
    /// `None` when the check could not decide.
    pub suitable: Option<bool>,
    pub verdict: CapacityVerdict,
    pub reason: String,
    /// Text handed to synthesis as a structured-analysis passage.
    pub explanation: String,
    pub complete: bool,
}

impl CapacityResult {
    fn indeterminate(
        group_size: Option<u32>,
        cottage_id: Option<String>,
        reason: &str,
        explanation: String,
    ) -> Self {
        Self {
            group_size,
            cottage_id,
            suitable: None,
            verdict: CapacityVerdict::Indeterminate,
            reason: reason.to_string(),
            explanation,
            complete: false,
        }
    }

    fn decided(
        group_size: u32,
        cottage_id: Option<String>,
        verdict: CapacityVerdict,
        explanation: String,
    ) -> Self {
        Self {
            group_size: Some(group_size),
            cottage_id,
            suitable: verdict.suitable(),
            verdict,
            reason: verdict.to_string(),
            explanation,
            complete: true,
        }
    }

    /// Analysis passage for synthesis, if there is anything to say.
    pub fn to_document(&self) -> Option<RetrievedDocument> {
        if self.explanation.is_empty() {
            return None;
        }
        let mut doc = RetrievedDocument::structured_analysis("capacity", self.explanation.clone())
            .with_metadata("verdict", self.verdict.to_string());
        if let Some(id) = &self.cottage_id {
            doc = doc.with_metadata("cottage", id.clone());
        }
        Some(doc)
    }
}

/// Capacity reasoner over the shared registry.
pub struct CapacityReasoner {
    registry: Arc<CottageRegistry>,
    extractor: EntityExtractor,
}

impl CapacityReasoner {
    pub fn new(registry: Arc<CottageRegistry>) -> Self {
        let extractor = EntityExtractor::new(Arc::clone(&registry));
        Self { registry, extractor }
    }

    fn capacity(&self) -> CapacityMap {
        self.registry.capacity()
    }

    /// Extract entities from `utterance` and analyze them.
    pub fn analyze(&self, utterance: &str) -> CapacityResult {
        let entities = self.extractor.extract(utterance);
        self.analyze_entities(utterance, &entities)
    }

    /// Analyze already-extracted entities.
    ///
    /// `utterance` is only used to re-run extraction when the cottage
    /// reference is unknown.
    pub fn analyze_entities(
        &self,
        utterance: &str,
        entities: &ExtractedEntities,
    ) -> CapacityResult {
        match (entities.group_size, entities.cottage_number.as_deref()) {
            (Some(size), Some(id)) => match self.registry.get(id) {
                Some(info) => self.compare(size, info),
                None => self.size_only(size),
            },
            (Some(size), None) => match &entities.unknown_cottage {
                Some(unknown) => self.retry_without_cottage(utterance, unknown, size),
                None => self.size_only(size),
            },
            (None, Some(id)) => match self.registry.get(id) {
                Some(info) => self.cottage_only(info),
                None => self.unknown_cottage(id),
            },
            (None, None) => match &entities.unknown_cottage {
                Some(unknown) => self.unknown_cottage(unknown),
                None => CapacityResult::indeterminate(
                    None,
                    None,
                    "insufficient information",
                    String::new(),
                ),
            },
        }
    }

    fn retry_without_cottage(&self, utterance: &str, unknown: &str, size: u32) -> CapacityResult {
        let stripped = strip_cottage_reference(utterance, unknown);
        tracing::debug!(
            cottage = unknown,
            rewritten = %stripped,
            "Unknown cottage, retrying as group-size query"
        );
        let entities = self.extractor.extract(&stripped);
        if entities.unknown_cottage.is_some() || entities.group_size.is_none() {
            // Stripping did not remove the reference or lost the group; decide on size alone.
            return self.size_only(size);
        }
        self.analyze_entities(&stripped, &entities)
    }

    fn cottage_only(&self, info: &CottageInfo) -> CapacityResult {
        let (base, max) = self.thresholds(info);
        let explanation = format!(
            "{} has {} bedroom{} and hosts up to {} guests at the base price, or up to {} guests with confirmation and adjusted pricing. How many guests will be staying?",
            info.display_name(),
            info.bedrooms,
            if info.bedrooms == 1 { "" } else { "s" },
            base,
            max
        );
        CapacityResult::indeterminate(
            None,
            Some(info.number.clone()),
            "group size not provided",
            explanation,
        )
    }

    fn unknown_cottage(&self, id: &str) -> CapacityResult {
        let known: Vec<String> = self.registry.visible().iter().map(|c| c.display_name()).collect();
        let explanation = format!(
            "We do not have a cottage {}. Our cottages are: {}.",
            id,
            known.join(", ")
        );
        CapacityResult::indeterminate(None, None, "unknown cottage", explanation)
    }

    fn size_only(&self, size: u32) -> CapacityResult {
        let map = self.capacity();
        let band = map.classify(size);
        let headline = match band {
            OccupancyBand::Comfortable => format!(
                "Yes. A group of {} fits comfortably in any of our cottages at the base price (up to {} guests per cottage).",
                size, map.base_capacity
            ),
            OccupancyBand::ConfirmationRequired => format!(
                "Yes, with confirmation. A group of {} is above the base capacity of {} guests, so any cottage can host you with confirmation and adjusted pricing (maximum {} guests per cottage).",
                size, map.base_capacity, map.max_capacity
            ),
            OccupancyBand::OverCapacity => format!(
                "No. A group of {} exceeds the maximum of {} guests per cottage. You would need {} cottages, booked as separate reservations.",
                size,
                map.max_capacity,
                map.units_needed(size)
            ),
        };
        let explanation = format!("{}\n{}", headline, self.recommendation_line());
        CapacityResult::decided(size, None, CapacityVerdict::from_band(band), explanation)
    }

    fn compare(&self, size: u32, info: &CottageInfo) -> CapacityResult {
        let (base, max) = self.thresholds(info);
        let band = CapacityMap::new(base, max).classify(size);
        let verdict = CapacityVerdict::from_band(band);
        let name = info.display_name();
        let comparison = match band {
            OccupancyBand::Comfortable => {
                format!("{} ≤ {}: fits comfortably at the base price.", size, base)
            }
            OccupancyBand::ConfirmationRequired => format!(
                "{} > {} and {} ≤ {}: fits with confirmation and adjusted pricing.",
                size, base, size, max
            ),
            OccupancyBand::OverCapacity => format!(
                "{} > {}: exceeds the maximum. A group this size needs {} cottages.",
                size,
                max,
                self.capacity().units_needed(size)
            ),
        };
        let explanation = format!(
            "Group of {} in {}: base capacity {}, maximum {}.\n{}\nVerdict: {}.",
            size, name, base, max, comparison, verdict
        );
        CapacityResult::decided(size, Some(info.number.clone()), verdict, explanation)
    }

    fn thresholds(&self, info: &CottageInfo) -> (u32, u32) {
        let max = self.capacity().effective_max(info.max_capacity);
        (info.base_capacity.min(max), max)
    }

    fn recommendation_line(&self) -> String {
        let names: Vec<String> = self
            .registry
            .recommended()
            .iter()
            .map(|c| c.display_name())
            .collect();
        if names.is_empty() {
            "All of our cottages share the same occupancy limits.".to_string()
        } else {
            format!("We recommend {}.", names.join(" or "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reasoner() -> CapacityReasoner {
        CapacityReasoner::new(Arc::new(CottageRegistry::default()))
    }

    #[test]
    fn test_group_in_known_cottage_needs_confirmation() {
        let result = reasoner().analyze("can 8 people stay in cottage 9");
        assert_eq!(result.group_size, Some(8));
        assert_eq!(result.cottage_id.as_deref(), Some("9"));
        assert_eq!(result.verdict, CapacityVerdict::ConfirmationRequired);
        assert_eq!(result.suitable, Some(true));
        assert!(result.complete);
        assert!(result.explanation.contains("8 > 6 and 8 ≤ 9"));
    }

    #[test]
    fn test_threshold_bands_for_every_size() {
        let r = reasoner();
        for g in 1..=20u32 {
            let result = r.analyze(&format!("we are {} people", g));
            let expected = if g <= 6 {
                CapacityVerdict::SuitableBasePrice
            } else if g <= 9 {
                CapacityVerdict::ConfirmationRequired
            } else {
                CapacityVerdict::NotSuitable
            };
            assert_eq!(result.verdict, expected, "group of {}", g);
            assert_eq!(result.suitable, Some(g <= 9));
        }
    }

    #[test]
    fn test_unknown_cottage_is_reinterpreted_as_group_query() {
        let result = reasoner().analyze("cottage 20 for 4 people");
        assert_eq!(result.group_size, Some(4));
        assert_eq!(result.cottage_id, None);
        assert_eq!(result.verdict, CapacityVerdict::SuitableBasePrice);
        assert!(result.explanation.contains("any of our cottages"));
    }

    #[test]
    fn test_neither_entity_is_indeterminate() {
        let result = reasoner().analyze("is it spacious");
        assert_eq!(result.verdict, CapacityVerdict::Indeterminate);
        assert_eq!(result.suitable, None);
        assert_eq!(result.reason, "insufficient information");
        assert!(result.explanation.is_empty());
        assert!(result.to_document().is_none());
        assert!(!result.complete);
    }

    #[test]
    fn test_cottage_without_group_asks_for_size() {
        let result = reasoner().analyze("how big is cottage 11");
        assert_eq!(result.cottage_id.as_deref(), Some("11"));
        assert_eq!(result.suitable, None);
        assert!(result.explanation.contains("How many guests"));
        let doc = result.to_document().unwrap();
        assert!(doc.is_structured_analysis());
        assert_eq!(doc.metadata.get("cottage").unwrap(), "11");
    }

    #[test]
    fn test_over_capacity_in_known_cottage() {
        let result = reasoner().analyze("can 12 guests stay in cottage 7");
        assert_eq!(result.verdict, CapacityVerdict::NotSuitable);
        assert_eq!(result.suitable, Some(false));
        assert!(result.explanation.contains("needs 2 cottages"));
    }

    #[test]
    fn test_large_reference_figure_is_clamped() {
        let record = CottageInfo {
            number: "3".to_string(),
            bedrooms: 3,
            base_capacity: 6,
            max_capacity: 10,
            description: "Three-bedroom cottage".to_string(),
            features: vec![],
            recommended: false,
            visible_by_default: true,
        };
        let registry =
            Arc::new(CottageRegistry::from_records(vec![record], CapacityMap::default()).unwrap());
        let result = CapacityReasoner::new(registry).analyze("can 10 people stay in cottage 3");
        assert_eq!(result.verdict, CapacityVerdict::NotSuitable);
    }

    #[test]
    fn test_size_only_recommends_flagged_cottages() {
        let result = reasoner().analyze("we are 5 adults");
        assert!(result.explanation.contains("Cottage 9 or Cottage 11"));
    }
}
