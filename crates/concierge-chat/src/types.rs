//! Shared per-turn types for the decision pipeline.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// =============================================================================
// Intent
// =============================================================================

/// Coarse category of a guest utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Greeting,
    Pricing,
    Availability,
    Rooms,
    Capacity,
    Booking,
    Location,
    Safety,
    Facilities,
    Policies,
    Activities,
    Help,
    Statement,
    Affirmative,
    Negative,
    Unknown,
}

impl Intent {
    pub const ALL: [Intent; 16] = [
        Intent::Greeting,
        Intent::Pricing,
        Intent::Availability,
        Intent::Rooms,
        Intent::Capacity,
        Intent::Booking,
        Intent::Location,
        Intent::Safety,
        Intent::Facilities,
        Intent::Policies,
        Intent::Activities,
        Intent::Help,
        Intent::Statement,
        Intent::Affirmative,
        Intent::Negative,
        Intent::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Greeting => "greeting",
            Intent::Pricing => "pricing",
            Intent::Availability => "availability",
            Intent::Rooms => "rooms",
            Intent::Capacity => "capacity",
            Intent::Booking => "booking",
            Intent::Location => "location",
            Intent::Safety => "safety",
            Intent::Facilities => "facilities",
            Intent::Policies => "policies",
            Intent::Activities => "activities",
            Intent::Help => "help",
            Intent::Statement => "statement",
            Intent::Affirmative => "affirmative",
            Intent::Negative => "negative",
            Intent::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Intent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_lowercase();
        Intent::ALL
            .iter()
            .copied()
            .find(|i| i.as_str() == needle)
            .ok_or_else(|| format!("unknown intent: {}", s))
    }
}

// =============================================================================
// Complexity
// =============================================================================

/// Handling tier chosen for an utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    Simple,
    Reasoning,
}

impl fmt::Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Complexity::Simple => f.write_str("simple"),
            Complexity::Reasoning => f.write_str("reasoning"),
        }
    }
}

// =============================================================================
// Retrieved documents
// =============================================================================

/// Metadata key marking a synthesized analysis passage.
pub const SOURCE_KEY: &str = "source";
/// Source value for deterministic analysis passages.
pub const STRUCTURED_ANALYSIS_SOURCE: &str = "structured_analysis";

/// A passage handed to synthesis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedDocument {
    pub content: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    /// Similarity reported by the retriever, if any.
    #[serde(default)]
    pub score: Option<f32>,
}

impl RetrievedDocument {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: HashMap::new(),
            score: None,
        }
    }

    pub fn with_score(mut self, score: f32) -> Self {
        self.score = Some(score);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// A deterministic explanation injected ahead of retrieved passages.
    pub fn structured_analysis(kind: &str, content: impl Into<String>) -> Self {
        Self::new(content)
            .with_metadata(SOURCE_KEY, STRUCTURED_ANALYSIS_SOURCE)
            .with_metadata("analysis", kind)
    }

    pub fn is_structured_analysis(&self) -> bool {
        self.metadata.get(SOURCE_KEY).map(String::as_str) == Some(STRUCTURED_ANALYSIS_SOURCE)
    }
}

/// Put an analysis passage at the head of the list.
///
/// Analysis documents always go first so synthesis is grounded in them
/// before any retrieved text.
pub fn prepend_analysis(documents: &mut Vec<RetrievedDocument>, analysis: RetrievedDocument) {
    documents.insert(0, analysis);
}

// =============================================================================
// Turn outcome
// =============================================================================

/// Which path produced the final answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    /// Answered by deterministic rules, no generation.
    Deterministic,
    /// Generated from retrieved passages.
    Grounded,
    /// Generated answer replaced by a canned fallback.
    Fallback,
    /// Nothing to ground an answer in.
    Refused,
}

/// Everything a caller needs from one processed turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnOutcome {
    pub session_id: String,
    pub turn_index: usize,
    pub answer: String,
    pub intent: Intent,
    pub complexity: Complexity,
    pub route: Route,
    /// The question actually answered when a refinement rewrote it.
    pub refined_question: Option<String>,
    pub retrieval_confidence: Option<f32>,
    pub answer_relevance: Option<f32>,
    pub sentiment: crate::sentiment::Sentiment,
    pub escalate: bool,
    /// Customer-journey stage after this turn.
    pub stage: crate::state::ConversationState,
    pub suggestions: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intent_round_trips_through_str() {
        for intent in Intent::ALL {
            assert_eq!(intent.as_str().parse::<Intent>().unwrap(), intent);
        }
    }

    #[test]
    fn test_intent_parse_is_lenient_on_case_and_space() {
        assert_eq!(" Pricing ".parse::<Intent>().unwrap(), Intent::Pricing);
        assert!("discount".parse::<Intent>().is_err());
    }

    #[test]
    fn test_intent_serde_snake_case() {
        let json = serde_json::to_string(&Intent::Affirmative).unwrap();
        assert_eq!(json, "\"affirmative\"");
    }

    #[test]
    fn test_prepend_analysis_goes_first() {
        let mut docs = vec![
            RetrievedDocument::new("Cottage 9 faces the lake."),
            RetrievedDocument::new("Check-in is at noon."),
        ];
        prepend_analysis(
            &mut docs,
            RetrievedDocument::structured_analysis("capacity", "8 guests fit with confirmation."),
        );
        assert_eq!(docs.len(), 3);
        assert!(docs[0].is_structured_analysis());
        assert!(!docs[1].is_structured_analysis());
        assert_eq!(docs[0].metadata.get("analysis").unwrap(), "capacity");
    }

    #[test]
    fn test_document_builders() {
        let doc = RetrievedDocument::new("text")
            .with_score(0.8)
            .with_metadata("file", "faq.md");
        assert_eq!(doc.score, Some(0.8));
        assert_eq!(doc.metadata.get("file").unwrap(), "faq.md");
    }
}
