//! Trust estimates for retrieval and generated answers.

use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

use concierge_core::config::ConfidenceConfig;
use serde::{Deserialize, Serialize};

use crate::backend::{call_with_timeout, GenerationBackend};
use crate::types::RetrievedDocument;

const COUNT_WEIGHT: f32 = 0.3;
const SIMILARITY_WEIGHT: f32 = 0.7;
const LEXICAL_WEIGHT: f32 = 0.6;
const BACKEND_WEIGHT: f32 = 0.4;

static STOPWORDS: &[&str] = &[
    "a", "an", "the", "is", "are", "was", "were", "be", "been", "am", "do", "does", "did", "i",
    "we", "you", "me", "my", "our", "your", "us", "it", "its", "this", "that", "these", "those",
    "of", "to", "in", "on", "at", "for", "with", "by", "from", "and", "or", "but", "if", "so",
    "what", "which", "who", "when", "where", "how", "why", "can", "could", "would", "should",
    "will", "shall", "may", "might", "there", "here", "any", "some", "about", "please", "tell",
    "know", "want", "like", "have", "has", "had", "get", "there's", "what's", "it's", "i'm",
];

static CANT_HELP_PHRASES: &[&str] = &[
    "can't help",
    "cannot help",
    "unable to help",
    "don't have information",
    "do not have information",
    "don't have that information",
    "no information",
    "i'm not sure",
    "i am not sure",
    "don't know",
];

/// Coarse band of a confidence value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLabel {
    Low,
    Medium,
    High,
}

impl fmt::Display for ConfidenceLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfidenceLabel::Low => f.write_str("low"),
            ConfidenceLabel::Medium => f.write_str("medium"),
            ConfidenceLabel::High => f.write_str("high"),
        }
    }
}

/// A confidence value in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceScore(f32);

impl ConfidenceScore {
    /// Clamp into [0, 1]; NaN becomes 0.
    pub fn new(value: f32) -> Self {
        if value.is_nan() {
            return Self(0.0);
        }
        Self(value.clamp(0.0, 1.0))
    }

    pub fn value(&self) -> f32 {
        self.0
    }

    pub fn label(&self) -> ConfidenceLabel {
        if self.0 < 0.4 {
            ConfidenceLabel::Low
        } else if self.0 < 0.7 {
            ConfidenceLabel::Medium
        } else {
            ConfidenceLabel::High
        }
    }
}

/// Non-stopword terms of `text`, lowercased and deduplicated in order.
pub fn keywords(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    text.to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .map(|w| w.trim_matches('\''))
        .filter(|w| !w.is_empty() && !STOPWORDS.contains(w))
        .filter(|w| seen.insert(w.to_string()))
        .map(str::to_string)
        .collect()
}

pub struct ConfidenceScorer {
    config: ConfidenceConfig,
}

impl Default for ConfidenceScorer {
    fn default() -> Self {
        Self::new(ConfidenceConfig::default())
    }
}

impl ConfidenceScorer {
    pub fn new(config: ConfidenceConfig) -> Self {
        Self { config }
    }

    /// Weighted document count plus mean similarity.
    ///
    /// Documents without a score are counted but do not affect the mean;
    /// when none carry a score the neutral similarity is used.
    pub fn retrieval_confidence(&self, documents: &[RetrievedDocument]) -> ConfidenceScore {
        let target = self.config.target_doc_count.max(1) as f32;
        let count_part = (documents.len() as f32 / target).min(1.0);

        let scores: Vec<f32> = documents.iter().filter_map(|d| d.score).collect();
        let similarity = if scores.is_empty() {
            self.config.neutral_similarity
        } else {
            scores.iter().sum::<f32>() / scores.len() as f32
        };

        ConfidenceScore::new(COUNT_WEIGHT * count_part + SIMILARITY_WEIGHT * similarity)
    }

    /// Fraction of query keywords present in the answer.
    ///
    /// Halved when the answer admits it cannot help. A query without
    /// keywords has nothing to miss and scores 1.
    pub fn answer_relevance(&self, query: &str, answer: &str) -> ConfidenceScore {
        let terms = keywords(query);
        if terms.is_empty() {
            return ConfidenceScore::new(1.0);
        }
        let answer_lower = answer.to_lowercase();
        let answer_terms: HashSet<&str> = answer_lower
            .split(|c: char| !(c.is_alphanumeric() || c == '\''))
            .map(|w| w.trim_matches('\''))
            .filter(|w| !w.is_empty())
            .collect();

        let present = terms.iter().filter(|t| answer_terms.contains(t.as_str())).count();
        let mut score = present as f32 / terms.len() as f32;
        if is_cant_help(&answer_lower) {
            score *= 0.5;
        }
        ConfidenceScore::new(score)
    }

    /// Lexical relevance, blended with a backend judgement for longer queries.
    pub async fn answer_relevance_with_backend(
        &self,
        query: &str,
        answer: &str,
        backend: Option<&dyn GenerationBackend>,
        timeout: Duration,
        max_tokens: usize,
    ) -> ConfidenceScore {
        let lexical = self.answer_relevance(query, answer);
        let Some(backend) = backend else {
            return lexical;
        };
        if keywords(query).len() <= self.config.backend_blend_min_keywords {
            return lexical;
        }

        let prompt = format!(
            "Rate from 0 to 1 how well the answer addresses the question. Reply with a number only.\n\
             Question: {}\nAnswer: {}\nScore:",
            query.trim(),
            answer.trim()
        );
        let judged = call_with_timeout(backend, &prompt, max_tokens, timeout, "relevance")
            .await
            .and_then(|reply| parse_score(&reply));
        match judged {
            Some(judged) => {
                ConfidenceScore::new(LEXICAL_WEIGHT * lexical.value() + BACKEND_WEIGHT * judged)
            }
            None => {
                tracing::debug!("Ignoring non-numeric relevance judgement");
                lexical
            }
        }
    }

    /// Fallback only when both retrieval and relevance are weak.
    pub fn should_fallback(&self, retrieval: ConfidenceScore, relevance: ConfidenceScore) -> bool {
        let threshold = self.config.fallback_threshold;
        retrieval.value() < threshold && relevance.value() < threshold
    }
}

fn is_cant_help(answer_lower: &str) -> bool {
    let normalized = answer_lower.replace('’', "'");
    CANT_HELP_PHRASES.iter().any(|p| normalized.contains(p))
}

fn parse_score(reply: &str) -> Option<f32> {
    let token = reply.split_whitespace().next()?;
    let value: f32 = token.trim_end_matches(['.', ',']).parse().ok()?;
    (value.is_finite() && (0.0..=1.0).contains(&value)).then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ScriptedBackend;

    fn docs(scores: &[Option<f32>]) -> Vec<RetrievedDocument> {
        scores
            .iter()
            .map(|s| {
                let d = RetrievedDocument::new("passage");
                match s {
                    Some(v) => d.with_score(*v),
                    None => d,
                }
            })
            .collect()
    }

    #[test]
    fn test_labels() {
        assert_eq!(ConfidenceScore::new(0.1).label(), ConfidenceLabel::Low);
        assert_eq!(ConfidenceScore::new(0.5).label(), ConfidenceLabel::Medium);
        assert_eq!(ConfidenceScore::new(0.7).label(), ConfidenceLabel::High);
    }

    #[test]
    fn test_score_is_clamped() {
        assert_eq!(ConfidenceScore::new(1.7).value(), 1.0);
        assert_eq!(ConfidenceScore::new(-0.2).value(), 0.0);
        assert_eq!(ConfidenceScore::new(f32::NAN).value(), 0.0);
    }

    #[test]
    fn test_retrieval_confidence_formula() {
        let scorer = ConfidenceScorer::default();
        let score = scorer.retrieval_confidence(&docs(&[Some(0.8), Some(0.6)]));
        let expected = 0.3 * (2.0 / 5.0) + 0.7 * 0.7;
        assert!((score.value() - expected).abs() < 1e-5);
    }

    #[test]
    fn test_retrieval_confidence_neutral_without_scores() {
        let scorer = ConfidenceScorer::default();
        let score = scorer.retrieval_confidence(&docs(&[None; 10]));
        assert!((score.value() - (0.3 + 0.7 * 0.5)).abs() < 1e-5);
        let empty = scorer.retrieval_confidence(&[]);
        assert!((empty.value() - 0.35).abs() < 1e-5);
    }

    #[test]
    fn test_retrieval_confidence_stays_in_range() {
        let scorer = ConfidenceScorer::default();
        for s in [-3.0f32, 0.0, 0.5, 1.0, 4.0] {
            let v = scorer.retrieval_confidence(&docs(&[Some(s); 7])).value();
            assert!((0.0..=1.0).contains(&v));
        }
    }

    #[test]
    fn test_answer_relevance_lexical() {
        let scorer = ConfidenceScorer::default();
        let score = scorer.answer_relevance(
            "is there parking near cottage 9",
            "Parking is free at every cottage.",
        );
        // Keywords: parking, near, cottage, 9 -> parking and cottage present.
        assert!((score.value() - 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_cant_help_halves_relevance() {
        let scorer = ConfidenceScorer::default();
        let score = scorer.answer_relevance("parking", "Sorry, I can't help with parking.");
        assert!((score.value() - 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_fallback_needs_both_scores_low() {
        let scorer = ConfidenceScorer::default();
        let low = ConfidenceScore::new(0.2);
        let high = ConfidenceScore::new(0.9);
        assert!(scorer.should_fallback(low, low));
        assert!(!scorer.should_fallback(low, high));
        assert!(!scorer.should_fallback(high, low));
        assert!(!scorer.should_fallback(ConfidenceScore::new(0.3), low));
    }

    #[test]
    fn test_keywords_drop_stopwords() {
        assert_eq!(keywords("What is the price of Cottage 9?"), vec!["price", "cottage", "9"]);
    }

    const BUDGET: Duration = Duration::from_millis(200);

    #[tokio::test]
    async fn test_backend_blend_for_long_queries() {
        let scorer = ConfidenceScorer::default();
        let backend = ScriptedBackend::replying("1.0");
        let query = "parking charges near lake cottage";
        let answer = "Parking is free.";
        let lexical = scorer.answer_relevance(query, answer).value();
        let blended = scorer
            .answer_relevance_with_backend(query, answer, Some(&backend), BUDGET, 4)
            .await;
        assert!((blended.value() - (0.6 * lexical + 0.4)).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_backend_skipped_for_short_queries() {
        let scorer = ConfidenceScorer::default();
        let backend = ScriptedBackend::replying("1.0");
        scorer
            .answer_relevance_with_backend("parking", "Parking is free.", Some(&backend), BUDGET, 4)
            .await;
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test]
    async fn test_non_numeric_judgement_is_ignored() {
        let scorer = ConfidenceScorer::default();
        let backend = ScriptedBackend::replying("very relevant");
        let query = "parking charges near lake cottage";
        let lexical = scorer.answer_relevance(query, "Parking is free.");
        let blended = scorer
            .answer_relevance_with_backend(query, "Parking is free.", Some(&backend), BUDGET, 4)
            .await;
        assert_eq!(blended, lexical);
    }
}
