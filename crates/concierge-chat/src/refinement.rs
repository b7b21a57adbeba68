//! Short constraint follow-ups ("just weekdays", "for 4 people").
//!
//! A refinement only makes sense merged with the previous question. The
//! detector decides whether an utterance is one; the combiner folds its
//! constraint into the previous question.

use std::fmt;
use std::sync::LazyLock;
use std::time::Duration;

use concierge_core::config::RefinementConfig;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::backend::{call_with_timeout, GenerationBackend};
use crate::confidence::keywords;
use crate::entity::parse_number;
use crate::history::{question_from_line, ChatHistory};

static TOPIC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:price|prices|pricing|cost|costs|rate|rates|tariff|charges?|how\s+much|book|booking|reserve|reservation|capacity|accommodate|people|guests|persons|stay|sleep|fit)\b",
    )
    .unwrap()
});

static GENERIC_CONSTRAINT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:only|just|without|with|including|excluding|except|instead|also|extra|plus|included)\b",
    )
    .unwrap()
});

static TIME_PERIOD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:weekdays?|weekends?|week|month|tonight|tomorrow|monday|tuesday|wednesday|thursday|friday|saturday|sunday|january|february|march|april|june|july|august|september|october|november|december|holidays?|season|peak|off-season|diwali|christmas|new\s+year)\b",
    )
    .unwrap()
});

static QUANTITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(\d+|one|two|three|four|five|six|seven|eight|nine|ten|eleven|twelve|thirteen|fourteen|fifteen|sixteen|seventeen|eighteen|nineteen|twenty)\s+(people|guests?|persons?|adults?|pax|members?|nights?|days?)\b",
    )
    .unwrap()
});

static PRICE_COMPARATOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:cheaper|cheapest|less\s+expensive|more\s+expensive|lower|higher|under|below|above|within|less\s+than|more\s+than|max(?:imum)?|budget|affordable)\b(?:\s+(?:of\s+)?(?:rs\.?\s*|inr\s*|₹\s*)?\d[\d,]*)?",
    )
    .unwrap()
});

static ANCHORED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*(?:(?:and\s+)?(?:what|how)\s+about\s+)?(?:just\s+|only\s+)?(?:for\s+(?:\d+|one|two|three|four|five|six|seven|eight|nine|ten|a\s+week|the\s+weekend|weekdays?|weekends?)|on\s+(?:weekdays?|weekends?|monday|tuesday|wednesday|thursday|friday|saturday|sunday)|during|over\s+the|this\s+(?:weekend|week|month)|next\s+(?:weekend|week|month)|in\s+(?:january|february|march|april|may|june|july|august|september|october|november|december)|under|below|above|within|less\s+than|more\s+than|weekdays?|weekends?|tonight|tomorrow|\d+\s+(?:people|guests|persons|adults|pax|nights?|days?))\b",
    )
    .unwrap()
});

static RESTRICTIVE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:just|only)\b").unwrap());

/// Time phrases recognized in both utterance and previous question.
/// Each pattern maps to a canonical phrase.
static TIME_PHRASES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"(?i)\bthis\s+weekend\b", "this weekend"),
        (r"(?i)\bnext\s+weekend\b", "next weekend"),
        (r"(?i)\bnext\s+week\b", "next week"),
        (r"(?i)\bnext\s+month\b", "next month"),
        (r"(?i)\bweekdays?\b", "on weekdays"),
        (r"(?i)\bweekends?\b", "on weekends"),
        (r"(?i)\btonight\b", "tonight"),
        (r"(?i)\btomorrow\b", "tomorrow"),
        (
            r"(?i)\b(?:peak\s+season|holidays?|holiday\s+season|diwali|christmas|new\s+year)\b",
            "during peak season",
        ),
        (r"(?i)\boff[\s-]?season\b", "during the off-season"),
        (r"(?i)\bmondays?\b", "on monday"),
        (r"(?i)\btuesdays?\b", "on tuesday"),
        (r"(?i)\bwednesdays?\b", "on wednesday"),
        (r"(?i)\bthursdays?\b", "on thursday"),
        (r"(?i)\bfridays?\b", "on friday"),
        (r"(?i)\bsaturdays?\b", "on saturday"),
        (r"(?i)\bsundays?\b", "on sunday"),
        (r"(?i)\bjanuary\b", "in january"),
        (r"(?i)\bfebruary\b", "in february"),
        (r"(?i)\bmarch\b", "in march"),
        (r"(?i)\bapril\b", "in april"),
        (r"(?i)\bjune\b", "in june"),
        (r"(?i)\bjuly\b", "in july"),
        (r"(?i)\baugust\b", "in august"),
        (r"(?i)\bseptember\b", "in september"),
        (r"(?i)\boctober\b", "in october"),
        (r"(?i)\bnovember\b", "in november"),
        (r"(?i)\bdecember\b", "in december"),
    ]
    .into_iter()
    .map(|(p, canonical)| (Regex::new(p).unwrap(), canonical))
    .collect()
});

// =============================================================================
// Types
// =============================================================================

/// Kind of constraint a refinement adds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintKind {
    Time,
    Quantity,
    PriceDirection,
    Generic,
}

impl fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConstraintKind::Time => "time",
            ConstraintKind::Quantity => "quantity",
            ConstraintKind::PriceDirection => "price_direction",
            ConstraintKind::Generic => "generic",
        };
        f.write_str(s)
    }
}

/// The constraint pulled from a refinement utterance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constraint {
    pub kind: ConstraintKind,
    /// Phrase as inserted into the previous question.
    pub phrase: String,
}

/// Previous question merged with a follow-up constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefinementResult {
    pub combined_question: String,
    pub constraint: Constraint,
    pub previous_question: String,
}

// =============================================================================
// Detector
// =============================================================================

/// Decides whether an utterance refines the previous question.
#[derive(Debug, Clone)]
pub struct RefinementDetector {
    max_words: usize,
    anchored_max_words: usize,
}

impl Default for RefinementDetector {
    fn default() -> Self {
        Self::new(&RefinementConfig::default())
    }
}

impl RefinementDetector {
    pub fn new(config: &RefinementConfig) -> Self {
        Self {
            max_words: config.max_words,
            anchored_max_words: config.anchored_max_words.max(config.max_words),
        }
    }

    /// Check against the last question in `history`. Empty history never refines.
    pub fn is_refinement(&self, utterance: &str, history: &ChatHistory) -> bool {
        history
            .last_question()
            .is_some_and(|previous| self.is_refinement_of(utterance, previous))
    }

    /// Check against a previous question or a rendered history line.
    pub fn is_refinement_of(&self, utterance: &str, previous: &str) -> bool {
        let previous = question_from_line(previous);
        if previous.is_empty() || !TOPIC_RE.is_match(previous) {
            return false;
        }

        let words = utterance.split_whitespace().count();
        if words == 0 {
            return false;
        }

        let keyword_hit = words <= self.max_words
            && (GENERIC_CONSTRAINT_RE.is_match(utterance)
                || TIME_PERIOD_RE.is_match(utterance)
                || QUANTITY_RE.is_match(utterance)
                || PRICE_COMPARATOR_RE.is_match(utterance));
        let anchored_hit = words <= self.anchored_max_words && ANCHORED_RE.is_match(utterance);

        keyword_hit || anchored_hit
    }

    /// Detect and combine in one step.
    pub fn refine(&self, utterance: &str, history: &ChatHistory) -> Option<RefinementResult> {
        let previous = history.last_question()?;
        if !self.is_refinement_of(utterance, previous) {
            return None;
        }
        let result = combine(question_from_line(previous), utterance);
        tracing::debug!(
            kind = %result.constraint.kind,
            combined = %result.combined_question,
            "Refinement merged with previous question"
        );
        Some(result)
    }

    /// Rule refinement, then an optional backend rewrite of the combined
    /// question. A failed, late or unusable rewrite keeps the rule result.
    pub async fn refine_with_backend(
        &self,
        utterance: &str,
        history: &ChatHistory,
        backend: Option<&dyn GenerationBackend>,
        timeout: Duration,
        max_tokens: usize,
    ) -> Option<RefinementResult> {
        let mut result = self.refine(utterance, history)?;
        let Some(backend) = backend else {
            return Some(result);
        };

        let prompt = format!(
            "Rewrite the follow-up as one standalone guest question. Reply with it only.\n\
             Previous question: {}\nFollow-up: {}\nDraft: {}\nQuestion:",
            result.previous_question,
            utterance.trim(),
            result.combined_question
        );
        let rewritten = call_with_timeout(backend, &prompt, max_tokens, timeout, "refinement")
            .await
            .and_then(|reply| parse_rewrite(&reply, &result.combined_question));
        match rewritten {
            Some(question) => {
                tracing::debug!(rewritten = %question, "Backend rewrote refined question");
                result.combined_question = question;
            }
            None => tracing::debug!(
                combined = %result.combined_question,
                "Keeping rule-combined question"
            ),
        }
        Some(result)
    }
}

const REWRITE_MAX_WORDS: usize = 40;

/// First non-empty line of a rewrite reply, if it still reads as the same
/// question: short, plain text, sharing a keyword with the draft.
fn parse_rewrite(reply: &str, draft: &str) -> Option<String> {
    let line = reply.lines().map(str::trim).find(|l| !l.is_empty())?;
    let line = line
        .strip_prefix("Question:")
        .or_else(|| line.strip_prefix("question:"))
        .unwrap_or(line)
        .trim()
        .trim_matches(['"', '\''])
        .trim();
    if line.is_empty()
        || line.contains('{')
        || line.split_whitespace().count() > REWRITE_MAX_WORDS
    {
        return None;
    }
    let draft_keywords = keywords(draft);
    keywords(line)
        .iter()
        .any(|k| draft_keywords.contains(k))
        .then(|| line.to_string())
}

// =============================================================================
// Combiner
// =============================================================================

/// Merge a follow-up constraint into the previous question.
///
/// Kinds are tried in priority order; a kind whose rule is skipped falls
/// through to the next one. Generic always applies.
pub fn combine(previous: &str, utterance: &str) -> RefinementResult {
    let previous = previous.trim();
    let constraint = [
        ConstraintKind::Time,
        ConstraintKind::Quantity,
        ConstraintKind::PriceDirection,
        ConstraintKind::Generic,
    ]
    .into_iter()
    .find_map(|kind| extract_constraint(kind, previous, utterance))
    .unwrap_or_else(|| Constraint {
        kind: ConstraintKind::Generic,
        phrase: generic_phrase(utterance),
    });

    RefinementResult {
        combined_question: insert_phrase(previous, &constraint.phrase),
        constraint,
        previous_question: previous.to_string(),
    }
}

fn extract_constraint(kind: ConstraintKind, previous: &str, utterance: &str) -> Option<Constraint> {
    let phrase = match kind {
        ConstraintKind::Time => time_phrase(previous, utterance),
        ConstraintKind::Quantity => quantity_phrase(previous, utterance),
        ConstraintKind::PriceDirection => PRICE_COMPARATOR_RE
            .find(utterance)
            .map(|m| format!("({})", m.as_str().trim().to_lowercase())),
        ConstraintKind::Generic => {
            let phrase = generic_phrase(utterance);
            (!phrase.is_empty()).then_some(phrase)
        }
    }?;
    Some(Constraint { kind, phrase })
}

fn canonical_time(text: &str) -> Option<&'static str> {
    TIME_PHRASES
        .iter()
        .find(|(re, _)| re.is_match(text))
        .map(|(_, canonical)| *canonical)
}

fn time_phrase(previous: &str, utterance: &str) -> Option<String> {
    let canonical = canonical_time(utterance)?;
    if let Some(existing) = canonical_time(previous) {
        tracing::debug!(existing, new = canonical, "Previous question already has a time phrase");
        return None;
    }
    let restrictive = RESTRICTIVE_RE.is_match(utterance)
        && matches!(canonical, "on weekdays" | "on weekends");
    if restrictive {
        Some(format!("{} only", canonical))
    } else {
        Some(canonical.to_string())
    }
}

fn quantity_phrase(previous: &str, utterance: &str) -> Option<String> {
    let caps = QUANTITY_RE.captures(utterance)?;
    let raw = caps.get(1)?.as_str().to_lowercase();
    let noun = caps.get(2)?.as_str().to_lowercase();
    let number = parse_number(&raw).map(|n| n.to_string()).unwrap_or(raw);

    let verbatim = Regex::new(&format!(r"\b{}\b", regex::escape(&number)))
        .map(|re| re.is_match(previous))
        .unwrap_or(false);
    if verbatim {
        return None;
    }
    Some(format!("for {} {}", number, noun))
}

fn generic_phrase(utterance: &str) -> String {
    utterance
        .trim()
        .trim_end_matches(['?', '.', '!'])
        .trim()
        .to_string()
}

/// Insert `phrase` before a trailing question mark, or append it.
pub fn insert_phrase(previous: &str, phrase: &str) -> String {
    let previous = previous.trim();
    if phrase.is_empty() {
        return previous.to_string();
    }
    match previous.strip_suffix('?') {
        Some(stem) => format!("{} {}?", stem.trim_end(), phrase),
        None => format!("{} {}", previous, phrase),
    }
}
