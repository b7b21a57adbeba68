//! Answers composed without generation.
//!
//! Extractive answers pick the passage sentences that best cover the
//! question. Used when no backend is configured or synthesis fails.

use crate::confidence::keywords;
use crate::types::{Intent, RetrievedDocument};

/// Reply when retrieval found nothing to ground an answer in.
pub const REFUSAL_MESSAGE: &str =
    "I'm sorry, I don't have information about that in our resort details. \
     Could you rephrase, or ask about our cottages, prices, facilities or location?";

/// Canned reply for purely conversational intents.
pub fn conversational_answer(intent: Intent) -> Option<&'static str> {
    match intent {
        Intent::Greeting => Some(
            "Hello and welcome! I can help with our cottages, prices, availability, facilities and directions. What would you like to know?",
        ),
        Intent::Help => Some(
            "I can tell you about our cottages and how many guests they host, explain prices, and help with availability, facilities, policies and directions. You can also ask to speak with our reservations team.",
        ),
        Intent::Affirmative => Some(
            "Great! Tell me your dates and the number of guests and I'll take it from there.",
        ),
        Intent::Negative => Some("No problem. Is there anything else I can help you with?"),
        _ => None,
    }
}

// =============================================================================
// ResponseGenerator
// =============================================================================

/// Composes extractive answers and follow-up suggestions.
pub struct ResponseGenerator {
    /// Maximum number of sentences in an extractive answer.
    pub max_sentences: usize,
}

impl Default for ResponseGenerator {
    fn default() -> Self {
        Self::new(3)
    }
}

impl ResponseGenerator {
    pub fn new(max_sentences: usize) -> Self {
        Self {
            max_sentences: max_sentences.max(1),
        }
    }

    /// Best-matching sentences from the documents, in document order.
    ///
    /// Structured analysis passages are taken whole. Returns `None` when
    /// there are no documents.
    pub fn compose_extractive(
        &self,
        question: &str,
        documents: &[RetrievedDocument],
    ) -> Option<String> {
        let first = documents.first()?;
        if first.is_structured_analysis() {
            return Some(first.content.trim().to_string());
        }

        let terms = keywords(question);
        let mut scored: Vec<(usize, usize, &str)> = Vec::new();
        for doc in documents {
            for sentence in split_sentences(&doc.content) {
                let sentence_terms = keywords(sentence);
                let hits = terms.iter().filter(|t| sentence_terms.contains(t)).count();
                if hits > 0 {
                    scored.push((hits, scored.len(), sentence));
                }
            }
        }

        if scored.is_empty() {
            return split_sentences(&first.content).first().map(|s| s.to_string());
        }

        // Highest overlap first, then restore reading order.
        scored.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
        scored.truncate(self.max_sentences);
        scored.sort_by_key(|(_, order, _)| *order);

        Some(
            scored
                .into_iter()
                .map(|(_, _, s)| s)
                .collect::<Vec<_>>()
                .join(" "),
        )
    }

    /// Follow-up questions to offer after a turn.
    pub fn suggestions(&self, intent: Intent) -> Vec<String> {
        let items: &[&str] = match intent {
            Intent::Pricing => &[
                "Is there an extra charge for more guests?",
                "Which cottages are available this weekend?",
            ],
            Intent::Capacity => {
                &["What does the extra-guest charge cover?", "Which cottage do you recommend?"]
            }
            Intent::Availability => &["What are the rates for those dates?", "How do I book?"],
            Intent::Rooms => &["How many guests can each cottage host?", "What are the prices?"],
            Intent::Booking => &["What is the cancellation policy?", "What time is check-in?"],
            Intent::Location => &["Is there parking?", "What is there to do nearby?"],
            Intent::Facilities => &["Are meals available?", "What activities do you offer?"],
            Intent::Policies => &["How do I book?", "Are pets allowed?"],
            Intent::Activities => &["Where is the resort located?", "Are meals available?"],
            Intent::Safety => {
                &["Is there a doctor nearby?", "Is the resort suitable for children?"]
            }
            Intent::Greeting | Intent::Help | Intent::Unknown => &[
                "How many cottages do you have?",
                "What are your prices?",
                "Where are you located?",
            ],
            Intent::Statement | Intent::Affirmative | Intent::Negative => &[],
        };
        items.iter().map(|s| s.to_string()).collect()
    }
}

/// Split text into trimmed, non-empty sentences.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    for (idx, c) in text.char_indices() {
        if matches!(c, '.' | '!' | '?' | '\n') {
            let end = idx + c.len_utf8();
            let sentence = text[start..end].trim();
            if !sentence.is_empty() && sentence.chars().any(|ch| ch.is_alphanumeric()) {
                sentences.push(sentence);
            }
            start = end;
        }
    }
    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }
    sentences
}
