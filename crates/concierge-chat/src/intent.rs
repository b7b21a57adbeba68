//! Intent classification.
//!
//! Rules are checked from most to least specific and the first match
//! wins. When nothing matches and a backend is available, a single-word
//! classification prompt is tried; anything unparseable is `Unknown`.

use std::time::Duration;

use crate::backend::{call_with_timeout, GenerationBackend};
use crate::rules::{Matcher, Rule, RuleSet};
use crate::types::Intent;

/// Rule-first intent classifier.
pub struct IntentClassifier {
    rules: RuleSet<Intent>,
}

impl Default for IntentClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl IntentClassifier {
    pub fn new() -> Self {
        Self {
            rules: RuleSet::new(intent_rules()),
        }
    }

    /// Classify with rules only.
    pub fn classify(&self, utterance: &str) -> Intent {
        self.rules.first_match(utterance).unwrap_or(Intent::Unknown)
    }

    /// Name of the rule that fired, if any.
    pub fn matched_rule(&self, utterance: &str) -> Option<&'static str> {
        self.rules.first_rule(utterance).map(|r| r.label)
    }

    /// Intents in the order their rules are evaluated.
    pub fn rule_order(&self) -> Vec<Intent> {
        self.rules.order()
    }

    /// Classify with rules, asking the backend only when no rule fires.
    ///
    /// Backend errors and timeouts never propagate; they yield `Unknown`.
    pub async fn classify_with_backend(
        &self,
        utterance: &str,
        backend: Option<&dyn GenerationBackend>,
        timeout: Duration,
        max_tokens: usize,
    ) -> Intent {
        if let Some(intent) = self.rules.first_match(utterance) {
            return intent;
        }
        let Some(backend) = backend else {
            return Intent::Unknown;
        };

        let prompt = classification_prompt(utterance);
        match call_with_timeout(backend, &prompt, max_tokens, timeout, "intent").await {
            Some(reply) => {
                let intent = parse_intent_reply(&reply);
                tracing::debug!(
                    intent = %intent,
                    reply = %reply.trim(),
                    "Backend intent classification"
                );
                intent
            }
            None => Intent::Unknown,
        }
    }
}

fn classification_prompt(utterance: &str) -> String {
    let categories: Vec<&str> = Intent::ALL.iter().map(|i| i.as_str()).collect();
    format!(
        "Classify the guest message for a cottage resort into exactly one category.\n\
         Categories: {}\n\
         Reply with the category name only.\n\
         Message: {}\n\
         Category:",
        categories.join(", "),
        utterance.trim()
    )
}

/// Parse the first word of a backend reply as an intent.
pub fn parse_intent_reply(reply: &str) -> Intent {
    reply
        .split_whitespace()
        .next()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric() && c != '_'))
        .and_then(|w| w.parse::<Intent>().ok())
        .unwrap_or(Intent::Unknown)
}

// =============================================================================
// Rules
// =============================================================================

fn is_statement(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed.ends_with('?') {
        return false;
    }
    let lower = trimmed.to_lowercase();
    let first = lower.split_whitespace().next().unwrap_or("");
    const QUESTION_STARTERS: &[&str] = &[
        "what", "when", "where", "which", "who", "why", "how", "can", "could", "do", "does",
        "is", "are", "will", "would", "should", "may", "tell", "show", "give", "list",
    ];
    const STATEMENT_STARTERS: &[&str] =
        &["i", "i'm", "im", "we", "we're", "were", "my", "our", "us"];
    !QUESTION_STARTERS.contains(&first) && STATEMENT_STARTERS.contains(&first)
}

fn intent_rules() -> Vec<Rule<Intent>> {
    vec![
        Rule {
            label: "greeting",
            matcher: Matcher::any(&[
                r"(?i)^\s*(?:hi|hello|hey|hiya|greetings|namaste|good\s+(?:morning|afternoon|evening))(?:\s+(?:there|team|all|everyone))?[\s!.,]*$",
            ]),
            outcome: Intent::Greeting,
        },
        Rule {
            label: "affirmative",
            matcher: Matcher::any(&[
                r"(?i)^\s*(?:yes|yeah|yep|yup|sure|ok|okay|alright|correct|right|absolutely|definitely|sounds\s+good|go\s+ahead|please\s+do)(?:\s+please)?[\s!.,]*$",
            ]),
            outcome: Intent::Affirmative,
        },
        Rule {
            label: "negative",
            matcher: Matcher::any(&[
                r"(?i)^\s*(?:no|nope|nah|not\s+really|no\s+thanks|no\s+thank\s+you|never\s*mind|not\s+now)[\s!.,]*$",
            ]),
            outcome: Intent::Negative,
        },
        Rule {
            label: "safety",
            matcher: Matcher::any(&[
                r"(?i)\b(?:safe|safety|secure|security|cctv|guard|first\s+aid|doctor|hospital|emergency|fire\s+extinguisher|snakes?|wild\s+animals?)\b",
            ]),
            outcome: Intent::Safety,
        },
        Rule {
            label: "booking",
            matcher: Matcher::any(&[
                r"(?i)\b(?:book|booking|reserve|reservation|confirm\s+my|advance\s+payment|pay\s+(?:online|now)|check\s*out\s+process)\b",
                r"(?i)\bhow\s+(?:do|can)\s+i\s+(?:book|reserve)\b",
            ]),
            outcome: Intent::Booking,
        },
        Rule {
            label: "pricing",
            matcher: Matcher::any(&[
                r"(?i)\b(?:price|prices|pricing|cost|costs|rate|rates|tariff|charges?|fees?|rent|discount|offers?|cheap|cheaper|cheapest|expensive|budget|affordable)\b",
                r"(?i)\bhow\s+much\b",
                r"(?i)(?:₹|rs\.?\s*\d|\binr\b|\$\s*\d)",
            ]),
            outcome: Intent::Pricing,
        },
        Rule {
            label: "capacity",
            matcher: Matcher::any(&[
                r"(?i)\b(?:accommodate|accomodate|capacity|occupancy|fit)\b",
                r"(?i)\bhow\s+many\s+(?:people|guests|persons|adults|members)\b",
                r"(?i)\b(?:can|could)\s+\w+\s+(?:people|guests|persons|adults|members|of\s+us)\s+(?:stay|sleep)\b",
                r"(?i)\bmax(?:imum)?\s+(?:guests|people)\b",
            ]),
            outcome: Intent::Capacity,
        },
        Rule {
            label: "availability",
            matcher: Matcher::any(&[
                r"(?i)\b(?:available|availability|vacant|vacancy|free\s+on|sold\s+out|fully\s+booked|open\s+on)\b",
                r"(?i)\bdo\s+you\s+have\s+(?:any\s+)?(?:space|room|cottages?)\s+(?:on|for|in|this|next)\b",
            ]),
            outcome: Intent::Availability,
        },
        Rule {
            label: "rooms",
            matcher: Matcher::any(&[
                r"(?i)\b(?:cottages?|rooms?|bedrooms?|beds?|villa|units?|accommodation|stay\s+options?)\b",
            ]),
            outcome: Intent::Rooms,
        },
        Rule {
            label: "location",
            matcher: Matcher::any(&[
                r"(?i)\b(?:where|location|located|address|directions?|route|distance|how\s+far|nearest|map|reach|airport|railway|station)\b",
            ]),
            outcome: Intent::Location,
        },
        Rule {
            label: "facilities",
            matcher: Matcher::any(&[
                r"(?i)\b(?:wifi|wi-fi|internet|parking|pool|swimming|kitchen|kitchenette|restaurant|dining|meals?|breakfast|lunch|dinner|food|ac|air\s*condition(?:ing|ed)?|hot\s+water|geyser|power\s+backup|bonfire|amenit(?:y|ies)|facilit(?:y|ies)|laundry|tv)\b",
            ]),
            outcome: Intent::Facilities,
        },
        Rule {
            label: "policies",
            matcher: Matcher::any(&[
                r"(?i)\b(?:check[\s-]?in|check[\s-]?out|cancel|cancellation|refund|pets?|dogs?|smoking|alcohol|id\s+proof|policy|policies|rules|late\s+checkout|early\s+check)\b",
            ]),
            outcome: Intent::Policies,
        },
        Rule {
            label: "activities",
            matcher: Matcher::any(&[
                r"(?i)\b(?:activities|activity|things\s+to\s+do|trek|trekking|hike|hiking|boating|fishing|sightseeing|games|nearby\s+places|attractions?|tour)\b",
            ]),
            outcome: Intent::Activities,
        },
        Rule {
            label: "help",
            matcher: Matcher::any(&[
                r"(?i)\b(?:help|assist|assistance|support|contact|phone\s+number|call\s+you|speak\s+to|talk\s+to\s+(?:a\s+)?(?:human|person|someone)|what\s+can\s+you\s+do)\b",
            ]),
            outcome: Intent::Help,
        },
        Rule {
            label: "statement",
            matcher: Matcher::Predicate(is_statement),
            outcome: Intent::Statement,
        },
    ]
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ScriptedBackend;

    fn classifier() -> IntentClassifier {
        IntentClassifier::new()
    }

    #[test]
    fn test_rule_order_most_specific_first() {
        let order = classifier().rule_order();
        assert_eq!(order.first(), Some(&Intent::Greeting));
        assert_eq!(order.last(), Some(&Intent::Statement));
        let pos = |i: Intent| order.iter().position(|o| *o == i).unwrap();
        assert!(pos(Intent::Booking) < pos(Intent::Pricing));
        assert!(pos(Intent::Pricing) < pos(Intent::Capacity));
        assert!(pos(Intent::Capacity) < pos(Intent::Rooms));
        assert!(!order.contains(&Intent::Unknown));
    }

    #[test]
    fn test_greeting_only_when_whole_utterance() {
        assert_eq!(classifier().classify("Hello!"), Intent::Greeting);
        assert_eq!(classifier().classify("good morning team"), Intent::Greeting);
        assert_eq!(classifier().classify("hi, what is the price of cottage 7"), Intent::Pricing);
    }

    #[test]
    fn test_affirmative_and_negative() {
        assert_eq!(classifier().classify("yes please"), Intent::Affirmative);
        assert_eq!(classifier().classify("Sounds good."), Intent::Affirmative);
        assert_eq!(classifier().classify("no thanks"), Intent::Negative);
        assert_eq!(classifier().classify("nope"), Intent::Negative);
    }

    #[test]
    fn test_pricing() {
        for text in [
            "price for cottage 7",
            "how much for a weekend",
            "what are your rates",
            "any discount for long stays",
        ] {
            assert_eq!(classifier().classify(text), Intent::Pricing, "{}", text);
        }
    }

    #[test]
    fn test_booking_beats_pricing() {
        assert_eq!(
            classifier().classify("I want to book cottage 9, what is the advance payment cost"),
            Intent::Booking
        );
        assert_eq!(classifier().classify("how do I reserve"), Intent::Booking);
    }

    #[test]
    fn test_capacity() {
        assert_eq!(classifier().classify("can 8 people stay in cottage 9"), Intent::Capacity);
        assert_eq!(classifier().classify("how many guests can fit"), Intent::Capacity);
    }

    #[test]
    fn test_availability_and_rooms() {
        assert_eq!(classifier().classify("is cottage 7 available next week"), Intent::Availability);
        assert_eq!(classifier().classify("how many cottages do you have"), Intent::Rooms);
        assert_eq!(classifier().classify("tell me about the bedrooms"), Intent::Rooms);
    }

    #[test]
    fn test_location_facilities_policies_activities() {
        assert_eq!(classifier().classify("where are you located"), Intent::Location);
        assert_eq!(classifier().classify("is there wifi"), Intent::Facilities);
        assert_eq!(classifier().classify("are pets allowed"), Intent::Policies);
        assert_eq!(classifier().classify("any trekking nearby"), Intent::Activities);
    }

    #[test]
    fn test_safety_checked_before_location() {
        assert_eq!(classifier().classify("where is the nearest hospital"), Intent::Safety);
        assert_eq!(classifier().classify("is it safe for kids"), Intent::Safety);
    }

    #[test]
    fn test_help_and_statement() {
        assert_eq!(classifier().classify("can you help me"), Intent::Help);
        assert_eq!(classifier().classify("we are a family from Pune"), Intent::Statement);
        assert_eq!(classifier().classify("we are a family from Pune?"), Intent::Unknown);
    }

    #[test]
    fn test_unknown() {
        assert_eq!(classifier().classify("what's the meaning of life"), Intent::Unknown);
        assert_eq!(classifier().matched_rule("what's the meaning of life"), None);
        assert_eq!(classifier().matched_rule("is there wifi"), Some("facilities"));
    }

    #[test]
    fn test_parse_intent_reply() {
        assert_eq!(parse_intent_reply("pricing"), Intent::Pricing);
        assert_eq!(parse_intent_reply("  Location.\nBecause..."), Intent::Location);
        assert_eq!(parse_intent_reply("I think pricing"), Intent::Unknown);
        assert_eq!(parse_intent_reply(""), Intent::Unknown);
    }

    const BUDGET: Duration = Duration::from_millis(200);
    const SHORT: Duration = Duration::from_millis(10);

    #[tokio::test]
    async fn test_backend_used_only_when_rules_fail() {
        let backend = ScriptedBackend::replying("activities");
        let c = classifier();
        let timeout = Duration::from_millis(200);

        let intent = c
            .classify_with_backend("is there wifi", Some(&backend), timeout, 8)
            .await;
        assert_eq!(intent, Intent::Facilities);
        assert_eq!(backend.call_count(), 0);

        let intent = c
            .classify_with_backend("what's good around here", Some(&backend), timeout, 8)
            .await;
        assert_eq!(intent, Intent::Activities);
        assert_eq!(backend.call_count(), 1);
        assert!(backend.prompts()[0].contains("what's good around here"));
    }

    #[tokio::test]
    async fn test_backend_failure_degrades_to_unknown() {
        let backend = ScriptedBackend::failing("offline");
        let intent = classifier()
            .classify_with_backend("what's good around here", Some(&backend), BUDGET, 8)
            .await;
        assert_eq!(intent, Intent::Unknown);
    }

    #[tokio::test]
    async fn test_backend_timeout_degrades_to_unknown() {
        let backend =
            ScriptedBackend::replying("pricing").with_delay(Duration::from_millis(200));
        let intent = classifier()
            .classify_with_backend("what's good around here", Some(&backend), SHORT, 8)
            .await;
        assert_eq!(intent, Intent::Unknown);
    }

    #[tokio::test]
    async fn test_backend_garbage_degrades_to_unknown() {
        let backend = ScriptedBackend::replying("¯\\_(ツ)_/¯");
        let intent = classifier()
            .classify_with_backend("what's good around here", Some(&backend), BUDGET, 8)
            .await;
        assert_eq!(intent, Intent::Unknown);
    }

    #[tokio::test]
    async fn test_no_backend_is_unknown() {
        let intent = classifier()
            .classify_with_backend("what's good around here", None, Duration::from_millis(200), 8)
            .await;
        assert_eq!(intent, Intent::Unknown);
    }
}
