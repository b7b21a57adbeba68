//! Guest sentiment and tone adjustment.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::backend::{call_with_timeout, GenerationBackend};
use crate::rules::{Matcher, Rule, RuleSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    Positive,
    Neutral,
    Frustrated,
    Confused,
    Satisfied,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Neutral => "neutral",
            Sentiment::Frustrated => "frustrated",
            Sentiment::Confused => "confused",
            Sentiment::Satisfied => "satisfied",
        }
    }

    /// Escalation to a human is offered only to frustrated guests.
    pub fn should_escalate(&self) -> bool {
        matches!(self, Sentiment::Frustrated)
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sentiment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "positive" => Ok(Sentiment::Positive),
            "neutral" => Ok(Sentiment::Neutral),
            "frustrated" => Ok(Sentiment::Frustrated),
            "confused" => Ok(Sentiment::Confused),
            "satisfied" => Ok(Sentiment::Satisfied),
            other => Err(format!("unknown sentiment: {}", other)),
        }
    }
}

const EMPATHY_PREFIX: &str = "I'm sorry for the trouble, and I understand this is frustrating.";
const ESCALATION_OFFER: &str =
    "If you'd prefer, I can connect you with our reservations team directly.";
const CLARIFY_PREFIX: &str = "Let me make this clearer.";
const ELABORATION_OFFER: &str = "Would you like me to explain any part of this in more detail?";

static ESCALATION_PRESENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:connect\s+you\s+with|speak\s+(?:to|with)\s+(?:our|a)|contact\s+our|call\s+us)\b",
    )
    .unwrap()
});

fn sentiment_rules() -> Vec<Rule<Sentiment>> {
    vec![
        Rule {
            label: "frustrated",
            matcher: Matcher::any(&[
                r"(?i)\b(?:frustrat\w*|annoy\w*|angry|upset|ridiculous|useless|terrible|awful|worst|fed\s+up|waste\s+of\s+time|not\s+helpful|unhelpful|still\s+(?:no|not|waiting)|already\s+(?:asked|told)|seriously)\b",
                r"(?i)\b(?:you\s+(?:don'?t|do\s+not|never)\s+(?:understand|listen|answer))\b",
                r"!{2,}",
            ]),
            outcome: Sentiment::Frustrated,
        },
        Rule {
            label: "confused",
            matcher: Matcher::any(&[
                r"(?i)\b(?:confus\w*|don'?t\s+(?:understand|get\s+it)|do\s+not\s+understand|what\s+do\s+you\s+mean|not\s+sure\s+what|unclear|makes\s+no\s+sense|lost\s+me|huh)\b",
                r"\?{2,}",
            ]),
            outcome: Sentiment::Confused,
        },
        Rule {
            label: "satisfied",
            matcher: Matcher::any(&[
                r"(?i)\b(?:thanks?|thank\s+you|that\s+helps|helpful|perfect|got\s+it|that'?s\s+(?:all|great|clear)|appreciate\w*)\b",
            ]),
            outcome: Sentiment::Satisfied,
        },
        Rule {
            label: "positive",
            matcher: Matcher::at_least(
                &[
                    r"(?i)\b(?:great|lovely|wonderful|amazing|excited|awesome|beautiful|fantastic|nice)\b",
                    r"(?i)\b(?:love|looking\s+forward|can'?t\s+wait)\b",
                    r"(?i)\b(?:happy|glad|delighted)\b",
                    r"!",
                ],
                2,
            ),
            outcome: Sentiment::Positive,
        },
    ]
}

pub struct SentimentAnalyzer {
    rules: RuleSet<Sentiment>,
}

impl Default for SentimentAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl SentimentAnalyzer {
    pub fn new() -> Self {
        Self {
            rules: RuleSet::new(sentiment_rules()),
        }
    }

    /// Rule-only analysis; neutral when no rule fires.
    pub fn analyze(&self, utterance: &str) -> Sentiment {
        self.rules.first_match(utterance).unwrap_or(Sentiment::Neutral)
    }

    pub fn rule_order(&self) -> Vec<Sentiment> {
        self.rules.order()
    }

    /// Rules first; the backend is asked only when no rule matched.
    pub async fn analyze_with_backend(
        &self,
        utterance: &str,
        backend: Option<&dyn GenerationBackend>,
        timeout: Duration,
        max_tokens: usize,
    ) -> Sentiment {
        if let Some(sentiment) = self.rules.first_match(utterance) {
            return sentiment;
        }
        let Some(backend) = backend else {
            return Sentiment::Neutral;
        };
        let prompt = format!(
            "Classify the sentiment of this hotel guest message as one of: positive, neutral, frustrated, confused, satisfied.\n\
             Reply with one word.\nMessage: {}\nSentiment:",
            utterance.trim()
        );
        call_with_timeout(backend, &prompt, max_tokens, timeout, "sentiment")
            .await
            .and_then(|reply| {
                reply
                    .split_whitespace()
                    .next()
                    .map(|w| w.trim_matches(|c: char| !c.is_alphabetic()).to_string())
            })
            .and_then(|word| word.parse().ok())
            .unwrap_or(Sentiment::Neutral)
    }
}

/// Rephrase an answer for the guest's mood.
pub fn adjust_tone(answer: &str, sentiment: Sentiment) -> String {
    let answer = answer.trim();
    match sentiment {
        Sentiment::Frustrated => {
            let mut text = format!("{} {}", EMPATHY_PREFIX, answer);
            if !ESCALATION_PRESENT_RE.is_match(answer) {
                text.push(' ');
                text.push_str(ESCALATION_OFFER);
            }
            text
        }
        Sentiment::Confused => format!("{} {} {}", CLARIFY_PREFIX, answer, ELABORATION_OFFER),
        Sentiment::Positive | Sentiment::Neutral | Sentiment::Satisfied => answer.to_string(),
    }
}
