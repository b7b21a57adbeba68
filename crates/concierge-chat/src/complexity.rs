//! Simple vs. reasoning routing.
//!
//! Each step inspects the utterance and its intent and either decides or
//! passes. Steps run in order; the first decision wins and the final step
//! always decides.

use std::sync::LazyLock;

use regex::Regex;

use crate::types::{Complexity, Intent};

static CALCULATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:\d|\b(?:one|two|three|four|five|six|seven|eight|nine|ten|eleven|twelve|fifteen|twenty|total|calculate|calculation|altogether|overall|nights?|days?|week|weekend|weekdays?|tonight|tomorrow|january|february|march|april|june|july|august|september|october|november|december|monday|tuesday|wednesday|thursday|friday|saturday|sunday)\b|\bhow\s+much\s+for\b)",
    )
    .unwrap()
});

static SUITABILITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:accommodate|accomodate|capacity|occupancy|suitable|suit|fit|enough\s+(?:space|room|beds)|sleep|how\s+many\s+(?:people|guests|persons|adults))\b",
    )
    .unwrap()
});

static REASONING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:compare|comparison|difference|differences|better|best|which\s+(?:one\s+)?should|why|recommend|recommendation|versus|vs\.?|pros\s+and\s+cons|worth\s+it)\b",
    )
    .unwrap()
});

static DIGIT_OR_MONTH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:\d|\b(?:jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?)\b)",
    )
    .unwrap()
});

const LONG_UTTERANCE_WORDS: usize = 15;

/// One named routing step.
pub struct ComplexityStep {
    pub label: &'static str,
    decide: fn(&str, Intent) -> Option<Complexity>,
}

impl ComplexityStep {
    pub fn decide(&self, utterance: &str, intent: Intent) -> Option<Complexity> {
        (self.decide)(utterance, intent)
    }
}

fn intent_override(_: &str, intent: Intent) -> Option<Complexity> {
    match intent {
        Intent::Greeting
        | Intent::Help
        | Intent::Statement
        | Intent::Affirmative
        | Intent::Negative => Some(Complexity::Simple),
        Intent::Capacity => Some(Complexity::Reasoning),
        _ => None,
    }
}

fn pricing_booking_downgrade(utterance: &str, intent: Intent) -> Option<Complexity> {
    let has_calculation = CALCULATION_RE.is_match(utterance);
    match intent {
        Intent::Pricing if has_calculation => Some(Complexity::Reasoning),
        Intent::Pricing | Intent::Booking if !has_calculation => Some(Complexity::Simple),
        _ => None,
    }
}

fn suitability_keywords(utterance: &str, _: Intent) -> Option<Complexity> {
    SUITABILITY_RE
        .is_match(utterance)
        .then_some(Complexity::Reasoning)
}

fn reasoning_keywords(utterance: &str, _: Intent) -> Option<Complexity> {
    REASONING_RE
        .is_match(utterance)
        .then_some(Complexity::Reasoning)
}

fn long_with_figures(utterance: &str, _: Intent) -> Option<Complexity> {
    let long = utterance.split_whitespace().count() > LONG_UTTERANCE_WORDS;
    (long && DIGIT_OR_MONTH_RE.is_match(utterance)).then_some(Complexity::Reasoning)
}

fn default_simple(_: &str, _: Intent) -> Option<Complexity> {
    Some(Complexity::Simple)
}

/// Ordered complexity router.
pub struct ComplexityClassifier {
    steps: Vec<ComplexityStep>,
}

impl Default for ComplexityClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ComplexityClassifier {
    pub fn new() -> Self {
        let steps = vec![
            ComplexityStep { label: "intent_override", decide: intent_override },
            ComplexityStep { label: "pricing_booking", decide: pricing_booking_downgrade },
            ComplexityStep { label: "suitability", decide: suitability_keywords },
            ComplexityStep { label: "reasoning_keywords", decide: reasoning_keywords },
            ComplexityStep { label: "long_with_figures", decide: long_with_figures },
            ComplexityStep { label: "default", decide: default_simple },
        ];
        Self { steps }
    }

    pub fn classify(&self, utterance: &str, intent: Intent) -> Complexity {
        self.decide(utterance, intent).0
    }

    /// Decision plus the label of the step that made it.
    pub fn decide(&self, utterance: &str, intent: Intent) -> (Complexity, &'static str) {
        for step in &self.steps {
            if let Some(complexity) = step.decide(utterance, intent) {
                return (complexity, step.label);
            }
        }
        (Complexity::Simple, "default")
    }

    pub fn step_labels(&self) -> Vec<&'static str> {
        self.steps.iter().map(|s| s.label).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(text: &str, intent: Intent) -> Complexity {
        ComplexityClassifier::new().classify(text, intent)
    }

    #[test]
    fn test_step_order() {
        assert_eq!(
            ComplexityClassifier::new().step_labels(),
            vec![
                "intent_override",
                "pricing_booking",
                "suitability",
                "reasoning_keywords",
                "long_with_figures",
                "default"
            ]
        );
    }

    #[test]
    fn test_conversational_intents_are_simple() {
        // Reasoning words do not matter once the intent decides.
        assert_eq!(classify("why hello there", Intent::Greeting), Complexity::Simple);
        assert_eq!(classify("can you compare for me", Intent::Help), Complexity::Simple);
        assert_eq!(classify("yes", Intent::Affirmative), Complexity::Simple);
    }

    #[test]
    fn test_capacity_is_reasoning() {
        assert_eq!(
            classify("can 8 people stay in cottage 9", Intent::Capacity),
            Complexity::Reasoning
        );
    }

    #[test]
    fn test_pricing_without_figures_is_simple() {
        assert_eq!(classify("what are your rates", Intent::Pricing), Complexity::Simple);
        assert_eq!(
            classify("which cottage is better value, what are the prices", Intent::Pricing),
            Complexity::Simple
        );
    }

    #[test]
    fn test_pricing_with_figures_is_reasoning() {
        assert_eq!(classify("price for 2 nights", Intent::Pricing), Complexity::Reasoning);
        assert_eq!(classify("what's the total", Intent::Pricing), Complexity::Reasoning);
        assert_eq!(classify("how much for a weekend", Intent::Pricing), Complexity::Reasoning);
    }

    #[test]
    fn test_booking_with_figures_continues() {
        assert_eq!(classify("book for the 14th", Intent::Booking), Complexity::Simple);
        assert_eq!(
            classify("book a cottage that can accommodate 8 on friday", Intent::Booking),
            Complexity::Reasoning
        );
        assert_eq!(classify("how do I book", Intent::Booking), Complexity::Simple);
    }

    #[test]
    fn test_suitability_keywords() {
        assert_eq!(classify("is cottage 9 suitable for us", Intent::Rooms), Complexity::Reasoning);
    }

    #[test]
    fn test_reasoning_keywords() {
        assert_eq!(
            classify("what's the difference between cottage 9 and 11", Intent::Rooms),
            Complexity::Reasoning
        );
        assert_eq!(classify("which do you recommend", Intent::Unknown), Complexity::Reasoning);
    }

    #[test]
    fn test_long_utterance_with_digit_or_month() {
        let long = "we are planning to come over with the whole extended family \
                    sometime around the middle of december this year";
        assert_eq!(classify(long, Intent::Unknown), Complexity::Reasoning);
        let long_plain = "we are planning to come over with the whole extended family \
                          sometime around the middle of the season this year";
        assert_eq!(classify(long_plain, Intent::Unknown), Complexity::Simple);
    }

    #[test]
    fn test_default_simple() {
        let (c, label) = ComplexityClassifier::new().decide("is there wifi", Intent::Facilities);
        assert_eq!(c, Complexity::Simple);
        assert_eq!(label, "default");
    }
}
