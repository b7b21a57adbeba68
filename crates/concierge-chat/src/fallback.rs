//! Safe canned responses when an answer cannot be trusted.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::types::Intent;

const MAX_SUGGESTIONS: usize = 3;

static TOPIC_KEYWORDS: LazyLock<Vec<(FallbackTopic, Regex)>> = LazyLock::new(|| {
    [
        (FallbackTopic::Booking, r"(?i)\b(?:book|booking|reserve|reservation|advance|deposit)\b"),
        (
            FallbackTopic::Pricing,
            r"(?i)\b(?:price|prices|cost|rate|rates|tariff|charges?|how\s+much|discount)\b",
        ),
        (
            FallbackTopic::Availability,
            r"(?i)\b(?:available|availability|vacant|dates?|free\s+on)\b",
        ),
        (
            FallbackTopic::Location,
            r"(?i)\b(?:where|location|address|directions?|reach|distance|far)\b",
        ),
        (
            FallbackTopic::Facilities,
            r"(?i)\b(?:wifi|parking|pool|kitchen|food|meals?|amenit(?:y|ies)|facilit(?:y|ies))\b",
        ),
    ]
    .into_iter()
    .map(|(topic, p)| (topic, Regex::new(p).unwrap()))
    .collect()
});

/// Topic a fallback response is written for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackTopic {
    Pricing,
    Booking,
    Availability,
    Location,
    Facilities,
    General,
}

impl FallbackTopic {
    pub const ALL: [FallbackTopic; 6] = [
        FallbackTopic::Pricing,
        FallbackTopic::Booking,
        FallbackTopic::Availability,
        FallbackTopic::Location,
        FallbackTopic::Facilities,
        FallbackTopic::General,
    ];

    /// Topic implied by a declared intent.
    pub fn from_intent(intent: Intent) -> Option<Self> {
        match intent {
            Intent::Pricing => Some(FallbackTopic::Pricing),
            Intent::Booking | Intent::Capacity | Intent::Policies => Some(FallbackTopic::Booking),
            Intent::Availability | Intent::Rooms => Some(FallbackTopic::Availability),
            Intent::Location => Some(FallbackTopic::Location),
            Intent::Facilities => Some(FallbackTopic::Facilities),
            Intent::Greeting
            | Intent::Safety
            | Intent::Activities
            | Intent::Help
            | Intent::Statement
            | Intent::Affirmative
            | Intent::Negative
            | Intent::Unknown => None,
        }
    }

    /// Topic named by query keywords, general when none match.
    pub fn from_query(query: &str) -> Self {
        TOPIC_KEYWORDS
            .iter()
            .find(|(_, re)| re.is_match(query))
            .map(|(topic, _)| *topic)
            .unwrap_or(FallbackTopic::General)
    }

    /// Intent first, then query keywords.
    pub fn resolve(intent: Intent, query: &str) -> Self {
        Self::from_intent(intent).unwrap_or_else(|| Self::from_query(query))
    }

    pub fn label(&self) -> &'static str {
        match self {
            FallbackTopic::Pricing => "pricing",
            FallbackTopic::Booking => "booking",
            FallbackTopic::Availability => "availability",
            FallbackTopic::Location => "location",
            FallbackTopic::Facilities => "facilities",
            FallbackTopic::General => "general",
        }
    }

    /// Details the guest should provide for a useful answer.
    pub fn missing_details(&self) -> &'static [&'static str] {
        match self {
            FallbackTopic::Pricing => &[
                "your check-in and check-out dates",
                "the number of guests",
                "the cottage you are interested in",
            ],
            FallbackTopic::Booking => {
                &["your preferred dates", "the number of guests", "a contact number"]
            }
            FallbackTopic::Availability => {
                &["your check-in and check-out dates", "the number of guests"]
            }
            FallbackTopic::Location => &["where you will be travelling from"],
            FallbackTopic::Facilities => &["the facility you are asking about"],
            FallbackTopic::General => &["a little more detail about what you need"],
        }
    }

    /// Neighboring topics offered as next questions.
    pub fn related(&self) -> &'static [FallbackTopic] {
        match self {
            FallbackTopic::Pricing => &[
                FallbackTopic::Availability,
                FallbackTopic::Booking,
                FallbackTopic::Facilities,
            ],
            FallbackTopic::Booking => &[FallbackTopic::Pricing, FallbackTopic::Availability],
            FallbackTopic::Availability => &[FallbackTopic::Pricing, FallbackTopic::Booking],
            FallbackTopic::Location => &[FallbackTopic::Facilities, FallbackTopic::Availability],
            FallbackTopic::Facilities => &[FallbackTopic::Pricing, FallbackTopic::Location],
            FallbackTopic::General => &[
                FallbackTopic::Pricing,
                FallbackTopic::Availability,
                FallbackTopic::Location,
                FallbackTopic::Facilities,
            ],
        }
    }

    fn suggestion(&self) -> &'static str {
        match self {
            FallbackTopic::Pricing => "Ask about prices for your dates and group size",
            FallbackTopic::Booking => "Ask how to book a cottage",
            FallbackTopic::Availability => "Check availability for your dates",
            FallbackTopic::Location => "Ask how to reach the resort",
            FallbackTopic::Facilities => "Ask about facilities like parking, Wi-Fi or meals",
            FallbackTopic::General => "Ask a general question about the resort",
        }
    }

    fn opening(&self) -> &'static str {
        match self {
            FallbackTopic::Pricing => "I don't have a reliable answer about pricing for that yet.",
            FallbackTopic::Booking => "I want to make sure your booking details are right.",
            FallbackTopic::Availability => "I can't confirm availability from what I have.",
            FallbackTopic::Location => "I don't have reliable directions for that.",
            FallbackTopic::Facilities => {
                "I couldn't find reliable information about that facility."
            }
            FallbackTopic::General => "I'm not confident I have the right answer to that.",
        }
    }
}

impl fmt::Display for FallbackTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A canned response replacing an untrusted answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackResponse {
    pub topic: FallbackTopic,
    pub message: String,
    pub missing_details: Vec<String>,
    pub suggestions: Vec<String>,
}

/// Build the fallback for a turn.
pub fn fallback_for(intent: Intent, query: &str) -> FallbackResponse {
    let topic = FallbackTopic::resolve(intent, query);
    let details = topic.missing_details();
    let message = format!(
        "{} To help, please share {}.",
        topic.opening(),
        join_details(details)
    );
    let suggestions = topic
        .related()
        .iter()
        .take(MAX_SUGGESTIONS)
        .map(|t| t.suggestion().to_string())
        .collect();

    tracing::info!(topic = %topic, intent = %intent, "Substituting fallback response");
    FallbackResponse {
        topic,
        message,
        missing_details: details.iter().map(|d| d.to_string()).collect(),
        suggestions,
    }
}

fn join_details(details: &[&str]) -> String {
    match details {
        [] => String::new(),
        [only] => only.to_string(),
        [init @ .., last] => format!("{} and {}", init.join(", "), last),
    }
}
