//! Per-session conversational state and customer-journey tracking.

use std::collections::{HashMap, VecDeque};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::entity::ExtractedEntities;
use crate::types::Intent;

/// Intents kept for state transitions.
pub const INTENT_HISTORY_LIMIT: usize = 10;
/// Entries kept in the rolling summary.
pub const SUMMARY_LIMIT: usize = 20;
/// Intents inspected when deciding between comparing and inquiring.
const RECENT_WINDOW: usize = 3;

/// Stage of the customer journey.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationState {
    #[default]
    Browsing,
    Comparing,
    Inquiring,
    ReadyToBook,
    Booking,
    Completed,
}

/// Intents that count as distinct topics when deciding on `Comparing`.
fn is_comparison_topic(intent: Intent) -> bool {
    matches!(
        intent,
        Intent::Pricing | Intent::Availability | Intent::Rooms | Intent::Capacity
    )
}

impl fmt::Display for ConversationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConversationState::Browsing => "browsing",
            ConversationState::Comparing => "comparing",
            ConversationState::Inquiring => "inquiring",
            ConversationState::ReadyToBook => "ready_to_book",
            ConversationState::Booking => "booking",
            ConversationState::Completed => "completed",
        };
        f.write_str(s)
    }
}

/// Everything remembered about one guest conversation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionContext {
    state: ConversationState,
    intent_history: VecDeque<Intent>,
    preferences: HashMap<String, String>,
    summary: VecDeque<String>,
    key_points: HashMap<String, String>,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored state, as last set by a transition.
    pub fn state(&self) -> ConversationState {
        self.state
    }

    /// Stage reported to callers.
    ///
    /// Readiness is derived from history rather than stored, and never
    /// overrides an active or finished booking.
    pub fn journey_stage(&self) -> ConversationState {
        match self.state {
            ConversationState::Booking | ConversationState::Completed => self.state,
            _ if self.is_ready_to_book() => ConversationState::ReadyToBook,
            other => other,
        }
    }

    /// Booking intent seen together with pricing or availability.
    pub fn is_ready_to_book(&self) -> bool {
        let seen = |i: Intent| self.intent_history.contains(&i);
        seen(Intent::Booking) && (seen(Intent::Pricing) || seen(Intent::Availability))
    }

    /// Record a new intent and advance the state.
    pub fn update_state(&mut self, intent: Intent) -> ConversationState {
        if self.intent_history.len() >= INTENT_HISTORY_LIMIT {
            self.intent_history.pop_front();
        }
        self.intent_history.push_back(intent);

        let previous = self.state;
        self.state = match intent {
            Intent::Booking => ConversationState::Booking,
            Intent::Pricing | Intent::Availability | Intent::Rooms => {
                let mut recent: Vec<Intent> = self
                    .intent_history
                    .iter()
                    .rev()
                    .take(RECENT_WINDOW)
                    .copied()
                    .filter(|i| is_comparison_topic(*i))
                    .collect();
                recent.sort_by_key(|i| i.as_str());
                recent.dedup();
                if recent.len() >= 2 {
                    ConversationState::Comparing
                } else {
                    ConversationState::Inquiring
                }
            }
            _ => self.state,
        };
        if previous != self.state {
            tracing::info!(
                from = %previous,
                to = %self.state,
                intent = %intent,
                "Conversation state changed"
            );
        }
        self.state
    }

    /// Record a full turn: state, preferences and summary.
    pub fn record_turn(
        &mut self,
        intent: Intent,
        utterance: &str,
        entities: &ExtractedEntities,
    ) -> ConversationState {
        let state = self.update_state(intent);
        if let Some(size) = entities.group_size {
            self.set_preference("group_size", size.to_string());
        }
        if let Some(cottage) = &entities.cottage_number {
            self.set_preference("cottage", cottage.clone());
        }
        if let Some(nights) = entities.nights {
            self.set_preference("nights", nights.to_string());
        }
        if entities.dates.mentions_weekend {
            self.set_preference("stay", "weekend");
        } else if entities.dates.mentions_weekday {
            self.set_preference("stay", "weekday");
        }
        self.push_summary(format!("{}: {}", intent, utterance.trim()));
        state
    }

    /// Mark the booking finished. Everything but the stage is forgotten.
    pub fn complete_booking(&mut self) {
        tracing::info!(from = %self.state, "Booking completed");
        self.clear();
        self.state = ConversationState::Completed;
    }

    /// Forget everything and return to browsing.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn intent_history(&self) -> Vec<Intent> {
        self.intent_history.iter().copied().collect()
    }

    pub fn set_preference(&mut self, key: &str, value: impl Into<String>) {
        self.preferences.insert(key.to_string(), value.into());
    }

    pub fn preference(&self, key: &str) -> Option<&str> {
        self.preferences.get(key).map(String::as_str)
    }

    pub fn preferences(&self) -> &HashMap<String, String> {
        &self.preferences
    }

    pub fn push_summary(&mut self, entry: String) {
        if self.summary.len() >= SUMMARY_LIMIT {
            self.summary.pop_front();
        }
        self.summary.push_back(entry);
    }

    pub fn summary(&self) -> Vec<String> {
        self.summary.iter().cloned().collect()
    }

    pub fn add_key_point(&mut self, key: &str, value: impl Into<String>) {
        self.key_points.insert(key.to_string(), value.into());
    }

    pub fn key_points(&self) -> &HashMap<String, String> {
        &self.key_points
    }
}
