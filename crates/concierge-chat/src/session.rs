//! Guest sessions: history, context and expiry.

use chrono::{DateTime, Local, TimeZone};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::history::{ChatHistory, Exchange};
use crate::state::{ConversationState, SessionContext};

/// One guest conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    /// Epoch seconds.
    pub started_at: i64,
    /// Epoch seconds of the last completed turn.
    pub last_message_at: i64,
    pub turn_count: usize,
    pub history: ChatHistory,
    pub context: SessionContext,
}

/// Listing entry for a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: String,
    pub started_at: String,
    pub last_message_at: String,
    pub turn_count: usize,
    pub stage: ConversationState,
}

impl Session {
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id.clone(),
            started_at: format_epoch(self.started_at),
            last_message_at: format_epoch(self.last_message_at),
            turn_count: self.turn_count,
            stage: self.context.journey_stage(),
        }
    }
}

// =============================================================================
// SessionManager
// =============================================================================

/// Creates, expires and updates sessions.
pub struct SessionManager {
    /// Exchanges kept per session; `None` keeps all.
    pub history_capacity: Option<usize>,
    pub session_timeout_minutes: u32,
}

impl SessionManager {
    pub fn new(history_capacity: Option<usize>, session_timeout_minutes: u32) -> Self {
        Self {
            history_capacity,
            session_timeout_minutes,
        }
    }

    /// Fresh session under `id`, or under a new UUID.
    pub fn create_session(&self, id: Option<&str>) -> Session {
        let now = Local::now().timestamp();
        let id = id
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        Session {
            id,
            started_at: now,
            last_message_at: now,
            turn_count: 0,
            history: ChatHistory::with_capacity(self.history_capacity),
            context: SessionContext::new(),
        }
    }

    pub fn is_expired(&self, session: &Session) -> bool {
        let now = Local::now().timestamp();
        let timeout_secs = i64::from(self.session_timeout_minutes) * 60;
        now - session.last_message_at > timeout_secs
    }

    /// Append a finished exchange and bump the turn counters.
    pub fn record_exchange(&self, session: &mut Session, question: &str, answer: &str) {
        session.last_message_at = Local::now().timestamp();
        session.turn_count += 1;
        if let Some(evicted) = session.history.push(Exchange::new(question, answer)) {
            tracing::debug!(
                session = %session.id,
                evicted = %evicted.question,
                "History full, evicted oldest exchange"
            );
        }
    }
}

/// Format epoch seconds as an RFC 3339 string.
pub fn format_epoch(epoch: i64) -> String {
    Local
        .timestamp_opt(epoch, 0)
        .single()
        .map(|dt: DateTime<Local>| dt.to_rfc3339())
        .unwrap_or_else(|| epoch.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_session_with_and_without_id() {
        let manager = SessionManager::new(Some(5), 30);
        let named = manager.create_session(Some("guest-1"));
        assert_eq!(named.id, "guest-1");
        assert_eq!(named.history.capacity(), Some(5));

        let anonymous = manager.create_session(None);
        assert!(Uuid::parse_str(&anonymous.id).is_ok());
    }

    #[test]
    fn test_expiry() {
        let manager = SessionManager::new(Some(5), 30);
        let mut session = manager.create_session(None);
        assert!(!manager.is_expired(&session));
        session.last_message_at -= 31 * 60;
        assert!(manager.is_expired(&session));
    }

    #[test]
    fn test_record_exchange_respects_capacity() {
        let manager = SessionManager::new(Some(2), 30);
        let mut session = manager.create_session(None);
        for i in 0..4 {
            manager.record_exchange(&mut session, &format!("q{}", i), "a");
        }
        assert_eq!(session.turn_count, 4);
        assert_eq!(session.history.len(), 2);
        assert_eq!(session.history.last_question(), Some("q3"));
    }

    #[test]
    fn test_format_epoch() {
        assert!(format_epoch(1_700_000_000).contains("2023"));
    }

    #[test]
    fn test_summary_reports_stage() {
        let manager = SessionManager::new(None, 30);
        let session = manager.create_session(Some("s"));
        let summary = session.summary();
        assert_eq!(summary.stage, ConversationState::Browsing);
        assert_eq!(summary.turn_count, 0);
    }
}
