//! Conversational decision layer for the cottage concierge.
//!
//! Turns a guest utterance into an answer: refinement of short follow-ups,
//! rule-based intent, complexity and sentiment classification, entity
//! extraction, deterministic capacity and pricing reasoning, grounded
//! synthesis, confidence scoring, fallback and per-session state.

pub mod backend;
pub mod capacity;
pub mod complexity;
pub mod confidence;
pub mod entity;
pub mod error;
pub mod fallback;
pub mod history;
pub mod intent;
pub mod inventory;
pub mod orchestrator;
pub mod pricing;
pub mod refinement;
pub mod response;
pub mod retrieval;
pub mod rules;
pub mod sentiment;
pub mod session;
pub mod state;
pub mod strategy;
pub mod types;

pub use backend::{GenerationBackend, ScriptedBackend, TokenStream};
pub use capacity::{CapacityReasoner, CapacityResult, CapacityVerdict};
pub use complexity::ComplexityClassifier;
pub use confidence::{ConfidenceLabel, ConfidenceScore, ConfidenceScorer};
pub use entity::{DateSignals, EntityExtractor, ExtractedEntities};
pub use error::ChatError;
pub use fallback::{fallback_for, FallbackResponse, FallbackTopic};
pub use history::{ChatHistory, Exchange};
pub use intent::IntentClassifier;
pub use orchestrator::{ConciergeOrchestrator, TurnPlan};
pub use pricing::{PriceQuote, PricingAnalysis, PricingReasoner};
pub use refinement::{Constraint, ConstraintKind, RefinementDetector, RefinementResult};
pub use response::{ResponseGenerator, REFUSAL_MESSAGE};
pub use retrieval::{InMemoryRetriever, Retriever};
pub use sentiment::{adjust_tone, Sentiment, SentimentAnalyzer};
pub use session::{Session, SessionManager, SessionSummary};
pub use state::{ConversationState, SessionContext};
pub use strategy::{Synthesis, SynthesisStrategy, Synthesizer};
pub use types::{Complexity, Intent, RetrievedDocument, Route, TurnOutcome};
