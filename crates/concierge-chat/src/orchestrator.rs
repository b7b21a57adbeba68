//! Concierge orchestrator: central coordinator of the decision pipeline.
//!
//! A turn runs refinement, classification, extraction, deterministic
//! reasoning, retrieval, synthesis, confidence scoring, fallback and tone
//! adjustment, then records the exchange in the guest's session.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use concierge_core::config::{BackendConfig, ChatConfig};
use concierge_core::{ConciergeConfig, CottageRegistry};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::backend::GenerationBackend;
use crate::capacity::{CapacityReasoner, CapacityResult};
use crate::complexity::ComplexityClassifier;
use crate::confidence::ConfidenceScorer;
use crate::entity::{EntityExtractor, ExtractedEntities};
use crate::error::ChatError;
use crate::fallback::fallback_for;
use crate::history::ChatHistory;
use crate::intent::IntentClassifier;
use crate::inventory::{inventory_answer, is_inventory_query};
use crate::pricing::{PricingAnalysis, PricingReasoner};
use crate::refinement::{RefinementDetector, RefinementResult};
use crate::response::{conversational_answer, ResponseGenerator, REFUSAL_MESSAGE};
use crate::retrieval::Retriever;
use crate::sentiment::{adjust_tone, Sentiment, SentimentAnalyzer};
use crate::session::{Session, SessionManager, SessionSummary};
use crate::state::ConversationState;
use crate::strategy::{SynthesisRequest, SynthesisStrategy, Synthesizer};
use crate::types::{prepend_analysis, Complexity, Intent, RetrievedDocument, Route, TurnOutcome};

/// Everything decided about a turn before any answer is generated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnPlan {
    pub session_id: String,
    pub utterance: String,
    /// The question to answer: the refined question when a refinement
    /// applied, otherwise the utterance.
    pub question: String,
    pub refinement: Option<RefinementResult>,
    pub intent: Intent,
    pub complexity: Complexity,
    pub strategy: SynthesisStrategy,
    pub entities: ExtractedEntities,
    pub sentiment: Sentiment,
    pub capacity: Option<CapacityResult>,
    pub pricing: Option<PricingAnalysis>,
    /// Set when rules answered the turn on their own.
    pub deterministic_answer: Option<String>,
    /// Grounding passages, analysis documents first.
    pub documents: Vec<RetrievedDocument>,
    /// What the retriever returned, without analysis documents.
    pub retrieved: Vec<RetrievedDocument>,
}

/// Central orchestrator shared by all sessions.
pub struct ConciergeOrchestrator {
    chat: ChatConfig,
    backend_config: BackendConfig,
    registry: Arc<CottageRegistry>,
    extractor: EntityExtractor,
    intents: IntentClassifier,
    complexity: ComplexityClassifier,
    refinement: RefinementDetector,
    capacity: CapacityReasoner,
    pricing: PricingReasoner,
    sentiment: SentimentAnalyzer,
    confidence: ConfidenceScorer,
    synthesizer: Synthesizer,
    responses: ResponseGenerator,
    session_manager: SessionManager,
    sessions: Mutex<HashMap<String, Session>>,
    retriever: Arc<dyn Retriever>,
    backend: Option<Arc<dyn GenerationBackend>>,
}

impl ConciergeOrchestrator {
    /// Build the pipeline from configuration.
    ///
    /// Fails only if the configured cottage list is invalid.
    pub fn new(config: &ConciergeConfig, retriever: Arc<dyn Retriever>) -> Result<Self, ChatError> {
        let registry = Arc::new(config.registry()?);
        Ok(Self {
            chat: config.chat.clone(),
            backend_config: config.backend.clone(),
            extractor: EntityExtractor::new(Arc::clone(&registry)),
            intents: IntentClassifier::new(),
            complexity: ComplexityClassifier::new(),
            refinement: RefinementDetector::new(&config.refinement),
            capacity: CapacityReasoner::new(Arc::clone(&registry)),
            pricing: PricingReasoner::new(Arc::clone(&registry), config.pricing.clone()),
            sentiment: SentimentAnalyzer::new(),
            confidence: ConfidenceScorer::new(config.confidence.clone()),
            synthesizer: Synthesizer::default(),
            responses: ResponseGenerator::default(),
            session_manager: SessionManager::new(
                config.chat.history_capacity,
                config.chat.session_timeout_minutes,
            ),
            sessions: Mutex::new(HashMap::new()),
            registry,
            retriever,
            backend: None,
        })
    }

    /// Attach a generation backend.
    pub fn with_backend(mut self, backend: Arc<dyn GenerationBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn registry(&self) -> &CottageRegistry {
        &self.registry
    }

    pub fn has_backend(&self) -> bool {
        self.backend.is_some()
    }

    fn backend_ref(&self) -> Option<&dyn GenerationBackend> {
        self.backend.as_deref()
    }

    fn backend_timeout(&self) -> Duration {
        Duration::from_millis(self.backend_config.timeout_ms)
    }

    fn lock_sessions(&self) -> Result<MutexGuard<'_, HashMap<String, Session>>, ChatError> {
        self.sessions
            .lock()
            .map_err(|e| ChatError::SessionStore(format!("session lock poisoned: {}", e)))
    }

    // =========================================================================
    // Turns
    // =========================================================================

    /// Process one guest utterance end to end.
    pub async fn handle_turn(
        &self,
        session_id: Option<&str>,
        utterance: &str,
    ) -> Result<TurnOutcome, ChatError> {
        self.handle_turn_streaming(session_id, utterance, None).await
    }

    /// Process one utterance, forwarding generated tokens to `sink`.
    pub async fn handle_turn_streaming(
        &self,
        session_id: Option<&str>,
        utterance: &str,
        sink: Option<&mpsc::Sender<String>>,
    ) -> Result<TurnOutcome, ChatError> {
        let (plan, history) = self.plan(session_id, utterance).await?;

        let mut retrieval_confidence = None;
        let mut answer_relevance = None;
        let mut suggestions = self.responses.suggestions(plan.intent);

        let (answer, route) = if let Some(answer) = &plan.deterministic_answer {
            (answer.clone(), Route::Deterministic)
        } else if plan.documents.is_empty() {
            tracing::info!(
                session = %plan.session_id,
                question = %plan.question,
                "No grounding passages, refusing"
            );
            (REFUSAL_MESSAGE.to_string(), Route::Refused)
        } else if plan.retrieved.is_empty() {
            // Only analysis documents: answer from them without generation.
            tracing::info!(
                session = %plan.session_id,
                analyses = plan.documents.len(),
                "No retrieved passages, answering from analysis"
            );
            (analysis_answer(&plan.documents), Route::Deterministic)
        } else {
            let rendered = history.render();
            let request = SynthesisRequest {
                question: &plan.question,
                documents: &plan.documents,
                history: &rendered,
                max_tokens: self.backend_config.generation_max_tokens,
            };
            let synthesis = self
                .synthesizer
                .synthesize(plan.strategy, self.backend_ref(), &request, sink)
                .await?;

            let retrieval = self.confidence.retrieval_confidence(&plan.retrieved);
            let relevance = self
                .confidence
                .answer_relevance_with_backend(
                    &plan.question,
                    &synthesis.answer,
                    self.backend_ref(),
                    self.backend_timeout(),
                    self.backend_config.classification_max_tokens,
                )
                .await;
            retrieval_confidence = Some(retrieval.value());
            answer_relevance = Some(relevance.value());
            tracing::debug!(
                retrieval = retrieval.value(),
                relevance = relevance.value(),
                label = %retrieval.label(),
                extractive = synthesis.extractive,
                "Scored answer"
            );

            if self.confidence.should_fallback(retrieval, relevance) {
                let fallback = fallback_for(plan.intent, &plan.question);
                suggestions = fallback.suggestions;
                (fallback.message, Route::Fallback)
            } else {
                (synthesis.answer, Route::Grounded)
            }
        };

        let answer = adjust_tone(&answer, plan.sentiment);
        let (turn_index, stage) = self.record_turn(&plan, &answer)?;

        tracing::info!(
            session = %plan.session_id,
            turn = turn_index,
            intent = %plan.intent,
            complexity = %plan.complexity,
            route = ?route,
            stage = %stage,
            "Turn handled"
        );

        Ok(TurnOutcome {
            session_id: plan.session_id.clone(),
            turn_index,
            answer,
            intent: plan.intent,
            complexity: plan.complexity,
            route,
            refined_question: plan.refinement.as_ref().map(|r| r.combined_question.clone()),
            retrieval_confidence,
            answer_relevance,
            sentiment: plan.sentiment,
            escalate: plan.sentiment.should_escalate(),
            stage,
            suggestions,
        })
    }

    /// Plan a turn without generating an answer or touching session state.
    ///
    /// The session is created if it does not exist yet.
    pub async fn prepare_turn(
        &self,
        session_id: Option<&str>,
        utterance: &str,
    ) -> Result<TurnPlan, ChatError> {
        self.plan(session_id, utterance).await.map(|(plan, _)| plan)
    }

    async fn plan(
        &self,
        session_id: Option<&str>,
        utterance: &str,
    ) -> Result<(TurnPlan, ChatHistory), ChatError> {
        self.validate(utterance)?;
        let utterance = utterance.trim();
        let (sid, history) = self.resolve_session(session_id)?;

        let timeout = self.backend_timeout();
        let refinement = self
            .refinement
            .refine_with_backend(
                utterance,
                &history,
                self.backend_ref(),
                timeout,
                self.backend_config.rewrite_max_tokens,
            )
            .await;
        let question = refinement
            .as_ref()
            .map(|r| r.combined_question.clone())
            .unwrap_or_else(|| utterance.to_string());

        let max_tokens = self.backend_config.classification_max_tokens;
        let intent = self
            .intents
            .classify_with_backend(&question, self.backend_ref(), timeout, max_tokens)
            .await;
        let complexity = self.complexity.classify(&question, intent);
        let entities = self.extractor.extract(&question);
        let sentiment = self
            .sentiment
            .analyze_with_backend(utterance, self.backend_ref(), timeout, max_tokens)
            .await;

        let mut plan = TurnPlan {
            session_id: sid,
            utterance: utterance.to_string(),
            question,
            refinement,
            intent,
            complexity,
            strategy: SynthesisStrategy::for_complexity(complexity),
            entities,
            sentiment,
            capacity: None,
            pricing: None,
            deterministic_answer: None,
            documents: Vec::new(),
            retrieved: Vec::new(),
        };

        if let Some(answer) = conversational_answer(intent) {
            plan.deterministic_answer = Some(answer.to_string());
            return Ok((plan, history));
        }

        if is_inventory_query(&plan.question) {
            let (summary, answer) = inventory_answer(&self.registry);
            tracing::debug!(total = summary.total, "Answered from cottage inventory");
            plan.deterministic_answer = Some(answer);
            return Ok((plan, history));
        }

        self.analyze(&mut plan);
        if plan.deterministic_answer.is_some() {
            return Ok((plan, history));
        }

        plan.retrieved = match self.retriever.retrieve(&plan.question, self.chat.top_k).await {
            Ok(docs) => docs,
            Err(e) => {
                tracing::error!(error = %e, "Retrieval failed, treating as no grounding");
                Vec::new()
            }
        };
        let mut documents = plan.retrieved.clone();
        if let Some(doc) = plan.pricing.as_ref().and_then(PricingAnalysis::to_document) {
            prepend_analysis(&mut documents, doc);
        }
        if let Some(doc) = plan.capacity.as_ref().and_then(CapacityResult::to_document) {
            prepend_analysis(&mut documents, doc);
        }
        plan.documents = documents;

        Ok((plan, history))
    }

    /// Deterministic capacity and pricing reasoning.
    fn analyze(&self, plan: &mut TurnPlan) {
        let wants_capacity = plan.intent == Intent::Capacity
            || (plan.entities.is_capacity_query
                && !matches!(plan.intent, Intent::Pricing | Intent::Booking));
        if wants_capacity {
            let result = self.capacity.analyze_entities(&plan.question, &plan.entities);
            let answers_turn = matches!(
                plan.intent,
                Intent::Capacity | Intent::Rooms | Intent::Statement | Intent::Unknown
            );
            if result.complete && answers_turn {
                tracing::debug!(verdict = %result.verdict, "Capacity resolved deterministically");
                plan.deterministic_answer = Some(result.explanation.clone());
            }
            plan.capacity = Some(result);
        }

        if plan.intent == Intent::Pricing {
            let analysis = self.pricing.analyze(&plan.entities);
            if analysis.is_resolved() && plan.deterministic_answer.is_none() {
                tracing::debug!("Pricing resolved deterministically");
                plan.deterministic_answer = Some(analysis.explanation.clone());
            }
            plan.pricing = Some(analysis);
        }
    }

    fn validate(&self, utterance: &str) -> Result<(), ChatError> {
        if !self.chat.enabled {
            return Err(ChatError::Disabled);
        }
        if utterance.trim().is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        if utterance.chars().count() > self.chat.max_message_length {
            return Err(ChatError::MessageTooLong(self.chat.max_message_length));
        }
        Ok(())
    }

    /// Resolve or create a session, returning its id and a history snapshot.
    ///
    /// Unknown ids get a fresh session under the same id; expired sessions
    /// are replaced by a fresh one.
    fn resolve_session(&self, requested: Option<&str>) -> Result<(String, ChatHistory), ChatError> {
        let mut sessions = self.lock_sessions()?;

        if let Some(id) = requested {
            let expired = sessions.get(id).map(|s| self.session_manager.is_expired(s));
            match expired {
                Some(false) => {
                    let history = sessions.get(id).map(|s| s.history.clone()).unwrap_or_default();
                    return Ok((id.to_string(), history));
                }
                Some(true) => {
                    tracing::info!(session = id, "Session expired, starting fresh");
                }
                None => {}
            }
        }

        let session = self.session_manager.create_session(requested);
        let sid = session.id.clone();
        let history = session.history.clone();
        sessions.insert(sid.clone(), session);
        Ok((sid, history))
    }

    fn record_turn(
        &self,
        plan: &TurnPlan,
        answer: &str,
    ) -> Result<(usize, ConversationState), ChatError> {
        let mut sessions = self.lock_sessions()?;
        let session = sessions
            .entry(plan.session_id.clone())
            .or_insert_with(|| self.session_manager.create_session(Some(&plan.session_id)));

        session.context.record_turn(plan.intent, &plan.question, &plan.entities);
        if let Some(capacity) = plan.capacity.as_ref().filter(|c| c.complete) {
            session.context.add_key_point("capacity", capacity.verdict.to_string());
        }
        if let Some(quote) = plan.pricing.as_ref().and_then(|p| p.quote.as_ref()) {
            session
                .context
                .add_key_point("quote", format!("{} {}", quote.currency, quote.total));
        }
        self.session_manager.record_exchange(session, &plan.question, answer);
        Ok((session.turn_count, session.context.journey_stage()))
    }

    // =========================================================================
    // Sessions
    // =========================================================================

    /// Copy of a session's current state.
    pub fn session_snapshot(&self, session_id: &str) -> Result<Session, ChatError> {
        self.lock_sessions()?
            .get(session_id)
            .cloned()
            .ok_or_else(|| ChatError::SessionNotFound(session_id.to_string()))
    }

    pub fn list_sessions(&self) -> Vec<SessionSummary> {
        match self.lock_sessions() {
            Ok(sessions) => sessions.values().map(Session::summary).collect(),
            Err(e) => {
                tracing::error!(error = %e, "Cannot list sessions");
                Vec::new()
            }
        }
    }

    /// Reset a session's history and context, keeping the id.
    pub fn clear_session(&self, session_id: &str) -> Result<(), ChatError> {
        let mut sessions = self.lock_sessions()?;
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| ChatError::SessionNotFound(session_id.to_string()))?;
        session.history.clear();
        session.context.clear();
        tracing::info!(session = session_id, "Session cleared");
        Ok(())
    }

    pub fn delete_session(&self, session_id: &str) -> Result<(), ChatError> {
        self.lock_sessions()?
            .remove(session_id)
            .map(|_| ())
            .ok_or_else(|| ChatError::SessionNotFound(session_id.to_string()))
    }

    /// Mark the session's booking as completed.
    pub fn complete_booking(&self, session_id: &str) -> Result<ConversationState, ChatError> {
        let mut sessions = self.lock_sessions()?;
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| ChatError::SessionNotFound(session_id.to_string()))?;
        session.context.complete_booking();
        Ok(session.context.journey_stage())
    }

    /// Drop every expired session, returning how many were removed.
    pub fn purge_expired(&self) -> Result<usize, ChatError> {
        let mut sessions = self.lock_sessions()?;
        let before = sessions.len();
        sessions.retain(|_, s| !self.session_manager.is_expired(s));
        let removed = before - sessions.len();
        if removed > 0 {
            tracing::info!(removed, "Purged expired sessions");
        }
        Ok(removed)
    }
}

// =============================================================================
// Tests
// =============================================================================

/// Answer text built from analysis documents alone.
fn analysis_answer(documents: &[RetrievedDocument]) -> String {
    documents
        .iter()
        .filter(|d| d.is_structured_analysis())
        .map(|d| d.content.trim())
        .collect::<Vec<_>>()
        .join("\n\n")
}
