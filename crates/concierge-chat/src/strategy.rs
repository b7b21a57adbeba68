//! Answer synthesis from retrieved passages.
//!
//! `Direct` streams a plain grounded answer. `Reasoning` asks for a JSON
//! object carrying the reasoning and the answer separately; output that
//! does not follow that shape is an error rather than a guess.

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::backend::{collect_stream, GenerationBackend};
use crate::error::ChatError;
use crate::response::ResponseGenerator;
use crate::types::{Complexity, RetrievedDocument};

/// How the final answer is generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SynthesisStrategy {
    Direct,
    Reasoning,
}

impl SynthesisStrategy {
    pub fn for_complexity(complexity: Complexity) -> Self {
        match complexity {
            Complexity::Simple => SynthesisStrategy::Direct,
            Complexity::Reasoning => SynthesisStrategy::Reasoning,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SynthesisStrategy::Direct => "direct",
            SynthesisStrategy::Reasoning => "reasoning",
        }
    }
}

impl fmt::Display for SynthesisStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of synthesis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Synthesis {
    pub answer: String,
    /// Reasoning returned by the reasoning strategy.
    pub reasoning: Option<String>,
    /// True when the answer was extracted from passages instead of generated.
    pub extractive: bool,
}

#[derive(Deserialize)]
struct ReasoningOutput {
    reasoning: String,
    answer: String,
}

/// Inputs to one synthesis call.
pub struct SynthesisRequest<'a> {
    pub question: &'a str,
    pub documents: &'a [RetrievedDocument],
    /// Rendered prior exchanges, oldest first.
    pub history: &'a str,
    pub max_tokens: usize,
}

/// Generates final answers with an optional backend.
pub struct Synthesizer {
    extractive: ResponseGenerator,
}

impl Default for Synthesizer {
    fn default() -> Self {
        Self::new(ResponseGenerator::default())
    }
}

impl Synthesizer {
    pub fn new(extractive: ResponseGenerator) -> Self {
        Self { extractive }
    }

    /// Produce an answer for `request`.
    ///
    /// Without a backend, or when the backend fails, the answer is
    /// extracted from the passages. Malformed reasoning output is the
    /// only error.
    pub async fn synthesize(
        &self,
        strategy: SynthesisStrategy,
        backend: Option<&dyn GenerationBackend>,
        request: &SynthesisRequest<'_>,
        sink: Option<&mpsc::Sender<String>>,
    ) -> Result<Synthesis, ChatError> {
        let Some(backend) = backend else {
            return Ok(self.extract(request));
        };

        match strategy {
            SynthesisStrategy::Direct => {
                let prompt = direct_prompt(request);
                let streamed = match backend.stream(&prompt, request.max_tokens).await {
                    Ok(stream) => collect_stream(stream, sink).await,
                    Err(e) => Err(e),
                };
                match streamed {
                    Ok(text) if !text.trim().is_empty() => Ok(Synthesis {
                        answer: text.trim().to_string(),
                        reasoning: None,
                        extractive: false,
                    }),
                    Ok(_) => {
                        tracing::warn!(
                            backend = backend.name(),
                            "Backend returned an empty answer, using extractive answer"
                        );
                        Ok(self.extract(request))
                    }
                    Err(e) => {
                        tracing::warn!(
                            backend = backend.name(),
                            error = %e,
                            "Direct synthesis failed, using extractive answer"
                        );
                        Ok(self.extract(request))
                    }
                }
            }
            SynthesisStrategy::Reasoning => {
                let prompt = reasoning_prompt(request);
                let raw = match backend.generate(&prompt, request.max_tokens).await {
                    Ok(raw) => raw,
                    Err(e) => {
                        tracing::warn!(
                            backend = backend.name(),
                            error = %e,
                            "Reasoning synthesis failed, using extractive answer"
                        );
                        return Ok(self.extract(request));
                    }
                };
                let (reasoning, answer) = parse_reasoning_output(&raw)?;
                if let Some(sink) = sink {
                    let _ = sink.send(answer.clone()).await;
                }
                Ok(Synthesis {
                    answer,
                    reasoning: Some(reasoning),
                    extractive: false,
                })
            }
        }
    }

    fn extract(&self, request: &SynthesisRequest<'_>) -> Synthesis {
        let answer = self
            .extractive
            .compose_extractive(request.question, request.documents)
            .unwrap_or_default();
        Synthesis {
            answer,
            reasoning: None,
            extractive: true,
        }
    }
}

/// Parse `{"reasoning": ..., "answer": ...}` from backend output.
///
/// Surrounding prose or code fences are tolerated; anything else is a
/// `MalformedStrategyOutput` error.
pub fn parse_reasoning_output(raw: &str) -> Result<(String, String), ChatError> {
    let malformed = |detail: String| ChatError::MalformedStrategyOutput {
        strategy: SynthesisStrategy::Reasoning.name(),
        detail,
    };

    let start = raw.find('{');
    let end = raw.rfind('}');
    let json = match (start, end) {
        (Some(s), Some(e)) if s < e => &raw[s..=e],
        _ => {
            return Err(malformed(
                "expected a JSON object with \"reasoning\" and \"answer\" fields, found no object"
                    .to_string(),
            ))
        }
    };

    let output: ReasoningOutput = serde_json::from_str(json).map_err(|e| {
        malformed(format!(
            "expected a JSON object with string fields \"reasoning\" and \"answer\": {}",
            e
        ))
    })?;
    if output.answer.trim().is_empty() {
        return Err(malformed("the \"answer\" field is empty".to_string()));
    }
    Ok((output.reasoning.trim().to_string(), output.answer.trim().to_string()))
}

fn context_block(documents: &[RetrievedDocument]) -> String {
    documents
        .iter()
        .enumerate()
        .map(|(i, d)| format!("[{}] {}", i + 1, d.content.trim()))
        .collect::<Vec<_>>()
        .join("\n")
}

fn direct_prompt(request: &SynthesisRequest<'_>) -> String {
    format!(
        "You are the concierge of a cottage resort. Answer the guest using only the context below. \
         If the context does not contain the answer, say so.\n\n\
         Context:\n{}\n\nConversation so far:\n{}\n\nGuest: {}\nConcierge:",
        context_block(request.documents),
        request.history,
        request.question.trim()
    )
}

fn reasoning_prompt(request: &SynthesisRequest<'_>) -> String {
    format!(
        "You are the concierge of a cottage resort. Work out the answer step by step using only the context below. \
         The first context passage, when marked as analysis, is authoritative.\n\
         Reply with a JSON object: {{\"reasoning\": \"<your steps>\", \"answer\": \"<reply to the guest>\"}}.\n\n\
         Context:\n{}\n\nConversation so far:\n{}\n\nGuest: {}\nJSON:",
        context_block(request.documents),
        request.history,
        request.question.trim()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ScriptedBackend;

    fn documents() -> Vec<RetrievedDocument> {
        vec![RetrievedDocument::new("Check-out is at 11 AM. Breakfast is served from 8 AM.")]
    }

    fn request<'a>(docs: &'a [RetrievedDocument], question: &'a str) -> SynthesisRequest<'a> {
        SynthesisRequest {
            question,
            documents: docs,
            history: "",
            max_tokens: 256,
        }
    }

    #[test]
    fn test_strategy_from_complexity() {
        assert_eq!(
            SynthesisStrategy::for_complexity(Complexity::Simple),
            SynthesisStrategy::Direct
        );
        assert_eq!(
            SynthesisStrategy::for_complexity(Complexity::Reasoning),
            SynthesisStrategy::Reasoning
        );
    }

    #[tokio::test]
    async fn test_direct_streams_to_sink() {
        let docs = documents();
        let backend = ScriptedBackend::replying("Check-out is at 11 AM.");
        let (tx, mut rx) = mpsc::channel(32);
        let request = request(&docs, "when is check-out");
        let out = Synthesizer::default()
            .synthesize(SynthesisStrategy::Direct, Some(&backend), &request, Some(&tx))
            .await
            .unwrap();
        drop(tx);
        assert_eq!(out.answer, "Check-out is at 11 AM.");
        assert!(!out.extractive);
        let mut streamed = String::new();
        while let Some(t) = rx.recv().await {
            streamed.push_str(&t);
        }
        assert_eq!(streamed, "Check-out is at 11 AM.");
        assert!(backend.prompts()[0].contains("[1] Check-out is at 11 AM."));
    }

    #[tokio::test]
    async fn test_reasoning_parses_json() {
        let docs = documents();
        let backend = ScriptedBackend::replying(
            r#"Sure! {"reasoning": "Context says 11 AM.", "answer": "Check-out is at 11 AM."}"#,
        );
        let request = request(&docs, "when is check-out");
        let out = Synthesizer::default()
            .synthesize(SynthesisStrategy::Reasoning, Some(&backend), &request, None)
            .await
            .unwrap();
        assert_eq!(out.answer, "Check-out is at 11 AM.");
        assert_eq!(out.reasoning.as_deref(), Some("Context says 11 AM."));
    }

    #[tokio::test]
    async fn test_reasoning_malformed_output_fails_loudly() {
        let docs = documents();
        let backend = ScriptedBackend::replying("Check-out is at 11 AM.");
        let request = request(&docs, "when is check-out");
        let err = Synthesizer::default()
            .synthesize(SynthesisStrategy::Reasoning, Some(&backend), &request, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::MalformedStrategyOutput { strategy: "reasoning", .. }));
    }

    #[tokio::test]
    async fn test_backend_failure_degrades_to_extractive() {
        let docs = documents();
        let backend = ScriptedBackend::failing("offline");
        for strategy in [SynthesisStrategy::Direct, SynthesisStrategy::Reasoning] {
            let out = Synthesizer::default()
                .synthesize(strategy, Some(&backend), &request(&docs, "when is breakfast"), None)
                .await
                .unwrap();
            assert!(out.extractive);
            assert_eq!(out.answer, "Breakfast is served from 8 AM.");
        }
    }

    #[tokio::test]
    async fn test_no_backend_is_extractive() {
        let docs = documents();
        let out = Synthesizer::default()
            .synthesize(SynthesisStrategy::Direct, None, &request(&docs, "when is breakfast"), None)
            .await
            .unwrap();
        assert!(out.extractive);
    }

    #[test]
    fn test_parse_reasoning_output_errors() {
        assert!(parse_reasoning_output("no json here").is_err());
        assert!(parse_reasoning_output(r#"{"answer": "x"}"#).is_err());
        assert!(parse_reasoning_output(r#"{"reasoning": "r", "answer": "  "}"#).is_err());
        let fenced = "```json\n{\"reasoning\": \"r\", \"answer\": \"a\"}\n```";
        let (r, a) = parse_reasoning_output(fenced).unwrap();
        assert_eq!((r.as_str(), a.as_str()), ("r", "a"));
    }
}
