//! Generation backend seam.
//!
//! The concierge never hosts a model. It talks to whatever text-generation
//! capability the host provides through [`GenerationBackend`]. Calls made
//! for classification, scoring or refinement go through
//! [`call_with_timeout`], which turns every failure into `None` so the
//! caller can keep its rule-only result.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::ChatError;

/// Tokens produced by a streaming generation call.
pub type TokenStream = mpsc::Receiver<Result<String, ChatError>>;

/// Text-generation capability supplied by the host application.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Generate a completion for `prompt` within `max_tokens`.
    async fn generate(&self, prompt: &str, max_tokens: usize) -> Result<String, ChatError>;

    /// Stream a completion for `prompt` token by token.
    async fn stream(&self, prompt: &str, max_tokens: usize) -> Result<TokenStream, ChatError>;

    /// Short name used in logs.
    fn name(&self) -> &str {
        "backend"
    }
}

/// Call the backend once, bounded by `timeout`.
///
/// An elapsed timeout becomes `ChatError::BackendTimeout`.
pub async fn generate_with_timeout(
    backend: &dyn GenerationBackend,
    prompt: &str,
    max_tokens: usize,
    timeout: Duration,
) -> Result<String, ChatError> {
    tokio::time::timeout(timeout, backend.generate(prompt, max_tokens))
        .await
        .map_err(|_| ChatError::BackendTimeout(timeout.as_millis() as u64))?
}

/// Call the backend with a timeout, downgrading any failure to `None`.
///
/// `purpose` names the calling stage in the log line.
pub async fn call_with_timeout(
    backend: &dyn GenerationBackend,
    prompt: &str,
    max_tokens: usize,
    timeout: Duration,
    purpose: &'static str,
) -> Option<String> {
    match generate_with_timeout(backend, prompt, max_tokens, timeout).await {
        Ok(text) => Some(text),
        Err(e) => {
            tracing::warn!(
                backend = backend.name(),
                purpose,
                error = %e,
                "Backend call failed, using rule-based result"
            );
            None
        }
    }
}

/// Drain a token stream into a string, forwarding each token to `sink`.
pub async fn collect_stream(
    mut stream: TokenStream,
    sink: Option<&mpsc::Sender<String>>,
) -> Result<String, ChatError> {
    let mut text = String::new();
    while let Some(token) = stream.recv().await {
        let token = token?;
        if let Some(sink) = sink {
            // A dropped receiver only means nobody is watching.
            let _ = sink.send(token.clone()).await;
        }
        text.push_str(&token);
    }
    Ok(text)
}

// =============================================================================
// ScriptedBackend
// =============================================================================

type Responder = Box<dyn Fn(&str) -> Result<String, ChatError> + Send + Sync>;

/// Deterministic backend for tests and offline runs.
///
/// Replies come from a closure over the prompt, optionally after a delay.
/// Every prompt is recorded.
pub struct ScriptedBackend {
    responder: Responder,
    delay: Option<Duration>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&str) -> Result<String, ChatError> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            delay: None,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Always reply with `text`.
    pub fn replying(text: &str) -> Self {
        let text = text.to_string();
        Self::new(move |_| Ok(text.clone()))
    }

    /// Always fail with a backend error.
    pub fn failing(message: &str) -> Self {
        let message = message.to_string();
        Self::new(move |_| Err(ChatError::Backend(message.clone())))
    }

    /// Sleep before every reply.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }

    async fn reply(&self, prompt: &str) -> Result<String, ChatError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        (self.responder)(prompt)
    }
}

#[async_trait]
impl GenerationBackend for ScriptedBackend {
    async fn generate(&self, prompt: &str, max_tokens: usize) -> Result<String, ChatError> {
        let text = self.reply(prompt).await?;
        Ok(truncate_words(&text, max_tokens))
    }

    async fn stream(&self, prompt: &str, max_tokens: usize) -> Result<TokenStream, ChatError> {
        let text = truncate_words(&self.reply(prompt).await?, max_tokens);
        let tokens = split_tokens(&text);
        let (tx, rx) = mpsc::channel(tokens.len().max(1));
        for token in tokens {
            tx.try_send(Ok(token))
                .map_err(|e| ChatError::Backend(format!("stream buffer: {}", e)))?;
        }
        Ok(rx)
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Keep at most `max_tokens` whitespace-separated words.
fn truncate_words(text: &str, max_tokens: usize) -> String {
    if text.split_whitespace().count() <= max_tokens {
        return text.to_string();
    }
    text.split_whitespace()
        .take(max_tokens)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Split text into word tokens that keep their leading whitespace.
fn split_tokens(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    for c in text.chars() {
        if c.is_whitespace() && !current.trim().is_empty() {
            tokens.push(std::mem::take(&mut current));
        }
        current.push(c);
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_generate() {
        let backend = ScriptedBackend::replying("pricing");
        let out = backend.generate("classify", 8).await.unwrap();
        assert_eq!(out, "pricing");
        assert_eq!(backend.call_count(), 1);
        assert_eq!(backend.prompts(), vec!["classify".to_string()]);
    }

    #[tokio::test]
    async fn test_generate_truncates_to_budget() {
        let backend = ScriptedBackend::replying("one two three four");
        assert_eq!(backend.generate("p", 2).await.unwrap(), "one two");
    }

    #[tokio::test]
    async fn test_stream_reassembles_text() {
        let backend = ScriptedBackend::replying("Cottage 9 faces the lake.");
        let stream = backend.stream("p", 100).await.unwrap();
        let text = collect_stream(stream, None).await.unwrap();
        assert_eq!(text, "Cottage 9 faces the lake.");
    }

    #[tokio::test]
    async fn test_stream_forwards_tokens_to_sink() {
        let backend = ScriptedBackend::replying("a b c");
        let (tx, mut rx) = mpsc::channel(16);
        let stream = backend.stream("p", 100).await.unwrap();
        collect_stream(stream, Some(&tx)).await.unwrap();
        drop(tx);
        let mut seen = Vec::new();
        while let Some(t) = rx.recv().await {
            seen.push(t);
        }
        assert_eq!(seen, vec!["a", " b", " c"]);
    }

    #[tokio::test]
    async fn test_call_with_timeout_success() {
        let backend = ScriptedBackend::replying("ok");
        let out = call_with_timeout(&backend, "p", 4, Duration::from_millis(200), "test").await;
        assert_eq!(out.as_deref(), Some("ok"));
    }

    #[tokio::test]
    async fn test_call_with_timeout_error_is_none() {
        let backend = ScriptedBackend::failing("down");
        let out = call_with_timeout(&backend, "p", 4, Duration::from_millis(200), "test").await;
        assert!(out.is_none());
    }

    #[tokio::test]
    async fn test_call_with_timeout_slow_backend_is_none() {
        let backend = ScriptedBackend::replying("late").with_delay(Duration::from_millis(200));
        let out = call_with_timeout(&backend, "p", 4, Duration::from_millis(20), "test").await;
        assert!(out.is_none());
    }

    #[tokio::test]
    async fn test_generate_with_timeout_reports_elapsed_budget() {
        let backend = ScriptedBackend::replying("late").with_delay(Duration::from_millis(200));
        let err = generate_with_timeout(&backend, "p", 4, Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::BackendTimeout(20)));
    }

    #[tokio::test]
    async fn test_generate_with_timeout_passes_backend_errors_through() {
        let backend = ScriptedBackend::failing("down");
        let err = generate_with_timeout(&backend, "p", 4, Duration::from_millis(200))
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::Backend(_)));
    }

    #[test]
    fn test_split_tokens() {
        assert_eq!(split_tokens("hi there  you"), vec!["hi", " there", "  you"]);
        assert!(split_tokens("").is_empty());
    }
}
