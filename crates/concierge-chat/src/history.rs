//! Bounded question/answer history for one session.

use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};

/// One question and the answer given to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exchange {
    pub question: String,
    pub answer: String,
}

impl Exchange {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
        }
    }
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "question: {} answer: {}", self.question, self.answer)
    }
}

/// FIFO history with an optional capacity.
///
/// Appending to a full history evicts exactly the oldest exchange, so the
/// length never exceeds the capacity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatHistory {
    capacity: Option<usize>,
    entries: VecDeque<Exchange>,
}

impl ChatHistory {
    /// History keeping at most `capacity` exchanges.
    pub fn bounded(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity),
            entries: VecDeque::with_capacity(capacity),
        }
    }

    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: Option<usize>) -> Self {
        match capacity {
            Some(n) => Self::bounded(n),
            None => Self::unbounded(),
        }
    }

    /// Append an exchange, returning the evicted one if the history was full.
    pub fn push(&mut self, exchange: Exchange) -> Option<Exchange> {
        match self.capacity {
            Some(0) => Some(exchange),
            Some(cap) => {
                let evicted = if self.entries.len() >= cap {
                    self.entries.pop_front()
                } else {
                    None
                };
                self.entries.push_back(exchange);
                evicted
            }
            None => {
                self.entries.push_back(exchange);
                None
            }
        }
    }

    pub fn last(&self) -> Option<&Exchange> {
        self.entries.back()
    }

    pub fn last_question(&self) -> Option<&str> {
        self.last().map(|e| e.question.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Exchange> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Rendered exchanges, oldest first, one per line.
    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Recover the question from a rendered history line.
///
/// Accepts both `question: … answer: …` lines and bare questions.
pub fn question_from_line(line: &str) -> &str {
    let lower = line.to_ascii_lowercase();
    let start = match lower.find("question:") {
        Some(idx) => idx + "question:".len(),
        None => return line.trim(),
    };
    let end = lower[start..]
        .find("answer:")
        .map(|idx| start + idx)
        .unwrap_or(line.len());
    line[start..end].trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounded_history_evicts_oldest() {
        let mut history = ChatHistory::bounded(3);
        for i in 0..3 {
            assert!(history.push(Exchange::new(format!("q{}", i), "a")).is_none());
        }
        let evicted = history.push(Exchange::new("q3", "a")).unwrap();
        assert_eq!(evicted.question, "q0");
        assert_eq!(history.len(), 3);
        let questions: Vec<_> = history.iter().map(|e| e.question.as_str()).collect();
        assert_eq!(questions, vec!["q1", "q2", "q3"]);
    }

    #[test]
    fn test_bounded_history_never_exceeds_capacity() {
        for cap in 0..6 {
            let mut history = ChatHistory::bounded(cap);
            for i in 0..20 {
                history.push(Exchange::new(format!("q{}", i), "a"));
                assert!(history.len() <= cap);
            }
        }
    }

    #[test]
    fn test_zero_capacity_keeps_nothing() {
        let mut history = ChatHistory::bounded(0);
        let rejected = history.push(Exchange::new("q", "a")).unwrap();
        assert_eq!(rejected.question, "q");
        assert!(history.is_empty());
    }

    #[test]
    fn test_unbounded_history_keeps_everything() {
        let mut history = ChatHistory::with_capacity(None);
        for i in 0..100 {
            history.push(Exchange::new(format!("q{}", i), "a"));
        }
        assert_eq!(history.len(), 100);
        assert_eq!(history.capacity(), None);
    }

    #[test]
    fn test_last_question_and_clear() {
        let mut history = ChatHistory::bounded(2);
        assert!(history.last_question().is_none());
        history.push(Exchange::new("price for cottage 7", "It depends on the dates."));
        assert_eq!(history.last_question(), Some("price for cottage 7"));
        history.clear();
        assert!(history.is_empty());
    }

    #[test]
    fn test_render() {
        let mut history = ChatHistory::bounded(2);
        history.push(Exchange::new("hi", "hello"));
        history.push(Exchange::new("price?", "varies"));
        assert_eq!(
            history.render(),
            "question: hi answer: hello\nquestion: price? answer: varies"
        );
    }

    #[test]
    fn test_question_from_line() {
        assert_eq!(
            question_from_line("... question: price for cottage 7 answer: it varies"),
            "price for cottage 7"
        );
        assert_eq!(question_from_line("Question: is there wifi?"), "is there wifi?");
        assert_eq!(question_from_line("  plain question  "), "plain question");
    }
}
