//! Ordered pattern rules shared by the classifiers.
//!
//! A rule set is a list of (matcher, outcome) pairs evaluated top to
//! bottom. Precedence lives in the data rather than in control flow, so
//! each classifier can expose and test its order directly.

use regex::Regex;

/// How a rule decides whether it fires.
pub enum Matcher {
    /// Fires when at least `min_hits` of the patterns match.
    Patterns { patterns: Vec<Regex>, min_hits: usize },
    /// Fires when the predicate returns true.
    Predicate(fn(&str) -> bool),
}

impl Matcher {
    /// Compile a pattern matcher that fires on any single hit.
    ///
    /// Patterns are static literals; a bad one is a programming error.
    pub fn any(patterns: &[&str]) -> Self {
        Self::at_least(patterns, 1)
    }

    /// Compile a pattern matcher that needs `min_hits` distinct hits.
    pub fn at_least(patterns: &[&str], min_hits: usize) -> Self {
        Matcher::Patterns {
            patterns: patterns
                .iter()
                .map(|p| Regex::new(p).expect("Invalid rule regex"))
                .collect(),
            min_hits,
        }
    }

    /// Number of patterns matching `text` (1 or 0 for predicates).
    pub fn hits(&self, text: &str) -> usize {
        match self {
            Matcher::Patterns { patterns, .. } => {
                patterns.iter().filter(|re| re.is_match(text)).count()
            }
            Matcher::Predicate(f) => usize::from(f(text)),
        }
    }

    pub fn matches(&self, text: &str) -> bool {
        match self {
            Matcher::Patterns { min_hits, .. } => self.hits(text) >= (*min_hits).max(1),
            Matcher::Predicate(f) => f(text),
        }
    }
}

/// One rule: a matcher and the outcome it yields.
pub struct Rule<T> {
    pub label: &'static str,
    pub matcher: Matcher,
    pub outcome: T,
}

/// First-match-wins list of rules.
pub struct RuleSet<T> {
    rules: Vec<Rule<T>>,
}

impl<T: Copy> RuleSet<T> {
    pub fn new(rules: Vec<Rule<T>>) -> Self {
        Self { rules }
    }

    /// Outcome of the first rule that fires.
    pub fn first_match(&self, text: &str) -> Option<T> {
        self.first_rule(text).map(|r| r.outcome)
    }

    /// The first rule that fires, for callers that want its label.
    pub fn first_rule(&self, text: &str) -> Option<&Rule<T>> {
        self.rules.iter().find(|r| r.matcher.matches(text))
    }

    /// Outcomes in evaluation order.
    pub fn order(&self) -> Vec<T> {
        self.rules.iter().map(|r| r.outcome).collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
