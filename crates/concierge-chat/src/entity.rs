//! Entity extraction: group size, cottage references and date signals.
//!
//! Numbers are only kept when their context says what they are. A number
//! right after "cottage" is a cottage reference; a number followed closely
//! by a guest noun is a group size. Anything else is discarded rather than
//! guessed.

use std::sync::{Arc, LazyLock};

use chrono::{Datelike, Local, Month, NaiveDate, Weekday};
use regex::Regex;
use serde::{Deserialize, Serialize};

use concierge_core::CottageRegistry;

/// Tokens after a number searched for a guest noun.
const GUEST_WINDOW: usize = 3;

static GUEST_NOUNS: &[&str] = &[
    "people", "person", "persons", "guests", "guest", "members", "member", "adults", "adult",
    "pax", "folks", "friends", "kids", "children", "child", "infants",
];

/// Nouns whose counts add up ("2 adults and 3 kids").
static PARTY_PART_NOUNS: &[&str] = &["adults", "adult", "kids", "children", "child", "infants"];

static GROUP_PREFIXES: &[&str] = &["group", "party", "family", "team", "batch"];

static NUMBER_WORDS: &[(&str, u32)] = &[
    ("one", 1),
    ("two", 2),
    ("three", 3),
    ("four", 4),
    ("five", 5),
    ("six", 6),
    ("seven", 7),
    ("eight", 8),
    ("nine", 9),
    ("ten", 10),
    ("eleven", 11),
    ("twelve", 12),
    ("thirteen", 13),
    ("fourteen", 14),
    ("fifteen", 15),
    ("sixteen", 16),
    ("seventeen", 17),
    ("eighteen", 18),
    ("nineteen", 19),
    ("twenty", 20),
];

static MONTHS: &[(&str, Month)] = &[
    ("january", Month::January),
    ("jan", Month::January),
    ("february", Month::February),
    ("feb", Month::February),
    ("march", Month::March),
    ("mar", Month::March),
    ("april", Month::April),
    ("apr", Month::April),
    ("may", Month::May),
    ("june", Month::June),
    ("jun", Month::June),
    ("july", Month::July),
    ("jul", Month::July),
    ("august", Month::August),
    ("aug", Month::August),
    ("september", Month::September),
    ("sept", Month::September),
    ("sep", Month::September),
    ("october", Month::October),
    ("oct", Month::October),
    ("november", Month::November),
    ("nov", Month::November),
    ("december", Month::December),
    ("dec", Month::December),
];

static WEEKDAYS: &[(&str, Weekday)] = &[
    ("monday", Weekday::Mon),
    ("tuesday", Weekday::Tue),
    ("wednesday", Weekday::Wed),
    ("thursday", Weekday::Thu),
    ("friday", Weekday::Fri),
    ("saturday", Weekday::Sat),
    ("sunday", Weekday::Sun),
];

static CAPACITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:accommodate|accomodate|fit|capacity|sleeps?|occupancy|suitable|enough\s+(?:room|space)|how\s+many\s+(?:people|guests|persons|adults|members)|max(?:imum)?\s+(?:guests|people|occupancy))\b",
    )
    .unwrap()
});

static ISO_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{4})-(\d{2})-(\d{2})\b").unwrap());

static DAY_MONTH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d{1,2})(?:st|nd|rd|th)?\s+(?:of\s+)?([a-z]{3,9})\b").unwrap()
});

static MONTH_DAY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b([a-z]{3,9})\s+(\d{1,2})(?:st|nd|rd|th)?\b").unwrap()
});

static MAY_CONTEXT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:in|of|during|early|late|mid|next|this)\s+may\b|\bmay\s+\d").unwrap()
});

// =============================================================================
// Types
// =============================================================================

/// Relative time phrases guests use instead of dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelativeDate {
    Tonight,
    Tomorrow,
    ThisWeekend,
    NextWeek,
    NextMonth,
}

/// Time-related signals found in an utterance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DateSignals {
    pub months: Vec<Month>,
    pub weekdays: Vec<Weekday>,
    pub relative: Vec<RelativeDate>,
    /// Fully resolved calendar dates.
    pub dates: Vec<NaiveDate>,
    pub mentions_weekend: bool,
    pub mentions_weekday: bool,
}

impl DateSignals {
    pub fn is_empty(&self) -> bool {
        self.months.is_empty()
            && self.weekdays.is_empty()
            && self.relative.is_empty()
            && self.dates.is_empty()
            && !self.mentions_weekend
            && !self.mentions_weekday
    }

    /// Whether the stay described falls on a weekend.
    pub fn is_weekend_stay(&self) -> bool {
        self.mentions_weekend
            || self.relative.contains(&RelativeDate::ThisWeekend)
            || self
                .weekdays
                .iter()
                .any(|d| matches!(d, Weekday::Fri | Weekday::Sat | Weekday::Sun))
            || self
                .dates
                .iter()
                .any(|d| matches!(d.weekday(), Weekday::Fri | Weekday::Sat))
    }
}

/// Everything the extractor pulled out of one utterance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedEntities {
    pub group_size: Option<u32>,
    /// A cottage the registry knows.
    pub cottage_number: Option<String>,
    /// A cottage reference the registry does not know.
    pub unknown_cottage: Option<String>,
    pub is_capacity_query: bool,
    pub nights: Option<u32>,
    pub dates: DateSignals,
}

// =============================================================================
// EntityExtractor
// =============================================================================

/// Rule-based extractor bound to the cottage registry.
pub struct EntityExtractor {
    registry: Arc<CottageRegistry>,
}

impl EntityExtractor {
    pub fn new(registry: Arc<CottageRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &CottageRegistry {
        &self.registry
    }

    /// Extract entities, resolving dates against today's local date.
    pub fn extract(&self, text: &str) -> ExtractedEntities {
        self.extract_on(text, Local::now().date_naive())
    }

    /// Extract entities, resolving dates against `today`.
    pub fn extract_on(&self, text: &str, today: NaiveDate) -> ExtractedEntities {
        let lower = text.to_lowercase();
        let tokens = tokenize(&lower);
        let mut consumed = vec![false; tokens.len()];

        // Cottage references first so their numbers are never read as group sizes.
        let mut cottage_number = None;
        let mut unknown_cottage = None;
        for (i, token) in tokens.iter().enumerate() {
            if !token.starts_with("cottage") {
                continue;
            }
            let mut j = i + 1;
            if matches!(tokens.get(j).copied(), Some("number" | "no" | "num")) {
                j += 1;
            }
            let Some(value) = tokens.get(j).and_then(|t| parse_number(t)) else {
                continue;
            };
            consumed[j] = true;
            let id = value.to_string();
            if self.registry.contains(&id) {
                cottage_number.get_or_insert(id);
            } else {
                unknown_cottage.get_or_insert(id);
            }
        }

        let group_size = extract_group_size(&tokens, &mut consumed);
        let nights = extract_nights(&tokens, &consumed);
        let dates = extract_dates(&lower, &tokens, today);
        let is_capacity_query = group_size.is_some() || CAPACITY_RE.is_match(&lower);

        ExtractedEntities {
            group_size,
            cottage_number,
            unknown_cottage,
            is_capacity_query,
            nights,
            dates,
        }
    }
}

/// Remove every "cottage N" mention of `number` from `text`.
pub fn strip_cottage_reference(text: &str, number: &str) -> String {
    let pattern = format!(
        r"(?i)\bcottages?\s*(?:number\s+|no\.?\s*|num\s+|#\s*)?0*{}\b",
        regex::escape(number)
    );
    let stripped = match Regex::new(&pattern) {
        Ok(re) => re.replace_all(text, " ").into_owned(),
        Err(_) => text.to_string(),
    };
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

// =============================================================================
// Helpers
// =============================================================================

fn tokenize(lower: &str) -> Vec<&str> {
    lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Parse a digit run or a number word.
pub(crate) fn parse_number(token: &str) -> Option<u32> {
    if !token.is_empty() && token.len() <= 4 && token.chars().all(|c| c.is_ascii_digit()) {
        return token.parse().ok();
    }
    NUMBER_WORDS
        .iter()
        .find(|(w, _)| *w == token)
        .map(|(_, n)| *n)
}

fn extract_group_size(tokens: &[&str], consumed: &mut [bool]) -> Option<u32> {
    let mut parts: Vec<(u32, &str)> = Vec::new();

    for i in 0..tokens.len() {
        if consumed[i] {
            continue;
        }
        let Some(value) = parse_number(tokens[i]) else {
            continue;
        };
        if value == 0 {
            continue;
        }

        let mut noun = None;
        for token in tokens.iter().skip(i + 1).take(GUEST_WINDOW) {
            if parse_number(token).is_some() {
                break;
            }
            if GUEST_NOUNS.contains(token) {
                noun = Some(*token);
                break;
            }
        }

        let of_us = tokens.get(i + 1) == Some(&"of") && tokens.get(i + 2) == Some(&"us");
        let prefixed = i >= 2
            && tokens[i - 1] == "of"
            && GROUP_PREFIXES.contains(&tokens[i - 2]);

        if let Some(noun) = noun {
            parts.push((value, noun));
        } else if of_us || prefixed {
            parts.push((value, "people"));
        } else {
            continue;
        }
        consumed[i] = true;
    }

    let first = parts.first()?;
    if parts.len() > 1 && parts.iter().all(|(_, n)| PARTY_PART_NOUNS.contains(n)) {
        Some(parts.iter().map(|(v, _)| v).sum())
    } else {
        Some(first.0)
    }
}

fn extract_nights(tokens: &[&str], consumed: &[bool]) -> Option<u32> {
    tokens.iter().enumerate().find_map(|(i, token)| {
        if consumed[i] {
            return None;
        }
        let value = parse_number(token)?;
        let next = tokens.get(i + 1).copied();
        let after = tokens.get(i + 2).copied();
        let is_nights = matches!(next, Some("night" | "nights"))
            || (matches!(next, Some("more" | "full")) && matches!(after, Some("night" | "nights")));
        (is_nights && value > 0).then_some(value)
    })
}

fn month_from_word(word: &str) -> Option<Month> {
    MONTHS
        .iter()
        .find(|(name, _)| *name == word)
        .map(|(_, m)| *m)
}

fn extract_dates(lower: &str, tokens: &[&str], today: NaiveDate) -> DateSignals {
    let mut signals = DateSignals::default();

    for token in tokens {
        if let Some(month) = month_from_word(token) {
            if month == Month::May && !MAY_CONTEXT_RE.is_match(lower) {
                continue;
            }
            if !signals.months.contains(&month) {
                signals.months.push(month);
            }
        }
        if let Some((_, day)) = WEEKDAYS.iter().find(|(name, _)| *name == *token) {
            if !signals.weekdays.contains(day) {
                signals.weekdays.push(*day);
            }
        }
        match *token {
            "weekend" | "weekends" => signals.mentions_weekend = true,
            "weekday" | "weekdays" | "weeknight" | "weeknights" => {
                signals.mentions_weekday = true
            }
            "tonight" => push_unique(&mut signals.relative, RelativeDate::Tonight),
            "tomorrow" => push_unique(&mut signals.relative, RelativeDate::Tomorrow),
            _ => {}
        }
    }

    for pair in tokens.windows(2) {
        match pair {
            ["this", "weekend"] => push_unique(&mut signals.relative, RelativeDate::ThisWeekend),
            ["next", "week"] => push_unique(&mut signals.relative, RelativeDate::NextWeek),
            ["next", "month"] => push_unique(&mut signals.relative, RelativeDate::NextMonth),
            _ => {}
        }
    }

    for caps in ISO_DATE_RE.captures_iter(lower) {
        let parsed = (|| {
            let y = caps.get(1)?.as_str().parse().ok()?;
            let m = caps.get(2)?.as_str().parse().ok()?;
            let d = caps.get(3)?.as_str().parse().ok()?;
            NaiveDate::from_ymd_opt(y, m, d)
        })();
        if let Some(date) = parsed {
            push_unique(&mut signals.dates, date);
        }
    }

    let day_month = DAY_MONTH_RE
        .captures_iter(lower)
        .filter_map(|c| Some((c.get(1)?.as_str(), c.get(2)?.as_str())));
    let month_day = MONTH_DAY_RE
        .captures_iter(lower)
        .filter_map(|c| Some((c.get(2)?.as_str(), c.get(1)?.as_str())));
    for (day, month) in day_month.chain(month_day) {
        let Some(month) = month_from_word(month) else {
            continue;
        };
        let Ok(day) = day.parse::<u32>() else {
            continue;
        };
        if let Some(date) = resolve_day_month(day, month, today) {
            push_unique(&mut signals.dates, date);
            if !signals.months.contains(&month) {
                signals.months.push(month);
            }
        }
    }

    signals
}

/// Next occurrence of `day` `month` on or after `today`.
fn resolve_day_month(day: u32, month: Month, today: NaiveDate) -> Option<NaiveDate> {
    let m = month.number_from_month();
    let this_year = NaiveDate::from_ymd_opt(today.year(), m, day)?;
    if this_year >= today {
        Some(this_year)
    } else {
        NaiveDate::from_ymd_opt(today.year() + 1, m, day)
    }
}

fn push_unique<T: PartialEq>(items: &mut Vec<T>, item: T) {
    if !items.contains(&item) {
        items.push(item);
    }
}

// =============================================================================
// Tests
// =============================================================================
