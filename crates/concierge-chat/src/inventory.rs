//! "How many cottages do you have" answered straight from the registry.

use std::sync::LazyLock;

use concierge_core::{CottageRegistry, InventorySummary};
use regex::Regex;

static INVENTORY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:how\s+many\s+(?:cottages|units|villas)|number\s+of\s+(?:cottages|units|villas)|total\s+(?:cottages|units)|(?:list|show\s+me)\s+(?:all\s+)?(?:of\s+)?(?:your\s+|the\s+)?cottages|what\s+cottages\s+(?:do\s+you\s+have|are\s+there))\b",
    )
    .unwrap()
});

pub fn is_inventory_query(utterance: &str) -> bool {
    INVENTORY_RE.is_match(utterance)
}

/// Inventory summary with a ready-to-send answer.
pub fn inventory_answer(registry: &CottageRegistry) -> (InventorySummary, String) {
    let summary = registry.inventory();
    let mut answer = format!(
        "We have {} cottage{}.",
        summary.total,
        if summary.total == 1 { "" } else { "s" }
    );
    match summary.recommended.as_slice() {
        [] => {}
        [only] => answer.push_str(&format!(" We especially recommend {}.", only)),
        [init @ .., last] => answer.push_str(&format!(
            " We especially recommend {} and {}.",
            init.join(", "),
            last
        )),
    }
    (summary, answer)
}
