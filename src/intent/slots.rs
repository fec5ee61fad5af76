//! # Slot Extraction
//!
//! Pulls structured parameters out of the raw command text with simple word
//! rules. Runs independently of the embedding match so slots are available
//! even when no intent was recognized.
//!
//! ## Slots:
//! - **numeric** (`batteryId`): every standalone digit run, in order. One run
//!   gives a single number, several give the ordered list. Ambiguity is
//!   reported, never resolved by guessing.
//! - **qualifier** (`series`): a known vocabulary word, else the word next to
//!   an anchor such as "serie"/"series", else the word right after the first
//!   number.
//!
//! Anchors are checked on both sides because word order differs between
//! languages ("serie gialla" vs "yellow series").

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::OnceLock;

static WORD_PATTERN: OnceLock<Regex> = OnceLock::new();

fn word_pattern() -> &'static Regex {
    WORD_PATTERN.get_or_init(|| Regex::new(r"\w+").expect("word pattern is a valid regex"))
}

/// Value of one extracted slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SlotValue {
    Number(u64),
    Numbers(Vec<u64>),
    Text(String),
}

impl SlotValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            SlotValue::Text(text) => Some(text),
            _ => None,
        }
    }
}

/// Slot names, vocabulary and anchors used by the extractor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotRules {
    pub numeric_slot: String,
    pub qualifier_slot: String,
    pub qualifier_words: Vec<String>,
    pub anchor_words: Vec<String>,
}

impl Default for SlotRules {
    fn default() -> Self {
        Self {
            numeric_slot: "batteryId".to_string(),
            qualifier_slot: "series".to_string(),
            qualifier_words: default_qualifier_words(),
            anchor_words: default_anchor_words(),
        }
    }
}

/// Series colours in English and Italian (with gender/number variants).
pub fn default_qualifier_words() -> Vec<String> {
    [
        "yellow", "giallo", "gialla", "gialli", "gialle",
        "red", "rosso", "rossa", "rossi", "rosse",
        "blue", "blu",
        "green", "verde", "verdi",
        "black", "nero", "nera", "neri", "nere",
        "white", "bianco", "bianca", "bianchi", "bianche",
        "orange", "arancione", "arancio",
        "grey", "gray", "grigio", "grigia",
        "purple", "viola",
    ]
    .iter()
    .map(|w| w.to_string())
    .collect()
}

/// Words meaning "series" that mark the neighbouring word as the qualifier.
pub fn default_anchor_words() -> Vec<String> {
    ["serie", "series", "série"].iter().map(|w| w.to_string()).collect()
}

/// Rule-based slot extractor.
#[derive(Debug, Clone)]
pub struct SlotExtractor {
    numeric_slot: String,
    qualifier_slot: String,
    qualifier_words: Vec<String>,
    anchor_words: Vec<String>,
}

impl SlotExtractor {
    pub fn new(rules: SlotRules) -> Self {
        let lower = |words: Vec<String>| -> Vec<String> {
            words
                .into_iter()
                .map(|w| w.trim().to_lowercase())
                .filter(|w| !w.is_empty())
                .collect()
        };

        Self {
            numeric_slot: rules.numeric_slot,
            qualifier_slot: rules.qualifier_slot,
            qualifier_words: lower(rules.qualifier_words),
            anchor_words: lower(rules.anchor_words),
        }
    }

    /// Name under which the numeric slot is reported.
    pub fn numeric_slot(&self) -> &str {
        &self.numeric_slot
    }

    /// Name under which the qualifier slot is reported.
    pub fn qualifier_slot(&self) -> &str {
        &self.qualifier_slot
    }

    /// Extract every slot found in `text`. Absent slots are not in the map.
    pub fn extract(&self, text: &str) -> BTreeMap<String, SlotValue> {
        let tokens: Vec<&str> = word_pattern().find_iter(text).map(|m| m.as_str()).collect();
        let numbers = numbers(&tokens);
        let mut slots = BTreeMap::new();

        match numbers.as_slice() {
            [] => {}
            [(_, id)] => {
                slots.insert(self.numeric_slot.clone(), SlotValue::Number(*id));
            }
            _ => {
                let ids = numbers.iter().map(|(_, id)| *id).collect();
                slots.insert(self.numeric_slot.clone(), SlotValue::Numbers(ids));
            }
        }

        let first_number = numbers.first().map(|(index, _)| *index);
        if let Some(qualifier) = self.qualifier(&tokens, first_number) {
            slots.insert(self.qualifier_slot.clone(), SlotValue::Text(qualifier));
        }

        slots
    }

    /// `first_number` is the token index of the first extracted number.
    fn qualifier(&self, tokens: &[&str], first_number: Option<usize>) -> Option<String> {
        let lowered: Vec<String> = tokens.iter().map(|t| t.to_lowercase()).collect();

        if let Some(word) = lowered.iter().find(|w| self.qualifier_words.contains(w)) {
            return Some(word.clone());
        }

        for (index, word) in lowered.iter().enumerate() {
            if !self.is_anchor(word) {
                continue;
            }
            let after = lowered.get(index + 1).filter(|w| self.is_candidate(w));
            let before = index
                .checked_sub(1)
                .and_then(|i| lowered.get(i))
                .filter(|w| self.is_candidate(w));
            if let Some(word) = after.or(before) {
                return Some(word.clone());
            }
        }

        lowered
            .get(first_number? + 1)
            .filter(|w| self.is_candidate(w))
            .cloned()
    }

    fn is_anchor(&self, word: &str) -> bool {
        self.anchor_words.iter().any(|a| a == word)
    }

    fn is_candidate(&self, word: &str) -> bool {
        !word.is_empty() && word.chars().all(char::is_alphabetic) && !self.is_anchor(word)
    }
}

impl Default for SlotExtractor {
    fn default() -> Self {
        Self::new(SlotRules::default())
    }
}

fn is_number(token: &str) -> bool {
    !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit())
}

/// Token index and value of every digit run that fits in `u64`.
fn numbers(tokens: &[&str]) -> Vec<(usize, u64)> {
    tokens
        .iter()
        .enumerate()
        .filter(|(_, t)| is_number(t))
        .filter_map(|(index, t)| match t.parse::<u64>() {
            Ok(n) => Some((index, n)),
            Err(_) => {
                tracing::debug!("Ignoring numeric token '{}' that does not fit in u64", t);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(slots: &BTreeMap<String, SlotValue>, name: &str) -> Option<String> {
        slots.get(name).and_then(|v| v.as_text()).map(str::to_string)
    }

    #[test]
    fn test_single_number_and_vocabulary_qualifier() {
        let slots = SlotExtractor::default().extract("Charge battery 12 yellow series");
        assert_eq!(slots.get("batteryId"), Some(&SlotValue::Number(12)));
        assert_eq!(text(&slots, "series").as_deref(), Some("yellow"));
    }

    #[test]
    fn test_several_numbers_are_kept_in_order() {
        let slots = SlotExtractor::default().extract("battery 3 7");
        assert_eq!(slots.get("batteryId"), Some(&SlotValue::Numbers(vec![3, 7])));
        assert!(slots.get("series").is_none());
    }

    #[test]
    fn test_no_numbers_means_absent() {
        let slots = SlotExtractor::default().extract("charge the battery");
        assert!(slots.get("batteryId").is_none());
    }

    #[test]
    fn test_digits_inside_words_are_ignored() {
        let slots = SlotExtractor::default().extract("battery b12 and 4");
        assert_eq!(slots.get("batteryId"), Some(&SlotValue::Number(4)));
    }

    #[test]
    fn test_italian_anchor_before_qualifier() {
        let slots = SlotExtractor::default().extract("Carica batteria 7 serie alfa");
        assert_eq!(slots.get("batteryId"), Some(&SlotValue::Number(7)));
        assert_eq!(text(&slots, "series").as_deref(), Some("alfa"));
    }

    #[test]
    fn test_english_anchor_after_qualifier() {
        let slots = SlotExtractor::default().extract("battery 4 alpha series");
        assert_eq!(text(&slots, "series").as_deref(), Some("alpha"));
    }

    #[test]
    fn test_vocabulary_is_case_insensitive_whole_word() {
        let extractor = SlotExtractor::default();
        let slots = extractor.extract("Carica batteria 7 serie GIALLA");
        assert_eq!(text(&slots, "series").as_deref(), Some("gialla"));

        // "redo" contains "red" but is not the word "red"
        let slots = extractor.extract("redo battery");
        assert!(slots.get("series").is_none());
    }

    #[test]
    fn test_word_after_number_fallback() {
        let slots = SlotExtractor::default().extract("store battery 9 north");
        assert_eq!(text(&slots, "series").as_deref(), Some("north"));
    }

    #[test]
    fn test_overflowing_number_is_not_a_qualifier_anchor() {
        let slots = SlotExtractor::default().extract("battery 99999999999999999999 north 5 south");
        assert_eq!(slots.get("batteryId"), Some(&SlotValue::Number(5)));
        assert_eq!(text(&slots, "series").as_deref(), Some("south"));
    }

    #[test]
    fn test_qualifier_absent_not_empty() {
        let extractor = SlotExtractor::default();
        assert!(extractor.extract("Charge battery 12").get("series").is_none());
        assert!(extractor.extract("Carica batteria 12 serie").get("series").is_none());
        assert!(extractor.extract("").is_empty());
    }

    #[test]
    fn test_custom_rules() {
        let extractor = SlotExtractor::new(SlotRules {
            numeric_slot: "doorId".into(),
            qualifier_slot: "floor".into(),
            qualifier_words: vec!["Ground".into()],
            anchor_words: vec!["piano".into()],
        });

        assert_eq!(extractor.numeric_slot(), "doorId");
        assert_eq!(extractor.qualifier_slot(), "floor");

        let slots = extractor.extract("open door 2 ground");
        assert_eq!(slots.get("doorId"), Some(&SlotValue::Number(2)));
        assert_eq!(text(&slots, "floor").as_deref(), Some("ground"));
    }

    #[test]
    fn test_slot_value_json_shape() {
        assert_eq!(serde_json::to_string(&SlotValue::Number(12)).unwrap(), "12");
        assert_eq!(serde_json::to_string(&SlotValue::Numbers(vec![3, 7])).unwrap(), "[3,7]");
        assert_eq!(serde_json::to_string(&SlotValue::Text("yellow".into())).unwrap(), "\"yellow\"");
    }
}
