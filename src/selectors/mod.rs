//! Locator-knowledge store.
//!
//! Tracks which DOM-selector candidates currently work for each UI feature
//! and lets that knowledge evolve at runtime. Learned candidates are merged
//! ahead of the compiled-in seeds so a fresh discovery is tried first, while
//! the seeds are always retained as the reliability floor. Knowledge lives
//! for the process lifetime only.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Hard cap on candidates kept per feature.
pub const MAX_CANDIDATES: usize = 12;
/// Hard cap on a single candidate's length in characters.
pub const MAX_CANDIDATE_LEN: usize = 200;

/// UI element roles the agent knows how to locate. Fixed at build time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    MessageCta,
    ConversationRoot,
    ConversationItems,
    MessageTextbox,
    SendButton,
}

impl Feature {
    pub const ALL: [Feature; 5] = [
        Feature::MessageCta,
        Feature::ConversationRoot,
        Feature::ConversationItems,
        Feature::MessageTextbox,
        Feature::SendButton,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Feature::MessageCta => "message_cta",
            Feature::ConversationRoot => "conversation_root",
            Feature::ConversationItems => "conversation_items",
            Feature::MessageTextbox => "message_textbox",
            Feature::SendButton => "send_button",
        }
    }

    pub fn parse(raw: &str) -> Option<Feature> {
        Feature::ALL.iter().copied().find(|f| f.as_str() == raw)
    }
}

impl std::fmt::Display for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One feature's learned candidate list plus provenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorEntry {
    pub feature: Feature,
    pub candidates: Vec<String>,
    pub updated_at: DateTime<Utc>,
    pub reason: String,
}

/// Immutable baseline candidates, established at startup. Always consulted,
/// never mutated, so a corrupted learned set can never remove the floor.
#[derive(Debug, Clone)]
pub struct SeedTable {
    seeds: HashMap<Feature, Vec<String>>,
}

impl SeedTable {
    /// Compiled-in baseline, optionally extended per feature from config.
    pub fn new(extra: &HashMap<String, Vec<String>>) -> Self {
        let mut seeds: HashMap<Feature, Vec<String>> = HashMap::new();
        for feature in Feature::ALL {
            let mut list: Vec<String> = builtin_seeds(feature)
                .iter()
                .map(|s| (*s).to_string())
                .collect();
            if let Some(more) = extra.get(feature.as_str()) {
                list.extend(more.iter().cloned());
            }
            seeds.insert(feature, sanitize_strings(&list));
        }
        Self { seeds }
    }

    pub fn candidates(&self, feature: Feature) -> &[String] {
        self.seeds
            .get(&feature)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

impl Default for SeedTable {
    fn default() -> Self {
        Self::new(&HashMap::new())
    }
}

fn builtin_seeds(feature: Feature) -> &'static [&'static str] {
    match feature {
        Feature::MessageCta => &[
            "button[aria-label^='Message']",
            "button[aria-label^='Mensaje']",
            "a[href*='/messaging/thread']",
        ],
        Feature::ConversationRoot => &[
            "div.msg-overlay-conversation-bubble",
            "aside[class*='msg-overlay'] div[class*='conversation-bubble']",
            "div[class*='msg-convo-wrapper']",
        ],
        Feature::ConversationItems => &[
            "li.msg-s-message-list__event p.msg-s-event-listitem__body",
            "div.msg-s-event-listitem__body",
            "[class*='event-listitem'] p",
        ],
        Feature::MessageTextbox => &[
            "div.msg-form__contenteditable[contenteditable='true']",
            "div[role='textbox'][contenteditable='true']",
        ],
        Feature::SendButton => &[
            "button.msg-form__send-button",
            "button[type='submit'][class*='send']",
        ],
    }
}

/// Drop blanks and over-length entries, trim, dedup first-seen, cap.
fn sanitize_strings(raw: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for candidate in raw {
        let trimmed = candidate.trim();
        if trimmed.is_empty() || trimmed.chars().count() > MAX_CANDIDATE_LEN {
            continue;
        }
        if out.iter().any(|seen| seen == trimmed) {
            continue;
        }
        out.push(trimmed.to_string());
        if out.len() == MAX_CANDIDATES {
            break;
        }
    }
    out
}

/// Sanitize a candidate list arriving from the tool boundary: non-string
/// entries are dropped, then the usual trim/blank/length/dedup/cap rules.
pub fn sanitize_candidates(raw: &[Value]) -> Vec<String> {
    let strings: Vec<String> = raw
        .iter()
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect();
    sanitize_strings(&strings)
}

/// Read/write interface over locator knowledge. The in-memory
/// implementation below is the default; a persistent-backed one can be
/// substituted without touching callers, and tests construct isolated
/// instances per case.
pub trait SelectorStore: Send + Sync {
    /// Learned-then-seed union, deduplicated first-seen order, capped at
    /// [`MAX_CANDIDATES`]. Seeds are always included.
    fn selectors_for(&self, feature: Feature) -> Vec<String>;

    /// Replace the feature's learned candidates after sanitization. An
    /// empty sanitized result is a silent no-op preserving the prior
    /// entry. Never fails observably.
    fn save(&self, feature: Feature, candidates: &[String], reason: &str);

    /// Current entry for introspection.
    fn entry(&self, feature: Feature) -> SelectorEntry;
}

/// Process-lifetime store shared across concurrent requests. Writes are
/// last-writer-wins: concurrent saves to the same feature are not merged,
/// the later one fully replaces the earlier learned list.
pub struct MemorySelectorStore {
    seeds: SeedTable,
    learned: RwLock<HashMap<Feature, SelectorEntry>>,
}

impl MemorySelectorStore {
    pub fn new(seeds: SeedTable) -> Self {
        let mut learned = HashMap::new();
        // Seed every feature up front so an entry is never absent.
        for feature in Feature::ALL {
            learned.insert(
                feature,
                SelectorEntry {
                    feature,
                    candidates: seeds.candidates(feature).to_vec(),
                    updated_at: Utc::now(),
                    reason: "seed".to_string(),
                },
            );
        }
        Self {
            seeds,
            learned: RwLock::new(learned),
        }
    }
}

impl Default for MemorySelectorStore {
    fn default() -> Self {
        Self::new(SeedTable::default())
    }
}

impl SelectorStore for MemorySelectorStore {
    fn selectors_for(&self, feature: Feature) -> Vec<String> {
        let learned = self.learned.read();
        let mut merged: Vec<String> = learned
            .get(&feature)
            .map(|e| e.candidates.clone())
            .unwrap_or_default();
        merged.extend(self.seeds.candidates(feature).iter().cloned());
        sanitize_strings(&merged)
    }

    fn save(&self, feature: Feature, candidates: &[String], reason: &str) {
        let sanitized = sanitize_strings(candidates);
        if sanitized.is_empty() {
            tracing::debug!(feature = %feature, "selector save ignored: nothing valid to store");
            return;
        }
        tracing::info!(
            feature = %feature,
            count = sanitized.len(),
            reason,
            "selector candidates updated"
        );
        self.learned.write().insert(
            feature,
            SelectorEntry {
                feature,
                candidates: sanitized,
                updated_at: Utc::now(),
                reason: reason.to_string(),
            },
        );
    }

    fn entry(&self, feature: Feature) -> SelectorEntry {
        let learned = self.learned.read();
        learned
            .get(&feature)
            .cloned()
            .unwrap_or_else(|| SelectorEntry {
                feature,
                candidates: self.seeds.candidates(feature).to_vec(),
                updated_at: Utc::now(),
                reason: "seed".to_string(),
            })
    }
}
