//! Multi-tier conversation extraction.
//!
//! The read-conversation flow is described here as a structured plan
//! (explicit parameter fields plus ordered candidate lists) that the remote
//! automation server interprets as data. No generated script text crosses
//! the wire. The plan carries every fallback tier in order:
//!
//! 1. navigate to the profile, settle;
//! 2. find the conversation-initiation control by accessible-name prefix,
//!    then visible text, then icon ref + nearest interactive ancestor,
//!    each scoped to the profile header first and the whole page second,
//!    with an overflow-menu entry as the final tier;
//! 3. poll the conversation root against the store's candidates (freshest
//!    match preferred), then a generic fallback set once;
//! 4. harvest message items by candidate selector, falling back to a
//!    generic block-element scan.
//!
//! The remote reply is interpreted locally: item texts are tidied, the
//! requested tail is sliced, and failure statuses map onto enumerated
//! signals rather than pattern-matched abort strings.

use crate::selectors::{Feature, SelectorStore};
use crate::tools::FailureCode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Generic root candidates tried once when every cached candidate misses.
const GENERIC_ROOT_FALLBACKS: &[&str] = &[
    "div[class*='conversation-bubble']",
    "aside[class*='overlay'] div[class*='convo']",
    "div[role='dialog'][class*='msg']",
];

/// Broad block-level scan used when no item candidate yields a match.
const GENERIC_ITEM_SCAN_SCOPE: &str = "p, li, div, span";
/// Harvested entries shorter than this are discarded.
const FALLBACK_MIN_TEXT_LEN: usize = 2;
/// Hard cap on harvested entries before the tail slice.
const FALLBACK_MAX_ITEMS: usize = 50;

/// Accessible-name prefixes for the conversation control, two languages.
const CTA_NAME_PREFIXES: &[&str] = &["Message", "Mensaje"];
/// Visible-text phrases, matched case-insensitively.
const CTA_TEXT_PHRASES: &[&str] = &["Message", "Mensaje"];
/// Icon references whose nearest interactive ancestor is the control.
const CTA_ICON_REFS: &[&str] = &[
    "svg[data-test-icon='compose-small']",
    "use[href*='compose']",
];
/// Narrowed scope tried before the whole page.
const PROFILE_HEADER_SCOPE: &str = "section[class*='profile'] div[class*='top-card']";
/// Labels matching this belong to an unrelated business-page header; a
/// match aborts instead of clicking a look-alike control.
const WRONG_SECTION_PATTERN: &str = r"(?i)\b(page|p[aá]gina)\b";
/// Overflow-menu toggle and entry phrases, two languages.
const MORE_MENU_TOGGLE_PHRASES: &[&str] = &["More", "Más"];
const MORE_MENU_ENTRY_PHRASES: &[&str] = &["Message", "Mensaje"];

/// Local timing knobs embedded into the plan; per-operation, not an
/// end-to-end deadline.
#[derive(Debug, Clone)]
pub struct CascadeSettings {
    pub settle_ms: u64,
    pub navigation_timeout_ms: u64,
    pub click_timeout_ms: u64,
    pub root_poll_timeout_ms: u64,
    pub root_poll_interval_ms: u64,
}

impl Default for CascadeSettings {
    fn default() -> Self {
        Self {
            settle_ms: 1_500,
            navigation_timeout_ms: 15_000,
            click_timeout_ms: 5_000,
            root_poll_timeout_ms: 12_000,
            root_poll_interval_ms: 200,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionPlan {
    pub profile_url: String,
    pub limit: u32,
    pub thread_hint: String,
    pub settle_ms: u64,
    pub navigation_timeout_ms: u64,
    pub click_timeout_ms: u64,
    pub cta: CtaPlan,
    pub root: RootPlan,
    pub items: ItemPlan,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CtaPlan {
    pub header_scope: String,
    pub name_prefixes: Vec<String>,
    pub text_phrases: Vec<String>,
    pub icon_refs: Vec<String>,
    pub wrong_section_pattern: String,
    pub more_menu: MoreMenuPlan,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoreMenuPlan {
    pub toggle_phrases: Vec<String>,
    pub entry_phrases: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RootPlan {
    pub candidates: Vec<String>,
    pub fallbacks: Vec<String>,
    pub poll_timeout_ms: u64,
    pub poll_interval_ms: u64,
    /// A freshly opened panel is typically appended last in document
    /// order, so matches are scanned back-to-front.
    pub prefer_last_match: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemPlan {
    pub candidates: Vec<String>,
    pub fallback_scan_scope: String,
    pub fallback_min_text_len: usize,
    pub fallback_max_items: usize,
}

/// Assemble the plan from current selector knowledge and the request.
pub fn build_plan(
    store: &dyn SelectorStore,
    settings: &CascadeSettings,
    profile_url: &str,
    limit: u32,
    thread_hint: &str,
) -> ExtractionPlan {
    ExtractionPlan {
        profile_url: profile_url.to_string(),
        limit,
        thread_hint: thread_hint.to_string(),
        settle_ms: settings.settle_ms,
        navigation_timeout_ms: settings.navigation_timeout_ms,
        click_timeout_ms: settings.click_timeout_ms,
        cta: CtaPlan {
            header_scope: PROFILE_HEADER_SCOPE.to_string(),
            name_prefixes: owned(CTA_NAME_PREFIXES),
            text_phrases: owned(CTA_TEXT_PHRASES),
            icon_refs: owned(CTA_ICON_REFS),
            wrong_section_pattern: WRONG_SECTION_PATTERN.to_string(),
            more_menu: MoreMenuPlan {
                toggle_phrases: owned(MORE_MENU_TOGGLE_PHRASES),
                entry_phrases: owned(MORE_MENU_ENTRY_PHRASES),
            },
        },
        root: RootPlan {
            candidates: store.selectors_for(Feature::ConversationRoot),
            fallbacks: owned(GENERIC_ROOT_FALLBACKS),
            poll_timeout_ms: settings.root_poll_timeout_ms,
            poll_interval_ms: settings.root_poll_interval_ms,
            prefer_last_match: true,
        },
        items: ItemPlan {
            candidates: store.selectors_for(Feature::ConversationItems),
            fallback_scan_scope: GENERIC_ITEM_SCAN_SCOPE.to_string(),
            fallback_min_text_len: FALLBACK_MIN_TEXT_LEN,
            fallback_max_items: FALLBACK_MAX_ITEMS,
        },
    }
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Ok,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RootMatch {
    Cached,
    Fallback,
}

/// The remote executor's structured reply to an extraction plan.
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractionReport {
    pub status: ReportStatus,
    #[serde(default)]
    pub signal: Option<String>,
    #[serde(default)]
    pub root_matched_by: Option<RootMatch>,
    #[serde(default)]
    pub items: Vec<String>,
    #[serde(default)]
    pub detail: Option<String>,
}

/// Enumerated abort vocabulary of the extraction flow. Carried on tool
/// results as its wire `code`; never re-derived from message text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractSignal {
    CtaNotFound,
    CtaNotFoundInMoreMenu,
    CtaHeaderMisselection,
    OverlayNotFound,
    RunCodeError(String),
    Unknown(String),
}

impl ExtractSignal {
    pub fn from_wire(signal: Option<&str>, detail: Option<&str>) -> Self {
        let detail_text = || detail.unwrap_or("unclassified extraction failure").to_string();
        match signal {
            Some("CTA_NOT_FOUND") => ExtractSignal::CtaNotFound,
            Some("CTA_NOT_FOUND_IN_MORE_MENU") => ExtractSignal::CtaNotFoundInMoreMenu,
            Some("CTA_HEADER_MISSELECTION") => ExtractSignal::CtaHeaderMisselection,
            Some("OVERLAY_NOT_FOUND") | Some("ROOT_NOT_FOUND") => ExtractSignal::OverlayNotFound,
            Some("MCP_RUN_CODE_ERROR") => ExtractSignal::RunCodeError(detail_text()),
            _ => ExtractSignal::Unknown(detail_text()),
        }
    }

    pub fn code(&self) -> FailureCode {
        match self {
            ExtractSignal::CtaNotFound => FailureCode::CtaNotFound,
            ExtractSignal::CtaNotFoundInMoreMenu => FailureCode::CtaNotFoundInMoreMenu,
            ExtractSignal::CtaHeaderMisselection => FailureCode::CtaHeaderMisselection,
            ExtractSignal::OverlayNotFound => FailureCode::OverlayNotFound,
            ExtractSignal::RunCodeError(_) => FailureCode::RunCodeError,
            ExtractSignal::Unknown(_) => FailureCode::Unknown,
        }
    }

    pub fn message(&self) -> String {
        match self {
            ExtractSignal::CtaNotFound => {
                "conversation control not found in header or page scope".to_string()
            }
            ExtractSignal::CtaNotFoundInMoreMenu => {
                "conversation entry absent from the overflow menu".to_string()
            }
            ExtractSignal::CtaHeaderMisselection => {
                "matched control belongs to an unrelated section header".to_string()
            }
            ExtractSignal::OverlayNotFound => {
                "conversation root never became visible within the poll budget".to_string()
            }
            ExtractSignal::RunCodeError(detail) | ExtractSignal::Unknown(detail) => detail.clone(),
        }
    }
}

/// Final result of a successful read, oldest-to-newest tail of the harvest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRead {
    pub ok: bool,
    pub limit: u32,
    pub messages: Vec<String>,
    pub extracted_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_hint: Option<String>,
}

/// Interpret a remote reply into the final read result or an abort signal.
pub fn interpret(
    report: &ExtractionReport,
    limit: u32,
    thread_hint: &str,
) -> Result<ChatRead, ExtractSignal> {
    if report.status == ReportStatus::Failed {
        return Err(ExtractSignal::from_wire(
            report.signal.as_deref(),
            report.detail.as_deref(),
        ));
    }

    let tidied = tidy_items(&report.items);
    let keep = (limit as usize).min(tidied.len());
    let messages = tidied[tidied.len() - keep..].to_vec();

    Ok(ChatRead {
        ok: true,
        limit,
        messages,
        extracted_at: Utc::now(),
        thread_hint: (!thread_hint.is_empty()).then(|| thread_hint.to_string()),
    })
}

/// Normalize whitespace, drop near-empty entries, dedup preserving
/// first-seen order, cap the harvest.
fn tidy_items(raw: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for item in raw {
        let normalized = item.split_whitespace().collect::<Vec<_>>().join(" ");
        if normalized.chars().count() < FALLBACK_MIN_TEXT_LEN {
            continue;
        }
        if !seen.insert(normalized.clone()) {
            continue;
        }
        out.push(normalized);
        if out.len() == FALLBACK_MAX_ITEMS {
            break;
        }
    }
    out
}
