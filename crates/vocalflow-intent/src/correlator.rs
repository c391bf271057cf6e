//! Event correlator: pairs browser actions with nearby utterances.
//!
//! Browser events and voice events share no identifier.  The correlator
//! aligns them on three signals only:
//!
//! 1. **Context**: same `session_id` and same page `url`.
//! 2. **Time**: `|Δt| <= time_window` seconds.
//! 3. **Wording** (semantic and hybrid methods): keyword overlap between the
//!    utterance and the browser event's type or element tag.
//!
//! Every browser event yields exactly one [`CorrelationResult`], in
//! timestamp order.  A result with no usable voice context has an empty
//! voice list and a score of `0.0`.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use aho_corasick::AhoCorasick;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{IntentError, Result};
use crate::events::{BrowserEvent, VoiceEvent};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Weight of the time-window score in the hybrid blend.
pub const HYBRID_TIME_WEIGHT: f64 = 0.7;

/// Weight of the semantic score in the hybrid blend.
pub const HYBRID_SEMANTIC_WEIGHT: f64 = 0.3;

/// Which scoring algorithm runs over the candidate utterances.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationMethod {
    /// Proximity in time weighted by transcription confidence.
    #[default]
    TimeWindow,
    /// Keyword overlap between utterance and browser event.
    Semantic,
    /// `0.7 × time_window + 0.3 × semantic`.
    Hybrid,
}

impl fmt::Display for CorrelationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TimeWindow => write!(f, "time_window"),
            Self::Semantic => write!(f, "semantic"),
            Self::Hybrid => write!(f, "hybrid"),
        }
    }
}

impl FromStr for CorrelationMethod {
    type Err = IntentError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "time_window" => Ok(Self::TimeWindow),
            "semantic" => Ok(Self::Semantic),
            "hybrid" => Ok(Self::Hybrid),
            other => Err(IntentError::InvalidConfig {
                reason: format!(
                    "unknown correlation method `{other}` (expected time_window, semantic or hybrid)"
                ),
            }),
        }
    }
}

/// Construction-time options for [`EventCorrelator`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrelatorConfig {
    /// Candidate radius in seconds; also the time-score decay length.
    pub time_window: f64,
    /// Results scoring below this are emptied.
    pub min_confidence: f64,
    pub correlation_method: CorrelationMethod,
}

impl Default for CorrelatorConfig {
    fn default() -> Self {
        Self {
            time_window: 5.0,
            min_confidence: 0.3,
            correlation_method: CorrelationMethod::TimeWindow,
        }
    }
}

impl CorrelatorConfig {
    /// Reject values the scoring formulas cannot work with.
    pub fn validate(&self) -> Result<()> {
        if !self.time_window.is_finite() || self.time_window <= 0.0 {
            return Err(IntentError::InvalidConfig {
                reason: format!("time_window must be positive, got {}", self.time_window),
            });
        }
        if !self.min_confidence.is_finite() || self.min_confidence < 0.0 {
            return Err(IntentError::InvalidConfig {
                reason: format!(
                    "min_confidence must be non-negative, got {}",
                    self.min_confidence
                ),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Weights used by the hybrid method, recorded for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HybridWeights {
    pub time: f64,
    pub semantic: f64,
}

/// Diagnostic sub-scores attached to a result.
///
/// Serialized as a plain map; the variant is implied by its keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CorrelationMetadata {
    /// Candidates existed but the aggregate score fell under the gate.
    LowConfidence { low_confidence_voices: usize },
    /// Per kept utterance: `|Δt|` and transcription confidence.
    TimeWindow {
        time_diffs: Vec<f64>,
        confidence_scores: Vec<f64>,
    },
    /// Per candidate keyword similarity.
    Semantic { semantic_scores: Vec<f64> },
    Hybrid {
        time_score: f64,
        semantic_score: f64,
        weights: HybridWeights,
    },
    /// No candidates at all.
    Empty {},
}

/// The correlation of one browser event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationResult {
    pub browser_event: BrowserEvent,
    /// Associated utterances in time order; possibly empty.
    pub voice_events: Vec<VoiceEvent>,
    /// In `[0, 1]`; `0.0` means no usable voice context.
    pub correlation_score: f64,
    pub time_window: f64,
    pub correlation_method: CorrelationMethod,
    pub metadata: CorrelationMetadata,
}

/// Intermediate output of one scoring method.
struct Scored<'a> {
    voice_events: Vec<&'a VoiceEvent>,
    score: f64,
    metadata: CorrelationMetadata,
}

// ---------------------------------------------------------------------------
// Keyword similarity
// ---------------------------------------------------------------------------

/// Utterance keywords that hint at each browser event type.
const TYPE_KEYWORDS: &[(&str, &[&str])] = &[
    ("click", &["点击", "按", "点", "选择", "确认", "提交"]),
    ("input", &["输入", "填写", "填入", "写入", "设置"]),
    ("navigation", &["跳转", "打开", "访问", "转到", "页面"]),
    ("scroll", &["滚动", "翻页", "下拉", "上拉"]),
    ("select", &["选择", "选中", "勾选", "下拉"]),
];

/// Utterance keywords that hint at each element tag.
const TAG_KEYWORDS: &[(&str, &[&str])] = &[
    ("button", &["按钮", "点击", "确认", "提交"]),
    ("input", &["输入", "填写", "输入框"]),
    ("select", &["选择", "下拉", "选项"]),
    ("a", &["链接", "跳转", "打开"]),
];

/// A compiled keyword list.  Similarity is the fraction of distinct
/// keywords that occur in the text.
struct KeywordSet {
    matcher: AhoCorasick,
    len: usize,
}

impl KeywordSet {
    fn new(keywords: &[&str]) -> Result<Self> {
        let matcher = AhoCorasick::new(keywords).map_err(|e| IntentError::InvalidPattern {
            pattern: keywords.join("|"),
            reason: e.to_string(),
        })?;
        Ok(Self {
            matcher,
            len: keywords.len(),
        })
    }

    fn overlap(&self, text: &str) -> f64 {
        // Keywords nest ("点" inside "点击"), so every occurrence must be
        // visited, not just the leftmost-longest.
        let mut seen = vec![false; self.len];
        for m in self.matcher.find_overlapping_iter(text) {
            seen[m.pattern().as_usize()] = true;
        }
        let found = seen.iter().filter(|hit| **hit).count();
        found as f64 / self.len as f64
    }
}

fn compile_table(table: &[(&'static str, &[&str])]) -> Result<HashMap<&'static str, KeywordSet>> {
    table
        .iter()
        .map(|(key, words)| Ok((*key, KeywordSet::new(words)?)))
        .collect()
}

// ---------------------------------------------------------------------------
// Correlator
// ---------------------------------------------------------------------------

/// Aligns browser events with voice events.
///
/// Pure and synchronous; holds only its configuration and the compiled
/// keyword tables.
pub struct EventCorrelator {
    config: CorrelatorConfig,
    type_keywords: HashMap<&'static str, KeywordSet>,
    tag_keywords: HashMap<&'static str, KeywordSet>,
}

impl EventCorrelator {
    /// Create a correlator.  Fails on out-of-range configuration.
    pub fn new(config: CorrelatorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            type_keywords: compile_table(TYPE_KEYWORDS)?,
            tag_keywords: compile_table(TAG_KEYWORDS)?,
        })
    }

    pub fn config(&self) -> &CorrelatorConfig {
        &self.config
    }

    /// Correlate every browser event with the voice events around it.
    ///
    /// Returns one result per browser event, ordered by browser timestamp
    /// (stable for equal timestamps).
    pub fn correlate(
        &self,
        browser_events: &[BrowserEvent],
        voice_events: &[VoiceEvent],
    ) -> Vec<CorrelationResult> {
        let mut browser: Vec<&BrowserEvent> = browser_events.iter().collect();
        browser.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));

        let mut voice: Vec<&VoiceEvent> = voice_events.iter().collect();
        voice.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));

        let results: Vec<CorrelationResult> = browser
            .into_iter()
            .map(|event| self.correlate_one(event, &voice))
            .collect();

        info!(
            browser_events = browser_events.len(),
            voice_events = voice_events.len(),
            correlated = results.iter().filter(|r| !r.voice_events.is_empty()).count(),
            method = %self.config.correlation_method,
            "correlation complete"
        );

        results
    }

    fn correlate_one(&self, browser: &BrowserEvent, voice: &[&VoiceEvent]) -> CorrelationResult {
        let candidates: Vec<&VoiceEvent> = voice
            .iter()
            .copied()
            .filter(|v| self.is_candidate(browser, v))
            .collect();

        if candidates.is_empty() {
            return self.empty_result(browser, CorrelationMetadata::Empty {});
        }

        let scored = match self.config.correlation_method {
            CorrelationMethod::TimeWindow => self.time_window_score(browser, &candidates),
            CorrelationMethod::Semantic => self.semantic_score(browser, &candidates),
            CorrelationMethod::Hybrid => self.hybrid_score(browser, &candidates),
        };

        if scored.score < self.config.min_confidence {
            debug!(
                browser_event = %browser.id,
                score = scored.score,
                candidates = candidates.len(),
                "correlation below minimum confidence"
            );
            return self.empty_result(
                browser,
                CorrelationMetadata::LowConfidence {
                    low_confidence_voices: candidates.len(),
                },
            );
        }

        CorrelationResult {
            browser_event: browser.clone(),
            voice_events: scored.voice_events.into_iter().cloned().collect(),
            correlation_score: scored.score,
            time_window: self.config.time_window,
            correlation_method: self.config.correlation_method,
            metadata: scored.metadata,
        }
    }

    fn is_candidate(&self, browser: &BrowserEvent, voice: &VoiceEvent) -> bool {
        (voice.timestamp - browser.timestamp).abs() <= self.config.time_window
            && voice.session_id == browser.session_id
            && voice.url == browser.url
    }

    fn empty_result(&self, browser: &BrowserEvent, metadata: CorrelationMetadata) -> CorrelationResult {
        CorrelationResult {
            browser_event: browser.clone(),
            voice_events: Vec::new(),
            correlation_score: 0.0,
            time_window: self.config.time_window,
            correlation_method: self.config.correlation_method,
            metadata,
        }
    }

    // -- Scoring methods -----------------------------------------------------

    /// Mean of `time_score × confidence` over candidates scoring above zero.
    fn time_window_score<'a>(&self, browser: &BrowserEvent, candidates: &[&'a VoiceEvent]) -> Scored<'a> {
        let mut kept = Vec::new();
        let mut time_diffs = Vec::new();
        let mut confidence_scores = Vec::new();
        let mut total = 0.0;

        for voice in candidates {
            let diff = (voice.timestamp - browser.timestamp).abs();
            let time_score = (1.0 - diff / self.config.time_window).max(0.0);
            let event_score = time_score * voice.confidence;

            if event_score > 0.0 {
                total += event_score;
                kept.push(*voice);
                time_diffs.push(diff);
                confidence_scores.push(voice.confidence);
            }
        }

        let score = if kept.is_empty() {
            0.0
        } else {
            total / kept.len() as f64
        };

        Scored {
            voice_events: kept,
            score,
            metadata: CorrelationMetadata::TimeWindow {
                time_diffs,
                confidence_scores,
            },
        }
    }

    /// Mean keyword similarity over all candidates.  Every candidate is kept.
    fn semantic_score<'a>(&self, browser: &BrowserEvent, candidates: &[&'a VoiceEvent]) -> Scored<'a> {
        let semantic_scores: Vec<f64> = candidates
            .iter()
            .map(|voice| self.semantic_similarity(browser, voice))
            .collect();

        let score = semantic_scores.iter().sum::<f64>() / semantic_scores.len() as f64;

        Scored {
            voice_events: candidates.to_vec(),
            score,
            metadata: CorrelationMetadata::Semantic { semantic_scores },
        }
    }

    /// Weighted blend of both methods; keeps every candidate.
    fn hybrid_score<'a>(&self, browser: &BrowserEvent, candidates: &[&'a VoiceEvent]) -> Scored<'a> {
        let time = self.time_window_score(browser, candidates);
        let semantic = self.semantic_score(browser, candidates);

        let score = time.score * HYBRID_TIME_WEIGHT + semantic.score * HYBRID_SEMANTIC_WEIGHT;

        Scored {
            voice_events: candidates.to_vec(),
            score,
            metadata: CorrelationMetadata::Hybrid {
                time_score: time.score,
                semantic_score: semantic.score,
                weights: HybridWeights {
                    time: HYBRID_TIME_WEIGHT,
                    semantic: HYBRID_SEMANTIC_WEIGHT,
                },
            },
        }
    }

    /// Keyword similarity between an utterance and a browser event: the
    /// better of the type-based and tag-based overlap ratios, in `[0, 1]`.
    pub fn semantic_similarity(&self, browser: &BrowserEvent, voice: &VoiceEvent) -> f64 {
        let text = voice.text.to_lowercase();

        let by_type = self
            .type_keywords
            .get(browser.event_type.to_lowercase().as_str())
            .map_or(0.0, |set| set.overlap(&text));

        let by_tag = browser
            .element_tag
            .as_deref()
            .and_then(|tag| self.tag_keywords.get(tag.to_lowercase().as_str()))
            .map_or(0.0, |set| set.overlap(&text));

        by_type.max(by_tag).clamp(0.0, 1.0)
    }
}

// ---------------------------------------------------------------------------
// Statistics
// ---------------------------------------------------------------------------

/// Spread of the non-zero correlation scores.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreDistribution {
    pub min: f64,
    pub max: f64,
    /// Upper median.
    pub median: f64,
}

/// Summary of one correlation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationStatistics {
    pub total_browser_events: usize,
    /// Results with at least one voice event.
    pub correlated_events: usize,
    pub correlation_rate: f64,
    /// Mean over non-zero scores.
    pub average_correlation_score: f64,
    pub average_voice_events_per_browser_event: f64,
    pub score_distribution: ScoreDistribution,
}

/// Summarize a correlation run.  `None` for an empty run.
pub fn statistics(results: &[CorrelationResult]) -> Option<CorrelationStatistics> {
    if results.is_empty() {
        return None;
    }

    let total = results.len();
    let correlated = results.iter().filter(|r| !r.voice_events.is_empty()).count();
    let voice_total: usize = results.iter().map(|r| r.voice_events.len()).sum();

    let mut scores: Vec<f64> = results
        .iter()
        .map(|r| r.correlation_score)
        .filter(|s| *s > 0.0)
        .collect();
    scores.sort_by(f64::total_cmp);

    let (average, distribution) = match (scores.first(), scores.last()) {
        (Some(&min), Some(&max)) => (
            scores.iter().sum::<f64>() / scores.len() as f64,
            ScoreDistribution {
                min,
                max,
                median: scores[scores.len() / 2],
            },
        ),
        _ => (
            0.0,
            ScoreDistribution {
                min: 0.0,
                max: 0.0,
                median: 0.0,
            },
        ),
    };

    Some(CorrelationStatistics {
        total_browser_events: total,
        correlated_events: correlated,
        correlation_rate: correlated as f64 / total as f64,
        average_correlation_score: average,
        average_voice_events_per_browser_event: voice_total as f64 / total as f64,
        score_distribution: distribution,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
