//! Intent analyzer: classifies an utterance and extracts what it binds.
//!
//! Analysis is rule-based and deterministic:
//!
//! 1. **Preprocess**: collapse whitespace, normalize full-width punctuation
//!    to commas, lower-case.
//! 2. **Classify**: every intent owns a list of patterns; the match count
//!    over all of them, relative to the word count, is the intent's
//!    confidence.  Highest confidence wins, earlier intents win ties.
//! 3. **Extract** variables, conditions and intent-specific parameters.
//!
//! An optional [`LanguageModel`] can refine the rule result through
//! [`IntentAnalyzer::analyze_enhanced`]; a failing model never changes it.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use vocalflow_agent::LanguageModel;

use crate::error::{IntentError, Result};
use crate::reply::parse_object_reply;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// The classified purpose of an utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentType {
    Filter,
    Select,
    Input,
    Click,
    Navigate,
    Condition,
    Variable,
    Description,
    Unknown,
}

impl IntentType {
    /// Classification order; earlier entries win ties.
    pub const PRIORITY: [IntentType; 8] = [
        IntentType::Condition,
        IntentType::Description,
        IntentType::Navigate,
        IntentType::Filter,
        IntentType::Select,
        IntentType::Input,
        IntentType::Click,
        IntentType::Variable,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Filter => "filter",
            Self::Select => "select",
            Self::Input => "input",
            Self::Click => "click",
            Self::Navigate => "navigate",
            Self::Condition => "condition",
            Self::Variable => "variable",
            Self::Description => "description",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for IntentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IntentType {
    type Err = IntentError;

    fn from_str(s: &str) -> Result<Self> {
        let label = s.trim().to_lowercase();
        IntentType::PRIORITY
            .into_iter()
            .chain([IntentType::Unknown])
            .find(|intent| intent.as_str() == label)
            .ok_or_else(|| IntentError::InvalidConfig {
                reason: format!("unknown intent type `{s}`"),
            })
    }
}

/// Outcome of analyzing one utterance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentAnalysisResult {
    pub intent_type: IntentType,
    /// In `[0, 1]`.
    pub confidence: f64,
    /// Variable name → `${name}` placeholder.
    pub extracted_variables: BTreeMap<String, String>,
    /// `"if <antecedent> then <consequent>"` strings in match order.
    pub conditions: Vec<String>,
    /// Intent-specific values (`count`, `time_filter`, `value`,
    /// `select_all`, `deselect`).
    pub parameters: BTreeMap<String, serde_json::Value>,
    pub raw_text: String,
    pub processed_text: String,
}

// ---------------------------------------------------------------------------
// Rule tables
// ---------------------------------------------------------------------------

/// A pattern plus an optional guard `(literal, forbidden)`: a match equal to
/// `literal` is dropped when `forbidden` occurs anywhere after it.
type RuleSpec = (&'static str, Option<(&'static str, &'static str)>);

const CONDITION_RULES: &[RuleSpec] = &[
    ("如果.*就|假如.*则|当.*时.*就|要是.*就", None),
    ("当.*时|当.*的时候", None),
    ("没有.*就|为空.*就|不存在.*就", None),
    ("否则|不然|要不然", None),
];

const DESCRIPTION_RULES: &[RuleSpec] = &[
    ("^这是", Some(("这是", "输入"))),
    ("^这里是", None),
    ("^现在是", None),
    ("^这里用来", Some(("这里用来", "输入"))),
    ("^用来|^用于|^为了", None),
    ("^目的是|^作用是", None),
];

const NAVIGATE_RULES: &[RuleSpec] = &[
    ("跳转到|转到|打开.*页面|访问.*页面", None),
    ("回到|返回到|切换到", None),
    ("进入.*页面|前往.*页面", None),
];

const FILTER_RULES: &[RuleSpec] = &[
    ("筛选|过滤|查找|搜索|找到.*的", None),
    ("显示.*条|最新的.*条|前.*个", None),
    ("只要|只显示|仅显示", None),
];

const SELECT_RULES: &[RuleSpec] = &[
    ("选择|选中|勾选|点选", None),
    ("全选|选择所有|选择全部", None),
    ("取消选择|不选", None),
];

const INPUT_RULES: &[RuleSpec] = &[
    ("输入", Some(("输入", "页面"))),
    ("填写|填入|写入", None),
    ("设置.*为|改为|修改.*为", None),
    ("修改|更改|变更", None),
];

const CLICK_RULES: &[RuleSpec] = &[
    ("点击", Some(("点击", "页面"))),
    // "按下" is tried first so the guard only sees a bare "按".
    ("按下|按", Some(("按", "页面"))),
    ("提交|确认|保存|取消", None),
    ("下一步|上一步", Some(("上一步", "页面"))),
];

const VARIABLE_RULES: &[RuleSpec] = &[
    (r"\{.*\}|变量.*|参数.*", None),
    ("这里用.*代替|用.*替换", None),
    ("动态.*|可变.*", None),
];

fn rules_for(intent: IntentType) -> &'static [RuleSpec] {
    match intent {
        IntentType::Condition => CONDITION_RULES,
        IntentType::Description => DESCRIPTION_RULES,
        IntentType::Navigate => NAVIGATE_RULES,
        IntentType::Filter => FILTER_RULES,
        IntentType::Select => SELECT_RULES,
        IntentType::Input => INPUT_RULES,
        IntentType::Click => CLICK_RULES,
        IntentType::Variable => VARIABLE_RULES,
        IntentType::Unknown => &[],
    }
}

/// Keyword probes that register a placeholder variable when present.
const VARIABLE_PROBES: &[(&str, &str)] = &[
    ("username", "用户名|账号|账户名"),
    ("password", "密码|口令"),
    ("email", "邮箱|邮件|email"),
    ("phone", "电话|手机|联系方式"),
    ("name", "姓名|名字|名称"),
    ("count", r"[0-9０-９]+条|[0-9０-９]+个|[0-9０-９]+项"),
];

/// Each pattern captures an antecedent and a consequent.
const CONDITION_PATTERNS: &[&str] = &[
    "如果(.+?)就(.+?)(?:,|$)",
    "当(.+?)时(.+?)(?:,|$)",
    "假如(.+?)则(.+?)(?:,|$)",
    "(没有.*)就(.+?)(?:,|$)",
    "(为空)就(.+?)(?:,|$)",
];

const FILTER_COUNT_PATTERN: &str = r"([0-9０-９]+)条|([0-9０-９]+)个|([0-9０-９]+)项";
const FILTER_TIME_PATTERN: &str = "最新|最近|今天|昨天|本周|本月";

/// Tried in order; the first match provides the input value.
const INPUT_VALUE_PATTERNS: &[&str] = &[
    "输入(.+?)(?:,|$)",
    "填写(.+?)(?:,|$)",
    "设置为(.+?)(?:,|$)",
];

const SYSTEM_PROMPT: &str = r#"You analyze short spoken instructions recorded during a browser automation session.

Given the preprocessed utterance and a rule-based first guess, respond ONLY with a JSON object:
{
  "intent_type": "filter|select|input|click|navigate|condition|variable|description|unknown",
  "confidence": 0.0-1.0,
  "variables": {"name": "${name}"},
  "conditions": ["if <antecedent> then <consequent>"],
  "parameters": {"key": "value"}
}"#;

fn compile(pattern: &str) -> Result<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| IntentError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })
}

fn compile_all(patterns: &[&str]) -> Result<Vec<Regex>> {
    patterns.iter().map(|p| compile(p)).collect()
}

/// A compiled classification pattern.
struct Rule {
    regex: Regex,
    guard: Option<(&'static str, &'static str)>,
}

impl Rule {
    fn count_matches(&self, text: &str) -> usize {
        self.regex
            .find_iter(text)
            .filter(|m| match self.guard {
                Some((literal, forbidden)) => {
                    !(m.as_str() == literal && text[m.end()..].contains(forbidden))
                }
                None => true,
            })
            .count()
    }
}

/// The reply shape expected from the language model.
#[derive(Debug, Deserialize)]
struct EnhancementReply {
    #[serde(default)]
    intent_type: Option<IntentType>,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    variables: BTreeMap<String, String>,
    #[serde(default)]
    conditions: Vec<String>,
    #[serde(default)]
    parameters: BTreeMap<String, serde_json::Value>,
}

// ---------------------------------------------------------------------------
// Analyzer
// ---------------------------------------------------------------------------

/// Rule-based intent analyzer with an optional language-model refinement.
pub struct IntentAnalyzer {
    whitespace: Regex,
    punctuation: Regex,
    brace_variable: Regex,
    rules: Vec<(IntentType, Vec<Rule>)>,
    variable_probes: Vec<(&'static str, Regex)>,
    condition_patterns: Vec<Regex>,
    filter_count: Regex,
    filter_time: Regex,
    input_values: Vec<Regex>,
    model: Option<Arc<dyn LanguageModel>>,
}

impl IntentAnalyzer {
    /// Create a purely rule-based analyzer.
    pub fn new() -> Result<Self> {
        let rules = IntentType::PRIORITY
            .into_iter()
            .map(|intent| {
                let compiled = rules_for(intent)
                    .iter()
                    .map(|(pattern, guard)| {
                        Ok(Rule {
                            regex: compile(pattern)?,
                            guard: *guard,
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok((intent, compiled))
            })
            .collect::<Result<Vec<_>>>()?;

        let variable_probes = VARIABLE_PROBES
            .iter()
            .map(|(name, pattern)| Ok((*name, compile(pattern)?)))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            whitespace: compile(r"\s+")?,
            punctuation: compile("[，。！？；：]")?,
            brace_variable: compile(r"\{([^}]+)\}")?,
            rules,
            variable_probes,
            condition_patterns: compile_all(CONDITION_PATTERNS)?,
            filter_count: compile(FILTER_COUNT_PATTERN)?,
            filter_time: compile(FILTER_TIME_PATTERN)?,
            input_values: compile_all(INPUT_VALUE_PATTERNS)?,
            model: None,
        })
    }

    /// Create an analyzer whose [`analyze_enhanced`](Self::analyze_enhanced)
    /// consults `model`.
    pub fn with_model(model: Arc<dyn LanguageModel>) -> Result<Self> {
        let mut analyzer = Self::new()?;
        analyzer.model = Some(model);
        Ok(analyzer)
    }

    /// Analyze one utterance using the rules only.
    pub fn analyze(&self, text: &str) -> IntentAnalysisResult {
        let processed = self.preprocess(text);
        let (intent_type, confidence) = self.classify(&processed);

        debug!(intent = %intent_type, confidence, "utterance classified");

        IntentAnalysisResult {
            intent_type,
            confidence,
            extracted_variables: self.extract_variables(&processed),
            conditions: self.extract_conditions(&processed),
            parameters: self.extract_parameters(&processed, intent_type),
            raw_text: text.to_string(),
            processed_text: processed,
        }
    }

    /// Analyze each text independently, preserving order.
    pub fn batch_analyze<S: AsRef<str>>(&self, texts: &[S]) -> Vec<IntentAnalysisResult> {
        texts.iter().map(|t| self.analyze(t.as_ref())).collect()
    }

    /// Analyze with the rules, then merge the language model's opinion.
    ///
    /// Without a model, or when the model fails or replies with anything
    /// but the expected JSON object, this equals [`analyze`](Self::analyze).
    pub async fn analyze_enhanced(&self, text: &str) -> IntentAnalysisResult {
        let result = self.analyze(text);
        let Some(model) = &self.model else {
            return result;
        };

        let user = format!(
            "Utterance: {}\nRule-based intent: {}",
            result.processed_text, result.intent_type
        );

        let reply = match model.complete(SYSTEM_PROMPT, &user).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(model = model.model_id(), error = %e, "intent enhancement call failed");
                return result;
            }
        };

        match parse_object_reply::<EnhancementReply>(&reply) {
            Ok(enhancement) => merge_enhancement(result, enhancement),
            Err(reason) => {
                warn!(model = model.model_id(), %reason, "intent enhancement reply rejected");
                result
            }
        }
    }

    // -- Stages --------------------------------------------------------------

    fn preprocess(&self, text: &str) -> String {
        let collapsed = self.whitespace.replace_all(text.trim(), " ");
        self.punctuation
            .replace_all(&collapsed, ",")
            .to_lowercase()
    }

    fn classify(&self, text: &str) -> (IntentType, f64) {
        let words = text.split_whitespace().count().max(1) as f64;
        let mut best = (IntentType::Unknown, 0.0);

        for (intent, rules) in &self.rules {
            let matches: usize = rules.iter().map(|r| r.count_matches(text)).sum();
            if matches == 0 {
                continue;
            }
            let confidence = (matches as f64 / words * 2.0).min(1.0);
            // Strictly greater keeps the earlier intent on ties.
            if confidence > best.1 {
                best = (*intent, confidence);
            }
        }

        best
    }

    fn extract_variables(&self, text: &str) -> BTreeMap<String, String> {
        let mut variables = BTreeMap::new();

        for caps in self.brace_variable.captures_iter(text) {
            let name = &caps[1];
            variables.insert(name.to_string(), placeholder(name));
        }

        for (name, probe) in &self.variable_probes {
            if probe.is_match(text) {
                variables.insert((*name).to_string(), placeholder(name));
            }
        }

        variables
    }

    fn extract_conditions(&self, text: &str) -> Vec<String> {
        self.condition_patterns
            .iter()
            .flat_map(|pattern| pattern.captures_iter(text))
            .map(|caps| format!("if {} then {}", caps[1].trim(), caps[2].trim()))
            .collect()
    }

    fn extract_parameters(
        &self,
        text: &str,
        intent: IntentType,
    ) -> BTreeMap<String, serde_json::Value> {
        let mut parameters = BTreeMap::new();

        match intent {
            IntentType::Filter => {
                let count = self.filter_count.captures(text).and_then(|caps| {
                    caps.iter()
                        .skip(1)
                        .flatten()
                        .next()
                        .and_then(|m| count_value(m.as_str()))
                });
                if let Some(count) = count {
                    parameters.insert("count".into(), count.into());
                }
                if let Some(m) = self.filter_time.find(text) {
                    parameters.insert("time_filter".into(), m.as_str().into());
                }
            }
            IntentType::Input => {
                if let Some(caps) = self.input_values.iter().find_map(|p| p.captures(text)) {
                    parameters.insert("value".into(), caps[1].trim().into());
                }
            }
            IntentType::Select => {
                if text.contains("全选") || text.contains("所有") {
                    parameters.insert("select_all".into(), true.into());
                } else if text.contains("取消") {
                    parameters.insert("deselect".into(), true.into());
                }
            }
            _ => {}
        }

        parameters
    }
}

fn placeholder(name: &str) -> String {
    format!("${{{name}}}")
}

/// Numeric value of an ASCII or full-width digit run.  Runs too long for
/// `u64` become a float so the magnitude survives.
fn count_value(digits: &str) -> Option<serde_json::Value> {
    let mut exact = Some(0u64);
    let mut approx = 0f64;
    for c in digits.chars() {
        let digit = match c {
            '0'..='9' => c as u32 - '0' as u32,
            '０'..='９' => c as u32 - '０' as u32,
            _ => return None,
        };
        exact = exact
            .and_then(|n| n.checked_mul(10))
            .and_then(|n| n.checked_add(u64::from(digit)));
        approx = approx * 10.0 + f64::from(digit);
    }
    match exact {
        Some(n) => Some(n.into()),
        None => serde_json::Number::from_f64(approx).map(Into::into),
    }
}

fn merge_enhancement(
    mut result: IntentAnalysisResult,
    reply: EnhancementReply,
) -> IntentAnalysisResult {
    let model_confidence = reply.confidence.unwrap_or(0.0).clamp(0.0, 1.0);
    result.confidence = result.confidence.max(model_confidence);
    if let Some(intent) = reply.intent_type {
        result.intent_type = intent;
    }
    result.extracted_variables.extend(reply.variables);
    result.conditions.extend(reply.conditions);
    result.parameters.extend(reply.parameters);
    result
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    fn analyzer() -> IntentAnalyzer {
        IntentAnalyzer::new().unwrap()
    }

    #[test]
    fn click_intent() {
        let r = analyzer().analyze("点击提交按钮");
        assert_eq!(r.intent_type, IntentType::Click);
        assert!(r.confidence > 0.0);
    }

    #[test]
    fn input_intent_with_username_variable() {
        let r = analyzer().analyze("输入用户名admin");
        assert_eq!(r.intent_type, IntentType::Input);
        assert_eq!(r.extracted_variables["username"], "${username}");
        assert_eq!(r.parameters["value"], "用户名admin");
    }

    #[test]
    fn filter_intent_with_count_and_time() {
        let r = analyzer().analyze("显示最新的15条记录");
        assert_eq!(r.intent_type, IntentType::Filter);
        assert_eq!(r.parameters["count"], 15);
        assert_eq!(r.parameters["time_filter"], "最新");
        assert_eq!(r.extracted_variables["count"], "${count}");
    }

    #[test]
    fn filter_count_accepts_full_width_digits() {
        let r = analyzer().analyze("显示最新的１５条记录");
        assert_eq!(r.intent_type, IntentType::Filter);
        assert_eq!(r.parameters["count"], 15);
        assert_eq!(r.extracted_variables["count"], "${count}");
    }

    #[test]
    fn filter_count_beyond_u64_keeps_magnitude() {
        let r = analyzer().analyze("显示最新的123456789012345678901234条记录");
        assert_eq!(r.intent_type, IntentType::Filter);
        let count = r.parameters["count"].as_f64().unwrap();
        assert!((count / 1.234_567_890_123_456_8e23 - 1.0).abs() < 1e-12);
    }

    #[test]
    fn other_script_digits_are_not_counts() {
        // Arabic-Indic digits register neither a count variable nor a count parameter.
        let r = analyzer().analyze("显示最新的١٥条记录");
        assert!(!r.parameters.contains_key("count"));
        assert!(!r.extracted_variables.contains_key("count"));
    }

    #[test]
    fn condition_intent() {
        let r = analyzer().analyze("如果没有数据就跳过这步");
        assert_eq!(r.intent_type, IntentType::Condition);
        assert!(!r.conditions.is_empty());
        assert_eq!(r.conditions[0], "if 没有数据 then 跳过这步");
        // Two patterns hit; duplicates are kept.
        assert_eq!(r.conditions.len(), 2);
    }

    #[test]
    fn select_flags() {
        let a = analyzer();
        assert_eq!(a.analyze("全选所有项目").parameters["select_all"], true);
        let r = a.analyze("取消选择");
        assert_eq!(r.intent_type, IntentType::Select);
        assert_eq!(r.parameters["deselect"], true);
    }

    #[test]
    fn navigate_and_description() {
        let a = analyzer();
        assert_eq!(a.analyze("跳转到首页").intent_type, IntentType::Navigate);
        assert_eq!(a.analyze("这是登录页面").intent_type, IntentType::Description);
    }

    #[test]
    fn page_guard_suppresses_input_and_click() {
        let a = analyzer();
        // "输入" followed by "页面" is navigation talk, not data entry.
        let r = a.analyze("输入页面");
        assert_ne!(r.intent_type, IntentType::Input);
        assert_eq!(a.analyze("点击进入页面").intent_type, IntentType::Navigate);
        // Description guard: "这是" followed by "输入" is not a description.
        assert_eq!(a.analyze("这是输入框").intent_type, IntentType::Input);
    }

    #[test]
    fn unknown_when_nothing_matches() {
        let r = analyzer().analyze("今天天气不错");
        assert_eq!(r.intent_type, IntentType::Unknown);
        assert_eq!(r.confidence, 0.0);
        assert!(r.parameters.is_empty());
    }

    #[test]
    fn empty_text_is_unknown() {
        let r = analyzer().analyze("   ");
        assert_eq!(r.intent_type, IntentType::Unknown);
        assert_eq!(r.processed_text, "");
    }

    #[test]
    fn preprocessing_normalizes() {
        let r = analyzer().analyze("  点击   提交按钮！！！  ");
        assert_eq!(r.processed_text, "点击 提交按钮,,,");
        assert_eq!(r.raw_text, "  点击   提交按钮！！！  ");
        assert_eq!(analyzer().analyze("输入 EMAIL").processed_text, "输入 email");
    }

    #[test]
    fn confidence_scales_with_word_count() {
        let a = analyzer();
        // One CLICK match over four words: 1 / 4 * 2.
        let r = a.analyze("please 点击 the thing");
        assert_eq!(r.intent_type, IntentType::Click);
        assert!((r.confidence - 0.5).abs() < 1e-9);
    }

    #[test]
    fn ties_go_to_earlier_intent() {
        // "选择" scores for SELECT; "确认" for CLICK. SELECT precedes CLICK.
        let r = analyzer().analyze("选择 确认 a b");
        assert_eq!(r.intent_type, IntentType::Select);
    }

    #[test]
    fn brace_variables() {
        let r = analyzer().analyze("输入{客户名称}和{order_id}");
        assert_eq!(r.extracted_variables["客户名称"], "${客户名称}");
        assert_eq!(r.extracted_variables["order_id"], "${order_id}");
        assert_eq!(r.extracted_variables["name"], "${name}");
    }

    #[test]
    fn batch_preserves_order() {
        let results = analyzer().batch_analyze(&["点击提交按钮", "输入用户名admin", "跳转到首页"]);
        let intents: Vec<IntentType> = results.iter().map(|r| r.intent_type).collect();
        assert_eq!(intents, [IntentType::Click, IntentType::Input, IntentType::Navigate]);
    }

    #[test]
    fn rule_analysis_is_deterministic() {
        let a = analyzer();
        let text = "如果没有{账号}就输入用户名和密码，然后显示最新的10条";
        let first = serde_json::to_string(&a.analyze(text)).unwrap();
        let second = serde_json::to_string(&IntentAnalyzer::new().unwrap().analyze(text)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn intent_labels_round_trip_through_strings() {
        for intent in IntentType::PRIORITY {
            assert_eq!(intent.as_str().parse::<IntentType>().unwrap(), intent);
        }
        assert_eq!(serde_json::to_value(IntentType::Navigate).unwrap(), "navigate");
        assert!("jump".parse::<IntentType>().is_err());
    }

    // -- Enhancement ---------------------------------------------------------

    struct Scripted(std::result::Result<String, String>);

    #[async_trait]
    impl LanguageModel for Scripted {
        fn model_id(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, _system: &str, user: &str) -> vocalflow_agent::Result<String> {
            assert!(user.contains("Rule-based intent"));
            self.0
                .clone()
                .map_err(|reason| vocalflow_agent::AgentError::LlmRequestFailed { reason })
        }
    }

    fn enhanced(reply: std::result::Result<&str, &str>) -> IntentAnalyzer {
        let reply = reply.map(str::to_string).map_err(str::to_string);
        IntentAnalyzer::with_model(Arc::new(Scripted(reply))).unwrap()
    }

    #[tokio::test]
    async fn enhancement_merges_model_reply() {
        let a = enhanced(Ok(r#"```json
{"intent_type": "click", "confidence": 0.95,
 "variables": {"target": "${target}"},
 "conditions": ["if visible then click"],
 "parameters": {"retries": 2}}
```"#));

        let r = a.analyze_enhanced("输入用户名admin").await;
        assert_eq!(r.intent_type, IntentType::Click);
        assert!((r.confidence - 1.0).abs() < 1e-9);
        assert!(r.extracted_variables.contains_key("username"));
        assert!(r.extracted_variables.contains_key("target"));
        assert_eq!(r.conditions, vec!["if visible then click".to_string()]);
        assert_eq!(r.parameters["retries"], 2);
        assert_eq!(r.parameters["value"], "用户名admin");
    }

    #[tokio::test]
    async fn enhancement_takes_the_higher_confidence() {
        let a = enhanced(Ok(r#"{"confidence": 0.9}"#));
        let r = a.analyze_enhanced("please 点击 the thing").await;
        assert_eq!(r.intent_type, IntentType::Click);
        assert!((r.confidence - 0.9).abs() < 1e-9);
    }

    #[tokio::test]
    async fn failing_model_leaves_rule_result() {
        let plain = analyzer().analyze("显示最新的15条记录");

        let failing = enhanced(Err("connection reset"));
        assert_eq!(failing.analyze_enhanced("显示最新的15条记录").await, plain);

        let garbled = enhanced(Ok("I think this is a filter."));
        assert_eq!(garbled.analyze_enhanced("显示最新的15条记录").await, plain);

        let wrong_shape = enhanced(Ok(r#"{"intent_type": "teleport"}"#));
        assert_eq!(wrong_shape.analyze_enhanced("显示最新的15条记录").await, plain);
    }

    #[tokio::test]
    async fn without_model_enhanced_equals_rules() {
        let a = analyzer();
        assert_eq!(a.analyze_enhanced("点击提交按钮").await, a.analyze("点击提交按钮"));
    }
}
