//! Query Classifier
//!
//! Questions are matched against an ordered rule table, first match wins.
//! Later rules use broader keyword sets, so the order of each table is
//! part of its contract. When no rule matches the oracle may be asked to
//! pick a quick action; anything it says that is not `simple:<action>`
//! becomes `Complex`.

use std::fmt;
use std::sync::Arc;

use log::{debug, warn};
use once_cell::sync::Lazy;
use oracle_sdk::{ReasoningOracle, ReasoningOracleExt};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::sql_extract::extract_sql;
use crate::tools::ToolName;

/// How a question will be answered
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Classification {
    ToolSpecific {
        tool: ToolName,
        extracted_arg: Option<String>,
    },
    Simple {
        action: String,
    },
    Complex,
}

impl Classification {
    fn tool(tool: ToolName, extracted_arg: Option<String>) -> Self {
        Classification::ToolSpecific { tool, extracted_arg }
    }

    fn simple(action: ToolName) -> Self {
        Classification::Simple {
            action: action.to_string(),
        }
    }
}

/// Which rule table to evaluate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassifierMode {
    Standard,
    /// Standard rules plus metric and device keywords forcing `Complex`
    #[default]
    Hybrid,
}

impl fmt::Display for ClassifierMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassifierMode::Standard => f.write_str("standard"),
            ClassifierMode::Hybrid => f.write_str("hybrid"),
        }
    }
}

fn keywords(pattern: &str) -> Regex {
    Regex::new(&format!(r"(?i)\b(?:{})\b", pattern)).expect("valid keyword regex")
}

static LIST_TABLES: Lazy<Regex> = Lazy::new(|| keywords(r"(?:list|show|what)\s+(?:all\s+|the\s+)?tables"));
static SCHEMA: Lazy<Regex> = Lazy::new(|| keywords("schema|structure|columns"));
static METRIC: Lazy<Regex> = Lazy::new(|| keywords("maximum|average|voltage|current|temperature"));
static DEVICE: Lazy<Regex> = Lazy::new(|| keywords("device|devices"));
static DATA: Lazy<Regex> = Lazy::new(|| keywords("sql|query|select|analyze|data|find"));
static COUNT: Lazy<Regex> = Lazy::new(|| keywords(r"count|how\s+many"));
static LATEST: Lazy<Regex> = Lazy::new(|| keywords("latest"));
static SQL_VERB_START: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?:select|with|insert|update|delete|drop|alter|create|truncate|grant)\b")
        .expect("valid sql verb regex")
});

static TABLE_AFTER_KEYWORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:table|schema|structure)\s+(?:of\s+)?(?:the\s+)?(\w+)").expect("valid table regex")
});
static TABLE_BEFORE_KEYWORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(\w+)\s+table\b").expect("valid table regex"));

const TABLE_STOPWORDS: &[&str] = &[
    "a", "an", "the", "of", "for", "in", "is", "are", "table", "tables", "schema", "structure",
    "columns", "what", "which", "this", "that", "me", "show", "describe", "and", "with", "to",
];

/// One row of a rule table
pub struct Rule {
    pub name: &'static str,
    pub matches: fn(&str) -> bool,
    pub outcome: fn(&str) -> Classification,
}

const LIST_TABLES_RULE: Rule = Rule {
    name: "list_tables",
    matches: |q| LIST_TABLES.is_match(q),
    outcome: |_| Classification::tool(ToolName::ListTables, None),
};

const SCHEMA_RULE: Rule = Rule {
    name: "schema",
    matches: |q| SCHEMA.is_match(q),
    outcome: |q| Classification::tool(ToolName::GetSchema, extract_table_name(q)),
};

const METRIC_RULE: Rule = Rule {
    name: "metric",
    matches: |q| METRIC.is_match(q),
    outcome: |_| Classification::Complex,
};

const DEVICE_RULE: Rule = Rule {
    name: "device",
    matches: |q| DEVICE.is_match(q),
    outcome: |_| Classification::Complex,
};

const DATA_RULE: Rule = Rule {
    name: "data",
    matches: |q| DATA.is_match(q) || SQL_VERB_START.is_match(q),
    outcome: |q| Classification::tool(ToolName::SqlAnalysis, extract_statement(q)),
};

const COUNT_RULE: Rule = Rule {
    name: "count",
    matches: |q| COUNT.is_match(q),
    outcome: |_| Classification::simple(ToolName::CountRecords),
};

const LATEST_RULE: Rule = Rule {
    name: "latest",
    matches: |q| LATEST.is_match(q),
    outcome: |_| Classification::simple(ToolName::LatestData),
};

static STANDARD_RULES: [Rule; 5] = [LIST_TABLES_RULE, SCHEMA_RULE, DATA_RULE, COUNT_RULE, LATEST_RULE];

static HYBRID_RULES: [Rule; 7] = [
    LIST_TABLES_RULE,
    SCHEMA_RULE,
    METRIC_RULE,
    DEVICE_RULE,
    DATA_RULE,
    COUNT_RULE,
    LATEST_RULE,
];

/// The ordered rule table for `mode`
pub fn rules(mode: ClassifierMode) -> &'static [Rule] {
    match mode {
        ClassifierMode::Standard => &STANDARD_RULES,
        ClassifierMode::Hybrid => &HYBRID_RULES,
    }
}

/// Evaluate the rule table only, returning the matching rule's name
pub fn match_rules(mode: ClassifierMode, question: &str) -> Option<(&'static str, Classification)> {
    rules(mode)
        .iter()
        .find(|rule| (rule.matches)(question))
        .map(|rule| (rule.name, (rule.outcome)(question)))
}

/// Table name after "table"/"schema"/"structure" (optionally "of"),
/// or directly before "table"
pub fn extract_table_name(question: &str) -> Option<String> {
    let candidate = |caps: regex::Captures<'_>| {
        caps.get(1)
            .map(|m| m.as_str())
            .filter(|word| !TABLE_STOPWORDS.contains(&word.to_ascii_lowercase().as_str()))
            .map(str::to_string)
    };

    TABLE_AFTER_KEYWORD
        .captures_iter(question)
        .find_map(candidate)
        .or_else(|| TABLE_BEFORE_KEYWORD.captures_iter(question).find_map(candidate))
}

/// SQL carried by the question: the question itself when it is a
/// statement, else an embedded SELECT
fn extract_statement(question: &str) -> Option<String> {
    if SQL_VERB_START.is_match(question) {
        return Some(question.trim().to_string());
    }
    extract_sql(question)
}

/// Parse the oracle's `simple:<action>` / `complex` answer
pub fn parse_oracle_label(answer: &str) -> Classification {
    let cleaned = answer
        .trim()
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '`' || c == '.' || c.is_whitespace())
        .to_ascii_lowercase();

    match cleaned.strip_prefix("simple:") {
        Some(action) => {
            let action = action
                .trim()
                .trim_matches(|c: char| !(c.is_ascii_alphanumeric() || c == '_'));
            if action.is_empty() {
                Classification::Complex
            } else {
                Classification::Simple {
                    action: action.to_string(),
                }
            }
        }
        None => Classification::Complex,
    }
}

fn oracle_prompt(question: &str) -> String {
    let actions = ToolName::QUICK_ACTIONS
        .iter()
        .map(|a| format!("simple:{}", a))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "Classify the following question about a device telemetry database.\n\
         Answer with exactly one of: {}, complex.\n\
         Use a simple action only if it answers the question completely.\n\
         Question: {}",
        actions, question
    )
}

/// Rule table plus optional oracle fallback
pub struct QueryClassifier {
    mode: ClassifierMode,
    oracle: Option<Arc<dyn ReasoningOracle>>,
}

impl QueryClassifier {
    pub fn new(mode: ClassifierMode, oracle: Option<Arc<dyn ReasoningOracle>>) -> Self {
        Self { mode, oracle }
    }

    pub fn mode(&self) -> ClassifierMode {
        self.mode
    }

    /// Classify a question. Never fails; the worst case is `Complex`.
    pub async fn classify(&self, question: &str) -> Classification {
        if let Some((rule, classification)) = match_rules(self.mode, question) {
            debug!("Question matched {} rule ({} mode)", rule, self.mode);
            return classification;
        }

        let Some(oracle) = &self.oracle else {
            return Classification::Complex;
        };

        match oracle.ask(&oracle_prompt(question)).await {
            Ok(answer) => {
                let classification = parse_oracle_label(&answer);
                debug!("Oracle classified question as {:?}", classification);
                classification
            }
            Err(e) => {
                warn!("Oracle classification failed, treating question as complex: {}", e);
                Classification::Complex
            }
        }
    }
}
