//! Task complexity scorer.
//!
//! Analyzes a unit of work (changed files, diff, description, risk flags)
//! across four dimensions and produces a 0-100 composite score with a
//! breakdown for explainability. Deterministic and side-effect-free.
//!
//! Score bands map to tiers downstream: low scores route to the economy
//! model, the middle band to economy-with-review, high scores to premium.

use std::collections::BTreeMap;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Description of a unit of work to be scored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskContext {
    /// Changed file paths, in order.
    #[serde(default)]
    pub files_changed: Vec<String>,
    /// Raw diff text, if available.
    #[serde(default)]
    pub git_diff: Option<String>,
    #[serde(default)]
    pub lines_changed: u32,
    #[serde(default)]
    pub functions_added: u32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub affects_production: bool,
    #[serde(default)]
    pub breaking_change: bool,
    #[serde(default = "default_has_tests")]
    pub has_tests: bool,
}

fn default_has_tests() -> bool {
    true
}

impl Default for TaskContext {
    fn default() -> Self {
        Self {
            files_changed: Vec::new(),
            git_diff: None,
            lines_changed: 0,
            functions_added: 0,
            name: String::new(),
            description: String::new(),
            affects_production: false,
            breaking_change: false,
            has_tests: true,
        }
    }
}

/// Domain classification from a priority-ordered keyword-group match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainCategory {
    Finance,
    Security,
    Database,
    Api,
    General,
}

impl DomainCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            DomainCategory::Finance => "finance",
            DomainCategory::Security => "security",
            DomainCategory::Database => "database",
            DomainCategory::Api => "api",
            DomainCategory::General => "general",
        }
    }
}

/// Per-dimension sub-scores, each clamped to its own range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    /// File-change complexity, 0-40.
    pub file: u32,
    /// Code-change complexity, 0-30.
    pub code: u32,
    /// Domain complexity, 0-25.
    pub domain: u32,
    /// Risk factors, 0-35.
    pub risk: u32,
}

/// Explainability payload: which rules fired and why.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScoreDetails {
    pub high_risk_files: Vec<String>,
    pub file_types: BTreeMap<String, u32>,
    pub critical_patterns: Vec<String>,
    pub keywords_found: Vec<String>,
}

/// Result of scoring a unit of work. Immutable once produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplexityAnalysis {
    /// Composite score, clamped to 0-100.
    pub total: u32,
    pub breakdown: ScoreBreakdown,
    pub domain_category: DomainCategory,
    pub details: ScoreDetails,
}

/// High-risk keywords checked against `name + description`, +3 each.
const HIGH_RISK_KEYWORDS: &[&str] = &[
    "payment",
    "security",
    "auth",
    "authentication",
    "authorization",
    "invoice",
    "transaction",
    "finance",
    "migration",
    "event sourcing",
    "graphql",
    "federation",
    "encryption",
    "jwt",
    "token",
];

/// Priority-ordered keyword groups: only the first matching group's bonus
/// applies.
const DOMAIN_GROUPS: &[(DomainCategory, &[&str], u32)] = &[
    (DomainCategory::Finance, &["payment", "invoice", "transaction", "finance"], 5),
    (DomainCategory::Security, &["auth", "security", "encryption"], 8),
    (DomainCategory::Database, &["migration", "database", "schema"], 7),
    (DomainCategory::Api, &["graphql", "federation", "api"], 5),
];

lazy_static! {
    /// File paths matching any of these contribute +5 each.
    static ref RE_HIGH_RISK_FILE: Regex = Regex::new(
        r"auth|security|payment|invoice|transaction|migration|\.graphql$|schema\.|database|config|env"
    ).unwrap();

    /// Destructive SQL / raw-query execution patterns, +15 each.
    static ref CRITICAL_SQL_PATTERNS: Vec<(&'static str, Regex)> = vec![
        ("DROP TABLE", Regex::new(r"(?i)DROP\s+TABLE").unwrap()),
        ("ALTER TABLE", Regex::new(r"(?i)ALTER\s+TABLE").unwrap()),
        ("DELETE FROM", Regex::new(r"(?i)DELETE\s+FROM").unwrap()),
        ("TRUNCATE", Regex::new(r"(?i)TRUNCATE").unwrap()),
        ("DROP DATABASE", Regex::new(r"(?i)DROP\s+DATABASE").unwrap()),
        ("executeRaw", Regex::new(r"(?i)executeRaw").unwrap()),
        ("rawQuery", Regex::new(r"(?i)rawQuery").unwrap()),
        ("unsafeRaw", Regex::new(r"(?i)unsafeRaw").unwrap()),
    ];
}

/// Score a unit of work.
///
/// Returns the composite 0-100 score with per-dimension breakdown and the
/// rule hits that produced it.
pub fn score(task: &TaskContext) -> ComplexityAnalysis {
    let mut details = ScoreDetails::default();

    let file = file_score(&task.files_changed, &mut details);
    let code = code_score(
        task.git_diff.as_deref(),
        task.lines_changed,
        task.functions_added,
        &mut details,
    );
    let (domain, domain_category) = domain_score(&task.name, &task.description, &mut details);
    let risk = risk_score(task.affects_production, task.breaking_change, task.has_tests);

    let breakdown = ScoreBreakdown {
        file,
        code,
        domain,
        risk,
    };
    let total = (file + code + domain + risk).min(100);

    ComplexityAnalysis {
        total,
        breakdown,
        domain_category,
        details,
    }
}

/// File-change dimension: quantity tiers plus per-file risk adjustments.
/// Documentation and config file types reduce the raw score, so it can go
/// negative before the clamp.
fn file_score(files_changed: &[String], details: &mut ScoreDetails) -> u32 {
    let mut score: i32 = match files_changed.len() {
        n if n > 20 => 30,
        n if n > 10 => 20,
        n if n > 5 => 10,
        _ => 0,
    };

    for path in files_changed {
        let lower = path.to_lowercase();

        if RE_HIGH_RISK_FILE.is_match(&lower) {
            score += 5;
            details.high_risk_files.push(path.clone());
        }

        if let Some(ext) = std::path::Path::new(path).extension().and_then(|e| e.to_str()) {
            *details.file_types.entry(format!(".{ext}")).or_insert(0) += 1;
        }

        if path.ends_with(".graphql") {
            score += 8;
        } else if lower.contains("migration") {
            score += 10;
        } else if path.ends_with(".md") || path.ends_with(".txt") || path.ends_with(".json") {
            score -= 2;
        }
    }

    score.clamp(0, 40) as u32
}

/// Code-change dimension: size tiers plus destructive-pattern detection.
fn code_score(
    git_diff: Option<&str>,
    lines_changed: u32,
    functions_added: u32,
    details: &mut ScoreDetails,
) -> u32 {
    let mut score: u32 = match lines_changed {
        n if n > 1000 => 20,
        n if n > 500 => 15,
        n if n > 200 => 10,
        n if n > 100 => 5,
        _ => 0,
    };

    score += match functions_added {
        n if n > 20 => 10,
        n if n > 10 => 7,
        n if n > 5 => 5,
        _ => 0,
    };

    if let Some(diff) = git_diff {
        for (name, re) in CRITICAL_SQL_PATTERNS.iter() {
            if re.is_match(diff) {
                score += 15;
                details.critical_patterns.push((*name).to_string());
            }
        }
    }

    score.min(30)
}

/// Domain dimension: distinct high-risk keywords plus a single categorical
/// bonus from the first matching keyword group.
fn domain_score(name: &str, description: &str, details: &mut ScoreDetails) -> (u32, DomainCategory) {
    let full_text = format!("{name} {description}").to_lowercase();
    let mut score: u32 = 0;

    for keyword in HIGH_RISK_KEYWORDS {
        if full_text.contains(keyword) {
            score += 3;
            details.keywords_found.push((*keyword).to_string());
        }
    }

    let mut category = DomainCategory::General;
    for (candidate, keywords, bonus) in DOMAIN_GROUPS {
        if keywords.iter().any(|k| full_text.contains(k)) {
            category = *candidate;
            score += bonus;
            break;
        }
    }

    (score.min(25), category)
}

/// Risk dimension: production impact, breaking change, missing tests.
fn risk_score(affects_production: bool, breaking_change: bool, has_tests: bool) -> u32 {
    let mut score: u32 = 0;
    if affects_production {
        score += 20;
    }
    if breaking_change {
        score += 15;
    }
    if !has_tests {
        score += 10;
    }
    score.min(35)
}
