//! Agent category derivation.
//!
//! Agent identifiers are namespaced as `<category>:<short-name>`. The
//! category comes from the namespace prefix when it is a known key;
//! otherwise the short name is looked up across the table. Anything
//! unmatched lands in `other`. The table is a fixed, versioned rule set
//! so categorization is testable independently of its callers.

/// Fixed category table: category key and the agent short names that
/// belong to it.
pub const AGENT_CATEGORIES: &[(&str, &[&str])] = &[
    (
        "backend-development",
        &[
            "backend-architect",
            "graphql-architect",
            "tdd-orchestrator",
            "django-pro",
            "fastapi-pro",
            "python-pro",
        ],
    ),
    (
        "quality-testing",
        &[
            "code-reviewer",
            "test-automator",
            "tdd-orchestrator",
            "debugger",
            "performance-engineer",
        ],
    ),
    (
        "compounding-engineering",
        &[
            "architecture-strategist",
            "best-practices-researcher",
            "kieran-python-reviewer",
            "kieran-typescript-reviewer",
            "performance-oracle",
            "security-sentinel",
        ],
    ),
    (
        "infrastructure",
        &[
            "deployment-engineer",
            "terraform-specialist",
            "cloud-architect",
            "kubernetes-architect",
            "devops-troubleshooter",
        ],
    ),
    (
        "debugging",
        &["debugger", "error-detective", "devops-troubleshooter", "dx-optimizer"],
    ),
    (
        "documentation",
        &["docs-architect", "api-documenter", "tutorial-engineer", "mermaid-expert"],
    ),
];

/// Category bucket for agents no rule matches.
pub const OTHER: &str = "other";

/// Derive the category for an agent identifier.
pub fn derive_category(agent_name: &str) -> &'static str {
    if let Some((prefix, _)) = agent_name.split_once(':') {
        if let Some((category, _)) = AGENT_CATEGORIES.iter().find(|(key, _)| *key == prefix) {
            return category;
        }
    }

    let short_name = agent_name.rsplit(':').next().unwrap_or(agent_name);
    for (category, agents) in AGENT_CATEGORIES {
        if agents.contains(&short_name) {
            return category;
        }
    }

    OTHER
}

/// Whether `category` is a known category key (including `other`).
pub fn is_known_category(category: &str) -> bool {
    category == OTHER || AGENT_CATEGORIES.iter().any(|(key, _)| *key == category)
}
