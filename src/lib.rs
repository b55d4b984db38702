//! agentmeter: cost-aware model routing and telemetry for agent fleets.
//!
//! The crate has three pillars, tied together by [`report::Reporting`]:
//!
//! - [`routing`]: score a unit of work for complexity and pick the
//!   cheapest model tier that can handle it.
//! - [`ledger`]: record what each invocation actually cost, roll it up
//!   by day, month, category and agent, and watch the monthly budget.
//! - [`performance`]: track per-agent success rates, durations and
//!   failure modes, and surface agents that need attention.
//!
//! All reads degrade gracefully: a missing or corrupt state document
//! yields an empty view and a warning, never a failure.

pub mod category;
pub mod cli;
pub mod config;
pub mod error;
pub mod ledger;
pub mod performance;
pub mod report;
pub mod routing;
pub mod store;

use serde::{Deserialize, Serialize};

pub use config::Config;
pub use error::{Error, Result};
pub use ledger::{CostLedger, CostReport, RecordedCost};
pub use performance::{InvocationOutcome, PerformanceTracker};
pub use report::Reporting;
pub use routing::{ComplexityAnalysis, ModelDecision, ModelSelector, TaskContext, Tier};
pub use store::{FileStore, MemoryStore, StateStore};

/// Priority of a suggestion or recommendation. Ordered so that sorting
/// ascending puts the most urgent items first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_sorts_most_urgent_first() {
        let mut priorities = vec![Priority::Low, Priority::High, Priority::Medium];
        priorities.sort();
        assert_eq!(
            priorities,
            vec![Priority::High, Priority::Medium, Priority::Low]
        );
    }
}
