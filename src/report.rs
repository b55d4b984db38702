//! Read-only reporting over the ledger and the performance tracker.
//!
//! Reports never mutate state and never fail as a whole: each section
//! is produced independently, and a section whose backing read fails is
//! dropped from the report with a warning.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::Priority;
use crate::config::Config;
use crate::ledger::{self, CostLedger, MonthSummary};
use crate::performance::{AgentRow, CategorySummary, PerformanceTracker};
use crate::routing::{ModelSelector, SavingsProjection};
use crate::store::StateStore;

/// Savings projections below this reduction are not worth surfacing as
/// a recommendation.
const SAVINGS_RECOMMENDATION_MIN_PCT: f64 = 10.0;

/// Compact status view: this month's spend and the agent table.
#[derive(Debug, Clone, Serialize)]
pub struct QuickReport {
    pub month: String,
    pub cost: Option<MonthSummary>,
    pub agents: Option<Vec<AgentRow>>,
}

/// Everything the engine knows, for the full dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct FullReport {
    pub month: String,
    pub cost: Option<MonthSummary>,
    pub agents: Option<Vec<AgentRow>>,
    pub categories: Option<BTreeMap<String, CategorySummary>>,
    pub savings: Option<SavingsProjection>,
    pub recommendations: Vec<ReportItem>,
}

/// One merged recommendation line, from any source.
#[derive(Debug, Clone, Serialize)]
pub struct ReportItem {
    pub priority: Priority,
    pub message: String,
}

/// Reporting facade over one shared state store.
pub struct Reporting {
    ledger: CostLedger,
    tracker: PerformanceTracker,
    selector: ModelSelector,
}

impl Reporting {
    pub fn new(store: Arc<dyn StateStore>, config: &Config) -> Self {
        Self {
            ledger: CostLedger::new(
                store.clone(),
                config.budget.clone(),
                config.rates.clone(),
            ),
            tracker: PerformanceTracker::new(store),
            selector: ModelSelector::new(config.routing.clone()),
        }
    }

    pub fn ledger(&self) -> &CostLedger {
        &self.ledger
    }

    pub fn tracker(&self) -> &PerformanceTracker {
        &self.tracker
    }

    pub fn selector(&self) -> &ModelSelector {
        &self.selector
    }

    /// Compact report for the current month.
    pub fn quick(&self) -> QuickReport {
        self.quick_at(Utc::now())
    }

    pub fn quick_at(&self, now: DateTime<Utc>) -> QuickReport {
        let month = ledger::month_key(now);
        QuickReport {
            cost: section("cost", self.ledger.summary_or_empty(&month)),
            agents: section("agents", self.tracker.summary_at(now)),
            month,
        }
    }

    /// Full report for the current month.
    pub fn full(&self) -> FullReport {
        self.full_at(Utc::now())
    }

    pub fn full_at(&self, now: DateTime<Utc>) -> FullReport {
        let month = ledger::month_key(now);
        let savings = self.savings_for(&month);
        FullReport {
            cost: section("cost", self.ledger.summary_or_empty(&month)),
            agents: section("agents", self.tracker.summary_at(now)),
            categories: section("categories", self.tracker.category_summaries()),
            recommendations: self.recommendations_at(&month, now, savings.as_ref()),
            savings,
            month,
        }
    }

    /// Projected savings from rebalancing this month's tier mix, or
    /// `None` when there is no usage to project from.
    pub fn savings_for(&self, month: &str) -> Option<SavingsProjection> {
        let dist = section("savings", self.ledger.distribution(month))?;
        if dist.monthly_cost_usd <= 0.0 {
            return None;
        }
        Some(self.selector.estimate_savings(&dist))
    }

    fn recommendations_at(
        &self,
        month: &str,
        now: DateTime<Utc>,
        savings: Option<&SavingsProjection>,
    ) -> Vec<ReportItem> {
        let mut items = Vec::new();

        if let Some(projection) = savings {
            if projection.reduction_pct > SAVINGS_RECOMMENDATION_MIN_PCT {
                items.push(ReportItem {
                    priority: Priority::High,
                    message: projection.recommendation.clone(),
                });
            }
        }

        if let Some(suggestions) = section("optimizations", self.ledger.suggest_optimizations(month))
        {
            items.extend(suggestions.into_iter().map(|s| ReportItem {
                priority: s.priority,
                message: s.message,
            }));
        }

        if let Some(recs) = section("recommendations", self.tracker.recommendations_at(now)) {
            items.extend(recs.into_iter().map(|r| ReportItem {
                priority: r.priority,
                message: format!("{}: {}", r.agent_name, r.message),
            }));
        }

        items.sort_by_key(|i| i.priority);
        items
    }
}

fn section<T, E: std::fmt::Display>(
    name: &'static str,
    result: Result<T, E>,
) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(section = name, error = %e, "report section unavailable");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;
    use crate::ledger::CostReport;
    use crate::performance::InvocationOutcome;
    use crate::store::MemoryStore;
    use chrono::TimeZone;

    fn ts(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, day, hour, 0, 0).unwrap()
    }

    fn seeded_reporting() -> Reporting {
        let store = Arc::new(MemoryStore::new());
        let config = Config::default();
        let reporting = Reporting::new(store, &config);

        for i in 0..4 {
            reporting
                .ledger()
                .record_at(
                    &CostReport {
                        agent_name: "backend-architect".to_string(),
                        model: "sonnet-4.5".to_string(),
                        tokens_input: 50_000,
                        tokens_output: 10_000,
                        duration_seconds: None,
                    },
                    ts(1 + i, 9),
                )
                .unwrap();
        }
        reporting
            .tracker()
            .record_at(
                &InvocationOutcome {
                    agent_name: "backend-architect".to_string(),
                    success: true,
                    duration_seconds: 14.0,
                    cost_usd: 0.2,
                    tokens_input: 50_000,
                    tokens_output: 10_000,
                    model: "sonnet-4.5".to_string(),
                    user_corrections: None,
                    error_message: None,
                },
                ts(1, 10),
            )
            .unwrap();
        reporting
    }

    #[test]
    fn quick_report_has_cost_and_agents() {
        let reporting = seeded_reporting();
        let report = reporting.quick_at(ts(10, 0));

        assert_eq!(report.month, "2026-08");
        let cost = report.cost.unwrap();
        assert_eq!(cost.invocations, 4);
        assert!(cost.total_cost_usd > 0.0);
        let agents = report.agents.unwrap();
        assert_eq!(agents.len(), 1);
        assert_eq!(agents[0].agent_name, "backend-architect");
    }

    #[test]
    fn full_report_projects_savings_for_premium_heavy_month() {
        let reporting = seeded_reporting();
        let report = reporting.full_at(ts(10, 0));

        // Everything went premium, so the optimal mix saves a lot.
        let savings = report.savings.expect("usage exists");
        assert!(savings.current_premium_pct > 99.0);
        assert!(savings.monthly_savings_usd > 0.0);

        assert!(!report.recommendations.is_empty());
        assert_eq!(report.recommendations[0].priority, Priority::High);
    }

    #[test]
    fn empty_state_yields_empty_but_complete_quick_report() {
        let reporting = Reporting::new(Arc::new(MemoryStore::new()), &Config::default());
        let report = reporting.quick_at(ts(1, 0));
        assert_eq!(report.cost.unwrap().invocations, 0);
        assert!(report.agents.unwrap().is_empty());
    }

    #[test]
    fn no_usage_means_no_savings_projection() {
        let reporting = Reporting::new(Arc::new(MemoryStore::new()), &Config::default());
        assert!(reporting.savings_for("2026-08").is_none());
    }

    struct BrokenStore;

    impl crate::store::StateStore for BrokenStore {
        fn read(&self, doc: &str) -> Result<Option<String>, StorageError> {
            Err(StorageError::Io {
                doc: doc.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
            })
        }

        fn update(
            &self,
            doc: &str,
            _apply: &mut dyn FnMut(Option<&str>) -> Result<String, StorageError>,
        ) -> Result<(), StorageError> {
            Err(StorageError::Io {
                doc: doc.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
            })
        }
    }

    #[test]
    fn unreadable_store_degrades_sections_instead_of_failing() {
        let reporting = Reporting::new(Arc::new(BrokenStore), &Config::default());
        let report = reporting.full_at(ts(10, 0));
        assert!(report.cost.is_none());
        assert!(report.agents.is_none());
        assert!(report.categories.is_none());
        assert!(report.savings.is_none());
        assert!(report.recommendations.is_empty());
    }
}
