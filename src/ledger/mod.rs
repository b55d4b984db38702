//! Persistent cost ledger.
//!
//! Every recorded invocation lands in exactly one daily bucket and one
//! monthly bucket of a single JSON document; monthly totals are always
//! the sum of that month's daily totals. Budget evaluation runs inside
//! the same exclusive transaction as the mutation, so an alert is
//! appended at most once per kind per month even under concurrent
//! writers.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Priority;
use crate::category::derive_category;
use crate::config::{BudgetConfig, RateTable, TokenRates};
use crate::error::{Result, StorageError, ValidationError};
use crate::routing::{Tier, UsageDistribution};
use crate::store::{DocMetadata, StateStore};

/// Document name for the cost ledger.
pub const COST_DOC: &str = "cost_tracking";

const TOKENS_PER_MILLION: f64 = 1_000_000.0;

/// One invocation to record, as supplied by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostReport {
    pub agent_name: String,
    pub model: String,
    #[serde(default)]
    pub tokens_input: u64,
    #[serde(default)]
    pub tokens_output: u64,
    #[serde(default)]
    pub duration_seconds: Option<f64>,
}

impl CostReport {
    fn validate(&self) -> std::result::Result<(), ValidationError> {
        if self.agent_name.trim().is_empty() {
            return Err(ValidationError::MissingField("agent_name"));
        }
        if self.model.trim().is_empty() {
            return Err(ValidationError::MissingField("model"));
        }
        if let Some(d) = self.duration_seconds {
            if !d.is_finite() {
                return Err(ValidationError::NonFinite("duration_seconds"));
            }
            if d < 0.0 {
                return Err(ValidationError::InvalidValue {
                    field: "duration_seconds",
                    message: "must be non-negative".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// A single priced invocation as persisted in its daily bucket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostEntry {
    pub timestamp: DateTime<Utc>,
    pub agent_name: String,
    pub category: String,
    pub model: String,
    pub tier: String,
    pub tokens_input: u64,
    pub tokens_output: u64,
    pub cost_usd: f64,
    #[serde(default)]
    pub duration_seconds: Option<f64>,
}

/// Per-tier rollup inside a daily or monthly bucket.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TierUsage {
    pub invocations: u64,
    pub tokens_input: u64,
    pub tokens_output: u64,
    pub cost_usd: f64,
}

/// Per-agent rollup inside a daily or monthly bucket.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentUsage {
    pub invocations: u64,
    pub tokens_input: u64,
    pub tokens_output: u64,
    pub cost_usd: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DayBucket {
    #[serde(default)]
    pub total_cost_usd: f64,
    #[serde(default)]
    pub invocations: Vec<CostEntry>,
    #[serde(default)]
    pub by_tier: BTreeMap<String, TierUsage>,
    #[serde(default)]
    pub by_category: BTreeMap<String, f64>,
    #[serde(default)]
    pub by_agent: BTreeMap<String, AgentUsage>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonthBucket {
    #[serde(default)]
    pub total_cost_usd: f64,
    #[serde(default)]
    pub by_tier: BTreeMap<String, TierUsage>,
    #[serde(default)]
    pub by_category: BTreeMap<String, f64>,
    #[serde(default)]
    pub by_agent: BTreeMap<String, AgentUsage>,
    #[serde(default)]
    pub alerts: Vec<Alert>,
}

impl MonthBucket {
    pub fn invocations(&self) -> u64 {
        self.by_tier.values().map(|t| t.invocations).sum()
    }
}

/// Budget alert kinds. At most one alert of each kind is appended to a
/// given month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    /// Spend crossed the configured warning threshold.
    Warning,
    /// Spend reached or exceeded the monthly ceiling.
    Exceeded,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::Warning => "warning",
            AlertKind::Exceeded => "exceeded",
        }
    }

    pub fn severity(&self) -> &'static str {
        match self {
            AlertKind::Warning => "warning",
            AlertKind::Exceeded => "critical",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub timestamp: DateTime<Utc>,
    pub kind: AlertKind,
    pub severity: String,
    pub message: String,
}

/// Running whole-ledger aggregates, refreshed on every record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Statistics {
    pub total_invocations: u64,
    pub total_cost_usd: f64,
    pub avg_cost_per_invocation: f64,
    /// Share of all-time spend billed at the premium tier, percent.
    pub premium_pct: f64,
    pub economy_pct: f64,
}

/// Budget and rate snapshot embedded in the document, so a reader of the
/// raw file can interpret the numbers without the live configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerSettings {
    pub monthly_budget_usd: f64,
    pub alert_threshold_pct: f64,
    pub rates: RateTable,
}

/// Root of the persisted cost document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostDocument {
    pub metadata: DocMetadata,
    pub settings: LedgerSettings,
    #[serde(default)]
    pub daily: BTreeMap<String, DayBucket>,
    #[serde(default)]
    pub monthly: BTreeMap<String, MonthBucket>,
    #[serde(default)]
    pub statistics: Statistics,
}

impl CostDocument {
    fn new(now: DateTime<Utc>, settings: LedgerSettings) -> Self {
        Self {
            metadata: DocMetadata::new(now),
            settings,
            daily: BTreeMap::new(),
            monthly: BTreeMap::new(),
            statistics: Statistics::default(),
        }
    }
}

/// Outcome of recording one invocation.
#[derive(Debug, Clone)]
pub struct RecordedCost {
    pub cost_usd: f64,
    pub tier: Tier,
    /// Budget alert newly raised by this record, if any.
    pub alert: Option<Alert>,
}

/// Read-only view of one month, for rendering.
#[derive(Debug, Clone, Serialize)]
pub struct MonthSummary {
    pub month: String,
    pub total_cost_usd: f64,
    pub budget_usd: f64,
    pub spend_pct: f64,
    /// Negative once the ceiling is exceeded.
    pub budget_remaining_usd: f64,
    pub invocations: u64,
    pub by_tier: BTreeMap<String, TierUsage>,
    pub by_category: BTreeMap<String, f64>,
    pub by_agent: BTreeMap<String, AgentUsage>,
    pub alerts: Vec<Alert>,
}

/// A cost-optimization suggestion derived from a month's rollups.
#[derive(Debug, Clone, Serialize)]
pub struct Suggestion {
    pub priority: Priority,
    pub message: String,
}

/// Key for the daily bucket holding `ts`.
pub fn day_key(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d").to_string()
}

/// Key for the monthly bucket holding `ts`.
pub fn month_key(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m").to_string()
}

/// Cost ledger over a [`StateStore`].
pub struct CostLedger {
    store: Arc<dyn StateStore>,
    budget: BudgetConfig,
    rates: RateTable,
}

impl CostLedger {
    pub fn new(store: Arc<dyn StateStore>, budget: BudgetConfig, rates: RateTable) -> Self {
        Self { store, budget, rates }
    }

    fn settings(&self) -> LedgerSettings {
        LedgerSettings {
            monthly_budget_usd: self.budget.monthly_ceiling_usd,
            alert_threshold_pct: self.budget.alert_threshold_pct,
            rates: self.rates.clone(),
        }
    }

    fn rates_for(&self, tier: Tier) -> TokenRates {
        match tier {
            Tier::Premium => self.rates.premium,
            Tier::Economy | Tier::EconomyWithReview => self.rates.economy,
        }
    }

    /// Price an invocation without recording it.
    pub fn cost_for(&self, tier: Tier, tokens_input: u64, tokens_output: u64) -> f64 {
        let rates = self.rates_for(tier);
        (tokens_input as f64 / TOKENS_PER_MILLION) * rates.input
            + (tokens_output as f64 / TOKENS_PER_MILLION) * rates.output
    }

    /// Record one invocation at the current time.
    pub fn record(&self, report: &CostReport) -> Result<RecordedCost> {
        self.record_at(report, Utc::now())
    }

    /// Record one invocation with an explicit timestamp.
    pub fn record_at(&self, report: &CostReport, now: DateTime<Utc>) -> Result<RecordedCost> {
        report.validate()?;

        let tier = Tier::from_model(&report.model);
        let cost_usd = self.cost_for(tier, report.tokens_input, report.tokens_output);
        let category = derive_category(&report.agent_name);

        let mut outcome: Option<RecordedCost> = None;
        self.store.update(COST_DOC, &mut |current| {
            let mut doc = self.parse_or_init(current, now);

            let entry = CostEntry {
                timestamp: now,
                agent_name: report.agent_name.clone(),
                category: category.to_string(),
                model: report.model.clone(),
                tier: tier.as_str().to_string(),
                tokens_input: report.tokens_input,
                tokens_output: report.tokens_output,
                cost_usd,
                duration_seconds: report.duration_seconds,
            };

            let day = doc.daily.entry(day_key(now)).or_default();
            day.total_cost_usd += cost_usd;
            *day.by_category.entry(category.to_string()).or_insert(0.0) += cost_usd;
            let day_tier = day.by_tier.entry(tier.as_str().to_string()).or_default();
            day_tier.invocations += 1;
            day_tier.tokens_input += report.tokens_input;
            day_tier.tokens_output += report.tokens_output;
            day_tier.cost_usd += cost_usd;
            let day_agent = day.by_agent.entry(report.agent_name.clone()).or_default();
            day_agent.invocations += 1;
            day_agent.tokens_input += report.tokens_input;
            day_agent.tokens_output += report.tokens_output;
            day_agent.cost_usd += cost_usd;
            day.invocations.push(entry);

            let month = doc.monthly.entry(month_key(now)).or_default();
            month.total_cost_usd += cost_usd;
            *month.by_category.entry(category.to_string()).or_insert(0.0) += cost_usd;
            let month_tier = month.by_tier.entry(tier.as_str().to_string()).or_default();
            month_tier.invocations += 1;
            month_tier.tokens_input += report.tokens_input;
            month_tier.tokens_output += report.tokens_output;
            month_tier.cost_usd += cost_usd;
            let agent = month.by_agent.entry(report.agent_name.clone()).or_default();
            agent.invocations += 1;
            agent.tokens_input += report.tokens_input;
            agent.tokens_output += report.tokens_output;
            agent.cost_usd += cost_usd;

            let alert = evaluate_budget(month, &self.budget, now);

            refresh_statistics(&mut doc);
            doc.settings = self.settings();
            doc.metadata.last_updated = now;

            outcome = Some(RecordedCost { cost_usd, tier, alert });
            serialize_doc(&doc)
        })?;

        let recorded = outcome.expect("update closure applies exactly once");
        tracing::info!(
            agent = %report.agent_name,
            model = %report.model,
            tier = tier.as_str(),
            cost_usd = recorded.cost_usd,
            "recorded invocation cost"
        );
        if let Some(alert) = &recorded.alert {
            tracing::warn!(
                kind = alert.kind.as_str(),
                severity = %alert.severity,
                "{}",
                alert.message
            );
        }
        Ok(recorded)
    }

    /// Evaluate the budget for a month outside the record path.
    ///
    /// Appends and returns a new alert if a threshold has been crossed
    /// that no prior check caught; otherwise returns `None`.
    pub fn check_budget(&self, month: &str) -> Result<Option<Alert>> {
        let now = Utc::now();
        let mut raised: Option<Alert> = None;
        self.store.update(COST_DOC, &mut |current| {
            let mut doc = self.parse_or_init(current, now);
            if let Some(bucket) = doc.monthly.get_mut(month) {
                raised = evaluate_budget(bucket, &self.budget, now);
                if raised.is_some() {
                    doc.metadata.last_updated = now;
                }
            }
            serialize_doc(&doc)
        })?;
        if let Some(alert) = &raised {
            tracing::warn!(kind = alert.kind.as_str(), "{}", alert.message);
        }
        Ok(raised)
    }

    /// Last committed state of the whole document.
    pub fn snapshot(&self) -> Result<CostDocument> {
        let now = Utc::now();
        let raw = self.store.read(COST_DOC)?;
        Ok(self.parse_or_init(raw.as_deref(), now))
    }

    /// Summary of one month, or `None` if nothing was recorded in it.
    pub fn summary(&self, month: &str) -> Result<Option<MonthSummary>> {
        let doc = self.snapshot()?;
        Ok(doc
            .monthly
            .get(month)
            .map(|bucket| self.month_summary(month, bucket)))
    }

    /// Summary of one month, zeroed when nothing was recorded in it.
    pub fn summary_or_empty(&self, month: &str) -> Result<MonthSummary> {
        Ok(self
            .summary(month)?
            .unwrap_or_else(|| self.month_summary(month, &MonthBucket::default())))
    }

    fn month_summary(&self, month: &str, bucket: &MonthBucket) -> MonthSummary {
        let budget_usd = self.budget.monthly_ceiling_usd;
        let spend_pct = if budget_usd > 0.0 {
            bucket.total_cost_usd / budget_usd * 100.0
        } else {
            0.0
        };
        MonthSummary {
            month: month.to_string(),
            total_cost_usd: bucket.total_cost_usd,
            budget_usd,
            spend_pct,
            budget_remaining_usd: budget_usd - bucket.total_cost_usd,
            invocations: bucket.invocations(),
            by_tier: bucket.by_tier.clone(),
            by_category: bucket.by_category.clone(),
            by_agent: bucket.by_agent.clone(),
            alerts: bucket.alerts.clone(),
        }
    }

    /// Observed tier mix for a month, as input to a savings projection.
    pub fn distribution(&self, month: &str) -> Result<UsageDistribution> {
        let doc = self.snapshot()?;
        let Some(bucket) = doc.monthly.get(month) else {
            return Ok(UsageDistribution {
                premium_pct: 0.0,
                economy_pct: 0.0,
                monthly_cost_usd: 0.0,
            });
        };
        let total = bucket.invocations();
        let premium = bucket
            .by_tier
            .get(Tier::Premium.as_str())
            .map(|t| t.invocations)
            .unwrap_or(0);
        let premium_pct = if total > 0 {
            premium as f64 / total as f64 * 100.0
        } else {
            0.0
        };
        Ok(UsageDistribution {
            premium_pct,
            economy_pct: 100.0 - premium_pct,
            monthly_cost_usd: bucket.total_cost_usd,
        })
    }

    /// Cost-optimization suggestions for a month, sorted by priority.
    pub fn suggest_optimizations(&self, month: &str) -> Result<Vec<Suggestion>> {
        let doc = self.snapshot()?;
        let mut suggestions = Vec::new();
        let Some(bucket) = doc.monthly.get(month) else {
            return Ok(suggestions);
        };
        if bucket.total_cost_usd <= 0.0 {
            return Ok(suggestions);
        }

        let premium_cost = bucket
            .by_tier
            .get(Tier::Premium.as_str())
            .map(|t| t.cost_usd)
            .unwrap_or(0.0);
        let premium_share = premium_cost / bucket.total_cost_usd * 100.0;
        if premium_share > 40.0 {
            suggestions.push(Suggestion {
                priority: Priority::High,
                message: format!(
                    "{premium_share:.0}% of this month's spend is on the premium tier; \
                     enable complexity-based routing to shift routine work down"
                ),
            });
        }

        for (category, cost) in &bucket.by_category {
            let share = cost / bucket.total_cost_usd * 100.0;
            if share > 30.0 {
                suggestions.push(Suggestion {
                    priority: Priority::Medium,
                    message: format!(
                        "category '{category}' accounts for {share:.0}% of this month's spend \
                         (${cost:.2}); review whether its work needs the premium tier"
                    ),
                });
            }
        }

        suggestions.sort_by_key(|s| s.priority);
        Ok(suggestions)
    }

    fn parse_or_init(&self, current: Option<&str>, now: DateTime<Utc>) -> CostDocument {
        match current {
            None => CostDocument::new(now, self.settings()),
            Some(raw) => match serde_json::from_str(raw) {
                Ok(doc) => doc,
                Err(e) => {
                    tracing::warn!(
                        doc = COST_DOC,
                        error = %e,
                        "cost document unreadable, reinitializing"
                    );
                    CostDocument::new(now, self.settings())
                }
            },
        }
    }
}

fn serialize_doc(doc: &CostDocument) -> std::result::Result<String, StorageError> {
    serde_json::to_string_pretty(doc).map_err(|source| StorageError::Serialize {
        doc: COST_DOC.to_string(),
        source,
    })
}

fn evaluate_budget(
    bucket: &mut MonthBucket,
    budget: &BudgetConfig,
    now: DateTime<Utc>,
) -> Option<Alert> {
    if budget.monthly_ceiling_usd <= 0.0 {
        return None;
    }
    let spend_pct = bucket.total_cost_usd / budget.monthly_ceiling_usd * 100.0;
    if spend_pct < budget.alert_threshold_pct {
        return None;
    }
    let kind = if spend_pct >= 100.0 {
        AlertKind::Exceeded
    } else {
        AlertKind::Warning
    };
    if bucket.alerts.iter().any(|a| a.kind == kind) {
        return None;
    }
    let alert = Alert {
        timestamp: now,
        kind,
        severity: kind.severity().to_string(),
        message: format!(
            "monthly spend at {spend_pct:.1}% of budget (${:.2} of ${:.2})",
            bucket.total_cost_usd, budget.monthly_ceiling_usd
        ),
    };
    bucket.alerts.push(alert.clone());
    Some(alert)
}

fn refresh_statistics(doc: &mut CostDocument) {
    let mut invocations = 0u64;
    let mut total = 0.0f64;
    let mut premium = 0.0f64;
    for bucket in doc.monthly.values() {
        total += bucket.total_cost_usd;
        invocations += bucket.invocations();
        premium += bucket
            .by_tier
            .get(Tier::Premium.as_str())
            .map(|t| t.cost_usd)
            .unwrap_or(0.0);
    }
    doc.statistics.total_invocations = invocations;
    doc.statistics.total_cost_usd = total;
    doc.statistics.avg_cost_per_invocation = if invocations > 0 {
        total / invocations as f64
    } else {
        0.0
    };
    if total > 0.0 {
        doc.statistics.premium_pct = premium / total * 100.0;
        doc.statistics.economy_pct = 100.0 - doc.statistics.premium_pct;
    } else {
        doc.statistics.premium_pct = 0.0;
        doc.statistics.economy_pct = 0.0;
    }
}
