//! Per-agent performance tracking.
//!
//! Each agent gets a profile with lifetime counters, incremental
//! averages, and a bounded history of recent invocations. The history
//! ring (last 100 invocations) only feeds trend detection, which looks
//! at a 30-day window and compares the older and newer halves of it.
//! Category and window views are derived on read, never cached.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::Priority;
use crate::category::{derive_category, is_known_category};
use crate::error::{Result, StorageError, ValidationError};
use crate::store::{DocMetadata, StateStore};

/// Document name for agent metrics.
pub const METRICS_DOC: &str = "agent_metrics";

/// Most recent invocations kept per agent.
const HISTORY_CAP: usize = 100;
/// Distinct failure modes kept per agent.
const FAILURE_MODE_CAP: usize = 10;
/// Failure modes surfaced in an agent summary.
const FAILURE_MODE_TOP: usize = 3;
/// Leading characters of an error message used as its dedup key.
const FAILURE_REASON_KEY_LEN: usize = 100;
/// Days of history considered by trend detection.
const TREND_WINDOW_DAYS: i64 = 30;
/// Invocations inside the window required before a trend is computed.
const TREND_MIN_ENTRIES: usize = 10;
/// Success-rate shift, in percentage points, that counts as a trend.
const TREND_SHIFT_PP: f64 = 5.0;
/// Invocations required before an agent gets recommendations.
const RECOMMENDATION_MIN_INVOCATIONS: u64 = 5;

/// One finished invocation to record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvocationOutcome {
    pub agent_name: String,
    pub success: bool,
    pub duration_seconds: f64,
    #[serde(default)]
    pub cost_usd: f64,
    #[serde(default)]
    pub tokens_input: u64,
    #[serde(default)]
    pub tokens_output: u64,
    /// Model that executed the invocation; empty means unknown.
    #[serde(default)]
    pub model: String,
    /// Times the user corrected this invocation's output.
    #[serde(default)]
    pub user_corrections: Option<u32>,
    /// Why the invocation failed. Ignored when `success` is true.
    #[serde(default)]
    pub error_message: Option<String>,
}

impl InvocationOutcome {
    fn validate(&self) -> std::result::Result<(), ValidationError> {
        if self.agent_name.trim().is_empty() {
            return Err(ValidationError::MissingField("agent_name"));
        }
        if !self.duration_seconds.is_finite() {
            return Err(ValidationError::NonFinite("duration_seconds"));
        }
        if self.duration_seconds < 0.0 {
            return Err(ValidationError::InvalidValue {
                field: "duration_seconds",
                message: "must be non-negative".to_string(),
            });
        }
        if !self.cost_usd.is_finite() {
            return Err(ValidationError::NonFinite("cost_usd"));
        }
        if self.cost_usd < 0.0 {
            return Err(ValidationError::InvalidValue {
                field: "cost_usd",
                message: "must be non-negative".to_string(),
            });
        }
        Ok(())
    }
}

/// One history ring entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub success: bool,
    pub duration_seconds: f64,
    pub cost_usd: f64,
}

/// A recurring error message, deduplicated on its first 100 characters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureMode {
    pub message: String,
    pub count: u64,
    pub last_seen: DateTime<Utc>,
}

/// Lifetime profile of one agent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentProfile {
    pub total_invocations: u64,
    pub successes: u64,
    pub failures: u64,
    /// Successes over total, 0.0-1.0.
    pub success_rate: f64,
    pub total_duration_seconds: f64,
    pub avg_duration_seconds: f64,
    pub total_cost_usd: f64,
    pub avg_cost_usd: f64,
    pub total_tokens: u64,
    pub avg_tokens: f64,
    pub total_corrections: u64,
    /// Corrections over total invocations.
    pub correction_rate: f64,
    #[serde(default)]
    pub model_usage: BTreeMap<String, u64>,
    #[serde(default)]
    pub last_invocation: Option<DateTime<Utc>>,
    #[serde(default)]
    pub history: VecDeque<HistoryEntry>,
    #[serde(default)]
    pub failure_modes: Vec<FailureMode>,
}

impl AgentProfile {
    fn apply(&mut self, outcome: &InvocationOutcome, now: DateTime<Utc>) {
        self.total_invocations += 1;
        if outcome.success {
            self.successes += 1;
        } else {
            self.failures += 1;
        }
        self.success_rate = self.successes as f64 / self.total_invocations as f64;

        // Counter first, then the incremental mean divides by the
        // post-increment count, so the first invocation yields x/1.
        let n = self.total_invocations as f64;
        let tokens = outcome.tokens_input + outcome.tokens_output;
        self.total_duration_seconds += outcome.duration_seconds;
        self.avg_duration_seconds += (outcome.duration_seconds - self.avg_duration_seconds) / n;
        self.total_cost_usd += outcome.cost_usd;
        self.avg_cost_usd += (outcome.cost_usd - self.avg_cost_usd) / n;
        self.total_tokens += tokens;
        self.avg_tokens += (tokens as f64 - self.avg_tokens) / n;

        self.total_corrections += u64::from(outcome.user_corrections.unwrap_or(0));
        self.correction_rate = self.total_corrections as f64 / n;

        if !outcome.model.is_empty() {
            *self.model_usage.entry(outcome.model.clone()).or_insert(0) += 1;
        }

        self.last_invocation = Some(now);

        self.history.push_back(HistoryEntry {
            timestamp: now,
            success: outcome.success,
            duration_seconds: outcome.duration_seconds,
            cost_usd: outcome.cost_usd,
        });
        while self.history.len() > HISTORY_CAP {
            self.history.pop_front();
        }

        if !outcome.success {
            if let Some(message) = outcome.error_message.as_deref() {
                if !message.is_empty() {
                    self.note_failure(message, now);
                }
            }
        }
    }

    fn note_failure(&mut self, message: &str, now: DateTime<Utc>) {
        let key: String = message.chars().take(FAILURE_REASON_KEY_LEN).collect();
        if let Some(mode) = self.failure_modes.iter_mut().find(|m| m.message == key) {
            mode.count += 1;
            mode.last_seen = now;
        } else {
            self.failure_modes.push(FailureMode {
                message: key,
                count: 1,
                last_seen: now,
            });
        }
        // Keep the most frequent modes; stable sort preserves encounter
        // order among equal counts.
        self.failure_modes.sort_by(|a, b| b.count.cmp(&a.count));
        self.failure_modes.truncate(FAILURE_MODE_CAP);
    }

    /// Invocations that fall inside the 30-day window ending at `now`.
    pub fn window(&self, now: DateTime<Utc>) -> Vec<&HistoryEntry> {
        let cutoff = now - Duration::days(TREND_WINDOW_DAYS);
        self.history.iter().filter(|e| e.timestamp >= cutoff).collect()
    }

    /// Success-rate trend over the recent window. With fewer than ten
    /// window entries there is not enough signal, and the trend reads
    /// stable.
    pub fn trend(&self, now: DateTime<Utc>) -> Trend {
        let window = self.window(now);
        if window.len() < TREND_MIN_ENTRIES {
            return Trend::Stable;
        }
        let mid = window.len() / 2;
        let rate = |entries: &[&HistoryEntry]| {
            let ok = entries.iter().filter(|e| e.success).count();
            ok as f64 / entries.len() as f64 * 100.0
        };
        let shift = rate(&window[mid..]) - rate(&window[..mid]);
        if shift > TREND_SHIFT_PP {
            Trend::Improving
        } else if shift < -TREND_SHIFT_PP {
            Trend::Declining
        } else {
            Trend::Stable
        }
    }

    pub fn status(&self) -> Status {
        Status::from_rate(self.success_rate)
    }
}

/// Success-rate trend of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Improving,
    Stable,
    Declining,
}

impl Trend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trend::Improving => "improving",
            Trend::Stable => "stable",
            Trend::Declining => "declining",
        }
    }
}

/// Health band for an agent's lifetime success rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Excellent,
    Good,
    NeedsImprovement,
    ReviewNeeded,
}

impl Status {
    pub fn from_rate(rate: f64) -> Status {
        if rate >= 0.95 {
            Status::Excellent
        } else if rate >= 0.90 {
            Status::Good
        } else if rate >= 0.85 {
            Status::NeedsImprovement
        } else {
            Status::ReviewNeeded
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Excellent => "excellent",
            Status::Good => "good",
            Status::NeedsImprovement => "needs_improvement",
            Status::ReviewNeeded => "review_needed",
        }
    }
}

/// Root of the persisted metrics document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsDocument {
    pub metadata: DocMetadata,
    #[serde(default)]
    pub agents: BTreeMap<String, AgentProfile>,
}

impl MetricsDocument {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            metadata: DocMetadata::new(now),
            agents: BTreeMap::new(),
        }
    }
}

/// Success rate over the 30-day window.
#[derive(Debug, Clone, Default, Serialize)]
pub struct WindowStats {
    pub entries: usize,
    pub success_rate: f64,
}

/// Read-only view of one agent for rendering.
#[derive(Debug, Clone, Serialize)]
pub struct AgentSummary {
    pub agent_name: String,
    pub category: String,
    pub status: Status,
    pub trend: Trend,
    pub total_invocations: u64,
    pub success_rate: f64,
    pub avg_duration_seconds: f64,
    pub avg_cost_usd: f64,
    pub correction_rate: f64,
    pub window: WindowStats,
    pub model_usage: BTreeMap<String, u64>,
    pub top_failure_modes: Vec<FailureMode>,
}

/// One row of the all-agents table.
#[derive(Debug, Clone, Serialize)]
pub struct AgentRow {
    pub agent_name: String,
    pub category: String,
    pub invocations: u64,
    pub success_rate: f64,
    pub avg_duration_seconds: f64,
    pub status: Status,
    pub trend: Trend,
}

/// Aggregates across the agents of one category, recomputed on demand.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CategorySummary {
    pub agents: u64,
    pub invocations: u64,
    /// Invocation-weighted success rate across the category.
    pub success_rate: f64,
    pub avg_duration_seconds: f64,
    pub avg_cost_usd: f64,
}

/// A performance recommendation tied to one agent.
#[derive(Debug, Clone, Serialize)]
pub struct Recommendation {
    pub priority: Priority,
    pub agent_name: String,
    pub message: String,
}

/// Performance tracker over a [`StateStore`].
pub struct PerformanceTracker {
    store: Arc<dyn StateStore>,
}

impl PerformanceTracker {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }

    /// Record one invocation outcome at the current time. Returns the
    /// updated profile.
    pub fn record(&self, outcome: &InvocationOutcome) -> Result<AgentProfile> {
        self.record_at(outcome, Utc::now())
    }

    /// Record one invocation outcome with an explicit timestamp.
    pub fn record_at(
        &self,
        outcome: &InvocationOutcome,
        now: DateTime<Utc>,
    ) -> Result<AgentProfile> {
        outcome.validate()?;
        let mut updated: Option<AgentProfile> = None;
        self.store.update(METRICS_DOC, &mut |current| {
            let mut doc = parse_or_init(current, now);
            let profile = doc.agents.entry(outcome.agent_name.clone()).or_default();
            profile.apply(outcome, now);
            updated = Some(profile.clone());
            doc.metadata.last_updated = now;
            serialize_doc(&doc)
        })?;
        tracing::debug!(
            agent = %outcome.agent_name,
            success = outcome.success,
            duration_seconds = outcome.duration_seconds,
            "recorded invocation outcome"
        );
        Ok(updated.expect("update closure applies exactly once"))
    }

    /// Last committed state of the whole document.
    pub fn snapshot(&self) -> Result<MetricsDocument> {
        let raw = self.store.read(METRICS_DOC)?;
        Ok(parse_or_init(raw.as_deref(), Utc::now()))
    }

    /// Profile of one agent, or `None` if it has never been recorded.
    pub fn profile(&self, agent_name: &str) -> Result<Option<AgentProfile>> {
        Ok(self.snapshot()?.agents.remove(agent_name))
    }

    /// Full summary of one agent, or `None` if it has never been
    /// recorded.
    pub fn agent_summary(&self, agent_name: &str) -> Result<Option<AgentSummary>> {
        self.agent_summary_at(agent_name, Utc::now())
    }

    pub fn agent_summary_at(
        &self,
        agent_name: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<AgentSummary>> {
        let Some(profile) = self.profile(agent_name)? else {
            return Ok(None);
        };
        let window = profile.window(now);
        let window_stats = WindowStats {
            entries: window.len(),
            success_rate: if window.is_empty() {
                0.0
            } else {
                window.iter().filter(|e| e.success).count() as f64 / window.len() as f64
            },
        };
        Ok(Some(AgentSummary {
            agent_name: agent_name.to_string(),
            category: derive_category(agent_name).to_string(),
            status: profile.status(),
            trend: profile.trend(now),
            total_invocations: profile.total_invocations,
            success_rate: profile.success_rate,
            avg_duration_seconds: profile.avg_duration_seconds,
            avg_cost_usd: profile.avg_cost_usd,
            correction_rate: profile.correction_rate,
            window: window_stats,
            model_usage: profile.model_usage.clone(),
            top_failure_modes: profile
                .failure_modes
                .iter()
                .take(FAILURE_MODE_TOP)
                .cloned()
                .collect(),
        }))
    }

    /// One summary row per agent, ordered by name.
    pub fn summary(&self) -> Result<Vec<AgentRow>> {
        self.summary_at(Utc::now())
    }

    pub fn summary_at(&self, now: DateTime<Utc>) -> Result<Vec<AgentRow>> {
        let doc = self.snapshot()?;
        Ok(doc
            .agents
            .iter()
            .map(|(name, profile)| AgentRow {
                agent_name: name.clone(),
                category: derive_category(name).to_string(),
                invocations: profile.total_invocations,
                success_rate: profile.success_rate,
                avg_duration_seconds: profile.avg_duration_seconds,
                status: profile.status(),
                trend: profile.trend(now),
            })
            .collect())
    }

    /// Rollup for one category, or `None` for an unknown category key.
    pub fn category_summary(&self, category: &str) -> Result<Option<CategorySummary>> {
        if !is_known_category(category) {
            return Ok(None);
        }
        Ok(self.category_summaries()?.remove(category).or_else(|| {
            // Known key with no recorded agents yet.
            Some(CategorySummary::default())
        }))
    }

    /// Rollup across agents sharing a category, for every category seen.
    pub fn category_summaries(&self) -> Result<BTreeMap<String, CategorySummary>> {
        let doc = self.snapshot()?;
        let mut sums: BTreeMap<String, (u64, u64, u64, f64, f64)> = BTreeMap::new();
        for (name, profile) in &doc.agents {
            let entry = sums
                .entry(derive_category(name).to_string())
                .or_insert((0, 0, 0, 0.0, 0.0));
            entry.0 += 1;
            entry.1 += profile.total_invocations;
            entry.2 += profile.successes;
            entry.3 += profile.total_duration_seconds;
            entry.4 += profile.total_cost_usd;
        }
        Ok(sums
            .into_iter()
            .map(|(category, (agents, invocations, successes, duration, cost))| {
                let n = invocations.max(1) as f64;
                (
                    category,
                    CategorySummary {
                        agents,
                        invocations,
                        success_rate: successes as f64 / n,
                        avg_duration_seconds: duration / n,
                        avg_cost_usd: cost / n,
                    },
                )
            })
            .collect())
    }

    /// Recommendations for agents that look unhealthy, sorted by
    /// priority. Agents with fewer than five invocations are skipped.
    pub fn recommendations(&self) -> Result<Vec<Recommendation>> {
        self.recommendations_at(Utc::now())
    }

    pub fn recommendations_at(&self, now: DateTime<Utc>) -> Result<Vec<Recommendation>> {
        let doc = self.snapshot()?;
        let mut recs = Vec::new();
        for (name, profile) in &doc.agents {
            if profile.total_invocations < RECOMMENDATION_MIN_INVOCATIONS {
                continue;
            }
            if profile.success_rate < 0.85 {
                recs.push(Recommendation {
                    priority: Priority::High,
                    agent_name: name.clone(),
                    message: format!(
                        "success rate {:.0}% over {} invocations; investigate before \
                         routing more work here",
                        profile.success_rate * 100.0,
                        profile.total_invocations
                    ),
                });
            }
            if profile.correction_rate > 0.30 {
                recs.push(Recommendation {
                    priority: Priority::Medium,
                    agent_name: name.clone(),
                    message: format!(
                        "output corrected {:.0}% of the time; tighten its instructions \
                         or route its work to a stronger tier",
                        profile.correction_rate * 100.0
                    ),
                });
            }
            if profile.trend(now) == Trend::Declining {
                recs.push(Recommendation {
                    priority: Priority::Medium,
                    agent_name: name.clone(),
                    message: "success rate is declining over the last 30 days".to_string(),
                });
            }
            if profile.avg_duration_seconds > 60.0 {
                recs.push(Recommendation {
                    priority: Priority::Low,
                    agent_name: name.clone(),
                    message: format!(
                        "averages {:.0}s per invocation; consider splitting its tasks",
                        profile.avg_duration_seconds
                    ),
                });
            }
        }
        recs.sort_by_key(|r| r.priority);
        Ok(recs)
    }
}

fn parse_or_init(current: Option<&str>, now: DateTime<Utc>) -> MetricsDocument {
    match current {
        None => MetricsDocument::new(now),
        Some(raw) => match serde_json::from_str(raw) {
            Ok(doc) => doc,
            Err(e) => {
                tracing::warn!(
                    doc = METRICS_DOC,
                    error = %e,
                    "metrics document unreadable, reinitializing"
                );
                MetricsDocument::new(now)
            }
        },
    }
}

fn serialize_doc(doc: &MetricsDocument) -> std::result::Result<String, StorageError> {
    serde_json::to_string_pretty(doc).map_err(|source| StorageError::Serialize {
        doc: METRICS_DOC.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn tracker() -> (Arc<MemoryStore>, PerformanceTracker) {
        let store = Arc::new(MemoryStore::new());
        let tracker = PerformanceTracker::new(store.clone());
        (store, tracker)
    }

    fn ts(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, day, hour, minute, 0).unwrap()
    }

    fn outcome(agent: &str, success: bool, duration: f64) -> InvocationOutcome {
        InvocationOutcome {
            agent_name: agent.to_string(),
            success,
            duration_seconds: duration,
            cost_usd: 0.05,
            tokens_input: 1_000,
            tokens_output: 200,
            model: "haiku-4.5".to_string(),
            user_corrections: None,
            error_message: if success {
                None
            } else {
                Some("tool call timed out".to_string())
            },
        }
    }

    #[test]
    fn first_invocation_sets_all_averages() {
        let (_, tracker) = tracker();
        let mut o = outcome("backend-architect", true, 45.2);
        o.cost_usd = 0.085;
        tracker.record_at(&o, ts(1, 9, 0)).unwrap();

        let profile = tracker.profile("backend-architect").unwrap().unwrap();
        assert_eq!(profile.total_invocations, 1);
        assert_eq!(profile.success_rate, 1.0);
        assert_eq!(profile.avg_duration_seconds, 45.2);
        assert_eq!(profile.avg_cost_usd, 0.085);
        assert_eq!(profile.avg_tokens, 1_200.0);
        assert_eq!(profile.status(), Status::Excellent);
    }

    #[test]
    fn averages_are_incremental_means() {
        let (_, tracker) = tracker();
        for (i, duration) in [10.0, 20.0, 30.0].iter().enumerate() {
            tracker
                .record_at(&outcome("debugger", true, *duration), ts(1, 10, i as u32))
                .unwrap();
        }
        let profile = tracker.profile("debugger").unwrap().unwrap();
        assert!((profile.avg_duration_seconds - 20.0).abs() < 1e-9);
        assert!((profile.total_duration_seconds - 60.0).abs() < 1e-9);
        assert!((profile.avg_cost_usd - 0.05).abs() < 1e-9);
    }

    #[test]
    fn history_ring_keeps_last_hundred() {
        let (_, tracker) = tracker();
        for i in 0..150u32 {
            tracker
                .record_at(
                    &outcome("code-reviewer", true, 1.0),
                    ts(1 + i / 24, i % 24, 0),
                )
                .unwrap();
        }
        let profile = tracker.profile("code-reviewer").unwrap().unwrap();
        assert_eq!(profile.total_invocations, 150);
        assert_eq!(profile.history.len(), 100);
        // Oldest 50 dropped: the ring now starts at invocation 51.
        assert_eq!(
            profile.history.front().unwrap().timestamp,
            ts(1 + 50 / 24, 50 % 24, 0)
        );
    }

    #[test]
    fn trend_is_stable_under_ten_window_entries() {
        let (_, tracker) = tracker();
        // Nine entries, all failures: still not enough signal.
        for i in 0..9u32 {
            tracker
                .record_at(&outcome("debugger", false, 1.0), ts(10, i, 0))
                .unwrap();
        }
        let profile = tracker.profile("debugger").unwrap().unwrap();
        assert_eq!(profile.trend(ts(11, 0, 0)), Trend::Stable);
    }

    #[test]
    fn trend_detects_improvement() {
        let (_, tracker) = tracker();
        // Older half 4/5 successes, newer half 5/5: +20pp shift.
        let results = [true, false, true, true, true, true, true, true, true, true];
        for (i, ok) in results.iter().enumerate() {
            tracker
                .record_at(&outcome("debugger", *ok, 1.0), ts(5, i as u32, 0))
                .unwrap();
        }
        let profile = tracker.profile("debugger").unwrap().unwrap();
        assert_eq!(profile.trend(ts(6, 0, 0)), Trend::Improving);
    }

    #[test]
    fn trend_detects_decline_and_stability() {
        let (_, tracker) = tracker();
        let declining = [true, true, true, true, true, false, false, true, false, false];
        for (i, ok) in declining.iter().enumerate() {
            tracker
                .record_at(&outcome("error-detective", *ok, 1.0), ts(5, i as u32, 0))
                .unwrap();
        }
        let profile = tracker.profile("error-detective").unwrap().unwrap();
        assert_eq!(profile.trend(ts(6, 0, 0)), Trend::Declining);

        for i in 0..10u32 {
            tracker
                .record_at(&outcome("docs-architect", true, 1.0), ts(5, i, 0))
                .unwrap();
        }
        let profile = tracker.profile("docs-architect").unwrap().unwrap();
        assert_eq!(profile.trend(ts(6, 0, 0)), Trend::Stable);
    }

    #[test]
    fn trend_ignores_entries_outside_window() {
        let (_, tracker) = tracker();
        for i in 0..10u32 {
            tracker
                .record_at(&outcome("debugger", false, 1.0), ts(1, i, 0))
                .unwrap();
        }
        let profile = tracker.profile("debugger").unwrap().unwrap();
        let far_future = Utc.with_ymd_and_hms(2026, 12, 1, 0, 0, 0).unwrap();
        assert_eq!(profile.window(far_future).len(), 0);
        assert_eq!(profile.trend(far_future), Trend::Stable);
    }

    #[test]
    fn failure_messages_dedup_on_first_hundred_chars() {
        let (_, tracker) = tracker();
        let prefix = "x".repeat(100);
        for suffix in ["-first", "-second"] {
            let mut o = outcome("debugger", false, 1.0);
            o.error_message = Some(format!("{prefix}{suffix}"));
            tracker.record_at(&o, ts(2, 0, 0)).unwrap();
        }
        let profile = tracker.profile("debugger").unwrap().unwrap();
        assert_eq!(profile.failure_modes.len(), 1);
        assert_eq!(profile.failure_modes[0].count, 2);
        assert_eq!(profile.failure_modes[0].message.chars().count(), 100);
    }

    #[test]
    fn failure_modes_keep_ten_most_frequent() {
        let (_, tracker) = tracker();
        // One dominant message plus twelve distinct one-off messages.
        for _ in 0..4 {
            let mut o = outcome("debugger", false, 1.0);
            o.error_message = Some("dominant failure".to_string());
            tracker.record_at(&o, ts(3, 0, 0)).unwrap();
        }
        for i in 0..12 {
            let mut o = outcome("debugger", false, 1.0);
            o.error_message = Some(format!("one-off failure {i}"));
            tracker.record_at(&o, ts(3, 1, i)).unwrap();
        }
        let profile = tracker.profile("debugger").unwrap().unwrap();
        assert_eq!(profile.failure_modes.len(), FAILURE_MODE_CAP);
        assert_eq!(profile.failure_modes[0].message, "dominant failure");
        assert_eq!(profile.failure_modes[0].count, 4);
    }

    #[test]
    fn agent_summary_includes_window_models_and_top_failures() {
        let (_, tracker) = tracker();
        for i in 0..4u32 {
            let mut o = outcome("debugger", i > 0, 2.0);
            if i == 0 {
                o.error_message = Some("flaky sandbox".to_string());
            }
            tracker.record_at(&o, ts(2, i, 0)).unwrap();
        }
        let summary = tracker
            .agent_summary_at("debugger", ts(3, 0, 0))
            .unwrap()
            .unwrap();
        assert_eq!(summary.total_invocations, 4);
        assert_eq!(summary.window.entries, 4);
        assert_eq!(summary.window.success_rate, 0.75);
        assert_eq!(summary.model_usage["haiku-4.5"], 4);
        assert_eq!(summary.top_failure_modes.len(), 1);
        assert_eq!(summary.category, "quality-testing");

        assert!(tracker.agent_summary_at("nobody", ts(3, 0, 0)).unwrap().is_none());
    }

    #[test]
    fn summary_and_category_rollup() {
        let (_, tracker) = tracker();
        tracker
            .record_at(&outcome("backend-architect", true, 10.0), ts(1, 0, 0))
            .unwrap();
        tracker
            .record_at(&outcome("code-reviewer", true, 5.0), ts(1, 1, 0))
            .unwrap();
        tracker
            .record_at(&outcome("code-reviewer", false, 5.0), ts(1, 2, 0))
            .unwrap();

        let rows = tracker.summary_at(ts(2, 0, 0)).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].agent_name, "backend-architect");
        assert_eq!(rows[0].category, "backend-development");
        assert_eq!(rows[1].success_rate, 0.5);
        assert_eq!(rows[1].status, Status::ReviewNeeded);

        let qa = tracker.category_summary("quality-testing").unwrap().unwrap();
        assert_eq!(qa.agents, 1);
        assert_eq!(qa.invocations, 2);
        assert_eq!(qa.success_rate, 0.5);
        assert!((qa.avg_duration_seconds - 5.0).abs() < 1e-9);

        // Known but empty category yields a zeroed summary; unknown
        // keys yield nothing.
        let infra = tracker.category_summary("infrastructure").unwrap().unwrap();
        assert_eq!(infra.agents, 0);
        assert!(tracker.category_summary("marketing").unwrap().is_none());
    }

    #[test]
    fn low_success_rate_yields_high_priority_recommendation() {
        let (_, tracker) = tracker();
        for i in 0..6u32 {
            tracker
                .record_at(&outcome("debugger", i % 2 == 0, 1.0), ts(4, i, 0))
                .unwrap();
        }
        let recs = tracker.recommendations_at(ts(5, 0, 0)).unwrap();
        assert!(!recs.is_empty());
        assert_eq!(recs[0].priority, Priority::High);
        assert_eq!(recs[0].agent_name, "debugger");
        assert!(recs[0].message.contains("success rate"));
    }

    #[test]
    fn heavy_corrections_and_slow_agents_are_flagged() {
        let (_, tracker) = tracker();
        for i in 0..6u32 {
            let mut o = outcome("backend-architect", true, 90.0);
            o.user_corrections = Some(1);
            tracker.record_at(&o, ts(4, i, 0)).unwrap();
        }
        let recs = tracker.recommendations_at(ts(5, 0, 0)).unwrap();
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].priority, Priority::Medium);
        assert!(recs[0].message.contains("corrected"));
        assert_eq!(recs[1].priority, Priority::Low);
        assert!(recs[1].message.contains("per invocation"));
    }

    #[test]
    fn young_agents_get_no_recommendations() {
        let (_, tracker) = tracker();
        for i in 0..4u32 {
            tracker
                .record_at(&outcome("debugger", false, 90.0), ts(4, i, 0))
                .unwrap();
        }
        assert!(tracker.recommendations_at(ts(5, 0, 0)).unwrap().is_empty());
    }

    #[test]
    fn corrupt_document_is_reinitialized() {
        let (store, tracker) = tracker();
        store
            .update(METRICS_DOC, &mut |_| Ok("][broken".to_string()))
            .unwrap();
        tracker
            .record_at(&outcome("debugger", true, 1.0), ts(1, 0, 0))
            .unwrap();
        assert_eq!(tracker.snapshot().unwrap().agents.len(), 1);
    }

    #[test]
    fn rejects_negative_cost() {
        let (_, tracker) = tracker();
        let mut o = outcome("debugger", true, 1.0);
        o.cost_usd = -0.5;
        assert!(tracker.record_at(&o, ts(1, 0, 0)).is_err());
    }

    #[test]
    fn status_bands() {
        assert_eq!(Status::from_rate(0.96), Status::Excellent);
        assert_eq!(Status::from_rate(0.95), Status::Excellent);
        assert_eq!(Status::from_rate(0.92), Status::Good);
        assert_eq!(Status::from_rate(0.85), Status::NeedsImprovement);
        assert_eq!(Status::from_rate(0.80), Status::ReviewNeeded);
    }
}
