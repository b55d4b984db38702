//! Model selection from a complexity analysis.
//!
//! Priority order, first match wins: routing disabled, user override,
//! keyword rule overrides, complexity thresholds. Also projects the
//! savings a complexity-routed workload would yield over the current
//! tier distribution.

use serde::{Deserialize, Serialize};

use crate::config::RoutingConfig;
use crate::routing::scorer::ComplexityAnalysis;

/// Cost/quality tier of generative-model execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Tier {
    /// Cheap model, no review pass.
    Economy,
    /// Cheap model execution followed by a premium review pass.
    EconomyWithReview,
    /// Premium model only.
    Premium,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Economy => "economy",
            Tier::EconomyWithReview => "economy-with-review",
            Tier::Premium => "premium",
        }
    }

    /// Map a model identifier to the tier it is billed at.
    ///
    /// Unknown models are billed as premium, the conservative choice.
    pub fn from_model(model: &str) -> Tier {
        let lower = model.to_lowercase();
        if lower.contains("haiku") || lower.contains("economy") {
            if lower.contains("review") {
                Tier::EconomyWithReview
            } else {
                Tier::Economy
            }
        } else {
            Tier::Premium
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How a decision was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMethod {
    Disabled,
    UserOverride,
    RuleOverride,
    ComplexityBased,
}

impl SelectionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectionMethod::Disabled => "disabled",
            SelectionMethod::UserOverride => "user_override",
            SelectionMethod::RuleOverride => "rule_override",
            SelectionMethod::ComplexityBased => "complexity_based",
        }
    }
}

/// Result of selecting a model for a unit of work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDecision {
    /// Selected model identifier.
    pub model: String,
    pub tier: Tier,
    pub method: SelectionMethod,
    /// Complexity score the decision was based on.
    pub complexity_score: u32,
    /// Human-readable reason for this decision.
    pub reason: String,
    /// Rough per-invocation cost band, when the method provides one.
    pub cost_estimate: Option<String>,
    /// Two-phase workflow steps for the review tier.
    pub workflow: Option<Vec<String>>,
}

/// Current tier distribution for the savings projection.
#[derive(Debug, Clone, Copy)]
pub struct UsageDistribution {
    pub premium_pct: f64,
    pub economy_pct: f64,
    pub monthly_cost_usd: f64,
}

/// Projected cost under the documented optimal distribution
/// (70% economy, 20% split evenly, 10% premium).
///
/// This is an estimate from a linear cost-factor model, not a guarantee,
/// and must be labeled as such wherever it is shown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavingsProjection {
    pub current_premium_pct: f64,
    pub current_monthly_cost_usd: f64,
    pub optimal_premium_pct: f64,
    pub optimal_economy_pct: f64,
    pub projected_monthly_cost_usd: f64,
    pub monthly_savings_usd: f64,
    pub annual_savings_usd: f64,
    pub reduction_pct: f64,
    pub recommendation: String,
}

/// Selects the model tier for a unit of work.
pub struct ModelSelector {
    config: RoutingConfig,
}

impl ModelSelector {
    pub fn new(config: RoutingConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(RoutingConfig::default())
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Select a model for a scored unit of work.
    ///
    /// `name` and `description` are re-checked against the override
    /// keyword lists; `user_override` is honored verbatim and wins over
    /// everything except the disabled switch.
    pub fn select(
        &self,
        analysis: &ComplexityAnalysis,
        name: &str,
        description: &str,
        user_override: Option<&str>,
    ) -> ModelDecision {
        let score = analysis.total;

        if !self.config.enabled {
            return self.decided(ModelDecision {
                model: self.config.models.premium.clone(),
                tier: Tier::Premium,
                method: SelectionMethod::Disabled,
                complexity_score: score,
                reason: "Automatic model selection disabled".to_string(),
                cost_estimate: None,
                workflow: None,
            });
        }

        if let Some(model) = user_override {
            return self.decided(ModelDecision {
                model: model.to_string(),
                tier: Tier::from_model(model),
                method: SelectionMethod::UserOverride,
                complexity_score: score,
                reason: "User manually selected model".to_string(),
                cost_estimate: None,
                workflow: None,
            });
        }

        let full_text = format!("{name} {description}").to_lowercase();

        if let Some(keyword) = self
            .config
            .always_premium
            .iter()
            .find(|k| full_text.contains(&k.to_lowercase()))
        {
            return self.decided(ModelDecision {
                model: self.config.models.premium.clone(),
                tier: Tier::Premium,
                method: SelectionMethod::RuleOverride,
                complexity_score: score,
                reason: format!("Task matches always-premium rule for '{keyword}'"),
                cost_estimate: Some("High ($0.08-0.40)".to_string()),
                workflow: None,
            });
        }

        if let Some(keyword) = self
            .config
            .always_economy
            .iter()
            .find(|k| full_text.contains(&k.to_lowercase()))
        {
            return self.decided(ModelDecision {
                model: self.config.models.economy.clone(),
                tier: Tier::Economy,
                method: SelectionMethod::RuleOverride,
                complexity_score: score,
                reason: format!("Task matches always-economy rule for '{keyword}'"),
                cost_estimate: Some("Low ($0.005-0.02)".to_string()),
                workflow: None,
            });
        }

        if score <= self.config.economy_max {
            self.decided(ModelDecision {
                model: self.config.models.economy.clone(),
                tier: Tier::Economy,
                method: SelectionMethod::ComplexityBased,
                complexity_score: score,
                reason: format!("Low complexity ({score}/100), economy tier is sufficient"),
                cost_estimate: Some("Low ($0.005-0.02)".to_string()),
                workflow: None,
            })
        } else if score < self.config.premium_min {
            self.decided(ModelDecision {
                model: self.config.models.economy_review.clone(),
                tier: Tier::EconomyWithReview,
                method: SelectionMethod::ComplexityBased,
                complexity_score: score,
                reason: format!(
                    "Medium complexity ({score}/100), economy execution with premium review"
                ),
                cost_estimate: Some("Medium ($0.02-0.08)".to_string()),
                workflow: Some(vec![
                    "Economy model implements the solution".to_string(),
                    "Premium model reviews for correctness".to_string(),
                    "Integrate if approved, iterate if not".to_string(),
                ]),
            })
        } else {
            self.decided(ModelDecision {
                model: self.config.models.premium.clone(),
                tier: Tier::Premium,
                method: SelectionMethod::ComplexityBased,
                complexity_score: score,
                reason: format!("High complexity ({score}/100), premium tier recommended"),
                cost_estimate: Some("High ($0.08-0.40)".to_string()),
                workflow: None,
            })
        }
    }

    fn decided(&self, decision: ModelDecision) -> ModelDecision {
        tracing::debug!(
            model = %decision.model,
            tier = %decision.tier,
            method = decision.method.as_str(),
            score = decision.complexity_score,
            "model selected"
        );
        decision
    }

    /// Project savings under the optimal distribution: 70% economy, 10%
    /// premium, with the 20% middle band split evenly between the two.
    pub fn estimate_savings(&self, current: &UsageDistribution) -> SavingsProjection {
        let optimal_economy_pct = 70.0 + 20.0 * 0.5;
        let optimal_premium_pct = 10.0 + 20.0 * 0.5;

        let factor = self.config.premium_cost_factor;
        let current_cost_factor = current.premium_pct * factor + current.economy_pct;
        let optimal_cost_factor = optimal_premium_pct * factor + optimal_economy_pct;

        if current_cost_factor <= 0.0 {
            return SavingsProjection {
                current_premium_pct: current.premium_pct,
                current_monthly_cost_usd: current.monthly_cost_usd,
                optimal_premium_pct,
                optimal_economy_pct,
                projected_monthly_cost_usd: current.monthly_cost_usd,
                monthly_savings_usd: 0.0,
                annual_savings_usd: 0.0,
                reduction_pct: 0.0,
                recommendation: "No recorded usage to project from".to_string(),
            };
        }

        let reduction_pct =
            (current_cost_factor - optimal_cost_factor) / current_cost_factor * 100.0;
        let projected = current.monthly_cost_usd * (optimal_cost_factor / current_cost_factor);
        let monthly_savings = current.monthly_cost_usd - projected;

        SavingsProjection {
            current_premium_pct: current.premium_pct,
            current_monthly_cost_usd: current.monthly_cost_usd,
            optimal_premium_pct,
            optimal_economy_pct,
            projected_monthly_cost_usd: projected,
            monthly_savings_usd: monthly_savings,
            annual_savings_usd: monthly_savings * 12.0,
            reduction_pct,
            recommendation: format!(
                "Shift {:.0}% of workload from the premium to the economy tier",
                current.premium_pct - optimal_premium_pct
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::scorer::{TaskContext, score};

    fn analysis_with_score(total: u32) -> ComplexityAnalysis {
        // Build a synthetic analysis; only the total matters to selection.
        let mut analysis = score(&TaskContext::default());
        analysis.total = total;
        analysis
    }

    #[test]
    fn user_override_beats_rules_and_score() {
        let selector = ModelSelector::with_defaults();
        let decision = selector.select(
            &analysis_with_score(95),
            "payment security overhaul",
            "encryption everywhere",
            Some("haiku-4.5"),
        );
        assert_eq!(decision.model, "haiku-4.5");
        assert_eq!(decision.method, SelectionMethod::UserOverride);
        assert_eq!(decision.tier, Tier::Economy);
    }

    #[test]
    fn disabled_routing_returns_premium() {
        let config = RoutingConfig {
            enabled: false,
            ..RoutingConfig::default()
        };
        let selector = ModelSelector::new(config);
        let decision = selector.select(&analysis_with_score(0), "", "", None);
        assert_eq!(decision.tier, Tier::Premium);
        assert_eq!(decision.method, SelectionMethod::Disabled);
    }

    #[test]
    fn disabled_beats_user_override() {
        let config = RoutingConfig {
            enabled: false,
            ..RoutingConfig::default()
        };
        let selector = ModelSelector::new(config);
        let decision = selector.select(&analysis_with_score(0), "", "", Some("haiku-4.5"));
        assert_eq!(decision.method, SelectionMethod::Disabled);
    }

    #[test]
    fn premium_keyword_rule_override() {
        let selector = ModelSelector::with_defaults();
        let decision = selector.select(
            &analysis_with_score(5),
            "Implement payment encryption",
            "end-to-end encryption for payments",
            None,
        );
        assert_eq!(decision.tier, Tier::Premium);
        assert_eq!(decision.method, SelectionMethod::RuleOverride);
        assert!(decision.reason.contains("payment"), "{}", decision.reason);
    }

    #[test]
    fn economy_keyword_rule_override() {
        let selector = ModelSelector::with_defaults();
        let decision = selector.select(
            &analysis_with_score(90),
            "Write documentation",
            "expand the user guide",
            None,
        );
        assert_eq!(decision.tier, Tier::Economy);
        assert_eq!(decision.method, SelectionMethod::RuleOverride);
    }

    #[test]
    fn threshold_bands() {
        let selector = ModelSelector::with_defaults();
        let cases = [
            (0, Tier::Economy),
            (30, Tier::Economy),
            (31, Tier::EconomyWithReview),
            (59, Tier::EconomyWithReview),
            (60, Tier::Premium),
            (100, Tier::Premium),
        ];
        for (score, expected) in cases {
            let decision = selector.select(&analysis_with_score(score), "", "", None);
            assert_eq!(decision.tier, expected, "score={score}");
            assert_eq!(decision.method, SelectionMethod::ComplexityBased);
        }
    }

    #[test]
    fn review_tier_carries_workflow() {
        let selector = ModelSelector::with_defaults();
        let decision = selector.select(&analysis_with_score(45), "", "", None);
        assert_eq!(decision.tier, Tier::EconomyWithReview);
        assert_eq!(decision.workflow.as_ref().map(Vec::len), Some(3));
    }

    #[test]
    fn tier_from_model() {
        assert_eq!(Tier::from_model("haiku-4.5"), Tier::Economy);
        assert_eq!(Tier::from_model("haiku-with-sonnet-review"), Tier::EconomyWithReview);
        assert_eq!(Tier::from_model("sonnet-4.5"), Tier::Premium);
        assert_eq!(Tier::from_model("some-unknown-model"), Tier::Premium);
    }

    #[test]
    fn savings_projection_matches_linear_model() {
        let selector = ModelSelector::with_defaults();
        let projection = selector.estimate_savings(&UsageDistribution {
            premium_pct: 50.0,
            economy_pct: 50.0,
            monthly_cost_usd: 500.0,
        });
        // factors: current 50*4 + 50 = 250; optimal 20*4 + 80 = 160
        assert!((projection.reduction_pct - 36.0).abs() < 1e-9);
        assert!((projection.projected_monthly_cost_usd - 320.0).abs() < 1e-9);
        assert!((projection.monthly_savings_usd - 180.0).abs() < 1e-9);
        assert!((projection.annual_savings_usd - 2160.0).abs() < 1e-9);
        assert_eq!(projection.optimal_premium_pct, 20.0);
        assert_eq!(projection.optimal_economy_pct, 80.0);
    }

    #[test]
    fn savings_projection_with_no_usage_is_zero() {
        let selector = ModelSelector::with_defaults();
        let projection = selector.estimate_savings(&UsageDistribution {
            premium_pct: 0.0,
            economy_pct: 0.0,
            monthly_cost_usd: 0.0,
        });
        assert_eq!(projection.monthly_savings_usd, 0.0);
        assert_eq!(projection.reduction_pct, 0.0);
    }
}
