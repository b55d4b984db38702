//! Complexity scoring and cost-aware model selection.
//!
//! [`scorer`] maps a unit of work to a 0-100 composite score;
//! [`selector`] turns that score (plus override configuration) into a
//! tier decision. The selector depends only on the scorer's output
//! shape, not on the scorer itself.

pub mod scorer;
pub mod selector;

pub use scorer::{ComplexityAnalysis, DomainCategory, ScoreBreakdown, TaskContext, score};
pub use selector::{
    ModelDecision, ModelSelector, SavingsProjection, SelectionMethod, Tier, UsageDistribution,
};
