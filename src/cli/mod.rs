//! Command-line interface.
//!
//! Read commands (`quick`, `report`, `cost`, `performance`,
//! `recommendations`) render from the reporting facade and always exit
//! zero: a broken state file degrades to an empty section, it never
//! takes the dashboard down. Write commands (`record-cost`,
//! `record-outcome`) propagate their errors.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use clap::{Args, Parser, Subcommand};

use crate::config::Config;
use crate::ledger::{self, CostReport, MonthSummary};
use crate::performance::{AgentRow, AgentSummary, InvocationOutcome, Status};
use crate::report::{FullReport, QuickReport, Reporting};
use crate::routing::{ComplexityAnalysis, ModelDecision, TaskContext, score};
use crate::store::{FileStore, StateStore};

const BAR_WIDTH: usize = 30;

#[derive(Parser, Debug)]
#[command(
    name = "agentmeter",
    version,
    about = "Cost-aware model routing and telemetry for agent fleets"
)]
pub struct Cli {
    /// Configuration file (defaults to ~/.agentmeter/config.toml).
    #[arg(long, global = true, env = "AGENTMETER_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compact status: this month's spend and the agent table.
    Quick,
    /// Full dashboard: costs, agents, categories, savings, recommendations.
    Report,
    /// Cost summary for one month.
    Cost {
        /// Month to summarize as YYYY-MM (defaults to the current month).
        #[arg(long)]
        month: Option<String>,
    },
    /// Per-agent performance table, or one agent's full profile.
    Performance {
        #[arg(long)]
        agent: Option<String>,
    },
    /// Merged cost and performance recommendations.
    Recommendations,
    /// Score a unit of work for complexity.
    Score(TaskArgs),
    /// Score a unit of work and select a model tier for it.
    Select {
        #[command(flatten)]
        task: TaskArgs,
        /// Force this model regardless of the score.
        #[arg(long)]
        model: Option<String>,
    },
    /// Record the cost of one model invocation.
    RecordCost {
        #[arg(long)]
        agent: String,
        #[arg(long)]
        model: String,
        #[arg(long, default_value_t = 0)]
        tokens_input: u64,
        #[arg(long, default_value_t = 0)]
        tokens_output: u64,
        #[arg(long)]
        duration: Option<f64>,
    },
    /// Record the outcome of one agent invocation.
    RecordOutcome {
        #[arg(long)]
        agent: String,
        /// Mark the invocation as failed.
        #[arg(long)]
        failed: bool,
        #[arg(long, default_value_t = 0.0)]
        duration: f64,
        #[arg(long, default_value_t = 0.0)]
        cost: f64,
        #[arg(long, default_value_t = 0)]
        tokens_input: u64,
        #[arg(long, default_value_t = 0)]
        tokens_output: u64,
        #[arg(long, default_value = "")]
        model: String,
        /// Times the user corrected the output.
        #[arg(long)]
        corrections: Option<u32>,
        /// Error message, recorded as a failure mode.
        #[arg(long)]
        error: Option<String>,
    },
}

/// Task description flags shared by `score` and `select`.
#[derive(Args, Debug)]
pub struct TaskArgs {
    #[arg(long, default_value = "")]
    pub name: String,
    #[arg(long, default_value = "")]
    pub description: String,
    /// Changed file path; repeat for multiple files.
    #[arg(long = "file")]
    pub files: Vec<String>,
    #[arg(long, default_value_t = 0)]
    pub lines_changed: u32,
    #[arg(long, default_value_t = 0)]
    pub functions_added: u32,
    #[arg(long)]
    pub affects_production: bool,
    #[arg(long)]
    pub breaking_change: bool,
    /// The change ships without tests.
    #[arg(long)]
    pub no_tests: bool,
}

impl TaskArgs {
    fn into_task(self) -> TaskContext {
        TaskContext {
            files_changed: self.files,
            git_diff: None,
            lines_changed: self.lines_changed,
            functions_added: self.functions_added,
            name: self.name,
            description: self.description,
            affects_production: self.affects_production,
            breaking_change: self.breaking_change,
            has_tests: !self.no_tests,
        }
    }
}

/// Execute a parsed invocation.
pub fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load(cli.config.as_deref());
    let is_write = matches!(
        cli.command,
        Command::RecordCost { .. } | Command::RecordOutcome { .. }
    );
    // Read commands must exit zero even when the state directory is
    // unusable; they fall back to an empty in-memory view.
    let store: Arc<dyn StateStore> = match FileStore::new(config.state_dir.clone()) {
        Ok(store) => Arc::new(store),
        Err(e) if !is_write => {
            tracing::warn!(error = %e, "state directory unavailable, reporting from empty state");
            Arc::new(crate::store::MemoryStore::new())
        }
        Err(e) => return Err(e.into()),
    };
    let reporting = Reporting::new(store, &config);
    execute(cli.command, &reporting)
}

fn execute(command: Command, reporting: &Reporting) -> anyhow::Result<()> {
    match command {
        Command::Quick => render_quick(&reporting.quick()),
        Command::Report => render_full(&reporting.full()),
        Command::Cost { month } => {
            let month = month.unwrap_or_else(|| ledger::month_key(Utc::now()));
            match reporting.ledger().summary_or_empty(&month) {
                Ok(summary) => render_cost(&summary),
                Err(e) => {
                    tracing::warn!(error = %e, "cost summary unavailable");
                    println!("Costs for {month}: unavailable");
                }
            }
            match reporting.ledger().suggest_optimizations(&month) {
                Ok(suggestions) if !suggestions.is_empty() => {
                    println!("\nSuggestions");
                    println!("-----------");
                    for s in suggestions {
                        println!("  [{}] {}", s.priority, s.message);
                    }
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "suggestions unavailable"),
            }
        }
        Command::Performance { agent } => match agent {
            Some(name) => match reporting.tracker().agent_summary(&name) {
                Ok(Some(summary)) => render_agent_summary(&summary),
                Ok(None) => println!("No invocations recorded for '{name}'"),
                Err(e) => {
                    tracing::warn!(error = %e, "agent summary unavailable");
                    println!("Performance data unavailable");
                }
            },
            None => match reporting.tracker().summary() {
                Ok(rows) => render_agent_table(&rows),
                Err(e) => {
                    tracing::warn!(error = %e, "agent table unavailable");
                    println!("Performance data unavailable");
                }
            },
        },
        Command::Recommendations => {
            let report = reporting.full();
            if report.recommendations.is_empty() {
                println!("No recommendations; everything looks healthy");
            } else {
                for item in &report.recommendations {
                    println!("  [{}] {}", item.priority, item.message);
                }
            }
        }
        Command::Score(task) => {
            let analysis = score(&task.into_task());
            render_analysis(&analysis);
        }
        Command::Select { task, model } => {
            let task = task.into_task();
            let analysis = score(&task);
            let decision =
                reporting
                    .selector()
                    .select(&analysis, &task.name, &task.description, model.as_deref());
            render_decision(&analysis, &decision);
        }
        Command::RecordCost {
            agent,
            model,
            tokens_input,
            tokens_output,
            duration,
        } => {
            let recorded = reporting.ledger().record(&CostReport {
                agent_name: agent,
                model,
                tokens_input,
                tokens_output,
                duration_seconds: duration,
            })?;
            println!(
                "Recorded {} ({} tier)",
                fmt_usd(recorded.cost_usd),
                recorded.tier
            );
            if let Some(alert) = recorded.alert {
                println!("BUDGET ALERT [{}]: {}", alert.severity, alert.message);
            }
        }
        Command::RecordOutcome {
            agent,
            failed,
            duration,
            cost,
            tokens_input,
            tokens_output,
            model,
            corrections,
            error,
        } => {
            reporting.tracker().record(&InvocationOutcome {
                agent_name: agent.clone(),
                success: !failed,
                duration_seconds: duration,
                cost_usd: cost,
                tokens_input,
                tokens_output,
                model,
                user_corrections: corrections,
                error_message: error,
            })?;
            println!(
                "Recorded {} invocation for '{agent}'",
                if failed { "failed" } else { "successful" }
            );
        }
    }
    Ok(())
}

fn render_quick(report: &QuickReport) {
    println!("agentmeter — {}", report.month);
    println!("=====================\n");
    match &report.cost {
        Some(cost) => {
            println!(
                "  Spend:   {} of {} ({:.1}%)",
                fmt_usd(cost.total_cost_usd),
                fmt_usd(cost.budget_usd),
                cost.spend_pct
            );
            println!("  Budget:  {}", draw_bar(cost.spend_pct));
            println!("  Calls:   {}", cost.invocations);
        }
        None => println!("  Costs unavailable"),
    }
    println!();
    match &report.agents {
        Some(agents) if !agents.is_empty() => render_agent_table(agents),
        Some(_) => println!("  No agent activity recorded"),
        None => println!("  Agent metrics unavailable"),
    }
}

fn render_full(report: &FullReport) {
    render_quick(&QuickReport {
        month: report.month.clone(),
        cost: report.cost.clone(),
        agents: report.agents.clone(),
    });

    if let Some(cost) = &report.cost {
        if !cost.by_category.is_empty() {
            println!("\nSpend by category");
            println!("-----------------");
            let total = cost.total_cost_usd.max(f64::EPSILON);
            for (category, spent) in &cost.by_category {
                println!(
                    "  {category:<28} {:>9}  {}",
                    fmt_usd(*spent),
                    draw_bar(spent / total * 100.0)
                );
            }
        }
        for alert in &cost.alerts {
            println!("\nBUDGET ALERT [{}]: {}", alert.severity, alert.message);
        }
    }

    if let Some(savings) = &report.savings {
        println!("\nSavings projection");
        println!("------------------");
        for line in savings_lines(savings) {
            println!("{line}");
        }
    }

    if !report.recommendations.is_empty() {
        println!("\nRecommendations");
        println!("---------------");
        for item in &report.recommendations {
            println!("  [{}] {}", item.priority, item.message);
        }
    }
}

fn render_cost(summary: &MonthSummary) {
    println!("Costs for {}", summary.month);
    println!("==================\n");
    println!(
        "  Total:  {} of {} budget ({:.1}%)",
        fmt_usd(summary.total_cost_usd),
        fmt_usd(summary.budget_usd),
        summary.spend_pct
    );
    println!("  Budget: {}", draw_bar(summary.spend_pct));
    println!("  Left:   {}", fmt_usd(summary.budget_remaining_usd));
    println!("  Calls:  {}", summary.invocations);

    if !summary.by_tier.is_empty() {
        println!("\n  By tier:");
        for (tier, usage) in &summary.by_tier {
            println!(
                "    {tier:<22} {:>9}  ({} calls, {} in / {} out tokens)",
                fmt_usd(usage.cost_usd),
                usage.invocations,
                usage.tokens_input,
                usage.tokens_output
            );
        }
    }
    if !summary.by_agent.is_empty() {
        println!("\n  By agent:");
        for (agent, usage) in &summary.by_agent {
            println!(
                "    {agent:<28} {:>9}  ({} calls)",
                fmt_usd(usage.cost_usd),
                usage.invocations
            );
        }
    }
    for alert in &summary.alerts {
        println!("\n  BUDGET ALERT [{}]: {}", alert.severity, alert.message);
    }
}

fn render_agent_table(agents: &[AgentRow]) {
    if agents.is_empty() {
        println!("  No agent activity recorded");
        return;
    }
    println!("Agents");
    println!("------");
    println!(
        "  {:<28} {:>6} {:>9} {:>9}  {:<16} {}",
        "agent", "calls", "success", "avg time", "status", "trend"
    );
    for row in agents {
        println!(
            "  {:<28} {:>6} {:>8.0}% {:>8.1}s  {:<16} {}",
            row.agent_name,
            row.invocations,
            row.success_rate * 100.0,
            row.avg_duration_seconds,
            status_tag(row.status),
            row.trend.as_str()
        );
    }
}

fn render_agent_summary(summary: &AgentSummary) {
    println!("Agent '{}'", summary.agent_name);
    println!("==============\n");
    println!("  Category:    {}", summary.category);
    println!("  Invocations: {}", summary.total_invocations);
    println!(
        "  Success:     {:.1}% ({})",
        summary.success_rate * 100.0,
        status_tag(summary.status)
    );
    println!("  Avg time:    {:.1}s", summary.avg_duration_seconds);
    println!("  Avg cost:    {}", fmt_usd(summary.avg_cost_usd));
    if summary.correction_rate > 0.0 {
        println!("  Corrections: {:.0}%", summary.correction_rate * 100.0);
    }
    println!(
        "  Last 30d:    {} calls, {:.1}% success, trend {}",
        summary.window.entries,
        summary.window.success_rate * 100.0,
        summary.trend.as_str()
    );
    if !summary.model_usage.is_empty() {
        println!("\n  Models:");
        for (model, count) in &summary.model_usage {
            println!("    {model:<28} {count} calls");
        }
    }
    if !summary.top_failure_modes.is_empty() {
        println!("\n  Failure modes:");
        for mode in &summary.top_failure_modes {
            println!("    {:>4}x  {}", mode.count, mode.message);
        }
    }
}

fn render_analysis(analysis: &ComplexityAnalysis) {
    println!("Complexity: {}/100", analysis.total);
    println!(
        "  files {:>2}/40  code {:>2}/30  domain {:>2}/25  risk {:>2}/35",
        analysis.breakdown.file,
        analysis.breakdown.code,
        analysis.breakdown.domain,
        analysis.breakdown.risk
    );
    println!("  Domain: {}", analysis.domain_category.as_str());
    if !analysis.details.high_risk_files.is_empty() {
        println!("  High-risk files: {}", analysis.details.high_risk_files.join(", "));
    }
    if !analysis.details.critical_patterns.is_empty() {
        println!(
            "  Critical patterns: {}",
            analysis.details.critical_patterns.join(", ")
        );
    }
    if !analysis.details.keywords_found.is_empty() {
        println!("  Keywords: {}", analysis.details.keywords_found.join(", "));
    }
}

fn render_decision(analysis: &ComplexityAnalysis, decision: &ModelDecision) {
    render_analysis(analysis);
    println!();
    println!("Selected: {} ({} tier)", decision.model, decision.tier);
    println!("  Method: {}", decision.method.as_str());
    println!("  Reason: {}", decision.reason);
    if let Some(estimate) = &decision.cost_estimate {
        println!("  Cost:   {estimate}");
    }
    if let Some(workflow) = &decision.workflow {
        println!("  Workflow:");
        for (i, step) in workflow.iter().enumerate() {
            println!("    {}. {step}", i + 1);
        }
    }
}

fn savings_lines(savings: &crate::routing::SavingsProjection) -> Vec<String> {
    vec![
        format!(
            "  Current mix:    {:.0}% premium / {:.0}% economy",
            savings.current_premium_pct,
            100.0 - savings.current_premium_pct
        ),
        format!(
            "  Optimal mix:    {:.0}% premium / {:.0}% economy",
            savings.optimal_premium_pct, savings.optimal_economy_pct
        ),
        format!(
            "  Projected cost: {}/month (now {})",
            fmt_usd(savings.projected_monthly_cost_usd),
            fmt_usd(savings.current_monthly_cost_usd)
        ),
        format!(
            "  Savings:        {}/month, {}/year ({:.0}% reduction)",
            fmt_usd(savings.monthly_savings_usd),
            fmt_usd(savings.annual_savings_usd),
            savings.reduction_pct
        ),
        "  These figures are an estimate from a linear cost model, not a guarantee".to_string(),
    ]
}

fn fmt_usd(value: f64) -> String {
    format!("${value:.2}")
}

fn status_tag(status: Status) -> String {
    let mark = match status {
        Status::Excellent | Status::Good => "+",
        Status::NeedsImprovement => "~",
        Status::ReviewNeeded => "!",
    };
    format!("{mark} {}", status.as_str())
}

fn draw_bar(pct: f64) -> String {
    let pct = pct.clamp(0.0, 100.0);
    let filled = (pct / 100.0 * BAR_WIDTH as f64).round() as usize;
    let mut bar = String::with_capacity(BAR_WIDTH);
    for i in 0..BAR_WIDTH {
        bar.push(if i < filled { '█' } else { '░' });
    }
    bar
}
