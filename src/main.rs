use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    // Logs go to stderr so report output stays pipeable.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("agentmeter=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    agentmeter::cli::run(agentmeter::cli::Cli::parse())
}
