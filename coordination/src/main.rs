//! Hive coordination CLI
//!
//! Runs decisions against a scripted swarm and prints the result as JSON.
//!
//! # Usage
//!
//! ```bash
//! hive-coordination --swarm swarm.toml decide "Which region next?" --urgency high
//! hive-coordination --swarm swarm.toml emergency "db outage" --severity critical
//! hive-coordination --swarm swarm.toml health
//!
//! # Tuning through the environment
//! HIVE_QUORUM_REQUIRED=0.6 HIVE_TIE_BREAKER=random hive-coordination decide "..."
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing::info;

use hive_coordination::{
    DecisionOrchestrator, DecisionOutcome, EventBus, HiveConfig, InMemoryDecisionStore,
    RecordingCommunicator, Severity, SwarmSpec, Urgency,
};

/// Swarm used when no `--swarm` file is given
const DEMO_SWARM: &str = r#"
[[agent]]
id = "scout-1"
agent_type = "scout"
recommendation = "expand"
confidence = 0.8
reasoning = "New territory is under-served"
emergency_action = "contain"

[[agent]]
id = "worker-1"
recommendation = "expand"
confidence = 0.6
emergency_action = "immediate-action"

[[agent]]
id = "analyst-1"
agent_type = "analyst"
recommendation = "consolidate"
confidence = 0.9
reasoning = "Current load is near capacity"
emergency_action = "immediate-action"
"#;

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Swarm definition (TOML with [[agent]] tables)
    #[arg(long)]
    swarm: Option<PathBuf>,

    /// Hive configuration file; HIVE_* variables override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Decision journal (JSONL), replayed on startup
    #[arg(long)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Make a strategic decision
    Decide {
        topic: String,

        /// Context passed to every agent, as JSON
        #[arg(long, default_value = "{}")]
        context: String,

        #[arg(long, default_value = "normal")]
        urgency: Urgency,
    },
    /// Handle an emergency
    Emergency {
        situation: String,

        #[arg(long, default_value = "high")]
        severity: Severity,

        #[arg(long, default_value = "{}")]
        context: String,
    },
    /// Report swarm health
    Health,
}

fn parse_context(raw: &str) -> Result<Value> {
    serde_json::from_str(raw).with_context(|| format!("Invalid --context JSON: {}", raw))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = match &cli.config {
        Some(path) => HiveConfig::from_toml_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => {
            let config = HiveConfig::from_env();
            config.validate().context("Invalid HIVE_* configuration")?;
            config
        }
    };

    let swarm = match &cli.swarm {
        Some(path) => SwarmSpec::from_toml_file(path)
            .with_context(|| format!("Failed to load swarm {}", path.display()))?,
        None => SwarmSpec::from_toml_str(DEMO_SWARM).context("Invalid demo swarm")?,
    };

    let store = match &cli.store {
        Some(path) => InMemoryDecisionStore::open(path)
            .with_context(|| format!("Failed to open decision store {}", path.display()))?,
        None => InMemoryDecisionStore::new(),
    };

    info!(agents = swarm.agents.len(), "Starting hive coordination");

    let orchestrator = DecisionOrchestrator::new(
        config,
        swarm.participants(),
        Arc::new(store),
        Arc::new(RecordingCommunicator::new()),
        EventBus::with_history(512).shared(),
    );
    orchestrator
        .initialize()
        .await
        .context("Failed to initialize orchestrator")?;

    let output = match cli.command {
        Command::Decide {
            topic,
            context,
            urgency,
        } => {
            let outcome = orchestrator
                .make_strategic_decision(&topic, parse_context(&context)?, urgency)
                .await
                .context("Strategic decision failed")?;
            match &outcome {
                DecisionOutcome::Decided(decision) => serde_json::to_value(decision)?,
                DecisionOutcome::Deferred { voting_id, result } => serde_json::json!({
                    "phase": outcome.phase(),
                    "voting_id": voting_id,
                    "result": result,
                }),
            }
        }
        Command::Emergency {
            situation,
            severity,
            context,
        } => {
            let decision = orchestrator
                .handle_emergency(&situation, severity, parse_context(&context)?)
                .await
                .context("Emergency handling failed")?;
            serde_json::to_value(&decision)?
        }
        Command::Health => serde_json::to_value(orchestrator.monitor_swarm_health().await)?,
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
