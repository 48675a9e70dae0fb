//! CLI entry point: loads a skill file, runs it against an input string
//! through the checkpointing executor, and prints the resulting
//! [`dag::ExecutionResult`] as JSON.
//!
//! This binary wires the core crates together but owns no orchestration
//! logic of its own. It bundles [`llm::MockProvider`] as its LLM backend
//! since a real HTTP provider is external-collaborator territory the
//! `llm` crate deliberately does not ship (see that crate's doc comment):
//! pointing this binary at a real backend means swapping in a `Provider`
//! impl here, nothing upstream.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use dag::load_skill_file;
use executor::{CheckpointConfig, CheckpointingExecutor, ExecutorConfig, PhaseExecutor};
use llm::{MockProvider, Provider};
use tracing_subscriber::EnvFilter;

/// Run a declared skill against an input string.
#[derive(Parser, Debug)]
#[command(name = "skillgraph")]
#[command(about = "Executes a skillgraph skill file against an input string", long_about = None)]
struct Args {
    /// Path to a skill file (JSON or YAML).
    skill_file: PathBuf,

    /// Input string passed to the skill's first phases as `{{._input}}`.
    input: String,

    /// Maximum number of phases dispatched concurrently within a batch.
    #[arg(long)]
    max_parallel: Option<usize>,

    /// Resume an in-progress checkpoint for this skill/input pair instead
    /// of starting a fresh run, if one exists.
    #[arg(long)]
    resume: bool,

    /// Enables checkpointing and scopes it under the given directory.
    ///
    /// A durable, file-backed checkpoint store is configuration/persistence
    /// territory this repository treats as external; this flag only
    /// selects the bundled in-memory store's machine identity, so a crash
    /// within this process still loses in-progress checkpoints. Wire in a
    /// durable `CheckpointStore` here to change that.
    #[arg(long)]
    checkpoint_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let max_parallel = match args.max_parallel {
        Some(value) => value,
        None => tooling::config::get_env_parse_or("SKILLGRAPH_MAX_PARALLEL", 4usize)?,
    };
    let resume = args.resume || tooling::config::get_env_bool("SKILLGRAPH_RESUME")?.unwrap_or(false);

    let skill = load_skill_file(&args.skill_file)?;
    tracing::info!(skill_id = %skill.id, phases = skill.phases.len(), "loaded skill");

    let provider: Arc<dyn Provider> = Arc::new(MockProvider::responding_with(|request| {
        format!(
            "[mock response to {} messages for model {}]",
            request.messages.len(),
            request.model_id
        )
    }));
    let phase_executor = PhaseExecutor::new(provider, skill.routing.clone());

    let executor_config = ExecutorConfig::default().with_max_parallel(max_parallel);
    let checkpoint_config = match &args.checkpoint_dir {
        Some(dir) => CheckpointConfig::enabled(dir.display().to_string()).with_resume(resume),
        None => CheckpointConfig::default(),
    };
    let store = Arc::new(checkpoint::InMemoryCheckpointStore::new());

    let checkpointing_executor =
        CheckpointingExecutor::new(phase_executor, executor_config, checkpoint_config, store);

    let result = checkpointing_executor.execute(&skill, &args.input).await?;

    println!("{}", serde_json::to_string_pretty(&result)?);

    if result.status == dag::ExecutionStatus::Failed {
        std::process::exit(1);
    }
    Ok(())
}
