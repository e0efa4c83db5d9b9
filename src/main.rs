use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

mod cli;

use cli::Cli;
use cli::commands::Commands;

use redraft::capability::{
    CliCreator, CliReviewer, Creator, ReplyScript, Reviewer, ScriptedCreator, ScriptedReviewer,
};
use redraft::config::RedraftConfig;
use redraft::domain::{IssueSeverity, LoopOutcome, LoopProtocolState, ReviewIssue};
use redraft::engine::LoopRequest;
use redraft::orchestrator::{LoopRunReport, ReviewLoopOrchestrator};
use redraft::store::{ProtocolStore, WorkspaceStore};

fn setup_logging(verbose: bool) -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("redraft")
        .join("logs");

    fs::create_dir_all(&log_dir).context("failed to create log directory")?;

    let log_file = log_dir.join("redraft.log");

    // Setup env_logger with file output
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("failed to open log file")?,
    );

    let mut builder = env_logger::Builder::from_default_env();
    builder.target(env_logger::Target::Pipe(target));
    if verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.init();

    info!("logging initialized, writing to {}", log_file.display());
    Ok(())
}

async fn handle_review(
    asset_id: &str,
    root: &Path,
    config_path: Option<&Path>,
    max_override: Option<u32>,
    fake_replies: Option<&Path>,
) -> Result<()> {
    let config = RedraftConfig::load(config_path, root)?;
    let store = Arc::new(WorkspaceStore::new(root));
    let meta = store.read_episode_meta().await?;

    let mut request = LoopRequest::new(asset_id, max_override.unwrap_or(config.max_iterations))
        .with_host_names(meta.host_names.clone());
    if let Some(chapters) = &meta.chapters {
        request = request.with_chapters(chapters.clone());
    }
    if let Some(summary) = &meta.episode_summary {
        request = request.with_episode_summary(summary.clone());
    }

    info!(
        "reviewing '{}' in {} (max {} iterations)",
        asset_id,
        root.display(),
        request.max_iterations
    );

    let report = match fake_replies {
        Some(script_path) => {
            let text = fs::read_to_string(script_path)
                .with_context(|| format!("failed to read reply script {}", script_path.display()))?;
            let script: ReplyScript = serde_yaml::from_str(&text)
                .with_context(|| format!("failed to parse reply script {}", script_path.display()))?;

            let creator = ScriptedCreator::new(script.creator_replies()?).with_root(root);
            let mut reviewer = ScriptedReviewer::new(script.reviewer_replies()?).with_root(root);
            if let Some(label) = &script.reviewer_label {
                reviewer = reviewer.with_label(label.clone());
            }
            run_loop(Arc::new(creator), Arc::new(reviewer), store, &config, &request).await?
        }
        None => {
            let agents = match &meta.agents {
                Some(overrides) => config.agents.clone().with_overrides(overrides),
                None => config.agents.clone(),
            };
            agents
                .validate()
                .context("invalid agents configuration after episode.yaml overrides")?;

            let creator = CliCreator::new(agents.creator.clone(), root);
            let reviewer = CliReviewer::new(agents.reviewer.clone(), root);
            run_loop(Arc::new(creator), Arc::new(reviewer), store, &config, &request).await?
        }
    };

    print_report(&report);
    Ok(())
}

async fn run_loop<C: Creator, R: Reviewer>(
    creator: Arc<C>,
    reviewer: Arc<R>,
    store: Arc<WorkspaceStore>,
    config: &RedraftConfig,
    request: &LoopRequest,
) -> Result<LoopRunReport> {
    let orchestrator = ReviewLoopOrchestrator::new(
        creator,
        reviewer,
        store.clone(),
        store,
        config.locked_assets.clone(),
    );
    Ok(orchestrator.run(request).await?)
}

fn print_report(report: &LoopRunReport) {
    let state = &report.state;
    let headline = match state.decision.outcome() {
        LoopOutcome::Converged => format!("{} converged", state.asset_id).green(),
        LoopOutcome::NeedsHuman => format!("{} needs human review", state.asset_id).yellow(),
        LoopOutcome::InProgress => format!("{} still in progress", state.asset_id).cyan(),
    };
    println!("{headline}");
    if let Some(iteration) = state.decision.final_iteration() {
        println!("  Final iteration: {}/{}", iteration, state.max_iterations);
    }
    if let Some(reason) = state.decision.reason() {
        println!("  Reason: {reason}");
    }
    if report.replayed {
        println!("  Decision was already locked; nothing ran.");
    } else {
        println!("  New iterations: {}", report.new_iterations);
    }
    if report.selected_written {
        println!("  Selected text updated.");
    }
}

async fn handle_status(asset_id: Option<&str>, root: &Path) -> Result<()> {
    let store = WorkspaceStore::new(root);
    let resolved = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
    println!("Workspace: {}", resolved.display());

    let states: Vec<LoopProtocolState> = match asset_id {
        Some(asset) => store.load_protocol_state(asset).await?.into_iter().collect(),
        None => find_protocol_states(&store)?,
    };

    if states.is_empty() {
        let protocol_dir = store.layout().root().join("copy").join("protocol");
        println!(
            "No protocol state files found under {}",
            protocol_dir.display()
        );
        return Ok(());
    }

    for state in &states {
        render_status(state);
    }
    Ok(())
}

fn find_protocol_states(store: &WorkspaceStore) -> Result<Vec<LoopProtocolState>> {
    let pattern = format!(
        "{}/copy/protocol/*/state.json",
        store.layout().root().display()
    );
    let mut states = Vec::new();
    for entry in glob::glob(&pattern)? {
        let path = entry?;
        let text = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let state: LoopProtocolState = serde_json::from_str(&text)
            .with_context(|| format!("invalid protocol state at {}", path.display()))?;
        states.push(state);
    }
    states.sort_by(|a, b| a.asset_id.cmp(&b.asset_id));
    Ok(states)
}

fn render_status(state: &LoopProtocolState) {
    println!("Asset: {}", state.asset_id.bold());

    let latest = state.iterations.last();
    let iteration = latest.map(|entry| entry.iteration).unwrap_or(0);
    println!("  Iteration: {}/{}", iteration, state.max_iterations);

    let verdict = latest
        .map(|entry| entry.review.verdict.to_string())
        .unwrap_or_else(|| "none".to_string());
    println!("  Verdict: {verdict}");

    let outcome = state.decision.outcome();
    let outcome_text = match outcome {
        LoopOutcome::Converged => outcome.to_string().green(),
        LoopOutcome::NeedsHuman => outcome.to_string().yellow(),
        LoopOutcome::InProgress => outcome.to_string().cyan(),
    };
    match state.decision.reason() {
        Some(reason) => println!("  Outcome: {outcome_text} (reason={reason})"),
        None => println!("  Outcome: {outcome_text}"),
    }

    let issues: &[ReviewIssue] = latest
        .map(|entry| entry.review.issues.as_slice())
        .unwrap_or(&[]);
    let blocking = issues
        .iter()
        .filter(|issue| issue.severity == IssueSeverity::Error)
        .count();
    if blocking == 0 {
        println!("  Blocking issues: none");
    } else {
        println!("  Blocking issues: {blocking}");
    }

    if issues.is_empty() {
        println!("  Outstanding issues: none");
    } else {
        println!("  Outstanding issues: {}", issues.len());
        for issue in issues {
            println!("    - {}", format_issue(issue));
        }
    }
}

fn format_issue(issue: &ReviewIssue) -> String {
    let mut suffix = Vec::new();
    if let Some(code) = &issue.code {
        suffix.push(format!("code={code}"));
    }
    if let Some(field) = &issue.field {
        suffix.push(format!("field={field}"));
    }
    if suffix.is_empty() {
        format!("{}: {}", issue.severity, issue.message)
    } else {
        format!("{}: {} ({})", issue.severity, issue.message, suffix.join(", "))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse first so --help never touches the log directory
    let cli = Cli::parse();

    setup_logging(cli.verbose).context("failed to setup logging")?;

    match &cli.command {
        Commands::Review {
            asset,
            root,
            max_iterations,
            fake_replies,
        } => {
            handle_review(
                asset,
                root,
                cli.config.as_deref(),
                *max_iterations,
                fake_replies.as_deref(),
            )
            .await
        }
        Commands::Status { asset, root } => handle_status(asset.as_deref(), root).await,
    }
}
