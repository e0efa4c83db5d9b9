//! End-to-end review loop tests
//!
//! Drives the orchestrator against a real workspace directory with scripted
//! capabilities and asserts on the protocol files left behind.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use redraft::capability::{Creator, ScriptedCreator, ScriptedReply, ScriptedReviewer, fixture_epoch};
use redraft::domain::{
    Candidate, ContentFormat, CreatorInput, CreatorOutput, LoopOutcome, LoopProtocolIteration,
    LoopProtocolState, REASON_CONVERGED, REASON_ITERATION_LIMIT, ReviewIteration, ReviewVerdict,
};
use redraft::engine::LoopRequest;
use redraft::error::Result;
use redraft::orchestrator::{CODE_LOCKED_SELECTION, ReviewLoopOrchestrator};
use redraft::store::{ProtocolStore, WorkspaceStore};
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio::sync::Mutex;
use uuid::Uuid;

fn replies(values: Vec<Value>) -> Vec<ScriptedReply> {
    values
        .into_iter()
        .map(|v| ScriptedReply::from_value(v).unwrap())
        .collect()
}

fn locked(assets: &[&str]) -> BTreeSet<String> {
    assets.iter().map(|s| s.to_string()).collect()
}

fn orchestrator_with(
    root: &Path,
    creator: Vec<Value>,
    reviewer: Vec<Value>,
    locked_assets: &[&str],
) -> ReviewLoopOrchestrator<ScriptedCreator, ScriptedReviewer, WorkspaceStore, WorkspaceStore> {
    let store = Arc::new(WorkspaceStore::new(root));
    ReviewLoopOrchestrator::new(
        Arc::new(ScriptedCreator::new(replies(creator))),
        Arc::new(ScriptedReviewer::new(replies(reviewer))),
        store.clone(),
        store,
        locked(locked_assets),
    )
}

fn candidate(asset_id: &str, content: &str, id: u128) -> Candidate {
    Candidate {
        asset_id: asset_id.to_string(),
        candidate_id: Uuid::from_u128(id),
        content: content.to_string(),
        format: ContentFormat::Markdown,
        created_at: fixture_epoch(),
        provenance: vec![],
    }
}

/// Integration test: a two-iteration run converges and leaves the full
/// artifact trail in the workspace
#[tokio::test]
async fn test_converging_loop_writes_every_artifact() {
    let dir = TempDir::new().unwrap();
    let orchestrator = orchestrator_with(
        dir.path(),
        vec![
            json!({"candidate": {"content": "# Draft one\n"}}),
            json!({"done": true, "candidate": {"content": "# Draft two\n"}}),
        ],
        vec![
            json!({"verdict": "changes_requested", "issues": [{"message": "tighten the intro"}]}),
            json!({"verdict": "ok"}),
        ],
        &[],
    );

    let report = orchestrator
        .run(&LoopRequest::new("description", 3))
        .await
        .unwrap();

    assert_eq!(report.state.decision.outcome(), LoopOutcome::Converged);
    assert_eq!(report.state.decision.final_iteration(), Some(2));
    assert_eq!(report.state.decision.reason(), Some(REASON_CONVERGED));
    assert_eq!(report.new_iterations, 2);
    assert!(report.selected_written);

    let store = WorkspaceStore::new(dir.path());
    let layout = store.layout();
    assert!(layout.protocol_state_path("description").exists());
    assert!(layout.protocol_iteration_path("description", 1).exists());
    assert!(layout.protocol_iteration_path("description", 2).exists());
    assert!(layout.review_path("description", 1, Some("reviewer")).exists());
    assert!(layout.review_path("description", 2, Some("reviewer")).exists());
    for entry in &report.state.iterations {
        assert!(
            layout
                .candidate_envelope_path("description", entry.candidate.candidate_id)
                .exists()
        );
    }

    let selected = layout.selected_path("description", ContentFormat::Markdown);
    assert_eq!(std::fs::read_to_string(selected).unwrap(), "# Draft two\n");

    let loaded = store.load_protocol_state("description").await.unwrap();
    assert_eq!(loaded, Some(report.state));
}

/// Integration test: running out of iterations locks a needs_human decision
/// and publishes nothing
#[tokio::test]
async fn test_iteration_limit_marks_needs_human() {
    let dir = TempDir::new().unwrap();
    let orchestrator = orchestrator_with(
        dir.path(),
        vec![
            json!({"candidate": {"content": "v1\n"}}),
            json!({"candidate": {"content": "v2\n"}}),
        ],
        vec![
            json!({"verdict": "changes_requested"}),
            json!({"verdict": "changes_requested"}),
        ],
        &[],
    );

    let report = orchestrator
        .run(&LoopRequest::new("shownotes", 2))
        .await
        .unwrap();

    assert_eq!(report.state.decision.outcome(), LoopOutcome::NeedsHuman);
    assert_eq!(report.state.decision.reason(), Some(REASON_ITERATION_LIMIT));
    assert_eq!(report.state.decision.final_iteration(), Some(2));
    assert!(report.state.decision.is_locked());
    assert!(!report.selected_written);

    let store = WorkspaceStore::new(dir.path());
    assert!(
        !store
            .layout()
            .selected_path("shownotes", ContentFormat::Markdown)
            .exists()
    );
}

/// Integration test: an ok verdict without the creator declaring done does
/// not converge
#[tokio::test]
async fn test_reviewer_approval_alone_is_not_convergence() {
    let dir = TempDir::new().unwrap();
    let orchestrator = orchestrator_with(
        dir.path(),
        vec![json!({"done": false, "candidate": {"content": "fine but unfinished\n"}})],
        vec![json!({"verdict": "ok"})],
        &[],
    );

    let report = orchestrator
        .run(&LoopRequest::new("description", 1))
        .await
        .unwrap();

    assert_eq!(report.state.decision.outcome(), LoopOutcome::NeedsHuman);
    assert_eq!(report.state.iterations[0].review.verdict, ReviewVerdict::Ok);
    assert!(!report.state.iterations[0].creator_done);
}

/// Integration test: rerunning a decided loop replays the stored state and
/// leaves every file byte-identical
#[tokio::test]
async fn test_second_run_replays_without_touching_files() {
    let dir = TempDir::new().unwrap();
    let first = orchestrator_with(
        dir.path(),
        vec![json!({"done": true, "candidate": {"content": "final\n"}})],
        vec![json!({"verdict": "ok"})],
        &[],
    );
    first.run(&LoopRequest::new("description", 3)).await.unwrap();

    let store = WorkspaceStore::new(dir.path());
    let state_path = store.layout().protocol_state_path("description");
    let before = std::fs::read(&state_path).unwrap();

    // Empty scripts error on any call, so a clean second run proves replay
    let second = orchestrator_with(dir.path(), vec![], vec![], &[]);
    let report = second
        .run(&LoopRequest::new("description", 3))
        .await
        .unwrap();

    assert!(report.replayed);
    assert_eq!(report.new_iterations, 0);
    assert_eq!(std::fs::read(&state_path).unwrap(), before);
}

/// Integration test: a run picks up where persisted iterations stopped
#[tokio::test]
async fn test_resume_extends_persisted_iterations() {
    let dir = TempDir::new().unwrap();
    let store = WorkspaceStore::new(dir.path());

    // State an interrupted run would leave: one iteration, no decision
    let mut prior = LoopProtocolState::new("description", 3);
    prior.iterations.push(LoopProtocolIteration {
        iteration: 1,
        creator_done: false,
        candidate: candidate("description", "first pass\n", 1),
        review: ReviewIteration {
            iteration: 1,
            verdict: ReviewVerdict::ChangesRequested,
            issues: vec![],
            reviewer: Some("reviewer".to_string()),
            created_at: fixture_epoch(),
            summary: None,
            provenance: vec![],
        },
    });
    store.write_protocol_state(&prior).await.unwrap();

    let orchestrator = orchestrator_with(
        dir.path(),
        vec![json!({"done": true, "candidate": {"content": "second pass\n"}})],
        vec![json!({"verdict": "ok"})],
        &[],
    );
    let report = orchestrator
        .run(&LoopRequest::new("description", 3))
        .await
        .unwrap();

    assert_eq!(report.new_iterations, 1);
    assert_eq!(report.state.iterations.len(), 2);
    assert_eq!(report.state.iterations[0].candidate.content, "first pass\n");
    assert_eq!(report.state.iterations[1].iteration, 2);
    assert_eq!(report.state.decision.outcome(), LoopOutcome::Converged);
    assert_eq!(report.state.decision.final_iteration(), Some(2));
}

/// Integration test: a locked asset cannot converge on content that differs
/// from the published selection
#[tokio::test]
async fn test_locked_selection_blocks_drift() {
    let dir = TempDir::new().unwrap();
    let store = WorkspaceStore::new(dir.path());
    store
        .write_selected_text("slug", ContentFormat::Plain, "ep42-shipping\n")
        .await
        .unwrap();

    let orchestrator = orchestrator_with(
        dir.path(),
        vec![
            json!({"done": true, "candidate": {"content": "ep42-releases\n", "format": "plain"}}),
            json!({"done": true, "candidate": {"content": "ep42-releases\n", "format": "plain"}}),
        ],
        vec![json!({"verdict": "ok"}), json!({"verdict": "ok"})],
        &["slug"],
    );
    let report = orchestrator.run(&LoopRequest::new("slug", 2)).await.unwrap();

    assert_eq!(report.state.decision.outcome(), LoopOutcome::NeedsHuman);
    assert!(!report.selected_written);
    for entry in &report.state.iterations {
        assert_eq!(entry.review.verdict, ReviewVerdict::ChangesRequested);
        let codes: Vec<_> = entry
            .review
            .issues
            .iter()
            .filter_map(|issue| issue.code.as_deref())
            .collect();
        assert!(codes.contains(&CODE_LOCKED_SELECTION));
    }

    // The published text survives untouched
    let selected = store.layout().selected_path("slug", ContentFormat::Plain);
    assert_eq!(std::fs::read_to_string(selected).unwrap(), "ep42-shipping\n");
}

/// Integration test: a locked asset converges when the candidate matches the
/// published selection up to the trailing newline
#[tokio::test]
async fn test_matching_locked_selection_converges() {
    let dir = TempDir::new().unwrap();
    let store = WorkspaceStore::new(dir.path());
    store
        .write_selected_text("slug", ContentFormat::Plain, "ep42-shipping")
        .await
        .unwrap();

    let orchestrator = orchestrator_with(
        dir.path(),
        vec![json!({"done": true, "candidate": {"content": "ep42-shipping", "format": "plain"}})],
        vec![json!({"verdict": "ok"})],
        &["slug"],
    );
    let report = orchestrator.run(&LoopRequest::new("slug", 2)).await.unwrap();

    assert_eq!(report.state.decision.outcome(), LoopOutcome::Converged);
    assert!(report.state.iterations[0].review.issues.is_empty());
    assert!(report.selected_written);
}

/// Integration test: the selected file extension follows the candidate format
#[tokio::test]
async fn test_selected_file_extension_follows_the_format() {
    let dir = TempDir::new().unwrap();
    let orchestrator = orchestrator_with(
        dir.path(),
        vec![json!({"done": true, "candidate": {"content": "<p>done</p>", "format": "html"}})],
        vec![json!({"verdict": "ok"})],
        &[],
    );
    orchestrator
        .run(&LoopRequest::new("player_embed", 1))
        .await
        .unwrap();

    let store = WorkspaceStore::new(dir.path());
    let path = store
        .layout()
        .selected_path("player_embed", ContentFormat::Html);
    assert_eq!(std::fs::read_to_string(path).unwrap(), "<p>done</p>\n");
}

struct RecordingCreator {
    inputs: Mutex<Vec<CreatorInput>>,
}

#[async_trait]
impl Creator for RecordingCreator {
    async fn produce(&self, input: &CreatorInput) -> Result<CreatorOutput> {
        self.inputs.lock().await.push(input.clone());
        Ok(CreatorOutput {
            candidate: Candidate {
                asset_id: input.asset_id.clone(),
                candidate_id: Uuid::from_u128(99),
                content: "revised from the seed\n".to_string(),
                format: ContentFormat::Markdown,
                created_at: fixture_epoch(),
                provenance: vec![],
            },
            done: true,
            applied: true,
        })
    }
}

/// Integration test: the newest candidate on disk seeds the first iteration
#[tokio::test]
async fn test_workspace_seed_feeds_the_first_draft() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(WorkspaceStore::new(dir.path()));
    store
        .write_candidate(&candidate("description", "older draft\n", 1))
        .await
        .unwrap();
    let mut newest = candidate("description", "newest draft\n", 2);
    newest.created_at = fixture_epoch() + chrono::Duration::seconds(60);
    store.write_candidate(&newest).await.unwrap();

    let creator = Arc::new(RecordingCreator {
        inputs: Mutex::new(Vec::new()),
    });
    let reviewer = Arc::new(ScriptedReviewer::new(replies(vec![json!({"verdict": "ok"})])));
    let orchestrator =
        ReviewLoopOrchestrator::new(creator.clone(), reviewer, store.clone(), store, locked(&[]));
    orchestrator
        .run(&LoopRequest::new("description", 2))
        .await
        .unwrap();

    let inputs = creator.inputs.lock().await;
    assert_eq!(
        inputs[0].previous_candidate.as_ref().unwrap().content,
        "newest draft\n"
    );
}
