//! Orchestrator: wires capabilities, engine, and workspace store together
//!
//! One `run` call drives the full loop for a single asset: load prior state,
//! seed the creator from the workspace, enforce the selection lock, let the
//! engine iterate, then persist every new envelope plus the state snapshot.
//! A replayed run (decision already locked) performs zero writes.

pub mod sticky;

use std::collections::BTreeSet;
use std::sync::Arc;

use log::{debug, info};

use crate::capability::{Creator, Reviewer, SelectionLookup};
use crate::domain::{LoopOutcome, LoopProtocolState, is_valid_asset_id, merge_decision};
use crate::engine::{LoopRequest, ReviewLoopEngine};
use crate::error::{RedraftError, Result};
use crate::store::ProtocolStore;

pub use sticky::{CODE_LOCKED_SELECTION, LockedSelectionReviewer, SeededCreator};

/// What one orchestrated run did
#[derive(Debug, Clone)]
pub struct LoopRunReport {
    pub state: LoopProtocolState,
    pub new_iterations: usize,
    pub selected_written: bool,
    pub replayed: bool,
}

pub struct ReviewLoopOrchestrator<C, R, S, L> {
    creator: Arc<C>,
    reviewer: Arc<R>,
    store: Arc<S>,
    selections: Arc<L>,
    locked_assets: BTreeSet<String>,
}

impl<C, R, S, L> ReviewLoopOrchestrator<C, R, S, L>
where
    C: Creator,
    R: Reviewer,
    S: ProtocolStore,
    L: SelectionLookup,
{
    pub fn new(
        creator: Arc<C>,
        reviewer: Arc<R>,
        store: Arc<S>,
        selections: Arc<L>,
        locked_assets: BTreeSet<String>,
    ) -> Self {
        Self {
            creator,
            reviewer,
            store,
            selections,
            locked_assets,
        }
    }

    pub async fn run(&self, request: &LoopRequest) -> Result<LoopRunReport> {
        if !is_valid_asset_id(&request.asset_id) {
            return Err(RedraftError::Config(format!(
                "invalid asset id '{}'",
                request.asset_id
            )));
        }

        let prior = self.store.load_protocol_state(&request.asset_id).await?;
        let prior_decision = prior.as_ref().map(|state| state.decision.clone());
        let seed = self.store.latest_seed_candidate(&request.asset_id).await?;

        let creator = Arc::new(SeededCreator::new(self.creator.clone(), seed));
        let reviewer = Arc::new(LockedSelectionReviewer::new(
            self.reviewer.clone(),
            self.selections.clone(),
            self.locked_assets.contains(&request.asset_id),
        ));
        let engine = ReviewLoopEngine::new(creator, reviewer);
        let mut run = engine.run(request, prior).await?;

        if run.replayed {
            info!(
                "loop for '{}' already decided ({}), nothing to do",
                request.asset_id,
                run.state.decision.outcome()
            );
            return Ok(LoopRunReport {
                state: run.state,
                new_iterations: 0,
                selected_written: false,
                replayed: true,
            });
        }

        // A terminal prior decision stays, whatever the engine came back with.
        run.state.decision = merge_decision(prior_decision.as_ref(), run.state.decision.clone());

        for entry in &run.appended {
            self.store.write_candidate(&entry.candidate).await?;
            self.store.write_review(&request.asset_id, &entry.review).await?;
            self.store
                .write_protocol_iteration(&request.asset_id, entry)
                .await?;
            debug!(
                "persisted iteration {} for '{}'",
                entry.iteration, request.asset_id
            );
        }
        self.store.write_protocol_state(&run.state).await?;

        let mut selected_written = false;
        if run.state.decision.outcome() == LoopOutcome::Converged {
            if let Some(final_iteration) = run.state.decision.final_iteration() {
                if let Some(entry) = run
                    .state
                    .iterations
                    .iter()
                    .find(|entry| entry.iteration == final_iteration)
                {
                    self.store
                        .write_selected_text(
                            &request.asset_id,
                            entry.candidate.format,
                            &entry.candidate.content,
                        )
                        .await?;
                    selected_written = true;
                    info!(
                        "selected text for '{}' written from iteration {}",
                        request.asset_id, final_iteration
                    );
                }
            }
        }

        Ok(LoopRunReport {
            new_iterations: run.appended.len(),
            selected_written,
            replayed: false,
            state: run.state,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{ScriptedCreator, ScriptedReply, ScriptedReviewer, fixture_epoch};
    use crate::domain::{
        Candidate, ContentFormat, CreatorInput, CreatorOutput, LoopDecision,
        LoopProtocolIteration, ReviewIteration, ReviewVerdict,
    };
    use async_trait::async_trait;
    use serde_json::{Value, json};
    use tokio::sync::Mutex;
    use uuid::Uuid;

    #[derive(Default)]
    struct MemoryStore {
        state: Mutex<Option<LoopProtocolState>>,
        seed: Mutex<Option<Candidate>>,
        writes: Mutex<Vec<String>>,
        selected: Mutex<Option<String>>,
    }

    #[async_trait]
    impl ProtocolStore for MemoryStore {
        async fn load_protocol_state(&self, _asset_id: &str) -> Result<Option<LoopProtocolState>> {
            Ok(self.state.lock().await.clone())
        }

        async fn write_protocol_iteration(
            &self,
            _asset_id: &str,
            entry: &LoopProtocolIteration,
        ) -> Result<()> {
            self.writes
                .lock()
                .await
                .push(format!("iteration {}", entry.iteration));
            Ok(())
        }

        async fn write_protocol_state(&self, state: &LoopProtocolState) -> Result<()> {
            self.writes.lock().await.push("state".to_string());
            *self.state.lock().await = Some(state.clone());
            Ok(())
        }

        async fn write_candidate(&self, _candidate: &Candidate) -> Result<()> {
            self.writes.lock().await.push("candidate".to_string());
            Ok(())
        }

        async fn write_review(&self, _asset_id: &str, review: &ReviewIteration) -> Result<()> {
            self.writes
                .lock()
                .await
                .push(format!("review {}", review.iteration));
            Ok(())
        }

        async fn write_selected_text(
            &self,
            _asset_id: &str,
            _format: ContentFormat,
            content: &str,
        ) -> Result<()> {
            self.writes.lock().await.push("selected".to_string());
            *self.selected.lock().await = Some(content.to_string());
            Ok(())
        }

        async fn latest_seed_candidate(&self, _asset_id: &str) -> Result<Option<Candidate>> {
            Ok(self.seed.lock().await.clone())
        }
    }

    struct NoSelection;

    #[async_trait]
    impl SelectionLookup for NoSelection {
        async fn selected_content(&self, _asset_id: &str) -> Result<Option<String>> {
            Ok(None)
        }
    }

    struct FixedSelection(String);

    #[async_trait]
    impl SelectionLookup for FixedSelection {
        async fn selected_content(&self, _asset_id: &str) -> Result<Option<String>> {
            Ok(Some(self.0.clone()))
        }
    }

    struct CapturingCreator {
        inputs: Mutex<Vec<CreatorInput>>,
    }

    #[async_trait]
    impl Creator for CapturingCreator {
        async fn produce(&self, input: &CreatorInput) -> Result<CreatorOutput> {
            self.inputs.lock().await.push(input.clone());
            Ok(CreatorOutput {
                candidate: Candidate {
                    asset_id: input.asset_id.clone(),
                    candidate_id: Uuid::nil(),
                    content: "draft\n".to_string(),
                    format: ContentFormat::Markdown,
                    created_at: fixture_epoch(),
                    provenance: vec![],
                },
                done: true,
                applied: true,
            })
        }
    }

    fn replies(values: Vec<Value>) -> Vec<ScriptedReply> {
        values
            .into_iter()
            .map(|v| ScriptedReply::from_value(v).unwrap())
            .collect()
    }

    fn scripted(
        creator: Vec<Value>,
        reviewer: Vec<Value>,
    ) -> (Arc<ScriptedCreator>, Arc<ScriptedReviewer>) {
        (
            Arc::new(ScriptedCreator::new(replies(creator))),
            Arc::new(ScriptedReviewer::new(replies(reviewer))),
        )
    }

    fn locked(assets: &[&str]) -> BTreeSet<String> {
        assets.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_converged_run_persists_in_order() {
        let (creator, reviewer) = scripted(
            vec![json!({"done": true, "candidate": {"content": "final text\n"}})],
            vec![json!({"verdict": "ok"})],
        );
        let store = Arc::new(MemoryStore::default());
        let orchestrator = ReviewLoopOrchestrator::new(
            creator,
            reviewer,
            store.clone(),
            Arc::new(NoSelection),
            locked(&[]),
        );

        let report = orchestrator
            .run(&LoopRequest::new("description", 3))
            .await
            .unwrap();

        assert_eq!(report.new_iterations, 1);
        assert!(report.selected_written);
        assert!(!report.replayed);
        let writes = store.writes.lock().await;
        assert_eq!(
            *writes,
            vec!["candidate", "review 1", "iteration 1", "state", "selected"]
        );
        assert_eq!(
            store.selected.lock().await.as_deref(),
            Some("final text\n")
        );
    }

    #[tokio::test]
    async fn test_replay_performs_no_writes_and_no_calls() {
        let mut state = LoopProtocolState::new("description", 2);
        state.iterations.push(LoopProtocolIteration {
            iteration: 1,
            creator_done: true,
            candidate: Candidate {
                asset_id: "description".to_string(),
                candidate_id: Uuid::nil(),
                content: "done\n".to_string(),
                format: ContentFormat::Markdown,
                created_at: fixture_epoch(),
                provenance: vec![],
            },
            review: ReviewIteration {
                iteration: 1,
                verdict: ReviewVerdict::Ok,
                issues: vec![],
                reviewer: Some("reviewer".to_string()),
                created_at: fixture_epoch(),
                summary: None,
                provenance: vec![],
            },
        });
        state.decision = LoopDecision::converged(1);

        let store = Arc::new(MemoryStore::default());
        *store.state.lock().await = Some(state.clone());

        // Empty scripts error on any call, so a clean run proves zero calls
        let (creator, reviewer) = scripted(vec![], vec![]);
        let orchestrator = ReviewLoopOrchestrator::new(
            creator,
            reviewer,
            store.clone(),
            Arc::new(NoSelection),
            locked(&[]),
        );

        let report = orchestrator
            .run(&LoopRequest::new("description", 2))
            .await
            .unwrap();

        assert!(report.replayed);
        assert_eq!(report.new_iterations, 0);
        assert!(!report.selected_written);
        assert_eq!(report.state, state);
        assert!(store.writes.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_exhausted_prior_state_writes_state_only() {
        let mut state = LoopProtocolState::new("description", 1);
        state.iterations.push(LoopProtocolIteration {
            iteration: 1,
            creator_done: false,
            candidate: Candidate {
                asset_id: "description".to_string(),
                candidate_id: Uuid::nil(),
                content: "stuck\n".to_string(),
                format: ContentFormat::Markdown,
                created_at: fixture_epoch(),
                provenance: vec![],
            },
            review: ReviewIteration {
                iteration: 1,
                verdict: ReviewVerdict::ChangesRequested,
                issues: vec![],
                reviewer: None,
                created_at: fixture_epoch(),
                summary: None,
                provenance: vec![],
            },
        });

        let store = Arc::new(MemoryStore::default());
        *store.state.lock().await = Some(state);

        let (creator, reviewer) = scripted(vec![], vec![]);
        let orchestrator = ReviewLoopOrchestrator::new(
            creator,
            reviewer,
            store.clone(),
            Arc::new(NoSelection),
            locked(&[]),
        );

        let report = orchestrator
            .run(&LoopRequest::new("description", 1))
            .await
            .unwrap();

        assert_eq!(report.new_iterations, 0);
        assert_eq!(report.state.decision.outcome(), LoopOutcome::NeedsHuman);
        assert_eq!(*store.writes.lock().await, vec!["state"]);
    }

    #[tokio::test]
    async fn test_selection_lock_applies_only_to_listed_assets() {
        let (creator, reviewer) = scripted(
            vec![json!({"done": true, "candidate": {"content": "new text\n"}})],
            vec![json!({"verdict": "ok"})],
        );
        let store = Arc::new(MemoryStore::default());
        let orchestrator = ReviewLoopOrchestrator::new(
            creator,
            reviewer,
            store.clone(),
            Arc::new(FixedSelection("published text\n".to_string())),
            locked(&["slug"]),
        );

        // "description" is not locked, so the differing selection is ignored
        let report = orchestrator
            .run(&LoopRequest::new("description", 2))
            .await
            .unwrap();
        assert_eq!(report.state.decision.outcome(), LoopOutcome::Converged);
        assert!(report.state.iterations[0].review.issues.is_empty());
    }

    #[tokio::test]
    async fn test_locked_asset_cannot_converge_on_drifted_content() {
        let (creator, reviewer) = scripted(
            vec![
                json!({"done": true, "candidate": {"content": "new text\n"}}),
                json!({"done": true, "candidate": {"content": "newer text\n"}}),
            ],
            vec![json!({"verdict": "ok"}), json!({"verdict": "ok"})],
        );
        let store = Arc::new(MemoryStore::default());
        let orchestrator = ReviewLoopOrchestrator::new(
            creator,
            reviewer,
            store.clone(),
            Arc::new(FixedSelection("published text\n".to_string())),
            locked(&["slug"]),
        );

        let report = orchestrator.run(&LoopRequest::new("slug", 2)).await.unwrap();

        assert_eq!(report.state.decision.outcome(), LoopOutcome::NeedsHuman);
        assert!(!report.selected_written);
        for entry in &report.state.iterations {
            assert_eq!(entry.review.verdict, ReviewVerdict::ChangesRequested);
            assert_eq!(
                entry.review.issues[0].code.as_deref(),
                Some(CODE_LOCKED_SELECTION)
            );
        }
    }

    #[tokio::test]
    async fn test_workspace_seed_reaches_the_creator() {
        let creator = Arc::new(CapturingCreator {
            inputs: Mutex::new(Vec::new()),
        });
        let reviewer = Arc::new(ScriptedReviewer::new(replies(vec![json!({"verdict": "ok"})])));
        let store = Arc::new(MemoryStore::default());
        *store.seed.lock().await = Some(Candidate {
            asset_id: "description".to_string(),
            candidate_id: Uuid::nil(),
            content: "from the workspace\n".to_string(),
            format: ContentFormat::Markdown,
            created_at: fixture_epoch(),
            provenance: vec![],
        });

        let orchestrator = ReviewLoopOrchestrator::new(
            creator.clone(),
            reviewer,
            store,
            Arc::new(NoSelection),
            locked(&[]),
        );
        orchestrator
            .run(&LoopRequest::new("description", 2))
            .await
            .unwrap();

        let inputs = creator.inputs.lock().await;
        assert_eq!(
            inputs[0].previous_candidate.as_ref().unwrap().content,
            "from the workspace\n"
        );
    }

    #[tokio::test]
    async fn test_needs_human_run_writes_no_selection() {
        let (creator, reviewer) = scripted(
            vec![json!({"done": false, "candidate": {"content": "v1\n"}})],
            vec![json!({"verdict": "changes_requested"})],
        );
        let store = Arc::new(MemoryStore::default());
        let orchestrator = ReviewLoopOrchestrator::new(
            creator,
            reviewer,
            store.clone(),
            Arc::new(NoSelection),
            locked(&[]),
        );

        let report = orchestrator
            .run(&LoopRequest::new("description", 1))
            .await
            .unwrap();

        assert_eq!(report.state.decision.outcome(), LoopOutcome::NeedsHuman);
        assert!(!report.selected_written);
        assert!(store.selected.lock().await.is_none());
    }

    #[tokio::test]
    async fn test_invalid_asset_id_is_rejected_up_front() {
        let (creator, reviewer) = scripted(vec![], vec![]);
        let store = Arc::new(MemoryStore::default());
        let orchestrator = ReviewLoopOrchestrator::new(
            creator,
            reviewer,
            store.clone(),
            Arc::new(NoSelection),
            locked(&[]),
        );

        let err = orchestrator
            .run(&LoopRequest::new("Bad-Asset", 2))
            .await
            .unwrap_err();
        assert!(matches!(err, RedraftError::Config(_)));
        assert!(store.writes.lock().await.is_empty());
    }
}
