// SPDX-FileCopyrightText: 2026 Pinax contributors
// SPDX-License-Identifier: MIT

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use serde_json::json;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::hub::ObserverHub;
use crate::model::{OperationRequest, OperationResult, OperationStatus, Role};
use crate::ops::{FunctionExecutor, OperationSpec};
use crate::store::CanvasStore;

use super::{
    AgentClient, AgentContext, AgentReply, AgentUnavailable, ContinuationPolicy,
    ConversationOrchestrator, ConversationOutcome, OrchestratorConfig, TurnOptions,
};

/// Replays a fixed reply script; answers "done" with no operations once the
/// script runs out.
struct ScriptedAgent {
    replies: StdMutex<VecDeque<Result<AgentReply, AgentUnavailable>>>,
}

impl ScriptedAgent {
    fn new(replies: Vec<Result<AgentReply, AgentUnavailable>>) -> Self {
        Self { replies: StdMutex::new(replies.into_iter().collect()) }
    }
}

impl AgentClient for ScriptedAgent {
    fn ask(
        &self,
        _context: &AgentContext,
        _history: &[crate::model::ConversationTurn],
        _catalog: &[OperationSpec],
    ) -> impl Future<Output = Result<AgentReply, AgentUnavailable>> + Send {
        let next = self
            .replies
            .lock()
            .expect("script lock")
            .pop_front()
            .unwrap_or_else(|| Ok(AgentReply { text: "done".to_owned(), requested: Vec::new() }));
        async move { next }
    }
}

struct SleepyAgent;

impl AgentClient for SleepyAgent {
    fn ask(
        &self,
        _context: &AgentContext,
        _history: &[crate::model::ConversationTurn],
        _catalog: &[OperationSpec],
    ) -> impl Future<Output = Result<AgentReply, AgentUnavailable>> + Send {
        async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(AgentReply { text: String::new(), requested: Vec::new() })
        }
    }
}

fn executor() -> FunctionExecutor {
    FunctionExecutor::new(Arc::new(Mutex::new(CanvasStore::default())), Arc::new(ObserverHub::new()))
}

fn create_request(id: &str) -> OperationRequest {
    OperationRequest { name: "create_container".to_owned(), arguments: json!({"id": id}) }
}

fn orchestrator(
    replies: Vec<Result<AgentReply, AgentUnavailable>>,
) -> ConversationOrchestrator<ScriptedAgent> {
    ConversationOrchestrator::new(ScriptedAgent::new(replies), executor(), AgentContext::default())
}

#[test]
fn continuation_policy_matches_known_phrases() {
    let policy = ContinuationPolicy::default();
    assert!(policy.matches("please Continue from where you stopped"));
    assert!(policy.matches("keep going"));
    assert!(policy.matches("finish the rest"));
    assert!(!policy.matches("make me a dashboard"));
    assert!(!policy.matches("discontinue the experiment"));
}

#[tokio::test]
async fn reply_without_operations_completes_immediately() {
    let mut orchestrator = orchestrator(vec![Ok(AgentReply {
        text: "nothing to draw".to_owned(),
        requested: Vec::new(),
    })]);

    let outcome = orchestrator
        .handle_message("hello", TurnOptions::default(), &CancellationToken::new())
        .await;
    assert_eq!(
        outcome,
        ConversationOutcome::Done { reply: "nothing to draw".to_owned(), executed: 0 }
    );
    let roles = orchestrator.history().iter().map(|t| t.role).collect::<Vec<_>>();
    assert_eq!(roles, vec![Role::User, Role::Agent]);
}

#[tokio::test]
async fn iteration_cap_stops_mid_batch_and_surfaces_the_rest() {
    let requested = ["a", "b", "c", "d", "e", "f"].map(create_request).to_vec();
    let shared = executor();
    let mut orchestrator = ConversationOrchestrator::new(
        ScriptedAgent::new(vec![Ok(AgentReply { text: "six steps".to_owned(), requested })]),
        shared.clone(),
        AgentContext::default(),
    );

    let outcome = orchestrator
        .handle_message("build a pipeline", TurnOptions::default(), &CancellationToken::new())
        .await;
    match outcome {
        ConversationOutcome::IterationLimitReached { executed, pending } => {
            assert_eq!(executed, 5);
            assert_eq!(pending.len(), 1);
            assert_eq!(pending[0], create_request("f"));
        }
        other => panic!("expected iteration limit, got {other:?}"),
    }

    // Exactly the first five operations ran; the sixth never touched state.
    let store = shared.store().lock().await;
    assert_eq!(store.container_count(), 5);
    assert!(store.ordered_ids().iter().all(|id| id.as_str() != "f"));
}

#[tokio::test]
async fn continuation_phrase_doubles_the_cap() {
    let requested = ["a", "b", "c", "d", "e", "f"].map(create_request).to_vec();
    let mut orchestrator = orchestrator(vec![Ok(AgentReply {
        text: "six steps".to_owned(),
        requested,
    })]);

    let outcome = orchestrator
        .handle_message("keep going with all six", TurnOptions::default(), &CancellationToken::new())
        .await;
    assert_eq!(outcome, ConversationOutcome::Done { reply: "done".to_owned(), executed: 6 });
}

#[tokio::test]
async fn explicit_opt_in_also_extends_the_cap() {
    let requested = ["a", "b", "c", "d", "e", "f"].map(create_request).to_vec();
    let mut orchestrator = orchestrator(vec![Ok(AgentReply {
        text: "six steps".to_owned(),
        requested,
    })]);

    let outcome = orchestrator
        .handle_message(
            "build a pipeline",
            TurnOptions { allow_extended: true },
            &CancellationToken::new(),
        )
        .await;
    assert_eq!(outcome, ConversationOutcome::Done { reply: "done".to_owned(), executed: 6 });
}

#[tokio::test]
async fn operation_failures_feed_back_and_do_not_stop_the_loop() {
    let requested = vec![create_request("a"), create_request("a"), create_request("b")];
    let mut orchestrator = orchestrator(vec![Ok(AgentReply {
        text: "three steps".to_owned(),
        requested,
    })]);

    let outcome = orchestrator
        .handle_message("go", TurnOptions::default(), &CancellationToken::new())
        .await;
    assert_eq!(outcome, ConversationOutcome::Done { reply: "done".to_owned(), executed: 3 });

    let outcomes = orchestrator
        .history()
        .iter()
        .filter(|turn| turn.role == Role::OperationOutcome)
        .map(|turn| serde_json::from_str::<OperationResult>(&turn.content).expect("result json"))
        .collect::<Vec<_>>();
    assert_eq!(outcomes.len(), 3);
    assert_eq!(outcomes[0].status, OperationStatus::Success);
    assert_eq!(outcomes[1].status, OperationStatus::Error);
    assert_eq!(outcomes[1].detail["error"], "duplicate_identifier");
    assert_eq!(outcomes[2].status, OperationStatus::Success);
}

#[tokio::test]
async fn agent_error_surfaces_as_unavailable() {
    let mut orchestrator = orchestrator(vec![Err(AgentUnavailable::new("upstream 503"))]);

    let outcome = orchestrator
        .handle_message("hello", TurnOptions::default(), &CancellationToken::new())
        .await;
    assert_eq!(
        outcome,
        ConversationOutcome::AgentUnavailable { detail: "upstream 503".to_owned(), executed: 0 }
    );
}

#[tokio::test(start_paused = true)]
async fn slow_agent_times_out_as_unavailable() {
    let mut orchestrator =
        ConversationOrchestrator::new(SleepyAgent, executor(), AgentContext::default())
            .with_config(OrchestratorConfig {
                agent_timeout: Duration::from_secs(30),
                ..OrchestratorConfig::default()
            });

    let outcome = orchestrator
        .handle_message("hello", TurnOptions::default(), &CancellationToken::new())
        .await;
    assert_eq!(
        outcome,
        ConversationOutcome::AgentUnavailable {
            detail: "agent call exceeded 30s".to_owned(),
            executed: 0,
        }
    );
}

#[tokio::test]
async fn cancelled_token_stops_before_the_agent_call() {
    let mut orchestrator = orchestrator(vec![Ok(AgentReply {
        text: "never asked".to_owned(),
        requested: vec![create_request("a")],
    })]);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let outcome = orchestrator.handle_message("hello", TurnOptions::default(), &cancel).await;
    assert_eq!(outcome, ConversationOutcome::Cancelled { executed: 0 });
}

#[tokio::test]
async fn history_is_truncated_between_rounds() {
    let requested = vec![create_request("a"), create_request("b")];
    let mut orchestrator = orchestrator(vec![Ok(AgentReply {
        text: "two steps".to_owned(),
        requested,
    })])
    .with_config(OrchestratorConfig { max_history_turns: 3, ..OrchestratorConfig::default() });

    let outcome = orchestrator
        .handle_message("go", TurnOptions::default(), &CancellationToken::new())
        .await;
    assert_eq!(outcome, ConversationOutcome::Done { reply: "done".to_owned(), executed: 2 });

    // The user turn was the oldest and has been evicted; the final agent turn
    // lands after the between-rounds truncation.
    let roles = orchestrator.history().iter().map(|t| t.role).collect::<Vec<_>>();
    assert_eq!(
        roles,
        vec![Role::Agent, Role::OperationOutcome, Role::OperationOutcome, Role::Agent]
    );
}
