// SPDX-FileCopyrightText: 2026 Pinax contributors
// SPDX-License-Identifier: MIT

//! Conversation orchestration: the bounded loop that drives canvas mutations
//! from an external conversational agent.
//!
//! The agent collaborator is opaque; it receives the system context, the
//! truncated history, and the operation catalog, and replies with text plus
//! zero or more requested operations. Operation failures feed back into the
//! history so the agent can adapt; only a failing agent call ends a turn
//! early.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use regex::Regex;
use serde_json::json;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::model::{ConversationTurn, OperationRequest, OperationResult};
use crate::ops::{operation_catalog, FunctionExecutor, OperationSpec};

/// System context handed to the agent on every call.
#[derive(Debug, Clone, Default)]
pub struct AgentContext {
    pub system_prompt: String,
}

/// One agent reply: free text plus the operations it wants executed, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentReply {
    pub text: String,
    pub requested: Vec<OperationRequest>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentUnavailable {
    pub detail: String,
}

impl AgentUnavailable {
    pub fn new(detail: impl Into<String>) -> Self {
        Self { detail: detail.into() }
    }
}

impl fmt::Display for AgentUnavailable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "agent unavailable: {}", self.detail)
    }
}

impl std::error::Error for AgentUnavailable {}

/// External agent collaborator.
pub trait AgentClient {
    fn ask(
        &self,
        context: &AgentContext,
        history: &[ConversationTurn],
        catalog: &[OperationSpec],
    ) -> impl Future<Output = Result<AgentReply, AgentUnavailable>> + Send;
}

/// Decides whether a user message signals "keep going", which doubles the
/// iteration cap. Known-fuzzy heuristic, so it is injectable policy rather
/// than hard-coded matching.
#[derive(Debug, Clone)]
pub struct ContinuationPolicy {
    pattern: Regex,
}

impl ContinuationPolicy {
    pub fn new(pattern: Regex) -> Self {
        Self { pattern }
    }

    pub fn matches(&self, message: &str) -> bool {
        self.pattern.is_match(message)
    }
}

impl Default for ContinuationPolicy {
    fn default() -> Self {
        let pattern = Regex::new(
            r"(?i)\b(continue|keep going|go on|carry on|don't stop|finish (?:it|the rest)|all the steps)\b",
        )
        .expect("continuation pattern is valid");
        Self { pattern }
    }
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Maximum executed operations per user message.
    pub base_iteration_limit: usize,
    /// Cap used when the continuation policy matches or the caller opts in.
    pub extended_iteration_limit: usize,
    pub agent_timeout: Duration,
    pub operation_timeout: Duration,
    /// History turns kept between rounds; oldest are evicted first.
    pub max_history_turns: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            base_iteration_limit: 5,
            extended_iteration_limit: 10,
            agent_timeout: Duration::from_secs(60),
            operation_timeout: Duration::from_secs(10),
            max_history_turns: 64,
        }
    }
}

/// Per-message options.
#[derive(Debug, Clone, Copy, Default)]
pub struct TurnOptions {
    /// Explicit opt-in to the extended iteration cap.
    pub allow_extended: bool,
}

/// Terminal state of one user message. `IterationLimitReached` is a status,
/// not an error: it invites the user to continue, and carries any requested
/// operations that were neither executed nor dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationOutcome {
    Done { reply: String, executed: usize },
    IterationLimitReached { executed: usize, pending: Vec<OperationRequest> },
    AgentUnavailable { detail: String, executed: usize },
    Cancelled { executed: usize },
}

/// Drives `ask agent -> execute requested operations -> feed results back`
/// until the agent stops requesting operations or the iteration cap is hit.
pub struct ConversationOrchestrator<A: AgentClient> {
    agent: A,
    executor: FunctionExecutor,
    context: AgentContext,
    config: OrchestratorConfig,
    policy: ContinuationPolicy,
    catalog: Vec<OperationSpec>,
    history: Vec<ConversationTurn>,
}

impl<A: AgentClient> ConversationOrchestrator<A> {
    pub fn new(agent: A, executor: FunctionExecutor, context: AgentContext) -> Self {
        Self {
            agent,
            executor,
            context,
            config: OrchestratorConfig::default(),
            policy: ContinuationPolicy::default(),
            catalog: operation_catalog(),
            history: Vec::new(),
        }
    }

    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_continuation_policy(mut self, policy: ContinuationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn history(&self) -> &[ConversationTurn] {
        &self.history
    }

    /// Handles one user message to a terminal outcome.
    ///
    /// The iteration counter counts executed operations. Operations run
    /// strictly in the requested order; an operation failure (including a
    /// timeout) becomes an operation-result turn and the loop continues.
    /// Cancellation stops before the next agent call or operation; anything
    /// already dispatched runs to completion or rollback.
    pub async fn handle_message(
        &mut self,
        message: &str,
        options: TurnOptions,
        cancel: &CancellationToken,
    ) -> ConversationOutcome {
        let cap = if options.allow_extended || self.policy.matches(message) {
            self.config.extended_iteration_limit
        } else {
            self.config.base_iteration_limit
        };
        debug!(cap, "handling user message");

        self.history.push(ConversationTurn::user(message));
        self.truncate_history();

        let mut executed = 0usize;
        loop {
            if cancel.is_cancelled() {
                return ConversationOutcome::Cancelled { executed };
            }

            let reply = match timeout(
                self.config.agent_timeout,
                self.agent.ask(&self.context, &self.history, &self.catalog),
            )
            .await
            {
                Ok(Ok(reply)) => reply,
                Ok(Err(err)) => {
                    warn!(error = %err, "agent call failed");
                    return ConversationOutcome::AgentUnavailable { detail: err.detail, executed };
                }
                Err(_) => {
                    warn!("agent call timed out");
                    return ConversationOutcome::AgentUnavailable {
                        detail: format!(
                            "agent call exceeded {}s",
                            self.config.agent_timeout.as_secs()
                        ),
                        executed,
                    };
                }
            };

            self.history.push(ConversationTurn::agent(reply.text.clone(), reply.requested.clone()));

            if reply.requested.is_empty() {
                return ConversationOutcome::Done { reply: reply.text, executed };
            }

            for (index, request) in reply.requested.iter().enumerate() {
                if executed >= cap {
                    // The rest of the batch is surfaced, never silently
                    // dropped and never executed.
                    return ConversationOutcome::IterationLimitReached {
                        executed,
                        pending: reply.requested[index..].to_vec(),
                    };
                }
                if cancel.is_cancelled() {
                    return ConversationOutcome::Cancelled { executed };
                }

                let result = self.execute_with_timeout(request).await;
                executed += 1;
                self.push_operation_outcome(&result);
            }

            self.truncate_history();

            if executed >= cap {
                return ConversationOutcome::IterationLimitReached { executed, pending: Vec::new() };
            }
        }
    }

    async fn execute_with_timeout(&self, request: &OperationRequest) -> OperationResult {
        match timeout(
            self.config.operation_timeout,
            self.executor.execute(&request.name, request.arguments.clone()),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => OperationResult::error(
                &request.name,
                json!({
                    "error": "operation_timeout",
                    "message": format!(
                        "operation exceeded {}s",
                        self.config.operation_timeout.as_secs()
                    ),
                }),
            ),
        }
    }

    fn push_operation_outcome(&mut self, result: &OperationResult) {
        let content = serde_json::to_string(result)
            .unwrap_or_else(|_| format!("unserializable result for {}", result.name));
        self.history.push(ConversationTurn::operation_outcome(content));
    }

    /// Evicts the oldest turns; called only between rounds so a mid-iteration
    /// round always sees its own results.
    fn truncate_history(&mut self) {
        let max = self.config.max_history_turns;
        if self.history.len() > max {
            let excess = self.history.len() - max;
            self.history.drain(..excess);
        }
    }
}

#[cfg(test)]
mod tests;
