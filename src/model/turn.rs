// SPDX-FileCopyrightText: 2026 Pinax contributors
// SPDX-License-Identifier: MIT

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Who produced a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Agent,
    OperationOutcome,
}

/// One turn in a conversation; operation outcomes are turns too, so the agent
/// sees execution results on its next round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requested: Vec<OperationRequest>,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into(), requested: Vec::new() }
    }

    pub fn agent(content: impl Into<String>, requested: Vec<OperationRequest>) -> Self {
        Self { role: Role::Agent, content: content.into(), requested }
    }

    pub fn operation_outcome(content: impl Into<String>) -> Self {
        Self { role: Role::OperationOutcome, content: content.into(), requested: Vec::new() }
    }
}

/// A single operation requested by the agent. Ephemeral, never persisted
/// beyond the turn that carries it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationRequest {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    Success,
    Error,
}

/// The outcome of executing one operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationResult {
    pub name: String,
    pub status: OperationStatus,
    pub detail: Value,
}

impl OperationResult {
    pub fn success(name: impl Into<String>, detail: Value) -> Self {
        Self { name: name.into(), status: OperationStatus::Success, detail }
    }

    pub fn error(name: impl Into<String>, detail: Value) -> Self {
        Self { name: name.into(), status: OperationStatus::Error, detail }
    }

    pub fn is_success(&self) -> bool {
        self.status == OperationStatus::Success
    }
}
