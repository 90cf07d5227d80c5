// SPDX-FileCopyrightText: 2026 Pinax contributors
// SPDX-License-Identifier: MIT

//! Core data model: containers, canvas state, identifiers, conversation turns.

mod canvas;
mod container;
mod ids;
mod turn;

pub use canvas::{CanvasSettings, CanvasSize, CanvasSnapshot, CanvasState};
pub use container::{Container, ContainerView, Rect};
pub use ids::{
    normalize_id, ElementCategory, ElementId, IdCheck, IdError, IdRegistry, SUGGESTION_LIMIT,
};
pub use turn::{ConversationTurn, OperationRequest, OperationResult, OperationStatus, Role};
