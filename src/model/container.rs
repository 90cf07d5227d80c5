// SPDX-FileCopyrightText: 2026 Pinax contributors
// SPDX-License-Identifier: MIT

use serde::{Deserialize, Serialize};

use super::ids::ElementId;

/// An axis-aligned rectangle in canvas coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    pub fn area(&self) -> i64 {
        i64::from(self.width) * i64::from(self.height)
    }
}

/// A container element on the canvas.
///
/// `seq` is the insertion sequence assigned by the store; snapshots and layout
/// assignment order containers by ascending `seq` so that observers see a
/// stable, insertion-ordered view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    id: ElementId,
    rect: Rect,
    seq: u64,
    created_at_ms: u64,
    updated_at_ms: u64,
}

impl Container {
    pub fn new(id: ElementId, rect: Rect, seq: u64, created_at_ms: u64) -> Self {
        Self { id, rect, seq, created_at_ms, updated_at_ms: created_at_ms }
    }

    pub fn id(&self) -> &ElementId {
        &self.id
    }

    pub fn rect(&self) -> Rect {
        self.rect
    }

    pub fn set_rect(&mut self, rect: Rect, updated_at_ms: u64) {
        self.rect = rect;
        self.updated_at_ms = updated_at_ms;
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn created_at_ms(&self) -> u64 {
        self.created_at_ms
    }

    pub fn updated_at_ms(&self) -> u64 {
        self.updated_at_ms
    }
}

/// Serializable view of a container, as exposed to observers and callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerView {
    pub id: String,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
}

impl From<&Container> for ContainerView {
    fn from(container: &Container) -> Self {
        let rect = container.rect();
        Self {
            id: container.id().as_str().to_owned(),
            x: rect.x,
            y: rect.y,
            width: rect.width,
            height: rect.height,
            created_at_ms: container.created_at_ms(),
            updated_at_ms: container.updated_at_ms(),
        }
    }
}
