// SPDX-FileCopyrightText: 2026 Pinax contributors
// SPDX-License-Identifier: MIT

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::container::{Container, ContainerView};
use super::ids::ElementId;

/// Canvas dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanvasSize {
    pub width: i32,
    pub height: i32,
}

impl CanvasSize {
    pub const MIN_DIMENSION: i32 = 200;
    pub const MAX_DIMENSION: i32 = 5000;

    pub fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    /// Whether both axes fall within the resize range.
    ///
    /// Only resize enforces this; the default size is valid by construction.
    pub fn in_resize_range(&self) -> bool {
        let range = Self::MIN_DIMENSION..=Self::MAX_DIMENSION;
        range.contains(&self.width) && range.contains(&self.height)
    }

    pub fn area(&self) -> i64 {
        i64::from(self.width) * i64::from(self.height)
    }
}

impl Default for CanvasSize {
    fn default() -> Self {
        Self { width: 800, height: 600 }
    }
}

/// Behavior settings applied to mutations unless overridden per operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanvasSettings {
    pub auto_adjust: bool,
    pub avoid_overlap: bool,
}

impl Default for CanvasSettings {
    fn default() -> Self {
        Self { auto_adjust: true, avoid_overlap: true }
    }
}

/// The single authoritative canvas state.
///
/// Owned exclusively by the store; every mutation passes through it and bumps
/// `last_updated_ms`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanvasState {
    containers: BTreeMap<ElementId, Container>,
    size: CanvasSize,
    settings: CanvasSettings,
    last_updated_ms: u64,
    next_seq: u64,
}

impl CanvasState {
    pub fn new(size: CanvasSize, settings: CanvasSettings) -> Self {
        Self { containers: BTreeMap::new(), size, settings, last_updated_ms: 0, next_seq: 0 }
    }

    pub fn containers(&self) -> &BTreeMap<ElementId, Container> {
        &self.containers
    }

    pub fn containers_mut(&mut self) -> &mut BTreeMap<ElementId, Container> {
        &mut self.containers
    }

    /// Containers in insertion order (ascending `seq`).
    pub fn ordered_containers(&self) -> Vec<&Container> {
        let mut ordered = self.containers.values().collect::<Vec<_>>();
        ordered.sort_by_key(|container| container.seq());
        ordered
    }

    pub fn size(&self) -> CanvasSize {
        self.size
    }

    pub fn set_size(&mut self, size: CanvasSize) {
        self.size = size;
    }

    pub fn settings(&self) -> CanvasSettings {
        self.settings
    }

    pub fn set_settings(&mut self, settings: CanvasSettings) {
        self.settings = settings;
    }

    pub fn last_updated_ms(&self) -> u64 {
        self.last_updated_ms
    }

    pub fn touch(&mut self, now_ms: u64) {
        self.last_updated_ms = now_ms;
    }

    pub fn allocate_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }

    pub fn snapshot(&self) -> CanvasSnapshot {
        CanvasSnapshot {
            containers: self.ordered_containers().into_iter().map(ContainerView::from).collect(),
            canvas_size: self.size,
            settings: self.settings,
            last_updated_ms: self.last_updated_ms,
        }
    }
}

impl Default for CanvasState {
    fn default() -> Self {
        Self::new(CanvasSize::default(), CanvasSettings::default())
    }
}

/// Consistent, serializable view of the whole canvas.
///
/// Container ordering is insertion order, for display stability only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanvasSnapshot {
    pub containers: Vec<ContainerView>,
    pub canvas_size: CanvasSize,
    pub settings: CanvasSettings,
    pub last_updated_ms: u64,
}
