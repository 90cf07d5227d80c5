// SPDX-FileCopyrightText: 2026 Pinax contributors
// SPDX-License-Identifier: MIT

//! The canvas store: the single source of truth for canvas state.
//!
//! The store is synchronous and holds no lock of its own; the executor wraps
//! it in one mutex so that structural cycles never interleave. Identifier
//! registration commits together with the map mutation: register after insert,
//! release inside delete, and never on a failed path.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::layout::{clamp_to_bounds, find_non_overlapping_position, within_bounds, Point};
use crate::model::{
    CanvasSettings, CanvasSize, CanvasSnapshot, CanvasState, Container, ElementCategory, ElementId,
    IdRegistry, Rect,
};

pub fn now_millis() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or(0)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    DuplicateId { id: ElementId },
    NotFound { id: ElementId },
    BoundsInvalid { rect: Rect, canvas: CanvasSize },
    SizeOutOfRange { width: i32, height: i32 },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateId { id } => write!(f, "container id already exists (id={id})"),
            Self::NotFound { id } => write!(f, "container not found (id={id})"),
            Self::BoundsInvalid { rect, canvas } => write!(
                f,
                "rect out of bounds (x={}, y={}, w={}, h={}, canvas={}x{})",
                rect.x, rect.y, rect.width, rect.height, canvas.width, canvas.height
            ),
            Self::SizeOutOfRange { width, height } => write!(
                f,
                "canvas size out of range (requested {width}x{height}, allowed {}..={} per axis)",
                CanvasSize::MIN_DIMENSION,
                CanvasSize::MAX_DIMENSION
            ),
        }
    }
}

impl std::error::Error for StoreError {}

/// Where a container ended up and whether overlap avoidance held.
///
/// `overlap_avoided` is `false` when avoidance was requested but no free slot
/// existed; placement still succeeds at the clamped position in that case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlacementOutcome {
    pub rect: Rect,
    pub overlap_avoided: bool,
}

/// Pre-cycle snapshot used for batch rollback.
///
/// Captures the whole state and the registry so a restore leaves no trace of
/// a failed cycle (including ids that were registered mid-cycle).
#[derive(Debug, Clone)]
pub struct CanvasCheckpoint {
    state: CanvasState,
    registry: IdRegistry,
}

/// Owns [`CanvasState`] and the [`IdRegistry`]; every mutation passes through
/// here and bumps `last_updated`.
#[derive(Debug)]
pub struct CanvasStore {
    state: CanvasState,
    registry: IdRegistry,
    clock: fn() -> u64,
}

impl CanvasStore {
    pub fn new(size: CanvasSize, settings: CanvasSettings) -> Self {
        Self { state: CanvasState::new(size, settings), registry: IdRegistry::new(), clock: now_millis }
    }

    /// Test seam: replaces the wall clock.
    pub fn with_clock(mut self, clock: fn() -> u64) -> Self {
        self.clock = clock;
        self
    }

    pub fn state(&self) -> &CanvasState {
        &self.state
    }

    pub fn registry(&self) -> &IdRegistry {
        &self.registry
    }

    pub fn snapshot(&self) -> CanvasSnapshot {
        self.state.snapshot()
    }

    pub fn container_count(&self) -> usize {
        self.state.containers().len()
    }

    /// Container ids in insertion order, the order layout assignment uses.
    pub fn ordered_ids(&self) -> Vec<ElementId> {
        self.state.ordered_containers().iter().map(|container| (*container).id().clone()).collect()
    }

    pub fn get_container(&self, id: &ElementId) -> Option<&Container> {
        self.state.containers().get(id)
    }

    /// Creates a container. The id must already be validated and unused.
    ///
    /// With `auto_adjust` the rect is clamped into bounds first; otherwise an
    /// out-of-bounds rect is rejected. With `avoid_overlap` a free position is
    /// searched, seeded with the requested position; when none exists the
    /// container is still created at the clamped position and the outcome
    /// reports that avoidance failed.
    pub fn create_container(
        &mut self,
        id: ElementId,
        rect: Rect,
        auto_adjust: bool,
        avoid_overlap: bool,
    ) -> Result<PlacementOutcome, StoreError> {
        if self.state.containers().contains_key(&id) {
            return Err(StoreError::DuplicateId { id });
        }

        let outcome = self.adjusted_placement(rect, auto_adjust, avoid_overlap, None)?;

        let now = (self.clock)();
        let seq = self.state.allocate_seq();
        let container = Container::new(id.clone(), outcome.rect, seq, now);
        self.state.containers_mut().insert(id.clone(), container);
        self.state.touch(now);
        self.registry.register(&id, ElementCategory::Container);
        Ok(outcome)
    }

    /// Moves/resizes an existing container through the same adjustment
    /// pipeline as creation, excluding the container itself from overlap
    /// checks.
    pub fn modify_container(
        &mut self,
        id: &ElementId,
        rect: Rect,
        auto_adjust: bool,
        avoid_overlap: bool,
    ) -> Result<PlacementOutcome, StoreError> {
        if !self.state.containers().contains_key(id) {
            return Err(StoreError::NotFound { id: id.clone() });
        }

        let outcome = self.adjusted_placement(rect, auto_adjust, avoid_overlap, Some(id))?;

        let now = (self.clock)();
        let container = self
            .state
            .containers_mut()
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound { id: id.clone() })?;
        container.set_rect(outcome.rect, now);
        self.state.touch(now);
        Ok(outcome)
    }

    pub fn delete_container(&mut self, id: &ElementId) -> Result<(), StoreError> {
        if self.state.containers_mut().remove(id).is_none() {
            return Err(StoreError::NotFound { id: id.clone() });
        }
        self.registry.release(id, ElementCategory::Container);
        let now = (self.clock)();
        self.state.touch(now);
        Ok(())
    }

    /// Resizes the canvas. Existing containers are not moved by this call;
    /// re-layout is a separate, explicit step so the two stay independently
    /// testable and composable.
    pub fn resize_canvas(&mut self, size: CanvasSize) -> Result<(), StoreError> {
        if !size.in_resize_range() {
            return Err(StoreError::SizeOutOfRange { width: size.width, height: size.height });
        }
        self.state.set_size(size);
        let now = (self.clock)();
        self.state.touch(now);
        Ok(())
    }

    /// Empties the container map and releases every container id.
    pub fn clear(&mut self) -> usize {
        let cleared = self.state.containers().len();
        self.state.containers_mut().clear();
        self.registry.release_category(ElementCategory::Container);
        let now = (self.clock)();
        self.state.touch(now);
        cleared
    }

    /// Layout-batch primitive: positions a container in its grid cell,
    /// shrinking it to the cell when it would not fit.
    ///
    /// The fitted rect is clamped into canvas bounds afterwards: the minimum
    /// cell side can push trailing grid cells past the edge of a small canvas,
    /// and committed state must never leave the canvas.
    pub fn apply_layout_rect(&mut self, id: &ElementId, cell: Rect) -> Result<(), StoreError> {
        let canvas = self.state.size();
        let now = (self.clock)();
        let container = self
            .state
            .containers_mut()
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound { id: id.clone() })?;
        let current = container.rect();
        let fitted = Rect {
            x: cell.x,
            y: cell.y,
            width: current.width.min(cell.width),
            height: current.height.min(cell.height),
        };
        let fitted = clamp_to_bounds(fitted, canvas);
        container.set_rect(fitted, now);
        self.state.touch(now);
        Ok(())
    }

    pub fn checkpoint(&self) -> CanvasCheckpoint {
        CanvasCheckpoint { state: self.state.clone(), registry: self.registry.clone() }
    }

    /// Restores the pre-cycle snapshot; used when a layout batch fails
    /// part-way so callers can tell "nothing changed" from "some moved".
    pub fn restore(&mut self, checkpoint: CanvasCheckpoint) {
        self.state = checkpoint.state;
        self.registry = checkpoint.registry;
    }

    fn adjusted_placement(
        &self,
        rect: Rect,
        auto_adjust: bool,
        avoid_overlap: bool,
        exclude: Option<&ElementId>,
    ) -> Result<PlacementOutcome, StoreError> {
        let canvas = self.state.size();
        let adjusted = if auto_adjust {
            clamp_to_bounds(rect, canvas)
        } else {
            if !within_bounds(rect, canvas) {
                return Err(StoreError::BoundsInvalid { rect, canvas });
            }
            rect
        };

        let others = self
            .state
            .containers()
            .iter()
            .filter(|(id, _)| exclude != Some(*id))
            .map(|(_, container)| container.rect())
            .collect::<Vec<_>>();

        if !avoid_overlap || others.is_empty() {
            return Ok(PlacementOutcome { rect: adjusted, overlap_avoided: true });
        }

        match find_non_overlapping_position(
            adjusted.width,
            adjusted.height,
            canvas,
            &others,
            Some(Point::new(adjusted.x, adjusted.y)),
        ) {
            Some(point) => Ok(PlacementOutcome {
                rect: Rect { x: point.x, y: point.y, ..adjusted },
                overlap_avoided: true,
            }),
            // No free slot: keep the clamped position, creation still succeeds.
            None => Ok(PlacementOutcome { rect: adjusted, overlap_avoided: false }),
        }
    }
}

impl Default for CanvasStore {
    fn default() -> Self {
        Self::new(CanvasSize::default(), CanvasSettings::default())
    }
}
