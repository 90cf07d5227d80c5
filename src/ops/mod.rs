// SPDX-FileCopyrightText: 2026 Pinax contributors
// SPDX-License-Identifier: MIT

//! Named-operation dispatch against the canvas store.
//!
//! The executor is the only layer that turns geometry/registry conflicts into
//! the error taxonomy. Structural operations run the re-layout cycle:
//! snapshot, validate, mutate, recompute the grid layout over the
//! post-mutation set, apply it as a tracked batch (full rollback on any
//! failure), then broadcast one event carrying the complete new snapshot.
//! `modify_container` is deliberately not structural: it changes neither the
//! container set nor the canvas size, and re-gridding would discard the
//! caller's requested geometry, so it runs the placement pipeline and
//! broadcasts without the grid cycle.

use std::fmt;
use std::sync::Arc;

use schemars::{schema_for, JsonSchema};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::hub::{CanvasEvent, ObserverHub, ObserverId};
use crate::layout::{calculate_optimal_layout, GridLayout};
use crate::model::{
    normalize_id, CanvasSize, CanvasSnapshot, ContainerView, ElementCategory, ElementId, IdCheck,
    OperationResult, Rect,
};
use crate::store::{CanvasStore, PlacementOutcome, StoreError};

pub const DEFAULT_CONTAINER_WIDTH: i32 = 200;
pub const DEFAULT_CONTAINER_HEIGHT: i32 = 150;

#[derive(Debug, Clone, PartialEq, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct CreateContainerParams {
    /// Proposed container id; normalized (trimmed, lowercased, spaces to
    /// underscores) before the uniqueness check.
    pub id: String,
    #[serde(default)]
    pub x: Option<i32>,
    #[serde(default)]
    pub y: Option<i32>,
    #[serde(default)]
    pub width: Option<i32>,
    #[serde(default)]
    pub height: Option<i32>,
    /// Overrides the canvas `auto_adjust` setting for this call.
    #[serde(default)]
    pub auto_adjust: Option<bool>,
    /// Overrides the canvas `avoid_overlap` setting for this call.
    #[serde(default)]
    pub avoid_overlap: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ModifyContainerParams {
    pub id: String,
    /// Omitted fields keep the container's current geometry.
    #[serde(default)]
    pub x: Option<i32>,
    #[serde(default)]
    pub y: Option<i32>,
    #[serde(default)]
    pub width: Option<i32>,
    #[serde(default)]
    pub height: Option<i32>,
    #[serde(default)]
    pub auto_adjust: Option<bool>,
    #[serde(default)]
    pub avoid_overlap: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct DeleteContainerParams {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct EditCanvasSizeParams {
    pub width: i32,
    pub height: i32,
}

#[derive(Debug, Clone, PartialEq, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct CheckContainerContentParams {
    pub id: String,
}

/// Closed set of operations; unknown names never reach execution.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    CreateContainer(CreateContainerParams),
    ModifyContainer(ModifyContainerParams),
    DeleteContainer(DeleteContainerParams),
    ClearCanvas,
    GetCanvasState,
    GetCanvasSize,
    EditCanvasSize(EditCanvasSizeParams),
    GetCanvasSettings,
    CheckContainerContent(CheckContainerContentParams),
    TakeScreenshot,
}

pub const OPERATION_NAMES: [&str; 10] = [
    "create_container",
    "modify_container",
    "delete_container",
    "clear_canvas",
    "get_canvas_state",
    "get_canvas_size",
    "edit_canvas_size",
    "get_canvas_settings",
    "check_container_content",
    "take_screenshot",
];

/// Parses a named request into the closed [`Operation`] set.
pub fn parse_request(name: &str, arguments: Value) -> Result<Operation, ExecError> {
    fn params<P: for<'de> Deserialize<'de>>(name: &str, arguments: Value) -> Result<P, ExecError> {
        serde_json::from_value(arguments).map_err(|err| ExecError::Validation {
            message: format!("invalid arguments for {name}: {err}"),
        })
    }

    match name {
        "create_container" => Ok(Operation::CreateContainer(params(name, arguments)?)),
        "modify_container" => Ok(Operation::ModifyContainer(params(name, arguments)?)),
        "delete_container" => Ok(Operation::DeleteContainer(params(name, arguments)?)),
        "clear_canvas" => Ok(Operation::ClearCanvas),
        "get_canvas_state" => Ok(Operation::GetCanvasState),
        "get_canvas_size" => Ok(Operation::GetCanvasSize),
        "edit_canvas_size" => Ok(Operation::EditCanvasSize(params(name, arguments)?)),
        "get_canvas_settings" => Ok(Operation::GetCanvasSettings),
        "check_container_content" => Ok(Operation::CheckContainerContent(params(name, arguments)?)),
        "take_screenshot" => Ok(Operation::TakeScreenshot),
        other => Err(ExecError::UnknownOperation { name: other.to_owned() }),
    }
}

/// One entry of the operation catalog handed to the agent collaborator.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct OperationSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Value,
}

fn schema_value<P: JsonSchema>() -> Value {
    serde_json::to_value(schema_for!(P)).unwrap_or_else(|_| json!({"type": "object"}))
}

fn empty_schema() -> Value {
    json!({"type": "object", "properties": {}})
}

/// The operations the agent may request, with parameter schemas.
pub fn operation_catalog() -> Vec<OperationSpec> {
    vec![
        OperationSpec {
            name: "create_container",
            description: "Create a container; position/size are optional and the canvas re-optimizes its layout afterwards",
            parameters: schema_value::<CreateContainerParams>(),
        },
        OperationSpec {
            name: "modify_container",
            description: "Move or resize an existing container; omitted fields keep current values",
            parameters: schema_value::<ModifyContainerParams>(),
        },
        OperationSpec {
            name: "delete_container",
            description: "Delete a container by id; remaining containers are re-laid out",
            parameters: schema_value::<DeleteContainerParams>(),
        },
        OperationSpec {
            name: "clear_canvas",
            description: "Remove every container from the canvas",
            parameters: empty_schema(),
        },
        OperationSpec {
            name: "get_canvas_state",
            description: "Read the full canvas snapshot (containers, size, settings)",
            parameters: empty_schema(),
        },
        OperationSpec {
            name: "get_canvas_size",
            description: "Read the canvas dimensions",
            parameters: empty_schema(),
        },
        OperationSpec {
            name: "edit_canvas_size",
            description: "Resize the canvas (200-5000 per axis) and re-lay out existing containers",
            parameters: schema_value::<EditCanvasSizeParams>(),
        },
        OperationSpec {
            name: "get_canvas_settings",
            description: "Read the canvas behavior settings",
            parameters: empty_schema(),
        },
        OperationSpec {
            name: "check_container_content",
            description: "Check whether a container exists and read its geometry",
            parameters: schema_value::<CheckContainerContentParams>(),
        },
        OperationSpec {
            name: "take_screenshot",
            description: "Capture the current canvas state as an artifact reference",
            parameters: empty_schema(),
        },
    ]
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExecError {
    Validation { message: String },
    DuplicateIdentifier { id: ElementId, suggestions: Vec<String>, existing: Vec<String> },
    NotFound { id: ElementId, known: Vec<String> },
    BoundsInvalid { rect: Rect, canvas: CanvasSize },
    SizeOutOfRange { width: i32, height: i32 },
    LayoutRollback { applied: Vec<ElementId>, failed: ElementId, reason: String },
    UnknownOperation { name: String },
    Internal { message: String },
}

impl ExecError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation_error",
            Self::DuplicateIdentifier { .. } => "duplicate_identifier",
            Self::NotFound { .. } => "not_found",
            Self::BoundsInvalid { .. } => "bounds_invalid",
            Self::SizeOutOfRange { .. } => "size_out_of_range",
            Self::LayoutRollback { .. } => "layout_rollback",
            Self::UnknownOperation { .. } => "unknown_operation",
            Self::Internal { .. } => "internal_error",
        }
    }

    /// Structured detail enabling an intelligent retry without re-querying.
    pub fn to_detail(&self) -> Value {
        let mut detail = json!({
            "error": self.kind(),
            "message": self.to_string(),
        });
        let extra = match self {
            Self::Validation { .. } | Self::Internal { .. } => json!({}),
            Self::DuplicateIdentifier { id, suggestions, existing } => json!({
                "id": id.as_str(),
                "suggestions": suggestions,
                "existing_ids": existing,
            }),
            Self::NotFound { id, known } => json!({
                "id": id.as_str(),
                "known_ids": known,
            }),
            Self::BoundsInvalid { rect, canvas } => json!({
                "rect": rect,
                "canvas_size": canvas,
            }),
            Self::SizeOutOfRange { width, height } => json!({
                "requested": { "width": width, "height": height },
                "min_dimension": CanvasSize::MIN_DIMENSION,
                "max_dimension": CanvasSize::MAX_DIMENSION,
            }),
            Self::LayoutRollback { applied, failed, reason } => json!({
                "applied_ids": applied.iter().map(|id| id.as_str()).collect::<Vec<_>>(),
                "failed_id": failed.as_str(),
                "reason": reason,
                "state_restored": true,
            }),
            Self::UnknownOperation { name } => json!({
                "name": name,
                "known_operations": OPERATION_NAMES,
            }),
        };
        if let (Value::Object(detail), Value::Object(extra)) = (&mut detail, extra) {
            detail.extend(extra);
        }
        detail
    }

    pub fn into_result(self, name: &str) -> OperationResult {
        OperationResult::error(name, self.to_detail())
    }
}

impl fmt::Display for ExecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation { message } => f.write_str(message),
            Self::DuplicateIdentifier { id, .. } => {
                write!(f, "identifier already in use (id={id})")
            }
            Self::NotFound { id, .. } => write!(f, "container not found (id={id})"),
            Self::BoundsInvalid { rect, canvas } => write!(
                f,
                "rect out of bounds (x={}, y={}, w={}, h={}, canvas={}x{})",
                rect.x, rect.y, rect.width, rect.height, canvas.width, canvas.height
            ),
            Self::SizeOutOfRange { width, height } => {
                write!(f, "canvas size out of range ({width}x{height})")
            }
            Self::LayoutRollback { failed, .. } => {
                write!(f, "layout batch failed, state restored (failed_id={failed})")
            }
            Self::UnknownOperation { name } => write!(f, "unknown operation '{name}'"),
            Self::Internal { message } => write!(f, "internal error: {message}"),
        }
    }
}

impl std::error::Error for ExecError {}

fn store_error(err: StoreError) -> ExecError {
    match err {
        StoreError::DuplicateId { id } => {
            // Normally caught by registry validation first.
            ExecError::DuplicateIdentifier { id, suggestions: Vec::new(), existing: Vec::new() }
        }
        StoreError::NotFound { id } => ExecError::NotFound { id, known: Vec::new() },
        StoreError::BoundsInvalid { rect, canvas } => ExecError::BoundsInvalid { rect, canvas },
        StoreError::SizeOutOfRange { width, height } => {
            ExecError::SizeOutOfRange { width, height }
        }
    }
}

/// Screenshot collaborator: turns a state snapshot into an opaque artifact
/// reference. The core never inspects the artifact.
pub trait Screenshotter: Send + Sync {
    fn capture(&self, snapshot: &CanvasSnapshot) -> Result<String, CaptureError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureError {
    message: String,
}

impl CaptureError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for CaptureError {}

/// Default collaborator: derives a token from the snapshot, no rendering.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenScreenshotter;

impl Screenshotter for TokenScreenshotter {
    fn capture(&self, snapshot: &CanvasSnapshot) -> Result<String, CaptureError> {
        Ok(format!("canvas-{}-{}", snapshot.last_updated_ms, snapshot.containers.len()))
    }
}

pub(crate) struct LayoutBatchFailure {
    pub applied: Vec<ElementId>,
    pub failed: ElementId,
    pub reason: StoreError,
}

/// Applies recomputed cell rects to every container, tracking each apply so a
/// partial failure can name what succeeded before the rollback.
pub(crate) fn apply_layout_batch(
    store: &mut CanvasStore,
    positions: &[(ElementId, Rect)],
) -> Result<Vec<ElementId>, LayoutBatchFailure> {
    let mut applied = Vec::with_capacity(positions.len());
    for (id, cell) in positions {
        match store.apply_layout_rect(id, *cell) {
            Ok(()) => applied.push(id.clone()),
            Err(reason) => {
                return Err(LayoutBatchFailure { applied, failed: id.clone(), reason });
            }
        }
    }
    Ok(applied)
}

/// Validates and dispatches named operations against the canvas store.
///
/// Holds the single store mutex for the whole structural cycle, including the
/// broadcast, so two cycles can never interleave their snapshot/apply/notify
/// steps. Clones share the same store and hub.
#[derive(Clone)]
pub struct FunctionExecutor {
    store: Arc<Mutex<CanvasStore>>,
    hub: Arc<ObserverHub>,
    screenshots: Arc<dyn Screenshotter>,
}

impl FunctionExecutor {
    pub fn new(store: Arc<Mutex<CanvasStore>>, hub: Arc<ObserverHub>) -> Self {
        Self { store, hub, screenshots: Arc::new(TokenScreenshotter) }
    }

    pub fn with_screenshotter(mut self, screenshots: Arc<dyn Screenshotter>) -> Self {
        self.screenshots = screenshots;
        self
    }

    pub fn store(&self) -> &Arc<Mutex<CanvasStore>> {
        &self.store
    }

    pub fn hub(&self) -> &Arc<ObserverHub> {
        &self.hub
    }

    pub async fn execute(&self, name: &str, arguments: Value) -> OperationResult {
        self.execute_excluding(name, arguments, None).await
    }

    /// Executes one operation; `excluding` suppresses the echo back to the
    /// originating observer. Never panics or raises; every outcome is an
    /// [`OperationResult`].
    pub async fn execute_excluding(
        &self,
        name: &str,
        arguments: Value,
        excluding: Option<ObserverId>,
    ) -> OperationResult {
        let operation = match parse_request(name, arguments) {
            Ok(operation) => operation,
            Err(err) => return err.into_result(name),
        };
        match self.run(operation, excluding).await {
            Ok(detail) => OperationResult::success(name, detail),
            Err(err) => err.into_result(name),
        }
    }

    async fn run(
        &self,
        operation: Operation,
        excluding: Option<ObserverId>,
    ) -> Result<Value, ExecError> {
        match operation {
            Operation::CreateContainer(params) => self.create_container(params, excluding).await,
            Operation::ModifyContainer(params) => self.modify_container(params, excluding).await,
            Operation::DeleteContainer(params) => self.delete_container(params, excluding).await,
            Operation::ClearCanvas => self.clear_canvas(excluding).await,
            Operation::GetCanvasState => {
                let store = self.store.lock().await;
                serde_json::to_value(store.snapshot())
                    .map_err(|err| ExecError::Internal { message: err.to_string() })
            }
            Operation::GetCanvasSize => {
                let store = self.store.lock().await;
                Ok(json!({ "canvas_size": store.state().size() }))
            }
            Operation::GetCanvasSettings => {
                let store = self.store.lock().await;
                Ok(json!({ "settings": store.state().settings() }))
            }
            Operation::EditCanvasSize(params) => self.edit_canvas_size(params, excluding).await,
            Operation::CheckContainerContent(params) => {
                let id = parse_element_id(&params.id)?;
                let store = self.store.lock().await;
                let container = store.get_container(&id).map(ContainerView::from);
                Ok(json!({
                    "id": id.as_str(),
                    "exists": container.is_some(),
                    "container": container,
                }))
            }
            Operation::TakeScreenshot => {
                let store = self.store.lock().await;
                let snapshot = store.snapshot();
                drop(store);
                let artifact = self
                    .screenshots
                    .capture(&snapshot)
                    .map_err(|err| ExecError::Internal { message: err.to_string() })?;
                Ok(json!({ "artifact": artifact }))
            }
        }
    }

    async fn create_container(
        &self,
        params: CreateContainerParams,
        excluding: Option<ObserverId>,
    ) -> Result<Value, ExecError> {
        let mut store = self.store.lock().await;
        let checkpoint = store.checkpoint();

        // Identifier validation happens before any state is touched.
        let id = match store
            .registry()
            .validate(&params.id, ElementCategory::Container)
            .map_err(|err| ExecError::Validation { message: format!("invalid id: {err}") })?
        {
            IdCheck::Ok { id } => id,
            IdCheck::Conflict { conflicting, suggestions, .. } => {
                let existing =
                    store.registry().used_ids().map(str::to_owned).collect::<Vec<_>>();
                return Err(ExecError::DuplicateIdentifier {
                    id: conflicting,
                    suggestions,
                    existing,
                });
            }
        };

        let settings = store.state().settings();
        let rect = Rect::new(
            params.x.unwrap_or(0),
            params.y.unwrap_or(0),
            params.width.unwrap_or(DEFAULT_CONTAINER_WIDTH),
            params.height.unwrap_or(DEFAULT_CONTAINER_HEIGHT),
        );
        let outcome = store
            .create_container(
                id.clone(),
                rect,
                params.auto_adjust.unwrap_or(settings.auto_adjust),
                params.avoid_overlap.unwrap_or(settings.avoid_overlap),
            )
            .map_err(store_error)?;

        let layout = self.relayout_or_rollback(&mut store, checkpoint)?;
        let final_rect = store
            .get_container(&id)
            .map(|container| container.rect())
            .ok_or_else(|| ExecError::Internal { message: "container vanished mid-cycle".into() })?;

        let detail = json!({
            "id": id.as_str(),
            "rect": final_rect,
            "overlap_avoided": outcome.overlap_avoided,
            "layout": layout_summary(&layout),
        });
        self.broadcast_snapshot(&store, excluding).await;
        Ok(detail)
    }

    async fn modify_container(
        &self,
        params: ModifyContainerParams,
        excluding: Option<ObserverId>,
    ) -> Result<Value, ExecError> {
        let id = parse_element_id(&params.id)?;
        let mut store = self.store.lock().await;

        let current = store
            .get_container(&id)
            .map(|container| container.rect())
            .ok_or_else(|| not_found(&store, id.clone()))?;
        let settings = store.state().settings();
        let rect = Rect::new(
            params.x.unwrap_or(current.x),
            params.y.unwrap_or(current.y),
            params.width.unwrap_or(current.width),
            params.height.unwrap_or(current.height),
        );

        let outcome: PlacementOutcome = store
            .modify_container(
                &id,
                rect,
                params.auto_adjust.unwrap_or(settings.auto_adjust),
                params.avoid_overlap.unwrap_or(settings.avoid_overlap),
            )
            .map_err(store_error)?;

        let detail = json!({
            "id": id.as_str(),
            "rect": outcome.rect,
            "overlap_avoided": outcome.overlap_avoided,
        });
        self.broadcast_snapshot(&store, excluding).await;
        Ok(detail)
    }

    async fn delete_container(
        &self,
        params: DeleteContainerParams,
        excluding: Option<ObserverId>,
    ) -> Result<Value, ExecError> {
        let id = parse_element_id(&params.id)?;
        let mut store = self.store.lock().await;
        let checkpoint = store.checkpoint();

        if store.get_container(&id).is_none() {
            // No broadcast on a failed delete.
            return Err(not_found(&store, id));
        }
        store.delete_container(&id).map_err(store_error)?;

        let layout = self.relayout_or_rollback(&mut store, checkpoint)?;
        let detail = json!({
            "deleted_id": id.as_str(),
            "layout": layout_summary(&layout),
        });
        self.broadcast_snapshot(&store, excluding).await;
        Ok(detail)
    }

    async fn clear_canvas(&self, excluding: Option<ObserverId>) -> Result<Value, ExecError> {
        let mut store = self.store.lock().await;
        let cleared = store.clear();
        let detail = json!({ "cleared": cleared });
        self.broadcast_snapshot(&store, excluding).await;
        Ok(detail)
    }

    async fn edit_canvas_size(
        &self,
        params: EditCanvasSizeParams,
        excluding: Option<ObserverId>,
    ) -> Result<Value, ExecError> {
        let mut store = self.store.lock().await;
        let checkpoint = store.checkpoint();

        store
            .resize_canvas(CanvasSize::new(params.width, params.height))
            .map_err(store_error)?;
        let layout = self.relayout_or_rollback(&mut store, checkpoint)?;

        let detail = json!({
            "canvas_size": store.state().size(),
            "layout": layout_summary(&layout),
        });
        self.broadcast_snapshot(&store, excluding).await;
        Ok(detail)
    }

    /// Steps 4-5 of the structural cycle: recompute the grid over the
    /// post-mutation set and apply it as a batch; restore the pre-cycle
    /// checkpoint on any per-container failure.
    fn relayout_or_rollback(
        &self,
        store: &mut CanvasStore,
        checkpoint: crate::store::CanvasCheckpoint,
    ) -> Result<GridLayout, ExecError> {
        let ordered = store.ordered_ids();
        let layout = calculate_optimal_layout(&ordered, store.state().size());
        match apply_layout_batch(store, &layout.positions) {
            Ok(applied) => {
                debug!(containers = applied.len(), "layout batch applied");
                Ok(layout)
            }
            Err(failure) => {
                warn!(
                    failed = %failure.failed,
                    applied = failure.applied.len(),
                    reason = %failure.reason,
                    "layout batch failed, restoring pre-cycle state"
                );
                store.restore(checkpoint);
                Err(ExecError::LayoutRollback {
                    applied: failure.applied,
                    failed: failure.failed,
                    reason: failure.reason.to_string(),
                })
            }
        }
    }

    /// Step 6: one broadcast carrying the complete new layout. The store
    /// guard is still held, so cycles never interleave with their broadcasts.
    async fn broadcast_snapshot(&self, store: &CanvasStore, excluding: Option<ObserverId>) {
        let event = CanvasEvent::CanvasUpdated { snapshot: store.snapshot() };
        let outcome = self.hub.broadcast(&event, excluding).await;
        debug!(delivered = outcome.delivered, pruned = outcome.pruned.len(), "state broadcast");
    }
}

fn parse_element_id(raw: &str) -> Result<ElementId, ExecError> {
    ElementId::new(normalize_id(raw))
        .map_err(|err| ExecError::Validation { message: format!("invalid id: {err}") })
}

fn not_found(store: &CanvasStore, id: ElementId) -> ExecError {
    let known = store.registry().used_ids().map(str::to_owned).collect();
    ExecError::NotFound { id, known }
}

fn layout_summary(layout: &GridLayout) -> Value {
    json!({
        "cols": layout.cols,
        "rows": layout.rows,
        "utilization": layout.utilization,
    })
}
