// SPDX-FileCopyrightText: 2026 Pinax contributors
// SPDX-License-Identifier: MIT

//! Geometry engine: bounds clamping, overlap tests, free-position search, and
//! the grid-based optimal layout.
//!
//! Everything here is pure and deterministic for fixed inputs; callers own all
//! state and policy.

use crate::model::{CanvasSize, ElementId, Rect};

/// Minimum coarse-scan step for the free-position search.
const COARSE_STEP_MIN: i32 = 20;
/// Coarse step as a fraction of the smaller canvas dimension (5%).
const COARSE_STEP_PERCENT: i32 = 5;
/// Fine-scan step once a coarse-feasible region is found.
const FINE_STEP: i32 = 5;
/// Minimum layout padding per axis.
const PADDING_MIN: i32 = 10;
/// Padding as a fraction of the axis dimension (2%).
const PADDING_PERCENT: i32 = 2;
/// Minimum grid cell side.
const MIN_CELL_SIDE: i32 = 50;

/// A position on the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Shrinks `rect` to fit the canvas, then shifts it fully inside
/// `[0, width) x [0, height)`. Total for canvases with positive dimensions.
pub fn clamp_to_bounds(rect: Rect, size: CanvasSize) -> Rect {
    let width = rect.width.clamp(1, size.width.max(1));
    let height = rect.height.clamp(1, size.height.max(1));
    let x = rect.x.clamp(0, (size.width - width).max(0));
    let y = rect.y.clamp(0, (size.height - height).max(0));
    Rect { x, y, width, height }
}

/// Whether `rect` lies entirely within the canvas with positive dimensions.
pub fn within_bounds(rect: Rect, size: CanvasSize) -> bool {
    rect.width > 0
        && rect.height > 0
        && rect.x >= 0
        && rect.y >= 0
        && rect.right() <= size.width
        && rect.bottom() <= size.height
}

/// Axis-aligned intersection with non-zero area; touching edges do not count.
pub fn overlaps(a: Rect, b: Rect) -> bool {
    a.x < b.right() && b.x < a.right() && a.y < b.bottom() && b.y < a.bottom()
}

/// Finds a position for a `width` x `height` rectangle that overlaps none of
/// `existing` and stays in bounds.
///
/// The exact `preferred` position (clamped; `(0,0)` when absent) is tried
/// first. After that a coarse row-major grid scan runs, refined to a 5px grid
/// over the band ending at the first coarse hit; the first feasible candidate
/// in that order wins, so ties resolve to lowest y, then lowest x. Identical
/// inputs always yield the identical position.
pub fn find_non_overlapping_position(
    width: i32,
    height: i32,
    canvas: CanvasSize,
    existing: &[Rect],
    preferred: Option<Point>,
) -> Option<Point> {
    if width <= 0 || height <= 0 {
        return None;
    }
    let max_x = canvas.width - width;
    let max_y = canvas.height - height;
    if max_x < 0 || max_y < 0 {
        return None;
    }

    let fits = |x: i32, y: i32| {
        let candidate = Rect { x, y, width, height };
        existing.iter().all(|rect| !overlaps(candidate, *rect))
    };

    let preferred = preferred.unwrap_or(Point::new(0, 0));
    let seed = Point::new(preferred.x.clamp(0, max_x), preferred.y.clamp(0, max_y));
    if fits(seed.x, seed.y) {
        return Some(seed);
    }

    let coarse = coarse_step(canvas);
    let mut y = 0;
    while y <= max_y {
        let mut x = 0;
        while x <= max_x {
            if fits(x, y) {
                return Some(refine(x, y, coarse, max_x, &fits));
            }
            x += coarse;
        }
        y += coarse;
    }

    None
}

fn coarse_step(canvas: CanvasSize) -> i32 {
    let smaller = canvas.width.min(canvas.height);
    (smaller * COARSE_STEP_PERCENT / 100).max(COARSE_STEP_MIN)
}

/// Fine row-major scan over the band ending at the coarse hit `(cx, cy)`.
/// Falls back to the coarse hit itself when the fine grid misses it.
fn refine(cx: i32, cy: i32, coarse: i32, max_x: i32, fits: &impl Fn(i32, i32) -> bool) -> Point {
    let band_top = (cy - coarse + FINE_STEP).max(0);
    let mut y = band_top;
    while y <= cy {
        let mut x = 0;
        while x <= max_x {
            if fits(x, y) {
                return Point::new(x, y);
            }
            x += FINE_STEP;
        }
        y += FINE_STEP;
    }
    Point::new(cx, cy)
}

/// The computed grid layout: one uniform cell per container, in the order the
/// containers were supplied.
#[derive(Debug, Clone, PartialEq)]
pub struct GridLayout {
    pub positions: Vec<(ElementId, Rect)>,
    pub cols: usize,
    pub rows: usize,
    pub utilization: f64,
}

impl GridLayout {
    pub fn empty() -> Self {
        Self { positions: Vec::new(), cols: 0, rows: 0, utilization: 0.0 }
    }
}

/// Computes the optimal grid layout for `ordered` containers.
///
/// `cols = ceil(sqrt(n))`, `rows = ceil(n / cols)`; padding per axis is
/// `max(10, 2%)` of that axis; the available space splits into uniform cells
/// (min side 50). Cells are assigned in the supplied order, so the function is
/// idempotent: re-running it on its own output yields the same positions.
pub fn calculate_optimal_layout(ordered: &[ElementId], canvas: CanvasSize) -> GridLayout {
    let n = ordered.len();
    if n == 0 {
        return GridLayout::empty();
    }

    let cols = (n as f64).sqrt().ceil() as usize;
    let rows = n.div_ceil(cols);

    let pad_x = axis_padding(canvas.width);
    let pad_y = axis_padding(canvas.height);
    let available_w = (canvas.width - 2 * pad_x).max(0);
    let available_h = (canvas.height - 2 * pad_y).max(0);
    let cell_w = (available_w / cols as i32).max(MIN_CELL_SIDE);
    let cell_h = (available_h / rows as i32).max(MIN_CELL_SIDE);

    let positions = ordered
        .iter()
        .enumerate()
        .map(|(index, id)| {
            let col = (index % cols) as i32;
            let row = (index / cols) as i32;
            let rect = Rect {
                x: pad_x + col * cell_w,
                y: pad_y + row * cell_h,
                width: cell_w,
                height: cell_h,
            };
            (id.clone(), rect)
        })
        .collect::<Vec<_>>();

    let occupied: i64 = positions.iter().map(|(_, rect)| rect.area()).sum();
    let utilization = occupied as f64 / canvas.area() as f64;

    GridLayout { positions, cols, rows, utilization }
}

fn axis_padding(axis: i32) -> i32 {
    (axis * PADDING_PERCENT / 100).max(PADDING_MIN)
}
