// SPDX-FileCopyrightText: 2026 Pinax contributors
// SPDX-License-Identifier: MIT

//! Pinax — coordination core for an agent-driven shared 2D canvas.
//!
//! The crate is layered bottom-up: `model` holds the plain data types,
//! `layout` the pure geometry, `store` the single-writer canvas state,
//! `hub` the observer fan-out, `ops` the named-operation executor, and
//! `agent` the bounded conversation loop that drives the executor.

pub mod agent;
pub mod hub;
pub mod layout;
pub mod model;
pub mod ops;
pub mod store;
