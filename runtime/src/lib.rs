// Copyright 2026 Rankwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Rankwatch runtime library: search-rank locator with direct/proxy failover.
//!
//! This library crate exposes the core modules for the binary and for
//! integration testing.

#![allow(clippy::new_without_default)]

pub mod agent;
pub mod api;
pub mod audit;
pub mod backoff;
pub mod classify;
pub mod cli;
pub mod config;
pub mod error;
pub mod host;
pub mod locator;
pub mod model;
pub mod renderer;
pub mod resilience;
pub mod shutdown;
