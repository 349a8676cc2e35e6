//! # kiln - a tiny asset pipeline for static sites
//!
//! kiln takes the handful of chores every hand-rolled site needs and runs
//! them as one pipeline: compile Sass, bundle and minify JavaScript,
//! stamp fresh cache-bust tokens into the page, and tell the browser to
//! reload.
//!
//! ## Pipeline
//!
//! Styles and scripts build in parallel; the cache-bust stamp waits for
//! both, and the reload signal fires only after a fully successful run:
//!
//! ```text
//! (styles | scripts) -> cache-bust -> reload
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! # Create a new site
//! kiln new mysite
//!
//! # Build, watch, and serve with live reload
//! kiln serve
//! ```
//!
//! ## Module Organization
//!
//! - [`build`] - the scheduler: pipeline steps, cache-busting, watching
//! - [`config`] - configuration parsing (`kiln.toml`)
//! - [`serve`] - dev server with WebSocket live reload
//! - [`sources`] - source group scanning
//! - [`templates`] - starter site for `kiln new`

/// Build scheduler: parallel steps, cache-bust stamping, watch loop.
pub mod build;

/// Configuration file parsing (`kiln.toml`).
pub mod config;

/// Development server with live reload.
pub mod serve;

/// Source file discovery and grouping.
pub mod sources;

/// Starter site scaffolding.
pub mod templates;

/// Terminal UI utilities (tables, byte formatting).
pub mod ui;
