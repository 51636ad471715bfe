//! Center-of-gravity engine and load balance service for a cargo-loading planner.
//!
//! - `model`: placed items, weight resolution and container dimensions
//! - `cg`: weighted centroid and balanced/unbalanced classification
//! - `hud`: overlay values derived from a result
//! - `plan`: layout state driven by planner events
//! - `api`/`config`: HTTP service around the engine

pub mod api;
pub mod cg;
pub mod config;
pub mod hud;
pub mod model;
pub mod plan;
pub mod types;
