//! Core domain models for the deploy agent
//!
//! This module defines the configuration, stages, task groups and the
//! per-run state that the execution layer operates on.

pub mod branch;
pub mod config;
pub mod context;
pub mod error;
pub mod stage;
pub mod state;
pub mod steps;

pub use branch::*;
pub use context::*;
pub use error::*;
pub use stage::*;
pub use state::*;
pub use steps::*;
