//! A3S Forge Runtime - build context packing and build service client.
//!
//! This crate packs build contexts and config layers into deterministic
//! tar+gzip archives, enforces layer size budgets, and talks to the remote
//! build service with retries and completion polling.

#![allow(clippy::result_large_err)]

pub mod client;
pub mod pack;

// Re-export common types
pub use client::{AwaitDecision, ForgeClient, SubmitOutcome};
pub use client::{BuildService, HttpBuildService};
pub use client::{CancelHandle, CancelSignal, CompletionPoller, PollOutcome, PollState};
pub use pack::{check_aggregate, check_layer, LayerBudget};
pub use pack::{IgnoreFilter, IgnoreRule, LayerLocation, LayerSet, PackedLayer, Packer};

/// A3S Forge Runtime version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
