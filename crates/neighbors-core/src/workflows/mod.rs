//! # Workflows Module
//!
//! Corpus-level operations built on the per-entry engine.
//!
//! - **Batch store** ([`store`]) - generates neighbor results for a whole
//!   corpus on a worker pool, incrementally or from scratch, and persists them
//!   as one versioned artifact with constant-time accessors.
//! - **Artifact sync** ([`sync`]) - bundles the persisted store and backs it
//!   up to, or restores it from, a rotation channel and a versioned channel.
//! - **Operation registry** ([`registry`]) - named update, backup, restore and
//!   convert steps run against a shared [`registry::WorkflowContext`].

pub mod registry;
pub mod store;
pub mod sync;
