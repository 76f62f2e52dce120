//! # Engine Module
//!
//! The per-entry neighbor search and the machinery around it.
//!
//! ## Overview
//!
//! For one entry the engine selects a model, splits its atoms into a target
//! pool and ligand groups, indexes the targets in a k-d tree, queries the
//! nearest targets of every ligand atom, classifies each contact against the
//! deposited connectivity and reduces the contacts to one record per ligand
//! and target residue.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Search parameters, batch and sync settings
//! - **Computation** ([`compute`]) - [`compute::EntryComputer`], the per-entry entry point
//! - **Tasks** ([`tasks`]) - Atom pools, contact classification and aggregation
//! - **Memoization** ([`context`], [`cache`]) - Bounded per-worker caches
//! - **Progress Monitoring** ([`progress`]) - Callback-based progress events
//! - **Error Handling** ([`error`]) - Per-entry computation errors

pub mod cache;
pub mod compute;
pub mod config;
pub mod context;
pub mod error;
pub mod progress;
pub mod tasks;
pub mod utils;
