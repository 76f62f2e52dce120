//! # Core Module
//!
//! Stateless building blocks of the ligand neighbor pipeline.
//!
//! ## Architecture
//!
//! - **Data Models** ([`models`]) - Atom rows, deposited connectivity, neighbor
//!   records and the per-entry result with its indices
//! - **I/O** ([`io`]) - The entry source abstraction and the persisted artifact
//!   codecs
//!
//! Nothing in this layer holds state between calls; the engine and workflow
//! layers build on these types.

pub mod io;
pub mod models;
