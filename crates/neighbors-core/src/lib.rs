//! # Ligand Neighbors
//!
//! Detection of contacts between bound ligands and their macromolecular
//! targets, and a persistent, incrementally generated cache of those contacts
//! for a whole structure corpus.
//!
//! ## Architecture
//!
//! - **[`core`]: Data and I/O.** Stateless models for atom sites, deposited
//!   connections and neighbor records, the [`core::io::traits::EntrySource`]
//!   seam through which entries are loaded, and the binary and JSON artifact
//!   codecs.
//!
//! - **[`engine`]: Per-entry computation.** Configuration, the k-d tree
//!   spatial index, atom pool construction, contact classification,
//!   per-residue reduction and index building, all driven by
//!   [`engine::compute::EntryComputer`]. Bounded memo caches live in
//!   [`engine::context::NeighborContext`].
//!
//! - **[`workflows`]: Corpus operations.** The
//!   [`workflows::store::BatchCacheStore`], remote backup and restore through
//!   [`workflows::sync::ArtifactSyncManager`], and the operation registry.

pub mod core;
pub mod engine;
pub mod logging;
pub mod workflows;
