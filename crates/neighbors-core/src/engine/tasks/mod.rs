//! Per-entry computational steps of the neighbor search.
//!
//! [`atom_pool`] partitions one model's atoms, [`classify`] resolves each
//! contact against deposited connectivity, and [`aggregate`] reduces contacts
//! to residue pairs and builds the lookup indices. [`crate::engine::compute`]
//! chains them for one entry.

pub mod aggregate;
pub mod atom_pool;
pub mod classify;
