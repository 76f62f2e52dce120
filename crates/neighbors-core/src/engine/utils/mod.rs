//! Utility functions for the engine module.
//!
//! Currently this holds the spatial index used for ligand-to-target
//! proximity queries.

pub mod spatial;
