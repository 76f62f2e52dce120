//! # Core Models Module
//!
//! Data structures exchanged between the record parser, the contact engine and
//! the persisted neighbor cache.
//!
//! ## Key Components
//!
//! - [`atom`] - Raw coordinate rows ([`atom::AtomSite`]) and resolved pool
//!   records ([`atom::AtomRecord`]) together with instance/polymer typing
//! - [`connection`] - Deposited bonded connectivity and connect types
//! - [`entry`] - The per-entry input bundle and representative model policy
//! - [`neighbor`] - Reduced neighbor records, lookup indices and the per-entry
//!   result stored in the cache
//!
//! ## Usage
//!
//! ```ignore
//! use ligand_neighbors::core::models::{atom::*, entry::EntryData};
//!
//! let mut entry = EntryData::new("9XYZ");
//! entry.add_instance("A", "1", InstanceType::Polymer, Some(PolymerType::Protein));
//! entry.add_instance("C", "2", InstanceType::NonPolymer, None);
//! entry.atom_sites.push(AtomSite::new("1", "A", "LYS", "45", "NZ", Point3::new(0.0, 0.0, 0.0)));
//! ```

pub mod atom;
pub mod connection;
pub mod entry;
pub mod neighbor;
