//! Input and output for the neighbor pipeline.
//!
//! [`traits`] defines how parsed entries reach the engine; [`artifact`]
//! encodes and decodes the persisted store in its binary and structured-text
//! forms.

pub mod artifact;
pub mod traits;
