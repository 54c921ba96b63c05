//! Small helpers shared across the crate.

pub mod fs;
pub mod hash;
pub mod mime;
pub mod plural;
