//! Core mechanisms shared across repository areas
//!
//! - `lockfile`: exclusive, rename-based update protocol for a single file

pub mod lockfile;
