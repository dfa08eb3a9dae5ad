//! A small Git: content-addressed objects, a binary staging index, and
//! rename-based lockfiles guarding the files several processes may update.

pub mod areas;
pub mod artifacts;
pub mod commands;
