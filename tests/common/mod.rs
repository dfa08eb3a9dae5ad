#![allow(dead_code)]

pub mod command;
pub mod file;

use jit::areas::index::Index;
use std::path::Path;

/// Paths staged in the repository at `dir`, in index order
pub fn staged_paths(dir: &Path) -> Vec<String> {
    let mut index = Index::new(dir.join(".git").join("index").into_boxed_path());
    index.load().expect("Failed to load index");

    index.entries().map(|entry| entry.path.clone()).collect()
}
