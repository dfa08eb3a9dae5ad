use derive_new::new;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Eq, PartialEq, new)]
pub struct FileSpec {
    pub path: PathBuf,
    pub content: String,
}

pub fn write_file(file_spec: FileSpec) {
    // make sure the parent directory exists
    if let Some(parent) = file_spec.path.parent() {
        std::fs::create_dir_all(parent)
            .unwrap_or_else(|e| panic!("Failed to create directory {:?}: {}", parent, e));
    }

    std::fs::write(&file_spec.path, &file_spec.content)
        .unwrap_or_else(|e| panic!("Failed to write file {:?}: {}", file_spec.path, e));
}

pub fn make_executable(path: &Path) {
    use std::os::unix::fs::PermissionsExt;

    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
        .unwrap_or_else(|e| panic!("Failed to chmod {:?}: {}", path, e));
}

/// Write `files_count` files with fake names and content directly under `dir`.
///
/// Names are unique within the call.
pub fn write_generated_files(dir: &Path, files_count: usize) -> Vec<FileSpec> {
    use fake::{
        Fake,
        faker::lorem::en::{Word, Words},
    };

    let mut specs: Vec<FileSpec> = Vec::new();
    while specs.len() < files_count {
        let file_name = format!("{}.txt", Word().fake::<String>());
        let file_path = dir.join(&file_name);
        if specs.iter().any(|spec| spec.path == file_path) {
            continue;
        }
        let file_content = Words(5..10).fake::<Vec<String>>().join(" ");

        let file_spec = FileSpec::new(file_path, file_content);
        write_file(file_spec.clone());
        specs.push(file_spec);
    }

    specs
}

/// Drop every permission bit on `path`.
///
/// Returns `false` when the file can still be read afterwards (running as
/// root), in which case permission checks cannot be exercised.
pub fn make_unreadable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o000))
        .unwrap_or_else(|e| panic!("Failed to chmod {:?}: {}", path, e));

    std::fs::read(path).is_err()
}
