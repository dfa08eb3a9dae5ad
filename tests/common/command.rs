use crate::common::file::{FileSpec, make_executable, write_file};
use assert_cmd::Command;
use assert_fs::TempDir;
use rstest::fixture;
use std::path::Path;

#[fixture]
pub fn repository_dir() -> TempDir {
    TempDir::new().expect("Failed to create temp dir")
}

/// Initialized repository with `a.txt` ("hello") and an executable
/// `a/run.sh` ("world") staged.
#[fixture]
pub fn staged_repository_dir(repository_dir: TempDir) -> TempDir {
    run_jit_command(repository_dir.path(), &["init"])
        .assert()
        .success();

    write_file(FileSpec::new(
        repository_dir.path().join("a.txt"),
        "hello".to_string(),
    ));
    let script = repository_dir.path().join("a").join("run.sh");
    write_file(FileSpec::new(script.clone(), "world".to_string()));
    make_executable(&script);

    run_jit_command(repository_dir.path(), &["add", "."])
        .assert()
        .success();

    repository_dir
}

pub fn run_jit_command(dir: &Path, args: &[&str]) -> Command {
    let mut cmd = Command::cargo_bin("jit").expect("Failed to find jit binary");
    cmd.current_dir(dir);
    cmd.env_remove("RUST_LOG");
    for arg in args {
        cmd.arg(arg);
    }
    cmd
}

pub fn jit_commit(dir: &Path, message: &str) -> Command {
    let mut cmd = run_jit_command(dir, &["commit", "-m", message]);
    cmd.envs(vec![
        ("GIT_AUTHOR_NAME", "fake_user"),
        ("GIT_AUTHOR_EMAIL", "fake_email@email.com"),
        ("GIT_AUTHOR_DATE", "2023-01-01 12:00:00 +0000"), // %Y-%m-%d %H:%M:%S %z
    ]);
    cmd
}

pub fn head_commit_sha(dir: &Path) -> Result<String, Box<dyn std::error::Error>> {
    let head_content = std::fs::read_to_string(dir.join(".git").join("HEAD"))?;

    Ok(head_content.trim().to_string())
}
