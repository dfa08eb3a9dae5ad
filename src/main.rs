use clap::{Parser, Subcommand};
use jit::areas::repository::Repository;
use jit::artifacts::core::lockfile::LockError;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Git's exit status for fatal errors
const FATAL_EXIT_CODE: u8 = 128;

#[derive(Parser)]
#[command(
    name = "jit",
    version = "0.1.0",
    about = "A small git implementation",
    long_about = "A small implementation of git's object database, staging index \
    and commit workflow. Repositories it writes can be read by git itself.",
    help_template = r"
{name} {version} - {about}

USAGE:
    {usage}

OPTIONS:
    {all-args}
",
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(
        name = "init",
        about = "Initialize a new repository",
        long_about = "This command initializes a new repository in the current directory or at the specified path."
    )]
    Init {
        #[arg(index = 1, help = "The path to the repository")]
        path: Option<PathBuf>,
    },
    #[command(
        name = "add",
        about = "Add file contents to the index",
        long_about = "This command stores the given files, or every file below the given directories, \
        and records them in the index."
    )]
    Add {
        #[arg(required = true, num_args = 1.., help = "Files or directories to stage")]
        paths: Vec<String>,
    },
    #[command(
        name = "commit",
        about = "Create a new commit with the specified message",
        long_about = "This command creates a new commit from the index. \
        The author is read from GIT_AUTHOR_NAME and GIT_AUTHOR_EMAIL."
    )]
    Commit {
        #[arg(short, long, help = "The commit message")]
        message: String,
    },
    #[command(
        name = "hash-object",
        about = "Hash a file as a blob and optionally write it to the object database"
    )]
    HashObject {
        #[arg(short, long, help = "Write the object to the object database")]
        write: bool,
        #[arg(index = 1)]
        file: String,
    },
    #[command(name = "cat-file", about = "Print the content of an object")]
    CatFile {
        #[arg(short = 'p', long = "pretty", help = "The object id to print")]
        sha: String,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(&cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            report(&error);
            ExitCode::from(FATAL_EXIT_CODE)
        }
    }
}

fn run(command: &Commands) -> anyhow::Result<()> {
    let pwd = std::env::current_dir()?;

    match command {
        Commands::Init { path } => {
            let root = path.as_deref().map_or(pwd.clone(), |path| pwd.join(path));
            open(&root)?.init()
        }
        Commands::Add { paths } => open(&pwd)?.add(paths),
        Commands::Commit { message } => open(&pwd)?.commit(message).map(|_| ()),
        Commands::HashObject { write, file } => open(&pwd)?.hash_object(file, *write),
        Commands::CatFile { sha } => open(&pwd)?.cat_file(sha),
    }
}

fn open(root: &Path) -> anyhow::Result<Repository> {
    Repository::new(root, Box::new(std::io::stdout()))
}

fn report(error: &anyhow::Error) {
    if let Some(LockError::LockDenied(lock_path)) = error.downcast_ref::<LockError>() {
        eprintln!(
            "fatal: Unable to create '{}': File exists.\n\n\
             Another jit process seems to be running in this repository.\n\
             Please make sure all processes are terminated then try again.\n\
             If it still fails, a jit process may have crashed in this\n\
             repository earlier: remove the file manually to continue.",
            lock_path.display()
        );
        return;
    }

    // innermost cause first, the outermost context is the fatal summary
    let mut causes = error.chain().skip(1).collect::<Vec<_>>();
    causes.reverse();
    for cause in causes {
        eprintln!("error: {cause}");
    }
    eprintln!("fatal: {error}");
}
