//! DSvn Administration CLI

mod dump;
mod dump_format;
mod load;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dsvn_core::authz::{Authz, Rights};
use dsvn_core::DiskRepository;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "dsvn-admin")]
#[command(author = "DSvn Contributors")]
#[command(version = "0.1.0")]
#[command(about = "DSvn repository administration and dump file tool")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Initialize a new repository
    Init { path: String },

    /// Load SVN dump file into repository
    Load {
        #[arg(short, long)]
        file: String,
        #[arg(short, long)]
        repo: String,
    },

    /// Dump repository to SVN dump format
    Dump {
        #[arg(short, long)]
        repo: String,
        #[arg(short, long)]
        output: String,
        #[arg(short, long)]
        start: Option<u64>,
        #[arg(short, long)]
        end: Option<u64>,
    },

    /// Inspect or test-drive a path-based authorization rules file
    Authz {
        #[command(subcommand)]
        action: AuthzAction,
    },
}

#[derive(Subcommand, Debug)]
enum AuthzAction {
    /// Check whether a user would be granted access to a path
    Check {
        /// Path to the authz rules file
        #[arg(long)]
        rules: PathBuf,
        /// Path to a separate groups file, if the rules file has none
        #[arg(long)]
        groups: Option<PathBuf>,
        /// Repository name the path is scoped to (empty matches unscoped rules only)
        #[arg(long, default_value = "")]
        repo: String,
        /// Username to check; omit for anonymous
        #[arg(long)]
        user: Option<String>,
        /// Repository-relative path, must start with '/'
        #[arg(long)]
        path: String,
        /// Check write access instead of read
        #[arg(long)]
        write: bool,
        /// Require the access to hold over the entire subtree
        #[arg(long)]
        recursive: bool,
    },

    /// Validate a rules file without querying it
    Validate {
        /// Path to the authz rules file
        #[arg(long)]
        rules: PathBuf,
        /// Path to a separate groups file, if the rules file has none
        #[arg(long)]
        groups: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Init { path } => {
            println!("Initializing repository at {}", path);
            let repo = DiskRepository::open(Path::new(&path))?;
            repo.initialize().await?;
            println!("Repository initialized successfully (UUID: {})", repo.uuid());
        }

        Commands::Load { file, repo } => {
            println!("Loading SVN dump file: {}", file);
            let repository = DiskRepository::open(Path::new(&repo))?;
            repository.initialize().await?;
            let repository = Arc::new(repository);

            if file == "-" {
                let reader = BufReader::new(std::io::stdin());
                load::load_dump_file(repository, reader).await?;
            } else {
                let file_obj = File::open(&file)?;
                let reader = BufReader::new(file_obj);
                load::load_dump_file(repository, reader).await?;
            }
        }

        Commands::Dump { repo, output: _output, start: _start, end: _end } => {
            let _repository = DiskRepository::open(Path::new(&repo))?;
            println!("Dump functionality coming soon");
        }

        Commands::Authz { action } => run_authz(action)?,
    }

    Ok(())
}

fn run_authz(action: AuthzAction) -> Result<()> {
    match action {
        AuthzAction::Check {
            rules,
            groups,
            repo,
            user,
            path,
            write,
            recursive,
        } => {
            let authz = Authz::load(&rules, groups.as_deref(), true)
                .with_context(|| format!("loading authz rules from {}", rules.display()))?;

            let required = if write { Rights::WRITE } else { Rights::READ };
            let granted = authz.check_access(
                Some(repo.as_str()),
                Some(path.as_str()),
                user.as_deref(),
                required,
                recursive,
            )?;

            let who = user.as_deref().unwrap_or("<anonymous>");
            let verb = if write { "write" } else { "read" };
            if granted {
                println!("GRANTED: {who} may {verb} {path} in repo '{repo}'");
            } else {
                println!("DENIED: {who} may not {verb} {path} in repo '{repo}'");
                std::process::exit(1);
            }
        }

        AuthzAction::Validate { rules, groups } => {
            match Authz::load(&rules, groups.as_deref(), true) {
                Ok(_) => println!("OK: {} is a valid authz rules file", rules.display()),
                Err(e) => {
                    eprintln!("INVALID: {e}");
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}
