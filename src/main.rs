//! # gopack CLI Entry Point
//!
//! This is the main executable for the `gp` command-line tool.
//! It parses CLI arguments using clap and routes commands to the appropriate handlers.
//!
//! ## Command Structure
//!
//! - **Fetch**: `get`
//! - **Build**: `build`, `run`, `test`, `install`, `clean`
//! - **Project**: `gen`, `list`
//! - **Maintenance**: `cache`, `config`

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;

use gopack::commands;
use gopack::session::{RunOptions, Session};

#[derive(Parser)]
#[command(name = "gp")]
#[command(about = "Fetch, pin and vendor dependencies for Go projects", version = env!("CARGO_PKG_VERSION"))]
#[command(propagate_version = true)]
struct Cli {
    /// Treat any failed dependency as a fatal error
    #[arg(long, global = true)]
    strict: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch remote packages and their dependencies
    Get {
        /// Packages as `<import path>[@<type>:<value>]`; empty means the
        /// current project
        packages: Vec<String>,
        /// Download the named packages only, without dependencies
        #[arg(short, long)]
        download: bool,
        /// Update packages and dependencies tracking a branch
        #[arg(short, long)]
        update: bool,
        /// Ignore packages already present in GOPATH
        #[arg(short, long)]
        remote: bool,
        /// Copy fetched packages into GOPATH
        #[arg(short, long)]
        gopath: bool,
        /// Record the named packages in the manifest
        #[arg(short, long)]
        save: bool,
        /// Show process details
        #[arg(short, long)]
        verbose: bool,
    },
    /// Link dependencies and run `go build`
    Build {
        /// Update packages and dependencies tracking a branch
        #[arg(short, long)]
        update: bool,
        /// Build with packages in the local repository only
        #[arg(short, long)]
        remote: bool,
        /// Show process details
        #[arg(short, long)]
        verbose: bool,
        /// Arguments passed through to the toolchain
        #[arg(num_args = 0.., allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Link dependencies and run `go run`
    Run {
        #[arg(short, long)]
        update: bool,
        #[arg(short, long)]
        remote: bool,
        #[arg(short, long)]
        verbose: bool,
        /// Arguments passed through to the toolchain
        #[arg(num_args = 0.., allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Link dependencies and run `go test`
    Test {
        #[arg(short, long)]
        update: bool,
        #[arg(short, long)]
        remote: bool,
        #[arg(short, long)]
        verbose: bool,
        /// Arguments passed through to the toolchain
        #[arg(num_args = 0.., allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Link dependencies and run `go install`
    Install {
        #[arg(short, long)]
        update: bool,
        #[arg(short, long)]
        remote: bool,
        #[arg(short, long)]
        verbose: bool,
    },
    /// List all direct dependencies of the current project
    List {
        /// Include test imports
        #[arg(short, long)]
        test: bool,
    },
    /// Generate a manifest for the current project
    Gen,
    /// Remove the vendor tree
    Clean,
    /// Manage the local repository
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
    /// Read and write persisted settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Print the local repository location
    Path,
    /// List cached packages
    List,
    /// Remove all cached packages
    Clean,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Display a setting (`proxy` or `github`)
    Get { key: String },
    /// Change a setting
    Set {
        key: String,
        values: Vec<String>,
    },
    /// Remove a setting
    Unset { key: String },
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = dispatch(cli) {
        eprintln!("{} {:#}", "x".red(), e);
        std::process::exit(1);
    }
}

fn dispatch(cli: Cli) -> Result<()> {
    let strict = cli.strict;
    match cli.command {
        Commands::Get {
            packages,
            download,
            update,
            remote,
            gopath,
            save,
            verbose,
        } => {
            if gopath && remote {
                anyhow::bail!("command options have conflicts: '--gopath' and '--remote'");
            }
            if download && packages.is_empty() {
                anyhow::bail!("not enough arguments for option: '--download'");
            }
            let session = Session::from_env(RunOptions {
                update,
                remote,
                download_only: download,
                copy_gopath: gopath,
                verbose,
                strict,
            })?;
            commands::get::run(&session, &packages, save)
        }
        Commands::Build {
            update,
            remote,
            verbose,
            args,
        } => {
            let session = Session::from_env(options(update, remote, verbose, strict))?;
            commands::build::build(&session, &args)
        }
        Commands::Run {
            update,
            remote,
            verbose,
            args,
        } => {
            let session = Session::from_env(options(update, remote, verbose, strict))?;
            commands::build::run(&session, &args)
        }
        Commands::Test {
            update,
            remote,
            verbose,
            args,
        } => {
            let session = Session::from_env(options(update, remote, verbose, strict))?;
            commands::build::test(&session, &args)
        }
        Commands::Install {
            update,
            remote,
            verbose,
        } => {
            let session = Session::from_env(options(update, remote, verbose, strict))?;
            commands::build::install(&session)
        }
        Commands::List { test } => {
            let session = Session::from_env(RunOptions::default())?;
            commands::list::run(&session, test)
        }
        Commands::Gen => {
            let session = Session::from_env(RunOptions::default())?;
            commands::generate::run(&session)
        }
        Commands::Clean => {
            let session = Session::from_env(RunOptions::default())?;
            commands::build::clean(&session)
        }
        Commands::Cache { action } => {
            let session = Session::from_env(RunOptions::default())?;
            match action {
                CacheAction::Path => commands::cache::print_path(&session),
                CacheAction::List => commands::cache::list(&session),
                CacheAction::Clean => commands::cache::clean(&session),
            }
        }
        Commands::Config { action } => {
            let mut session = Session::from_env(RunOptions::default())?;
            match action {
                ConfigAction::Get { key } => commands::config::get(&session, &key),
                ConfigAction::Set { key, values } => {
                    commands::config::set(&mut session, &key, &values)
                }
                ConfigAction::Unset { key } => commands::config::unset(&mut session, &key),
            }
        }
    }
}

fn options(update: bool, remote: bool, verbose: bool, strict: bool) -> RunOptions {
    RunOptions {
        update,
        remote,
        verbose,
        strict,
        ..RunOptions::default()
    }
}
