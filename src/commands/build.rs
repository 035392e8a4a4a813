//! `gp build` / `run` / `test` / `install` / `clean` — assemble the vendor
//! tree and invoke the toolchain against it.

use anyhow::Result;
use colored::Colorize;

use crate::exec;
use crate::fetch::HttpClient;
use crate::manifest::{Manifest, MANIFEST_NAME};
use crate::pkg;
use crate::resolve::{self, RemoteFetcher, Resolver};
use crate::scan::{ImportOracle, SourceScanner};
use crate::session::Session;
use crate::vendor::{self, VendorTree, VENDOR};

/// Resolves the project's dependencies (fetching what is missing) and
/// assembles the vendor tree the toolchain will run against.
pub fn prepare(session: &Session, include_tests: bool) -> Result<(String, VendorTree)> {
    let http = HttpClient::new(session.config.http_proxy.as_deref())?;
    let scanner = SourceScanner { include_tests };
    let fetcher = RemoteFetcher {
        http: &http,
        oracle: &scanner,
    };

    let manifest = Manifest::load(&session.work_dir.join(MANIFEST_NAME))?;
    let target = manifest.resolve_target(session);
    let imports = scanner.imports(&target, &pkg::root_path(&target), &session.work_dir)?;
    let seeds = resolve::seed_nodes(session, &manifest, &imports)?;

    let resolver = Resolver::new(session, &fetcher, &scanner, &manifest, &target);
    let result = resolver.resolve(seeds)?;
    session.save_state()?;

    if result.failed > 0 {
        println!(
            "{} {} package(s) downloaded, {} failed",
            "!".yellow(),
            result.downloaded,
            result.failed
        );
        if session.options.strict {
            anyhow::bail!("fail to download some packages");
        }
    }

    let tree = vendor::assemble(session, &target, &result.pkgs)?;
    Ok((target, tree))
}

pub fn build(session: &Session, args: &[String]) -> Result<()> {
    let (_target, tree) = prepare(session, false)?;

    println!("{} Building...", "🔨".yellow());
    let mut cmd = vec!["go".to_string(), "build".to_string()];
    cmd.extend_from_slice(args);
    exec::run_toolchain(&tree.root, &tree.project_dir, &cmd)?;

    println!("{} Command executed successfully!", "✓".green());
    Ok(())
}

pub fn run(session: &Session, args: &[String]) -> Result<()> {
    let (_target, tree) = prepare(session, false)?;

    println!("{} Running...", "▶".green());
    let mut cmd = vec!["go".to_string(), "run".to_string()];
    cmd.extend_from_slice(args);
    exec::run_toolchain(&tree.root, &tree.project_dir, &cmd)
        .map_err(anyhow::Error::from)
}

pub fn test(session: &Session, args: &[String]) -> Result<()> {
    let (_target, tree) = prepare(session, true)?;

    println!("{} Testing...", "🔎".cyan());
    let mut cmd = vec!["go".to_string(), "test".to_string()];
    cmd.extend_from_slice(args);
    exec::run_toolchain(&tree.root, &tree.project_dir, &cmd)
        .map_err(anyhow::Error::from)
}

pub fn install(session: &Session) -> Result<()> {
    let (target, tree) = prepare(session, false)?;

    println!("{} Installing...", "📦".blue());
    let mut cmd = vec!["go".to_string(), "install".to_string()];
    if session.options.verbose {
        cmd.push("-v".to_string());
    }
    cmd.push(target);
    exec::run_toolchain(&tree.root, &tree.project_dir, &cmd)?;

    println!("{} Command executed successfully!", "✓".green());
    Ok(())
}

pub fn clean(session: &Session) -> Result<()> {
    let vendor_dir = session.work_dir.join(VENDOR);
    if vendor_dir.exists() {
        std::fs::remove_dir_all(&vendor_dir)?;
        println!("{} Removed vendor tree.", "🧹".yellow());
    } else {
        println!("{} Nothing to clean.", "✓".green());
    }
    Ok(())
}
