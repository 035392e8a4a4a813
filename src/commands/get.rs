//! `gp get` — fetch remote packages and their dependencies.

use anyhow::Result;
use colored::Colorize;

use crate::fetch::HttpClient;
use crate::manifest::{Manifest, MANIFEST_NAME};
use crate::pkg::{self, Node, RevisionType};
use crate::resolve::{self, RemoteFetcher, Resolver};
use crate::scan::{ImportOracle, SourceScanner};
use crate::session::Session;

pub fn run(session: &Session, packages: &[String], save: bool) -> Result<()> {
    let http = HttpClient::new(session.config.http_proxy.as_deref())?;
    let scanner = SourceScanner::default();
    let fetcher = RemoteFetcher {
        http: &http,
        oracle: &scanner,
    };

    let manifest_path = session.work_dir.join(MANIFEST_NAME);
    let manifest = Manifest::load(&manifest_path)?;

    let (target, seeds) = if packages.is_empty() {
        // Resolve the current project's imports, driven by its manifest.
        let target = manifest.resolve_target(session);
        let imports = scanner.imports(&target, &pkg::root_path(&target), &session.work_dir)?;
        let seeds = resolve::seed_nodes(session, &manifest, &imports)?;
        (target, seeds)
    } else {
        (".".to_string(), seeds_from_args(session, packages)?)
    };

    let resolver = Resolver::new(session, &fetcher, &scanner, &manifest, &target);
    let result = resolver.resolve(seeds)?;
    session.save_state()?;

    println!(
        "{} {} package(s) downloaded, {} failed",
        "📦".blue(),
        result.downloaded,
        result.failed
    );

    if save && !packages.is_empty() {
        let mut manifest = manifest;
        for info in packages {
            match info.split_once('@') {
                Some((path, pin)) => manifest.deps.insert(path.to_string(), pin.to_string()),
                None => manifest.deps.insert(info.clone(), String::new()),
            };
        }
        manifest.save(&manifest_path)?;
        println!("{} Saved dependencies to {}", "✓".green(), MANIFEST_NAME);
    }

    if session.options.strict && result.failed > 0 {
        anyhow::bail!("fail to download some packages");
    }
    Ok(())
}

/// Parses `<import path>[@<type>:<value>]` arguments into seed nodes.
/// A malformed pin aborts before any network activity.
fn seeds_from_args(session: &Session, packages: &[String]) -> Result<Vec<Node>> {
    let is_get_deps = !session.options.download_only;
    let mut seeds = Vec::with_capacity(packages.len());
    for info in packages {
        let node = match info.split_once('@') {
            Some((path, pin)) => {
                let (rev_type, value) = pkg::parse_pin(pin)?;
                Node::new(session, path, rev_type, &value, is_get_deps)
            }
            None => Node::new(session, info, RevisionType::Branch, "", is_get_deps),
        };
        seeds.push(node);
    }
    Ok(seeds)
}
