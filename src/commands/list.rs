//! `gp list` — list the project's direct external dependencies.

use std::collections::BTreeSet;

use anyhow::Result;

use crate::manifest::{Manifest, MANIFEST_NAME};
use crate::pkg;
use crate::scan::{ImportOracle, SourceScanner};
use crate::session::Session;

pub fn run(session: &Session, include_tests: bool) -> Result<()> {
    let manifest = Manifest::load(&session.work_dir.join(MANIFEST_NAME))?;
    let target = manifest.resolve_target(session);

    let scanner = SourceScanner { include_tests };
    let imports = scanner.imports(&target, &pkg::root_path(&target), &session.work_dir)?;

    let roots: BTreeSet<String> = imports.iter().map(|name| pkg::root_path(name)).collect();

    println!("Dependency list ({}):", roots.len());
    for root in roots {
        let suffix = manifest
            .deps
            .get(&root)
            .filter(|value| !value.is_empty())
            .map(|value| format!(" @ {value}"))
            .unwrap_or_default();
        println!("-> {root}{suffix}");
    }
    Ok(())
}
