//! `gp gen` — generate or refresh the project manifest.

use anyhow::Result;
use colored::Colorize;

use crate::manifest::{Manifest, COMMON_RES, MANIFEST_NAME};
use crate::pkg;
use crate::scan::{ImportOracle, SourceScanner};
use crate::session::Session;

pub fn run(session: &Session) -> Result<()> {
    let path = session.work_dir.join(MANIFEST_NAME);
    let mut manifest = Manifest::load(&path)?;
    let target = manifest.resolve_target(session);

    let scanner = SourceScanner::default();
    let imports = scanner.imports(&target, &pkg::root_path(&target), &session.work_dir)?;

    // Seed dependency entries, preserving pins the user already recorded.
    for name in imports {
        let root = pkg::root_path(&name);
        manifest.deps.entry(root).or_default();
    }

    if manifest.res.include.is_empty() {
        let present: Vec<&str> = COMMON_RES
            .iter()
            .filter(|dir| session.work_dir.join(dir).exists())
            .copied()
            .collect();
        manifest.res.include = present.join("|");
    }

    manifest.save(&path)?;
    println!("{} Generated {} successfully!", "✓".green(), MANIFEST_NAME);
    Ok(())
}
