//! `gp cache` — inspect and clear the local repository.

use std::fs;
use std::path::Path;

use anyhow::Result;
use colored::Colorize;
use walkdir::WalkDir;

use crate::session::Session;

pub fn print_path(session: &Session) -> Result<()> {
    println!("{}", session.repo_root.display());
    Ok(())
}

/// Lists cached packages: directories under the repository root that hold
/// files of their own (checkout roots), at their `<root>[.<pin>]` paths.
pub fn list(session: &Session) -> Result<()> {
    if !session.repo_root.exists() {
        println!("{} Local repository is empty.", "ℹ".blue());
        return Ok(());
    }

    let mut count = 0;
    for entry in WalkDir::new(&session.repo_root)
        .min_depth(2)
        .max_depth(3)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if entry.file_type().is_dir() && has_direct_file(entry.path()) {
            if let Ok(rel) = entry.path().strip_prefix(&session.repo_root) {
                println!("{}", rel.display());
                count += 1;
            }
        }
    }

    if count == 0 {
        println!("{} (empty)", "ℹ".blue());
    }
    Ok(())
}

fn has_direct_file(dir: &Path) -> bool {
    fs::read_dir(dir)
        .map(|mut entries| {
            entries.any(|e| e.map(|e| e.path().is_file()).unwrap_or(false))
        })
        .unwrap_or(false)
}

pub fn clean(session: &Session) -> Result<()> {
    if session.repo_root.exists() {
        println!("{} Cleaning local repository...", "🧹".yellow());
        fs::remove_dir_all(&session.repo_root)?;
        fs::create_dir_all(&session.repo_root)?;
        println!("{} Local repository cleaned.", "✓".green());
    } else {
        println!("{} Local repository already empty.", "✓".green());
    }
    Ok(())
}
