//! Local repository cache operations.
//!
//! Fetched packages land under `~/.gopack/repos/<root>[.<pin>]`. Copying a
//! package into the toolchain source root is skipped when that location is
//! under version control; such packages are updated in place with the
//! detected VCS client instead.

use std::fs;
use std::path::Path;
use std::process::Command;

use colored::Colorize;
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::pkg::Node;

/// Returns the VCS kind whose marker directory exists at `dir`.
pub fn vcs_name(dir: &Path) -> Option<&'static str> {
    if dir.join(".git").exists() {
        Some("git")
    } else if dir.join(".hg").exists() {
        Some("hg")
    } else if dir.join(".svn").exists() {
        Some("svn")
    } else {
        None
    }
}

/// Copies a cached package into the toolchain source root, replacing
/// whatever was there. Locations with VCS metadata are left untouched.
pub fn copy_to_gopath(node: &Node) -> Result<()> {
    if node.install_gopath.as_os_str().is_empty() {
        return Ok(());
    }
    if vcs_name(&node.install_gopath).is_some() {
        println!(
            "{} Package in GOPATH has version control: {}",
            "!".yellow(),
            node.pkg.root_path
        );
        return Ok(());
    }

    let _ = fs::remove_dir_all(&node.install_gopath);
    copy_dir(&node.install_path, &node.install_gopath)?;
    println!("{} Package copied to GOPATH: {}", "✓".green(), node.pkg.root_path);
    Ok(())
}

/// Updates a package in place with the VCS client it was checked out with.
pub fn update_by_vcs(node: &Node, vcs: &str) -> Result<()> {
    match vcs {
        "git" => {
            let branch = run_in_dir(&node.install_gopath, "git", &["rev-parse", "--abbrev-ref", "HEAD"])?;
            let branch = branch.trim();
            run_in_dir(&node.install_gopath, "git", &["pull", "origin", branch])?;
        }
        "hg" => {
            run_in_dir(&node.install_gopath, "hg", &["pull"])?;
            run_in_dir(&node.install_gopath, "hg", &["up"])?;
        }
        "svn" => {
            run_in_dir(&node.install_gopath, "svn", &["update"])?;
        }
        _ => {}
    }
    Ok(())
}

fn run_in_dir(dir: &Path, program: &str, args: &[&str]) -> Result<String> {
    let output = Command::new(program)
        .args(args)
        .current_dir(dir)
        .output()
        .map_err(|e| Error::fetch(dir.to_string_lossy(), e))?;
    if !output.status.success() {
        return Err(Error::fetch(
            dir.to_string_lossy(),
            String::from_utf8_lossy(&output.stderr).trim(),
        ));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Recursive copy that leaves VCS metadata behind.
pub fn copy_dir(src: &Path, dest: &Path) -> Result<()> {
    for entry in WalkDir::new(src).into_iter().filter_entry(|e| {
        e.file_name()
            .to_str()
            .map(|name| name != ".git" && name != ".hg" && name != ".svn")
            .unwrap_or(true)
    }) {
        let entry = entry.map_err(|e| Error::Io(e.into()))?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| Error::Io(std::io::Error::other(e)))?;
        let target = dest.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}
