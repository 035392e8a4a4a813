//! Vendor-tree assembly.
//!
//! Each build gets a disposable, isolated source root at
//! `<workdir>/.vendor/src`: the project itself plus every resolved
//! dependency, linked in from the local repository (or from an absolute
//! path for Local pins). Dependencies whose ancestor root is itself
//! resolved are satisfied transitively and never linked twice.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use colored::Colorize;

use crate::error::{Error, Result};
use crate::pkg::{self, Pkg, RevisionType};
use crate::session::Session;

pub const VENDOR: &str = ".vendor";

/// A per-invocation vendor tree; the whole tree is removed on drop.
pub struct VendorTree {
    /// The tree root handed to the toolchain as its source root.
    pub root: PathBuf,
    /// `<root>/src`, where packages are linked.
    pub src: PathBuf,
    /// The project's directory inside the tree.
    pub project_dir: PathBuf,
    keep: bool,
}

impl VendorTree {
    /// Leaves the tree on disk when the session wants to inspect it.
    pub fn keep(&mut self) {
        self.keep = true;
    }
}

impl Drop for VendorTree {
    fn drop(&mut self) {
        if !self.keep {
            let _ = fs::remove_dir_all(&self.root);
        }
    }
}

/// Assembles the vendor tree for `target` from a resolved dependency set.
pub fn assemble(
    session: &Session,
    target: &str,
    resolved: &BTreeMap<String, Pkg>,
) -> Result<VendorTree> {
    let root = session.work_dir.join(VENDOR);
    let src = root.join("src");

    // No leftover state across runs: the wipe happens strictly before any
    // linking begins.
    if src.exists() {
        fs::remove_dir_all(&src).map_err(Error::link)?;
    }
    fs::create_dir_all(&src).map_err(Error::link)?;

    link_self(session, target, &src)?;

    for (dep_root, dep) in resolved {
        if has_resolved_ancestor(dep_root, resolved) {
            continue;
        }
        if reuse_from_gopath(session, dep) {
            continue;
        }

        let source = link_source(session, dep)?;
        if !source.exists() {
            return Err(Error::link(format!(
                "missing local copy of {}: {}",
                dep_root,
                source.display()
            )));
        }
        println!("{} Linking {}{}", "🔗".cyan(), dep_root, dep.val_suffix());
        session.link_backend.link(&source, &src.join(dep_root))?;
    }

    Ok(VendorTree {
        project_dir: src.join(target),
        root,
        src,
        keep: false,
    })
}

/// Links the project's own root into the tree at its canonical path.
fn link_self(session: &Session, target: &str, src: &Path) -> Result<()> {
    let target_root = pkg::root_path(target);
    let work = session.work_dir.to_string_lossy().replace('\\', "/");

    let from = match work.strip_suffix(&format!("/{target}")).or_else(|| {
        (work == target).then_some("")
    }) {
        Some(base) if !base.is_empty() => PathBuf::from(base).join(&target_root),
        _ => session.work_dir.clone(),
    };
    let to = if from == session.work_dir {
        src.join(target)
    } else {
        src.join(&target_root)
    };

    println!("{} Linking {}", "🔗".cyan(), target_root);
    session.link_backend.link(&from, &to)
}

/// An ancestor path segment of this root is itself a resolved dependency;
/// the content arrives once the ancestor is linked.
fn has_resolved_ancestor(root: &str, resolved: &BTreeMap<String, Pkg>) -> bool {
    root.bytes()
        .enumerate()
        .filter(|(_, b)| *b == b'/')
        .any(|(i, _)| resolved.contains_key(&root[..i]))
}

/// Unpinned packages already present, un-linked, in the toolchain source
/// root are found through the search-path fallback instead of a link.
fn reuse_from_gopath(session: &Session, dep: &Pkg) -> bool {
    if session.options.remote || !dep.is_empty_val() {
        return false;
    }
    match session.gopath_src() {
        Some(src) => {
            let present = src.join(&dep.root_path);
            present.is_dir() && !present.is_symlink()
        }
        None => false,
    }
}

fn link_source(session: &Session, dep: &Pkg) -> Result<PathBuf> {
    if dep.rev_type == RevisionType::Local {
        let path = PathBuf::from(&dep.value);
        return path
            .canonicalize()
            .map_err(|e| Error::link(format!("local path {}: {}", dep.value, e)));
    }
    Ok(session.install_path(dep))
}
