//! Platform link capability: make directory B resolve through to directory
//! A's content.
//!
//! One backend is selected per process: a symbolic link where the platform
//! supports it, a directory junction on Windows, and a recursive content
//! copy everywhere else. The copy backend skips nested vendor directories to
//! prevent a tree copying itself forever.

use std::fs;
use std::path::Path;

use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::vendor::VENDOR;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkBackend {
    Symlink,
    Junction,
    Copy,
}

impl LinkBackend {
    /// Probes the platform once at session startup.
    pub fn detect(probe_dir: &Path) -> LinkBackend {
        #[cfg(unix)]
        {
            let _ = probe_dir;
            LinkBackend::Symlink
        }
        #[cfg(windows)]
        {
            if junction_works(probe_dir) {
                LinkBackend::Junction
            } else {
                LinkBackend::Copy
            }
        }
        #[cfg(not(any(unix, windows)))]
        {
            let _ = probe_dir;
            LinkBackend::Copy
        }
    }

    /// Makes `dest` resolve through to `src`. Linking an already-linked
    /// destination is a no-op.
    pub fn link(self, src: &Path, dest: &Path) -> Result<()> {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(Error::link)?;
        }
        if dest.exists() || dest.is_symlink() {
            return Ok(());
        }

        match self {
            LinkBackend::Symlink => symlink_dir(src, dest),
            LinkBackend::Junction => junction_dir(src, dest),
            LinkBackend::Copy => copy_dir(src, dest),
        }
    }
}

#[cfg(unix)]
fn symlink_dir(src: &Path, dest: &Path) -> Result<()> {
    match std::os::unix::fs::symlink(src, dest) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(()),
        Err(e) => Err(Error::link(format!("{} -> {}: {}", dest.display(), src.display(), e))),
    }
}

#[cfg(not(unix))]
fn symlink_dir(src: &Path, dest: &Path) -> Result<()> {
    copy_dir(src, dest)
}

#[cfg(windows)]
fn junction_works(probe_dir: &Path) -> bool {
    let src = probe_dir.join("probe-src");
    let dest = probe_dir.join("probe-dest");
    let _ = fs::remove_dir_all(&dest);
    if fs::create_dir_all(&src).is_err() {
        return false;
    }
    let ok = junction_dir(&src, &dest).is_ok();
    let _ = fs::remove_dir_all(&dest);
    let _ = fs::remove_dir_all(&src);
    ok
}

#[cfg(windows)]
fn junction_dir(src: &Path, dest: &Path) -> Result<()> {
    use std::process::Command;

    let src = src.to_string_lossy().replace('/', "\\");
    let dest = dest.to_string_lossy().replace('/', "\\");
    let output = Command::new("cmd")
        .args(["/c", "mklink", "/j", &dest, &src])
        .output()
        .map_err(Error::link)?;
    if output.status.success() {
        Ok(())
    } else {
        Err(Error::link(String::from_utf8_lossy(&output.stderr).trim().to_string()))
    }
}

#[cfg(not(windows))]
fn junction_dir(src: &Path, dest: &Path) -> Result<()> {
    copy_dir(src, dest)
}

/// Recursive content copy, skipping nested vendor trees and VCS metadata.
fn copy_dir(src: &Path, dest: &Path) -> Result<()> {
    for entry in WalkDir::new(src).into_iter().filter_entry(|e| {
        e.file_name()
            .to_str()
            .map(|name| name != VENDOR && name != ".git" && name != ".hg" && name != ".svn")
            .unwrap_or(true)
    }) {
        let entry = entry.map_err(Error::link)?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(Error::link)?;
        let target = dest.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).map_err(Error::link)?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(Error::link)?;
            }
            fs::copy(entry.path(), &target).map_err(Error::link)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_backend_copies_content() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("src");
        fs::create_dir_all(src.join("sub")).unwrap();
        fs::write(src.join("sub").join("file.go"), "package sub\n").unwrap();

        let dest = tmp.path().join("dest");
        LinkBackend::Copy.link(&src, &dest).unwrap();
        assert!(dest.join("sub").join("file.go").exists());
    }

    #[test]
    fn test_copy_backend_skips_nested_vendor() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("src");
        fs::create_dir_all(src.join(VENDOR).join("src")).unwrap();
        fs::write(src.join("main.go"), "package main\n").unwrap();

        let dest = tmp.path().join("dest");
        LinkBackend::Copy.link(&src, &dest).unwrap();
        assert!(dest.join("main.go").exists());
        assert!(!dest.join(VENDOR).exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_backend_resolves_through() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("src");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("file.go"), "package src\n").unwrap();

        let dest = tmp.path().join("dest");
        LinkBackend::Symlink.link(&src, &dest).unwrap();
        assert!(dest.join("file.go").exists());
        assert!(dest.is_symlink());

        // Relinking is a no-op, not an error.
        LinkBackend::Symlink.link(&src, &dest).unwrap();
    }
}
