//! Archive staging and extraction.
//!
//! Downloads are staged under `~/.gopack/temp/archive` and always removed,
//! success or failure. Installation extracts into a scratch sibling first
//! and renames the extracted root into place, so a failure mid-extraction
//! never leaves a partially populated install directory.

use std::fs;
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;
use tar::Archive;

use crate::error::{Error, Result};
use crate::pkg::Node;
use crate::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Zip,
    TarGz,
    Tar,
}

impl ArchiveKind {
    pub fn ext(self) -> &'static str {
        match self {
            ArchiveKind::Zip => "zip",
            ArchiveKind::TarGz => "tar.gz",
            ArchiveKind::Tar => "tar",
        }
    }
}

/// A downloaded archive file, removed when dropped.
pub struct StagedArchive {
    path: PathBuf,
}

impl StagedArchive {
    pub fn new(session: &Session, root: &str, kind: ArchiveKind) -> Result<StagedArchive> {
        let path = session.staged_archive_path(root, kind.ext());
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(StagedArchive { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StagedArchive {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

/// Extracts `archive` and atomically replaces the node's install path with
/// the extracted root directory.
pub fn install(session: &Session, node: &Node, archive: &Path, kind: ArchiveKind) -> Result<()> {
    let scratch = session.scratch_dir(&node.pkg.root_path);
    fs::create_dir_all(&scratch)?;

    let extracted = match kind {
        ArchiveKind::Zip => extract_zip(archive, &scratch),
        ArchiveKind::TarGz => {
            let file = fs::File::open(archive).map_err(Error::Io)?;
            extract_tar(Archive::new(GzDecoder::new(file)), &scratch)
        }
        ArchiveKind::Tar => {
            let file = fs::File::open(archive).map_err(Error::Io)?;
            extract_tar(Archive::new(file), &scratch)
        }
    };

    let result = extracted.and_then(|root_dir| {
        let _ = fs::remove_dir_all(&node.install_path);
        if let Some(parent) = node.install_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::rename(scratch.join(&root_dir), &node.install_path).map_err(|e| {
            Error::fetch(&node.pkg.import_path, format!("fail to rename directory: {e}"))
        })
    });

    let _ = fs::remove_dir_all(&scratch);
    result
}

/// Extracts a zip archive, returning the top-level directory name.
fn extract_zip(archive: &Path, dest: &Path) -> Result<String> {
    let file = fs::File::open(archive)?;
    let mut zip = zip::ZipArchive::new(file)
        .map_err(|e| Error::fetch(archive.to_string_lossy(), format!("fail to open archive: {e}")))?;

    let mut root_dir = String::new();
    for i in 0..zip.len() {
        let mut entry = zip
            .by_index(i)
            .map_err(|e| Error::fetch(archive.to_string_lossy(), e))?;
        let Some(rel) = entry.enclosed_name() else {
            return Err(Error::fetch(
                archive.to_string_lossy(),
                format!("unsafe archive entry: {}", entry.name()),
            ));
        };
        if root_dir.is_empty() {
            if let Some(first) = first_component(&rel) {
                root_dir = first;
            }
        }
        let out = dest.join(&rel);
        if entry.is_dir() {
            fs::create_dir_all(&out)?;
        } else {
            if let Some(parent) = out.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut file = fs::File::create(&out)?;
            io::copy(&mut entry, &mut file)?;
        }
    }

    if root_dir.is_empty() {
        return Err(Error::fetch(archive.to_string_lossy(), "empty archive"));
    }
    Ok(root_dir)
}

/// Extracts a tar stream, returning the top-level directory name.
/// `pax_global_header` entries are skipped.
fn extract_tar<R: Read>(mut archive: Archive<R>, dest: &Path) -> Result<String> {
    let mut root_dir = String::new();
    for entry in archive.entries().map_err(Error::Io)? {
        let mut entry = entry.map_err(Error::Io)?;
        let rel = entry.path().map_err(Error::Io)?.into_owned();
        if rel.as_os_str() == "pax_global_header" {
            continue;
        }
        if rel
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)))
        {
            return Err(Error::fetch(
                rel.to_string_lossy().into_owned(),
                "unsafe archive entry",
            ));
        }
        if root_dir.is_empty() {
            if let Some(first) = first_component(&rel) {
                root_dir = first;
            }
        }
        let out = dest.join(&rel);
        if entry.header().entry_type().is_dir() {
            fs::create_dir_all(&out)?;
        } else {
            if let Some(parent) = out.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut file = fs::File::create(&out)?;
            io::copy(&mut entry, &mut file)?;
        }
    }

    if root_dir.is_empty() {
        return Err(Error::fetch(dest.to_string_lossy().into_owned(), "empty archive"));
    }
    Ok(root_dir)
}

fn first_component(path: &Path) -> Option<String> {
    path.components().next().and_then(|c| match c {
        Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pkg::RevisionType;
    use crate::session::RunOptions;
    use std::io::Write;

    fn make_tar(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for (path, content) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_entry_type(tar::EntryType::Regular);
            // Write the path directly into the GNU name field: `Header::set_path`
            // (used by `append_data`) rejects `..`-escaping paths, which this
            // helper must be able to produce to exercise the rejection check.
            let name = path.as_bytes();
            let gnu = header.as_gnu_mut().unwrap();
            gnu.name[..name.len()].copy_from_slice(name);
            header.set_cksum();
            builder.append(&header, content.as_bytes()).unwrap();
        }
        builder.into_inner().unwrap()
    }

    #[test]
    fn test_install_from_tar_renames_root_into_place() {
        let tmp = tempfile::tempdir().unwrap();
        let session = Session::at(tmp.path(), tmp.path(), RunOptions::default()).unwrap();
        let node = crate::pkg::Node::new(
            &session,
            "example.com/owner/repo",
            RevisionType::Tag,
            "v1.2.0",
            false,
        );

        let data = make_tar(&[
            ("repo-v1.2.0/main.go", "package main\n"),
            ("repo-v1.2.0/sub/lib.go", "package sub\n"),
        ]);
        let archive = tmp.path().join("archive.tar");
        fs::File::create(&archive).unwrap().write_all(&data).unwrap();

        install(&session, &node, &archive, ArchiveKind::Tar).unwrap();
        assert!(node.install_path.to_string_lossy().ends_with("repo.v1.2.0"));
        assert!(node.install_path.join("main.go").exists());
        assert!(node.install_path.join("sub").join("lib.go").exists());
    }

    #[test]
    fn test_install_replaces_stale_content() {
        let tmp = tempfile::tempdir().unwrap();
        let session = Session::at(tmp.path(), tmp.path(), RunOptions::default()).unwrap();
        let node =
            crate::pkg::Node::new(&session, "example.com/owner/repo", RevisionType::Branch, "", false);

        fs::create_dir_all(&node.install_path).unwrap();
        fs::write(node.install_path.join("stale.go"), "package old\n").unwrap();

        let data = make_tar(&[("repo-abc/fresh.go", "package fresh\n")]);
        let archive = tmp.path().join("archive.tar");
        fs::File::create(&archive).unwrap().write_all(&data).unwrap();

        install(&session, &node, &archive, ArchiveKind::Tar).unwrap();
        assert!(node.install_path.join("fresh.go").exists());
        assert!(!node.install_path.join("stale.go").exists());
    }

    #[test]
    fn test_tar_rejects_escaping_entries() {
        let tmp = tempfile::tempdir().unwrap();
        let data = make_tar(&[("../escape.go", "package evil\n")]);
        let archive = Archive::new(io::Cursor::new(data));
        assert!(extract_tar(archive, tmp.path()).is_err());
    }

    #[test]
    fn test_staged_archive_removed_on_drop() {
        let tmp = tempfile::tempdir().unwrap();
        let session = Session::at(tmp.path(), tmp.path(), RunOptions::default()).unwrap();
        let path;
        {
            let staged = StagedArchive::new(&session, "example.com/o/r", ArchiveKind::Zip).unwrap();
            fs::write(staged.path(), b"zipdata").unwrap();
            path = staged.path().to_path_buf();
            assert!(path.exists());
        }
        assert!(!path.exists());
    }
}
