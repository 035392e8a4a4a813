//! The import oracle: "what does this source tree import?"
//!
//! The walker only depends on the [`ImportOracle`] trait; the bundled
//! [`SourceScanner`] reads Go source files and extracts their import
//! declarations, filtering out the standard library and the tree's own
//! subpackages. Graph tests substitute a table-driven oracle.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use walkdir::WalkDir;

use crate::error::Result;
use crate::pkg;

pub trait ImportOracle {
    /// Returns the external import paths of the package rooted at `dir`.
    /// Imports under `root_path` are internal subpackages and excluded.
    fn imports(&self, import_path: &str, root_path: &str, dir: &Path) -> Result<Vec<String>>;
}

static IMPORT_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\bimport\s*\(([^)]*)\)").unwrap());
static IMPORT_SINGLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?m)^\s*import\s+(?:[A-Za-z0-9_]+\s+|\.\s+|_\s+)?"([^"]+)""#).unwrap());
static QUOTED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#""([^"]+)""#).unwrap());

#[derive(Debug, Default, Clone, Copy)]
pub struct SourceScanner {
    /// Also scan `_test.go` files.
    pub include_tests: bool,
}

impl ImportOracle for SourceScanner {
    fn imports(&self, _import_path: &str, root_path: &str, dir: &Path) -> Result<Vec<String>> {
        let mut found = BTreeSet::new();

        for entry in WalkDir::new(dir).into_iter().filter_entry(keep_entry) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(_) => continue,
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy();
            if !name.ends_with(".go") {
                continue;
            }
            if !self.include_tests && name.ends_with("_test.go") {
                continue;
            }
            if let Ok(src) = fs::read_to_string(entry.path()) {
                collect_imports(&src, &mut found);
            }
        }

        Ok(found
            .into_iter()
            .filter(|import| {
                import != "C"
                    && !import.starts_with('.')
                    && !pkg::is_stdlib(import)
                    && !is_internal(import, root_path)
            })
            .collect())
    }
}

/// Import paths under the tree's own root are subpackages, not dependencies.
fn is_internal(import: &str, root_path: &str) -> bool {
    !root_path.is_empty()
        && import.starts_with(root_path)
        && (import.len() == root_path.len() || import.as_bytes()[root_path.len()] == b'/')
}

fn keep_entry(entry: &walkdir::DirEntry) -> bool {
    if entry.depth() == 0 {
        return true;
    }
    let name = entry.file_name().to_string_lossy();
    !(name.starts_with('.') || name.starts_with('_') || name == "testdata")
}

fn collect_imports(src: &str, found: &mut BTreeSet<String>) {
    for block in IMPORT_BLOCK.captures_iter(src) {
        for line in block[1].lines() {
            let line = line.trim();
            if line.starts_with("//") {
                continue;
            }
            if let Some(cap) = QUOTED.captures(line) {
                found.insert(cap[1].to_string());
            }
        }
    }
    for cap in IMPORT_SINGLE.captures_iter(src) {
        found.insert(cap[1].to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, content: &str) {
        let path = dir.join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_scans_block_and_single_imports() {
        let tmp = tempfile::tempdir().unwrap();
        write(
            tmp.path(),
            "main.go",
            r#"package main

import (
    "fmt"
    "github.com/owner/dep"
)

import "bitbucket.org/other/lib"

func main() { fmt.Println(dep.V, lib.V) }
"#,
        );

        let oracle = SourceScanner::default();
        let imports = oracle
            .imports("example.com/o/app", "example.com/o/app", tmp.path())
            .unwrap();
        assert_eq!(imports, vec!["bitbucket.org/other/lib", "github.com/owner/dep"]);
    }

    #[test]
    fn test_stdlib_only_tree_has_no_imports() {
        let tmp = tempfile::tempdir().unwrap();
        write(
            tmp.path(),
            "main.go",
            "package main\n\nimport (\n    \"fmt\"\n    \"net/http\"\n)\n",
        );

        let imports = SourceScanner::default()
            .imports("example.com/o/app", "example.com/o/app", tmp.path())
            .unwrap();
        assert!(imports.is_empty());
    }

    #[test]
    fn test_own_subpackages_excluded() {
        let tmp = tempfile::tempdir().unwrap();
        write(
            tmp.path(),
            "main.go",
            "package main\n\nimport (\n    \"example.com/o/app/sub\"\n    \"example.com/o/apple\"\n)\n",
        );

        let imports = SourceScanner::default()
            .imports("example.com/o/app", "example.com/o/app", tmp.path())
            .unwrap();
        // Prefix match respects path segment boundaries.
        assert_eq!(imports, vec!["example.com/o/apple"]);
    }

    #[test]
    fn test_test_files_gated_by_flag() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "lib.go", "package lib\n\nimport \"github.com/owner/dep\"\n");
        write(
            tmp.path(),
            "lib_test.go",
            "package lib\n\nimport \"github.com/owner/testonly\"\n",
        );

        let without = SourceScanner { include_tests: false }
            .imports("example.com/o/lib", "example.com/o/lib", tmp.path())
            .unwrap();
        assert_eq!(without, vec!["github.com/owner/dep"]);

        let with = SourceScanner { include_tests: true }
            .imports("example.com/o/lib", "example.com/o/lib", tmp.path())
            .unwrap();
        assert_eq!(with, vec!["github.com/owner/dep", "github.com/owner/testonly"]);
    }

    #[test]
    fn test_skips_vendor_and_testdata_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "main.go", "package main\n\nimport \"github.com/owner/dep\"\n");
        write(
            tmp.path(),
            ".vendor/src/x/x.go",
            "package x\n\nimport \"github.com/hidden/one\"\n",
        );
        write(
            tmp.path(),
            "testdata/y.go",
            "package y\n\nimport \"github.com/hidden/two\"\n",
        );

        let imports = SourceScanner::default()
            .imports("example.com/o/app", "example.com/o/app", tmp.path())
            .unwrap();
        assert_eq!(imports, vec!["github.com/owner/dep"]);
    }
}
