//! Project manifest (`gopack.toml`) parsing and writing.
//!
//! The manifest has three sections: `[target]` with the project's import
//! path (empty means auto-detect), `[deps]` mapping a root import path to an
//! empty string (unpinned) or a `<type>:<value>` pin, and `[res]` with a
//! `|`-separated list of resource directories.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::pkg::{self, RevisionType};
use crate::session::Session;

pub const MANIFEST_NAME: &str = "gopack.toml";

/// Resource directories conventionally shipped next to a binary.
pub const COMMON_RES: &[&str] = &["views", "templates", "static", "public", "conf"];

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct Manifest {
    #[serde(default)]
    pub target: Target,
    #[serde(default)]
    pub deps: BTreeMap<String, String>,
    #[serde(default)]
    pub res: Res,
}

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct Target {
    #[serde(default)]
    pub path: String,
}

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct Res {
    #[serde(default)]
    pub include: String,
}

impl Manifest {
    /// Loads the manifest at `path`; a missing file is an empty manifest.
    pub fn load(path: &Path) -> Result<Manifest> {
        if !path.exists() {
            return Ok(Manifest::default());
        }
        let content = fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| crate::error::Error::VersionParse(format!("{}: {}", path.display(), e)))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).unwrap_or_default();
        fs::write(path, content)?;
        Ok(())
    }

    /// Returns the pin recorded for `root`, if one was specified.
    /// A malformed pin string is fatal.
    pub fn pin_for(&self, root: &str) -> Result<Option<(RevisionType, String)>> {
        match self.deps.get(root) {
            Some(value) if !value.is_empty() => pkg::parse_pin(value).map(Some),
            _ => Ok(None),
        }
    }

    /// Resolves the project's import path: the manifest override when set,
    /// otherwise guessed from the working directory's position under a known
    /// source root, otherwise the directory's base name.
    pub fn resolve_target(&self, session: &Session) -> String {
        if !self.target.path.is_empty() {
            return self.target.path.clone();
        }

        let work = session.work_dir.to_string_lossy().replace('\\', "/");
        if let Some(src) = session.gopath_src() {
            let prefix = format!("{}/", src.to_string_lossy().replace('\\', "/"));
            if let Some(rest) = work.strip_prefix(&prefix) {
                return rest.to_string();
            }
        }
        let repo_prefix = format!("{}/", session.repo_root.to_string_lossy().replace('\\', "/"));
        if let Some(rest) = work.strip_prefix(&repo_prefix) {
            return rest.to_string();
        }

        session
            .work_dir
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| ".".to_string())
    }

    /// Resource directories listed in `[res] include`.
    pub fn res_dirs(&self) -> Vec<&str> {
        self.res
            .include
            .split('|')
            .filter(|dir| !dir.is_empty())
            .collect()
    }
}
