//! Persisted per-root revision records.
//!
//! Unpinned ("track latest") packages remember the last concrete revision
//! they resolved to, so a later run can short-circuit with "unchanged"
//! instead of re-downloading the archive. Stored at
//! `~/.gopack/data/nodes.toml`.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct NodeState {
    #[serde(rename = "node", default)]
    nodes: BTreeMap<String, String>,
}

impl NodeState {
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = fs::read_to_string(path)?;
            Ok(toml::from_str(&content).unwrap_or_default())
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self).unwrap_or_default();
        fs::write(path, content)?;
        Ok(())
    }

    pub fn revision(&self, root: &str) -> Option<&str> {
        self.nodes.get(root).map(String::as_str)
    }

    pub fn set_revision(&mut self, root: &str, revision: &str) {
        if revision.is_empty() {
            self.nodes.remove(root);
        } else {
            self.nodes.insert(root.to_string(), revision.to_string());
        }
    }
}
