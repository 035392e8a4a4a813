//! Bitbucket fetcher: repository API for VCS kind and refs, zip archive by
//! commit.

use std::collections::HashMap;
use std::sync::LazyLock;

use colored::Colorize;
use regex::Regex;
use serde::Deserialize;

use super::archive::{self, ArchiveKind, StagedArchive};
use super::{default_branch, expand, imports_after_install, HttpClient, Match};
use crate::error::{Error, Result};
use crate::pkg::{Node, RevisionType};
use crate::scan::ImportOracle;
use crate::session::Session;

pub(super) const PATTERN: &str =
    r"^bitbucket\.org/(?P<owner>[a-z0-9A-Z_.\-]+)/(?P<repo>[a-z0-9A-Z_.\-]+)(?P<dir>/[a-z0-9A-Z_.\-/]*)?$";

static ETAG_VCS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(hg|git)-").unwrap());

#[derive(Deserialize)]
struct Repo {
    scm: String,
}

#[derive(Deserialize)]
struct RefNode {
    node: String,
}

pub(super) fn fetch(
    session: &Session,
    http: &HttpClient,
    oracle: &dyn ImportOracle,
    mut caps: Match,
    node: &mut Node,
) -> Result<Option<Vec<String>>> {
    // Establish the repository's VCS kind first.
    let vcs = match ETAG_VCS.captures(&node.pkg.value) {
        Some(m) => m[1].to_string(),
        None => {
            let repo: Repo = http.get_json(&expand(
                "https://api.bitbucket.org/1.0/repositories/{owner}/{repo}",
                &caps,
            ))?;
            repo.scm
        }
    };

    let mut refs: HashMap<String, String> = HashMap::new();
    for kind in ["branches", "tags"] {
        let url = format!(
            "{}/{}",
            expand("https://api.bitbucket.org/1.0/repositories/{owner}/{repo}", &caps),
            kind
        );
        let nodes: HashMap<String, RefNode> = http
            .get_json(&url)
            .map_err(|e| Error::fetch(&node.pkg.import_path, format!("fail to fetch {kind}: {e}")))?;
        for (name, r) in nodes {
            refs.insert(name, r.node);
        }
    }

    // Latest commit of the default branch.
    let default_tag = default_branch(&vcs);
    let latest = refs.get(default_tag).cloned().ok_or_else(|| {
        Error::fetch(&node.pkg.import_path, format!("tag or branch not found: {default_tag}"))
    })?;

    let commit = match node.pkg.rev_type {
        RevisionType::Branch => {
            if !node.pkg.is_empty_val() {
                node.pkg.value.clone()
            } else {
                if latest == node.revision {
                    println!("{} Package hasn't changed: {}", "⚡".green(), node.pkg.import_path);
                    return Ok(None);
                }
                latest
            }
        }
        RevisionType::Tag | RevisionType::Commit => node.pkg.value.clone(),
        RevisionType::Local => {
            return Err(Error::fetch(&node.pkg.import_path, "invalid revision type: local"));
        }
    };
    node.revision = commit.clone();
    caps.insert("commit".to_string(), commit);

    // zip: https://bitbucket.org/{owner}/{repo}/get/{commit}.zip
    let staged = StagedArchive::new(session, &node.pkg.root_path, ArchiveKind::Zip)?;
    http.get_to_file(
        &expand("https://bitbucket.org/{owner}/{repo}/get/{commit}.zip", &caps),
        staged.path(),
    )
    .map_err(|e| Error::fetch(&node.pkg.import_path, format!("fail to download archive: {e}")))?;

    archive::install(session, node, staged.path(), ArchiveKind::Zip)?;
    imports_after_install(oracle, node)
}
