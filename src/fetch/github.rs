//! GitHub fetcher: refs API for the latest revision, zip archive by commit.

use colored::Colorize;
use serde::Deserialize;

use super::archive::{self, ArchiveKind, StagedArchive};
use super::{expand, imports_after_install, HttpClient, Match, MASTER};
use crate::error::{Error, Result};
use crate::pkg::{Node, RevisionType};
use crate::scan::ImportOracle;
use crate::session::Session;

pub(super) const PATTERN: &str =
    r"^github\.com/(?P<owner>[a-z0-9A-Z_.\-]+)/(?P<repo>[a-z0-9A-Z_.\-]+)(?P<dir>/[a-z0-9A-Z_.\-/]*)?$";

#[derive(Deserialize)]
struct GitRef {
    #[serde(rename = "ref")]
    name: String,
    object: GitObject,
}

#[derive(Deserialize)]
struct GitObject {
    sha: String,
}

fn credentials(session: &Session) -> String {
    match (
        session.config.github_client_id.as_deref(),
        session.config.github_client_secret.as_deref(),
    ) {
        (Some(id), Some(secret)) => format!("client_id={id}&client_secret={secret}"),
        _ => String::new(),
    }
}

pub(super) fn fetch(
    session: &Session,
    http: &HttpClient,
    oracle: &dyn ImportOracle,
    mut caps: Match,
    node: &mut Node,
) -> Result<Option<Vec<String>>> {
    match node.pkg.rev_type {
        RevisionType::Branch => {
            if !node.pkg.is_empty_val() {
                caps.insert("sha".to_string(), node.pkg.value.clone());
            } else {
                caps.insert("sha".to_string(), MASTER.to_string());

                // Only unpinned nodes need the latest-revision check.
                let mut url = expand("https://api.github.com/repos/{owner}/{repo}/git/refs", &caps);
                let cred = credentials(session);
                if !cred.is_empty() {
                    url = format!("{url}?{cred}");
                }
                match http.get_json::<Vec<GitRef>>(&url) {
                    Err(e) => {
                        println!("{} Fail to get revision for {}: {}", "!".yellow(), node.pkg.import_path, e);
                    }
                    Ok(refs) => {
                        let etag = refs
                            .iter()
                            .find(|r| r.name.starts_with("refs/heads/master"))
                            .map(|r| r.object.sha.clone())
                            .unwrap_or_default();
                        if !etag.is_empty() {
                            if etag == node.revision {
                                println!(
                                    "{} Package hasn't changed: {}",
                                    "⚡".green(),
                                    node.pkg.import_path
                                );
                                return Ok(None);
                            }
                            node.revision = etag;
                        }
                    }
                }
            }
        }
        RevisionType::Tag | RevisionType::Commit => {
            caps.insert("sha".to_string(), node.pkg.value.clone());
        }
        RevisionType::Local => {
            return Err(Error::fetch(&node.pkg.import_path, "invalid revision type: local"));
        }
    }

    // zip: https://github.com/{owner}/{repo}/archive/{sha}.zip
    let staged = StagedArchive::new(session, &node.pkg.root_path, ArchiveKind::Zip)?;
    http.get_to_file(
        &expand("https://github.com/{owner}/{repo}/archive/{sha}.zip", &caps),
        staged.path(),
    )
    .map_err(|e| Error::fetch(&node.pkg.import_path, format!("fail to download archive: {e}")))?;

    archive::install(session, node, staged.path(), ArchiveKind::Zip)?;
    imports_after_install(oracle, node)
}
