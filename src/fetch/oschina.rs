//! OSChina fetcher: latest revision scraped from the tree page, zip archive
//! by ref.

use std::sync::LazyLock;

use colored::Colorize;
use regex::Regex;

use super::archive::{self, ArchiveKind, StagedArchive};
use super::{expand, imports_after_install, HttpClient, Match, MASTER};
use crate::error::{Error, Result};
use crate::pkg::{Node, RevisionType};
use crate::scan::ImportOracle;
use crate::session::Session;

pub(super) const PATTERN: &str =
    r"^git\.oschina\.net/(?P<owner>[a-z0-9A-Z_.\-]+)/(?P<repo>[a-z0-9A-Z_.\-]+)(?P<dir>/[a-z0-9A-Z_.\-/]*)?$";

static REVISION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<span class='sha'>[a-z0-9A-Z]*").unwrap());

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

                let page = http.get_string(&expand(
                    "http://git.oschina.net/{owner}/{repo}/tree/{sha}",
                    &caps,
                ))?;
                let etag = REVISION
                    .find(&page)
                    .map(|m| m.as_str().trim_start_matches("<span class='sha'>").to_string())
                    .ok_or_else(|| Error::fetch(&node.pkg.import_path, "fail to get revision"))?;
                if etag == node.revision {
                    println!("{} Package hasn't changed: {}", "⚡".green(), node.pkg.import_path);
                    return Ok(None);
                }
                node.revision = etag;
            }
        }
        RevisionType::Tag | RevisionType::Commit => {
            caps.insert("sha".to_string(), node.pkg.value.clone());
        }
        RevisionType::Local => {
            return Err(Error::fetch(&node.pkg.import_path, "invalid revision type: local"));
        }
    }

    // zip: http://git.oschina.net/{owner}/{repo}/repository/archive?ref={sha}
    let staged = StagedArchive::new(session, &node.pkg.root_path, ArchiveKind::Zip)?;
    http.get_to_file(
        &expand("http://git.oschina.net/{owner}/{repo}/repository/archive?ref={sha}", &caps),
        staged.path(),
    )
    .map_err(|e| Error::fetch(&node.pkg.import_path, format!("fail to download archive: {e}")))?;

    archive::install(session, node, staged.path(), ArchiveKind::Zip)?;
    imports_after_install(oracle, node)
}
