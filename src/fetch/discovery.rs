//! Generic meta-tag discovery for import paths no registered service
//! matches.
//!
//! The host is asked over HTTPS (falling back to HTTP) with a `?go-get=1`
//! query; its response must carry exactly one `go-import` meta declaration
//! naming the repository root, VCS kind and clone URL. The declared root
//! must be a prefix-consistent match for the import path, after which the
//! node's download URL is rewritten and the fetch re-dispatched.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, Result};
use crate::pkg::Node;
use crate::scan::ImportOracle;
use crate::session::Session;

use super::HttpClient;

static META_NAME_FIRST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<meta[^>]+name\s*=\s*"go-import"[^>]+content\s*=\s*"([^"]+)""#).unwrap()
});
static META_CONTENT_FIRST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<meta[^>]+content\s*=\s*"([^"]+)"[^>]+name\s*=\s*"go-import""#).unwrap()
});

#[derive(Debug, PartialEq, Eq)]
pub(super) struct MetaImport {
    pub root: String,
    pub vcs: String,
    /// Clone URL with the scheme stripped.
    pub repo: String,
    /// The import path's remainder below the declared root.
    pub dir: String,
}

/// Parses the single expected `go-import` declaration out of an HTML page.
pub(super) fn parse_meta(import_path: &str, body: &str) -> Result<MetaImport> {
    // The declaration lives in the document head.
    let head = match body.find("</head>") {
        Some(end) => &body[..end],
        None => body,
    };

    let mut found: Option<MetaImport> = None;
    let contents = META_NAME_FIRST
        .captures_iter(head)
        .chain(META_CONTENT_FIRST.captures_iter(head))
        .map(|cap| cap[1].to_string());

    for content in contents {
        let fields: Vec<&str> = content.split_whitespace().collect();
        if fields.len() != 3 {
            continue;
        }
        let (root, vcs, repo_url) = (fields[0], fields[1], fields[2]);
        if !import_path.starts_with(root)
            || !(import_path.len() == root.len() || import_path.as_bytes()[root.len()] == b'/')
        {
            continue;
        }
        if let Some(prior) = &found {
            if prior.root == root {
                continue;
            }
            return Err(Error::fetch(import_path, "more than one go-import meta found"));
        }

        let repo_url = repo_url
            .strip_suffix(&format!(".{vcs}"))
            .unwrap_or(repo_url);
        let repo = match repo_url.find("://") {
            Some(i) => &repo_url[i + 3..],
            None => return Err(Error::fetch(import_path, "bad repo URL in go-import meta")),
        };

        found = Some(MetaImport {
            root: root.to_string(),
            vcs: vcs.to_string(),
            repo: repo.to_string(),
            dir: import_path[root.len()..].to_string(),
        });
    }

    found.ok_or_else(|| Error::fetch(import_path, "go-import meta not found"))
}

fn fetch_meta(http: &HttpClient, import_path: &str) -> Result<MetaImport> {
    let mut uri = import_path.to_string();
    if !uri.contains('/') {
        // Add slash for the root of a domain.
        uri.push('/');
    }
    uri.push_str("?go-get=1");

    for scheme in ["https", "http"] {
        match http.call(&format!("{scheme}://{uri}")) {
            Ok(response) if response.status() == 200 => {
                let body = response
                    .into_string()
                    .map_err(|e| Error::fetch(import_path, e))?;
                return parse_meta(import_path, &body);
            }
            _ => continue,
        }
    }
    Err(Error::fetch(import_path, "fail to make discovery request"))
}

/// Resolves a vanity import path and retries the fetch against the
/// discovered repository.
pub(super) fn get_dynamic(
    session: &Session,
    http: &HttpClient,
    oracle: &dyn ImportOracle,
    node: &mut Node,
) -> Result<Option<Vec<String>>> {
    let meta = fetch_meta(http, &node.pkg.import_path)?;

    if meta.root != node.pkg.import_path {
        // Re-confirm at the declared root: it must claim itself.
        let root_meta = fetch_meta(http, &meta.root)?;
        if root_meta.root != meta.root {
            return Err(Error::fetch(&node.pkg.import_path, "project root mismatch"));
        }
    }

    node.download_url = format!("{}{}", meta.repo, meta.dir);
    super::download(session, http, oracle, node)
}
