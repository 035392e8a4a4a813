//! Multi-host remote fetch protocol.
//!
//! Each supported hosting family pairs a URL-prefix and a path pattern with
//! a fetch routine that resolves the wanted revision, downloads a
//! point-in-time archive, and installs it into the local repository. Import
//! paths matching no registered service fall back to the generic meta-tag
//! discovery protocol.

use std::collections::HashMap;
use std::sync::LazyLock;

use colored::Colorize;
use regex::Regex;

use crate::error::{Error, Result};
use crate::pkg::Node;
use crate::scan::ImportOracle;
use crate::session::Session;

pub mod archive;
mod bitbucket;
mod discovery;
mod gitcafe;
mod github;
pub mod http;
mod launchpad;
mod oschina;

pub use http::HttpClient;

/// Default branch names per VCS kind.
pub(crate) const MASTER: &str = "master";
pub(crate) const DEFAULT: &str = "default";
pub(crate) const TRUNK: &str = "trunk";

pub(crate) fn default_branch(vcs: &str) -> &'static str {
    match vcs {
        "hg" => DEFAULT,
        "svn" => TRUNK,
        _ => MASTER,
    }
}

/// Capture groups of a matched service pattern, by name.
pub(crate) type Match = HashMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Host {
    Github,
    Bitbucket,
    Oschina,
    Gitcafe,
    Launchpad,
}

struct Service {
    prefix: &'static str,
    pattern: Regex,
    host: Host,
}

static SERVICES: LazyLock<Vec<Service>> = LazyLock::new(|| {
    vec![
        Service {
            prefix: "github.com/",
            pattern: Regex::new(github::PATTERN).unwrap(),
            host: Host::Github,
        },
        Service {
            prefix: "bitbucket.org/",
            pattern: Regex::new(bitbucket::PATTERN).unwrap(),
            host: Host::Bitbucket,
        },
        Service {
            prefix: "git.oschina.net/",
            pattern: Regex::new(oschina::PATTERN).unwrap(),
            host: Host::Oschina,
        },
        Service {
            prefix: "gitcafe.com/",
            pattern: Regex::new(gitcafe::PATTERN).unwrap(),
            host: Host::Gitcafe,
        },
        Service {
            prefix: "launchpad.net/",
            pattern: Regex::new(launchpad::PATTERN).unwrap(),
            host: Host::Launchpad,
        },
    ]
});

/// Downloads a node through the first matching service, or the discovery
/// fallback when none matches the import path directly.
///
/// Returns `Ok(None)` when the package is unchanged since the recorded
/// revision, otherwise the node's transitive imports (empty when recursion
/// was not requested).
pub fn download(
    session: &Session,
    http: &HttpClient,
    oracle: &dyn ImportOracle,
    node: &mut Node,
) -> Result<Option<Vec<String>>> {
    for service in SERVICES.iter() {
        if !node.download_url.starts_with(service.prefix) {
            continue;
        }
        let Some(caps) = named_captures(&service.pattern, &node.download_url) else {
            return Err(Error::fetch(
                &node.pkg.import_path,
                "cannot match package service pattern by given path",
            ));
        };
        return match service.host {
            Host::Github => github::fetch(session, http, oracle, caps, node),
            Host::Bitbucket => bitbucket::fetch(session, http, oracle, caps, node),
            Host::Oschina => oschina::fetch(session, http, oracle, caps, node),
            Host::Gitcafe => gitcafe::fetch(session, http, oracle, caps, node),
            Host::Launchpad => launchpad::fetch(session, http, oracle, caps, node),
        };
    }

    if node.pkg.import_path != node.download_url {
        return Err(Error::fetch(
            &node.pkg.import_path,
            "no matching service for discovered repository",
        ));
    }

    println!(
        "{} No service matches {}, trying meta-tag discovery...",
        "🔎".cyan(),
        node.pkg.import_path
    );
    discovery::get_dynamic(session, http, oracle, node)
}

/// Host branches end here: report imports when recursion was requested.
pub(crate) fn imports_after_install(
    oracle: &dyn ImportOracle,
    node: &Node,
) -> Result<Option<Vec<String>>> {
    if !node.is_get_deps {
        return Ok(Some(Vec::new()));
    }
    oracle
        .imports(&node.pkg.import_path, &node.pkg.root_path, &node.install_path)
        .map(Some)
}

pub(crate) fn named_captures(pattern: &Regex, input: &str) -> Option<Match> {
    let caps = pattern.captures(input)?;
    let mut map = Match::new();
    map.insert("downloadURL".to_string(), input.to_string());
    for name in pattern.capture_names().flatten() {
        if let Some(m) = caps.name(name) {
            map.insert(name.to_string(), m.as_str().to_string());
        }
    }
    Some(map)
}

/// Expands `{name}` placeholders from the capture map.
pub(crate) fn expand(template: &str, vars: &Match) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let Some(close) = rest[open..].find('}') else {
            rest = &rest[open..];
            break;
        };
        let name = &rest[open + 1..open + close];
        match vars.get(name) {
            Some(value) => out.push_str(value),
            None => out.push_str(&rest[open..open + close + 1]),
        }
        rest = &rest[open + close + 1..];
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_patterns_capture_owner_repo_dir() {
        let caps =
            named_captures(&SERVICES[0].pattern, "github.com/owner/repo/sub/dir").unwrap();
        assert_eq!(caps["owner"], "owner");
        assert_eq!(caps["repo"], "repo");
        assert_eq!(caps["dir"], "/sub/dir");

        let no_dir = named_captures(&SERVICES[0].pattern, "github.com/owner/repo").unwrap();
        assert!(!no_dir.contains_key("dir"));
    }

    #[test]
    fn test_expand_substitutes_captures() {
        let mut vars = Match::new();
        vars.insert("owner".to_string(), "o".to_string());
        vars.insert("repo".to_string(), "r".to_string());
        vars.insert("sha".to_string(), "abc".to_string());
        assert_eq!(
            expand("https://github.com/{owner}/{repo}/archive/{sha}.zip", &vars),
            "https://github.com/o/r/archive/abc.zip"
        );
    }

    #[test]
    fn test_launchpad_pattern_variants() {
        let service = SERVICES.iter().find(|s| s.host == Host::Launchpad).unwrap();
        assert!(service.pattern.is_match("launchpad.net/project"));
        assert!(service.pattern.is_match("launchpad.net/project/series"));
        assert!(service.pattern.is_match("launchpad.net/~owner/project/branch"));
    }

    #[test]
    fn test_default_branch_per_vcs() {
        assert_eq!(default_branch("git"), MASTER);
        assert_eq!(default_branch("hg"), DEFAULT);
        assert_eq!(default_branch("svn"), TRUNK);
    }
}
