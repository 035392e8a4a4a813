//! Package identity and fetch-node data model.
//!
//! A [`Pkg`] is a logical import path pinned to a revision; a [`Node`] adds
//! the bookkeeping needed to download and install it. The repository root of
//! an import path is derived from host-specific segment counts, e.g.
//! `github.com/owner/repo/sub` roots at `github.com/owner/repo`.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, Result};
use crate::session::Session;

/// How a package is pinned to a revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevisionType {
    Branch,
    Commit,
    Tag,
    /// Satisfied by a local filesystem path instead of a remote fetch.
    Local,
}

impl fmt::Display for RevisionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RevisionType::Branch => "branch",
            RevisionType::Commit => "commit",
            RevisionType::Tag => "tag",
            RevisionType::Local => "local",
        };
        f.write_str(name)
    }
}

/// Number of path segments forming the repository root per host.
const ROOT_SEGMENTS: &[(&str, usize)] = &[
    ("github.com", 3),
    ("code.google.com", 3),
    ("bitbucket.org", 3),
    ("git.oschina.net", 3),
    ("gitcafe.com", 3),
    ("launchpad.net", 2),
    ("labix.org", 3),
];

/// Returns the repository-root portion of an import path.
pub fn root_path(name: &str) -> String {
    for (prefix, num) in ROOT_SEGMENTS {
        if name.starts_with(prefix) {
            let segments: Vec<&str> = name.split('/').collect();
            if segments.len() > *num {
                return segments[..*num].join("/");
            }
            return name.to_string();
        }
    }
    name.to_string()
}

/// Returns true if the import belongs to the standard library. Standard
/// library paths have no dot in their first segment (`fmt`, `net/http`).
pub fn is_stdlib(name: &str) -> bool {
    match name.split('/').next() {
        Some(first) => !first.contains('.'),
        None => true,
    }
}

static VALID_HOST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-a-z0-9]+(?:\.[-a-z0-9]+)+$").unwrap());
static VALID_PATH_ELEMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-A-Za-z0-9~+][-A-Za-z0-9_.]*$").unwrap());

/// Returns true if `import_path` is structurally valid for a remote fetch.
pub fn is_valid_remote_path(import_path: &str) -> bool {
    let parts: Vec<&str> = import_path.split('/').collect();
    if parts.len() <= 1 {
        // Import path must contain at least one "/".
        return false;
    }
    if !VALID_HOST.is_match(parts[0]) {
        return false;
    }
    parts[1..]
        .iter()
        .all(|part| VALID_PATH_ELEMENT.is_match(part) && *part != "testdata")
}

/// Parses a manifest pin string. A value naming an existing local directory
/// becomes a Local pin; otherwise the grammar is `(branch|commit|tag):<value>`
/// with exactly two fields.
pub fn parse_pin(info: &str) -> Result<(RevisionType, String)> {
    if Path::new(info).is_dir() {
        return Ok((RevisionType::Local, info.to_string()));
    }

    let fields: Vec<&str> = info.split(':').collect();
    if fields.len() != 2 {
        return Err(Error::VersionParse(info.to_string()));
    }
    let tp = match fields[0] {
        "branch" => RevisionType::Branch,
        "commit" => RevisionType::Commit,
        "tag" => RevisionType::Tag,
        _ => return Err(Error::VersionParse(info.to_string())),
    };
    Ok((tp, fields[1].to_string()))
}

/// A package identity: full import path plus its pin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pkg {
    /// Package full import path, possibly a subpackage of the root.
    pub import_path: String,
    /// Repository root derived from the import path.
    pub root_path: String,
    pub rev_type: RevisionType,
    /// Branch name, commit hash, tag name or local path. Empty means
    /// "track latest of the default branch".
    pub value: String,
}

impl Pkg {
    pub fn new(import_path: &str, rev_type: RevisionType, value: &str) -> Pkg {
        Pkg {
            import_path: import_path.to_string(),
            root_path: root_path(import_path),
            rev_type,
            value: value.to_string(),
        }
    }

    pub fn unpinned(import_path: &str) -> Pkg {
        Pkg::new(import_path, RevisionType::Branch, "")
    }

    /// A fixed package never needs a freshness check. Branch pins and
    /// unpinned packages are mutable.
    pub fn is_fixed(&self) -> bool {
        !(self.rev_type == RevisionType::Branch || self.value.is_empty())
    }

    pub fn is_empty_val(&self) -> bool {
        self.value.is_empty()
    }

    /// Cache-path disambiguation suffix, so multiple pins of the same root
    /// can coexist side by side.
    pub fn val_suffix(&self) -> String {
        if self.value.is_empty() {
            String::new()
        } else {
            format!(".{}", self.value)
        }
    }

    pub fn ver_suffix(&self) -> String {
        if self.value.is_empty() {
            String::new()
        } else {
            format!(" @ {}:{}", self.rev_type, self.value)
        }
    }

    fn val_string(&self) -> &str {
        if self.value.is_empty() { "<latest>" } else { &self.value }
    }

    /// `import@type:value` identity string used for run-scoped dedup keys.
    pub fn ver_string(&self) -> String {
        format!("{}@{}:{}", self.import_path, self.rev_type, self.val_string())
    }
}

/// A node to be fetched from remote: a [`Pkg`] plus fetch/install bookkeeping.
/// Nodes live for one resolution run; only the root→revision pair may be
/// persisted to speed up future unpinned runs.
#[derive(Debug, Clone)]
pub struct Node {
    pub pkg: Pkg,
    /// Actual download URL; differs from the import path after vanity-import
    /// discovery.
    pub download_url: String,
    /// Local repository install location: `<repos>/<root>[.<value>]`.
    pub install_path: PathBuf,
    /// Corresponding location inside the global toolchain source root.
    pub install_gopath: PathBuf,
    /// Last observed concrete commit or etag, used for change detection.
    pub revision: String,
    /// Whether to recurse into this node's own imports.
    pub is_get_deps: bool,
    /// Skip re-downloading the node itself; only recurse.
    pub is_get_deps_only: bool,
}

impl Node {
    pub fn new(
        session: &Session,
        import_path: &str,
        rev_type: RevisionType,
        value: &str,
        is_get_deps: bool,
    ) -> Node {
        let pkg = Pkg::new(import_path, rev_type, value);
        let install_path = session.install_path(&pkg);
        let install_gopath = session
            .gopath_src()
            .map(|src| src.join(&pkg.root_path))
            .unwrap_or_default();
        Node {
            download_url: import_path.to_string(),
            install_path,
            install_gopath,
            revision: String::new(),
            is_get_deps,
            is_get_deps_only: false,
            pkg,
        }
    }

    /// True if the package exists in the local repository.
    pub fn exists(&self) -> bool {
        self.install_path.exists()
    }

    /// True if the package exists in the global toolchain source root.
    pub fn exists_gopath(&self) -> bool {
        !self.install_gopath.as_os_str().is_empty() && self.install_gopath.exists()
    }

    pub fn ver_string(&self) -> String {
        self.pkg.ver_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{RunOptions, Session};

    #[test]
    fn test_root_path_segment_rules() {
        assert_eq!(root_path("github.com/owner/repo/sub/pkg"), "github.com/owner/repo");
        assert_eq!(root_path("github.com/owner/repo"), "github.com/owner/repo");
        assert_eq!(root_path("launchpad.net/project/sub"), "launchpad.net/project");
        assert_eq!(root_path("example.com/owner/repo"), "example.com/owner/repo");
    }

    #[test]
    fn test_root_path_is_prefix_of_import_path() {
        let import = "bitbucket.org/owner/repo/deep/pkg";
        assert!(import.starts_with(&root_path(import)));
    }

    #[test]
    fn test_stdlib_detection() {
        assert!(is_stdlib("fmt"));
        assert!(is_stdlib("net/http"));
        assert!(!is_stdlib("github.com/owner/repo"));
    }

    #[test]
    fn test_valid_remote_path() {
        assert!(is_valid_remote_path("github.com/owner/repo"));
        assert!(is_valid_remote_path("example.com/pkg"));
        assert!(!is_valid_remote_path("fmt"));
        assert!(!is_valid_remote_path("github.com/owner/testdata"));
        assert!(!is_valid_remote_path("nodots/owner/repo"));
    }

    #[test]
    fn test_parse_pin() {
        assert_eq!(parse_pin("branch:dev").unwrap(), (RevisionType::Branch, "dev".into()));
        assert_eq!(parse_pin("tag:v1.2.0").unwrap(), (RevisionType::Tag, "v1.2.0".into()));
        assert_eq!(parse_pin("commit:abc123").unwrap(), (RevisionType::Commit, "abc123".into()));
    }

    #[test]
    fn test_parse_pin_rejects_malformed() {
        assert!(matches!(parse_pin("x"), Err(Error::VersionParse(_))));
        assert!(matches!(parse_pin("rev:a:b"), Err(Error::VersionParse(_))));
        assert!(matches!(parse_pin("head:dev"), Err(Error::VersionParse(_))));
    }

    #[test]
    fn test_fixedness() {
        assert!(Pkg::new("github.com/o/r", RevisionType::Tag, "v1").is_fixed());
        assert!(Pkg::new("github.com/o/r", RevisionType::Commit, "abc").is_fixed());
        assert!(!Pkg::new("github.com/o/r", RevisionType::Branch, "dev").is_fixed());
        assert!(!Pkg::unpinned("github.com/o/r").is_fixed());
    }

    #[test]
    fn test_install_path_carries_pin_suffix() {
        let tmp = tempfile::tempdir().unwrap();
        let session = Session::at(tmp.path(), tmp.path(), RunOptions::default()).unwrap();
        let node = Node::new(
            &session,
            "example.com/owner/repo",
            RevisionType::Tag,
            "v1.2.0",
            true,
        );
        assert!(node.install_path.to_string_lossy().ends_with("repo.v1.2.0"));

        let unpinned = Node::new(&session, "example.com/owner/repo", RevisionType::Branch, "", true);
        assert!(unpinned.install_path.to_string_lossy().ends_with("repo"));
    }
}
