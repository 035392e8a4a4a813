//! Recursive dependency resolution.
//!
//! The walker drains an explicit worklist instead of recursing, so diamonds
//! and cycles converge on the dedup sets rather than on call-stack behavior:
//! a root can only be pending-fetch once per run. Fetch failures are
//! accumulated and never abort sibling work.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::fs;
use std::sync::Mutex;

use colored::Colorize;

use crate::error::{Error, Result};
use crate::fetch::{self, HttpClient};
use crate::manifest::{Manifest, MANIFEST_NAME};
use crate::pkg::{self, Node, Pkg, RevisionType};
use crate::repos;
use crate::scan::ImportOracle;
use crate::session::Session;

/// The walker's seam to the remote fetch protocol. Graph-shape tests
/// substitute a scripted fetcher; production wires [`RemoteFetcher`].
pub trait Fetcher {
    /// Returns `Ok(None)` for "unchanged, nothing to do", otherwise the
    /// node's transitive imports.
    fn download(&self, session: &Session, node: &mut Node) -> Result<Option<Vec<String>>>;
}

pub struct RemoteFetcher<'a> {
    pub http: &'a HttpClient,
    pub oracle: &'a dyn ImportOracle,
}

impl Fetcher for RemoteFetcher<'_> {
    fn download(&self, session: &Session, node: &mut Node) -> Result<Option<Vec<String>>> {
        fetch::download(session, self.http, self.oracle, node)
    }
}

/// Outcome of one resolution run.
#[derive(Debug, Default)]
pub struct Resolution {
    /// Root path → the package that satisfied it. One entry per root.
    pub pkgs: BTreeMap<String, Pkg>,
    pub downloaded: usize,
    pub failed: usize,
    /// Per-dependency failures, accumulated rather than raised.
    pub errors: Vec<Error>,
}

pub struct Resolver<'a> {
    session: &'a Session,
    fetcher: &'a dyn Fetcher,
    oracle: &'a dyn ImportOracle,
    manifest: &'a Manifest,
    target: String,
    // Dedup sets keyed by "root@type:value"; Mutex-guarded so sibling
    // subtrees may fetch concurrently.
    attempted: Mutex<HashSet<String>>,
    skip_logged: Mutex<HashSet<String>>,
    copied: Mutex<HashSet<String>>,
}

impl<'a> Resolver<'a> {
    pub fn new(
        session: &'a Session,
        fetcher: &'a dyn Fetcher,
        oracle: &'a dyn ImportOracle,
        manifest: &'a Manifest,
        target: &str,
    ) -> Resolver<'a> {
        Resolver {
            session,
            fetcher,
            oracle,
            manifest,
            target: target.to_string(),
            attempted: Mutex::new(HashSet::new()),
            skip_logged: Mutex::new(HashSet::new()),
            copied: Mutex::new(HashSet::new()),
        }
    }

    /// Resolves the transitive closure of `seeds`, fetching what is missing
    /// or stale, at most once per root.
    pub fn resolve(&self, seeds: Vec<Node>) -> Result<Resolution> {
        let mut res = Resolution::default();
        let mut queue: VecDeque<Node> = seeds.into();

        while let Some(mut node) = queue.pop_front() {
            if node.pkg.import_path == "C" {
                continue;
            }
            if !pkg::is_valid_remote_path(&node.pkg.import_path) {
                println!("{} Skipped invalid package: {}", "x".red(), node.ver_string());
                res.errors.push(Error::InvalidImportPath(node.ver_string()));
                res.failed += 1;
                continue;
            }
            if self.is_subpackage(&node.pkg.root_path) {
                continue;
            }
            // A root is visited at most once per run, however many import
            // edges reach it.
            if res.pkgs.contains_key(&node.pkg.root_path) {
                self.log_skip_once(&node, "resolved");
                continue;
            }
            if !self.attempted.lock().unwrap().insert(node.ver_string()) {
                self.log_skip_once(&node, "downloaded");
                continue;
            }

            if node.pkg.is_fixed() && node.exists() {
                node.is_get_deps_only = true;
            }

            let imports = match self.acquire(&mut node, &mut res) {
                Acquired::Imports(imports) => imports,
                Acquired::Failed => continue,
            };

            res.pkgs.insert(node.pkg.root_path.clone(), node.pkg.clone());
            self.enqueue_imports(&node, imports, &mut queue);
        }

        Ok(res)
    }

    /// Makes the node's source available locally, fetching unless it can be
    /// reused, and returns the imports to recurse into.
    fn acquire(&self, node: &mut Node, res: &mut Resolution) -> Acquired {
        // Local pins never touch the network; the vendor linker resolves
        // them straight to their directory.
        if node.pkg.rev_type == RevisionType::Local {
            let dir = std::path::PathBuf::from(&node.pkg.value);
            return Acquired::Imports(self.scan_existing(node, dir));
        }

        let update = self.session.options.update && !node.pkg.is_fixed();

        // Update-in-place for checkouts the user manages with a VCS client.
        if self.session.options.update
            && self.session.options.copy_gopath
            && !node.install_gopath.as_os_str().is_empty()
        {
            if let Some(vcs) = repos::vcs_name(&node.install_gopath) {
                return match repos::update_by_vcs(node, vcs) {
                    Ok(()) => Acquired::Imports(self.scan_existing(node, node.install_gopath.clone())),
                    Err(e) => {
                        println!("{} Fail to update {}: {}", "x".red(), node.pkg.root_path, e);
                        res.errors.push(e);
                        res.failed += 1;
                        Acquired::Failed
                    }
                };
            }
        }

        // Reuse what is already present unless this run forces freshness.
        if !update && (node.is_get_deps_only || node.exists()) {
            self.log_skip_once(node, "installed");
            if self.session.options.copy_gopath
                && self.copied.lock().unwrap().insert(node.ver_string())
            {
                if let Err(e) = repos::copy_to_gopath(node) {
                    res.errors.push(e);
                    res.failed += 1;
                }
            }
            return Acquired::Imports(self.scan_existing(node, node.install_path.clone()));
        }
        if !update
            && node.pkg.is_empty_val()
            && !self.session.options.remote
            && node.exists_gopath()
        {
            self.log_skip_once(node, "GOPATH");
            return Acquired::Imports(self.scan_existing(node, node.install_gopath.clone()));
        }

        // Fetch. Prior revision records drive the "unchanged" check.
        println!("{} Downloading package: {}", "📦".blue(), node.ver_string());
        node.revision = self
            .session
            .state
            .lock()
            .unwrap()
            .revision(&node.pkg.root_path)
            .unwrap_or_default()
            .to_string();

        match self.fetcher.download(self.session, node) {
            Err(e) => {
                println!("{} Fail to download {}: {}", "x".red(), node.ver_string(), e);
                res.errors.push(e);
                res.failed += 1;
                let _ = fs::remove_dir_all(&node.install_path);
                Acquired::Failed
            }
            Ok(unchanged_or_imports) => {
                res.downloaded += 1;
                println!("{} Got {}", "✓".green(), node.ver_string());

                if node.pkg.is_empty_val() && !node.revision.is_empty() {
                    self.session
                        .state
                        .lock()
                        .unwrap()
                        .set_revision(&node.pkg.root_path, &node.revision);
                }
                if self.session.options.copy_gopath
                    && !node.install_gopath.as_os_str().is_empty()
                    && repos::vcs_name(&node.install_gopath).is_none()
                    && self.copied.lock().unwrap().insert(node.pkg.root_path.clone())
                {
                    if let Err(e) = repos::copy_to_gopath(node) {
                        res.errors.push(e);
                        res.failed += 1;
                    }
                }

                match unchanged_or_imports {
                    // Unchanged: nothing new on disk, but transitive
                    // discovery still wants the cached tree's imports.
                    None => Acquired::Imports(self.scan_existing(node, node.install_path.clone())),
                    Some(imports) => Acquired::Imports(imports),
                }
            }
        }
    }

    /// Enqueues a node's imports, applying pin overrides from the
    /// dependency's own manifest first, then the project manifest.
    fn enqueue_imports(&self, node: &Node, imports: Vec<String>, queue: &mut VecDeque<Node>) {
        if imports.is_empty() {
            return;
        }

        let dep_manifest = Manifest::load(&node.install_path.join(MANIFEST_NAME)).ok();
        if dep_manifest.as_ref().is_some_and(|m| !m.deps.is_empty()) {
            println!("{} Found dependency manifest: {}", "🔎".cyan(), node.ver_string());
        }

        for name in imports {
            let root = pkg::root_path(&name);
            let pin = dep_manifest
                .as_ref()
                .and_then(|m| m.pin_for(&root).ok().flatten())
                .or_else(|| self.manifest.pin_for(&root).ok().flatten());
            let (rev_type, value) = pin.unwrap_or((RevisionType::Branch, String::new()));
            let is_get_deps = !self.session.options.download_only;
            queue.push_back(Node::new(self.session, &name, rev_type, &value, is_get_deps));
        }
    }

    /// Imports of an already-present tree; scan problems degrade to a
    /// warning rather than failing the node.
    fn scan_existing(&self, node: &Node, dir: std::path::PathBuf) -> Vec<String> {
        if !node.is_get_deps {
            return Vec::new();
        }
        match self
            .oracle
            .imports(&node.pkg.import_path, &node.pkg.root_path, &dir)
        {
            Ok(imports) => imports,
            Err(e) => {
                println!(
                    "{} Fail to list imports of {}: {}",
                    "!".yellow(),
                    node.pkg.import_path,
                    e
                );
                Vec::new()
            }
        }
    }

    /// An import is part of the project itself when the working directory
    /// sits at its root or the import lives under the target.
    fn is_subpackage(&self, root_path: &str) -> bool {
        let work = self.session.work_dir.to_string_lossy().replace('\\', "/");
        work.ends_with(root_path) || root_path.starts_with(&self.target)
    }

    fn log_skip_once(&self, node: &Node, reason: &str) {
        if self.skip_logged.lock().unwrap().insert(node.ver_string()) && self.session.options.verbose
        {
            println!("{} Skipped {} package: {}", "⚡".green(), reason, node.ver_string());
        }
    }
}

enum Acquired {
    Imports(Vec<String>),
    Failed,
}

/// Builds seed nodes for a set of import paths, applying manifest pins.
/// A malformed pin aborts before any network activity.
pub fn seed_nodes(session: &Session, manifest: &Manifest, imports: &[String]) -> Result<Vec<Node>> {
    let is_get_deps = !session.options.download_only;
    let mut nodes = Vec::with_capacity(imports.len());
    for name in imports {
        let root = pkg::root_path(name);
        let (rev_type, value) = manifest
            .pin_for(&root)?
            .unwrap_or((RevisionType::Branch, String::new()));
        nodes.push(Node::new(session, &root, rev_type, &value, is_get_deps));
    }
    Ok(nodes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::RunOptions;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted fetcher: import graph as a table, counting fetches per root.
    struct StubFetcher {
        graph: HashMap<String, Vec<String>>,
        fetches: Mutex<Vec<String>>,
        unchanged: HashSet<String>,
    }

    impl StubFetcher {
        fn new(edges: &[(&str, &[&str])]) -> StubFetcher {
            StubFetcher {
                graph: edges
                    .iter()
                    .map(|(root, deps)| {
                        (root.to_string(), deps.iter().map(|d| d.to_string()).collect())
                    })
                    .collect(),
                fetches: Mutex::new(Vec::new()),
                unchanged: HashSet::new(),
            }
        }

        fn fetch_count(&self, root: &str) -> usize {
            self.fetches.lock().unwrap().iter().filter(|r| *r == root).count()
        }
    }

    impl Fetcher for StubFetcher {
        fn download(&self, _session: &Session, node: &mut Node) -> Result<Option<Vec<String>>> {
            self.fetches.lock().unwrap().push(node.pkg.root_path.clone());
            if self.unchanged.contains(&node.pkg.root_path) {
                return Ok(None);
            }
            match self.graph.get(&node.pkg.root_path) {
                Some(imports) => Ok(Some(imports.clone())),
                None => Err(Error::fetch(&node.pkg.import_path, "unknown package")),
            }
        }
    }

    /// Oracle used for trees already on disk; the stub graphs never hit it.
    struct EmptyOracle;
    impl ImportOracle for EmptyOracle {
        fn imports(&self, _: &str, _: &str, _: &std::path::Path) -> Result<Vec<String>> {
            Ok(Vec::new())
        }
    }

    fn session() -> (tempfile::TempDir, Session) {
        let tmp = tempfile::tempdir().unwrap();
        let work = tmp.path().join("work");
        std::fs::create_dir_all(&work).unwrap();
        let session = Session::at(tmp.path(), &work, RunOptions::default()).unwrap();
        (tmp, session)
    }

    fn run(
        session: &Session,
        fetcher: &StubFetcher,
        seeds: &[&str],
    ) -> Resolution {
        let manifest = Manifest::default();
        let oracle = EmptyOracle;
        let resolver = Resolver::new(session, fetcher, &oracle, &manifest, "example.com/me/app");
        let nodes = seeds
            .iter()
            .map(|name| Node::new(session, name, RevisionType::Branch, "", true))
            .collect();
        resolver.resolve(nodes).unwrap()
    }

    #[test]
    fn test_diamond_collapses_to_one_fetch() {
        let (_tmp, session) = session();
        let fetcher = StubFetcher::new(&[
            ("github.com/a/left", &["github.com/a/shared"]),
            ("github.com/a/right", &["github.com/a/shared"]),
            ("github.com/a/shared", &[]),
        ]);

        let res = run(&session, &fetcher, &["github.com/a/left", "github.com/a/right"]);
        assert_eq!(fetcher.fetch_count("github.com/a/shared"), 1);
        assert_eq!(res.pkgs.len(), 3);
        assert_eq!(res.failed, 0);
    }

    #[test]
    fn test_cycle_terminates() {
        let (_tmp, session) = session();
        let fetcher = StubFetcher::new(&[
            ("github.com/a/one", &["github.com/a/two"]),
            ("github.com/a/two", &["github.com/a/one"]),
        ]);

        let res = run(&session, &fetcher, &["github.com/a/one"]);
        assert_eq!(fetcher.fetch_count("github.com/a/one"), 1);
        assert_eq!(fetcher.fetch_count("github.com/a/two"), 1);
        assert_eq!(res.pkgs.len(), 2);
    }

    #[test]
    fn test_fetch_failure_spares_siblings() {
        let (_tmp, session) = session();
        let fetcher = StubFetcher::new(&[("github.com/a/good", &[])]);

        let res = run(&session, &fetcher, &["github.com/a/bad", "github.com/a/good"]);
        assert_eq!(res.failed, 1);
        assert_eq!(res.downloaded, 1);
        assert!(res.pkgs.contains_key("github.com/a/good"));
        assert!(!res.pkgs.contains_key("github.com/a/bad"));
        assert!(matches!(res.errors[0], Error::Fetch { .. }));
    }

    #[test]
    fn test_invalid_import_path_counted_not_fetched() {
        let (_tmp, session) = session();
        let fetcher = StubFetcher::new(&[]);

        let res = run(&session, &fetcher, &["not-remote"]);
        assert_eq!(res.failed, 1);
        assert!(fetcher.fetches.lock().unwrap().is_empty());
        assert!(matches!(res.errors[0], Error::InvalidImportPath(_)));
    }

    #[test]
    fn test_subpackages_of_target_skipped() {
        let (_tmp, session) = session();
        let fetcher = StubFetcher::new(&[]);

        let res = run(&session, &fetcher, &["example.com/me/app/internal/util"]);
        assert!(res.pkgs.is_empty());
        assert_eq!(res.failed, 0);
    }

    #[test]
    fn test_manifest_pin_applied_to_seed() {
        let (_tmp, session) = session();
        let mut manifest = Manifest::default();
        manifest
            .deps
            .insert("example.com/owner/repo".to_string(), "tag:v1.2.0".to_string());

        let seeds =
            seed_nodes(&session, &manifest, &["example.com/owner/repo".to_string()]).unwrap();
        assert_eq!(seeds[0].pkg.rev_type, RevisionType::Tag);
        assert_eq!(seeds[0].pkg.value, "v1.2.0");
        assert!(seeds[0].install_path.to_string_lossy().ends_with("repo.v1.2.0"));
    }

    #[test]
    fn test_malformed_seed_pin_aborts_before_any_fetch() {
        let (_tmp, session) = session();
        let mut manifest = Manifest::default();
        manifest
            .deps
            .insert("example.com/owner/repo".to_string(), "x".to_string());

        let result = seed_nodes(&session, &manifest, &["example.com/owner/repo".to_string()]);
        assert!(matches!(result, Err(Error::VersionParse(_))));
    }

    #[test]
    fn test_unchanged_package_still_resolves() {
        let (_tmp, session) = session();
        let mut fetcher = StubFetcher::new(&[("github.com/a/dep", &[])]);
        fetcher.unchanged.insert("github.com/a/dep".to_string());

        let res = run(&session, &fetcher, &["github.com/a/dep"]);
        assert!(res.pkgs.contains_key("github.com/a/dep"));
        assert_eq!(res.failed, 0);
    }

    #[test]
    fn test_existing_cache_entry_not_refetched() {
        let (_tmp, session) = session();
        let fetcher = StubFetcher::new(&[]);

        // Pre-populate the cache for a fixed pin.
        let node = Node::new(&session, "github.com/a/dep", RevisionType::Tag, "v1", true);
        std::fs::create_dir_all(&node.install_path).unwrap();

        let manifest_src = "[deps]\n\"github.com/a/dep\" = \"tag:v1\"\n";
        let manifest: Manifest = toml::from_str(manifest_src).unwrap();
        let oracle = EmptyOracle;
        let resolver = Resolver::new(&session, &fetcher, &oracle, &manifest, "example.com/me/app");
        let seeds = seed_nodes(&session, &manifest, &["github.com/a/dep".to_string()]).unwrap();
        let res = resolver.resolve(seeds).unwrap();

        assert!(fetcher.fetches.lock().unwrap().is_empty());
        assert!(res.pkgs.contains_key("github.com/a/dep"));
    }

    #[test]
    fn test_update_refetches_branch_pins_only() {
        let (_tmp, mut session_owned) = session();
        session_owned.options.update = true;
        let session = session_owned;

        let fetcher = StubFetcher::new(&[
            ("github.com/a/branchy", &[]),
            ("github.com/a/tagged", &[]),
        ]);

        // Both already cached.
        for (name, tp, val) in [
            ("github.com/a/branchy", RevisionType::Branch, ""),
            ("github.com/a/tagged", RevisionType::Tag, "v1"),
        ] {
            let node = Node::new(&session, name, tp, val, true);
            std::fs::create_dir_all(&node.install_path).unwrap();
        }

        let manifest: Manifest =
            toml::from_str("[deps]\n\"github.com/a/tagged\" = \"tag:v1\"\n").unwrap();
        let oracle = EmptyOracle;
        let resolver = Resolver::new(&session, &fetcher, &oracle, &manifest, "example.com/me/app");
        let seeds = seed_nodes(
            &session,
            &manifest,
            &["github.com/a/branchy".to_string(), "github.com/a/tagged".to_string()],
        )
        .unwrap();
        resolver.resolve(seeds).unwrap();

        assert_eq!(fetcher.fetch_count("github.com/a/branchy"), 1);
        assert_eq!(fetcher.fetch_count("github.com/a/tagged"), 0);
    }

    #[test]
    fn test_revision_recorded_for_unpinned_nodes() {
        let (_tmp, session) = session();

        struct RevFetcher(AtomicUsize);
        impl Fetcher for RevFetcher {
            fn download(&self, _s: &Session, node: &mut Node) -> Result<Option<Vec<String>>> {
                self.0.fetch_add(1, Ordering::SeqCst);
                node.revision = "deadbeef".to_string();
                Ok(Some(Vec::new()))
            }
        }

        let fetcher = RevFetcher(AtomicUsize::new(0));
        let manifest = Manifest::default();
        let oracle = EmptyOracle;
        let resolver = Resolver::new(&session, &fetcher, &oracle, &manifest, "example.com/me/app");
        let seeds = vec![Node::new(&session, "github.com/a/dep", RevisionType::Branch, "", true)];
        resolver.resolve(seeds).unwrap();

        assert_eq!(
            session.state.lock().unwrap().revision("github.com/a/dep"),
            Some("deadbeef")
        );
    }
}
