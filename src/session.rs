//! Per-run session state: directories, configuration and pin records.
//!
//! The session owns everything a resolution needs — the local repository
//! root, temp staging area, global toolchain source root, proxy
//! configuration and the persisted revision records — and is passed by
//! reference through the walker/linker call chain, so independent
//! resolutions can run in one process.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::link::LinkBackend;
use crate::pkg::Pkg;
use crate::state::NodeState;

/// Options a single run was invoked with.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Re-resolve the latest revision for Branch-type pins.
    pub update: bool,
    /// Ignore packages already present in the toolchain source root.
    pub remote: bool,
    /// Download the named packages only, without recursing into imports.
    pub download_only: bool,
    /// Copy fetched packages into the toolchain source root.
    pub copy_gopath: bool,
    pub verbose: bool,
    /// Turn any accumulated fetch failure into a non-zero exit.
    pub strict: bool,
}

/// Persisted global configuration (`~/.gopack/config.toml`).
#[derive(Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_proxy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_client_secret: Option<String>,
}

impl Config {
    pub fn load(path: &Path) -> Config {
        fs::read_to_string(path)
            .ok()
            .and_then(|content| toml::from_str(&content).ok())
            .unwrap_or_default()
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml::to_string_pretty(self).unwrap_or_default())?;
        Ok(())
    }
}

pub struct Session {
    /// The per-user home, `~/.gopack`.
    pub home: PathBuf,
    /// Directory gopack was invoked from.
    pub work_dir: PathBuf,
    /// The local repository: `~/.gopack/repos`.
    pub repo_root: PathBuf,
    /// Archive staging area: `~/.gopack/temp`.
    pub temp_root: PathBuf,
    /// First entry of the toolchain source-root search variable.
    pub gopath: Option<PathBuf>,
    pub config: Config,
    pub state: Mutex<NodeState>,
    pub link_backend: LinkBackend,
    pub options: RunOptions,
}

impl Session {
    /// Builds a session rooted at the invoking user's home directory.
    pub fn from_env(options: RunOptions) -> Result<Session> {
        let home_base = dirs::home_dir().ok_or_else(|| {
            Error::Io(std::io::Error::other("could not determine home directory"))
        })?;
        let work_dir = env::current_dir()?;
        Session::at(&home_base, &work_dir, options)
    }

    /// Builds a session with an explicit home base; tests use temp roots.
    pub fn at(home_base: &Path, work_dir: &Path, options: RunOptions) -> Result<Session> {
        let home = home_base.join(".gopack");
        let repo_root = home.join("repos");
        let temp_root = home.join("temp");
        fs::create_dir_all(&repo_root)?;
        fs::create_dir_all(&temp_root)?;

        let gopath = env::var_os("GOPATH")
            .and_then(|raw| env::split_paths(&raw).next())
            .filter(|p| !p.as_os_str().is_empty());

        let config = Config::load(&home.join("config.toml"));
        let state = NodeState::load(&home.join("data").join("nodes.toml"))?;
        let link_backend = LinkBackend::detect(&temp_root);

        Ok(Session {
            repo_root,
            temp_root,
            gopath,
            config,
            state: Mutex::new(state),
            link_backend,
            options,
            work_dir: work_dir.to_path_buf(),
            home,
        })
    }

    pub fn config_path(&self) -> PathBuf {
        self.home.join("config.toml")
    }

    fn state_path(&self) -> PathBuf {
        self.home.join("data").join("nodes.toml")
    }

    pub fn save_state(&self) -> Result<()> {
        self.state.lock().unwrap().save(&self.state_path())
    }

    pub fn save_config(&self) -> Result<()> {
        self.config.save(&self.config_path())
    }

    /// The `src` subtree of the toolchain source root, if one is configured.
    pub fn gopath_src(&self) -> Option<PathBuf> {
        self.gopath.as_ref().map(|g| g.join("src"))
    }

    /// Deterministic install location: `<repos>/<root>[.<value>]`.
    pub fn install_path(&self, pkg: &Pkg) -> PathBuf {
        let mut path = self.repo_root.join(&pkg.root_path).into_os_string();
        path.push(pkg.val_suffix());
        PathBuf::from(path)
    }

    /// A fresh archive staging path under `~/.gopack/temp/archive`. The
    /// nonce keeps concurrent fetches of the same root from colliding.
    pub fn staged_archive_path(&self, root: &str, ext: &str) -> PathBuf {
        self.temp_root
            .join("archive")
            .join(format!("{}-{}.{}", root, nonce(), ext))
    }

    /// A scratch directory for extract-then-rename installs.
    pub fn scratch_dir(&self, root: &str) -> PathBuf {
        self.temp_root
            .join("archive")
            .join(format!("{}-{}", root, nonce()))
    }
}

fn nonce() -> u128 {
    static COUNTER: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(0);
    let tick = COUNTER.fetch_add(1, std::sync::atomic::Ordering::Relaxed) as u128;
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    nanos.wrapping_add(tick)
}
