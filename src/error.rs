//! Error taxonomy for resolution, fetching, linking and toolchain runs.
//!
//! Per-dependency fetch failures are recovered by the walker (logged,
//! counted, excluded from the resolved set); version-parse and link errors
//! abort the run.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Structurally malformed import path. The dependency is skipped and
    /// counted as a failure; siblings keep resolving.
    #[error("invalid import path: {0}")]
    InvalidImportPath(String),

    /// Network, API or archive error while fetching one dependency.
    #[error("fail to fetch {pkg}: {reason}")]
    Fetch { pkg: String, reason: String },

    /// Malformed pin string in a manifest. Fatal: the user must fix the file.
    #[error("cannot parse dependency version: {0}")]
    VersionParse(String),

    /// Filesystem link/copy error while assembling the vendor tree. Fatal:
    /// a partially linked tree cannot be safely built against.
    #[error("fail to link dependency: {0}")]
    Link(String),

    /// The external toolchain subprocess returned non-zero. Surfaced
    /// verbatim, not interpreted.
    #[error("toolchain failed: {0}")]
    Toolchain(std::process::ExitStatus),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn fetch(pkg: impl ToString, reason: impl ToString) -> Error {
        Error::Fetch {
            pkg: pkg.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn link(reason: impl ToString) -> Error {
        Error::Link(reason.to_string())
    }
}
