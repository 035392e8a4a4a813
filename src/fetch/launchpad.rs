//! Launchpad fetcher: bazaar branch tarball, with the series probe deciding
//! whether the second path segment is part of the branch or a directory.

use super::archive::{self, ArchiveKind, StagedArchive};
use super::{expand, imports_after_install, HttpClient, Match};
use crate::error::{Error, Result};
use crate::pkg::Node;
use crate::scan::ImportOracle;
use crate::session::Session;

pub(super) const PATTERN: &str = r"^launchpad\.net/(?P<repo>(?P<project>[a-z0-9A-Z_.\-]+)(?P<series>/[a-z0-9A-Z_.\-]+)?|~[a-z0-9A-Z_.\-]+/(\+junk|[a-z0-9A-Z_.\-]+)/[a-z0-9A-Z_.\-]+)(?P<dir>/[a-z0-9A-Z_.\-/]+)*$";

pub(super) fn fetch(
    session: &Session,
    http: &HttpClient,
    oracle: &dyn ImportOracle,
    mut caps: Match,
    node: &mut Node,
) -> Result<Option<Vec<String>>> {
    let project = caps.get("project").cloned().unwrap_or_default();
    let series = caps.get("series").cloned().unwrap_or_default();

    if !project.is_empty() && !series.is_empty() {
        // The import may be launchpad.net/{root}/{dir} rather than a
        // project series; a missing branch-format page tells them apart.
        let probe = expand("https://code.launchpad.net/{project}{series}/.bzr/branch-format", &caps);
        match http.call(&probe) {
            Ok(_) => {}
            Err(ureq::Error::Status(404, _)) => {
                let dir = caps.get("dir").cloned().unwrap_or_default();
                caps.insert("repo".to_string(), project);
                caps.insert("dir".to_string(), format!("{series}{dir}"));
            }
            Err(e) => return Err(Error::fetch(&node.pkg.import_path, e)),
        }
    }

    // tar.gz: https://bazaar.launchpad.net/+branch/{repo}/tarball[/{rev}]
    let mut url = expand("https://bazaar.launchpad.net/+branch/{repo}/tarball", &caps);
    if !node.pkg.value.is_empty() {
        url = format!("{}/{}", url, node.pkg.value);
    }

    let staged = StagedArchive::new(session, &node.pkg.root_path, ArchiveKind::TarGz)?;
    http.get_to_file(&url, staged.path())
        .map_err(|e| Error::fetch(&node.pkg.import_path, format!("fail to download archive: {e}")))?;

    archive::install(session, node, staged.path(), ArchiveKind::TarGz)?;
    imports_after_install(oracle, node)
}
