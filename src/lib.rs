//! # gopack - Dependency Resolver and Build Environment Assembler
//!
//! gopack (`gp`) fetches import-path-addressed packages from code hosts as
//! point-in-time archives, caches them per pin, resolves transitive imports,
//! and assembles a disposable vendor tree for the external `go` toolchain.
//!
//! ## Features
//!
//! - **Pinned Dependencies**: branch/commit/tag pins, side by side in the cache
//! - **Multi-Host Fetching**: GitHub, Bitbucket, OSChina, GitCafe, Launchpad,
//!   plus meta-tag discovery for vanity import paths
//! - **Isolated Builds**: per-run vendor tree, scoped `GOPATH` override
//! - **Change Detection**: unpinned packages skip unchanged downloads
//!
//! ## Module Organization
//!
//! - [`resolve`] - Recursive dependency walker
//! - [`fetch`] - Multi-host remote fetch protocol
//! - [`vendor`] - Vendor-tree assembly
//! - [`commands`] - CLI command handlers

/// CLI command handlers extracted from main.
pub mod commands;

/// Error taxonomy.
pub mod error;

/// Toolchain subprocess invocation with a scoped environment override.
pub mod exec;

/// Multi-host remote fetch protocol.
pub mod fetch;

/// Platform link capability (symlink, junction, copy).
pub mod link;

/// Project manifest (`gopack.toml`) parsing and writing.
pub mod manifest;

/// Package identity and fetch-node data model.
pub mod pkg;

/// Local repository cache operations.
pub mod repos;

/// Recursive dependency resolution.
pub mod resolve;

/// The import oracle and its source-scanning implementation.
pub mod scan;

/// Per-run session state: directories, configuration, pin records.
pub mod session;

/// Persisted per-root revision records.
pub mod state;

/// Vendor-tree assembly.
pub mod vendor;
