//! Core library for convoy.
//!
//! This crate turns commit history plus a workspace dependency graph into an
//! ordered, consistent set of version bumps, and executes them. It is consumed
//! by the `convoy` CLI, which is a pure display layer.
//!
//! # Modules
//!
//! - [`changelog`] - Changelog generation (git-cliff) and tag-note sanitizing
//! - [`cmd`] - External command invocations with dry-run rendering
//! - [`commit`] - Conventional-commit subject classification
//! - [`config`] - Configuration loading and management
//! - [`context`] - Workspace context passed to every collaborator call
//! - [`error`] - Error types and result aliases
//! - [`gather`] - Per-unit release decision gathering
//! - [`git`] - Git queries for release workflows
//! - [`manifest`] - Cargo.toml / Cargo.lock version rewriting
//! - [`matchlist`] - Release-relevance file filtering
//! - [`propagate`] - Dependency ordering and cascading re-bumps
//! - [`release`] - Plan execution (dry-run or for real)
//! - [`semver_check`] - API compatibility checking via cargo-semver-checks
//! - [`version`] - Strict version parsing and bump arithmetic
//! - [`workspace`] - Package registry loaded from the workspace manifest
//!
//! # Quick Start
//!
//! ```no_run
//! use convoy_core::{Config, ConfigLoader};
//!
//! let config = ConfigLoader::new()
//!     .with_user_config(true)
//!     .load()
//!     .expect("Failed to load configuration");
//!
//! println!("Log level: {:?}", config.log_level);
//! ```
#![deny(unsafe_code)]

pub mod changelog;

pub mod cmd;

pub mod commit;

pub mod config;

pub mod context;

pub mod error;

pub mod gather;

pub mod git;

pub mod manifest;

pub mod matchlist;

pub mod propagate;

pub mod release;

pub mod semver_check;

pub mod version;

pub mod workspace;

pub use config::{Config, ConfigLoader, LogLevel};

pub use context::WorkspaceContext;

pub use error::{ConfigError, ConfigResult};

// Re-export semver so downstream crates don't need a direct dependency.
pub use semver;
