//! Sandboxed execution environment.
//!
//! The sandbox is booted once per application lifetime and handed to the
//! [`controller::SyncController`] as an explicit dependency; no other
//! component touches it. [`local::ProcessSandbox`] is the concrete
//! implementation backed by a workspace directory and child processes.

pub mod controller;
pub mod local;

pub use controller::{SyncController, SyncPhase};
pub use local::ProcessSandbox;

use async_trait::async_trait;
use std::collections::BTreeMap;
use thiserror::Error;
use tokio::sync::oneshot;

use crate::tree::ProjectTree;

#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("Mount failed: {0}")]
    Mount(String),

    #[error("Install failed: {0}")]
    Install(String),

    #[error("Failed to start run process: {0}")]
    Start(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// The sandbox's native mount descriptor: directories are nested containers,
/// files are content leaves.
pub type MountDir = BTreeMap<String, MountEntry>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MountEntry {
    File { contents: String },
    Directory { entries: MountDir },
}

/// Translate a project tree into the nested mount descriptor.
pub fn mount_tree(tree: &ProjectTree) -> MountDir {
    let mut root = MountDir::new();

    for (path, contents) in tree.flatten() {
        let segments: Vec<&str> = path.split('/').collect();
        insert_mount_leaf(&mut root, &segments, contents, &path);
    }

    root
}

/// Insert a file leaf into the mount descriptor, creating intermediate
/// directories. If a path segment collides with an existing file, the leaf
/// is skipped (the tree invariants forbid this).
fn insert_mount_leaf(current: &mut MountDir, segments: &[&str], contents: String, path: &str) {
    if segments.len() == 1 {
        current.insert(segments[0].to_string(), MountEntry::File { contents });
        return;
    }

    match current
        .entry(segments[0].to_string())
        .or_insert_with(|| MountEntry::Directory {
            entries: MountDir::new(),
        }) {
        MountEntry::Directory { entries } => {
            insert_mount_leaf(entries, &segments[1..], contents, path)
        }
        MountEntry::File { .. } => {
            // The tree invariants forbid this; skip the leaf.
            tracing::warn!(path = %path, "Mount descriptor collision; skipping leaf");
        }
    }
}

/// Receiver resolved with the preview address once the run process signals
/// readiness. Dropped without a value if the process dies first.
pub type ReadySignal = oneshot::Receiver<String>;

/// Trait for sandboxed execution environments.
#[async_trait]
pub trait Sandbox: Send + Sync {
    /// Replace the sandbox filesystem with the given descriptor.
    async fn mount(&self, root: &MountDir) -> Result<(), SandboxError>;

    /// Best-effort terminate the current run process, if any. Absence of a
    /// process to kill is not an error.
    async fn terminate_running(&self);

    /// Install dependencies, blocking until the installer exits. Returns the
    /// exit code.
    async fn install(&self) -> Result<i32, SandboxError>;

    /// Start the long-lived run process with an attached output sink.
    async fn start(&self) -> Result<ReadySignal, SandboxError>;
}
