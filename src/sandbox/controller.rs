//! Sandbox synchronization controller.
//!
//! Owns the mount/remount lifecycle against a single sandbox handle:
//!
//! ```text
//! Unmounted --mount ok--> Mounted --run started--> Running
//!     ^                      |
//!     |                      | install non-zero: stay Mounted, no process
//!     +----mount failed------+
//! ```
//!
//! Every tree change goes through [`SyncController::sync`]. A sync requested
//! while one is in flight is coalesced into exactly one follow-up cycle with
//! the latest tree; two mounts never run concurrently against the same
//! sandbox.

use std::sync::Arc;
use tokio::sync::{watch, Mutex};

use super::{mount_tree, Sandbox, SandboxError};
use crate::tree::ProjectTree;

/// Externally observable phase of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Unmounted,
    Mounting,
    Mounted,
    Running,
}

struct ControllerState {
    phase: SyncPhase,
    mounted_tree: Option<ProjectTree>,
    in_flight: bool,
    pending: Option<ProjectTree>,
    /// Bumped at the start of every cycle; readiness signals from a
    /// superseded run process are discarded by comparing against it.
    epoch: u64,
}

pub struct SyncController {
    sandbox: Arc<dyn Sandbox>,
    /// Shared with the spawned readiness task, which must check the epoch.
    state: Arc<Mutex<ControllerState>>,
    preview: watch::Sender<Option<String>>,
}

impl SyncController {
    pub fn new(sandbox: Arc<dyn Sandbox>) -> Arc<Self> {
        let (preview, _) = watch::channel(None);
        Arc::new(Self {
            sandbox,
            state: Arc::new(Mutex::new(ControllerState {
                phase: SyncPhase::Unmounted,
                mounted_tree: None,
                in_flight: false,
                pending: None,
                epoch: 0,
            })),
            preview,
        })
    }

    /// Current phase.
    pub async fn phase(&self) -> SyncPhase {
        self.state.lock().await.phase
    }

    /// Preview address of the current run process, once it has signaled
    /// readiness.
    pub fn preview_address(&self) -> Option<String> {
        self.preview.borrow().clone()
    }

    /// Watch the preview address across remounts.
    pub fn subscribe_preview(&self) -> watch::Receiver<Option<String>> {
        self.preview.subscribe()
    }

    /// The last tree successfully mounted.
    pub async fn mounted_tree(&self) -> Option<ProjectTree> {
        self.state.lock().await.mounted_tree.clone()
    }

    /// Mount (or remount) the given tree and bring the run process up.
    ///
    /// Single-flight: if a cycle is already in flight the tree is parked and
    /// folded into one follow-up cycle after the current one completes; this
    /// call then returns immediately. An empty tree is skipped — there is
    /// nothing to mount yet.
    pub async fn sync(&self, tree: ProjectTree) -> Result<(), SandboxError> {
        if tree.is_empty() {
            tracing::debug!("Skipping sync of empty tree");
            return Ok(());
        }

        {
            let mut state = self.state.lock().await;
            if state.in_flight {
                tracing::debug!("Sync already in flight; parking latest tree");
                state.pending = Some(tree);
                return Ok(());
            }
            state.in_flight = true;
        }

        let mut next = Some(tree);
        let mut result = Ok(());
        while let Some(tree) = next {
            result = self.run_cycle(tree).await;

            let mut state = self.state.lock().await;
            next = state.pending.take();
            if next.is_none() {
                state.in_flight = false;
            }
        }
        result
    }

    /// One full mount → install → run cycle.
    async fn run_cycle(&self, tree: ProjectTree) -> Result<(), SandboxError> {
        let epoch = {
            let mut state = self.state.lock().await;
            state.phase = SyncPhase::Mounting;
            state.epoch += 1;
            state.epoch
        };
        // The old preview is stale the moment a remount begins.
        self.preview.send_replace(None);

        self.sandbox.terminate_running().await;

        let descriptor = mount_tree(&tree);
        if let Err(e) = self.sandbox.mount(&descriptor).await {
            tracing::error!("Mount failed: {}", e);
            let mut state = self.state.lock().await;
            state.phase = SyncPhase::Unmounted;
            state.mounted_tree = None;
            return Err(e);
        }

        {
            let mut state = self.state.lock().await;
            state.phase = SyncPhase::Mounted;
            state.mounted_tree = Some(tree);
        }
        tracing::info!("Project tree mounted");

        // A failed install degrades: the controller stays Mounted with no
        // live process, and the user can trigger another sync.
        match self.sandbox.install().await {
            Ok(0) => {}
            Ok(code) => {
                tracing::warn!("Install exited with code {}; run process not started", code);
                return Ok(());
            }
            Err(e) => {
                tracing::warn!("Install failed: {}; run process not started", e);
                return Ok(());
            }
        }

        let ready = match self.sandbox.start().await {
            Ok(ready) => ready,
            Err(e) => {
                tracing::warn!("Failed to start run process: {}", e);
                return Ok(());
            }
        };
        self.state.lock().await.phase = SyncPhase::Running;

        let state = Arc::clone(&self.state);
        let preview = self.preview.clone();
        tokio::spawn(async move {
            match ready.await {
                Ok(url) => {
                    let guard = state.lock().await;
                    if guard.epoch == epoch {
                        drop(guard);
                        tracing::info!("Run process ready at {}", url);
                        preview.send_replace(Some(url));
                    } else {
                        tracing::debug!("Discarding readiness signal from superseded run");
                    }
                }
                Err(_) => {
                    tracing::warn!("Run process exited before signaling readiness");
                }
            }
        });

        Ok(())
    }
}
