//! # promptbox
//!
//! Turns a natural-language project description into a running, previewable
//! code project. An external model proxy returns one large pseudo-markup
//! response; promptbox turns it into typed build steps and a file tree, and
//! keeps a process sandbox in sync with that tree as follow-up edits arrive.
//!
//! ## Data Flow
//!
//! ```text
//!   raw response text
//!        │
//!        ├──► artifact::extract ──► artifact::plan ──► Steps (display)
//!        │
//!        └──► tree::build_from_markup ──┐
//!                                       ▼
//!                  authoritative tree ◄─ tree::merge
//!                                       │
//!                                       ▼
//!                        sandbox::SyncController
//!                  (mount → install → run → preview URL)
//! ```
//!
//! ## Modules
//! - `artifact`: markup scanning and step planning
//! - `tree`: file-tree construction and merging
//! - `sandbox`: execution environment and mount/remount synchronization
//! - `llm`: model-proxy client with rate-limit backoff
//! - `session`: single-project state owner wiring the pieces together
//! - `api`: HTTP surface for the UI

pub mod api;
pub mod artifact;
pub mod config;
pub mod llm;
pub mod sandbox;
pub mod session;
pub mod tree;

pub use config::Config;
pub use session::ProjectSession;
