//! Model-proxy client module.
//!
//! The proxy accepts an ordered list of role-tagged content strings plus an
//! optional system directive and returns one text blob: the markup document the
//! artifact parser consumes. A second endpoint picks a starter template for a
//! fresh prompt.
//!
//! `TextGenerator` is the seam the session depends on; `ProxyClient` is the
//! reqwest-backed implementation.

mod error;
mod proxy;

pub use error::{classify_http_status, LlmError, LlmErrorKind, RetryConfig};
pub use proxy::ProxyClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Role in a chat conversation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A message in a chat conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    /// Create a message with the given role.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        ChatMessage {
            role,
            content: content.into(),
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Starter-template discriminant returned by the template-selection call.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TemplateKind {
    React,
    Nextjs,
}

/// Response from the template-selection call.
///
/// `prompts` seed the conversation history; `starter` is markup holding the
/// template's starter files, parsed into the initial project tree before any
/// model-authored files exist.
#[derive(Debug, Clone, Deserialize)]
pub struct TemplateResponse {
    #[serde(rename = "message")]
    pub kind: TemplateKind,
    pub prompts: Vec<String>,
    #[serde(rename = "uiprompt")]
    pub starter: String,
}

/// Trait for text-generation backends.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Send the conversation to the model and return the raw response text.
    async fn generate(
        &self,
        messages: &[ChatMessage],
        system: Option<&str>,
    ) -> Result<String, LlmError>;

    /// Pick a starter template for a fresh prompt.
    async fn fetch_template(&self, prompt: &str) -> Result<TemplateResponse, LlmError>;
}
