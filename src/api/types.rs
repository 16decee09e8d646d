//! API request and response types.

use serde::{Deserialize, Serialize};

use crate::artifact::StepStatus;
use crate::tree::{FileNode, FileNodeKind, ProjectTree};

/// Request to start the project from a prompt.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateProjectRequest {
    /// The project description / user prompt
    pub prompt: String,
}

/// Request to submit a follow-up prompt.
#[derive(Debug, Clone, Deserialize)]
pub struct FollowUpRequest {
    pub prompt: String,
}

/// Request to apply a step status transition.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateStepRequest {
    pub status: StepStatus,
    #[serde(default)]
    pub error: Option<String>,
}

/// Query for file content lookup.
#[derive(Debug, Clone, Deserialize)]
pub struct FileQuery {
    pub path: String,
}

/// One node of the serialized file tree.
#[derive(Debug, Clone, Serialize)]
pub struct TreeNode {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub node_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<TreeNode>>,
}

impl TreeNode {
    fn from_node(tree: &ProjectTree, node: &FileNode) -> Self {
        match &node.kind {
            FileNodeKind::File { content } => Self {
                name: node.name.clone(),
                path: node.path.clone(),
                node_type: "file",
                content: Some(content.clone()),
                children: None,
            },
            FileNodeKind::Directory { .. } => Self {
                name: node.name.clone(),
                path: node.path.clone(),
                node_type: "directory",
                content: None,
                children: Some(
                    tree.children(node)
                        .into_iter()
                        .map(|child| Self::from_node(tree, child))
                        .collect(),
                ),
            },
        }
    }
}

/// The serialized project tree.
#[derive(Debug, Clone, Serialize)]
pub struct TreeResponse {
    pub files: Vec<TreeNode>,
}

impl TreeResponse {
    pub fn from_tree(tree: &ProjectTree) -> Self {
        Self {
            files: tree
                .roots()
                .map(|root| TreeNode::from_node(tree, root))
                .collect(),
        }
    }
}

/// File content lookup result.
#[derive(Debug, Clone, Serialize)]
pub struct FileResponse {
    pub path: String,
    pub content: String,
}

/// Preview address, or absence thereof.
#[derive(Debug, Clone, Serialize)]
pub struct PreviewResponse {
    pub url: Option<String>,
}

/// Error payload.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
