//! Hierarchical project file tree.
//!
//! The tree is a forest of file/directory nodes stored in an arena keyed by
//! full path, with parent/child links held as path references instead of
//! ownership pointers. Merges never patch nodes in place; they flatten to a
//! path→content map and rebuild from scratch, which keeps the invariants
//! (every intermediate directory exists, sibling names unique, a path is a
//! file XOR a directory) without separate repair logic.

mod builder;
mod merge;

pub use builder::{build_from_entries, build_from_markup, tree_to_markup};
pub use merge::merge;

use serde::Serialize;
use std::collections::HashMap;

/// File or directory payload of a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase", tag = "type")]
pub enum FileNodeKind {
    File {
        content: String,
    },
    Directory {
        /// Child paths in first-encounter order
        children: Vec<String>,
    },
}

/// A node in the project tree. Identity is the full slash-joined path; a
/// child's path always begins with `parent.path + "/"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileNode {
    pub name: String,
    pub path: String,
    #[serde(flatten)]
    pub kind: FileNodeKind,
}

impl FileNode {
    /// Whether this node is a file.
    pub fn is_file(&self) -> bool {
        matches!(self.kind, FileNodeKind::File { .. })
    }
}

/// The forest of root-level nodes over a path-keyed arena.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectTree {
    nodes: HashMap<String, FileNode>,
    /// Root paths in first-encounter order
    roots: Vec<String>,
}

impl ProjectTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Number of file nodes in the tree.
    pub fn file_count(&self) -> usize {
        self.nodes.values().filter(|n| n.is_file()).count()
    }

    /// Look up a node by full path.
    pub fn get(&self, path: &str) -> Option<&FileNode> {
        self.nodes.get(path)
    }

    /// Look up file content by full path.
    pub fn file_content(&self, path: &str) -> Option<&str> {
        match &self.get(path)?.kind {
            FileNodeKind::File { content } => Some(content),
            FileNodeKind::Directory { .. } => None,
        }
    }

    /// Root nodes in first-encounter order.
    pub fn roots(&self) -> impl Iterator<Item = &FileNode> {
        self.roots.iter().filter_map(|p| self.nodes.get(p))
    }

    /// Child nodes of a directory, in first-encounter order.
    pub fn children(&self, node: &FileNode) -> Vec<&FileNode> {
        match &node.kind {
            FileNodeKind::File { .. } => Vec::new(),
            FileNodeKind::Directory { children } => {
                children.iter().filter_map(|p| self.nodes.get(p)).collect()
            }
        }
    }

    /// Flatten to (path, content) pairs in deterministic depth-first order.
    pub fn flatten(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        for root in &self.roots {
            self.flatten_into(root, &mut out);
        }
        out
    }

    fn flatten_into(&self, path: &str, out: &mut Vec<(String, String)>) {
        let Some(node) = self.nodes.get(path) else {
            return;
        };
        match &node.kind {
            FileNodeKind::File { content } => out.push((node.path.clone(), content.clone())),
            FileNodeKind::Directory { children } => {
                for child in children {
                    self.flatten_into(child, out);
                }
            }
        }
    }

    /// Insert a file, materializing intermediate directories on first
    /// reference. When a required directory path is occupied by a file (or a
    /// file path by a directory), the directory wins and the file is dropped.
    pub(crate) fn insert_file(&mut self, path: &str, content: String) {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        if segments.is_empty() {
            tracing::warn!("Ignoring file action with empty path");
            return;
        }

        let mut parent: Option<String> = None;
        for depth in 0..segments.len() - 1 {
            let dir_path = segments[..=depth].join("/");
            self.ensure_directory(&dir_path, segments[depth], parent.as_deref());
            parent = Some(dir_path);
        }

        let full_path = segments.join("/");
        if let Some(existing) = self.nodes.get(&full_path) {
            match existing.kind {
                FileNodeKind::File { .. } => {
                    // Same logical file: later content replaces earlier.
                    self.nodes.insert(
                        full_path.clone(),
                        FileNode {
                            name: segments[segments.len() - 1].to_string(),
                            path: full_path,
                            kind: FileNodeKind::File { content },
                        },
                    );
                }
                FileNodeKind::Directory { .. } => {
                    tracing::warn!(
                        path = %full_path,
                        "File path collides with a directory; keeping the directory"
                    );
                }
            }
            return;
        }

        self.attach(&full_path, parent.as_deref());
        self.nodes.insert(
            full_path.clone(),
            FileNode {
                name: segments[segments.len() - 1].to_string(),
                path: full_path,
                kind: FileNodeKind::File { content },
            },
        );
    }

    /// Ensure a directory node exists at `path`, reusing it on subsequent
    /// references to the same (parent, name) pair.
    fn ensure_directory(&mut self, path: &str, name: &str, parent: Option<&str>) {
        match self.nodes.get(path) {
            Some(node) if node.is_file() => {
                tracing::warn!(
                    path = %path,
                    "Directory path collides with a file; replacing the file"
                );
                self.nodes.insert(
                    path.to_string(),
                    FileNode {
                        name: name.to_string(),
                        path: path.to_string(),
                        kind: FileNodeKind::Directory {
                            children: Vec::new(),
                        },
                    },
                );
            }
            Some(_) => {}
            None => {
                self.attach(path, parent);
                self.nodes.insert(
                    path.to_string(),
                    FileNode {
                        name: name.to_string(),
                        path: path.to_string(),
                        kind: FileNodeKind::Directory {
                            children: Vec::new(),
                        },
                    },
                );
            }
        }
    }

    /// Record `path` as a child of `parent` (or as a root), exactly once.
    fn attach(&mut self, path: &str, parent: Option<&str>) {
        match parent {
            Some(parent_path) => {
                if let Some(FileNode {
                    kind: FileNodeKind::Directory { children },
                    ..
                }) = self.nodes.get_mut(parent_path)
                {
                    if !children.iter().any(|c| c == path) {
                        children.push(path.to_string());
                    }
                }
            }
            None => {
                if !self.roots.iter().any(|r| r == path) {
                    self.roots.push(path.to_string());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demo_tree() -> ProjectTree {
        build_from_entries(vec![
            ("src/App.tsx".to_string(), "app".to_string()),
            ("src/components/Button.tsx".to_string(), "button".to_string()),
            ("package.json".to_string(), "{}".to_string()),
        ])
    }

    #[test]
    fn every_ancestor_directory_exists_exactly_once() {
        let tree = demo_tree();

        for (path, _) in tree.flatten() {
            let segments: Vec<&str> = path.split('/').collect();
            for depth in 0..segments.len() - 1 {
                let dir_path = segments[..=depth].join("/");
                let node = tree.get(&dir_path).expect("ancestor directory missing");
                assert!(!node.is_file(), "{} should be a directory", dir_path);
            }
        }

        // "src" is referenced by two files but materialized once.
        let src_roots: Vec<_> = tree.roots().filter(|n| n.path == "src").collect();
        assert_eq!(src_roots.len(), 1);
    }

    #[test]
    fn sibling_names_are_unique() {
        let tree = demo_tree();
        for node in tree.nodes.values() {
            let children = tree.children(node);
            let mut names: Vec<_> = children.iter().map(|c| c.name.as_str()).collect();
            names.sort_unstable();
            names.dedup();
            assert_eq!(names.len(), children.len());
        }
    }

    #[test]
    fn child_paths_extend_parent_path() {
        let tree = demo_tree();
        for node in tree.nodes.values() {
            for child in tree.children(node) {
                assert!(child.path.starts_with(&format!("{}/", node.path)));
            }
        }
    }

    #[test]
    fn directory_wins_path_collision() {
        // "src" arrives first as a file, then as a directory of a later file.
        let tree = build_from_entries(vec![
            ("src".to_string(), "i am a file".to_string()),
            ("src/main.rs".to_string(), "fn main() {}".to_string()),
        ]);

        let node = tree.get("src").unwrap();
        assert!(!node.is_file());
        assert_eq!(tree.file_content("src/main.rs"), Some("fn main() {}"));
        assert_eq!(tree.file_count(), 1);
    }

    #[test]
    fn file_lookup_by_path() {
        let tree = demo_tree();
        assert_eq!(tree.file_content("src/App.tsx"), Some("app"));
        assert_eq!(tree.file_content("package.json"), Some("{}"));
        assert_eq!(tree.file_content("src"), None);
        assert_eq!(tree.file_content("missing.txt"), None);
    }
}
