//! Tree construction from markup or flat path→content entries.

use super::ProjectTree;
use crate::artifact::{scan_actions, Action};

/// Build a tree from raw markup text.
///
/// Re-runs the file-action scan independently of the wrapper-aware extractor:
/// this is also invoked on synthesized markup built from an in-memory file
/// map, which carries bare file actions. Repeated paths are deduplicated with
/// last-occurrence-wins semantics (the authoritative policy for file content —
/// deliberately the opposite of the planner's first-wins step dedupe), and
/// content is trimmed here, at consumption time.
pub fn build_from_markup(text: &str) -> ProjectTree {
    let entries = scan_actions(text)
        .into_iter()
        .filter_map(|action| match action {
            Action::File { path, content } => Some((path, content.trim().to_string())),
            Action::Shell { .. } => None,
        })
        .collect();

    build_from_entries(entries)
}

/// Build a tree from (path, content) pairs.
///
/// Later entries for the same path fully replace earlier ones while keeping
/// the first-encountered position, so output order is deterministic for a
/// given input.
pub fn build_from_entries(entries: Vec<(String, String)>) -> ProjectTree {
    let deduped = dedupe_last_wins(entries);

    let mut tree = ProjectTree::new();
    for (path, content) in deduped {
        tree.insert_file(&path, content);
    }
    tree
}

/// Serialize a tree back to markup, one file action per leaf.
pub fn tree_to_markup(tree: &ProjectTree) -> String {
    tree.flatten()
        .into_iter()
        .map(|(path, content)| {
            format!(
                "<boltAction type=\"file\" filePath=\"{}\">{}</boltAction>",
                path, content
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Last-wins dedupe that preserves first-encountered order.
fn dedupe_last_wins(entries: Vec<(String, String)>) -> Vec<(String, String)> {
    let mut index: std::collections::HashMap<String, usize> = std::collections::HashMap::new();
    let mut out: Vec<(String, String)> = Vec::with_capacity(entries.len());

    for (path, content) in entries {
        match index.get(&path) {
            Some(&i) => out[i].1 = content,
            None => {
                index.insert(path.clone(), out.len());
                out.push((path, content));
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn path_map(tree: &ProjectTree) -> HashMap<String, String> {
        tree.flatten().into_iter().collect()
    }

    #[test]
    fn repeated_paths_last_write_wins() {
        let markup = concat!(
            "<boltAction type=\"file\" filePath=\"a.txt\">first</boltAction>",
            "<boltAction type=\"file\" filePath=\"a.txt\">second</boltAction>",
        );
        let tree = build_from_markup(markup);

        assert_eq!(tree.file_count(), 1);
        assert_eq!(tree.file_content("a.txt"), Some("second"));
    }

    // The planner dedupes the same input first-wins; the builder last-wins.
    // Both policies are intentional: step history shows the first attempt,
    // file content reflects the final one.
    #[test]
    fn builder_and_planner_dedupe_policies_diverge() {
        let response = r#"<boltArtifact title="T"><boltAction type="file" filePath="a.txt">first</boltAction><boltAction type="file" filePath="a.txt">second</boltAction></boltArtifact>"#;

        let steps = crate::artifact::plan(&crate::artifact::extract(response));
        assert_eq!(steps[1].code.as_deref(), Some("first"));

        let tree = build_from_markup(response);
        assert_eq!(tree.file_content("a.txt"), Some("second"));
    }

    #[test]
    fn intermediate_directories_inferred() {
        let tree = build_from_markup(
            "<boltAction type=\"file\" filePath=\"src/components/Button.tsx\">b</boltAction>",
        );

        assert!(tree.get("src").is_some());
        assert!(tree.get("src/components").is_some());
        assert_eq!(tree.file_content("src/components/Button.tsx"), Some("b"));
    }

    #[test]
    fn slashless_paths_are_top_level_files() {
        let tree =
            build_from_markup("<boltAction type=\"file\" filePath=\"README.md\">r</boltAction>");

        let roots: Vec<_> = tree.roots().collect();
        assert_eq!(roots.len(), 1);
        assert!(roots[0].is_file());
        assert_eq!(roots[0].path, "README.md");
    }

    #[test]
    fn root_order_is_first_encountered() {
        let markup = concat!(
            "<boltAction type=\"file\" filePath=\"src/a.ts\">a</boltAction>",
            "<boltAction type=\"file\" filePath=\"public/index.html\">h</boltAction>",
            "<boltAction type=\"file\" filePath=\"src/b.ts\">b</boltAction>",
        );
        let tree = build_from_markup(markup);

        let roots: Vec<_> = tree.roots().map(|n| n.path.clone()).collect();
        assert_eq!(roots, vec!["src", "public"]);
    }

    #[test]
    fn content_trimmed_at_consumption_time() {
        let tree = build_from_markup(
            "<boltAction type=\"file\" filePath=\"a.txt\">\n  body\n</boltAction>",
        );
        assert_eq!(tree.file_content("a.txt"), Some("body"));
    }

    #[test]
    fn markup_round_trip_preserves_path_map() {
        let tree = build_from_entries(vec![
            ("src/App.tsx".to_string(), "app".to_string()),
            ("src/lib/util.ts".to_string(), "util".to_string()),
            ("package.json".to_string(), "{}".to_string()),
        ]);

        let rebuilt = build_from_markup(&tree_to_markup(&tree));
        assert_eq!(path_map(&tree), path_map(&rebuilt));
    }
}
