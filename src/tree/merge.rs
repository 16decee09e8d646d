//! Tree merging across conversation turns.

use super::{build_from_entries, ProjectTree};

/// Merge a newly parsed tree into the previously accepted one.
///
/// Every path present in the new tree takes the new content; paths present
/// only in the old tree survive unchanged. The result is rebuilt from scratch
/// through the builder (flatten both, union new-over-old, materialize), which
/// is the only supported way to apply an incremental update — there is no
/// field-level patch operation.
pub fn merge(old: &ProjectTree, new: &ProjectTree) -> ProjectTree {
    let mut entries = old.flatten();
    entries.extend(new.flatten());
    build_from_entries(entries)
}
