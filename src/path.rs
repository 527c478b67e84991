//! Path tokenizing for branch keys.
//!
//! A key such as `"user/name/middle"` addresses a chain of branches, one per
//! segment. Segments are split on `/` verbatim: nothing is trimmed, escaped
//! or elided, so `"a//b"` is three segments with an empty one in the middle
//! and `""` is a single empty segment.

/// Segment delimiter.
pub const DELIMITER: char = '/';

/// Split a key into its ordered segment tokens.
///
/// Never returns an empty vector.
///
/// # Example
///
/// ```
/// use branch_cache::path::tokens;
///
/// assert_eq!(tokens("user/name/middle"), vec!["user", "name", "middle"]);
/// assert_eq!(tokens("a//b"), vec!["a", "", "b"]);
/// assert_eq!(tokens(""), vec![""]);
/// ```
pub fn tokens(key: &str) -> Vec<&str> {
    key.split(DELIMITER).collect()
}

/// Build the full path of a child branch.
///
/// Children of the root (depth 0) are addressed by their segment alone.
pub fn join(parent: &str, parent_depth: usize, segment: &str) -> String {
    if parent_depth == 0 {
        segment.to_string()
    } else {
        format!("{}{}{}", parent, DELIMITER, segment)
    }
}
