//! Hierarchical name math.
//!
//! Names are dot-segmented paths (`project.alpha.notes`). Segments define
//! parent/child relationships; the on-disk path is derived from the name,
//! never the other way around. The root note's concrete name is `"root"`
//! (file `root.md`) and it is the terminal ancestor of every note.

/// Name of the per-vault root note.
pub const ROOT_NAME: &str = "root";

/// Parent name: drop the last segment. Single-segment names are children of
/// the root; the root is its own terminal ancestor (no parent here).
pub fn parent_of(name: &str) -> Option<String> {
    if name == ROOT_NAME || name.is_empty() {
        return None;
    }
    match name.rsplit_once('.') {
        Some((rest, _)) => Some(rest.to_string()),
        None => Some(ROOT_NAME.to_string()),
    }
}

/// Number of dot segments. The root counts as depth 0.
pub fn depth(name: &str) -> usize {
    if name == ROOT_NAME || name.is_empty() {
        0
    } else {
        name.split('.').count()
    }
}

/// True when `candidate` sits strictly below `ancestor` in the hierarchy.
/// Everything except the root itself descends from the root.
pub fn is_descendant(candidate: &str, ancestor: &str) -> bool {
    if candidate == ancestor {
        return false;
    }
    if ancestor == ROOT_NAME {
        return candidate != ROOT_NAME;
    }
    candidate.len() > ancestor.len()
        && candidate.starts_with(ancestor)
        && candidate.as_bytes()[ancestor.len()] == b'.'
}

/// New name for a descendant when its ancestor moves: prefix swap.
pub fn reparented(name: &str, old_ancestor: &str, new_ancestor: &str) -> String {
    if !is_descendant(name, old_ancestor) {
        return name.to_string();
    }
    format!("{}{}", new_ancestor, &name[old_ancestor.len()..])
}

/// Last segment, used as a display fallback when a note has no title.
pub fn basename(name: &str) -> &str {
    name.rsplit('.').next().unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parent_chain() {
        assert_eq!(parent_of("a.b.c"), Some("a.b".to_string()));
        assert_eq!(parent_of("a.b"), Some("a".to_string()));
        assert_eq!(parent_of("a"), Some(ROOT_NAME.to_string()));
        assert_eq!(parent_of(ROOT_NAME), None);
    }

    #[test]
    fn test_depth() {
        assert_eq!(depth(ROOT_NAME), 0);
        assert_eq!(depth("a"), 1);
        assert_eq!(depth("a.b.c"), 3);
    }

    #[test]
    fn test_is_descendant() {
        assert!(is_descendant("a.b", "a"));
        assert!(is_descendant("a.b.c", "a"));
        assert!(!is_descendant("ab", "a"));
        assert!(!is_descendant("a", "a"));
        assert!(is_descendant("a", ROOT_NAME));
        assert!(!is_descendant(ROOT_NAME, ROOT_NAME));
    }

    #[test]
    fn test_reparented() {
        assert_eq!(reparented("a.b.c", "a.b", "x"), "x.c");
        assert_eq!(reparented("a.b.c", "z", "x"), "a.b.c");
    }

    #[test]
    fn test_basename() {
        assert_eq!(basename("a.b.c"), "c");
        assert_eq!(basename("solo"), "solo");
    }
}
