//! Ancestor-reachability checks that gate every reparent.
//!
//! The walk follows parent links upward from a node. A visited set stops the
//! walk on any pre-existing corruption, so the check terminates even on a
//! cyclic parent chain.

use std::collections::HashSet;

/// Returns `true` if `ancestor` is `descendant` itself or appears on its parent chain.
///
/// `parent_of` resolves a node to its parent, `None` at the top of the chain.
pub fn is_ancestor<'a, F>(ancestor: &str, descendant: &'a str, parent_of: F) -> bool
where
    F: Fn(&'a str) -> Option<&'a str>,
{
    let mut visited: HashSet<&'a str> = HashSet::new();
    let mut current = Some(descendant);
    while let Some(id) = current {
        if !visited.insert(id) {
            break;
        }
        if id == ancestor {
            return true;
        }
        current = parent_of(id);
    }
    false
}

/// Decides whether the connect gesture `source -> target` may make `target` a
/// child of `source`.
///
/// Rejected when both ends are the same node, or when `source` already sits in
/// the subtree of `target`: committing would close a cycle and cut the subtree
/// off from the root.
pub fn can_attach<'a, F>(source: &'a str, target: &str, parent_of: F) -> bool
where
    F: Fn(&'a str) -> Option<&'a str>,
{
    source != target && !is_ancestor(target, source, parent_of)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn chain(pairs: &[(&'static str, &'static str)]) -> HashMap<&'static str, &'static str> {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_direct_and_transitive_ancestors() {
        // root -> a -> b -> c
        let parents = chain(&[("a", "root"), ("b", "a"), ("c", "b")]);
        let lookup = |id: &'static str| parents.get(id).copied();

        assert!(is_ancestor("root", "c", lookup));
        assert!(is_ancestor("a", "c", lookup));
        assert!(is_ancestor("c", "c", lookup));
        assert!(!is_ancestor("c", "a", lookup));
        assert!(!is_ancestor("x", "c", lookup));
    }

    #[test]
    fn test_walk_terminates_on_corrupted_cycle() {
        let parents = chain(&[("a", "b"), ("b", "a")]);
        let lookup = |id: &'static str| parents.get(id).copied();

        assert!(!is_ancestor("root", "a", lookup));
        assert!(is_ancestor("b", "a", lookup));
    }

    #[test]
    fn test_attach_rejects_self_and_descendants() {
        // root -> a -> b
        let parents = chain(&[("a", "root"), ("b", "a")]);
        let lookup = |id: &'static str| parents.get(id).copied();

        assert!(!can_attach("a", "a", lookup));
        // b is inside a's subtree, so a cannot hang below b
        assert!(!can_attach("b", "a", lookup));
        assert!(can_attach("a", "b", lookup));
        assert!(can_attach("root", "b", lookup));
    }
}
