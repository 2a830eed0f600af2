//! Tree layout engine.
//!
//! Both entry points are pure: they read a tree shape through a child-lookup
//! closure and return coordinates, leaving it to the caller to apply them.
//!
//! - [`full_layout`] places a whole tree left to right, each node's children
//!   vertically centered on it.
//! - [`insert_into_sibling_group`] re-lays out only the sibling group that
//!   receives a new node, so unrelated subtrees never move on insertion.

use crate::config::LayoutConfig;
use crate::types::{NodeId, Position};
use std::collections::HashSet;

/// Where a new node lands inside its sibling group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiblingSlot<'a> {
    /// Directly below the given sibling (falls back to last if it is absent)
    After(&'a str),
    /// At the end of the group
    Last,
}

/// Lays out the tree rooted at `root`, placing the root at `origin`.
///
/// Children are visited in the order `children_of` returns them. The result
/// lists every reachable node once, in depth-first order.
pub fn full_layout<'a, F>(
    root: &'a str,
    origin: Position,
    children_of: F,
    config: &LayoutConfig,
) -> Vec<(NodeId, Position)>
where
    F: Fn(&'a str) -> Vec<&'a str>,
{
    let mut placed = Vec::new();
    let mut visited = HashSet::new();
    place_subtree(root, origin, &children_of, config, &mut visited, &mut placed);
    placed
}

fn place_subtree<'a, F>(
    id: &'a str,
    at: Position,
    children_of: &F,
    config: &LayoutConfig,
    visited: &mut HashSet<&'a str>,
    placed: &mut Vec<(NodeId, Position)>,
) where
    F: Fn(&'a str) -> Vec<&'a str>,
{
    if !visited.insert(id) {
        return;
    }
    placed.push((id.to_string(), at));

    let children = children_of(id);
    if children.is_empty() {
        return;
    }

    let span = (children.len() - 1) as f32 * config.vertical_spacing;
    let x = at.x + config.horizontal_spacing;
    let mut y = at.y - span / 2.0;
    for child in children {
        place_subtree(child, Position::new(x, y), children_of, config, visited, placed);
        y += config.vertical_spacing;
    }
}

/// Computes positions for a sibling group after `new_id` joins it.
///
/// `siblings` are the group's existing members with their current positions
/// (any order; `new_id` itself is ignored if present). They are ordered by
/// current y, the new node is slotted in, and the whole group is spread evenly
/// on the column `parent.x + insert_column_offset`, centered on `parent.y`.
pub fn insert_into_sibling_group(
    parent: Position,
    siblings: &[(&str, Position)],
    new_id: &str,
    slot: SiblingSlot<'_>,
    config: &LayoutConfig,
) -> Vec<(NodeId, Position)> {
    let mut existing: Vec<&(&str, Position)> =
        siblings.iter().filter(|(id, _)| *id != new_id).collect();
    // Stable sort: ties keep their incoming order
    existing.sort_by(|a, b| a.1.y.total_cmp(&b.1.y));

    let mut order: Vec<&str> = existing.iter().map(|(id, _)| *id).collect();
    match slot {
        SiblingSlot::After(anchor) => match order.iter().position(|id| *id == anchor) {
            Some(index) => order.insert(index + 1, new_id),
            None => order.push(new_id),
        },
        SiblingSlot::Last => order.push(new_id),
    }

    let gap = config.sibling_gap;
    let x = parent.x + config.insert_column_offset;
    let start_y = parent.y - (order.len() - 1) as f32 * gap / 2.0;

    order
        .into_iter()
        .enumerate()
        .map(|(index, id)| (id.to_string(), Position::new(x, start_y + index as f32 * gap)))
        .collect()
}
