//! NodeTree - per-group directory of registered nodes
//!
//! Entries are laid out as a complete k-ary tree filled in insertion order.
//! The entry at insertion position `i` sits at the depth (height) that
//! position occupies in such a tree, so with a fan-out of 2 the heights run
//! `0, 1, 1, 2, 2, 2, 2, 3, ...`. Traversal is breadth-first, which for a
//! complete tree is plain insertion order.
//!
//! Entries are never removed or rewritten once added.

use std::fmt;

use thiserror::Error;
use tracing::debug;

use super::path::{NodeInfo, NodePath};

/// Default number of children per tree node
pub const DEFAULT_FAN_OUT: usize = 2;

/// Structural failures when adding to a tree
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("Node path has no group name: {0:?}")]
    MissingGroup(String),

    #[error("Node path has invalid node info: {0:?}")]
    InvalidNodeInfo(String),

    #[error("Node path {path:?} does not belong to group {group:?}")]
    GroupMismatch { group: String, path: String },
}

/// One registered node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub height: usize,
    pub info: NodeInfo,
    pub path: NodePath,
}

/// Directory of the nodes registered under one group
#[derive(Debug, Clone)]
pub struct NodeTree {
    group: String,
    fan_out: usize,
    entries: Vec<TreeEntry>,
}

impl NodeTree {
    /// Create an empty tree for `group` with the default fan-out
    pub fn new(group: impl Into<String>) -> Self {
        Self::with_fan_out(group, DEFAULT_FAN_OUT)
    }

    /// Create an empty tree with an explicit fan-out (clamped to at least 2)
    pub fn with_fan_out(group: impl Into<String>, fan_out: usize) -> Self {
        Self {
            group: group.into(),
            fan_out: fan_out.max(2),
            entries: Vec::new(),
        }
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn fan_out(&self) -> usize {
        self.fan_out
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in canonical traversal order
    pub fn iter(&self) -> impl Iterator<Item = &TreeEntry> {
        self.entries.iter()
    }

    /// Find the path stored for a node, regardless of its height
    pub fn search(&self, info: &NodeInfo) -> Option<NodePath> {
        self.entries.iter().find(|e| &e.info == info).map(|e| e.path.clone())
    }

    /// Insert a node and return the canonical path that was stored
    ///
    /// Does not check for an existing entry with the same node info; callers
    /// `search` first.
    pub fn add(&mut self, path: &NodePath) -> Result<NodePath, TreeError> {
        debug!(group = %self.group, %path, "NodeTree::add: called");
        let group = path
            .group_name()
            .ok_or_else(|| TreeError::MissingGroup(path.to_string()))?;
        if group != self.group {
            return Err(TreeError::GroupMismatch {
                group: self.group.clone(),
                path: path.to_string(),
            });
        }
        let info = path
            .node_info()
            .ok_or_else(|| TreeError::InvalidNodeInfo(path.to_string()))?;

        let canonical = NodePath::from_parts(group, &info);
        let height = height_of(self.entries.len(), self.fan_out);
        debug!(%canonical, height, "NodeTree::add: inserted");
        self.entries.push(TreeEntry {
            height,
            info,
            path: canonical.clone(),
        });
        Ok(canonical)
    }

    /// First entry in traversal order accepted by `predicate`
    ///
    /// Returns the empty path when nothing matches or when `group` is not this
    /// tree's group.
    pub fn indexed_lookup<F>(&self, group: &str, mut predicate: F) -> NodePath
    where
        F: FnMut(usize, &NodeInfo) -> bool,
    {
        if group != self.group {
            return NodePath::empty();
        }
        self.entries
            .iter()
            .find(|e| predicate(e.height, &e.info))
            .map(|e| e.path.clone())
            .unwrap_or_default()
    }
}

/// Depth of insertion position `index` in a complete `fan_out`-ary tree
fn height_of(index: usize, fan_out: usize) -> usize {
    let mut height = 0;
    let mut level_start = 0usize;
    let mut level_width = 1usize;
    while index >= level_start + level_width {
        level_start += level_width;
        level_width = level_width.saturating_mul(fan_out);
        height += 1;
    }
    height
}

impl fmt::Display for NodeTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "NodeTree[{}] ({} nodes)", self.group, self.entries.len())?;
        for entry in &self.entries {
            writeln!(f, "  [{}] {}", entry.height, entry.path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree_with(n: u16) -> NodeTree {
        let mut tree = NodeTree::new("g");
        for i in 0..n {
            tree.add(&NodePath::from(format!("g/10.0.0.{}:{}", i, 9000 + i))).unwrap();
        }
        tree
    }

    #[test]
    fn test_add_returns_canonical() {
        let mut tree = NodeTree::new("groupA");
        let path = tree.add(&NodePath::from("groupA/ 10.0.0.1:9000")).unwrap();
        assert_eq!(path.as_str(), "groupA/10.0.0.1:9000");
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_add_errors() {
        let mut tree = NodeTree::new("g");
        assert!(matches!(tree.add(&NodePath::from("badpath")), Err(TreeError::MissingGroup(_))));
        assert!(matches!(tree.add(&NodePath::from("g/nope")), Err(TreeError::InvalidNodeInfo(_))));
        assert!(matches!(
            tree.add(&NodePath::from("other/h:1")),
            Err(TreeError::GroupMismatch { .. })
        ));
        assert!(tree.is_empty());
    }

    #[test]
    fn test_search_ignores_height() {
        let tree = tree_with(5);
        let found = tree.search(&NodeInfo::new("10.0.0.4", 9004));
        assert_eq!(found, Some(NodePath::from("g/10.0.0.4:9004")));
        assert_eq!(tree.search(&NodeInfo::new("10.0.0.9", 1)), None);
    }

    #[test]
    fn test_heights_binary() {
        let tree = tree_with(8);
        let heights: Vec<usize> = tree.iter().map(|e| e.height).collect();
        assert_eq!(heights, vec![0, 1, 1, 2, 2, 2, 2, 3]);
    }

    #[test]
    fn test_heights_ternary() {
        let heights: Vec<usize> = (0..14).map(|i| height_of(i, 3)).collect();
        assert_eq!(heights, vec![0, 1, 1, 1, 2, 2, 2, 2, 2, 2, 2, 2, 2, 3]);
    }

    #[test]
    fn test_fan_out_clamped() {
        assert_eq!(NodeTree::with_fan_out("g", 0).fan_out(), 2);
    }

    #[test]
    fn test_indexed_lookup_by_count() {
        let tree = tree_with(3);
        let nth = |n: usize| {
            let mut seen = 0;
            tree.indexed_lookup("g", |_, _| {
                let hit = seen == n;
                seen += 1;
                hit
            })
        };
        assert_eq!(nth(0).as_str(), "g/10.0.0.0:9000");
        assert_eq!(nth(2).as_str(), "g/10.0.0.2:9002");
        assert!(nth(3).is_empty());
    }

    #[test]
    fn test_indexed_lookup_by_height() {
        let tree = tree_with(4);
        let path = tree.indexed_lookup("g", |height, _| height == 2);
        assert_eq!(path.as_str(), "g/10.0.0.3:9003");
    }

    #[test]
    fn test_indexed_lookup_wrong_group() {
        let tree = tree_with(2);
        assert!(tree.indexed_lookup("other", |_, _| true).is_empty());
    }

    #[test]
    fn test_display() {
        let tree = tree_with(2);
        let text = tree.to_string();
        assert!(text.contains("NodeTree[g] (2 nodes)"));
        assert!(text.contains("[1] g/10.0.0.1:9001"));
    }
}
