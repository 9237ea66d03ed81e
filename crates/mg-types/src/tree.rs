//! Ordered nested mappings and the recursive leaf walker.
//!
//! A [`Tree`] is the shape every model projection takes: string keys in
//! declaration order, each pointing either at a leaf value or at another
//! tree. [`Tree::walk`] mirrors a tree into a new one by applying a function
//! to every leaf together with the path of keys leading to it.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::convert::Infallible;

/// A position in a [`Tree`]: either a leaf value or a nested subtree.
#[derive(Debug, Clone, PartialEq)]
pub enum TreeNode<T> {
    Leaf(T),
    Branch(Tree<T>),
}

impl<T> TreeNode<T> {
    pub fn as_leaf(&self) -> Option<&T> {
        match self {
            Self::Leaf(value) => Some(value),
            Self::Branch(_) => None,
        }
    }

    pub fn as_branch(&self) -> Option<&Tree<T>> {
        match self {
            Self::Leaf(_) => None,
            Self::Branch(tree) => Some(tree),
        }
    }
}

/// Ordered nested mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct Tree<T> {
    entries: Vec<(String, TreeNode<T>)>,
}

impl<T> Default for Tree<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T> Tree<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry. Keys are expected to be unique within one level.
    pub fn push(&mut self, key: impl Into<String>, node: TreeNode<T>) {
        self.entries.push((key.into(), node));
    }

    pub fn with_leaf(mut self, key: impl Into<String>, value: T) -> Self {
        self.push(key, TreeNode::Leaf(value));
        self
    }

    pub fn with_branch(mut self, key: impl Into<String>, tree: Tree<T>) -> Self {
        self.push(key, TreeNode::Branch(tree));
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&TreeNode<T>> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, node)| node)
    }

    /// Follow `path` from the root. An empty path yields `None`.
    pub fn get_path<S: AsRef<str>>(&self, path: &[S]) -> Option<&TreeNode<T>> {
        let (last, parents) = path.split_last()?;
        let mut current = self;
        for key in parents {
            current = current.get(key.as_ref())?.as_branch()?;
        }
        current.get(last.as_ref())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TreeNode<T>)> {
        self.entries.iter().map(|(k, node)| (k.as_str(), node))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Mirror the tree, replacing each leaf with `leaf_fn(leaf, path)`.
    ///
    /// `path` holds every key from the root down to and including the leaf's
    /// own key. Each call starts from an empty path.
    pub fn walk<U, F>(&self, mut leaf_fn: F) -> Tree<U>
    where
        F: FnMut(&T, &[String]) -> U,
    {
        match self.try_walk(|leaf, path| Ok::<U, Infallible>(leaf_fn(leaf, path))) {
            Ok(tree) => tree,
            Err(never) => match never {},
        }
    }

    /// Fallible [`Tree::walk`]; stops at the first leaf error.
    pub fn try_walk<U, E, F>(&self, mut leaf_fn: F) -> Result<Tree<U>, E>
    where
        F: FnMut(&T, &[String]) -> Result<U, E>,
    {
        let mut path = Vec::new();
        self.walk_level(&mut leaf_fn, &mut path)
    }

    fn walk_level<U, E, F>(&self, leaf_fn: &mut F, path: &mut Vec<String>) -> Result<Tree<U>, E>
    where
        F: FnMut(&T, &[String]) -> Result<U, E>,
    {
        let mut mirrored = Tree {
            entries: Vec::with_capacity(self.entries.len()),
        };
        for (key, node) in &self.entries {
            path.push(key.clone());
            let result = match node {
                TreeNode::Leaf(value) => leaf_fn(value, path).map(TreeNode::Leaf),
                TreeNode::Branch(tree) => tree.walk_level(leaf_fn, path).map(TreeNode::Branch),
            };
            path.pop();
            mirrored.entries.push((key.clone(), result?));
        }
        Ok(mirrored)
    }

    /// Every leaf with its path, in walk order.
    pub fn leaves(&self) -> Vec<(Vec<String>, &T)> {
        let mut out = Vec::new();
        let mut path = Vec::new();
        self.collect_leaves(&mut path, &mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, path: &mut Vec<String>, out: &mut Vec<(Vec<String>, &'a T)>) {
        for (key, node) in &self.entries {
            path.push(key.clone());
            match node {
                TreeNode::Leaf(value) => out.push((path.clone(), value)),
                TreeNode::Branch(tree) => tree.collect_leaves(path, out),
            }
            path.pop();
        }
    }
}

impl<T: Serialize> Serialize for TreeNode<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Leaf(value) => value.serialize(serializer),
            Self::Branch(tree) => tree.serialize(serializer),
        }
    }
}

impl<T: Serialize> Serialize for Tree<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, node) in &self.entries {
            map.serialize_entry(key, node)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tree() -> Tree<i64> {
        Tree::new()
            .with_leaf("alpha", 5)
            .with_branch(
                "model",
                Tree::new()
                    .with_leaf("parameter", 3)
                    .with_branch("inner", Tree::new().with_leaf("parameter", 7)),
            )
            .with_leaf("beta", 1)
    }

    fn same_shape<A, B>(a: &Tree<A>, b: &Tree<B>) -> bool {
        a.len() == b.len()
            && a.iter().zip(b.iter()).all(|((ka, na), (kb, nb))| {
                ka == kb
                    && match (na, nb) {
                        (TreeNode::Leaf(_), TreeNode::Leaf(_)) => true,
                        (TreeNode::Branch(x), TreeNode::Branch(y)) => same_shape(x, y),
                        _ => false,
                    }
            })
    }

    #[test]
    fn identity_walk_preserves_shape_and_order() {
        let tree = sample_tree();
        let mirrored = tree.walk(|leaf, _| *leaf);

        assert_eq!(mirrored, tree);
        assert_eq!(mirrored.keys().collect::<Vec<_>>(), vec!["alpha", "model", "beta"]);
    }

    #[test]
    fn walk_changes_leaf_type_but_not_shape() {
        let tree = sample_tree();
        let flags = tree.walk(|leaf, _| *leaf > 4);

        assert!(same_shape(&tree, &flags));
        assert_eq!(flags.get("alpha").and_then(TreeNode::as_leaf), Some(&true));
    }

    #[test]
    fn paths_include_leaf_key() {
        let tree = sample_tree();
        let paths = tree.walk(|_, path| path.join("."));

        assert_eq!(
            paths.get_path(&["model", "inner", "parameter"]).and_then(TreeNode::as_leaf),
            Some(&"model.inner.parameter".to_string())
        );
        assert_eq!(
            paths.get("beta").and_then(TreeNode::as_leaf),
            Some(&"beta".to_string())
        );
    }

    #[test]
    fn walk_does_not_leak_path_between_calls() {
        let tree = Tree::new().with_leaf("x", 1);
        let first = tree.walk(|_, path| path.len());
        let second = tree.walk(|_, path| path.len());

        assert_eq!(first, second);
        assert_eq!(second.get("x").and_then(TreeNode::as_leaf), Some(&1));
    }

    #[test]
    fn empty_tree_walks_to_empty_tree() {
        let tree: Tree<i64> = Tree::new();
        let mirrored = tree.walk(|leaf, _| leaf.to_string());
        assert!(mirrored.is_empty());
    }

    #[test]
    fn try_walk_stops_on_first_error() {
        let tree = sample_tree();
        let mut visited = 0;
        let result: Result<Tree<i64>, String> = tree.try_walk(|leaf, path| {
            visited += 1;
            if *leaf == 3 {
                Err(path.join("."))
            } else {
                Ok(*leaf)
            }
        });

        assert_eq!(result, Err("model.parameter".to_string()));
        assert_eq!(visited, 2);
    }

    #[test]
    fn leaves_lists_every_leaf() {
        let tree = sample_tree();
        let leaves = tree.leaves();

        assert_eq!(leaves.len(), 4);
        assert_eq!(leaves[2].0, vec!["model", "inner", "parameter"]);
        assert_eq!(*leaves[2].1, 7);
    }

    #[test]
    fn serializes_as_nested_map() {
        let tree = Tree::new()
            .with_leaf("alpha", false)
            .with_branch("model", Tree::new().with_leaf("parameter", true));

        let json = serde_json::to_string(&tree).unwrap();
        assert_eq!(json, r#"{"alpha":false,"model":{"parameter":true}}"#);
    }
}
