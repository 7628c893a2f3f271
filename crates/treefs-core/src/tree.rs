//! Tree store: the node arena and its structural primitives
//!
//! Every node lives in a single arena keyed by [`NodeId`]. Directories own
//! their children through the name -> id map; the `parent` field on each node
//! is a plain back-reference. No capability checks happen here.

use std::collections::HashMap;

use crate::config::RootPolicy;
use crate::error::{FsError, FsResult};
use crate::node::{Node, NodeKind};
use crate::{Mode, NodeId};

#[derive(Clone, Debug)]
pub struct Tree {
    nodes: HashMap<NodeId, Node>,
    root: NodeId,
    next_node_id: u64,
}

impl Tree {
    /// Tree with an empty root directory.
    pub fn new(root: &RootPolicy) -> Self {
        let node = Node::new(
            "",
            NodeKind::empty_directory(),
            &root.owner,
            &root.group,
            Mode::from_bits_truncate(root.mode),
        );
        Self::with_root(node)
    }

    /// Tree rooted at `node`, which must be a childless directory.
    pub(crate) fn with_root(mut node: Node) -> Self {
        let root = NodeId(1);
        node.id = root;
        node.parent = None;
        node.name.clear();
        let mut nodes = HashMap::new();
        nodes.insert(root, node);
        Self {
            nodes,
            root,
            next_node_id: 2,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    fn allocate_node_id(&mut self) -> NodeId {
        let id = NodeId(self.next_node_id);
        self.next_node_id += 1;
        id
    }

    pub(crate) fn node(&self, id: NodeId) -> FsResult<&Node> {
        self.nodes.get(&id).ok_or(FsError::NotFound)
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> FsResult<&mut Node> {
        self.nodes.get_mut(&id).ok_or(FsError::NotFound)
    }

    /// Parent of `id`; the root is its own parent.
    pub(crate) fn parent_of(&self, id: NodeId) -> FsResult<NodeId> {
        Ok(self.node(id)?.parent.unwrap_or(self.root))
    }

    /// Look up a child by name. Absent names (or a non-directory handle) yield `None`.
    pub(crate) fn get_child(&self, dir: NodeId, name: &str) -> Option<NodeId> {
        self.nodes
            .get(&dir)
            .and_then(Node::children)
            .and_then(|children| children.get(name).copied())
    }

    /// Insert a detached node under `dir`, assigning it a fresh id.
    pub(crate) fn insert_child(&mut self, dir: NodeId, mut node: Node) -> FsResult<NodeId> {
        let id = self.allocate_node_id();
        match &mut self.node_mut(dir)?.kind {
            NodeKind::Directory { children } => {
                if children.contains_key(&node.name) {
                    return Err(FsError::AlreadyExists);
                }
                children.insert(node.name.clone(), id);
            }
            _ => return Err(FsError::NotADirectory),
        }
        node.id = id;
        node.parent = Some(dir);
        self.nodes.insert(id, node);
        Ok(id)
    }

    /// Remove `name` from `dir` and release it, recursively for directories.
    pub(crate) fn remove_child(&mut self, dir: NodeId, name: &str) -> FsResult<()> {
        let id = self.detach_child(dir, name)?;
        self.release(id);
        Ok(())
    }

    /// Unlink `name` from `dir` without releasing its storage.
    pub(crate) fn detach_child(&mut self, dir: NodeId, name: &str) -> FsResult<NodeId> {
        match &mut self.node_mut(dir)?.kind {
            NodeKind::Directory { children } => children.remove(name).ok_or(FsError::NotFound),
            _ => Err(FsError::NotADirectory),
        }
    }

    /// Link an already-stored node under `dir` as `name`.
    pub(crate) fn attach_child(&mut self, dir: NodeId, name: &str, id: NodeId) -> FsResult<()> {
        match &mut self.node_mut(dir)?.kind {
            NodeKind::Directory { children } => {
                if children.contains_key(name) {
                    return Err(FsError::AlreadyExists);
                }
                children.insert(name.to_string(), id);
            }
            _ => return Err(FsError::NotADirectory),
        }
        let node = self.node_mut(id)?;
        node.name = name.to_string();
        node.parent = Some(dir);
        Ok(())
    }

    fn release(&mut self, id: NodeId) {
        let mut pending = vec![id];
        while let Some(next) = pending.pop() {
            if let Some(node) = self.nodes.remove(&next) {
                if let NodeKind::Directory { children } = node.kind {
                    pending.extend(children.into_values());
                }
            }
        }
    }

    /// Children of `dir` ordered by name.
    pub(crate) fn sorted_children(&self, dir: NodeId) -> FsResult<Vec<(&str, NodeId)>> {
        let children = self.node(dir)?.children().ok_or(FsError::NotADirectory)?;
        let mut entries: Vec<(&str, NodeId)> = children
            .iter()
            .map(|(name, id)| (name.as_str(), *id))
            .collect();
        entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
        Ok(entries)
    }

    /// Absolute path of a node, built from its parent chain.
    pub fn path_of(&self, id: NodeId) -> FsResult<String> {
        let mut names = Vec::new();
        let mut current = self.node(id)?;
        while let Some(parent) = current.parent {
            names.push(current.name.as_str());
            current = self.node(parent)?;
        }
        if names.is_empty() {
            return Ok("/".to_string());
        }
        names.reverse();
        Ok(format!("/{}", names.join("/")))
    }

    /// True when `ancestor` is `id` or lies on its parent chain.
    pub(crate) fn is_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node_id) = current {
            if node_id == ancestor {
                return true;
            }
            current = self.nodes.get(&node_id).and_then(|n| n.parent);
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dir(name: &str) -> Node {
        Node::new(name, NodeKind::empty_directory(), "root", "root", Mode::from_bits_truncate(0o755))
    }

    fn file(name: &str) -> Node {
        Node::new(
            name,
            NodeKind::File {
                content: String::new(),
            },
            "root",
            "root",
            Mode::from_bits_truncate(0o644),
        )
    }

    #[test]
    fn test_insert_and_lookup() {
        let mut tree = Tree::new(&RootPolicy::default());
        let root = tree.root();
        let docs = tree.insert_child(root, dir("docs")).unwrap();
        assert_eq!(tree.get_child(root, "docs"), Some(docs));
        assert_eq!(tree.get_child(root, "missing"), None);
        assert_eq!(tree.node(docs).unwrap().parent, Some(root));
        assert_eq!(tree.path_of(docs).unwrap(), "/docs");
        assert_eq!(tree.path_of(root).unwrap(), "/");
    }

    #[test]
    fn test_insert_name_conflict() {
        let mut tree = Tree::new(&RootPolicy::default());
        let root = tree.root();
        tree.insert_child(root, file("a")).unwrap();
        assert_eq!(tree.insert_child(root, dir("a")), Err(FsError::AlreadyExists));
    }

    #[test]
    fn test_insert_under_file_fails() {
        let mut tree = Tree::new(&RootPolicy::default());
        let root = tree.root();
        let f = tree.insert_child(root, file("a")).unwrap();
        assert_eq!(tree.insert_child(f, file("b")), Err(FsError::NotADirectory));
    }

    #[test]
    fn test_remove_releases_descendants() {
        let mut tree = Tree::new(&RootPolicy::default());
        let root = tree.root();
        let a = tree.insert_child(root, dir("a")).unwrap();
        let b = tree.insert_child(a, dir("b")).unwrap();
        let c = tree.insert_child(b, file("c")).unwrap();
        assert_eq!(tree.len(), 4);

        tree.remove_child(root, "a").unwrap();
        assert_eq!(tree.len(), 1);
        assert!(!tree.contains(a));
        assert!(!tree.contains(b));
        assert!(!tree.contains(c));
        assert_eq!(tree.remove_child(root, "a"), Err(FsError::NotFound));
    }

    #[test]
    fn test_detach_attach_moves_node() {
        let mut tree = Tree::new(&RootPolicy::default());
        let root = tree.root();
        let a = tree.insert_child(root, dir("a")).unwrap();
        let f = tree.insert_child(root, file("f")).unwrap();
        let id = tree.detach_child(root, "f").unwrap();
        tree.attach_child(a, "g", id).unwrap();
        assert_eq!(id, f);
        assert_eq!(tree.path_of(f).unwrap(), "/a/g");
        assert!(tree.is_ancestor(root, f));
        assert!(tree.is_ancestor(a, f));
        assert!(!tree.is_ancestor(f, a));
    }

    #[test]
    fn test_sorted_children() {
        let mut tree = Tree::new(&RootPolicy::default());
        let root = tree.root();
        for name in ["zeta", "alpha", "mid"] {
            tree.insert_child(root, file(name)).unwrap();
        }
        let names: Vec<&str> = tree.sorted_children(root).unwrap().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["alpha", "mid", "zeta"]);
    }
}
