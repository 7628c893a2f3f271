//! Filesystem node model

use std::collections::HashMap;

use crate::{Metadata, Mode, NodeId, NodeTimes, NodeType};

/// Filesystem node types
#[derive(Clone, Debug)]
pub(crate) enum NodeKind {
    File { content: String },
    Directory { children: HashMap<String, NodeId> },
    Symlink { target: String },
}

impl NodeKind {
    pub fn empty_directory() -> Self {
        NodeKind::Directory {
            children: HashMap::new(),
        }
    }

    pub fn node_type(&self) -> NodeType {
        match self {
            NodeKind::File { .. } => NodeType::File,
            NodeKind::Directory { .. } => NodeType::Directory,
            NodeKind::Symlink { .. } => NodeType::Symlink,
        }
    }
}

/// Filesystem node
#[derive(Clone, Debug)]
pub(crate) struct Node {
    pub id: NodeId,
    pub name: String,
    /// Containing directory; `None` only for the root.
    pub parent: Option<NodeId>,
    pub kind: NodeKind,
    pub owner: String,
    pub group: String,
    pub mode: Mode,
    pub times: NodeTimes,
}

impl Node {
    /// Detached node with fresh timestamps. The tree store assigns `id` and
    /// `parent` on insertion.
    pub fn new(name: &str, kind: NodeKind, owner: &str, group: &str, mode: Mode) -> Self {
        Self {
            id: NodeId(0),
            name: name.to_string(),
            parent: None,
            kind,
            owner: owner.to_string(),
            group: group.to_string(),
            mode,
            times: NodeTimes::now(),
        }
    }

    pub fn node_type(&self) -> NodeType {
        self.kind.node_type()
    }

    pub fn is_dir(&self) -> bool {
        matches!(self.kind, NodeKind::Directory { .. })
    }

    pub fn size(&self) -> u64 {
        match &self.kind {
            NodeKind::File { content } => content.len() as u64,
            NodeKind::Directory { children } => children.len() as u64,
            NodeKind::Symlink { target } => target.len() as u64,
        }
    }

    pub fn metadata(&self) -> Metadata {
        Metadata {
            kind: self.node_type(),
            owner: self.owner.clone(),
            group: self.group.clone(),
            mode: self.mode,
            size: self.size(),
            times: self.times,
        }
    }

    pub fn children(&self) -> Option<&HashMap<String, NodeId>> {
        match &self.kind {
            NodeKind::Directory { children } => Some(children),
            _ => None,
        }
    }

    /// Replace file content. Returns false for non-file nodes.
    pub fn set_content(&mut self, content: &str) -> bool {
        match &mut self.kind {
            NodeKind::File { content: current } => {
                current.clear();
                current.push_str(content);
                self.times.touch_modified();
                true
            }
            _ => false,
        }
    }

    pub fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
        self.times.touch_modified();
    }

    pub fn set_ownership(&mut self, owner: &str, group: &str) {
        self.owner = owner.to_string();
        self.group = group.to_string();
        self.times.touch_modified();
    }
}

/// A name is valid for a tree entry when it is a single, non-special path component.
pub(crate) fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains('/') && !name.contains('\0')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(content: &str) -> Node {
        Node::new(
            "a.txt",
            NodeKind::File {
                content: content.to_string(),
            },
            "alice",
            "users",
            Mode::from_bits_truncate(0o644),
        )
    }

    #[test]
    fn test_sizes_per_variant() {
        assert_eq!(file("hello").size(), 5);
        let link = Node::new(
            "l",
            NodeKind::Symlink {
                target: "/docs/x.txt".to_string(),
            },
            "root",
            "root",
            Mode::from_bits_truncate(0o777),
        );
        assert_eq!(link.size(), 11);
        assert_eq!(link.node_type(), NodeType::Symlink);
        let dir = Node::new("d", NodeKind::empty_directory(), "root", "root", Mode::from_bits_truncate(0o755));
        assert_eq!(dir.size(), 0);
        assert!(dir.is_dir());
    }

    #[test]
    fn test_set_content_refreshes_times() {
        let mut node = file("old");
        node.times.modified_at = 0;
        node.times.accessed_at = 0;
        assert!(node.set_content("new"));
        assert!(node.times.modified_at > 0);
        assert!(node.times.accessed_at >= node.times.modified_at);
        assert!(matches!(&node.kind, NodeKind::File { content } if content == "new"));
    }

    #[test]
    fn test_set_content_rejects_directories() {
        let mut dir = Node::new("d", NodeKind::empty_directory(), "root", "root", Mode::from_bits_truncate(0o755));
        assert!(!dir.set_content("x"));
    }

    #[test]
    fn test_valid_names() {
        assert!(is_valid_name("notes.txt"));
        assert!(!is_valid_name(""));
        assert!(!is_valid_name("."));
        assert!(!is_valid_name(".."));
        assert!(!is_valid_name("a/b"));
        assert!(!is_valid_name("a\0b"));
    }
}
