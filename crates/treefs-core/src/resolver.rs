//! Path resolution: textual path + cwd + actor -> node
//!
//! Walks the tree one component at a time. Named components require
//! `execute` on the node being searched and then that it is a directory;
//! `.` and `..` only require that the current node is a directory. Symlinks are re-resolved by their stored
//! path relative to the link's own parent. Expansion is bounded by a hop
//! budget shared across the whole call, and re-entering a link that is still
//! being expanded fails immediately.

use tracing::debug;

use crate::error::{FsError, FsResult};
use crate::node::NodeKind;
use crate::permissions::PermissionOracle;
use crate::tree::Tree;
use crate::{Capability, Identity, NodeId};

pub(crate) struct Resolver<'a> {
    tree: &'a Tree,
    oracle: &'a PermissionOracle,
    actor: &'a Identity,
    max_hops: u32,
    hops: u32,
    expanding: Vec<NodeId>,
}

impl<'a> Resolver<'a> {
    pub fn new(tree: &'a Tree, oracle: &'a PermissionOracle, actor: &'a Identity, max_hops: u32) -> Self {
        Self {
            tree,
            oracle,
            actor,
            max_hops,
            hops: 0,
            expanding: Vec::new(),
        }
    }

    /// Resolve `path` starting at `cwd` when relative. With `follow_final`
    /// false a trailing symlink is returned as the link node itself.
    pub fn resolve(&mut self, path: &str, cwd: NodeId, follow_final: bool) -> FsResult<NodeId> {
        if path.is_empty() || path.contains('\0') {
            return Err(FsError::InvalidPath);
        }

        let tree = self.tree;
        let start = if path.starts_with('/') {
            tree.root()
        } else {
            tree.node(cwd)?.id
        };

        let components: Vec<&str> = path.split('/').filter(|c| !c.is_empty()).collect();
        let Some(last) = components.len().checked_sub(1) else {
            return Ok(start);
        };

        let mut current = start;
        for (i, component) in components.iter().enumerate() {
            let keep_link = i == last && !follow_final;
            current = self.step(current, component, keep_link)?;
        }
        Ok(current)
    }

    fn step(&mut self, current: NodeId, component: &str, keep_link: bool) -> FsResult<NodeId> {
        let tree = self.tree;
        let node = tree.node(current)?;

        match component {
            "." | ".." if !node.is_dir() => Err(FsError::NotADirectory),
            "." => Ok(current),
            ".." => tree.parent_of(current),
            name => {
                self.oracle.require(node, self.actor, Capability::Execute)?;
                if !node.is_dir() {
                    return Err(FsError::NotADirectory);
                }
                let child_id = tree.get_child(current, name).ok_or(FsError::NotFound)?;
                match &tree.node(child_id)?.kind {
                    NodeKind::Symlink { target } if !keep_link => self.follow(child_id, target),
                    _ => Ok(child_id),
                }
            }
        }
    }

    fn follow(&mut self, link: NodeId, target: &str) -> FsResult<NodeId> {
        if self.expanding.contains(&link) {
            debug!(link = link.as_u64(), target, "symlink cycle detected");
            return Err(FsError::SymlinkLoop);
        }
        self.hops += 1;
        if self.hops > self.max_hops {
            debug!(hops = self.hops, "symlink hop limit exceeded");
            return Err(FsError::SymlinkLoop);
        }

        let base = self.tree.parent_of(link)?;
        debug!(link = link.as_u64(), target, hops = self.hops, "expanding symlink");

        self.expanding.push(link);
        let result = self.resolve(target, base, true);
        self.expanding.pop();

        result.map_err(|err| match err {
            FsError::NotFound | FsError::NotADirectory | FsError::InvalidPath => FsError::DanglingLink {
                prefix: self.tree.path_of(link).unwrap_or_default(),
                target: target.to_string(),
            },
            other => other,
        })
    }
}

/// Split a path into its parent path and terminal name.
///
/// The terminal component must be a real name: `.`, `..` and the bare root
/// are rejected with `InvalidPath`.
pub(crate) fn split_parent(path: &str) -> FsResult<(&str, &str)> {
    if path.is_empty() || path.contains('\0') {
        return Err(FsError::InvalidPath);
    }
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(FsError::InvalidPath);
    }
    let (parent, name) = match trimmed.rfind('/') {
        Some(0) => ("/", &trimmed[1..]),
        Some(idx) => (&trimmed[..idx], &trimmed[idx + 1..]),
        None => (".", trimmed),
    };
    if name == "." || name == ".." {
        return Err(FsError::InvalidPath);
    }
    Ok((parent, name))
}
