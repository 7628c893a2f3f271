//! Virtual filesystem operations for TreeFS Core
//!
//! Each operation resolves through [`Resolver`], checks capabilities with the
//! [`PermissionOracle`], performs a single tree edit and stamps timestamps.
//! All checks happen before the edit, so a failed call leaves the tree as it
//! was.

use tracing::{debug, info};

use crate::config::FsConfig;
use crate::error::{FsError, FsResult};
use crate::node::{is_valid_name, Node, NodeKind};
use crate::permissions::PermissionOracle;
use crate::resolver::{split_parent, Resolver};
use crate::snapshot;
use crate::tree::Tree;
use crate::{Capability, DirEntry, Identity, Metadata, Mode, NodeId, SessionContext, WalkEntry};

/// The main filesystem core implementation
pub struct FsCore {
    config: FsConfig,
    oracle: PermissionOracle,
    tree: Tree,
}

impl FsCore {
    pub fn new(config: FsConfig) -> Self {
        let tree = Tree::new(&config.root);
        let oracle = PermissionOracle::new(config.security.clone());
        Self { config, oracle, tree }
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn root(&self) -> NodeId {
        self.tree.root()
    }

    /// Fresh session for `identity` positioned at the root.
    pub fn session(&self, identity: Identity) -> SessionContext {
        SessionContext::new(self.tree.root(), identity)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.tree.contains(id)
    }

    fn lookup(&self, ctx: &SessionContext, path: &str, follow_final: bool) -> FsResult<NodeId> {
        Resolver::new(
            &self.tree,
            &self.oracle,
            &ctx.identity,
            self.config.limits.max_symlink_hops,
        )
        .resolve(path, ctx.cwd, follow_final)
    }

    /// Resolve `path` to a node and record the access on that node only.
    pub fn resolve(&mut self, ctx: &SessionContext, path: &str, follow_final: bool) -> FsResult<NodeId> {
        let id = self.lookup(ctx, path, follow_final)?;
        self.tree.node_mut(id)?.times.touch_accessed();
        Ok(id)
    }

    /// Resolve the directory that will hold the terminal component of `path`
    /// and require `write` on it.
    fn resolve_parent<'p>(&self, ctx: &SessionContext, path: &'p str) -> FsResult<(NodeId, &'p str)> {
        let (parent_path, name) = split_parent(path)?;
        if !is_valid_name(name) {
            return Err(FsError::InvalidPath);
        }
        let parent_id = self.lookup(ctx, parent_path, true)?;
        let parent = self.tree.node(parent_id)?;
        if !parent.is_dir() {
            return Err(FsError::NotADirectory);
        }
        self.oracle.require(parent, &ctx.identity, Capability::Write)?;
        Ok((parent_id, name))
    }

    fn create_node(&mut self, ctx: &SessionContext, path: &str, kind: NodeKind, mode: u16) -> FsResult<NodeId> {
        let (parent_id, name) = self.resolve_parent(ctx, path)?;
        if self.tree.get_child(parent_id, name).is_some() {
            return Err(FsError::AlreadyExists);
        }
        let identity = &ctx.identity;
        let node = Node::new(
            name,
            kind,
            &identity.id,
            identity.primary_group(),
            Mode::from_bits_truncate(mode),
        );
        let id = self.tree.insert_child(parent_id, node)?;
        self.tree.node_mut(parent_id)?.times.touch_modified();
        Ok(id)
    }

    // File operations
    pub fn create_file(&mut self, ctx: &SessionContext, path: &str, content: &str) -> FsResult<NodeId> {
        let kind = NodeKind::File {
            content: content.to_string(),
        };
        let result = self.create_node(ctx, path, kind, self.config.file_mode());
        audit("create_file", path, ctx, &result);
        result
    }

    /// Overwrite a file's content, creating the file when the path does not exist yet.
    pub fn write_file(&mut self, ctx: &SessionContext, path: &str, content: &str) -> FsResult<()> {
        let result = match self.lookup(ctx, path, true) {
            Ok(id) => self.overwrite(ctx, id, content),
            Err(FsError::NotFound) => return self.create_file(ctx, path, content).map(|_| ()),
            Err(err) => Err(err),
        };
        audit("write_file", path, ctx, &result);
        result
    }

    fn overwrite(&mut self, ctx: &SessionContext, id: NodeId, content: &str) -> FsResult<()> {
        let node = self.tree.node(id)?;
        if !matches!(node.kind, NodeKind::File { .. }) {
            return Err(FsError::NotAFile);
        }
        self.oracle.require(node, &ctx.identity, Capability::Write)?;
        self.tree.node_mut(id)?.set_content(content);
        Ok(())
    }

    pub fn read_file(&mut self, ctx: &SessionContext, path: &str) -> FsResult<String> {
        let id = self.lookup(ctx, path, true)?;
        let node = self.tree.node(id)?;
        let NodeKind::File { content } = &node.kind else {
            return Err(FsError::NotAFile);
        };
        self.oracle.require(node, &ctx.identity, Capability::Read)?;
        let content = content.clone();
        self.tree.node_mut(id)?.times.touch_accessed();
        debug!(path, actor = %ctx.identity.id, len = content.len(), "read_file");
        Ok(content)
    }

    /// Remove the entry named by `path`. A trailing symlink is removed itself,
    /// never its target; directories are removed with everything below them.
    pub fn delete(&mut self, ctx: &SessionContext, path: &str) -> FsResult<()> {
        let result = self.delete_inner(ctx, path);
        audit("delete", path, ctx, &result);
        result
    }

    fn delete_inner(&mut self, ctx: &SessionContext, path: &str) -> FsResult<()> {
        let (parent_id, name) = self.resolve_parent(ctx, path)?;
        if self.tree.get_child(parent_id, name).is_none() {
            return Err(FsError::NotFound);
        }
        self.tree.remove_child(parent_id, name)?;
        self.tree.node_mut(parent_id)?.times.touch_modified();
        Ok(())
    }

    // Directory operations
    pub fn create_directory(&mut self, ctx: &SessionContext, path: &str) -> FsResult<NodeId> {
        let result = self.create_node(ctx, path, NodeKind::empty_directory(), self.config.dir_mode());
        audit("create_directory", path, ctx, &result);
        result
    }

    /// Name-ordered listing of a directory; requires `read` and `execute`.
    pub fn list_directory(&mut self, ctx: &SessionContext, path: &str) -> FsResult<Vec<DirEntry>> {
        let id = self.lookup(ctx, path, true)?;
        let node = self.tree.node(id)?;
        if !node.is_dir() {
            return Err(FsError::NotADirectory);
        }
        self.oracle.require(node, &ctx.identity, Capability::Read)?;
        self.oracle.require(node, &ctx.identity, Capability::Execute)?;

        let mut entries = Vec::new();
        for (name, child_id) in self.tree.sorted_children(id)? {
            let child = self.tree.node(child_id)?;
            let link_target = match &child.kind {
                NodeKind::Symlink { target } => Some(target.clone()),
                _ => None,
            };
            entries.push(DirEntry {
                name: name.to_string(),
                metadata: child.metadata(),
                link_target,
            });
        }
        self.tree.node_mut(id)?.times.touch_accessed();
        Ok(entries)
    }

    pub fn change_directory(&self, ctx: &mut SessionContext, path: &str) -> FsResult<()> {
        let id = self.lookup(ctx, path, true)?;
        let node = self.tree.node(id)?;
        if !node.is_dir() {
            return Err(FsError::NotADirectory);
        }
        self.oracle.require(node, &ctx.identity, Capability::Execute)?;
        ctx.cwd = id;
        Ok(())
    }

    pub fn current_path(&self, ctx: &SessionContext) -> FsResult<String> {
        self.tree.path_of(ctx.cwd)
    }

    // Symlink operations
    /// Create a symlink at `link_path` storing `target` verbatim. The target
    /// is not checked for existence.
    pub fn create_symlink(&mut self, ctx: &SessionContext, target: &str, link_path: &str) -> FsResult<NodeId> {
        let result = if target.is_empty() || target.contains('\0') {
            Err(FsError::InvalidPath)
        } else {
            let kind = NodeKind::Symlink {
                target: target.to_string(),
            };
            self.create_node(ctx, link_path, kind, 0o777)
        };
        audit("create_symlink", link_path, ctx, &result);
        result
    }

    pub fn read_link(&mut self, ctx: &SessionContext, path: &str) -> FsResult<String> {
        let id = self.lookup(ctx, path, false)?;
        let node = self.tree.node_mut(id)?;
        let NodeKind::Symlink { target } = &node.kind else {
            return Err(FsError::NotASymlink);
        };
        let target = target.clone();
        node.times.touch_accessed();
        Ok(target)
    }

    // Metadata operations
    pub fn metadata(&self, ctx: &SessionContext, path: &str, follow_final: bool) -> FsResult<Metadata> {
        let id = self.lookup(ctx, path, follow_final)?;
        Ok(self.tree.node(id)?.metadata())
    }

    /// Replace permission bits; only the owner or root may do this.
    pub fn chmod(&mut self, ctx: &SessionContext, path: &str, mode: Mode) -> FsResult<()> {
        let result = self.chmod_inner(ctx, path, mode);
        audit("chmod", path, ctx, &result);
        result
    }

    fn chmod_inner(&mut self, ctx: &SessionContext, path: &str, mode: Mode) -> FsResult<()> {
        let id = self.lookup(ctx, path, true)?;
        self.oracle.require_owner(self.tree.node(id)?, &ctx.identity)?;
        self.tree.node_mut(id)?.set_mode(mode);
        Ok(())
    }

    /// Change owner and group; root only.
    pub fn chown(&mut self, ctx: &SessionContext, path: &str, owner: &str, group: &str) -> FsResult<()> {
        let result = self.chown_inner(ctx, path, owner, group);
        audit("chown", path, ctx, &result);
        result
    }

    fn chown_inner(&mut self, ctx: &SessionContext, path: &str, owner: &str, group: &str) -> FsResult<()> {
        if owner.is_empty() || group.is_empty() {
            return Err(FsError::InvalidArgument);
        }
        let id = self.lookup(ctx, path, true)?;
        if self.config.security.enforce_permissions && !ctx.identity.is_root {
            return Err(FsError::PermissionDenied);
        }
        self.tree.node_mut(id)?.set_ownership(owner, group);
        Ok(())
    }

    /// Move or rename an entry. A trailing symlink in `from` is moved itself.
    pub fn rename(&mut self, ctx: &SessionContext, from: &str, to: &str) -> FsResult<()> {
        let result = self.rename_inner(ctx, from, to);
        audit("rename", from, ctx, &result);
        result
    }

    fn rename_inner(&mut self, ctx: &SessionContext, from: &str, to: &str) -> FsResult<()> {
        let (src_parent, src_name) = self.resolve_parent(ctx, from)?;
        let id = self.tree.get_child(src_parent, src_name).ok_or(FsError::NotFound)?;
        let (dst_parent, dst_name) = self.resolve_parent(ctx, to)?;

        match self.tree.get_child(dst_parent, dst_name) {
            Some(existing) if existing == id => return Ok(()),
            Some(_) => return Err(FsError::AlreadyExists),
            None => {}
        }
        if self.tree.node(id)?.is_dir() && self.tree.is_ancestor(id, dst_parent) {
            return Err(FsError::InvalidArgument);
        }

        self.tree.detach_child(src_parent, src_name)?;
        if let Err(err) = self.tree.attach_child(dst_parent, dst_name, id) {
            self.tree.attach_child(src_parent, src_name, id)?;
            return Err(err);
        }
        self.tree.node_mut(src_parent)?.times.touch_modified();
        self.tree.node_mut(dst_parent)?.times.touch_modified();
        Ok(())
    }

    /// Depth-first, name-ordered enumeration of the subtree at `path`.
    ///
    /// Symlinks are reported but not followed. Directories the actor cannot
    /// both read and execute are reported without their contents.
    pub fn walk(&self, ctx: &SessionContext, path: &str) -> FsResult<Vec<WalkEntry>> {
        let start = self.lookup(ctx, path, true)?;
        let start_path = self.tree.path_of(start)?;
        let mut out = Vec::new();
        self.walk_into(ctx, start, start_path, &mut out)?;
        Ok(out)
    }

    fn walk_into(&self, ctx: &SessionContext, id: NodeId, path: String, out: &mut Vec<WalkEntry>) -> FsResult<()> {
        let node = self.tree.node(id)?;
        out.push(WalkEntry {
            path: path.clone(),
            name: node.name.clone(),
            kind: node.node_type(),
        });

        if !node.is_dir()
            || !self.oracle.check(node, &ctx.identity, Capability::Read)
            || !self.oracle.check(node, &ctx.identity, Capability::Execute)
        {
            return Ok(());
        }

        for (name, child_id) in self.tree.sorted_children(id)? {
            let child_path = if path == "/" {
                format!("/{name}")
            } else {
                format!("{path}/{name}")
            };
            self.walk_into(ctx, child_id, child_path, out)?;
        }
        Ok(())
    }

    // Snapshot operations
    pub fn serialize(&self) -> FsResult<Vec<u8>> {
        snapshot::serialize(&self.tree)
    }

    /// Replace the whole tree with a decoded snapshot. The live tree is only
    /// swapped once decoding and validation have fully succeeded.
    pub fn restore(&mut self, bytes: &[u8]) -> FsResult<()> {
        let tree = snapshot::deserialize(bytes)?;
        info!(nodes = tree.len(), "restored snapshot");
        self.tree = tree;
        Ok(())
    }
}

impl Default for FsCore {
    fn default() -> Self {
        Self::new(FsConfig::default())
    }
}

fn audit<T>(op: &str, path: &str, ctx: &SessionContext, result: &FsResult<T>) {
    match result {
        Ok(_) => info!(op, path, actor = %ctx.identity.id, "success"),
        Err(err) => debug!(op, path, actor = %ctx.identity.id, %err, "failed"),
    }
}
