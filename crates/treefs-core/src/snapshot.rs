//! Snapshot encoding of the whole tree
//!
//! The encoding is JSON: a small header plus a flat list of nodes in
//! depth-first, name-ordered sequence. Each entry names its parent by the
//! snapshot-local `id` of an earlier entry, so the document depth stays
//! constant however deep the tree is. Decoding builds a brand new [`Tree`];
//! nothing is mutated until the caller swaps it in.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{FsError, FsResult};
use crate::node::{is_valid_name, Node, NodeKind};
use crate::tree::Tree;
use crate::{Mode, NodeId, NodeTimes};

pub const SNAPSHOT_FORMAT: &str = "treefs-snapshot";
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct SnapshotDocument {
    format: String,
    version: u32,
    nodes: Vec<SnapshotNode>,
}

#[derive(Serialize, Deserialize)]
struct SnapshotNode {
    id: u64,
    /// `None` only for the root, which comes first.
    parent: Option<u64>,
    name: String,
    owner: String,
    group: String,
    mode: u16,
    times: NodeTimes,
    #[serde(flatten)]
    payload: SnapshotPayload,
}

#[derive(Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum SnapshotPayload {
    File { content: String },
    Directory {},
    Symlink { target: String },
}

/// Encode the entire tree.
pub fn serialize(tree: &Tree) -> FsResult<Vec<u8>> {
    let mut nodes = Vec::with_capacity(tree.len());
    let mut pending: Vec<(NodeId, Option<u64>)> = vec![(tree.root(), None)];

    while let Some((id, parent)) = pending.pop() {
        let snapshot_id = nodes.len() as u64;
        let node = tree.node(id)?;
        let payload = match &node.kind {
            NodeKind::File { content } => SnapshotPayload::File {
                content: content.clone(),
            },
            NodeKind::Symlink { target } => SnapshotPayload::Symlink {
                target: target.clone(),
            },
            NodeKind::Directory { .. } => {
                // Reversed so the stack pops children in name order.
                for (_, child) in tree.sorted_children(id)?.into_iter().rev() {
                    pending.push((child, Some(snapshot_id)));
                }
                SnapshotPayload::Directory {}
            }
        };
        nodes.push(SnapshotNode {
            id: snapshot_id,
            parent,
            name: node.name.clone(),
            owner: node.owner.clone(),
            group: node.group.clone(),
            mode: node.mode.bits(),
            times: node.times,
            payload,
        });
    }

    let document = SnapshotDocument {
        format: SNAPSHOT_FORMAT.to_string(),
        version: SNAPSHOT_VERSION,
        nodes,
    };
    Ok(serde_json::to_vec(&document)?)
}

/// Decode and validate a snapshot into a fresh tree.
pub fn deserialize(bytes: &[u8]) -> FsResult<Tree> {
    let document: SnapshotDocument = serde_json::from_slice(bytes).map_err(|err| {
        warn!(%err, "rejecting malformed snapshot");
        FsError::from(err)
    })?;
    decode_document(document).map_err(|err| {
        warn!(%err, "rejecting invalid snapshot");
        err
    })
}

fn decode_document(document: SnapshotDocument) -> FsResult<Tree> {
    if document.format != SNAPSHOT_FORMAT {
        return Err(FsError::format(format!("unknown format tag {:?}", document.format)));
    }
    if document.version != SNAPSHOT_VERSION {
        return Err(FsError::format(format!("unsupported version {}", document.version)));
    }

    let mut entries = document.nodes.into_iter();
    let Some(root) = entries.next() else {
        return Err(FsError::format("snapshot has no root"));
    };
    if root.parent.is_some() {
        return Err(FsError::format("first entry is not the root"));
    }
    if !matches!(root.payload, SnapshotPayload::Directory {}) {
        return Err(FsError::format("root is not a directory"));
    }

    let mut root_node = Node::new("", NodeKind::empty_directory(), &root.owner, &root.group, decode_mode(root.mode)?);
    root_node.times = root.times;
    let mut tree = Tree::with_root(root_node);

    let mut ids: HashMap<u64, NodeId> = HashMap::new();
    ids.insert(root.id, tree.root());

    for entry in entries {
        let Some(parent) = entry.parent else {
            return Err(FsError::format(format!("second root entry {}", entry.id)));
        };
        let parent_id = *ids
            .get(&parent)
            .ok_or_else(|| FsError::format(format!("entry {} names unknown parent {parent}", entry.id)))?;
        if ids.contains_key(&entry.id) {
            return Err(FsError::format(format!("duplicate entry id {}", entry.id)));
        }
        if !is_valid_name(&entry.name) {
            return Err(FsError::format(format!("invalid entry name {:?}", entry.name)));
        }

        let kind = match entry.payload {
            SnapshotPayload::File { content } => NodeKind::File { content },
            SnapshotPayload::Symlink { target } => NodeKind::Symlink { target },
            SnapshotPayload::Directory {} => NodeKind::empty_directory(),
        };
        let mut node = Node::new(&entry.name, kind, &entry.owner, &entry.group, decode_mode(entry.mode)?);
        node.times = entry.times;

        let id = tree.insert_child(parent_id, node).map_err(|err| match err {
            FsError::AlreadyExists => FsError::format(format!("duplicate entry {:?}", entry.name)),
            FsError::NotADirectory => FsError::format(format!("parent of {:?} is not a directory", entry.name)),
            other => other,
        })?;
        ids.insert(entry.id, id);
    }
    Ok(tree)
}

fn decode_mode(bits: u16) -> FsResult<Mode> {
    Mode::from_bits(bits).ok_or_else(|| FsError::format(format!("invalid mode {bits:o}")))
}
