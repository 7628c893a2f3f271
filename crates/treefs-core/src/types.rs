//! Core type definitions for TreeFS

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Stable handle for a node in the tree arena
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u64);

impl NodeId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

/// Capability requested from the permission oracle
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Capability {
    Read,
    Write,
    Execute,
}

impl Capability {
    /// Bit for this capability within a single rwx triplet.
    fn triplet_bit(self) -> u16 {
        match self {
            Capability::Read => 0o4,
            Capability::Write => 0o2,
            Capability::Execute => 0o1,
        }
    }
}

/// Which permission triplet applies to an actor
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PermissionClass {
    Owner,
    Group,
    Other,
}

impl PermissionClass {
    fn shift(self) -> u16 {
        match self {
            PermissionClass::Owner => 6,
            PermissionClass::Group => 3,
            PermissionClass::Other => 0,
        }
    }
}

/// Owner/group/other read-write-execute bits
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Mode(u16);

impl Mode {
    pub const MASK: u16 = 0o777;

    /// Build a mode from octal bits, rejecting anything outside `0o777`.
    pub fn from_bits(bits: u16) -> Option<Self> {
        (bits & !Self::MASK == 0).then_some(Self(bits))
    }

    pub(crate) fn from_bits_truncate(bits: u16) -> Self {
        Self(bits & Self::MASK)
    }

    /// Parse an octal string such as `755` or `0644`.
    pub fn parse_octal(s: &str) -> Option<Self> {
        let digits = s.strip_prefix("0o").unwrap_or(s);
        u16::from_str_radix(digits, 8).ok().and_then(Self::from_bits)
    }

    pub fn bits(&self) -> u16 {
        self.0
    }

    pub fn triplet(&self, class: PermissionClass) -> u16 {
        (self.0 >> class.shift()) & 0o7
    }

    pub fn allows(&self, class: PermissionClass, cap: Capability) -> bool {
        self.triplet(class) & cap.triplet_bit() != 0
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for class in [PermissionClass::Owner, PermissionClass::Group, PermissionClass::Other] {
            let t = self.triplet(class);
            write!(
                f,
                "{}{}{}",
                if t & 0o4 != 0 { 'r' } else { '-' },
                if t & 0o2 != 0 { 'w' } else { '-' },
                if t & 0o1 != 0 { 'x' } else { '-' },
            )?;
        }
        Ok(())
    }
}

impl fmt::Octal for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Octal::fmt(&self.0, f)
    }
}

/// The acting identity for a core call.
///
/// User accounts live outside the core; callers hand in the resolved
/// identity and its group memberships.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub group_ids: Vec<String>,
    pub is_root: bool,
}

impl Identity {
    pub fn root() -> Self {
        Self {
            id: "root".to_string(),
            group_ids: vec!["root".to_string()],
            is_root: true,
        }
    }

    pub fn user<S: Into<String>>(id: S, group_ids: Vec<String>) -> Self {
        Self {
            id: id.into(),
            group_ids,
            is_root: false,
        }
    }

    pub fn in_group(&self, group: &str) -> bool {
        self.group_ids.iter().any(|g| g == group)
    }

    /// Group stamped on nodes this identity creates.
    pub fn primary_group(&self) -> &str {
        self.group_ids.first().map(String::as_str).unwrap_or(&self.id)
    }
}

/// Node timestamps, nanoseconds since the Unix epoch
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeTimes {
    pub created_at: i64,
    pub modified_at: i64,
    pub accessed_at: i64,
}

impl NodeTimes {
    pub(crate) fn now() -> Self {
        let now = current_timestamp();
        Self {
            created_at: now,
            modified_at: now,
            accessed_at: now,
        }
    }

    /// Record a read. Never moves the access time backwards.
    pub(crate) fn touch_accessed(&mut self) {
        self.accessed_at = self.accessed_at.max(current_timestamp());
    }

    /// Record a modification, which also counts as an access.
    pub(crate) fn touch_modified(&mut self) {
        let now = current_timestamp();
        self.modified_at = self.modified_at.max(now);
        self.accessed_at = self.accessed_at.max(now);
    }
}

pub(crate) fn current_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as i64)
        .unwrap_or_default()
}

/// Node variant tag
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    File,
    Directory,
    Symlink,
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NodeType::File => "file",
            NodeType::Directory => "directory",
            NodeType::Symlink => "symlink",
        })
    }
}

/// Node attributes as reported by stat-like calls
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Metadata {
    pub kind: NodeType,
    pub owner: String,
    pub group: String,
    pub mode: Mode,
    /// Content bytes for files, child count for directories, target length for symlinks.
    pub size: u64,
    pub times: NodeTimes,
}

/// Directory entry information
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub metadata: Metadata,
    /// Stored target for symlink entries.
    pub link_target: Option<String>,
}

/// One node visited by a subtree walk
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WalkEntry {
    pub path: String,
    pub name: String,
    pub kind: NodeType,
}

/// Explicit per-call session state: where relative paths start and who is acting.
#[derive(Clone, Debug)]
pub struct SessionContext {
    pub cwd: NodeId,
    pub identity: Identity,
}

impl SessionContext {
    pub fn new(cwd: NodeId, identity: Identity) -> Self {
        Self { cwd, identity }
    }
}
