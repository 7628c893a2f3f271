//! Permission oracle: owner/group/other rwx checks

use crate::config::SecurityPolicy;
use crate::error::{FsError, FsResult};
use crate::node::Node;
use crate::{Capability, Identity, PermissionClass};

/// Stateless allow/deny decisions for an actor against a node
#[derive(Clone, Debug)]
pub struct PermissionOracle {
    policy: SecurityPolicy,
}

impl PermissionOracle {
    pub fn new(policy: SecurityPolicy) -> Self {
        Self { policy }
    }

    /// Triplet selected for `actor`: owner, then group membership, then other.
    pub(crate) fn class_for(node: &Node, actor: &Identity) -> PermissionClass {
        if actor.id == node.owner {
            PermissionClass::Owner
        } else if actor.in_group(&node.group) {
            PermissionClass::Group
        } else {
            PermissionClass::Other
        }
    }

    pub(crate) fn check(&self, node: &Node, actor: &Identity, cap: Capability) -> bool {
        if !self.policy.enforce_permissions {
            return true;
        }
        if self.policy.root_bypass_permissions && actor.is_root {
            return true;
        }
        node.mode.allows(Self::class_for(node, actor), cap)
    }

    pub(crate) fn require(&self, node: &Node, actor: &Identity, cap: Capability) -> FsResult<()> {
        if self.check(node, actor, cap) {
            Ok(())
        } else {
            tracing::debug!(node = %node.name, actor = %actor.id, ?cap, "permission denied");
            Err(FsError::PermissionDenied)
        }
    }

    /// Metadata changes (chmod) are reserved to the owner and root.
    pub(crate) fn require_owner(&self, node: &Node, actor: &Identity) -> FsResult<()> {
        if !self.policy.enforce_permissions || actor.is_root || actor.id == node.owner {
            Ok(())
        } else {
            Err(FsError::PermissionDenied)
        }
    }
}

impl Default for PermissionOracle {
    fn default() -> Self {
        Self::new(SecurityPolicy::default())
    }
}
