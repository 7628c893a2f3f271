//! Configuration types for TreeFS Core

use serde::{Deserialize, Serialize};

/// Resolution limits
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FsLimits {
    /// Upper bound on symlink expansions during a single resolution.
    pub max_symlink_hops: u32,
}

impl Default for FsLimits {
    fn default() -> Self {
        Self {
            max_symlink_hops: 40,
        }
    }
}

/// Permission enforcement settings
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityPolicy {
    pub enforce_permissions: bool,
    pub root_bypass_permissions: bool,
    /// Creation mask applied to new files and directories.
    pub umask: u16,
}

impl Default for SecurityPolicy {
    fn default() -> Self {
        Self {
            enforce_permissions: true,
            root_bypass_permissions: true,
            umask: 0o022,
        }
    }
}

/// Metadata for the root directory of a fresh tree
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RootPolicy {
    pub owner: String,
    pub group: String,
    pub mode: u16,
}

impl Default for RootPolicy {
    fn default() -> Self {
        Self {
            owner: "root".to_string(),
            group: "root".to_string(),
            mode: 0o755,
        }
    }
}

/// Main filesystem configuration
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FsConfig {
    pub limits: FsLimits,
    pub security: SecurityPolicy,
    pub root: RootPolicy,
}

impl FsConfig {
    /// Mode for a newly created regular file.
    pub fn file_mode(&self) -> u16 {
        0o666 & !self.security.umask
    }

    /// Mode for a newly created directory.
    pub fn dir_mode(&self) -> u16 {
        0o777 & !self.security.umask
    }
}
