//! User accounts for the interactive session.
//!
//! The filesystem core only sees an [`Identity`]; this module owns the table
//! of known users and who is currently logged in.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use treefs_core::Identity;

pub const ROOT_USER: &str = "root";
pub const ROOT_GROUP: &str = "root";
pub const DEFAULT_GROUP: &str = "users";
const FIRST_REGULAR_UID: u32 = 1000;

/// Error type for account operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum UserError {
    #[error("user already exists: {0}")]
    AlreadyExists(String),

    #[error("no such user: {0}")]
    NotFound(String),

    #[error("invalid user name: {0:?}")]
    InvalidName(String),

    #[error("permission denied")]
    PermissionDenied,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub name: String,
    pub uid: u32,
    /// Group memberships; the first entry is the primary group.
    pub groups: Vec<String>,
}

impl User {
    pub fn is_root(&self) -> bool {
        self.groups.iter().any(|g| g == ROOT_GROUP)
    }

    pub fn identity(&self) -> Identity {
        Identity {
            id: self.name.clone(),
            group_ids: self.groups.clone(),
            is_root: self.is_root(),
        }
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut groups = self.groups.clone();
        groups.sort();
        write!(f, "{} (uid: {}, groups: {})", self.name, self.uid, groups.join(","))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "UserTable")]
pub struct UserManager {
    users: BTreeMap<String, User>,
    current: String,
    next_uid: u32,
}

/// Wire form of [`UserManager`], checked before it becomes one.
#[derive(Deserialize)]
struct UserTable {
    users: BTreeMap<String, User>,
    current: String,
    next_uid: u32,
}

impl TryFrom<UserTable> for UserManager {
    type Error = UserError;

    fn try_from(table: UserTable) -> Result<Self, Self::Error> {
        if let Some((key, _)) = table.users.iter().find(|(key, user)| **key != user.name) {
            return Err(UserError::InvalidName(key.clone()));
        }
        if !table.users.contains_key(&table.current) {
            return Err(UserError::NotFound(table.current));
        }
        let next_uid = table
            .users
            .values()
            .map(|user| user.uid.saturating_add(1))
            .fold(table.next_uid, u32::max);
        Ok(Self {
            users: table.users,
            current: table.current,
            next_uid,
        })
    }
}

impl UserManager {
    /// Table holding only `root`, who is logged in.
    pub fn new() -> Self {
        let root = User {
            name: ROOT_USER.to_string(),
            uid: 0,
            groups: vec![ROOT_GROUP.to_string()],
        };
        let mut users = BTreeMap::new();
        users.insert(root.name.clone(), root);
        Self {
            users,
            current: ROOT_USER.to_string(),
            next_uid: FIRST_REGULAR_UID,
        }
    }

    pub fn current(&self) -> &User {
        // `current` always names an entry: switches and decoding both check it, and users are never removed.
        &self.users[&self.current]
    }

    pub fn get(&self, name: &str) -> Option<&User> {
        self.users.get(name)
    }

    pub fn users(&self) -> impl Iterator<Item = &User> {
        self.users.values()
    }

    /// Register a new user in `users` plus `extra_groups`. Only root may add users.
    pub fn add_user(&mut self, name: &str, extra_groups: &[String]) -> Result<&User, UserError> {
        if !self.current().is_root() {
            return Err(UserError::PermissionDenied);
        }
        if name.is_empty() || name.contains('/') || name.contains('\0') || name.contains(char::is_whitespace) {
            return Err(UserError::InvalidName(name.to_string()));
        }
        if self.users.contains_key(name) {
            return Err(UserError::AlreadyExists(name.to_string()));
        }

        let mut groups = vec![DEFAULT_GROUP.to_string()];
        for group in extra_groups {
            if !group.is_empty() && !groups.contains(group) {
                groups.push(group.clone());
            }
        }
        let user = User {
            name: name.to_string(),
            uid: self.next_uid,
            groups,
        };
        self.next_uid += 1;
        tracing::info!(user = %user.name, uid = user.uid, "added user");
        Ok(self.users.entry(name.to_string()).or_insert(user))
    }

    /// Root may become anyone; everyone else may only "switch" to themselves.
    pub fn switch_user(&mut self, name: &str) -> Result<&User, UserError> {
        if !self.users.contains_key(name) {
            return Err(UserError::NotFound(name.to_string()));
        }
        if !self.current().is_root() && self.current != name {
            return Err(UserError::PermissionDenied);
        }
        self.current = name.to_string();
        Ok(self.current())
    }
}

impl Default for UserManager {
    fn default() -> Self {
        Self::new()
    }
}
