//! Access-control policy attached to agents.
//!
//! An agent's `access_control` field has three shapes:
//! - absent (`None`): public, readable by every verified user;
//! - empty object (`{}`): private, only the owner (and admins);
//! - `read` / `write` rules naming groups and users.

use serde::{Deserialize, Serialize};

/// Role of the user acting on a record.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    User,
    Pending,
}

/// Kind of access being checked.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Permission {
    Read,
    Write,
}

/// Groups and users granted one permission.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRule {
    #[serde(default)]
    pub group_ids: Vec<String>,
    #[serde(default)]
    pub user_ids: Vec<String>,
}

impl AccessRule {
    fn grants(&self, principal: &Principal) -> bool {
        self.user_ids.iter().any(|id| id == &principal.user_id)
            || principal
                .group_ids
                .iter()
                .any(|group| self.group_ids.contains(group))
    }
}

/// Custom read/write rules. An instance with neither rule set is "private".
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessControl {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read: Option<AccessRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write: Option<AccessRule>,
}

impl AccessControl {
    /// Owner-only access.
    pub fn private() -> Self {
        Self::default()
    }

    pub fn is_private(&self) -> bool {
        self.read.is_none() && self.write.is_none()
    }

    fn rule(&self, permission: Permission) -> Option<&AccessRule> {
        match permission {
            Permission::Read => self.read.as_ref(),
            Permission::Write => self.write.as_ref(),
        }
    }
}

/// The user on whose behalf an access check runs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Principal {
    pub user_id: String,
    pub role: Role,
    pub group_ids: Vec<String>,
}

impl Principal {
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            role,
            group_ids: Vec::new(),
        }
    }

    pub fn with_groups(mut self, group_ids: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.group_ids = group_ids.into_iter().map(Into::into).collect();
        self
    }
}

/// Rule-only check without the owner/admin shortcuts.
///
/// Public records grant read but never write.
pub fn has_access(
    principal: &Principal,
    permission: Permission,
    access_control: Option<&AccessControl>,
) -> bool {
    match access_control {
        None => permission == Permission::Read,
        Some(control) => control
            .rule(permission)
            .is_some_and(|rule| rule.grants(principal)),
    }
}

/// Full check used for records: admins and owners always pass, private
/// records stop everyone else, rules decide the rest.
pub fn can_access(
    principal: &Principal,
    permission: Permission,
    owner_id: Option<&str>,
    access_control: Option<&AccessControl>,
) -> bool {
    if principal.role == Role::Admin || owner_id == Some(principal.user_id.as_str()) {
        return true;
    }
    if access_control.is_some_and(AccessControl::is_private) {
        return false;
    }
    has_access(principal, permission, access_control)
}
