//! Domain types for roster reconciliation.
//!
//! Every value here is scoped to one reconciliation cycle: members are rebuilt
//! from scratch on each fetch, desired records and change-sets are discarded
//! once applied.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Stable remote-assigned identifier of a guild member.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemberId(pub String);

impl MemberId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for MemberId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for MemberId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Remote identifier of a role (snowflake-style string).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleId(pub String);

impl RoleId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for RoleId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RoleId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Remote identifier of the guild whose roster is reconciled.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GuildId(pub String);

impl fmt::Display for GuildId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for GuildId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for GuildId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// The two tracked roles. Independent of each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "Current Member")]
    Current,
    #[serde(rename = "Former Member")]
    Former,
}

impl Role {
    /// Label used on the wire and in the desired-state file.
    pub fn label(self) -> &'static str {
        match self {
            Role::Current => "Current Member",
            Role::Former => "Former Member",
        }
    }

    /// Parse an exact wire label.
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "Current Member" => Some(Role::Current),
            "Former Member" => Some(Role::Former),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Direction of a role mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Add,
    Remove,
}

impl Action {
    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "add" => Some(Action::Add),
            "remove" => Some(Action::Remove),
            _ => None,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Add => write!(f, "add"),
            Action::Remove => write!(f, "remove"),
        }
    }
}

/// Target status carried by one desired-state row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DesiredStatus {
    Current,
    Former,
    /// Anything other than the two accepted literals, including an absent value.
    #[default]
    Unspecified,
}

impl DesiredStatus {
    /// Exact literal match; every other value is `Unspecified`.
    pub fn parse(raw: &str) -> Self {
        match Role::from_label(raw) {
            Some(Role::Current) => DesiredStatus::Current,
            Some(Role::Former) => DesiredStatus::Former,
            None => DesiredStatus::Unspecified,
        }
    }

    /// Target flag values `(want_current, want_former)`.
    ///
    /// `Unspecified` targets neither role, so both get revoked.
    pub fn targets(self) -> RoleFlags {
        RoleFlags {
            is_current: self == DesiredStatus::Current,
            is_former: self == DesiredStatus::Former,
        }
    }
}

// ---------------------------------------------------------------------------
// Domain structs
// ---------------------------------------------------------------------------

/// Role flags of a member. Never mutually exclusive by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RoleFlags {
    #[serde(rename = "currentMember")]
    pub is_current: bool,
    #[serde(rename = "formerMember")]
    pub is_former: bool,
}

impl RoleFlags {
    pub fn has(self, role: Role) -> bool {
        match role {
            Role::Current => self.is_current,
            Role::Former => self.is_former,
        }
    }
}

/// A human guild member as seen by the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: MemberId,
    #[serde(rename = "username")]
    pub display_name: String,
    pub roles: RoleFlags,
}

impl Member {
    pub fn new(id: impl Into<MemberId>, display_name: impl Into<String>, roles: RoleFlags) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            roles,
        }
    }
}

/// One row of the authoritative target state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredRecord {
    pub display_name: String,
    pub status: DesiredStatus,
}

impl DesiredRecord {
    pub fn new(display_name: impl Into<String>, status: DesiredStatus) -> Self {
        Self {
            display_name: display_name.into(),
            status,
        }
    }
}

/// A single role mutation. Serialized in the stable request shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoleChange {
    #[serde(rename = "userId")]
    pub member_id: MemberId,
    #[serde(rename = "username")]
    pub display_name: String,
    pub role: Role,
    pub action: Action,
}

/// Result of applying one [`RoleChange`]. Serialized in the stable response shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyOutcome {
    #[serde(rename = "userId")]
    pub member_id: MemberId,
    pub success: bool,
    #[serde(rename = "status", skip_serializing_if = "Option::is_none", default)]
    pub status_code: Option<u16>,
    #[serde(rename = "error", skip_serializing_if = "Option::is_none", default)]
    pub error_detail: Option<String>,
}

impl ApplyOutcome {
    pub fn succeeded(member_id: MemberId, status_code: u16) -> Self {
        Self {
            member_id,
            success: true,
            status_code: Some(status_code),
            error_detail: None,
        }
    }

    pub fn failed(
        member_id: MemberId,
        status_code: Option<u16>,
        error_detail: impl Into<String>,
    ) -> Self {
        Self {
            member_id,
            success: false,
            status_code,
            error_detail: Some(error_detail.into()),
        }
    }
}

/// Head-count of a roster, as shown above the member table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RosterSummary {
    pub total: usize,
    pub current: usize,
    pub former: usize,
}

impl RosterSummary {
    pub fn of(members: &[Member]) -> Self {
        Self {
            total: members.len(),
            current: members.iter().filter(|m| m.roles.is_current).count(),
            former: members.iter().filter(|m| m.roles.is_former).count(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
