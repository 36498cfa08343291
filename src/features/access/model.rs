use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

/// Roles a console user can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Teacher,
    Student,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Admin, Role::Teacher, Role::Student];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Teacher => "teacher",
            Role::Student => "student",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "teacher" => Ok(Role::Teacher),
            "student" => Ok(Role::Student),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// Set of roles permitted to view a page.
///
/// Kept sorted and deduplicated so two allow-lists naming the same roles in a
/// different order compare equal (the guard only resets on a real change).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Vec<Role>", into = "Vec<Role>")]
pub struct AllowList {
    roles: Vec<Role>,
}

impl AllowList {
    pub fn new(roles: impl IntoIterator<Item = Role>) -> Self {
        let mut roles: Vec<Role> = roles.into_iter().collect();
        roles.sort();
        roles.dedup();
        Self { roles }
    }

    pub fn all() -> Self {
        Self::new(Role::ALL)
    }

    pub fn only(role: Role) -> Self {
        Self::new([role])
    }

    pub fn contains(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn roles(&self) -> &[Role] {
        &self.roles
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}

impl From<Vec<Role>> for AllowList {
    fn from(roles: Vec<Role>) -> Self {
        Self::new(roles)
    }
}

impl From<AllowList> for Vec<Role> {
    fn from(list: AllowList) -> Self {
        list.roles
    }
}

/// Authentication state as reported by the auth collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Loading,
    Absent,
    Present(String),
}

impl SessionState {
    pub fn subject(&self) -> Option<&str> {
        match self {
            SessionState::Present(subject) => Some(subject),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, SessionState::Loading)
    }
}

/// Application-level user record stored at `users/{subject}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_login_at: Option<DateTime<Utc>>,
}

/// Outcome of a single profile lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum RoleLookup {
    Found(Profile),
    /// No document, or a document without a usable role.
    NotFound,
    /// The store could not answer (error or timeout).
    Failed(String),
}

/// Why the guard refused a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case", tag = "kind", content = "role")]
pub enum DenyReason {
    SessionAbsent,
    ProfileNotFound,
    LookupFailed,
    RoleNotAllowed(Role),
}

impl DenyReason {
    /// Authorization failures (signed in, wrong role) as opposed to
    /// authentication failures.
    pub fn is_authorization(&self) -> bool {
        matches!(self, DenyReason::RoleNotAllowed(_))
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenyReason::SessionAbsent => f.write_str("not signed in"),
            DenyReason::ProfileNotFound => f.write_str("no profile for signed-in user"),
            DenyReason::LookupFailed => f.write_str("profile lookup failed"),
            DenyReason::RoleNotAllowed(role) => write!(f, "role '{}' may not view this page", role),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AccessDecision {
    #[default]
    Pending,
    Granted,
    Denied {
        reason: DenyReason,
        redirect_to: String,
    },
}

impl AccessDecision {
    pub fn is_pending(&self) -> bool {
        matches!(self, AccessDecision::Pending)
    }
}
