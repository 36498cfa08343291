//! Page allow-lists, default landing routes and per-role navigation.
//!
//! The table is data: the default mirrors the console's pages, and a JSON file
//! can replace it at startup. Whatever table is loaded must pass
//! [`RoutePolicy::validate`], which rejects any table where a role's landing
//! route (or a navigation entry) is not viewable by that role.

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::model::{AllowList, Role};
use crate::shared::validation::ROUTE_PATH_REGEX;

/// Global sign-in page.
pub const SIGN_IN_ROUTE: &str = "/login";

/// Where a role lands after sign-in, and where it is sent when it opens a
/// page it may not view.
pub fn default_route(role: Role) -> &'static str {
    match role {
        Role::Admin => "/dashboard",
        Role::Teacher => "/students",
        Role::Student => "/problems",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRule {
    pub path: String,
    pub roles: AllowList,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavItem {
    pub href: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleNavigation {
    pub role: Role,
    pub items: Vec<NavItem>,
}

#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("Failed to read route policy file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse route policy file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid page path: {0}")]
    InvalidPath(String),

    #[error("Duplicate page rule: {0}")]
    DuplicatePath(String),

    #[error("Page {0} has an empty allow-list")]
    EmptyAllowList(String),

    #[error("Landing route {route} for role '{role}' is not viewable by that role")]
    UnreachableLanding { role: Role, route: String },

    #[error("Navigation entry {href} for role '{role}' is not viewable by that role")]
    UnreachableNavItem { role: Role, href: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutePolicy {
    pages: Vec<PageRule>,
    #[serde(default)]
    navigation: Vec<RoleNavigation>,
}

impl Default for RoutePolicy {
    fn default() -> Self {
        use Role::*;

        let page = |path: &str, roles: &[Role]| PageRule {
            path: path.to_string(),
            roles: AllowList::new(roles.iter().copied()),
        };
        let nav = |href: &str, label: &str| NavItem {
            href: href.to_string(),
            label: label.to_string(),
        };

        Self {
            pages: vec![
                page("/dashboard", &[Admin]),
                page("/students", &[Admin, Teacher]),
                page("/problems", &[Admin, Teacher, Student]),
                page("/problems/list", &[Admin, Teacher]),
                page("/problems/new", &[Admin, Teacher]),
                page("/problems/role-play", &[Admin, Teacher]),
                page("/level-tests", &[Admin, Teacher]),
                page("/coming-soon", &[Admin, Teacher, Student]),
            ],
            navigation: vec![
                RoleNavigation {
                    role: Admin,
                    items: vec![
                        nav("/dashboard", "Dashboard"),
                        nav("/students", "Students"),
                        nav("/problems", "Problems"),
                    ],
                },
                RoleNavigation {
                    role: Teacher,
                    items: vec![nav("/students", "Students"), nav("/problems", "Problems")],
                },
                RoleNavigation {
                    role: Student,
                    items: vec![nav("/problems", "Solve problems")],
                },
            ],
        }
    }
}

impl RoutePolicy {
    /// Load from a JSON file and validate it.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, PolicyError> {
        let raw = std::fs::read_to_string(path)?;
        let policy: RoutePolicy = serde_json::from_str(&raw)?;
        policy.validate()?;
        Ok(policy)
    }

    pub fn validate(&self) -> Result<(), PolicyError> {
        let mut seen = std::collections::HashSet::new();
        for rule in &self.pages {
            if !ROUTE_PATH_REGEX.is_match(&rule.path) {
                return Err(PolicyError::InvalidPath(rule.path.clone()));
            }
            if !seen.insert(rule.path.as_str()) {
                return Err(PolicyError::DuplicatePath(rule.path.clone()));
            }
            if rule.roles.is_empty() {
                return Err(PolicyError::EmptyAllowList(rule.path.clone()));
            }
        }

        for role in Role::ALL {
            let route = default_route(role);
            if !self.is_viewable(route, role) {
                return Err(PolicyError::UnreachableLanding {
                    role,
                    route: route.to_string(),
                });
            }
        }

        for nav in &self.navigation {
            for item in &nav.items {
                if !self.is_viewable(&item.href, nav.role) {
                    return Err(PolicyError::UnreachableNavItem {
                        role: nav.role,
                        href: item.href.clone(),
                    });
                }
            }
        }

        Ok(())
    }

    /// Allow-list of the most specific page rule covering `path`.
    ///
    /// Matching is by whole path segments: `/problems/new/draft` falls under
    /// `/problems/new`, but `/problemset` does not fall under `/problems`.
    pub fn allow_list_for(&self, path: &str) -> Option<&AllowList> {
        let path = path.split(['?', '#']).next().unwrap_or(path);
        let path = if path.len() > 1 { path.trim_end_matches('/') } else { path };

        self.pages
            .iter()
            .filter(|rule| covers(&rule.path, path))
            .max_by_key(|rule| rule.path.len())
            .map(|rule| &rule.roles)
    }

    pub fn is_viewable(&self, path: &str, role: Role) -> bool {
        self.allow_list_for(path)
            .is_some_and(|roles| roles.contains(role))
    }

    pub fn navigation_for(&self, role: Role) -> &[NavItem] {
        self.navigation
            .iter()
            .find(|nav| nav.role == role)
            .map(|nav| nav.items.as_slice())
            .unwrap_or(&[])
    }
}

fn covers(prefix: &str, path: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}
