use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::model::{AccessDecision, DenyReason, Role};
use super::policy::NavItem;

#[derive(Debug, Deserialize, IntoParams)]
pub struct CheckPageQuery {
    /// Console page path, e.g. `/problems/new`
    pub path: String,
}

/// Guard decision for one page.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AccessDecisionDto {
    pub path: String,
    pub granted: bool,
    /// Where the client must navigate instead; absent when granted
    pub redirect_to: Option<String>,
    pub reason: Option<DenyReason>,
    pub role: Option<Role>,
}

impl AccessDecisionDto {
    pub fn new(path: String, decision: AccessDecision, role: Option<Role>) -> Self {
        let granted = decision == AccessDecision::Granted;
        match decision {
            AccessDecision::Denied {
                reason,
                redirect_to,
            } => Self {
                path,
                granted: false,
                redirect_to: Some(redirect_to),
                reason: Some(reason),
                role: None,
            },
            AccessDecision::Granted | AccessDecision::Pending => Self {
                path,
                granted,
                redirect_to: None,
                reason: None,
                role,
            },
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LandingDto {
    pub redirect_to: String,
    pub role: Option<Role>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct NavItemDto {
    pub href: String,
    pub label: String,
}

impl From<&NavItem> for NavItemDto {
    fn from(item: &NavItem) -> Self {
        Self {
            href: item.href.clone(),
            label: item.label.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct NavigationDto {
    pub role: Role,
    pub items: Vec<NavItemDto>,
}
