use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::features::access::model::{Profile, Role};
use crate::shared::constants::DEFAULT_AVATAR_TEMPLATE;
use crate::shared::types::PaginationQuery;

/// Console user as returned by the API
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserResponseDto {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub avatar_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_login_at: Option<DateTime<Utc>>,
}

impl From<Profile> for UserResponseDto {
    fn from(profile: Profile) -> Self {
        let avatar_url = profile
            .avatar_url
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| DEFAULT_AVATAR_TEMPLATE.replace("{id}", &profile.id));

        Self {
            id: profile.id,
            name: profile.name,
            email: profile.email,
            role: profile.role,
            avatar_url,
            last_login_at: profile.last_login_at,
        }
    }
}

/// Caller's own profile plus the page they land on
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MeResponseDto {
    pub user: UserResponseDto,
    pub landing_route: String,
}

/// Request DTO for provisioning a profile for an existing identity
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserDto {
    /// Subject id issued by the identity provider
    #[validate(regex(
        path = "*crate::shared::validation::SUBJECT_ID_REGEX",
        message = "Id must be 1-128 letters, digits, underscores or hyphens"
    ))]
    pub id: String,

    #[validate(length(min = 1, max = 128, message = "Name must be 1-128 characters"))]
    pub name: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    pub role: Role,

    #[validate(url(message = "Avatar must be a valid URL"))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

/// Partial update; omitted fields are left alone, `avatarUrl: null` clears
/// the avatar
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserDto {
    #[validate(length(min = 1, max = 128, message = "Name must be 1-128 characters"))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[validate(email(message = "Invalid email format"))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,

    #[validate(url(message = "Avatar must be a valid URL"))]
    #[serde(
        default,
        deserialize_with = "present_or_null",
        skip_serializing_if = "Option::is_none"
    )]
    #[schema(value_type = Option<String>, nullable)]
    pub avatar_url: Option<Option<String>>,
}

impl UpdateUserDto {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.role.is_none() && self.avatar_url.is_none()
    }
}

/// Tells an explicit `null` (`Some(None)`) apart from a missing field (`None`).
fn present_or_null<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct ListUsersQuery {
    /// Only users holding this role
    pub role: Option<Role>,

    /// Page number (1-indexed, default: 1)
    #[param(minimum = 1)]
    pub page: Option<i64>,

    /// Number of items per page (default: 10, max: 100)
    #[param(minimum = 1, maximum = 100)]
    pub page_size: Option<i64>,
}

impl ListUsersQuery {
    pub fn pagination(&self) -> PaginationQuery {
        let defaults = PaginationQuery::default();
        PaginationQuery {
            page: self.page.unwrap_or(defaults.page),
            page_size: self.page_size.unwrap_or(defaults.page_size),
        }
    }
}
