use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::core::error::RedirectDto;
use crate::features::access::model::{DenyReason, Role};
use crate::features::access::{dtos as access_dtos, handlers as access_handlers};
use crate::features::users::{dtos as users_dtos, handlers::user_handler};
use crate::shared::types::{ApiResponse, Meta};

#[derive(OpenApi)]
#[openapi(
    paths(
        // Access
        access_handlers::landing,
        access_handlers::check_page,
        access_handlers::navigation,
        // Users
        user_handler::get_me,
        user_handler::list_users,
        user_handler::get_user,
        user_handler::create_user,
        user_handler::update_user,
        user_handler::delete_user,
    ),
    components(
        schemas(
            // Shared
            Meta,
            Role,
            DenyReason,
            RedirectDto,
            ApiResponse<RedirectDto>,
            // Access
            access_dtos::AccessDecisionDto,
            access_dtos::LandingDto,
            access_dtos::NavItemDto,
            access_dtos::NavigationDto,
            ApiResponse<access_dtos::AccessDecisionDto>,
            ApiResponse<access_dtos::LandingDto>,
            ApiResponse<access_dtos::NavigationDto>,
            // Users
            users_dtos::UserResponseDto,
            users_dtos::MeResponseDto,
            users_dtos::CreateUserDto,
            users_dtos::UpdateUserDto,
            ApiResponse<users_dtos::UserResponseDto>,
            ApiResponse<users_dtos::MeResponseDto>,
            ApiResponse<Vec<users_dtos::UserResponseDto>>,
        )
    ),
    tags(
        (name = "access", description = "Route guard decisions, landing routes and navigation"),
        (name = "users", description = "Console user profiles"),
    ),
    modifiers(&SecurityAddon),
    info(
        title = "EduQuiz Console API",
        version = "0.1.0",
        description = "Access control and user management for the EduQuiz console",
    )
)]
pub struct ApiDoc;

/// Adds Bearer JWT security scheme to OpenAPI spec
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Modifier to override OpenAPI info from config
pub struct SwaggerInfoModifier {
    pub title: String,
    pub version: String,
    pub description: String,
}

impl Modify for SwaggerInfoModifier {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        openapi.info.title = self.title.clone();
        openapi.info.version = self.version.clone();
        openapi.info.description = Some(self.description.clone());
    }
}
