use crate::core::error::{AppError, Result};
use crate::core::extractor::{AppJson, CurrentProfile};
use crate::features::access::policy::default_route;
use crate::features::users::dtos::{
    CreateUserDto, ListUsersQuery, MeResponseDto, UpdateUserDto, UserResponseDto,
};
use crate::features::users::services::UserService;
use crate::shared::types::{ApiResponse, Meta};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use validator::Validate;

#[utoipa::path(
    get,
    path = "/api/users/me",
    responses(
        (status = 200, description = "Profile retrieved successfully", body = ApiResponse<MeResponseDto>),
        (status = 401, description = "Not signed in or no profile", body = ApiResponse<crate::core::error::RedirectDto>)
    ),
    tag = "users",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_me(
    CurrentProfile(profile): CurrentProfile,
) -> Result<Json<ApiResponse<MeResponseDto>>> {
    let landing_route = default_route(profile.role).to_string();
    Ok(Json(ApiResponse::success(
        Some(MeResponseDto {
            user: profile.into(),
            landing_route,
        }),
        None,
        None,
    )))
}

#[utoipa::path(
    get,
    path = "/api/users",
    params(ListUsersQuery),
    responses(
        (status = 200, description = "Users retrieved successfully", body = ApiResponse<Vec<UserResponseDto>>),
        (status = 401, description = "Not signed in or no profile"),
        (status = 403, description = "Role may not view the students page")
    ),
    tag = "users",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_users(
    State(service): State<Arc<UserService>>,
    Query(query): Query<ListUsersQuery>,
) -> Result<Json<ApiResponse<Vec<UserResponseDto>>>> {
    let (users, total) = service.list(&query).await?;
    Ok(Json(ApiResponse::success(
        Some(users),
        None,
        Some(Meta { total }),
    )))
}

#[utoipa::path(
    get,
    path = "/api/users/{id}",
    params(
        ("id" = String, Path, description = "Subject id")
    ),
    responses(
        (status = 200, description = "User retrieved successfully", body = ApiResponse<UserResponseDto>),
        (status = 403, description = "Role may not view the students page"),
        (status = 404, description = "User not found")
    ),
    tag = "users",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_user(
    State(service): State<Arc<UserService>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<UserResponseDto>>> {
    let user = service.get(&id).await?;
    Ok(Json(ApiResponse::success(Some(user), None, None)))
}

#[utoipa::path(
    post,
    path = "/api/users",
    request_body = CreateUserDto,
    responses(
        (status = 201, description = "User created successfully", body = ApiResponse<UserResponseDto>),
        (status = 400, description = "Validation error"),
        (status = 403, description = "Admins only"),
        (status = 409, description = "User already exists")
    ),
    tag = "users",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn create_user(
    State(service): State<Arc<UserService>>,
    AppJson(dto): AppJson<CreateUserDto>,
) -> Result<(StatusCode, Json<ApiResponse<UserResponseDto>>)> {
    dto.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let user = service.create(dto).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(
            Some(user),
            Some("User created".to_string()),
            None,
        )),
    ))
}

#[utoipa::path(
    patch,
    path = "/api/users/{id}",
    params(
        ("id" = String, Path, description = "Subject id")
    ),
    request_body = UpdateUserDto,
    responses(
        (status = 200, description = "User updated successfully", body = ApiResponse<UserResponseDto>),
        (status = 400, description = "Validation error"),
        (status = 403, description = "Admins only"),
        (status = 404, description = "User not found")
    ),
    tag = "users",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn update_user(
    State(service): State<Arc<UserService>>,
    Path(id): Path<String>,
    AppJson(dto): AppJson<UpdateUserDto>,
) -> Result<Json<ApiResponse<UserResponseDto>>> {
    dto.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let user = service.update(&id, dto).await?;
    Ok(Json(ApiResponse::success(
        Some(user),
        Some("User updated".to_string()),
        None,
    )))
}

#[utoipa::path(
    delete,
    path = "/api/users/{id}",
    params(
        ("id" = String, Path, description = "Subject id")
    ),
    responses(
        (status = 200, description = "User deleted and signed out"),
        (status = 403, description = "Admins only")
    ),
    tag = "users",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn delete_user(
    State(service): State<Arc<UserService>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<()>>> {
    service.delete(&id).await?;
    Ok(Json(ApiResponse::success(
        None,
        Some("User deleted".to_string()),
        None,
    )))
}
