use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use crate::features::access::collaborators::StoreError;
use crate::features::access::model::DenyReason;
use crate::shared::types::ApiResponse;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// The route guard refused the request; the client should navigate to
    /// `redirect_to`.
    #[error("Access denied ({reason}), redirect to {redirect_to}")]
    AccessDenied {
        reason: DenyReason,
        redirect_to: String,
    },
}

/// Body of a denied request.
#[derive(Debug, Serialize, ToSchema)]
pub struct RedirectDto {
    pub redirect_to: String,
    pub reason: DenyReason,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message, errors) = match self {
            AppError::Store(ref e) => {
                tracing::error!("Store error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database error occurred".to_string(),
                    None,
                )
            }
            AppError::NotFound(ref msg) => (StatusCode::NOT_FOUND, msg.clone(), None),
            AppError::Validation(ref msg) => (
                StatusCode::BAD_REQUEST,
                msg.clone(),
                Some(vec![msg.clone()]),
            ),
            AppError::BadRequest(ref msg) => (StatusCode::BAD_REQUEST, msg.clone(), None),
            AppError::Internal(ref msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    None,
                )
            }
            AppError::Conflict(ref msg) => (StatusCode::CONFLICT, msg.clone(), None),
            AppError::AccessDenied {
                reason,
                redirect_to,
            } => {
                let status = if reason.is_authorization() {
                    StatusCode::FORBIDDEN
                } else {
                    StatusCode::UNAUTHORIZED
                };
                let body = ApiResponse::failure(
                    RedirectDto {
                        redirect_to,
                        reason,
                    },
                    Some(reason.to_string()),
                );
                return (status, Json(body)).into_response();
            }
        };

        let body = Json(ApiResponse::<()>::error(Some(message), errors));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::access::model::Role;

    #[test]
    fn test_denied_status_depends_on_reason() {
        let unauthenticated = AppError::AccessDenied {
            reason: DenyReason::SessionAbsent,
            redirect_to: "/login".to_string(),
        };
        assert_eq!(
            unauthenticated.into_response().status(),
            StatusCode::UNAUTHORIZED
        );

        let wrong_role = AppError::AccessDenied {
            reason: DenyReason::RoleNotAllowed(Role::Student),
            redirect_to: "/problems".to_string(),
        };
        assert_eq!(wrong_role.into_response().status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_store_errors_are_hidden() {
        let error = AppError::Store(StoreError::Database(sqlx::Error::PoolTimedOut));
        assert_eq!(
            error.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
