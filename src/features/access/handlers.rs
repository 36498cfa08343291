use axum::{
    extract::{Query, State},
    Json,
};

use super::dtos::{AccessDecisionDto, CheckPageQuery, LandingDto, NavItemDto, NavigationDto};
use super::model::{AccessDecision, SessionState};
use super::routes::AccessState;
use crate::core::error::Result;
use crate::core::extractor::CurrentProfile;
use crate::shared::types::ApiResponse;

/// Where to send the caller after sign-in
///
/// Signed-in users with a profile get their role's landing page and have
/// their last login recorded; anyone else gets the page the guard redirects
/// to.
#[utoipa::path(
    get,
    path = "/api/access/landing",
    responses(
        (status = 200, description = "Landing route resolved", body = ApiResponse<LandingDto>)
    ),
    tag = "access",
    security(
        (),
        ("bearer_auth" = [])
    )
)]
pub async fn landing(
    State(state): State<AccessState>,
    session: SessionState,
) -> Json<ApiResponse<LandingDto>> {
    let landing = state.access.landing(session).await;

    let role = match (&landing.decision, &landing.profile) {
        (AccessDecision::Granted, Some(profile)) => {
            state.users.record_login(&profile.id);
            Some(profile.role)
        }
        _ => None,
    };

    Json(ApiResponse::success(
        Some(LandingDto {
            redirect_to: landing.redirect_to,
            role,
        }),
        None,
        None,
    ))
}

/// Guard decision for a console page
#[utoipa::path(
    get,
    path = "/api/access/check",
    params(CheckPageQuery),
    responses(
        (status = 200, description = "Decision for the page", body = ApiResponse<AccessDecisionDto>),
        (status = 404, description = "Not a console page")
    ),
    tag = "access",
    security(
        (),
        ("bearer_auth" = [])
    )
)]
pub async fn check_page(
    State(state): State<AccessState>,
    session: SessionState,
    Query(query): Query<CheckPageQuery>,
) -> Result<Json<ApiResponse<AccessDecisionDto>>> {
    let evaluation = state.access.check_page(session, &query.path).await?;
    let role = evaluation.profile.as_ref().map(|profile| profile.role);

    Ok(Json(ApiResponse::success(
        Some(AccessDecisionDto::new(query.path, evaluation.decision, role)),
        None,
        None,
    )))
}

/// Sidebar entries for the caller's role
#[utoipa::path(
    get,
    path = "/api/access/navigation",
    responses(
        (status = 200, description = "Navigation for the caller's role", body = ApiResponse<NavigationDto>),
        (status = 401, description = "Not signed in or no profile")
    ),
    tag = "access",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn navigation(
    State(state): State<AccessState>,
    CurrentProfile(profile): CurrentProfile,
) -> Json<ApiResponse<NavigationDto>> {
    let items = state
        .access
        .navigation(profile.role)
        .iter()
        .map(NavItemDto::from)
        .collect();

    Json(ApiResponse::success(
        Some(NavigationDto {
            role: profile.role,
            items,
        }),
        None,
        None,
    ))
}
