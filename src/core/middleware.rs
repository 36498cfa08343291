use crate::core::error::AppError;
use crate::core::extractor::CurrentProfile;
use crate::features::access::model::{AllowList, Role, SessionState};
use crate::features::access::AccessService;
use crate::features::auth::{session_from_headers, JwtValidator};
use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::prelude::*;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::request_id::{MakeRequestId, RequestId};
use tracing::Span;
use uuid::Uuid;

/// Request ID generator using UUID v7 (time-ordered)
#[derive(Clone, Copy)]
pub struct MakeRequestUuid;

impl MakeRequestId for MakeRequestUuid {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string();
        HeaderValue::from_str(&id).ok().map(RequestId::new)
    }
}

/// Custom MakeSpan that includes request_id in the tracing span
#[derive(Clone, Debug)]
pub struct MakeSpanWithRequestId;

impl<B> tower_http::trace::MakeSpan<B> for MakeSpanWithRequestId {
    fn make_span(&mut self, request: &axum::http::Request<B>) -> Span {
        let request_id = request
            .headers()
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("-");

        tracing::info_span!(
            "request",
            method = %request.method(),
            uri = %request.uri(),
            request_id = %request_id,
        )
    }
}

pub fn cors_layer(allowed_origins: Vec<String>) -> CorsLayer {
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    // If origins list contains "*", allow any origin
    if allowed_origins.iter().any(|o| o == "*") {
        cors.allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> = allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        cors.allow_origin(AllowOrigin::list(origins))
    }
}

pub fn basic_auth_middleware(
    valid_credentials: Arc<String>,
) -> impl Fn(
    Request,
    Next,
)
    -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Response, Response>> + Send>>
       + Clone {
    move |req: Request, next: Next| {
        let credentials = valid_credentials.clone();
        Box::pin(async move {
            let provided = req
                .headers()
                .get(header::AUTHORIZATION)
                .and_then(|header| header.to_str().ok())
                .and_then(|header| header.strip_prefix("Basic "))
                .and_then(|encoded| BASE64_STANDARD.decode(encoded).ok())
                .and_then(|decoded| String::from_utf8(decoded).ok());

            if provided.as_deref() == Some(credentials.as_str()) {
                return Ok(next.run(req).await);
            }

            Err((
                StatusCode::UNAUTHORIZED,
                [(header::WWW_AUTHENTICATE, "Basic realm=\"Swagger UI\"")],
                "Unauthorized",
            )
                .into_response())
        })
    }
}

/// Resolve the bearer token into a [`SessionState`] request extension.
///
/// Never rejects: an unusable token is simply no session, and the access gate
/// decides what that means for the route.
pub async fn session_middleware(
    State(validator): State<Arc<JwtValidator>>,
    mut req: Request,
    next: Next,
) -> Response {
    let session = session_from_headers(&validator, req.headers()).await;
    req.extensions_mut().insert(session);
    next.run(req).await
}

/// Route guard in front of a group of API routes.
#[derive(Clone)]
pub struct AccessGate {
    service: Arc<AccessService>,
    allow_list: AllowList,
}

impl AccessGate {
    pub fn new(service: Arc<AccessService>, allow_list: AllowList) -> Self {
        Self {
            service,
            allow_list,
        }
    }

    /// Gate with the allow-list of a console page. A page the policy does not
    /// cover is admin-only.
    pub fn page(service: Arc<AccessService>, path: &str) -> Self {
        let allow_list = match service.policy().allow_list_for(path) {
            Some(roles) => roles.clone(),
            None => {
                tracing::warn!("No page rule for {}, restricting to admins", path);
                AllowList::only(Role::Admin)
            }
        };
        Self::new(service, allow_list)
    }
}

pub async fn access_gate(
    State(gate): State<AccessGate>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let session = req
        .extensions()
        .get::<SessionState>()
        .cloned()
        .unwrap_or(SessionState::Absent);

    let profile = gate
        .service
        .evaluate(session, gate.allow_list.clone())
        .await
        .into_profile()?;

    req.extensions_mut().insert(CurrentProfile(profile));
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::access::collaborators::{DocumentStore, USERS_COLLECTION};
    use crate::features::access::policy::RoutePolicy;
    use crate::features::access::role::RoleResolver;
    use crate::features::auth::RevocationList;
    use crate::shared::test_helpers::{profile_document, signed_in, with_session, MemoryDocumentStore};
    use axum::{
        body::Body,
        middleware::{from_fn, from_fn_with_state},
        routing::get,
        Router,
    };
    use std::time::Duration;
    use tower::ServiceExt;

    fn get_request(authorization: Option<String>) -> Request {
        let mut builder = axum::http::Request::builder().uri("/");
        if let Some(value) = authorization {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_basic_auth_checks_credentials() {
        let app = Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(from_fn(basic_auth_middleware(Arc::new(
                "docs:secret".to_string(),
            ))));

        let accepted = app
            .clone()
            .oneshot(get_request(Some(format!(
                "Basic {}",
                BASE64_STANDARD.encode("docs:secret")
            ))))
            .await
            .unwrap();
        assert_eq!(accepted.status(), StatusCode::OK);

        let wrong = app
            .clone()
            .oneshot(get_request(Some(format!(
                "Basic {}",
                BASE64_STANDARD.encode("docs:guess")
            ))))
            .await
            .unwrap();
        assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
        assert!(wrong.headers().contains_key(header::WWW_AUTHENTICATE));

        let missing = app.oneshot(get_request(None)).await.unwrap();
        assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_request_ids_are_unique() {
        let request = axum::http::Request::new(());
        let mut maker = MakeRequestUuid;
        let first = maker.make_request_id(&request).unwrap();
        let second = maker.make_request_id(&request).unwrap();
        assert_ne!(first.header_value(), second.header_value());
    }

    fn access_service() -> Arc<AccessService> {
        let store = MemoryDocumentStore::new();
        store.insert(USERS_COLLECTION, "a1", profile_document("a1", Role::Admin));
        store.insert(USERS_COLLECTION, "t1", profile_document("t1", Role::Teacher));
        let documents: Arc<dyn DocumentStore> = Arc::new(store);
        Arc::new(AccessService::new(
            Arc::new(RoutePolicy::default()),
            Arc::new(RoleResolver::new(documents, Duration::from_secs(3))),
            Arc::new(RevocationList::new()),
            Duration::from_secs(5),
        ))
    }

    fn gated(gate: AccessGate, session: SessionState) -> Router {
        let router = Router::new().route(
            "/",
            get(|CurrentProfile(profile): CurrentProfile| async move { profile.id })
                .route_layer(from_fn_with_state(gate, access_gate)),
        );
        with_session(router, session)
    }

    #[tokio::test]
    async fn test_gate_hands_profile_to_handler() {
        let gate = AccessGate::page(access_service(), "/students");
        let response = gated(gate, signed_in("t1"))
            .oneshot(get_request(None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_page_gates_as_admin_only() {
        let service = access_service();

        let teacher = gated(AccessGate::page(Arc::clone(&service), "/reports"), signed_in("t1"))
            .oneshot(get_request(None))
            .await
            .unwrap();
        assert_eq!(teacher.status(), StatusCode::FORBIDDEN);

        let admin = gated(AccessGate::page(service, "/reports"), signed_in("a1"))
            .oneshot(get_request(None))
            .await
            .unwrap();
        assert_eq!(admin.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_missing_session_extension_is_absent() {
        let gate = AccessGate::new(access_service(), AllowList::all());
        let router = Router::new().route(
            "/",
            get(|| async { "ok" }).route_layer(from_fn_with_state(gate, access_gate)),
        );
        let response = router.oneshot(get_request(None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
