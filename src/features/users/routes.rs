use crate::core::middleware::{access_gate, AccessGate};
use crate::features::access::model::{AllowList, Role};
use crate::features::access::AccessService;
use crate::features::users::handlers::user_handler;
use crate::features::users::services::UserService;
use axum::{
    middleware::from_fn_with_state,
    routing::{get, patch, post},
    Router,
};
use std::sync::Arc;

/// User routes. Reading the roster follows the students page; changing it is
/// admin-only.
pub fn routes(service: Arc<UserService>, access: Arc<AccessService>) -> Router {
    let signed_in = AccessGate::new(Arc::clone(&access), AllowList::all());
    let roster = AccessGate::page(Arc::clone(&access), "/students");
    let admin = AccessGate::new(access, AllowList::only(Role::Admin));

    Router::new()
        .route(
            "/api/users/me",
            get(user_handler::get_me).route_layer(from_fn_with_state(signed_in, access_gate)),
        )
        .route(
            "/api/users",
            get(user_handler::list_users)
                .route_layer(from_fn_with_state(roster.clone(), access_gate))
                .merge(
                    post(user_handler::create_user)
                        .route_layer(from_fn_with_state(admin.clone(), access_gate)),
                ),
        )
        .route(
            "/api/users/{id}",
            get(user_handler::get_user)
                .route_layer(from_fn_with_state(roster, access_gate))
                .merge(
                    patch(user_handler::update_user)
                        .delete(user_handler::delete_user)
                        .route_layer(from_fn_with_state(admin, access_gate)),
                ),
        )
        .with_state(service)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::access::collaborators::{DocumentStore, USERS_COLLECTION};
    use crate::features::access::policy::RoutePolicy;
    use crate::features::access::role::RoleResolver;
    use crate::features::auth::RevocationList;
    use crate::features::access::model::SessionState;
    use crate::shared::test_helpers::{profile_document, signed_in, with_session, MemoryDocumentStore};
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use serde_json::{json, Value};
    use std::time::Duration;

    fn server(session: SessionState, store: Arc<MemoryDocumentStore>) -> TestServer {
        let revocations = Arc::new(RevocationList::new());
        let documents: Arc<dyn DocumentStore> = store;
        let access = Arc::new(AccessService::new(
            Arc::new(RoutePolicy::default()),
            Arc::new(RoleResolver::new(Arc::clone(&documents), Duration::from_secs(3))),
            Arc::clone(&revocations),
            Duration::from_secs(5),
        ));
        let users = Arc::new(UserService::new(documents, revocations));
        TestServer::new(with_session(routes(users, access), session)).unwrap()
    }

    fn roster() -> Arc<MemoryDocumentStore> {
        let store = MemoryDocumentStore::new();
        for (id, role) in [
            ("a1", Role::Admin),
            ("t1", Role::Teacher),
            ("s1", Role::Student),
            ("s2", Role::Student),
        ] {
            store.insert(USERS_COLLECTION, id, profile_document(id, role));
        }
        Arc::new(store)
    }

    #[tokio::test]
    async fn test_me_returns_profile_and_landing_route() {
        let server = server(signed_in("s1"), roster());

        let response = server.get("/api/users/me").await;
        assert_eq!(response.status_code(), StatusCode::OK);
        let body: Value = response.json();
        assert_eq!(body["data"]["user"]["id"], "s1");
        assert_eq!(body["data"]["landingRoute"], "/problems");
    }

    #[tokio::test]
    async fn test_anonymous_caller_is_sent_to_login() {
        let server = server(SessionState::Absent, roster());

        let response = server.get("/api/users/me").await;
        assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
        let body: Value = response.json();
        assert_eq!(body["success"], false);
        assert_eq!(body["data"]["redirect_to"], "/login");
        assert_eq!(body["data"]["reason"]["kind"], "session_absent");
    }

    #[tokio::test]
    async fn test_teacher_lists_students() {
        let server = server(signed_in("t1"), roster());

        let response = server
            .get("/api/users")
            .add_query_param("role", "student")
            .await;
        assert_eq!(response.status_code(), StatusCode::OK);
        let body: Value = response.json();
        assert_eq!(body["meta"]["total"], 2);
        assert_eq!(body["data"].as_array().map(Vec::len), Some(2));
    }

    #[tokio::test]
    async fn test_student_cannot_list_users() {
        let server = server(signed_in("s1"), roster());

        let response = server.get("/api/users").await;
        assert_eq!(response.status_code(), StatusCode::FORBIDDEN);
        let body: Value = response.json();
        assert_eq!(body["data"]["redirect_to"], "/problems");
        assert_eq!(body["data"]["reason"]["role"], "student");
    }

    #[tokio::test]
    async fn test_teacher_cannot_create_users() {
        let server = server(signed_in("t1"), roster());

        let response = server
            .post("/api/users")
            .json(&json!({
                "id": "n1",
                "name": "New",
                "email": "new@example.com",
                "role": "student"
            }))
            .await;
        assert_eq!(response.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(response.json::<Value>()["data"]["redirect_to"], "/students");
    }

    #[tokio::test]
    async fn test_admin_manages_users() {
        let store = roster();
        let server = server(signed_in("a1"), store.clone());

        let created = server
            .post("/api/users")
            .json(&json!({
                "id": "n1",
                "name": "New",
                "email": "new@example.com",
                "role": "student"
            }))
            .await;
        assert_eq!(created.status_code(), StatusCode::CREATED);

        let updated = server
            .patch("/api/users/n1")
            .json(&json!({"role": "teacher"}))
            .await;
        assert_eq!(updated.status_code(), StatusCode::OK);
        assert_eq!(updated.json::<Value>()["data"]["role"], "teacher");

        let deleted = server.delete("/api/users/n1").await;
        assert_eq!(deleted.status_code(), StatusCode::OK);
        assert!(store.get(USERS_COLLECTION, "n1").is_none());
    }

    #[tokio::test]
    async fn test_invalid_create_is_rejected() {
        let server = server(signed_in("a1"), roster());

        let response = server
            .post("/api/users")
            .json(&json!({
                "id": "n 1",
                "name": "New",
                "email": "not-an-email",
                "role": "student"
            }))
            .await;
        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_caller_without_profile_is_signed_out() {
        let server = server(signed_in("ghost"), roster());

        let response = server.get("/api/users/me").await;
        assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.json::<Value>()["data"]["reason"]["kind"],
            "profile_not_found"
        );
    }
}
