use axum::{middleware::from_fn_with_state, routing::get, Router};
use std::sync::Arc;

use super::handlers;
use super::model::AllowList;
use super::service::AccessService;
use crate::core::middleware::{access_gate, AccessGate};
use crate::features::users::UserService;

#[derive(Clone)]
pub struct AccessState {
    pub access: Arc<AccessService>,
    pub users: Arc<UserService>,
}

/// Landing and page checks only need a session; navigation needs a profile.
pub fn routes(access: Arc<AccessService>, users: Arc<UserService>) -> Router {
    let signed_in = AccessGate::new(Arc::clone(&access), AllowList::all());

    Router::new()
        .route("/api/access/landing", get(handlers::landing))
        .route("/api/access/check", get(handlers::check_page))
        .route(
            "/api/access/navigation",
            get(handlers::navigation).route_layer(from_fn_with_state(signed_in, access_gate)),
        )
        .with_state(AccessState { access, users })
}
