mod core;
mod features;
mod modules;
mod shared;

use crate::core::config::Config;
use crate::core::openapi::{ApiDoc, SwaggerInfoModifier};
use crate::core::{database, middleware};
use crate::features::access::policy::RoutePolicy;
use crate::features::access::role::RoleResolver;
use crate::features::access::{routes as access_routes, AccessService};
use crate::features::auth::{JwksClient, JwtValidator, RevocationList};
use crate::features::users::{routes as users_routes, UserService};
use crate::modules::documents::PgDocumentStore;
use axum::{
    extract::State,
    http::StatusCode,
    middleware::{from_fn, from_fn_with_state},
    routing::get,
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::{DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::Modify;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

fn main() -> anyhow::Result<()> {
    // Build Tokio runtime with configurable worker threads
    let worker_threads = std::env::var("TOKIO_WORKER_THREADS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|p| p.get())
                .unwrap_or(4)
        });

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(worker_threads)
        .enable_all()
        .build()?;

    runtime.block_on(async_main(worker_threads))
}

async fn async_main(worker_threads: usize) -> anyhow::Result<()> {
    // Load .env file BEFORE initializing logger so RUST_LOG is available
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().map_err(|e| anyhow::anyhow!(e))?;
    tracing::info!(
        "Configuration loaded (tokio_worker_threads={}, pid={})",
        worker_threads,
        std::process::id()
    );

    // Route policy first: a bad policy file should fail before we touch the network
    let policy = match &config.guard.route_policy_file {
        Some(path) => {
            let policy = RoutePolicy::from_file(path)
                .map_err(|e| anyhow::anyhow!("Invalid route policy {}: {}", path, e))?;
            tracing::info!("Route policy loaded from {}", path);
            policy
        }
        None => {
            let policy = RoutePolicy::default();
            policy
                .validate()
                .map_err(|e| anyhow::anyhow!("Built-in route policy is invalid: {}", e))?;
            tracing::info!("Using built-in route policy");
            policy
        }
    };
    let policy = Arc::new(policy);

    let pool = database::create_pool(&config.database).await?;

    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| anyhow::anyhow!("Migration failed: {}", e))?;
    tracing::info!("Database migrations completed successfully");

    // Auth
    let revocations = Arc::new(RevocationList::new());
    let jwks_client = Arc::new(JwksClient::new(
        &config.auth.issuer,
        config.auth.jwks_cache_ttl,
    ));
    let jwt_validator = Arc::new(JwtValidator::new(
        jwks_client,
        Arc::clone(&revocations),
        config.auth.issuer.clone(),
        config.auth.audience.clone(),
        config.auth.jwt_leeway,
    ));
    tracing::info!("Auth configuration initialized (issuer={})", config.auth.issuer);

    // Access control and users share one document store
    let store = Arc::new(PgDocumentStore::new(pool.clone()));
    let role_resolver = Arc::new(RoleResolver::new(
        store.clone(),
        config.guard.profile_lookup_timeout,
    ));
    let access_service = Arc::new(AccessService::new(
        Arc::clone(&policy),
        role_resolver,
        Arc::clone(&revocations),
        config.guard.session_init_timeout,
    ));
    let user_service = Arc::new(UserService::new(store, Arc::clone(&revocations)));
    tracing::info!(
        "Access service initialized (session_init_timeout={:?}, profile_lookup_timeout={:?})",
        config.guard.session_init_timeout,
        config.guard.profile_lookup_timeout
    );

    // Build application router with dynamic swagger config
    let swagger_modifier = SwaggerInfoModifier {
        title: config.swagger.title.clone(),
        version: config.swagger.version.clone(),
        description: config.swagger.description.clone(),
    };

    let mut openapi = ApiDoc::openapi();
    swagger_modifier.modify(&mut openapi);

    let swagger = if let Some(credentials) = config.swagger.credentials() {
        tracing::info!("Swagger UI basic auth enabled");
        Router::new()
            .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi))
            .layer(from_fn(middleware::basic_auth_middleware(Arc::new(
                credentials,
            ))))
    } else {
        tracing::info!("Swagger UI basic auth disabled (no credentials configured)");
        Router::new().merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi))
    };

    // Every API route sees the request's session; each route group gates itself
    let api_routes = Router::new()
        .merge(access_routes::routes(
            Arc::clone(&access_service),
            Arc::clone(&user_service),
        ))
        .merge(users_routes::routes(user_service, access_service))
        .layer(from_fn_with_state(
            jwt_validator,
            middleware::session_middleware,
        ));

    let health_route = Router::new()
        .route("/health", get(health_check))
        .with_state(pool);

    let app = Router::new()
        .merge(swagger)
        .merge(api_routes)
        .merge(health_route)
        .layer(middleware::cors_layer(
            config.app.cors_allowed_origins.clone(),
        ))
        // Propagate X-Request-Id to response headers
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(middleware::MakeSpanWithRequestId)
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // Generate X-Request-Id using UUID v7 (or use client-provided one)
        .layer(SetRequestIdLayer::x_request_id(middleware::MakeRequestUuid));

    let addr = config.app.server_address();
    let listener = bind_listener(&addr)?;
    tracing::info!("Server listening on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui/", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Liveness plus database reachability
async fn health_check(State(pool): State<PgPool>) -> StatusCode {
    match database::ping(&pool).await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::error!("Health check failed: {:?}", e);
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

fn bind_listener(addr: &str) -> anyhow::Result<tokio::net::TcpListener> {
    let socket_addr: std::net::SocketAddr = addr
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid address: {}", e))?;

    let socket = socket2::Socket::new(
        socket2::Domain::for_address(socket_addr),
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )?;
    socket.set_reuse_address(true)?;
    #[cfg(unix)]
    socket.set_reuse_port(true)?;
    socket.set_nodelay(true)?;

    socket.set_recv_buffer_size(256 * 1024)?;
    socket.set_send_buffer_size(256 * 1024)?;

    #[cfg(target_os = "linux")]
    {
        let keepalive = socket2::TcpKeepalive::new()
            .with_time(std::time::Duration::from_secs(60))
            .with_interval(std::time::Duration::from_secs(10))
            .with_retries(3);
        socket.set_tcp_keepalive(&keepalive)?;
    }
    #[cfg(not(target_os = "linux"))]
    {
        let keepalive = socket2::TcpKeepalive::new().with_time(std::time::Duration::from_secs(60));
        socket.set_tcp_keepalive(&keepalive)?;
    }

    socket.set_nonblocking(true)?;
    socket.bind(&socket_addr.into())?;
    socket.listen(65535)?;

    Ok(tokio::net::TcpListener::from_std(socket.into())?)
}
