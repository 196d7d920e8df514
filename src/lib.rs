//! Portfolio Manager - library for app logic and testing

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod logging;
pub mod mail;
pub mod policy;
pub mod resources;
pub mod routes;
pub mod state;
pub mod store;

use axum::{
    http::{HeaderValue, Method},
    middleware,
    routing::{get, patch, post},
    Extension, Router,
};
use std::{net::SocketAddr, sync::Arc};
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer,
};

use config::Config;
use mail::{ConsoleMailer, Mailer, SmtpMailer};
use resources::ResourceKind;
use state::AppState;
use store::{MemoryStore, PgStore, Store};

/// Configure CORS from environment variables.
/// Uses ALLOWED_ORIGINS (comma-separated) or FRONTEND_ORIGIN.
/// Falls back to the local frontend dev server.
pub fn configure_cors() -> CorsLayer {
    let allowed_origins = std::env::var("ALLOWED_ORIGINS")
        .ok()
        .and_then(|s| {
            let origins: Vec<HeaderValue> = s
                .split(',')
                .filter_map(|origin| origin.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                None
            } else {
                Some(origins)
            }
        })
        .or_else(|| {
            std::env::var("FRONTEND_ORIGIN")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(|origin| vec![origin])
        })
        .unwrap_or_else(|| {
            vec![
                HeaderValue::from_static("http://localhost:3000"),
                HeaderValue::from_static("http://127.0.0.1:3000"),
            ]
        });

    CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::AUTHORIZATION,
        ])
        .allow_credentials(true)
}

/// Every `/api` route. Resource collections share one set of handlers and
/// learn which kind they serve from a route-level `Extension`.
fn api_routes() -> Router<AppState> {
    use routes::{auth, portfolio, resources as records, roles, users};

    let mut api = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/verify-otp", post(auth::verify_otp))
        .route("/resend-otp", post(auth::resend_otp))
        .route("/token/refresh", post(auth::refresh_token))
        .route(
            "/profile",
            get(users::get_profile)
                .put(users::update_profile)
                .patch(users::update_profile),
        )
        .route("/users", get(users::list_users).post(users::create_user))
        .route(
            "/users/{id}",
            get(users::get_user)
                .put(users::update_user)
                .patch(users::update_user)
                .delete(users::delete_user),
        )
        .route("/roles", get(roles::list_roles).post(roles::create_role))
        .route(
            "/roles/{id}",
            get(roles::get_role)
                .put(roles::update_role)
                .patch(roles::update_role)
                .delete(roles::delete_role),
        )
        .route(
            "/template-portfolios/{id}/public-update",
            patch(portfolio::public_update),
        )
        .route(
            "/portfolio/{username}/{unique_slug}",
            get(portfolio::public_portfolio),
        );

    for kind in ResourceKind::ALL {
        api = api
            .route(
                &format!("/{}", kind.collection()),
                get(records::list)
                    .post(records::create)
                    .layer(Extension(kind)),
            )
            .route(
                &format!("/{}/{{id}}", kind.collection()),
                get(records::retrieve)
                    .put(records::replace)
                    .patch(records::patch)
                    .delete(records::destroy)
                    .layer(Extension(kind)),
            );
    }

    api
}

/// Create and configure the application router.
pub fn create_app(state: AppState) -> Router {
    let cors = configure_cors();

    Router::new()
        .nest("/api", api_routes())
        .route("/health", get(routes::health::health_ping))
        .route("/health/detailed", get(routes::health::health_detailed))
        .route("/health/database", get(routes::health::health_database))
        .route("/health/ready", get(routes::health::health_ready))
        .with_state(state)
        .layer(logging::middleware::propagate_request_id_layer())
        .layer(middleware::from_fn(logging::middleware::log_request))
        .layer(logging::middleware::request_id_layer())
        .layer(TraceLayer::new_for_http())
        // Compress responses with gzip/br/zstd automatically
        .layer(CompressionLayer::new())
        // Global 2 MB request body cap
        .layer(RequestBodyLimitLayer::new(2 * 1024 * 1024))
        .layer(cors)
}

/// PostgreSQL when `DATABASE_URL` is set, otherwise an in-memory store.
async fn build_store(config: &Config) -> Arc<dyn Store> {
    if std::env::var("DATABASE_URL").is_err() {
        tracing::warn!("DATABASE_URL not set. Using the in-memory store; data is lost on restart.");
        return Arc::new(MemoryStore::with_default_roles());
    }

    match db::init_pool(None).await {
        Ok(pool) => {
            if let Err(e) = db::run_migrations(&pool).await {
                tracing::error!("Failed to run database migrations: {}", e);
            }
            Arc::new(PgStore::new(pool))
        }
        Err(e) if config.is_production() => {
            panic!("FATAL: failed to connect to the database: {}", e);
        }
        Err(e) => {
            tracing::warn!(
                "Failed to initialize database pool: {}. Falling back to the in-memory store.",
                e
            );
            Arc::new(MemoryStore::with_default_roles())
        }
    }
}

/// SMTP when `SMTP_HOST` is set, otherwise messages are logged.
fn build_mailer(config: &Config) -> Arc<dyn Mailer> {
    let Some(smtp) = &config.smtp else {
        tracing::info!("SMTP_HOST not set. Emails will be written to the log.");
        return Arc::new(ConsoleMailer);
    };

    match SmtpMailer::new(smtp) {
        Ok(mailer) => {
            tracing::info!(host = %smtp.host, port = smtp.port, "SMTP mailer configured");
            Arc::new(mailer)
        }
        Err(e) => {
            tracing::error!("Failed to configure SMTP transport: {}. Emails will be logged.", e);
            Arc::new(ConsoleMailer)
        }
    }
}

/// Run the server (used by main).
pub async fn run() {
    dotenvy::dotenv().ok();
    let config = Config::from_env();

    // Guards MUST be held for the programme's lifetime; dropping them early
    // shuts down background log-writer threads and loses buffered log lines.
    let _log_guards = logging::init(config.is_production());

    routes::health::init_start_time();

    // Refuse to start in production with the insecure default JWT secret.
    if config.is_production() && config.has_insecure_secret() {
        panic!(
            "FATAL: JWT_SECRET must be set to a secure, unique value in production. \
             Refusing to start with the default secret."
        );
    }
    if config.has_insecure_secret() {
        tracing::warn!("SECURITY: JWT_SECRET is using the development default.");
    }

    let store = build_store(&config).await;
    let mailer = build_mailer(&config);
    let app = create_app(AppState::new(store, mailer, config));

    // Bind address is configurable via HOST / PORT env vars.
    let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(3001);
    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .expect("Invalid HOST/PORT configuration");
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app).await.expect("Server error");
}
