use tuteur::{
    auth,
    config::session::{validate_production_config, SessionConfig},
    config::AppConfig,
    db, handlers, AppState,
};

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use std::{net::SocketAddr, sync::Arc};
use tower_http::trace::TraceLayer;
use tower_sessions_sqlx_store::SqliteStore;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tuteur::repositories::user_repository::SqliteUserRepository;
use tuteur::services::{
    admin_service::AdminService, auth_service::AuthService, question_service::QuestionService,
    quota_service::QuotaService, referral_service::ReferralService, tutor_client::GeminiClient,
    user_service::UserService,
};

// Multipart bodies may carry a 4 MB photo plus form overhead.
const MAX_BODY_BYTES: usize = 5 * 1024 * 1024;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tuteur=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Arc::new(AppConfig::from_env()?);

    // Database connection
    let pool = db::create_pool().await?;

    // Run migrations
    sqlx::migrate!("./migrations").run(&pool).await?;

    // Initialize repositories and services
    let user_repository = Arc::new(SqliteUserRepository::new(pool.clone()));
    let referral_service = Arc::new(ReferralService::new(user_repository.clone()));
    let user_service = Arc::new(UserService::new(
        user_repository.clone(),
        referral_service.clone(),
    ));
    let auth_service = Arc::new(AuthService::new(user_service.clone()));
    let quota_service = Arc::new(QuotaService::new(user_repository.clone()));
    let tutor_client = Arc::new(GeminiClient::new(
        config.gemini.base_url.clone(),
        config.gemini.api_key.clone(),
        config.gemini.model.clone(),
        config.gemini.timeout_secs,
    )?);
    let question_service = Arc::new(QuestionService::new(
        user_repository.clone(),
        quota_service,
        tutor_client,
    ));
    let admin_service = Arc::new(AdminService::new(
        user_repository.clone(),
        config.admin_email.clone(),
    ));

    let app_state = AppState {
        user_service,
        auth_service,
        question_service,
        admin_service,
        config: config.clone(),
        pool: pool.clone(),
    };

    // Session store
    validate_production_config();
    let session_store = SqliteStore::new(pool.clone())
        .with_table_name("sessions")
        .expect("Invalid session table name for sessions");
    session_store.migrate().await?;

    let session_layer = SessionConfig::from_env().create_layer(session_store);

    // Build application routes
    let protected_routes = Router::new()
        .route("/tutor", get(handlers::show_tutor_page))
        .route(
            "/tutor/ask",
            post(handlers::ask_handler).layer(DefaultBodyLimit::max(MAX_BODY_BYTES)),
        )
        .route("/settings", get(handlers::show_settings_page))
        .route(
            "/settings/preference",
            post(handlers::update_preference_handler),
        )
        .route("/admin/unlimited", post(handlers::toggle_unlimited_handler))
        .layer(middleware::from_fn(auth::middleware::require_auth));

    let app = Router::new()
        .route(
            "/",
            get(handlers::show_index)
                .layer(middleware::from_fn(auth::middleware::redirect_if_authenticated)),
        )
        .route("/auth/signup", post(handlers::signup_handler))
        .route("/auth/login", post(handlers::login_handler))
        .route("/logout", get(handlers::logout_handler))
        .merge(protected_routes)
        .layer(session_layer)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    // Start server
    let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port = std::env::var("PORT")
        .unwrap_or_else(|_| "8080".to_string())
        .parse::<u16>()?;

    let addr = SocketAddr::from((host.parse::<std::net::IpAddr>()?, port));

    tracing::info!("Server running on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
