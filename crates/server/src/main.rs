//! voteroom server entry point.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{Router, middleware};
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use voteroom_api::{middleware::AppState, rate_limit::RateLimiterState, router as api_router};
use voteroom_common::Config;
use voteroom_core::{AuthService, CandidateService, RoomService, TallyService, VoteService};
use voteroom_db::repositories::{
    CandidateRepository, RoomRepository, UserRepository, VoteReceiptRepository,
};

/// How often stale rate-limit windows are purged.
const RATE_LIMIT_CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

/// Waits for a shutdown signal (SIGINT or SIGTERM).
///
/// On Unix systems, this listens for both SIGINT (Ctrl+C) and SIGTERM.
/// On Windows, this only listens for Ctrl+C.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "voteroom=debug,tower_http=debug".into());

    let json = std::env::var("VOTEROOM_LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));
    if json {
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().json())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer())
            .with(filter)
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine
    dotenvy::dotenv().ok();

    init_tracing();

    info!("Starting voteroom server...");

    // Load configuration
    let config = Config::load().context("Failed to load configuration")?;

    // Connect to database
    let db = voteroom_db::init(&config.database)
        .await
        .context("Failed to connect to database")?;
    info!("Connected to database");

    // Run migrations
    info!("Running database migrations...");
    voteroom_db::migrate(&db)
        .await
        .context("Failed to run migrations")?;
    info!("Migrations completed");

    let db = Arc::new(db);

    // Initialize repositories
    let user_repo = UserRepository::new(Arc::clone(&db));
    let room_repo = RoomRepository::new(Arc::clone(&db));
    let candidate_repo = CandidateRepository::new(Arc::clone(&db));
    let receipt_repo = VoteReceiptRepository::new(Arc::clone(&db));

    // Initialize services
    let auth_service = AuthService::new(user_repo, config.admin.clone());
    let room_service = RoomService::new(
        room_repo.clone(),
        candidate_repo.clone(),
        receipt_repo.clone(),
    );
    let tally_service = TallyService::new(
        room_repo.clone(),
        candidate_repo.clone(),
        receipt_repo.clone(),
    );
    let candidate_service =
        CandidateService::new(room_repo, candidate_repo, tally_service.clone());
    let vote_service = VoteService::new(room_service.clone(), receipt_repo, tally_service.clone());

    let state = AppState {
        auth_service,
        room_service,
        candidate_service,
        vote_service,
        tally_service,
    };

    let rate_limiter = RateLimiterState::new();
    {
        let rate_limiter = rate_limiter.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(RATE_LIMIT_CLEANUP_INTERVAL);
            loop {
                interval.tick().await;
                rate_limiter.cleanup().await;
            }
        });
    }

    let app = Router::new()
        .nest("/api", api_router())
        .layer(middleware::from_fn_with_state(
            rate_limiter,
            voteroom_api::rate_limit::rate_limit_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            voteroom_api::middleware::auth_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    // Start server with graceful shutdown
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}
