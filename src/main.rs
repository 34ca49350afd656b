//! Subtitle Gateway - ops server
//!
//! Wires the cache tiers, rate limiter and gateway from the environment,
//! runs the expiry sweeper and serves `/health` and `/stats`.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use subtitle_gateway::cache::{
    CacheCoordinator, InMemoryTier, MemoryTier, PersistentTier, SqliteTier,
};
use subtitle_gateway::clock::{Clock, SystemClock};
use subtitle_gateway::config::{Config, MemoryBackend};
use subtitle_gateway::error::FetchError;
use subtitle_gateway::gateway::{LanguageInfo, SubtitleFetcher, SubtitleGateway};
use subtitle_gateway::limiter::{RateLimitConfig, RateLimiter};
use subtitle_gateway::models::OutputFormat;
use subtitle_gateway::tasks::{spawn_sweeper, SweeperHandle};
use subtitle_gateway::{create_router, AppState};

/// Fetcher for a process that only serves the ops surface.
///
/// Embedders pass their own [`SubtitleFetcher`] to [`SubtitleGateway::new`].
struct NoUpstream;

#[async_trait]
impl SubtitleFetcher for NoUpstream {
    async fn fetch(&self, _: &str, _: &str, _: OutputFormat) -> Result<String, FetchError> {
        Err(FetchError::Failed("no upstream fetcher configured".into()))
    }

    async fn list_languages(&self, _: &str) -> Result<Vec<LanguageInfo>, FetchError> {
        Err(FetchError::Failed("no upstream fetcher configured".into()))
    }
}

/// Main entry point for the subtitle gateway.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Build the memory and persistent tiers
/// 4. Create the coordinator, rate limiter and gateway
/// 5. Start the expiry sweeper
/// 6. Serve the ops router until SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "subtitle_gateway=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting subtitle gateway");

    let config = Config::from_env();
    info!(
        cache_enabled = config.cache_enabled,
        cache_ttl = config.cache_ttl,
        cache_max_entries = config.cache_max_entries,
        eviction = %config.eviction_policy,
        rate_limit_per_minute = config.rate_limit_per_minute,
        batch_workers = config.batch_workers,
        port = config.server_port,
        "Configuration loaded"
    );

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let memory = build_memory_tier(&config, clock.clone()).await;

    let (persistent, open_error) = match config.database_path.as_deref() {
        Some(path) if config.cache_enabled => match SqliteTier::open(path) {
            Ok(tier) => (Some(Arc::new(tier) as Arc<dyn PersistentTier>), None),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "persistent tier unavailable, starting degraded");
                (None, Some(e))
            }
        },
        _ => (None, None),
    };

    let coordinator = Arc::new(
        CacheCoordinator::new(memory, persistent, clock.clone(), config.cache_ttl())
            .with_enabled(config.cache_enabled),
    );
    if let Some(err) = open_error {
        coordinator.mark_degraded(&err).await;
    }

    let limiter = Arc::new(RateLimiter::new(
        RateLimitConfig::from_config(&config),
        clock,
    ));
    let gateway = Arc::new(SubtitleGateway::new(
        coordinator.clone(),
        limiter.clone(),
        Arc::new(NoUpstream),
        &config,
    ));

    let sweeper = spawn_sweeper(coordinator, limiter, config.sweep_interval());

    let app = create_router(AppState::new(gateway));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Ops server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(sweeper))
        .await
        .context("server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Picks the L1 implementation. A KeyDB tier that cannot connect falls back
/// to the in-process map.
async fn build_memory_tier(config: &Config, clock: Arc<dyn Clock>) -> Arc<dyn MemoryTier> {
    let in_process = || -> Arc<dyn MemoryTier> {
        Arc::new(InMemoryTier::new(
            config.cache_max_entries,
            config.eviction_policy,
            clock.clone(),
        ))
    };

    match &config.memory_backend {
        MemoryBackend::InProcess => in_process(),
        #[cfg(feature = "keydb")]
        MemoryBackend::KeyDb(url) => {
            let tier = subtitle_gateway::cache::KeyDbTier::connect(
                url,
                config.cache_max_entries,
                config.eviction_policy,
            )
            .await;
            match tier {
                Ok(tier) => Arc::new(tier) as Arc<dyn MemoryTier>,
                Err(e) => {
                    warn!(error = %e, "KeyDB unavailable, using in-process memory tier");
                    in_process()
                }
            }
        }
        #[cfg(not(feature = "keydb"))]
        MemoryBackend::KeyDb(_) => {
            warn!("REDIS_URL set but built without the `keydb` feature, using in-process memory tier");
            in_process()
        }
    }
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM), then stops the sweeper.
async fn shutdown_signal(sweeper: SweeperHandle) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    sweeper.shutdown().await;
    info!("Expiry sweeper stopped");
}
