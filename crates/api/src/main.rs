// Coachdesk API Server
// Main entry point for the coach/review chat REST API

mod config;
mod handlers;
mod middleware;
mod routes;

use anyhow::Context;
use coachdesk_auth::{BillingService, IdentityService, JwtService};
use coachdesk_cache::{Cache, CounterStore, MemoryCounterStore};
use coachdesk_database::{ChatRepository, Database};
use coachdesk_llm::CompletionClient;
use config::Config;
use dotenvy::dotenv;
use middleware::{MetricsRecorder, RateLimiter};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

pub struct AppState {
    pub config: Config,
    pub db: Database,
    pub jwt: JwtService,
    pub identity: IdentityService,
    pub billing: BillingService,
    pub chats: ChatRepository,
    pub llm: Arc<dyn CompletionClient>,
    pub rate_limiter: Arc<RateLimiter>,
    pub metrics: Arc<MetricsRecorder>,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,coachdesk_api=debug,tower_http=debug"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv().ok();

    init_tracing();

    tracing::info!("🚀 Starting Coachdesk API Server");
    tracing::info!("📦 Version: {}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = Config::from_env().context("Invalid configuration")?;
    tracing::info!("🔌 Server: {}:{}", config.server_host, config.server_port);

    // Initialize database
    tracing::info!("🗄️  Connecting to database...");
    let database = Database::new(config.database.clone())
        .await
        .context("Failed to connect to database")?;
    database.ping().await.context("Database ping failed")?;
    if config.database.run_migrations {
        database.migrate().await.context("Failed to run migrations")?;
        tracing::info!("🧱 Migrations applied");
    }
    tracing::info!("✅ Database connected");

    // Initialize counter store
    let counters: Arc<dyn CounterStore> = match config.cache.url.as_deref() {
        Some(url) => {
            tracing::info!("⚡ Connecting to Redis...");
            let cache = Cache::new(url).await.context("Failed to connect to Redis")?;
            cache.ping().await.context("Redis ping failed")?;
            tracing::info!("✅ Redis connected");
            Arc::new(cache)
        }
        None => {
            tracing::warn!(
                "⚠️  REDIS_URL not set; rate limits and metrics are kept in process memory"
            );
            Arc::new(MemoryCounterStore::new())
        }
    };

    // Initialize JWT service
    let jwt = JwtService::from_env().context("Failed to initialize JWT verification")?;
    tracing::info!("🔐 JWT verification initialized");

    let identity = IdentityService::new(&database, config.billing.clone());
    let billing = BillingService::new(&database, config.billing.clone());
    tracing::info!(
        "💳 Billing initialized ({} signup {})",
        config.billing.signup_credits,
        config.billing.currency
    );

    let llm = coachdesk_llm::build_client(&config.llm).context("Failed to create LLM client")?;
    tracing::info!("🤖 LLM provider: {} ({})", llm.name(), config.llm.model);

    let rate_limiter = Arc::new(RateLimiter::new(counters.clone(), config.rate_limit));
    tracing::info!(
        "🚦 Rate limit: {} requests / {}s per user",
        config.rate_limit.max_requests,
        config.rate_limit.window_secs
    );

    let metrics = Arc::new(MetricsRecorder::new(counters));

    let addr = format!("{}:{}", config.server_host, config.server_port);
    let pool_handle = database.clone();

    // Create app state
    let state = Arc::new(AppState {
        chats: ChatRepository::new(database.pool().clone()),
        config,
        db: database,
        jwt,
        identity,
        billing,
        llm,
        rate_limiter,
        metrics,
    });

    // Create router
    let app = routes::build_app(state);

    tracing::info!("📡 Routes configured:");
    tracing::info!("   GET    /health");
    tracing::info!("   GET    /api/me");
    tracing::info!("   POST   /api/chat");
    tracing::info!("   GET    /api/chat/sessions[/:id[/messages]]");
    tracing::info!("   PATCH  /api/chat/sessions/:id");
    tracing::info!("   DELETE /api/chat/sessions/:id");
    tracing::info!("   GET    /api/admin/billing[/ledger]");
    tracing::info!("   POST   /api/admin/billing/topup");
    tracing::info!("   GET    /api/admin/metrics");

    // Start server
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    tracing::info!("✅ Server ready at http://{}", addr);
    tracing::info!("🎯 Ready to accept requests!");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    pool_handle.close().await;
    tracing::info!("👋 Database pool closed");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install CTRL+C handler: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("🛑 Shutdown signal received");
}
