//! # guildwardend — guildwarden daemon
//!
//! Composition root that wires every adapter together and runs the engines.
//!
//! ## Responsibilities
//! - Load configuration (`guildwarden.toml`, `GUILDWARDEN_*` env vars)
//! - Initialise `tracing` and the `SQLite` pool (migrations included)
//! - Construct the repositories, the platform and the rate-limited executor
//! - Construct the rule, counting and mirror engines and route bus events
//!   to them
//! - Run the task scheduler and the periodic autorole sweep
//! - Serve the read-only diagnostics API until SIGINT, then stop the
//!   background loops
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer — no domain logic belongs here.

mod config;
mod demo;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing_subscriber::EnvFilter;

use guildwarden_adapter_http_axum::AppState;
use guildwarden_adapter_storage_sqlite_sqlx::{
    Config as StorageConfig, SqliteCountingRepository, SqliteDeferralRepository,
    SqliteMirrorRepository, SqliteRuleRepository, SqliteTaskLogStore, SqliteTaskRepository,
};
use guildwarden_adapter_virtual::InMemoryPlatform;
use guildwarden_app::counting_engine::CountingEngine;
use guildwarden_app::event_bus::InProcessEventBus;
use guildwarden_app::event_router::EventRouter;
use guildwarden_app::executor::Executor;
use guildwarden_app::mirror_engine::MirrorEngine;
use guildwarden_app::rule_engine::RuleEngine;
use guildwarden_app::scheduler::{PlatformDispatcher, Scheduler};
use guildwarden_app::services::{DiagnosticsService, MirrorLinkService, RuleService};
use guildwarden_domain::id::CommunityId;

use crate::config::Config;

type Platform = InMemoryPlatform<Arc<InProcessEventBus>>;
type Rules = RuleEngine<
    Arc<SqliteRuleRepository>,
    Arc<SqliteDeferralRepository>,
    Arc<SqliteTaskRepository>,
    Arc<SqliteTaskLogStore>,
    Arc<Platform>,
>;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.logging.filter)?)
        .init();

    // Database
    let db = StorageConfig {
        database_url: config.database.url.clone(),
        max_connections: config.database.max_connections,
    }
    .build()
    .await?;
    let pool = db.pool().clone();

    // Repositories
    let rule_repo = Arc::new(SqliteRuleRepository::new(pool.clone()));
    let deferral_repo = Arc::new(SqliteDeferralRepository::new(pool.clone()));
    let counting_repo = Arc::new(SqliteCountingRepository::new(pool.clone()));
    let mirror_repo = Arc::new(SqliteMirrorRepository::new(pool.clone()));
    let task_repo = Arc::new(SqliteTaskRepository::new(pool.clone()));
    let task_logs = Arc::new(SqliteTaskLogStore::new(pool));

    // Platform and event bus
    let bus = Arc::new(InProcessEventBus::new(config.events.capacity));
    let events = bus.subscribe();
    let platform: Arc<Platform> = Arc::new(InMemoryPlatform::new(demo::BOT, Arc::clone(&bus)));
    demo::populate(&platform);
    let executor = Arc::new(Executor::new(
        Arc::clone(&platform),
        config.executor_config(),
    ));

    // Engines
    let rules: Arc<Rules> = Arc::new(RuleEngine::new(
        Arc::clone(&rule_repo),
        deferral_repo,
        Arc::clone(&task_repo),
        Arc::clone(&task_logs),
        Arc::clone(&executor),
        config.rule_engine_config(),
    ));
    let counting = Arc::new(CountingEngine::new(
        counting_repo,
        Arc::clone(&task_repo),
        Arc::clone(&executor),
    ));
    let mirror = Arc::new(MirrorEngine::new(
        Arc::clone(&mirror_repo),
        Arc::clone(&executor),
    ));
    let router = Arc::new(EventRouter::new(
        Arc::clone(&rules),
        Arc::clone(&counting),
        mirror,
        config.scheduler.workers,
    ));
    let scheduler = Arc::new(Scheduler::new(
        Arc::clone(&task_repo),
        Arc::clone(&task_logs),
        Arc::new(PlatformDispatcher::new(executor, Arc::clone(&rules))),
        config.scheduler_config(),
    ));

    demo::seed_rules(&RuleService::new(rule_repo), &MirrorLinkService::new(mirror_repo)).await?;
    demo::seed_activities(&counting, &scheduler).await?;

    // Background loops
    let (stop, stopped) = watch::channel(false);
    let mut background = tokio::task::JoinSet::new();
    background.spawn({
        let router = Arc::clone(&router);
        let shutdown = wait_for(stopped.clone());
        async move { router.run(events, shutdown).await }
    });
    background.spawn({
        let scheduler = Arc::clone(&scheduler);
        let shutdown = wait_for(stopped.clone());
        async move { scheduler.run(shutdown).await }
    });
    background.spawn(sweep_loop(
        Arc::clone(&rules),
        vec![demo::COMMUNITY],
        config.sweep_interval(),
        wait_for(stopped),
    ));

    // HTTP
    let state = AppState::new(DiagnosticsService::new(task_repo, task_logs));
    let app = guildwarden_adapter_http_axum::build(state);

    let bind_addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "guildwardend listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("stopping background loops");
    let _ = stop.send(true);
    while let Some(joined) = background.join_next().await {
        if let Err(err) = joined {
            tracing::error!(error = %err, "background loop panicked");
        }
    }
    tracing::info!(missed_events = router.missed_events(), "background loops stopped");
    Ok(())
}

/// Resolves once `true` is sent on the stop channel or its sender is gone.
fn wait_for(mut stopped: watch::Receiver<bool>) -> impl Future<Output = ()> + Send + 'static {
    async move {
        let _ = stopped.wait_for(|stop| *stop).await;
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}

/// Sweep every community each `every`, the first one right away.
async fn sweep_loop(
    rules: Arc<Rules>,
    communities: Vec<CommunityId>,
    every: Duration,
    shutdown: impl Future<Output = ()>,
) {
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            () = &mut shutdown => break,
            _ = interval.tick() => {
                for &community in &communities {
                    if let Err(err) = rules.sweep_all(community).await {
                        tracing::error!(%community, error = ?err, "sweep failed");
                    }
                }
            }
        }
    }
}
