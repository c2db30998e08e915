mod api;
mod middleware;
mod scheduler;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::{
    api::{build_app, AppState},
    middleware::AuthState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = invreport_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
    tracing::debug!(?config, "loaded configuration");

    let pool_config = invreport_db::PoolConfig::from_app_config(&config);
    let pool = invreport_db::connect_pool(&config.database_url, pool_config).await?;
    let applied = invreport_db::run_migrations(&pool).await?;
    tracing::info!(applied, "database migrations up to date");
    let abandoned = invreport_db::fail_abandoned_runs(&pool).await?;
    if abandoned > 0 {
        tracing::warn!(abandoned, "closed report runs left running by a previous process");
    }

    let job = Arc::new(invreport_job::build_postgres_job(&pool, &config));
    let mut scheduler = scheduler::build_scheduler(Arc::clone(&job), &config).await?;

    let auth = AuthState::from_env(matches!(
        config.env,
        invreport_core::Environment::Development
    ))?;
    let app = build_app(AppState { pool, job }, auth);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "admin API listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(scheduler) = scheduler.as_mut() {
        scheduler.stop().await?;
        tracing::info!("scheduler: stopped");
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
