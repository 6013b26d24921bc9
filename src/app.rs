/*
 * Responsibility
 * - Config読み込み → 依存生成 → Router 組み立て
 * - Middleware の適用 (CORS/trusted origins, HTTP 横断処理)
 * - axum::serve() で起動, graceful shutdown
 */
use std::{panic, process};

use anyhow::{Context, Result};
use axum::Router;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    api,
    config::Config,
    error::AppError,
    middleware::{self, cors::TrustedOriginSet},
    services::auth::build_provider_services,
    state::AppState,
};

fn init_tracing() {
    // Prefer RUST_LOG if set; otherwise use a sensible default.
    // Ex:
    // RUST_LOG=info,session_gate=trace,tower_http=debug cargo run
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new("info,session_gate=debug,tower_http=info")
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn init_panic_hook(abort_on_panic: bool) {
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |info| {
        // Surface panics via tracing so they are not lost with stderr.
        tracing::error!(?info, "panic");

        // Development: fail fast. Production: default hook, keep serving.
        if abort_on_panic {
            process::abort();
        } else {
            default_hook(info);
        }
    }))
}

pub async fn run() -> Result<()> {
    init_tracing();
    let config = Config::from_env()?;
    init_panic_hook(!config.app_env.is_production());

    tracing::info!(
        "starting API in {:?} mode on {}",
        config.app_env,
        config.addr
    );

    let state = AppState::from(build_provider_services(&config)?);
    let app = build_router(state, &config)?;

    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("binding {}", config.addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

pub(crate) fn build_router(state: AppState, config: &Config) -> Result<Router> {
    let (app_routes, policies) = api::routes(&state)?;

    for (path, method, policy) in policies.iter() {
        tracing::info!(
            %method,
            route = %format!("{}{}", config.api_prefix, path),
            %policy,
            "route registered"
        );
    }
    if policies.is_empty() {
        tracing::warn!("no application routes registered");
    } else {
        tracing::info!(routes = policies.len(), "application routes registered");
    }
    tracing::info!(
        namespace = %config.auth_base_path,
        "provider namespace forwarded unprefixed"
    );

    let router = Router::new()
        .nest(&config.api_prefix, app_routes)
        .nest(&config.auth_base_path, api::provider_routes())
        .fallback(fallback)
        .with_state(state);

    let trusted = TrustedOriginSet::new(config.trusted_origins.iter().cloned());
    if trusted.is_empty() {
        tracing::warn!("TRUSTED_ORIGINS is empty: every cross-origin request will be rejected");
    }

    let router = middleware::cors::apply(router, trusted);
    let router = middleware::http::apply(router, config);

    Ok(router)
}

async fn fallback() -> AppError {
    AppError::not_found("route")
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = ?err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = ?err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
