//! `mmi-adapter` binary: serves the built-in and discovered units until
//! interrupted.

use axum::http::{header, HeaderValue, Method};
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use mmi_adapter::{AdapterConfig, AdapterController};

const DEFAULT_LOG_FILTER: &str = "mmi_adapter=debug,tower_http=debug";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    read_env_files();
    init_tracing();

    let config = AdapterConfig::from_env()?;
    tracing::info!(
        adapter_id = %config.adapter_id,
        name = %config.adapter_name,
        bind = %config.bind_address(),
        directory = ?config.directory_url,
        unit_paths = ?config.units.paths,
        session_timeout = ?config.sessions.timeout,
        "Adapter configured"
    );

    let mut controller = AdapterController::new(config);
    if let Some(cors) = status_cors() {
        controller = controller.with_router_layer(move |router| router.layer(cors));
    }

    let running = controller.start().await?;
    tracing::info!(addr = %running.local_addr(), "Adapter serving");

    wait_for_stop().await;
    running.shutdown().await;
    Ok(())
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// `.env.local` then `.env` from the workspace root; earlier files win.
fn read_env_files() {
    let root = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../..");
    for name in [".env.local", ".env"] {
        let path = root.join(name);
        if path.is_file() {
            let _ = dotenvy::from_path(path);
        }
    }
}

async fn wait_for_stop() {
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Cannot watch for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Cannot watch for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => {}
        _ = terminate => {}
    }
    tracing::info!("Stopping adapter");
}

/// CORS for the read-only status routes, from `CORS_ALLOWED_ORIGINS`
/// (`*` or a comma-separated origin list).
fn status_cors() -> Option<CorsLayer> {
    let origins = std::env::var("CORS_ALLOWED_ORIGINS").ok()?;
    let origins = origins.trim();

    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    if origins == "*" {
        return Some(layer.allow_origin(Any));
    }

    let list: Vec<HeaderValue> = origins
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();
    (!list.is_empty()).then(|| layer.allow_origin(list))
}
