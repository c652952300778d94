mod config;
mod frame;
mod routes;
mod services;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::{oneshot, watch};
use tracing::{error, info};

use crate::config::HubConfig;
use crate::services::hub::{Hub, HubSettings};
use crate::services::persistence::{self, FileStore, SnapshotStore};
use crate::services::shutdown::{self, Watchdog};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = HubConfig::from_env();

    let store: Arc<dyn SnapshotStore> = Arc::new(FileStore::new(config.state_file.clone()));
    let initial = persistence::load(store.as_ref()).await;
    let fonts = services::fonts::load_catalog(&config.fonts_dir).await;

    let settings = HubSettings { tick_interval: config.tick_interval, fonts_dir: config.fonts_dir.clone() };
    let (hub, _hub_task) = Hub::spawn(initial, fonts, settings);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Spawn background persistence task.
    let saver =
        persistence::spawn_persistence_task(hub.clone(), Arc::clone(&store), config.save_interval, shutdown_rx.clone());

    let state = state::AppState::new(hub.clone(), config.heartbeat_interval, shutdown_rx);
    let app = routes::app(state, &config.public_dir, &config.fonts_dir);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port))
        .await
        .expect("failed to bind");

    info!(port = config.port, state_file = %config.state_file.display(), "scoreboard listening");

    let grace = config.shutdown_grace;
    let save_timeout = config.save_timeout;
    let (watchdog_tx, watchdog_rx) = oneshot::channel();
    let on_signal = async move {
        wait_for_signal().await;
        let _ = watchdog_tx.send(Watchdog::arm(grace, move || shutdown::force_exit(grace)));
        shutdown::run(&hub, store.as_ref(), saver, &shutdown_tx, save_timeout).await;
    };

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(on_signal)
        .await
        .expect("server failed");

    // Dropping the runtime would wait on any abandoned blocking write, so
    // exit here while the watchdog is still armed.
    let _watchdog = watchdog_rx.await;
    info!("scoreboard stopped");
    std::process::exit(0);
}

async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received SIGINT; shutting down"),
        () = terminate => info!("received SIGTERM; shutting down"),
    }
}
