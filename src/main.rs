use carelink::{app_state::AppState, config::AppConfig, store::StoreSnapshot};
use chrono::Utc;
use std::time::Duration;
use tokio::{signal, time};

// The main entry point: mirrors the caller's invitations and links once, or
// keeps refreshing with `--watch` until interrupted.
#[tokio::main]
async fn main() {
    // Initialize the logger for logging messages
    env_logger::init();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {}", e);
            return;
        }
    };

    let (state, worker) = match AppState::new(&config) {
        Ok(built) => built,
        Err(e) => {
            eprintln!("Error building API client: {}", e);
            return;
        }
    };

    let watch = std::env::args().any(|arg| arg == "--watch");

    match state.invitations.refresh().await {
        Ok(snapshot) => print_summary(&snapshot),
        Err(e) => {
            eprintln!("Refresh failed [{}]: {}", e.kind(), e);
            if !watch {
                return;
            }
        }
    }

    if watch {
        let mut events = state.store.subscribe();
        let mut ticker = time::interval(Duration::from_secs(60));
        ticker.tick().await;
        println!("Watching for changes; press Ctrl+C to stop");
        let shutdown = shutdown_signal();
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = state.invitations.refresh().await {
                        log::warn!("Refresh failed [{}]: {}", e.kind(), e);
                    }
                }
                event = events.recv() => {
                    if let Ok(event) = event {
                        log::info!("Store event: {:?}", event);
                    }
                }
                _ = &mut shutdown => break,
            }
        }
    }

    // Let queued notifications go out before exiting
    state.notifier.flush().await;
    drop(state);
    let _ = worker.await;
}

fn print_summary(snapshot: &StoreSnapshot) {
    let now = Utc::now();
    println!(
        "{} sent, {} received ({} awaiting reply), {} active links",
        snapshot.sent.len(),
        snapshot.received.len(),
        snapshot
            .pending_received()
            .filter(|invitation| !invitation.is_expired_at(now))
            .count(),
        snapshot.active_links().count()
    );
    for invitation in &snapshot.sent {
        println!(
            "  -> {} [{}] expires {}",
            invitation.to_professional_email,
            invitation.effective_status(now),
            invitation.expires_at.format("%Y-%m-%d %H:%M")
        );
    }
    for link in snapshot.active_links() {
        println!(
            "  == {} monthly {} (paid {})",
            link.professional_id, link.monthly_fee, link.total_paid
        );
    }
}

// Resolves on Ctrl+C (or SIGTERM on unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            log::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                log::error!("failed to install signal handler: {}", e);
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

    println!("Signal received, shutting down");
}
