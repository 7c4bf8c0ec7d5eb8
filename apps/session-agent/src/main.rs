//! # Campus Session Agent
//!
//! Headless runner for the session coordinator: signs in with configured
//! credentials, follows the session, joins realtime rooms and logs out on
//! Ctrl-C.

mod config;
mod state;
mod telemetry;

use anyhow::Context;
use tokio::sync::broadcast::error::RecvError;

use campus_session::{CoordinatorConfig, SessionCoordinator, SessionSnapshot};

use config::AgentConfig;
use state::Adapters;
use telemetry::{TelemetryConfig, init_telemetry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    init_telemetry(&TelemetryConfig::from_env());

    let config = AgentConfig::from_env();
    let adapters = Adapters::from_env().context("failed to configure adapters")?;

    let coordinator = SessionCoordinator::start(
        adapters.provider,
        adapters.backend,
        adapters.limiter,
        adapters.connector,
        CoordinatorConfig::from_env(),
    );
    coordinator.set_active_view(config.view.clone());

    let mut session = coordinator.session();
    let mut redirects = coordinator.redirects();

    if let Some(credentials) = &config.credentials {
        let store = coordinator.store();
        let signed_in = match credentials.sign_up_as {
            Some(role) => store
                .sign_up(&credentials.email, &credentials.password, role)
                .await
                .map_err(anyhow::Error::from),
            None => store
                .sign_in(&credentials.email, &credentials.password)
                .await
                .map_err(anyhow::Error::from),
        };
        match signed_in {
            Ok(identity) => tracing::info!(uid = %identity.uid, "Provider sign-in accepted"),
            Err(e) => tracing::error!(error = %e, "Sign-in failed"),
        }
    } else {
        tracing::info!("AGENT_EMAIL / AGENT_PASSWORD not set. Waiting for provider state.");
    }

    let mut joined = false;
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            changed = session.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = session.borrow_and_update().clone();
                log_snapshot(&snapshot);

                if snapshot.user.is_none() {
                    joined = false;
                } else if !joined && coordinator.channel().connected() {
                    joined = join_rooms(&coordinator, &config.rooms).await;
                }
            }
            intent = redirects.recv() => match intent {
                Ok(intent) => {
                    tracing::info!(
                        from = %intent.from,
                        to = intent.to,
                        role = %intent.role,
                        "Redirect"
                    );
                    coordinator.set_active_view(intent.to);
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Missed redirect intents");
                }
                Err(RecvError::Closed) => break,
            },
            _ = tokio::time::sleep(std::time::Duration::from_secs(1)), if !joined => {
                if coordinator.store().user().is_some() && coordinator.channel().connected() {
                    joined = join_rooms(&coordinator, &config.rooms).await;
                }
            }
            _ = &mut shutdown => {
                tracing::info!("Shutdown signal received");
                break;
            }
        }
    }

    if coordinator.store().user().is_some() {
        match coordinator.store().logout().await {
            Ok(()) => {}
            Err(e) => tracing::warn!(error = %e, "Logout failed"),
        }
    }
    coordinator.shutdown().await;

    Ok(())
}

fn log_snapshot(snapshot: &SessionSnapshot) {
    match &snapshot.user {
        Some(user) => tracing::info!(
            user_id = user.user_id(),
            role = %user.role(),
            profile_complete = user.profile_complete,
            "Session active"
        ),
        None => tracing::info!(phase = ?snapshot.phase, loading = snapshot.loading, "No session"),
    }
}

/// Join every configured room. Returns true once all joins went through.
async fn join_rooms(coordinator: &SessionCoordinator, rooms: &[String]) -> bool {
    let mut all = true;
    for room in rooms {
        if coordinator.channel().join_room(room).await {
            tracing::info!(room = %room, "Joined room");
        } else {
            all = false;
        }
    }
    all
}
