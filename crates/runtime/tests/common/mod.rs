//! Shared fixtures for the session integration tests.

use std::sync::Arc;
use std::time::Duration;

use game_core::{GameMode, Role};
use runtime::{GameSession, InMemoryChannel, NoProgression, Outbound, SessionConfig};
use tokio::sync::mpsc::UnboundedReceiver;

/// Opt-in stage tracing for debugging test runs: `RUST_LOG=night=debug`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// Millisecond-scale windows so unanswered prompts fall through quickly.
pub fn fast_config() -> SessionConfig {
    SessionConfig {
        solicit_timeout: Duration::from_millis(120),
        nomination_window: Duration::from_millis(150),
        ballot_timeout: Duration::from_millis(150),
        wolf_chat_window: Duration::from_millis(150),
        read_delay: Duration::from_millis(1),
        event_buffer: 256,
    }
}

pub fn session_with(
    names: &[&str],
    roles: &[Role],
) -> (
    GameSession<InMemoryChannel>,
    Arc<InMemoryChannel>,
    UnboundedReceiver<Outbound>,
) {
    init_tracing();
    let (channel, outbound) = InMemoryChannel::new();
    let session = GameSession::create(
        GameMode::Classic,
        42,
        names.iter().map(|n| n.to_string()).collect(),
        Some(roles.to_vec()),
        Arc::clone(&channel),
        Arc::new(NoProgression),
        fast_config(),
    )
    .expect("session builds");
    (session, channel, outbound)
}
