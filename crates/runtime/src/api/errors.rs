//! Unified error types surfaced by the session API.
//!
//! Solicitation timeouts and undeliverable prompts are *not* errors — they
//! resolve to empty selections. What lands here is what genuinely ends a
//! session: a roster that cannot be built, a closed transport, or a relay
//! task that died.

use thiserror::Error;

use game_core::RosterError;

pub type Result<T> = std::result::Result<T, SessionError>;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Roster(#[from] RosterError),

    #[error("communication transport closed")]
    ChannelClosed,

    #[error("background relay failed to join")]
    RelayJoin(#[source] tokio::task::JoinError),
}
