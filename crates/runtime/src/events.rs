//! Host-facing event stream.
//!
//! The session publishes coarse game events to a broadcast bus so hosts
//! can render recaps, scoreboards, and channel state without scraping the
//! chat output. Publishing never blocks and never fails: a bus with no
//! subscribers simply drops events.

use tokio::sync::broadcast;

use game_core::{KillerGroup, Phase, PlayerId, Role, Verdict};

/// Why a day's vote was called off.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VoteAbort {
    PacifistReveal,
    Objection,
}

/// High-level occurrences published during a session.
#[derive(Clone, Debug)]
pub enum GameEvent {
    /// Roster dealt; the session is live.
    RosterAssigned { players: usize },

    /// The state machine moved on.
    PhaseChanged { phase: Phase, round: u32 },

    /// A death was applied and announced.
    PlayerDied {
        player: PlayerId,
        /// Role shown in the announcement (disguise override included).
        revealed: Role,
        group: KillerGroup,
    },

    /// A queued resurrection fired.
    PlayerRevived { player: PlayerId },

    /// A player changed allegiance (cursed conversion, alpha curse,
    /// wild-child turn).
    PlayerConverted { player: PlayerId },

    /// The day's vote was cancelled before resolution.
    VoteCancelled { reason: VoteAbort },

    /// The election concluded. `None` is a tie or an empty field.
    LynchResult { victim: Option<PlayerId> },

    /// The session reached a verdict.
    GameEnded { verdict: Verdict },

    /// The session died on an unrecoverable error after teardown.
    Aborted { reason: String },
}

/// Thin wrapper over the broadcast channel, mirroring the publish side.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<GameEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        EventBus { tx }
    }

    pub fn publish(&self, event: GameEvent) {
        // Nobody listening is fine.
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GameEvent> {
        self.tx.subscribe()
    }
}
