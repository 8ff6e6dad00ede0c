//! Deterministic werewolf rules shared across hosts.
//!
//! `game-core` defines the canonical data model (roles, sides, players,
//! the session aggregate), roster balancing, and win evaluation, and
//! exposes pure APIs that the async runtime and offline tools reuse. All
//! state mutation flows through [`state::Game`]; nothing here is async and
//! nothing performs I/O.

pub mod config;
pub mod role;
pub mod roster;
pub mod state;
pub mod victory;

pub use config::GameConfig;
pub use role::{
    side_of, AdvancedVariant, GameMode, LonerKind, Role, Side, Team,
};
pub use roster::{parse_role_list, Roster, RosterBuilder, RosterError};
pub use state::{
    Bonds, Conditions, Counters, Game, KillOutcome, KillerGroup, NightState, OneShots,
    PendingResurrection, Phase, Player, PlayerId,
};
pub use victory::{evaluate, Verdict};
