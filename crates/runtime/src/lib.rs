//! Async orchestration for the werewolf engine.
//!
//! `runtime` owns everything that waits: the action broker's timed
//! solicitations, the night and day pipelines, the background chat relays,
//! and the session driver. The deterministic rules live in `game-core`;
//! this crate only decides *when* they run and who gets asked what.
//!
//! Hosts construct a [`GameSession`] per room with their own
//! [`CommunicationChannel`] and [`ProgressionStore`] implementations and
//! consume the [`GameEvent`] stream.

pub mod api;
pub mod broker;
pub mod channel;
pub mod day;
pub mod deaths;
pub mod events;
pub mod night;
pub mod relay;
pub mod session;

pub use api::{
    ActionBroker, Candidate, ChannelError, CommunicationChannel, EventBus, GameEvent,
    GameSession, InMemoryChannel, Inbound, NoProgression, Outbound, Pick, PickRequest,
    ProgressionStore, Result, SessionConfig, SessionError, VoteAbort,
};
pub use day::DayStage;
pub use night::NightStage;
pub use relay::{Relay, RelayKind, RelaySet};
