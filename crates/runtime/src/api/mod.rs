//! Public API surface of the runtime crate.

mod errors;

pub use errors::{Result, SessionError};

pub use crate::broker::{ActionBroker, Candidate, Pick, PickRequest};
pub use crate::channel::{
    ChannelError, CommunicationChannel, InMemoryChannel, Inbound, NoProgression, Outbound,
    ProgressionStore,
};
pub use crate::events::{EventBus, GameEvent, VoteAbort};
pub use crate::session::{GameSession, SessionConfig};
