//! External collaborator seams.
//!
//! The engine never assumes a specific transport: hosts plug in a
//! [`CommunicationChannel`] for delivery and a [`ProgressionStore`] for the
//! advanced-variant check at session start. The in-memory implementation
//! below backs the integration tests and doubles as a reference for host
//! authors.

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};

use game_core::{PlayerId, Role};

/// A message arriving from a participant.
#[derive(Clone, Debug)]
pub struct Inbound {
    pub from: PlayerId,
    pub text: String,
}

/// Delivery failures. Non-fatal: the engine logs and treats the actor as
/// unreachable for that prompt.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("actor {0} is unreachable")]
    Unreachable(PlayerId),

    #[error("transport closed")]
    Closed,
}

/// Transport abstraction consumed by the engine.
///
/// Reliable per-actor delivery plus a way to wait for the next inbound
/// message is all the engine needs; rendering pickers and cards is the
/// host's concern. `subscribe` returns an independent receiver so
/// concurrent solicitations and relays never steal each other's messages.
#[async_trait]
pub trait CommunicationChannel: Send + Sync + 'static {
    async fn send_to_actor(&self, actor: PlayerId, message: &str) -> Result<(), ChannelError>;

    async fn send_to_group(&self, actors: &[PlayerId], message: &str) -> Result<(), ChannelError>;

    async fn broadcast(&self, message: &str) -> Result<(), ChannelError>;

    /// Subscribes to the inbound message stream.
    fn subscribe(&self) -> broadcast::Receiver<Inbound>;
}

/// Read-only progression lookup, consulted once at session start to decide
/// whether an actor may choose an advanced variant of their base role.
#[async_trait]
pub trait ProgressionStore: Send + Sync + 'static {
    async fn level(&self, actor: PlayerId, role: Role) -> u32;
}

/// Default store: nobody has levelled anything.
pub struct NoProgression;

#[async_trait]
impl ProgressionStore for NoProgression {
    async fn level(&self, _actor: PlayerId, _role: Role) -> u32 {
        0
    }
}

/// What the engine sent out, observable by tests and embedding hosts.
#[derive(Clone, Debug)]
pub enum Outbound {
    Direct { to: PlayerId, text: String },
    Group { to: Vec<PlayerId>, text: String },
    Broadcast { text: String },
}

impl Outbound {
    /// The message text regardless of addressing.
    pub fn text(&self) -> &str {
        match self {
            Outbound::Direct { text, .. }
            | Outbound::Group { text, .. }
            | Outbound::Broadcast { text } => text,
        }
    }

    /// Whether `actor` is among the recipients.
    pub fn addressed_to(&self, actor: PlayerId) -> bool {
        match self {
            Outbound::Direct { to, .. } => *to == actor,
            Outbound::Group { to, .. } => to.contains(&actor),
            Outbound::Broadcast { .. } => true,
        }
    }
}

/// In-memory transport: inbound messages are injected with [`say`], every
/// outbound delivery is mirrored to an unbounded queue.
///
/// [`say`]: InMemoryChannel::say
pub struct InMemoryChannel {
    inbound: broadcast::Sender<Inbound>,
    outbound: mpsc::UnboundedSender<Outbound>,
}

impl InMemoryChannel {
    /// Builds the channel and hands back the outbound observation queue.
    pub fn new() -> (std::sync::Arc<Self>, mpsc::UnboundedReceiver<Outbound>) {
        let (inbound, _) = broadcast::channel(256);
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        (
            std::sync::Arc::new(InMemoryChannel { inbound, outbound }),
            outbound_rx,
        )
    }

    /// Injects an inbound message as if `from` had typed it.
    pub fn say(&self, from: PlayerId, text: impl Into<String>) {
        // No subscribers simply means nobody is soliciting right now.
        let _ = self.inbound.send(Inbound {
            from,
            text: text.into(),
        });
    }
}

#[async_trait]
impl CommunicationChannel for InMemoryChannel {
    async fn send_to_actor(&self, actor: PlayerId, message: &str) -> Result<(), ChannelError> {
        self.outbound
            .send(Outbound::Direct {
                to: actor,
                text: message.to_string(),
            })
            .map_err(|_| ChannelError::Closed)
    }

    async fn send_to_group(&self, actors: &[PlayerId], message: &str) -> Result<(), ChannelError> {
        self.outbound
            .send(Outbound::Group {
                to: actors.to_vec(),
                text: message.to_string(),
            })
            .map_err(|_| ChannelError::Closed)
    }

    async fn broadcast(&self, message: &str) -> Result<(), ChannelError> {
        self.outbound
            .send(Outbound::Broadcast {
                text: message.to_string(),
            })
            .map_err(|_| ChannelError::Closed)
    }

    fn subscribe(&self) -> broadcast::Receiver<Inbound> {
        self.inbound.subscribe()
    }
}
