//! Free-form chat relays.
//!
//! Long-lived lines the engine keeps open while their precondition holds:
//! the wolf huddle, the jailer's two-way cell line, the medium's dead
//! chat. Each relay is a cancellable task with an explicit shutdown
//! signal; the orchestrator awaits the join handle at phase transitions,
//! so a cancelled relay can never forward into a closed channel.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use game_core::PlayerId;

use crate::api::{Result, SessionError};
use crate::channel::CommunicationChannel;

/// Which line a relay is carrying. Used for logging and targeted teardown.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RelayKind {
    /// Night huddle: pack members talk among themselves.
    WolfPack,
    /// Two-way line between a jailer and tonight's prisoner.
    JailCell,
    /// The dead talk; the medium listens in and speaks back.
    DeadChat,
    /// The pack's daytime back-channel, opened while the alpha lives.
    AlphaDay,
}

impl RelayKind {
    fn label(self) -> &'static str {
        match self {
            RelayKind::WolfPack => "wolf-pack",
            RelayKind::JailCell => "jail-cell",
            RelayKind::DeadChat => "dead-chat",
            RelayKind::AlphaDay => "alpha-day",
        }
    }
}

/// A running relay task plus its cancellation signal.
pub struct Relay {
    kind: RelayKind,
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl Relay {
    /// Spawns a group relay: every message from a member is forwarded to
    /// all other members, prefixed with the sender's tag.
    pub fn spawn<C: CommunicationChannel>(
        channel: Arc<C>,
        kind: RelayKind,
        members: Vec<(PlayerId, String)>,
    ) -> Relay {
        let (shutdown, mut watch_rx) = watch::channel(false);
        let mut inbound = channel.subscribe();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    changed = watch_rx.changed() => {
                        // Sender dropped or flag flipped: stop forwarding.
                        if changed.is_err() || *watch_rx.borrow() {
                            break;
                        }
                    }
                    received = inbound.recv() => {
                        let message = match received {
                            Ok(message) => message,
                            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                            Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                                debug!(target: "relay", kind = kind.label(), skipped, "relay lagged");
                                continue;
                            }
                        };
                        let Some((_, tag)) = members.iter().find(|(id, _)| *id == message.from) else {
                            continue;
                        };
                        let audience: Vec<PlayerId> = members
                            .iter()
                            .map(|(id, _)| *id)
                            .filter(|id| *id != message.from)
                            .collect();
                        if audience.is_empty() {
                            continue;
                        }
                        let line = format!("[{}] {}: {}", kind.label(), tag, message.text);
                        if let Err(error) = channel.send_to_group(&audience, &line).await {
                            warn!(target: "relay", kind = kind.label(), %error, "relay delivery failed");
                        }
                    }
                }
            }
            debug!(target: "relay", kind = kind.label(), "relay stopped");
        });

        Relay {
            kind,
            shutdown,
            handle,
        }
    }

    pub fn kind(&self) -> RelayKind {
        self.kind
    }

    /// Signals the task and waits for it to finish. Synchronous from the
    /// orchestrator's point of view: when this returns, nothing can relay
    /// into the line anymore.
    pub async fn shutdown(self) -> Result<()> {
        let _ = self.shutdown.send(true);
        self.handle.await.map_err(SessionError::RelayJoin)
    }
}

/// The set of relays currently alive for one session.
#[derive(Default)]
pub struct RelaySet {
    relays: Vec<Relay>,
}

impl RelaySet {
    pub fn push(&mut self, relay: Relay) {
        self.relays.push(relay);
    }

    /// Tears down every relay of `kind`, joining each task.
    pub async fn shutdown_kind(&mut self, kind: RelayKind) -> Result<()> {
        let (matching, rest): (Vec<_>, Vec<_>) =
            self.relays.drain(..).partition(|r| r.kind() == kind);
        self.relays = rest;
        for relay in matching {
            relay.shutdown().await?;
        }
        Ok(())
    }

    /// Tears down everything. Used at session end and on abort.
    pub async fn shutdown_all(&mut self) -> Result<()> {
        for relay in self.relays.drain(..) {
            relay.shutdown().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::InMemoryChannel;

    #[tokio::test]
    async fn relay_forwards_only_member_messages() {
        let (channel, mut out) = InMemoryChannel::new();
        let relay = Relay::spawn(
            Arc::clone(&channel),
            RelayKind::WolfPack,
            vec![(PlayerId(1), "grim".into()), (PlayerId(2), "fang".into())],
        );
        tokio::task::yield_now().await;

        channel.say(PlayerId(1), "the seer lives east");
        channel.say(PlayerId(9), "outsider noise");

        let delivered = out.recv().await.unwrap();
        assert!(delivered.addressed_to(PlayerId(2)));
        assert!(!delivered.addressed_to(PlayerId(1)));
        assert!(delivered.text().contains("grim"));
        assert!(delivered.text().contains("the seer lives east"));

        relay.shutdown().await.unwrap();
        assert!(out.try_recv().is_err(), "outsider message must not relay");
    }

    #[tokio::test]
    async fn shutdown_prevents_further_relaying() {
        let (channel, mut out) = InMemoryChannel::new();
        let relay = Relay::spawn(
            Arc::clone(&channel),
            RelayKind::JailCell,
            vec![(PlayerId(1), "warden".into()), (PlayerId(2), "inmate".into())],
        );
        tokio::task::yield_now().await;

        relay.shutdown().await.unwrap();
        channel.say(PlayerId(1), "too late");
        tokio::task::yield_now().await;
        assert!(out.try_recv().is_err());
    }
}
