//! Timed target solicitation.
//!
//! Every role ability funnels through one primitive: ask one actor to pick
//! `0..count` targets from a candidate set, under a deadline, with
//! required/optional semantics. The broker is reentrant — pipeline stages
//! fan solicitations out over all eligible actors at once and join them —
//! and validation is idempotent: a dismissed or already-selected candidate
//! cannot be picked again within the same request.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, warn};

use game_core::PlayerId;

use crate::channel::CommunicationChannel;

/// One selectable target.
#[derive(Clone, Debug)]
pub struct Candidate {
    pub id: PlayerId,
    pub label: String,
}

/// A single solicitation.
#[derive(Clone, Debug)]
pub struct PickRequest {
    pub actor: PlayerId,
    pub prompt: String,
    pub candidates: Vec<Candidate>,
    /// Maximum number of targets to collect.
    pub count: usize,
    /// If true, an empty outcome is surfaced as [`Pick::NoAction`].
    pub required: bool,
    pub timeout: Duration,
    /// Caller-computed role block: jailed or sleeping actors are answered
    /// immediately, without prompting.
    pub blocked: bool,
}

impl PickRequest {
    /// Single optional target with the given deadline.
    pub fn one(actor: PlayerId, prompt: impl Into<String>, candidates: Vec<Candidate>, timeout: Duration) -> Self {
        PickRequest {
            actor,
            prompt: prompt.into(),
            candidates,
            count: 1,
            required: false,
            timeout,
            blocked: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn many(mut self, count: usize) -> Self {
        self.count = count;
        self
    }

    pub fn blocked_if(mut self, blocked: bool) -> Self {
        self.blocked = blocked;
        self
    }
}

/// Outcome of a solicitation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Pick {
    /// Zero or more valid, distinct targets (timeout keeps what was
    /// already chosen).
    Targets(Vec<PlayerId>),
    /// A required pick yielded nothing.
    NoAction,
    /// The actor was role-blocked; no prompt was sent.
    Blocked,
}

impl Pick {
    pub fn first(&self) -> Option<PlayerId> {
        match self {
            Pick::Targets(t) => t.first().copied(),
            _ => None,
        }
    }

    pub fn targets(&self) -> &[PlayerId] {
        match self {
            Pick::Targets(t) => t,
            _ => &[],
        }
    }
}

/// Shared solicitation primitive. Cheap to clone; every clone talks to the
/// same transport.
pub struct ActionBroker<C> {
    channel: Arc<C>,
}

impl<C> Clone for ActionBroker<C> {
    fn clone(&self) -> Self {
        ActionBroker {
            channel: Arc::clone(&self.channel),
        }
    }
}

impl<C: CommunicationChannel> ActionBroker<C> {
    pub fn new(channel: Arc<C>) -> Self {
        ActionBroker { channel }
    }

    pub fn channel(&self) -> &Arc<C> {
        &self.channel
    }

    /// Runs one solicitation to completion.
    ///
    /// Delivery failure is logged and treated like a timeout. Invalid
    /// replies (unknown token, dismissed candidate, duplicate) are
    /// rejected locally and the actor is re-prompted within the same
    /// deadline; they never propagate.
    pub async fn solicit(&self, req: PickRequest) -> Pick {
        if req.blocked {
            debug!(target: "broker", actor = %req.actor, "actor role-blocked, skipping prompt");
            return Pick::Blocked;
        }

        let mut rx = self.channel.subscribe();
        let menu = render_menu(&req.prompt, &req.candidates, req.count);
        if let Err(error) = self.channel.send_to_actor(req.actor, &menu).await {
            warn!(target: "broker", actor = %req.actor, %error, "prompt undeliverable, treating as timeout");
            return finish(Vec::new(), req.required);
        }

        let deadline = Instant::now() + req.timeout;
        let mut chosen: Vec<PlayerId> = Vec::new();

        'collect: while chosen.len() < req.count {
            let inbound = match timeout_at(deadline, rx.recv()).await {
                Err(_) => break 'collect, // deadline
                Ok(Err(RecvError::Closed)) => break 'collect,
                Ok(Err(RecvError::Lagged(skipped))) => {
                    debug!(target: "broker", actor = %req.actor, skipped, "inbound stream lagged");
                    continue;
                }
                Ok(Ok(inbound)) => inbound,
            };
            if inbound.from != req.actor {
                continue;
            }

            let text = inbound.text.trim();
            if text.eq_ignore_ascii_case("pass") {
                break 'collect;
            }

            match resolve_reply(text, &req.candidates, &chosen) {
                Some(id) => chosen.push(id),
                None => {
                    let _ = self
                        .channel
                        .send_to_actor(req.actor, "That is not a valid choice. Pick again, or reply 'pass'.")
                        .await;
                }
            }
        }

        finish(chosen, req.required)
    }

    /// Fans out independent solicitations and joins them. Per-actor
    /// results are unordered among actors by design; the returned vector
    /// follows the request order for the caller's bookkeeping.
    pub async fn solicit_many(&self, requests: Vec<PickRequest>) -> Vec<(PlayerId, Pick)> {
        join_all(requests.into_iter().map(|req| {
            let actor = req.actor;
            async move { (actor, self.solicit(req).await) }
        }))
        .await
    }
}

fn finish(chosen: Vec<PlayerId>, required: bool) -> Pick {
    if chosen.is_empty() && required {
        Pick::NoAction
    } else {
        Pick::Targets(chosen)
    }
}

/// Accepts a 1-based index or an exact (case-insensitive) label; rejects
/// anything dead to the request: out of range, unknown, already chosen.
fn resolve_reply(text: &str, candidates: &[Candidate], chosen: &[PlayerId]) -> Option<PlayerId> {
    let found = if let Ok(index) = text.parse::<usize>() {
        candidates.get(index.checked_sub(1)?)
    } else {
        candidates
            .iter()
            .find(|c| c.label.eq_ignore_ascii_case(text))
    }?;
    if chosen.contains(&found.id) {
        return None;
    }
    Some(found.id)
}

fn render_menu(prompt: &str, candidates: &[Candidate], count: usize) -> String {
    use std::fmt::Write;

    let mut menu = String::from(prompt);
    for (i, candidate) in candidates.iter().enumerate() {
        let _ = write!(menu, "\n  {}) {}", i + 1, candidate.label);
    }
    if count > 1 {
        let _ = write!(menu, "\nPick up to {count}, one reply each. 'pass' to stop.");
    } else {
        let _ = write!(menu, "\nReply with a number or a name. 'pass' to skip.");
    }
    menu
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::InMemoryChannel;

    fn candidates(ids: &[(u32, &str)]) -> Vec<Candidate> {
        ids.iter()
            .map(|&(id, label)| Candidate {
                id: PlayerId(id),
                label: label.to_string(),
            })
            .collect()
    }

    #[tokio::test]
    async fn picks_by_index_and_by_name() {
        let (channel, _out) = InMemoryChannel::new();
        let broker = ActionBroker::new(Arc::clone(&channel));

        let req = PickRequest::one(
            PlayerId(1),
            "Who?",
            candidates(&[(2, "anna"), (3, "bert")]),
            Duration::from_millis(200),
        )
        .many(2);

        let solicit = tokio::spawn({
            let broker = broker.clone();
            async move { broker.solicit(req).await }
        });
        tokio::task::yield_now().await;
        channel.say(PlayerId(1), "2");
        channel.say(PlayerId(1), "Anna");

        let pick = solicit.await.unwrap();
        assert_eq!(pick, Pick::Targets(vec![PlayerId(3), PlayerId(2)]));
    }

    #[tokio::test]
    async fn duplicate_and_unknown_replies_are_rejected_locally() {
        let (channel, _out) = InMemoryChannel::new();
        let broker = ActionBroker::new(Arc::clone(&channel));

        let req = PickRequest::one(
            PlayerId(1),
            "Who?",
            candidates(&[(2, "anna"), (3, "bert")]),
            Duration::from_millis(200),
        )
        .many(2);

        let solicit = tokio::spawn({
            let broker = broker.clone();
            async move { broker.solicit(req).await }
        });
        tokio::task::yield_now().await;
        channel.say(PlayerId(1), "1");
        channel.say(PlayerId(1), "1"); // already selected
        channel.say(PlayerId(1), "carl"); // not a candidate
        channel.say(PlayerId(1), "pass");

        let pick = solicit.await.unwrap();
        assert_eq!(pick, Pick::Targets(vec![PlayerId(2)]));
    }

    #[tokio::test]
    async fn timeout_resolves_to_no_action_when_required() {
        let (channel, _out) = InMemoryChannel::new();
        let broker = ActionBroker::new(channel);

        let req = PickRequest::one(
            PlayerId(1),
            "Who?",
            candidates(&[(2, "anna")]),
            Duration::from_millis(30),
        )
        .required();

        assert_eq!(broker.solicit(req).await, Pick::NoAction);
    }

    #[tokio::test]
    async fn blocked_actor_is_never_prompted() {
        let (channel, mut out) = InMemoryChannel::new();
        let broker = ActionBroker::new(channel);

        let req = PickRequest::one(
            PlayerId(1),
            "Who?",
            candidates(&[(2, "anna")]),
            Duration::from_millis(30),
        )
        .blocked_if(true);

        assert_eq!(broker.solicit(req).await, Pick::Blocked);
        assert!(out.try_recv().is_err(), "no prompt should have been sent");
    }

    #[tokio::test]
    async fn concurrent_solicitations_do_not_steal_replies() {
        let (channel, _out) = InMemoryChannel::new();
        let broker = ActionBroker::new(Arc::clone(&channel));

        let reqs = vec![
            PickRequest::one(
                PlayerId(1),
                "Doctor?",
                candidates(&[(3, "anna")]),
                Duration::from_millis(300),
            ),
            PickRequest::one(
                PlayerId(2),
                "Seer?",
                candidates(&[(4, "bert")]),
                Duration::from_millis(300),
            ),
        ];

        let join = tokio::spawn({
            let broker = broker.clone();
            async move { broker.solicit_many(reqs).await }
        });
        tokio::task::yield_now().await;
        channel.say(PlayerId(2), "1");
        channel.say(PlayerId(1), "1");

        let picks = join.await.unwrap();
        assert_eq!(picks[0], (PlayerId(1), Pick::Targets(vec![PlayerId(3)])));
        assert_eq!(picks[1], (PlayerId(2), Pick::Targets(vec![PlayerId(4)])));
    }
}
