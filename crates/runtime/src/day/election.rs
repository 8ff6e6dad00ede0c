//! Stage 4: the election.
//!
//! An open nomination window collects up to ten distinct nominees from
//! broadcast messages. A revealed mayor restricts the field to their own
//! nominations; the arbiter's objection aborts the vote outright; the
//! judge's secret phrase books one encore election. A single nominee needs
//! no runoff. Two or more go to a weighted ballot — the sheriff counts
//! double — and only a strict plurality over the runner-up lynches.

use std::collections::HashMap;

use arrayvec::ArrayVec;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::{timeout_at, Instant};
use tracing::debug;

use game_core::{GameConfig, KillerGroup, OneShots, PlayerId, Role};

use crate::api::Result;
use crate::broker::{Candidate, PickRequest};
use crate::channel::CommunicationChannel;
use crate::deaths::apply_cascade;
use crate::events::{GameEvent, VoteAbort};

use super::DayPipeline;

/// The judge's phrase. Known only to the judge by way of their role card.
const ENCORE_PHRASE: &str = "the verdict stands unread";

impl<C: CommunicationChannel> DayPipeline<'_, C> {
    pub(crate) async fn stage_election(&mut self) -> Result<()> {
        if self.vote_cancelled {
            self.events.publish(GameEvent::LynchResult { victim: None });
            return Ok(());
        }

        self.run_election().await?;

        // The judge's encore: one repeat, nomination through lynch.
        if self.encore_called && !self.vote_cancelled {
            let _ = self
                .broker
                .channel()
                .broadcast("The judge invokes an old right: the village votes again.")
                .await;
            self.run_election().await?;
        }
        Ok(())
    }

    async fn run_election(&mut self) -> Result<()> {
        let nominees = self.nomination_window().await;
        if self.vote_cancelled {
            self.events.publish(GameEvent::LynchResult { victim: None });
            return Ok(());
        }

        let victim = match nominees.len() {
            0 => None,
            // A single nominee needs no runoff.
            1 => Some(nominees[0]),
            _ => self.ballot(&nominees).await,
        };
        self.resolve_lynch(victim).await;
        Ok(())
    }

    /// Collects nominations from broadcast messages for the configured
    /// window. Also watches for the arbiter's objection and the judge's
    /// phrase, which piggyback on the same open floor.
    async fn nomination_window(&mut self) -> ArrayVec<PlayerId, { GameConfig::MAX_NOMINEES }> {
        let mut nominees: ArrayVec<PlayerId, { GameConfig::MAX_NOMINEES }> = ArrayVec::new();
        // Subscribe before the floor opens so no early shout is lost.
        let mut inbound = self.broker.channel().subscribe();
        let _ = self
            .broker
            .channel()
            .broadcast(&format!(
                "Nominations are open for {}s: 'nominate <name>'.",
                self.config.nomination_window.as_secs()
            ))
            .await;

        let deadline = Instant::now() + self.config.nomination_window;

        while !nominees.is_full() {
            let message = match timeout_at(deadline, inbound.recv()).await {
                Err(_) => break,
                Ok(Err(RecvError::Closed)) => break,
                Ok(Err(RecvError::Lagged(_))) => continue,
                Ok(Ok(message)) => message,
            };
            let sender = message.from;
            let text = message.text.trim();

            // The judge's phrase can be spoken at any point of the floor.
            if text.eq_ignore_ascii_case(ENCORE_PHRASE) {
                let is_judge = self
                    .game
                    .player(sender)
                    .is_some_and(|p| p.is_alive() && p.role() == Role::Judge);
                if is_judge {
                    if let Some(judge) = self.game.player_mut(sender) {
                        if judge.try_spend(OneShots::SECOND_ELECTION) {
                            self.encore_called = true;
                            debug!(target: "day", judge = %sender, "encore election booked");
                        }
                    }
                }
                continue;
            }

            if text.eq_ignore_ascii_case("objection") {
                let is_arbiter = self
                    .game
                    .player(sender)
                    .is_some_and(|p| p.is_alive() && p.role() == Role::Arbiter);
                if is_arbiter {
                    if let Some(arbiter) = self.game.player_mut(sender) {
                        if arbiter.try_spend(OneShots::OBJECTION) {
                            self.vote_cancelled = true;
                            self.events.publish(GameEvent::VoteCancelled {
                                reason: VoteAbort::Objection,
                            });
                            let _ = self
                                .broker
                                .channel()
                                .broadcast("An objection rings out. Today's vote is stricken.")
                                .await;
                            return ArrayVec::new();
                        }
                    }
                }
                continue;
            }

            let Some(name) = text.strip_prefix("nominate ") else { continue };
            let Some(speaker) = self.game.player(sender) else { continue };
            if !speaker.can_vote_today() {
                continue;
            }
            // Everyone hears the drunk; nobody writes it down.
            if speaker.role() == Role::Drunk {
                continue;
            }
            // A revealed mayor runs the floor alone.
            if let Some(mayor) = self.mayor_active {
                if sender != mayor {
                    continue;
                }
            }
            let Some(target) = self
                .game
                .alive()
                .find(|p| p.name.eq_ignore_ascii_case(name.trim()))
                .map(|p| p.id)
            else {
                continue;
            };
            // Accusations against a revealed mayor are struck.
            if self.mayor_active == Some(target) {
                continue;
            }
            if target != sender && !nominees.contains(&target) {
                nominees.push(target);
                if let Some(p) = self.game.player(target) {
                    let _ = self
                        .broker
                        .channel()
                        .broadcast(&format!("{} stands accused.", p.name))
                        .await;
                }
            }
        }
        nominees
    }

    /// Weighted parallel ballot with strict-plurality resolution. An exact
    /// tie lynches nobody. Idle eligible voters collect a strike.
    async fn ballot(&mut self, nominees: &[PlayerId]) -> Option<PlayerId> {
        let field: Vec<Candidate> = nominees
            .iter()
            .filter_map(|&id| {
                self.game.player(id).map(|p| Candidate {
                    id,
                    label: p.name.clone(),
                })
            })
            .collect();

        let electorate: Vec<PlayerId> = self
            .game
            .alive()
            .filter(|p| p.can_vote_today())
            .map(|p| p.id)
            .collect();
        let requests: Vec<PickRequest> = electorate
            .iter()
            .map(|&id| {
                PickRequest::one(
                    id,
                    "The village votes. Who hangs?",
                    field.clone(),
                    self.config.ballot_timeout,
                )
            })
            .collect();

        let mut tally: HashMap<PlayerId, usize> = HashMap::new();
        let mut idle = Vec::new();
        for (voter, pick) in self.broker.solicit_many(requests).await {
            match pick.first() {
                Some(choice) => {
                    let weight = match self.game.player(voter).map(|p| p.role()) {
                        Some(Role::Sheriff) => 2,
                        _ => 1,
                    };
                    *tally.entry(choice).or_default() += weight;
                }
                None => idle.push(voter),
            }
        }
        for voter in idle {
            if let Some(p) = self.game.player_mut(voter) {
                p.counters.strikes += 1;
            }
        }

        let mut counts: Vec<(PlayerId, usize)> = tally.into_iter().collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        match counts.as_slice() {
            [] => None,
            [(winner, _)] => Some(*winner),
            [(winner, first), (_, second), ..] if first > second => Some(*winner),
            _ => None,
        }
    }

    async fn resolve_lynch(&mut self, victim: Option<PlayerId>) {
        let Some(victim) = victim else {
            let _ = self
                .broker
                .channel()
                .broadcast("The village cannot agree. Nobody hangs today.")
                .await;
            self.events.publish(GameEvent::LynchResult { victim: None });
            return;
        };

        // Royal blood walks free, once.
        let is_prince = self
            .game
            .player(victim)
            .is_some_and(|p| p.role() == Role::Prince && !p.one_shots.contains(OneShots::PRINCE_REVEAL));
        if is_prince {
            if let Some(p) = self.game.player_mut(victim) {
                if p.try_spend(OneShots::PRINCE_REVEAL) {
                    let name = p.name.clone();
                    let _ = self
                        .broker
                        .channel()
                        .broadcast(&format!(
                            "{name} bares the royal crest. The rope is lowered."
                        ))
                        .await;
                    self.events.publish(GameEvent::LynchResult { victim: None });
                    return;
                }
            }
        }

        let lynched_role = self.game.player(victim).map(|p| p.role());
        apply_cascade(
            self.game,
            self.broker,
            self.events,
            self.config,
            vec![(victim, KillerGroup::Vote)],
        )
        .await;
        self.events.publish(GameEvent::LynchResult {
            victim: Some(victim),
        });

        // The maid may take up the condemned one's mantle.
        if let Some(role) = lynched_role {
            self.offer_maid_swap(victim, role).await;
        }
    }

    async fn offer_maid_swap(&mut self, victim: PlayerId, role: Role) {
        let maids: Vec<PlayerId> = self
            .game
            .alive()
            .filter(|p| p.role() == Role::Maid && !p.one_shots.contains(OneShots::MAID_SWAP))
            .map(|p| p.id)
            .collect();
        let Some(&maid) = maids.first() else { return };
        let label = self
            .game
            .player(victim)
            .map(|p| format!("Take {}'s mantle", p.name))
            .unwrap_or_else(|| "Take the mantle".to_string());

        let pick = self
            .broker
            .solicit(PickRequest::one(
                maid,
                "The gallows have fallen. Take up the condemned one's role?",
                vec![Candidate { id: victim, label }],
                self.config.solicit_timeout,
            ))
            .await;
        if pick.first() != Some(victim) {
            return;
        }
        if let Some(p) = self.game.player_mut(maid) {
            if p.try_spend(OneShots::MAID_SWAP) {
                p.assign_role(role);
                debug!(target: "day", maid = %maid, ?role, "maid took the lynched role");
            }
        }
    }
}
