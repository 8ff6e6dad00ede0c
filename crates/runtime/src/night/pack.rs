//! Stages 5 and 6: the pack's hunt.
//!
//! The pack deliberates in free-form chat relayed only inside the bloc,
//! then ballots one wolf at a time so a strict majority can end the vote
//! early. A nomination wins only with strictly more votes than the runner
//! up; ties and empty fields mean the village sleeps safe. The alpha may
//! spend their curse to convert the prey instead of killing it.

use std::collections::HashMap;

use tokio::sync::broadcast::error::RecvError;
use tokio::time::{timeout_at, Instant};
use tracing::debug;

use game_core::{Conditions, KillerGroup, OneShots, PlayerId, Role};

use crate::api::Result;
use crate::broker::{Candidate, PickRequest};
use crate::channel::CommunicationChannel;
use crate::events::GameEvent;
use crate::relay::{Relay, RelayKind};

use super::NightPipeline;

impl<C: CommunicationChannel> NightPipeline<'_, C> {
    pub(crate) async fn stage_pack_hunt(&mut self) -> Result<()> {
        let members: Vec<PlayerId> = self
            .game
            .pack()
            .into_iter()
            .filter(|&id| {
                self.game
                    .player(id)
                    .is_some_and(|p| p.can_act_tonight())
            })
            .collect();
        if members.is_empty() {
            return Ok(());
        }

        let nominations = self.pack_deliberation(&members).await?;
        let prey = self.pack_ballot(&members, &nominations).await;

        let Some(target) = prey else {
            let _ = self
                .broker
                .channel()
                .send_to_group(&members, "The pack disperses without a kill tonight.")
                .await;
            return Ok(());
        };

        if self.alpha_curse_override(&members, target).await {
            return Ok(());
        }

        self.pending.add(target, KillerGroup::Wolves);
        self.pack_target = Some(target);
        Ok(())
    }

    /// Free-form huddle: member messages relay only inside the bloc, and
    /// `nominate <name>` lines build the ballot field.
    async fn pack_deliberation(&mut self, members: &[PlayerId]) -> Result<Vec<PlayerId>> {
        let tagged: Vec<(PlayerId, String)> = members
            .iter()
            .filter_map(|&id| self.game.player(id).map(|p| (id, p.name.clone())))
            .collect();
        let relay = Relay::spawn(
            std::sync::Arc::clone(self.broker.channel()),
            RelayKind::WolfPack,
            tagged,
        );

        let window = self.config.wolf_chat_window;
        // Subscribe before the huddle is announced so no nomination races
        // past the window.
        let mut inbound = self.broker.channel().subscribe();
        let _ = self
            .broker
            .channel()
            .send_to_group(
                members,
                &format!(
                    "The pack wakes. Talk among yourselves and name prey with 'nominate <name>'. \
                     The hunt is called in {}s.",
                    window.as_secs()
                ),
            )
            .await;

        let deadline = Instant::now() + window;
        let mut nominations: Vec<PlayerId> = Vec::new();

        loop {
            let message = match timeout_at(deadline, inbound.recv()).await {
                Err(_) => break,
                Ok(Err(RecvError::Closed)) => break,
                Ok(Err(RecvError::Lagged(_))) => continue,
                Ok(Ok(message)) => message,
            };
            if !members.contains(&message.from) {
                continue;
            }
            let Some(name) = message.text.trim().strip_prefix("nominate ") else {
                continue;
            };
            let Some(target) = self.resolve_prey(name.trim(), members) else {
                let _ = self
                    .broker
                    .channel()
                    .send_to_actor(message.from, "No such prey walks the village.")
                    .await;
                continue;
            };
            if !nominations.contains(&target) {
                nominations.push(target);
            }
        }

        relay.shutdown().await?;
        Ok(nominations)
    }

    /// Living non-pack player by (case-insensitive) name.
    fn resolve_prey(&self, name: &str, members: &[PlayerId]) -> Option<PlayerId> {
        self.game
            .alive()
            .filter(|p| !members.contains(&p.id))
            .find(|p| p.name.eq_ignore_ascii_case(name))
            .map(|p| p.id)
    }

    /// Sequential balloting with a strict-majority early exit.
    async fn pack_ballot(
        &self,
        members: &[PlayerId],
        nominations: &[PlayerId],
    ) -> Option<PlayerId> {
        if nominations.is_empty() {
            return None;
        }

        let field: Vec<Candidate> = nominations
            .iter()
            .filter_map(|&id| {
                self.game.player(id).map(|p| Candidate {
                    id,
                    label: p.name.clone(),
                })
            })
            .collect();

        let mut tally: HashMap<PlayerId, usize> = HashMap::new();
        for &wolf in members {
            let pick = self
                .broker
                .solicit(
                    PickRequest::one(
                        wolf,
                        "The pack votes. Who dies tonight?",
                        field.clone(),
                        self.config.ballot_timeout,
                    ),
                )
                .await;
            if let Some(choice) = pick.first() {
                *tally.entry(choice).or_default() += 1;
            }

            // One nomination already holds a strict majority of the whole
            // pack: no later ballot can change the outcome.
            if let Some((&leader, &votes)) = tally.iter().max_by_key(|(_, &v)| v) {
                if votes * 2 > members.len() {
                    debug!(target: "night", leader = %leader, votes, "pack majority reached early");
                    return Some(leader);
                }
            }
        }

        let mut counts: Vec<(PlayerId, usize)> = tally.into_iter().collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        match counts.as_slice() {
            [] => None,
            [(winner, _)] => Some(*winner),
            [(winner, first), (_, second), ..] if first > second => Some(*winner),
            _ => None, // exact tie
        }
    }

    /// Offers the alpha the curse instead of the kill. Returns true if the
    /// prey was converted.
    async fn alpha_curse_override(&mut self, members: &[PlayerId], target: PlayerId) -> bool {
        let alpha = members.iter().copied().find(|&id| {
            self.game.player(id).is_some_and(|p| {
                p.role() == Role::AlphaWolf && !p.one_shots.contains(OneShots::ALPHA_CURSE)
            })
        });
        let Some(alpha) = alpha else { return false };
        let Some(prey) = self.game.player(target) else { return false };

        let pick = self
            .broker
            .solicit(PickRequest::one(
                alpha,
                "Spend your curse to drag the prey into the pack instead of killing? \
                 Pick them to curse, or pass to kill.",
                vec![Candidate {
                    id: target,
                    label: prey.name.clone(),
                }],
                self.config.solicit_timeout,
            ))
            .await;
        if pick.first() != Some(target) {
            return false;
        }

        let Some(alpha_player) = self.game.player_mut(alpha) else { return false };
        if !alpha_player.try_spend(OneShots::ALPHA_CURSE) {
            return false;
        }
        if let Some(prey) = self.game.player_mut(target) {
            prey.conditions.insert(Conditions::CURSED);
        }
        self.events.publish(GameEvent::PlayerConverted { player: target });
        let _ = self
            .broker
            .channel()
            .send_to_actor(target, "Something in the night marked you. You run with the pack now.")
            .await;
        let _ = self
            .broker
            .channel()
            .send_to_group(members, "The alpha spared the prey — and claimed it.")
            .await;
        true
    }

    /// Stage 6: the conditional second kill. The prowler hunts while no
    /// wolf-aligned player has died this game; a dead cub buys the pack one
    /// vengeance hunt the following night.
    pub(crate) async fn stage_bonus_hunt(&mut self) {
        let prowler = self
            .game
            .alive()
            .find(|p| p.role() == Role::Prowler && p.can_act_tonight())
            .map(|p| p.id);

        let (hunter, reason) = if self.game.pack_unbloodied() && prowler.is_some() {
            (prowler, "prowl")
        } else if self.game.cub_vengeance {
            // Any acting pack member may lead the vengeance hunt.
            let leader = self
                .game
                .pack()
                .into_iter()
                .find(|&id| self.game.player(id).is_some_and(|p| p.can_act_tonight()));
            (leader, "vengeance")
        } else {
            return;
        };
        let Some(hunter) = hunter else { return };

        let pack = self.game.pack();
        let primary = self.pack_target;
        let field = self.candidates(|p| {
            !pack.contains(&p.id) && Some(p.id) != primary && p.id != hunter
        });
        if field.is_empty() {
            return;
        }

        let prompt = match reason {
            "vengeance" => "The cub is avenged tonight. Name the second kill.",
            _ => "You hunt ahead of the pack. Name your own prey.",
        };
        let pick = self
            .broker
            .solicit(PickRequest::one(
                hunter,
                prompt,
                field,
                self.config.solicit_timeout,
            ))
            .await;
        let Some(target) = pick.first() else { return };

        self.pending.add(target, KillerGroup::Wolves);
        if reason == "vengeance" {
            self.game.cub_vengeance = false;
        }
        debug!(target: "night", hunter = %hunter, prey = %target, reason, "bonus hunt queued");
    }
}
