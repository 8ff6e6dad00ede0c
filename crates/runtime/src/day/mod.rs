//! The day pipeline.
//!
//! Dawn recap, queued resurrections, day abilities in priority order, then
//! the election: nomination window, weighted ballot, lynch resolution, an
//! optional judge-called second election, and strike bookkeeping. As with
//! the night, [`DayStage`] declaration order is execution order and the
//! sequence test pins it.

mod election;

use strum::IntoEnumIterator;
use tracing::debug;

use game_core::{
    evaluate, Conditions, Game, KillerGroup, OneShots, Player, PlayerId, Role, Verdict,
};

use crate::api::Result;
use crate::broker::{ActionBroker, Candidate, PickRequest};
use crate::channel::CommunicationChannel;
use crate::deaths::apply_cascade;
use crate::events::{EventBus, GameEvent};
use crate::night::PendingKill;
use crate::relay::{Relay, RelayKind, RelaySet};
use crate::session::SessionConfig;

/// Fixed stage order for the day. Do not reorder.
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::EnumIter, strum::AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum DayStage {
    /// Announce and apply the night's death list, cascades included.
    Recap,
    /// Queued resurrections whose delay has elapsed fire now.
    Resurrections,
    /// Day abilities in priority order; some can cancel the vote.
    Abilities,
    /// Nomination window, ballot, and lynch (repeated once if the judge
    /// calls an encore).
    Election,
    /// Idle voters collect strikes; three is an elimination.
    Strikes,
}

/// Drives one day. Consumes the night's death list.
pub struct DayPipeline<'a, C: CommunicationChannel> {
    pub(crate) game: &'a mut Game,
    pub(crate) broker: &'a ActionBroker<C>,
    pub(crate) events: &'a EventBus,
    pub(crate) relays: &'a mut RelaySet,
    pub(crate) config: &'a SessionConfig,
    night_deaths: Vec<PendingKill>,
    /// Set when a pacifist reveal or an objection scrubs today's vote.
    pub(crate) vote_cancelled: bool,
    /// A revealed mayor runs the nomination floor.
    pub(crate) mayor_active: Option<PlayerId>,
    /// The judge spoke the phrase: one encore election.
    pub(crate) encore_called: bool,
}

impl<'a, C: CommunicationChannel> DayPipeline<'a, C> {
    pub fn new(
        game: &'a mut Game,
        broker: &'a ActionBroker<C>,
        events: &'a EventBus,
        relays: &'a mut RelaySet,
        config: &'a SessionConfig,
        night_deaths: Vec<PendingKill>,
    ) -> Self {
        DayPipeline {
            game,
            broker,
            events,
            relays,
            config,
            night_deaths,
            vote_cancelled: false,
            mayor_active: None,
            encore_called: false,
        }
    }

    /// Runs the day. Returns a verdict as soon as one exists; remaining
    /// stages are skipped once the game is decided.
    pub async fn run(mut self) -> Result<Option<Verdict>> {
        for stage in DayStage::iter() {
            debug!(target: "day", round = self.game.round, stage = stage.as_ref(), "stage begins");
            match stage {
                DayStage::Recap => self.stage_recap().await?,
                DayStage::Resurrections => self.stage_resurrections().await,
                DayStage::Abilities => self.stage_abilities().await,
                DayStage::Election => self.stage_election().await?,
                DayStage::Strikes => self.stage_strikes().await,
            }
            if let Some(verdict) = evaluate(self.game) {
                return Ok(Some(verdict));
            }
        }
        Ok(None)
    }

    // ========================================================================
    // Stage 1: Recap
    // ========================================================================

    async fn stage_recap(&mut self) -> Result<()> {
        // Night lines close before the village wakes.
        self.relays.shutdown_kind(RelayKind::DeadChat).await?;
        self.relays.shutdown_kind(RelayKind::JailCell).await?;

        self.game.at_dawn();
        self.events.publish(GameEvent::PhaseChanged {
            phase: self.game.phase,
            round: self.game.round,
        });
        let _ = self
            .broker
            .channel()
            .broadcast(&format!("Day {} dawns.", self.game.round))
            .await;
        tokio::time::sleep(self.config.read_delay).await;

        let seeds: Vec<(PlayerId, KillerGroup)> = self
            .night_deaths
            .drain(..)
            .map(|k| (k.target, k.group))
            .collect();
        if seeds.is_empty() {
            let _ = self
                .broker
                .channel()
                .broadcast("The night passed without a single death.")
                .await;
        } else {
            apply_cascade(self.game, self.broker, self.events, self.config, seeds).await;
        }

        // The pack's daytime back-channel opens while an alpha lives.
        let alphas = self.game.holders_of(Role::AlphaWolf);
        if !alphas.is_empty() {
            let members: Vec<(PlayerId, String)> = self
                .game
                .pack()
                .into_iter()
                .filter_map(|id| self.game.player(id).map(|p| (id, p.name.clone())))
                .collect();
            if members.len() > 1 {
                self.relays.push(Relay::spawn(
                    std::sync::Arc::clone(self.broker.channel()),
                    RelayKind::AlphaDay,
                    members,
                ));
            }
        }
        Ok(())
    }

    // ========================================================================
    // Stage 2: Resurrections
    // ========================================================================

    async fn stage_resurrections(&mut self) {
        for pending in self.game.tick_resurrections() {
            let Some(player) = self.game.player_mut(pending.target) else { continue };
            if player.is_alive() {
                continue;
            }
            player.revive();
            let name = player.name.clone();
            self.events.publish(GameEvent::PlayerRevived {
                player: pending.target,
            });
            let _ = self
                .broker
                .channel()
                .broadcast(&format!("{name} walks among the living again."))
                .await;
            debug!(
                target: "day",
                target_player = %pending.target,
                origin = %pending.origin,
                "resurrection applied"
            );
        }
    }

    // ========================================================================
    // Stage 3: Day abilities, in priority order
    // ========================================================================

    async fn stage_abilities(&mut self) {
        self.run_mayor_reveals().await;
        self.run_priests().await;
        self.run_forgers().await;
        self.run_gunners().await;
        self.run_sandmen().await;
        self.run_pacifists().await;
    }

    /// Offers a self-targeted one-shot. Returns actors who took it.
    async fn offer_reveal(&mut self, role: Role, shot: OneShots, prompt: &str, label: &str) -> Vec<PlayerId> {
        let holders: Vec<PlayerId> = self
            .game
            .alive()
            .filter(|p| p.role() == role && !p.one_shots.contains(shot) && !p.conditions.contains(Conditions::SPECTATING))
            .map(|p| p.id)
            .collect();
        let requests: Vec<PickRequest> = holders
            .iter()
            .map(|&id| {
                PickRequest::one(
                    id,
                    prompt,
                    vec![Candidate {
                        id,
                        label: label.to_string(),
                    }],
                    self.config.solicit_timeout,
                )
            })
            .collect();

        let mut taken = Vec::new();
        for (actor, pick) in self.broker.solicit_many(requests).await {
            if pick.first() != Some(actor) {
                continue;
            }
            if let Some(p) = self.game.player_mut(actor) {
                if p.try_spend(shot) {
                    taken.push(actor);
                }
            }
        }
        taken
    }

    async fn run_mayor_reveals(&mut self) {
        for mayor in self
            .offer_reveal(
                Role::Mayor,
                OneShots::MAYOR_REVEAL,
                "Reveal your office today? Accusations against you will be struck.",
                "Reveal my office",
            )
            .await
        {
            self.mayor_active = Some(mayor);
            let name = self.game.player(mayor).map(|p| p.name.clone()).unwrap_or_default();
            let _ = self
                .broker
                .channel()
                .broadcast(&format!("{name} produces the seal of office. The mayor runs the floor today."))
                .await;
        }
    }

    async fn run_priests(&mut self) {
        let picks = self
            .solicit_day_role(Role::Priest, OneShots::HOLY_WATER, "Spend your holy water on whom?")
            .await;
        for (priest, target) in picks {
            let wolfish = self
                .game
                .player(target)
                .is_some_and(|p| p.side().is_wolf_aligned());
            let (victim, line) = if wolfish {
                let name = self.game.player(target).map(|p| p.name.clone()).unwrap_or_default();
                (target, format!("The holy water sears {name} to ash."))
            } else {
                let name = self.game.player(priest).map(|p| p.name.clone()).unwrap_or_default();
                (priest, format!("The vial shatters harmlessly — and the village turns on {name}."))
            };
            let _ = self.broker.channel().broadcast(&line).await;
            apply_cascade(
                self.game,
                self.broker,
                self.events,
                self.config,
                vec![(victim, KillerGroup::Priest)],
            )
            .await;
        }
    }

    async fn run_forgers(&mut self) {
        let requests: Vec<PickRequest> = self
            .game
            .alive()
            .filter(|p| p.role() == Role::Forger && !p.conditions.contains(Conditions::SPECTATING))
            .map(|p| {
                PickRequest::one(
                    p.id,
                    "The night's forging is done. Who receives the shield?",
                    self.candidates(|c| !c.conditions.contains(Conditions::SHIELDED)),
                    self.config.solicit_timeout,
                )
            })
            .collect();
        for (_, pick) in self.broker.solicit_many(requests).await {
            let Some(target) = pick.first() else { continue };
            if let Some(p) = self.game.player_mut(target) {
                p.conditions.insert(Conditions::SHIELDED);
            }
            let _ = self
                .broker
                .channel()
                .send_to_actor(target, "A wrapped shield waits at your door.")
                .await;
        }
    }

    async fn run_gunners(&mut self) {
        let shooters: Vec<PlayerId> = self
            .game
            .alive()
            .filter(|p| {
                matches!(p.role(), Role::Gunner | Role::MasterGunner)
                    && p.counters.bullets > 0
                    && !p.conditions.contains(Conditions::SPECTATING)
            })
            .map(|p| p.id)
            .collect();
        for gunner in shooters {
            let field = self.candidates(|c| c.id != gunner);
            let pick = self
                .broker
                .solicit(PickRequest::one(
                    gunner,
                    "A bullet is loaded. Fire in the open, or pass.",
                    field,
                    self.config.solicit_timeout,
                ))
                .await;
            let Some(target) = pick.first() else { continue };
            let Some(p) = self.game.player_mut(gunner) else { continue };
            p.counters.bullets -= 1;
            let shooter_name = p.name.clone();
            let _ = self
                .broker
                .channel()
                .broadcast(&format!("{shooter_name} raises a gun in broad daylight!"))
                .await;
            apply_cascade(
                self.game,
                self.broker,
                self.events,
                self.config,
                vec![(target, KillerGroup::Gunner)],
            )
            .await;
        }
    }

    async fn run_sandmen(&mut self) {
        let picks = self
            .solicit_day_role(
                Role::Sandman,
                OneShots::SLEEP_SONG,
                "Sing someone into dreamless sleep tonight?",
            )
            .await;
        for (_, target) in picks {
            if let Some(p) = self.game.player_mut(target) {
                p.conditions.insert(Conditions::PENDING_SLEEP);
            }
        }
    }

    async fn run_pacifists(&mut self) {
        let taken = self
            .offer_reveal(
                Role::Pacifist,
                OneShots::PACIFIST_REVEAL,
                "Reveal yourself and stop today's vote?",
                "No blood today",
            )
            .await;
        if !taken.is_empty() {
            self.vote_cancelled = true;
            self.events.publish(GameEvent::VoteCancelled {
                reason: crate::events::VoteAbort::PacifistReveal,
            });
            let _ = self
                .broker
                .channel()
                .broadcast("A pacifist steps forward. There will be no vote today.")
                .await;
        }
    }

    // ========================================================================
    // Stage 5: Strikes
    // ========================================================================

    async fn stage_strikes(&mut self) {
        let struck: Vec<PlayerId> = self
            .game
            .alive()
            .filter(|p| p.counters.strikes >= game_core::GameConfig::STRIKE_LIMIT)
            .map(|p| p.id)
            .collect();
        for id in struck {
            let name = self.game.player(id).map(|p| p.name.clone()).unwrap_or_default();
            let _ = self
                .broker
                .channel()
                .broadcast(&format!("{name} has ignored three elections and is removed from the village."))
                .await;
            apply_cascade(
                self.game,
                self.broker,
                self.events,
                self.config,
                vec![(id, KillerGroup::Strikes)],
            )
            .await;
        }
    }

    // ========================================================================
    // Shared helpers
    // ========================================================================

    /// One-shot targeted day ability: solicits every eligible holder,
    /// spends the marker on a successful pick. Returns `(actor, target)`.
    async fn solicit_day_role(
        &mut self,
        role: Role,
        shot: OneShots,
        prompt: &str,
    ) -> Vec<(PlayerId, PlayerId)> {
        let requests: Vec<PickRequest> = self
            .game
            .alive()
            .filter(|p| {
                p.role() == role
                    && !p.one_shots.contains(shot)
                    && !p.conditions.contains(Conditions::SPECTATING)
            })
            .map(|p| {
                PickRequest::one(
                    p.id,
                    prompt,
                    self.candidates(|c| c.id != p.id),
                    self.config.solicit_timeout,
                )
            })
            .collect();

        let mut outcomes = Vec::new();
        for (actor, pick) in self.broker.solicit_many(requests).await {
            let Some(target) = pick.first() else { continue };
            if let Some(p) = self.game.player_mut(actor) {
                if p.try_spend(shot) {
                    outcomes.push((actor, target));
                }
            }
        }
        outcomes
    }

    pub(crate) fn candidates<F>(&self, keep: F) -> Vec<Candidate>
    where
        F: Fn(&Player) -> bool,
    {
        self.game
            .alive()
            .filter(|p| keep(p))
            .map(|p| Candidate {
                id: p.id,
                label: p.name.clone(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn day_stage_order_is_the_declared_order() {
        let order: Vec<DayStage> = DayStage::iter().collect();
        assert_eq!(
            order,
            vec![
                DayStage::Recap,
                DayStage::Resurrections,
                DayStage::Abilities,
                DayStage::Election,
                DayStage::Strikes,
            ]
        );
    }
}
