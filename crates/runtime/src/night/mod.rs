//! The night pipeline.
//!
//! Twelve stages in fixed order fold every nocturnal ability into a single
//! ordered death list. The declaration order of [`NightStage`] IS the
//! execution order — `run` iterates the enum, and the stage-sequence test
//! pins it — so a reordering bug cannot hide behind a refactor.
//!
//! Within a stage, eligible actors are solicited concurrently and joined
//! before the stage returns; the game state is only touched between those
//! joins. That single-writer discipline is what makes the pipeline safe
//! without locks.

mod augury;
mod pack;
mod predators;
mod protection;
mod vigils;
mod visits;

use strum::IntoEnumIterator;
use tracing::debug;

use game_core::{Conditions, Game, KillerGroup, Player, PlayerId, Role};

use crate::api::Result;
use crate::broker::{ActionBroker, Candidate, PickRequest};
use crate::channel::CommunicationChannel;
use crate::events::{EventBus, GameEvent};
use crate::relay::{Relay, RelayKind, RelaySet};
use crate::session::SessionConfig;

/// The fixed stage order. Do not reorder: inter-stage ordering is part of
/// the rules (protection must see the final attack set, conversions must
/// run before protection, and so on).
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::EnumIter, strum::AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum NightStage {
    /// Clear last night's transient flags, apply scheduled sleep, open the
    /// dead-chat line.
    Dusk,
    /// Resurrection casters queue their work; nothing applies yet.
    Rituals,
    /// Jail assignment is finalized; prisoners are blocked and warded.
    Wardens,
    /// Information gathering: seers, aura readers, the detective, the
    /// sorcerer. Knowledge only.
    Augury,
    /// The pack deliberates, ballots, and picks its prey.
    PackHunt,
    /// Conditional second wolf kill (prowler's hunt, cub vengeance).
    BonusHunt,
    /// Independent solo killers.
    Predators,
    /// Harlot and shaman visits resolve against the pending list.
    Visits,
    /// The cursed join the pack instead of dying.
    Conversions,
    /// Protection layers peel entries off in fixed precedence.
    Protection,
    /// Potions and other remaining utility abilities.
    Vigils,
    /// The pending list becomes the night's death list.
    LastLight,
}

/// One queued death, tagged with its attacker category for immunity rules
/// and forensics.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PendingKill {
    pub target: PlayerId,
    pub group: KillerGroup,
}

/// The night's mutable kill list.
#[derive(Default)]
pub struct PendingList {
    entries: Vec<PendingKill>,
}

impl PendingList {
    /// Queues a kill. Duplicate target/group pairs collapse.
    pub fn add(&mut self, target: PlayerId, group: KillerGroup) {
        let entry = PendingKill { target, group };
        if !self.entries.contains(&entry) {
            self.entries.push(entry);
        }
    }

    pub fn contains(&self, target: PlayerId) -> bool {
        self.entries.iter().any(|e| e.target == target)
    }

    /// Drops every entry against `target`. Returns how many were removed.
    pub fn clear_target(&mut self, target: PlayerId) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| e.target != target);
        before - self.entries.len()
    }

    /// Moves every entry against `from` onto `to`, keeping the groups.
    pub fn retarget(&mut self, from: PlayerId, to: PlayerId) {
        for entry in self.entries.iter_mut().filter(|e| e.target == from) {
            entry.target = to;
        }
    }

    pub fn entries(&self) -> &[PendingKill] {
        &self.entries
    }

    pub fn drain(&mut self) -> Vec<PendingKill> {
        std::mem::take(&mut self.entries)
    }
}

/// Drives one night. Borrows the session's pieces for its lifetime; the
/// session resumes ownership when the death list comes back.
pub struct NightPipeline<'a, C: CommunicationChannel> {
    pub(crate) game: &'a mut Game,
    pub(crate) broker: &'a ActionBroker<C>,
    pub(crate) events: &'a EventBus,
    pub(crate) relays: &'a mut RelaySet,
    pub(crate) config: &'a SessionConfig,
    pub(crate) pending: PendingList,
    /// The pack's primary target tonight, kept so the bonus hunt stays
    /// disjoint.
    pub(crate) pack_target: Option<PlayerId>,
}

impl<'a, C: CommunicationChannel> NightPipeline<'a, C> {
    pub fn new(
        game: &'a mut Game,
        broker: &'a ActionBroker<C>,
        events: &'a EventBus,
        relays: &'a mut RelaySet,
        config: &'a SessionConfig,
    ) -> Self {
        NightPipeline {
            game,
            broker,
            events,
            relays,
            config,
            pending: PendingList::default(),
            pack_target: None,
        }
    }

    /// Runs all stages in declaration order and returns the death list.
    pub async fn run(mut self) -> Result<Vec<PendingKill>> {
        let mut deaths = Vec::new();
        for stage in NightStage::iter() {
            debug!(target: "night", round = self.game.round, stage = stage.as_ref(), "stage begins");
            match stage {
                NightStage::Dusk => self.stage_dusk().await?,
                NightStage::Rituals => self.stage_rituals().await,
                NightStage::Wardens => self.stage_wardens().await,
                NightStage::Augury => self.stage_augury().await,
                NightStage::PackHunt => self.stage_pack_hunt().await?,
                NightStage::BonusHunt => self.stage_bonus_hunt().await,
                NightStage::Predators => self.stage_predators().await,
                NightStage::Visits => self.stage_visits().await,
                NightStage::Conversions => self.stage_conversions().await,
                NightStage::Protection => self.stage_protection().await,
                NightStage::Vigils => self.stage_vigils().await,
                NightStage::LastLight => deaths = self.stage_last_light(),
            }
        }
        Ok(deaths)
    }

    // ========================================================================
    // Stage 1: Dusk
    // ========================================================================

    async fn stage_dusk(&mut self) -> Result<()> {
        // The pack's daytime back-channel closes before anyone sleeps.
        self.relays.shutdown_kind(RelayKind::AlphaDay).await?;

        self.game.at_dusk();
        self.events.publish(GameEvent::PhaseChanged {
            phase: self.game.phase,
            round: self.game.round,
        });
        let _ = self
            .broker
            .channel()
            .broadcast(&format!("Night {} falls over the village.", self.game.round))
            .await;

        // Dead chat opens while someone who hears the dead is alive.
        let dead: Vec<_> = self
            .game
            .dead()
            .map(|p| (p.id, p.name.clone()))
            .collect();
        let mut listeners = self.game.holders_of(Role::Medium);
        listeners.extend(self.game.holders_of(Role::Ritualist));
        if !dead.is_empty() && !listeners.is_empty() {
            let mut members = dead;
            for id in listeners {
                if let Some(p) = self.game.player(id) {
                    members.push((p.id, p.name.clone()));
                }
            }
            self.relays.push(Relay::spawn(
                std::sync::Arc::clone(self.broker.channel()),
                RelayKind::DeadChat,
                members,
            ));
        }
        Ok(())
    }

    // ========================================================================
    // Stage 2: Rituals — queued, never applied immediately
    // ========================================================================

    async fn stage_rituals(&mut self) {
        let dead: Vec<Candidate> = self
            .game
            .dead()
            .map(|p| Candidate {
                id: p.id,
                label: p.name.clone(),
            })
            .collect();
        if dead.is_empty() {
            return;
        }

        let mut requests = Vec::new();
        for role in [Role::Medium, Role::Ritualist] {
            for id in self.game.holders_of(role) {
                let player = self.game.player(id).expect("holder is present");
                if role == Role::Medium && player.one_shots.contains(game_core::OneShots::REVIVAL)
                {
                    continue;
                }
                let prompt = match role {
                    Role::Medium => "One soul may return. Who do you call back?",
                    _ => "Over whose body do you begin the rite?",
                };
                requests.push(
                    PickRequest::one(id, prompt, dead.clone(), self.config.solicit_timeout)
                        .blocked_if(!player.can_act_tonight()),
                );
            }
        }

        for (actor, pick) in self.broker.solicit_many(requests).await {
            let Some(target) = pick.first() else { continue };
            let Some(caster) = self.game.player_mut(actor) else { continue };
            let origin = caster.role();
            let remaining = match origin {
                Role::Medium => {
                    if !caster.try_spend(game_core::OneShots::REVIVAL) {
                        continue;
                    }
                    1
                }
                _ => game_core::GameConfig::RITUAL_DELAY,
            };
            self.game.queue_resurrection(game_core::PendingResurrection {
                caster: actor,
                target,
                origin,
                remaining,
            });
            debug!(target: "night", caster = %actor, target = %target, ?origin, "resurrection queued");
        }
    }

    // ========================================================================
    // Stage 3: Wardens
    // ========================================================================

    async fn stage_wardens(&mut self) {
        let mut requests = Vec::new();
        for id in self.game.holders_of(Role::Jailer) {
            let jailer = self.game.player(id).expect("holder is present");
            let cells = self.candidates(|p| p.id != id);
            requests.push(
                PickRequest::one(
                    id,
                    "Whose door do you lock tonight?",
                    cells,
                    self.config.solicit_timeout,
                )
                .blocked_if(!jailer.can_act_tonight()),
            );
        }

        let mut cells = Vec::new();
        for (actor, pick) in self.broker.solicit_many(requests).await {
            let Some(target) = pick.first() else { continue };
            if let Some(prisoner) = self.game.player_mut(target) {
                prisoner.conditions.insert(Conditions::JAILED);
            }
            if let Some(jailer) = self.game.player_mut(actor) {
                jailer.night.jailing = Some(target);
            }
            let _ = self
                .broker
                .channel()
                .send_to_actor(target, "Heavy hands drag you into the cell for the night.")
                .await;
            cells.push((actor, target));
        }

        // One two-way line per cell, torn down at dawn.
        for (jailer, prisoner) in cells {
            let members = [jailer, prisoner]
                .iter()
                .filter_map(|&id| self.game.player(id).map(|p| (p.id, p.name.clone())))
                .collect();
            self.relays.push(Relay::spawn(
                std::sync::Arc::clone(self.broker.channel()),
                RelayKind::JailCell,
                members,
            ));
        }
    }

    // ========================================================================
    // Stage 9: Conversions
    // ========================================================================

    async fn stage_conversions(&mut self) {
        let converts: Vec<PlayerId> = self
            .pending
            .entries()
            .iter()
            .filter(|e| e.group == KillerGroup::Wolves)
            .filter_map(|e| {
                let p = self.game.player(e.target)?;
                (p.is_alive() && p.role() == Role::Cursed).then_some(e.target)
            })
            .collect();

        for id in converts {
            let Some(player) = self.game.player_mut(id) else { continue };
            if !player.try_spend(game_core::OneShots::CONVERSION) {
                continue;
            }
            self.pending.clear_target(id);
            player.assign_role(Role::Werewolf);
            self.events.publish(GameEvent::PlayerConverted { player: id });
            let _ = self
                .broker
                .channel()
                .send_to_actor(id, "The bite burns. By dawn you will run with the pack.")
                .await;
        }
    }

    // ========================================================================
    // Stage 12: LastLight
    // ========================================================================

    fn stage_last_light(&mut self) -> Vec<PendingKill> {
        let deaths = self.pending.drain();
        debug!(
            target: "night",
            round = self.game.round,
            count = deaths.len(),
            "night resolved"
        );
        deaths
    }

    // ========================================================================
    // Shared helpers
    // ========================================================================

    /// Living players matching `keep`, as labelled candidates.
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

    /// Solicits every living holder of `role` with the same prompt against
    /// per-actor candidates, joining the fan-out.
    pub(crate) async fn solicit_role<F>(
        &self,
        role: Role,
        prompt: &str,
        count: usize,
        candidates_for: F,
    ) -> Vec<(PlayerId, crate::broker::Pick)>
    where
        F: Fn(&Player) -> Vec<Candidate>,
    {
        let requests: Vec<PickRequest> = self
            .game
            .alive()
            .filter(|p| p.role() == role)
            .map(|p| {
                PickRequest::one(p.id, prompt, candidates_for(p), self.config.solicit_timeout)
                    .many(count)
                    .blocked_if(!p.can_act_tonight())
            })
            .collect();
        self.broker.solicit_many(requests).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_order_is_the_declared_order() {
        let order: Vec<NightStage> = NightStage::iter().collect();
        assert_eq!(
            order,
            vec![
                NightStage::Dusk,
                NightStage::Rituals,
                NightStage::Wardens,
                NightStage::Augury,
                NightStage::PackHunt,
                NightStage::BonusHunt,
                NightStage::Predators,
                NightStage::Visits,
                NightStage::Conversions,
                NightStage::Protection,
                NightStage::Vigils,
                NightStage::LastLight,
            ]
        );
    }

    #[test]
    fn pending_list_dedups_and_retargets() {
        let mut pending = PendingList::default();
        pending.add(PlayerId(1), KillerGroup::Wolves);
        pending.add(PlayerId(1), KillerGroup::Wolves);
        pending.add(PlayerId(1), KillerGroup::SerialKiller);
        assert_eq!(pending.entries().len(), 2);

        pending.retarget(PlayerId(1), PlayerId(2));
        assert!(!pending.contains(PlayerId(1)));
        assert!(pending.contains(PlayerId(2)));

        assert_eq!(pending.clear_target(PlayerId(2)), 2);
        assert!(pending.entries().is_empty());
    }
}
