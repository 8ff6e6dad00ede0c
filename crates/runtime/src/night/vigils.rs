//! Stage 11: remaining night utilities.
//!
//! The witch reads tonight's toll and may still pull a name off the list
//! or add one; the flutist and superspreader spread their marks; the
//! spellcaster schedules a silence for the coming day. All of it runs
//! after protection so the witch sees the real toll.

use game_core::{Conditions, KillerGroup, OneShots, PlayerId, Role};

use crate::broker::{Candidate, PickRequest};
use crate::channel::CommunicationChannel;

use super::NightPipeline;

impl<C: CommunicationChannel> NightPipeline<'_, C> {
    pub(crate) async fn stage_vigils(&mut self) {
        self.run_witches().await;
        self.run_flutists().await;
        self.run_superspreaders().await;
        self.run_spellcasters().await;
    }

    async fn run_witches(&mut self) {
        let witches = self.game.holders_of(Role::Witch);
        for witch in witches {
            let Some(player) = self.game.player(witch) else { continue };
            if !player.can_act_tonight() {
                continue;
            }
            let heal_spent = player.one_shots.contains(OneShots::HEAL_POTION);
            let kill_spent = player.one_shots.contains(OneShots::KILL_POTION);

            if !heal_spent {
                let doomed: Vec<Candidate> = self
                    .pending
                    .entries()
                    .iter()
                    .filter_map(|e| {
                        let p = self.game.player(e.target)?;
                        p.is_alive().then(|| Candidate {
                            id: e.target,
                            label: p.name.clone(),
                        })
                    })
                    .collect();
                if !doomed.is_empty() {
                    let pick = self
                        .broker
                        .solicit(PickRequest::one(
                            witch,
                            "Death has a list tonight. Spend your healing potion on one name?",
                            doomed,
                            self.config.solicit_timeout,
                        ))
                        .await;
                    if let Some(saved) = pick.first() {
                        if let Some(p) = self.game.player_mut(witch) {
                            if p.try_spend(OneShots::HEAL_POTION) {
                                self.pending.clear_target(saved);
                            }
                        }
                    }
                }
            }

            if !kill_spent {
                let field = self.candidates(|p| p.id != witch && !self.pending.contains(p.id));
                let pick = self
                    .broker
                    .solicit(PickRequest::one(
                        witch,
                        "Or the other vial. Poison someone?",
                        field,
                        self.config.solicit_timeout,
                    ))
                    .await;
                if let Some(victim) = pick.first() {
                    if let Some(p) = self.game.player_mut(witch) {
                        if p.try_spend(OneShots::KILL_POTION) {
                            self.pending.add(victim, KillerGroup::Witch);
                        }
                    }
                }
            }
        }
    }

    async fn run_flutists(&mut self) {
        let picks = self
            .solicit_role(Role::Flutist, "Play for two more souls.", 2, |p| {
                self.candidates(|c| {
                    c.id != p.id && !c.conditions.contains(Conditions::ENCHANTED)
                })
            })
            .await;
        for (_, pick) in picks {
            let targets: Vec<PlayerId> = pick.targets().to_vec();
            for target in targets {
                if let Some(p) = self.game.player_mut(target) {
                    p.conditions.insert(Conditions::ENCHANTED);
                }
                let _ = self
                    .broker
                    .channel()
                    .send_to_actor(target, "A far-off flute threads through your dreams.")
                    .await;
            }
        }
    }

    async fn run_superspreaders(&mut self) {
        let picks = self
            .solicit_role(Role::Superspreader, "Who do you breathe on tonight?", 1, |p| {
                self.candidates(|c| {
                    c.id != p.id && !c.conditions.contains(Conditions::INFECTED)
                })
            })
            .await;
        for (_, pick) in picks {
            if let Some(target) = pick.first() {
                if let Some(p) = self.game.player_mut(target) {
                    p.conditions.insert(Conditions::INFECTED);
                }
            }
        }
    }

    async fn run_spellcasters(&mut self) {
        let picks = self
            .solicit_role(Role::Spellcaster, "Whose tongue do you tie for tomorrow?", 1, |p| {
                self.candidates(|c| c.id != p.id)
            })
            .await;
        for (_, pick) in picks {
            if let Some(target) = pick.first() {
                if let Some(p) = self.game.player_mut(target) {
                    p.conditions.insert(Conditions::PENDING_SILENCE);
                }
            }
        }
    }
}
