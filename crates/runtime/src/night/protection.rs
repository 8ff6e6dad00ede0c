//! Stage 10: protection layers.
//!
//! Fixed precedence, each pending entry cleared at most once:
//! innate immunity → consumable shields → bodyguard interception →
//! single-target protectors (doctor, jailer, healer). Protectors whose
//! ward was attacked are notified; an intercepting bodyguard survives the
//! first blade and falls to the second.

use game_core::{Conditions, KillerGroup, PlayerId, Role};
use tracing::debug;

use crate::channel::CommunicationChannel;

use super::{NightPipeline, PendingKill};

impl<C: CommunicationChannel> NightPipeline<'_, C> {
    pub(crate) async fn stage_protection(&mut self) {
        let guardians = self.solicit_guardians().await;
        self.resolve_layers(guardians).await;
    }

    /// Fan-out for every protector kind; applies the chosen wards.
    /// Returns `(protector, ward)` pairs for the notification pass.
    async fn solicit_guardians(&mut self) -> Vec<(PlayerId, PlayerId)> {
        let mut wards = Vec::new();

        // The doctor may guard anyone, themselves included.
        let doctor_picks = self
            .solicit_role(Role::Doctor, "Who do you watch over tonight?", 1, |_| {
                self.candidates(|_| true)
            })
            .await;
        for (actor, pick) in doctor_picks {
            let Some(target) = pick.first() else { continue };
            if let Some(p) = self.game.player_mut(target) {
                p.conditions.insert(Conditions::PROTECTED);
            }
            wards.push((actor, target));
        }

        let healer_picks = self
            .solicit_role(
                Role::Healer,
                "Who do you tend tonight? (Not the same door twice in a row.)",
                1,
                |p| self.candidates(|c| Some(c.id) != p.night.last_healed),
            )
            .await;
        for (actor, pick) in healer_picks {
            let Some(target) = pick.first() else { continue };
            if let Some(p) = self.game.player_mut(target) {
                p.conditions.insert(Conditions::PROTECTED);
            }
            if let Some(healer) = self.game.player_mut(actor) {
                healer.night.last_healed = Some(target);
            }
            wards.push((actor, target));
        }

        for role in [Role::Bodyguard, Role::GuardianAngel] {
            let picks = self
                .solicit_role(role, "Whose shadow do you stand in tonight?", 1, |p| {
                    self.candidates(|c| c.id != p.id)
                })
                .await;
            for (actor, pick) in picks {
                let Some(target) = pick.first() else { continue };
                if let Some(guard) = self.game.player_mut(actor) {
                    guard.night.guarding = Some(target);
                }
            }
        }

        wards
    }

    async fn resolve_layers(&mut self, wards: Vec<(PlayerId, PlayerId)>) {
        let snapshot: Vec<PendingKill> = self.pending.entries().to_vec();
        let mut fallen_guards: Vec<(PlayerId, KillerGroup)> = Vec::new();

        for entry in snapshot {
            let target = entry.target;

            // Layer 1: innate immunity. The pack's generic attack cannot
            // kill the serial killer.
            if entry.group == KillerGroup::Wolves
                && self
                    .game
                    .player(target)
                    .is_some_and(|p| p.role() == Role::SerialKiller)
            {
                self.pending.clear_target(target);
                debug!(target: "night", %target, "wolf attack bounced off the serial killer");
                continue;
            }

            // Layer 2: a forged shield absorbs the attack and shatters.
            if self
                .game
                .player(target)
                .is_some_and(|p| p.conditions.contains(Conditions::SHIELDED))
            {
                if let Some(p) = self.game.player_mut(target) {
                    p.conditions.remove(Conditions::SHIELDED);
                }
                self.pending.clear_target(target);
                let _ = self
                    .broker
                    .channel()
                    .send_to_actor(target, "Steel rang in the night. Your shield is gone.")
                    .await;
                continue;
            }

            // Layer 3: bodyguard interception.
            let interceptor = self
                .game
                .alive()
                .find(|p| {
                    p.night.guarding == Some(target)
                        && matches!(p.role(), Role::Bodyguard | Role::GuardianAngel)
                })
                .map(|p| (p.id, p.role()));
            if let Some((guard_id, guard_role)) = interceptor {
                self.pending.clear_target(target);
                let fatal = {
                    let guard = self.game.player_mut(guard_id).expect("guard is alive");
                    guard.counters.interceptions += 1;
                    guard_role == Role::Bodyguard && guard.counters.interceptions >= 2
                };
                let note = if fatal {
                    "You stepped into the second blade. It finds your heart."
                } else {
                    "You caught a blade meant for your ward tonight."
                };
                let _ = self.broker.channel().send_to_actor(guard_id, note).await;
                if fatal {
                    fallen_guards.push((guard_id, entry.group));
                }
                continue;
            }

            // Layer 4: the cell wall.
            if self
                .game
                .player(target)
                .is_some_and(|p| p.conditions.contains(Conditions::JAILED))
            {
                self.pending.clear_target(target);
                let jailers: Vec<PlayerId> = self
                    .game
                    .alive()
                    .filter(|p| p.night.jailing == Some(target))
                    .map(|p| p.id)
                    .collect();
                for jailer in jailers {
                    let _ = self
                        .broker
                        .channel()
                        .send_to_actor(jailer, "Claws raked the cell door. Your prisoner is safe.")
                        .await;
                }
                continue;
            }

            // Layer 5: single-target protectors.
            if self
                .game
                .player(target)
                .is_some_and(|p| p.conditions.contains(Conditions::PROTECTED))
            {
                self.pending.clear_target(target);
                for &(protector, _) in wards.iter().filter(|(_, w)| *w == target) {
                    let _ = self
                        .broker
                        .channel()
                        .send_to_actor(protector, "Your ward was attacked tonight. They live.")
                        .await;
                }
                continue;
            }
        }

        // A guard who took the fatal second blade dies to the attack they
        // intercepted, bypassing further layers.
        for (guard, group) in fallen_guards {
            self.pending.add(guard, group);
        }
    }
}
