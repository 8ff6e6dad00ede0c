//! Stage 4: information gathering.
//!
//! Side effects are knowledge only — nothing here touches the pending
//! list. Every answer goes through the target's *apparent* role, so
//! disguises, the lycan, and the dire wolf mislead exactly as intended.

use rand::seq::SliceRandom;
use rand::SeedableRng;

use game_core::{Role, Team};

use crate::channel::CommunicationChannel;

use super::NightPipeline;

impl<C: CommunicationChannel> NightPipeline<'_, C> {
    pub(crate) async fn stage_augury(&mut self) {
        self.run_seers().await;
        self.run_aura_readers().await;
        self.run_detectives().await;
        self.run_fools().await;
        self.run_sorcerers().await;
    }

    async fn run_seers(&mut self) {
        for (actor, pick) in self
            .solicit_role(Role::Seer, "Whose role do you look into tonight?", 1, |p| {
                self.candidates(|c| c.id != p.id)
            })
            .await
        {
            let Some(target) = pick.first() else { continue };
            let Some(seen) = self.game.player(target) else { continue };
            let line = format!("{} is a {}.", seen.name, seen.apparent_role());
            let _ = self.broker.channel().send_to_actor(actor, &line).await;
        }

        // The clairvoyant reads the full card, aura included.
        for (actor, pick) in self
            .solicit_role(Role::Clairvoyant, "Whose card do you read tonight?", 1, |p| {
                self.candidates(|c| c.id != p.id)
            })
            .await
        {
            let Some(target) = pick.first() else { continue };
            let Some(seen) = self.game.player(target) else { continue };
            let aura = aura_label(seen.apparent_role());
            let line = format!("{} is a {} — an {aura} presence.", seen.name, seen.apparent_role());
            let _ = self.broker.channel().send_to_actor(actor, &line).await;
        }
    }

    async fn run_aura_readers(&mut self) {
        for (actor, pick) in self
            .solicit_role(Role::AuraSeer, "Whose aura do you read tonight?", 1, |p| {
                self.candidates(|c| c.id != p.id)
            })
            .await
        {
            let Some(target) = pick.first() else { continue };
            let Some(seen) = self.game.player(target) else { continue };
            let line = format!("{} carries an {} aura.", seen.name, aura_label(seen.apparent_role()));
            let _ = self.broker.channel().send_to_actor(actor, &line).await;
        }
    }

    async fn run_detectives(&mut self) {
        for (actor, pick) in self
            .solicit_role(Role::Detective, "Pick two players to compare.", 2, |p| {
                self.candidates(|c| c.id != p.id)
            })
            .await
        {
            // Two targets or nothing; a timeout with one pick tells nothing.
            let targets = pick.targets();
            if targets.len() < 2 {
                continue;
            }
            let (Some(a), Some(b)) = (self.game.player(targets[0]), self.game.player(targets[1]))
            else {
                continue;
            };
            let same = a.apparent_role().team() == b.apparent_role().team();
            let verdict = if same { "walk the same road" } else { "serve different masters" };
            let line = format!("{} and {} {verdict}.", a.name, b.name);
            let _ = self.broker.channel().send_to_actor(actor, &line).await;
        }
    }

    /// The fool gets a vision too. It is drawn from a hat.
    async fn run_fools(&mut self) {
        let seed = self.game.seed ^ u64::from(self.game.round);
        for (actor, pick) in self
            .solicit_role(Role::Fool, "Whose role do you look into tonight?", 1, |p| {
                self.candidates(|c| c.id != p.id)
            })
            .await
        {
            let Some(target) = pick.first() else { continue };
            let Some(seen) = self.game.player(target) else { continue };
            let mut rng = rand::rngs::StdRng::seed_from_u64(seed ^ u64::from(target.0));
            let plausible = [Role::Villager, Role::Werewolf, Role::Seer, Role::Harlot, Role::Doctor];
            let vision = plausible.choose(&mut rng).copied().unwrap_or(Role::Villager);
            let line = format!("{} is a {vision}.", seen.name);
            let _ = self.broker.channel().send_to_actor(actor, &line).await;
        }
    }

    /// The sorcerer hunts seers for the pack.
    async fn run_sorcerers(&mut self) {
        for (actor, pick) in self
            .solicit_role(Role::Sorcerer, "Where do you search for the sight?", 1, |p| {
                self.candidates(|c| c.id != p.id)
            })
            .await
        {
            let Some(target) = pick.first() else { continue };
            let Some(seen) = self.game.player(target) else { continue };
            let gifted = seen.role().is_seer_like() || seen.role() == Role::Clairvoyant;
            let line = if gifted {
                format!("{} has the sight.", seen.name)
            } else {
                format!("{} is blind like the rest.", seen.name)
            };
            let _ = self.broker.channel().send_to_actor(actor, &line).await;
        }
    }
}

fn aura_label(apparent: Role) -> &'static str {
    match apparent.team() {
        Team::Wolves => "evil",
        Team::Villagers => "innocent",
        Team::Loner(_) => "restless",
    }
}
