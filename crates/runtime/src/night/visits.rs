//! Stage 8: visits.
//!
//! Visit-type roles bind themselves to whoever they secretly visited, and
//! the pending list is re-read through that lens: an attack on an absent
//! visitor misses; a visit to a victim pulls the attack onto the visitor;
//! the shaman's communion undoes a due death and binds the two fates.

use game_core::{KillerGroup, PlayerId, Role, Team};
use tracing::debug;

use crate::channel::CommunicationChannel;

use super::NightPipeline;

impl<C: CommunicationChannel> NightPipeline<'_, C> {
    pub(crate) async fn stage_visits(&mut self) {
        // Both visit roles pick concurrently; resolution is ordered below.
        let harlot_picks = self
            .solicit_role(Role::Harlot, "Whose bed do you visit tonight?", 1, |p| {
                self.candidates(|c| c.id != p.id)
            })
            .await;
        let shaman_picks = self
            .solicit_role(Role::Shaman, "Whose spirit do you commune with?", 1, |p| {
                self.candidates(|c| c.id != p.id)
            })
            .await;

        for (actor, pick) in &harlot_picks {
            if let Some(target) = pick.first() {
                if let Some(p) = self.game.player_mut(*actor) {
                    p.night.visiting = Some(target);
                }
            }
        }
        for (actor, pick) in &shaman_picks {
            if let Some(target) = pick.first() {
                if let Some(p) = self.game.player_mut(*actor) {
                    p.night.visiting = Some(target);
                }
            }
        }

        self.resolve_harlots(harlot_picks.iter().filter_map(|(a, p)| Some((*a, p.first()?))));
        self.resolve_shamans(shaman_picks.iter().filter_map(|(a, p)| Some((*a, p.first()?))));
    }

    fn resolve_harlots(&mut self, visits: impl Iterator<Item = (PlayerId, PlayerId)>) {
        for (harlot, target) in visits {
            // Away from home: attacks against the empty bed miss.
            let missed = self.pending.clear_target(harlot);
            if missed > 0 {
                debug!(target: "night", %harlot, "attack found an empty bed");
            }

            if self.pending.contains(target) {
                // The visitor walks in on the attack and takes it.
                self.pending.retarget(target, harlot);
                debug!(target: "night", %harlot, %target, "visit transferred the attack");
            } else if self
                .game
                .player(target)
                .is_some_and(|p| p.role().team() == Team::Wolves)
            {
                self.pending.add(harlot, KillerGroup::Visit);
                debug!(target: "night", %harlot, %target, "visited a wolf's den");
            }
        }
    }

    fn resolve_shamans(&mut self, visits: impl Iterator<Item = (PlayerId, PlayerId)>) {
        let mut bindings = Vec::new();
        for (shaman, target) in visits {
            if self.pending.clear_target(target) > 0 {
                bindings.push((shaman, target));
            }
        }
        for (shaman, target) in bindings {
            self.game.bind_fates(shaman, target);
            debug!(target: "night", %shaman, %target, "death undone, fates bound");
        }
    }
}
