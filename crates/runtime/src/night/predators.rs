//! Stage 7: independent solo killers.
//!
//! Each adds its own entries to the pending list under its own killer
//! group. The serial killer hunts nightly; the white wolf thins the pack
//! every second night; the cannibal banks hunger on quiet nights and
//! feasts proportionally.

use game_core::{GameConfig, KillerGroup, Role};

use crate::channel::CommunicationChannel;

use super::NightPipeline;

impl<C: CommunicationChannel> NightPipeline<'_, C> {
    pub(crate) async fn stage_predators(&mut self) {
        self.run_serial_killers().await;
        self.run_white_wolves().await;
        self.run_cannibals().await;
    }

    async fn run_serial_killers(&mut self) {
        for (_, pick) in self
            .solicit_role(Role::SerialKiller, "Choose tonight's victim.", 1, |p| {
                self.candidates(|c| c.id != p.id)
            })
            .await
        {
            if let Some(target) = pick.first() {
                self.pending.add(target, KillerGroup::SerialKiller);
            }
        }
    }

    /// Runs with the pack, but every second night it eats a wolf.
    async fn run_white_wolves(&mut self) {
        if self.game.round % GameConfig::WHITE_WOLF_CADENCE != 0 {
            return;
        }
        let pack = self.game.pack();
        for (_, pick) in self
            .solicit_role(
                Role::WhiteWolf,
                "The pack sleeps soundly around you. Which wolf do you eat?",
                1,
                |p| self.candidates(|c| c.id != p.id && pack.contains(&c.id)),
            )
            .await
        {
            if let Some(target) = pick.first() {
                self.pending.add(target, KillerGroup::WhiteWolf);
            }
        }
    }

    /// Hunger accrues each night; a feast spends it all at once.
    async fn run_cannibals(&mut self) {
        let cannibals = self.game.holders_of(Role::Cannibal);
        if cannibals.is_empty() {
            return;
        }
        for &id in &cannibals {
            if let Some(p) = self.game.player_mut(id) {
                p.counters.hunger = p.counters.hunger.saturating_add(1);
            }
        }

        let hunger_of = |pipeline: &Self, id| {
            pipeline
                .game
                .player(id)
                .map(|p| usize::from(p.counters.hunger))
                .unwrap_or(0)
        };

        // One fan-out across all cannibals, each with their own appetite.
        let requests: Vec<_> = cannibals
            .iter()
            .filter_map(|&id| {
                let player = self.game.player(id)?;
                let stacks = hunger_of(self, id);
                Some(
                    crate::broker::PickRequest::one(
                        id,
                        format!("Hunger gnaws — {stacks} deep. Feast, or let it grow."),
                        self.candidates(|c| c.id != id),
                        self.config.solicit_timeout,
                    )
                    .many(stacks)
                    .blocked_if(!player.can_act_tonight()),
                )
            })
            .collect();

        for (actor, pick) in self.broker.solicit_many(requests).await {
            let eaten = pick.targets().to_vec();
            if eaten.is_empty() {
                continue;
            }
            for &target in &eaten {
                self.pending.add(target, KillerGroup::Cannibal);
            }
            if let Some(p) = self.game.player_mut(actor) {
                p.counters.hunger = p.counters.hunger.saturating_sub(eaten.len() as u8);
            }
        }
    }
}
