//! Authoritative session state.
//!
//! [`Game`] is the aggregate root: it owns every [`Player`], the cycle
//! bookkeeping, the lovers and fate bonds, the resurrection queue, and the
//! per-cycle forensics map. Pipelines in the runtime crate mutate it only
//! between stage joins, so no locking is needed — the single-writer
//! discipline is the concurrency model.

mod player;

pub use player::{Bonds, Conditions, Counters, NightState, OneShots, Player, PlayerId};

use std::collections::{BTreeSet, HashMap, VecDeque};

use crate::role::{GameMode, Role, Side};

/// Coarse phase of the session state machine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Phase {
    /// Roster assigned, first-night choices (thief, cupid, wild child)
    /// not yet made.
    #[default]
    Setup,
    Night,
    Day,
    Finished,
}

/// Which category of attacker caused a death. Recorded per cycle for
/// immunity rules and post-hoc forensics, and permanently on announcement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display, strum::AsRefStr)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[strum(serialize_all = "snake_case")]
pub enum KillerGroup {
    Wolves,
    WhiteWolf,
    SerialKiller,
    Cannibal,
    Witch,
    Priest,
    Gunner,
    Hunter,
    /// Death by the village's vote.
    Vote,
    /// Followed a lover into the grave.
    Heartbreak,
    /// Dragged down by a fate bond.
    FateBound,
    /// The harlot's door risk, or any transferred attack.
    Visit,
    /// Eliminated after three idle-vote strikes.
    Strikes,
}

/// Result of applying one kill against the roster.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KillOutcome {
    /// The player is now dead.
    Died,
    /// A spare life absorbed the hit (elder).
    Survived,
    /// Target was already dead or unknown; defensively ignored.
    Ignored,
}

/// A resurrection waiting for its delay to elapse. Fires even if the
/// caster has died in the meantime.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PendingResurrection {
    pub caster: PlayerId,
    pub target: PlayerId,
    pub origin: Role,
    /// Remaining day/night cycle boundaries before it fires.
    pub remaining: u8,
}

/// The aggregate root for one session.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Game {
    pub mode: GameMode,
    /// RNG seed captured at creation; sessions replay deterministically.
    pub seed: u64,
    players: Vec<Player>,
    /// Thief pool: the two roles never held by a live player at start.
    reserve: Vec<Role>,
    pub phase: Phase,
    /// Completed night count; night N and the following day share it.
    pub round: u32,
    /// Unordered mutual pairs. The chain closure is recomputed on demand.
    lovers: Vec<(PlayerId, PlayerId)>,
    /// Shaman fate bonds: when one dies, the other follows.
    fate_bonds: Vec<(PlayerId, PlayerId)>,
    resurrections: VecDeque<PendingResurrection>,
    /// Who killed whom this cycle. Cleared at each dusk.
    killed_by: HashMap<PlayerId, KillerGroup>,
    forced_winner: Option<PlayerId>,
    forced_side: Option<Side>,
    /// Set the first time a wolf-aligned player dies; gates the prowler's
    /// bonus hunt.
    wolf_death_seen: bool,
    /// The cub died: the pack hunts twice next night.
    pub cub_vengeance: bool,
}

impl Game {
    /// Builds the session state from a roster assignment. The final two
    /// roles of the slate form the thief reserve.
    pub fn new(
        mode: GameMode,
        seed: u64,
        assignments: Vec<(String, Role)>,
        reserve: Vec<Role>,
    ) -> Self {
        let players = assignments
            .into_iter()
            .enumerate()
            .map(|(i, (name, role))| Player::new(PlayerId(i as u32), name, role))
            .collect();
        Game {
            mode,
            seed,
            players,
            reserve,
            phase: Phase::Setup,
            round: 0,
            lovers: Vec::new(),
            fate_bonds: Vec::new(),
            resurrections: VecDeque::new(),
            killed_by: HashMap::new(),
            forced_winner: None,
            forced_side: None,
            wolf_death_seen: false,
            cub_vengeance: false,
        }
    }

    // ========================================================================
    // Roster access
    // ========================================================================

    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.iter()
    }

    pub fn players_mut(&mut self) -> impl Iterator<Item = &mut Player> {
        self.players.iter_mut()
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    pub fn alive(&self) -> impl Iterator<Item = &Player> {
        self.players.iter().filter(|p| p.is_alive())
    }

    pub fn alive_ids(&self) -> Vec<PlayerId> {
        self.alive().map(|p| p.id).collect()
    }

    pub fn living_count(&self) -> usize {
        self.alive().count()
    }

    pub fn dead(&self) -> impl Iterator<Item = &Player> {
        self.players.iter().filter(|p| !p.is_alive())
    }

    /// Living players currently holding `role`.
    pub fn holders_of(&self, role: Role) -> Vec<PlayerId> {
        self.alive()
            .filter(|p| p.role() == role)
            .map(|p| p.id)
            .collect()
    }

    /// Living members of the wolf huddle (pack roles plus alpha-cursed
    /// converts), excluding the role-blocked.
    pub fn pack(&self) -> Vec<PlayerId> {
        self.alive()
            .filter(|p| p.role().wakes_with_pack() || p.conditions.contains(Conditions::CURSED))
            .map(|p| p.id)
            .collect()
    }

    pub fn reserve(&self) -> &[Role] {
        &self.reserve
    }

    /// Thief swap: takes the reserve role at `index`, leaving the thief's
    /// old role in its place.
    pub fn take_reserve(&mut self, index: usize, replacement: Role) -> Option<Role> {
        let slot = self.reserve.get_mut(index)?;
        Some(std::mem::replace(slot, replacement))
    }

    // ========================================================================
    // Deaths and forensics
    // ========================================================================

    /// Applies one kill. Idempotent against dead or unknown targets; the
    /// killer group is recorded only when the death sticks.
    pub fn kill(&mut self, target: PlayerId, group: KillerGroup) -> KillOutcome {
        let Some(player) = self.players.iter_mut().find(|p| p.id == target) else {
            return KillOutcome::Ignored;
        };
        if !player.is_alive() {
            return KillOutcome::Ignored;
        }
        if player.lose_life() {
            let wolfish = player.side().is_wolf_aligned();
            self.killed_by.insert(target, group);
            if wolfish {
                self.wolf_death_seen = true;
            }
            KillOutcome::Died
        } else {
            KillOutcome::Survived
        }
    }

    pub fn killer_of(&self, target: PlayerId) -> Option<KillerGroup> {
        self.killed_by.get(&target).copied()
    }

    /// True until the first wolf-aligned death of the game.
    pub fn pack_unbloodied(&self) -> bool {
        !self.wolf_death_seen
    }

    // ========================================================================
    // Lovers and fate bonds
    // ========================================================================

    pub fn link_lovers(&mut self, a: PlayerId, b: PlayerId) {
        if a != b && !self.are_lovers(a, b) {
            self.lovers.push((a, b));
        }
    }

    pub fn are_lovers(&self, a: PlayerId, b: PlayerId) -> bool {
        self.lovers
            .iter()
            .any(|&(x, y)| (x == a && y == b) || (x == b && y == a))
    }

    pub fn lovers_of(&self, id: PlayerId) -> Vec<PlayerId> {
        self.lovers
            .iter()
            .filter_map(|&(a, b)| {
                if a == id {
                    Some(b)
                } else if b == id {
                    Some(a)
                } else {
                    None
                }
            })
            .collect()
    }

    /// Transitive closure of the mutual love relation rooted at `id`.
    /// Always recomputed; chains formed through deceased members still
    /// connect the survivors.
    pub fn love_chain(&self, id: PlayerId) -> BTreeSet<PlayerId> {
        let mut chain = BTreeSet::new();
        let mut queue = VecDeque::from([id]);
        while let Some(next) = queue.pop_front() {
            if chain.insert(next) {
                queue.extend(self.lovers_of(next));
            }
        }
        chain
    }

    pub fn bind_fates(&mut self, a: PlayerId, b: PlayerId) {
        if a != b && !self.fates_bound(a, b) {
            self.fate_bonds.push((a, b));
        }
    }

    pub fn fates_bound(&self, a: PlayerId, b: PlayerId) -> bool {
        self.fate_bonds
            .iter()
            .any(|&(x, y)| (x == a && y == b) || (x == b && y == a))
    }

    pub fn fate_partners(&self, id: PlayerId) -> Vec<PlayerId> {
        self.fate_bonds
            .iter()
            .filter_map(|&(a, b)| {
                if a == id {
                    Some(b)
                } else if b == id {
                    Some(a)
                } else {
                    None
                }
            })
            .collect()
    }

    // ========================================================================
    // Resurrection queue
    // ========================================================================

    pub fn queue_resurrection(&mut self, pending: PendingResurrection) {
        self.resurrections.push_back(pending);
    }

    pub fn pending_resurrections(&self) -> impl Iterator<Item = &PendingResurrection> {
        self.resurrections.iter()
    }

    /// Advances every queued resurrection by one cycle boundary and drains
    /// the ones that are due.
    pub fn tick_resurrections(&mut self) -> Vec<PendingResurrection> {
        for pending in self.resurrections.iter_mut() {
            pending.remaining = pending.remaining.saturating_sub(1);
        }
        let mut due = Vec::new();
        self.resurrections.retain(|p| {
            if p.remaining == 0 {
                due.push(*p);
                false
            } else {
                true
            }
        });
        due
    }

    // ========================================================================
    // Forced outcomes
    // ========================================================================

    pub fn force_winner(&mut self, winner: PlayerId) {
        self.forced_winner.get_or_insert(winner);
    }

    pub fn forced_winner(&self) -> Option<PlayerId> {
        self.forced_winner
    }

    pub fn force_side(&mut self, side: Side) {
        self.forced_side.get_or_insert(side);
    }

    pub fn forced_side(&self) -> Option<Side> {
        self.forced_side
    }

    // ========================================================================
    // Cycle boundaries
    // ========================================================================

    /// Night falls: bump the counter, wipe last cycle's forensics, clear
    /// the night-scoped flags, and apply sleep scheduled during the day.
    pub fn at_dusk(&mut self) {
        self.phase = Phase::Night;
        self.round += 1;
        self.killed_by.clear();
        for p in self.players.iter_mut() {
            p.conditions &= !Conditions::NIGHT_SCOPED;
            if p.conditions.contains(Conditions::PENDING_SLEEP) {
                p.conditions.remove(Conditions::PENDING_SLEEP);
                p.conditions.insert(Conditions::ASLEEP);
            }
            p.night.visiting = None;
            p.night.guarding = None;
            p.night.jailing = None;
        }
    }

    /// Dawn: apply silences cast overnight. Silences last through the day
    /// and fall with the other transient flags at the next dusk.
    pub fn at_dawn(&mut self) {
        self.phase = Phase::Day;
        for p in self.players.iter_mut() {
            if p.conditions.contains(Conditions::PENDING_SILENCE) {
                p.conditions.remove(Conditions::PENDING_SILENCE);
                p.conditions.insert(Conditions::SILENCED);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn five_player_game() -> Game {
        Game::new(
            GameMode::Classic,
            7,
            vec![
                ("wolf".into(), Role::Werewolf),
                ("seer".into(), Role::Seer),
                ("doc".into(), Role::Doctor),
                ("anna".into(), Role::Villager),
                ("bert".into(), Role::Villager),
            ],
            vec![Role::Villager, Role::Hunter],
        )
    }

    #[test]
    fn kill_is_idempotent_and_records_group() {
        let mut game = five_player_game();
        assert_eq!(game.kill(PlayerId(1), KillerGroup::Wolves), KillOutcome::Died);
        assert_eq!(game.killer_of(PlayerId(1)), Some(KillerGroup::Wolves));
        assert_eq!(
            game.kill(PlayerId(1), KillerGroup::SerialKiller),
            KillOutcome::Ignored
        );
        // Forensics keep the original attacker.
        assert_eq!(game.killer_of(PlayerId(1)), Some(KillerGroup::Wolves));
    }

    #[test]
    fn wolf_death_unbloodies_the_pack() {
        let mut game = five_player_game();
        assert!(game.pack_unbloodied());
        game.kill(PlayerId(3), KillerGroup::Wolves);
        assert!(game.pack_unbloodied());
        game.kill(PlayerId(0), KillerGroup::Vote);
        assert!(!game.pack_unbloodied());
    }

    #[test]
    fn love_chain_is_transitive_and_symmetric() {
        let mut game = five_player_game();
        game.link_lovers(PlayerId(1), PlayerId(2));
        game.link_lovers(PlayerId(2), PlayerId(3));
        let chain = game.love_chain(PlayerId(1));
        assert_eq!(
            chain.into_iter().collect::<Vec<_>>(),
            vec![PlayerId(1), PlayerId(2), PlayerId(3)]
        );
        // Recomputed from the far end, the chain is identical.
        assert_eq!(game.love_chain(PlayerId(3)), game.love_chain(PlayerId(1)));
    }

    #[test]
    fn resurrection_queue_fires_after_delay() {
        let mut game = five_player_game();
        game.queue_resurrection(PendingResurrection {
            caster: PlayerId(2),
            target: PlayerId(1),
            origin: Role::Ritualist,
            remaining: 2,
        });
        assert!(game.tick_resurrections().is_empty());
        let due = game.tick_resurrections();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].target, PlayerId(1));
        assert!(game.tick_resurrections().is_empty());
    }

    #[test]
    fn dusk_applies_pending_sleep_and_clears_protection() {
        let mut game = five_player_game();
        {
            let p = game.player_mut(PlayerId(3)).unwrap();
            p.conditions |= Conditions::PROTECTED | Conditions::PENDING_SLEEP;
        }
        game.at_dusk();
        let p = game.player(PlayerId(3)).unwrap();
        assert!(!p.conditions.contains(Conditions::PROTECTED));
        assert!(p.conditions.contains(Conditions::ASLEEP));
        assert_eq!(game.round, 1);
    }

    #[test]
    fn forced_winner_is_first_write_wins() {
        let mut game = five_player_game();
        game.force_winner(PlayerId(4));
        game.force_winner(PlayerId(0));
        assert_eq!(game.forced_winner(), Some(PlayerId(4)));
    }
}
