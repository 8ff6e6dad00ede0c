//! Per-player state.
//!
//! A player's identity is stable for the whole session; the current role
//! and the ability state are the only things that change. Ability state is
//! grouped by concern — boolean markers, one-shot spend markers, per-role
//! counters, persistent bonds, and per-night references — so invariants
//! stay local: the night pipeline clears [`NightState`] and the transient
//! condition bits wholesale instead of chasing individual fields.

use bitflags::bitflags;

use crate::role::{side_of, Role, Side};

/// Stable identifier of a participant for the whole session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PlayerId(pub u32);

impl std::fmt::Display for PlayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "p{}", self.0)
    }
}

bitflags! {
    /// Pure boolean markers on a player.
    ///
    /// Transient bits are cleared in bulk at fixed points: the night-scoped
    /// set at dusk, the day-scoped set at dawn. Permanent bits survive
    /// until death (and through it, for forensics).
    ///
    /// Serde support comes from the bitflags crate's own `serde` feature,
    /// enabled by this crate's `serde` feature.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct Conditions: u32 {
        // --- cleared every dusk ---
        /// Covered by a doctor, healer, or cell wall tonight.
        const PROTECTED      = 1 << 0;
        /// Locked in the jailer's cell tonight: role-blocked, unreachable.
        const JAILED         = 1 << 1;
        /// Sleeping through the night: role-blocked.
        const ASLEEP         = 1 << 2;
        /// Cannot nominate or vote today. Applied at dawn, cleared at the
        /// following dusk together with the other transient flags.
        const SILENCED       = 1 << 3;

        // --- scheduled during the day, applied at the following dusk ---
        const PENDING_SLEEP  = 1 << 4;
        const PENDING_SILENCE = 1 << 5;

        // --- permanent ---
        /// Alpha wolf's curse: counts for the wolves regardless of role.
        const CURSED         = 1 << 6;
        /// Dancing to the flutist's tune.
        const ENCHANTED      = 1 << 7;
        /// Carrying the superspreader's infection.
        const INFECTED       = 1 << 8;
        /// Holding a forged shield; consumed by the first night attack.
        const SHIELDED       = 1 << 9;
        /// Out of the game's flow (host marked absent); never solicited.
        const SPECTATING     = 1 << 10;
    }
}

impl Conditions {
    /// Bits cleared when night falls.
    pub const NIGHT_SCOPED: Conditions = Conditions::PROTECTED
        .union(Conditions::JAILED)
        .union(Conditions::ASLEEP)
        .union(Conditions::SILENCED);
}

bitflags! {
    /// Spend markers for abilities usable at most once per session.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct OneShots: u32 {
        /// Cursed villager's conversion into the pack.
        const CONVERSION      = 1 << 0;
        /// Alpha wolf's curse override.
        const ALPHA_CURSE     = 1 << 1;
        const HEAL_POTION     = 1 << 2;
        const KILL_POTION     = 1 << 3;
        /// Sandman's sleeping song.
        const SLEEP_SONG      = 1 << 4;
        /// Arbiter's objection.
        const OBJECTION       = 1 << 5;
        const MAYOR_REVEAL    = 1 << 6;
        const PRINCE_REVEAL   = 1 << 7;
        const PACIFIST_REVEAL = 1 << 8;
        /// Judge's secret phrase.
        const SECOND_ELECTION = 1 << 9;
        const MAID_SWAP       = 1 << 10;
        const TROUBLE_SWAP    = 1 << 11;
        const RAID            = 1 << 12;
        /// Medium's revival.
        const REVIVAL         = 1 << 13;
        const HOLY_WATER      = 1 << 14;
    }
}

/// Per-role numeric state.
///
/// `strikes` belongs to the player, not the role: it survives role swaps.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Counters {
    /// Gunner ammunition.
    pub bullets: u8,
    /// Cannibal hunger stacks.
    pub hunger: u8,
    /// Attacks a bodyguard has already thrown themselves in front of.
    pub interceptions: u8,
    /// Missed elections. Three strikes is an elimination.
    pub strikes: u8,
}

impl Counters {
    /// Fresh counters for a newly assumed role, preserving the strike
    /// count across swaps.
    pub fn for_role(role: Role, strikes: u8) -> Self {
        Counters {
            bullets: match role {
                Role::Gunner => 2,
                Role::MasterGunner => 3,
                _ => 0,
            },
            hunger: 0,
            interceptions: 0,
            strikes,
        }
    }
}

/// Persistent references this player holds to others.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Bonds {
    /// Wild child's role model.
    pub model: Option<PlayerId>,
    /// Head hunter's mark.
    pub mark: Option<PlayerId>,
    /// Observer-facing disguise woven by the shadow wolf. Seers read this
    /// instead of the real role while it holds.
    pub disguise: Option<Role>,
}

/// References valid for a single night, cleared at dusk.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NightState {
    /// Where the harlot or shaman went tonight.
    pub visiting: Option<PlayerId>,
    /// Who the bodyguard is shadowing tonight.
    pub guarding: Option<PlayerId>,
    /// Who sits in this jailer's cell tonight.
    pub jailing: Option<PlayerId>,
    /// Who the healer covered last night (consecutive-night restriction).
    pub last_healed: Option<PlayerId>,
}

/// Mutable per-game participant entity. Owned exclusively by
/// [`Game`](crate::state::Game); abilities read and write only through it.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    role: Role,
    /// Prior roles, oldest first; pushed before every reassignment.
    history: Vec<Role>,
    /// Life counter. Greater than zero is alive; the elder starts at two.
    lives: u8,
    pub conditions: Conditions,
    pub one_shots: OneShots,
    pub counters: Counters,
    pub bonds: Bonds,
    pub night: NightState,
    /// Role name shown on death instead of the real one, when a disguise
    /// was set to survive the reveal.
    reveal_override: Option<Role>,
}

impl Player {
    pub fn new(id: PlayerId, name: impl Into<String>, role: Role) -> Self {
        Player {
            id,
            name: name.into(),
            role,
            history: Vec::new(),
            lives: if role == Role::Elder { 2 } else { 1 },
            conditions: Conditions::empty(),
            one_shots: OneShots::empty(),
            counters: Counters::for_role(role, 0),
            bonds: Bonds::default(),
            night: NightState::default(),
            reveal_override: None,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn history(&self) -> &[Role] {
        &self.history
    }

    /// Atomic role swap: the old role is pushed to history before the new
    /// one lands, and role-scoped counters are re-seeded.
    pub fn assign_role(&mut self, role: Role) {
        self.history.push(self.role);
        self.role = role;
        self.counters = Counters::for_role(role, self.counters.strikes);
    }

    pub fn is_alive(&self) -> bool {
        self.lives > 0
    }

    pub fn lives(&self) -> u8 {
        self.lives
    }

    /// Removes one life. Returns `true` if this death stuck (the player is
    /// now dead), `false` if a spare life absorbed it. Calling this on a
    /// dead player is a defensive no-op.
    pub fn lose_life(&mut self) -> bool {
        if self.lives == 0 {
            return false;
        }
        self.lives -= 1;
        self.lives == 0
    }

    /// Resurrection creates a fresh alive state: one life, transient state
    /// dropped, permanent marks (curse, enchantment, infection) kept.
    pub fn revive(&mut self) {
        self.lives = 1;
        self.conditions &= !(Conditions::NIGHT_SCOPED
            | Conditions::PENDING_SLEEP
            | Conditions::PENDING_SILENCE);
        self.night = NightState::default();
    }

    pub fn side(&self) -> Side {
        side_of(self.role, self.conditions)
    }

    /// Alive and not role-blocked for the current night.
    pub fn can_act_tonight(&self) -> bool {
        self.is_alive()
            && !self
                .conditions
                .intersects(Conditions::JAILED | Conditions::ASLEEP | Conditions::SPECTATING)
    }

    /// Eligible to nominate and vote today.
    pub fn can_vote_today(&self) -> bool {
        self.is_alive()
            && !self
                .conditions
                .intersects(Conditions::SILENCED | Conditions::SPECTATING)
    }

    /// Spends a one-shot marker. Returns `false` if it was already used.
    pub fn try_spend(&mut self, shot: OneShots) -> bool {
        if self.one_shots.contains(shot) {
            return false;
        }
        self.one_shots.insert(shot);
        true
    }

    /// The role observers are told about: an active disguise first, then
    /// the innate misdirections, then the truth.
    pub fn apparent_role(&self) -> Role {
        if let Some(disguise) = self.bonds.disguise {
            return disguise;
        }
        match self.role {
            Role::Lycan => Role::Werewolf,
            Role::DireWolf => Role::Villager,
            other => other,
        }
    }

    /// The role name announced on death: the disguise-reveal override if
    /// one was set, otherwise the last role actually held.
    pub fn displayed_role(&self) -> Role {
        self.reveal_override.unwrap_or(self.role)
    }

    pub fn set_reveal_override(&mut self, role: Option<Role>) {
        self.reveal_override = role;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elder_survives_first_death() {
        let mut p = Player::new(PlayerId(1), "old-timer", Role::Elder);
        assert!(!p.lose_life());
        assert!(p.is_alive());
        assert!(p.lose_life());
        assert!(!p.is_alive());
        // Dead stays dead; no underflow, no zombie.
        assert!(!p.lose_life());
        assert_eq!(p.lives(), 0);
    }

    #[test]
    fn role_swap_pushes_history_and_reseeds_counters() {
        let mut p = Player::new(PlayerId(2), "maid", Role::Maid);
        p.counters.strikes = 2;
        p.assign_role(Role::Gunner);
        assert_eq!(p.role(), Role::Gunner);
        assert_eq!(p.history(), &[Role::Maid]);
        assert_eq!(p.counters.bullets, 2);
        assert_eq!(p.counters.strikes, 2, "strikes survive the swap");
    }

    #[test]
    fn displayed_role_round_trips_last_held_role() {
        let mut p = Player::new(PlayerId(3), "thief", Role::Thief);
        p.assign_role(Role::Werewolf);
        assert_eq!(p.displayed_role(), Role::Werewolf);
        p.set_reveal_override(Some(Role::Villager));
        assert_eq!(p.displayed_role(), Role::Villager);
    }

    #[test]
    fn apparent_role_prefers_disguise() {
        let mut p = Player::new(PlayerId(4), "wolf", Role::Werewolf);
        assert_eq!(p.apparent_role(), Role::Werewolf);
        p.bonds.disguise = Some(Role::Seer);
        assert_eq!(p.apparent_role(), Role::Seer);

        let lycan = Player::new(PlayerId(5), "lycan", Role::Lycan);
        assert_eq!(lycan.apparent_role(), Role::Werewolf);
    }

    #[test]
    fn revive_keeps_permanent_marks() {
        let mut p = Player::new(PlayerId(6), "victim", Role::Villager);
        p.conditions |= Conditions::ENCHANTED | Conditions::PROTECTED;
        p.lose_life();
        p.revive();
        assert!(p.is_alive());
        assert!(p.conditions.contains(Conditions::ENCHANTED));
        assert!(!p.conditions.contains(Conditions::PROTECTED));
    }
}
