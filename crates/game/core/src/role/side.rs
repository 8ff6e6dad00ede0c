//! Side derivation.
//!
//! `Side` is the win-condition grouping. It is computed, never stored: a
//! total lookup over [`Role`] plus a small number of flag-based overrides,
//! so a role swap or a curse is reflected the moment it lands.

use super::{LonerKind, Role, Team};
use crate::state::Conditions;

/// Win-condition grouping of a living player.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::AsRefStr,
    strum::EnumIter,
)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[strum(serialize_all = "snake_case")]
pub enum Side {
    Villagers,
    Wolves,
    WhiteWolf,
    Flutist,
    Superspreader,
    Jester,
    HeadHunter,
    SerialKiller,
    Cannibal,
}

impl Side {
    /// Sides counted as wolves for the parity win. The white wolf hunts
    /// with the pack even though it wins alone.
    pub fn is_wolf_aligned(self) -> bool {
        matches!(self, Side::Wolves | Side::WhiteWolf)
    }

    /// Sides whose survival blocks both the villager and the wolf win.
    pub fn is_solo_killer(self) -> bool {
        matches!(self, Side::SerialKiller | Side::Cannibal | Side::WhiteWolf)
    }

    /// Counted toward the villager tally in the parity win.
    pub fn is_villager_aligned(self) -> bool {
        matches!(self, Side::Villagers)
    }
}

impl LonerKind {
    pub fn side(self) -> Side {
        match self {
            LonerKind::WhiteWolf => Side::WhiteWolf,
            LonerKind::SerialKiller => Side::SerialKiller,
            LonerKind::Cannibal => Side::Cannibal,
            LonerKind::Jester => Side::Jester,
            LonerKind::HeadHunter => Side::HeadHunter,
            LonerKind::Flutist => Side::Flutist,
            LonerKind::Superspreader => Side::Superspreader,
        }
    }
}

/// Derives the side of a player holding `role` with `conditions` set.
///
/// The alpha wolf's curse overrides everything: a cursed player counts for
/// the wolves no matter what card they still hold.
pub fn side_of(role: Role, conditions: Conditions) -> Side {
    if conditions.contains(Conditions::CURSED) {
        return Side::Wolves;
    }
    match role.team() {
        Team::Wolves => Side::Wolves,
        Team::Villagers => Side::Villagers,
        Team::Loner(kind) => kind.side(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn side_of_is_total_over_every_role() {
        for role in Role::iter() {
            let side = side_of(role, Conditions::empty());
            match role.team() {
                Team::Wolves => assert_eq!(side, Side::Wolves, "{role}"),
                Team::Villagers => assert_eq!(side, Side::Villagers, "{role}"),
                Team::Loner(kind) => assert_eq!(side, kind.side(), "{role}"),
            }
        }
    }

    #[test]
    fn curse_forces_wolves_for_every_role() {
        for role in Role::iter() {
            assert_eq!(side_of(role, Conditions::CURSED), Side::Wolves, "{role}");
        }
    }

    #[test]
    fn white_wolf_is_wolf_aligned_and_solo() {
        let side = side_of(Role::WhiteWolf, Conditions::empty());
        assert!(side.is_wolf_aligned());
        assert!(side.is_solo_killer());
        assert!(!side.is_villager_aligned());
    }
}
