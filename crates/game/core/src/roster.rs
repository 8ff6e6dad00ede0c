//! Roster construction.
//!
//! Given a player count, a mode, and an optional explicit role list, the
//! builder produces a balanced slate of exactly `n + 2` roles — the two
//! extras form the thief reserve and are never held by a live player at
//! start. Randomness comes in through the caller's RNG so rosters replay
//! deterministically from a session seed.

use rand::Rng;

use crate::config::GameConfig;
use crate::role::{GameMode, Role, Team};

/// Errors surfaced before any randomization happens.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RosterError {
    #[error("{mode} needs at least {minimum} players, got {requested}")]
    TooFewPlayers {
        mode: GameMode,
        requested: usize,
        minimum: usize,
    },

    #[error("requested {requested} roles but the slate only holds {capacity}")]
    TooManyRoles { requested: usize, capacity: usize },

    #[error("unrecognized role tokens: {}", .0.join(", "))]
    UnknownRoles(Vec<String>),
}

/// A finished slate: the first `players` slots are dealt out, the rest is
/// the reserve.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Roster {
    roles: Vec<Role>,
    players: usize,
}

impl Roster {
    /// Roles actually dealt to participants, in seat order.
    pub fn playing(&self) -> &[Role] {
        &self.roles[..self.players]
    }

    /// The thief pool.
    pub fn reserve(&self) -> &[Role] {
        &self.roles[self.players..]
    }
}

/// A base-template slot: either a concrete role or a broad category
/// resolved by weighted random choice at build time.
#[derive(Clone, Copy, Debug)]
enum Slot {
    Fixed(Role),
    SeerLike,
}

/// The fixed base template. Order encodes priority: a roster of `n`
/// players takes the first `n + 2` entries before the corrective passes.
const BASE_TEMPLATE: &[Slot] = &[
    Slot::Fixed(Role::Werewolf),
    Slot::SeerLike,
    Slot::Fixed(Role::Doctor),
    Slot::Fixed(Role::Villager),
    Slot::Fixed(Role::Hunter),
    Slot::Fixed(Role::Werewolf),
    Slot::Fixed(Role::Cupid),
    Slot::Fixed(Role::Witch),
    Slot::Fixed(Role::Villager),
    Slot::Fixed(Role::Jailer),
    Slot::Fixed(Role::AlphaWolf),
    Slot::Fixed(Role::Gunner),
    Slot::Fixed(Role::Harlot),
    Slot::Fixed(Role::Cursed),
    Slot::Fixed(Role::Jester),
    Slot::Fixed(Role::Werewolf),
    Slot::Fixed(Role::Bodyguard),
    Slot::Fixed(Role::Medium),
    Slot::Fixed(Role::Mason),
    Slot::Fixed(Role::Mason),
    Slot::Fixed(Role::Sorcerer),
    Slot::Fixed(Role::Prince),
    Slot::Fixed(Role::WildChild),
    Slot::Fixed(Role::SerialKiller),
    Slot::Fixed(Role::Elder),
    Slot::Fixed(Role::WolfCub),
    Slot::Fixed(Role::Priest),
    Slot::Fixed(Role::Sheriff),
    Slot::Fixed(Role::Flutist),
    Slot::Fixed(Role::Forger),
    Slot::Fixed(Role::ShadowWolf),
    Slot::Fixed(Role::Judge),
    Slot::Fixed(Role::Shaman),
    Slot::Fixed(Role::Cannibal),
    Slot::Fixed(Role::Pacifist),
    Slot::Fixed(Role::Prowler),
    Slot::Fixed(Role::Ritualist),
    Slot::Fixed(Role::HeadHunter),
    Slot::Fixed(Role::Maid),
    Slot::Fixed(Role::Beholder),
    Slot::Fixed(Role::WhiteWolf),
    Slot::Fixed(Role::Healer),
    Slot::Fixed(Role::ApprenticeSeer),
    Slot::Fixed(Role::Spellcaster),
    Slot::Fixed(Role::Drunk),
    Slot::Fixed(Role::Werewolf),
    Slot::Fixed(Role::Troublemaker),
    Slot::Fixed(Role::Fool),
    Slot::Fixed(Role::Lycan),
    Slot::Fixed(Role::Thief),
    Slot::Fixed(Role::Raider),
    Slot::Fixed(Role::Sandman),
    Slot::Fixed(Role::Arbiter),
    Slot::Fixed(Role::Mayor),
    Slot::Fixed(Role::Superspreader),
];

/// Parses a comma-separated explicit role list. Every unrecognized token
/// is reported back verbatim; nothing is guessed.
pub fn parse_role_list(input: &str) -> Result<Vec<Role>, RosterError> {
    let mut roles = Vec::new();
    let mut unknown = Vec::new();
    for token in input.split(',') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        match token.parse::<Role>() {
            Ok(role) => roles.push(role),
            Err(_) => unknown.push(token.to_string()),
        }
    }
    if unknown.is_empty() {
        Ok(roles)
    } else {
        Err(RosterError::UnknownRoles(unknown))
    }
}

/// Builds balanced slates for one mode.
#[derive(Clone, Copy, Debug)]
pub struct RosterBuilder {
    mode: GameMode,
}

impl RosterBuilder {
    pub fn new(mode: GameMode) -> Self {
        RosterBuilder { mode }
    }

    /// Produces a slate of exactly `n + 2` roles for `n` players.
    ///
    /// An explicit role list seeds the slate and is padded from the base
    /// template; lists longer than the slate are rejected before any
    /// randomization. Four corrective passes then run in order: mode
    /// availability, uniqueness and special-wolf caps, wolf-ratio
    /// enforcement, and the team-presence guarantee.
    pub fn build<R: Rng + ?Sized>(
        &self,
        n: usize,
        explicit: Option<Vec<Role>>,
        rng: &mut R,
    ) -> Result<Roster, RosterError> {
        let minimum = GameConfig::MIN_PLAYERS.max(self.mode.min_players());
        if n < minimum {
            return Err(RosterError::TooFewPlayers {
                mode: self.mode,
                requested: n,
                minimum,
            });
        }
        let capacity = n + GameConfig::RESERVE_SLOTS;

        let mut slate = match explicit {
            Some(requested) if requested.len() > capacity => {
                return Err(RosterError::TooManyRoles {
                    requested: requested.len(),
                    capacity,
                });
            }
            Some(requested) => requested,
            None => Vec::new(),
        };

        // Pad (or fill) from the template, resolving category slots.
        let mut template = BASE_TEMPLATE.iter().cycle().enumerate();
        while slate.len() < capacity {
            let (i, slot) = template.next().expect("cycled template never ends");
            let role = match slot {
                Slot::Fixed(role) => {
                    // Past one full template lap, alternate filler keeps
                    // the ratio pass close to its target.
                    if i >= BASE_TEMPLATE.len() {
                        if i % 4 == 0 {
                            Role::Werewolf
                        } else {
                            Role::Villager
                        }
                    } else {
                        *role
                    }
                }
                Slot::SeerLike => Role::roll_seer_like(rng),
            };
            slate.push(role);
        }

        self.substitute_unavailable(&mut slate);
        self.enforce_caps(&mut slate, n);
        self.enforce_wolf_ratio(&mut slate, n);
        self.guarantee_presence(&mut slate, n);

        Ok(Roster {
            roles: slate,
            players: n,
        })
    }

    /// Pass (a): roles the mode disables become their team-equivalent
    /// fallback.
    fn substitute_unavailable(&self, slate: &mut [Role]) {
        for role in slate.iter_mut() {
            if !role.available_in(self.mode) {
                *role = role.fallback();
            }
        }
    }

    /// Pass (b): uniqueness caps and the special-wolf cap. Duplicate
    /// uniques collapse to their team default; special wolves beyond the
    /// player-count-dependent maximum become plain werewolves.
    fn enforce_caps(&self, slate: &mut [Role], n: usize) {
        let mut seen = std::collections::HashSet::new();
        for role in slate.iter_mut() {
            if !role.allows_duplicates() && !seen.insert(*role) {
                *role = match role.team() {
                    Team::Wolves => Role::Werewolf,
                    Team::Villagers | Team::Loner(_) => Role::Villager,
                };
            }
        }

        let cap = GameConfig::max_special_wolves(n);
        let mut specials = 0usize;
        for role in slate.iter_mut() {
            if role.is_special_wolf() {
                specials += 1;
                if specials > cap {
                    *role = Role::Werewolf;
                }
            }
        }
    }

    /// Pass (c): the wolf-team count over the dealt slots must equal
    /// `clamp(n/4, 1, 6)`. Excess wolves demote to villagers from the back
    /// (always keeping at least one wolf); shortfalls promote villagers.
    fn enforce_wolf_ratio(&self, slate: &mut [Role], n: usize) {
        let target = GameConfig::wolf_target(n);
        let dealt = &mut slate[..n];

        let count = |dealt: &[Role]| {
            dealt
                .iter()
                .filter(|r| r.team() == Team::Wolves)
                .count()
        };

        while count(dealt) > target.max(1) {
            // Demote plain werewolves first so the pack keeps its teeth.
            let victim = dealt
                .iter()
                .rposition(|r| *r == Role::Werewolf)
                .or_else(|| dealt.iter().rposition(|r| r.team() == Team::Wolves));
            match victim {
                Some(i) => dealt[i] = Role::Villager,
                None => break,
            }
        }

        while count(dealt) < target {
            let candidate = dealt
                .iter()
                .rposition(|r| *r == Role::Villager)
                .or_else(|| dealt.iter().rposition(|r| r.team() == Team::Villagers));
            match candidate {
                Some(i) => dealt[i] = Role::Werewolf,
                None => break,
            }
        }
    }

    /// Pass (d): at least one wolf-team and one villager-team role among
    /// the dealt slots, swapping with the reserve if that is where they
    /// ended up.
    fn guarantee_presence(&self, slate: &mut [Role], n: usize) {
        for team in [Team::Wolves, Team::Villagers] {
            let present = slate[..n].iter().any(|r| r.team() == team);
            if present {
                continue;
            }
            if let Some(reserve_idx) = slate[n..].iter().position(|r| r.team() == team) {
                // Swap the stranded role with a slot the other team can
                // spare: the last dealt slot not of the missing team.
                if let Some(dealt_idx) = slate[..n].iter().rposition(|r| r.team() != team) {
                    slate.swap(dealt_idx, n + reserve_idx);
                    continue;
                }
            }
            // Nothing to swap in: overwrite the last dealt slot.
            slate[n - 1] = match team {
                Team::Wolves => Role::Werewolf,
                _ => Role::Villager,
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use strum::IntoEnumIterator;

    #[test]
    fn slate_shape_holds_for_every_mode_and_count() {
        for mode in GameMode::iter() {
            let builder = RosterBuilder::new(mode);
            for n in mode.min_players()..=24 {
                let mut rng = StdRng::seed_from_u64(n as u64);
                let roster = builder.build(n, None, &mut rng).unwrap();
                assert_eq!(roster.playing().len(), n, "{mode} n={n}");
                assert_eq!(roster.reserve().len(), GameConfig::RESERVE_SLOTS);

                let wolves = roster
                    .playing()
                    .iter()
                    .filter(|r| r.team() == Team::Wolves)
                    .count();
                assert_eq!(wolves, GameConfig::wolf_target(n), "{mode} n={n}");
                assert!(
                    roster
                        .playing()
                        .iter()
                        .any(|r| r.team() == Team::Villagers),
                    "{mode} n={n} lacks a villager"
                );
            }
        }
    }

    #[test]
    fn mode_disabled_roles_never_survive_into_the_slate() {
        let builder = RosterBuilder::new(GameMode::Quick);
        for n in 5..=20 {
            let mut rng = StdRng::seed_from_u64(1000 + n as u64);
            let roster = builder.build(n, None, &mut rng).unwrap();
            for role in roster.playing().iter().chain(roster.reserve()) {
                assert!(
                    role.available_in(GameMode::Quick),
                    "quick roster contains {role}"
                );
            }
        }
    }

    #[test]
    fn special_wolves_respect_the_cap() {
        let builder = RosterBuilder::new(GameMode::Chaos);
        for n in 8..=24 {
            let mut rng = StdRng::seed_from_u64(n as u64);
            let roster = builder.build(n, None, &mut rng).unwrap();
            let specials = roster
                .playing()
                .iter()
                .chain(roster.reserve())
                .filter(|r| r.is_special_wolf())
                .count();
            assert!(specials <= GameConfig::max_special_wolves(n), "n={n}");
        }
    }

    #[test]
    fn oversized_explicit_list_is_rejected_before_randomization() {
        let builder = RosterBuilder::new(GameMode::Classic);
        let mut rng = StdRng::seed_from_u64(0);
        let too_many = vec![Role::Villager; 9];
        let err = builder.build(6, Some(too_many), &mut rng).unwrap_err();
        assert_eq!(
            err,
            RosterError::TooManyRoles {
                requested: 9,
                capacity: 8
            }
        );
    }

    #[test]
    fn too_few_players_is_rejected_per_mode() {
        let builder = RosterBuilder::new(GameMode::Chaos);
        let mut rng = StdRng::seed_from_u64(0);
        let err = builder.build(6, None, &mut rng).unwrap_err();
        assert!(matches!(err, RosterError::TooFewPlayers { minimum: 8, .. }));
    }

    #[test]
    fn explicit_roles_seed_the_slate() {
        let builder = RosterBuilder::new(GameMode::Classic);
        let mut rng = StdRng::seed_from_u64(3);
        let roster = builder
            .build(
                5,
                Some(vec![
                    Role::Werewolf,
                    Role::Seer,
                    Role::Doctor,
                    Role::Villager,
                    Role::Villager,
                ]),
                &mut rng,
            )
            .unwrap();
        assert_eq!(roster.playing()[0], Role::Werewolf);
        assert_eq!(roster.playing()[1], Role::Seer);
        assert_eq!(roster.playing().len(), 5);
    }

    #[test]
    fn parse_reports_unknown_tokens_verbatim() {
        let err = parse_role_list("seer, wolfman, doctor, banshee").unwrap_err();
        assert_eq!(
            err,
            RosterError::UnknownRoles(vec!["wolfman".into(), "banshee".into()])
        );

        let roles = parse_role_list("seer, werewolf , doctor").unwrap();
        assert_eq!(roles, vec![Role::Seer, Role::Werewolf, Role::Doctor]);
    }
}
