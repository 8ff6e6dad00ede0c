//! Role identities and the static catalog.
//!
//! `Role` is an immutable identity; a player's *current* role can change
//! (thief, raider, maid, and troublemaker all reassign it), but every value
//! here keeps its team classification, description, and availability
//! metadata for the whole session. All catalog lookups are total functions
//! over the enum so new roles cannot be added without the compiler pointing
//! at every table that needs a row.

pub mod side;

pub use side::{side_of, Side};

use rand::Rng;

/// Win-condition grouping a role belongs to by default.
///
/// Loners carry their own [`LonerKind`] so the side derivation and the win
/// evaluator can distinguish the seven solo agendas without string matching.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Team {
    Villagers,
    Wolves,
    Loner(LonerKind),
}

/// Solo agendas that win outside the two main teams.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LonerKind {
    WhiteWolf,
    SerialKiller,
    Cannibal,
    Jester,
    HeadHunter,
    Flutist,
    Superspreader,
}

/// Supported game modes. Availability checks and minimum player counts
/// differ per mode; everything else is identical.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
    strum::EnumIter,
)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum GameMode {
    /// The traditional set. Excludes the more chaotic late additions.
    #[default]
    Classic,
    /// Short sessions. Excludes roles that need several cycles to matter.
    Quick,
    /// Everything is on the table.
    Chaos,
}

impl GameMode {
    /// Minimum roster size a session in this mode accepts.
    pub fn min_players(self) -> usize {
        match self {
            GameMode::Classic | GameMode::Quick => 5,
            GameMode::Chaos => 8,
        }
    }
}

/// An advanced form of a base role, offered at session start to actors
/// whose progression level reaches the threshold.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AdvancedVariant {
    pub role: Role,
    pub required_level: u32,
}

/// Every role the engine knows about.
///
/// Naming is stable: the snake_case form produced by strum is the token the
/// explicit-role-list parser accepts, and the one reported back verbatim
/// when unrecognized.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
    strum::EnumIter,
)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Role {
    // ========================================================================
    // Village — no night power
    // ========================================================================
    Villager,
    /// Votes are counted, but the drunk's nominations are ignored.
    Drunk,
    /// Learns who the seer is on the first night.
    Beholder,
    /// Masons know each other from the first night.
    Mason,
    /// Starts with two lives; the first death is survived.
    Elder,
    /// May reveal when lynched to cancel the vote against them, once.
    Prince,
    /// May reveal during the day to cancel the entire vote, once.
    Pacifist,
    /// May reveal during the day; any nomination against the mayor that day
    /// is struck, and only the mayor's own nominations stand.
    Mayor,
    /// Vote counts double in every election.
    Sheriff,
    /// Knows the secret phrase that triggers a second election, once.
    Judge,
    /// May object during nomination, aborting the day's vote entirely, once.
    Arbiter,

    // ========================================================================
    // Village — day powers
    // ========================================================================
    /// Bets holy water on a player, once: a wolf dies, anyone else kills
    /// the priest instead.
    Priest,
    /// Forges one shield per night and hands it out the next day. A shield
    /// absorbs one night attack.
    Forger,
    /// Two bullets. Shooting is public and immediate.
    Gunner,
    /// Advanced gunner: three bullets.
    MasterGunner,
    /// Takes one victim along when dying, any cause.
    Hunter,

    // ========================================================================
    // Village — setup and swap powers
    // ========================================================================
    /// Pairs two lovers on the first night.
    Cupid,
    /// Picks a role model on the first night; if the model dies, the wild
    /// child becomes a werewolf.
    WildChild,
    /// Chooses one of the two reserve roles on the first night.
    Thief,
    /// May take the role of the player just lynched, once.
    Maid,
    /// May swap the roles of two other players during the night, once.
    Troublemaker,
    /// May raid a player's role at night, leaving them a plain villager,
    /// once.
    Raider,

    // ========================================================================
    // Village — information
    // ========================================================================
    /// Learns one player's exact role each night.
    Seer,
    /// Learns one player's aura (good or evil) each night.
    AuraSeer,
    /// Advanced aura seer: learns the exact role.
    Clairvoyant,
    /// Compares two players each night: same team or not.
    Detective,
    /// Thinks they are the seer. The answers are made up.
    Fool,
    /// Inherits the seer's gift when the seer dies.
    ApprenticeSeer,

    // ========================================================================
    // Village — protection and recovery
    // ========================================================================
    /// Protects one player per night from night attacks.
    Doctor,
    /// Shadows one player per night; intercepts the first attack and
    /// survives it, dies intercepting a second.
    Bodyguard,
    /// Advanced bodyguard: survives every interception.
    GuardianAngel,
    /// Jails one player per night: the prisoner cannot act and cannot be
    /// attacked. Keeps a two-way line into the cell.
    Jailer,
    /// Protects one player per night, never the same player twice in a row.
    Healer,
    /// One healing potion, one poison. Each usable once.
    Witch,
    /// Speaks with the dead every night and may revive one of them, once.
    Medium,
    /// May begin a ritual over a dead player: the resurrection fires two
    /// cycles later, even if the ritualist is gone by then.
    Ritualist,
    /// May send one player into deep sleep for the coming night, once.
    Sandman,
    /// Silences one player each night; the target cannot nominate or vote
    /// the next day.
    Spellcaster,

    // ========================================================================
    // Village — visits
    // ========================================================================
    /// Visits a player at night. Visiting a victim or a wolf is fatal;
    /// being attacked at home while away is not.
    Harlot,
    /// Communes with a player at night: a death due that night is undone,
    /// and the two fates are bound for the rest of the game.
    Shaman,

    // ========================================================================
    // Village — tainted
    // ========================================================================
    /// A villager until the pack attacks: then joins it instead of dying.
    Cursed,
    /// A villager whose aura reads wolf. Seers are not told the difference.
    Lycan,

    // ========================================================================
    // Wolf pack
    // ========================================================================
    Werewolf,
    /// Advanced werewolf: reads as a villager to every seer.
    DireWolf,
    /// Leads the pack. Once per game may curse the chosen victim into the
    /// pack instead of killing them.
    AlphaWolf,
    /// Hunts ahead of the pack: grants a second, disjoint kill while no
    /// wolf-aligned player has died this game.
    Prowler,
    /// The pack avenges a dead cub with an extra kill the following night.
    WolfCub,
    /// Weaves a disguise over one pack member each night; seers read the
    /// disguise instead of the role.
    ShadowWolf,
    /// Wolf-aligned diviner. Does not wake with the pack; hunts seers for
    /// them instead.
    Sorcerer,

    // ========================================================================
    // Loners
    // ========================================================================
    /// Runs with the pack, wins alone. Eats a wolf every second night.
    WhiteWolf,
    /// Kills every night. The pack's teeth cannot pierce them.
    SerialKiller,
    /// Hunger grows every quiet night; a feast devours one victim per
    /// accumulated stack.
    Cannibal,
    /// Wins by getting lynched.
    Jester,
    /// Assigned a mark at the start; wins if the mark is lynched. Becomes a
    /// villager if the mark dies any other way.
    HeadHunter,
    /// Enchants up to two players per night; wins once every other living
    /// player is enchanted.
    Flutist,
    /// Infects one player per night; wins once every other living player is
    /// infected.
    Superspreader,
}

impl Role {
    /// Team classification this role starts on.
    pub fn team(self) -> Team {
        use Role::*;
        match self {
            Werewolf | DireWolf | AlphaWolf | Prowler | WolfCub | ShadowWolf | Sorcerer => {
                Team::Wolves
            }
            WhiteWolf => Team::Loner(LonerKind::WhiteWolf),
            SerialKiller => Team::Loner(LonerKind::SerialKiller),
            Cannibal => Team::Loner(LonerKind::Cannibal),
            Jester => Team::Loner(LonerKind::Jester),
            HeadHunter => Team::Loner(LonerKind::HeadHunter),
            Flutist => Team::Loner(LonerKind::Flutist),
            Superspreader => Team::Loner(LonerKind::Superspreader),
            _ => Team::Villagers,
        }
    }

    /// Whether this role wakes with the pack at night.
    ///
    /// The sorcerer is wolf-aligned but never joins the huddle; the white
    /// wolf runs with the pack despite winning alone.
    pub fn wakes_with_pack(self) -> bool {
        matches!(
            self,
            Role::Werewolf
                | Role::DireWolf
                | Role::AlphaWolf
                | Role::Prowler
                | Role::WolfCub
                | Role::ShadowWolf
                | Role::WhiteWolf
        )
    }

    /// Members of the capped "special wolf" set. Extras beyond the
    /// player-count-dependent maximum are demoted to plain werewolves.
    pub fn is_special_wolf(self) -> bool {
        matches!(
            self,
            Role::AlphaWolf
                | Role::DireWolf
                | Role::Prowler
                | Role::WolfCub
                | Role::ShadowWolf
                | Role::Sorcerer
        )
    }

    /// Roles the generic seer slot can resolve to.
    pub fn is_seer_like(self) -> bool {
        matches!(self, Role::Seer | Role::AuraSeer | Role::Detective)
    }

    /// Roles that may appear more than once in a roster. Everything else is
    /// capped at one copy.
    pub fn allows_duplicates(self) -> bool {
        matches!(self, Role::Villager | Role::Werewolf | Role::Mason)
    }

    /// Roles that only enter play as an advanced upgrade, never from the
    /// base template.
    pub fn is_advanced(self) -> bool {
        matches!(
            self,
            Role::DireWolf | Role::MasterGunner | Role::GuardianAngel | Role::Clairvoyant
        )
    }

    /// The upgraded form of this role, if one exists, and the progression
    /// level required to choose it.
    pub fn advanced_variant(self) -> Option<AdvancedVariant> {
        let (role, required_level) = match self {
            Role::Werewolf => (Role::DireWolf, 10),
            Role::Gunner => (Role::MasterGunner, 5),
            Role::Bodyguard => (Role::GuardianAngel, 8),
            Role::AuraSeer => (Role::Clairvoyant, 12),
            _ => return None,
        };
        Some(AdvancedVariant {
            role,
            required_level,
        })
    }

    /// Whether a roster in `mode` may contain this role.
    pub fn available_in(self, mode: GameMode) -> bool {
        if self.is_advanced() {
            // Advanced forms are reachable only through progression.
            return false;
        }
        match mode {
            GameMode::Classic => !matches!(
                self,
                Role::Superspreader
                    | Role::Raider
                    | Role::Troublemaker
                    | Role::Sandman
                    | Role::Arbiter
            ),
            GameMode::Quick => !matches!(
                self,
                Role::Ritualist
                    | Role::Medium
                    | Role::Flutist
                    | Role::Superspreader
                    | Role::Cannibal
                    | Role::WildChild
                    | Role::Judge
            ),
            GameMode::Chaos => true,
        }
    }

    /// Team-equivalent substitute used when a role is unavailable for the
    /// active mode.
    pub fn fallback(self) -> Role {
        match self.team() {
            Team::Wolves => Role::Werewolf,
            // A disabled loner has no team mate to stand in; the slot
            // becomes a villager and the ratio pass rebalances afterwards.
            Team::Villagers | Team::Loner(_) => Role::Villager,
        }
    }

    /// One-line description shown to the role holder at assignment.
    pub fn description(self) -> &'static str {
        use Role::*;
        match self {
            Villager => "An ordinary villager. Your weapon is your vote.",
            Drunk => "You vote with conviction, but nobody takes your nominations seriously.",
            Beholder => "You know who the seer is. Keep them alive.",
            Mason => "You know your fellow masons, and they know you.",
            Elder => "Age has made you tough. The first death will not take you.",
            Prince => "Royal blood. Reveal it once to walk away from the gallows.",
            Pacifist => "Reveal yourself once to stop a lynch before it starts.",
            Mayor => "Reveal your office once to strike your accusers and run the floor.",
            Sheriff => "Your vote counts twice.",
            Judge => "Speak the secret phrase and the village votes again.",
            Arbiter => "Object once, and the day's vote is stricken from the record.",
            Priest => "One vial of holy water. Wolves burn; the innocent burn you.",
            Forger => "Each night at the anvil yields a shield for someone, come morning.",
            Gunner => "Two bullets, in broad daylight.",
            MasterGunner => "Three bullets, and you never miss.",
            Hunter => "When you go down, someone goes with you.",
            Cupid => "On the first night, two hearts become one fate.",
            WildChild => "Choose a role model. If they die, the wolf in you wakes.",
            Thief => "Two spare cards lie face down. Take one.",
            Maid => "When the gallows fall you may take up the condemned one's mantle.",
            Troublemaker => "Once, in the dark, you may swap two sleepers' lives.",
            Raider => "Once, in the dark, you may steal what someone else was.",
            Seer => "Each night, one player's true role.",
            AuraSeer => "Each night, one player's aura: good or evil.",
            Clairvoyant => "Each night, one player's exact role, aura and all.",
            Detective => "Each night, two players: same side, or not.",
            Fool => "Each night, a vision. The visions are lies.",
            ApprenticeSeer => "When the seer falls, their gift passes to you.",
            Doctor => "Each night, one patient is safe from harm.",
            Bodyguard => "Shadow someone. You can survive one blade meant for them.",
            GuardianAngel => "Shadow someone. No blade meant for them can touch you.",
            Jailer => "Each night one player sits in your cell: silenced, but safe.",
            Healer => "Each night one patient is safe, never the same one twice.",
            Witch => "Two potions: one restores a life, one takes it.",
            Medium => "The dead speak to you, and once, one of them may answer in person.",
            Ritualist => "Begin the rite over a corpse; in two cycles it breathes again.",
            Sandman => "Once, you may sing a player into dreamless sleep for a night.",
            Spellcaster => "Each night, one player wakes up mute.",
            Harlot => "Visit whom you like. Some doors are better left unknocked.",
            Shaman => "Commune with a soul; a death undone binds your fates together.",
            Cursed => "A villager, until the pack's bite makes you one of them.",
            Lycan => "Innocent, but every seer will swear otherwise.",
            Werewolf => "Hunt with the pack each night.",
            DireWolf => "Hunt with the pack. Seers read you as an innocent.",
            AlphaWolf => "Lead the pack. Once, curse the prey into the fold instead.",
            Prowler => "While the pack is unbloodied, you hunt a second trail.",
            WolfCub => "If you die, the pack hunts twice the following night.",
            ShadowWolf => "Each night, dress one wolf in an innocent's shape.",
            Sorcerer => "Divine for the pack. Find the seer before the seer finds them.",
            WhiteWolf => "Run with the pack, win alone. Every second night, thin the pack.",
            SerialKiller => "Kill nightly. The wolves' teeth cannot reach you.",
            Cannibal => "Hunger mounts each quiet night. Feasts are proportional.",
            Jester => "Win by swinging from the gallows.",
            HeadHunter => "Your mark must hang by the village's hand, not yours.",
            Flutist => "Enchant the village, two souls a night, until all dance.",
            Superspreader => "One cough a night. Win when everyone is sick.",
        }
    }

    /// Resolves the generic seer slot by weighted random choice.
    pub fn roll_seer_like<R: Rng + ?Sized>(rng: &mut R) -> Role {
        match rng.gen_range(0..10u8) {
            0..=4 => Role::Seer,
            5..=7 => Role::AuraSeer,
            _ => Role::Detective,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn every_role_has_description_and_team() {
        for role in Role::iter() {
            assert!(!role.description().is_empty(), "{role} missing description");
            // team() is total by construction; exercise it anyway.
            let _ = role.team();
        }
    }

    #[test]
    fn special_wolves_are_wolf_team() {
        for role in Role::iter().filter(|r| r.is_special_wolf()) {
            assert_eq!(role.team(), Team::Wolves, "{role} must be wolf team");
        }
    }

    #[test]
    fn advanced_variants_are_advanced_only() {
        for role in Role::iter() {
            if let Some(adv) = role.advanced_variant() {
                assert!(adv.role.is_advanced());
                assert_eq!(adv.role.team(), role.team(), "{role} upgrade changes team");
                assert!(adv.required_level > 0);
            }
        }
    }

    #[test]
    fn advanced_roles_never_roster_eligible() {
        for mode in GameMode::iter() {
            for role in Role::iter().filter(|r| r.is_advanced()) {
                assert!(!role.available_in(mode));
            }
        }
    }

    #[test]
    fn role_tokens_round_trip() {
        for role in Role::iter() {
            let token = role.to_string();
            assert_eq!(token.parse::<Role>().unwrap(), role);
        }
    }

    #[test]
    fn fallback_preserves_team_for_main_teams() {
        for role in Role::iter() {
            match role.team() {
                Team::Wolves => assert_eq!(role.fallback().team(), Team::Wolves),
                Team::Villagers => assert_eq!(role.fallback().team(), Team::Villagers),
                Team::Loner(_) => assert_eq!(role.fallback(), Role::Villager),
            }
        }
    }
}
