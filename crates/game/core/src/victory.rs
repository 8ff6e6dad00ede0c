//! Win evaluation.
//!
//! Evaluated after every death or transform. Pure over the current roster
//! state: calling it twice without mutating the game returns the same
//! verdict. Rule order is fixed; the first match wins.

use crate::role::{Role, Side};
use crate::state::{Conditions, Game, PlayerId};

/// A concrete session outcome.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Verdict {
    /// A whole side takes the win.
    Side(Side),
    /// A single player takes the win (forced winners, sole survivors,
    /// enchant-all and infect-all stealers).
    Player(PlayerId),
    /// A love chain covering every survivor.
    Lovers(Vec<PlayerId>),
    /// Nobody left to win.
    Nobody,
}

/// Returns the winner, or `None` while the game goes on.
///
/// Order of evaluation:
/// 1. a forced winner or forced side set by a win-stealing role,
/// 2. the empty-roster draw and the sole-survivor default,
/// 3. a love chain equal to the set of survivors,
/// 4. enchant-all / infect-all solo stealers (ahead of the team checks,
///    so they pre-empt a simultaneous "good triumphs"),
/// 5. the villager clearance,
/// 6. the wolf parity win, blocked while any solo killer survives.
pub fn evaluate(game: &Game) -> Option<Verdict> {
    if let Some(winner) = game.forced_winner() {
        return Some(Verdict::Player(winner));
    }
    if let Some(side) = game.forced_side() {
        return Some(Verdict::Side(side));
    }

    let living: Vec<&_> = game.alive().collect();
    match living.len() {
        0 => return Some(Verdict::Nobody),
        1 => return Some(Verdict::Player(living[0].id)),
        _ => {}
    }

    // Love chain covering every survivor. Guarded on an actual love link
    // so a lone pairless survivor set never reads as a lovers' win.
    for player in &living {
        if game.lovers_of(player.id).is_empty() {
            continue;
        }
        let chain = game.love_chain(player.id);
        if living.iter().all(|p| chain.contains(&p.id)) {
            let mut winners: Vec<PlayerId> =
                living.iter().map(|p| p.id).filter(|id| chain.contains(id)).collect();
            winners.sort();
            return Some(Verdict::Lovers(winners));
        }
    }

    // Solo stealers: every *other* survivor must carry the mark.
    for player in &living {
        let mark = match player.role() {
            Role::Flutist => Conditions::ENCHANTED,
            Role::Superspreader => Conditions::INFECTED,
            _ => continue,
        };
        if living
            .iter()
            .filter(|p| p.id != player.id)
            .all(|p| p.conditions.contains(mark))
        {
            return Some(Verdict::Player(player.id));
        }
    }

    let wolves = living.iter().filter(|p| p.side().is_wolf_aligned()).count();
    let villagers = living
        .iter()
        .filter(|p| p.side().is_villager_aligned())
        .count();
    let solo_killers = living.iter().filter(|p| p.side().is_solo_killer()).count();
    let cannibal_or_sk = living
        .iter()
        .filter(|p| matches!(p.side(), Side::SerialKiller | Side::Cannibal))
        .count();

    if wolves == 0 && cannibal_or_sk == 0 {
        return Some(Verdict::Side(Side::Villagers));
    }

    if wolves >= villagers && solo_killers == 0 {
        return Some(Verdict::Side(Side::Wolves));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::role::GameMode;
    use crate::state::KillerGroup;

    fn game_with(roles: &[(&str, Role)]) -> Game {
        Game::new(
            GameMode::Classic,
            1,
            roles
                .iter()
                .map(|(n, r)| (n.to_string(), *r))
                .collect(),
            vec![Role::Villager, Role::Villager],
        )
    }

    #[test]
    fn no_winner_while_both_teams_stand() {
        let game = game_with(&[
            ("wolf", Role::Werewolf),
            ("seer", Role::Seer),
            ("doc", Role::Doctor),
            ("anna", Role::Villager),
        ]);
        assert_eq!(evaluate(&game), None);
        // Idempotent without mutation.
        assert_eq!(evaluate(&game), None);
    }

    #[test]
    fn zero_alive_is_a_draw_and_one_alive_wins_by_default() {
        let mut game = game_with(&[("wolf", Role::Werewolf), ("anna", Role::Villager)]);
        game.kill(PlayerId(0), KillerGroup::Vote);
        assert_eq!(evaluate(&game), Some(Verdict::Player(PlayerId(1))));
        game.kill(PlayerId(1), KillerGroup::Wolves);
        assert_eq!(evaluate(&game), Some(Verdict::Nobody));
    }

    #[test]
    fn forced_winner_preempts_everything() {
        let mut game = game_with(&[
            ("jester", Role::Jester),
            ("wolf", Role::Werewolf),
            ("anna", Role::Villager),
        ]);
        game.kill(PlayerId(0), KillerGroup::Vote);
        game.force_winner(PlayerId(0));
        assert_eq!(evaluate(&game), Some(Verdict::Player(PlayerId(0))));
    }

    #[test]
    fn lovers_covering_all_survivors_preempt_team_wins() {
        let mut game = game_with(&[
            ("wolf", Role::Werewolf),
            ("anna", Role::Villager),
            ("bert", Role::Villager),
        ]);
        game.link_lovers(PlayerId(0), PlayerId(1));
        game.kill(PlayerId(2), KillerGroup::Wolves);
        assert_eq!(
            evaluate(&game),
            Some(Verdict::Lovers(vec![PlayerId(0), PlayerId(1)]))
        );
    }

    #[test]
    fn villagers_win_when_threats_are_gone() {
        let mut game = game_with(&[
            ("wolf", Role::Werewolf),
            ("seer", Role::Seer),
            ("anna", Role::Villager),
        ]);
        game.kill(PlayerId(0), KillerGroup::Vote);
        assert_eq!(evaluate(&game), Some(Verdict::Side(Side::Villagers)));
    }

    #[test]
    fn wolf_parity_win_blocked_by_surviving_solo_killer() {
        let mut game = game_with(&[
            ("wolf", Role::Werewolf),
            ("anna", Role::Villager),
            ("sk", Role::SerialKiller),
        ]);
        // One wolf vs one villager is parity, but the serial killer blocks.
        assert_eq!(evaluate(&game), None);
        game.kill(PlayerId(2), KillerGroup::Wolves);
        assert_eq!(evaluate(&game), Some(Verdict::Side(Side::Wolves)));
    }

    #[test]
    fn jester_alive_does_not_block_villager_win() {
        let mut game = game_with(&[
            ("wolf", Role::Werewolf),
            ("jester", Role::Jester),
            ("anna", Role::Villager),
        ]);
        game.kill(PlayerId(0), KillerGroup::Vote);
        assert_eq!(evaluate(&game), Some(Verdict::Side(Side::Villagers)));
    }

    #[test]
    fn flutist_wins_when_all_others_enchanted() {
        let mut game = game_with(&[
            ("flutist", Role::Flutist),
            ("wolf", Role::Werewolf),
            ("anna", Role::Villager),
        ]);
        assert_eq!(evaluate(&game), None);
        for id in [PlayerId(1), PlayerId(2)] {
            game.player_mut(id).unwrap().conditions |= Conditions::ENCHANTED;
        }
        assert_eq!(evaluate(&game), Some(Verdict::Player(PlayerId(0))));
    }

    #[test]
    fn cursed_player_counts_for_the_wolves() {
        let mut game = game_with(&[
            ("wolf", Role::Werewolf),
            ("anna", Role::Villager),
            ("bert", Role::Villager),
        ]);
        assert_eq!(evaluate(&game), None);
        game.player_mut(PlayerId(1)).unwrap().conditions |= Conditions::CURSED;
        // Two wolf-aligned against one villager: parity reached.
        assert_eq!(evaluate(&game), Some(Verdict::Side(Side::Wolves)));
    }
}
