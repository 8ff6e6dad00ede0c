//! Death application and cascades.
//!
//! Applying a death can trigger more deaths (lovers, fate bonds, the
//! hunter's parting shot) and non-lethal consequences (apprentice
//! inheritance, wild-child conversion, forced wins). Cascades resolve
//! breadth-first: a FIFO queue of newly-dead players, each fully processed
//! — companion deaths enqueued, triggers fired — before the next is taken.
//! The order is deterministic and documented here on purpose; nothing may
//! depend on incidental call order.

use std::collections::VecDeque;

use tracing::{debug, info};

use game_core::{Game, KillOutcome, KillerGroup, PlayerId, Role};

use crate::broker::{ActionBroker, Candidate, PickRequest};
use crate::channel::CommunicationChannel;
use crate::events::{EventBus, GameEvent};
use crate::session::SessionConfig;

/// Applies `seeds` and every knock-on death breadth-first. Returns the
/// players who actually died, in application order.
pub async fn apply_cascade<C: CommunicationChannel>(
    game: &mut Game,
    broker: &ActionBroker<C>,
    events: &EventBus,
    config: &SessionConfig,
    seeds: Vec<(PlayerId, KillerGroup)>,
) -> Vec<PlayerId> {
    let mut queue: VecDeque<(PlayerId, KillerGroup)> = seeds.into();
    let mut fallen = Vec::new();

    while let Some((target, group)) = queue.pop_front() {
        match game.kill(target, group) {
            KillOutcome::Ignored => continue,
            KillOutcome::Survived => {
                let _ = broker
                    .channel()
                    .send_to_actor(target, "You were struck down tonight — and got up again.")
                    .await;
                continue;
            }
            KillOutcome::Died => {}
        }
        fallen.push(target);

        let (name, revealed) = {
            let victim = game.player(target).expect("victim exists");
            (victim.name.clone(), victim.displayed_role())
        };
        info!(target: "session", victim = %target, role = %revealed, group = %group, "death applied");
        let _ = broker
            .channel()
            .broadcast(&format!("{name} is dead. They were a {revealed}."))
            .await;
        events.publish(GameEvent::PlayerDied {
            player: target,
            revealed,
            group,
        });

        run_triggers(game, broker, events, config, target, group, &mut queue).await;
    }

    fallen
}

/// Consequences of one applied death. Companion deaths are enqueued, not
/// applied, so the breadth-first order holds.
async fn run_triggers<C: CommunicationChannel>(
    game: &mut Game,
    broker: &ActionBroker<C>,
    events: &EventBus,
    config: &SessionConfig,
    victim: PlayerId,
    group: KillerGroup,
    queue: &mut VecDeque<(PlayerId, KillerGroup)>,
) {
    let victim_role = game
        .player(victim)
        .map(|p| p.role())
        .unwrap_or(Role::Villager);

    // Companions first: lovers, then fate bonds.
    for lover in game.lovers_of(victim) {
        if game.player(lover).is_some_and(|p| p.is_alive()) {
            queue.push_back((lover, KillerGroup::Heartbreak));
        }
    }
    for partner in game.fate_partners(victim) {
        if game.player(partner).is_some_and(|p| p.is_alive()) {
            queue.push_back((partner, KillerGroup::FateBound));
        }
    }

    match victim_role {
        // The seer's gift passes on.
        Role::Seer => {
            let heirs = game.holders_of(Role::ApprenticeSeer);
            if let Some(&heir) = heirs.first() {
                if let Some(p) = game.player_mut(heir) {
                    p.assign_role(Role::Seer);
                }
                let _ = broker
                    .channel()
                    .send_to_actor(heir, "The seer is gone. The sight is yours now.")
                    .await;
            }
        }
        // The pack hunts twice tomorrow night.
        Role::WolfCub => {
            game.cub_vengeance = true;
        }
        // Whoever dies, the hunter shoots on the way out.
        Role::Hunter => {
            let field: Vec<Candidate> = game
                .alive()
                .filter(|p| p.id != victim)
                .map(|p| Candidate {
                    id: p.id,
                    label: p.name.clone(),
                })
                .collect();
            if !field.is_empty() {
                let pick = broker
                    .solicit(PickRequest::one(
                        victim,
                        "Your hands are still warm. Take someone with you.",
                        field,
                        config.solicit_timeout,
                    ))
                    .await;
                if let Some(shot) = pick.first() {
                    queue.push_back((shot, KillerGroup::Hunter));
                }
            }
        }
        // The gallows are exactly what the jester wanted.
        Role::Jester if group == KillerGroup::Vote => {
            game.force_winner(victim);
        }
        _ => {}
    }

    // Wild children who lost their model join the pack.
    let orphans: Vec<PlayerId> = game
        .alive()
        .filter(|p| p.role() == Role::WildChild && p.bonds.model == Some(victim))
        .map(|p| p.id)
        .collect();
    for orphan in orphans {
        if let Some(p) = game.player_mut(orphan) {
            p.assign_role(Role::Werewolf);
        }
        events.publish(GameEvent::PlayerConverted { player: orphan });
        let _ = broker
            .channel()
            .send_to_actor(orphan, "Your role model is dead. The wolf in you wakes.")
            .await;
    }

    // Head hunters watching this mark.
    let watchers: Vec<PlayerId> = game
        .alive()
        .filter(|p| p.role() == Role::HeadHunter && p.bonds.mark == Some(victim))
        .map(|p| p.id)
        .collect();
    for watcher in watchers {
        if group == KillerGroup::Vote {
            game.force_winner(watcher);
            debug!(target: "session", hunter = %watcher, mark = %victim, "head hunter's mark was lynched");
        } else if let Some(p) = game.player_mut(watcher) {
            p.assign_role(Role::Villager);
            let _ = broker
                .channel()
                .send_to_actor(watcher, "Your mark died beyond your reach. The contract is void.")
                .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::InMemoryChannel;
    use game_core::GameMode;
    use std::sync::Arc;
    use std::time::Duration;

    fn fixture(roles: &[(&str, Role)]) -> Game {
        Game::new(
            GameMode::Classic,
            11,
            roles.iter().map(|(n, r)| (n.to_string(), *r)).collect(),
            vec![Role::Villager, Role::Villager],
        )
    }

    fn test_config() -> SessionConfig {
        SessionConfig {
            solicit_timeout: Duration::from_millis(20),
            ..SessionConfig::default()
        }
    }

    #[tokio::test]
    async fn lover_follows_breadth_first() {
        let mut game = fixture(&[
            ("anna", Role::Villager),
            ("bert", Role::Villager),
            ("cora", Role::Villager),
            ("dave", Role::Werewolf),
        ]);
        game.link_lovers(PlayerId(0), PlayerId(1));
        game.link_lovers(PlayerId(1), PlayerId(2));

        let (channel, _out) = InMemoryChannel::new();
        let broker = ActionBroker::new(Arc::clone(&channel));
        let events = EventBus::new(16);
        let config = test_config();

        let fallen = apply_cascade(
            &mut game,
            &broker,
            &events,
            &config,
            vec![(PlayerId(0), KillerGroup::Wolves)],
        )
        .await;

        // Breadth-first: anna, then her lover bert, then bert's lover cora.
        assert_eq!(fallen, vec![PlayerId(0), PlayerId(1), PlayerId(2)]);
        assert_eq!(
            game.killer_of(PlayerId(1)),
            Some(KillerGroup::Heartbreak)
        );
    }

    #[tokio::test]
    async fn seer_death_promotes_the_apprentice() {
        let mut game = fixture(&[
            ("seer", Role::Seer),
            ("pupil", Role::ApprenticeSeer),
            ("wolf", Role::Werewolf),
            ("anna", Role::Villager),
        ]);
        let (channel, _out) = InMemoryChannel::new();
        let broker = ActionBroker::new(Arc::clone(&channel));
        let events = EventBus::new(16);
        let config = test_config();

        apply_cascade(
            &mut game,
            &broker,
            &events,
            &config,
            vec![(PlayerId(0), KillerGroup::Wolves)],
        )
        .await;

        let pupil = game.player(PlayerId(1)).unwrap();
        assert_eq!(pupil.role(), Role::Seer);
        assert_eq!(pupil.history(), &[Role::ApprenticeSeer]);
    }

    #[tokio::test]
    async fn jester_lynch_forces_the_win_but_night_kill_does_not() {
        let mut game = fixture(&[
            ("jester", Role::Jester),
            ("wolf", Role::Werewolf),
            ("anna", Role::Villager),
        ]);
        let (channel, _out) = InMemoryChannel::new();
        let broker = ActionBroker::new(Arc::clone(&channel));
        let events = EventBus::new(16);
        let config = test_config();

        apply_cascade(
            &mut game,
            &broker,
            &events,
            &config,
            vec![(PlayerId(0), KillerGroup::Wolves)],
        )
        .await;
        assert_eq!(game.forced_winner(), None);

        let mut lynch_game = fixture(&[
            ("jester", Role::Jester),
            ("wolf", Role::Werewolf),
            ("anna", Role::Villager),
        ]);
        apply_cascade(
            &mut lynch_game,
            &broker,
            &events,
            &config,
            vec![(PlayerId(0), KillerGroup::Vote)],
        )
        .await;
        assert_eq!(lynch_game.forced_winner(), Some(PlayerId(0)));
    }

    #[tokio::test]
    async fn elder_survives_the_first_blow() {
        let mut game = fixture(&[
            ("elder", Role::Elder),
            ("wolf", Role::Werewolf),
            ("anna", Role::Villager),
        ]);
        let (channel, _out) = InMemoryChannel::new();
        let broker = ActionBroker::new(Arc::clone(&channel));
        let events = EventBus::new(16);
        let config = test_config();

        let fallen = apply_cascade(
            &mut game,
            &broker,
            &events,
            &config,
            vec![(PlayerId(0), KillerGroup::Wolves)],
        )
        .await;
        assert!(fallen.is_empty());
        assert!(game.player(PlayerId(0)).unwrap().is_alive());
    }
}
