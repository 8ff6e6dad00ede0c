//! Night resolution against a scripted pack and protectors.

mod common;

use common::session_with;
use game_core::{KillerGroup, PlayerId, Role, Side, Verdict};
use runtime::{GameEvent, Outbound};

/// Scenario A: five players, the wolf kills the seer on night one with no
/// protection active. The seer shows up in the day recap, the villager
/// count drops, and — with the puppet wolf eating a villager every night —
/// the pack reaches parity and wins.
#[tokio::test]
async fn unprotected_seer_dies_and_wolves_eat_to_parity() {
    let (mut session, channel, mut outbound) = session_with(
        &["wulf", "selene", "doris", "anna", "bert"],
        &[
            Role::Werewolf,
            Role::Seer,
            Role::Doctor,
            Role::Villager,
            Role::Villager,
        ],
    );
    let mut events = session.events();
    let wolf = PlayerId(0);

    let driver = tokio::spawn(async move {
        let verdict = session.run().await;
        (verdict, session)
    });

    // Puppet wolf: always nominate the first living non-wolf, always vote
    // for the sole nomination. The doctor never answers, so no protection
    // is ever active.
    let puppet = tokio::spawn(async move {
        let mut prey = vec!["selene", "doris", "anna", "bert"];
        while let Some(out) = outbound.recv().await {
            let text = out.text().to_string();
            if matches!(out, Outbound::Broadcast { .. }) && text.contains("is dead") {
                prey.retain(|name| !text.contains(name));
            }
            if out.addressed_to(wolf) && text.contains("name prey") {
                if let Some(next) = prey.first() {
                    channel.say(wolf, format!("nominate {next}"));
                }
            }
            if out.addressed_to(wolf) && text.contains("The pack votes") {
                channel.say(wolf, "1");
            }
        }
    });

    let mut deaths = Vec::new();
    while let Ok(event) = events.recv().await {
        match event {
            GameEvent::PlayerDied {
                player,
                revealed,
                group,
            } => deaths.push((player, revealed, group)),
            GameEvent::GameEnded { .. } => break,
            _ => {}
        }
    }

    let (verdict, session) = driver.await.unwrap();
    puppet.abort();

    // The seer died first, to the wolves, revealed as the seer.
    assert_eq!(
        deaths.first().copied(),
        Some((PlayerId(1), Role::Seer, KillerGroup::Wolves))
    );
    // One villager fell per night until parity: three deaths, all wolves'.
    assert_eq!(deaths.len(), 3);
    assert!(deaths.iter().all(|(_, _, g)| *g == KillerGroup::Wolves));
    assert_eq!(session.game().alive().count(), 2);
    assert_eq!(verdict.unwrap(), Verdict::Side(Side::Wolves));
}

/// Scenario B: the doctor covers the only player the pack targets; the
/// pending list is empty entering the day and no death is announced.
#[tokio::test]
async fn doctor_protection_empties_the_pending_list() {
    let (mut session, channel, mut outbound) = session_with(
        &["wulf", "selene", "doris", "anna", "bert"],
        &[
            Role::Werewolf,
            Role::Seer,
            Role::Doctor,
            Role::Villager,
            Role::Villager,
        ],
    );
    let mut events = session.events();
    let (wolf, doctor) = (PlayerId(0), PlayerId(2));

    let driver = tokio::spawn(async move {
        let _ = session.run().await;
    });

    let quiet_night = tokio::spawn(async move {
        let mut saw_quiet_dawn = false;
        while let Some(out) = outbound.recv().await {
            let text = out.text().to_string();
            if out.addressed_to(wolf) && text.contains("name prey") {
                channel.say(wolf, "nominate selene");
            }
            if out.addressed_to(wolf) && text.contains("The pack votes") {
                channel.say(wolf, "1");
            }
            if out.addressed_to(doctor) && text.contains("watch over") {
                channel.say(doctor, "selene");
            }
            if matches!(out, Outbound::Broadcast { .. })
                && text.contains("without a single death")
            {
                saw_quiet_dawn = true;
                break;
            }
        }
        saw_quiet_dawn
    });

    let saw_quiet_dawn = quiet_night.await.unwrap();
    assert!(saw_quiet_dawn, "dawn recap should report no deaths");

    // Nothing died before the quiet dawn.
    driver.abort();
    while let Ok(event) = events.try_recv() {
        assert!(
            !matches!(event, GameEvent::PlayerDied { .. }),
            "no death should be announced on a protected night"
        );
    }
}
