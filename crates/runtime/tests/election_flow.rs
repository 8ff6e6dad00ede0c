//! Day election behavior: plurality lynches, exact ties spare, the jester
//! steals the win from the gallows.

mod common;

use common::session_with;
use game_core::{PlayerId, Role, Verdict};
use runtime::{GameEvent, Outbound};

/// Scenario C, first half: two nominees at 3 votes to 2, no sheriff — the
/// 3-vote player hangs.
#[tokio::test]
async fn three_to_two_plurality_lynches() {
    let (mut session, channel, mut outbound) = session_with(
        &["wulf", "piper", "quinn", "anna", "bert"],
        &[
            Role::Werewolf,
            Role::Villager,
            Role::Villager,
            Role::Villager,
            Role::Villager,
        ],
    );
    let mut events = session.events();

    let driver = tokio::spawn(async move {
        let _ = session.run().await;
    });

    let puppet = tokio::spawn(async move {
        while let Some(out) = outbound.recv().await {
            let text = out.text().to_string();
            if matches!(out, Outbound::Broadcast { .. }) && text.contains("Nominations are open") {
                channel.say(PlayerId(1), "nominate anna");
                channel.say(PlayerId(2), "nominate bert");
            }
            if text.contains("The village votes") {
                // 3 for anna, 2 for bert.
                for (voter, choice) in [
                    (PlayerId(0), "anna"),
                    (PlayerId(1), "anna"),
                    (PlayerId(2), "anna"),
                    (PlayerId(3), "bert"),
                    (PlayerId(4), "bert"),
                ] {
                    if out.addressed_to(voter) {
                        channel.say(voter, choice);
                    }
                }
            }
        }
    });

    let mut lynched = None;
    while let Ok(event) = events.recv().await {
        if let GameEvent::LynchResult { victim } = event {
            lynched = victim;
            break;
        }
    }
    driver.abort();
    puppet.abort();

    assert_eq!(lynched, Some(PlayerId(3)), "anna takes the 3-2 vote");
}

/// Scenario C, second half: an exact 2-2 tie produces no lynch.
#[tokio::test]
async fn exact_tie_lynches_nobody() {
    let (mut session, channel, mut outbound) = session_with(
        &["wulf", "piper", "quinn", "anna", "bert"],
        &[
            Role::Werewolf,
            Role::Villager,
            Role::Villager,
            Role::Villager,
            Role::Villager,
        ],
    );
    let mut events = session.events();

    let driver = tokio::spawn(async move {
        let _ = session.run().await;
    });

    let puppet = tokio::spawn(async move {
        while let Some(out) = outbound.recv().await {
            let text = out.text().to_string();
            if matches!(out, Outbound::Broadcast { .. }) && text.contains("Nominations are open") {
                channel.say(PlayerId(1), "nominate anna");
                channel.say(PlayerId(2), "nominate bert");
            }
            if text.contains("The village votes") {
                // 2 for anna, 2 for bert, quinn abstains.
                for (voter, choice) in [
                    (PlayerId(0), "anna"),
                    (PlayerId(1), "anna"),
                    (PlayerId(3), "bert"),
                    (PlayerId(4), "bert"),
                ] {
                    if out.addressed_to(voter) {
                        channel.say(voter, choice);
                    }
                }
            }
        }
    });

    let mut lynched = Some(PlayerId(99));
    while let Ok(event) = events.recv().await {
        if let GameEvent::LynchResult { victim } = event {
            lynched = victim;
            break;
        }
    }
    driver.abort();
    puppet.abort();

    assert_eq!(lynched, None, "a 2-2 tie spares everyone");
}

/// Scenario D: lynching the jester hands them the win immediately,
/// bypassing every side check.
#[tokio::test]
async fn lynched_jester_steals_the_win() {
    let (mut session, channel, mut outbound) = session_with(
        &["wulf", "jens", "piper", "anna", "bert"],
        &[
            Role::Werewolf,
            Role::Jester,
            Role::Villager,
            Role::Villager,
            Role::Villager,
        ],
    );

    let driver = tokio::spawn(async move {
        let verdict = session.run().await;
        (verdict, session)
    });

    let puppet = tokio::spawn(async move {
        while let Some(out) = outbound.recv().await {
            let text = out.text().to_string();
            if matches!(out, Outbound::Broadcast { .. }) && text.contains("Nominations are open") {
                // A single nominee needs no runoff.
                channel.say(PlayerId(2), "nominate jens");
            }
        }
    });

    let (verdict, session) = driver.await.unwrap();
    puppet.abort();

    assert_eq!(verdict.unwrap(), Verdict::Player(PlayerId(1)));
    assert!(!session.game().player(PlayerId(1)).unwrap().is_alive());
    assert_eq!(session.game().forced_winner(), Some(PlayerId(1)));
}
