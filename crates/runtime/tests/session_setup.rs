//! First-night setup: roster validation, the thief's swap, cupid's pair.

mod common;

use std::sync::Arc;

use common::{fast_config, session_with};
use game_core::{GameMode, PlayerId, Role, RosterError};
use runtime::{GameSession, InMemoryChannel, NoProgression, SessionError};

/// A malformed explicit roster is rejected before the session exists —
/// nothing is announced, no state is created.
#[test]
fn oversized_role_list_fails_before_session_creation() {
    let (channel, _outbound) = InMemoryChannel::new();
    let result = GameSession::create(
        GameMode::Classic,
        7,
        vec!["a".into(), "b".into(), "c".into(), "d".into(), "e".into()],
        Some(vec![Role::Villager; 10]),
        channel,
        Arc::new(NoProgression),
        fast_config(),
    );
    let error = match result {
        Err(error) => error,
        Ok(_) => panic!("an oversized role list must not create a session"),
    };
    match error {
        SessionError::Roster(RosterError::TooManyRoles { requested, capacity }) => {
            assert_eq!((requested, capacity), (10, 7));
        }
        other => panic!("expected a roster error, got {other}"),
    }
}

/// The thief swaps into the first reserve card and is told the new role.
#[tokio::test]
async fn thief_takes_a_reserve_card() {
    let (mut session, channel, mut outbound) = session_with(
        &["wulf", "tess", "piper", "anna", "bert"],
        &[
            Role::Werewolf,
            Role::Thief,
            Role::Villager,
            Role::Villager,
            Role::Villager,
            // Reserve: the thief pool.
            Role::Seer,
            Role::Hunter,
        ],
    );
    let thief = PlayerId(1);

    let driver = tokio::spawn(async move {
        let _ = session.run().await;
    });

    let mut swapped = false;
    while let Some(out) = outbound.recv().await {
        let text = out.text().to_string();
        if out.addressed_to(thief) && text.contains("Two cards lie face down") {
            channel.say(thief, "1");
        }
        if out.addressed_to(thief) && text.contains("You are now the seer") {
            swapped = true;
            break;
        }
    }
    driver.abort();
    assert!(swapped, "thief should assume the first reserve role");
}

/// Cupid binds two hearts and both lovers are told.
#[tokio::test]
async fn cupid_links_two_lovers() {
    let (mut session, channel, mut outbound) = session_with(
        &["wulf", "cupid", "piper", "anna", "bert"],
        &[
            Role::Werewolf,
            Role::Cupid,
            Role::Villager,
            Role::Villager,
            Role::Villager,
        ],
    );
    let cupid = PlayerId(1);
    let (piper, anna) = (PlayerId(2), PlayerId(3));

    let driver = tokio::spawn(async move {
        let _ = session.run().await;
    });

    let mut letters = 0;
    while let Some(out) = outbound.recv().await {
        let text = out.text().to_string();
        if out.addressed_to(cupid) && text.contains("Bind two hearts") {
            channel.say(cupid, "piper");
            channel.say(cupid, "anna");
        }
        if (out.addressed_to(piper) || out.addressed_to(anna))
            && text.contains("Your heart now beats for")
        {
            letters += 1;
            if letters == 2 {
                break;
            }
        }
    }
    driver.abort();
    assert_eq!(letters, 2, "both lovers should receive the letter");
}
