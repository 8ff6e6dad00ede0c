//! The top-level orchestrator.
//!
//! One `GameSession` per room, constructed by the host with its transport
//! and progression store — there is no global registry. The session owns
//! the [`Game`], drives roster assignment once, runs the first-night
//! choices, then alternates the night and day pipelines until a verdict
//! lands. Unrecoverable stage errors tear down every relay before they
//! surface, so a dead session never leaves a live line behind.

use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::broadcast;
use tokio::time::{timeout, Instant};
use tracing::{error, info};

use game_core::{
    evaluate, Game, GameMode, Phase, PlayerId, Role, RosterBuilder, Team, Verdict,
};

use crate::api::Result;
use crate::broker::{ActionBroker, Candidate, PickRequest};
use crate::channel::{CommunicationChannel, ProgressionStore};
use crate::day::DayPipeline;
use crate::events::{EventBus, GameEvent};
use crate::night::NightPipeline;
use crate::relay::RelaySet;

/// Timings and buffer sizes for one session. Tests shrink every window to
/// milliseconds; production hosts keep the defaults.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Deadline for a single targeted solicitation.
    pub solicit_timeout: Duration,
    /// Open floor for day nominations.
    pub nomination_window: Duration,
    /// Deadline for one ballot, day or pack.
    pub ballot_timeout: Duration,
    /// The pack's free-form deliberation window.
    pub wolf_chat_window: Duration,
    /// Breathing room after announcements.
    pub read_delay: Duration,
    /// Event bus capacity.
    pub event_buffer: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            solicit_timeout: Duration::from_secs(60),
            nomination_window: Duration::from_secs(90),
            ballot_timeout: Duration::from_secs(45),
            wolf_chat_window: Duration::from_secs(120),
            read_delay: Duration::from_secs(5),
            event_buffer: 128,
        }
    }
}

/// One running game.
pub struct GameSession<C: CommunicationChannel> {
    game: Game,
    broker: ActionBroker<C>,
    events: EventBus,
    relays: RelaySet,
    config: SessionConfig,
    progression: Arc<dyn ProgressionStore>,
}

impl<C: CommunicationChannel> GameSession<C> {
    /// Builds the roster and the session. Roster errors (too many explicit
    /// roles, below the mode minimum) surface here, before anything is
    /// announced; the session is never created in that case.
    pub fn create(
        mode: GameMode,
        seed: u64,
        names: Vec<String>,
        explicit_roles: Option<Vec<Role>>,
        channel: Arc<C>,
        progression: Arc<dyn ProgressionStore>,
        config: SessionConfig,
    ) -> Result<Self> {
        let mut rng = StdRng::seed_from_u64(seed);
        let roster = RosterBuilder::new(mode).build(names.len(), explicit_roles, &mut rng)?;
        let assignments: Vec<(String, Role)> = names
            .into_iter()
            .zip(roster.playing().iter().copied())
            .collect();
        let game = Game::new(mode, seed, assignments, roster.reserve().to_vec());

        Ok(GameSession {
            game,
            broker: ActionBroker::new(channel),
            events: EventBus::new(config.event_buffer),
            relays: RelaySet::default(),
            config,
            progression,
        })
    }

    /// Host-facing event stream.
    pub fn events(&self) -> broadcast::Receiver<GameEvent> {
        self.events.subscribe()
    }

    /// Read access for hosts and tests.
    pub fn game(&self) -> &Game {
        &self.game
    }

    /// Runs the session to its verdict. Teardown of background relays is
    /// unconditional: it happens on the way out whether the game finished
    /// or a stage failed.
    pub async fn run(&mut self) -> Result<Verdict> {
        let outcome = self.run_to_verdict().await;
        if let Err(teardown) = self.relays.shutdown_all().await {
            error!(target: "session", error = %teardown, "relay teardown failed");
        }
        match outcome {
            Ok(verdict) => {
                self.game.phase = Phase::Finished;
                info!(target: "session", ?verdict, "game over");
                self.events.publish(GameEvent::GameEnded {
                    verdict: verdict.clone(),
                });
                let _ = self
                    .broker
                    .channel()
                    .broadcast(&verdict_announcement(&self.game, &verdict))
                    .await;
                Ok(verdict)
            }
            Err(error) => {
                error!(target: "session", %error, "session aborted");
                self.events.publish(GameEvent::Aborted {
                    reason: error.to_string(),
                });
                Err(error)
            }
        }
    }

    async fn run_to_verdict(&mut self) -> Result<Verdict> {
        self.setup().await?;
        loop {
            let deaths = NightPipeline::new(
                &mut self.game,
                &self.broker,
                &self.events,
                &mut self.relays,
                &self.config,
            )
            .run()
            .await?;

            let verdict = DayPipeline::new(
                &mut self.game,
                &self.broker,
                &self.events,
                &mut self.relays,
                &self.config,
                deaths,
            )
            .run()
            .await?;

            if let Some(verdict) = verdict {
                return Ok(verdict);
            }
            // A night of conversions can decide the game before any day
            // event does; the day pipeline checks per stage, this covers
            // the loop boundary.
            if let Some(verdict) = evaluate(&self.game) {
                return Ok(verdict);
            }
        }
    }

    // ========================================================================
    // First-night setup
    // ========================================================================

    async fn setup(&mut self) -> Result<()> {
        self.events.publish(GameEvent::RosterAssigned {
            players: self.game.players().count(),
        });
        let _ = self
            .broker
            .channel()
            .broadcast("Roles are dealt. Check your whispers.")
            .await;

        // Role cards.
        let cards: Vec<(PlayerId, String)> = self
            .game
            .players()
            .map(|p| {
                (
                    p.id,
                    format!("You are the {}. {}", p.role(), p.role().description()),
                )
            })
            .collect();
        for (id, card) in cards {
            let _ = self.broker.channel().send_to_actor(id, &card).await;
        }

        self.offer_advanced_variants().await;
        self.run_thieves().await;
        self.run_cupids().await;
        self.run_wild_children().await;
        self.assign_head_hunter_marks().await;
        self.share_opening_knowledge().await;
        Ok(())
    }

    /// One advanced-variant offer per eligible player, gated by the
    /// progression store.
    async fn offer_advanced_variants(&mut self) {
        let eligible: Vec<(PlayerId, Role, game_core::AdvancedVariant)> = self
            .game
            .players()
            .filter_map(|p| Some((p.id, p.role(), p.role().advanced_variant()?)))
            .collect();
        for (id, base, advanced) in eligible {
            if self.progression.level(id, base).await < advanced.required_level {
                continue;
            }
            let pick = self
                .broker
                .solicit(PickRequest::one(
                    id,
                    format!("Your experience unlocks an advanced form of the {base}."),
                    vec![Candidate {
                        id,
                        label: format!("Take up the {}", advanced.role),
                    }],
                    self.config.solicit_timeout,
                ))
                .await;
            if pick.first() == Some(id) {
                if let Some(p) = self.game.player_mut(id) {
                    p.assign_role(advanced.role);
                }
                let card = format!(
                    "You are now the {}. {}",
                    advanced.role,
                    advanced.role.description()
                );
                let _ = self.broker.channel().send_to_actor(id, &card).await;
            }
        }
    }

    /// The thief chooses from the two face-down reserve roles. If both are
    /// wolves, one must be taken.
    async fn run_thieves(&mut self) {
        let thieves = self.game.holders_of(Role::Thief);
        for thief in thieves {
            let reserve = self.game.reserve().to_vec();
            if reserve.is_empty() {
                continue;
            }
            let must_take = reserve.iter().all(|r| r.team() == Team::Wolves);
            let mut menu = String::from("Two cards lie face down:");
            for (i, role) in reserve.iter().enumerate() {
                menu.push_str(&format!("\n  {}) the {role}", i + 1));
            }
            menu.push_str(if must_take {
                "\nBoth cards are wolves. You must take one."
            } else {
                "\nReply with a number to swap, or 'pass' to stay the thief."
            });
            // Subscribe before the cards are shown so the reply cannot race
            // past us.
            let inbound = self.broker.channel().subscribe();
            if self
                .broker
                .channel()
                .send_to_actor(thief, &menu)
                .await
                .is_err()
            {
                continue;
            }

            let chosen = self
                .await_reserve_choice(inbound, thief, reserve.len())
                .await;
            let index = match (chosen, must_take) {
                (Some(index), _) => index,
                // Forced swap defaults to the first card on a timeout.
                (None, true) => 0,
                (None, false) => continue,
            };
            let current = self
                .game
                .player(thief)
                .map(|p| p.role())
                .unwrap_or(Role::Thief);
            let Some(taken) = self.game.take_reserve(index, current) else { continue };
            if let Some(p) = self.game.player_mut(thief) {
                p.assign_role(taken);
            }
            let card = format!("You are now the {taken}. {}", taken.description());
            let _ = self.broker.channel().send_to_actor(thief, &card).await;
        }
    }

    /// Waits for a 1-based reserve index from the thief.
    async fn await_reserve_choice(
        &self,
        mut inbound: broadcast::Receiver<crate::channel::Inbound>,
        thief: PlayerId,
        slots: usize,
    ) -> Option<usize> {
        let deadline = Instant::now() + self.config.solicit_timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return None;
            }
            let message = match timeout(remaining, inbound.recv()).await {
                Err(_) => return None,
                Ok(Err(_)) => return None,
                Ok(Ok(message)) => message,
            };
            if message.from != thief {
                continue;
            }
            let text = message.text.trim();
            if text.eq_ignore_ascii_case("pass") {
                return None;
            }
            match text.parse::<usize>() {
                Ok(n) if (1..=slots).contains(&n) => return Some(n - 1),
                _ => {
                    let _ = self
                        .broker
                        .channel()
                        .send_to_actor(thief, "Pick a card by number, or 'pass'.")
                        .await;
                }
            }
        }
    }

    async fn run_cupids(&mut self) {
        let cupids = self.game.holders_of(Role::Cupid);
        for cupid in cupids {
            let field: Vec<Candidate> = self
                .game
                .alive()
                .filter(|p| p.id != cupid)
                .map(|p| Candidate {
                    id: p.id,
                    label: p.name.clone(),
                })
                .collect();
            let pick = self
                .broker
                .solicit(
                    PickRequest::one(
                        cupid,
                        "Bind two hearts together.",
                        field,
                        self.config.solicit_timeout,
                    )
                    .many(2),
                )
                .await;
            let targets = pick.targets();
            if targets.len() < 2 {
                continue;
            }
            let (a, b) = (targets[0], targets[1]);
            self.game.link_lovers(a, b);
            for (lover, partner) in [(a, b), (b, a)] {
                let line = self
                    .game
                    .player(partner)
                    .map(|p| format!("Your heart now beats for {}. Their fate is yours.", p.name));
                if let Some(line) = line {
                    let _ = self.broker.channel().send_to_actor(lover, &line).await;
                }
            }
        }
    }

    async fn run_wild_children(&mut self) {
        let picks: Vec<(PlayerId, Option<PlayerId>)> = {
            let children = self.game.holders_of(Role::WildChild);
            let mut picks = Vec::new();
            for child in children {
                let field: Vec<Candidate> = self
                    .game
                    .alive()
                    .filter(|p| p.id != child)
                    .map(|p| Candidate {
                        id: p.id,
                        label: p.name.clone(),
                    })
                    .collect();
                let pick = self
                    .broker
                    .solicit(PickRequest::one(
                        child,
                        "Choose your role model.",
                        field,
                        self.config.solicit_timeout,
                    ))
                    .await;
                picks.push((child, pick.first()));
            }
            picks
        };
        for (child, model) in picks {
            let Some(model) = model else { continue };
            if let Some(p) = self.game.player_mut(child) {
                p.bonds.model = Some(model);
            }
        }
    }

    /// The head hunter's mark is dealt, not chosen.
    async fn assign_head_hunter_marks(&mut self) {
        let hunters = self.game.holders_of(Role::HeadHunter);
        for hunter in hunters {
            let others: Vec<PlayerId> = self
                .game
                .alive()
                .filter(|p| p.id != hunter)
                .map(|p| p.id)
                .collect();
            if others.is_empty() {
                continue;
            }
            let mut rng = StdRng::seed_from_u64(self.game.seed ^ u64::from(hunter.0));
            let mark = others[rng.gen_range(0..others.len())];
            if let Some(p) = self.game.player_mut(hunter) {
                p.bonds.mark = Some(mark);
            }
            let line = self
                .game
                .player(mark)
                .map(|p| format!("Your mark is {}. They must hang by the village's hand.", p.name));
            if let Some(line) = line {
                let _ = self.broker.channel().send_to_actor(hunter, &line).await;
            }
        }
    }

    /// Start-of-game knowledge: masons meet, the beholder learns the seer,
    /// the judge receives the phrase.
    async fn share_opening_knowledge(&mut self) {
        let masons: Vec<(PlayerId, String)> = self
            .game
            .alive()
            .filter(|p| p.role() == Role::Mason)
            .map(|p| (p.id, p.name.clone()))
            .collect();
        if masons.len() > 1 {
            let ids: Vec<PlayerId> = masons.iter().map(|(id, _)| *id).collect();
            let names: Vec<&str> = masons.iter().map(|(_, n)| n.as_str()).collect();
            let line = format!("The lodge knows its own: {}.", names.join(", "));
            let _ = self.broker.channel().send_to_group(&ids, &line).await;
        }

        if let Some(seer) = self.game.alive().find(|p| p.role() == Role::Seer) {
            let line = format!("You behold the seer: it is {}.", seer.name);
            let beholders: Vec<PlayerId> = self.game.holders_of(Role::Beholder);
            for beholder in beholders {
                let _ = self.broker.channel().send_to_actor(beholder, &line).await;
            }
        }

        for judge in self.game.holders_of(Role::Judge) {
            let _ = self
                .broker
                .channel()
                .send_to_actor(
                    judge,
                    "Speak 'the verdict stands unread' during nominations to call a second election.",
                )
                .await;
        }
    }
}

fn verdict_announcement(game: &Game, verdict: &Verdict) -> String {
    match verdict {
        Verdict::Side(side) => format!("The game is over. Victory for the {side}!"),
        Verdict::Player(id) => {
            let name = game
                .player(*id)
                .map(|p| p.name.clone())
                .unwrap_or_else(|| id.to_string());
            format!("The game is over. {name} stands alone in victory!")
        }
        Verdict::Lovers(ids) => {
            let names: Vec<String> = ids
                .iter()
                .filter_map(|id| game.player(*id).map(|p| p.name.clone()))
                .collect();
            format!("Love conquers all: {} win together!", names.join(" and "))
        }
        Verdict::Nobody => "The village is silent. Nobody wins.".to_string(),
    }
}
