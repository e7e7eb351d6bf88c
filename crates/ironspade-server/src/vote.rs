// vote.rs — vote coordinator
//
// One active vote globally. The kinds are a closed set, dispatched as an
// enum. Each active vote owns a short-lived timer thread that feeds
// Tick/Timeout events back to the tick thread over a channel; all vote
// state lives on the tick thread.

use crossbeam::channel::{bounded, Receiver, Sender};
use ironspade_common::config::VotingConfig;
use rand::seq::SliceRandom;
use std::collections::HashMap;
use std::time::{Duration, Instant};

const STATUS_INTERVAL: Duration = Duration::from_secs(30);

/// Events the per-vote timer thread feeds back to the tick thread. The
/// generation stamps let the coordinator ignore stragglers from a vote
/// that already ended.
#[derive(Debug, Clone, Copy)]
pub struct VoteTimerEvent {
    pub generation: u64,
    pub kind: VoteTimerKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteTimerKind {
    Tick,
    Timeout,
}

#[derive(Debug, Clone, PartialEq)]
pub enum VoteOutcome {
    KickPassed {
        victim: u8,
        victim_name: String,
        reason: String,
        ban_minutes: u64,
    },
    MapPassed {
        map_name: String,
    },
    Extended,
    TimedOut,
}

#[derive(Debug, Default)]
pub struct VoteUpdate {
    pub messages: Vec<String>,
    pub outcome: Option<VoteOutcome>,
}

pub struct Votekick {
    pub victim: u8,
    pub victim_name: String,
    pub reason: String,
    votes: HashMap<u8, bool>,
    percentage: u32,
    ban_minutes: u64,
}

pub struct Votemap {
    choices: Vec<String>,
    votes: HashMap<u8, String>,
    percentage: u32,
}

pub enum VoteKind {
    Kick(Votekick),
    Map(Votemap),
}

struct ActiveVote {
    kind: VoteKind,
    instigator: u8,
    instigator_name: String,
    started: Instant,
    timeout: Duration,
    // Dropping this wakes the timer thread and ends it.
    _cancel: Sender<()>,
}

pub struct VoteCoordinator {
    active: Option<ActiveVote>,
    cooldowns: HashMap<u8, Instant>,
    generation: u64,
}

/// Votes needed: player count scaled by the percentage, rounded up,
/// never less than one.
pub fn required_votes(player_count: usize, percentage: u32) -> usize {
    if player_count == 0 {
        return 0;
    }
    let required = (player_count * percentage as usize).div_ceil(100);
    required.max(1)
}

impl Votekick {
    fn yes_votes(&self) -> usize {
        self.votes.values().filter(|&&v| v).count()
    }

    fn votes_remaining(&self, player_count: usize) -> usize {
        required_votes(player_count, self.percentage).saturating_sub(self.yes_votes())
    }
}

impl Votemap {
    pub fn choices(&self) -> &[String] {
        &self.choices
    }

    fn count_for(&self, choice: &str) -> usize {
        self.votes.values().filter(|v| v.as_str() == choice).count()
    }

    fn plurality(&self) -> Option<(String, usize)> {
        let mut best: Option<(String, usize)> = None;
        for choice in &self.choices {
            let count = self.count_for(choice);
            if count > 0 && best.as_ref().map_or(true, |(_, c)| count > *c) {
                best = Some((choice.clone(), count));
            }
        }
        best
    }
}

impl Default for VoteCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl VoteCoordinator {
    pub fn new() -> Self {
        Self {
            active: None,
            cooldowns: HashMap::new(),
            generation: 0,
        }
    }

    pub fn has_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn active_kind(&self) -> Option<&VoteKind> {
        self.active.as_ref().map(|v| &v.kind)
    }

    fn check_can_start(
        &self,
        instigator: u8,
        config: &VotingConfig,
        now: Instant,
    ) -> Result<(), String> {
        if self.active.is_some() {
            return Err("a vote is already in progress".to_string());
        }
        if let Some(&until) = self.cooldowns.get(&instigator) {
            if now < until {
                let remaining = until.duration_since(now).as_secs();
                return Err(format!(
                    "please wait {} seconds before starting another vote",
                    remaining
                ));
            }
        }
        let _ = config;
        Ok(())
    }

    fn activate(
        &mut self,
        kind: VoteKind,
        instigator: u8,
        instigator_name: String,
        config: &VotingConfig,
        timer_tx: Sender<VoteTimerEvent>,
        now: Instant,
    ) {
        self.generation += 1;
        let timeout = Duration::from_secs(config.vote_timeout);
        let cancel = spawn_vote_timer(self.generation, timeout, timer_tx);
        self.cooldowns
            .insert(instigator, now + Duration::from_secs(config.vote_cooldown));
        self.active = Some(ActiveVote {
            kind,
            instigator,
            instigator_name,
            started: now,
            timeout,
            _cancel: cancel,
        });
    }

    /// Start a kick vote. The instigator's own yes vote is cast
    /// immediately; a vote that is already satisfied by it resolves on
    /// the first extra ballot, not here.
    #[allow(clippy::too_many_arguments)]
    pub fn start_kick(
        &mut self,
        instigator: u8,
        instigator_name: &str,
        victim: u8,
        victim_name: &str,
        victim_is_staff: bool,
        reason: &str,
        player_count: usize,
        config: &VotingConfig,
        timer_tx: Sender<VoteTimerEvent>,
        now: Instant,
    ) -> Result<Vec<String>, String> {
        if !config.votekick_enabled {
            return Err("votekick is disabled on this server".to_string());
        }
        self.check_can_start(instigator, config, now)?;
        if instigator == victim {
            return Err("you cannot votekick yourself".to_string());
        }
        if victim_is_staff {
            return Err("cannot votekick moderators or admins".to_string());
        }
        if required_votes(player_count, config.votekick_percentage) == 0 {
            return Err("not enough players to start a vote".to_string());
        }

        let mut kick = Votekick {
            victim,
            victim_name: victim_name.to_string(),
            reason: reason.to_string(),
            votes: HashMap::new(),
            percentage: config.votekick_percentage,
            ban_minutes: config.votekick_ban_duration,
        };
        kick.votes.insert(instigator, true);
        let remaining = kick.votes_remaining(player_count);

        let messages = vec![
            format!(
                "{} started a votekick against {}. Reason: {}",
                instigator_name, victim_name, reason
            ),
            format!("{} more votes needed (type /y to vote yes)", remaining),
        ];

        self.activate(
            VoteKind::Kick(kick),
            instigator,
            instigator_name.to_string(),
            config,
            timer_tx,
            now,
        );
        Ok(messages)
    }

    /// Start a map vote over up to `votemap_choices` entries drawn from
    /// the rotation, excluding the current map, plus "extend" when
    /// configured.
    #[allow(clippy::too_many_arguments)]
    pub fn start_map(
        &mut self,
        instigator: u8,
        instigator_name: &str,
        rotation: &[String],
        current_map: &str,
        player_count: usize,
        config: &VotingConfig,
        timer_tx: Sender<VoteTimerEvent>,
        now: Instant,
    ) -> Result<Vec<String>, String> {
        if !config.votemap_enabled {
            return Err("votemap is disabled on this server".to_string());
        }
        self.check_can_start(instigator, config, now)?;
        if required_votes(player_count, config.votemap_percentage) == 0 {
            return Err("not enough players to start a vote".to_string());
        }
        if rotation.is_empty() {
            return Err("no maps in rotation".to_string());
        }

        let mut choices: Vec<String> = if rotation.len() <= config.votemap_choices {
            rotation.to_vec()
        } else {
            let mut available: Vec<String> = rotation
                .iter()
                .filter(|m| m.as_str() != current_map)
                .cloned()
                .collect();
            available.shuffle(&mut rand::thread_rng());
            let mut count = config.votemap_choices;
            if config.votemap_allow_extend {
                count = count.saturating_sub(1);
            }
            available.truncate(count);
            available
        };
        if config.votemap_allow_extend {
            choices.push("extend".to_string());
        }

        let mut messages = vec![
            format!("{} started a map vote", instigator_name),
            "Available maps:".to_string(),
        ];
        for (i, map) in choices.iter().enumerate() {
            messages.push(format!("  {}. {}", i + 1, map));
        }
        messages.push("Vote with /vote <number> or /vote <mapname>".to_string());

        self.activate(
            VoteKind::Map(Votemap {
                choices,
                votes: HashMap::new(),
                percentage: config.votemap_percentage,
            }),
            instigator,
            instigator_name.to_string(),
            config,
            timer_tx,
            now,
        );
        Ok(messages)
    }

    /// Cast a yes/no ballot on the active kick vote.
    pub fn cast_kick(
        &mut self,
        voter: u8,
        voter_name: &str,
        yes: bool,
        player_count: usize,
    ) -> Result<VoteUpdate, String> {
        let active = self.active.as_mut().ok_or("no active vote")?;
        let VoteKind::Kick(kick) = &mut active.kind else {
            return Err("the active vote is not a votekick".to_string());
        };

        if voter == kick.victim {
            return Err("you cannot vote on your own votekick".to_string());
        }
        if kick.votes.contains_key(&voter) {
            return Err("you have already voted".to_string());
        }
        kick.votes.insert(voter, yes);
        let remaining = kick.votes_remaining(player_count);

        let mut update = VoteUpdate {
            messages: vec![format!(
                "{} voted {}",
                voter_name,
                if yes { "yes" } else { "no" }
            )],
            ..VoteUpdate::default()
        };

        if yes && remaining == 0 {
            update.messages.push(format!(
                "{} was banned for {} minutes: {}",
                kick.victim_name, kick.ban_minutes, kick.reason
            ));
            update.outcome = Some(VoteOutcome::KickPassed {
                victim: kick.victim,
                victim_name: kick.victim_name.clone(),
                reason: kick.reason.clone(),
                ban_minutes: kick.ban_minutes,
            });
            self.active = None;
        } else {
            update.messages.push(format!("{} more votes needed", remaining));
        }
        Ok(update)
    }

    /// Cast a ballot on the active map vote; `choice` is either a 1-based
    /// index or a map name.
    pub fn cast_map(
        &mut self,
        voter: u8,
        voter_name: &str,
        choice: &str,
        player_count: usize,
    ) -> Result<VoteUpdate, String> {
        let active = self.active.as_mut().ok_or("no active vote")?;
        let VoteKind::Map(map_vote) = &mut active.kind else {
            return Err("the active vote is not a map vote".to_string());
        };

        let resolved = if let Ok(index) = choice.parse::<usize>() {
            map_vote
                .choices
                .get(index.wrapping_sub(1))
                .cloned()
                .ok_or_else(|| format!("invalid map choice: {}", choice))?
        } else if map_vote.choices.iter().any(|m| m == choice) {
            choice.to_string()
        } else {
            return Err(format!("invalid map choice: {}", choice));
        };

        map_vote.votes.insert(voter, resolved.clone());

        let mut update = VoteUpdate {
            messages: vec![format!("{} voted for {}", voter_name, resolved)],
            ..VoteUpdate::default()
        };

        let required = required_votes(player_count, map_vote.percentage);
        if map_vote.count_for(&resolved) >= required {
            update.outcome = Some(map_outcome(&resolved));
            update.messages.push(winner_message(&resolved));
            self.active = None;
        }
        Ok(update)
    }

    /// Cancel the active vote; only the instigator or staff may.
    pub fn cancel(&mut self, requester: u8, requester_is_staff: bool) -> Result<Vec<String>, String> {
        let active = self.active.as_ref().ok_or("no active vote to cancel")?;
        if active.instigator != requester && !requester_is_staff {
            return Err("only the instigator or staff can cancel votes".to_string());
        }
        self.active = None;
        Ok(vec!["Vote cancelled".to_string()])
    }

    /// A leaving instigator takes the vote down with them.
    pub fn handle_disconnect(&mut self, player_id: u8) -> Option<Vec<String>> {
        if self.active.as_ref()?.instigator == player_id {
            self.active = None;
            return Some(vec!["Vote cancelled".to_string()]);
        }
        None
    }

    /// Process a timer event. Stale generations are ignored.
    pub fn on_timer(&mut self, event: VoteTimerEvent, player_count: usize) -> Option<VoteUpdate> {
        if event.generation != self.generation {
            return None;
        }
        let active = self.active.as_ref()?;

        match event.kind {
            VoteTimerKind::Tick => {
                let elapsed = active.started.elapsed();
                let left = active.timeout.saturating_sub(elapsed).as_secs();
                let messages = match &active.kind {
                    VoteKind::Kick(kick) => vec![
                        format!(
                            "Votekick in progress: {} (Reason: {})",
                            kick.victim_name, kick.reason
                        ),
                        format!(
                            "{} more votes needed, {} seconds remaining",
                            kick.votes_remaining(player_count),
                            left
                        ),
                    ],
                    VoteKind::Map(map_vote) => {
                        let mut msgs = vec!["Map vote in progress:".to_string()];
                        for choice in &map_vote.choices {
                            msgs.push(format!("  {}: {} votes", choice, map_vote.count_for(choice)));
                        }
                        msgs.push(format!("{} seconds remaining", left));
                        msgs
                    }
                };
                Some(VoteUpdate {
                    messages,
                    outcome: None,
                })
            }
            VoteTimerKind::Timeout => {
                let update = match &active.kind {
                    VoteKind::Kick(_) => VoteUpdate {
                        messages: vec!["Votekick failed: not enough votes".to_string()],
                        outcome: Some(VoteOutcome::TimedOut),
                    },
                    VoteKind::Map(map_vote) => match map_vote.plurality() {
                        Some((winner, count)) => VoteUpdate {
                            messages: vec![format!(
                                "Map vote succeeded: {} wins with {} votes",
                                winner, count
                            )],
                            outcome: Some(map_outcome(&winner)),
                        },
                        None => VoteUpdate {
                            messages: vec!["Map vote failed: no votes cast".to_string()],
                            outcome: Some(VoteOutcome::TimedOut),
                        },
                    },
                };
                self.active = None;
                Some(update)
            }
        }
    }

    pub fn status(&self, player_count: usize) -> Option<String> {
        let active = self.active.as_ref()?;
        Some(match &active.kind {
            VoteKind::Kick(kick) => format!(
                "Votekick: {} (Reason: {}) - {}/{} votes, {} more needed",
                kick.victim_name,
                kick.reason,
                kick.yes_votes(),
                required_votes(player_count, kick.percentage),
                kick.votes_remaining(player_count)
            ),
            VoteKind::Map(map_vote) => {
                let tallies: Vec<String> = map_vote
                    .choices
                    .iter()
                    .map(|c| format!("{}: {}", c, map_vote.count_for(c)))
                    .collect();
                format!("Map vote by {}: {}", active.instigator_name, tallies.join(", "))
            }
        })
    }
}

fn map_outcome(winner: &str) -> VoteOutcome {
    if winner == "extend" {
        VoteOutcome::Extended
    } else {
        VoteOutcome::MapPassed {
            map_name: winner.to_string(),
        }
    }
}

fn winner_message(winner: &str) -> String {
    if winner == "extend" {
        "Map extended by 15 minutes".to_string()
    } else {
        format!("Map changed to {}", winner)
    }
}

/// Timer task: status ticks every 30 s, one timeout, cancelled by
/// dropping the returned sender.
fn spawn_vote_timer(
    generation: u64,
    timeout: Duration,
    tx: Sender<VoteTimerEvent>,
) -> Sender<()> {
    let (cancel_tx, cancel_rx): (Sender<()>, Receiver<()>) = bounded(1);
    let spawned = std::thread::Builder::new()
        .name("vote-timer".to_string())
        .spawn(move || {
            let ticker = crossbeam::channel::tick(STATUS_INTERVAL);
            let deadline = crossbeam::channel::after(timeout);
            loop {
                crossbeam::channel::select! {
                    recv(cancel_rx) -> _ => return,
                    recv(deadline) -> _ => {
                        let _ = tx.send(VoteTimerEvent {
                            generation,
                            kind: VoteTimerKind::Timeout,
                        });
                        return;
                    }
                    recv(ticker) -> _ => {
                        if tx.send(VoteTimerEvent {
                            generation,
                            kind: VoteTimerKind::Tick,
                        }).is_err() {
                            return;
                        }
                    }
                }
            }
        });
    if let Err(e) = spawned {
        log::error!("failed to spawn vote timer thread: {}", e);
    }
    cancel_tx
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam::channel::unbounded;

    fn voting_config() -> VotingConfig {
        VotingConfig {
            votekick_enabled: true,
            votekick_percentage: 35,
            votekick_ban_duration: 30,
            vote_cooldown: 120,
            vote_timeout: 120,
            votemap_enabled: true,
            votemap_percentage: 80,
            votemap_choices: 5,
            votemap_allow_extend: false,
        }
    }

    #[test]
    fn threshold_rounds_up() {
        assert_eq!(required_votes(5, 35), 2); // ceil(1.75)
        assert_eq!(required_votes(1, 35), 1); // clamp to 1
        assert_eq!(required_votes(20, 35), 7);
        assert_eq!(required_votes(0, 35), 0);
        assert_eq!(required_votes(10, 80), 8);
    }

    #[test]
    fn kick_lifecycle_succeeds_at_threshold() {
        let mut votes = VoteCoordinator::new();
        let config = voting_config();
        let (tx, _rx) = unbounded();
        let now = Instant::now();

        // Five players, 35% -> 2 votes needed; instigator auto-casts.
        let messages = votes
            .start_kick(0, "alice", 4, "spammer", false, "spam", 5, &config, tx, now)
            .unwrap();
        assert!(messages[1].starts_with("1 more votes needed"));
        assert!(votes.has_active());

        // Victim cannot vote, double votes rejected.
        assert!(votes.cast_kick(4, "spammer", true, 5).is_err());
        assert!(votes.cast_kick(0, "alice", true, 5).is_err());

        let update = votes.cast_kick(1, "bob", true, 5).unwrap();
        match update.outcome {
            Some(VoteOutcome::KickPassed {
                victim,
                ban_minutes,
                ..
            }) => {
                assert_eq!(victim, 4);
                assert_eq!(ban_minutes, 30);
            }
            other => panic!("expected kick success, got {:?}", other),
        }
        assert!(!votes.has_active());
    }

    #[test]
    fn instigator_cooldown_blocks_restart() {
        let mut votes = VoteCoordinator::new();
        let config = voting_config();
        let now = Instant::now();

        let (tx, _rx) = unbounded();
        votes
            .start_kick(0, "alice", 4, "bob", false, "r", 5, &config, tx.clone(), now)
            .unwrap();
        let _ = votes.cancel(0, false).unwrap();

        // Within the 120 s cooldown the same instigator is refused.
        let err = votes
            .start_kick(0, "alice", 4, "bob", false, "r", 5, &config, tx.clone(), now)
            .unwrap_err();
        assert!(err.contains("wait"));

        // Another player can start one, and after the cooldown the first
        // may again.
        votes
            .start_kick(1, "carol", 4, "bob", false, "r", 5, &config, tx.clone(), now)
            .unwrap();
        let _ = votes.cancel(1, false).unwrap();
        assert!(votes
            .start_kick(0, "alice", 4, "bob", false, "r", 5, &config, tx, now + Duration::from_secs(121))
            .is_ok());
    }

    #[test]
    fn rejects_self_kick_and_staff_victims() {
        let mut votes = VoteCoordinator::new();
        let config = voting_config();
        let (tx, _rx) = unbounded();
        let now = Instant::now();
        assert!(votes
            .start_kick(3, "x", 3, "x", false, "r", 5, &config, tx.clone(), now)
            .is_err());
        assert!(votes
            .start_kick(3, "x", 4, "mod", true, "r", 5, &config, tx, now)
            .is_err());
    }

    #[test]
    fn single_active_vote_invariant() {
        let mut votes = VoteCoordinator::new();
        let config = voting_config();
        let (tx, _rx) = unbounded();
        let now = Instant::now();
        votes
            .start_kick(0, "a", 4, "b", false, "r", 5, &config, tx.clone(), now)
            .unwrap();
        let err = votes
            .start_kick(1, "c", 4, "b", false, "r", 5, &config, tx, now)
            .unwrap_err();
        assert!(err.contains("already in progress"));
    }

    #[test]
    fn map_vote_majority_and_index_ballots() {
        let mut votes = VoteCoordinator::new();
        let mut config = voting_config();
        config.votemap_percentage = 50;
        let (tx, _rx) = unbounded();
        let now = Instant::now();
        let rotation = vec!["alpha".to_string(), "bravo".to_string()];

        votes
            .start_map(0, "a", &rotation, "alpha", 4, &config, tx, now)
            .unwrap();
        // 4 players at 50% -> 2 votes.
        let update = votes.cast_map(0, "a", "2", 4).unwrap();
        assert!(update.outcome.is_none());
        let update = votes.cast_map(1, "b", "bravo", 4).unwrap();
        assert_eq!(
            update.outcome,
            Some(VoteOutcome::MapPassed {
                map_name: "bravo".to_string()
            })
        );
    }

    #[test]
    fn map_vote_timeout_elects_plurality() {
        let mut votes = VoteCoordinator::new();
        let config = voting_config();
        let (tx, _rx) = unbounded();
        let now = Instant::now();
        let rotation = vec!["alpha".to_string(), "bravo".to_string()];

        votes
            .start_map(0, "a", &rotation, "", 10, &config, tx, now)
            .unwrap();
        votes.cast_map(0, "a", "alpha", 10).unwrap();
        votes.cast_map(1, "b", "alpha", 10).unwrap();
        votes.cast_map(2, "c", "bravo", 10).unwrap();

        let update = votes
            .on_timer(
                VoteTimerEvent {
                    generation: 1,
                    kind: VoteTimerKind::Timeout,
                },
                10,
            )
            .unwrap();
        assert_eq!(
            update.outcome,
            Some(VoteOutcome::MapPassed {
                map_name: "alpha".to_string()
            })
        );
        assert!(!votes.has_active());
    }

    #[test]
    fn kick_timeout_fails() {
        let mut votes = VoteCoordinator::new();
        let config = voting_config();
        let (tx, _rx) = unbounded();
        let now = Instant::now();
        votes
            .start_kick(0, "a", 4, "b", false, "r", 5, &config, tx, now)
            .unwrap();
        let update = votes
            .on_timer(
                VoteTimerEvent {
                    generation: 1,
                    kind: VoteTimerKind::Timeout,
                },
                5,
            )
            .unwrap();
        assert_eq!(update.outcome, Some(VoteOutcome::TimedOut));
    }

    #[test]
    fn stale_timer_events_ignored() {
        let mut votes = VoteCoordinator::new();
        let config = voting_config();
        let (tx, _rx) = unbounded();
        let now = Instant::now();
        votes
            .start_kick(0, "a", 4, "b", false, "r", 5, &config, tx.clone(), now)
            .unwrap();
        let _ = votes.cancel(0, false);
        votes
            .start_kick(1, "c", 4, "b", false, "r", 5, &config, tx, now)
            .unwrap();
        // Generation 1 belongs to the cancelled vote.
        assert!(votes
            .on_timer(
                VoteTimerEvent {
                    generation: 1,
                    kind: VoteTimerKind::Timeout
                },
                5
            )
            .is_none());
        assert!(votes.has_active());
    }

    #[test]
    fn instigator_disconnect_cancels() {
        let mut votes = VoteCoordinator::new();
        let config = voting_config();
        let (tx, _rx) = unbounded();
        let now = Instant::now();
        votes
            .start_kick(0, "a", 4, "b", false, "r", 5, &config, tx, now)
            .unwrap();
        assert!(votes.handle_disconnect(2).is_none());
        assert!(votes.handle_disconnect(0).is_some());
        assert!(!votes.has_active());
    }
}
