use crate::error::{AppError, GameError};
use crate::llm::ChatBackend;
use crate::player::Player;
use crate::prompt::PromptLibrary;
use crate::record::{GameRecord, PerformanceEntry, PlayerInitialState, VoteEntry, VotingResult};
use crate::settings::PlayerConfig;
use log::{info, warn};
use rand::Rng;
use rand::seq::IndexedRandom;
use std::collections::BTreeMap;

/// Which side won the match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Winner {
    Minority,
    Majority,
}

impl Winner {
    pub fn as_str(&self) -> &'static str {
        match self {
            Winner::Minority => "minority",
            Winner::Majority => "majority",
        }
    }
}

impl std::fmt::Display for Winner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counts votes by target name.
pub fn tally_votes(votes: &[VoteEntry]) -> BTreeMap<String, u32> {
    let mut counts = BTreeMap::new();
    for vote in votes {
        *counts.entry(vote.voted_player.clone()).or_insert(0) += 1;
    }
    counts
}

/// Picks who is eliminated: a uniformly random choice among the targets tied
/// at the maximum count. `None` when no votes were cast at all.
pub fn choose_eliminated(
    counts: &BTreeMap<String, u32>,
    rng: &mut impl Rng,
) -> Option<String> {
    let max_votes = counts.values().copied().max()?;
    let candidates: Vec<&String> = counts
        .iter()
        .filter(|&(_, &count)| count == max_votes)
        .map(|(name, _)| name)
        .collect();
    candidates.choose(rng).map(|name| name.to_string())
}

/// The end-of-round victory rule: the match ends when the minority-word
/// holder is gone, or when the table has shrunk to three players. In the
/// latter case the still-living minority holder has run out the clock.
pub fn evaluate_victory(spy_alive: bool, alive_count: usize) -> Option<Winner> {
    if !spy_alive || alive_count <= 3 {
        Some(if spy_alive {
            Winner::Minority
        } else {
            Winner::Majority
        })
    } else {
        None
    }
}

/// Drives a full match: word assignment, rounds of description and voting,
/// elimination, and victory detection. Strictly sequential; each player's
/// prompt only ever contains turns recorded before their own.
pub struct Game<B> {
    backend: B,
    prompts: PromptLibrary,
    players: Vec<Player>,
    civil_keyword: String,
    spy_keyword: String,
    records_dir: String,
    spy_name: String,
    round_count: u32,
    record: Option<GameRecord>,
}

impl<B: ChatBackend> Game<B> {
    pub fn new(
        roster: Vec<PlayerConfig>,
        civil_keyword: &str,
        spy_keyword: &str,
        records_dir: &str,
        prompts: PromptLibrary,
        backend: B,
    ) -> Result<Self, GameError> {
        if roster.is_empty() {
            return Err(GameError::EmptyRoster);
        }
        Ok(Self {
            backend,
            prompts,
            players: roster
                .into_iter()
                .map(|config| Player::new(config.name, config.model))
                .collect(),
            civil_keyword: civil_keyword.to_string(),
            spy_keyword: spy_keyword.to_string(),
            records_dir: records_dir.to_string(),
            spy_name: String::new(),
            round_count: 0,
            record: None,
        })
    }

    /// The transcript so far. Empty until [`Game::run`] assigns words.
    pub fn record(&self) -> Option<&GameRecord> {
        self.record.as_ref()
    }

    pub fn spy_name(&self) -> &str {
        &self.spy_name
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    fn record_mut(&mut self) -> Result<&mut GameRecord, GameError> {
        self.record.as_mut().ok_or(GameError::NoOpenRound)
    }

    fn record_ref(&self) -> Result<&GameRecord, GameError> {
        self.record.as_ref().ok_or(GameError::NoOpenRound)
    }

    /// One roster index, chosen uniformly at random, receives the minority
    /// word; everyone else the common word. The assignment never changes
    /// for the rest of the match.
    fn assign_keywords(&mut self, rng: &mut impl Rng) {
        let spy_idx = rng.random_range(0..self.players.len());
        self.spy_name = self.players[spy_idx].name.clone();
        for player in &mut self.players {
            player.keyword = if player.name == self.spy_name {
                self.spy_keyword.clone()
            } else {
                self.civil_keyword.clone()
            };
        }

        info!("[assignment] the undercover player is {}", self.spy_name);
        for player in &self.players {
            info!("[assignment] {} holds \"{}\"", player.name, player.keyword);
        }
    }

    fn living_indices(&self) -> Vec<usize> {
        (0..self.players.len())
            .filter(|&i| self.players[i].alive)
            .collect()
    }

    fn living_names(&self) -> Vec<String> {
        self.players
            .iter()
            .filter(|p| p.alive)
            .map(|p| p.name.clone())
            .collect()
    }

    /// Living players in wrap-order starting from `start_idx`. Dead players
    /// are skipped without consuming a turn slot.
    fn turn_order(&self, start_idx: usize) -> Vec<usize> {
        let n = self.players.len();
        (0..n)
            .map(|offset| (start_idx + offset) % n)
            .filter(|&i| self.players[i].alive)
            .collect()
    }

    fn start_round(&mut self, rng: &mut impl Rng) -> Result<usize, GameError> {
        self.round_count += 1;
        let living = self.living_indices();
        let starting_idx = *living
            .choose(rng)
            .ok_or(GameError::EmptyRoster)?;
        let round_count = self.round_count;
        self.record_mut()?
            .start_new_round(round_count, starting_idx)?;
        Ok(starting_idx)
    }

    /// A description breaks the rules when it is empty or names the
    /// speaker's own secret word. Surfaced to observers only; play
    /// continues unconditionally.
    fn is_valid_play(&self, player: &Player, description: &str) -> bool {
        !description.is_empty() && !description.contains(&player.keyword)
    }

    async fn description_phase(&mut self, starting_idx: usize) -> Result<(), AppError> {
        info!("[round {}] description phase", self.round_count);

        for idx in self.turn_order(starting_idx) {
            let player = self.players[idx].clone();
            info!("[round {}] {} speaks", self.round_count, player.name);

            let living = self.living_names();
            let record = self.record_ref()?;
            let round_ctx = record.round_context(living)?;
            let history = record.history_context(&player.name)?;

            let (decision, _reasoning) = player
                .perform(&self.backend, &self.prompts, &round_ctx, &history)
                .await?;

            if !self.is_valid_play(&player, &decision.description) {
                warn!(
                    "[round {}] {} broke the rules with \"{}\"",
                    self.round_count, player.name, decision.description
                );
            }
            info!("[round {}] {}: {}", self.round_count, player.name, decision.description);

            self.record_mut()?.add_performance(PerformanceEntry {
                player: player.name.clone(),
                description: decision.description,
                tendency: decision.tendency,
                self_prediction: decision.self_prediction,
                keyword_prediction: decision.keyword_prediction,
            })?;
        }
        Ok(())
    }

    async fn vote_phase(&mut self, starting_idx: usize) -> Result<(), AppError> {
        info!("[round {}] voting phase", self.round_count);

        for idx in self.turn_order(starting_idx) {
            let player = self.players[idx].clone();
            info!("[round {}] {} votes", self.round_count, player.name);

            let living = self.living_names();
            let record = self.record_ref()?;
            let round_ctx = record.round_context(living)?;
            let history = record.history_context(&player.name)?;

            let (decision, _reasoning) = player
                .vote(&self.backend, &self.prompts, &round_ctx, &history)
                .await?;

            info!(
                "[round {}] {} voted for {}",
                self.round_count, player.name, decision.voted_player
            );

            self.record_mut()?.add_vote(VoteEntry {
                player: player.name.clone(),
                voted_player: decision.voted_player,
                vote_reason: decision.vote_reason,
            })?;
        }
        Ok(())
    }

    /// Tallies the open round's votes and eliminates at most one player.
    /// A round with no votes at all finalizes empty; nobody is eliminated.
    fn resolve_votes(&mut self, rng: &mut impl Rng) -> Result<(), GameError> {
        let counts = tally_votes(&self.record_mut()?.current_round()?.votes);

        if counts.is_empty() {
            info!("[round {}] no votes were cast", self.round_count);
            self.record_mut()?.add_voting_result(VotingResult::default())?;
            return Ok(());
        }
        info!("[round {}] vote tally: {:?}", self.round_count, counts);

        let eliminated = choose_eliminated(&counts, rng);
        if let Some(name) = &eliminated {
            let player = self
                .players
                .iter_mut()
                .find(|p| p.name == *name)
                .ok_or_else(|| GameError::PlayerNotFound(name.clone()))?;
            player.alive = false;
            info!("[round {}] {} was eliminated", self.round_count, name);
        }

        self.record_mut()?.add_voting_result(VotingResult {
            vote_counts: counts,
            voted_player: eliminated,
        })?;
        Ok(())
    }

    fn check_victory(&self) -> Option<Winner> {
        let spy_alive = self
            .players
            .iter()
            .any(|p| p.alive && p.name == self.spy_name);
        evaluate_victory(spy_alive, self.living_names().len())
    }

    /// Runs the whole match. Only retry exhaustion aborts it; every other
    /// anomaly (rule-breaking descriptions, tie votes, empty tallies) is a
    /// designed branch.
    pub async fn run(&mut self) -> Result<Winner, AppError> {
        let mut rng = rand::rng();

        self.assign_keywords(&mut rng);
        let initial_states = self
            .players
            .iter()
            .map(|p| PlayerInitialState {
                name: p.name.clone(),
                keyword: p.keyword.clone(),
                model: p.model.clone(),
            })
            .collect();
        self.record = Some(GameRecord::new(
            initial_states,
            &self.civil_keyword,
            &self.spy_keyword,
        ));

        loop {
            let starting_idx = self.start_round(&mut rng)?;
            self.description_phase(starting_idx).await?;
            self.vote_phase(starting_idx).await?;
            self.resolve_votes(&mut rng)?;

            if let Some(winner) = self.check_victory() {
                info!("[game over] the {} side wins", winner);
                let records_dir = self.records_dir.clone();
                let record = self.record_mut()?;
                record.record_winner(winner.as_str());
                match record.export(&records_dir) {
                    Ok(path) => info!("Transcript saved to {}", path.display()),
                    Err(e) => warn!("Failed to export transcript: {}", e),
                }
                return Ok(winner);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;
    use crate::llm::{ChatMessage, ChatReply};
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::HashSet;

    struct NullBackend;

    impl ChatBackend for NullBackend {
        async fn chat(&self, _: &[ChatMessage], _: &str) -> Result<ChatReply, LlmError> {
            Ok(ChatReply::default())
        }
    }

    fn roster(names: &[&str]) -> Vec<PlayerConfig> {
        names
            .iter()
            .map(|name| PlayerConfig {
                name: name.to_string(),
                model: "test-model".to_string(),
            })
            .collect()
    }

    fn game(names: &[&str]) -> Game<NullBackend> {
        Game::new(
            roster(names),
            "Werewolf",
            "Mafia",
            "./game_records",
            PromptLibrary::default(),
            NullBackend,
        )
        .unwrap()
    }

    fn vote(player: &str, target: &str) -> VoteEntry {
        VoteEntry {
            player: player.to_string(),
            voted_player: target.to_string(),
            vote_reason: String::new(),
        }
    }

    #[test]
    fn empty_roster_is_rejected() {
        let result = Game::new(
            Vec::new(),
            "a",
            "b",
            ".",
            PromptLibrary::default(),
            NullBackend,
        );
        assert!(matches!(result, Err(GameError::EmptyRoster)));
    }

    #[test]
    fn exactly_one_spy_is_assigned() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut game = game(&["A", "B", "C", "D", "E"]);
        game.assign_keywords(&mut rng);

        let spies: Vec<_> = game
            .players
            .iter()
            .filter(|p| p.keyword == "Mafia")
            .collect();
        assert_eq!(spies.len(), 1);
        assert_eq!(spies[0].name, game.spy_name());
        assert!(
            game.players
                .iter()
                .filter(|p| p.name != game.spy_name)
                .all(|p| p.keyword == "Werewolf")
        );
    }

    #[test]
    fn turn_order_wraps_and_skips_dead_players() {
        let mut game = game(&["A", "B", "C", "D", "E"]);
        game.players[2].alive = false; // C is out.

        let order: Vec<&str> = game
            .turn_order(3)
            .into_iter()
            .map(|i| game.players[i].name.as_str())
            .collect();
        assert_eq!(order, vec!["D", "E", "A", "B"]);
    }

    #[test]
    fn tally_counts_by_target() {
        let votes = [vote("A", "B"), vote("B", "A"), vote("C", "B")];
        let counts = tally_votes(&votes);
        assert_eq!(counts.get("B"), Some(&2));
        assert_eq!(counts.get("A"), Some(&1));
    }

    #[test]
    fn elimination_is_always_a_maximum_count_target() {
        let votes = [
            vote("v1", "A"),
            vote("v2", "A"),
            vote("v3", "A"),
            vote("v4", "B"),
            vote("v5", "B"),
            vote("v6", "B"),
            vote("v7", "C"),
        ];
        let counts = tally_votes(&votes);

        let mut seen = HashSet::new();
        for seed in 0..64 {
            let mut rng = StdRng::seed_from_u64(seed);
            let eliminated = choose_eliminated(&counts, &mut rng).unwrap();
            assert_ne!(eliminated, "C");
            seen.insert(eliminated);
        }
        // Both tied leaders show up across trials.
        assert!(seen.contains("A"));
        assert!(seen.contains("B"));
    }

    #[test]
    fn no_votes_means_no_elimination() {
        let counts = tally_votes(&[]);
        let mut rng = StdRng::seed_from_u64(0);
        assert!(choose_eliminated(&counts, &mut rng).is_none());
    }

    #[test]
    fn zero_vote_round_finalizes_and_keeps_everyone_alive() {
        let mut game = game(&["A", "B", "C", "D", "E"]);
        let mut rng = StdRng::seed_from_u64(1);
        game.assign_keywords(&mut rng);
        game.record = Some(GameRecord::new(Vec::new(), "Werewolf", "Mafia"));
        game.round_count = 1;
        game.record_mut().unwrap().start_new_round(1, 0).unwrap();

        game.resolve_votes(&mut rng).unwrap();

        assert!(game.players.iter().all(|p| p.alive));
        let round = game.record().unwrap().current_round().unwrap();
        let result = round.voting_result.as_ref().unwrap();
        assert!(result.vote_counts.is_empty());
        assert!(result.voted_player.is_none());
    }

    #[test]
    fn victory_table() {
        // Four living players with the minority holder: play on.
        assert_eq!(evaluate_victory(true, 4), None);
        // Exactly three left and the holder lives: minority wins.
        assert_eq!(evaluate_victory(true, 3), Some(Winner::Minority));
        // The holder is gone: majority wins regardless of count.
        assert_eq!(evaluate_victory(false, 5), Some(Winner::Majority));
        assert_eq!(evaluate_victory(false, 2), Some(Winner::Majority));
    }
}
