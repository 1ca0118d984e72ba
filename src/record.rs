use crate::error::GameError;
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// A player's assignment at match start, kept verbatim in the transcript.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct PlayerInitialState {
    pub name: String,
    pub keyword: String,
    pub model: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct PerformanceEntry {
    pub player: String,
    pub description: String,
    pub tendency: String,
    pub self_prediction: bool,
    pub keyword_prediction: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct VoteEntry {
    pub player: String,
    pub voted_player: String,
    pub vote_reason: String,
}

/// The outcome of one round's voting. A round with no votes cast finalizes
/// with an empty tally and no eliminated player.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct VotingResult {
    pub vote_counts: BTreeMap<String, u32>,
    pub voted_player: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct RoundRecord {
    pub round_number: u32,
    pub starting_player_idx: usize,
    pub performances: Vec<PerformanceEntry>,
    pub votes: Vec<VoteEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voting_result: Option<VotingResult>,
}

impl RoundRecord {
    fn new(round_number: u32, starting_player_idx: usize) -> Self {
        Self {
            round_number,
            starting_player_idx,
            performances: Vec::new(),
            votes: Vec::new(),
            voting_result: None,
        }
    }
}

/// Serializable snapshot handed to agents when their turn comes up.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct RoundContext {
    pub round_count: u32,
    pub player_list: Vec<String>,
    pub player_count: usize,
}

/// Serialized prior-round history tailored to one requesting player.
#[derive(Clone, Debug)]
pub struct HistoryContext {
    pub serialized: String,
    /// True before anything has been recorded: the requesting player opens
    /// the whole match and gets a canned notice instead of empty history.
    pub opening_turn: bool,
}

#[derive(Serialize)]
struct HistoryPerformance<'a> {
    player: &'a str,
    description: &'a str,
    tendency: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    self_prediction: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    keyword_prediction: Option<&'a str>,
}

#[derive(Serialize)]
struct HistoryRound<'a> {
    round_id: u32,
    previous_performance_info: Vec<HistoryPerformance<'a>>,
    voting_result_info: serde_json::Value,
}

/// The append-only record of one match, from initial assignment to winner.
/// The engine writes into it turn by turn; agents only ever see the query
/// views ([`GameRecord::round_context`], [`GameRecord::history_context`]).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct GameRecord {
    pub game_id: String,
    pub players: BTreeMap<String, PlayerInitialState>,
    pub rounds: Vec<RoundRecord>,
    pub winner: Option<String>,
}

fn generate_game_id(civil_keyword: &str, spy_keyword: &str) -> String {
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    format!("{}_{}_{}", timestamp, civil_keyword, spy_keyword)
}

impl GameRecord {
    pub fn new(
        initial_states: Vec<PlayerInitialState>,
        civil_keyword: &str,
        spy_keyword: &str,
    ) -> Self {
        Self {
            game_id: generate_game_id(civil_keyword, spy_keyword),
            players: initial_states
                .into_iter()
                .map(|state| (state.name.clone(), state))
                .collect(),
            rounds: Vec::new(),
            winner: None,
        }
    }

    /// Opens a new round. The previous round must have been finalized first.
    pub fn start_new_round(
        &mut self,
        round_number: u32,
        starting_player_idx: usize,
    ) -> Result<(), GameError> {
        if let Some(last) = self.rounds.last() {
            if last.voting_result.is_none() {
                return Err(GameError::RoundStillOpen(last.round_number));
            }
        }
        self.rounds
            .push(RoundRecord::new(round_number, starting_player_idx));
        Ok(())
    }

    pub fn current_round(&self) -> Result<&RoundRecord, GameError> {
        self.rounds.last().ok_or(GameError::NoOpenRound)
    }

    fn current_round_mut(&mut self) -> Result<&mut RoundRecord, GameError> {
        self.rounds.last_mut().ok_or(GameError::NoOpenRound)
    }

    pub fn add_performance(&mut self, entry: PerformanceEntry) -> Result<(), GameError> {
        self.current_round_mut()?.performances.push(entry);
        Ok(())
    }

    pub fn add_vote(&mut self, entry: VoteEntry) -> Result<(), GameError> {
        self.current_round_mut()?.votes.push(entry);
        Ok(())
    }

    /// Seals the current round with its voting outcome. A round is immutable
    /// once finalized, so recording a second outcome is an error.
    pub fn add_voting_result(&mut self, result: VotingResult) -> Result<(), GameError> {
        let round = self.current_round_mut()?;
        if round.voting_result.is_some() {
            return Err(GameError::OutcomeAlreadyRecorded(round.round_number));
        }
        round.voting_result = Some(result);
        Ok(())
    }

    pub fn record_winner(&mut self, winner: &str) {
        self.winner = Some(winner.to_string());
    }

    /// Snapshot of the open round for prompt construction: its number plus
    /// the living roster handed in by the engine.
    pub fn round_context(&self, living_players: Vec<String>) -> Result<RoundContext, GameError> {
        let round = self.current_round()?;
        Ok(RoundContext {
            round_count: round.round_number,
            player_count: living_players.len(),
            player_list: living_players,
        })
    }

    /// Everything said and decided so far, serialized for one requesting
    /// player. Only that player's own entries carry the private
    /// `self_prediction` / `keyword_prediction` fields; everyone else sees
    /// just the public description and tendency.
    pub fn history_context(&self, player_name: &str) -> Result<HistoryContext, serde_json::Error> {
        let rounds: Vec<HistoryRound> = self
            .rounds
            .iter()
            .map(|round| {
                let performances = round
                    .performances
                    .iter()
                    .map(|p| {
                        let own = p.player == player_name;
                        HistoryPerformance {
                            player: &p.player,
                            description: &p.description,
                            tendency: &p.tendency,
                            self_prediction: own.then_some(p.self_prediction),
                            keyword_prediction: own.then_some(p.keyword_prediction.as_str()),
                        }
                    })
                    .collect();
                let voting_result_info = match &round.voting_result {
                    Some(result) => serde_json::to_value(result)?,
                    None => serde_json::Value::Object(serde_json::Map::new()),
                };
                Ok(HistoryRound {
                    round_id: round.round_number,
                    previous_performance_info: performances,
                    voting_result_info,
                })
            })
            .collect::<Result<_, serde_json::Error>>()?;

        let opening_turn = self.rounds.len() <= 1
            && self
                .rounds
                .first()
                .map(|r| r.performances.is_empty() && r.votes.is_empty())
                .unwrap_or(true);

        Ok(HistoryContext {
            serialized: serde_json::to_string(&rounds)?,
            opening_turn,
        })
    }

    /// Writes the full transcript as pretty-printed JSON into `dir`, file
    /// name = match id. Returns the path written.
    pub fn export(&self, dir: &str) -> std::io::Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = Path::new(dir).join(format!("{}.json", self.game_id));
        let serialized = serde_json::to_string_pretty(self)?;
        fs::write(&path, serialized)?;
        Ok(path)
    }

    pub fn load_from_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let file = fs::File::open(path)?;
        let record: GameRecord = serde_json::from_reader(file)?;
        Ok(record)
    }
}
