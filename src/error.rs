use thiserror::Error;

// Enum for handling various application-level errors.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Game error: {:#}", 0)]
    Game(#[from] GameError), // Errors specific to game logic or transcript state.

    #[error("Agent error: {:#}", 0)]
    Agent(#[from] AgentError), // Errors raised while obtaining a player decision.

    #[error("Serialization error: {:#}", 0)]
    Serialization(#[from] serde_json::Error), // Errors related to data serialization.

    #[error("IO error: {:#}", 0)]
    IO(#[from] std::io::Error), // Input/output errors.
}

// Enum for game-specific errors.
#[derive(Debug, Error)]
pub enum GameError {
    #[error("No round is open")]
    NoOpenRound, // A record operation was attempted before any round started.

    #[error("Round {0} is still open")]
    RoundStillOpen(u32), // A new round was opened while the previous outcome is unset.

    #[error("Round {0} already has a voting result")]
    OutcomeAlreadyRecorded(u32), // Finalizing the same round twice.

    #[error("Player not found: {0}")]
    PlayerNotFound(String),

    #[error("Cannot start a match with an empty roster")]
    EmptyRoster,
}

/// A backend reply that failed the structured-response contract.
///
/// Violations are expected and recoverable: the agent appends the message to
/// its prompt and retries. Only retry exhaustion becomes a hard failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ContractViolation {
    #[error("malformed reply: {0}")]
    MalformedShape(String),

    #[error("invalid vote target: {0}")]
    InvalidTarget(String),
}

// Errors raised by an agent while producing a single decision.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("player {player} failed to produce a valid {turn} decision after {attempts} attempts")]
    ExhaustedRetries {
        player: String,
        turn: &'static str,
        attempts: u32,
    },

    #[error("LLM error: {:#}", 0)]
    Llm(#[from] LlmError), // Hard transport failures, not retried.
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Transport failure: {0}")]
    Transport(String),
}
