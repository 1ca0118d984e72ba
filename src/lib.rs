pub mod contract;
pub mod engine;
pub mod error;
pub mod llm;
pub mod logging;
pub mod player;
pub mod prompt;
pub mod record;
pub mod settings;

// Re-export commonly used items for easier access
pub use contract::{PerformanceDecision, VoteDecision};
pub use engine::{Game, Winner};
pub use error::{AgentError, AppError, ContractViolation, GameError, LlmError};
pub use llm::{ChatBackend, ChatMessage, ChatReply, LlmClient};
pub use player::Player;
pub use prompt::PromptLibrary;
pub use record::{GameRecord, PerformanceEntry, PlayerInitialState, VoteEntry, VotingResult};
pub use settings::{PlayerConfig, Settings};
