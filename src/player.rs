use crate::contract::{self, PerformanceDecision, VoteDecision};
use crate::error::{AgentError, ContractViolation};
use crate::llm::{ChatBackend, ChatMessage};
use crate::prompt::{self, PromptFields, PromptLibrary};
use crate::record::{HistoryContext, RoundContext};
use log::warn;

/// Attempts per turn before the agent gives up and aborts the match.
pub const MAX_ATTEMPTS: u32 = 10;

const OPENING_NOTICE: &str = "You are the very first player to speak in this match. \
    There is no history yet, so speak carefully and avoid giving your word away.";

const PERFORM_FORMAT_WARNING: &str = "\n\n[WARNING] Your reply must contain a JSON object \
    with the five fields \"description\", \"tendency\", \"self_prediction\", \
    \"keyword_prediction\" and \"perform_reason\".";

const VOTE_FORMAT_WARNING: &str = "\n\n[WARNING] Your reply must contain a JSON object \
    with the two fields \"voted_player\" and \"vote_reason\".";

const VOTE_TARGET_WARNING: &str = "\n\n[WARNING] Your vote target was not eligible: you \
    cannot vote for a player who has already been eliminated, and you must use an exact \
    player name from the current list.";

/// One participant: identity, secret word, life status, and the backend
/// model that speaks for it. The agent produces decisions but never touches
/// the transcript; recording is the engine's job.
#[derive(Debug, Clone)]
pub struct Player {
    pub name: String,
    pub model: String,
    pub keyword: String,
    pub alive: bool,
}

impl Player {
    pub fn new(name: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
            keyword: String::new(),
            alive: true,
        }
    }

    fn build_prompt(
        &self,
        template: &str,
        rules: &str,
        round: &RoundContext,
        history: &HistoryContext,
    ) -> String {
        // The opening speaker of the match gets a canned notice instead of
        // an empty-but-structured history block.
        let previous_info = if history.opening_turn {
            OPENING_NOTICE
        } else {
            history.serialized.as_str()
        };
        prompt::fill(
            template,
            &PromptFields {
                rules,
                self_name: &self.name,
                self_keyword: &self.keyword,
                round_count: round.round_count,
                player_list: &round.player_list,
                player_count: round.player_count,
                previous_info,
            },
        )
    }

    /// Produces one description-turn decision, retrying on contract
    /// violations with corrective feedback appended to the prompt.
    pub async fn perform<B: ChatBackend>(
        &self,
        backend: &B,
        prompts: &PromptLibrary,
        round: &RoundContext,
        history: &HistoryContext,
    ) -> Result<(PerformanceDecision, String), AgentError> {
        let mut prompt = self.build_prompt(&prompts.perform_template, &prompts.rules, round, history);

        for attempt in 1..=MAX_ATTEMPTS {
            let messages = [ChatMessage::user(prompt.clone())];
            let reply = backend.chat(&messages, &self.model).await?;

            match contract::parse_performance(&reply.content) {
                Ok(decision) => return Ok((decision, reply.reasoning)),
                Err(violation) => {
                    warn!(
                        "Player {} description attempt {}/{} rejected: {}",
                        self.name, attempt, MAX_ATTEMPTS, violation
                    );
                    prompt.push_str(PERFORM_FORMAT_WARNING);
                }
            }
        }

        Err(AgentError::ExhaustedRetries {
            player: self.name.clone(),
            turn: "description",
            attempts: MAX_ATTEMPTS,
        })
    }

    /// Produces one vote-turn decision. The vote target must be a currently
    /// living player, which the round context's roster defines.
    pub async fn vote<B: ChatBackend>(
        &self,
        backend: &B,
        prompts: &PromptLibrary,
        round: &RoundContext,
        history: &HistoryContext,
    ) -> Result<(VoteDecision, String), AgentError> {
        let mut prompt = self.build_prompt(&prompts.vote_template, &prompts.rules, round, history);

        for attempt in 1..=MAX_ATTEMPTS {
            let messages = [ChatMessage::user(prompt.clone())];
            let reply = backend.chat(&messages, &self.model).await?;

            match contract::parse_vote(&reply.content, &round.player_list) {
                Ok(decision) => return Ok((decision, reply.reasoning)),
                Err(violation) => {
                    warn!(
                        "Player {} vote attempt {}/{} rejected: {}",
                        self.name, attempt, MAX_ATTEMPTS, violation
                    );
                    prompt.push_str(match violation {
                        ContractViolation::MalformedShape(_) => VOTE_FORMAT_WARNING,
                        ContractViolation::InvalidTarget(_) => VOTE_TARGET_WARNING,
                    });
                }
            }
        }

        Err(AgentError::ExhaustedRetries {
            player: self.name.clone(),
            turn: "vote",
            attempts: MAX_ATTEMPTS,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;
    use crate::llm::ChatReply;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    // Hands out scripted replies and keeps every prompt it was sent.
    struct ScriptedBackend {
        replies: Mutex<VecDeque<String>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedBackend {
        fn new(replies: Vec<&str>) -> Self {
            Self {
                replies: Mutex::new(replies.into_iter().map(String::from).collect()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }
    }

    impl ChatBackend for ScriptedBackend {
        async fn chat(
            &self,
            messages: &[ChatMessage],
            _model: &str,
        ) -> Result<ChatReply, LlmError> {
            self.prompts
                .lock()
                .unwrap()
                .push(messages[0].content.clone());
            let content = self.replies.lock().unwrap().pop_front().unwrap_or_default();
            Ok(ChatReply {
                content,
                reasoning: String::new(),
            })
        }
    }

    fn player() -> Player {
        let mut player = Player::new("Alice", "test-model");
        player.keyword = "Werewolf".to_string();
        player
    }

    fn round() -> RoundContext {
        RoundContext {
            round_count: 1,
            player_list: vec!["Alice".to_string(), "Bob".to_string()],
            player_count: 2,
        }
    }

    fn opening_history() -> HistoryContext {
        HistoryContext {
            serialized: "[]".to_string(),
            opening_turn: true,
        }
    }

    fn prompts() -> PromptLibrary {
        PromptLibrary {
            rules: "rules".to_string(),
            perform_template: "{self_name}/{self_keyword}: {previous_info}".to_string(),
            vote_template: "{self_name} votes, history: {previous_info}".to_string(),
        }
    }

    const VALID_PERFORMANCE: &str = r#"{"description": "d", "tendency": "t",
        "self_prediction": false, "keyword_prediction": "", "perform_reason": "r"}"#;

    #[tokio::test]
    async fn opening_turn_uses_canned_notice() {
        let backend = ScriptedBackend::new(vec![VALID_PERFORMANCE]);
        player()
            .perform(&backend, &prompts(), &round(), &opening_history())
            .await
            .unwrap();
        let sent = backend.prompts();
        assert!(sent[0].contains("first player to speak"));
        assert!(!sent[0].contains("[]"));
    }

    #[tokio::test]
    async fn perform_succeeds_on_tenth_attempt() {
        let mut replies = vec!["not json"; 9];
        replies.push(VALID_PERFORMANCE);
        let backend = ScriptedBackend::new(replies);

        let history = HistoryContext {
            serialized: "[history]".to_string(),
            opening_turn: false,
        };
        let (decision, _) = player()
            .perform(&backend, &prompts(), &round(), &history)
            .await
            .unwrap();
        assert_eq!(decision.description, "d");
        assert_eq!(backend.prompts().len(), 10);
        // Each failed attempt appends corrective feedback to the prompt.
        assert!(backend.prompts()[9].contains("[WARNING]"));
    }

    #[tokio::test]
    async fn perform_exhausts_after_ten_failures() {
        let backend = ScriptedBackend::new(vec!["garbage"; 10]);
        let err = player()
            .perform(&backend, &prompts(), &round(), &opening_history())
            .await
            .unwrap_err();
        match err {
            AgentError::ExhaustedRetries { player, attempts, .. } => {
                assert_eq!(player, "Alice");
                assert_eq!(attempts, 10);
            }
            other => panic!("expected ExhaustedRetries, got {:?}", other),
        }
        assert_eq!(backend.prompts().len(), 10);
    }

    #[tokio::test]
    async fn vote_retries_on_ineligible_target_with_specific_warning() {
        let backend = ScriptedBackend::new(vec![
            r#"{"voted_player": "Mallory", "vote_reason": "hunch"}"#,
            r#"{"voted_player": "Bob", "vote_reason": "hunch"}"#,
        ]);
        let history = HistoryContext {
            serialized: "[history]".to_string(),
            opening_turn: false,
        };
        let (decision, _) = player()
            .vote(&backend, &prompts(), &round(), &history)
            .await
            .unwrap();
        assert_eq!(decision.voted_player, "Bob");
        assert!(backend.prompts()[1].contains("already been eliminated"));
    }
}
