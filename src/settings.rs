use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};

// One roster slot: a display name plus the backend model that plays it.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct PlayerConfig {
    pub name: String,
    pub model: String,
}

// Define a structure to hold application settings with serialization and
// deserialization capabilities.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Settings {
    pub api_base_url: String, // Base URL of the OpenAI-compatible backend.
    pub api_key: Option<String>, // Optional API key for the backend.
    pub civil_keyword: String, // The word the majority receives.
    pub spy_keyword: String,  // The word the single undercover player receives.
    pub prompt_dir: String,   // Directory holding the rule text and turn templates.
    pub records_dir: String,  // Directory transcripts are exported into.
    pub players: Vec<PlayerConfig>, // The fixed roster for a match.
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            api_base_url: "http://localhost:3000/v1".to_string(),
            api_key: None,
            civil_keyword: "Werewolf".to_string(),
            spy_keyword: "Mafia".to_string(),
            prompt_dir: "./prompt".to_string(),
            records_dir: "./game_records".to_string(),
            players: vec![
                PlayerConfig {
                    name: "Qwen-32B-Instruct".to_string(),
                    model: "Qwen/Qwen2.5-32B-Instruct".to_string(),
                },
                PlayerConfig {
                    name: "Qwen-32B".to_string(),
                    model: "Qwen/QwQ-32B".to_string(),
                },
                PlayerConfig {
                    name: "DeepSeek-R1-32B".to_string(),
                    model: "deepseek-ai/DeepSeek-R1-Distill-Qwen-32B".to_string(),
                },
                PlayerConfig {
                    name: "DeepSeek-V2.5".to_string(),
                    model: "deepseek-ai/DeepSeek-V2.5".to_string(),
                },
                PlayerConfig {
                    name: "DeepSeek-V3".to_string(),
                    model: "deepseek-ai/DeepSeek-V3".to_string(),
                },
                PlayerConfig {
                    name: "DeepSeek-R1".to_string(),
                    model: "deepseek-reasoner".to_string(),
                },
            ],
        }
    }
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    // Load settings from the default file path.
    pub fn load() -> io::Result<Self> {
        Self::load_settings_from_file("./data/settings.json")
    }

    // Save current settings to the default file path.
    pub fn save(&self) -> io::Result<()> {
        std::fs::create_dir_all("./data")?; // Ensure the data directory exists.
        self.save_to_file("./data/settings.json")
    }

    // Load settings from a specified file path.
    pub fn load_settings_from_file(path: &str) -> io::Result<Self> {
        let data = fs::read_to_string(path)?;
        let settings = serde_json::from_str(&data)?;
        Ok(settings)
    }

    // Save current settings to a specified file path.
    pub fn save_to_file(&self, path: &str) -> io::Result<()> {
        let data = serde_json::to_string_pretty(self)?;
        if let Some(parent) = std::path::Path::new(path).parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = fs::File::create(path)?;
        file.write_all(data.as_bytes())?;
        Ok(())
    }
}
