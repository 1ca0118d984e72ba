use log::{error, info};
use undercover::engine::Game;
use undercover::llm::LlmClient;
use undercover::logging;
use undercover::prompt::PromptLibrary;
use undercover::settings::Settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init()?;

    // A missing settings file just means a default match.
    let settings = Settings::load().unwrap_or_else(|_| {
        info!("No settings file found, using defaults");
        Settings::default()
    });

    info!("Match roster:");
    for player in &settings.players {
        info!("  {} (model {})", player.name, player.model);
    }

    let backend = LlmClient::new(&settings.api_base_url, settings.api_key.as_deref())?;
    let prompts = PromptLibrary::load(&settings.prompt_dir);

    let mut game = Game::new(
        settings.players.clone(),
        &settings.civil_keyword,
        &settings.spy_keyword,
        &settings.records_dir,
        prompts,
        backend,
    )?;

    match game.run().await {
        Ok(winner) => {
            println!("The {} side wins!", winner);
            Ok(())
        }
        Err(e) => {
            error!("Match aborted: {}", e);
            Err(e.into())
        }
    }
}
