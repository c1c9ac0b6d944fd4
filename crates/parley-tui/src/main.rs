mod app;
mod handler;
mod logging;
mod tui;
mod ui;

use std::sync::Arc;

use anyhow::Result;
use parley_core::config::API_TOKEN_ENV;
use parley_core::{store, ChatCompletionClient, ChatManager, ConfigStore, ConversationStore, ServerConfig};
use tracing::{info, warn};

use app::App;
use tui::{EventHandler, Tui};

#[tokio::main]
async fn main() -> Result<()> {
    let data_dir = store::data_dir()?;
    let log_path = logging::init(&data_dir)?;
    info!(log = %log_path.display(), "starting parley");

    let config_store = ConfigStore::open_default()?;
    let server = config_store
        .load()
        .unwrap_or_else(|e| {
            warn!(path = %config_store.path().display(), error = %e, "unreadable config, using defaults");
            ServerConfig::new()
        })
        .with_env_token(std::env::var(API_TOKEN_ENV).ok());

    let manager = ChatManager::new(
        Arc::new(ChatCompletionClient::new()),
        ConversationStore::in_dir(&data_dir),
        server,
    )
    .with_config_store(config_store);
    manager.initialize();
    let manager = Arc::new(manager);

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = EventHandler::new(manager.subscribe());
    let mut app = App::new(manager);

    let result = run(&mut terminal, &mut app, &mut events).await;

    tui::restore()?;
    info!("bye");
    result
}

async fn run(terminal: &mut Tui, app: &mut App, events: &mut EventHandler) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(app, event),
            None => break,
        }
    }
    Ok(())
}
