use std::error::Error;
use std::sync::Arc;

use pollquizbot::commands::Command;
use pollquizbot::config::Config;
use pollquizbot::database::connection::Connection;
use pollquizbot::registry::SessionRegistry;
use pollquizbot::schema::schema;
use pollquizbot::state::QuizState;
use pollquizbot::transport::TelegramTransport;
use teloxide::dispatching::dialogue::InMemStorage;
use teloxide::error_handlers::IgnoringErrorHandlerSafe;
use teloxide::prelude::*;
use teloxide::update_listeners::webhooks::{self, Options};
use teloxide::utils::command::BotCommands;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync + 'static>> {
    let config = Config::from_env()?;

    tracing_log::LogTracer::init()?;
    let subscriber = tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::new(&config.log_level))
        .with_line_number(true)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let connection = Arc::new(Connection::connect(&config.database_url).await?);
    connection.run_migrations().await?;

    let bot = Bot::new(config.token.clone());
    bot.set_my_commands(Command::bot_commands()).await?;
    info!("Starting bot...");

    let registry = Arc::new(SessionRegistry::new(config.speeds));
    let transport = Arc::new(TelegramTransport::new(bot.clone()));

    let mut dispatcher = Dispatcher::builder(bot.clone(), schema())
        .dependencies(dptree::deps![
            InMemStorage::<QuizState>::new(),
            connection,
            registry,
            transport
        ])
        .enable_ctrlc_handler()
        .build();

    if let Some(webhook) = config.webhook {
        info!(url = %webhook.url, addr = %webhook.addr, "Listening for webhook updates");
        let listener = webhooks::axum(bot, Options::new(webhook.addr, webhook.url)).await?;
        dispatcher
            .dispatch_with_listener(listener, Arc::new(IgnoringErrorHandlerSafe))
            .await;
    } else {
        dispatcher.dispatch().await;
    }

    Ok(())
}
