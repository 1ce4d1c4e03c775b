mod backend;
mod config;
mod dialogue;
mod errors;
mod handlers;
mod telegram;

use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use tokio::task::JoinSet;
use tracing_subscriber::prelude::*;

use backend::{HttpBackend, NotesBackend};
use dialogue::SessionStore;
use handlers::Bot;
use telegram::{ChatId, Message, TelegramClient, Update};

const RETRY_DELAY: Duration = Duration::from_secs(5);

#[derive(thiserror::Error, Debug)]
enum StartupError {
    #[error(transparent)]
    Config(#[from] config::Error),
    #[error(transparent)]
    Client(#[from] errors::Error),
}

fn setup_tracing(json: bool) {
    let tracing = tracing_subscriber::registry().with(
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "notes_bot=debug".into()),
    );

    if json {
        tracing.with(tracing_subscriber::fmt::layer().json()).try_init().ok();
    } else {
        tracing
            .with(tracing_subscriber::fmt::layer().compact().with_target(false))
            .try_init()
            .ok();
    };
}

#[tokio::main]
async fn main() -> Result<(), StartupError> {
    let config = config::init()?;
    setup_tracing(config.json_logs());

    let telegram = TelegramClient::new(config)?;
    let bot = Arc::new(Bot::new(
        HttpBackend::new(config)?,
        SessionStore::new(config.dialogue_timeout()),
    ));

    if let Err(e) = telegram.set_my_commands(&handlers::commands()).await {
        tracing::warn!("could not register the command menu: {e}");
    }

    tracing::info!(backend = %config.backend_url(), "bot started");

    tokio::select! {
        _ = poll(telegram, bot) => {},
        _ = tokio::signal::ctrl_c() => tracing::info!("shutting down"),
    }

    Ok(())
}

/// Long-polls forever. Transport errors are logged and retried after a pause.
async fn poll<B>(telegram: TelegramClient, bot: Arc<Bot<B>>)
where
    B: NotesBackend + 'static,
{
    let mut offset = 0;

    loop {
        let expired = bot.sessions().sweep(Instant::now());
        if expired > 0 {
            tracing::debug!(expired, "expired dialogues dropped");
        }

        let updates = match telegram.get_updates(offset).await {
            Ok(updates) => updates,
            Err(e) => {
                tracing::error!("getUpdates failed: {e}");
                tokio::time::sleep(RETRY_DELAY).await;
                continue;
            }
        };

        if let Some(last) = updates.last() {
            offset = last.update_id + 1;
        }
        dispatch(&telegram, &bot, updates).await;
    }
}

/// Chats are served concurrently; messages of one chat keep their order.
async fn dispatch<B>(telegram: &TelegramClient, bot: &Arc<Bot<B>>, updates: Vec<Update>)
where
    B: NotesBackend + 'static,
{
    let mut chats: HashMap<ChatId, Vec<Message>> = HashMap::new();
    for message in updates.into_iter().filter_map(|update| update.message) {
        chats.entry(message.chat.id).or_default().push(message);
    }

    let mut tasks = JoinSet::new();
    for (_, messages) in chats {
        let telegram = telegram.clone();
        let bot = bot.clone();
        tasks.spawn(async move {
            for message in messages {
                reply(&telegram, &bot, message).await;
            }
        });
    }

    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            tracing::error!("chat task failed: {e}");
        }
    }
}

async fn reply<B>(telegram: &TelegramClient, bot: &Bot<B>, message: Message)
where
    B: NotesBackend,
{
    let chat_id = message.chat.id;
    let Some(text) = message.text.as_deref() else {
        tracing::debug!(chat_id, message_id = message.message_id, "non-text message skipped");
        return;
    };
    let user_id = message.from.as_ref().map_or(chat_id, |user| user.id);

    let replies = bot.handle(chat_id, user_id, text, Instant::now()).await;
    for reply in replies {
        if let Err(e) = telegram.send_message(chat_id, &reply).await {
            tracing::warn!(chat_id, "sendMessage failed: {e}");
        }
    }
}
