// Rolewarden
// A small Discord bot shell: reaction roles, per-guild JSON configs and event listeners

mod commands;
mod features;
mod handlers;
mod listeners;
mod models;
mod platform;
mod utils;

#[cfg(test)]
mod test_support;

use std::collections::HashSet;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use poise::serenity_prelude as serenity;
use tokio::sync::RwLock;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::features::dispatcher::Listeners;
use crate::features::documents::Documents;
use crate::features::guild_configs::GuildConfigs;
use crate::features::lifecycle::Lifecycle;
use crate::features::store::JsonStore;
use crate::platform::{ChatClient, Gateway};
use crate::utils::config::Settings;

/// Application context shared by commands, listeners and the lifecycle
#[derive(Clone)]
pub struct Data {
    pub settings: Arc<Settings>,
    pub store: Arc<JsonStore>,
    pub guild_configs: Arc<GuildConfigs>,
    pub documents: Arc<Documents>,
    pub listeners: Arc<Listeners>,
    pub lifecycle: Arc<Lifecycle>,
    /// Prefixes that address the bot: command symbols, then mention forms once known
    pub command_triggers: Arc<RwLock<Vec<String>>>,
    gateway: Arc<OnceCell<Arc<dyn Gateway>>>,
    pub twitch: Option<Arc<dyn ChatClient>>,
}

impl Data {
    pub fn new(settings: Settings, listeners: Listeners, twitch: Option<Arc<dyn ChatClient>>) -> Self {
        let store = JsonStore::new(&settings.filecache_path, settings.filecache_prefix.clone());
        let command_triggers = settings.command_symbols.clone();
        Self {
            settings: Arc::new(settings),
            store: Arc::new(store),
            guild_configs: Arc::new(GuildConfigs::new()),
            documents: Arc::new(Documents::default()),
            listeners: Arc::new(listeners),
            lifecycle: Arc::new(Lifecycle::new()),
            command_triggers: Arc::new(RwLock::new(command_triggers)),
            gateway: Arc::new(OnceCell::new()),
            twitch,
        }
    }

    /// Gateway used by the reaction-role engine, available once Discord is ready
    pub fn gateway(&self) -> Option<Arc<dyn Gateway>> {
        self.gateway.get().cloned()
    }

    /// First attachment wins; reconnects keep the original gateway
    pub fn attach_gateway(&self, gateway: Arc<dyn Gateway>) {
        let _ = self.gateway.set(gateway);
    }

    /// Let `<@id>` and `<@!id>` work as command prefixes
    pub async fn add_mention_triggers(&self, bot_id: serenity::UserId) {
        let mut triggers = self.command_triggers.write().await;
        for mention in [format!("<@{}>", bot_id), format!("<@!{}>", bot_id)] {
            if !triggers.contains(&mention) {
                triggers.push(mention);
            }
        }
    }
}

// Manual Debug impl since the trait objects don't impl Debug
impl std::fmt::Debug for Data {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Data")
            .field("store", &self.store)
            .field("guild_configs", &self.guild_configs.len())
            .field("gateway", &self.gateway.get().map(|_| "Gateway"))
            .field("twitch", &self.twitch.as_ref().map(|client| client.name()))
            .finish()
    }
}

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;

/// Register all commands
fn get_commands() -> Vec<poise::Command<Data, Error>> {
    vec![commands::config::config(), commands::rolepicker::rolepicker()]
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "rolewarden=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::from_env()?;
    let token = settings.discord_token.clone();
    let owners: HashSet<serenity::UserId> = settings.owner_id.into_iter().collect();

    info!("Starting Rolewarden...");

    // No secondary chat client is configured in this build
    let data = Data::new(settings, listeners::default_listeners(), None);
    data.lifecycle.run(&data).await;

    let setup_data = data.clone();
    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: get_commands(),
            prefix_options: poise::PrefixFrameworkOptions {
                stripped_dynamic_prefix: Some(handlers::stripped_prefix),
                ..Default::default()
            },
            owners,
            on_error: |error| {
                Box::pin(async move {
                    match error {
                        poise::FrameworkError::Command { error, ctx, .. } => {
                            error!("Command error: {:?}", error);
                            let _ = ctx.say(format!("Error: {}", error)).await;
                        }
                        err => {
                            if let Err(e) = poise::builtins::on_error(err).await {
                                error!("Error while handling error: {:?}", e);
                            }
                        }
                    }
                })
            },
            event_handler: |ctx, event, framework, data| {
                Box::pin(handlers::event_handler(ctx, event, framework, data))
            },
            ..Default::default()
        })
        .setup(|ctx, ready, framework| {
            Box::pin(async move {
                handlers::on_ready(ctx, ready, framework, &setup_data).await?;
                Ok(setup_data)
            })
        })
        .build();

    // GUILD_MEMBERS and MESSAGE_CONTENT are privileged, enable them in the Discord Dev Portal
    let intents = serenity::GatewayIntents::GUILDS
        | serenity::GatewayIntents::GUILD_MEMBERS
        | serenity::GatewayIntents::GUILD_MODERATION
        | serenity::GatewayIntents::GUILD_MESSAGES
        | serenity::GatewayIntents::GUILD_MESSAGE_REACTIONS
        | serenity::GatewayIntents::MESSAGE_CONTENT;

    // Keep recent messages so update events can carry the previous version
    let mut cache_settings = ::serenity::cache::Settings::default();
    cache_settings.max_messages = 200;

    let mut client = serenity::ClientBuilder::new(token, intents)
        .cache_settings(cache_settings)
        .framework(framework)
        .await?;

    data.lifecycle.attach_shard_manager(client.shard_manager.clone());

    // Flush configs, then disconnect
    let shutdown_data = data.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to register Ctrl+C handler: {}", e);
            return;
        }
        // Before ready the working copies are still empty and must not overwrite disk
        if shutdown_data.lifecycle.is_running().await {
            match shutdown_data.guild_configs.save(&shutdown_data.store).await {
                Ok(()) => info!("Saved {} guild config(s)", shutdown_data.guild_configs.len()),
                Err(e) => error!("Failed to save guild configs on shutdown: {}", e),
            }
            shutdown_data.documents.save(&shutdown_data.store).await;
        }
        shutdown_data.lifecycle.stop(&shutdown_data).await;
    });

    if let Err(why) = client.start().await {
        error!("Client error: {:?}", why);
    }

    info!("Goodbye!");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_data;

    #[tokio::test]
    async fn test_mention_triggers_added_once() {
        let dir = tempfile::tempdir().unwrap();
        let data = test_data(dir.path(), Listeners::default());
        let bot = serenity::UserId::new(42);

        data.add_mention_triggers(bot).await;
        data.add_mention_triggers(bot).await;

        let triggers = data.command_triggers.read().await.clone();
        assert_eq!(triggers, vec!["t!", "<@42>", "<@!42>"]);
    }

    #[test]
    fn test_gateway_starts_detached() {
        let dir = tempfile::tempdir().unwrap();
        let data = test_data(dir.path(), Listeners::default());
        assert!(data.gateway().is_none());
    }
}
