// Lifecycle controller
// Constructed -> AwaitingReady -> Initializing -> Running -> Stopping -> Stopped

use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::OnceCell;
use poise::serenity_prelude as serenity;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::features::dispatcher::BotEvent;
use crate::Data;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Constructed,
    AwaitingReady,
    Initializing,
    Running,
    Stopping,
    Stopped,
}

pub struct Lifecycle {
    state: RwLock<LifecycleState>,
    autosave: Mutex<Option<JoinHandle<()>>>,
    shard_manager: OnceCell<Arc<serenity::ShardManager>>,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(LifecycleState::Constructed),
            autosave: Mutex::new(None),
            shard_manager: OnceCell::new(),
        }
    }

    pub async fn state(&self) -> LifecycleState {
        *self.state.read().await
    }

    pub async fn is_running(&self) -> bool {
        self.state().await == LifecycleState::Running
    }

    async fn transition(&self, next: LifecycleState) {
        let mut state = self.state.write().await;
        debug!("Lifecycle {:?} -> {:?}", *state, next);
        *state = next;
    }

    /// Handle used by `stop` to disconnect the gateway
    pub fn attach_shard_manager(&self, shard_manager: Arc<serenity::ShardManager>) {
        if self.shard_manager.set(shard_manager).is_err() {
            warn!("Shard manager already attached");
        }
    }

    /// Start secondary collaborators and wait for Discord's ready signal
    pub async fn run(&self, data: &Data) {
        info!("Starting Twitch loop");
        match &data.twitch {
            Some(client) => {
                let client = client.clone();
                tokio::spawn(async move {
                    if let Err(e) = client.run().await {
                        warn!("{} client stopped: {}", client.name(), e);
                    }
                });
            }
            None => warn!("Twitch not set!"),
        }
        info!("Starting Discord loop");
        self.transition(LifecycleState::AwaitingReady).await;
    }

    /// Ready handling up to (and including) the ready listeners
    pub async fn initialize(
        &self,
        data: &Data,
        bot_id: serenity::UserId,
        guilds: &[(serenity::GuildId, String)],
    ) {
        self.transition(LifecycleState::Initializing).await;

        data.guild_configs.load(&data.store).await;
        for (guild_id, name) in guilds {
            if !data.guild_configs.contains(*guild_id) {
                data.guild_configs.ensure_template(&data.store, *guild_id, name).await;
            }
        }

        data.documents.load(&data.store).await;
        let guild_ids: Vec<serenity::GuildId> = guilds.iter().map(|(id, _)| *id).collect();
        data.documents.ensure_suggestions(&guild_ids).await;

        data.add_mention_triggers(bot_id).await;

        info!(
            "Initialized {} guild config(s) for {} joined guild(s)",
            data.guild_configs.len(),
            guilds.len()
        );

        let ready = BotEvent::Ready {
            user_id: bot_id,
            guild_ids,
        };
        data.listeners.dispatch(data, &ready).await;
    }

    /// Start the autosave timer and begin routing gateway events
    pub async fn enter_running(&self, data: &Data, autosave_every: Duration) {
        data.listeners.log_registrations();
        self.start_autosave(data, autosave_every).await;
        self.transition(LifecycleState::Running).await;
    }

    async fn start_autosave(&self, data: &Data, every: Duration) {
        let store = data.store.clone();
        let configs = data.guild_configs.clone();
        let handle = tokio::spawn(async move {
            let start = tokio::time::Instant::now() + every;
            let mut ticker = tokio::time::interval_at(start, every);
            loop {
                ticker.tick().await;
                configs.autosave(&store).await;
            }
        });

        if let Some(previous) = self.autosave.lock().await.replace(handle) {
            previous.abort();
        }
    }

    /// Disconnect. Configs are not flushed here; save first if needed.
    pub async fn stop(&self, data: &Data) {
        info!("Shutting down");
        self.transition(LifecycleState::Stopping).await;

        if let Some(handle) = self.autosave.lock().await.take() {
            handle.abort();
        }
        if let Some(client) = &data.twitch {
            client.stop().await;
        }
        match self.shard_manager.get() {
            Some(shard_manager) => shard_manager.shutdown_all().await,
            None => warn!("Discord not set!"),
        }

        self.transition(LifecycleState::Stopped).await;
    }
}
