// Gateway glue
// Turns serenity events into BotEvents and routes them to features and listeners

use std::sync::Arc;

use futures::future::BoxFuture;
use poise::serenity_prelude as serenity;
use tracing::{debug, error, info, warn};

use crate::features::dispatcher::BotEvent;
use crate::features::reaction_roles::{handle_reaction, ReactionAction, ReactionEvent};
use crate::platform::discord::SerenityGateway;
use crate::utils::config::AUTOSAVE_INTERVAL;
use crate::{Data, Error};

/// Framework setup hook: everything that happens once Discord reports ready
pub async fn on_ready(
    ctx: &serenity::Context,
    ready: &serenity::Ready,
    framework: &poise::Framework<Data, Error>,
    data: &Data,
) -> Result<(), Error> {
    let bot_id = ready.user.id;
    info!("Connected as {} ({})", ready.user.name, bot_id);
    data.attach_gateway(Arc::new(SerenityGateway::from_context(ctx, bot_id)));

    let guilds: Vec<(serenity::GuildId, String)> = ready
        .guilds
        .iter()
        .map(|guild| {
            let name = ctx
                .cache
                .guild(guild.id)
                .map(|cached| cached.name.clone())
                .unwrap_or_else(|| guild.id.to_string());
            (guild.id, name)
        })
        .collect();

    data.lifecycle.initialize(data, bot_id, &guilds).await;

    // Runs on its own; ready listeners above do not wait for it
    let commands = poise::builtins::create_application_commands(&framework.options().commands);
    let http = ctx.http.clone();
    let owner_guild = data.settings.owner_guild_id;
    let slash_data = data.clone();
    tokio::spawn(async move {
        match refresh_slash_commands(&http, commands, owner_guild).await {
            Ok(registered) => {
                info!("Registered {} slash command(s)", registered.len());
                let event = BotEvent::ReadySlash { commands: registered };
                slash_data.listeners.dispatch(&slash_data, &event).await;
            }
            Err(e) => error!("Failed to refresh slash commands: {:?}", e),
        }
    });

    data.lifecycle.enter_running(data, AUTOSAVE_INTERVAL).await;
    Ok(())
}

/// Register commands in the owner guild when configured (instant), otherwise globally
async fn refresh_slash_commands(
    http: &Arc<serenity::Http>,
    commands: Vec<serenity::CreateCommand>,
    owner_guild: Option<serenity::GuildId>,
) -> Result<Vec<serenity::Command>, serenity::Error> {
    match owner_guild {
        Some(guild_id) => guild_id.set_commands(http, commands).await,
        None => serenity::Command::set_global_commands(http, commands).await,
    }
}

/// Framework event hook
pub async fn event_handler(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    _framework: poise::FrameworkContext<'_, Data, Error>,
    data: &Data,
) -> Result<(), Error> {
    if !data.lifecycle.is_running().await {
        debug!("Dropping {} before startup finished", event.snake_case_name());
        return Ok(());
    }

    let Some(bot_event) = BotEvent::from_full_event(event) else {
        return Ok(());
    };

    match &bot_event {
        BotEvent::GuildCreate { guild, .. } => {
            data.guild_configs
                .ensure_template(&data.store, guild.id, &guild.name)
                .await;
        }
        BotEvent::ReactionAdd { reaction } => {
            route_reaction(ctx, data, reaction, ReactionAction::Add).await;
        }
        BotEvent::ReactionRemove { reaction } => {
            route_reaction(ctx, data, reaction, ReactionAction::Remove).await;
        }
        _ => {}
    }

    data.listeners.dispatch(data, &bot_event).await;
    Ok(())
}

async fn route_reaction(
    ctx: &serenity::Context,
    data: &Data,
    reaction: &serenity::Reaction,
    action: ReactionAction,
) {
    let Some(event) = ReactionEvent::from_reaction(reaction) else {
        return;
    };
    let gateway = match data.gateway() {
        Some(gateway) => gateway,
        None => {
            warn!("Reaction arrived before the gateway was attached");
            let bot_id = ctx.cache.current_user().id;
            let gateway: Arc<dyn crate::platform::Gateway> =
                Arc::new(SerenityGateway::from_context(ctx, bot_id));
            gateway
        }
    };

    let outcomes = handle_reaction(&gateway, &data.guild_configs, &event, action).await;
    debug!("Reaction {} on {}: {:?}", event.emoji, event.message_id, outcomes);
}

/// Split a message into (trigger, rest) if it starts with any command trigger
pub fn strip_trigger<'a>(content: &'a str, triggers: &[String]) -> Option<(&'a str, &'a str)> {
    triggers
        .iter()
        .filter(|trigger| !trigger.is_empty())
        .find_map(|trigger| {
            content
                .strip_prefix(trigger.as_str())
                .map(|rest| (&content[..trigger.len()], rest.trim_start()))
        })
}

/// Prefix hook: configured symbols plus the bot's own mention forms
pub fn stripped_prefix<'a>(
    _ctx: &'a serenity::Context,
    msg: &'a serenity::Message,
    data: &'a Data,
) -> BoxFuture<'a, Result<Option<(&'a str, &'a str)>, Error>> {
    Box::pin(async move {
        let triggers = data.command_triggers.read().await;
        Ok(strip_trigger(&msg.content, &triggers))
    })
}
