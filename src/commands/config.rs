use std::collections::BTreeMap;

use poise::serenity_prelude as serenity;
use tracing::{error, info};

use crate::utils::config::colors;
use crate::{Context, Error};

/// Manage this server's bot configuration
#[poise::command(
    slash_command,
    prefix_command,
    guild_only,
    required_permissions = "MANAGE_GUILD",
    subcommands("save", "show")
)]
pub async fn config(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Write every guild config to disk now
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn save(ctx: Context<'_>) -> Result<(), Error> {
    ctx.defer_ephemeral().await?;
    let data = ctx.data();

    match data.guild_configs.save(&data.store).await {
        Ok(()) => {
            info!("Configs saved on request of {}", ctx.author().name);
            let embed = serenity::CreateEmbed::new()
                .title("Configuration Saved")
                .description(format!("Wrote {} guild config(s)", data.guild_configs.len()))
                .color(colors::SUCCESS);
            ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true)).await?;
        }
        Err(e) => {
            error!("Failed to save guild configs: {}", e);
            let embed = serenity::CreateEmbed::new()
                .title("Save Failed")
                .description(e.to_string())
                .color(colors::ERROR);
            ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true)).await?;
        }
    }

    Ok(())
}

/// Show the current server configuration
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn show(ctx: Context<'_>) -> Result<(), Error> {
    let Some(guild_id) = ctx.guild_id() else {
        ctx.say("This command can only be used in a server.").await?;
        return Ok(());
    };

    let Some(config) = ctx.data().guild_configs.get(guild_id) else {
        ctx.say("No configuration exists for this server yet.").await?;
        return Ok(());
    };

    let toggles = config
        .toggles
        .iter()
        .map(|(name, on)| format!("`{}`: {}", name, if *on { "on" } else { "off" }))
        .collect::<Vec<_>>()
        .join("\n");

    let embed = serenity::CreateEmbed::new()
        .title("Server Configuration")
        .field("Toggles", or_none(toggles), false)
        .field("Channels", format_ids(&config.channels, "#"), true)
        .field("Roles", format_ids(&config.roles, "@&"), true)
        .field(
            "Reaction Role Groups",
            config.reaction_roles.len().to_string(),
            true,
        )
        .color(colors::INFO);

    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// One line per slot; unset slots read "Not set"
fn format_ids(slots: &BTreeMap<String, String>, mention: &str) -> String {
    let lines = slots
        .iter()
        .map(|(name, id)| {
            if id.is_empty() {
                format!("`{}`: Not set", name)
            } else {
                format!("`{}`: <{}{}>", name, mention, id)
            }
        })
        .collect::<Vec<_>>()
        .join("\n");
    or_none(lines)
}

fn or_none(text: String) -> String {
    if text.is_empty() {
        "None".to_string()
    } else {
        text
    }
}
