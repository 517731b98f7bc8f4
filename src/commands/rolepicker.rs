// Rolepicker commands - post reaction-role messages and inspect groups

use poise::serenity_prelude as serenity;
use tracing::{info, warn};

use crate::models::guild::ReactionRoleGroup;
use crate::utils::config::colors;
use crate::{Context, Error};

/// Reaction role pickers
#[poise::command(
    slash_command,
    prefix_command,
    guild_only,
    required_permissions = "MANAGE_ROLES",
    subcommands("post", "list")
)]
pub async fn rolepicker(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Post a reaction role group in this channel
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn post(
    ctx: Context<'_>,
    #[description = "Reaction role group to post"]
    #[autocomplete = "autocomplete_group"]
    group: String,
) -> Result<(), Error> {
    let Some(guild_id) = ctx.guild_id() else {
        ctx.say("This command can only be used in a server.").await?;
        return Ok(());
    };

    ctx.defer_ephemeral().await?;
    let data = ctx.data();

    let Some(picker) = data.guild_configs.group(guild_id, &group) else {
        ctx.say(format!("There is no reaction role group named `{}`.", group)).await?;
        return Ok(());
    };

    let embed = serenity::CreateEmbed::new()
        .title(&group)
        .description(picker_description(&picker))
        .color(picker.default_color);
    let message = ctx
        .channel_id()
        .send_message(ctx.http(), serenity::CreateMessage::new().embed(embed))
        .await?;

    let (seeded, total) = seed_reactions(ctx, &message, &picker).await;

    data.guild_configs.bind_message(guild_id, &group, message.id);
    if let Err(e) = data.guild_configs.save(&data.store).await {
        warn!("Posted {} but could not save configs: {}", group, e);
    }
    info!("Posted rolepicker {} as message {} in guild {}", group, message.id, guild_id);

    let color = if seeded == total { colors::SUCCESS } else { colors::ERROR };
    let embed = serenity::CreateEmbed::new()
        .title("Rolepicker Posted")
        .description(format!("`{}` is live with {}/{} reactions", group, seeded, total))
        .color(color);
    ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true)).await?;

    Ok(())
}

/// List reaction role groups and where they are posted
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn list(ctx: Context<'_>) -> Result<(), Error> {
    let Some(guild_id) = ctx.guild_id() else {
        ctx.say("This command can only be used in a server.").await?;
        return Ok(());
    };

    let Some(config) = ctx.data().guild_configs.get(guild_id) else {
        ctx.say("No configuration exists for this server yet.").await?;
        return Ok(());
    };

    let lines: Vec<String> = config
        .reaction_roles
        .iter()
        .map(|(name, group)| group_summary(name, group))
        .collect();

    let description = if lines.is_empty() {
        "No reaction role groups configured.".to_string()
    } else {
        lines.join("\n")
    };

    let embed = serenity::CreateEmbed::new()
        .title("Reaction Role Groups")
        .description(description)
        .color(colors::INFO);
    ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true)).await?;

    Ok(())
}

/// React with every binding's emoji in order, each one after the previous succeeds.
/// Returns (reactions placed, reactions wanted).
async fn seed_reactions(
    ctx: Context<'_>,
    message: &serenity::Message,
    picker: &ReactionRoleGroup,
) -> (usize, usize) {
    let emojis: Vec<&str> = picker
        .roles
        .iter()
        .map(|binding| binding.emoji.as_str())
        .filter(|emoji| !emoji.is_empty())
        .collect();

    let mut seeded = 0;
    for emoji in &emojis {
        let reaction = match serenity::ReactionType::try_from(*emoji) {
            Ok(reaction) => reaction,
            Err(e) => {
                warn!("Cannot react with {:?}: {}", emoji, e);
                break;
            }
        };
        if let Err(e) = message.react(ctx.http(), reaction).await {
            warn!("Failed to react with {} on {}: {}", emoji, message.id, e);
            break;
        }
        seeded += 1;
    }
    (seeded, emojis.len())
}

/// Group text followed by one "emoji name" line per binding that has an emoji
fn picker_description(picker: &ReactionRoleGroup) -> String {
    let mut lines = Vec::new();
    if !picker.message_content.is_empty() {
        lines.push(picker.message_content.clone());
        lines.push(String::new());
    }
    lines.extend(
        picker
            .roles
            .iter()
            .filter(|binding| !binding.emoji.is_empty())
            .map(|binding| format!("{} {}", binding.emoji, binding.name)),
    );
    lines.join("\n")
}

fn group_summary(name: &str, group: &ReactionRoleGroup) -> String {
    let placement = if group.message_id.is_empty() {
        "not posted".to_string()
    } else {
        format!("message `{}`", group.message_id)
    };
    format!("**{}**: {} role(s), {}", name, group.roles.len(), placement)
}

async fn autocomplete_group<'a>(
    ctx: Context<'a>,
    partial: &'a str,
) -> impl Iterator<Item = String> + 'a {
    let names: Vec<String> = ctx
        .guild_id()
        .and_then(|guild_id| ctx.data().guild_configs.get(guild_id))
        .map(|config| config.reaction_roles.names().map(str::to_string).collect())
        .unwrap_or_default();

    names
        .into_iter()
        .filter(move |name| name.starts_with(partial))
}
