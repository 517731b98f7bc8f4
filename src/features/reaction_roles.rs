// Reaction roles
// Grants or revokes a role when a member reacts on a bound rolepicker message

use std::sync::Arc;

use poise::serenity_prelude as serenity;
use tracing::{debug, info, warn};

use crate::features::guild_configs::{GuildConfigs, MatchedBinding};
use crate::models::guild::RoleBinding;
use crate::platform::{Gateway, RoleInfo};
use crate::utils::config::CONFIRMATION_TTL;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactionAction {
    Add,
    Remove,
}

/// The parts of a reaction the engine looks at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactionEvent {
    pub guild_id: serenity::GuildId,
    pub channel_id: serenity::ChannelId,
    pub message_id: serenity::MessageId,
    pub user_id: serenity::UserId,
    /// Unicode emoji as sent; custom emoji keep their `<:name:id>` form and never match
    pub emoji: String,
}

impl ReactionEvent {
    /// `None` for reactions outside a guild or without a known user
    pub fn from_reaction(reaction: &serenity::Reaction) -> Option<Self> {
        let emoji = match &reaction.emoji {
            serenity::ReactionType::Unicode(emoji) => emoji.clone(),
            other => other.to_string(),
        };
        Some(Self {
            guild_id: reaction.guild_id?,
            channel_id: reaction.channel_id,
            message_id: reaction.message_id,
            user_id: reaction.user_id?,
            emoji,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReactionOutcome {
    /// Guild has no config
    NoConfig,
    /// The bot reacted itself
    OwnReaction,
    /// The reacted message could not be fetched
    MessageUnavailable,
    /// No group is bound to the message, or no binding uses the emoji
    NoMatch,
    /// Member already had the role (add) or never had it (remove)
    AlreadySatisfied { role: String },
    /// Neither the name nor the ID matched a role in the guild
    Unresolved { role: String },
    Granted { role: String },
    Revoked { role: String },
    /// The platform refused the change
    Failed { role: String },
}

/// Run one reaction through every matching group. Never returns an error;
/// each step's failure ends processing for that binding and is logged.
pub async fn handle_reaction(
    gateway: &Arc<dyn Gateway>,
    configs: &GuildConfigs,
    event: &ReactionEvent,
    action: ReactionAction,
) -> Vec<ReactionOutcome> {
    if !configs.contains(event.guild_id) {
        debug!("No config for guild {}, ignoring reaction", event.guild_id);
        return vec![ReactionOutcome::NoConfig];
    }

    if event.user_id == gateway.current_user_id() {
        return vec![ReactionOutcome::OwnReaction];
    }

    if let Err(e) = gateway.ensure_message(event.channel_id, event.message_id).await {
        debug!("Could not fetch message {}: {}", event.message_id, e);
        return vec![ReactionOutcome::MessageUnavailable];
    }

    let matched = configs
        .matching_bindings(event.guild_id, event.message_id, &event.emoji)
        .unwrap_or_default();
    if matched.is_empty() {
        return vec![ReactionOutcome::NoMatch];
    }

    let mut outcomes = Vec::with_capacity(matched.len());
    for matched_binding in matched {
        let outcome = apply_binding(gateway, configs, event, action, &matched_binding).await;
        outcomes.push(outcome);
    }
    outcomes
}

async fn apply_binding(
    gateway: &Arc<dyn Gateway>,
    configs: &GuildConfigs,
    event: &ReactionEvent,
    action: ReactionAction,
    matched: &MatchedBinding,
) -> ReactionOutcome {
    let binding = &matched.binding;

    let guild_roles = match gateway.guild_roles(event.guild_id).await {
        Ok(roles) => roles,
        Err(e) => {
            warn!("Failed to list roles for guild {}: {}", event.guild_id, e);
            return ReactionOutcome::Failed { role: binding.name.clone() };
        }
    };
    let member_roles = match gateway.member_roles(event.guild_id, event.user_id).await {
        Ok(roles) => roles,
        Err(e) => {
            warn!("Failed to get roles of member {}: {}", event.user_id, e);
            return ReactionOutcome::Failed { role: binding.name.clone() };
        }
    };

    let holds = member_holds(binding, &member_roles, &guild_roles);
    let wanted = match action {
        ReactionAction::Add => !holds,
        ReactionAction::Remove => holds,
    };
    if !wanted {
        return ReactionOutcome::AlreadySatisfied { role: binding.name.clone() };
    }

    let Some(role) = resolve_role(binding, &guild_roles) else {
        warn!(
            "Unable to get configured role from server! {} : {}",
            binding.name, binding.role_id
        );
        return ReactionOutcome::Unresolved { role: binding.name.clone() };
    };

    let (result, notice) = match action {
        ReactionAction::Add => (
            gateway.add_member_role(event.guild_id, event.user_id, role.id).await,
            format!("<@{}> added the `{}` role!", event.user_id, role.name),
        ),
        ReactionAction::Remove => (
            gateway.remove_member_role(event.guild_id, event.user_id, role.id).await,
            format!("<@{}> removed the `{}` role", event.user_id, role.name),
        ),
    };
    if let Err(e) = result {
        warn!("Failed to update role {} for {}: {}", role.name, event.user_id, e);
        return ReactionOutcome::Failed { role: role.name.clone() };
    }

    if configs.record_role_id(event.guild_id, &matched.group, &binding.name, role.id) {
        debug!("Resolved role {} to {}", binding.name, role.id);
    }

    info!("{:?} role {} for user {} in guild {}", action, role.name, event.user_id, event.guild_id);
    post_transient(gateway, event.channel_id, &notice).await;

    match action {
        ReactionAction::Add => ReactionOutcome::Granted { role: role.name.clone() },
        ReactionAction::Remove => ReactionOutcome::Revoked { role: role.name.clone() },
    }
}

/// Name first, then the stored ID. Among roles sharing the name, the one with the
/// stored ID wins, then the highest position, then the lowest ID.
fn resolve_role<'a>(binding: &RoleBinding, guild_roles: &'a [RoleInfo]) -> Option<&'a RoleInfo> {
    let stored = parse_role_id(&binding.role_id);
    let named = guild_roles.iter().filter(|role| role.name == binding.name);

    let by_name = match stored.and_then(|id| named.clone().find(|role| role.id == id)) {
        Some(role) => Some(role),
        None => named.max_by_key(|role| (role.position, std::cmp::Reverse(role.id))),
    };
    by_name.or_else(|| {
        let id = stored?;
        guild_roles.iter().find(|role| role.id == id)
    })
}

fn member_holds(binding: &RoleBinding, member_roles: &[serenity::RoleId], guild_roles: &[RoleInfo]) -> bool {
    let by_name = guild_roles
        .iter()
        .any(|role| role.name == binding.name && member_roles.contains(&role.id));
    let by_id = parse_role_id(&binding.role_id).is_some_and(|id| member_roles.contains(&id));
    by_name || by_id
}

fn parse_role_id(raw: &str) -> Option<serenity::RoleId> {
    match raw.trim().parse::<u64>() {
        Ok(id) if id != 0 => Some(serenity::RoleId::new(id)),
        _ => None,
    }
}

/// Post a notice and delete it once CONFIRMATION_TTL has passed
async fn post_transient(gateway: &Arc<dyn Gateway>, channel_id: serenity::ChannelId, content: &str) {
    let message_id = match gateway.send_message(channel_id, content).await {
        Ok(id) => id,
        Err(e) => {
            warn!("Failed to send role notice: {}", e);
            return;
        }
    };

    let gateway = gateway.clone();
    tokio::spawn(async move {
        tokio::time::sleep(CONFIRMATION_TTL).await;
        if let Err(e) = gateway.delete_message(channel_id, message_id).await {
            debug!("Failed to delete role notice {}: {}", message_id, e);
        }
    });
}
