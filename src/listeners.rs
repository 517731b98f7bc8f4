// Default listener table installed by the binary

use futures::future::BoxFuture;
use tracing::info;

use crate::features::dispatcher::{BotEvent, EventKind, Listeners};
use crate::{Data, Error};

pub fn default_listeners() -> Listeners {
    Listeners::builder()
        .on(EventKind::Ready, announce_ready)
        .on(EventKind::ReadySlash, log_slash_commands)
        .on(EventKind::GuildMemberAdd, log_member_traffic)
        .on(EventKind::GuildMemberRemove, log_member_traffic)
        .build()
}

fn announce_ready<'a>(data: &'a Data, event: &'a BotEvent) -> BoxFuture<'a, Result<(), Error>> {
    Box::pin(async move {
        if let BotEvent::Ready { user_id, guild_ids } = event {
            info!(
                "Ready as {} in {} guild(s), {} config(s) loaded",
                user_id,
                guild_ids.len(),
                data.guild_configs.len()
            );
        }
        Ok(())
    })
}

fn log_slash_commands<'a>(_data: &'a Data, event: &'a BotEvent) -> BoxFuture<'a, Result<(), Error>> {
    Box::pin(async move {
        if let BotEvent::ReadySlash { commands } = event {
            let names: Vec<&str> = commands.iter().map(|c| c.name.as_str()).collect();
            info!("Slash commands live: {}", names.join(", "));
        }
        Ok(())
    })
}

fn log_member_traffic<'a>(_data: &'a Data, event: &'a BotEvent) -> BoxFuture<'a, Result<(), Error>> {
    Box::pin(async move {
        match event {
            BotEvent::GuildMemberAdd { member } => {
                info!("{} joined guild {}", member.user.name, member.guild_id)
            }
            BotEvent::GuildMemberRemove { guild_id, user, .. } => {
                info!("{} left guild {}", user.name, guild_id)
            }
            _ => {}
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table() {
        let listeners = default_listeners();
        assert_eq!(listeners.count(EventKind::Ready), 1);
        assert_eq!(listeners.count(EventKind::ReadySlash), 1);
        assert_eq!(listeners.count(EventKind::GuildMemberAdd), 1);
        assert_eq!(listeners.count(EventKind::ReactionAdd), 0);
    }
}
