// Event dispatcher
// Typed gateway events fanned out to listener lists registered once at startup

use std::collections::HashMap;
use std::fmt;

use futures::future::BoxFuture;
use poise::serenity_prelude as serenity;
use tracing::{debug, warn};

use crate::{Data, Error};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Ready,
    ReadySlash,
    GuildCreate,
    Message,
    MessageUpdate,
    MessageDelete,
    MessageDeleteBulk,
    GuildMemberAdd,
    GuildMemberRemove,
    GuildMemberUpdate,
    GuildBanAdd,
    GuildBanRemove,
    UserUpdate,
    ReactionAdd,
    ReactionRemove,
}

impl EventKind {
    pub const ALL: [EventKind; 15] = [
        EventKind::Ready,
        EventKind::ReadySlash,
        EventKind::GuildCreate,
        EventKind::Message,
        EventKind::MessageUpdate,
        EventKind::MessageDelete,
        EventKind::MessageDeleteBulk,
        EventKind::GuildMemberAdd,
        EventKind::GuildMemberRemove,
        EventKind::GuildMemberUpdate,
        EventKind::GuildBanAdd,
        EventKind::GuildBanRemove,
        EventKind::UserUpdate,
        EventKind::ReactionAdd,
        EventKind::ReactionRemove,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Ready => "READY",
            EventKind::ReadySlash => "READY_SLASH",
            EventKind::GuildCreate => "GUILD_CREATE",
            EventKind::Message => "MESSAGE_CREATE",
            EventKind::MessageUpdate => "MESSAGE_UPDATE",
            EventKind::MessageDelete => "MESSAGE_DELETE",
            EventKind::MessageDeleteBulk => "MESSAGE_DELETE_BULK",
            EventKind::GuildMemberAdd => "GUILD_MEMBER_ADD",
            EventKind::GuildMemberRemove => "GUILD_MEMBER_REMOVE",
            EventKind::GuildMemberUpdate => "GUILD_MEMBER_UPDATE",
            EventKind::GuildBanAdd => "GUILD_BAN_ADD",
            EventKind::GuildBanRemove => "GUILD_BAN_REMOVE",
            EventKind::UserUpdate => "USER_UPDATE",
            EventKind::ReactionAdd => "MESSAGE_REACTION_ADD",
            EventKind::ReactionRemove => "MESSAGE_REACTION_REMOVE",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded gateway event. Update variants carry the previous state when the cache had it.
#[derive(Debug, Clone)]
#[allow(clippy::large_enum_variant)]
pub enum BotEvent {
    Ready {
        user_id: serenity::UserId,
        guild_ids: Vec<serenity::GuildId>,
    },
    ReadySlash {
        commands: Vec<serenity::Command>,
    },
    GuildCreate {
        guild: serenity::Guild,
        is_new: Option<bool>,
    },
    Message {
        message: serenity::Message,
    },
    MessageUpdate {
        old: Option<serenity::Message>,
        new: Option<serenity::Message>,
        event: serenity::MessageUpdateEvent,
    },
    MessageDelete {
        guild_id: Option<serenity::GuildId>,
        channel_id: serenity::ChannelId,
        message_id: serenity::MessageId,
    },
    MessageDeleteBulk {
        guild_id: Option<serenity::GuildId>,
        channel_id: serenity::ChannelId,
        message_ids: Vec<serenity::MessageId>,
    },
    GuildMemberAdd {
        member: serenity::Member,
    },
    GuildMemberRemove {
        guild_id: serenity::GuildId,
        user: serenity::User,
        member: Option<serenity::Member>,
    },
    GuildMemberUpdate {
        old: Option<serenity::Member>,
        new: Option<serenity::Member>,
        event: serenity::GuildMemberUpdateEvent,
    },
    GuildBanAdd {
        guild_id: serenity::GuildId,
        user: serenity::User,
    },
    GuildBanRemove {
        guild_id: serenity::GuildId,
        user: serenity::User,
    },
    UserUpdate {
        old: Option<serenity::CurrentUser>,
        new: serenity::CurrentUser,
    },
    ReactionAdd {
        reaction: serenity::Reaction,
    },
    ReactionRemove {
        reaction: serenity::Reaction,
    },
}

impl BotEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            BotEvent::Ready { .. } => EventKind::Ready,
            BotEvent::ReadySlash { .. } => EventKind::ReadySlash,
            BotEvent::GuildCreate { .. } => EventKind::GuildCreate,
            BotEvent::Message { .. } => EventKind::Message,
            BotEvent::MessageUpdate { .. } => EventKind::MessageUpdate,
            BotEvent::MessageDelete { .. } => EventKind::MessageDelete,
            BotEvent::MessageDeleteBulk { .. } => EventKind::MessageDeleteBulk,
            BotEvent::GuildMemberAdd { .. } => EventKind::GuildMemberAdd,
            BotEvent::GuildMemberRemove { .. } => EventKind::GuildMemberRemove,
            BotEvent::GuildMemberUpdate { .. } => EventKind::GuildMemberUpdate,
            BotEvent::GuildBanAdd { .. } => EventKind::GuildBanAdd,
            BotEvent::GuildBanRemove { .. } => EventKind::GuildBanRemove,
            BotEvent::UserUpdate { .. } => EventKind::UserUpdate,
            BotEvent::ReactionAdd { .. } => EventKind::ReactionAdd,
            BotEvent::ReactionRemove { .. } => EventKind::ReactionRemove,
        }
    }

    /// Translate a serenity event. Ready is handled by framework setup and
    /// anything outside the fixed event set yields `None`.
    pub fn from_full_event(event: &serenity::FullEvent) -> Option<Self> {
        let translated = match event {
            serenity::FullEvent::GuildCreate { guild, is_new } => BotEvent::GuildCreate {
                guild: guild.clone(),
                is_new: *is_new,
            },
            serenity::FullEvent::Message { new_message } => BotEvent::Message {
                message: new_message.clone(),
            },
            serenity::FullEvent::MessageUpdate {
                old_if_available,
                new,
                event,
            } => BotEvent::MessageUpdate {
                old: old_if_available.clone(),
                new: new.clone(),
                event: event.clone(),
            },
            serenity::FullEvent::MessageDelete {
                channel_id,
                deleted_message_id,
                guild_id,
            } => BotEvent::MessageDelete {
                guild_id: *guild_id,
                channel_id: *channel_id,
                message_id: *deleted_message_id,
            },
            serenity::FullEvent::MessageDeleteBulk {
                channel_id,
                multiple_deleted_messages_ids,
                guild_id,
            } => BotEvent::MessageDeleteBulk {
                guild_id: *guild_id,
                channel_id: *channel_id,
                message_ids: multiple_deleted_messages_ids.clone(),
            },
            serenity::FullEvent::GuildMemberAddition { new_member } => BotEvent::GuildMemberAdd {
                member: new_member.clone(),
            },
            serenity::FullEvent::GuildMemberRemoval {
                guild_id,
                user,
                member_data_if_available,
            } => BotEvent::GuildMemberRemove {
                guild_id: *guild_id,
                user: user.clone(),
                member: member_data_if_available.clone(),
            },
            serenity::FullEvent::GuildMemberUpdate {
                old_if_available,
                new,
                event,
            } => BotEvent::GuildMemberUpdate {
                old: old_if_available.clone(),
                new: new.clone(),
                event: event.clone(),
            },
            serenity::FullEvent::GuildBanAddition { guild_id, banned_user } => BotEvent::GuildBanAdd {
                guild_id: *guild_id,
                user: banned_user.clone(),
            },
            serenity::FullEvent::GuildBanRemoval {
                guild_id,
                unbanned_user,
            } => BotEvent::GuildBanRemove {
                guild_id: *guild_id,
                user: unbanned_user.clone(),
            },
            serenity::FullEvent::UserUpdate { old_data, new } => BotEvent::UserUpdate {
                old: old_data.clone(),
                new: new.clone(),
            },
            serenity::FullEvent::ReactionAdd { add_reaction } => BotEvent::ReactionAdd {
                reaction: add_reaction.clone(),
            },
            serenity::FullEvent::ReactionRemove { removed_reaction } => BotEvent::ReactionRemove {
                reaction: removed_reaction.clone(),
            },
            _ => return None,
        };
        Some(translated)
    }
}

/// An event callback. Plain `fn` items keep the table `'static` and borrow-friendly:
/// `|data, event| Box::pin(my_listener(data, event))`.
pub type Listener = for<'a> fn(&'a Data, &'a BotEvent) -> BoxFuture<'a, Result<(), Error>>;

#[derive(Default)]
pub struct ListenersBuilder {
    table: HashMap<EventKind, Vec<Listener>>,
}

impl ListenersBuilder {
    pub fn on(mut self, kind: EventKind, listener: Listener) -> Self {
        self.table.entry(kind).or_default().push(listener);
        self
    }

    pub fn build(self) -> Listeners {
        Listeners { table: self.table }
    }
}

/// Listener lists per event kind, fixed after construction
#[derive(Default)]
pub struct Listeners {
    table: HashMap<EventKind, Vec<Listener>>,
}

impl Listeners {
    pub fn builder() -> ListenersBuilder {
        ListenersBuilder::default()
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.table.get(&kind).map_or(0, Vec::len)
    }

    pub fn log_registrations(&self) {
        for kind in EventKind::ALL {
            match self.count(kind) {
                0 => debug!("No {} listeners found!", kind),
                n => debug!("{} {} listener(s) registered", n, kind),
            }
        }
    }

    /// Run every listener for the event's kind, in registration order.
    /// Returns how many ran; a failing listener is logged and the rest still run.
    pub async fn dispatch(&self, data: &Data, event: &BotEvent) -> usize {
        let kind = event.kind();
        let Some(listeners) = self.table.get(&kind).filter(|l| !l.is_empty()) else {
            debug!("No {} listeners found!", kind);
            return 0;
        };

        for (index, listener) in listeners.iter().enumerate() {
            if let Err(e) = listener(data, event).await {
                warn!("{} listener #{} failed: {}", kind, index, e);
            }
        }
        listeners.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_data;
    use std::sync::Mutex;

    static ORDER: Mutex<Vec<&'static str>> = Mutex::new(Vec::new());

    fn first<'a>(_data: &'a Data, _event: &'a BotEvent) -> BoxFuture<'a, Result<(), Error>> {
        Box::pin(async move {
            ORDER.lock().unwrap().push("first");
            Ok(())
        })
    }

    fn failing<'a>(_data: &'a Data, _event: &'a BotEvent) -> BoxFuture<'a, Result<(), Error>> {
        Box::pin(async move {
            ORDER.lock().unwrap().push("failing");
            Err("boom".into())
        })
    }

    fn last<'a>(_data: &'a Data, event: &'a BotEvent) -> BoxFuture<'a, Result<(), Error>> {
        Box::pin(async move {
            if let BotEvent::MessageDelete { message_id, .. } = event {
                assert_eq!(*message_id, serenity::MessageId::new(3));
            }
            ORDER.lock().unwrap().push("last");
            Ok(())
        })
    }

    fn delete_event() -> BotEvent {
        BotEvent::MessageDelete {
            guild_id: Some(serenity::GuildId::new(1)),
            channel_id: serenity::ChannelId::new(2),
            message_id: serenity::MessageId::new(3),
        }
    }

    #[tokio::test]
    async fn test_fan_out_in_registration_order() {
        let dir = tempfile::tempdir().unwrap();
        let listeners = Listeners::builder()
            .on(EventKind::MessageDelete, first)
            .on(EventKind::MessageDelete, failing)
            .on(EventKind::MessageDelete, last)
            .on(EventKind::GuildBanAdd, first)
            .build();
        let data = test_data(dir.path(), Listeners::default());

        let ran = listeners.dispatch(&data, &delete_event()).await;

        assert_eq!(ran, 3);
        assert_eq!(*ORDER.lock().unwrap(), vec!["first", "failing", "last"]);
    }

    #[tokio::test]
    async fn test_no_listeners_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let data = test_data(dir.path(), Listeners::default());
        let listeners = Listeners::default();

        assert_eq!(listeners.dispatch(&data, &delete_event()).await, 0);
        assert_eq!(listeners.count(EventKind::MessageDelete), 0);
    }

    #[test]
    fn test_event_kind() {
        assert_eq!(delete_event().kind(), EventKind::MessageDelete);
        let ready = BotEvent::Ready {
            user_id: serenity::UserId::new(5),
            guild_ids: vec![],
        };
        assert_eq!(ready.kind(), EventKind::Ready);
        assert_eq!(EventKind::ReactionAdd.to_string(), "MESSAGE_REACTION_ADD");
    }
}
