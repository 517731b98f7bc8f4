// Default configuration for a guild seen for the first time
// Reaction-role groups start unbound: no message ID, no resolved role IDs

use std::collections::BTreeMap;

use crate::models::guild::{GuildConfig, ReactionRoleGroup, ReactionRoleGroups, RoleBinding};

pub struct GroupTemplate {
    pub key: &'static str,
    pub default_color: u32,
    pub message_content: &'static str,
    /// (role name, emoji)
    pub roles: &'static [(&'static str, &'static str)],
}

pub const TOGGLES: &[&str] = &["rolepicker", "games"];

pub const ROLES: &[&str] = &["verified"];

pub const CHANNELS: &[&str] = &[
    "general",
    "welcome",
    "welcomelog",
    "log",
    "verify",
    "watch",
    "suggestion_pending",
    "suggestion_approved",
    "tip_pending",
    "tip_approved",
    "games",
];

pub const GROUPS: &[GroupTemplate] = &[
    GroupTemplate {
        key: "species1",
        default_color: 15158332,
        message_content: "Species [1 of 2]",
        roles: &[
            ("Aquatic", "🐟"),
            ("Avian", "🐦"),
            ("Bat", "🦇"),
            ("Bear", "🐻"),
            ("Canine", "🐶"),
            ("Deer", "🦌"),
            ("Dolphin", "🐬"),
            ("Dragon", "🐉"),
            ("Equine", "🐴"),
            ("Feline", "🐱"),
            ("Fox", "🦊"),
            ("Goat", "🐐"),
            ("Human", "🧑"),
            ("Hybrid", "🧬"),
            ("Kangaroo", "🦘"),
            ("Mobold", "🥚"),
            ("Mouse", "🐭"),
            ("Otter", "🦦"),
            ("Panda", "🐼"),
            ("Penguin", "🐧"),
        ],
    },
    GroupTemplate {
        key: "species2",
        default_color: 15158332,
        message_content: "Species [2 of 2]",
        roles: &[
            ("Pokemon", "⚡"),
            ("Protogen", "👾"),
            ("Rabbit", "🐰"),
            ("Raccoon", "🦝"),
            ("Reptile", "🐊"),
            ("Robot", "🤖"),
            ("Sergal", "🧀"),
            ("Shapeshifter", "🎭"),
            ("Shark", "🦈"),
            ("Squirrel", "🐿️"),
            ("Wolf", "🐺"),
            ("Misc/Unlisted Species", "❓"),
        ],
    },
    GroupTemplate {
        key: "genders",
        default_color: 7419512,
        message_content: "Genders",
        roles: &[
            ("Gender Fluid", "🌊"),
            ("Non-Binary", "⚪"),
            ("Female", "♀️"),
            ("Male", "♂️"),
        ],
    },
    GroupTemplate {
        key: "pronouns",
        default_color: 10181046,
        message_content: "Pronouns",
        roles: &[
            ("He/Him", "1️⃣"),
            ("She/Her", "2️⃣"),
            ("They/Them", "3️⃣"),
            ("Ze/Zem", "4️⃣"),
            ("Other", "5️⃣"),
            ("Any Pronouns", "6️⃣"),
            ("Ask For Pronouns", "💬"),
            ("No Preference", "⭐"),
        ],
    },
    GroupTemplate {
        key: "sexualities",
        default_color: 10038562,
        message_content: "Sexualities",
        roles: &[
            ("Straight", "👫"),
            ("Questioning Sexuality", "❓"),
            ("Asexual", "🖤"),
            ("Pansexual", "💗"),
            ("Demisexual", "🌗"),
            ("Bicurious", "❔"),
            ("Bi", "💞"),
            ("Gay/Lesbian", "🏳️‍🌈"),
        ],
    },
    GroupTemplate {
        key: "channels",
        default_color: 1752220,
        message_content: "Channels",
        roles: &[
            ("Anime", "🍥"),
            ("Art", "🖌️"),
            ("Memes", "😂"),
            ("Games", "🎮"),
            ("Music", "🎵"),
            ("Videos", "📹"),
            ("Screenshots", "📸"),
            ("Stories", "📚"),
            ("Code", "⌨️"),
            ("Science", "🔬"),
            ("Politics", "⚖️"),
            ("Bot Commands", "🤖"),
            ("Github", "🐙"),
        ],
    },
    GroupTemplate {
        key: "adult",
        default_color: 16711680,
        message_content: "NSFW",
        roles: &[("18+", "🔞")],
    },
    GroupTemplate {
        key: "custom",
        default_color: 0,
        message_content: "Custom",
        roles: &[],
    },
];

impl GroupTemplate {
    fn build(&self) -> ReactionRoleGroup {
        ReactionRoleGroup {
            default_color: self.default_color,
            message_content: self.message_content.to_string(),
            message_id: String::new(),
            roles: self
                .roles
                .iter()
                .map(|(name, emoji)| RoleBinding {
                    name: name.to_string(),
                    emoji: emoji.to_string(),
                    ..Default::default()
                })
                .collect(),
        }
    }
}

/// Fresh config: features on, nothing bound yet
pub fn default_guild_config() -> GuildConfig {
    let toggles: BTreeMap<String, bool> = TOGGLES.iter().map(|t| (t.to_string(), true)).collect();
    let roles = ROLES.iter().map(|r| (r.to_string(), String::new())).collect();
    let channels = CHANNELS.iter().map(|c| (c.to_string(), String::new())).collect();

    let mut reaction_roles = ReactionRoleGroups::new();
    for group in GROUPS {
        reaction_roles.insert(group.key, group.build());
    }

    GuildConfig {
        toggles,
        roles,
        channels,
        reaction_roles,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_template_shape() {
        let config = default_guild_config();
        assert_eq!(config.toggles.get("rolepicker"), Some(&true));
        assert_eq!(config.toggles.get("games"), Some(&true));
        assert_eq!(config.roles.get("verified"), Some(&String::new()));
        assert!(config.channels.values().all(String::is_empty));
        assert_eq!(
            config.reaction_roles.names().collect::<Vec<_>>(),
            vec!["species1", "species2", "genders", "pronouns", "sexualities", "channels", "adult", "custom"]
        );
    }

    #[test]
    fn test_template_groups_unbound() {
        let config = default_guild_config();
        for (_, group) in config.reaction_roles.iter() {
            assert!(group.message_id.is_empty());
            assert!(group.roles.iter().all(|binding| binding.role_id.is_empty()));
        }
    }

    #[test]
    fn test_emoji_unique_within_group() {
        for group in GROUPS {
            let mut seen = HashSet::new();
            for (name, emoji) in group.roles {
                assert!(seen.insert(*emoji), "{} reuses {} in {}", name, emoji, group.key);
            }
            // Discord caps a message at 20 reactions
            assert!(group.roles.len() <= 20, "{} has too many bindings", group.key);
        }
    }

    #[test]
    fn test_genders_female_binding() {
        let config = default_guild_config();
        let genders = config.reaction_roles.get("genders").unwrap();
        assert_eq!(genders.binding_for("♀️").unwrap().name, "Female");
    }
}
