// Guild configuration model
// Matches the discord_config.json document structure

use serde::de::{self, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Whole persisted document: guild id -> config
pub type GuildConfigMap = BTreeMap<String, GuildConfig>;

/// Guild (Server) specific configuration
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct GuildConfig {
    /// Feature switches, e.g. "rolepicker" -> true
    #[serde(default, deserialize_with = "lenient_flags")]
    pub toggles: BTreeMap<String, bool>,
    /// Semantic role name -> role ID (empty string means unset)
    #[serde(default, deserialize_with = "lenient_ids")]
    pub roles: BTreeMap<String, String>,
    /// Semantic channel name -> channel ID (empty string means unset)
    #[serde(default, deserialize_with = "lenient_ids")]
    pub channels: BTreeMap<String, String>,
    #[serde(default)]
    pub reaction_roles: ReactionRoleGroups,
}

/// A set of emoji -> role bindings attached to one message
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct ReactionRoleGroup {
    #[serde(default, deserialize_with = "lenient_u32")]
    pub default_color: u32,
    #[serde(default)]
    pub message_content: String,
    /// ID of the message carrying the reactions, empty until posted
    #[serde(rename = "id", default, deserialize_with = "lenient_id")]
    pub message_id: String,
    #[serde(default)]
    pub roles: Vec<RoleBinding>,
}

/// One emoji -> role mapping inside a group
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct RoleBinding {
    pub name: String,
    #[serde(default)]
    pub emoji: String,
    #[serde(default, deserialize_with = "lenient_color")]
    pub color: Option<u32>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub hoist: bool,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub mentionable: bool,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub permissions: u64,
    /// Resolved role ID, empty when only the name is known
    #[serde(rename = "id", default, deserialize_with = "lenient_id")]
    pub role_id: String,
}

impl RoleBinding {
    /// Bindings without an emoji never trigger
    pub fn triggers_on(&self, emoji: &str) -> bool {
        !self.emoji.is_empty() && self.emoji == emoji
    }
}

impl ReactionRoleGroup {
    pub fn is_bound_to(&self, message_id: &str) -> bool {
        !self.message_id.is_empty() && self.message_id == message_id
    }

    /// First binding whose emoji matches; later duplicates are shadowed
    pub fn binding_for(&self, emoji: &str) -> Option<&RoleBinding> {
        self.roles.iter().find(|binding| binding.triggers_on(emoji))
    }
}

/// Reaction-role groups keyed by name, kept in document order.
///
/// Matching walks the groups front to back, so the order authors wrote them in
/// is the order they are tried in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReactionRoleGroups(Vec<(String, ReactionRoleGroup)>);

impl ReactionRoleGroups {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Insert or replace; a replaced group keeps its position
    pub fn insert(&mut self, name: impl Into<String>, group: ReactionRoleGroup) {
        let name = name.into();
        match self.0.iter_mut().find(|(key, _)| *key == name) {
            Some((_, existing)) => *existing = group,
            None => self.0.push((name, group)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ReactionRoleGroup> {
        self.0.iter().find(|(key, _)| key == name).map(|(_, group)| group)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut ReactionRoleGroup> {
        self.0.iter_mut().find(|(key, _)| key == name).map(|(_, group)| group)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ReactionRoleGroup)> {
        self.0.iter().map(|(key, group)| (key.as_str(), group))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(key, _)| key.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for ReactionRoleGroups {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, group) in &self.0 {
            map.serialize_entry(name, group)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ReactionRoleGroups {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct GroupsVisitor;

        impl<'de> Visitor<'de> for GroupsVisitor {
            type Value = ReactionRoleGroups;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of reaction-role groups")
            }

            // An emptied PHP array is written as `[]`
            fn visit_seq<A: SeqAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut groups = ReactionRoleGroups::new();
                let mut index = 0usize;
                while let Some(group) = access.next_element::<ReactionRoleGroup>()? {
                    groups.insert(index.to_string(), group);
                    index += 1;
                }
                Ok(groups)
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut groups = ReactionRoleGroups::new();
                while let Some((name, group)) = access.next_entry::<String, ReactionRoleGroup>()? {
                    groups.insert(name, group);
                }
                Ok(groups)
            }
        }

        deserializer.deserialize_any(GroupsVisitor)
    }
}

// Older documents store numbers as strings ("15158332") and ids as either
#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(u64),
    Text(String),
}

fn id_text(raw: Option<NumberOrString>) -> String {
    match raw {
        Some(NumberOrString::Number(n)) => n.to_string(),
        Some(NumberOrString::Text(s)) => s.trim().to_string(),
        None => String::new(),
    }
}

fn lenient_u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    match Option::<NumberOrString>::deserialize(deserializer)? {
        Some(NumberOrString::Number(n)) => Ok(n),
        Some(NumberOrString::Text(s)) if s.trim().is_empty() => Ok(0),
        Some(NumberOrString::Text(s)) => s.trim().parse().map_err(de::Error::custom),
        None => Ok(0),
    }
}

fn lenient_u32<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    let value = lenient_u64(deserializer)?;
    u32::try_from(value).map_err(de::Error::custom)
}

fn lenient_color<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u32>, D::Error> {
    match id_text(Option::<NumberOrString>::deserialize(deserializer)?) {
        text if text.is_empty() => Ok(None),
        text => text.parse().map(Some).map_err(de::Error::custom),
    }
}

/// Snowflakes as a string, whether written as a number, a string or null
fn lenient_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(id_text(Option::<NumberOrString>::deserialize(deserializer)?))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FlagValue {
    Bool(bool),
    Number(u64),
}

fn lenient_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(match Option::<FlagValue>::deserialize(deserializer)? {
        Some(FlagValue::Bool(flag)) => flag,
        Some(FlagValue::Number(n)) => n != 0,
        None => false,
    })
}

// PHP writes an empty associative array as `[]`
#[derive(Deserialize)]
#[serde(untagged)]
enum MapOrList<V> {
    Map(BTreeMap<String, V>),
    List(Vec<V>),
}

impl<V> MapOrList<V> {
    fn into_map(self) -> BTreeMap<String, V> {
        match self {
            MapOrList::Map(map) => map,
            MapOrList::List(items) => items
                .into_iter()
                .enumerate()
                .map(|(index, value)| (index.to_string(), value))
                .collect(),
        }
    }
}

fn lenient_flags<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BTreeMap<String, bool>, D::Error> {
    let raw = Option::<MapOrList<Option<FlagValue>>>::deserialize(deserializer)?;
    Ok(raw
        .map(MapOrList::into_map)
        .unwrap_or_default()
        .into_iter()
        .map(|(name, value)| {
            let on = match value {
                Some(FlagValue::Bool(flag)) => flag,
                Some(FlagValue::Number(n)) => n != 0,
                None => false,
            };
            (name, on)
        })
        .collect())
}

fn lenient_ids<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error> {
    let raw = Option::<MapOrList<Option<NumberOrString>>>::deserialize(deserializer)?;
    Ok(raw
        .map(MapOrList::into_map)
        .unwrap_or_default()
        .into_iter()
        .map(|(name, id)| (name, id_text(id)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binding(name: &str, emoji: &str) -> RoleBinding {
        RoleBinding {
            name: name.to_string(),
            emoji: emoji.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_group_order_survives_json() {
        let mut groups = ReactionRoleGroups::new();
        groups.insert("zebra", ReactionRoleGroup::default());
        groups.insert("alpha", ReactionRoleGroup::default());
        groups.insert("middle", ReactionRoleGroup::default());

        let json = serde_json::to_string(&groups).unwrap();
        let parsed: ReactionRoleGroups = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.names().collect::<Vec<_>>(), vec!["zebra", "alpha", "middle"]);
    }

    #[test]
    fn test_insert_replaces_in_place() {
        let mut groups = ReactionRoleGroups::new();
        groups.insert("a", ReactionRoleGroup::default());
        groups.insert("b", ReactionRoleGroup::default());
        groups.insert(
            "a",
            ReactionRoleGroup {
                message_content: "replaced".to_string(),
                ..Default::default()
            },
        );

        assert_eq!(groups.len(), 2);
        assert_eq!(groups.names().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(groups.get("a").unwrap().message_content, "replaced");
    }

    #[test]
    fn test_legacy_string_numbers() {
        let json = r#"{
            "default_color": "15158332",
            "message_content": "Species [1 of 2]",
            "id": "",
            "roles": [
                { "name": "Fox", "emoji": "🦊", "color": null, "hoist": false,
                  "mentionable": false, "permissions": "0", "id": "" }
            ]
        }"#;
        let group: ReactionRoleGroup = serde_json::from_str(json).unwrap();
        assert_eq!(group.default_color, 15158332);
        assert_eq!(group.roles[0].permissions, 0);
        assert_eq!(group.roles[0].color, None);
    }

    #[test]
    fn test_first_emoji_match_wins() {
        let group = ReactionRoleGroup {
            roles: vec![binding("Unset", ""), binding("First", "🦊"), binding("Second", "🦊")],
            ..Default::default()
        };

        assert_eq!(group.binding_for("🦊").unwrap().name, "First");
        assert!(group.binding_for("").is_none());
        assert!(group.binding_for("🐺").is_none());
    }

    #[test]
    fn test_unbound_group_matches_nothing() {
        let group = ReactionRoleGroup::default();
        assert!(!group.is_bound_to(""));
        assert!(!group.is_bound_to("123"));
    }

    #[test]
    fn test_missing_fields_default() {
        let config: GuildConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, GuildConfig::default());
    }

    #[test]
    fn test_php_shapes() {
        let json = r#"{
            "toggles": { "rolepicker": 1, "welcome": false },
            "roles": [],
            "channels": { "log": 123456789012345678, "welcome": "" },
            "reaction_roles": {
                "genders": {
                    "default_color": 15158332,
                    "message_content": "Pick one",
                    "id": 777,
                    "roles": [
                        { "name": "Female", "emoji": "♀️", "color": "3066993",
                          "hoist": 0, "mentionable": 1, "permissions": 0, "id": 60 }
                    ]
                }
            }
        }"#;
        let config: GuildConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.toggles.get("rolepicker"), Some(&true));
        assert_eq!(config.toggles.get("welcome"), Some(&false));
        assert!(config.roles.is_empty());
        assert_eq!(config.channels["log"], "123456789012345678");
        assert_eq!(config.channels["welcome"], "");

        let genders = config.reaction_roles.get("genders").unwrap();
        assert_eq!(genders.message_id, "777");
        let female = &genders.roles[0];
        assert_eq!(female.role_id, "60");
        assert_eq!(female.color, Some(3066993));
        assert!(!female.hoist);
        assert!(female.mentionable);
    }

    #[test]
    fn test_empty_php_arrays_everywhere() {
        let json = r#"{ "toggles": [], "roles": [], "channels": [], "reaction_roles": [] }"#;
        let config: GuildConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config, GuildConfig::default());
    }
}
