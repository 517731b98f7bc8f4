// Guild config registry
// Working copy of discord_config.json; disk is only touched on creation, autosave and explicit saves

use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use poise::serenity_prelude as serenity;
use tracing::{debug, error, info, warn};

use crate::features::store::{JsonStore, StoreError};
use crate::models::guild::{GuildConfig, GuildConfigMap, ReactionRoleGroup, RoleBinding};
use crate::utils::config::DISCORD_CONFIG_FILE;
use crate::utils::template::default_guild_config;

/// Result of one autosave tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutosaveOutcome {
    Unchanged,
    Written,
    Failed,
}

/// A binding selected for a reaction, with the group it came from
#[derive(Debug, Clone, PartialEq)]
pub struct MatchedBinding {
    pub group: String,
    pub binding: RoleBinding,
}

#[derive(Debug, Default)]
pub struct GuildConfigs {
    configs: DashMap<String, GuildConfig>,
    /// Set when the file on disk could not be read or backed up
    writes_held: AtomicBool,
}

impl GuildConfigs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole working copy (used when the persisted document is loaded)
    pub fn replace_all(&self, map: GuildConfigMap) {
        self.configs.clear();
        for (guild_id, config) in map {
            self.configs.insert(guild_id, config);
        }
    }

    /// Replace the working copy with what is on disk. A file that exists but
    /// cannot be used is backed up first; if even that fails, writes stay held
    /// so nothing is saved over it.
    pub async fn load(&self, store: &JsonStore) {
        match store.read::<GuildConfigMap>(DISCORD_CONFIG_FILE).await {
            Ok(map) => self.replace_all(map.unwrap_or_default()),
            Err(e) => {
                warn!("Could not load guild configs: {}", e);
                match store.backup(DISCORD_CONFIG_FILE).await {
                    Ok(backup) => warn!("Kept the unreadable configs as {}", backup.display()),
                    Err(backup_err) => {
                        error!("Could not back up guild configs, holding writes: {}", backup_err);
                        self.writes_held.store(true, Ordering::SeqCst);
                    }
                }
                self.replace_all(GuildConfigMap::new());
            }
        }
    }

    pub fn writes_held(&self) -> bool {
        self.writes_held.load(Ordering::SeqCst)
    }

    pub fn contains(&self, guild_id: serenity::GuildId) -> bool {
        self.configs.contains_key(&guild_id.to_string())
    }

    pub fn get(&self, guild_id: serenity::GuildId) -> Option<GuildConfig> {
        self.configs.get(&guild_id.to_string()).map(|c| c.clone())
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    /// Ordered copy of every config, in the shape written to disk
    pub fn snapshot(&self) -> GuildConfigMap {
        self.configs
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// Make sure a guild has a config. An existing one is never overwritten;
    /// a new one is written to disk straight away.
    pub async fn ensure_template(
        &self,
        store: &JsonStore,
        guild_id: serenity::GuildId,
        guild_name: &str,
    ) -> GuildConfig {
        let created = match self.configs.entry(guild_id.to_string()) {
            Entry::Occupied(existing) => return existing.get().clone(),
            Entry::Vacant(slot) => slot.insert(default_guild_config()).clone(),
        };

        match self.save(store).await {
            Ok(()) => info!("Created new config for guild {} ({})", guild_name, guild_id),
            Err(e) => warn!("Failed to create new config for guild {} ({}): {}", guild_name, guild_id, e),
        }
        created
    }

    pub async fn save(&self, store: &JsonStore) -> Result<(), StoreError> {
        if self.writes_held() {
            return Err(StoreError::Held(DISCORD_CONFIG_FILE.to_string()));
        }
        store.save(DISCORD_CONFIG_FILE, &self.snapshot()).await
    }

    /// Write the working copy only if it differs from what is on disk
    pub async fn autosave(&self, store: &JsonStore) -> AutosaveOutcome {
        if self.writes_held() {
            debug!("Guild config writes are held, skipping autosave");
            return AutosaveOutcome::Failed;
        }
        let current = self.snapshot();
        let persisted: Option<GuildConfigMap> = store.load(DISCORD_CONFIG_FILE).await;

        if persisted.as_ref() == Some(&current) {
            debug!("Guild configs unchanged, skipping autosave");
            return AutosaveOutcome::Unchanged;
        }

        match store.save(DISCORD_CONFIG_FILE, &current).await {
            Ok(()) => {
                info!("Autosaved configs for {} guild(s)", current.len());
                AutosaveOutcome::Written
            }
            Err(e) => {
                warn!("Autosave failed: {}", e);
                AutosaveOutcome::Failed
            }
        }
    }

    /// Bindings triggered by `emoji` on `message_id`, one per matching group.
    /// `None` when the guild has no config at all.
    pub fn matching_bindings(
        &self,
        guild_id: serenity::GuildId,
        message_id: serenity::MessageId,
        emoji: &str,
    ) -> Option<Vec<MatchedBinding>> {
        let config = self.configs.get(&guild_id.to_string())?;
        let message_id = message_id.to_string();

        let matched = config
            .reaction_roles
            .iter()
            .filter(|(_, group)| group.is_bound_to(&message_id))
            .filter_map(|(name, group)| {
                group.binding_for(emoji).map(|binding| MatchedBinding {
                    group: name.to_string(),
                    binding: binding.clone(),
                })
            })
            .collect();
        Some(matched)
    }

    /// Remember the role a binding resolved to. Returns true if anything changed.
    pub fn record_role_id(
        &self,
        guild_id: serenity::GuildId,
        group: &str,
        binding_name: &str,
        role_id: serenity::RoleId,
    ) -> bool {
        let Some(mut config) = self.configs.get_mut(&guild_id.to_string()) else {
            return false;
        };
        let Some(group) = config.reaction_roles.get_mut(group) else {
            return false;
        };
        let role_id = role_id.to_string();
        match group.roles.iter_mut().find(|b| b.name == binding_name) {
            Some(binding) if binding.role_id != role_id => {
                binding.role_id = role_id;
                true
            }
            _ => false,
        }
    }

    pub fn group(&self, guild_id: serenity::GuildId, name: &str) -> Option<ReactionRoleGroup> {
        self.configs
            .get(&guild_id.to_string())
            .and_then(|config| config.reaction_roles.get(name).cloned())
    }

    /// Point a group at the message that now carries its reactions
    pub fn bind_message(
        &self,
        guild_id: serenity::GuildId,
        group: &str,
        message_id: serenity::MessageId,
    ) -> bool {
        let Some(mut config) = self.configs.get_mut(&guild_id.to_string()) else {
            return false;
        };
        match config.reaction_roles.get_mut(group) {
            Some(group) => {
                group.message_id = message_id.to_string();
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GUILD: serenity::GuildId = serenity::GuildId::new(923969098185068594);

    fn store_in(dir: &tempfile::TempDir) -> JsonStore {
        JsonStore::new(dir.path(), "")
    }

    #[tokio::test]
    async fn test_ensure_template_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let configs = GuildConfigs::new();

        configs.ensure_template(&store, GUILD, "Test Guild").await;
        configs.bind_message(GUILD, "genders", serenity::MessageId::new(42));
        let before = configs.get(GUILD).unwrap();

        let again = configs.ensure_template(&store, GUILD, "Test Guild").await;
        assert_eq!(again, before);
        assert_eq!(configs.get(GUILD).unwrap().reaction_roles.get("genders").unwrap().message_id, "42");
        assert_eq!(configs.len(), 1);
    }

    #[tokio::test]
    async fn test_ensure_template_persists_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let configs = GuildConfigs::new();

        configs.ensure_template(&store, GUILD, "Test Guild").await;

        let on_disk: GuildConfigMap = store.load(DISCORD_CONFIG_FILE).await.unwrap();
        assert_eq!(on_disk.get(&GUILD.to_string()), Some(&default_guild_config()));
    }

    #[tokio::test]
    async fn test_autosave_skips_when_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let configs = GuildConfigs::new();
        configs.ensure_template(&store, GUILD, "Test Guild").await;

        // Mark the file so a rewrite would be visible
        let path = store.path_for(DISCORD_CONFIG_FILE);
        let pretty = tokio::fs::read_to_string(&path).await.unwrap();
        let compact = serde_json::to_string(&configs.snapshot()).unwrap();
        tokio::fs::write(&path, &compact).await.unwrap();
        assert_ne!(pretty, compact);

        assert_eq!(configs.autosave(&store).await, AutosaveOutcome::Unchanged);
        assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), compact);
    }

    #[tokio::test]
    async fn test_autosave_writes_exact_working_copy() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let configs = GuildConfigs::new();
        configs.ensure_template(&store, GUILD, "Test Guild").await;

        configs.bind_message(GUILD, "pronouns", serenity::MessageId::new(7));
        assert_eq!(configs.autosave(&store).await, AutosaveOutcome::Written);

        let on_disk: GuildConfigMap = store.load(DISCORD_CONFIG_FILE).await.unwrap();
        assert_eq!(on_disk, configs.snapshot());
    }

    #[tokio::test]
    async fn test_autosave_writes_when_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let configs = GuildConfigs::new();
        let mut map = GuildConfigMap::new();
        map.insert(GUILD.to_string(), default_guild_config());
        configs.replace_all(map);

        assert_eq!(configs.autosave(&store).await, AutosaveOutcome::Written);
        assert_eq!(configs.autosave(&store).await, AutosaveOutcome::Unchanged);
    }

    #[test]
    fn test_matching_bindings() {
        let configs = GuildConfigs::new();
        let mut map = GuildConfigMap::new();
        map.insert(GUILD.to_string(), default_guild_config());
        configs.replace_all(map);
        let message = serenity::MessageId::new(555);

        // Nothing is bound yet
        assert_eq!(configs.matching_bindings(GUILD, message, "♀️"), Some(vec![]));

        configs.bind_message(GUILD, "genders", message);
        let matched = configs.matching_bindings(GUILD, message, "♀️").unwrap();
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].group, "genders");
        assert_eq!(matched[0].binding.name, "Female");

        // Unknown guild
        assert!(configs
            .matching_bindings(serenity::GuildId::new(1), message, "♀️")
            .is_none());
    }

    #[test]
    fn test_groups_sharing_a_message_all_match() {
        let configs = GuildConfigs::new();
        let mut map = GuildConfigMap::new();
        map.insert(GUILD.to_string(), default_guild_config());
        configs.replace_all(map);
        let message = serenity::MessageId::new(9);

        configs.bind_message(GUILD, "species2", message);
        configs.bind_message(GUILD, "channels", message);

        let matched = configs.matching_bindings(GUILD, message, "🤖").unwrap();
        let groups: Vec<_> = matched.iter().map(|m| m.group.as_str()).collect();
        assert_eq!(groups, vec!["species2", "channels"]);
    }

    #[test]
    fn test_record_role_id() {
        let configs = GuildConfigs::new();
        let mut map = GuildConfigMap::new();
        map.insert(GUILD.to_string(), default_guild_config());
        configs.replace_all(map);
        let role = serenity::RoleId::new(77);

        assert!(configs.record_role_id(GUILD, "genders", "Female", role));
        assert!(!configs.record_role_id(GUILD, "genders", "Female", role));
        assert!(!configs.record_role_id(GUILD, "genders", "Nobody", role));

        let group = configs.group(GUILD, "genders").unwrap();
        assert_eq!(group.binding_for("♀️").unwrap().role_id, "77");
    }

    #[tokio::test]
    async fn test_writes_held_when_file_cannot_be_read_or_backed_up() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        // A directory where the document should be: unreadable and uncopyable
        tokio::fs::create_dir_all(store.path_for(DISCORD_CONFIG_FILE)).await.unwrap();
        let configs = GuildConfigs::new();

        configs.load(&store).await;
        assert!(configs.writes_held());
        assert!(configs.is_empty());

        configs.ensure_template(&store, GUILD, "Test Guild").await;
        assert!(configs.contains(GUILD));
        assert!(matches!(configs.save(&store).await, Err(StoreError::Held(_))));
        assert_eq!(configs.autosave(&store).await, AutosaveOutcome::Failed);
        assert!(store.path_for(DISCORD_CONFIG_FILE).is_dir());
    }

    #[tokio::test]
    async fn test_load_reads_persisted_map() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let mut map = GuildConfigMap::new();
        map.insert(GUILD.to_string(), default_guild_config());
        store.save(DISCORD_CONFIG_FILE, &map).await.unwrap();

        let configs = GuildConfigs::new();
        configs.load(&store).await;

        assert!(!configs.writes_held());
        assert_eq!(configs.snapshot(), map);
    }
}
