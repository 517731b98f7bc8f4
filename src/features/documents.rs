// Suggestions, tips and tests documents
// Loaded at startup and kept in memory for listeners; the bot itself never edits entries

use poise::serenity_prelude as serenity;
use tokio::sync::RwLock;
use tracing::warn;

use crate::features::store::JsonStore;
use crate::models::documents::{FreeformDocument, SuggestionLists, SuggestionMap};
use crate::utils::config::{SUGGESTIONS_FILE, TESTS_FILE, TIPS_FILE};

#[derive(Debug, Default)]
pub struct Documents {
    pub suggestions: RwLock<SuggestionMap>,
    pub tips: RwLock<FreeformDocument>,
    pub tests: RwLock<FreeformDocument>,
}

impl Documents {
    /// Replace the in-memory copies with what is on disk; absent documents become empty
    pub async fn load(&self, store: &JsonStore) {
        *self.suggestions.write().await = store.load(SUGGESTIONS_FILE).await.unwrap_or_default();
        *self.tips.write().await = store.load(TIPS_FILE).await.unwrap_or_default();
        *self.tests.write().await = store.load(TESTS_FILE).await.unwrap_or_default();
    }

    /// Give every guild empty suggestion queues if it has none
    pub async fn ensure_suggestions(&self, guild_ids: &[serenity::GuildId]) -> usize {
        let mut suggestions = self.suggestions.write().await;
        let before = suggestions.len();
        for guild_id in guild_ids {
            suggestions
                .entry(guild_id.to_string())
                .or_insert_with(SuggestionLists::default);
        }
        suggestions.len() - before
    }

    pub async fn save(&self, store: &JsonStore) {
        if let Err(e) = store.save(SUGGESTIONS_FILE, &*self.suggestions.read().await).await {
            warn!("Failed to save suggestions: {}", e);
        }
        if let Err(e) = store.save(TIPS_FILE, &*self.tips.read().await).await {
            warn!("Failed to save tips: {}", e);
        }
        if let Err(e) = store.save(TESTS_FILE, &*self.tests.read().await).await {
            warn!("Failed to save tests: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_load_missing_documents_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path(), "");
        let docs = Documents::default();

        docs.load(&store).await;
        assert!(docs.suggestions.read().await.is_empty());
        assert!(docs.tips.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_existing_suggestions_are_kept() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path(), "");
        store
            .save(
                SUGGESTIONS_FILE,
                &json!({ "1": { "pending": ["more emoji"], "approved": [], "denied": [] } }),
            )
            .await
            .unwrap();
        store.save(TIPS_FILE, &json!({ "hydrate": "drink water" })).await.unwrap();

        let docs = Documents::default();
        docs.load(&store).await;
        let added = docs
            .ensure_suggestions(&[serenity::GuildId::new(1), serenity::GuildId::new(2)])
            .await;

        assert_eq!(added, 1);
        let suggestions = docs.suggestions.read().await;
        assert_eq!(suggestions["1"].pending, vec![json!("more emoji")]);
        assert_eq!(suggestions["2"], SuggestionLists::default());
        assert_eq!(docs.tips.read().await.get("hydrate"), Some(&json!("drink water")));
    }
}
