// Auxiliary documents loaded alongside the guild configs
// These are carried through untouched; nothing in the bot interprets the entries

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Suggestion queues for one guild
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct SuggestionLists {
    #[serde(default)]
    pub pending: Vec<Value>,
    #[serde(default)]
    pub approved: Vec<Value>,
    #[serde(default)]
    pub denied: Vec<Value>,
}

/// suggestions.json: guild id -> queues
pub type SuggestionMap = BTreeMap<String, SuggestionLists>;

/// tips.json / tests.json: free-form objects
pub type FreeformDocument = serde_json::Map<String, Value>;
