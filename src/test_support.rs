// Shared fixtures for unit tests

use std::path::Path;

use crate::features::dispatcher::Listeners;
use crate::utils::config::Settings;
use crate::Data;

/// A `Data` whose documents live in `dir`
pub fn test_data(dir: &Path, listeners: Listeners) -> Data {
    let settings = Settings {
        discord_token: "test-token".into(),
        filecache_path: dir.to_path_buf(),
        filecache_prefix: String::new(),
        command_symbols: vec!["t!".into()],
        owner_id: None,
        owner_guild_id: None,
        database_urls: Vec::new(),
    };
    Data::new(settings, listeners, None)
}
