// Bot features
pub mod dispatcher;
pub mod documents;
pub mod guild_configs;
pub mod lifecycle;
pub mod reaction_roles;
pub mod store;
