// Slash and prefix commands
pub mod config;
pub mod rolepicker;
