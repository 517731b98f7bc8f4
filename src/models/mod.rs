// Data models
pub mod documents;
pub mod guild;
