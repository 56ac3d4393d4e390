// Configuration (TOML file + environment secrets)
pub mod config;

// Credential bundles and token encryption
pub mod credentials;

// Data sources and metric records
pub mod metric;
pub mod source;

// SQLite persistence
pub mod store;

// Caller identity
pub mod auth;

// HTTP APIs
pub mod api;
