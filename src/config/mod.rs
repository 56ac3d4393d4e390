use serde::Deserialize;
use std::time::Duration;

/// Complete Marketlens configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub oauth: OAuthConfig,
    #[serde(default)]
    pub google: GoogleProviderConfig,
    #[serde(default)]
    pub facebook: FacebookProviderConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Port of the OAuth / sources API
    #[serde(default = "default_port")]
    pub port: u16,
    /// Port of the sync-manager API
    #[serde(default = "default_sync_port")]
    pub sync_port: u16,
    /// Where the dashboard lives; OAuth callbacks redirect back here
    #[serde(default = "default_app_url")]
    pub app_url: String,
    /// Public base URL providers redirect to after consent
    #[serde(default = "default_callback_base_url")]
    pub callback_base_url: String,
    /// Adds `Secure` to cookies (enable behind HTTPS)
    #[serde(default)]
    pub secure_cookies: bool,
}

fn default_port() -> u16 {
    3000
}

fn default_sync_port() -> u16 {
    3001
}

fn default_app_url() -> String {
    "http://localhost:5173".to_string()
}

fn default_callback_base_url() -> String {
    "http://localhost:3000".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            sync_port: default_sync_port(),
            app_url: default_app_url(),
            callback_base_url: default_callback_base_url(),
            secure_cookies: false,
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_database_path")]
    pub database_path: String,
    /// Base64-encoded 32-byte key; normally set via `MARKETLENS_ENCRYPTION_KEY`
    #[serde(default)]
    pub encryption_key: Option<String>,
}

fn default_database_path() -> String {
    "marketlens.db".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            encryption_key: None,
        }
    }
}

/// OAuth flow configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthConfig {
    /// Lifetime of the state cookie
    #[serde(default = "default_state_ttl")]
    pub state_ttl_seconds: u64,
    /// Dashboard page the callback redirects to
    #[serde(default = "default_settings_path")]
    pub settings_path: String,
}

fn default_state_ttl() -> u64 {
    600
}

fn default_settings_path() -> String {
    "/dashboard/settings".to_string()
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            state_ttl_seconds: default_state_ttl(),
            settings_path: default_settings_path(),
        }
    }
}

/// Google OAuth client and API endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleProviderConfig {
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default = "default_google_auth_url")]
    pub auth_url: String,
    #[serde(default = "default_google_token_url")]
    pub token_url: String,
    #[serde(default = "default_google_revoke_url")]
    pub revoke_url: String,
    #[serde(default = "default_google_data_api_url")]
    pub analytics_data_url: String,
    #[serde(default = "default_google_scopes")]
    pub scopes: Vec<String>,
}

fn default_google_auth_url() -> String {
    "https://accounts.google.com/o/oauth2/v2/auth".to_string()
}

fn default_google_token_url() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

fn default_google_revoke_url() -> String {
    "https://oauth2.googleapis.com/revoke".to_string()
}

fn default_google_data_api_url() -> String {
    "https://analyticsdata.googleapis.com/v1beta".to_string()
}

fn default_google_scopes() -> Vec<String> {
    vec!["https://www.googleapis.com/auth/analytics.readonly".to_string()]
}

impl Default for GoogleProviderConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            auth_url: default_google_auth_url(),
            token_url: default_google_token_url(),
            revoke_url: default_google_revoke_url(),
            analytics_data_url: default_google_data_api_url(),
            scopes: default_google_scopes(),
        }
    }
}

impl GoogleProviderConfig {
    /// Client id and secret, when both are set and non-empty.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        client_pair(&self.client_id, &self.client_secret)
    }

    pub fn is_configured(&self) -> bool {
        self.credentials().is_some()
    }
}

/// Facebook app and Graph API endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct FacebookProviderConfig {
    #[serde(default)]
    pub app_id: Option<String>,
    #[serde(default)]
    pub app_secret: Option<String>,
    #[serde(default = "default_facebook_dialog_url")]
    pub dialog_url: String,
    /// Graph API root including version, e.g. `https://graph.facebook.com/v18.0`
    #[serde(default = "default_facebook_graph_url")]
    pub graph_url: String,
    #[serde(default = "default_facebook_scopes")]
    pub scopes: Vec<String>,
    /// Lifetime assumed for long-lived tokens when Facebook omits `expires_in`
    #[serde(default = "default_long_lived_token_days")]
    pub long_lived_token_days: i64,
}

fn default_facebook_dialog_url() -> String {
    "https://www.facebook.com/v18.0/dialog/oauth".to_string()
}

fn default_facebook_graph_url() -> String {
    "https://graph.facebook.com/v18.0".to_string()
}

fn default_facebook_scopes() -> Vec<String> {
    [
        "pages_show_list",
        "pages_read_engagement",
        "read_insights",
        "instagram_basic",
        "instagram_manage_insights",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_long_lived_token_days() -> i64 {
    60
}

impl Default for FacebookProviderConfig {
    fn default() -> Self {
        Self {
            app_id: None,
            app_secret: None,
            dialog_url: default_facebook_dialog_url(),
            graph_url: default_facebook_graph_url(),
            scopes: default_facebook_scopes(),
            long_lived_token_days: default_long_lived_token_days(),
        }
    }
}

impl FacebookProviderConfig {
    /// App id and secret, when both are set and non-empty.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        client_pair(&self.app_id, &self.app_secret)
    }

    pub fn is_configured(&self) -> bool {
        self.credentials().is_some()
    }

    /// Token endpoint used for code exchange and token upgrades.
    pub fn token_url(&self) -> String {
        format!("{}/oauth/access_token", self.graph_url.trim_end_matches('/'))
    }
}

fn client_pair<'a>(id: &'a Option<String>, secret: &'a Option<String>) -> Option<(&'a str, &'a str)> {
    match (id.as_deref(), secret.as_deref()) {
        (Some(id), Some(secret)) if !id.is_empty() && !secret.is_empty() => Some((id, secret)),
        _ => None,
    }
}

/// Fetch-and-store tuning
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// Longest date range sent to a provider in one request
    #[serde(default = "default_chunk_days")]
    pub chunk_days: i64,
    #[serde(default = "default_insert_batch_size")]
    pub insert_batch_size: usize,
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    /// Tokens expiring within this window are refreshed before a fetch
    #[serde(default = "default_refresh_buffer_seconds")]
    pub refresh_buffer_seconds: i64,
    /// Trailing window used when a sync request names no range
    #[serde(default = "default_window_days")]
    pub default_window_days: i64,
}

fn default_chunk_days() -> i64 {
    30
}

fn default_insert_batch_size() -> usize {
    100
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    1000
}

fn default_refresh_buffer_seconds() -> i64 {
    300
}

fn default_window_days() -> i64 {
    30
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            chunk_days: default_chunk_days(),
            insert_batch_size: default_insert_batch_size(),
            retry_attempts: default_retry_attempts(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            refresh_buffer_seconds: default_refresh_buffer_seconds(),
            default_window_days: default_window_days(),
        }
    }
}

impl SyncConfig {
    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn refresh_buffer(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.refresh_buffer_seconds)
    }
}

impl AppConfig {
    /// Loads `MARKETLENS_CONFIG` (or `config.toml` when present), then
    /// applies secrets from the environment.
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        let path = std::env::var("MARKETLENS_CONFIG").ok();
        let mut config = match path.as_deref() {
            Some(path) => load_config(path)?,
            None if std::path::Path::new("config.toml").exists() => load_config("config.toml")?,
            None => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    /// Overlays secrets from env vars onto whatever the file provided.
    pub fn apply_env(&mut self) {
        if let Ok(v) = std::env::var("MARKETLENS_ENCRYPTION_KEY") {
            self.storage.encryption_key = Some(v);
        }
        if let Ok(v) = std::env::var("MARKETLENS_GOOGLE_CLIENT_ID") {
            self.google.client_id = Some(v);
        }
        if let Ok(v) = std::env::var("MARKETLENS_GOOGLE_CLIENT_SECRET") {
            self.google.client_secret = Some(v);
        }
        if let Ok(v) = std::env::var("MARKETLENS_FACEBOOK_APP_ID") {
            self.facebook.app_id = Some(v);
        }
        if let Ok(v) = std::env::var("MARKETLENS_FACEBOOK_APP_SECRET") {
            self.facebook.app_secret = Some(v);
        }
    }
}

/// Load configuration from TOML file
pub fn load_config(path: &str) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let contents = std::fs::read_to_string(path)?;
    let config: AppConfig = toml::from_str(&contents)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Env vars are process-global; serialize tests that touch them.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const ENV_VARS: [&str; 5] = [
        "MARKETLENS_ENCRYPTION_KEY",
        "MARKETLENS_GOOGLE_CLIENT_ID",
        "MARKETLENS_GOOGLE_CLIENT_SECRET",
        "MARKETLENS_FACEBOOK_APP_ID",
        "MARKETLENS_FACEBOOK_APP_SECRET",
    ];

    fn clear_env() {
        for var in ENV_VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.oauth.state_ttl_seconds, 600);
        assert_eq!(config.sync.chunk_days, 30);
        assert_eq!(config.sync.insert_batch_size, 100);
        assert_eq!(config.sync.retry_attempts, 3);
        assert_eq!(config.sync.retry_base_delay(), Duration::from_secs(1));
        assert_eq!(config.sync.refresh_buffer(), chrono::Duration::minutes(5));
        assert_eq!(config.facebook.long_lived_token_days, 60);
        assert!(!config.google.is_configured());
        assert!(!config.facebook.is_configured());
    }

    #[test]
    fn test_config_deserialization() {
        let toml = r#"
            [server]
            port = 8080
            app_url = "https://app.example.com"
            secure_cookies = true

            [google]
            client_id = "gid"
            client_secret = "gsecret"

            [facebook]
            app_id = "fid"
            graph_url = "http://localhost:9999/v18.0/"

            [sync]
            chunk_days = 7
            retry_attempts = 5
        "#;

        let config: AppConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.server.port, 8080);
        assert!(config.server.secure_cookies);
        assert_eq!(config.google.credentials(), Some(("gid", "gsecret")));
        assert!(!config.facebook.is_configured());
        assert_eq!(
            config.facebook.token_url(),
            "http://localhost:9999/v18.0/oauth/access_token"
        );
        assert_eq!(config.sync.chunk_days, 7);
        assert_eq!(config.sync.retry_attempts, 5);
        assert_eq!(config.sync.insert_batch_size, 100); // Default
    }

    #[test]
    fn test_empty_credentials_are_not_configured() {
        let google = GoogleProviderConfig {
            client_id: Some("id".into()),
            client_secret: Some(String::new()),
            ..Default::default()
        };
        assert!(!google.is_configured());
    }

    #[test]
    fn test_env_overrides_secrets() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env();
        std::env::set_var("MARKETLENS_GOOGLE_CLIENT_ID", "env-id");
        std::env::set_var("MARKETLENS_GOOGLE_CLIENT_SECRET", "env-secret");
        std::env::set_var("MARKETLENS_ENCRYPTION_KEY", "a2V5");

        let mut config: AppConfig = toml::from_str("[google]\nclient_id = \"file-id\"").unwrap();
        config.apply_env();

        assert_eq!(config.google.credentials(), Some(("env-id", "env-secret")));
        assert_eq!(config.storage.encryption_key.as_deref(), Some("a2V5"));
        assert!(config.facebook.app_id.is_none());
        clear_env();
    }

    #[test]
    fn test_env_absent_keeps_file_values() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env();

        let mut config: AppConfig =
            toml::from_str("[facebook]\napp_id = \"a\"\napp_secret = \"b\"").unwrap();
        config.apply_env();

        assert_eq!(config.facebook.credentials(), Some(("a", "b")));
    }
}
