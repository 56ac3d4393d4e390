//! Data sources: one external account connection owned by one user.
//!
//! A data source is created on the first successful OAuth callback for a
//! (user, platform) pair and updated in place afterwards. The sync pipeline
//! never deletes one; disconnecting only flips its status.

use crate::credentials::CredentialBundle;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;


/// External platform a data source is connected to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    GoogleAnalytics,
    FacebookInstagram,
    GoogleAds,
}

impl Platform {
    pub const ALL: [Platform; 3] = [
        Platform::GoogleAnalytics,
        Platform::FacebookInstagram,
        Platform::GoogleAds,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::GoogleAnalytics => "google_analytics",
            Platform::FacebookInstagram => "facebook_instagram",
            Platform::GoogleAds => "google_ads",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Platform::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| UnknownVariant {
                kind: "platform",
                value: s.to_string(),
            })
    }
}

/// Connection status of a data source.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
    Error,
    Syncing,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Error => "error",
            ConnectionStatus::Syncing => "syncing",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConnectionStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "connected" => Ok(ConnectionStatus::Connected),
            "disconnected" => Ok(ConnectionStatus::Disconnected),
            "error" => Ok(ConnectionStatus::Error),
            "syncing" => Ok(ConnectionStatus::Syncing),
            other => Err(UnknownVariant {
                kind: "connection status",
                value: other.to_string(),
            }),
        }
    }
}

/// Returned when a stored tag does not match any known variant.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("unknown {kind}: '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// One external account connection.
///
/// Token fields inside `credentials` are always envelope ciphertext; use
/// [`crate::credentials::TokenCipher`] to read them.
#[derive(Clone, Debug, PartialEq)]
pub struct DataSource {
    pub id: String,
    pub user_id: String,
    pub platform: Platform,
    pub status: ConnectionStatus,
    pub credentials: CredentialBundle,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DataSource {
    /// Public view without any credential material.
    pub fn summary(&self) -> DataSourceSummary {
        let display_name = match &self.credentials {
            CredentialBundle::Google(google) => google.property_id.clone(),
            CredentialBundle::Facebook(facebook) => Some(facebook.page_name.clone()),
        };

        DataSourceSummary {
            id: self.id.clone(),
            platform: self.platform,
            status: self.status,
            display_name,
            last_synced_at: self.last_synced_at,
            created_at: self.created_at,
        }
    }
}

/// Data source as exposed over HTTP.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct DataSourceSummary {
    pub id: String,
    pub platform: Platform,
    pub status: ConnectionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_synced_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
