//! Platform-specific credential bundles.
//!
//! Token fields (`access_token`, `refresh_token`, `page_access_token`, and the
//! per-page tokens) always hold [`TokenCipher`](super::TokenCipher) envelopes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

fn default_token_type() -> String {
    "Bearer".to_string()
}

/// Credential bundle stored with each data source.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "snake_case")]
pub enum CredentialBundle {
    Google(GoogleCredentials),
    Facebook(FacebookCredentials),
}

/// Google OAuth tokens plus the selected Analytics property.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GoogleCredentials {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property_id: Option<String>,
}

/// Facebook user token plus the primary page and its linked Instagram account.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FacebookCredentials {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    pub page_id: String,
    pub page_name: String,
    pub page_access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instagram_account_id: Option<String>,
    #[serde(default)]
    pub available_pages: Vec<FacebookPage>,
}

/// A page the connected Facebook user manages.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FacebookPage {
    pub id: String,
    pub name: String,
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instagram_business_account: Option<String>,
}

impl CredentialBundle {
    pub fn as_google(&self) -> Option<&GoogleCredentials> {
        match self {
            CredentialBundle::Google(google) => Some(google),
            CredentialBundle::Facebook(_) => None,
        }
    }

    pub fn as_facebook(&self) -> Option<&FacebookCredentials> {
        match self {
            CredentialBundle::Facebook(facebook) => Some(facebook),
            CredentialBundle::Google(_) => None,
        }
    }

    pub fn access_token(&self) -> &str {
        match self {
            CredentialBundle::Google(c) => &c.access_token,
            CredentialBundle::Facebook(c) => &c.access_token,
        }
    }

    pub fn refresh_token(&self) -> Option<&str> {
        match self {
            CredentialBundle::Google(c) => c.refresh_token.as_deref(),
            CredentialBundle::Facebook(c) => c.refresh_token.as_deref(),
        }
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        match self {
            CredentialBundle::Google(c) => c.expires_at,
            CredentialBundle::Facebook(c) => c.expires_at,
        }
    }

    pub fn token_type(&self) -> &str {
        match self {
            CredentialBundle::Google(c) => &c.token_type,
            CredentialBundle::Facebook(c) => &c.token_type,
        }
    }

    /// Replaces the access token and expiry, and the refresh token when a new
    /// one was issued. Every other field is left as is.
    pub fn apply_refresh(
        &mut self,
        access_token: String,
        expires_at: Option<DateTime<Utc>>,
        refresh_token: Option<String>,
    ) {
        let (access, expiry, refresh) = match self {
            CredentialBundle::Google(c) => {
                (&mut c.access_token, &mut c.expires_at, &mut c.refresh_token)
            }
            CredentialBundle::Facebook(c) => {
                (&mut c.access_token, &mut c.expires_at, &mut c.refresh_token)
            }
        };

        *access = access_token;
        *expiry = expires_at;
        if let Some(rotated) = refresh_token {
            *refresh = Some(rotated);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn google() -> CredentialBundle {
        CredentialBundle::Google(GoogleCredentials {
            access_token: "enc-access".into(),
            refresh_token: Some("enc-refresh".into()),
            expires_at: Some(Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()),
            token_type: "Bearer".into(),
            property_id: Some("123456".into()),
        })
    }

    fn facebook() -> CredentialBundle {
        CredentialBundle::Facebook(FacebookCredentials {
            access_token: "enc-user".into(),
            refresh_token: None,
            expires_at: None,
            token_type: "bearer".into(),
            page_id: "p1".into(),
            page_name: "Bakery".into(),
            page_access_token: "enc-page".into(),
            instagram_account_id: Some("ig1".into()),
            available_pages: vec![FacebookPage {
                id: "p1".into(),
                name: "Bakery".into(),
                access_token: "enc-page".into(),
                instagram_business_account: Some("ig1".into()),
            }],
        })
    }

    #[test]
    fn test_serialized_with_provider_tag() {
        let json = serde_json::to_value(google()).unwrap();
        assert_eq!(json["provider"], "google");
        assert_eq!(json["property_id"], "123456");

        let json = serde_json::to_value(facebook()).unwrap();
        assert_eq!(json["provider"], "facebook");
        assert_eq!(json["available_pages"][0]["instagram_business_account"], "ig1");
        assert!(json.get("refresh_token").is_none());
    }

    #[test]
    fn test_deserialize_defaults() {
        let bundle: CredentialBundle =
            serde_json::from_str(r#"{"provider":"google","access_token":"x"}"#).unwrap();
        let google = bundle.as_google().unwrap();
        assert_eq!(google.token_type, "Bearer");
        assert!(google.refresh_token.is_none());
        assert!(google.property_id.is_none());
    }

    #[test]
    fn test_narrowing_accessors() {
        assert!(google().as_google().is_some());
        assert!(google().as_facebook().is_none());
        assert!(facebook().as_facebook().is_some());
        assert!(facebook().as_google().is_none());

        assert_eq!(facebook().access_token(), "enc-user");
        assert_eq!(google().refresh_token(), Some("enc-refresh"));
        assert_eq!(facebook().refresh_token(), None);
        assert_eq!(facebook().token_type(), "bearer");
    }

    #[test]
    fn test_apply_refresh_leaves_extras_untouched() {
        let mut bundle = google();
        let expiry = Utc.with_ymd_and_hms(2024, 1, 1, 13, 0, 0).unwrap();
        bundle.apply_refresh("enc-new".into(), Some(expiry), None);

        let google = bundle.as_google().unwrap();
        assert_eq!(google.access_token, "enc-new");
        assert_eq!(google.expires_at, Some(expiry));
        assert_eq!(google.refresh_token.as_deref(), Some("enc-refresh"));
        assert_eq!(google.property_id.as_deref(), Some("123456"));
    }

    #[test]
    fn test_apply_refresh_rotates_refresh_token() {
        let mut bundle = facebook();
        bundle.apply_refresh("enc-new".into(), None, Some("enc-rotated".into()));

        let fb = bundle.as_facebook().unwrap();
        assert_eq!(fb.refresh_token.as_deref(), Some("enc-rotated"));
        assert_eq!(fb.page_access_token, "enc-page");
        assert_eq!(fb.available_pages.len(), 1);
    }
}
