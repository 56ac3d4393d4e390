//! `data_sources` table.

use super::{Store, StoreError};
use crate::credentials::CredentialBundle;
use crate::source::{ConnectionStatus, DataSource, Platform};
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use uuid::Uuid;

const SOURCE_COLUMNS: &str =
    "id, user_id, platform, status, credentials, last_synced_at, created_at, updated_at";

/// Raw column values, converted outside the rusqlite row closure so parse
/// failures surface as [`StoreError::Corrupt`].
struct SourceRow {
    id: String,
    user_id: String,
    platform: String,
    status: String,
    credentials: String,
    last_synced_at: Option<String>,
    created_at: String,
    updated_at: String,
}

impl SourceRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            platform: row.get(2)?,
            status: row.get(3)?,
            credentials: row.get(4)?,
            last_synced_at: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }

    fn into_source(self) -> Result<DataSource, StoreError> {
        let corrupt = |detail: String| StoreError::Corrupt {
            table: "data_sources",
            detail,
        };

        let platform = self
            .platform
            .parse::<Platform>()
            .map_err(|e| corrupt(format!("{}: {}", self.id, e)))?;
        let status = self
            .status
            .parse::<ConnectionStatus>()
            .map_err(|e| corrupt(format!("{}: {}", self.id, e)))?;
        let credentials: CredentialBundle = serde_json::from_str(&self.credentials)
            .map_err(|e| corrupt(format!("{}: credentials: {}", self.id, e)))?;

        Ok(DataSource {
            platform,
            status,
            credentials,
            last_synced_at: self
                .last_synced_at
                .as_deref()
                .map(|ts| parse_timestamp(&self.id, ts))
                .transpose()?,
            created_at: parse_timestamp(&self.id, &self.created_at)?,
            updated_at: parse_timestamp(&self.id, &self.updated_at)?,
            id: self.id,
            user_id: self.user_id,
        })
    }
}

fn parse_timestamp(id: &str, value: &str) -> Result<DateTime<Utc>, StoreError> {
    value.parse().map_err(|e| StoreError::Corrupt {
        table: "data_sources",
        detail: format!("{}: timestamp '{}': {}", id, value, e),
    })
}

impl Store {
    /// Creates the (user, platform) source or updates it in place.
    ///
    /// Either way the stored credentials are replaced and the status is set
    /// to `connected`. The source id never changes after creation.
    pub fn upsert_source(
        &self,
        user_id: &str,
        platform: Platform,
        credentials: &CredentialBundle,
    ) -> Result<DataSource, StoreError> {
        let credentials_json = serde_json::to_string(credentials)?;
        let now = Utc::now().to_rfc3339();

        {
            let conn = self.conn.lock().unwrap();
            conn.execute(
                "INSERT INTO data_sources (
                    id, user_id, platform, status, credentials, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
                ON CONFLICT(user_id, platform) DO UPDATE SET
                    status = excluded.status,
                    credentials = excluded.credentials,
                    updated_at = excluded.updated_at",
                params![
                    Uuid::new_v4().to_string(),
                    user_id,
                    platform.as_str(),
                    ConnectionStatus::Connected.as_str(),
                    credentials_json,
                    now,
                ],
            )?;
        }

        self.find_source(user_id, platform)?
            .ok_or_else(|| StoreError::NotFound(format!("{}/{}", user_id, platform)))
    }

    /// Looks up the source a user has for a platform.
    pub fn find_source(
        &self,
        user_id: &str,
        platform: Platform,
    ) -> Result<Option<DataSource>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                &format!(
                    "SELECT {} FROM data_sources WHERE user_id = ?1 AND platform = ?2",
                    SOURCE_COLUMNS
                ),
                params![user_id, platform.as_str()],
                SourceRow::read,
            )
            .optional()?;

        row.map(SourceRow::into_source).transpose()
    }

    pub fn get_source(&self, source_id: &str) -> Result<Option<DataSource>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                &format!("SELECT {} FROM data_sources WHERE id = ?1", SOURCE_COLUMNS),
                params![source_id],
                SourceRow::read,
            )
            .optional()?;

        row.map(SourceRow::into_source).transpose()
    }

    /// All sources owned by a user, oldest first.
    pub fn list_sources_by_user(&self, user_id: &str) -> Result<Vec<DataSource>, StoreError> {
        self.query_sources(
            &format!(
                "SELECT {} FROM data_sources WHERE user_id = ?1 ORDER BY created_at ASC",
                SOURCE_COLUMNS
            ),
            user_id,
        )
    }

    /// Sources of a user whose status is `connected`.
    pub fn list_connected_sources(&self, user_id: &str) -> Result<Vec<DataSource>, StoreError> {
        self.query_sources(
            &format!(
                "SELECT {} FROM data_sources WHERE user_id = ?1 AND status = 'connected' ORDER BY created_at ASC",
                SOURCE_COLUMNS
            ),
            user_id,
        )
    }

    fn query_sources(&self, sql: &str, user_id: &str) -> Result<Vec<DataSource>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map(params![user_id], SourceRow::read)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter().map(SourceRow::into_source).collect()
    }

    /// Rewrites the access token and expiry of a source in one transaction.
    ///
    /// `refresh_token` replaces the stored refresh token only when `Some`.
    /// All other bundle fields are kept.
    pub fn update_access_token(
        &self,
        source_id: &str,
        access_token: String,
        expires_at: Option<DateTime<Utc>>,
        refresh_token: Option<String>,
    ) -> Result<(), StoreError> {
        self.modify_credentials(source_id, |bundle| {
            bundle.apply_refresh(access_token, expires_at, refresh_token);
            Ok(())
        })
    }

    /// Stores the Google Analytics property a source reports on.
    pub fn set_google_property(&self, source_id: &str, property_id: &str) -> Result<(), StoreError> {
        self.modify_credentials(source_id, |bundle| match bundle {
            CredentialBundle::Google(google) => {
                google.property_id = Some(property_id.to_string());
                Ok(())
            }
            CredentialBundle::Facebook(_) => Err(StoreError::ProviderMismatch {
                id: source_id.to_string(),
                expected: "google",
            }),
        })
    }

    fn modify_credentials<F>(&self, source_id: &str, apply: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut CredentialBundle) -> Result<(), StoreError>,
    {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let raw: Option<String> = tx
            .query_row(
                "SELECT credentials FROM data_sources WHERE id = ?1",
                params![source_id],
                |row| row.get(0),
            )
            .optional()?;
        let raw = raw.ok_or_else(|| StoreError::NotFound(source_id.to_string()))?;

        let mut bundle: CredentialBundle =
            serde_json::from_str(&raw).map_err(|e| StoreError::Corrupt {
                table: "data_sources",
                detail: format!("{}: credentials: {}", source_id, e),
            })?;
        apply(&mut bundle)?;

        tx.execute(
            "UPDATE data_sources SET credentials = ?1, updated_at = ?2 WHERE id = ?3",
            params![
                serde_json::to_string(&bundle)?,
                Utc::now().to_rfc3339(),
                source_id
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    pub fn set_status(&self, source_id: &str, status: ConnectionStatus) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "UPDATE data_sources SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![status.as_str(), Utc::now().to_rfc3339(), source_id],
        )?;

        if changed == 0 {
            return Err(StoreError::NotFound(source_id.to_string()));
        }
        Ok(())
    }

    /// Records when a source last finished a sync.
    pub fn touch_last_synced(&self, source_id: &str, at: DateTime<Utc>) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "UPDATE data_sources SET last_synced_at = ?1, updated_at = ?1 WHERE id = ?2",
            params![at.to_rfc3339(), source_id],
        )?;

        if changed == 0 {
            return Err(StoreError::NotFound(source_id.to_string()));
        }
        Ok(())
    }
}
