//! `metrics` table.

use super::{Store, StoreError};
use crate::metric::MetricRecord;
use chrono::Utc;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter};
use std::collections::BTreeSet;
use uuid::Uuid;

const INSERT_COLUMNS: usize = 9;

/// SQLite's default cap on bound parameters per statement.
const MAX_BOUND_PARAMS: usize = 999;

impl Store {
    /// Replaces every metric row of a source for the dates present in `records`.
    ///
    /// Rows for those dates are deleted regardless of metric type, then the
    /// new rows are inserted with one multi-row `INSERT` per batch of
    /// `batch_size` (capped by SQLite's parameter limit). Everything runs in
    /// one transaction: if any batch fails nothing is committed and the
    /// previous rows stay in place.
    ///
    /// Returns the number of rows inserted.
    pub fn replace_metrics(
        &self,
        user_id: &str,
        source_id: &str,
        records: &[MetricRecord],
        batch_size: usize,
    ) -> Result<usize, StoreError> {
        if records.is_empty() {
            return Ok(0);
        }

        let dates: BTreeSet<&str> = records.iter().map(|r| r.date.as_str()).collect();
        let created_at = Utc::now().to_rfc3339();

        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        {
            let mut delete = tx.prepare(
                "DELETE FROM metrics WHERE user_id = ?1 AND source_id = ?2 AND date = ?3",
            )?;
            for date in &dates {
                delete.execute(params![user_id, source_id, date])?;
            }
        }

        let batch_size = batch_size.clamp(1, MAX_BOUND_PARAMS / INSERT_COLUMNS);
        let mut inserted = 0;

        for batch in records.chunks(batch_size) {
            let mut values = Vec::with_capacity(batch.len() * INSERT_COLUMNS);
            for record in batch {
                let metadata = record
                    .metadata
                    .as_ref()
                    .map(serde_json::to_string)
                    .transpose()?;

                values.push(Value::from(Uuid::new_v4().to_string()));
                values.push(Value::from(user_id.to_string()));
                values.push(Value::from(source_id.to_string()));
                values.push(Value::from(record.metric_type.clone()));
                values.push(Value::from(record.metric_name.clone()));
                values.push(Value::from(record.value));
                values.push(Value::from(record.date.clone()));
                values.push(Value::from(metadata));
                values.push(Value::from(created_at.clone()));
            }

            let sql = format!(
                "INSERT INTO metrics (
                    id, user_id, source_id, metric_type, metric_name, value, date, metadata, created_at
                ) VALUES {}",
                row_placeholders(batch.len())
            );
            inserted += tx.execute(&sql, params_from_iter(values))?;
        }

        tx.commit()?;
        Ok(inserted)
    }

    /// Metric rows of a source ordered by date, then metric type.
    pub fn list_metrics(&self, source_id: &str) -> Result<Vec<MetricRecord>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT user_id, source_id, metric_type, value, date, metric_name, metadata
             FROM metrics WHERE source_id = ?1 ORDER BY date ASC, metric_type ASC",
        )?;

        let rows = stmt
            .query_map(params![source_id], |row| {
                Ok((
                    MetricRecord {
                        user_id: row.get(0)?,
                        source_id: row.get(1)?,
                        metric_type: row.get(2)?,
                        value: row.get(3)?,
                        date: row.get(4)?,
                        metric_name: row.get(5)?,
                        metadata: None,
                    },
                    row.get::<_, Option<String>>(6)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(mut record, metadata)| {
                record.metadata = metadata
                    .map(|raw| serde_json::from_str(&raw))
                    .transpose()
                    .map_err(|e| StoreError::Corrupt {
                        table: "metrics",
                        detail: format!("metadata: {}", e),
                    })?;
                Ok(record)
            })
            .collect()
    }

    pub fn count_metrics(&self, source_id: &str) -> Result<usize, StoreError> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM metrics WHERE source_id = ?1",
            params![source_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

/// `(?1, ..., ?9), (?10, ..., ?18), ...` for `rows` rows.
fn row_placeholders(rows: usize) -> String {
    (0..rows)
        .map(|row| {
            let params: Vec<String> = (1..=INSERT_COLUMNS)
                .map(|col| format!("?{}", row * INSERT_COLUMNS + col))
                .collect();
            format!("({})", params.join(", "))
        })
        .collect::<Vec<_>>()
        .join(", ")
}
