//! Facet columns, values and family selections.

use rusqlite::{OptionalExtension, Transaction};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::warn;

use super::Database;
use crate::error::{StoreError, StoreResult};
use crate::facets::{FacetKind, FacetSchema};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FacetValue {
    pub id: i64,
    pub key: String,
    pub display_name: String,
    pub position: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FacetColumn {
    pub id: i64,
    pub key: String,
    pub display_name: String,
    pub kind: FacetKind,
    pub position: i64,
    pub values: Vec<FacetValue>,
}

/// Mutations applied by one schema sync.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FacetSyncReport {
    pub columns_added: usize,
    pub columns_updated: usize,
    pub columns_removed: usize,
    pub values_added: usize,
    pub values_updated: usize,
    pub values_removed: usize,
    pub selections_pruned: usize,
}

impl FacetSyncReport {
    pub fn is_noop(&self) -> bool {
        *self == FacetSyncReport::default()
    }
}

struct StoredRow {
    id: i64,
    display_name: String,
    kind: Option<FacetKind>,
    position: i64,
}

impl Database {
    pub fn list_facet_columns(&self) -> StoreResult<Vec<FacetColumn>> {
        let conn = self.conn();

        let mut stmt = conn.prepare(
            "SELECT id, column_key, display_name, column_type, position
             FROM facet_columns ORDER BY position, column_key",
        )?;
        let mut columns = stmt
            .query_map([], |row| {
                let kind: String = row.get(3)?;
                Ok(FacetColumn {
                    id: row.get(0)?,
                    key: row.get(1)?,
                    display_name: row.get(2)?,
                    kind: FacetKind::from_str(&kind).unwrap_or(FacetKind::MultiSelect),
                    position: row.get(4)?,
                    values: Vec::new(),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut stmt = conn.prepare(
            "SELECT column_id, id, value_key, display_name, position
             FROM facet_values ORDER BY position, value_key",
        )?;
        let mut values: HashMap<i64, Vec<FacetValue>> = HashMap::new();
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                FacetValue {
                    id: row.get(1)?,
                    key: row.get(2)?,
                    display_name: row.get(3)?,
                    position: row.get(4)?,
                },
            ))
        })?;
        for row in rows {
            let (column_id, value) = row?;
            values.entry(column_id).or_default().push(value);
        }

        for column in &mut columns {
            column.values = values.remove(&column.id).unwrap_or_default();
        }
        Ok(columns)
    }

    /// Make the facet tables match `schema` exactly. Safe to re-run: a
    /// second sync with the same schema reports no mutations.
    ///
    /// A repeated column or value key is skipped; the first definition wins.
    pub fn sync_facet_schema(&self, schema: &FacetSchema) -> StoreResult<FacetSyncReport> {
        let mut report = FacetSyncReport::default();
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let existing = stored_rows(
            &tx,
            "SELECT column_key, id, display_name, column_type, position FROM facet_columns",
            [],
        )?;

        let mut keep = HashSet::new();
        for column in &schema.columns {
            if !keep.insert(column.key.as_str()) {
                warn!("Skipping duplicate facet column '{}'", column.key);
                continue;
            }
            let position = keep.len() as i64 - 1;
            let display_name = column.display_name();

            let (column_id, kind_changed) = match existing.get(&column.key) {
                Some(row) => {
                    let kind_changed = row.kind != Some(column.kind);
                    if row.display_name != display_name || kind_changed || row.position != position {
                        tx.execute(
                            "UPDATE facet_columns SET display_name = ?, column_type = ?, position = ?
                             WHERE id = ?",
                            rusqlite::params![display_name, column.kind.as_str(), position, row.id],
                        )?;
                        report.columns_updated += 1;
                    }
                    (row.id, kind_changed)
                }
                None => {
                    tx.execute(
                        "INSERT INTO facet_columns (column_key, display_name, column_type, position)
                         VALUES (?, ?, ?, ?)",
                        rusqlite::params![column.key, display_name, column.kind.as_str(), position],
                    )?;
                    report.columns_added += 1;
                    (tx.last_insert_rowid(), false)
                }
            };

            sync_values(&tx, column_id, &column.effective_values(), &mut report)?;

            if kind_changed && !column.kind.allows_many() {
                report.selections_pruned += prune_to_single_selection(&tx, column_id)?;
            }
        }

        for (key, row) in &existing {
            if keep.contains(key.as_str()) {
                continue;
            }
            let values: i64 = tx.query_row(
                "SELECT COUNT(*) FROM facet_values WHERE column_id = ?",
                [row.id],
                |r| r.get(0),
            )?;
            tx.execute("DELETE FROM facet_columns WHERE id = ?", [row.id])?;
            report.columns_removed += 1;
            report.values_removed += values as usize;
        }

        tx.commit()?;
        Ok(report)
    }

    /// Replace a family's selection in one facet column.
    ///
    /// Single-select and boolean columns take at most one value; an empty
    /// list clears the selection.
    pub fn set_family_facet_values(
        &self,
        family_id: i64,
        column_key: &str,
        value_keys: &[String],
    ) -> StoreResult<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let family: Option<i64> = tx
            .query_row("SELECT id FROM families WHERE id = ?", [family_id], |row| {
                row.get(0)
            })
            .optional()?;
        if family.is_none() {
            return Err(StoreError::FamilyNotFound(family_id));
        }

        let (column_id, kind): (i64, String) = tx
            .query_row(
                "SELECT id, column_type FROM facet_columns WHERE column_key = ?",
                [column_key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?
            .ok_or_else(|| StoreError::UnknownFacetColumn(column_key.to_string()))?;
        let kind = FacetKind::from_str(&kind).unwrap_or(FacetKind::MultiSelect);

        let wanted: BTreeSet<&str> = value_keys.iter().map(String::as_str).collect();
        if !kind.allows_many() && wanted.len() > 1 {
            return Err(StoreError::FacetSelection {
                column: column_key.to_string(),
                count: wanted.len(),
            });
        }

        let mut value_ids = Vec::with_capacity(wanted.len());
        for value_key in &wanted {
            let value_id: i64 = tx
                .query_row(
                    "SELECT id FROM facet_values WHERE column_id = ? AND value_key = ?",
                    rusqlite::params![column_id, value_key],
                    |row| row.get(0),
                )
                .optional()?
                .ok_or_else(|| StoreError::UnknownFacetValue {
                    column: column_key.to_string(),
                    value: value_key.to_string(),
                })?;
            value_ids.push(value_id);
        }

        tx.execute(
            "DELETE FROM family_facet_values
             WHERE family_id = ?
               AND value_id IN (SELECT id FROM facet_values WHERE column_id = ?)",
            rusqlite::params![family_id, column_id],
        )?;
        for value_id in value_ids {
            tx.execute(
                "INSERT OR IGNORE INTO family_facet_values (family_id, value_id) VALUES (?, ?)",
                rusqlite::params![family_id, value_id],
            )?;
        }

        tx.commit()?;
        Ok(())
    }
}

fn stored_rows(
    tx: &Transaction<'_>,
    sql: &str,
    params: impl rusqlite::Params,
) -> rusqlite::Result<HashMap<String, StoredRow>> {
    let mut stmt = tx.prepare(sql)?;
    let rows = stmt
        .query_map(params, |row| {
            let kind: Option<String> = row.get(3)?;
            Ok((
                row.get::<_, String>(0)?,
                StoredRow {
                    id: row.get(1)?,
                    display_name: row.get(2)?,
                    kind: kind.as_deref().and_then(FacetKind::from_str),
                    position: row.get(4)?,
                },
            ))
        })?
        .collect::<rusqlite::Result<HashMap<_, _>>>()?;
    Ok(rows)
}

fn sync_values(
    tx: &Transaction<'_>,
    column_id: i64,
    values: &[(String, String)],
    report: &mut FacetSyncReport,
) -> rusqlite::Result<()> {
    let existing = stored_rows(
        tx,
        "SELECT value_key, id, display_name, NULL, position FROM facet_values WHERE column_id = ?",
        [column_id],
    )?;

    let mut keep = HashSet::new();
    for (key, display_name) in values {
        if !keep.insert(key.as_str()) {
            warn!("Skipping duplicate facet value '{}' in column {}", key, column_id);
            continue;
        }
        let position = keep.len() as i64 - 1;
        match existing.get(key) {
            Some(row) if row.display_name == *display_name && row.position == position => {}
            Some(row) => {
                tx.execute(
                    "UPDATE facet_values SET display_name = ?, position = ? WHERE id = ?",
                    rusqlite::params![display_name, position, row.id],
                )?;
                report.values_updated += 1;
            }
            None => {
                tx.execute(
                    "INSERT INTO facet_values (column_id, value_key, display_name, position)
                     VALUES (?, ?, ?, ?)",
                    rusqlite::params![column_id, key, display_name, position],
                )?;
                report.values_added += 1;
            }
        }
    }

    for (key, row) in &existing {
        if !keep.contains(key.as_str()) {
            tx.execute("DELETE FROM facet_values WHERE id = ?", [row.id])?;
            report.values_removed += 1;
        }
    }
    Ok(())
}

/// Keep only the lowest-positioned selected value per family in a column
/// that no longer allows several. Returns the number of removed selections.
fn prune_to_single_selection(tx: &Transaction<'_>, column_id: i64) -> rusqlite::Result<usize> {
    tx.execute(
        r#"
        DELETE FROM family_facet_values
        WHERE value_id IN (SELECT id FROM facet_values WHERE column_id = ?1)
          AND rowid NOT IN (
              SELECT (
                  SELECT ffv2.rowid
                  FROM family_facet_values ffv2
                  JOIN facet_values v2 ON v2.id = ffv2.value_id
                  WHERE v2.column_id = ?1 AND ffv2.family_id = ffv.family_id
                  ORDER BY v2.position, v2.id
                  LIMIT 1
              )
              FROM family_facet_values ffv
              JOIN facet_values v ON v.id = ffv.value_id
              WHERE v.column_id = ?1
          )
        "#,
        [column_id],
    )
}
