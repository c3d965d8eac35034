//! Family and face read projections.

use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;

use super::files::FileStatus;
use super::Database;
use crate::error::StoreResult;

/// Lowercase, trim and collapse internal whitespace.
pub fn normalize_family_key(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FaceEntry {
    pub id: i64,
    pub file_id: i64,
    pub path: PathBuf,
    pub file_status: FileStatus,
    pub index: u32,
    pub postscript_name: Option<String>,
    pub full_name: Option<String>,
    pub style_name: Option<String>,
    pub weight: Option<f64>,
    pub width: Option<f64>,
    pub slant: Option<f64>,
    pub italic: bool,
    pub variable: bool,
    pub activated: bool,
    pub preview_supported: bool,
    pub install_supported: bool,
}

/// A family's selected value in one facet column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FamilyFacet {
    pub column: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FamilyEntry {
    pub id: i64,
    pub key: String,
    pub name: String,
    pub faces: Vec<FaceEntry>,
    pub facets: Vec<FamilyFacet>,
}

impl Database {
    /// Every family that currently has at least one face, with its faces and
    /// facet selections.
    pub fn list_families(&self) -> StoreResult<Vec<FamilyEntry>> {
        let conn = self.conn();

        let mut stmt = conn.prepare(
            r#"
            SELECT c.column_key, v.value_key, ffv.family_id
            FROM family_facet_values ffv
            JOIN facet_values v ON v.id = ffv.value_id
            JOIN facet_columns c ON c.id = v.column_id
            ORDER BY c.position, v.position
            "#,
        )?;
        let mut facets: HashMap<i64, Vec<FamilyFacet>> = HashMap::new();
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(2)?,
                FamilyFacet {
                    column: row.get(0)?,
                    value: row.get(1)?,
                },
            ))
        })?;
        for row in rows {
            let (family_id, facet) = row?;
            facets.entry(family_id).or_default().push(facet);
        }

        let mut stmt = conn.prepare(
            r#"
            SELECT fam.id, fam.family_key, fam.display_name,
                   fa.id, fa.file_id, fi.path, fi.status, fa.face_index,
                   fa.postscript_name, fa.full_name, fa.style_name,
                   fa.weight, fa.width, fa.slant, fa.is_italic, fa.is_variable,
                   fa.activated, fa.preview_supported, fa.install_supported
            FROM faces fa
            JOIN families fam ON fam.id = fa.family_id
            JOIN font_files fi ON fi.id = fa.file_id
            ORDER BY fam.display_name COLLATE NOCASE, fam.id, fi.path, fa.face_index
            "#,
        )?;
        let rows = stmt.query_map([], |row| {
            let status: String = row.get(6)?;
            let face = FaceEntry {
                id: row.get(3)?,
                file_id: row.get(4)?,
                path: PathBuf::from(row.get::<_, String>(5)?),
                file_status: FileStatus::from_str(&status).unwrap_or(FileStatus::Error),
                index: row.get(7)?,
                postscript_name: row.get(8)?,
                full_name: row.get(9)?,
                style_name: row.get(10)?,
                weight: row.get(11)?,
                width: row.get(12)?,
                slant: row.get(13)?,
                italic: row.get(14)?,
                variable: row.get(15)?,
                activated: row.get(16)?,
                preview_supported: row.get(17)?,
                install_supported: row.get(18)?,
            };
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                face,
            ))
        })?;

        let mut families: Vec<FamilyEntry> = Vec::new();
        for row in rows {
            let (family_id, key, name, face) = row?;
            match families.last_mut() {
                Some(family) if family.id == family_id => family.faces.push(face),
                _ => families.push(FamilyEntry {
                    id: family_id,
                    key,
                    name,
                    faces: vec![face],
                    facets: facets.remove(&family_id).unwrap_or_default(),
                }),
            }
        }

        Ok(families)
    }
}
