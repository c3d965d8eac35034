//! Declarative facet taxonomy.
//!
//! A schema lists tagging columns and their allowed values. It is loaded from
//! a TOML or JSON file and handed to [`Database::sync_facet_schema`], which
//! makes the store match it exactly.
//!
//! [`Database::sync_facet_schema`]: crate::db::Database::sync_facet_schema

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::error::FacetSchemaError;

/// Key of the one synthetic value every boolean column carries.
pub const BOOLEAN_VALUE_KEY: &str = "true";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FacetKind {
    SingleSelect,
    MultiSelect,
    Boolean,
}

impl FacetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FacetKind::SingleSelect => "single_select",
            FacetKind::MultiSelect => "multi_select",
            FacetKind::Boolean => "boolean",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "single_select" => Some(FacetKind::SingleSelect),
            "multi_select" => Some(FacetKind::MultiSelect),
            "boolean" => Some(FacetKind::Boolean),
            _ => None,
        }
    }

    /// Whether a family may hold more than one value of this column.
    pub fn allows_many(&self) -> bool {
        matches!(self, FacetKind::MultiSelect)
    }
}

/// A value either as a bare key or with an explicit display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FacetValueDef {
    Key(String),
    Full {
        key: String,
        #[serde(default)]
        display_name: Option<String>,
    },
}

impl FacetValueDef {
    pub fn key(&self) -> &str {
        match self {
            FacetValueDef::Key(key) => key,
            FacetValueDef::Full { key, .. } => key,
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            FacetValueDef::Key(key) => key,
            FacetValueDef::Full { key, display_name } => display_name.as_deref().unwrap_or(key),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetColumnDef {
    pub key: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(rename = "type")]
    pub kind: FacetKind,
    #[serde(default)]
    pub values: Vec<FacetValueDef>,
}

impl FacetColumnDef {
    pub fn display_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.key)
    }

    /// Values as stored: boolean columns always get exactly one synthetic
    /// value regardless of what was declared.
    pub fn effective_values(&self) -> Vec<(String, String)> {
        match self.kind {
            FacetKind::Boolean => vec![(
                BOOLEAN_VALUE_KEY.to_string(),
                self.display_name().to_string(),
            )],
            _ => self
                .values
                .iter()
                .map(|v| (v.key().to_string(), v.display_name().to_string()))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetSchema {
    #[serde(default)]
    pub columns: Vec<FacetColumnDef>,
}

impl FacetSchema {
    /// Load a schema from a `.toml` or `.json` file and validate it.
    pub fn load(path: &Path) -> Result<Self, FacetSchemaError> {
        let content = std::fs::read_to_string(path)?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        let schema: FacetSchema = match ext.as_str() {
            "toml" => toml::from_str(&content)?,
            "json" => serde_json::from_str(&content)?,
            other => return Err(FacetSchemaError::Format(other.to_string())),
        };
        schema.validate()?;
        Ok(schema)
    }

    pub fn validate(&self) -> Result<(), FacetSchemaError> {
        let mut column_keys = HashSet::new();
        for column in &self.columns {
            if column.key.trim().is_empty() {
                return Err(FacetSchemaError::EmptyColumnKey);
            }
            if !column_keys.insert(column.key.as_str()) {
                return Err(FacetSchemaError::DuplicateColumn(column.key.clone()));
            }
            if column.kind == FacetKind::Boolean {
                continue;
            }

            let mut value_keys = HashSet::new();
            for value in &column.values {
                if value.key().trim().is_empty() {
                    return Err(FacetSchemaError::EmptyValueKey(column.key.clone()));
                }
                if !value_keys.insert(value.key()) {
                    return Err(FacetSchemaError::DuplicateValue {
                        column: column.key.clone(),
                        value: value.key().to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const SAMPLE: &str = r#"
[[columns]]
key = "classification"
display_name = "Classification"
type = "single_select"
values = ["serif", { key = "sans", display_name = "Sans Serif" }]

[[columns]]
key = "licensed"
type = "boolean"
values = ["ignored"]
"#;

    #[test]
    fn test_load_toml_schema() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("facets.toml");
        std::fs::write(&path, SAMPLE).unwrap();

        let schema = FacetSchema::load(&path).unwrap();
        assert_eq!(schema.columns.len(), 2);

        let classification = &schema.columns[0];
        assert_eq!(classification.kind, FacetKind::SingleSelect);
        assert_eq!(
            classification.effective_values(),
            vec![
                ("serif".to_string(), "serif".to_string()),
                ("sans".to_string(), "Sans Serif".to_string()),
            ]
        );

        let licensed = &schema.columns[1];
        assert_eq!(licensed.display_name(), "licensed");
        assert_eq!(
            licensed.effective_values(),
            vec![(BOOLEAN_VALUE_KEY.to_string(), "licensed".to_string())]
        );
    }

    #[test]
    fn test_load_json_schema() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("facets.json");
        std::fs::write(
            &path,
            r#"{"columns":[{"key":"mood","type":"multi_select","values":["calm","loud"]}]}"#,
        )
        .unwrap();

        let schema = FacetSchema::load(&path).unwrap();
        assert!(schema.columns[0].kind.allows_many());
        assert_eq!(schema.columns[0].values.len(), 2);
    }

    #[test]
    fn test_rejects_unknown_extension() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("facets.yaml");
        std::fs::write(&path, "columns: []").unwrap();

        assert!(matches!(
            FacetSchema::load(&path),
            Err(FacetSchemaError::Format(ext)) if ext == "yaml"
        ));
    }

    #[test]
    fn test_validation() {
        let dup_column: FacetSchema = toml::from_str(
            r#"
[[columns]]
key = "a"
type = "boolean"
[[columns]]
key = "a"
type = "multi_select"
"#,
        )
        .unwrap();
        assert!(matches!(
            dup_column.validate(),
            Err(FacetSchemaError::DuplicateColumn(key)) if key == "a"
        ));

        let dup_value: FacetSchema = toml::from_str(
            r#"
[[columns]]
key = "style"
type = "multi_select"
values = ["x", { key = "x" }]
"#,
        )
        .unwrap();
        assert!(matches!(
            dup_value.validate(),
            Err(FacetSchemaError::DuplicateValue { .. })
        ));

        let empty: FacetSchema = toml::from_str(
            r#"
[[columns]]
key = " "
type = "boolean"
"#,
        )
        .unwrap();
        assert!(matches!(empty.validate(), Err(FacetSchemaError::EmptyColumnKey)));
    }
}
