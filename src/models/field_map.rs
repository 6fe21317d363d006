use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

const EMBEDDED_FIELD_MAP: &str = include_str!("../../assets/field_map.json");

#[derive(Error, Debug)]
pub enum FieldMapError {
    #[error("Failed to read field map: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse field map: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("Duplicate label in field map: {0}")]
    DuplicateLabel(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMapping {
    pub label: String,
    pub field: String,
}

/// Form label (as shown to users) to gateway field name.
#[derive(Debug, Clone)]
pub struct FieldMap {
    entries: Vec<FieldMapping>,
    by_label: HashMap<String, usize>,
}

impl FieldMap {
    /// The table shipped with the binary.
    pub fn embedded() -> Result<Self, FieldMapError> {
        Self::from_json(EMBEDDED_FIELD_MAP)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, FieldMapError> {
        let raw = fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, FieldMapError> {
        let entries: Vec<FieldMapping> = serde_json::from_str(raw)?;
        let mut by_label = HashMap::with_capacity(entries.len());
        for (idx, entry) in entries.iter().enumerate() {
            if by_label.insert(entry.label.clone(), idx).is_some() {
                return Err(FieldMapError::DuplicateLabel(entry.label.clone()));
            }
        }
        Ok(Self { entries, by_label })
    }

    pub fn entries(&self) -> &[FieldMapping] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn api_field(&self, label: &str) -> Option<&str> {
        self.by_label
            .get(label.trim())
            .map(|&idx| self.entries[idx].field.as_str())
    }

    /// Renames labelled keys to their gateway field names, keeping key order.
    ///
    /// Keys that are not labels pass through untouched. When a record carries
    /// both a label and the field it maps to, the explicit field name wins.
    pub fn translate(&self, record: Map<String, Value>) -> Map<String, Value> {
        let explicit: Vec<String> = record
            .keys()
            .filter(|key| self.api_field(key).is_none())
            .cloned()
            .collect();

        let mut out = Map::with_capacity(record.len());
        for (key, value) in record {
            match self.api_field(&key) {
                Some(field) if explicit.iter().any(|k| k == field) => {
                    warn!("Dropping label '{}': field '{}' is set explicitly", key, field);
                }
                Some(field) => {
                    out.insert(field.to_string(), value);
                }
                None => {
                    out.insert(key, value);
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn embedded_table_loads() {
        let map = FieldMap::embedded().unwrap();
        assert_eq!(map.len(), 56);
        assert_eq!(map.api_field("编号"), Some("number"));
        assert_eq!(map.api_field("开票通讯地址"), Some("inv_address"));
        assert_eq!(map.api_field("PCN 接收邮箱"), Some("X_char_xy0fi6varj"));
        assert_eq!(map.api_field("nope"), None);
    }

    #[test]
    fn translate_renames_labels_in_order() {
        let map = FieldMap::embedded().unwrap();
        let record = json!({ "名称": "小花公司", "use_org_id": 3, "备注": "hi" })
            .as_object()
            .cloned()
            .unwrap();

        let out = map.translate(record);
        let keys: Vec<&str> = out.keys().map(String::as_str).collect();
        assert_eq!(keys, ["name", "use_org_id", "note"]);
        assert_eq!(out["name"], json!("小花公司"));
    }

    #[test]
    fn explicit_field_beats_label() {
        let map = FieldMap::embedded().unwrap();
        let record = json!({ "名称": "from label", "name": "explicit" })
            .as_object()
            .cloned()
            .unwrap();

        let out = map.translate(record);
        assert_eq!(out.len(), 1);
        assert_eq!(out["name"], json!("explicit"));
    }

    #[test]
    fn duplicate_labels_are_rejected() {
        let raw = r#"[{"label":"a","field":"x"},{"label":"a","field":"y"}]"#;
        assert!(matches!(
            FieldMap::from_json(raw),
            Err(FieldMapError::DuplicateLabel(label)) if label == "a"
        ));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(r#"[{"label":"税号","field":"inv_tax_number"}]"#.as_bytes())
            .unwrap();

        let map = FieldMap::load(file.path()).unwrap();
        assert_eq!(map.api_field("税号"), Some("inv_tax_number"));
    }
}
