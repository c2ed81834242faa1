use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataFormat {
    Json,
    #[serde(alias = "jsonl", alias = "ndjson")]
    JsonLines,
    #[serde(alias = "yml")]
    Yaml,
}

impl DataFormat {
    /// Guess the format from a file extension.
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        let ext = path.as_ref().extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "json" => Some(DataFormat::Json),
            "jsonl" | "ndjson" => Some(DataFormat::JsonLines),
            "yaml" | "yml" => Some(DataFormat::Yaml),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
}

impl ColumnType {
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            ColumnType::String => value.is_string(),
            ColumnType::Number => value.is_number(),
            ColumnType::Integer => value.is_i64() || value.is_u64(),
            ColumnType::Boolean => value.is_boolean(),
            ColumnType::Array => value.is_array(),
            ColumnType::Object => value.is_object(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSchema {
    #[serde(default, rename = "type")]
    pub column_type: Option<ColumnType>,
    #[serde(default)]
    pub unique: bool,
    /// Inclusive `[min, max]`.
    #[serde(default)]
    pub range: Option<(f64, f64)>,
    #[serde(default = "default_required")]
    pub required: bool,
}

fn default_required() -> bool {
    true
}

impl Default for ColumnSchema {
    fn default() -> Self {
        Self {
            column_type: None,
            unique: false,
            range: None,
            required: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    Drop,
    #[default]
    Fill,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ValidationRule {
    /// Absent or null fields. `columns` defaults to every field seen.
    Missing {
        #[serde(default)]
        columns: Option<Vec<String>>,
        #[serde(default)]
        action: RuleAction,
        #[serde(default = "zero")]
        fill_value: Value,
    },
    /// Keep the first of records equal on `columns` (all fields by default).
    Duplicate {
        #[serde(default)]
        columns: Option<Vec<String>>,
    },
    /// Values more than `threshold` standard deviations from the mean.
    Outlier {
        column: String,
        #[serde(default = "default_threshold")]
        threshold: f64,
        #[serde(default)]
        action: RuleAction,
        /// Defaults to the column mean.
        #[serde(default)]
        fill_value: Option<Value>,
    },
}

fn zero() -> Value {
    Value::from(0)
}

fn default_threshold() -> f64 {
    3.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOp {
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = "contains")]
    Contains,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Transformation {
    Filter { field: String, op: FilterOp, value: Value },
    Sort {
        by: String,
        #[serde(default)]
        descending: bool,
    },
    Select { fields: Vec<String> },
    Rename { from: String, to: String },
    Dedupe {
        #[serde(default)]
        fields: Option<Vec<String>>,
    },
    /// One output record per distinct `by` value: `{by: value, "count": n}`.
    GroupCount { by: String },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataConfig {
    /// Inferred from the file extension when absent.
    #[serde(default)]
    pub format: Option<DataFormat>,
    #[serde(default)]
    pub schema: Option<BTreeMap<String, ColumnSchema>>,
    #[serde(default)]
    pub validation_rules: Vec<ValidationRule>,
    #[serde(default)]
    pub transformations: Vec<Transformation>,
    /// Read results are cached for this many seconds. No caching when absent.
    #[serde(default)]
    pub cache_ttl_secs: Option<u64>,
}

impl DataConfig {
    pub fn with_format(mut self, format: DataFormat) -> Self {
        self.format = Some(format);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileChange {
    pub path: PathBuf,
    pub modified: DateTime<Utc>,
}
