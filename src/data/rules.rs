//! Pure record operations: schema checks, cleaning rules and transformations.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

use serde_json::{Map, Value};

use super::types::{ColumnSchema, FilterOp, RuleAction, Transformation, ValidationRule};
use super::DataError;

fn is_missing(record: &Value, field: &str) -> bool {
    record.get(field).map_or(true, Value::is_null)
}

/// Stable key for a record projected onto `columns`.
fn projection_key(record: &Value, columns: Option<&[String]>) -> String {
    match columns {
        Some(columns) => {
            let projected: Vec<&Value> = columns
                .iter()
                .map(|c| record.get(c).unwrap_or(&Value::Null))
                .collect();
            serde_json::to_string(&projected).unwrap_or_default()
        }
        None => serde_json::to_string(record).unwrap_or_default(),
    }
}

pub fn validate_schema(records: &[Value], schema: &BTreeMap<String, ColumnSchema>) -> Result<(), DataError> {
    for (column, req) in schema {
        let mut seen = HashSet::new();
        for (i, record) in records.iter().enumerate() {
            let Some(value) = record.get(column).filter(|v| !v.is_null()) else {
                if req.required {
                    return Err(DataError::Schema(format!(
                        "record {i} is missing required column '{column}'"
                    )));
                }
                continue;
            };

            if let Some(ty) = req.column_type {
                if !ty.accepts(value) {
                    return Err(DataError::Schema(format!(
                        "column '{column}' in record {i} is not of type {ty:?}"
                    )));
                }
            }

            if req.unique && !seen.insert(value.to_string()) {
                return Err(DataError::Schema(format!(
                    "column '{column}' must contain unique values"
                )));
            }

            if let Some((min, max)) = req.range {
                let in_range = value.as_f64().is_some_and(|v| v >= min && v <= max);
                if !in_range {
                    return Err(DataError::Schema(format!(
                        "values in '{column}' must be between {min} and {max}"
                    )));
                }
            }
        }
    }
    Ok(())
}

pub fn apply_validation_rules(mut records: Vec<Value>, rules: &[ValidationRule]) -> Vec<Value> {
    for rule in rules {
        records = apply_rule(records, rule);
    }
    records
}

fn apply_rule(records: Vec<Value>, rule: &ValidationRule) -> Vec<Value> {
    match rule {
        ValidationRule::Missing {
            columns,
            action,
            fill_value,
        } => {
            let columns: Vec<String> = match columns {
                Some(c) => c.clone(),
                None => {
                    let mut all: Vec<String> = records
                        .iter()
                        .filter_map(Value::as_object)
                        .flat_map(|o| o.keys().cloned())
                        .collect();
                    all.sort();
                    all.dedup();
                    all
                }
            };
            match action {
                RuleAction::Drop => records
                    .into_iter()
                    .filter(|r| columns.iter().all(|c| !is_missing(r, c)))
                    .collect(),
                RuleAction::Fill => records
                    .into_iter()
                    .map(|mut r| {
                        if let Some(obj) = r.as_object_mut() {
                            for c in &columns {
                                if obj.get(c).map_or(true, Value::is_null) {
                                    obj.insert(c.clone(), fill_value.clone());
                                }
                            }
                        }
                        r
                    })
                    .collect(),
            }
        }
        ValidationRule::Duplicate { columns } => dedupe(records, columns.as_deref()),
        ValidationRule::Outlier {
            column,
            threshold,
            action,
            fill_value,
        } => {
            let values: Vec<f64> = records.iter().filter_map(|r| r.get(column)?.as_f64()).collect();
            if values.len() < 2 {
                return records;
            }
            let n = values.len() as f64;
            let mean = values.iter().sum::<f64>() / n;
            // Sample standard deviation.
            let std = (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt();
            if std == 0.0 {
                return records;
            }
            let is_outlier = |r: &Value| {
                r.get(column)
                    .and_then(Value::as_f64)
                    .is_some_and(|v| (v - mean).abs() > threshold * std)
            };
            match action {
                RuleAction::Drop => records.into_iter().filter(|r| !is_outlier(r)).collect(),
                RuleAction::Fill => {
                    let fill = fill_value.clone().unwrap_or_else(|| Value::from(mean));
                    records
                        .into_iter()
                        .map(|mut r| {
                            if is_outlier(&r) {
                                if let Some(obj) = r.as_object_mut() {
                                    obj.insert(column.clone(), fill.clone());
                                }
                            }
                            r
                        })
                        .collect()
                }
            }
        }
    }
}

fn dedupe(records: Vec<Value>, columns: Option<&[String]>) -> Vec<Value> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|r| seen.insert(projection_key(r, columns)))
        .collect()
}

/// Total order used by sort and the ordering filters: numbers, then strings,
/// then everything else by its JSON text; nulls last.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Greater,
        (_, Value::Null) => Ordering::Less,
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or(f64::NAN), y.as_f64().unwrap_or(f64::NAN));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Number(_), _) => Ordering::Less,
        (_, Value::Number(_)) => Ordering::Greater,
        _ => a.to_string().cmp(&b.to_string()),
    }
}

fn filter_matches(field: Option<&Value>, op: FilterOp, value: &Value) -> bool {
    let Some(field) = field else {
        return op == FilterOp::Ne;
    };
    match op {
        FilterOp::Eq => field == value,
        FilterOp::Ne => field != value,
        FilterOp::Contains => match (field, value) {
            (Value::String(s), Value::String(needle)) => s.contains(needle.as_str()),
            (Value::Array(items), needle) => items.contains(needle),
            _ => false,
        },
        FilterOp::Gt | FilterOp::Ge | FilterOp::Lt | FilterOp::Le => {
            let comparable = matches!(
                (field, value),
                (Value::Number(_), Value::Number(_)) | (Value::String(_), Value::String(_))
            );
            if !comparable {
                return false;
            }
            let ord = compare_values(field, value);
            match op {
                FilterOp::Gt => ord == Ordering::Greater,
                FilterOp::Ge => ord != Ordering::Less,
                FilterOp::Lt => ord == Ordering::Less,
                _ => ord != Ordering::Greater,
            }
        }
    }
}

pub fn apply_transformations(mut records: Vec<Value>, transformations: &[Transformation]) -> Vec<Value> {
    for t in transformations {
        records = apply_transformation(records, t);
    }
    records
}

fn apply_transformation(mut records: Vec<Value>, t: &Transformation) -> Vec<Value> {
    match t {
        Transformation::Filter { field, op, value } => records
            .into_iter()
            .filter(|r| filter_matches(r.get(field), *op, value))
            .collect(),
        Transformation::Sort { by, descending } => {
            records.sort_by(|a, b| {
                let ord = compare_values(a.get(by).unwrap_or(&Value::Null), b.get(by).unwrap_or(&Value::Null));
                if *descending {
                    ord.reverse()
                } else {
                    ord
                }
            });
            records
        }
        Transformation::Select { fields } => records
            .into_iter()
            .map(|r| {
                let obj: Map<String, Value> = fields
                    .iter()
                    .filter_map(|f| r.get(f).map(|v| (f.clone(), v.clone())))
                    .collect();
                Value::Object(obj)
            })
            .collect(),
        Transformation::Rename { from, to } => records
            .into_iter()
            .map(|mut r| {
                if let Some(obj) = r.as_object_mut() {
                    if let Some(v) = obj.remove(from) {
                        obj.insert(to.clone(), v);
                    }
                }
                r
            })
            .collect(),
        Transformation::Dedupe { fields } => dedupe(records, fields.as_deref()),
        Transformation::GroupCount { by } => {
            // Keep first-seen order of the groups.
            let mut order: Vec<Value> = Vec::new();
            let mut counts: BTreeMap<String, u64> = BTreeMap::new();
            for r in &records {
                let key = r.get(by).cloned().unwrap_or(Value::Null);
                let text = key.to_string();
                let count = counts.entry(text).or_insert(0);
                if *count == 0 {
                    order.push(key);
                }
                *count += 1;
            }
            order
                .into_iter()
                .map(|key| {
                    let count = counts.get(&key.to_string()).copied().unwrap_or(0);
                    let mut obj = Map::new();
                    obj.insert(by.clone(), key);
                    obj.insert("count".to_string(), Value::from(count));
                    Value::Object(obj)
                })
                .collect()
        }
    }
}
