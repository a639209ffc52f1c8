//! CSV files loaded as in-memory dataclasses

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use chrono::NaiveDate;
use csv::ReaderBuilder;
use dg_core::column::AttributeKind;
use dg_core::data::AttributeInfo;
use serde_json::{Map, Number, Value};
use tracing::info;

use super::memory::MemoryDataclass;
use crate::GridError;

/// Rows inspected when inferring column types
const MAX_SAMPLE_ROWS: usize = 5000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InferredType {
    Long,
    Number,
    Bool,
    Date,
    Text,
}

impl InferredType {
    fn attribute_type(self) -> &'static str {
        match self {
            InferredType::Long => "long",
            InferredType::Number => "number",
            InferredType::Bool => "bool",
            InferredType::Date => "date",
            InferredType::Text => "string",
        }
    }
}

/// Load a CSV file with headers into an in-memory dataclass
///
/// Column types are inferred from the first rows; empty cells become
/// `null`. A column named `ID` (any case) becomes the primary key.
pub async fn load_csv(path: &Path, dataclass_name: &str) -> Result<MemoryDataclass, GridError> {
    let path = path.to_path_buf();
    let name = dataclass_name.to_string();

    tokio::task::spawn_blocking(move || {
        let file = File::open(&path)?;
        let mut csv_reader = ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(BufReader::new(file));

        let headers: Vec<String> = csv_reader.headers()?.iter().map(str::to_string).collect();
        let mut raw_rows = Vec::new();
        for result in csv_reader.records() {
            let record = result?;
            raw_rows.push(record.iter().map(str::to_string).collect::<Vec<_>>());
        }

        let types: Vec<InferredType> = (0..headers.len())
            .map(|idx| detect_column_type(&raw_rows, idx))
            .collect();

        let attributes = headers
            .iter()
            .zip(&types)
            .map(|(header, ty)| AttributeInfo::new(header.clone(), AttributeKind::Storage, ty.attribute_type()))
            .collect();

        let records: Vec<Map<String, Value>> = raw_rows
            .iter()
            .map(|row| {
                headers
                    .iter()
                    .zip(&types)
                    .enumerate()
                    .map(|(idx, (header, ty))| {
                        let cell = row.get(idx).map(String::as_str).unwrap_or("");
                        (header.clone(), convert_cell(cell, *ty))
                    })
                    .collect()
            })
            .collect();

        info!(path = %path.display(), rows = records.len(), columns = headers.len(), "CSV loaded");

        let mut dataclass = MemoryDataclass::new(name, attributes).with_records(records);
        if let Some(pk) = headers.iter().find(|h| h.eq_ignore_ascii_case("id")) {
            dataclass = dataclass.with_primary_key(pk.clone());
        }
        Ok(dataclass)
    })
    .await
    .map_err(|e| GridError::Backend(e.to_string()))?
}

/// Detect column type from sample data
fn detect_column_type(samples: &[Vec<String>], col_idx: usize) -> InferredType {
    let mut is_long = true;
    let mut is_number = true;
    let mut is_bool = true;
    let mut is_date = true;
    let mut seen = false;

    for row in samples.iter().take(MAX_SAMPLE_ROWS) {
        let Some(value) = row.get(col_idx) else { continue };
        if value.is_empty() {
            continue;
        }
        seen = true;

        if is_long && value.parse::<i64>().is_err() {
            is_long = false;
        }
        if is_number && value.parse::<f64>().is_err() {
            is_number = false;
        }
        if is_bool && parse_bool(value).is_none() {
            is_bool = false;
        }
        if is_date && parse_date(value).is_none() {
            is_date = false;
        }
    }

    if !seen {
        InferredType::Text
    } else if is_long {
        InferredType::Long
    } else if is_number {
        InferredType::Number
    } else if is_bool {
        InferredType::Bool
    } else if is_date {
        InferredType::Date
    } else {
        InferredType::Text
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}

fn convert_cell(cell: &str, ty: InferredType) -> Value {
    if cell.is_empty() {
        return Value::Null;
    }
    let converted = match ty {
        InferredType::Long => cell.parse::<i64>().ok().map(Value::from),
        InferredType::Number => cell.parse::<f64>().ok().and_then(Number::from_f64).map(Value::Number),
        InferredType::Bool => parse_bool(cell).map(Value::Bool),
        InferredType::Date | InferredType::Text => None,
    };
    converted.unwrap_or_else(|| Value::String(cell.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use dg_core::data::{Dataclass, RowSource};
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn test_detect_types() {
        let rows = vec![
            vec!["1".into(), "1.5".into(), "true".into(), "2024-01-31".into(), "x".into(), "".into()],
            vec!["2".into(), "2".into(), "FALSE".into(), "".into(), "3".into(), "".into()],
        ];
        let types: Vec<_> = (0..6).map(|i| detect_column_type(&rows, i)).collect();
        assert_eq!(
            types,
            vec![
                InferredType::Long,
                InferredType::Number,
                InferredType::Bool,
                InferredType::Date,
                InferredType::Text,
                InferredType::Text
            ]
        );
    }

    #[tokio::test]
    async fn test_load_csv() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "ID,fullName,age,active").unwrap();
        writeln!(file, "1,Ann,31,true").unwrap();
        writeln!(file, "2,Bob,,false").unwrap();
        file.flush().unwrap();

        let dataclass = load_csv(file.path(), "Person").await.unwrap();
        assert_eq!(dataclass.name(), "Person");
        assert_eq!(dataclass.attributes()[2].attribute_type, "long");
        assert_eq!(dataclass.attributes()[3].attribute_type, "bool");

        let set = dataclass.all();
        let page = set.load_page(0, 10).await.unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[1].field("age"), Some(&Value::Null));
        assert_eq!(page[0].field("active"), Some(&json!(true)));
        assert_eq!(page[1].key.as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let result = load_csv(Path::new("/nonexistent/people.csv"), "Person").await;
        assert!(matches!(result, Err(GridError::Io(_))));
    }
}
