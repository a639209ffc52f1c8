//! Filter model to query string compilation
//!
//! Each filtered column compiles to one clause; clauses are joined with
//! `AND`. Conditions the backend language has no translation for compile to
//! [`CompiledClause::Unsupported`] and are left out of the query string.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use dg_core::column::{find_by_title, ColumnDescriptor};
use dg_core::filter::{
    ColumnFilter, DateOperator, FilterCondition, FilterModel, NumberOperator, TextOperator,
};
use serde_json::Value;
use tracing::debug;

/// Result of compiling one filter model entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompiledClause {
    Predicate { column: String, predicate: String },
    /// A filter type / operator pair with no translation, or missing operands
    Unsupported {
        column: String,
        filter_type: String,
        operator: String,
    },
    /// The filter model names a column the grid does not know
    UnknownColumn { column: String },
}

impl CompiledClause {
    pub fn predicate(&self) -> Option<&str> {
        match self {
            CompiledClause::Predicate { predicate, .. } => Some(predicate),
            _ => None,
        }
    }
}

/// Why a single condition produced no predicate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsupportedCondition {
    pub filter_type: &'static str,
    pub operator: String,
}

/// Compile a whole filter model into one query string
pub fn compile_filter(filter_model: &FilterModel, columns: &[ColumnDescriptor]) -> String {
    compile_clauses(filter_model, columns)
        .iter()
        .filter_map(CompiledClause::predicate)
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" AND ")
}

/// Compile every filter model entry, keeping the misses visible
pub fn compile_clauses(filter_model: &FilterModel, columns: &[ColumnDescriptor]) -> Vec<CompiledClause> {
    filter_model
        .iter()
        .map(|(title, filter)| {
            let clause = match find_by_title(columns, title) {
                Some(column) => compile_column(title, filter, &column.source),
                None => CompiledClause::UnknownColumn { column: title.clone() },
            };
            if clause.predicate().is_none() {
                debug!(?clause, "Filter entry dropped from query");
            }
            clause
        })
        .collect()
}

fn compile_column(title: &str, filter: &ColumnFilter, source: &str) -> CompiledClause {
    match filter {
        ColumnFilter::Single(condition) => match compile_condition(condition, source) {
            Ok(predicate) => CompiledClause::Predicate {
                column: title.to_string(),
                predicate,
            },
            Err(miss) => CompiledClause::Unsupported {
                column: title.to_string(),
                filter_type: miss.filter_type.to_string(),
                operator: miss.operator,
            },
        },
        ColumnFilter::Compound { operator, conditions, .. } => {
            let mut parts = Vec::with_capacity(conditions.len());
            let mut first_miss = None;
            for condition in conditions {
                match compile_condition(condition, source) {
                    Ok(predicate) => parts.push(predicate),
                    Err(miss) => {
                        first_miss.get_or_insert(miss);
                    }
                }
            }

            if parts.is_empty() {
                let miss = first_miss.unwrap_or(UnsupportedCondition {
                    filter_type: "compound",
                    operator: operator.as_str().to_string(),
                });
                return CompiledClause::Unsupported {
                    column: title.to_string(),
                    filter_type: miss.filter_type.to_string(),
                    operator: miss.operator,
                };
            }

            let joiner = format!(" {} ", operator.as_str());
            CompiledClause::Predicate {
                column: title.to_string(),
                predicate: format!("({})", parts.join(&joiner)),
            }
        }
        ColumnFilter::Unsupported(raw) => {
            let text = |key: &str| raw.get(key).and_then(Value::as_str).unwrap_or_default().to_string();
            let operator = match text("type") {
                t if t.is_empty() => text("operator"),
                t => t,
            };
            CompiledClause::Unsupported {
                column: title.to_string(),
                filter_type: text("filterType"),
                operator,
            }
        }
    }
}

/// Translate one condition against a backend source path
pub fn compile_condition(condition: &FilterCondition, source: &str) -> Result<String, UnsupportedCondition> {
    match condition {
        FilterCondition::Text { operator, filter } => {
            let miss = || UnsupportedCondition {
                filter_type: "text",
                operator: format!("{:?}", operator),
            };
            let value = filter.as_deref().ok_or_else(miss)?;
            match operator {
                TextOperator::Contains => Ok(format!("{} == \"@{}@\"", source, value)),
                TextOperator::Equals => Ok(format!("{} == \"{}\"", source, value)),
                TextOperator::NotEqual => Ok(format!("{} != \"{}\"", source, value)),
                TextOperator::StartsWith => Ok(format!("{} begin \"{}\"", source, value)),
                TextOperator::EndsWith => Ok(format!("{} == \"@{}\"", source, value)),
                TextOperator::Unknown => Err(miss()),
            }
        }
        FilterCondition::Number { operator, filter, filter_to } => {
            let miss = || UnsupportedCondition {
                filter_type: "number",
                operator: format!("{:?}", operator),
            };
            let operand = || filter.as_ref().and_then(render_number).ok_or_else(miss);
            match operator {
                NumberOperator::IsTrue => Ok(format!("{} == true", source)),
                NumberOperator::IsFalse => Ok(format!("{} == false", source)),
                NumberOperator::Blank => Ok(format!("{} == null", source)),
                NumberOperator::NotBlank => Ok(format!("{} != null", source)),
                NumberOperator::Equals => Ok(format!("{} == {}", source, operand()?)),
                NumberOperator::NotEqual => Ok(format!("{} != {}", source, operand()?)),
                NumberOperator::GreaterThan => Ok(format!("{} > {}", source, operand()?)),
                NumberOperator::GreaterThanOrEqual => Ok(format!("{} >= {}", source, operand()?)),
                NumberOperator::LessThan => Ok(format!("{} < {}", source, operand()?)),
                NumberOperator::LessThanOrEqual => Ok(format!("{} <= {}", source, operand()?)),
                NumberOperator::InRange => {
                    let lo = operand()?;
                    let hi = filter_to.as_ref().and_then(render_number).ok_or_else(miss)?;
                    Ok(format!("{} >= {} AND {} <= {}", source, lo, source, hi))
                }
                NumberOperator::Unknown => Err(miss()),
            }
        }
        FilterCondition::Date { operator, date_from, date_to } => {
            let miss = || UnsupportedCondition {
                filter_type: "date",
                operator: format!("{:?}", operator),
            };
            let from = || date_from.as_deref().and_then(format_date).ok_or_else(miss);
            match operator {
                DateOperator::Equals => Ok(format!("{} == {}", source, from()?)),
                DateOperator::NotEqual => Ok(format!("{} != {}", source, from()?)),
                DateOperator::LessThan => Ok(format!("{} < {}", source, from()?)),
                DateOperator::GreaterThan => Ok(format!("{} > {}", source, from()?)),
                DateOperator::InRange => {
                    let lo = from()?;
                    let hi = date_to.as_deref().and_then(format_date).ok_or_else(miss)?;
                    Ok(format!("{} > {} AND {} < {}", source, lo, source, hi))
                }
                DateOperator::Unknown => Err(miss()),
            }
        }
        FilterCondition::Unsupported => Err(UnsupportedCondition {
            filter_type: "unsupported",
            operator: String::new(),
        }),
    }
}

/// Numbers are substituted verbatim
fn render_number(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

/// Normalize a grid date to `yyyy-MM-dd`
pub fn format_date(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let date = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .map(|dt| dt.date())
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d"))
        .or_else(|_| DateTime::parse_from_rfc3339(raw).map(|dt| dt.date_naive()))
        .ok()?;
    Some(date.format("%Y-%m-%d").to_string())
}
