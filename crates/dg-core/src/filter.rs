//! Filter model produced by the grid's column filter editors
//!
//! The wire shape follows the grid UI's JSON: a map from column title to
//! either a single condition tagged by `filterType`, or a compound
//! `{ operator, conditions }` entry. Unknown filter types and operators
//! deserialize to explicit `Unsupported` / `Unknown` variants instead of
//! failing, so the compiler can account for them.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Operators offered by the text filter editor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TextOperator {
    Contains,
    Equals,
    NotEqual,
    StartsWith,
    EndsWith,
    #[serde(other)]
    Unknown,
}

/// Operators offered by the number filter editor, including the
/// boolean-coded options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NumberOperator {
    IsTrue,
    IsFalse,
    Blank,
    NotBlank,
    Equals,
    NotEqual,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    InRange,
    #[serde(other)]
    Unknown,
}

/// Operators offered by the date filter editor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DateOperator {
    Equals,
    NotEqual,
    LessThan,
    GreaterThan,
    InRange,
    #[serde(other)]
    Unknown,
}

/// A single filter condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "filterType", rename_all = "camelCase")]
pub enum FilterCondition {
    Text {
        #[serde(rename = "type")]
        operator: TextOperator,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        filter: Option<String>,
    },
    Number {
        #[serde(rename = "type")]
        operator: NumberOperator,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        filter: Option<Value>,
        #[serde(rename = "filterTo", default, skip_serializing_if = "Option::is_none")]
        filter_to: Option<Value>,
    },
    Date {
        #[serde(rename = "type")]
        operator: DateOperator,
        #[serde(rename = "dateFrom", default, skip_serializing_if = "Option::is_none")]
        date_from: Option<String>,
        #[serde(rename = "dateTo", default, skip_serializing_if = "Option::is_none")]
        date_to: Option<String>,
    },
    /// Any filter type the compiler has no translation for (set, multi...)
    #[serde(other)]
    Unsupported,
}

impl FilterCondition {
    pub fn text(operator: TextOperator, filter: impl Into<String>) -> Self {
        FilterCondition::Text {
            operator,
            filter: Some(filter.into()),
        }
    }

    pub fn number(operator: NumberOperator, filter: impl Into<Value>) -> Self {
        FilterCondition::Number {
            operator,
            filter: Some(filter.into()),
            filter_to: None,
        }
    }

    pub fn number_range(from: impl Into<Value>, to: impl Into<Value>) -> Self {
        FilterCondition::Number {
            operator: NumberOperator::InRange,
            filter: Some(from.into()),
            filter_to: Some(to.into()),
        }
    }

    /// Number condition that takes no operand (`isTrue`, `blank`...)
    pub fn number_flag(operator: NumberOperator) -> Self {
        FilterCondition::Number {
            operator,
            filter: None,
            filter_to: None,
        }
    }

    pub fn date(operator: DateOperator, date_from: impl Into<String>) -> Self {
        FilterCondition::Date {
            operator,
            date_from: Some(date_from.into()),
            date_to: None,
        }
    }

    pub fn date_range(from: impl Into<String>, to: impl Into<String>) -> Self {
        FilterCondition::Date {
            operator: DateOperator::InRange,
            date_from: Some(from.into()),
            date_to: Some(to.into()),
        }
    }

    /// The `filterType` tag as the grid names it
    pub fn filter_type(&self) -> &'static str {
        match self {
            FilterCondition::Text { .. } => "text",
            FilterCondition::Number { .. } => "number",
            FilterCondition::Date { .. } => "date",
            FilterCondition::Unsupported => "unsupported",
        }
    }
}

/// Logical operator joining the conditions of a compound filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogicalOperator {
    And,
    Or,
}

impl LogicalOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogicalOperator::And => "AND",
            LogicalOperator::Or => "OR",
        }
    }
}

/// Filter state of one column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnFilter {
    Compound {
        #[serde(rename = "filterType", default, skip_serializing_if = "Option::is_none")]
        filter_type: Option<String>,
        operator: LogicalOperator,
        conditions: Vec<FilterCondition>,
    },
    Single(FilterCondition),
    /// Shapes neither variant accepts, such as the older `condition1` /
    /// `condition2` compound or a condition without `type`
    Unsupported(Value),
}

impl ColumnFilter {
    pub fn compound(operator: LogicalOperator, conditions: Vec<FilterCondition>) -> Self {
        let filter_type = conditions.first().map(|c| c.filter_type().to_string());
        ColumnFilter::Compound {
            filter_type,
            operator,
            conditions,
        }
    }
}

impl From<FilterCondition> for ColumnFilter {
    fn from(condition: FilterCondition) -> Self {
        ColumnFilter::Single(condition)
    }
}

/// Column title to filter, in the order the grid reported them
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterModel(pub IndexMap<String, ColumnFilter>);

impl FilterModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, title: impl Into<String>, filter: impl Into<ColumnFilter>) -> Self {
        self.0.insert(title.into(), filter.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ColumnFilter)> {
        self.0.iter()
    }
}
