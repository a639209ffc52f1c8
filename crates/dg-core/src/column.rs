//! Column descriptors supplied by the hosting configuration

use serde::{Deserialize, Serialize};

/// Display data type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnDataType {
    #[serde(alias = "string")]
    Text,
    #[serde(alias = "long")]
    Number,
    Date,
    #[serde(alias = "boolean")]
    Bool,
    Image,
    Object,
}

impl ColumnDataType {
    /// Map a backend attribute type name to a display type
    pub fn from_attribute_type(attribute_type: &str) -> Self {
        match attribute_type {
            "long" | "number" | "word" | "long64" | "float" => ColumnDataType::Number,
            "date" => ColumnDataType::Date,
            "bool" | "boolean" => ColumnDataType::Bool,
            "image" => ColumnDataType::Image,
            "object" => ColumnDataType::Object,
            _ => ColumnDataType::Text,
        }
    }
}

impl Default for ColumnDataType {
    fn default() -> Self {
        ColumnDataType::Text
    }
}

/// Backend attribute kind a column was derived from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AttributeKind {
    Storage,
    RelatedEntity,
    RelatedEntities,
    Calculated,
    Alias,
    Composition,
}

impl Default for AttributeKind {
    fn default() -> Self {
        AttributeKind::Storage
    }
}

/// Configuration for one grid column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ColumnDescriptor {
    /// Display key, also the key of projected rows
    pub title: String,

    /// Backend field path, dotted for related attributes
    pub source: String,

    pub data_type: ColumnDataType,

    /// Display format hint (`checkbox`, `icon`, `boolean`, date masks...)
    pub format: Option<String>,

    pub kind: AttributeKind,

    pub filtering: bool,
    pub sorting: bool,
    pub sizing: bool,
    pub locked: bool,
    pub hidden: bool,
    pub width: Option<f32>,
    pub flex: Option<f32>,
}

impl Default for ColumnDescriptor {
    fn default() -> Self {
        Self {
            title: String::new(),
            source: String::new(),
            data_type: ColumnDataType::Text,
            format: None,
            kind: AttributeKind::Storage,
            filtering: true,
            sorting: true,
            sizing: true,
            locked: false,
            hidden: false,
            width: None,
            flex: None,
        }
    }
}

impl ColumnDescriptor {
    /// Create a descriptor with default capabilities
    pub fn new(title: impl Into<String>, source: impl Into<String>, data_type: ColumnDataType) -> Self {
        Self {
            title: title.into(),
            source: source.into(),
            data_type,
            ..Default::default()
        }
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn with_kind(mut self, kind: AttributeKind) -> Self {
        self.kind = kind;
        self
    }

    /// True for bool columns and number columns rendered as booleans
    pub fn is_boolean_coded(&self) -> bool {
        match self.data_type {
            ColumnDataType::Bool => true,
            ColumnDataType::Number => matches!(
                self.format.as_deref(),
                Some("checkbox") | Some("icon") | Some("boolean")
            ),
            _ => false,
        }
    }

    /// Whether the grid may offer sorting on this column
    pub fn is_sortable(&self) -> bool {
        self.sorting && !matches!(self.data_type, ColumnDataType::Image | ColumnDataType::Object)
    }

    /// Whether the source path reaches into a related entity
    pub fn is_related(&self) -> bool {
        self.title.contains('.')
    }
}

/// Find a column by its display title
pub fn find_by_title<'a>(columns: &'a [ColumnDescriptor], title: &str) -> Option<&'a ColumnDescriptor> {
    columns.iter().find(|column| column.title == title)
}
