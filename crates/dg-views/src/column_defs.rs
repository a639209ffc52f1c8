//! Grid column definitions derived from column descriptors and layout

use dg_core::column::{ColumnDataType, ColumnDescriptor};
use dg_data::layout::{ColumnLayout, Pin};
use serde::{Deserialize, Serialize};

/// Filter editor the grid shows for a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterEditor {
    #[serde(rename = "agTextColumnFilter")]
    Text,
    #[serde(rename = "agNumberColumnFilter")]
    Number,
    #[serde(rename = "agDateColumnFilter")]
    Date,
}

const TEXT_OPTIONS: &[&str] = &["contains", "equals", "notEqual", "startsWith", "endsWith"];
const NUMBER_OPTIONS: &[&str] = &[
    "equals",
    "notEqual",
    "greaterThan",
    "greaterThanOrEqual",
    "lessThan",
    "lessThanOrEqual",
    "inRange",
];
const DATE_OPTIONS: &[&str] = &["equals", "notEqual", "greaterThan", "lessThan", "inRange"];
const BOOLEAN_OPTIONS: &[&str] = &["isTrue", "isFalse", "blank", "notBlank"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterParams {
    pub filter_options: Vec<String>,
    pub default_option: String,
    pub max_num_conditions: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellRendererParams {
    pub format: Option<String>,
    pub data_type: ColumnDataType,
}

/// One column as handed to the grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDef {
    pub field: String,
    pub hide: bool,
    pub pinned: Option<Pin>,
    pub sortable: bool,
    pub resizable: bool,
    pub lock_position: bool,
    pub width: Option<f32>,
    pub flex: Option<f32>,
    /// `None` disables filtering
    pub filter: Option<FilterEditor>,
    pub filter_params: FilterParams,
    pub cell_renderer_params: CellRendererParams,
}

fn owned(options: &[&str]) -> Vec<String> {
    options.iter().map(|o| o.to_string()).collect()
}

/// Editor and options offered for a column
pub fn filter_for(column: &ColumnDescriptor) -> (Option<FilterEditor>, FilterParams) {
    if column.is_boolean_coded() {
        return (
            Some(FilterEditor::Number).filter(|_| column.filtering),
            FilterParams {
                filter_options: owned(BOOLEAN_OPTIONS),
                default_option: "isTrue".into(),
                max_num_conditions: 1,
            },
        );
    }

    let (editor, options) = match column.data_type {
        ColumnDataType::Text => (Some(FilterEditor::Text), TEXT_OPTIONS),
        ColumnDataType::Number => (Some(FilterEditor::Number), NUMBER_OPTIONS),
        ColumnDataType::Date => (Some(FilterEditor::Date), DATE_OPTIONS),
        _ => (None, &[][..]),
    };
    let editor = editor.filter(|_| column.filtering);

    (
        editor,
        FilterParams {
            filter_options: owned(options),
            default_option: "equals".into(),
            max_num_conditions: 2,
        },
    )
}

/// Column definitions in descriptor order, with visibility from `layout`
pub fn derive_column_defs(columns: &[ColumnDescriptor], layout: &ColumnLayout) -> Vec<ColumnDef> {
    columns
        .iter()
        .map(|column| {
            let (filter, filter_params) = filter_for(column);
            ColumnDef {
                field: column.title.clone(),
                hide: layout.is_hidden(&column.title),
                pinned: layout.pinned(&column.title),
                sortable: column.is_sortable(),
                resizable: column.sizing,
                lock_position: column.locked,
                width: column.width,
                flex: column.flex,
                filter,
                filter_params,
                cell_renderer_params: CellRendererParams {
                    format: column.format.clone(),
                    data_type: column.data_type,
                },
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_filter_per_type() {
        let text = ColumnDescriptor::new("Name", "name", ColumnDataType::Text);
        let (editor, params) = filter_for(&text);
        assert_eq!(editor, Some(FilterEditor::Text));
        assert_eq!(params.filter_options[0], "contains");
        assert_eq!(params.max_num_conditions, 2);

        let date = ColumnDescriptor::new("Born", "born", ColumnDataType::Date);
        assert_eq!(filter_for(&date).1.filter_options.len(), 5);

        let image = ColumnDescriptor::new("Photo", "photo", ColumnDataType::Image);
        let (editor, params) = filter_for(&image);
        assert_eq!(editor, None);
        assert!(params.filter_options.is_empty());
    }

    #[test]
    fn test_boolean_coded_column_uses_flag_options() {
        let flag = ColumnDescriptor::new("Active", "active", ColumnDataType::Number).with_format("icon");
        let (editor, params) = filter_for(&flag);

        assert_eq!(editor, Some(FilterEditor::Number));
        assert_eq!(params.filter_options, vec!["isTrue", "isFalse", "blank", "notBlank"]);
        assert_eq!(params.default_option, "isTrue");
        assert_eq!(params.max_num_conditions, 1);
    }

    #[test]
    fn test_defs_follow_layout() {
        let columns = vec![
            ColumnDescriptor::new("Name", "name", ColumnDataType::Text),
            ColumnDescriptor::new("Data", "data", ColumnDataType::Object),
        ];
        let mut layout = ColumnLayout::new(&columns, 10);
        layout.pin("Name", Some(Pin::Left));

        let defs = derive_column_defs(&columns, &layout);
        assert_eq!(defs[0].pinned, Some(Pin::Left));
        assert!(defs[0].sortable);
        assert!(!defs[1].sortable);
        assert!(!defs[1].hide);

        let value = serde_json::to_value(&defs[0]).unwrap();
        assert_eq!(value["filter"], json!("agTextColumnFilter"));
        assert_eq!(value["filterParams"]["defaultOption"], json!("equals"));
    }
}
