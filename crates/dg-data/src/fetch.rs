//! Page loading and row projection

use dg_core::column::ColumnDescriptor;
use dg_core::data::RowSource;
use dg_core::entity::{Entity, Row};
use indexmap::IndexMap;
use serde_json::Value;

/// Entities of one window and the rows projected from them
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageWindow {
    pub entities: Vec<Entity>,
    pub rows: Vec<Row>,
}

/// Load `count` entities from `offset` and project them into rows
///
/// A loader error is returned as-is; an empty page is a valid result.
pub async fn fetch_window<L>(
    loader: &L,
    start_row: usize,
    count: usize,
    columns: &[ColumnDescriptor],
) -> anyhow::Result<PageWindow>
where
    L: RowSource + ?Sized,
{
    let entities = loader.load_page(start_row, count).await?;
    let rows = entities
        .iter()
        .map(|entity| project_entity(entity, columns))
        .collect();
    Ok(PageWindow { entities, rows })
}

/// One key per column title, read from the column's source path
pub fn project_entity(entity: &Entity, columns: &[ColumnDescriptor]) -> Row {
    let values: IndexMap<String, Value> = columns
        .iter()
        .map(|column| {
            let value = entity.field(&column.source).cloned().unwrap_or(Value::Null);
            (column.title.clone(), value)
        })
        .collect();

    Row {
        values,
        entity: entity.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use dg_core::column::ColumnDataType;
    use serde_json::json;

    struct StaticLoader(Vec<Entity>);

    #[async_trait]
    impl RowSource for StaticLoader {
        fn target_id(&self) -> String {
            "static".into()
        }

        async fn order_by(&self, _expression: &str) -> anyhow::Result<()> {
            Ok(())
        }

        async fn load_page(&self, offset: usize, count: usize) -> anyhow::Result<Vec<Entity>> {
            Ok(self.0.iter().skip(offset).take(count).cloned().collect())
        }

        async fn length(&self) -> anyhow::Result<usize> {
            Ok(self.0.len())
        }
    }

    fn person(position: usize, name: &str, age: i64) -> Entity {
        let fields = json!({"fullName": name, "age": age, "secret": "x"});
        Entity::new(position, fields.as_object().cloned().unwrap())
    }

    #[tokio::test]
    async fn test_projects_rows_in_entity_order() {
        let loader = StaticLoader(vec![person(0, "Ann", 31), person(1, "Bob", 42), person(2, "Cy", 27)]);
        let columns = vec![
            ColumnDescriptor::new("Name", "fullName", ColumnDataType::Text),
            ColumnDescriptor::new("Age", "age", ColumnDataType::Number),
        ];

        let window = fetch_window(&loader, 0, 10, &columns).await.unwrap();

        assert_eq!(window.rows.len(), 3);
        for (row, (name, age)) in window.rows.iter().zip([("Ann", 31), ("Bob", 42), ("Cy", 27)]) {
            assert_eq!(row.values.keys().collect::<Vec<_>>(), vec!["Name", "Age"]);
            assert_eq!(row.get("Name"), Some(&json!(name)));
            assert_eq!(row.get("Age"), Some(&json!(age)));
        }
        assert_eq!(window.rows[1].entity, window.entities[1]);
    }

    #[tokio::test]
    async fn test_missing_field_projects_null() {
        let loader = StaticLoader(vec![person(0, "Ann", 31)]);
        let columns = vec![ColumnDescriptor::new("City", "address.city", ColumnDataType::Text)];

        let window = fetch_window(&loader, 0, 1, &columns).await.unwrap();
        assert_eq!(window.rows[0].get("City"), Some(&Value::Null));
    }

    #[tokio::test]
    async fn test_empty_page_is_valid() {
        let loader = StaticLoader(Vec::new());
        let window = fetch_window(&loader, 100, 100, &[]).await.unwrap();
        assert!(window.rows.is_empty());
    }
}
