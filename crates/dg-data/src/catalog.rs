//! Attribute discovery and column derivation for a bound dataclass

use ahash::{AHashMap, AHashSet};
use dg_core::column::{AttributeKind, ColumnDataType, ColumnDescriptor};
use dg_core::data::{AttributeInfo, DataclassCatalog};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Default width of derived columns
pub const DEFAULT_COLUMN_WIDTH: f32 = 150.0;

/// Top-level attributes followed by the storage attributes of every related
/// dataclass, named `relation.attribute`
///
/// Only relations of the bound dataclass are expanded; relations of related
/// dataclasses are not followed. Each dotted path is emitted once.
pub fn flatten_attributes(attributes: &[AttributeInfo], catalog: &dyn DataclassCatalog) -> Vec<AttributeInfo> {
    let mut seen = AHashSet::new();
    let mut related = Vec::new();

    for relation in attributes.iter().filter(|a| a.is_relation()) {
        if !seen.insert(relation.name.clone()) {
            continue;
        }

        let target = relation.attribute_type.replace("Selection", "");
        let Some(target_attributes) = catalog.attributes_of(&target) else {
            debug!(relation = %relation.name, dataclass = %target, "Related dataclass not in catalog");
            continue;
        };

        for attribute in target_attributes.into_iter().filter(|a| a.kind == AttributeKind::Storage) {
            let path = format!("{}.{}", relation.name, attribute.name);
            if seen.insert(path.clone()) {
                related.push(AttributeInfo { name: path, ..attribute });
            }
        }
    }

    attributes.iter().cloned().chain(related).collect()
}

/// Derive column descriptors from attributes
pub fn normalize_columns(attributes: &[AttributeInfo]) -> Vec<ColumnDescriptor> {
    attributes
        .iter()
        .map(|attribute| {
            let data_type = if attribute.is_relation() {
                ColumnDataType::Object
            } else {
                ColumnDataType::from_attribute_type(&attribute.attribute_type)
            };
            ColumnDescriptor {
                width: Some(DEFAULT_COLUMN_WIDTH),
                flex: Some(1.0),
                ..ColumnDescriptor::new(attribute.name.clone(), attribute.name.clone(), data_type)
                    .with_kind(attribute.kind)
            }
        })
        .collect()
}

/// A datasource declared by a form or shared by a namespace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasourceRef {
    pub id: String,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub dataclass: Option<String>,
}

/// Split `namespace:id`; a bare id has no namespace
fn split_datasource_id(datasource: &str) -> Option<(Option<&str>, &str)> {
    let datasource = datasource.trim();
    let (namespace, id) = match datasource.split_once(':') {
        Some((ns, id)) => (Some(ns.trim()).filter(|ns| !ns.is_empty()), id.trim()),
        None => (None, datasource),
    };
    (!id.is_empty()).then_some((namespace, id))
}

/// Dataclass name behind a datasource reference; empty when unresolved
pub fn resolve_dataclass(
    datasource: &str,
    local: &[DatasourceRef],
    shared: &AHashMap<String, Vec<DatasourceRef>>,
) -> String {
    let Some((namespace, id)) = split_datasource_id(datasource) else {
        return String::new();
    };

    if let Some(found) = local
        .iter()
        .find(|ds| ds.id == id && ds.namespace.as_deref() == namespace)
    {
        return found.dataclass.clone().unwrap_or_default();
    }

    namespace
        .and_then(|ns| shared.get(ns))
        .and_then(|sources| sources.iter().find(|ds| ds.id == id))
        .and_then(|ds| ds.dataclass.clone())
        .unwrap_or_default()
}
