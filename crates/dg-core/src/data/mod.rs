//! Backend seams: datasources, dataclasses and result sets
//!
//! Everything here is injected into the grid by the host. Nothing is
//! resolved from process-wide registries.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::column::AttributeKind;
use crate::entity::Entity;

/// Attribute metadata exposed by a dataclass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeInfo {
    pub name: String,
    pub kind: AttributeKind,

    /// Backend type; for related attributes, the related dataclass name
    /// (optionally suffixed with `Selection`)
    #[serde(rename = "type")]
    pub attribute_type: String,

    /// Set for calculated attributes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub behavior: Option<String>,
}

impl AttributeInfo {
    pub fn new(name: impl Into<String>, kind: AttributeKind, attribute_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            attribute_type: attribute_type.into(),
            behavior: None,
        }
    }

    pub fn with_behavior(mut self, behavior: impl Into<String>) -> Self {
        self.behavior = Some(behavior.into());
        self
    }

    /// Whether this attribute links to another dataclass
    pub fn is_relation(&self) -> bool {
        match self.kind {
            AttributeKind::RelatedEntity | AttributeKind::RelatedEntities => true,
            AttributeKind::Calculated => self.behavior.as_deref() == Some("relatedEntities"),
            _ => false,
        }
    }
}

/// Parameters scoping a dataclass query to the dataset a datasource shows
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryScope {
    /// Server reference of the current result set
    pub data_set_name: Option<String>,

    /// Comma separated attribute list to load with each entity
    pub filter_attributes: Option<String>,
}

/// A sortable, pageable, counted collection of entities
#[async_trait]
pub trait RowSource: Send + Sync {
    /// Identity used to scope sort bookkeeping; a new result set must
    /// report a new id
    fn target_id(&self) -> String;

    /// Server reference of the underlying result set
    fn server_ref(&self) -> Option<String> {
        None
    }

    /// Reorder the result set with an order-by expression
    async fn order_by(&self, expression: &str) -> anyhow::Result<()>;

    /// Load `count` entities starting at `offset`
    async fn load_page(&self, offset: usize, count: usize) -> anyhow::Result<Vec<Entity>>;

    /// Cardinality of the current result set
    async fn length(&self) -> anyhow::Result<usize>;

    /// Position of an entity inside this result set
    async fn find_entity_position(&self, _entity: &Entity) -> anyhow::Result<Option<usize>> {
        Ok(None)
    }
}

/// Queryable entity class
#[async_trait]
pub trait Dataclass: Send + Sync {
    fn name(&self) -> &str;

    fn attributes(&self) -> Vec<AttributeInfo>;

    /// Run a query and return a fresh result set handle
    async fn query(&self, query: &str, scope: &QueryScope) -> anyhow::Result<Arc<dyn RowSource>>;
}

/// The host datasource a grid is bound to
pub trait Datasource: RowSource {
    /// Datasource id, unique per form
    fn id(&self) -> &str;

    fn dataclass(&self) -> Arc<dyn Dataclass>;

    /// Scope for queries derived from this datasource's current result set
    fn query_scope(&self) -> QueryScope;
}

/// Lookup of dataclass attributes by name, for related entities
pub trait DataclassCatalog: Send + Sync {
    fn attributes_of(&self, dataclass: &str) -> Option<Vec<AttributeInfo>>;
}
