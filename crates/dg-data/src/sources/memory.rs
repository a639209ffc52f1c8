//! In-memory dataclass and datasource backed by JSON records

use std::cmp::Ordering;
use std::sync::{Arc, Weak};

use ahash::AHashMap;
use async_trait::async_trait;
use dg_core::data::{AttributeInfo, Dataclass, Datasource, QueryScope, RowSource};
use dg_core::entity::Entity;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use tracing::{debug, info};

use super::predicate::{self, value_as_number, value_as_text};
use crate::GridError;

type Records = Arc<RwLock<Vec<Map<String, Value>>>>;

/// An entity class holding its records in memory
pub struct MemoryDataclass {
    name: String,
    attributes: Vec<AttributeInfo>,
    primary_key: Option<String>,
    records: Records,
    /// Live result sets by server reference, for scoped queries
    datasets: RwLock<AHashMap<String, Weak<MemoryResultSet>>>,
}

impl MemoryDataclass {
    pub fn new(name: impl Into<String>, attributes: Vec<AttributeInfo>) -> Self {
        Self {
            name: name.into(),
            attributes,
            primary_key: None,
            records: Arc::new(RwLock::new(Vec::new())),
            datasets: RwLock::new(AHashMap::new()),
        }
    }

    /// Use an attribute's value as the entity key
    pub fn with_primary_key(mut self, attribute: impl Into<String>) -> Self {
        self.primary_key = Some(attribute.into());
        self
    }

    pub fn with_records(self, records: Vec<Map<String, Value>>) -> Self {
        *self.records.write() = records;
        self
    }

    pub fn insert(&self, record: Map<String, Value>) {
        self.records.write().push(record);
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// A result set over every record, in insertion order
    pub fn all(&self) -> Arc<MemoryResultSet> {
        let positions = (0..self.len()).collect();
        self.register(positions)
    }

    fn register(&self, positions: Vec<usize>) -> Arc<MemoryResultSet> {
        let set = Arc::new(MemoryResultSet::new(
            self.records.clone(),
            self.primary_key.clone(),
            positions,
        ));
        let mut datasets = self.datasets.write();
        datasets.retain(|_, weak| weak.strong_count() > 0);
        datasets.insert(set.id.clone(), Arc::downgrade(&set));
        set
    }

    fn scope_positions(&self, scope: &QueryScope) -> Vec<usize> {
        let scoped = scope
            .data_set_name
            .as_ref()
            .and_then(|name| self.datasets.read().get(name).and_then(Weak::upgrade));
        match scoped {
            Some(set) => set.positions.read().clone(),
            None => (0..self.len()).collect(),
        }
    }
}

#[async_trait]
impl Dataclass for MemoryDataclass {
    fn name(&self) -> &str {
        &self.name
    }

    fn attributes(&self) -> Vec<AttributeInfo> {
        self.attributes.clone()
    }

    async fn query(&self, query: &str, scope: &QueryScope) -> anyhow::Result<Arc<dyn RowSource>> {
        let predicate = predicate::parse(query)?;
        let candidates = self.scope_positions(scope);

        let matched: Vec<usize> = {
            let records = self.records.read();
            candidates
                .into_iter()
                .filter(|&index| {
                    records
                        .get(index)
                        .map(|record| predicate.matches(&Entity::new(index, record.clone())))
                        .unwrap_or(false)
                })
                .collect()
        };

        debug!(dataclass = %self.name, %query, matched = matched.len(), "Query evaluated");
        Ok(self.register(matched))
    }
}

impl std::fmt::Debug for MemoryDataclass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryDataclass")
            .field("name", &self.name)
            .field("attributes", &self.attributes.len())
            .field("records", &self.len())
            .finish()
    }
}

/// An ordered selection of records
#[derive(Debug)]
pub struct MemoryResultSet {
    id: String,
    records: Records,
    primary_key: Option<String>,
    positions: RwLock<Vec<usize>>,
}

impl MemoryResultSet {
    fn new(records: Records, primary_key: Option<String>, positions: Vec<usize>) -> Self {
        Self {
            id: format!("$sel-{}", uuid::Uuid::new_v4().simple()),
            records,
            primary_key,
            positions: RwLock::new(positions),
        }
    }

    fn key_of(&self, index: usize, record: &Map<String, Value>) -> String {
        self.primary_key
            .as_ref()
            .and_then(|pk| record.get(pk))
            .and_then(value_as_text)
            .unwrap_or_else(|| index.to_string())
    }
}

#[async_trait]
impl RowSource for MemoryResultSet {
    fn target_id(&self) -> String {
        self.id.clone()
    }

    fn server_ref(&self) -> Option<String> {
        Some(self.id.clone())
    }

    async fn order_by(&self, expression: &str) -> anyhow::Result<()> {
        let keys = parse_order_by(expression)?;
        let records = self.records.read();
        let mut positions = self.positions.write();

        if keys.is_empty() {
            positions.sort_unstable();
            return Ok(());
        }

        let mut keyed: Vec<(usize, Vec<Value>)> = positions
            .iter()
            .map(|&index| {
                let entity = Entity::new(index, records.get(index).cloned().unwrap_or_default());
                let values = keys
                    .iter()
                    .map(|key| entity.field(&key.path).cloned().unwrap_or(Value::Null))
                    .collect();
                (index, values)
            })
            .collect();

        keyed.sort_by(|(_, a), (_, b)| {
            keys.iter()
                .zip(a.iter().zip(b.iter()))
                .map(|(key, (va, vb))| {
                    let ordering = compare_values(va, vb);
                    if key.descending {
                        ordering.reverse()
                    } else {
                        ordering
                    }
                })
                .find(|o| *o != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });

        *positions = keyed.into_iter().map(|(index, _)| index).collect();
        Ok(())
    }

    async fn load_page(&self, offset: usize, count: usize) -> anyhow::Result<Vec<Entity>> {
        let records = self.records.read();
        let positions = self.positions.read();

        let page = positions
            .iter()
            .enumerate()
            .skip(offset)
            .take(count)
            .filter_map(|(position, &index)| {
                let record = records.get(index)?;
                Some(Entity::new(position, record.clone()).with_key(self.key_of(index, record)))
            })
            .collect();
        Ok(page)
    }

    async fn length(&self) -> anyhow::Result<usize> {
        Ok(self.positions.read().len())
    }

    async fn find_entity_position(&self, entity: &Entity) -> anyhow::Result<Option<usize>> {
        let Some(key) = entity.key.as_deref() else {
            return Ok(None);
        };
        let records = self.records.read();
        let position = self.positions.read().iter().position(|&index| {
            records
                .get(index)
                .map(|record| self.key_of(index, record) == key)
                .unwrap_or(false)
        });
        Ok(position)
    }
}

/// The datasource a grid binds to: a dataclass plus its current selection
pub struct MemoryDatasource {
    id: String,
    dataclass: Arc<MemoryDataclass>,
    selection: RwLock<Arc<MemoryResultSet>>,
}

impl MemoryDatasource {
    /// Bind to every record of `dataclass`
    pub fn new(id: impl Into<String>, dataclass: Arc<MemoryDataclass>) -> Self {
        let selection = dataclass.all();
        let id = id.into();
        info!(datasource = %id, dataclass = dataclass.name(), records = dataclass.len(), "Datasource bound");
        Self {
            id,
            dataclass,
            selection: RwLock::new(selection),
        }
    }

    /// Replace the current selection with the result of `query`
    pub async fn select(&self, query: &str) -> anyhow::Result<usize> {
        let predicate = predicate::parse(query)?;
        let matched: Vec<usize> = {
            let records = self.dataclass.records.read();
            records
                .iter()
                .enumerate()
                .filter(|(index, record)| predicate.matches(&Entity::new(*index, (*record).clone())))
                .map(|(index, _)| index)
                .collect()
        };
        let count = matched.len();
        *self.selection.write() = self.dataclass.register(matched);
        Ok(count)
    }

    fn current(&self) -> Arc<MemoryResultSet> {
        self.selection.read().clone()
    }
}

#[async_trait]
impl RowSource for MemoryDatasource {
    fn target_id(&self) -> String {
        self.current().target_id()
    }

    fn server_ref(&self) -> Option<String> {
        self.current().server_ref()
    }

    async fn order_by(&self, expression: &str) -> anyhow::Result<()> {
        self.current().order_by(expression).await
    }

    async fn load_page(&self, offset: usize, count: usize) -> anyhow::Result<Vec<Entity>> {
        self.current().load_page(offset, count).await
    }

    async fn length(&self) -> anyhow::Result<usize> {
        self.current().length().await
    }

    async fn find_entity_position(&self, entity: &Entity) -> anyhow::Result<Option<usize>> {
        self.current().find_entity_position(entity).await
    }
}

impl Datasource for MemoryDatasource {
    fn id(&self) -> &str {
        &self.id
    }

    fn dataclass(&self) -> Arc<dyn Dataclass> {
        self.dataclass.clone()
    }

    fn query_scope(&self) -> QueryScope {
        QueryScope {
            data_set_name: self.current().server_ref(),
            filter_attributes: None,
        }
    }
}

impl std::fmt::Debug for MemoryDatasource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryDatasource")
            .field("id", &self.id)
            .field("dataclass", &self.dataclass.name())
            .field("selection", &self.current().id)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
struct OrderKey {
    path: String,
    descending: bool,
}

fn parse_order_by(expression: &str) -> Result<Vec<OrderKey>, GridError> {
    expression
        .split(',')
        .map(str::trim)
        .filter(|term| !term.is_empty())
        .map(|term| {
            let mut parts = term.split_whitespace();
            let path = parts.next().unwrap_or_default().to_string();
            let descending = match parts.next().map(str::to_ascii_lowercase).as_deref() {
                None | Some("asc") => false,
                Some("desc") => true,
                Some(other) => {
                    return Err(GridError::Query(format!("bad sort direction '{}' in '{}'", other, term)))
                }
            };
            Ok(OrderKey { path, descending })
        })
        .collect()
}

/// Nulls first, then booleans, numbers and case-insensitive text
fn compare_values(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) | Value::Object(_) => 4,
        }
    }

    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(_), Value::Number(_)) => value_as_number(a)
            .zip(value_as_number(b))
            .and_then(|(x, y)| x.partial_cmp(&y))
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.to_lowercase().cmp(&y.to_lowercase()),
        _ => rank(a).cmp(&rank(b)),
    }
}
