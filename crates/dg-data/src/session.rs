//! Query-scoped result sets used by filtered window requests

use std::sync::Arc;

use async_trait::async_trait;
use dg_core::data::{Dataclass, Datasource, QueryScope, RowSource};
use dg_core::entity::Entity;
use parking_lot::RwLock;
use tracing::debug;

use crate::GridError;

/// An isolated query target derived from a datasource
///
/// A session holds its own result set handle and shares no mutable state
/// with the datasource it was opened from. Issuing a query replaces the
/// handle; results never accumulate across queries.
pub struct ScopedQuerySession {
    dataclass: Arc<dyn Dataclass>,
    scope: QueryScope,
    handle: RwLock<Option<Arc<dyn RowSource>>>,
}

impl ScopedQuerySession {
    /// Open a session scoped to the dataset the datasource currently shows
    pub fn open<D>(base: &D) -> Self
    where
        D: Datasource + ?Sized,
    {
        Self {
            dataclass: base.dataclass(),
            scope: base.query_scope(),
            handle: RwLock::new(None),
        }
    }

    pub fn scope(&self) -> &QueryScope {
        &self.scope
    }

    /// Run `query` and make its result set the session's handle
    pub async fn issue_query(&self, query: &str) -> anyhow::Result<Arc<dyn RowSource>> {
        debug!(dataclass = self.dataclass.name(), %query, "Issuing scoped query");
        let handle = self.dataclass.query(query, &self.scope).await?;
        *self.handle.write() = Some(handle.clone());
        Ok(handle)
    }

    fn current(&self) -> anyhow::Result<Arc<dyn RowSource>> {
        self.handle
            .read()
            .clone()
            .ok_or_else(|| GridError::Query("no query issued on session".into()).into())
    }
}

#[async_trait]
impl RowSource for ScopedQuerySession {
    fn target_id(&self) -> String {
        self.handle
            .read()
            .as_ref()
            .map(|h| h.target_id())
            .unwrap_or_else(|| format!("{}:unqueried", self.dataclass.name()))
    }

    fn server_ref(&self) -> Option<String> {
        self.handle.read().as_ref().and_then(|h| h.server_ref())
    }

    async fn order_by(&self, expression: &str) -> anyhow::Result<()> {
        self.current()?.order_by(expression).await
    }

    async fn load_page(&self, offset: usize, count: usize) -> anyhow::Result<Vec<Entity>> {
        self.current()?.load_page(offset, count).await
    }

    async fn length(&self) -> anyhow::Result<usize> {
        self.current()?.length().await
    }

    async fn find_entity_position(&self, entity: &Entity) -> anyhow::Result<Option<usize>> {
        self.current()?.find_entity_position(entity).await
    }
}

impl std::fmt::Debug for ScopedQuerySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopedQuerySession")
            .field("dataclass", &self.dataclass.name())
            .field("scope", &self.scope)
            .field("target", &self.target_id())
            .finish()
    }
}
