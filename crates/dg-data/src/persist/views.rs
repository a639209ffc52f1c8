//! Saved grid state and named views for one grid

use std::sync::Arc;

use dg_core::events::events::{StateSaved, ViewsChanged};
use dg_core::events::EventBus;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::store::StateStore;
use super::{GridState, SavedView};
use crate::GridError;

/// What triggered a grid state update
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StateUpdateSource {
    GridInitializing,
    RowSelection,
    ColumnVisibility,
    ColumnPinning,
    ColumnSizing,
    ColumnOrder,
    Sort,
    Filter,
    #[serde(other)]
    Other,
}

/// Saves grid state as it changes and manages named views
pub struct ViewStateManager {
    node_id: String,
    store: Arc<dyn StateStore>,
    events: Arc<EventBus>,
    views: RwLock<Vec<SavedView>>,
    selected: RwLock<Option<String>>,
}

impl ViewStateManager {
    pub fn new(node_id: impl Into<String>, store: Arc<dyn StateStore>, events: Arc<EventBus>) -> Self {
        Self {
            node_id: node_id.into(),
            store,
            events,
            views: RwLock::new(Vec::new()),
            selected: RwLock::new(None),
        }
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// Persisted state to restore at startup
    pub async fn load_state(&self) -> Option<GridState> {
        match self.store.load_grid_state().await {
            Ok(state) => state,
            Err(e) => {
                warn!(node = %self.node_id, error = %e, "Could not load grid state");
                None
            }
        }
    }

    /// Persist `state` after a grid state change
    ///
    /// Updates caused only by row selection, and any update raised while
    /// the grid initializes, are ignored. Returns whether state was saved.
    pub async fn on_state_updated(&self, sources: &[StateUpdateSource], state: &GridState) -> anyhow::Result<bool> {
        if matches!(sources, [StateUpdateSource::RowSelection]) || sources.contains(&StateUpdateSource::GridInitializing) {
            return Ok(false);
        }

        self.store.save_grid_state(state).await?;
        self.events.publish(StateSaved {
            node_id: self.node_id.clone(),
            state: serde_json::to_value(state)?,
        });
        debug!(node = %self.node_id, ?sources, "Grid state persisted");
        Ok(true)
    }

    /// Read the saved views from the store into the manager
    pub async fn load_saved_views(&self) -> anyhow::Result<Vec<SavedView>> {
        let views = self.store.load_views().await?;
        *self.views.write() = views.clone();
        Ok(views)
    }

    pub fn views(&self) -> Vec<SavedView> {
        self.views.read().clone()
    }

    pub fn view_names(&self) -> Vec<String> {
        self.views.read().iter().map(|v| v.name.clone()).collect()
    }

    /// Name of the view last loaded or saved
    pub fn selected_view(&self) -> Option<String> {
        self.selected.read().clone()
    }

    /// Save `state` under `name`; a view with the same name is replaced
    pub async fn save_new_view(&self, name: &str, state: &GridState) -> anyhow::Result<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(GridError::State("view name is blank".into()).into());
        }

        let view = SavedView::capture(name, state);
        let views = {
            let mut views = self.views.write();
            match views.iter_mut().find(|v| v.name == name) {
                Some(existing) => *existing = view,
                None => views.push(view),
            }
            views.clone()
        };

        self.persist_views(views).await?;
        *self.selected.write() = Some(name.to_string());
        info!(node = %self.node_id, view = %name, "View saved");
        Ok(())
    }

    /// The state stored under `name`; it becomes the selected view
    pub fn load_view(&self, name: &str) -> Result<GridState, GridError> {
        let state = self
            .views
            .read()
            .iter()
            .find(|v| v.name == name)
            .map(SavedView::grid_state)
            .ok_or_else(|| GridError::UnknownView(name.to_string()))?;
        *self.selected.write() = Some(name.to_string());
        Ok(state)
    }

    /// Overwrite the view `name` with `state`
    pub async fn update_view(&self, name: &str, state: &GridState) -> anyhow::Result<()> {
        let views = {
            let mut views = self.views.write();
            let view = views
                .iter_mut()
                .find(|v| v.name == name)
                .ok_or_else(|| GridError::UnknownView(name.to_string()))?;
            *view = SavedView::capture(name, state);
            views.clone()
        };
        self.persist_views(views).await
    }

    /// Remove the view `name`, then reset the selection
    pub async fn delete_view(&self, name: &str) -> anyhow::Result<()> {
        let views = {
            let mut views = self.views.write();
            let before = views.len();
            views.retain(|v| v.name != name);
            if views.len() == before {
                return Err(GridError::UnknownView(name.to_string()).into());
            }
            views.clone()
        };
        self.persist_views(views).await?;
        self.reset_view();
        Ok(())
    }

    /// Forget the selected view; the caller restores default columns and
    /// clears the filters
    pub fn reset_view(&self) {
        *self.selected.write() = None;
    }

    async fn persist_views(&self, views: Vec<SavedView>) -> anyhow::Result<()> {
        self.store.save_views(&views).await?;
        self.events.publish(ViewsChanged {
            node_id: self.node_id.clone(),
            view_names: views.into_iter().map(|v| v.name).collect(),
        });
        Ok(())
    }
}

impl std::fmt::Debug for ViewStateManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewStateManager")
            .field("node_id", &self.node_id)
            .field("views", &self.view_names())
            .field("selected", &self.selected_view())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::store::{LocalBlobStore, MemoryBlobStore};
    use crate::persist::ColumnState;
    use dg_core::events::handler_from_fn;
    use dg_core::filter::{FilterCondition, FilterModel, NumberOperator};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn manager() -> (ViewStateManager, Arc<EventBus>) {
        let events = Arc::new(EventBus::new());
        let store = Arc::new(LocalBlobStore::new("grid", Arc::new(MemoryBlobStore::new())));
        (ViewStateManager::new("grid", store, events.clone()), events)
    }

    fn state(hidden: &str) -> GridState {
        GridState {
            column_state: vec![ColumnState {
                hide: Some(true),
                ..ColumnState::new(hidden)
            }],
            filter_model: FilterModel::new().with("Age", FilterCondition::number(NumberOperator::LessThan, 40)),
        }
    }

    #[tokio::test]
    async fn test_state_update_filtering() {
        let (manager, events) = manager();
        let saved = Arc::new(AtomicUsize::new(0));
        let counter = saved.clone();
        events.subscribe::<StateSaved>(handler_from_fn(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        let only_selection = [StateUpdateSource::RowSelection];
        let initializing = [StateUpdateSource::GridInitializing, StateUpdateSource::Sort];
        let sorted = [StateUpdateSource::RowSelection, StateUpdateSource::Sort];

        assert!(!manager.on_state_updated(&only_selection, &state("Name")).await.unwrap());
        assert!(!manager.on_state_updated(&initializing, &state("Name")).await.unwrap());
        assert!(manager.on_state_updated(&sorted, &state("Name")).await.unwrap());

        assert_eq!(saved.load(Ordering::SeqCst), 1);
        assert_eq!(manager.load_state().await, Some(state("Name")));
    }

    #[tokio::test]
    async fn test_view_lifecycle() {
        let (manager, _) = manager();

        assert!(manager.save_new_view("   ", &state("Name")).await.is_err());
        manager.save_new_view("Compact", &state("Name")).await.unwrap();
        manager.save_new_view("Wide", &state("Age")).await.unwrap();
        assert_eq!(manager.view_names(), vec!["Compact", "Wide"]);

        assert_eq!(manager.load_view("Compact").unwrap(), state("Name"));
        assert_eq!(manager.selected_view().as_deref(), Some("Compact"));
        assert!(matches!(manager.load_view("Nope"), Err(GridError::UnknownView(_))));

        manager.update_view("Compact", &state("City")).await.unwrap();
        assert_eq!(manager.load_view("Compact").unwrap().column_state[0].col_id, "City");

        manager.delete_view("Compact").await.unwrap();
        assert_eq!(manager.view_names(), vec!["Wide"]);
        assert_eq!(manager.selected_view(), None);
        assert!(manager.delete_view("Compact").await.is_err());
    }

    #[tokio::test]
    async fn test_views_survive_reload() {
        let events = Arc::new(EventBus::new());
        let blobs = Arc::new(MemoryBlobStore::new());
        let first = ViewStateManager::new(
            "grid",
            Arc::new(LocalBlobStore::new("grid", blobs.clone())),
            events.clone(),
        );
        first.save_new_view("Mine", &state("Name")).await.unwrap();

        let second = ViewStateManager::new("grid", Arc::new(LocalBlobStore::new("grid", blobs)), events);
        assert!(second.views().is_empty());
        let loaded = second.load_saved_views().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(second.load_view("Mine").unwrap(), state("Name"));
    }
}
