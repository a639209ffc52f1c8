//! The data-bound grid component

use std::sync::Arc;

use dg_core::column::ColumnDescriptor;
use dg_core::data::Datasource;
use dg_core::events::events::RowSelected;
use dg_core::events::EventBus;
use dg_core::filter::FilterModel;
use dg_core::selection::{ElementCursor, SelectionMode, SelectionTracker};
use dg_core::settings::{GridSettings, PersistenceMode};
use dg_core::window::{WindowCallback, WindowRequest, WindowResult};
use dg_data::layout::{ColumnLayout, Pin};
use dg_data::persist::{
    BlobStore, ColumnState, GridState, LocalBlobStore, MemoryBlobStore, RemoteStateStore, StateHandle,
    StateStore, StateUpdateSource, ViewStateManager,
};
use dg_data::{GridError, WindowOrchestrator};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::column_defs::{derive_column_defs, ColumnDef};
use crate::view::{GridView, GridViewId};

/// Component properties set by the page designer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GridProps {
    /// Bound datasource, `namespace:id` or a bare id
    pub datasource: Option<String>,
    pub columns: Vec<ColumnDescriptor>,
    /// Datasource holding the persisted state when local storage is off
    pub state: Option<String>,
    pub current_selection: Option<String>,
    pub current_element: Option<String>,
    pub multi_selection: bool,
    pub save_local_storage: bool,
    pub disabled: bool,
    pub node_id: String,
}

impl Default for GridProps {
    fn default() -> Self {
        Self {
            datasource: None,
            columns: Vec::new(),
            state: None,
            current_selection: None,
            current_element: None,
            multi_selection: false,
            save_local_storage: true,
            disabled: false,
            node_id: "grid".to_string(),
        }
    }
}

/// Host objects a rendered grid talks to
#[derive(Clone, Default)]
pub struct GridBindings {
    pub datasource: Option<Arc<dyn Datasource>>,
    pub cursor: Option<Arc<dyn ElementCursor>>,
    pub state: Option<Arc<dyn StateHandle>>,
    pub blobs: Option<Arc<dyn BlobStore>>,
}

/// Whether the component runs inside the page editor or on a live page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GridMode {
    Build,
    Render,
}

struct RenderState {
    orchestrator: WindowOrchestrator,
    layout: RwLock<ColumnLayout>,
    /// Column state as last reported by the grid or restored from storage
    column_state: RwLock<Vec<ColumnState>>,
    views: ViewStateManager,
    filter_model: RwLock<FilterModel>,
}

impl RenderState {
    fn current_state(&self) -> GridState {
        GridState {
            column_state: self.layout.read().merge_column_state(&self.column_state.read()),
            filter_model: self.filter_model.read().clone(),
        }
    }

    fn apply(&self, state: &GridState) {
        self.layout.write().apply_column_state(&state.column_state);
        *self.column_state.write() = state.column_state.clone();
        *self.filter_model.write() = state.filter_model.clone();
    }
}

/// A data grid bound to a datasource
pub struct GridComponent {
    id: GridViewId,
    mode: GridMode,
    props: GridProps,
    settings: GridSettings,
    events: Arc<EventBus>,
    render: Option<RenderState>,
}

impl GridComponent {
    /// Build mode inside the editor, render mode otherwise
    pub fn new(props: GridProps, editor_enabled: bool, bindings: GridBindings) -> Self {
        if editor_enabled {
            Self::build(props)
        } else {
            Self::render(props, bindings)
        }
    }

    pub fn build(props: GridProps) -> Self {
        let settings = GridSettings::from_flags(props.multi_selection, props.save_local_storage);
        Self {
            id: Uuid::new_v4(),
            mode: GridMode::Build,
            props,
            settings,
            events: Arc::new(EventBus::new()),
            render: None,
        }
    }

    pub fn render(props: GridProps, bindings: GridBindings) -> Self {
        let settings = GridSettings::from_flags(props.multi_selection, props.save_local_storage);
        let events = Arc::new(EventBus::new());

        let render = match bindings.datasource {
            Some(datasource) => {
                let mut orchestrator = WindowOrchestrator::new(datasource, props.columns.clone())
                    .with_selection(SelectionTracker::new(settings.selection_mode))
                    .with_events(events.clone());
                if let Some(cursor) = bindings.cursor {
                    orchestrator = orchestrator.with_cursor(cursor);
                }

                let store = state_store(&props, &settings, bindings.state, bindings.blobs);
                Some(RenderState {
                    orchestrator,
                    layout: RwLock::new(ColumnLayout::new(&props.columns, settings.initial_visible_columns)),
                    column_state: RwLock::new(Vec::new()),
                    views: ViewStateManager::new(props.node_id.clone(), store, events.clone()),
                    filter_model: RwLock::new(FilterModel::new()),
                })
            }
            None => {
                info!(node = %props.node_id, "Grid rendered without a datasource");
                None
            }
        };

        Self {
            id: Uuid::new_v4(),
            mode: GridMode::Render,
            props,
            settings,
            events,
            render,
        }
    }

    pub fn mode(&self) -> GridMode {
        self.mode
    }

    pub fn props(&self) -> &GridProps {
        &self.props
    }

    pub fn settings(&self) -> &GridSettings {
        &self.settings
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Whether a datasource is attached and data can be served
    pub fn is_bound(&self) -> bool {
        self.render.is_some()
    }

    fn live(&self) -> Result<&RenderState, GridError> {
        match (&self.mode, &self.render) {
            (GridMode::Build, _) => Err(GridError::State("grid is in build mode".into())),
            (GridMode::Render, None) => Err(GridError::State("no datasource attached".into())),
            (GridMode::Render, Some(render)) => Ok(render),
        }
    }

    /// Placeholder rows for the editor: each column title mapped to its
    /// source path
    pub fn preview_rows(&self) -> Vec<Map<String, Value>> {
        let row: Map<String, Value> = self
            .props
            .columns
            .iter()
            .map(|column| (column.title.clone(), Value::String(column.source.clone())))
            .collect();
        vec![row; self.settings.preview_rows]
    }

    /// Column definitions for the grid; every column is shown in build mode
    pub fn column_defs(&self) -> Vec<ColumnDef> {
        match &self.render {
            Some(render) => derive_column_defs(&self.props.columns, &render.layout.read()),
            None => {
                let layout = ColumnLayout::new(&self.props.columns, usize::MAX);
                derive_column_defs(&self.props.columns, &layout)
            }
        }
    }

    /// Restore persisted column state and filters, then read saved views
    pub async fn initialize(&self) -> Result<(), GridError> {
        let render = self.live()?;
        if let Some(state) = render.views.load_state().await {
            debug!(node = %self.props.node_id, columns = state.column_state.len(), "Restoring grid state");
            render.apply(&state);
        }
        if let Err(e) = render.views.load_saved_views().await {
            warn!(node = %self.props.node_id, error = %e, "Could not load saved views");
        }
        Ok(())
    }

    /// Serve a window request from the infinite row model
    pub async fn get_rows(
        &self,
        request: &WindowRequest,
        callback: &mut dyn WindowCallback,
    ) -> Result<WindowResult, GridError> {
        let render = self.live()?;
        Ok(render.orchestrator.get_rows(request, callback).await)
    }

    pub fn current_state(&self) -> Result<GridState, GridError> {
        Ok(self.live()?.current_state())
    }

    pub fn filter_model(&self) -> Result<FilterModel, GridError> {
        Ok(self.live()?.filter_model.read().clone())
    }

    /// Grid reported a state change; persist it unless the sources say
    /// otherwise
    pub async fn on_state_updated(
        &self,
        sources: &[StateUpdateSource],
        column_state: Vec<ColumnState>,
        filter_model: FilterModel,
    ) -> anyhow::Result<bool> {
        let render = self.live()?;
        render.apply(&GridState {
            column_state,
            filter_model,
        });
        let state = render.current_state();
        render.views.on_state_updated(sources, &state).await
    }

    /// Show or hide a column and persist the result
    pub async fn toggle_column(&self, field: &str) -> anyhow::Result<bool> {
        let render = self.live()?;
        if !render.layout.write().toggle(field) {
            return Ok(false);
        }
        let state = render.current_state();
        render
            .views
            .on_state_updated(&[StateUpdateSource::ColumnVisibility], &state)
            .await?;
        Ok(true)
    }

    /// Pin or unpin a column and persist the result
    pub async fn pin_column(&self, field: &str, pin: Option<Pin>) -> anyhow::Result<bool> {
        let render = self.live()?;
        if !render.layout.write().pin(field, pin) {
            return Ok(false);
        }
        let state = render.current_state();
        render
            .views
            .on_state_updated(&[StateUpdateSource::ColumnPinning], &state)
            .await?;
        Ok(true)
    }

    pub fn view_names(&self) -> Vec<String> {
        self.render
            .as_ref()
            .map(|render| render.views.view_names())
            .unwrap_or_default()
    }

    pub fn selected_view(&self) -> Option<String> {
        self.render.as_ref().and_then(|render| render.views.selected_view())
    }

    pub async fn save_new_view(&self, name: &str) -> anyhow::Result<()> {
        let render = self.live()?;
        let state = render.current_state();
        render.views.save_new_view(name, &state).await
    }

    /// Apply the saved view `name` to the columns and filters
    pub fn load_view(&self, name: &str) -> Result<GridState, GridError> {
        let render = self.live()?;
        let state = render.views.load_view(name)?;
        render.apply(&state);
        Ok(state)
    }

    pub async fn update_view(&self, name: &str) -> anyhow::Result<()> {
        let render = self.live()?;
        let state = render.current_state();
        render.views.update_view(name, &state).await
    }

    /// Delete the view `name` and return to the default view
    pub async fn delete_view(&self, name: &str) -> anyhow::Result<()> {
        self.live()?.views.delete_view(name).await?;
        self.reset_view()?;
        Ok(())
    }

    /// Default columns, no filters, no selected view
    pub fn reset_view(&self) -> Result<(), GridError> {
        let render = self.live()?;
        render.layout.write().reset();
        render.column_state.write().clear();
        *render.filter_model.write() = FilterModel::new();
        render.views.reset_view();
        Ok(())
    }

    /// Replace the column configuration; the layout is rebuilt if it changed
    pub fn set_columns(&mut self, columns: Vec<ColumnDescriptor>) {
        if let Some(render) = &self.render {
            render.orchestrator.set_columns(columns.clone());
            if render.layout.write().sync_columns(&columns) {
                render
                    .column_state
                    .write()
                    .retain(|state| columns.iter().any(|column| column.title == state.col_id));
            }
        }
        self.props.columns = columns;
    }

    /// A row was clicked; in single selection mode it becomes the selection
    pub fn row_clicked(&self, row_index: usize) -> bool {
        let Some(render) = &self.render else {
            return false;
        };
        let selection = render.orchestrator.selection();
        if self.props.disabled || selection.mode() == SelectionMode::Multiple {
            return false;
        }
        selection.select_row(row_index);
        self.events.publish(RowSelected { row_index });
        true
    }

    /// The bound selection was emptied from outside the grid
    pub fn selection_cleared(&self) {
        if let Some(render) = &self.render {
            render.orchestrator.selection().clear();
        }
    }

    pub fn selection(&self) -> Option<&SelectionTracker> {
        self.render.as_ref().map(|render| render.orchestrator.selection())
    }
}

fn state_store(
    props: &GridProps,
    settings: &GridSettings,
    remote: Option<Arc<dyn StateHandle>>,
    blobs: Option<Arc<dyn BlobStore>>,
) -> Arc<dyn StateStore> {
    match (settings.persistence, remote) {
        (PersistenceMode::StateSource, Some(handle)) => Arc::new(RemoteStateStore::new(handle)),
        (mode, _) => {
            let blobs = blobs.unwrap_or_else(|| {
                debug!(node = %props.node_id, ?mode, "No blob store bound, state kept in memory");
                Arc::new(MemoryBlobStore::new())
            });
            Arc::new(LocalBlobStore::new(props.node_id.clone(), blobs))
        }
    }
}

impl GridView for GridComponent {
    fn id(&self) -> GridViewId {
        self.id
    }

    fn display_name(&self) -> &str {
        &self.props.node_id
    }

    fn view_type(&self) -> &str {
        "data_grid"
    }

    fn save_config(&self) -> Value {
        serde_json::to_value(&self.props).unwrap_or(Value::Null)
    }

    fn load_config(&mut self, config: Value) {
        match serde_json::from_value::<GridProps>(config) {
            Ok(props) => {
                if props.columns != self.props.columns {
                    self.set_columns(props.columns.clone());
                }
                self.props = props;
            }
            Err(e) => warn!(error = %e, "Ignoring invalid grid configuration"),
        }
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

impl std::fmt::Debug for GridComponent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GridComponent")
            .field("id", &self.id)
            .field("mode", &self.mode)
            .field("node_id", &self.props.node_id)
            .field("bound", &self.is_bound())
            .finish()
    }
}
