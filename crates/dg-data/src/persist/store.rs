//! Blob and state stores backing persisted grid state

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ahash::AHashMap;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::{GridState, SavedView};
use crate::GridError;

const COLUMN_STATE_KEY: &str = "columnState";
const FILTER_MODEL_KEY: &str = "filterModel";
const SAVED_VIEWS_KEY: &str = "savedViews";

/// Keyed string storage, the local-storage analogue
pub trait BlobStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, GridError>;
    fn set(&self, key: &str, value: &str) -> Result<(), GridError>;
    fn remove(&self, key: &str) -> Result<(), GridError>;
}

/// Process-local blob store
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<AHashMap<String, String>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BlobStore for MemoryBlobStore {
    fn get(&self, key: &str) -> Result<Option<String>, GridError> {
        Ok(self.blobs.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), GridError> {
        self.blobs.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), GridError> {
        self.blobs.write().remove(key);
        Ok(())
    }
}

/// One `<key>.json` file per blob under a directory
#[derive(Debug, Clone)]
pub struct FileBlobStore {
    dir: PathBuf,
}

impl FileBlobStore {
    /// Use `dir`, creating it when missing
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, GridError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let file_name: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
            .collect();
        self.dir.join(format!("{}.json", file_name))
    }
}

impl BlobStore for FileBlobStore {
    fn get(&self, key: &str) -> Result<Option<String>, GridError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), GridError> {
        fs::write(self.path_for(key), value)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), GridError> {
        match fs::remove_file(self.path_for(key)) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

/// Remote state value bound to the grid
#[async_trait]
pub trait StateHandle: Send + Sync {
    async fn get_value(&self) -> anyhow::Result<Value>;
    async fn set_value(&self, value: Value) -> anyhow::Result<()>;
}

/// State handle holding its value in memory
#[derive(Debug, Default)]
pub struct MemoryStateHandle {
    value: RwLock<Value>,
}

impl MemoryStateHandle {
    pub fn new(value: Value) -> Self {
        Self {
            value: RwLock::new(value),
        }
    }

    pub fn snapshot(&self) -> Value {
        self.value.read().clone()
    }
}

#[async_trait]
impl StateHandle for MemoryStateHandle {
    async fn get_value(&self) -> anyhow::Result<Value> {
        Ok(self.value.read().clone())
    }

    async fn set_value(&self, value: Value) -> anyhow::Result<()> {
        *self.value.write() = value;
        Ok(())
    }
}

/// Where a grid keeps its state and saved views
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Stored state; `None` when absent or unreadable
    async fn load_grid_state(&self) -> anyhow::Result<Option<GridState>>;

    async fn save_grid_state(&self, state: &GridState) -> anyhow::Result<()>;

    /// Stored views; empty when absent or unreadable
    async fn load_views(&self) -> anyhow::Result<Vec<SavedView>>;

    async fn save_views(&self, views: &[SavedView]) -> anyhow::Result<()>;
}

fn decode_or_warn<T: DeserializeOwned>(what: &str, value: Value) -> Option<T> {
    match serde_json::from_value(value) {
        Ok(decoded) => Some(decoded),
        Err(e) => {
            warn!(error = %e, "Ignoring malformed persisted {}", what);
            None
        }
    }
}

/// Keyed blobs `gridState_<node>` and `savedViews_<node>`
pub struct LocalBlobStore {
    node_id: String,
    blobs: Arc<dyn BlobStore>,
}

impl LocalBlobStore {
    pub fn new(node_id: impl Into<String>, blobs: Arc<dyn BlobStore>) -> Self {
        Self {
            node_id: node_id.into(),
            blobs,
        }
    }

    pub fn grid_state_key(&self) -> String {
        format!("gridState_{}", self.node_id)
    }

    pub fn saved_views_key(&self) -> String {
        format!("savedViews_{}", self.node_id)
    }

    fn read_json(&self, key: &str) -> Result<Option<Value>, GridError> {
        let Some(raw) = self.blobs.get(key)? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!(%key, error = %e, "Stored blob is not valid JSON");
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl StateStore for LocalBlobStore {
    async fn load_grid_state(&self) -> anyhow::Result<Option<GridState>> {
        let value = self.read_json(&self.grid_state_key())?;
        Ok(value.and_then(|v| decode_or_warn("grid state", v)))
    }

    async fn save_grid_state(&self, state: &GridState) -> anyhow::Result<()> {
        let key = self.grid_state_key();
        self.blobs.set(&key, &serde_json::to_string(state)?)?;
        debug!(%key, "Grid state saved");
        Ok(())
    }

    async fn load_views(&self) -> anyhow::Result<Vec<SavedView>> {
        let value = self.read_json(&self.saved_views_key())?;
        Ok(value
            .and_then(|v| decode_or_warn("saved views", v))
            .unwrap_or_default())
    }

    async fn save_views(&self, views: &[SavedView]) -> anyhow::Result<()> {
        self.blobs.set(&self.saved_views_key(), &serde_json::to_string(views)?)?;
        Ok(())
    }
}

impl std::fmt::Debug for LocalBlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalBlobStore").field("node_id", &self.node_id).finish()
    }
}

/// State merged into one remote JSON object
///
/// Writes read the current value first and replace only their own keys;
/// concurrent writers race and the last one wins.
pub struct RemoteStateStore {
    handle: Arc<dyn StateHandle>,
}

impl RemoteStateStore {
    pub fn new(handle: Arc<dyn StateHandle>) -> Self {
        Self { handle }
    }

    async fn current_object(&self) -> anyhow::Result<Map<String, Value>> {
        Ok(match self.handle.get_value().await? {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                warn!(value = %other, "Remote state is not an object, replacing it");
                Map::new()
            }
        })
    }

    async fn merge(&self, entries: Vec<(&str, Value)>) -> anyhow::Result<()> {
        let mut object = self.current_object().await?;
        for (key, value) in entries {
            object.insert(key.to_string(), value);
        }
        self.handle.set_value(Value::Object(object)).await
    }
}

#[async_trait]
impl StateStore for RemoteStateStore {
    async fn load_grid_state(&self) -> anyhow::Result<Option<GridState>> {
        let mut object = self.current_object().await?;
        let Some(column_state) = object.remove(COLUMN_STATE_KEY).filter(|v| !v.is_null()) else {
            return Ok(None);
        };

        let mut state = Map::new();
        state.insert(COLUMN_STATE_KEY.to_string(), column_state);
        if let Some(filter_model) = object.remove(FILTER_MODEL_KEY).filter(|v| !v.is_null()) {
            state.insert(FILTER_MODEL_KEY.to_string(), filter_model);
        }
        Ok(decode_or_warn("grid state", Value::Object(state)))
    }

    async fn save_grid_state(&self, state: &GridState) -> anyhow::Result<()> {
        self.merge(vec![
            (COLUMN_STATE_KEY, serde_json::to_value(&state.column_state)?),
            (FILTER_MODEL_KEY, serde_json::to_value(&state.filter_model)?),
        ])
        .await
    }

    async fn load_views(&self) -> anyhow::Result<Vec<SavedView>> {
        let mut object = self.current_object().await?;
        Ok(object
            .remove(SAVED_VIEWS_KEY)
            .filter(|v| !v.is_null())
            .and_then(|v| decode_or_warn("saved views", v))
            .unwrap_or_default())
    }

    async fn save_views(&self, views: &[SavedView]) -> anyhow::Result<()> {
        self.merge(vec![(SAVED_VIEWS_KEY, serde_json::to_value(views)?)]).await
    }
}

impl std::fmt::Debug for RemoteStateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteStateStore").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::ColumnState;
    use dg_core::filter::{FilterCondition, FilterModel, TextOperator};
    use serde_json::json;

    fn sample_state() -> GridState {
        GridState {
            column_state: vec![ColumnState {
                hide: Some(true),
                ..ColumnState::new("Name")
            }],
            filter_model: FilterModel::new().with("Name", FilterCondition::text(TextOperator::Contains, "an")),
        }
    }

    #[tokio::test]
    async fn test_local_store_uses_node_keys() {
        let blobs = Arc::new(MemoryBlobStore::new());
        let store = LocalBlobStore::new("grid1", blobs.clone());

        assert_eq!(store.load_grid_state().await.unwrap(), None);
        store.save_grid_state(&sample_state()).await.unwrap();
        store.save_views(&[SavedView::capture("Mine", &sample_state())]).await.unwrap();

        assert!(blobs.get("gridState_grid1").unwrap().is_some());
        assert!(blobs.get("savedViews_grid1").unwrap().is_some());
        assert_eq!(store.load_grid_state().await.unwrap(), Some(sample_state()));
        assert_eq!(store.load_views().await.unwrap()[0].name, "Mine");
    }

    #[tokio::test]
    async fn test_malformed_local_blob_is_absent() {
        let blobs = Arc::new(MemoryBlobStore::new());
        blobs.set("gridState_g", "{not json").unwrap();
        blobs.set("savedViews_g", r#"{"unexpected": true}"#).unwrap();
        let store = LocalBlobStore::new("g", blobs);

        assert_eq!(store.load_grid_state().await.unwrap(), None);
        assert!(store.load_views().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remote_store_merges_keys() {
        let handle = Arc::new(MemoryStateHandle::new(json!({"owner": "kept"})));
        let store = RemoteStateStore::new(handle.clone());

        store.save_views(&[SavedView::capture("A", &GridState::default())]).await.unwrap();
        store.save_grid_state(&sample_state()).await.unwrap();

        let value = handle.snapshot();
        assert_eq!(value["owner"], json!("kept"));
        assert_eq!(value["savedViews"][0]["name"], json!("A"));
        assert_eq!(value["columnState"][0]["colId"], json!("Name"));
        assert_eq!(store.load_grid_state().await.unwrap(), Some(sample_state()));
    }

    #[tokio::test]
    async fn test_remote_store_without_column_state() {
        let handle = Arc::new(MemoryStateHandle::new(json!({"filterModel": {}})));
        let store = RemoteStateStore::new(handle);
        assert_eq!(store.load_grid_state().await.unwrap(), None);
        assert!(store.load_views().await.unwrap().is_empty());
    }

    #[test]
    fn test_file_blob_store() {
        let dir = tempfile::tempdir().unwrap();
        let blobs = FileBlobStore::new(dir.path().join("state")).unwrap();

        assert_eq!(blobs.get("gridState_a/b").unwrap(), None);
        blobs.set("gridState_a/b", "{}").unwrap();
        assert_eq!(blobs.get("gridState_a/b").unwrap().as_deref(), Some("{}"));
        assert!(blobs.dir().join("gridState_a_b.json").exists());

        blobs.remove("gridState_a/b").unwrap();
        blobs.remove("gridState_a/b").unwrap();
        assert_eq!(blobs.get("gridState_a/b").unwrap(), None);
    }
}
