//! Serves the grid's window requests from the bound datasource

use std::sync::Arc;

use dg_core::column::ColumnDescriptor;
use dg_core::data::{Datasource, RowSource};
use dg_core::events::events::{RowSelected, WindowFailed, WindowLoaded};
use dg_core::events::EventBus;
use dg_core::selection::{ElementCursor, SelectionTracker};
use dg_core::window::{WindowCallback, WindowRequest, WindowResult};
use parking_lot::RwLock;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::fetch::{fetch_window, PageWindow};
use crate::query::{compile_filter, SortCompiler};
use crate::reconcile::reconcile_selection;
use crate::session::ScopedQuerySession;
use crate::GridError;

/// Routes each window request to the base datasource or a filtered query
///
/// One request is served at a time. Filtered requests run against a fresh
/// [`ScopedQuerySession`], so the base datasource's result set is never
/// replaced by a filter.
pub struct WindowOrchestrator {
    base: Arc<dyn Datasource>,
    columns: Arc<RwLock<Vec<ColumnDescriptor>>>,
    sorter: SortCompiler,
    /// Base target id seen by the last request
    base_target: parking_lot::Mutex<Option<String>>,
    request_lock: Mutex<()>,
    cursor: Option<Arc<dyn ElementCursor>>,
    selection: SelectionTracker,
    events: Arc<EventBus>,
}

impl WindowOrchestrator {
    pub fn new(base: Arc<dyn Datasource>, columns: Vec<ColumnDescriptor>) -> Self {
        Self {
            base,
            columns: Arc::new(RwLock::new(columns)),
            sorter: SortCompiler::new(),
            base_target: parking_lot::Mutex::new(None),
            request_lock: Mutex::new(()),
            cursor: None,
            selection: SelectionTracker::default(),
            events: Arc::new(EventBus::new()),
        }
    }

    /// Bind the platform's current element, enabling selection reconciliation
    pub fn with_cursor(mut self, cursor: Arc<dyn ElementCursor>) -> Self {
        self.cursor = Some(cursor);
        self
    }

    pub fn with_selection(mut self, selection: SelectionTracker) -> Self {
        self.selection = selection;
        self
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = events;
        self
    }

    pub fn base(&self) -> &Arc<dyn Datasource> {
        &self.base
    }

    pub fn columns(&self) -> Vec<ColumnDescriptor> {
        self.columns.read().clone()
    }

    pub fn set_columns(&self, columns: Vec<ColumnDescriptor>) {
        *self.columns.write() = columns;
    }

    pub fn selection(&self) -> &SelectionTracker {
        &self.selection
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn sort_compiler(&self) -> &SortCompiler {
        &self.sorter
    }

    /// Serve one window request and resolve `callback` exactly once
    ///
    /// The selection is reconciled with the current element after the
    /// callback resolves, whether the window loaded or not.
    pub async fn get_rows(&self, request: &WindowRequest, callback: &mut dyn WindowCallback) -> WindowResult {
        let _guard = self.request_lock.lock().await;
        self.track_base_target();

        let result = self.serve(request, callback).await;
        self.reconcile().await;
        result
    }

    async fn serve(&self, request: &WindowRequest, callback: &mut dyn WindowCallback) -> WindowResult {
        if request.end_row <= request.start_row {
            let error = GridError::InvalidWindow {
                start: request.start_row,
                end: request.end_row,
            };
            return self.resolve_failure(request, callback, error.into());
        }

        let columns = self.columns.read().clone();
        let outcome = if request.is_filtered() {
            self.filtered_window(request, &columns).await
        } else {
            self.direct_window(request, &columns).await
        };

        match outcome {
            Ok((window, total_length)) => {
                callback.on_success(&window.rows, total_length);
                self.events.publish(WindowLoaded {
                    start_row: request.start_row,
                    row_count: window.rows.len(),
                    total_length,
                    filtered: request.is_filtered(),
                });
                WindowResult::Loaded {
                    rows: window.rows,
                    total_length,
                }
            }
            Err(error) => self.resolve_failure(request, callback, error),
        }
    }

    /// Drop the sort record of a base result set that has been replaced
    fn track_base_target(&self) {
        let current = self.base.target_id();
        let previous = self.base_target.lock().replace(current.clone());
        if let Some(previous) = previous.filter(|previous| *previous != current) {
            debug!(from = %previous, to = %current, "Base target changed");
            self.sorter.forget(&previous);
        }
    }

    async fn direct_window(
        &self,
        request: &WindowRequest,
        columns: &[ColumnDescriptor],
    ) -> anyhow::Result<(PageWindow, usize)> {
        let base = self.base.as_ref();
        self.sorter.apply_sort(&request.sort_model, columns, base).await?;
        let window = fetch_window(base, request.start_row, request.count(), columns).await?;
        let total_length = base.length().await?;
        Ok((window, total_length))
    }

    async fn filtered_window(
        &self,
        request: &WindowRequest,
        columns: &[ColumnDescriptor],
    ) -> anyhow::Result<(PageWindow, usize)> {
        let query = compile_filter(&request.filter_model, columns);
        let session = ScopedQuerySession::open(self.base.as_ref());
        session.issue_query(&query).await?;

        let result = async {
            self.sorter.apply_sort(&request.sort_model, columns, &session).await?;
            let window = fetch_window(&session, request.start_row, request.count(), columns).await?;
            let total_length = session.length().await?;
            Ok::<_, anyhow::Error>((window, total_length))
        }
        .await;

        // The session dies with this request
        self.sorter.forget(&session.target_id());
        result
    }

    fn resolve_failure(
        &self,
        request: &WindowRequest,
        callback: &mut dyn WindowCallback,
        error: anyhow::Error,
    ) -> WindowResult {
        warn!(
            start_row = request.start_row,
            end_row = request.end_row,
            error = %error,
            "Window request failed"
        );
        callback.on_failure();
        self.events.publish(WindowFailed {
            start_row: request.start_row,
            end_row: request.end_row,
            error: error.to_string(),
        });
        WindowResult::Failed
    }

    async fn reconcile(&self) {
        let Some(cursor) = self.cursor.as_ref() else {
            return;
        };
        if let Some(row_index) = reconcile_selection(cursor.as_ref(), self.base.as_ref(), &self.selection).await {
            debug!(row_index, "Selection reconciled with current element");
            self.events.publish(RowSelected { row_index });
        }
    }
}

impl std::fmt::Debug for WindowOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WindowOrchestrator")
            .field("datasource", &self.base.id())
            .field("columns", &self.columns.read().len())
            .field("selection", &self.selection.mode())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::{MemoryDataclass, MemoryDatasource};
    use async_trait::async_trait;
    use dg_core::column::{AttributeKind, ColumnDataType};
    use dg_core::data::{AttributeInfo, Dataclass, QueryScope};
    use dg_core::entity::{Entity, Row};
    use dg_core::events::handler_from_fn;
    use dg_core::filter::{FilterCondition, FilterModel, NumberOperator, TextOperator};
    use dg_core::selection::{CurrentElement, SelectionMode};
    use dg_core::sort::{SortDirection, SortModel};
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Wraps a memory dataclass and records the queries it receives
    struct CountingDataclass {
        inner: Arc<MemoryDataclass>,
        queries: parking_lot::Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Dataclass for CountingDataclass {
        fn name(&self) -> &str {
            self.inner.name()
        }

        fn attributes(&self) -> Vec<AttributeInfo> {
            self.inner.attributes()
        }

        async fn query(&self, query: &str, scope: &QueryScope) -> anyhow::Result<Arc<dyn RowSource>> {
            self.queries.lock().push(query.to_string());
            self.inner.query(query, scope).await
        }
    }

    /// A memory datasource with call counters and a load failure switch
    struct FakeDatasource {
        inner: MemoryDatasource,
        dataclass: Arc<CountingDataclass>,
        length_calls: AtomicUsize,
        fail_load: AtomicBool,
        fail_order: AtomicBool,
    }

    impl FakeDatasource {
        fn new() -> Arc<Self> {
            let records = (0..250)
                .map(|i| json!({"ID": i, "fullName": format!("Person {:03}", i), "age": i % 90}))
                .filter_map(|v| v.as_object().cloned())
                .collect();
            let dataclass = Arc::new(
                MemoryDataclass::new(
                    "Person",
                    vec![
                        AttributeInfo::new("ID", AttributeKind::Storage, "long"),
                        AttributeInfo::new("fullName", AttributeKind::Storage, "string"),
                        AttributeInfo::new("age", AttributeKind::Storage, "long"),
                    ],
                )
                .with_primary_key("ID")
                .with_records(records),
            );
            Arc::new(Self {
                inner: MemoryDatasource::new("people", dataclass.clone()),
                dataclass: Arc::new(CountingDataclass {
                    inner: dataclass,
                    queries: parking_lot::Mutex::new(Vec::new()),
                }),
                length_calls: AtomicUsize::new(0),
                fail_load: AtomicBool::new(false),
                fail_order: AtomicBool::new(false),
            })
        }
    }

    #[async_trait]
    impl RowSource for FakeDatasource {
        fn target_id(&self) -> String {
            self.inner.target_id()
        }

        fn server_ref(&self) -> Option<String> {
            self.inner.server_ref()
        }

        async fn order_by(&self, expression: &str) -> anyhow::Result<()> {
            if self.fail_order.load(Ordering::SeqCst) {
                anyhow::bail!("order by rejected");
            }
            self.inner.order_by(expression).await
        }

        async fn load_page(&self, offset: usize, count: usize) -> anyhow::Result<Vec<Entity>> {
            if self.fail_load.load(Ordering::SeqCst) {
                anyhow::bail!("page load rejected");
            }
            self.inner.load_page(offset, count).await
        }

        async fn length(&self) -> anyhow::Result<usize> {
            self.length_calls.fetch_add(1, Ordering::SeqCst);
            self.inner.length().await
        }

        async fn find_entity_position(&self, entity: &Entity) -> anyhow::Result<Option<usize>> {
            self.inner.find_entity_position(entity).await
        }
    }

    impl Datasource for FakeDatasource {
        fn id(&self) -> &str {
            self.inner.id()
        }

        fn dataclass(&self) -> Arc<dyn Dataclass> {
            self.dataclass.clone()
        }

        fn query_scope(&self) -> QueryScope {
            self.inner.query_scope()
        }
    }

    #[derive(Default)]
    struct Recorder {
        successes: Vec<(usize, usize)>,
        failures: usize,
    }

    impl WindowCallback for Recorder {
        fn on_success(&mut self, rows: &[Row], total_length: usize) {
            self.successes.push((rows.len(), total_length));
        }

        fn on_failure(&mut self) {
            self.failures += 1;
        }
    }

    struct FixedCursor(Option<CurrentElement>);

    #[async_trait]
    impl ElementCursor for FixedCursor {
        async fn current(&self) -> anyhow::Result<Option<CurrentElement>> {
            Ok(self.0.clone())
        }
    }

    fn columns() -> Vec<ColumnDescriptor> {
        vec![
            ColumnDescriptor::new("Name", "fullName", ColumnDataType::Text),
            ColumnDescriptor::new("Age", "age", ColumnDataType::Number),
        ]
    }

    fn adults() -> FilterModel {
        FilterModel::new().with("Age", FilterCondition::number(NumberOperator::GreaterThanOrEqual, 18))
    }

    #[tokio::test]
    async fn test_direct_request_uses_base() {
        let base = FakeDatasource::new();
        let orchestrator = WindowOrchestrator::new(base.clone(), columns());
        let mut recorder = Recorder::default();

        let result = orchestrator.get_rows(&WindowRequest::new(0, 100), &mut recorder).await;

        assert!(result.is_loaded());
        assert_eq!(recorder.successes, vec![(100, 250)]);
        assert_eq!(recorder.failures, 0);
        assert!(base.dataclass.queries.lock().is_empty());
        assert_eq!(base.length_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_filtered_request_never_reads_base_length() {
        let base = FakeDatasource::new();
        let orchestrator = WindowOrchestrator::new(base.clone(), columns());
        let mut recorder = Recorder::default();

        let request = WindowRequest::new(0, 100).with_filter(adults());
        let result = orchestrator.get_rows(&request, &mut recorder).await;

        // ages cycle 0..90, so 72 of every 90 rows pass
        let expected = (0..250).filter(|i| i % 90 >= 18).count();
        assert_eq!(recorder.successes, vec![(100, expected)]);
        assert!(matches!(result, WindowResult::Loaded { total_length, .. } if total_length == expected));
        assert_eq!(*base.dataclass.queries.lock(), vec!["age >= 18".to_string()]);
        assert_eq!(base.length_calls.load(Ordering::SeqCst), 0);

        // the base result set keeps its full length
        assert_eq!(base.inner.length().await.unwrap(), 250);
    }

    #[tokio::test]
    async fn test_filtered_sort_is_applied_to_session() {
        let base = FakeDatasource::new();
        let orchestrator = WindowOrchestrator::new(base.clone(), columns());
        let sort = SortModel::new().then("Age", SortDirection::Desc);

        let request = WindowRequest::new(0, 2).with_filter(adults()).with_sort(sort);
        let result = orchestrator.get_rows(&request, &mut Recorder::default()).await;

        let WindowResult::Loaded { rows, .. } = result else {
            panic!("expected rows");
        };
        assert!(rows.iter().all(|row| row.get("Age") == Some(&json!(89))));
        // filtered sessions leave no sort record behind, and the base was not sorted
        assert!(orchestrator.sort_compiler().last_applied(&base.target_id()).is_empty());
    }

    #[tokio::test]
    async fn test_page_load_failure_after_sort() {
        let base = FakeDatasource::new();
        base.fail_load.store(true, Ordering::SeqCst);
        let orchestrator = WindowOrchestrator::new(base.clone(), columns());

        let failed = Arc::new(AtomicUsize::new(0));
        let counter = failed.clone();
        orchestrator.events().subscribe::<WindowFailed>(handler_from_fn(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        let sort = SortModel::new().then("Name", SortDirection::Asc);
        let mut recorder = Recorder::default();
        let result = orchestrator
            .get_rows(&WindowRequest::new(0, 100).with_sort(sort.clone()), &mut recorder)
            .await;

        assert_eq!(result, WindowResult::Failed);
        assert_eq!(recorder.failures, 1);
        assert!(recorder.successes.is_empty());
        assert_eq!(failed.load(Ordering::SeqCst), 1);
        assert_eq!(orchestrator.sort_compiler().last_applied(&base.target_id()), sort);
    }

    #[tokio::test]
    async fn test_rejected_order_by_keeps_previous_sort() {
        let base = FakeDatasource::new();
        let orchestrator = WindowOrchestrator::new(base.clone(), columns());
        let by_name = SortModel::new().then("Name", SortDirection::Asc);
        let by_age = SortModel::new().then("Age", SortDirection::Desc);

        let first = orchestrator
            .get_rows(&WindowRequest::new(0, 10).with_sort(by_name.clone()), &mut Recorder::default())
            .await;
        assert!(first.is_loaded());

        base.fail_order.store(true, Ordering::SeqCst);
        let mut recorder = Recorder::default();
        let result = orchestrator
            .get_rows(&WindowRequest::new(0, 10).with_sort(by_age), &mut recorder)
            .await;

        assert_eq!(result, WindowResult::Failed);
        assert_eq!(recorder.failures, 1);
        assert!(recorder.successes.is_empty());
        assert_eq!(orchestrator.sort_compiler().last_applied(&base.target_id()), by_name);
        assert_eq!(base.length_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_rejected_query_fails_filtered_request() {
        let base = FakeDatasource::new();
        let orchestrator = WindowOrchestrator::new(base.clone(), columns());

        // the stray quote leaves an unterminated string in the query
        let filter = FilterModel::new().with("Name", FilterCondition::text(TextOperator::Equals, "a\"b"));
        let mut recorder = Recorder::default();
        let result = orchestrator
            .get_rows(&WindowRequest::new(0, 10).with_filter(filter), &mut recorder)
            .await;

        assert_eq!(result, WindowResult::Failed);
        assert_eq!(recorder.failures, 1);
        assert!(recorder.successes.is_empty());
        assert_eq!(*base.dataclass.queries.lock(), vec![r#"fullName == "a"b""#.to_string()]);
        assert_eq!(base.length_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_replaced_base_selection_drops_old_sort_record() {
        let base = FakeDatasource::new();
        let orchestrator = WindowOrchestrator::new(base.clone(), columns());
        let sort = SortModel::new().then("Age", SortDirection::Asc);

        orchestrator
            .get_rows(&WindowRequest::new(0, 10).with_sort(sort.clone()), &mut Recorder::default())
            .await;
        let old_target = base.target_id();
        assert_eq!(orchestrator.sort_compiler().last_applied(&old_target), sort);

        base.inner.select("age >= 18").await.unwrap();
        let new_target = base.target_id();
        assert_ne!(old_target, new_target);

        let result = orchestrator
            .get_rows(&WindowRequest::new(0, 10).with_sort(sort.clone()), &mut Recorder::default())
            .await;
        assert!(result.is_loaded());
        assert!(orchestrator.sort_compiler().last_applied(&old_target).is_empty());
        assert_eq!(orchestrator.sort_compiler().last_applied(&new_target), sort);
    }

    #[tokio::test]
    async fn test_selection_reconciled_after_failure() {
        let base = FakeDatasource::new();
        base.fail_load.store(true, Ordering::SeqCst);
        let orchestrator = WindowOrchestrator::new(base.clone(), columns())
            .with_cursor(Arc::new(FixedCursor(Some(CurrentElement::ObjectScalar { position: 7 }))));

        let mut recorder = Recorder::default();
        let result = orchestrator.get_rows(&WindowRequest::new(0, 10), &mut recorder).await;

        assert_eq!(result, WindowResult::Failed);
        assert_eq!(recorder.failures, 1);
        assert_eq!(orchestrator.selection().state().selected_row, Some(7));
    }

    #[tokio::test]
    async fn test_inverted_window_fails_without_backend_calls() {
        let base = FakeDatasource::new();
        let orchestrator = WindowOrchestrator::new(base.clone(), columns());
        let mut recorder = Recorder::default();

        let result = orchestrator.get_rows(&WindowRequest::new(100, 100), &mut recorder).await;

        assert_eq!(result, WindowResult::Failed);
        assert_eq!(recorder.failures, 1);
        assert_eq!(base.length_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_selection_reconciled_after_success() {
        let base = FakeDatasource::new();
        let orchestrator = WindowOrchestrator::new(base.clone(), columns())
            .with_cursor(Arc::new(FixedCursor(Some(CurrentElement::ObjectScalar { position: 4 }))));

        let selected = Arc::new(AtomicUsize::new(usize::MAX));
        let slot = selected.clone();
        orchestrator.events().subscribe::<RowSelected>(handler_from_fn(move |event| {
            if let Some(e) = event.as_any().downcast_ref::<RowSelected>() {
                slot.store(e.row_index, Ordering::SeqCst);
            }
        }));

        orchestrator.get_rows(&WindowRequest::new(0, 10), &mut Recorder::default()).await;

        assert_eq!(orchestrator.selection().state().selected_row, Some(4));
        assert_eq!(selected.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_no_reconciliation_in_multiple_mode() {
        let base = FakeDatasource::new();
        let orchestrator = WindowOrchestrator::new(base, columns())
            .with_selection(SelectionTracker::new(SelectionMode::Multiple))
            .with_cursor(Arc::new(FixedCursor(Some(CurrentElement::ObjectScalar { position: 4 }))));

        orchestrator.get_rows(&WindowRequest::new(0, 10), &mut Recorder::default()).await;
        assert!(orchestrator.selection().state().selected_rows.is_empty());
    }
}
