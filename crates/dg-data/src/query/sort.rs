//! Sort model to order-by compilation with per-target change detection

use ahash::AHashMap;
use dg_core::column::{find_by_title, ColumnDescriptor};
use dg_core::data::RowSource;
use dg_core::sort::SortModel;
use parking_lot::Mutex;
use tracing::{debug, warn};

/// Build `"<source> <dir>, ..."` in sort-model order; unknown columns are skipped
pub fn order_by_expression(sort_model: &SortModel, columns: &[ColumnDescriptor]) -> String {
    sort_model
        .iter()
        .filter_map(|item| match find_by_title(columns, &item.col_id) {
            Some(column) => Some(format!("{} {}", column.source, item.sort)),
            None => {
                warn!(column = %item.col_id, "Sort on unknown column ignored");
                None
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Applies sort models to row sources, skipping unchanged ones
///
/// The last applied model is remembered per target id, so switching between
/// the base datasource and a filtered result set never skips an order-by the
/// new target has not seen.
#[derive(Debug, Default)]
pub struct SortCompiler {
    applied: Mutex<AHashMap<String, SortModel>>,
}

impl SortCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last model successfully applied to a target; empty if none
    pub fn last_applied(&self, target_id: &str) -> SortModel {
        self.applied.lock().get(target_id).cloned().unwrap_or_default()
    }

    /// Issue an order-by on `target` if `sort_model` differs from the last
    /// one applied to it. Returns whether a backend call was made.
    pub async fn apply_sort<T>(
        &self,
        sort_model: &SortModel,
        columns: &[ColumnDescriptor],
        target: &T,
    ) -> anyhow::Result<bool>
    where
        T: RowSource + ?Sized,
    {
        let target_id = target.target_id();
        if self.last_applied(&target_id) == *sort_model {
            return Ok(false);
        }

        let expression = order_by_expression(sort_model, columns);
        debug!(target = %target_id, %expression, "Applying order by");
        target.order_by(&expression).await?;

        // Recorded only once the backend accepts the ordering
        self.applied.lock().insert(target_id, sort_model.clone());
        Ok(true)
    }

    /// Forget the record of a target that no longer exists
    pub fn forget(&self, target_id: &str) {
        self.applied.lock().remove(target_id);
    }
}
