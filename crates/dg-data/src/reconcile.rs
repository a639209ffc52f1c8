//! Best-effort reconciliation of the grid selection with the current element

use dg_core::data::Datasource;
use dg_core::selection::{CurrentElement, ElementCursor, SelectionMode, SelectionTracker};
use tracing::trace;

/// Find the row matching the platform's current element and mark it selected
///
/// Only runs in single selection mode while nothing is selected yet. Any
/// backend error, or an element that cannot be placed in the base result
/// set, yields `None`.
pub async fn reconcile_selection<D>(
    cursor: &dyn ElementCursor,
    base: &D,
    tracker: &SelectionTracker,
) -> Option<usize>
where
    D: Datasource + ?Sized,
{
    if tracker.mode() == SelectionMode::Multiple || tracker.has_selected_row() {
        return None;
    }

    let element = match cursor.current().await {
        Ok(Some(element)) => element,
        Ok(None) => return None,
        Err(e) => {
            trace!(error = %e, "Current element unavailable");
            return None;
        }
    };

    let row_index = match element {
        CurrentElement::Entity { entity, owner_selection } => {
            let position = entity.position;
            match base.server_ref() {
                // The entity belongs to another selection: only select it when
                // it sits at the same position in ours
                Some(ours) if owner_selection.as_deref() != Some(ours.as_str()) => {
                    let found = base.find_entity_position(&entity).await.ok().flatten()?;
                    (found == position).then_some(position)?
                }
                _ => position,
            }
        }
        CurrentElement::ObjectScalar { position } => position,
        CurrentElement::Scalar => return None,
    };

    tracker.select_row(row_index);
    Some(row_index)
}
