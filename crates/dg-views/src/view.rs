//! Grid view abstraction - base trait for embeddable grid components

use serde_json::Value;
use uuid::Uuid;

/// Unique identifier for a grid view
pub type GridViewId = Uuid;

/// Base trait for grid components hosted on a page
pub trait GridView: Send + Sync {
    /// Get the unique ID of this view
    fn id(&self) -> GridViewId;

    /// Get the display name
    fn display_name(&self) -> &str;

    /// Get the view type (for serialization)
    fn view_type(&self) -> &str;

    /// Save configuration
    fn save_config(&self) -> Value;

    /// Load configuration
    fn load_config(&mut self, config: Value);

    /// Get as any for downcasting
    fn as_any(&self) -> &dyn std::any::Any;
}
