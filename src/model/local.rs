//! Local Model
//!
//! The editable in-memory copy of the dashboard snapshot. Every change goes
//! through this type so the logical version always moves with the data.

use serde_json::Value;

use super::normalize::{normalize, NormalizeReport};
use super::snapshot::Snapshot;
use super::widget::WidgetPayload;

/// Canonical in-memory snapshot plus its logical version
#[derive(Debug, Clone, Default)]
pub struct LocalModel {
    snapshot: Snapshot,
    version: u64,
    local_edits: u64,
}

impl LocalModel {
    /// Create an empty model
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a model from a loaded snapshot, running the repair pass
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let mut model = Self::new();
        model.replace_snapshot(snapshot);
        model
    }

    /// Apply a local edit
    pub fn apply_local_mutation<F, R>(&mut self, mutate: F) -> R
    where
        F: FnOnce(&mut Snapshot) -> R,
    {
        let result = mutate(&mut self.snapshot);
        self.version += 1;
        self.local_edits += 1;
        result
    }

    /// Swap in a full snapshot (refetch, login, logout, cache bootstrap)
    pub fn replace_snapshot(&mut self, snapshot: Snapshot) -> NormalizeReport {
        self.snapshot = snapshot;
        self.version += 1;
        normalize(&mut self.snapshot)
    }

    /// Point update of one widget's payload pushed by the server.
    ///
    /// Returns false when no widget has that id.
    pub fn apply_widget_data(&mut self, widget_id: &str, data: Value) -> bool {
        let Some(widget) = self.snapshot.widget_mut(widget_id) else {
            return false;
        };
        widget.payload = WidgetPayload::decode(widget.payload.kind_name(), data);
        self.version += 1;
        true
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Number of edits made through [`LocalModel::apply_local_mutation`].
    ///
    /// Unlike the version this ignores server-originated changes, so it
    /// tells whether the user touched the model while a request ran.
    pub fn local_edits(&self) -> u64 {
        self.local_edits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::widget::{Widget, WidgetKind};
    use serde_json::json;

    #[test]
    fn test_mutation_bumps_version() {
        let mut model = LocalModel::new();
        assert_eq!(model.version(), 0);

        let count = model.apply_local_mutation(|s| {
            s.widgets.push(Widget::new("m", WidgetPayload::empty(WidgetKind::Memo)));
            s.widgets.len()
        });

        assert_eq!(count, 1);
        assert_eq!(model.version(), 1);
        assert!(model.snapshot().widget("m").is_some());
    }

    #[test]
    fn test_replace_normalizes() {
        let mut model = LocalModel::new();
        let report = model.replace_snapshot(Snapshot::default());

        assert_eq!(report.created_defaults, 2);
        assert_eq!(model.version(), 1);
        assert!(model.snapshot().widget("docker").is_some());
    }

    #[test]
    fn test_widget_data_point_update() {
        let mut model = LocalModel::from_snapshot(Snapshot::default());
        let version = model.version();

        assert!(model.apply_widget_data("docker", json!({"endpoint": "tcp://nas:2375"})));
        assert_eq!(model.version(), version + 1);
        match &model.snapshot().widget("docker").unwrap().payload {
            WidgetPayload::Docker(data) => {
                assert_eq!(data.endpoint.as_deref(), Some("tcp://nas:2375"))
            }
            other => panic!("Expected docker payload, got {:?}", other),
        }

        assert!(!model.apply_widget_data("missing", json!({})));
        assert_eq!(model.version(), version + 1);
        assert_eq!(model.local_edits(), 0);
    }

    #[test]
    fn test_only_local_mutations_count_as_edits() {
        let mut model = LocalModel::from_snapshot(Snapshot::default());
        model.apply_widget_data("docker", json!({}));
        model.replace_snapshot(Snapshot::default());
        assert_eq!(model.local_edits(), 0);

        model.apply_local_mutation(|s| s.groups.clear());
        assert_eq!(model.local_edits(), 1);
        assert_eq!(model.version(), 4);
    }
}
