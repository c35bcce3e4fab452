//! Snapshot Normalization
//!
//! Repairs structural damage in a loaded snapshot: duplicate singleton
//! widgets, missing default widgets, duplicate ids, empty groups and legacy
//! config fields. Running the pass on its own output changes nothing.

use std::collections::HashSet;

use uuid::Uuid;

use super::snapshot::{AppConfig, Group, NamedSnippet, Snapshot};
use super::widget::{Widget, WidgetKind, WidgetPayload};

/// Widgets that must exist in every snapshot, with their enabled state
/// when they have to be recreated
const DEFAULT_WIDGETS: [(WidgetKind, bool); 2] =
    [(WidgetKind::SystemStatus, true), (WidgetKind::Docker, false)];

/// What a normalization pass changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizeReport {
    /// Duplicate singleton widgets folded into their first instance
    pub merged_singletons: usize,
    /// Default widgets recreated because they were missing
    pub created_defaults: usize,
    /// Widgets given a fresh id (empty or duplicate)
    pub reassigned_widget_ids: usize,
    /// Groups removed for having no title and no items
    pub pruned_groups: usize,
    /// Groups or items given a fresh id (empty or duplicate)
    pub reassigned_group_ids: usize,
    /// Legacy config fields promoted into their current shape
    pub migrated_fields: usize,
}

impl NormalizeReport {
    pub fn is_clean(&self) -> bool {
        *self == Self::default()
    }
}

/// Run the repair pass over a snapshot in place
pub fn normalize(snapshot: &mut Snapshot) -> NormalizeReport {
    let mut report = NormalizeReport::default();

    for kind in WidgetKind::ALL.iter().filter(|k| k.is_singleton()) {
        report.merged_singletons += merge_singletons(&mut snapshot.widgets, *kind);
    }
    report.created_defaults = ensure_defaults(&mut snapshot.widgets);
    report.reassigned_widget_ids = dedupe_ids(snapshot.widgets.iter_mut().map(|w| &mut w.id));

    let before = snapshot.groups.len();
    snapshot.groups.retain(Group::is_valid);
    report.pruned_groups = before - snapshot.groups.len();

    report.reassigned_group_ids = dedupe_ids(snapshot.groups.iter_mut().map(|g| &mut g.id));
    for group in &mut snapshot.groups {
        report.reassigned_group_ids += dedupe_ids(group.items.iter_mut().map(|i| &mut i.id));
    }

    report.migrated_fields = migrate_config(&mut snapshot.app_config);

    if !report.is_clean() {
        tracing::debug!(?report, "Snapshot repaired");
    }

    report
}

/// Fold every extra instance of `kind` into the first one. The first keeps
/// its id and geometry; it takes the most complete payload and stays
/// enabled if any instance was.
fn merge_singletons(widgets: &mut Vec<Widget>, kind: WidgetKind) -> usize {
    let indices: Vec<usize> = widgets
        .iter()
        .enumerate()
        .filter(|(_, w)| w.kind() == Some(kind))
        .map(|(i, _)| i)
        .collect();

    let Some((&primary, extras)) = indices.split_first() else {
        return 0;
    };
    if extras.is_empty() {
        return 0;
    }

    let mut best = primary;
    let mut best_score = widgets[primary].payload.completeness();
    for &idx in extras {
        let score = widgets[idx].payload.completeness();
        if score > best_score {
            best = idx;
            best_score = score;
        }
    }

    let payload = widgets[best].payload.clone();
    let enable = indices.iter().any(|&i| widgets[i].enable);
    widgets[primary].payload = payload;
    widgets[primary].enable = enable;

    let extras: HashSet<usize> = extras.iter().copied().collect();
    let mut idx = 0;
    widgets.retain(|_| {
        let keep = !extras.contains(&idx);
        idx += 1;
        keep
    });

    extras.len()
}

fn ensure_defaults(widgets: &mut Vec<Widget>) -> usize {
    let mut created = 0;
    for (kind, enable) in DEFAULT_WIDGETS {
        if widgets.iter().any(|w| w.kind() == Some(kind)) {
            continue;
        }
        let mut widget = Widget::new(kind.as_str(), WidgetPayload::empty(kind));
        widget.enable = enable;
        widgets.push(widget);
        created += 1;
    }
    created
}

/// Give every empty or already-seen id a fresh UUID; first occurrence wins
fn dedupe_ids<'a>(ids: impl Iterator<Item = &'a mut String>) -> usize {
    let mut seen = HashSet::new();
    let mut reassigned = 0;
    for id in ids {
        if id.trim().is_empty() || seen.contains(id.as_str()) {
            *id = Uuid::new_v4().to_string();
            reassigned += 1;
        }
        seen.insert(id.clone());
    }
    reassigned
}

fn migrate_config(config: &mut AppConfig) -> usize {
    let mut migrated = 0;
    if promote_legacy(&mut config.custom_script, &mut config.custom_scripts, "Custom script") {
        migrated += 1;
    }
    if promote_legacy(&mut config.custom_css, &mut config.custom_styles, "Custom style") {
        migrated += 1;
    }
    migrated
}

/// Promote a legacy single-string field into an empty list. A blank legacy
/// value is simply dropped; a populated one next to a non-empty list is
/// left untouched.
fn promote_legacy(legacy: &mut Option<String>, list: &mut Vec<NamedSnippet>, name: &str) -> bool {
    let Some(content) = legacy.as_deref() else {
        return false;
    };

    if content.trim().is_empty() {
        *legacy = None;
        return true;
    }
    if !list.is_empty() {
        return false;
    }

    list.push(NamedSnippet {
        name: name.to_string(),
        content: content.to_string(),
        enabled: true,
    });
    *legacy = None;
    true
}
