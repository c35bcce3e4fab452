//! Widget Types
//!
//! Widgets are the tiles of the dashboard grid. The envelope (id, geometry,
//! visibility flags) is what the sync engine and the layout packer work
//! with; the payload is a tagged union keyed by the widget `type`.
//!
//! Two historical geometry shapes are accepted on decode (`x/y/w/h` and
//! `colSpan/rowSpan`); only the canonical `x/y/w/h` shape is emitted.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Widget type vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WidgetKind {
    Clock,
    Weather,
    Rss,
    Docker,
    SystemStatus,
    Iframe,
    Memo,
    Todo,
    Countdown,
}

impl WidgetKind {
    /// All known kinds, in declaration order
    pub const ALL: [WidgetKind; 9] = [
        WidgetKind::Clock,
        WidgetKind::Weather,
        WidgetKind::Rss,
        WidgetKind::Docker,
        WidgetKind::SystemStatus,
        WidgetKind::Iframe,
        WidgetKind::Memo,
        WidgetKind::Todo,
        WidgetKind::Countdown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WidgetKind::Clock => "clock",
            WidgetKind::Weather => "weather",
            WidgetKind::Rss => "rss",
            WidgetKind::Docker => "docker",
            WidgetKind::SystemStatus => "system-status",
            WidgetKind::Iframe => "iframe",
            WidgetKind::Memo => "memo",
            WidgetKind::Todo => "todo",
            WidgetKind::Countdown => "countdown",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|kind| kind.as_str() == s)
    }

    /// Infrastructure widgets of which at most one instance may exist
    pub fn is_singleton(&self) -> bool {
        matches!(self, WidgetKind::Docker | WidgetKind::SystemStatus)
    }
}

impl std::fmt::Display for WidgetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================
// Payload schemas
// ============================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClockData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hour24: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_seconds: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RssData {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub feed_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DockerData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_stopped: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub containers: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStatusData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_cpu: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_memory: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_disk: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_secs: Option<u32>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IframeData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_scripts: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoEntry {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub done: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoData {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<TodoEntry>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountdownData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Target date (ISO 8601)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Type-specific widget payload
///
/// Contents are never validated by the sync core. A payload whose `type` is
/// outside the vocabulary, or whose shape does not fit the variant schema,
/// is kept verbatim as [`WidgetPayload::Unknown`].
#[derive(Debug, Clone, PartialEq)]
pub enum WidgetPayload {
    Clock(ClockData),
    Weather(WeatherData),
    Rss(RssData),
    Docker(DockerData),
    SystemStatus(SystemStatusData),
    Iframe(IframeData),
    Memo(MemoData),
    Todo(TodoData),
    Countdown(CountdownData),
    Unknown { kind: String, data: Value },
}

macro_rules! decode_variant {
    ($variant:ident, $kind:expr, $data:expr) => {
        match serde_json::from_value($data.clone()) {
            Ok(payload) => WidgetPayload::$variant(payload),
            Err(e) => {
                tracing::debug!(kind = %$kind, error = %e, "Widget payload kept as opaque data");
                WidgetPayload::Unknown {
                    kind: $kind.to_string(),
                    data: $data,
                }
            }
        }
    };
}

impl WidgetPayload {
    /// Build a payload from its wire parts
    pub fn decode(kind: &str, data: Value) -> Self {
        let data = if data.is_null() {
            Value::Object(Map::new())
        } else {
            data
        };

        match WidgetKind::parse(kind) {
            Some(WidgetKind::Clock) => decode_variant!(Clock, kind, data),
            Some(WidgetKind::Weather) => decode_variant!(Weather, kind, data),
            Some(WidgetKind::Rss) => decode_variant!(Rss, kind, data),
            Some(WidgetKind::Docker) => decode_variant!(Docker, kind, data),
            Some(WidgetKind::SystemStatus) => decode_variant!(SystemStatus, kind, data),
            Some(WidgetKind::Iframe) => decode_variant!(Iframe, kind, data),
            Some(WidgetKind::Memo) => decode_variant!(Memo, kind, data),
            Some(WidgetKind::Todo) => decode_variant!(Todo, kind, data),
            Some(WidgetKind::Countdown) => decode_variant!(Countdown, kind, data),
            None => WidgetPayload::Unknown {
                kind: kind.to_string(),
                data,
            },
        }
    }

    /// Wire data of the payload
    pub fn encode(&self) -> Value {
        let encoded = match self {
            WidgetPayload::Clock(d) => serde_json::to_value(d),
            WidgetPayload::Weather(d) => serde_json::to_value(d),
            WidgetPayload::Rss(d) => serde_json::to_value(d),
            WidgetPayload::Docker(d) => serde_json::to_value(d),
            WidgetPayload::SystemStatus(d) => serde_json::to_value(d),
            WidgetPayload::Iframe(d) => serde_json::to_value(d),
            WidgetPayload::Memo(d) => serde_json::to_value(d),
            WidgetPayload::Todo(d) => serde_json::to_value(d),
            WidgetPayload::Countdown(d) => serde_json::to_value(d),
            WidgetPayload::Unknown { data, .. } => return data.clone(),
        };
        // Schemas are plain structs over JSON values, so this cannot fail
        encoded.unwrap_or(Value::Null)
    }

    /// Default payload for a known kind
    pub fn empty(kind: WidgetKind) -> Self {
        Self::decode(kind.as_str(), Value::Null)
    }

    /// The `type` tag on the wire
    pub fn kind_name(&self) -> &str {
        match self {
            WidgetPayload::Clock(_) => WidgetKind::Clock.as_str(),
            WidgetPayload::Weather(_) => WidgetKind::Weather.as_str(),
            WidgetPayload::Rss(_) => WidgetKind::Rss.as_str(),
            WidgetPayload::Docker(_) => WidgetKind::Docker.as_str(),
            WidgetPayload::SystemStatus(_) => WidgetKind::SystemStatus.as_str(),
            WidgetPayload::Iframe(_) => WidgetKind::Iframe.as_str(),
            WidgetPayload::Memo(_) => WidgetKind::Memo.as_str(),
            WidgetPayload::Todo(_) => WidgetKind::Todo.as_str(),
            WidgetPayload::Countdown(_) => WidgetKind::Countdown.as_str(),
            WidgetPayload::Unknown { kind, .. } => kind,
        }
    }

    /// Kind from the vocabulary, also for payloads kept opaque
    pub fn kind(&self) -> Option<WidgetKind> {
        WidgetKind::parse(self.kind_name())
    }

    /// Number of populated top-level fields, used to pick the most complete
    /// instance when merging duplicates
    pub fn completeness(&self) -> usize {
        match self.encode() {
            Value::Object(map) => map.values().filter(|v| is_populated(v)).count(),
            other if is_populated(&other) => 1,
            _ => 0,
        }
    }
}

fn is_populated(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        _ => true,
    }
}

// ============================================
// Widget envelope
// ============================================

/// A dashboard widget
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawWidget", into = "RawWidget")]
pub struct Widget {
    pub id: String,
    pub x: Option<u32>,
    pub y: Option<u32>,
    pub w: Option<u32>,
    pub h: Option<u32>,
    pub enable: bool,
    pub is_public: bool,
    pub hide_on_mobile: bool,
    pub payload: WidgetPayload,
}

impl Widget {
    /// Create an enabled, unplaced widget
    pub fn new(id: impl Into<String>, payload: WidgetPayload) -> Self {
        Self {
            id: id.into(),
            x: None,
            y: None,
            w: None,
            h: None,
            enable: true,
            is_public: false,
            hide_on_mobile: false,
            payload,
        }
    }

    /// Set the size
    pub fn size(mut self, w: u32, h: u32) -> Self {
        self.w = Some(w);
        self.h = Some(h);
        self
    }

    /// Set the stored grid origin
    pub fn at(mut self, x: u32, y: u32) -> Self {
        self.x = Some(x);
        self.y = Some(y);
        self
    }

    pub fn kind_name(&self) -> &str {
        self.payload.kind_name()
    }

    pub fn kind(&self) -> Option<WidgetKind> {
        self.payload.kind()
    }

    /// Width in grid cells, 1 when unset
    pub fn width(&self) -> u32 {
        self.w.unwrap_or(1).max(1)
    }

    /// Height in grid cells, 1 when unset
    pub fn height(&self) -> u32 {
        self.h.unwrap_or(1).max(1)
    }
}

/// Wire shape of a widget, accepting both historical geometry shapes
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawWidget {
    #[serde(default)]
    id: String,
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default, deserialize_with = "lenient_cell", skip_serializing_if = "Option::is_none")]
    x: Option<u32>,
    #[serde(default, deserialize_with = "lenient_cell", skip_serializing_if = "Option::is_none")]
    y: Option<u32>,
    #[serde(default, deserialize_with = "lenient_cell", skip_serializing_if = "Option::is_none")]
    w: Option<u32>,
    #[serde(default, deserialize_with = "lenient_cell", skip_serializing_if = "Option::is_none")]
    h: Option<u32>,
    #[serde(default, deserialize_with = "lenient_cell", skip_serializing)]
    col_span: Option<u32>,
    #[serde(default, deserialize_with = "lenient_cell", skip_serializing)]
    row_span: Option<u32>,
    #[serde(default = "default_enable")]
    enable: bool,
    #[serde(default)]
    is_public: bool,
    #[serde(default)]
    hide_on_mobile: bool,
    #[serde(default)]
    data: Value,
}

fn default_enable() -> bool {
    true
}

/// Grid cells arrive as integers, floats, or null from older clients
fn lenient_cell<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<f64>::deserialize(deserializer)?;
    Ok(value
        .filter(|v| v.is_finite() && *v >= 0.0 && *v <= u32::MAX as f64)
        .map(|v| v.round() as u32))
}

impl From<RawWidget> for Widget {
    fn from(raw: RawWidget) -> Self {
        Self {
            payload: WidgetPayload::decode(&raw.kind, raw.data),
            id: raw.id,
            x: raw.x,
            y: raw.y,
            w: raw.w.or(raw.col_span),
            h: raw.h.or(raw.row_span),
            enable: raw.enable,
            is_public: raw.is_public,
            hide_on_mobile: raw.hide_on_mobile,
        }
    }
}

impl From<Widget> for RawWidget {
    fn from(widget: Widget) -> Self {
        Self {
            kind: widget.payload.kind_name().to_string(),
            data: widget.payload.encode(),
            id: widget.id,
            x: widget.x,
            y: widget.y,
            w: widget.w,
            h: widget.h,
            col_span: None,
            row_span: None,
            enable: widget.enable,
            is_public: widget.is_public,
            hide_on_mobile: widget.hide_on_mobile,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kind_vocabulary() {
        for kind in WidgetKind::ALL {
            assert_eq!(WidgetKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(WidgetKind::parse("bookmarks"), None);
        assert!(WidgetKind::Docker.is_singleton());
        assert!(!WidgetKind::Clock.is_singleton());
    }

    #[test]
    fn test_decode_legacy_spans() {
        let widget: Widget = serde_json::from_value(json!({
            "id": "a",
            "type": "clock",
            "colSpan": 2,
            "rowSpan": 3,
        }))
        .unwrap();

        assert_eq!(widget.w, Some(2));
        assert_eq!(widget.h, Some(3));
        assert!(widget.enable);
        assert!(matches!(widget.payload, WidgetPayload::Clock(_)));
    }

    #[test]
    fn test_explicit_size_wins_over_spans() {
        let widget: Widget = serde_json::from_value(json!({
            "id": "a",
            "type": "memo",
            "w": 1,
            "colSpan": 4,
            "rowSpan": 2,
        }))
        .unwrap();

        assert_eq!(widget.w, Some(1));
        assert_eq!(widget.h, Some(2));
    }

    #[test]
    fn test_encode_emits_canonical_geometry() {
        let widget: Widget = serde_json::from_value(json!({
            "id": "a",
            "type": "memo",
            "colSpan": 2,
            "x": 1.0,
            "y": 0,
        }))
        .unwrap();

        let value = serde_json::to_value(&widget).unwrap();
        assert_eq!(value["w"], json!(2));
        assert_eq!(value["x"], json!(1));
        assert!(value.get("colSpan").is_none());
        assert!(value.get("h").is_none());
        assert_eq!(value["type"], json!("memo"));
    }

    #[test]
    fn test_unknown_kind_preserved() {
        let input = json!({
            "id": "z",
            "type": "stock-ticker",
            "data": {"symbols": ["ACME"]},
            "enable": false,
        });
        let widget: Widget = serde_json::from_value(input.clone()).unwrap();
        assert_eq!(widget.kind_name(), "stock-ticker");
        assert_eq!(widget.kind(), None);

        let output = serde_json::to_value(&widget).unwrap();
        assert_eq!(output["data"], input["data"]);
        assert_eq!(output["enable"], json!(false));
    }

    #[test]
    fn test_mismatched_payload_kept_opaque() {
        let widget: Widget = serde_json::from_value(json!({
            "id": "t",
            "type": "todo",
            "data": {"items": "not-a-list"},
        }))
        .unwrap();

        assert!(matches!(widget.payload, WidgetPayload::Unknown { .. }));
        assert_eq!(widget.kind(), Some(WidgetKind::Todo));
    }

    #[test]
    fn test_unknown_payload_fields_survive() {
        let widget: Widget = serde_json::from_value(json!({
            "id": "w",
            "type": "weather",
            "data": {"city": "Oslo", "provider": "met"},
        }))
        .unwrap();

        let value = serde_json::to_value(&widget).unwrap();
        assert_eq!(value["data"]["city"], json!("Oslo"));
        assert_eq!(value["data"]["provider"], json!("met"));
    }

    #[test]
    fn test_completeness() {
        let sparse = WidgetPayload::decode("docker", json!({"endpoint": ""}));
        let full = WidgetPayload::decode(
            "docker",
            json!({"endpoint": "unix:///var/run/docker.sock", "containers": ["web"]}),
        );
        assert_eq!(sparse.completeness(), 0);
        assert_eq!(full.completeness(), 2);
    }

    #[test]
    fn test_negative_coordinates_need_placement() {
        let widget: Widget = serde_json::from_value(json!({
            "id": "n",
            "type": "clock",
            "x": -1,
            "y": 2,
        }))
        .unwrap();
        assert_eq!(widget.x, None);
        assert_eq!(widget.y, Some(2));
    }
}
