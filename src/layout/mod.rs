//! Widget Layout
//!
//! Pure, deterministic packing of dashboard widgets onto a column grid.
//!
//! Stored positions are honored while they still fit the current column
//! count and do not collide; everything else is re-placed first-fit in
//! row-major order. Packing the same input twice yields the same layout,
//! so switching between desktop and mobile column counts never drifts.
//!
//! ## Example
//!
//! ```rust
//! use dashsync::layout::{place, Rect};
//! use dashsync::model::{Widget, WidgetKind, WidgetPayload};
//!
//! let widgets = vec![
//!     Widget::new("a", WidgetPayload::empty(WidgetKind::Clock)).size(2, 1),
//!     Widget::new("b", WidgetPayload::empty(WidgetKind::Memo)).size(2, 1),
//! ];
//!
//! let layout = place(&widgets, 4);
//! assert_eq!(Rect::of(&layout[1]), Some(Rect::new(2, 0, 2, 1)));
//! ```

mod packer;

pub use packer::{place, visible, Rect};
