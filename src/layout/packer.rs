//! Grid Packer
//!
//! Deterministic first-fit packing of widgets onto a grid of fixed column
//! count and unbounded height.

use std::collections::{BTreeMap, BTreeSet};

use crate::model::Widget;

/// A rectangle of grid cells
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }

    /// Stored rectangle of a widget, if it has an origin
    pub fn of(widget: &Widget) -> Option<Self> {
        Some(Self::new(widget.x?, widget.y?, widget.width(), widget.height()))
    }

    /// Exclusive right edge, saturating at `u32::MAX`
    pub fn right(&self) -> u32 {
        self.x.saturating_add(self.w)
    }

    /// Exclusive bottom edge, saturating at `u32::MAX`
    pub fn bottom(&self) -> u32 {
        self.y.saturating_add(self.h)
    }

    /// Whether the rectangle lies inside a grid of `columns` without any
    /// edge overflowing
    pub fn fits(&self, columns: u32) -> bool {
        self.x.checked_add(self.w).is_some_and(|right| right <= columns)
            && self.y.checked_add(self.h).is_some()
    }

    pub fn overlaps(&self, other: &Rect) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }
}

/// Claimed cells, kept per column as disjoint `start row -> end row` runs
/// so that far-away or very tall rectangles cost nothing extra
struct Occupancy {
    columns: u32,
    runs: Vec<BTreeMap<u32, u32>>,
    /// Bottom edges of claimed rectangles. Besides row 0 these are the only
    /// rows where a first fit can start.
    edges: BTreeSet<u32>,
}

impl Occupancy {
    fn new(columns: u32) -> Self {
        Self {
            columns,
            runs: vec![BTreeMap::new(); columns as usize],
            edges: BTreeSet::new(),
        }
    }

    fn is_free(&self, rect: &Rect) -> bool {
        if !rect.fits(self.columns) {
            return false;
        }
        let bottom = rect.bottom();
        self.runs[rect.x as usize..rect.right() as usize]
            .iter()
            .all(|runs| match runs.range(..bottom).next_back() {
                Some((_, &end)) => end <= rect.y,
                None => true,
            })
    }

    fn claim(&mut self, rect: &Rect) {
        let bottom = rect.bottom();
        for runs in &mut self.runs[rect.x as usize..rect.right() as usize] {
            runs.insert(rect.y, bottom);
        }
        self.edges.insert(bottom);
    }

    /// First free origin in row-major order for a `w x h` rectangle.
    ///
    /// `h` is cut short where it would run past the last grid row.
    fn first_fit(&self, w: u32, h: u32) -> Rect {
        let rows = std::iter::once(0).chain(self.edges.iter().copied());
        for y in rows {
            let h = h.min(u32::MAX - y);
            for x in 0..=(self.columns - w) {
                let candidate = Rect::new(x, y, w, h);
                if self.is_free(&candidate) {
                    return candidate;
                }
            }
        }

        // Nothing is claimed below the lowest edge
        let y = self.edges.last().copied().unwrap_or(0);
        Rect::new(0, y, w, h.min(u32::MAX - y))
    }
}

/// Assign non-overlapping grid positions to `widgets`.
///
/// Widgets whose stored rectangle fits inside `columns` and does not
/// collide with an earlier widget keep their position; all others are
/// placed at the first free origin, scanning rows top to bottom and
/// columns left to right. The output has the same length and order as the
/// input, and every widget in it has `x`, `y`, `w` and `h` set.
pub fn place(widgets: &[Widget], columns: u32) -> Vec<Widget> {
    let columns = columns.max(1);
    let mut grid = Occupancy::new(columns);
    let mut placed: Vec<Widget> = widgets.to_vec();
    let mut unpositioned = Vec::new();

    for (idx, widget) in widgets.iter().enumerate() {
        match Rect::of(widget) {
            Some(rect) if grid.is_free(&rect) => {
                grid.claim(&rect);
                set_rect(&mut placed[idx], rect);
            }
            Some(rect) => {
                tracing::trace!(id = %widget.id, ?rect, columns, "Widget demoted for re-placement");
                unpositioned.push(idx);
            }
            None => unpositioned.push(idx),
        }
    }

    for idx in unpositioned {
        let widget = &widgets[idx];
        let w = widget.width().min(columns);
        let rect = grid.first_fit(w, widget.height());
        grid.claim(&rect);
        set_rect(&mut placed[idx], rect);
    }

    placed
}

/// Widgets shown on the current device, in their original order
pub fn visible(widgets: &[Widget], mobile: bool) -> Vec<Widget> {
    widgets
        .iter()
        .filter(|w| w.enable && !(mobile && w.hide_on_mobile))
        .cloned()
        .collect()
}

fn set_rect(widget: &mut Widget, rect: Rect) {
    widget.x = Some(rect.x);
    widget.y = Some(rect.y);
    widget.w = Some(rect.w);
    widget.h = Some(rect.h);
}
