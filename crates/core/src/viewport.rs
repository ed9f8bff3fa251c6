//! Lazy materialization of the cells around the visible map region.
//!
//! The viewport owns only transient draw handles. Cell data always comes from
//! the `CellStore`; an evicted cell keeps its store entry and is redrawn from
//! it when it scrolls back into view.

use std::collections::{BTreeMap, BTreeSet};
use std::mem;

use thiserror::Error;
use tracing::{debug, warn};

use crate::grid::{LatLngBounds, Tiling};
use crate::render::{DrawHandle, OutlineStyle, Renderer};
use crate::state::CellStore;
use crate::types::{CellCoord, CellState, Token};

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum View {
    /// Visible map region reported by the host, widened by the margin.
    Bounds(LatLngBounds),
    /// Fixed square of Chebyshev `radius` around `center`.
    Around { center: CellCoord, radius: u32 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderedCell {
    pub coord: CellCoord,
    pub outline: DrawHandle,
    pub token: Option<DrawHandle>,
    /// Token value at the last draw, if a token is shown.
    pub drawn_value: Option<Token>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ViewportDiff {
    pub created: Vec<CellCoord>,
    pub evicted: Vec<CellCoord>,
}

impl ViewportDiff {
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.evicted.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("view needs {cells} cells, more than the limit of {limit}")]
pub struct ViewTooLarge {
    pub cells: u64,
    pub limit: usize,
}

/// Inclusive cell rectangle, kept in `i64` so extreme views cannot overflow.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct CellRect {
    min_i: i64,
    max_i: i64,
    min_j: i64,
    max_j: i64,
}

impl CellRect {
    fn cell_count(&self) -> u64 {
        let width = (self.max_i - self.min_i + 1).max(0) as u64;
        let height = (self.max_j - self.min_j + 1).max(0) as u64;
        width.saturating_mul(height)
    }

    fn cells(&self) -> BTreeSet<CellCoord> {
        let clamp = |value: i64| value.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32;
        let (min_i, max_i) = (clamp(self.min_i), clamp(self.max_i));
        let (min_j, max_j) = (clamp(self.min_j), clamp(self.max_j));
        (min_i..=max_i).flat_map(|i| (min_j..=max_j).map(move |j| CellCoord { i, j })).collect()
    }
}

pub struct Viewport {
    tiling: Tiling,
    margin: u32,
    max_cells: usize,
    rendered: BTreeMap<CellCoord, RenderedCell>,
}

impl Viewport {
    pub fn new(tiling: Tiling, margin: u32, max_cells: usize) -> Self {
        Self { tiling, margin, max_cells, rendered: BTreeMap::new() }
    }

    fn rect(&self, view: &View) -> CellRect {
        match *view {
            View::Bounds(bounds) => {
                let min = self.tiling.cell_at(bounds.south_west);
                let max = self.tiling.cell_at(bounds.north_east);
                let margin = i64::from(self.margin);
                CellRect {
                    min_i: i64::from(min.i) - margin,
                    max_i: i64::from(max.i) + margin,
                    min_j: i64::from(min.j) - margin,
                    max_j: i64::from(max.j) + margin,
                }
            }
            View::Around { center, radius } => {
                let radius = i64::from(radius);
                CellRect {
                    min_i: i64::from(center.i) - radius,
                    max_i: i64::from(center.i) + radius,
                    min_j: i64::from(center.j) - radius,
                    max_j: i64::from(center.j) + radius,
                }
            }
        }
    }

    /// Exact set of coordinates that must be materialized for `view`.
    pub fn needed_cells(&self, view: &View) -> Result<BTreeSet<CellCoord>, ViewTooLarge> {
        let rect = self.rect(view);
        let cells = rect.cell_count();
        if cells > self.max_cells as u64 {
            return Err(ViewTooLarge { cells, limit: self.max_cells });
        }
        Ok(rect.cells())
    }

    /// Bring the rendered set in line with `view`: draw what is missing, remove
    /// what is no longer needed. A second call with the same view does nothing.
    pub fn recompute<R: Renderer>(
        &mut self,
        view: &View,
        store: &mut CellStore,
        renderer: &mut R,
    ) -> Result<ViewportDiff, ViewTooLarge> {
        let needed = match self.needed_cells(view) {
            Ok(needed) => needed,
            Err(err) => {
                warn!(error = %err, "viewport_recompute_refused");
                return Err(err);
            }
        };

        let mut diff = ViewportDiff::default();
        for &coord in &needed {
            if self.rendered.contains_key(&coord) {
                continue;
            }
            let state = store.get_or_create(coord);
            let rendered = self.draw_cell(coord, state, renderer);
            self.rendered.insert(coord, rendered);
            diff.created.push(coord);
        }

        let stale: Vec<CellCoord> =
            self.rendered.keys().filter(|coord| !needed.contains(coord)).copied().collect();
        for coord in stale {
            if let Some(rendered) = self.rendered.remove(&coord) {
                erase(rendered, renderer);
                diff.evicted.push(coord);
            }
        }

        if !diff.is_empty() {
            debug!(
                created = diff.created.len(),
                evicted = diff.evicted.len(),
                rendered = self.rendered.len(),
                "viewport_recomputed"
            );
        }
        Ok(diff)
    }

    /// Redraw one cell after its state changed. Cells outside the view are ignored.
    pub fn refresh_cell<R: Renderer>(
        &mut self,
        coord: CellCoord,
        state: CellState,
        renderer: &mut R,
    ) {
        let Some(rendered) = self.rendered.get_mut(&coord) else {
            return;
        };
        renderer.restyle_outline(rendered.outline, OutlineStyle::for_cell(state.has_token));

        let wanted = state.token();
        if rendered.drawn_value == wanted {
            return;
        }
        if let Some(handle) = rendered.token.take() {
            renderer.remove_handle(handle);
        }
        rendered.token = wanted
            .map(|value| renderer.draw_token(coord, self.tiling.cell_center(coord), value));
        rendered.drawn_value = wanted;
    }

    /// Remove every visual, leaving the store untouched.
    pub fn clear<R: Renderer>(&mut self, renderer: &mut R) {
        for (_, rendered) in mem::take(&mut self.rendered) {
            erase(rendered, renderer);
        }
    }

    pub fn is_rendered(&self, coord: CellCoord) -> bool {
        self.rendered.contains_key(&coord)
    }

    pub fn rendered(&self) -> impl Iterator<Item = &RenderedCell> {
        self.rendered.values()
    }

    pub fn rendered_coords(&self) -> BTreeSet<CellCoord> {
        self.rendered.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.rendered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rendered.is_empty()
    }

    fn draw_cell<R: Renderer>(
        &self,
        coord: CellCoord,
        state: CellState,
        renderer: &mut R,
    ) -> RenderedCell {
        let outline = renderer.draw_cell_outline(
            coord,
            self.tiling.cell_bounds(coord),
            OutlineStyle::for_cell(state.has_token),
        );
        let drawn_value = state.token();
        let center = self.tiling.cell_center(coord);
        let token = drawn_value.map(|value| renderer.draw_token(coord, center, value));
        RenderedCell { coord, outline, token, drawn_value }
    }
}

fn erase<R: Renderer>(rendered: RenderedCell, renderer: &mut R) {
    renderer.remove_handle(rendered.outline);
    if let Some(token) = rendered.token {
        renderer.remove_handle(token);
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::grid::LatLng;
    use crate::luck::CellGenerator;
    use crate::render::RecordingRenderer;

    fn unit_viewport() -> Viewport {
        Viewport::new(Tiling::new(1.0), 1, 10_000)
    }

    fn bounds(sw: (f64, f64), ne: (f64, f64)) -> View {
        View::Bounds(LatLngBounds::new(LatLng::new(sw.0, sw.1), LatLng::new(ne.0, ne.1)))
    }

    #[test]
    fn bounds_are_widened_by_the_margin() {
        let viewport = unit_viewport();
        let needed = viewport.needed_cells(&bounds((0.5, 0.5), (1.5, 2.5))).unwrap();
        // cells i in 0..=2, j in 0..=1, plus one cell on every side
        assert_eq!(needed.len(), 5 * 4);
        assert!(needed.contains(&CellCoord::new(-1, -1)));
        assert!(needed.contains(&CellCoord::new(3, 2)));
        assert!(!needed.contains(&CellCoord::new(4, 2)));
    }

    #[test]
    fn fixed_radius_view_is_a_square() {
        let viewport = unit_viewport();
        let view = View::Around { center: CellCoord::new(5, 5), radius: 2 };
        let needed = viewport.needed_cells(&view).unwrap();
        assert_eq!(needed.len(), 25);
        assert!(needed.iter().all(|coord| coord.chebyshev(CellCoord::new(5, 5)) <= 2));
    }

    #[test]
    fn recompute_is_idempotent_and_exact() {
        let mut viewport = unit_viewport();
        let mut store = CellStore::new(CellGenerator::default());
        let mut renderer = RecordingRenderer::new();
        let view = View::Around { center: CellCoord::ORIGIN, radius: 3 };

        let first = viewport.recompute(&view, &mut store, &mut renderer).unwrap();
        assert_eq!(first.created.len(), 49);
        assert!(first.evicted.is_empty());
        assert_eq!(viewport.rendered_coords(), viewport.needed_cells(&view).unwrap());

        let second = viewport.recompute(&view, &mut store, &mut renderer).unwrap();
        assert!(second.is_empty());
    }

    #[test]
    fn evicted_cells_keep_their_store_entries() {
        let mut viewport = unit_viewport();
        let mut store = CellStore::new(CellGenerator::default());
        let mut renderer = RecordingRenderer::new();

        viewport
            .recompute(
                &View::Around { center: CellCoord::ORIGIN, radius: 1 },
                &mut store,
                &mut renderer,
            )
            .unwrap();
        let diff = viewport
            .recompute(
                &View::Around { center: CellCoord::new(10, 0), radius: 1 },
                &mut store,
                &mut renderer,
            )
            .unwrap();

        assert_eq!(diff.evicted.len(), 9);
        assert_eq!(diff.created.len(), 9);
        assert_eq!(store.len(), 18);
        assert!(store.contains(CellCoord::ORIGIN));
        assert!(!viewport.is_rendered(CellCoord::ORIGIN));
        let expected_visuals: usize =
            viewport.rendered().map(|cell| 1 + usize::from(cell.token.is_some())).sum();
        assert_eq!(renderer.live_visuals(), expected_visuals);
    }

    #[test]
    fn re_entry_redraws_from_the_store_without_rerolling() {
        let mut viewport = unit_viewport();
        let mut store = CellStore::new(CellGenerator::default());
        let mut renderer = RecordingRenderer::new();
        let home = View::Around { center: CellCoord::ORIGIN, radius: 0 };

        viewport.recompute(&home, &mut store, &mut renderer).unwrap();
        let changed = CellState { has_token: true, value: 32 };
        store.set(CellCoord::ORIGIN, changed).unwrap();

        viewport
            .recompute(
                &View::Around { center: CellCoord::new(50, 50), radius: 0 },
                &mut store,
                &mut renderer,
            )
            .unwrap();
        viewport.recompute(&home, &mut store, &mut renderer).unwrap();

        assert_eq!(renderer.token_at(CellCoord::ORIGIN), Token::new(32));
        assert_eq!(store.get(CellCoord::ORIGIN), Some(changed));
    }

    #[test]
    fn refresh_cell_swaps_the_token_visual() {
        let mut viewport = unit_viewport();
        let mut store = CellStore::new(CellGenerator::new(0, 1.0, Vec::new(), Token::ONE));
        let mut renderer = RecordingRenderer::new();
        viewport
            .recompute(
                &View::Around { center: CellCoord::ORIGIN, radius: 0 },
                &mut store,
                &mut renderer,
            )
            .unwrap();
        assert_eq!(renderer.token_at(CellCoord::ORIGIN), Some(Token::ONE));

        let emptied = CellState { has_token: false, value: 1 };
        viewport.refresh_cell(CellCoord::ORIGIN, emptied, &mut renderer);
        assert_eq!(renderer.token_at(CellCoord::ORIGIN), None);
        assert_eq!(renderer.outline_style(CellCoord::ORIGIN), Some(OutlineStyle::Empty));

        let refilled = CellState { has_token: true, value: 4 };
        viewport.refresh_cell(CellCoord::ORIGIN, refilled, &mut renderer);
        assert_eq!(renderer.token_at(CellCoord::ORIGIN), Token::new(4));
        assert_eq!(renderer.live_visuals(), 2);
    }

    #[test]
    fn oversized_views_are_refused_without_side_effects() {
        let mut viewport = Viewport::new(Tiling::new(1.0), 0, 100);
        let mut store = CellStore::new(CellGenerator::default());
        let mut renderer = RecordingRenderer::new();

        let err = viewport
            .recompute(
                &View::Around { center: CellCoord::ORIGIN, radius: 5 },
                &mut store,
                &mut renderer,
            )
            .unwrap_err();
        assert_eq!(err, ViewTooLarge { cells: 121, limit: 100 });
        assert!(viewport.is_empty());
        assert!(store.is_empty());
    }

    #[test]
    fn clear_removes_every_visual() {
        let mut viewport = unit_viewport();
        let mut store = CellStore::new(CellGenerator::default());
        let mut renderer = RecordingRenderer::new();
        viewport
            .recompute(
                &View::Around { center: CellCoord::ORIGIN, radius: 2 },
                &mut store,
                &mut renderer,
            )
            .unwrap();
        viewport.clear(&mut renderer);
        assert!(viewport.is_empty());
        assert_eq!(renderer.live_visuals(), 0);
        assert_eq!(store.len(), 25);
    }

    proptest! {
        #[test]
        fn rendered_set_always_matches_the_needed_set(
            moves in proptest::collection::vec((-20_i32..20, -20_i32..20, 0_u32..4), 1..12)
        ) {
            let mut viewport = unit_viewport();
            let mut store = CellStore::new(CellGenerator::default());
            let mut renderer = RecordingRenderer::new();
            for (i, j, radius) in moves {
                let view = View::Around { center: CellCoord::new(i, j), radius };
                viewport.recompute(&view, &mut store, &mut renderer).unwrap();
                prop_assert_eq!(viewport.rendered_coords(), viewport.needed_cells(&view).unwrap());
                let again = viewport.recompute(&view, &mut store, &mut renderer).unwrap();
                prop_assert!(again.is_empty());
            }
        }
    }
}
