//! Text renderer: keeps the live visuals in a handle table and draws the map as ASCII.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use merge_core::{
    ButtonMovement, CellCoord, DrawHandle, GeolocationMovement, LatLng, LatLngBounds,
    MovementFacade, OutlineStyle, PositionSource, Renderer, SourceUnavailable, Tiling, Token,
    WatchId,
};
use slotmap::SlotMap;
use tracing::{debug, info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ConsoleVisual {
    Outline { coord: CellCoord, style: OutlineStyle },
    Token { coord: CellCoord, value: Token },
}

#[derive(Default)]
pub struct ConsoleRenderer {
    visuals: SlotMap<DrawHandle, ConsoleVisual>,
    player: Option<LatLng>,
    range: Option<(LatLng, f64)>,
    center: Option<LatLng>,
    status: String,
}

impl ConsoleRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn live_visuals(&self) -> usize {
        self.visuals.len()
    }

    pub fn player_marker(&self) -> Option<LatLng> {
        self.player
    }

    pub fn range_radius_meters(&self) -> Option<f64> {
        self.range.map(|(_, radius)| radius)
    }

    /// ASCII map of the drawn cells within `radius` of `center`, north up.
    ///
    /// `@` marks the player's cell, digits are token values (`*` above 9),
    /// `.` an empty drawn cell, and a blank one that is not drawn.
    pub fn ascii_map(&self, center: CellCoord, radius: i32) -> String {
        let mut outlines = BTreeMap::new();
        let mut tokens = BTreeMap::new();
        for visual in self.visuals.values() {
            match *visual {
                ConsoleVisual::Outline { coord, style } => {
                    outlines.insert(coord, style);
                }
                ConsoleVisual::Token { coord, value } => {
                    tokens.insert(coord, value);
                }
            }
        }

        let mut out = String::new();
        for j in (center.j.saturating_sub(radius)..=center.j.saturating_add(radius)).rev() {
            for i in center.i.saturating_sub(radius)..=center.i.saturating_add(radius) {
                let coord = CellCoord::new(i, j);
                let glyph = if coord == center {
                    '@'
                } else if let Some(token) = tokens.get(&coord) {
                    token_glyph(*token)
                } else if outlines.contains_key(&coord) {
                    '.'
                } else {
                    ' '
                };
                out.push(glyph);
            }
            out.push('\n');
        }
        out
    }

    pub fn describe_view(&self) -> String {
        let mut out = String::new();
        let _ = write!(out, "{} visuals", self.visuals.len());
        if let Some(center) = self.center {
            let _ = write!(out, ", centered on {:.6},{:.6}", center.lat, center.lng);
        }
        out
    }
}

fn token_glyph(token: Token) -> char {
    match token.value() {
        value @ 1..=9 => char::from_digit(value, 10).unwrap_or('*'),
        _ => '*',
    }
}

impl Renderer for ConsoleRenderer {
    fn draw_cell_outline(
        &mut self,
        coord: CellCoord,
        _bounds: LatLngBounds,
        style: OutlineStyle,
    ) -> DrawHandle {
        self.visuals.insert(ConsoleVisual::Outline { coord, style })
    }

    fn restyle_outline(&mut self, handle: DrawHandle, style: OutlineStyle) {
        match self.visuals.get_mut(handle) {
            Some(ConsoleVisual::Outline { style: current, .. }) => *current = style,
            Some(ConsoleVisual::Token { coord, .. }) => {
                warn!(%coord, "restyle_on_token_handle");
            }
            None => warn!("restyle_on_stale_handle"),
        }
    }

    fn draw_token(&mut self, coord: CellCoord, _center: LatLng, value: Token) -> DrawHandle {
        debug!(%coord, value = value.value(), "token_drawn");
        self.visuals.insert(ConsoleVisual::Token { coord, value })
    }

    fn remove_handle(&mut self, handle: DrawHandle) {
        if self.visuals.remove(handle).is_none() {
            warn!("remove_on_stale_handle");
        }
    }

    fn set_player_marker(&mut self, position: LatLng) {
        self.player = Some(position);
    }

    fn set_range_indicator(&mut self, center: LatLng, radius_meters: f64) {
        self.range = Some((center, radius_meters));
    }

    fn pan_to(&mut self, position: LatLng) {
        self.center = Some(position);
    }

    fn set_status(&mut self, text: &str) {
        if self.status != text {
            debug!(status = text, "status_changed");
            self.status = text.to_string();
        }
    }
}

/// Position fixes typed at the console as `pos LAT LNG`. The watch only gates
/// whether those lines move the player.
#[derive(Debug, Default)]
pub struct ConsolePositionSource {
    next_watch: u64,
    watching: Option<WatchId>,
}

impl PositionSource for ConsolePositionSource {
    fn watch(&mut self) -> Result<WatchId, SourceUnavailable> {
        self.next_watch += 1;
        let id = WatchId(self.next_watch);
        self.watching = Some(id);
        info!(watch = id.0, "console_position_watch_started");
        Ok(id)
    }

    fn clear_watch(&mut self, id: WatchId) {
        if self.watching == Some(id) {
            self.watching = None;
            info!(watch = id.0, "console_position_watch_cleared");
        }
    }
}

/// Buttons plus console-fed geolocation.
pub fn console_movement(tiling: Tiling) -> MovementFacade {
    let mut movement = MovementFacade::new();
    movement.register(ButtonMovement::new());
    movement.register(GeolocationMovement::new(tiling, Box::new(ConsolePositionSource::default())));
    movement
}
