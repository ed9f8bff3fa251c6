//! The render boundary. The core only issues commands; pixels belong to the host.

use std::mem;

use slotmap::{SlotMap, new_key_type};

use crate::grid::{LatLng, LatLngBounds};
use crate::types::{CellCoord, Token};

new_key_type! {
    /// Opaque handle to one drawn visual, returned by the renderer.
    pub struct DrawHandle;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OutlineStyle {
    Occupied,
    Empty,
}

impl OutlineStyle {
    pub fn for_cell(has_token: bool) -> Self {
        if has_token { Self::Occupied } else { Self::Empty }
    }

    pub fn color(self) -> &'static str {
        match self {
            Self::Occupied => "lightgreen",
            Self::Empty => "gray",
        }
    }

    pub fn fill_opacity(self) -> f32 {
        match self {
            Self::Occupied => 0.3,
            Self::Empty => 0.05,
        }
    }
}

pub trait Renderer {
    fn draw_cell_outline(
        &mut self,
        coord: CellCoord,
        bounds: LatLngBounds,
        style: OutlineStyle,
    ) -> DrawHandle;
    fn restyle_outline(&mut self, handle: DrawHandle, style: OutlineStyle);
    fn draw_token(&mut self, coord: CellCoord, center: LatLng, value: Token) -> DrawHandle;
    fn remove_handle(&mut self, handle: DrawHandle);
    fn set_player_marker(&mut self, position: LatLng);
    fn set_range_indicator(&mut self, center: LatLng, radius_meters: f64);
    fn pan_to(&mut self, position: LatLng);
    fn set_status(&mut self, text: &str);
}

/// What a live handle currently shows.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Visual {
    Outline { coord: CellCoord, style: OutlineStyle },
    Token { coord: CellCoord, value: Token },
}

#[derive(Clone, Debug, PartialEq)]
pub enum RenderCommand {
    DrawOutline { coord: CellCoord, style: OutlineStyle },
    Restyle { coord: CellCoord, style: OutlineStyle },
    DrawToken { coord: CellCoord, value: Token },
    Remove { visual: Visual },
    PlayerMarker(LatLng),
    RangeIndicator { center: LatLng, radius_meters: f64 },
    PanTo(LatLng),
    Status(String),
}

/// Headless renderer that keeps a handle table and a log of every command.
#[derive(Default)]
pub struct RecordingRenderer {
    visuals: SlotMap<DrawHandle, Visual>,
    commands: Vec<RenderCommand>,
    player_marker: Option<LatLng>,
    view_center: Option<LatLng>,
    status: String,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> &[RenderCommand] {
        &self.commands
    }

    pub fn take_commands(&mut self) -> Vec<RenderCommand> {
        mem::take(&mut self.commands)
    }

    pub fn live_visuals(&self) -> usize {
        self.visuals.len()
    }

    pub fn outline_style(&self, coord: CellCoord) -> Option<OutlineStyle> {
        self.visuals.values().find_map(|visual| match *visual {
            Visual::Outline { coord: at, style } if at == coord => Some(style),
            _ => None,
        })
    }

    pub fn token_at(&self, coord: CellCoord) -> Option<Token> {
        self.visuals.values().find_map(|visual| match *visual {
            Visual::Token { coord: at, value } if at == coord => Some(value),
            _ => None,
        })
    }

    pub fn token_count(&self) -> usize {
        self.visuals.values().filter(|visual| matches!(visual, Visual::Token { .. })).count()
    }

    pub fn player_marker(&self) -> Option<LatLng> {
        self.player_marker
    }

    pub fn view_center(&self) -> Option<LatLng> {
        self.view_center
    }

    pub fn status(&self) -> &str {
        &self.status
    }
}

impl Renderer for RecordingRenderer {
    fn draw_cell_outline(
        &mut self,
        coord: CellCoord,
        _bounds: LatLngBounds,
        style: OutlineStyle,
    ) -> DrawHandle {
        self.commands.push(RenderCommand::DrawOutline { coord, style });
        self.visuals.insert(Visual::Outline { coord, style })
    }

    fn restyle_outline(&mut self, handle: DrawHandle, style: OutlineStyle) {
        if let Some(Visual::Outline { coord, style: current }) = self.visuals.get_mut(handle) {
            *current = style;
            self.commands.push(RenderCommand::Restyle { coord: *coord, style });
        }
    }

    fn draw_token(&mut self, coord: CellCoord, _center: LatLng, value: Token) -> DrawHandle {
        self.commands.push(RenderCommand::DrawToken { coord, value });
        self.visuals.insert(Visual::Token { coord, value })
    }

    fn remove_handle(&mut self, handle: DrawHandle) {
        if let Some(visual) = self.visuals.remove(handle) {
            self.commands.push(RenderCommand::Remove { visual });
        }
    }

    fn set_player_marker(&mut self, position: LatLng) {
        self.player_marker = Some(position);
        self.commands.push(RenderCommand::PlayerMarker(position));
    }

    fn set_range_indicator(&mut self, center: LatLng, radius_meters: f64) {
        self.commands.push(RenderCommand::RangeIndicator { center, radius_meters });
    }

    fn pan_to(&mut self, position: LatLng) {
        self.view_center = Some(position);
        self.commands.push(RenderCommand::PanTo(position));
    }

    fn set_status(&mut self, text: &str) {
        self.status = text.to_string();
        self.commands.push(RenderCommand::Status(text.to_string()));
    }
}
