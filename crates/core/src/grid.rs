//! Geographic coordinates and the floor-division tiling that maps them onto cells.

use serde::{Deserialize, Serialize};

use crate::types::CellCoord;

/// Rough metres per degree, used only to size the interaction-range indicator.
const METERS_PER_DEGREE: f64 = 111_000.0;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Finite and on the globe: `|lat| <= 90`, `|lng| <= 180`.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && self.lat.abs() <= 90.0
            && self.lng.abs() <= 180.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LatLngBounds {
    pub south_west: LatLng,
    pub north_east: LatLng,
}

impl LatLngBounds {
    pub fn new(south_west: LatLng, north_east: LatLng) -> Self {
        Self { south_west, north_east }
    }

    pub fn is_valid(&self) -> bool {
        self.south_west.is_valid() && self.north_east.is_valid()
    }

    pub fn center(&self) -> LatLng {
        LatLng {
            lat: (self.south_west.lat + self.north_east.lat) / 2.0,
            lng: (self.south_west.lng + self.north_east.lng) / 2.0,
        }
    }

    /// Same span, moved so that `center` sits in the middle. This is what a map
    /// pan does to the visible region.
    pub fn recentered(&self, center: LatLng) -> Self {
        let half_lat = (self.north_east.lat - self.south_west.lat) / 2.0;
        let half_lng = (self.north_east.lng - self.south_west.lng) / 2.0;
        Self {
            south_west: LatLng { lat: center.lat - half_lat, lng: center.lng - half_lng },
            north_east: LatLng { lat: center.lat + half_lat, lng: center.lng + half_lng },
        }
    }
}

/// Square tiling of the map, `tile_degrees` on a side.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tiling {
    tile_degrees: f64,
}

impl Tiling {
    pub fn new(tile_degrees: f64) -> Self {
        debug_assert!(tile_degrees > 0.0 && tile_degrees.is_finite());
        Self { tile_degrees }
    }

    pub fn tile_degrees(&self) -> f64 {
        self.tile_degrees
    }

    pub fn cell_at(&self, position: LatLng) -> CellCoord {
        CellCoord {
            i: (position.lng / self.tile_degrees).floor() as i32,
            j: (position.lat / self.tile_degrees).floor() as i32,
        }
    }

    pub fn cell_bounds(&self, cell: CellCoord) -> LatLngBounds {
        let lat = f64::from(cell.j) * self.tile_degrees;
        let lng = f64::from(cell.i) * self.tile_degrees;
        LatLngBounds {
            south_west: LatLng { lat, lng },
            north_east: LatLng { lat: lat + self.tile_degrees, lng: lng + self.tile_degrees },
        }
    }

    pub fn cell_center(&self, cell: CellCoord) -> LatLng {
        self.cell_bounds(cell).center()
    }

    /// Region of `half_width` x `half_height` cells on each side of `cell`'s centre.
    pub fn bounds_around(
        &self,
        cell: CellCoord,
        half_width: u32,
        half_height: u32,
    ) -> LatLngBounds {
        let center = self.cell_center(cell);
        let half_lng = f64::from(half_width) * self.tile_degrees;
        let half_lat = f64::from(half_height) * self.tile_degrees;
        LatLngBounds {
            south_west: LatLng { lat: center.lat - half_lat, lng: center.lng - half_lng },
            north_east: LatLng { lat: center.lat + half_lat, lng: center.lng + half_lng },
        }
    }

    pub fn radius_meters(&self, cells: u32) -> f64 {
        f64::from(cells) * self.tile_degrees * METERS_PER_DEGREE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TILE: f64 = 1e-4;

    #[test]
    fn positions_floor_into_cells() {
        let tiling = Tiling::new(TILE);
        let classroom = LatLng::new(36.997936938057016, -122.05703507501151);
        assert_eq!(tiling.cell_at(classroom), CellCoord::new(-1_220_571, 369_979));
        assert_eq!(tiling.cell_at(LatLng::new(0.00005, 0.00005)), CellCoord::ORIGIN);
        assert_eq!(tiling.cell_at(LatLng::new(-0.00005, -0.00005)), CellCoord::new(-1, -1));
    }

    #[test]
    fn cell_center_maps_back_to_the_same_cell() {
        let tiling = Tiling::new(TILE);
        for cell in
            [CellCoord::new(0, 0), CellCoord::new(-7, 12), CellCoord::new(-1_220_571, 369_979)]
        {
            assert_eq!(tiling.cell_at(tiling.cell_center(cell)), cell);
        }
    }

    #[test]
    fn validity_requires_finite_on_globe_coordinates() {
        assert!(LatLng::new(-90.0, 180.0).is_valid());
        assert!(!LatLng::new(f64::NAN, 0.0).is_valid());
        assert!(!LatLng::new(0.0, 180.1).is_valid());
        let good = LatLngBounds::new(LatLng::new(0.0, 0.0), LatLng::new(1.0, 1.0));
        assert!(good.is_valid());
        let unbounded = LatLng::new(1.0, f64::NEG_INFINITY);
        assert!(!LatLngBounds::new(good.south_west, unbounded).is_valid());
    }

    #[test]
    fn recentering_keeps_the_span() {
        let bounds = LatLngBounds::new(LatLng::new(0.0, 0.0), LatLng::new(2.0, 4.0));
        let moved = bounds.recentered(LatLng::new(10.0, 10.0));
        assert_eq!(moved.south_west, LatLng::new(9.0, 8.0));
        assert_eq!(moved.north_east, LatLng::new(11.0, 12.0));
    }

    #[test]
    fn bounds_around_a_cell_cover_the_requested_cells() {
        let tiling = Tiling::new(1.0);
        let bounds = tiling.bounds_around(CellCoord::new(5, 5), 2, 1);
        assert_eq!(tiling.cell_at(bounds.south_west), CellCoord::new(3, 4));
        assert_eq!(tiling.cell_at(bounds.north_east), CellCoord::new(7, 6));
    }
}
