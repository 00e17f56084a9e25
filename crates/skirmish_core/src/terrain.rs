//! Terrain grid: cell classes, overlay tiles and coordinate conversion.
//!
//! The grid is immutable once built except for the optional overlay
//! tile map. Every query is bounds-checked and answers a safe default
//! outside the grid instead of failing.

use serde::{Deserialize, Serialize};

use crate::config::MapLayout;
use crate::error::{GameError, Result};
use crate::math::{Fixed, Vec2Fixed};

/// Terrain class of a single cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TerrainClass {
    /// Open ground.
    Ground,
    /// Impassable river.
    Water,
    /// River crossing.
    Bridge,
}

/// Overlay tile classification loaded from external content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TileClass {
    /// Open terrain (code 0).
    Empty,
    /// Territory marker for team 0 (code 1).
    Team0Territory,
    /// Territory marker for team 1 (code 2).
    Team1Territory,
    /// Map edge or obstacle (code 16, and any unknown code).
    Boundary,
    /// Decorative obstacle (code 32).
    Special,
    /// Territory transition (code 17).
    TransitionA,
    /// Territory transition (code 18).
    TransitionB,
    /// Bridge tile (code 257).
    BridgeA,
    /// Bridge tile (code 258).
    BridgeB,
}

impl TileClass {
    /// Decode a raw tile code. Unknown codes become [`TileClass::Boundary`].
    #[must_use]
    pub const fn from_code(code: i32) -> Self {
        match code {
            0 => Self::Empty,
            1 => Self::Team0Territory,
            2 => Self::Team1Territory,
            17 => Self::TransitionA,
            18 => Self::TransitionB,
            32 => Self::Special,
            257 => Self::BridgeA,
            258 => Self::BridgeB,
            _ => Self::Boundary,
        }
    }

    /// Raw tile code.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::Empty => 0,
            Self::Team0Territory => 1,
            Self::Team1Territory => 2,
            Self::Boundary => 16,
            Self::Special => 32,
            Self::TransitionA => 17,
            Self::TransitionB => 18,
            Self::BridgeA => 257,
            Self::BridgeB => 258,
        }
    }

    /// Whether ground units may stand on this tile.
    #[must_use]
    pub const fn is_walkable(self) -> bool {
        matches!(
            self,
            Self::Empty
                | Self::Team0Territory
                | Self::Team1Territory
                | Self::TransitionA
                | Self::TransitionB
                | Self::BridgeA
                | Self::BridgeB
        )
    }

    /// Whether this is a bridge tile.
    #[must_use]
    pub const fn is_bridge(self) -> bool {
        matches!(self, Self::BridgeA | Self::BridgeB)
    }
}

/// Which side of the water band a position is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WaterSide {
    /// Above the water band.
    Top,
    /// Below the water band.
    Bottom,
    /// Inside the water band (only reachable on a bridge).
    OnBridge,
}

/// Integer cell coordinate. May lie outside the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridCell {
    /// Column.
    pub col: i32,
    /// Row.
    pub row: i32,
}

impl GridCell {
    /// Create a cell coordinate.
    #[must_use]
    pub const fn new(col: i32, row: i32) -> Self {
        Self { col, row }
    }
}

/// The battlefield grid.
#[derive(Debug, Clone)]
pub struct TerrainGrid {
    columns: usize,
    rows: usize,
    cell_width: Fixed,
    cell_height: Fixed,
    /// Terrain classes, row-major.
    terrain: Vec<TerrainClass>,
    /// Optional overlay tiles, row-major.
    overlay: Option<Vec<TileClass>>,
    water_start_row: i32,
    water_end_row: i32,
    bridges: Vec<(i32, i32)>,
}

impl TerrainGrid {
    /// Build the terrain classes for a layout: ground everywhere, water
    /// across the band, bridge cells where a bridge span crosses it.
    #[must_use]
    pub fn from_layout(layout: &MapLayout) -> Self {
        let mut terrain = Vec::with_capacity(layout.columns * layout.rows);
        for row in 0..layout.rows {
            for col in 0..layout.columns {
                let (col, row) = (to_i32(col), to_i32(row));
                let in_band = row >= layout.water_start_row && row <= layout.water_end_row;
                let on_bridge = layout
                    .bridges
                    .iter()
                    .any(|&(start, end)| col >= start && col <= end);
                terrain.push(match (in_band, on_bridge) {
                    (false, _) => TerrainClass::Ground,
                    (true, true) => TerrainClass::Bridge,
                    (true, false) => TerrainClass::Water,
                });
            }
        }

        Self {
            columns: layout.columns,
            rows: layout.rows,
            cell_width: layout.cell_width(),
            cell_height: layout.cell_height(),
            terrain,
            overlay: None,
            water_start_row: layout.water_start_row,
            water_end_row: layout.water_end_row,
            bridges: layout.bridges.clone(),
        }
    }

    /// Number of columns.
    #[must_use]
    pub const fn columns(&self) -> usize {
        self.columns
    }

    /// Number of rows.
    #[must_use]
    pub const fn rows(&self) -> usize {
        self.rows
    }

    /// World width of a cell.
    #[must_use]
    pub const fn cell_width(&self) -> Fixed {
        self.cell_width
    }

    /// World height of a cell.
    #[must_use]
    pub const fn cell_height(&self) -> Fixed {
        self.cell_height
    }

    /// Inclusive water band rows.
    #[must_use]
    pub const fn water_rows(&self) -> (i32, i32) {
        (self.water_start_row, self.water_end_row)
    }

    /// Whether a cell lies inside the grid.
    #[must_use]
    pub fn in_bounds(&self, col: i32, row: i32) -> bool {
        col >= 0 && row >= 0 && (col as usize) < self.columns && (row as usize) < self.rows
    }

    fn index(&self, col: i32, row: i32) -> Option<usize> {
        self.in_bounds(col, row)
            .then(|| row as usize * self.columns + col as usize)
    }

    /// Terrain class of a cell; [`TerrainClass::Ground`] outside the grid.
    #[must_use]
    pub fn cell_at(&self, col: i32, row: i32) -> TerrainClass {
        self.index(col, row)
            .and_then(|i| self.terrain.get(i).copied())
            .unwrap_or(TerrainClass::Ground)
    }

    /// Overlay tile of a cell.
    ///
    /// Without an overlay the tile is derived from the terrain class.
    /// Outside the grid this is [`TileClass::Boundary`].
    #[must_use]
    pub fn tile_at(&self, col: i32, row: i32) -> TileClass {
        let Some(i) = self.index(col, row) else {
            return TileClass::Boundary;
        };
        match &self.overlay {
            Some(tiles) => tiles.get(i).copied().unwrap_or(TileClass::Boundary),
            None => match self.terrain.get(i) {
                Some(TerrainClass::Ground) => TileClass::Empty,
                Some(TerrainClass::Bridge) => TileClass::BridgeA,
                Some(TerrainClass::Water) | None => TileClass::Boundary,
            },
        }
    }

    /// Whether a ground unit may occupy the cell. Always false outside the grid.
    #[must_use]
    pub fn is_walkable(&self, col: i32, row: i32) -> bool {
        self.in_bounds(col, row) && self.tile_at(col, row).is_walkable()
    }

    /// Whether stepping into this cell pays the bridge penalty.
    #[must_use]
    pub fn is_bridge(&self, col: i32, row: i32) -> bool {
        self.in_bounds(col, row) && self.tile_at(col, row).is_bridge()
    }

    /// Replace the overlay with raw tile codes, row-major.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::OverlayDimensions`] when the shape differs
    /// from the grid or the code count does not match the shape.
    pub fn load_overlay(&mut self, codes: &[i32], columns: usize, rows: usize) -> Result<()> {
        if columns != self.columns || rows != self.rows || codes.len() != columns * rows {
            return Err(GameError::OverlayDimensions {
                expected_cols: self.columns,
                expected_rows: self.rows,
                cols: columns,
                rows,
            });
        }
        self.overlay = Some(codes.iter().map(|&c| TileClass::from_code(c)).collect());
        tracing::debug!(columns, rows, "Loaded terrain overlay");
        Ok(())
    }

    /// Drop the overlay and fall back to terrain classes.
    pub fn clear_overlay(&mut self) {
        self.overlay = None;
    }

    /// Whether an overlay is loaded.
    #[must_use]
    pub const fn has_overlay(&self) -> bool {
        self.overlay.is_some()
    }

    /// Cell containing a world position (floor division).
    #[must_use]
    pub fn world_to_cell(&self, pos: Vec2Fixed) -> GridCell {
        GridCell::new(
            (pos.x / self.cell_width).floor().saturating_to_num::<i32>(),
            (pos.y / self.cell_height).floor().saturating_to_num::<i32>(),
        )
    }

    /// World position of a cell's center.
    #[must_use]
    pub fn cell_to_world(&self, col: i32, row: i32) -> Vec2Fixed {
        let half = Fixed::from_num(0.5);
        Vec2Fixed::new(
            (Fixed::from_num(col) + half) * self.cell_width,
            (Fixed::from_num(row) + half) * self.cell_height,
        )
    }

    /// Side of the water band for a row.
    #[must_use]
    pub const fn side_of_row(&self, row: i32) -> WaterSide {
        if row < self.water_start_row {
            WaterSide::Top
        } else if row > self.water_end_row {
            WaterSide::Bottom
        } else {
            WaterSide::OnBridge
        }
    }

    /// Side of the water band for a world position.
    #[must_use]
    pub fn side_of(&self, pos: Vec2Fixed) -> WaterSide {
        self.side_of_row(self.world_to_cell(pos).row)
    }

    /// Whether a ground unit at `from` must detour to a bridge to reach `to`.
    ///
    /// False when either end already lies inside the band.
    #[must_use]
    pub fn needs_bridge(&self, from: Vec2Fixed, to: Vec2Fixed) -> bool {
        match (self.side_of(from), self.side_of(to)) {
            (WaterSide::OnBridge, _) | (_, WaterSide::OnBridge) => false,
            (WaterSide::Top, WaterSide::Top) | (WaterSide::Bottom, WaterSide::Bottom) => false,
            _ => true,
        }
    }

    /// World position of the bridge entry closest to `from` by column.
    ///
    /// Entry points sit two cells into each span on the middle water row.
    /// Ties go to the later bridge. `None` when the layout has no bridges.
    #[must_use]
    pub fn bridge_entry(&self, from: Vec2Fixed) -> Option<Vec2Fixed> {
        let col = self.world_to_cell(from).col;
        let row = (self.water_start_row + self.water_end_row) / 2;

        let mut best: Option<(i32, i32)> = None;
        for &(start, _) in &self.bridges {
            let entry = start + 2;
            let dist = (entry - col).abs();
            if best.map_or(true, |(_, d)| dist <= d) {
                best = Some((entry, dist));
            }
        }
        best.map(|(entry, _)| self.cell_to_world(entry, row))
    }
}

fn to_i32(v: usize) -> i32 {
    i32::try_from(v).unwrap_or(i32::MAX)
}
