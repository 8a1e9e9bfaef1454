use serde::{Deserialize, Serialize};

use crate::grid::Grid;
use crate::grid::cell::{FireState, Weather};

/// Read-only copy of the whole grid at a step boundary, for renderers and export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridSnapshot {
    pub step: u64,
    pub time: f64,
    pub width: u32,
    pub height: u32,
    pub cell_resolution_km: f32,
    pub cells: Vec<CellSnapshot>,
}

/// One cell's position and full state in a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellSnapshot {
    pub x: u32,
    pub y: u32,
    pub is_water: bool,
    pub tree_coverage: f32,
    pub fire: FireState,
    pub fuel: f32,
    pub weather: Weather,
    pub p_ignite: f32,
    pub p_extinguish: f32,
}

impl GridSnapshot {
    pub fn capture(grid: &Grid, step: u64, time: f64) -> Self {
        let cells = grid
            .cells()
            .map(|cell| CellSnapshot {
                x: cell.x,
                y: cell.y,
                is_water: cell.terrain.is_water,
                tree_coverage: cell.terrain.tree_coverage,
                fire: cell.state.fire,
                fuel: cell.state.fuel,
                weather: cell.state.weather,
                p_ignite: cell.state.p_ignite,
                p_extinguish: cell.state.p_extinguish,
            })
            .collect();

        Self {
            step,
            time,
            width: grid.width(),
            height: grid.height(),
            cell_resolution_km: grid.cell_resolution_km(),
            cells,
        }
    }

    pub fn cell(&self, x: u32, y: u32) -> Option<&CellSnapshot> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.cells.get(y as usize * self.width as usize + x as usize)
    }

    /// Fire states as rows of characters, north at the top.
    ///
    /// `~` water, `.` unburnt bare ground, `T` unburnt fuel, `*` burning, `#` burnt.
    pub fn render_ascii(&self) -> String {
        let mut out = String::with_capacity((self.width as usize + 1) * self.height as usize);
        for y in (0..self.height).rev() {
            for x in 0..self.width {
                let glyph = match self.cell(x, y) {
                    Some(c) if c.is_water => '~',
                    Some(c) => match c.fire {
                        FireState::Burning => '*',
                        FireState::Burnt => '#',
                        FireState::Unburnt if c.fuel > 0.0 => 'T',
                        FireState::Unburnt => '.',
                    },
                    None => ' ',
                };
                out.push(glyph);
            }
            out.push('\n');
        }
        out
    }
}
