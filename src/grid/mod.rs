pub mod builder;
pub mod cell;
pub mod generation;
pub mod topology;

use serde::{Deserialize, Serialize};

pub use builder::{BuildError, GridBuilder, TerrainFields, WeatherFields};
pub use cell::{Cell, CellState, FireState, Terrain, Weather};
pub use topology::{Neighbour, Neighbourhood};

use topology::moore_positions;

/// Dense `width x height` arena of cells, indexed by `y * width + x`.
///
/// Terrain is immutable after construction. Cell state lives in two buffers:
/// `live` is what readers see, `staged` receives the next step during the
/// compute phase and is swapped in at commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Grid {
    width: u32,
    height: u32,
    cell_resolution_km: f32,
    terrain: Vec<Terrain>,
    live: Vec<CellState>,
    #[serde(skip)]
    staged: Vec<CellState>,
}

impl PartialEq for Grid {
    fn eq(&self, other: &Self) -> bool {
        self.width == other.width
            && self.height == other.height
            && self.cell_resolution_km == other.cell_resolution_km
            && self.terrain == other.terrain
            && self.live == other.live
    }
}

impl Grid {
    pub(crate) fn from_parts(
        width: u32,
        height: u32,
        cell_resolution_km: f32,
        terrain: Vec<Terrain>,
        live: Vec<CellState>,
    ) -> Self {
        debug_assert_eq!(terrain.len(), width as usize * height as usize);
        debug_assert_eq!(live.len(), terrain.len());
        let staged = live.clone();
        Self {
            width,
            height,
            cell_resolution_km,
            terrain,
            live,
            staged,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Side length of a cell in kilometres.
    pub fn cell_resolution_km(&self) -> f32 {
        self.cell_resolution_km
    }

    /// Arena length matches the declared shape and every cell honours the
    /// fire invariants. False only for corrupt deserialized data.
    pub fn is_consistent(&self) -> bool {
        let expected = self.width as usize * self.height as usize;
        expected > 0
            && self.terrain.len() == expected
            && self.live.len() == expected
            && self.first_invalid_cell().is_none()
    }

    /// Position of the first cell whose state is impossible for its terrain:
    /// non-finite values, negative fuel, water that is not unburnt and empty,
    /// a burning cell without fuel or a burnt cell with fuel left.
    pub fn first_invalid_cell(&self) -> Option<(u32, u32)> {
        let width = (self.width as usize).max(1);
        let position = self.terrain.iter().zip(&self.live).position(|(terrain, state)| {
            let valid_fire = match state.fire {
                FireState::Unburnt => state.fuel >= 0.0,
                FireState::Burning => !terrain.is_water && state.fuel > 0.0,
                FireState::Burnt => state.fuel == 0.0,
            };
            let valid_water =
                !terrain.is_water || (state.fire == FireState::Unburnt && state.fuel == 0.0);
            let finite = state.fuel.is_finite()
                && state.p_ignite.is_finite()
                && state.p_extinguish.is_finite()
                && terrain.tree_coverage.is_finite()
                && state.weather.first_non_finite().is_none();
            !(finite && valid_fire && valid_water)
        })?;
        Some(((position % width) as u32, (position / width) as u32))
    }

    pub fn index(&self, x: u32, y: u32) -> Option<usize> {
        self.view().index(x, y)
    }

    pub fn cell(&self, x: u32, y: u32) -> Option<Cell<'_>> {
        self.view().cell(x, y)
    }

    /// Moore neighbourhood of `(x, y)` clipped to the grid bounds.
    ///
    /// Returns an empty neighbourhood for out-of-bounds coordinates.
    pub fn neighbours(&self, x: u32, y: u32) -> Neighbourhood<'_> {
        self.view().neighbours(x, y)
    }

    /// All cells in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = Cell<'_>> {
        let view = self.view();
        (0..self.live.len()).map(move |i| view.cell_at(i))
    }

    pub fn terrain(&self) -> &[Terrain] {
        &self.terrain
    }

    pub fn states(&self) -> &[CellState] {
        &self.live
    }

    pub(crate) fn view(&self) -> GridView<'_> {
        GridView {
            width: self.width,
            height: self.height,
            terrain: &self.terrain,
            live: &self.live,
        }
    }

    /// Split the grid into a read-only view of the live buffer and the
    /// writable staged buffer for the compute phase.
    pub(crate) fn stage_buffers(&mut self) -> (GridView<'_>, &mut [CellState]) {
        if self.staged.len() != self.live.len() {
            // Deserialized grids arrive without a staging buffer.
            self.staged = self.live.clone();
        }
        let view = GridView {
            width: self.width,
            height: self.height,
            terrain: &self.terrain,
            live: &self.live,
        };
        (view, &mut self.staged)
    }

    /// Make the staged buffer live. The previous live buffer becomes the
    /// scratch space for the next compute phase.
    pub(crate) fn commit(&mut self) {
        std::mem::swap(&mut self.live, &mut self.staged);
    }

    /// Overwrite the weather of every cell in place. Only called between steps.
    pub(crate) fn replace_weather(&mut self, weather: impl IntoIterator<Item = Weather>) {
        for (state, w) in self.live.iter_mut().zip(weather) {
            state.weather = w;
        }
    }
}

/// Borrowed, read-only view of the live state used by the compute phase.
#[derive(Debug, Clone, Copy)]
pub(crate) struct GridView<'a> {
    width: u32,
    height: u32,
    terrain: &'a [Terrain],
    live: &'a [CellState],
}

impl<'a> GridView<'a> {
    pub fn index(&self, x: u32, y: u32) -> Option<usize> {
        if x < self.width && y < self.height {
            Some(y as usize * self.width as usize + x as usize)
        } else {
            None
        }
    }

    pub fn cell_at(&self, index: usize) -> Cell<'a> {
        let width = self.width as usize;
        Cell {
            x: (index % width) as u32,
            y: (index / width) as u32,
            terrain: &self.terrain[index],
            state: &self.live[index],
        }
    }

    pub fn cell(&self, x: u32, y: u32) -> Option<Cell<'a>> {
        self.index(x, y).map(|i| self.cell_at(i))
    }

    pub fn neighbours(&self, x: u32, y: u32) -> Neighbourhood<'a> {
        let mut neighbourhood = Neighbourhood::empty();
        if x >= self.width || y >= self.height {
            return neighbourhood;
        }
        for (nx, ny, dx, dy) in moore_positions(x, y, self.width, self.height) {
            let i = ny as usize * self.width as usize + nx as usize;
            neighbourhood.push(Neighbour {
                cell: self.cell_at(i),
                dx,
                dy,
            });
        }
        neighbourhood
    }
}
