use std::f32::consts::TAU;

use thiserror::Error;
use tracing::{debug, warn};

use crate::grid::Grid;
use crate::grid::cell::{CellState, FireState, Terrain, Weather};

/// Fuel held by a fully forested cell unless the builder is told otherwise.
pub const DEFAULT_FUEL_LOAD: f32 = 1.0;

/// Row-major 2D field: `height` rows of `width` values, row index = y.
pub type Field<T> = Vec<Vec<T>>;

/// Fine-resolution weather fields supplied by the weather collaborator.
///
/// `wind_direction` uses the grid heading convention (radians toward which
/// the wind blows, counter-clockwise from east).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WeatherFields {
    pub temperature: Field<f32>,
    pub humidity: Field<f32>,
    pub precipitation: Field<f32>,
    pub wind_speed: Field<f32>,
    pub wind_direction: Field<f32>,
}

impl WeatherFields {
    /// Every field filled with the same weather.
    pub fn uniform(width: u32, height: u32, weather: Weather) -> Self {
        let field = |v: f32| vec![vec![v; width as usize]; height as usize];
        Self {
            temperature: field(weather.temperature),
            humidity: field(weather.humidity),
            precipitation: field(weather.rain_volume),
            wind_speed: field(weather.wind_speed),
            wind_direction: field(weather.wind_direction),
        }
    }

    /// Bilinearly resample coarse weather onto a `width x height` grid.
    ///
    /// The corner samples of both grids coincide, so the corners of the
    /// result repeat the coarse corners and every other value lies between
    /// its four coarse neighbours. Wind direction is blended through its unit
    /// vector so headings either side of east do not average to west.
    pub fn upscale(coarse: &WeatherFields, width: u32, height: u32) -> Result<Self, BuildError> {
        if width == 0 || height == 0 {
            return Err(BuildError::EmptyGrid { width, height });
        }
        let rows = coarse.temperature.len();
        let columns = coarse.temperature.first().map_or(0, Vec::len);
        if rows == 0 || columns == 0 {
            return Err(BuildError::EmptyGrid {
                width: columns as u32,
                height: rows as u32,
            });
        }
        for (name, field) in coarse.named() {
            check_shape(name, field, columns as u32, rows as u32)?;
            check_finite(name, field)?;
        }

        let resample = |field: &Field<f32>| bilinear(field, width, height);
        let components = |f: fn(f32) -> f32| -> Field<f32> {
            let field: Field<f32> = coarse
                .wind_direction
                .iter()
                .map(|row| row.iter().map(|&heading| f(heading)).collect())
                .collect();
            resample(&field)
        };
        let (east, north) = (components(f32::cos), components(f32::sin));
        let wind_direction = east
            .iter()
            .zip(&north)
            .map(|(east_row, north_row)| {
                east_row
                    .iter()
                    .zip(north_row)
                    .map(|(&ex, &ny)| ny.atan2(ex).rem_euclid(TAU))
                    .collect()
            })
            .collect();

        Ok(Self {
            temperature: resample(&coarse.temperature),
            humidity: resample(&coarse.humidity),
            precipitation: resample(&coarse.precipitation),
            wind_speed: resample(&coarse.wind_speed),
            wind_direction,
        })
    }

    fn named(&self) -> [(&'static str, &Field<f32>); 5] {
        [
            ("temperature", &self.temperature),
            ("humidity", &self.humidity),
            ("precipitation", &self.precipitation),
            ("wind_speed", &self.wind_speed),
            ("wind_direction", &self.wind_direction),
        ]
    }

    /// Validate shape and finiteness, then flatten into row-major weather.
    pub(crate) fn to_weather(&self, width: u32, height: u32) -> Result<Vec<Weather>, BuildError> {
        for (name, field) in self.named() {
            check_shape(name, field, width, height)?;
            check_finite(name, field)?;
        }

        let mut clamped = 0_u32;
        let mut out = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height as usize {
            for x in 0..width as usize {
                let humidity = self.humidity[y][x];
                let bounded = humidity.clamp(0.0, 1.0);
                if bounded != humidity {
                    clamped += 1;
                }
                out.push(Weather {
                    temperature: self.temperature[y][x],
                    humidity: bounded,
                    rain_volume: self.precipitation[y][x].max(0.0),
                    wind_speed: self.wind_speed[y][x].max(0.0),
                    wind_direction: self.wind_direction[y][x],
                });
            }
        }
        if clamped > 0 {
            debug!(clamped, "Humidity values outside [0, 1] clamped");
        }
        Ok(out)
    }
}

/// Terrain fields supplied by the terrain collaborator.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TerrainFields {
    pub water: Field<bool>,
    pub tree_coverage: Field<f32>,
}

impl TerrainFields {
    pub fn uniform(width: u32, height: u32, is_water: bool, tree_coverage: f32) -> Self {
        Self {
            water: vec![vec![is_water; width as usize]; height as usize],
            tree_coverage: vec![vec![tree_coverage; width as usize]; height as usize],
        }
    }
}

/// Errors raised while assembling a grid. All of them abort construction.
#[derive(Debug, Error, PartialEq)]
pub enum BuildError {
    #[error("grid must be at least 1x1, got {width}x{height}")]
    EmptyGrid { width: u32, height: u32 },
    #[error("field '{field}' has shape {actual:?} (rows, columns), expected {expected:?}")]
    DimensionMismatch {
        field: &'static str,
        expected: (usize, usize),
        actual: (usize, usize),
    },
    #[error("field '{field}' holds a non-finite value at ({x}, {y})")]
    NonFinite { field: &'static str, x: u32, y: u32 },
    #[error("ignition seed ({x}, {y}) lies outside the {width}x{height} grid")]
    SeedOutOfBounds { x: u32, y: u32, width: u32, height: u32 },
    #[error("cell resolution must be a positive number of kilometres, got {0}")]
    InvalidResolution(f32),
}

/// Assembles the initial [`Grid`] from weather and terrain fields.
///
/// Fuel is derived from canopy density as `fuel_load * tree_coverage` on
/// land and is always 0 on water.
#[derive(Debug, Clone)]
pub struct GridBuilder {
    width: u32,
    height: u32,
    cell_resolution_km: f32,
    fuel_load: f32,
    ignitions: Vec<(u32, u32)>,
}

impl GridBuilder {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            cell_resolution_km: 1.0,
            fuel_load: DEFAULT_FUEL_LOAD,
            ignitions: Vec::new(),
        }
    }

    pub fn cell_resolution_km(mut self, km: f32) -> Self {
        self.cell_resolution_km = km;
        self
    }

    pub fn fuel_load(mut self, fuel_load: f32) -> Self {
        self.fuel_load = fuel_load.max(0.0);
        self
    }

    /// Seed a fire at `(x, y)`. Seeds on water or fuel-less cells are ignored.
    pub fn ignite(mut self, x: u32, y: u32) -> Self {
        self.ignitions.push((x, y));
        self
    }

    pub fn ignitions(mut self, seeds: impl IntoIterator<Item = (u32, u32)>) -> Self {
        self.ignitions.extend(seeds);
        self
    }

    /// Map canopy density to initial fuel. Monotonic in `tree_coverage`.
    pub fn fuel_for(&self, terrain: &Terrain) -> f32 {
        if terrain.is_water {
            0.0
        } else {
            self.fuel_load * terrain.tree_coverage.clamp(0.0, 1.0)
        }
    }

    pub fn build(&self, weather: &WeatherFields, terrain: &TerrainFields) -> Result<Grid, BuildError> {
        let (width, height) = (self.width, self.height);
        if width == 0 || height == 0 {
            return Err(BuildError::EmptyGrid { width, height });
        }
        if !(self.cell_resolution_km.is_finite() && self.cell_resolution_km > 0.0) {
            return Err(BuildError::InvalidResolution(self.cell_resolution_km));
        }

        check_shape("water", &terrain.water, width, height)?;
        check_shape("tree_coverage", &terrain.tree_coverage, width, height)?;
        check_finite("tree_coverage", &terrain.tree_coverage)?;
        let weather = weather.to_weather(width, height)?;

        for &(x, y) in &self.ignitions {
            if x >= width || y >= height {
                return Err(BuildError::SeedOutOfBounds { x, y, width, height });
            }
        }

        let mut cells_terrain = Vec::with_capacity(weather.len());
        let mut cells_state = Vec::with_capacity(weather.len());
        for (i, w) in weather.into_iter().enumerate() {
            let (x, y) = (i % width as usize, i / width as usize);
            let t = Terrain {
                is_water: terrain.water[y][x],
                tree_coverage: terrain.tree_coverage[y][x].clamp(0.0, 1.0),
            };
            cells_state.push(CellState::unburnt(w, self.fuel_for(&t)));
            cells_terrain.push(t);
        }

        for &(x, y) in &self.ignitions {
            let i = y as usize * width as usize + x as usize;
            let state = &mut cells_state[i];
            if cells_terrain[i].is_water || state.fuel <= 0.0 {
                warn!(
                    x,
                    y,
                    water = cells_terrain[i].is_water,
                    "Ignition seed on a cell without fuel ignored"
                );
                continue;
            }
            state.fire = FireState::Burning;
        }

        Ok(Grid::from_parts(
            width,
            height,
            self.cell_resolution_km,
            cells_terrain,
            cells_state,
        ))
    }
}

/// Linear interpolation of a non-empty rectangular field onto
/// `width x height` samples, aligned at the corners.
fn bilinear(field: &Field<f32>, width: u32, height: u32) -> Field<f32> {
    let rows = field.len();
    let columns = field.first().map_or(0, Vec::len);
    // Lower source index, upper source index and weight of the upper one.
    let source = |i: u32, samples: u32, len: usize| -> (usize, usize, f32) {
        if samples <= 1 || len <= 1 {
            return (0, 0, 0.0);
        }
        let position = i as f32 * (len - 1) as f32 / (samples - 1) as f32;
        let lower = (position.floor() as usize).min(len - 1);
        let upper = (lower + 1).min(len - 1);
        (lower, upper, position - lower as f32)
    };

    (0..height)
        .map(|y| {
            let (y0, y1, ty) = source(y, height, rows);
            (0..width)
                .map(|x| {
                    let (x0, x1, tx) = source(x, width, columns);
                    let south = field[y0][x0] * (1.0 - tx) + field[y0][x1] * tx;
                    let north = field[y1][x0] * (1.0 - tx) + field[y1][x1] * tx;
                    south * (1.0 - ty) + north * ty
                })
                .collect()
        })
        .collect()
}

fn check_shape<T>(name: &'static str, field: &Field<T>, width: u32, height: u32) -> Result<(), BuildError> {
    let expected = (height as usize, width as usize);
    let ragged = field.iter().find(|row| row.len() != width as usize);
    if field.len() != expected.0 || ragged.is_some() {
        let columns = ragged.map_or_else(|| field.first().map_or(0, Vec::len), Vec::len);
        return Err(BuildError::DimensionMismatch {
            field: name,
            expected,
            actual: (field.len(), columns),
        });
    }
    Ok(())
}

fn check_finite(name: &'static str, field: &Field<f32>) -> Result<(), BuildError> {
    for (y, row) in field.iter().enumerate() {
        if let Some(x) = row.iter().position(|v| !v.is_finite()) {
            return Err(BuildError::NonFinite {
                field: name,
                x: x as u32,
                y: y as u32,
            });
        }
    }
    Ok(())
}
