use noise::{NoiseFn, Perlin};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use crate::config::generation::GenerationParams;
use crate::grid::Grid;
use crate::grid::builder::{BuildError, Field, GridBuilder, TerrainFields, WeatherFields};
use crate::grid::cell::{FireState, heading_from_meteorological};

/// Generated input fields for the grid builder plus the parameters that
/// produced them, with the seed resolved.
#[derive(Debug, Clone)]
pub struct Landscape {
    pub params: GenerationParams,
    pub terrain: TerrainFields,
    pub weather: WeatherFields,
    pub ignitions: Vec<(u32, u32)>,
}

impl Landscape {
    pub fn build_grid(&self) -> Result<Grid, BuildError> {
        GridBuilder::new(self.params.width, self.params.height)
            .cell_resolution_km(self.params.cell_resolution_km)
            .fuel_load(self.params.fuel_load)
            .ignitions(self.ignitions.iter().copied())
            .build(&self.weather, &self.terrain)
    }
}

/// Generate terrain and weather fields from the given parameters.
///
/// If `params.seed` is 0, a random seed is chosen. The actual seed used
/// is stored in the returned landscape's `params` for reproducibility.
pub fn generate_landscape(params: &GenerationParams) -> Landscape {
    // Kept within i64 range so the resolved parameters serialise to TOML.
    let seed = if params.seed == 0 {
        rand::thread_rng().gen_range(1..=i64::MAX as u64)
    } else {
        params.seed
    };
    let resolved = GenerationParams {
        seed,
        ..params.clone()
    };
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    let elevation = noise_field(&resolved, seed as u32, 0.06, 3);
    let water = water_mask(&elevation, resolved.water_ratio);
    let tree_coverage = canopy(&resolved, &water, seed.wrapping_add(1) as u32);
    let weather = weather_fields(&resolved, &elevation, seed.wrapping_add(2) as u32);

    let terrain = TerrainFields {
        water,
        tree_coverage,
    };
    let ignitions = pick_ignitions(&resolved, &terrain, &mut rng);

    Landscape {
        params: resolved,
        terrain,
        weather,
        ignitions,
    }
}

/// Print a summary of a generated or restored grid.
pub fn print_grid_summary(grid: &Grid) {
    let total = grid.len() as f32;
    let mut water = 0_u32;
    let mut bare = 0_u32;
    let mut burning = 0_u32;
    let mut burnt = 0_u32;
    let mut fuel = 0.0_f64;
    for cell in grid.cells() {
        fuel += cell.fuel() as f64;
        if cell.is_water() {
            water += 1;
        } else if cell.fuel() <= 0.0 && cell.fire() == FireState::Unburnt {
            bare += 1;
        }
        match cell.fire() {
            FireState::Burning => burning += 1,
            FireState::Burnt => burnt += 1,
            FireState::Unburnt => {}
        }
    }
    let forest = grid.len() as u32 - water - bare - burning - burnt;

    println!("=== Grid Summary ===");
    println!(
        "Size: {}x{} cells ({:.2} km per cell, {:.1} km2)",
        grid.width(),
        grid.height(),
        grid.cell_resolution_km(),
        total * grid.cell_resolution_km().powi(2)
    );
    println!("\nCells:");
    for (name, count) in [
        ("Water", water),
        ("Bare ground", bare),
        ("Forest", forest),
        ("Burning", burning),
        ("Burnt", burnt),
    ] {
        println!("  {:<12} {:>7} ({:.1}%)", name, count, count as f32 / total * 100.0);
    }
    println!("\nTotal fuel: {:.1}", fuel);
}

// --- Internal generation functions ---

/// Fractal Perlin noise in roughly [-1, 1], one value per cell.
fn noise_field(params: &GenerationParams, seed: u32, scale: f64, octaves: u32) -> Field<f32> {
    let perlin = Perlin::new(seed);
    (0..params.height)
        .map(|y| {
            (0..params.width)
                .map(|x| {
                    let mut value = 0.0;
                    let mut amplitude = 1.0;
                    let mut frequency = scale;
                    let mut norm = 0.0;
                    for _ in 0..octaves {
                        let nx = (x as f64 + 0.5) * frequency;
                        let ny = (y as f64 + 0.5) * frequency;
                        value += perlin.get([nx, ny]) * amplitude;
                        norm += amplitude;
                        amplitude *= 0.5;
                        frequency *= 2.0;
                    }
                    (value / norm) as f32
                })
                .collect()
        })
        .collect()
}

/// Lowest `water_ratio` of cells by elevation become water.
fn water_mask(elevation: &Field<f32>, water_ratio: f32) -> Field<bool> {
    let mut values: Vec<f32> = elevation.iter().flatten().copied().collect();
    let water_count = (values.len() as f32 * water_ratio).round() as usize;
    let mut mask: Field<bool> = elevation
        .iter()
        .map(|row| vec![false; row.len()])
        .collect();
    if water_count == 0 {
        return mask;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let threshold = values[water_count - 1];

    let mut remaining = water_count;
    for (y, row) in elevation.iter().enumerate() {
        for (x, &e) in row.iter().enumerate() {
            if remaining > 0 && e <= threshold {
                mask[y][x] = true;
                remaining -= 1;
            }
        }
    }
    mask
}

fn canopy(params: &GenerationParams, water: &Field<bool>, seed: u32) -> Field<f32> {
    let density = noise_field(params, seed, 0.15, 2);
    density
        .iter()
        .zip(water)
        .map(|(row, water_row)| {
            row.iter()
                .zip(water_row)
                .map(|(&n, &is_water)| {
                    if is_water {
                        0.0
                    } else {
                        (params.tree_density + n * params.roughness).clamp(0.0, 1.0)
                    }
                })
                .collect()
        })
        .collect()
}

fn weather_fields(params: &GenerationParams, elevation: &Field<f32>, seed: u32) -> WeatherFields {
    let v = params.weather_variability;
    let temperature_noise = noise_field(params, seed, 0.03, 2);
    let moisture_noise = noise_field(params, seed.wrapping_add(1), 0.03, 2);
    let wind_noise = noise_field(params, seed.wrapping_add(2), 0.02, 1);

    let map = |field: &Field<f32>, f: &dyn Fn(usize, usize, f32) -> f32| -> Field<f32> {
        field
            .iter()
            .enumerate()
            .map(|(y, row)| row.iter().enumerate().map(|(x, &n)| f(x, y, n)).collect())
            .collect()
    };

    // Up to 6 degrees colder on the highest ground.
    let temperature = map(&temperature_noise, &|x, y, n| {
        params.base_temperature * (1.0 + v * n) - elevation[y][x].max(0.0) * 6.0
    });
    let humidity = map(&moisture_noise, &|_, _, n| {
        (params.base_humidity * (1.0 + v * n)).clamp(0.0, 1.0)
    });
    let precipitation = map(&moisture_noise, &|_, _, n| {
        (params.rain_volume * (1.0 + v * n)).max(0.0)
    });
    let wind_speed = map(&wind_noise, &|_, _, n| {
        (params.wind_speed * (1.0 + v * n)).max(0.0)
    });
    // Direction varies by up to 45 degrees at full variability.
    let wind_direction = map(&wind_noise, &|_, _, n| {
        heading_from_meteorological(params.wind_direction_deg + 45.0 * v * n)
    });

    WeatherFields {
        temperature,
        humidity,
        precipitation,
        wind_speed,
        wind_direction,
    }
}

fn pick_ignitions(
    params: &GenerationParams,
    terrain: &TerrainFields,
    rng: &mut ChaCha8Rng,
) -> Vec<(u32, u32)> {
    let mut ignitions: Vec<(u32, u32)> = params.ignitions.iter().map(|&[x, y]| (x, y)).collect();
    if params.random_ignitions == 0 {
        return ignitions;
    }

    let candidates: Vec<(u32, u32)> = (0..params.height)
        .flat_map(|y| (0..params.width).map(move |x| (x, y)))
        .filter(|&(x, y)| {
            let (xi, yi) = (x as usize, y as usize);
            !terrain.water[yi][xi] && terrain.tree_coverage[yi][xi] > 0.0
        })
        .filter(|p| !ignitions.contains(p))
        .collect();
    ignitions.extend(
        candidates
            .choose_multiple(rng, params.random_ignitions as usize)
            .copied(),
    );
    ignitions
}
