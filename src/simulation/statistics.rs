use serde::Serialize;

use crate::grid::Grid;
use crate::grid::cell::FireState;
use crate::simulation::rule::Recoveries;

/// Per-step aggregate metrics for reporting and fire-front tracking.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepStatistics {
    pub step: u64,
    pub time: f64,
    pub unburnt: u32,
    pub burning: u32,
    pub burnt: u32,
    pub water_cells: u32,
    pub total_fuel: f64,
    /// Area of burning plus burnt cells.
    pub burned_area_km2: f64,
    /// Mean `p_ignite` over unburnt land cells.
    pub mean_ignition_probability: f32,
    pub probability_clamps: u32,
    pub fuel_clamps: u32,
    pub step_duration_ms: f32,
}

impl StepStatistics {
    pub fn fire_active(&self) -> bool {
        self.burning > 0
    }
}

/// Compute statistics for the committed grid after a step.
pub fn compute_statistics(
    grid: &Grid,
    step: u64,
    time: f64,
    recoveries: Recoveries,
    step_duration_ms: f32,
) -> StepStatistics {
    let mut unburnt = 0_u32;
    let mut burning = 0_u32;
    let mut burnt = 0_u32;
    let mut water_cells = 0_u32;
    let mut total_fuel = 0.0_f64;
    let mut ignition_sum = 0.0_f64;
    let mut land_unburnt = 0_u32;

    for cell in grid.cells() {
        total_fuel += cell.fuel() as f64;
        if cell.is_water() {
            water_cells += 1;
        }
        match cell.fire() {
            FireState::Unburnt => {
                unburnt += 1;
                if !cell.is_water() {
                    land_unburnt += 1;
                    ignition_sum += cell.state.p_ignite as f64;
                }
            }
            FireState::Burning => burning += 1,
            FireState::Burnt => burnt += 1,
        }
    }

    let cell_area = (grid.cell_resolution_km() as f64).powi(2);
    let mean_ignition_probability = if land_unburnt == 0 {
        0.0
    } else {
        (ignition_sum / land_unburnt as f64) as f32
    };

    StepStatistics {
        step,
        time,
        unburnt,
        burning,
        burnt,
        water_cells,
        total_fuel,
        burned_area_km2: (burning + burnt) as f64 * cell_area,
        mean_ignition_probability,
        probability_clamps: recoveries.probability_clamps,
        fuel_clamps: recoveries.fuel_clamps,
        step_duration_ms,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::builder::{GridBuilder, TerrainFields, WeatherFields};
    use crate::grid::cell::Weather;

    #[test]
    fn counts_states_and_area() {
        let mut terrain = TerrainFields::uniform(3, 2, false, 0.5);
        terrain.water[1][2] = true;
        let grid = GridBuilder::new(3, 2)
            .cell_resolution_km(2.0)
            .ignite(0, 0)
            .ignite(1, 1)
            .build(&WeatherFields::uniform(3, 2, Weather::default()), &terrain)
            .unwrap();

        let stats = compute_statistics(&grid, 4, 4.0, Recoveries::default(), 1.5);

        assert_eq!(stats.step, 4);
        assert_eq!(stats.unburnt, 4);
        assert_eq!(stats.burning, 2);
        assert_eq!(stats.burnt, 0);
        assert_eq!(stats.water_cells, 1);
        assert!((stats.total_fuel - 2.5).abs() < 1e-6);
        assert!((stats.burned_area_km2 - 8.0).abs() < 1e-9);
        assert!(stats.fire_active());
    }

    #[test]
    fn recoveries_are_reported() {
        let grid = GridBuilder::new(1, 1)
            .build(
                &WeatherFields::uniform(1, 1, Weather::default()),
                &TerrainFields::uniform(1, 1, false, 1.0),
            )
            .unwrap();
        let recoveries = Recoveries {
            probability_clamps: 3,
            fuel_clamps: 1,
        };
        let stats = compute_statistics(&grid, 1, 1.0, recoveries, 0.0);
        assert_eq!(stats.probability_clamps, 3);
        assert_eq!(stats.fuel_clamps, 1);
        assert!(!stats.fire_active());
        assert_eq!(stats.mean_ignition_probability, 0.0);
    }
}
