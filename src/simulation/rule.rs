use rand::Rng;
use thiserror::Error;

use crate::config::rule::RuleParams;
use crate::grid::cell::{Cell, CellState, FireState, Weather};
use crate::grid::topology::{Neighbour, Neighbourhood};

/// Failure to compute a cell's next state. Any one of these aborts the step.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RuleError {
    #[error("cell ({x}, {y}): non-finite {field}")]
    NonFinite { x: u32, y: u32, field: &'static str },
}

/// Out-of-range intermediate values that were clamped instead of surfaced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Recoveries {
    pub probability_clamps: u32,
    pub fuel_clamps: u32,
}

impl Recoveries {
    pub fn merge(&mut self, other: Recoveries) {
        self.probability_clamps += other.probability_clamps;
        self.fuel_clamps += other.fuel_clamps;
    }

    pub fn total(&self) -> u32 {
        self.probability_clamps + self.fuel_clamps
    }

    /// Clamp `p` into [0, 1], counting the correction. NaN becomes 0.
    fn probability(&mut self, p: f32) -> f32 {
        if p.is_nan() {
            self.probability_clamps += 1;
            0.0
        } else if !(0.0..=1.0).contains(&p) {
            self.probability_clamps += 1;
            p.clamp(0.0, 1.0)
        } else {
            p
        }
    }
}

/// Output of the transition rule for one cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition {
    pub next: CellState,
    pub recoveries: Recoveries,
}

/// Turn a hazard per unit time into a probability over a step of length `dt`.
fn per_step(hazard: f32, dt: f32) -> f32 {
    1.0 - (1.0 - hazard).powf(dt)
}

/// Stochastic fire-spread rule: ignition from burning Moore neighbours,
/// fuel consumption, and extinction.
///
/// Pure with respect to the grid. All randomness comes from the caller's rng,
/// at most one draw per call.
#[derive(Debug, Clone, Default)]
pub struct FireSpreadRule {
    params: RuleParams,
}

impl FireSpreadRule {
    pub fn new(params: RuleParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &RuleParams {
        &self.params
    }

    /// Fuel consumed per unit time. Faster in wind, slower in humid air.
    pub fn burn_rate(&self, weather: &Weather) -> f32 {
        let p = &self.params;
        let wind = 1.0 + p.wind_burn_factor * weather.wind_speed.max(0.0);
        let damping = (1.0 - p.humidity_burn_damping * weather.humidity).max(0.0);
        p.base_burn_rate * wind * damping
    }

    /// Wind alignment of spread from `neighbour` toward the centre cell.
    ///
    /// 1.0 when the neighbour's wind blows straight at the centre or the air
    /// is calm, decaying toward 0 as the wind turns away. The cone narrows
    /// with wind speed: straight upwind the factor is
    /// `exp(-2 * wind_alignment_strength * speed)`, so with the default
    /// strength of 0.15 it is about 0.74 at 1 m/s, 0.41 at 3 m/s and 0.05 at
    /// 10 m/s. Light breezes bend the front, only strong winds stop upwind
    /// spread.
    pub fn wind_alignment(&self, neighbour: &Neighbour<'_>) -> f32 {
        let weather = neighbour.cell.weather();
        let speed = weather.wind_speed.max(0.0);
        if speed == 0.0 {
            return 1.0;
        }
        let (hx, hy) = weather.wind_heading();
        let (dx, dy) = neighbour.direction_to_centre();
        let cos_theta = hx * dx + hy * dy;
        (self.params.wind_alignment_strength * speed * (cos_theta - 1.0)).exp()
    }

    /// Humidity and rain suppression of ignition at the target cell, in [0, 1].
    pub fn suppression(&self, weather: &Weather) -> f32 {
        let p = &self.params;
        let dryness = (1.0 - p.humidity_suppression * weather.humidity).clamp(0.0, 1.0);
        dryness * (-weather.rain_volume.max(0.0) / p.rain_scale).exp()
    }

    fn temperature_factor(&self, weather: &Weather) -> f32 {
        let p = &self.params;
        (1.0 + p.temperature_sensitivity * (weather.temperature - p.reference_temperature)).max(0.0)
    }

    /// Per-step ignition contribution of one burning neighbour, before clamping.
    pub fn ignition_hazard(&self, cell: &Cell<'_>, neighbour: &Neighbour<'_>) -> f32 {
        let p = &self.params;
        let intensity = (neighbour.cell.fuel() / p.reference_fuel).clamp(0.0, 1.0);
        p.base_ignition
            * intensity
            * self.wind_alignment(neighbour)
            * (1.0 / neighbour.distance())
            * self.suppression(cell.weather())
            * self.temperature_factor(cell.weather())
    }

    /// Combined ignition probability `1 - prod(1 - c_i)` over burning neighbours.
    pub fn ignition_probability(
        &self,
        cell: &Cell<'_>,
        neighbourhood: &Neighbourhood<'_>,
        dt: f32,
        recoveries: &mut Recoveries,
    ) -> f32 {
        let mut survive = 1.0_f32;
        for neighbour in neighbourhood.burning() {
            let hazard = recoveries.probability(self.ignition_hazard(cell, neighbour));
            let contribution = recoveries.probability(per_step(hazard, dt));
            survive *= 1.0 - contribution;
        }
        recoveries.probability(1.0 - survive)
    }

    /// Probability that a burning cell left with `fuel_after` goes out this step.
    pub fn extinguish_probability(
        &self,
        fuel_after: f32,
        weather: &Weather,
        dt: f32,
        recoveries: &mut Recoveries,
    ) -> f32 {
        let p = &self.params;
        let depletion = 1.0 - (fuel_after / p.reference_fuel).clamp(0.0, 1.0);
        let soak = 1.0 - (-weather.rain_volume.max(0.0) / p.rain_scale).exp();
        let hazard = recoveries.probability(
            p.extinguish_base + p.extinguish_depletion * depletion + p.extinguish_rain * soak,
        );
        recoveries.probability(per_step(hazard, dt))
    }

    /// Compute the next state of `cell` from the pre-step grid.
    ///
    /// Never mutates the cell or its neighbours.
    pub fn compute_next<R: Rng + ?Sized>(
        &self,
        cell: Cell<'_>,
        neighbourhood: &Neighbourhood<'_>,
        dt: f32,
        rng: &mut R,
    ) -> Result<Transition, RuleError> {
        check_finite(&cell, &cell)?;
        let mut recoveries = Recoveries::default();
        let current = cell.state;

        if cell.is_water() || current.fire == FireState::Burnt {
            return Ok(Transition {
                next: current.at_rest(),
                recoveries,
            });
        }

        let next = match current.fire {
            FireState::Burning => {
                let mut fuel = current.fuel - self.burn_rate(cell.weather()) * dt;
                if fuel < 0.0 {
                    recoveries.fuel_clamps += 1;
                    fuel = 0.0;
                }
                if fuel == 0.0 {
                    CellState {
                        fire: FireState::Burnt,
                        fuel: 0.0,
                        p_ignite: 0.0,
                        p_extinguish: 1.0,
                        ..*current
                    }
                } else {
                    let p_extinguish =
                        self.extinguish_probability(fuel, cell.weather(), dt, &mut recoveries);
                    if rng.r#gen::<f32>() < p_extinguish {
                        CellState {
                            fire: FireState::Burnt,
                            fuel: 0.0,
                            p_ignite: 0.0,
                            p_extinguish,
                            ..*current
                        }
                    } else {
                        CellState {
                            fire: FireState::Burning,
                            fuel,
                            p_ignite: 0.0,
                            p_extinguish,
                            ..*current
                        }
                    }
                }
            }
            FireState::Unburnt => {
                for neighbour in neighbourhood.burning() {
                    check_finite(&cell, &neighbour.cell)?;
                }
                let p_ignite = self.ignition_probability(&cell, neighbourhood, dt, &mut recoveries);
                let ignites = p_ignite > 0.0 && rng.r#gen::<f32>() < p_ignite && current.fuel > 0.0;
                CellState {
                    fire: if ignites {
                        FireState::Burning
                    } else {
                        FireState::Unburnt
                    },
                    p_ignite,
                    p_extinguish: 0.0,
                    ..*current
                }
            }
            FireState::Burnt => current.at_rest(),
        };

        Ok(Transition { next, recoveries })
    }
}

/// Reject NaN or infinite inputs read from `source`, reported against `cell`.
fn check_finite(cell: &Cell<'_>, source: &Cell<'_>) -> Result<(), RuleError> {
    let field = source.weather().first_non_finite().or_else(|| {
        if source.fuel().is_finite() {
            None
        } else {
            Some("fuel")
        }
    });
    match field {
        Some(field) => Err(RuleError::NonFinite {
            x: cell.x,
            y: cell.y,
            field,
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::builder::{GridBuilder, TerrainFields, WeatherFields};
    use crate::grid::Grid;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn grid_3x3(weather: Weather, burning: &[(u32, u32)]) -> Grid {
        GridBuilder::new(3, 3)
            .ignitions(burning.iter().copied())
            .build(
                &WeatherFields::uniform(3, 3, weather),
                &TerrainFields::uniform(3, 3, false, 1.0),
            )
            .unwrap()
    }

    fn p_ignite_at(rule: &FireSpreadRule, grid: &Grid, x: u32, y: u32) -> f32 {
        let cell = grid.cell(x, y).unwrap();
        let mut rec = Recoveries::default();
        rule.ignition_probability(&cell, &grid.neighbours(x, y), 1.0, &mut rec)
    }

    #[test]
    fn orthogonal_neighbours_ignite_more_readily_than_diagonal() {
        let rule = FireSpreadRule::default();
        let grid = grid_3x3(Weather::default(), &[(1, 1)]);
        let orthogonal = p_ignite_at(&rule, &grid, 1, 0);
        let diagonal = p_ignite_at(&rule, &grid, 0, 0);
        assert!(orthogonal > diagonal, "{} vs {}", orthogonal, diagonal);
        assert!((orthogonal - 0.6).abs() < 1e-5);
        assert!((diagonal - 0.6 / std::f32::consts::SQRT_2).abs() < 1e-5);
    }

    #[test]
    fn no_burning_neighbours_means_zero_ignition() {
        let rule = FireSpreadRule::default();
        let grid = grid_3x3(Weather::default(), &[]);
        assert_eq!(p_ignite_at(&rule, &grid, 1, 1), 0.0);
    }

    #[test]
    fn downwind_cell_is_favoured() {
        let rule = FireSpreadRule::default();
        // Wind blowing east (+x) at 10 m/s.
        let weather = Weather {
            wind_speed: 10.0,
            wind_direction: 0.0,
            ..Weather::default()
        };
        let grid = grid_3x3(weather, &[(1, 1)]);
        let downwind = p_ignite_at(&rule, &grid, 2, 1);
        let crosswind = p_ignite_at(&rule, &grid, 1, 2);
        let upwind = p_ignite_at(&rule, &grid, 0, 1);
        assert!(downwind > crosswind, "{} vs {}", downwind, crosswind);
        assert!(crosswind > upwind, "{} vs {}", crosswind, upwind);
        assert!(upwind < 0.05, "upwind = {}", upwind);
    }

    #[test]
    fn alignment_peaks_at_one_directly_downwind() {
        let rule = FireSpreadRule::default();
        let weather = Weather {
            wind_speed: 8.0,
            wind_direction: 0.0,
            ..Weather::default()
        };
        let grid = grid_3x3(weather, &[]);
        let west = grid
            .neighbours(1, 1)
            .iter()
            .find(|n| n.dx == -1 && n.dy == 0)
            .copied()
            .unwrap();
        assert!((rule.wind_alignment(&west) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn upwind_alignment_fades_with_wind_speed() {
        let rule = FireSpreadRule::default();
        let upwind = |speed: f32| {
            let grid = grid_3x3(
                Weather {
                    wind_speed: speed,
                    wind_direction: 0.0,
                    ..Weather::default()
                },
                &[],
            );
            // The east neighbour's wind blows away from the centre.
            let east = grid
                .neighbours(1, 1)
                .iter()
                .find(|n| n.dx == 1 && n.dy == 0)
                .copied()
                .unwrap();
            rule.wind_alignment(&east)
        };
        assert!((upwind(1.0) - (-0.3_f32).exp()).abs() < 1e-5);
        assert!((upwind(3.0) - (-0.9_f32).exp()).abs() < 1e-5);
        assert!(upwind(10.0) < 0.06);
        assert!(upwind(1.0) > upwind(3.0) && upwind(3.0) > upwind(10.0));
    }

    #[test]
    fn humidity_and_rain_suppress_ignition() {
        let rule = FireSpreadRule::default();
        let dry = p_ignite_at(&rule, &grid_3x3(Weather::default(), &[(1, 1)]), 1, 0);
        let humid = p_ignite_at(
            &rule,
            &grid_3x3(
                Weather {
                    humidity: 0.5,
                    ..Weather::default()
                },
                &[(1, 1)],
            ),
            1,
            0,
        );
        let rainy = p_ignite_at(
            &rule,
            &grid_3x3(
                Weather {
                    rain_volume: 10.0,
                    ..Weather::default()
                },
                &[(1, 1)],
            ),
            1,
            0,
        );
        let saturated = p_ignite_at(
            &rule,
            &grid_3x3(
                Weather {
                    humidity: 1.0,
                    ..Weather::default()
                },
                &[(1, 1)],
            ),
            1,
            0,
        );
        assert!(humid < dry);
        assert!(rainy < dry);
        assert_eq!(saturated, 0.0);
    }

    #[test]
    fn more_burning_neighbours_raise_ignition() {
        let rule = FireSpreadRule::default();
        let one = p_ignite_at(&rule, &grid_3x3(Weather::default(), &[(0, 1)]), 1, 1);
        let two = p_ignite_at(&rule, &grid_3x3(Weather::default(), &[(0, 1), (2, 1)]), 1, 1);
        assert!(two > one);
        assert!((two - (1.0 - 0.4 * 0.4)).abs() < 1e-5);
    }

    #[test]
    fn hot_weather_probability_is_clamped() {
        let rule = FireSpreadRule::new(RuleParams {
            base_ignition: 1.0,
            ..RuleParams::default()
        });
        let hot = Weather {
            temperature: 60.0,
            ..Weather::default()
        };
        let grid = grid_3x3(hot, &[(1, 1)]);
        let cell = grid.cell(1, 0).unwrap();
        let mut rec = Recoveries::default();
        let p = rule.ignition_probability(&cell, &grid.neighbours(1, 0), 1.0, &mut rec);
        assert_eq!(p, 1.0);
        assert!(rec.probability_clamps > 0);
    }

    #[test]
    fn burn_rate_rises_with_wind_and_falls_with_humidity() {
        let rule = FireSpreadRule::default();
        let calm = rule.burn_rate(&Weather::default());
        let windy = rule.burn_rate(&Weather {
            wind_speed: 10.0,
            ..Weather::default()
        });
        let humid = rule.burn_rate(&Weather {
            humidity: 0.8,
            ..Weather::default()
        });
        assert!(windy > calm);
        assert!(humid < calm);
        assert!(humid > 0.0);
    }

    #[test]
    fn extinguish_probability_rises_as_fuel_runs_out_and_with_rain() {
        let rule = FireSpreadRule::default();
        let mut rec = Recoveries::default();
        let full = rule.extinguish_probability(1.0, &Weather::default(), 1.0, &mut rec);
        let low = rule.extinguish_probability(0.1, &Weather::default(), 1.0, &mut rec);
        let wet = rule.extinguish_probability(
            1.0,
            &Weather {
                rain_volume: 20.0,
                ..Weather::default()
            },
            1.0,
            &mut rec,
        );
        assert!(low > full);
        assert!(wet > full);
        assert_eq!(rec.total(), 0);
    }

    #[test]
    fn burning_cell_consumes_fuel() {
        let rule = FireSpreadRule::default();
        let grid = grid_3x3(Weather::default(), &[(1, 1)]);
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let t = rule
            .compute_next(grid.cell(1, 1).unwrap(), &grid.neighbours(1, 1), 1.0, &mut rng)
            .unwrap();
        assert!(t.next.fuel < 1.0);
        match t.next.fire {
            FireState::Burning => assert!(t.next.fuel > 0.0),
            FireState::Burnt => assert_eq!(t.next.fuel, 0.0),
            FireState::Unburnt => panic!("burning cell cannot revert"),
        }
    }

    #[test]
    fn exhausted_fuel_forces_burnt() {
        let rule = FireSpreadRule::default();
        let grid = GridBuilder::new(1, 1)
            .ignite(0, 0)
            .build(
                &WeatherFields::uniform(1, 1, Weather::default()),
                &TerrainFields::uniform(1, 1, false, 0.05),
            )
            .unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let t = rule
            .compute_next(grid.cell(0, 0).unwrap(), &grid.neighbours(0, 0), 1.0, &mut rng)
            .unwrap();
        assert_eq!(t.next.fire, FireState::Burnt);
        assert_eq!(t.next.fuel, 0.0);
        assert_eq!(t.next.p_extinguish, 1.0);
        assert_eq!(t.recoveries.fuel_clamps, 1);
    }

    #[test]
    fn fuel_less_cell_never_ignites() {
        let rule = FireSpreadRule::new(RuleParams {
            base_ignition: 1.0,
            ..RuleParams::default()
        });
        let mut terrain = TerrainFields::uniform(3, 3, false, 1.0);
        terrain.tree_coverage[1][0] = 0.0;
        let grid = GridBuilder::new(3, 3)
            .ignitions([(0, 0), (1, 1), (0, 2), (1, 0), (1, 2)])
            .build(&WeatherFields::uniform(3, 3, Weather::default()), &terrain)
            .unwrap();

        for seed in 0..50 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let t = rule
                .compute_next(grid.cell(0, 1).unwrap(), &grid.neighbours(0, 1), 1.0, &mut rng)
                .unwrap();
            assert!(t.next.p_ignite > 0.0);
            assert_eq!(t.next.fire, FireState::Unburnt);
            assert_eq!(t.next.fuel, 0.0);
        }
    }

    #[test]
    fn burnt_and_water_cells_are_unchanged() {
        let rule = FireSpreadRule::default();
        let mut terrain = TerrainFields::uniform(2, 1, false, 1.0);
        terrain.water[0][1] = true;
        let grid = GridBuilder::new(2, 1)
            .ignite(0, 0)
            .build(&WeatherFields::uniform(2, 1, Weather::default()), &terrain)
            .unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let water = rule
            .compute_next(grid.cell(1, 0).unwrap(), &grid.neighbours(1, 0), 1.0, &mut rng)
            .unwrap();
        assert_eq!(water.next, *grid.cell(1, 0).unwrap().state);

        let burnt_state = CellState {
            fire: FireState::Burnt,
            fuel: 0.0,
            ..*grid.cell(0, 0).unwrap().state
        };
        let burnt = Cell {
            x: 0,
            y: 0,
            terrain: grid.cell(0, 0).unwrap().terrain,
            state: &burnt_state,
        };
        let t = rule
            .compute_next(burnt, &grid.neighbours(0, 0), 1.0, &mut rng)
            .unwrap();
        assert_eq!(t.next.fire, FireState::Burnt);
        assert_eq!(t.next.fuel, 0.0);
    }

    #[test]
    fn same_rng_seed_same_outcome() {
        let rule = FireSpreadRule::default();
        let grid = grid_3x3(Weather::default(), &[(1, 1)]);
        let run = |seed| {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            rule.compute_next(grid.cell(2, 1).unwrap(), &grid.neighbours(2, 1), 1.0, &mut rng)
                .unwrap()
        };
        assert_eq!(run(11), run(11));
    }

    #[test]
    fn non_finite_input_is_an_error() {
        let rule = FireSpreadRule::default();
        let weather = WeatherFields::uniform(2, 1, Weather::default());
        let grid = GridBuilder::new(2, 1)
            .ignite(0, 0)
            .build(&weather, &TerrainFields::uniform(2, 1, false, 1.0))
            .unwrap();
        let bad = CellState {
            weather: Weather {
                wind_speed: f32::NAN,
                ..Weather::default()
            },
            ..*grid.cell(0, 0).unwrap().state
        };
        let bad_cell = Cell {
            x: 0,
            y: 0,
            terrain: grid.cell(0, 0).unwrap().terrain,
            state: &bad,
        };
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let err = rule
            .compute_next(bad_cell, &grid.neighbours(0, 0), 1.0, &mut rng)
            .unwrap_err();
        assert_eq!(
            err,
            RuleError::NonFinite {
                x: 0,
                y: 0,
                field: "wind_speed"
            }
        );
    }

    #[test]
    fn longer_steps_raise_per_step_probability() {
        assert!(per_step(0.3, 2.0) > per_step(0.3, 1.0));
        assert!((per_step(0.3, 1.0) - 0.3).abs() < 1e-6);
        assert_eq!(per_step(0.0, 5.0), 0.0);
        assert_eq!(per_step(1.0, 0.5), 1.0);
    }
}
