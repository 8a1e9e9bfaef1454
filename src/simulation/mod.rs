pub mod phase;
pub mod rule;
pub mod snapshot;
pub mod statistics;
pub mod weather;

use std::time::Instant;

use rand::Rng;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::simulation::SimulationConfig;
use crate::grid::{BuildError, Grid, WeatherFields};
use crate::persistence::Checkpoint;
use crate::simulation::phase::StepContext;
use crate::simulation::rule::{FireSpreadRule, RuleError};
use crate::simulation::snapshot::GridSnapshot;
use crate::simulation::statistics::StepStatistics;
use crate::simulation::weather::{DiurnalCycle, WeatherModel};

/// Result of executing a single step.
#[derive(Debug, Clone)]
pub struct StepResult {
    pub statistics: StepStatistics,
    /// Phase timings in ms: [compute, commit, statistics]
    pub phase_timings_ms: [f32; 3],
}

#[derive(Debug, Error)]
pub enum StepError {
    #[error("step count must be at least 1")]
    InvalidStepCount,
    #[error("time step must be a positive finite number, got {0}")]
    InvalidTimeStep(f32),
    /// The compute phase failed for at least one cell. The live grid, time
    /// and step index are exactly as they were before the step began.
    #[error("step {step} aborted: {} cell transition(s) failed", .errors.len())]
    Aborted { step: u64, errors: Vec<RuleError> },
}

/// Owns the grid and advances it in synchronous two-phase steps.
///
/// Every step computes all next states from the live buffer into the staged
/// buffer, then commits them together. `step` takes `&mut self`, so no reader
/// can observe a half-updated grid.
pub struct Simulation {
    grid: Grid,
    rule: FireSpreadRule,
    weather_model: Option<Box<dyn WeatherModel>>,
    time: f64,
    step_index: u64,
    seed: u64,
    dt: f32,
    parallel: bool,
    fire_active: bool,
}

impl Simulation {
    pub fn new(grid: Grid, rule: FireSpreadRule, dt: f32, seed: u64) -> Self {
        let fire_active = grid.cells().any(|c| c.fire().is_burning());
        Self {
            grid,
            rule,
            weather_model: None,
            time: 0.0,
            step_index: 0,
            seed,
            dt,
            parallel: true,
            fire_active,
        }
    }

    /// Build a simulation from a validated config.
    ///
    /// A `seed` of 0 picks a random root seed; the seed actually used is
    /// available from [`Simulation::seed`] and is stored in checkpoints.
    pub fn from_config(grid: Grid, config: &SimulationConfig) -> Self {
        let seed = if config.seed == 0 {
            rand::thread_rng().r#gen()
        } else {
            config.seed
        };
        Self::new(grid, FireSpreadRule::new(config.rule.clone()), config.dt, seed)
            .with_runtime_options(config)
    }

    /// Apply the execution settings of `config` (parallelism, weather model)
    /// without touching the clock, seed or rule.
    pub fn with_runtime_options(mut self, config: &SimulationConfig) -> Self {
        self.parallel = config.parallel;
        if config.diurnal_amplitude > 0.0 {
            self.weather_model = Some(Box::new(DiurnalCycle::new(
                config.diurnal_amplitude,
                config.diurnal_period,
            )));
        }
        self
    }

    /// Resume from a checkpoint. Continuing produces the same states as an
    /// uninterrupted run with the same rule.
    pub fn from_checkpoint(checkpoint: Checkpoint, rule: FireSpreadRule) -> Self {
        let Checkpoint {
            step,
            time,
            seed,
            dt,
            grid,
        } = checkpoint;
        let mut simulation = Self::new(grid, rule, dt, seed);
        simulation.step_index = step;
        simulation.time = time;
        simulation
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_weather_model(mut self, model: Box<dyn WeatherModel>) -> Self {
        self.weather_model = Some(model);
        self
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn rule(&self) -> &FireSpreadRule {
        &self.rule
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn step_index(&self) -> u64 {
        self.step_index
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn dt(&self) -> f32 {
        self.dt
    }

    pub fn fire_active(&self) -> bool {
        self.fire_active
    }

    /// Advance `n` full cycles and return the result of the last one.
    ///
    /// If a cycle fails, the cycles before it stay committed and the failing
    /// one leaves no trace.
    pub fn step(&mut self, n: u32) -> Result<StepResult, StepError> {
        if n == 0 {
            return Err(StepError::InvalidStepCount);
        }
        if !(self.dt.is_finite() && self.dt > 0.0) {
            return Err(StepError::InvalidTimeStep(self.dt));
        }

        let mut last = None;
        for _ in 0..n {
            last = Some(self.step_once()?);
        }
        last.ok_or(StepError::InvalidStepCount)
    }

    fn step_once(&mut self) -> Result<StepResult, StepError> {
        let step_start = Instant::now();
        let mut phase_timings = [0.0_f32; 3];

        // Phase 1: compute every next state into the staged buffer
        let compute_start = Instant::now();
        let ctx = StepContext {
            rule: &self.rule,
            weather: self.weather_model.as_deref(),
            root_seed: self.seed,
            step: self.step_index,
            time: self.time,
            dt: self.dt,
            parallel: self.parallel,
        };
        let outcome = phase::compute_phase(&mut self.grid, &ctx);
        phase_timings[0] = compute_start.elapsed().as_secs_f32() * 1000.0;

        if !outcome.errors.is_empty() {
            let step = self.step_index + 1;
            if let Some(first) = outcome.errors.first() {
                warn!(
                    step,
                    failed_cells = outcome.errors.len(),
                    first_error = %first,
                    "Step aborted, grid left at previous state"
                );
            }
            return Err(StepError::Aborted {
                step,
                errors: outcome.errors,
            });
        }

        // Phase 2: commit
        let commit_start = Instant::now();
        self.grid.commit();
        self.time += self.dt as f64;
        self.step_index += 1;
        phase_timings[1] = commit_start.elapsed().as_secs_f32() * 1000.0;

        // Phase 3: statistics
        let stats_start = Instant::now();
        let step_duration = step_start.elapsed().as_secs_f32() * 1000.0;
        let statistics = statistics::compute_statistics(
            &self.grid,
            self.step_index,
            self.time,
            outcome.recoveries,
            step_duration,
        );
        phase_timings[2] = stats_start.elapsed().as_secs_f32() * 1000.0;

        if outcome.recoveries.total() > 0 {
            debug!(
                step = self.step_index,
                probability_clamps = outcome.recoveries.probability_clamps,
                fuel_clamps = outcome.recoveries.fuel_clamps,
                "Out-of-range values clamped"
            );
        }

        if self.fire_active && !statistics.fire_active() {
            info!(
                step = self.step_index,
                time = self.time,
                burnt = statistics.burnt,
                burned_area_km2 = statistics.burned_area_km2,
                "Fire front extinct"
            );
        }
        self.fire_active = statistics.fire_active();

        Ok(StepResult {
            statistics,
            phase_timings_ms: phase_timings,
        })
    }

    /// Copy of every cell's position and state at the current step boundary.
    pub fn snapshot(&self) -> GridSnapshot {
        GridSnapshot::capture(&self.grid, self.step_index, self.time)
    }

    /// Replace the weather of every cell between steps.
    ///
    /// Fields are validated like the builder's; on error the grid is unchanged.
    pub fn refresh_weather(&mut self, fields: &WeatherFields) -> Result<(), BuildError> {
        let weather = fields.to_weather(self.grid.width(), self.grid.height())?;
        self.grid.replace_weather(weather);
        Ok(())
    }

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            step: self.step_index,
            time: self.time,
            seed: self.seed,
            dt: self.dt,
            grid: self.grid.clone(),
        }
    }
}
