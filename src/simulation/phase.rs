use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

use crate::grid::cell::CellState;
use crate::grid::{Grid, GridView};
use crate::simulation::rule::{FireSpreadRule, Recoveries, RuleError};
use crate::simulation::weather::WeatherModel;

/// Everything the compute phase needs besides the grid itself.
pub(crate) struct StepContext<'a> {
    pub rule: &'a FireSpreadRule,
    pub weather: Option<&'a dyn WeatherModel>,
    pub root_seed: u64,
    /// Index of the step being computed (the pre-step step index).
    pub step: u64,
    pub time: f64,
    pub dt: f32,
    pub parallel: bool,
}

/// Aggregate outcome of one compute phase.
#[derive(Debug, Default)]
pub(crate) struct ComputeOutcome {
    pub recoveries: Recoveries,
    pub errors: Vec<RuleError>,
}

/// Compute phase: evaluate the rule for every cell against the live buffer
/// and write each result into the staged buffer.
///
/// The live buffer is never written here, so every cell sees the same
/// pre-step state no matter the evaluation order. Parallel and sequential
/// execution produce identical staged buffers because each cell draws from
/// its own random stream.
pub(crate) fn compute_phase(grid: &mut Grid, ctx: &StepContext<'_>) -> ComputeOutcome {
    let (view, staged) = grid.stage_buffers();

    let evaluate = |(i, slot): (usize, &mut CellState)| evaluate_cell(&view, ctx, i, slot);

    let results: Vec<Result<Recoveries, RuleError>> = if ctx.parallel {
        staged.par_iter_mut().enumerate().map(&evaluate).collect()
    } else {
        staged.iter_mut().enumerate().map(&evaluate).collect()
    };

    let mut outcome = ComputeOutcome::default();
    for result in results {
        match result {
            Ok(recoveries) => outcome.recoveries.merge(recoveries),
            Err(err) => outcome.errors.push(err),
        }
    }
    outcome
}

fn evaluate_cell(
    view: &GridView<'_>,
    ctx: &StepContext<'_>,
    index: usize,
    slot: &mut CellState,
) -> Result<Recoveries, RuleError> {
    let cell = view.cell_at(index);
    let neighbourhood = view.neighbours(cell.x, cell.y);
    let mut rng = ChaCha8Rng::seed_from_u64(cell_rng_seed(ctx.root_seed, cell.x, cell.y, ctx.step));

    let mut transition = ctx.rule.compute_next(cell, &neighbourhood, ctx.dt, &mut rng)?;

    if let Some(model) = ctx.weather {
        let weather = model.advance(cell.x, cell.y, cell.weather(), ctx.time, ctx.dt);
        if let Some(field) = weather.first_non_finite() {
            return Err(RuleError::NonFinite {
                x: cell.x,
                y: cell.y,
                field,
            });
        }
        transition.next.weather = weather;
    }

    *slot = transition.next;
    Ok(transition.recoveries)
}

/// Deterministic RNG seed for one cell in one step.
///
/// Depends only on the root seed, the cell position and the step index, never
/// on which worker evaluates the cell.
pub fn cell_rng_seed(root_seed: u64, x: u32, y: u32, step: u64) -> u64 {
    let position = ((y as u64) << 32) | x as u64;
    root_seed
        .wrapping_mul(6364136223846793005)
        .wrapping_add(step)
        .wrapping_mul(1442695040888963407)
        .wrapping_add(position)
        .wrapping_mul(6364136223846793005)
}
