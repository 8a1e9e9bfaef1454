use std::fs;
use std::path::Path;

use tracing::{info, warn};

use crate::config::generation::GenerationParams;
use crate::config::simulation::SimulationConfig;
use crate::grid::generation::{generate_landscape, print_grid_summary};
use crate::persistence::{self, Checkpoint};
use crate::simulation::rule::FireSpreadRule;
use crate::simulation::snapshot::GridSnapshot;
use crate::simulation::Simulation;

/// Grids up to this width are drawn in full by `inspect --grid`.
const MAX_ASCII_WIDTH: u32 = 160;

/// Generate a landscape, build the initial grid and write it as the step-0
/// checkpoint in `output_dir`, together with the resolved landscape parameters.
pub fn generate(
    config: &SimulationConfig,
    landscape_path: &Path,
    output_dir: &Path,
) -> Result<Checkpoint, String> {
    let params = GenerationParams::from_file(landscape_path)
        .map_err(|e| format!("Error loading landscape config: {}", e))?;
    println!("Generating landscape from {}...", landscape_path.display());

    let landscape = generate_landscape(&params);
    let grid = landscape
        .build_grid()
        .map_err(|e| format!("Cannot build grid: {}", e))?;
    print_grid_summary(&grid);
    println!("Seed: {}", landscape.params.seed);
    println!("Ignitions: {}", landscape.ignitions.len());

    let checkpoint = Simulation::from_config(grid, config).checkpoint();
    let path = persistence::save_checkpoint(&checkpoint, output_dir)
        .map_err(|e| format!("Cannot save checkpoint: {}", e))?;

    let resolved = toml::to_string_pretty(&landscape.params)
        .map_err(|e| format!("Cannot serialize landscape parameters: {}", e))?;
    fs::write(output_dir.join("landscape.resolved.toml"), resolved)
        .map_err(|e| format!("Cannot write landscape parameters: {}", e))?;

    println!("\nGrid saved to {}", path.display());
    Ok(checkpoint)
}

fn load_checkpoint_or_latest(
    config: &SimulationConfig,
    checkpoint_path: Option<&Path>,
) -> Result<Checkpoint, String> {
    match checkpoint_path {
        Some(path) => persistence::load_checkpoint(path)
            .map_err(|e| format!("Failed to load checkpoint {}: {}", path.display(), e)),
        None => persistence::load_latest_valid_checkpoint(Path::new(&config.checkpoint_directory))
            .map_err(|e| format!("Failed to load checkpoint: {}", e)),
    }
}

/// Run the simulation from a checkpoint for `steps` steps (or `config.steps`).
///
/// Saves a checkpoint every `checkpoint_interval` steps and once at the end,
/// and stops early once the fire has burnt out.
pub fn run_simulation(
    config: &SimulationConfig,
    checkpoint_path: Option<&Path>,
    steps: Option<u32>,
) -> Result<Simulation, String> {
    let checkpoint = load_checkpoint_or_latest(config, checkpoint_path)?;
    if checkpoint.dt != config.dt {
        warn!(
            checkpoint_dt = checkpoint.dt,
            config_dt = config.dt,
            "Checkpoint time step differs from config, keeping the checkpoint's"
        );
    }

    let mut sim = Simulation::from_checkpoint(checkpoint, FireSpreadRule::new(config.rule.clone()))
        .with_runtime_options(config);
    let checkpoint_dir = Path::new(&config.checkpoint_directory);
    let steps = steps.unwrap_or(config.steps);

    info!(
        width = sim.grid().width(),
        height = sim.grid().height(),
        step = sim.step_index(),
        seed = sim.seed(),
        steps,
        parallel = config.parallel,
        "Simulation starting"
    );

    let mut steps_since_checkpoint: u32 = 0;
    for _ in 0..steps {
        let result = sim.step(1).map_err(|e| format!("Simulation error: {}", e))?;
        let stats = &result.statistics;

        if stats.step % config.report_interval as u64 == 0 {
            info!(
                step = stats.step,
                time = stats.time,
                burning = stats.burning,
                burnt = stats.burnt,
                burned_area_km2 = stats.burned_area_km2,
                total_fuel = stats.total_fuel,
                step_ms = stats.step_duration_ms,
                "Progress"
            );
        }

        steps_since_checkpoint += 1;
        if steps_since_checkpoint >= config.checkpoint_interval {
            save_and_prune(&sim, config, checkpoint_dir);
            steps_since_checkpoint = 0;
        }

        if !sim.fire_active() {
            info!(step = stats.step, "No burning cells left, stopping");
            break;
        }
    }

    if steps_since_checkpoint > 0 {
        save_and_prune(&sim, config, checkpoint_dir);
    }

    info!(step = sim.step_index(), time = sim.time(), "Simulation stopped");
    Ok(sim)
}

fn save_and_prune(sim: &Simulation, config: &SimulationConfig, dir: &Path) {
    match persistence::save_checkpoint(&sim.checkpoint(), dir) {
        Ok(path) => {
            info!(path = %path.display(), step = sim.step_index(), "Checkpoint saved");
            if let Err(e) = persistence::prune_checkpoints(dir, config.max_checkpoints as usize) {
                warn!(error = %e, "Checkpoint pruning failed");
            }
        }
        Err(e) => warn!(error = %e, "Checkpoint save failed"),
    }
}

/// Inspect a cell or the whole grid from the latest checkpoint.
pub fn inspect(
    config: &SimulationConfig,
    cell: Option<(u32, u32)>,
    show_grid: bool,
) -> Result<(), String> {
    let checkpoint = load_checkpoint_or_latest(config, None)?;
    let snapshot = GridSnapshot::capture(&checkpoint.grid, checkpoint.step, checkpoint.time);

    if let Some((x, y)) = cell {
        inspect_cell(&snapshot, x, y)
    } else if show_grid {
        inspect_grid(&checkpoint);
        if snapshot.width <= MAX_ASCII_WIDTH {
            println!();
            print!("{}", snapshot.render_ascii());
        }
        Ok(())
    } else {
        Err("Specify --cell <X,Y> or --grid".to_string())
    }
}

fn inspect_cell(snapshot: &GridSnapshot, x: u32, y: u32) -> Result<(), String> {
    let cell = snapshot.cell(x, y).ok_or_else(|| {
        format!(
            "Cell ({}, {}) not found (grid is {}x{})",
            x, y, snapshot.width, snapshot.height
        )
    })?;

    println!("=== Cell ({}, {}) at step {} ===", cell.x, cell.y, snapshot.step);
    println!();
    println!("--- Terrain ---");
    println!("  Water: {}", cell.is_water);
    println!("  Tree coverage: {:.3}", cell.tree_coverage);
    println!();
    println!("--- Fire ---");
    println!("  State: {:?}", cell.fire);
    println!("  Fuel: {:.3}", cell.fuel);
    println!("  P(ignite): {:.4}", cell.p_ignite);
    println!("  P(extinguish): {:.4}", cell.p_extinguish);
    println!();
    println!("--- Weather ---");
    println!("  Temperature: {:.1}°C", cell.weather.temperature);
    println!("  Humidity: {:.3}", cell.weather.humidity);
    println!("  Rain: {:.2} mm", cell.weather.rain_volume);
    println!(
        "  Wind: {:.1} m/s toward {:.0}° (counter-clockwise from east)",
        cell.weather.wind_speed,
        cell.weather.wind_direction.to_degrees()
    );

    Ok(())
}

fn inspect_grid(checkpoint: &Checkpoint) {
    println!("=== Checkpoint ===");
    println!("Step: {}", checkpoint.step);
    println!("Time: {:.2}", checkpoint.time);
    println!("Seed: {}", checkpoint.seed);
    println!("dt: {}", checkpoint.dt);
    println!();
    print_grid_summary(&checkpoint.grid);
}

/// Write the full grid snapshot as JSON for downstream renderers.
pub fn export(
    config: &SimulationConfig,
    output: &Path,
    checkpoint_path: Option<&Path>,
) -> Result<(), String> {
    let checkpoint = load_checkpoint_or_latest(config, checkpoint_path)?;
    let snapshot = GridSnapshot::capture(&checkpoint.grid, checkpoint.step, checkpoint.time);

    let file = fs::File::create(output)
        .map_err(|e| format!("Cannot create {}: {}", output.display(), e))?;
    serde_json::to_writer(std::io::BufWriter::new(file), &snapshot)
        .map_err(|e| format!("Cannot write snapshot JSON: {}", e))?;

    println!(
        "Exported {} cells at step {} to {}",
        snapshot.cells.len(),
        snapshot.step,
        output.display()
    );
    Ok(())
}

/// Parse an `X,Y` cell coordinate.
pub fn parse_cell(s: &str) -> Result<(u32, u32), String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected X,Y, got '{}'", s))?;
    let x = x
        .trim()
        .parse::<u32>()
        .map_err(|e| format!("invalid x '{}': {}", x, e))?;
    let y = y
        .trim()
        .parse::<u32>()
        .map_err(|e| format!("invalid y '{}': {}", y, e))?;
    Ok((x, y))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::cell::FireState;
    use tempfile::TempDir;

    const LANDSCAPE: &str = r#"
        seed = 11
        width = 24
        height = 16
        water_ratio = 0.0
        tree_density = 0.9
        roughness = 0.2
        wind_speed = 3.0
        ignitions = [[12, 8]]
    "#;

    fn test_config(dir: &Path) -> SimulationConfig {
        SimulationConfig {
            seed: 5,
            steps: 20,
            checkpoint_interval: 5,
            max_checkpoints: 2,
            checkpoint_directory: dir.join("checkpoints").display().to_string(),
            ..SimulationConfig::default()
        }
    }

    fn generate_into(dir: &Path, config: &SimulationConfig) -> Checkpoint {
        let landscape = dir.join("landscape.toml");
        fs::write(&landscape, LANDSCAPE).unwrap();
        generate(config, &landscape, Path::new(&config.checkpoint_directory)).unwrap()
    }

    #[test]
    fn parse_cell_accepts_pairs() {
        assert_eq!(parse_cell("3,4").unwrap(), (3, 4));
        assert_eq!(parse_cell(" 10 , 0 ").unwrap(), (10, 0));
        assert!(parse_cell("3").is_err());
        assert!(parse_cell("a,1").is_err());
        assert!(parse_cell("1,-2").is_err());
    }

    #[test]
    fn generate_writes_step_zero_checkpoint() {
        let dir = TempDir::new().unwrap();
        let config = test_config(dir.path());
        let checkpoint = generate_into(dir.path(), &config);

        assert_eq!(checkpoint.step, 0);
        assert_eq!(checkpoint.seed, 5);
        assert_eq!(checkpoint.grid.width(), 24);
        let ckpt_dir = Path::new(&config.checkpoint_directory);
        assert_eq!(persistence::list_checkpoints(ckpt_dir).unwrap().len(), 1);
        let resolved = GenerationParams::from_file(&ckpt_dir.join("landscape.resolved.toml")).unwrap();
        assert_eq!(resolved.seed, 11);
    }

    #[test]
    fn run_continues_from_latest_checkpoint_and_prunes() {
        let dir = TempDir::new().unwrap();
        let config = test_config(dir.path());
        generate_into(dir.path(), &config);

        let sim = run_simulation(&config, None, Some(12)).unwrap();
        assert!(sim.step_index() >= 1 && sim.step_index() <= 12);
        assert!(sim.grid().cells().any(|c| c.fire() != FireState::Unburnt));

        let ckpt_dir = Path::new(&config.checkpoint_directory);
        let listed = persistence::list_checkpoints(ckpt_dir).unwrap();
        assert!(listed.len() <= 2);
        let latest = persistence::load_latest_valid_checkpoint(ckpt_dir).unwrap();
        assert_eq!(latest.step, sim.step_index());
    }

    #[test]
    fn run_without_checkpoints_fails() {
        let dir = TempDir::new().unwrap();
        let config = test_config(dir.path());
        let err = match run_simulation(&config, None, Some(1)) {
            Err(e) => e,
            Ok(_) => panic!("run without a checkpoint should fail"),
        };
        assert!(err.contains("No valid checkpoints"));
    }

    #[test]
    fn export_writes_snapshot_json() {
        let dir = TempDir::new().unwrap();
        let config = test_config(dir.path());
        generate_into(dir.path(), &config);

        let out = dir.path().join("snapshot.json");
        export(&config, &out, None).unwrap();
        let snapshot: GridSnapshot =
            serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(snapshot.cells.len(), 24 * 16);
        assert_eq!(snapshot.cell(12, 8).unwrap().fire, FireState::Burning);
    }

    #[test]
    fn inspect_requires_a_target() {
        let dir = TempDir::new().unwrap();
        let config = test_config(dir.path());
        generate_into(dir.path(), &config);

        assert!(inspect(&config, None, false).is_err());
        assert!(inspect(&config, Some((1, 1)), false).is_ok());
        assert!(inspect(&config, Some((99, 1)), false).is_err());
        assert!(inspect(&config, None, true).is_ok());
    }
}
