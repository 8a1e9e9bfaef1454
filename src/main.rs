use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use wildfire::cli::commands;
use wildfire::config::simulation::SimulationConfig;
use wildfire::grid::generation::print_grid_summary;
use wildfire::persistence;

#[derive(Parser)]
#[command(name = "wildfire")]
#[command(about = "A stochastic cellular-automaton wildfire spread simulator")]
#[command(version)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a landscape and write the initial grid as a checkpoint
    Generate {
        /// Path to the landscape generation config file
        #[arg(short, long, default_value = "landscape.toml")]
        landscape: PathBuf,

        /// Output checkpoint directory (defaults to the configured one)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run the simulation from a checkpoint
    Run {
        /// Checkpoint file to start from (defaults to the latest valid one)
        #[arg(long)]
        checkpoint: Option<PathBuf>,

        /// Number of steps to run (defaults to `steps` in the config)
        #[arg(short, long)]
        steps: Option<u32>,
    },

    /// Inspect a cell or the whole grid in the latest checkpoint
    Inspect {
        /// Cell to inspect, as X,Y
        #[arg(long, value_parser = commands::parse_cell)]
        cell: Option<(u32, u32)>,

        /// Show a grid summary and map
        #[arg(long)]
        grid: bool,
    },

    /// Export a checkpoint as JSON for renderers
    Export {
        /// Output JSON file
        #[arg(short, long)]
        output: PathBuf,

        /// Checkpoint file to export (defaults to the latest valid one)
        #[arg(long)]
        checkpoint: Option<PathBuf>,
    },

    /// Manage checkpoints
    Checkpoints {
        #[command(subcommand)]
        action: CheckpointAction,
    },
}

#[derive(Subcommand)]
enum CheckpointAction {
    /// List available checkpoints
    List {
        /// Checkpoint directory (defaults to the configured one)
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },

    /// Load and summarise a checkpoint file
    Restore {
        /// Path to the checkpoint file
        file: PathBuf,
    },
}

fn init_tracing(config: &SimulationConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str()));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if config.log_format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn main() {
    let cli = Cli::parse();

    let config = match SimulationConfig::from_file_or_default(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            std::process::exit(1);
        }
    };
    init_tracing(&config);

    let checkpoint_dir = PathBuf::from(&config.checkpoint_directory);

    let result = match cli.command {
        Commands::Generate { landscape, output } => {
            let output = output.unwrap_or_else(|| checkpoint_dir.clone());
            commands::generate(&config, &landscape, &output).map(|_| ())
        }
        Commands::Run { checkpoint, steps } => {
            commands::run_simulation(&config, checkpoint.as_deref(), steps).map(|_| ())
        }
        Commands::Inspect { cell, grid } => commands::inspect(&config, cell, grid),
        Commands::Export { output, checkpoint } => {
            commands::export(&config, &output, checkpoint.as_deref())
        }
        Commands::Checkpoints { action } => match action {
            CheckpointAction::List { dir } => list_checkpoints(&dir.unwrap_or(checkpoint_dir)),
            CheckpointAction::Restore { file } => restore_checkpoint(&file),
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn list_checkpoints(dir: &Path) -> Result<(), String> {
    let checkpoints = persistence::list_checkpoints(dir)
        .map_err(|e| format!("Error listing checkpoints: {}", e))?;
    if checkpoints.is_empty() {
        println!("No checkpoints found in {}", dir.display());
        return Ok(());
    }

    println!("{:<40} {:>8} {:>12}", "File", "Step", "Size");
    println!("{}", "-".repeat(62));
    for c in &checkpoints {
        let name = c.path.file_name().and_then(|n| n.to_str()).unwrap_or("?");
        let size_kb = c.file_size / 1024;
        println!("{:<40} {:>8} {:>9} KB", name, c.step, size_kb);
    }
    println!("\n{} checkpoint(s) in {}", checkpoints.len(), dir.display());
    Ok(())
}

fn restore_checkpoint(path: &Path) -> Result<(), String> {
    let checkpoint = persistence::load_checkpoint(path)
        .map_err(|e| format!("Error restoring checkpoint: {}", e))?;
    println!("Restored grid from {}", path.display());
    println!(
        "Step {} | time {:.2} | seed {} | dt {}",
        checkpoint.step, checkpoint.time, checkpoint.seed, checkpoint.dt
    );
    print_grid_summary(&checkpoint.grid);
    Ok(())
}
