use std::path::PathBuf;

use anyhow::Context;
use flightnet_evolution::{
    ControllerConfig, FitnessSource as _, GenerationController, Scorekeeper,
    persistence::{JsonFileStore, MemoryStore},
};

use crate::corridor::{self, Corridor};

const DEFAULT_MAX_TICKS: u64 = 20_000;

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct EvaluateArg {
    /// Champion save file
    #[arg(long)]
    save_file: PathBuf,
    /// Tick limit; the flight is stopped when it is reached
    #[arg(long, default_value_t = DEFAULT_MAX_TICKS)]
    max_ticks: u64,
    /// Random seed for the corridor
    #[arg(long)]
    seed: Option<u64>,
}

pub(crate) fn run(arg: &EvaluateArg) -> anyhow::Result<()> {
    let EvaluateArg {
        save_file,
        max_ticks,
        seed,
    } = arg;

    let record = JsonFileStore::new(save_file)
        .read_record()
        .with_context(|| format!("Failed to read champion file: {}", save_file.display()))?;
    let topology = record.topology.clone();
    let champion = record
        .into_champion(&topology)
        .with_context(|| format!("Unusable champion in {}", save_file.display()))?;

    // only the unmutated champion copy flies, and nothing is written back
    let config = ControllerConfig {
        topology,
        roster_size: 1,
        end_on_sole_champion_copy: false,
        save_on_new_high_score: false,
        seed: *seed,
        ..ControllerConfig::default()
    };
    corridor::check_sensor_count(config.sensor_count())?;

    eprintln!(
        "Evaluating champion from generation #{} (high score {})...",
        champion.generation, champion.high_score
    );
    let store = MemoryStore::with_saved(champion);
    let mut controller =
        GenerationController::new(config, store).context("Invalid controller configuration")?;
    let mut corridor = Corridor::new(1, *seed);
    let mut score = Scorekeeper::new(corridor::STARTING_SCORE);
    controller.start_game(true, &mut corridor, &mut score);

    let mut ticks = 0;
    let final_score = loop {
        corridor.advance(&mut score);
        ticks += 1;
        if ticks >= *max_ticks {
            corridor.crash_all();
        }
        let final_score = score.score();
        if controller
            .tick(&mut corridor, &mut score)
            .ended_generation
            .is_some()
        {
            break final_score;
        }
    };
    controller.end_game(&mut corridor);

    eprintln!();
    eprintln!("Evaluation completed");
    eprintln!("  Ticks: {ticks}");
    if ticks >= *max_ticks {
        eprintln!("  Stopped at the tick limit");
    }
    println!("{final_score}");

    Ok(())
}
