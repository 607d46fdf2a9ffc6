use std::{cell::RefCell, path::PathBuf, rc::Rc};

use anyhow::Context;
use chrono::{DateTime, Utc};
use flightnet_evolution::{
    ControllerConfig, FitnessSource as _, GenerationController, GenerationEvent,
    GenerationObserver, HighScore, Scorekeeper,
    persistence::{JsonFileStore, MemoryStore, PersistenceStore},
};
use flightnet_network::Topology;
use serde::Serialize;

use crate::{
    corridor::{self, Corridor},
    util::{self, Output},
};

const DEFAULT_GENERATIONS: u32 = 20;
const DEFAULT_MAX_TICKS: u64 = 5000;

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct TrainArg {
    /// Controller settings file (JSON); missing settings keep their defaults
    #[arg(long)]
    config: Option<PathBuf>,
    /// Champion save file; the champion is only kept in memory when omitted
    #[arg(long)]
    save_file: Option<PathBuf>,
    /// Resume from the champion in the save file
    #[arg(long, requires = "save_file")]
    load: bool,
    /// Number of generations to run
    #[arg(long, default_value_t = DEFAULT_GENERATIONS)]
    generations: u32,
    /// Tick limit per generation; ships still flying are crashed when it is reached
    #[arg(long, default_value_t = DEFAULT_MAX_TICKS)]
    max_ticks: u64,
    /// Random seed for the controller and the corridor
    #[arg(long)]
    seed: Option<u64>,
    /// Training report output path (stdout when omitted)
    #[arg(long)]
    report: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
struct TrainingReport {
    trained_at: DateTime<Utc>,
    topology: Topology,
    roster_size: usize,
    seed: Option<u64>,
    high_score: HighScore,
    generations: Vec<GenerationSummary>,
}

#[derive(Debug, Clone, Serialize)]
struct GenerationSummary {
    generation: u32,
    ticks: u64,
    final_score: i32,
    new_high_score: bool,
    survivors: usize,
    high_score: HighScore,
}

/// Collects generation-end events for the summary.
struct EndedGenerations(Rc<RefCell<Vec<GenerationEvent>>>);

impl GenerationObserver for EndedGenerations {
    fn generation_ended(&mut self, event: &GenerationEvent) {
        self.0.borrow_mut().push(event.clone());
    }
}

pub(crate) fn run(arg: &TrainArg) -> anyhow::Result<()> {
    let TrainArg {
        config,
        save_file,
        load,
        generations,
        max_ticks,
        seed,
        report,
    } = arg;

    let mut config = match config {
        Some(path) => util::read_controller_config_file(path)?,
        None => ControllerConfig::default(),
    };
    if seed.is_some() {
        config.seed = *seed;
    }
    corridor::check_sensor_count(config.sensor_count())?;

    let store: Box<dyn PersistenceStore> = match save_file {
        Some(path) => Box::new(JsonFileStore::new(path)),
        None => Box::new(MemoryStore::new()),
    };
    let mut controller = GenerationController::new(config.clone(), store)
        .context("Invalid controller configuration")?;
    let ended = Rc::new(RefCell::new(vec![]));
    controller.add_observer(EndedGenerations(Rc::clone(&ended)));

    let mut corridor = Corridor::new(config.roster_size, config.seed);
    let mut score = Scorekeeper::new(corridor::STARTING_SCORE);

    eprintln!(
        "Training {} ships with topology {}...",
        config.roster_size, config.topology
    );
    controller.start_game(*load, &mut corridor, &mut score);
    if *load {
        let high_score = controller.high_score();
        eprintln!(
            "Resuming at generation #{} (high score {} from generation #{})",
            controller.generation(),
            high_score.score,
            high_score.generation
        );
    }

    let mut summaries = vec![];
    let mut ticks = 0;
    let mut new_high_score = false;
    while summaries.len() < usize::try_from(*generations)? {
        corridor.advance(&mut score);
        ticks += 1;
        if ticks >= *max_ticks {
            corridor.crash_all();
        }

        let final_score = score.score();
        let tick = controller.tick(&mut corridor, &mut score);
        new_high_score |= tick.new_high_score.is_some();
        let Some(generation) = tick.ended_generation else {
            continue;
        };

        let survivors = ended
            .borrow_mut()
            .pop()
            .map_or(0, |event| event.active_slots.len());
        let summary = GenerationSummary {
            generation,
            ticks,
            final_score,
            new_high_score,
            survivors,
            high_score: controller.high_score(),
        };
        eprintln!(
            "Generation #{generation}: {ticks} ticks, score {final_score}, high score {}{}",
            summary.high_score.score,
            if new_high_score { " (new)" } else { "" }
        );
        summaries.push(summary);
        ticks = 0;
        new_high_score = false;
    }
    controller.end_game(&mut corridor);

    if save_file.is_some() {
        controller
            .save_champion()
            .context("Failed to save champion")?;
    }

    let high_score = controller.high_score();
    let training_report = TrainingReport {
        trained_at: Utc::now(),
        topology: config.topology.clone(),
        roster_size: config.roster_size,
        seed: config.seed,
        high_score,
        generations: summaries,
    };
    Output::save_json(&training_report, report.clone())?;

    eprintln!();
    eprintln!("Training completed");
    eprintln!(
        "  High score: {} (generation #{})",
        high_score.score, high_score.generation
    );
    eprintln!("  Generations: {}", training_report.generations.len());
    if let Some(path) = save_file {
        eprintln!("  Champion: {}", path.display());
    }
    if let Some(path) = report {
        eprintln!("  Report: {}", path.display());
    }

    Ok(())
}
