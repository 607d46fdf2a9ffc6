//! Generational training of flightnet agents.
//!
//! This crate evolves [`flightnet_network`] weights by letting a population of
//! agents fly until they crash and keeping the weights that scored best.
//!
//! - [`GenerationController`] - Generation lifecycle, champion and runner-up bookkeeping
//! - [`roster`] - Which weights each population slot is spawned with
//! - [`Agent`] - A slot flying one network
//! - [`Environment`] / [`GenerationObserver`] - The world agents fly in, and boundary notifications
//! - [`FitnessSource`] / [`Scorekeeper`] - The score used as fitness
//! - [`persistence`] - Champion storage (JSON file or memory)
//!
//! # Architecture
//!
//! ```text
//! caller loop
//!   ├─ advance the world, increment the score
//!   └─ GenerationController::tick(env, fitness)
//!        ├─ per active agent: Environment::sense → Network::calculate → Environment::act
//!        ├─ Environment::is_terminated → champion / runner-up update → PersistenceStore::save
//!        └─ population finished → generation_ended → spawn from roster → generation_started
//! ```
//!
//! The controller never owns the environment or the score. Both are lent to it
//! for the duration of each call, so the caller keeps full control of the
//! simulation.
//!
//! # Current Limitations
//!
//! - **Single champion**: only the best tensor and one runner-up carry over between generations
//! - **No crossover**: new weights come from perturbation or full randomization only
//! - **Single-threaded**: agents are evaluated one after another inside `tick`
//! - **Weights only**: with `use_bias` set, biases are redrawn per agent and never saved

pub use self::{agent::*, config::*, controller::*, fitness::*, observer::*};

mod agent;
mod config;
mod controller;
mod fitness;
mod observer;
pub mod persistence;
pub mod roster;

/// Invalid [`ControllerConfig`] settings.
#[derive(Debug, Clone, Copy, PartialEq, derive_more::Display, derive_more::Error)]
pub enum ConfigError {
    #[display("roster must have at least one slot")]
    EmptyRoster,
    #[display("variance for roster slot {slot} must be within 0..=2, got {variance}")]
    InvalidVariance { slot: usize, variance: f32 },
    #[display("a single-slot roster would end every generation on its first tick")]
    SoleChampionRoster,
    #[display(
        "feeding the last action back needs at least 2 network inputs, topology has {inputs}"
    )]
    NoSensorInputs { inputs: usize },
}
