//! Generation lifecycle state machine.
//!
//! [`GenerationController`] owns the population, the champion, and the
//! generation counter. The caller drives it with [`tick`](GenerationController::tick)
//! and lends it the [`Environment`] and [`FitnessSource`] on every call.
//!
//! # Lifecycle
//!
//! ```text
//! Idle --start_game--> Running --(population finished)--> EndingGeneration
//!                        ^                                      |
//!                        +-------- spawn next generation -------+
//!
//! Running --end_game--> EndingGeneration --> Idle
//! ```
//!
//! Each tick every active agent, in slot order, senses, thinks, and acts. The
//! environment is then asked whether the agent crashed. A crashed agent's
//! weights are compared against the champion using the current score:
//!
//! - a strictly higher score makes them the new champion (and saves it when
//!   configured to)
//! - weights that differ from the champion become the runner-up, which the
//!   next generation's runner-up slots fly with
//!
//! The generation ends once no agent is active, or, when configured, once the
//! unmutated champion copy in slot 0 is the only survivor.

use std::{collections::BTreeMap, fmt};

use flightnet_network::{InputLengthError, Network, WeightTensor, mutation};
use rand::SeedableRng as _;
use rand_pcg::Pcg32;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::{
    Action, Agent, AgentStatus, ConfigError, ControllerConfig, Environment, FitnessSource,
    GenerationEvent, GenerationObserver,
    persistence::{PersistenceError, PersistenceStore},
    roster::{CHAMPION_SLOT, MutationTier, Roster, SlotTag},
};

/// Variance of freshly randomized weights.
const INIT_VARIANCE: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::IsVariant)]
pub enum ControllerState {
    /// No game in progress.
    Idle,
    /// A generation is flying.
    Running,
    /// A generation is being torn down; observers are being notified.
    EndingGeneration,
}

/// Best weights found so far.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Champion {
    pub weights: WeightTensor,
    pub score: i32,
    /// Generation that reached `score`. Zero for an untested random champion.
    pub generation: u32,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HighScore {
    pub score: i32,
    pub generation: u32,
}

/// An agent whose network rejected its sensor vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentFailure {
    pub slot: usize,
    pub error: InputLengthError,
}

/// What happened during one [`tick`](GenerationController::tick).
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TickReport {
    /// Slots that crashed this tick, in slot order.
    pub terminated: Vec<usize>,
    /// Set when a crash this tick raised the high score.
    pub new_high_score: Option<HighScore>,
    pub failures: Vec<AgentFailure>,
    /// Generation that finished at the end of this tick.
    pub ended_generation: Option<u32>,
}

/// Alive and crashed agents sharing one slot tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TagHealth {
    pub tag: SlotTag,
    pub alive: usize,
    pub terminated: usize,
}

/// Runs generations of agents and keeps the best weights.
pub struct GenerationController<S> {
    config: ControllerConfig,
    roster: Roster,
    store: S,
    rng: Pcg32,
    observers: Vec<Box<dyn GenerationObserver>>,
    state: ControllerState,
    paused: bool,
    generation: u32,
    champion: Option<Champion>,
    runner_up: Option<WeightTensor>,
    agents: Vec<Agent>,
    sensors: Vec<f32>,
}

impl<S> fmt::Debug for GenerationController<S>
where
    S: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationController")
            .field("config", &self.config)
            .field("store", &self.store)
            .field("state", &self.state)
            .field("paused", &self.paused)
            .field("generation", &self.generation)
            .field("champion", &self.champion)
            .field("agents", &self.agents.len())
            .field("observers", &self.observers.len())
            .finish_non_exhaustive()
    }
}

impl<S> GenerationController<S>
where
    S: PersistenceStore,
{
    /// Creates an idle controller.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` does not pass [`ControllerConfig::validate`].
    pub fn new(config: ControllerConfig, store: S) -> Result<Self, ConfigError> {
        config.validate()?;
        let rng = match config.seed {
            Some(seed) => Pcg32::seed_from_u64(seed),
            None => Pcg32::from_os_rng(),
        };
        let roster = Roster::standard(config.roster_size, config.variance_tiers);
        let sensors = Vec::with_capacity(config.topology.inputs());
        Ok(Self {
            config,
            roster,
            store,
            rng,
            observers: vec![],
            state: ControllerState::Idle,
            paused: false,
            generation: 0,
            champion: None,
            runner_up: None,
            agents: vec![],
            sensors,
        })
    }

    /// Registers an observer notified after the environment.
    pub fn add_observer<O>(&mut self, observer: O)
    where
        O: GenerationObserver + 'static,
    {
        self.observers.push(Box::new(observer));
    }

    /// Starts a new game and spawns its first generation.
    ///
    /// A game already in progress is ended first. With `load_saved`, the
    /// stored champion is adopted and the game resumes at the generation after
    /// the one that set its score. A failed load is logged and the game starts
    /// from random weights at generation 1.
    pub fn start_game<E, F>(&mut self, load_saved: bool, env: &mut E, fitness: &mut F)
    where
        E: Environment + ?Sized,
        F: FitnessSource + ?Sized,
    {
        self.end_game(env);
        self.champion = None;
        self.runner_up = None;

        if load_saved {
            match self.store.load(&self.config.topology) {
                Ok(saved) if *saved.weights.topology() == self.config.topology => {
                    info!(
                        high_score = saved.high_score,
                        generation = saved.generation,
                        "loaded saved champion"
                    );
                    self.champion = Some(Champion {
                        weights: saved.weights,
                        score: saved.high_score,
                        generation: saved.generation,
                    });
                }
                Ok(saved) => warn!(
                    found = %saved.weights.topology(),
                    expected = %self.config.topology,
                    "saved champion has the wrong topology, starting fresh"
                ),
                Err(err) => warn!(error = %err, "could not load saved champion, starting fresh"),
            }
        }

        let first = self
            .champion
            .as_ref()
            .map_or(0, |champion| champion.generation)
            .saturating_add(1);
        self.begin_generation(first, env, fitness);
    }

    /// Advances every active agent by one step.
    ///
    /// Does nothing unless a generation is running and the controller is not
    /// paused. When the population finishes, the next generation is spawned
    /// before returning.
    pub fn tick<E, F>(&mut self, env: &mut E, fitness: &mut F) -> TickReport
    where
        E: Environment + ?Sized,
        F: FitnessSource + ?Sized,
    {
        let mut report = TickReport::default();
        if !self.state.is_running() || self.paused {
            return report;
        }

        for slot in 0..self.agents.len() {
            if !self.agents[slot].is_active() {
                continue;
            }
            self.drive_agent(slot, env, fitness.score(), &mut report);
            if env.is_terminated(slot) {
                self.record_termination(slot, fitness.score(), &mut report);
            }
        }

        if self.population_finished() {
            report.ended_generation = Some(self.generation);
            self.finish_generation(env);
            self.begin_generation(self.generation.saturating_add(1), env, fitness);
        }
        report
    }

    /// Ends the running game without spawning another generation.
    ///
    /// Observers receive the generation end. Does nothing when idle.
    pub fn end_game<E>(&mut self, env: &mut E)
    where
        E: Environment + ?Sized,
    {
        if self.state.is_idle() {
            return;
        }
        self.finish_generation(env);
        self.agents.clear();
        self.state = ControllerState::Idle;
        info!(generation = self.generation, "game ended");
    }

    /// Saves the current champion.
    ///
    /// Returns `false` when there is no champion to save.
    ///
    /// # Errors
    ///
    /// Returns the store's error if the save fails.
    pub fn save_champion(&mut self) -> Result<bool, PersistenceError> {
        let Some(champion) = &self.champion else {
            debug!("no champion to save");
            return Ok(false);
        };
        self.store
            .save(&champion.weights, champion.score, champion.generation)?;
        info!(
            score = champion.score,
            generation = champion.generation,
            "saved champion"
        );
        Ok(true)
    }

    fn begin_generation<E, F>(&mut self, generation: u32, env: &mut E, fitness: &mut F)
    where
        E: Environment + ?Sized,
        F: FitnessSource + ?Sized,
    {
        self.generation = generation;
        fitness.reset();

        let champion = self.champion.get_or_insert_with(|| Champion {
            weights: WeightTensor::random(self.config.topology.clone(), &mut self.rng, INIT_VARIANCE),
            score: 0,
            generation: 0,
        });
        let runner_up = self
            .runner_up
            .take()
            .filter(|weights| *weights != champion.weights);
        self.agents = spawn_agents(
            &self.roster,
            &self.config,
            champion,
            runner_up.as_ref(),
            &mut self.rng,
        );
        self.state = ControllerState::Running;

        let event = self.event();
        info!(
            generation,
            high_score = event.high_score.score,
            agents = event.active_slots.len(),
            "generation started"
        );
        env.generation_started(&event);
        for observer in &mut self.observers {
            observer.generation_started(&event);
        }
    }

    fn finish_generation<E>(&mut self, env: &mut E)
    where
        E: Environment + ?Sized,
    {
        self.state = ControllerState::EndingGeneration;

        let event = self.event();
        info!(
            generation = self.generation,
            high_score = event.high_score.score,
            survivors = event.active_slots.len(),
            "generation ended"
        );
        env.generation_ended(&event);
        for observer in &mut self.observers {
            observer.generation_ended(&event);
        }
    }

    fn drive_agent<E>(&mut self, slot: usize, env: &mut E, score: i32, report: &mut TickReport)
    where
        E: Environment + ?Sized,
    {
        let agent = &mut self.agents[slot];
        let action = if self.config.hold_until_scoring && score <= 0 {
            agent.hold()
        } else {
            self.sensors.clear();
            env.sense(slot, &mut self.sensors);
            if self.config.feed_last_action {
                self.sensors.push(agent.action().direction());
            }
            match agent.think(&self.sensors) {
                Ok(action) => action,
                Err(error) => {
                    error!(slot, %error, "sensor vector does not fit the network");
                    report.failures.push(AgentFailure { slot, error });
                    agent.hold()
                }
            }
        };
        env.act(slot, action);
    }

    fn record_termination(&mut self, slot: usize, score: i32, report: &mut TickReport) {
        let agent = &mut self.agents[slot];
        agent.terminate(score);
        report.terminated.push(slot);
        debug!(slot, tag = %agent.tag(), score, "agent terminated");

        let Some(champion) = &mut self.champion else {
            return;
        };
        let weights = agent.network().weights();
        if score > champion.score {
            champion.weights = weights.clone();
            champion.score = score;
            champion.generation = self.generation;
            info!(
                score,
                generation = self.generation,
                tag = %agent.tag(),
                "new high score"
            );
            report.new_high_score = Some(HighScore {
                score,
                generation: self.generation,
            });
            if self.config.save_on_new_high_score
                && let Err(err) = self.store.save(weights, score, self.generation)
            {
                warn!(error = %err, "failed to save new champion");
            }
        }
        if champion.weights != *weights {
            self.runner_up = Some(weights.clone());
        }
    }

    fn population_finished(&self) -> bool {
        let mut active = self.agents.iter().filter(|agent| agent.is_active());
        match (active.next(), active.next()) {
            (None, _) => true,
            (Some(agent), None) => {
                self.config.end_on_sole_champion_copy && agent.slot() == CHAMPION_SLOT
            }
            (Some(_), Some(_)) => false,
        }
    }

    fn event(&self) -> GenerationEvent {
        GenerationEvent {
            generation: self.generation,
            high_score: self.high_score(),
            active_slots: self
                .agents
                .iter()
                .filter(|agent| agent.is_active())
                .map(Agent::slot)
                .collect(),
        }
    }
}

impl<S> GenerationController<S> {
    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Enables or disables ending on a sole champion copy.
    ///
    /// A single-slot roster keeps it disabled.
    pub fn set_end_on_sole_champion_copy(&mut self, enabled: bool) {
        self.config.end_on_sole_champion_copy = enabled && self.roster.len() > 1;
    }

    /// Flips `end_on_sole_champion_copy` and returns the new value.
    pub fn toggle_end_on_sole_champion_copy(&mut self) -> bool {
        self.set_end_on_sole_champion_copy(!self.config.end_on_sole_champion_copy);
        self.config.end_on_sole_champion_copy
    }

    pub fn set_save_on_new_high_score(&mut self, enabled: bool) {
        self.config.save_on_new_high_score = enabled;
    }

    /// Flips `save_on_new_high_score` and returns the new value.
    pub fn toggle_save_on_new_high_score(&mut self) -> bool {
        self.config.save_on_new_high_score = !self.config.save_on_new_high_score;
        self.config.save_on_new_high_score
    }

    #[must_use]
    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    #[must_use]
    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    #[must_use]
    pub fn state(&self) -> ControllerState {
        self.state
    }

    /// Index of the current (or last) generation. Zero before the first game.
    #[must_use]
    pub fn generation(&self) -> u32 {
        self.generation
    }

    #[must_use]
    pub fn high_score(&self) -> HighScore {
        self.champion
            .as_ref()
            .map_or_else(HighScore::default, |champion| HighScore {
                score: champion.score,
                generation: champion.generation,
            })
    }

    #[must_use]
    pub fn champion(&self) -> Option<&Champion> {
        self.champion.as_ref()
    }

    /// Agents of the current generation, indexed by slot.
    #[must_use]
    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    #[must_use]
    pub fn agent_action(&self, slot: usize) -> Option<Action> {
        self.agents.get(slot).map(Agent::action)
    }

    /// Alive and crashed counts per tag, ignoring benched agents.
    #[must_use]
    pub fn roster_health(&self) -> Vec<TagHealth> {
        let mut tally = BTreeMap::new();
        for agent in self.agents.iter().filter(|agent| !agent.status().is_benched()) {
            let health = tally.entry(agent.tag()).or_insert(TagHealth {
                tag: agent.tag(),
                alive: 0,
                terminated: 0,
            });
            if agent.is_active() {
                health.alive += 1;
            } else {
                health.terminated += 1;
            }
        }
        tally.into_values().collect()
    }
}

fn spawn_agents(
    roster: &Roster,
    config: &ControllerConfig,
    champion: &Champion,
    runner_up: Option<&WeightTensor>,
    rng: &mut Pcg32,
) -> Vec<Agent> {
    roster
        .slots()
        .iter()
        .enumerate()
        .map(|(slot, &roster_slot)| {
            let (weights, status) = match roster_slot.tier {
                MutationTier::Unmutated => (Some(champion.weights.clone()), AgentStatus::Active),
                MutationTier::Variance(variance) => (
                    Some(mutation::perturb(&champion.weights, variance, rng)),
                    AgentStatus::Active,
                ),
                MutationTier::FullReset => (None, AgentStatus::Active),
                MutationTier::CopyRunnerUp => match runner_up {
                    Some(weights) => (Some(weights.clone()), AgentStatus::Active),
                    None => (None, AgentStatus::Benched),
                },
            };
            let network = Network::new(config.topology.clone(), weights, config.use_bias, rng)
                .expect("champion weights should match the configured topology");
            debug!(slot, tag = %roster_slot.tag, ?status, "spawned agent");
            Agent::new(slot, roster_slot, network, status)
        })
        .collect()
}
