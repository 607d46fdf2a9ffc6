use std::{cell::RefCell, collections::BTreeSet, io, path::PathBuf, rc::Rc};

use flightnet_evolution::{
    Action, ControllerConfig, Environment, FitnessSource as _, GenerationController,
    GenerationEvent, GenerationObserver, Scorekeeper, TagHealth,
    persistence::{
        JsonFileStore, MemoryStore, PersistenceError, PersistenceStore, SavedChampion,
    },
    roster::SlotTag,
};
use flightnet_network::{Topology, WeightTensor};
use rand::SeedableRng as _;
use rand_pcg::Pcg32;
use tempfile::TempDir;

type Log = Rc<RefCell<Vec<String>>>;

/// Environment whose crashes are decided by the test.
#[derive(Debug)]
struct ScriptedEnvironment {
    sensor_count: usize,
    crashed: BTreeSet<usize>,
    sense_calls: usize,
    actions: Vec<(usize, Action)>,
    log: Log,
}

impl ScriptedEnvironment {
    fn new(sensor_count: usize) -> Self {
        Self {
            sensor_count,
            crashed: BTreeSet::new(),
            sense_calls: 0,
            actions: vec![],
            log: Log::default(),
        }
    }

    fn crash(&mut self, slots: impl IntoIterator<Item = usize>) {
        self.crashed.extend(slots);
    }
}

impl GenerationObserver for ScriptedEnvironment {
    fn generation_started(&mut self, event: &GenerationEvent) {
        self.crashed.clear();
        self.log
            .borrow_mut()
            .push(format!("environment started {}", event.generation));
    }

    fn generation_ended(&mut self, event: &GenerationEvent) {
        self.log
            .borrow_mut()
            .push(format!("environment ended {}", event.generation));
    }
}

impl Environment for ScriptedEnvironment {
    fn sense(&mut self, slot: usize, sensors: &mut Vec<f32>) {
        let _ = slot;
        self.sense_calls += 1;
        sensors.extend(std::iter::repeat_n(0.25, self.sensor_count));
    }

    fn act(&mut self, slot: usize, action: Action) {
        self.actions.push((slot, action));
    }

    fn is_terminated(&self, slot: usize) -> bool {
        self.crashed.contains(&slot)
    }
}

struct RecordingObserver {
    name: &'static str,
    log: Log,
}

impl GenerationObserver for RecordingObserver {
    fn generation_started(&mut self, event: &GenerationEvent) {
        self.log
            .borrow_mut()
            .push(format!("{} started {}", self.name, event.generation));
    }

    fn generation_ended(&mut self, event: &GenerationEvent) {
        self.log
            .borrow_mut()
            .push(format!("{} ended {}", self.name, event.generation));
    }
}

/// Store whose disk is always full.
#[derive(Debug, Default)]
struct FailingStore {
    attempts: usize,
}

impl PersistenceStore for FailingStore {
    fn save(
        &mut self,
        _weights: &WeightTensor,
        _high_score: i32,
        _generation: u32,
    ) -> Result<(), PersistenceError> {
        self.attempts += 1;
        Err(PersistenceError::Io {
            path: PathBuf::from("unwritable.json"),
            source: io::Error::other("disk full"),
        })
    }

    fn load(&self, _topology: &Topology) -> Result<SavedChampion, PersistenceError> {
        Err(PersistenceError::NotFound)
    }
}

fn config(roster_size: usize) -> ControllerConfig {
    ControllerConfig {
        roster_size,
        seed: Some(7),
        ..ControllerConfig::default()
    }
}

fn weights_of<S>(controller: &GenerationController<S>, slot: usize) -> WeightTensor {
    controller.agents()[slot].network().weights().clone()
}

#[test]
fn test_champion_updates_only_on_strictly_higher_score() {
    let mut controller = GenerationController::new(config(6), MemoryStore::new()).unwrap();
    let mut env = ScriptedEnvironment::new(5);
    let mut score = Scorekeeper::new(0);
    controller.start_game(false, &mut env, &mut score);

    score.increment(42);
    let red = weights_of(&controller, 1);
    env.crash([1]);
    let report = controller.tick(&mut env, &mut score);
    assert_eq!(report.terminated, [1]);
    let high_score = report.new_high_score.unwrap();
    assert_eq!(high_score.score, 42);
    assert_eq!(high_score.generation, 1);

    let champion = controller.champion().unwrap();
    assert_eq!(champion.score, 42);
    assert_eq!(champion.generation, 1);
    assert_eq!(champion.weights, red);
    assert_eq!(controller.store().save_count(), 1);

    // equal scores do not replace the champion
    env.crash([0, 2, 3, 4]);
    let report = controller.tick(&mut env, &mut score);
    assert_eq!(report.new_high_score, None);
    assert_eq!(report.ended_generation, Some(1));
    assert_eq!(controller.champion().unwrap().weights, red);

    // a lower score in the next generation leaves it alone too
    assert_eq!(score.score(), 0);
    score.increment(10);
    env.crash([2]);
    let report = controller.tick(&mut env, &mut score);
    assert_eq!(report.new_high_score, None);
    let champion = controller.champion().unwrap();
    assert_eq!(champion.score, 42);
    assert_eq!(champion.generation, 1);
    assert_eq!(champion.weights, red);
    assert_eq!(controller.store().save_count(), 1);
}

#[test]
fn test_generation_advances_when_everyone_crashes() {
    let mut controller = GenerationController::new(config(6), MemoryStore::new()).unwrap();
    let mut env = ScriptedEnvironment::new(5);
    let mut score = Scorekeeper::new(0);
    controller.start_game(false, &mut env, &mut score);
    assert_eq!(controller.generation(), 1);

    for expected in 1..=3 {
        score.increment(3);
        env.crash(0..6);
        let report = controller.tick(&mut env, &mut score);
        assert_eq!(report.ended_generation, Some(expected));
        assert_eq!(controller.generation(), expected + 1);
        assert!(controller.state().is_running());
        // the new population is spawned before tick returns
        assert!(controller.agents()[0].is_active());
        assert_eq!(score.score(), 0);
    }
}

#[test]
fn test_sole_champion_copy_ends_generation() {
    let mut controller = GenerationController::new(config(5), MemoryStore::new()).unwrap();
    let mut env = ScriptedEnvironment::new(5);
    let mut score = Scorekeeper::new(0);
    controller.start_game(false, &mut env, &mut score);

    env.crash([1, 2, 3, 4]);
    let report = controller.tick(&mut env, &mut score);
    assert_eq!(report.terminated, [1, 2, 3, 4]);
    assert_eq!(report.ended_generation, Some(1));
    assert_eq!(controller.generation(), 2);
}

#[test]
fn test_sole_champion_copy_keeps_flying_when_disabled() {
    let mut controller = GenerationController::new(config(5), MemoryStore::new()).unwrap();
    controller.set_end_on_sole_champion_copy(false);
    let mut env = ScriptedEnvironment::new(5);
    let mut score = Scorekeeper::new(0);
    controller.start_game(false, &mut env, &mut score);

    env.crash([1, 2, 3, 4]);
    let report = controller.tick(&mut env, &mut score);
    assert_eq!(report.ended_generation, None);
    assert_eq!(controller.generation(), 1);
    assert!(controller.agents()[0].is_active());

    env.crash([0]);
    let report = controller.tick(&mut env, &mut score);
    assert_eq!(report.ended_generation, Some(1));
}

#[test]
fn test_sole_survivor_other_than_champion_copy_keeps_flying() {
    let mut controller = GenerationController::new(config(5), MemoryStore::new()).unwrap();
    let mut env = ScriptedEnvironment::new(5);
    let mut score = Scorekeeper::new(0);
    controller.start_game(false, &mut env, &mut score);

    env.crash([0, 1, 2, 3]);
    let report = controller.tick(&mut env, &mut score);
    assert_eq!(report.ended_generation, None);
    assert!(controller.agents()[4].is_active());
}

#[test]
fn test_spawn_follows_roster() {
    let mut controller = GenerationController::new(config(6), MemoryStore::new()).unwrap();
    let mut env = ScriptedEnvironment::new(5);
    let mut score = Scorekeeper::new(0);
    controller.start_game(false, &mut env, &mut score);

    score.increment(9);
    env.crash(0..6);
    controller.tick(&mut env, &mut score);

    let champion = controller.champion().unwrap().weights.clone();
    let agents = controller.agents();
    assert_eq!(agents.len(), 6);
    assert_eq!(agents[0].network().weights(), &champion);

    let tiers = controller.config().variance_tiers;
    for (slot, variance) in [(1, tiers[0]), (2, tiers[1]), (3, tiers[2])] {
        let weights = agents[slot].network().weights();
        assert_ne!(weights, &champion);
        for (&child, &parent) in weights.values().iter().zip(champion.values()) {
            assert!((-1.0..=1.0).contains(&child));
            assert!((child - parent).abs() <= variance + 1e-6);
        }
    }
    assert_ne!(agents[4].network().weights(), &champion);
    assert!(agents[5].is_active());
}

#[test]
fn test_runner_up_slot_flies_latest_distinct_crash() {
    let mut controller = GenerationController::new(config(6), MemoryStore::new()).unwrap();
    let mut env = ScriptedEnvironment::new(5);
    let mut score = Scorekeeper::new(0);
    controller.start_game(false, &mut env, &mut score);
    assert!(controller.agents()[5].status().is_benched());

    score.increment(5);
    env.crash([1]);
    controller.tick(&mut env, &mut score);

    score.increment(5);
    let green = weights_of(&controller, 3);
    let white = weights_of(&controller, 4);
    env.crash([3]);
    controller.tick(&mut env, &mut score);
    assert_eq!(controller.champion().unwrap().weights, green);

    env.crash([0, 2, 4]);
    let report = controller.tick(&mut env, &mut score);
    assert_eq!(report.ended_generation, Some(1));

    let agents = controller.agents();
    assert_eq!(agents[0].network().weights(), &green);
    assert!(agents[5].is_active());
    assert_eq!(agents[5].network().weights(), &white);
}

#[test]
fn test_runner_up_slot_benched_without_distinct_crash() {
    let config = ControllerConfig {
        variance_tiers: [0.0; 3],
        ..config(6)
    };
    let mut controller = GenerationController::new(config, MemoryStore::new()).unwrap();
    let mut env = ScriptedEnvironment::new(5);
    let mut score = Scorekeeper::new(0);
    controller.start_game(false, &mut env, &mut score);

    // slots 0 to 3 fly exact champion copies
    score.increment(5);
    env.crash([0, 1, 2, 3]);
    let report = controller.tick(&mut env, &mut score);
    assert_eq!(report.ended_generation, None);

    // the only distinct crash becomes the champion itself
    score.increment(5);
    let white = weights_of(&controller, 4);
    env.crash([4]);
    let report = controller.tick(&mut env, &mut score);
    assert_eq!(report.ended_generation, Some(1));
    assert_eq!(controller.champion().unwrap().weights, white);

    let agents = controller.agents();
    assert!(agents[5].status().is_benched());
    assert!(agents[..5].iter().all(|agent| agent.is_active()));
}

#[test]
fn test_start_game_resumes_after_saved_generation() {
    let topology = Topology::new(6, [5], 3).unwrap();
    let mut rng = Pcg32::seed_from_u64(99);
    let saved = WeightTensor::random(topology, &mut rng, 1.0);
    let store = MemoryStore::with_saved(SavedChampion {
        weights: saved.clone(),
        high_score: 42,
        generation: 3,
    });

    let mut controller = GenerationController::new(config(6), store).unwrap();
    let mut env = ScriptedEnvironment::new(5);
    let mut score = Scorekeeper::new(0);
    controller.start_game(true, &mut env, &mut score);

    assert_eq!(controller.generation(), 4);
    let high_score = controller.high_score();
    assert_eq!(high_score.score, 42);
    assert_eq!(high_score.generation, 3);
    assert_eq!(weights_of(&controller, 0), saved);

    // restarting without loading forgets the champion
    controller.start_game(false, &mut env, &mut score);
    assert_eq!(controller.generation(), 1);
    assert_eq!(controller.high_score().score, 0);
}

#[test]
fn test_failed_load_starts_fresh() {
    let dir = TempDir::new().unwrap();
    let store = JsonFileStore::new(dir.path().join("missing.json"));
    let mut controller = GenerationController::new(config(6), store).unwrap();
    let mut env = ScriptedEnvironment::new(5);
    let mut score = Scorekeeper::new(0);
    controller.start_game(true, &mut env, &mut score);

    assert!(controller.state().is_running());
    assert_eq!(controller.generation(), 1);
    let champion = controller.champion().unwrap();
    assert_eq!(champion.score, 0);
    assert_eq!(champion.generation, 0);
}

#[test]
fn test_unusable_save_file_starts_fresh() {
    let dir = TempDir::new().unwrap();
    let mut rng = Pcg32::seed_from_u64(5);

    let mismatched = dir.path().join("mismatched.json");
    let other = WeightTensor::random(Topology::new(4, [5], 3).unwrap(), &mut rng, 1.0);
    JsonFileStore::new(&mismatched).save(&other, 42, 9).unwrap();

    let oversized = dir.path().join("oversized.json");
    std::fs::write(
        &oversized,
        r#"{"format_version":1,"saved_at":"2026-01-01T00:00:00Z",
            "topology":{"inputs":2147483648,"hidden":[2147483648],"outputs":1},
            "high_score":42,"generation":9,"weights":[[],[]]}"#,
    )
    .unwrap();

    let truncated = dir.path().join("truncated.json");
    std::fs::write(
        &truncated,
        r#"{"format_version":1,"saved_at":"2026-01-01T00:00:00Z",
            "topology":{"inputs":6,"hidden":[5],"outputs":3},
            "high_score":42,"generation":9,"weights":[[],[]]}"#,
    )
    .unwrap();

    let garbage = dir.path().join("garbage.json");
    std::fs::write(&garbage, "{\"format_version\":").unwrap();

    for path in [mismatched, oversized, truncated, garbage] {
        let mut controller =
            GenerationController::new(config(6), JsonFileStore::new(&path)).unwrap();
        let mut env = ScriptedEnvironment::new(5);
        let mut score = Scorekeeper::new(0);
        controller.start_game(true, &mut env, &mut score);

        assert!(controller.state().is_running(), "{}", path.display());
        assert_eq!(controller.generation(), 1, "{}", path.display());
        assert_eq!(controller.high_score().score, 0, "{}", path.display());
        assert_eq!(controller.agents().len(), 6);
    }
}

#[test]
fn test_high_score_survives_restart_through_json_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("saved_champion.json");
    let mut env = ScriptedEnvironment::new(5);
    let mut score = Scorekeeper::new(0);

    let champion = {
        let mut controller =
            GenerationController::new(config(6), JsonFileStore::new(&path)).unwrap();
        controller.start_game(false, &mut env, &mut score);
        env.crash(0..6);
        controller.tick(&mut env, &mut score);

        score.increment(17);
        env.crash([3]);
        controller.tick(&mut env, &mut score);
        controller.end_game(&mut env);
        controller.champion().unwrap().clone()
    };
    assert_eq!(champion.score, 17);
    assert_eq!(champion.generation, 2);

    let mut controller = GenerationController::new(config(6), JsonFileStore::new(&path)).unwrap();
    controller.start_game(true, &mut env, &mut score);
    assert_eq!(controller.generation(), 3);
    assert_eq!(controller.champion(), Some(&champion));
}

#[test]
fn test_save_failure_is_recovered() {
    let mut controller = GenerationController::new(config(6), FailingStore::default()).unwrap();
    let mut env = ScriptedEnvironment::new(5);
    let mut score = Scorekeeper::new(0);
    controller.start_game(true, &mut env, &mut score);

    score.increment(8);
    env.crash([2]);
    let report = controller.tick(&mut env, &mut score);
    assert_eq!(report.new_high_score.map(|h| h.score), Some(8));
    assert_eq!(controller.high_score().score, 8);
    assert_eq!(controller.store().attempts, 1);
    assert!(controller.save_champion().is_err());
}

#[test]
fn test_no_save_when_disabled() {
    let mut controller = GenerationController::new(config(6), MemoryStore::new()).unwrap();
    assert!(!controller.toggle_save_on_new_high_score());
    let mut env = ScriptedEnvironment::new(5);
    let mut score = Scorekeeper::new(0);
    controller.start_game(false, &mut env, &mut score);

    score.increment(8);
    env.crash([2]);
    controller.tick(&mut env, &mut score);
    assert_eq!(controller.high_score().score, 8);
    assert_eq!(controller.store().save_count(), 0);
}

#[test]
fn test_agents_hold_until_scoring() {
    let mut controller = GenerationController::new(config(6), MemoryStore::new()).unwrap();
    let mut env = ScriptedEnvironment::new(5);
    let mut score = Scorekeeper::new(-2);
    controller.start_game(false, &mut env, &mut score);

    controller.tick(&mut env, &mut score);
    assert_eq!(env.sense_calls, 0);
    assert_eq!(env.actions.len(), 5);
    assert!(env.actions.iter().all(|&(_, action)| action == Action::Hold));

    // crashes are still noticed while holding
    env.crash([4]);
    let report = controller.tick(&mut env, &mut score);
    assert_eq!(report.terminated, [4]);

    score.increment(3);
    controller.tick(&mut env, &mut score);
    assert_eq!(env.sense_calls, 4);
}

#[test]
fn test_agents_think_immediately_without_hold() {
    let config = ControllerConfig {
        hold_until_scoring: false,
        ..config(6)
    };
    let mut controller = GenerationController::new(config, MemoryStore::new()).unwrap();
    let mut env = ScriptedEnvironment::new(5);
    let mut score = Scorekeeper::new(-2);
    controller.start_game(false, &mut env, &mut score);

    let report = controller.tick(&mut env, &mut score);
    assert!(report.failures.is_empty());
    assert_eq!(env.sense_calls, 5);
    for (slot, action) in &env.actions {
        assert_eq!(controller.agent_action(*slot), Some(*action));
    }
    assert_eq!(controller.agent_action(17), None);
}

#[test]
fn test_sensor_mismatch_is_reported() {
    let mut controller = GenerationController::new(config(6), MemoryStore::new()).unwrap();
    let mut env = ScriptedEnvironment::new(3);
    let mut score = Scorekeeper::new(1);
    controller.start_game(false, &mut env, &mut score);

    let report = controller.tick(&mut env, &mut score);
    let failed: Vec<_> = report.failures.iter().map(|f| f.slot).collect();
    assert_eq!(failed, [0, 1, 2, 3, 4]);
    assert!(report.failures.iter().all(|f| f.error.expected == 6 && f.error.actual == 4));
    assert!(controller.agents()[..5].iter().all(|agent| agent.is_active()));
    assert!(env.actions.iter().all(|&(_, action)| action == Action::Hold));
}

#[test]
fn test_sensors_without_last_action() {
    let config = ControllerConfig {
        feed_last_action: false,
        ..config(6)
    };
    assert_eq!(config.sensor_count(), 6);
    let mut controller = GenerationController::new(config, MemoryStore::new()).unwrap();
    let mut env = ScriptedEnvironment::new(6);
    let mut score = Scorekeeper::new(1);
    controller.start_game(false, &mut env, &mut score);

    let report = controller.tick(&mut env, &mut score);
    assert!(report.failures.is_empty());
}

#[test]
fn test_observers_follow_environment() {
    let mut controller = GenerationController::new(config(6), MemoryStore::new()).unwrap();
    let mut env = ScriptedEnvironment::new(5);
    let log = Rc::clone(&env.log);
    controller.add_observer(RecordingObserver {
        name: "first",
        log: Rc::clone(&log),
    });
    controller.add_observer(RecordingObserver {
        name: "second",
        log: Rc::clone(&log),
    });
    let mut score = Scorekeeper::new(0);

    controller.start_game(false, &mut env, &mut score);
    env.crash(0..6);
    controller.tick(&mut env, &mut score);
    controller.end_game(&mut env);

    assert_eq!(
        *log.borrow(),
        [
            "environment started 1",
            "first started 1",
            "second started 1",
            "environment ended 1",
            "first ended 1",
            "second ended 1",
            "environment started 2",
            "first started 2",
            "second started 2",
            "environment ended 2",
            "first ended 2",
            "second ended 2",
        ]
    );
    assert!(controller.state().is_idle());
}

#[test]
fn test_roster_health_counts_participants() {
    let mut controller = GenerationController::new(config(6), MemoryStore::new()).unwrap();
    let mut env = ScriptedEnvironment::new(5);
    let mut score = Scorekeeper::new(0);
    controller.start_game(false, &mut env, &mut score);

    env.crash([1]);
    controller.tick(&mut env, &mut score);

    let health = |tag, alive, terminated| TagHealth {
        tag,
        alive,
        terminated,
    };
    assert_eq!(
        controller.roster_health(),
        [
            health(SlotTag::Black, 1, 0),
            health(SlotTag::Red, 0, 1),
            health(SlotTag::Blue, 1, 0),
            health(SlotTag::Green, 1, 0),
            health(SlotTag::White, 1, 0),
        ]
    );
}

#[test]
fn test_seeded_controllers_are_reproducible() {
    let run = || {
        let mut controller = GenerationController::new(config(6), MemoryStore::new()).unwrap();
        let mut env = ScriptedEnvironment::new(5);
        let mut score = Scorekeeper::new(0);
        controller.start_game(false, &mut env, &mut score);
        score.increment(4);
        env.crash(0..6);
        controller.tick(&mut env, &mut score);
        controller
            .agents()
            .iter()
            .map(|agent| agent.network().weights().clone())
            .collect::<Vec<_>>()
    };
    assert_eq!(run(), run());
}
