use crate::{Action, HighScore};

/// Notification payload for generation boundaries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationEvent {
    /// Index of the generation that started or ended.
    pub generation: u32,
    /// Best score across all generations so far.
    pub high_score: HighScore,
    /// Slots still active: every spawned participant at start, the survivors at end.
    pub active_slots: Vec<usize>,
}

/// Receiver of generation start and end notifications.
///
/// Observers are notified synchronously from inside the controller call that
/// caused the transition.
pub trait GenerationObserver {
    fn generation_started(&mut self, event: &GenerationEvent) {
        let _ = event;
    }

    fn generation_ended(&mut self, event: &GenerationEvent) {
        let _ = event;
    }
}

/// The world agents fly in.
///
/// The controller asks the environment for each active agent's sensors, hands
/// back the chosen action, then polls whether the agent crashed. Agents are
/// identified by their roster slot. The environment observes generation
/// boundaries so it can reset agent positions; it is notified before any
/// observer registered with
/// [`add_observer`](crate::GenerationController::add_observer).
pub trait Environment: GenerationObserver {
    /// Appends the sensor readings of the agent in `slot` to `sensors`.
    ///
    /// `sensors` is empty on entry. The controller appends the last action
    /// afterwards when configured to, so the environment provides
    /// [`ControllerConfig::sensor_count`](crate::ControllerConfig::sensor_count) values.
    fn sense(&mut self, slot: usize, sensors: &mut Vec<f32>);

    /// Applies the action chosen for the agent in `slot` this tick.
    fn act(&mut self, slot: usize, action: Action);

    /// Whether the agent in `slot` has crashed.
    fn is_terminated(&self, slot: usize) -> bool;
}
