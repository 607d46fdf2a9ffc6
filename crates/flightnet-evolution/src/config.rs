use flightnet_network::{Topology, mutation::MAX_VARIANCE};
use serde::{Deserialize, Serialize};

use crate::{ConfigError, roster::DEFAULT_VARIANCE_TIERS};

/// Settings of a [`GenerationController`](crate::GenerationController).
///
/// Every field has a default, so a config file only needs to name the
/// settings it changes:
///
/// ```
/// use flightnet_evolution::ControllerConfig;
///
/// let config: ControllerConfig =
///     serde_json::from_str(r#"{ "roster_size": 8, "seed": 7 }"#).unwrap();
/// assert_eq!(config.roster_size, 8);
/// assert_eq!(config.seed, Some(7));
/// assert_eq!(config.topology.to_string(), "6-5-3");
/// config.validate().unwrap();
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Layer sizes of every network in the population.
    pub topology: Topology,
    /// Number of agents spawned per generation.
    pub roster_size: usize,
    /// Variance bounds for roster slots 1, 2 and 3.
    pub variance_tiers: [f32; 3],
    /// Randomize biases instead of fixing them at 1.
    ///
    /// Biases are drawn anew for every agent and are neither inherited nor
    /// saved, so with this set even the unmutated champion copy flies with
    /// different biases than the champion did.
    pub use_bias: bool,
    /// Append the agent's previous action to its sensor vector.
    pub feed_last_action: bool,
    /// Skip network evaluation while the score is not positive.
    pub hold_until_scoring: bool,
    /// End the generation when the unmutated champion copy is the only survivor.
    ///
    /// Needs a roster of at least two slots.
    pub end_on_sole_champion_copy: bool,
    /// Save the champion every time the high score improves.
    pub save_on_new_high_score: bool,
    /// Seed for the controller's random source. Entropy from the OS when absent.
    pub seed: Option<u64>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            topology: Topology::new(6, [5], 3).expect("default topology should be valid"),
            roster_size: 6,
            variance_tiers: DEFAULT_VARIANCE_TIERS,
            use_bias: false,
            feed_last_action: true,
            hold_until_scoring: true,
            end_on_sole_champion_copy: true,
            save_on_new_high_score: true,
            seed: None,
        }
    }
}

impl ControllerConfig {
    /// Checks the settings that cannot be expressed by the field types.
    ///
    /// # Errors
    ///
    /// Returns an error when:
    ///
    /// - the roster is empty, or has a single slot while
    ///   `end_on_sole_champion_copy` is set
    /// - a variance tier is outside `0.0..=MAX_VARIANCE`
    /// - `feed_last_action` leaves no input for sensors
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.roster_size == 0 {
            return Err(ConfigError::EmptyRoster);
        }
        if self.roster_size == 1 && self.end_on_sole_champion_copy {
            return Err(ConfigError::SoleChampionRoster);
        }
        for (tier, &variance) in self.variance_tiers.iter().enumerate() {
            if !(0.0..=MAX_VARIANCE).contains(&variance) {
                return Err(ConfigError::InvalidVariance {
                    slot: tier + 1,
                    variance,
                });
            }
        }
        if self.feed_last_action && self.topology.inputs() < 2 {
            return Err(ConfigError::NoSensorInputs {
                inputs: self.topology.inputs(),
            });
        }
        Ok(())
    }

    /// Number of sensor values the environment must provide per agent.
    #[must_use]
    pub fn sensor_count(&self) -> usize {
        if self.feed_last_action {
            self.topology.inputs() - 1
        } else {
            self.topology.inputs()
        }
    }
}
