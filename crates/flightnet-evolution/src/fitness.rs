/// Source of the score used as fitness.
///
/// The score is advanced by the environment while agents survive and is read
/// by the controller whenever an agent terminates. It must not decrease while
/// a generation runs, so the latest agent to terminate always holds the
/// generation's best score.
pub trait FitnessSource {
    /// Current score.
    fn score(&self) -> i32;

    /// Resets the score to its starting value. Called at every generation start.
    fn reset(&mut self);
}

/// Integer score counter with a configurable starting value.
///
/// A negative starting score works as a countdown: agents hold still while the
/// score is not positive when the controller is configured to do so.
///
/// # Example
///
/// ```
/// use flightnet_evolution::{FitnessSource as _, Scorekeeper};
///
/// let mut score = Scorekeeper::new(-3);
/// assert_eq!(score.score(), -3);
/// score.increment(5);
/// assert_eq!(score.score(), 2);
/// score.reset();
/// assert_eq!(score.score(), -3);
/// ```
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Scorekeeper {
    starting_score: i32,
    score: i32,
}

impl Scorekeeper {
    #[must_use]
    pub const fn new(starting_score: i32) -> Self {
        Self {
            starting_score,
            score: starting_score,
        }
    }

    #[must_use]
    pub const fn starting_score(&self) -> i32 {
        self.starting_score
    }

    /// Adds `amount` to the score, saturating at `i32::MAX`.
    pub fn increment(&mut self, amount: u32) {
        let amount = i32::try_from(amount).unwrap_or(i32::MAX);
        self.score = self.score.saturating_add(amount);
    }
}

impl FitnessSource for Scorekeeper {
    fn score(&self) -> i32 {
        self.score
    }

    fn reset(&mut self) {
        self.score = self.starting_score;
    }
}
