use flightnet_network::{InputLengthError, Network};
use serde::{Deserialize, Serialize};

use crate::roster::{MutationTier, RosterSlot, SlotTag};

/// Movement decision of an agent for one tick.
///
/// Output neuron 0 means hold, 1 means move in the positive direction, and any
/// other index means move in the negative direction.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    #[default]
    Hold,
    MovePositive,
    MoveNegative,
}

impl Action {
    #[must_use]
    pub fn from_output_index(index: usize) -> Self {
        match index {
            0 => Self::Hold,
            1 => Self::MovePositive,
            _ => Self::MoveNegative,
        }
    }

    /// Signed direction of the move: `0.0`, `1.0` or `-1.0`.
    ///
    /// This is also the encoding used when the last action is fed back to the
    /// network as an extra sensor.
    #[must_use]
    pub fn direction(self) -> f32 {
        match self {
            Self::Hold => 0.0,
            Self::MovePositive => 1.0,
            Self::MoveNegative => -1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, derive_more::IsVariant)]
pub enum AgentStatus {
    /// Flying and evaluated every tick.
    Active,
    /// Crashed during this generation.
    Terminated,
    /// Spawned inactive because its slot had nothing to fly with.
    Benched,
}

/// A population member: one roster slot flying one network.
#[derive(Debug, Clone)]
pub struct Agent {
    slot: usize,
    roster_slot: RosterSlot,
    network: Network,
    status: AgentStatus,
    action: Action,
    last_score: Option<i32>,
}

impl Agent {
    pub(crate) fn new(
        slot: usize,
        roster_slot: RosterSlot,
        network: Network,
        status: AgentStatus,
    ) -> Self {
        Self {
            slot,
            roster_slot,
            network,
            status,
            action: Action::Hold,
            last_score: None,
        }
    }

    #[must_use]
    pub fn slot(&self) -> usize {
        self.slot
    }

    #[must_use]
    pub fn tag(&self) -> SlotTag {
        self.roster_slot.tag
    }

    #[must_use]
    pub fn tier(&self) -> MutationTier {
        self.roster_slot.tier
    }

    #[must_use]
    pub fn network(&self) -> &Network {
        &self.network
    }

    #[must_use]
    pub fn status(&self) -> AgentStatus {
        self.status
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// Action chosen on the most recent tick.
    #[must_use]
    pub fn action(&self) -> Action {
        self.action
    }

    /// Score recorded when this agent terminated.
    #[must_use]
    pub fn last_score(&self) -> Option<i32> {
        self.last_score
    }

    pub(crate) fn think(&mut self, sensors: &[f32]) -> Result<Action, InputLengthError> {
        self.network.calculate(sensors)?;
        self.action = Action::from_output_index(self.network.highest_output_index());
        Ok(self.action)
    }

    pub(crate) fn hold(&mut self) -> Action {
        self.action = Action::Hold;
        self.action
    }

    pub(crate) fn terminate(&mut self, score: i32) {
        self.status = AgentStatus::Terminated;
        self.last_score = Some(score);
    }
}
