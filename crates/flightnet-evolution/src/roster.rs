//! Population roster: which weights each slot flies with.
//!
//! Every generation is spawned from a fixed table of slots. A slot has an
//! identity tag (the color it is drawn with) and a [`MutationTier`] describing
//! how its weights are derived from the champion:
//!
//! | Slot | Tag | Tier |
//! |------|-----|------|
//! | 0 | Black | champion copy, unmutated |
//! | 1 | Red | champion + high variance |
//! | 2 | Blue | champion + medium variance |
//! | 3 | Green | champion + low variance |
//! | 4 | White | fresh random weights |
//! | 5.. | Magenta | previous generation's runner-up (benched if there is none) |
//!
//! Rosters shorter than five slots use the first rows of the table.

use serde::{Deserialize, Serialize};

/// Slot that always carries an unmutated copy of the champion.
pub const CHAMPION_SLOT: usize = 0;

/// Default variance bounds for slots 1, 2 and 3.
pub const DEFAULT_VARIANCE_TIERS: [f32; 3] = [0.75, 0.5, 0.25];

/// Identity tag of a roster slot.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, derive_more::Display,
)]
pub enum SlotTag {
    Black,
    Red,
    Blue,
    Green,
    White,
    Magenta,
}

/// How a slot's weights are derived at spawn time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MutationTier {
    /// Exact copy of the champion.
    Unmutated,
    /// Champion perturbed by up to the given variance per weight.
    Variance(f32),
    /// Freshly randomized network.
    FullReset,
    /// Copy of the previous generation's runner-up.
    CopyRunnerUp,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RosterSlot {
    pub tag: SlotTag,
    pub tier: MutationTier,
}

/// The ordered list of slots spawned every generation.
#[derive(Debug, Clone, PartialEq)]
pub struct Roster {
    slots: Vec<RosterSlot>,
}

impl Roster {
    /// Builds the standard roster with `size` slots.
    ///
    /// `variance_tiers` are the bounds for slots 1, 2 and 3 (high, medium, low).
    ///
    /// # Example
    ///
    /// ```
    /// use flightnet_evolution::roster::{MutationTier, Roster, SlotTag, DEFAULT_VARIANCE_TIERS};
    ///
    /// let roster = Roster::standard(6, DEFAULT_VARIANCE_TIERS);
    /// assert_eq!(roster.slots()[0].tier, MutationTier::Unmutated);
    /// assert_eq!(roster.slots()[2].tier, MutationTier::Variance(0.5));
    /// assert_eq!(roster.slots()[5].tag, SlotTag::Magenta);
    /// ```
    #[must_use]
    pub fn standard(size: usize, variance_tiers: [f32; 3]) -> Self {
        let [high, medium, low] = variance_tiers;
        let slots = (0..size)
            .map(|slot| {
                let (tag, tier) = match slot {
                    0 => (SlotTag::Black, MutationTier::Unmutated),
                    1 => (SlotTag::Red, MutationTier::Variance(high)),
                    2 => (SlotTag::Blue, MutationTier::Variance(medium)),
                    3 => (SlotTag::Green, MutationTier::Variance(low)),
                    4 => (SlotTag::White, MutationTier::FullReset),
                    _ => (SlotTag::Magenta, MutationTier::CopyRunnerUp),
                };
                RosterSlot { tag, tier }
            })
            .collect();
        Self { slots }
    }

    #[must_use]
    pub fn slots(&self) -> &[RosterSlot] {
        &self.slots
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
