//! A team-wide counter assembled from per-unit slots.

use crate::array::Array;
use crate::comm::Elem;
use crate::team::Team;

use std::ops::{Add, Sub};
use std::sync::Arc;

/// A shared counter over a team: every unit owns one slot and increments or
/// decrements only its own, so updates never contend. Reading folds all
/// slots and is not atomic; synchronize with a team barrier before relying
/// on the value.
pub struct SharedCounter<T: Elem> {
    slots: Array<T>,
}

impl<T> SharedCounter<T>
where
    T: Elem + Default + Add<Output = T> + Sub<Output = T>,
{
    /// Collective constructor; all slots start at zero.
    pub fn new(team: Arc<Team>) -> SharedCounter<T> {
        let size = team.size();
        // one blocked element per unit
        SharedCounter {
            slots: Array::new(team, size),
        }
    }

    /// Add to this unit's slot.
    pub fn inc(&self, increment: T) {
        let slot = unsafe { &mut self.slots.local_as_mut_slice()[0] };
        *slot = *slot + increment;
    }

    /// Subtract from this unit's slot.
    pub fn dec(&self, decrement: T) {
        let slot = unsafe { &mut self.slots.local_as_mut_slice()[0] };
        *slot = *slot - decrement;
    }

    /// Fold every unit's slot into the current counter value.
    ///
    /// Costs one read per unit of the team.
    pub fn get(&self) -> T {
        let mut acc = T::default();
        for i in 0..self.slots.size() {
            acc = acc + self.slots.at(i).load();
        }
        acc
    }

    pub fn barrier(&self) {
        self.slots.barrier();
    }
}
