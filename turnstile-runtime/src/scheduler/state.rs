use super::lock;
use std::sync::Mutex;

/// Mutable scheduler-wide slot tagged with the id of the operation that filled it
///
/// Only the owner may release the slot, so a preemptive run finishing late
/// cannot clear a value the run loop installed in the meantime.
pub(crate) struct OwnedSlot<V> {
    slot: Mutex<Option<(u64, V)>>,
}

impl<V: Clone> OwnedSlot<V> {
    pub(crate) fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    pub(crate) fn get(&self) -> Option<V> {
        lock(&self.slot).as_ref().map(|(_, value)| value.clone())
    }

    /// Install `value` unconditionally
    pub(crate) fn replace(&self, owner: u64, value: V) {
        *lock(&self.slot) = Some((owner, value));
    }

    /// Install `value` only if the slot is empty; returns whether it did
    pub(crate) fn claim_if_empty(&self, owner: u64, value: V) -> bool {
        let mut slot = lock(&self.slot);
        if slot.is_some() {
            return false;
        }
        *slot = Some((owner, value));
        true
    }

    /// Clear the slot if `owner` still holds it
    pub(crate) fn release(&self, owner: u64) -> bool {
        let mut slot = lock(&self.slot);
        match slot.as_ref() {
            Some((current, _)) if *current == owner => {
                *slot = None;
                true
            }
            _ => false,
        }
    }

    /// Empty the slot regardless of owner
    pub(crate) fn take(&self) -> Option<V> {
        lock(&self.slot).take().map(|(_, value)| value)
    }
}
