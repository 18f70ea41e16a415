use crate::sync::Mutex;
use crate::types::MutexId;
use thiserror::Error;

/// Default table capacity, independent of the live mutex count.
pub const DEFAULT_CAPACITY: usize = 200;

/// Insertion failed because no empty slot exists. Hands the mutex back
/// to the caller; recoverable.
#[derive(Debug, Error)]
#[error("mutex registry full")]
pub struct RegistryFull(pub Mutex);

/// Fixed-capacity open-addressed table mapping mutex id to mutex, with a
/// per-home-slot overflow marker.
///
/// Slots are vacated by removal independently of insertion order, so a
/// lookup that finds an empty home slot must keep probing whenever that
/// home has ever overflowed. The marker is set on insertion collision and
/// never cleared: other keys sharing the home may still rely on the
/// continued probe after one of them is removed.
#[derive(Debug)]
pub struct MutexRegistry {
    slots: Vec<Option<Mutex>>,
    overflowed: Vec<bool>,
    len: usize,
}

impl MutexRegistry {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0);
        Self {
            slots: (0..capacity).map(|_| None).collect(),
            overflowed: vec![false; capacity],
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn home(&self, mid: MutexId) -> usize {
        mid.val() as usize % self.capacity()
    }

    pub fn insert(&mut self, mutex: Mutex) -> Result<(), RegistryFull> {
        let home = self.home(mutex.mid);
        if self.slots[home].is_none() {
            self.slots[home] = Some(mutex);
            self.len += 1;
            return Ok(());
        }
        for i in 1..self.capacity() {
            let idx = (home + i) % self.capacity();
            if self.slots[idx].is_none() {
                self.slots[idx] = Some(mutex);
                // mark the home slot, not the slot actually used
                self.overflowed[home] = true;
                self.len += 1;
                return Ok(());
            }
        }
        Err(RegistryFull(mutex))
    }

    /// Probe for the slot holding `mid`. An empty home slot is a
    /// definitive miss only while its overflow marker is clear; otherwise
    /// the probe continues past occupied and empty slots alike until a
    /// match or a full scan.
    fn find_slot(&self, mid: MutexId) -> Option<usize> {
        let home = self.home(mid);
        match &self.slots[home] {
            Some(m) if m.mid == mid => return Some(home),
            None if !self.overflowed[home] => return None,
            _ => {}
        }
        for i in 1..self.capacity() {
            let idx = (home + i) % self.capacity();
            if let Some(m) = &self.slots[idx] {
                if m.mid == mid {
                    return Some(idx);
                }
            }
        }
        None
    }

    pub fn lookup(&self, mid: MutexId) -> Option<&Mutex> {
        let idx = self.find_slot(mid)?;
        self.slots[idx].as_ref()
    }

    pub fn lookup_mut(&mut self, mid: MutexId) -> Option<&mut Mutex> {
        let idx = self.find_slot(mid)?;
        self.slots[idx].as_mut()
    }

    /// Same probe as lookup; on success clears the slot and transfers
    /// ownership of the mutex to the caller. The home's overflow marker
    /// stays set. Plain removal without transfer is not exposed.
    pub fn take_and_remove(&mut self, mid: MutexId) -> Option<Mutex> {
        let idx = self.find_slot(mid)?;
        let mutex = self.slots[idx].take();
        if mutex.is_some() {
            self.len -= 1;
        }
        mutex
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Pid;
    use proptest::prelude::*;
    use std::collections::HashSet;

    fn mutex(mid: u32) -> Mutex {
        Mutex::new(MutexId::new(mid), (Pid::new(0), Pid::new(1)))
    }

    #[test]
    fn insert_until_full() {
        let mut reg = MutexRegistry::new(8);
        for mid in 0..8 {
            assert!(reg.insert(mutex(mid)).is_ok());
        }
        let spilled = reg.insert(mutex(8)).unwrap_err();
        assert_eq!(spilled.0.mid, MutexId::new(8));
        assert_eq!(reg.len(), 8);
    }

    #[test]
    fn colliding_ids_share_home_slot() {
        // capacity 200: mids 10 and 210 both home to slot 10
        let mut reg = MutexRegistry::new(200);
        reg.insert(mutex(10)).unwrap();
        reg.insert(mutex(210)).unwrap();
        assert_eq!(reg.lookup(MutexId::new(10)).unwrap().mid, MutexId::new(10));
        assert_eq!(
            reg.lookup(MutexId::new(210)).unwrap().mid,
            MutexId::new(210)
        );
    }

    #[test]
    fn probe_continues_past_occupied_non_matching_home() {
        // mid 210 placed away from its home while the home holds mid 10
        let mut reg = MutexRegistry::new(200);
        reg.slots[10] = Some(mutex(10));
        reg.slots[13] = Some(mutex(210));
        reg.len = 2;
        let found = reg.lookup(MutexId::new(210)).unwrap();
        assert_eq!(found.mid, MutexId::new(210));
    }

    #[test]
    fn empty_home_with_overflow_marker_keeps_probing() {
        // mid 12's home slot is empty but has overflowed before; the
        // mutex itself sits at slot 15
        let mut reg = MutexRegistry::new(200);
        reg.slots[15] = Some(mutex(12));
        reg.overflowed[12] = true;
        reg.len = 1;
        let found = reg.lookup(MutexId::new(12)).unwrap();
        assert_eq!(found.mid, MutexId::new(12));
    }

    #[test]
    fn empty_home_without_marker_is_a_definitive_miss() {
        let reg = MutexRegistry::new(16);
        assert!(reg.lookup(MutexId::new(3)).is_none());
    }

    #[test]
    fn take_and_remove_transfers_ownership() {
        let mut reg = MutexRegistry::new(16);
        reg.insert(mutex(5)).unwrap();
        let taken = reg.take_and_remove(MutexId::new(5)).unwrap();
        assert_eq!(taken.mid, MutexId::new(5));
        assert!(reg.lookup(MutexId::new(5)).is_none());
        assert!(reg.take_and_remove(MutexId::new(5)).is_none());
        assert_eq!(reg.len(), 0);
    }

    #[test]
    fn removal_leaves_home_marker_for_chained_keys() {
        // 1, 17, 33 all home to slot 1 with capacity 16. Removing 17
        // leaves a hole inside 33's probe chain; 33 must still be found.
        let mut reg = MutexRegistry::new(16);
        reg.insert(mutex(1)).unwrap();
        reg.insert(mutex(17)).unwrap();
        reg.insert(mutex(33)).unwrap();
        assert!(reg.take_and_remove(MutexId::new(17)).is_some());
        assert_eq!(reg.lookup(MutexId::new(33)).unwrap().mid, MutexId::new(33));
        assert_eq!(reg.lookup(MutexId::new(1)).unwrap().mid, MutexId::new(1));
        assert!(reg.lookup(MutexId::new(17)).is_none());
    }

    #[test]
    fn removal_does_not_disturb_unrelated_homes() {
        let mut reg = MutexRegistry::new(16);
        reg.insert(mutex(2)).unwrap();
        reg.insert(mutex(7)).unwrap();
        reg.take_and_remove(MutexId::new(2)).unwrap();
        assert_eq!(reg.lookup(MutexId::new(7)).unwrap().mid, MutexId::new(7));
    }

    proptest! {
        /// After any intermixed insert/remove sequence, lookup finds a
        /// mutex iff it is logically present: deletion holes never
        /// produce false negatives or false positives.
        #[test]
        fn lookup_matches_logical_contents(
            ops in prop::collection::vec((any::<bool>(), 0u32..48), 1..80)
        ) {
            let mut reg = MutexRegistry::new(12);
            let mut model: HashSet<u32> = HashSet::new();
            for (is_insert, mid) in ops {
                if is_insert {
                    if !model.contains(&mid) && reg.insert(mutex(mid)).is_ok() {
                        model.insert(mid);
                    }
                } else {
                    let taken = reg.take_and_remove(MutexId::new(mid));
                    prop_assert_eq!(taken.is_some(), model.remove(&mid));
                }
                for probe in 0u32..48 {
                    let found = reg.lookup(MutexId::new(probe));
                    prop_assert_eq!(found.is_some(), model.contains(&probe));
                    if let Some(m) = found {
                        prop_assert_eq!(m.mid, MutexId::new(probe));
                    }
                }
            }
        }
    }
}
