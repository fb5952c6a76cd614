use core::fmt;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

use crate::{KernelError, KernelResult};

/// Identifier of a graph component, unique across a whole graph tree.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComponentId(u64);

impl ComponentId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentId({})", self.0)
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ComponentId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

/// Monotonic id source shared by every graph of a tree.
///
/// Besides the counter it tracks which ids are claimed by live components,
/// so an explicit id is rejected no matter which graph of the tree it is
/// inserted into. Ids are never reissued, even after they are released.
#[derive(Debug, Default)]
pub struct IdAllocator {
    next: AtomicU64,
    claimed: Mutex<BTreeSet<ComponentId>>,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume allocation from a persisted counter.
    pub fn starting_at(next: u64) -> Self {
        Self {
            next: AtomicU64::new(next),
            claimed: Mutex::default(),
        }
    }

    fn claims(&self) -> MutexGuard<'_, BTreeSet<ComponentId>> {
        self.claimed.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Issue and claim the next id.
    pub fn next(&self) -> ComponentId {
        let id = ComponentId(self.next.fetch_add(1, Ordering::SeqCst));
        self.claims().insert(id);
        id
    }

    /// The id the next call to [`next`](Self::next) will return.
    pub fn current(&self) -> u64 {
        self.next.load(Ordering::SeqCst)
    }

    /// Make sure an explicitly supplied id is never issued again.
    pub fn reserve(&self, id: ComponentId) -> KernelResult<()> {
        let after = id.0.checked_add(1).ok_or(KernelError::InvalidArg {
            what: "component id out of range",
        })?;
        self.next.fetch_max(after, Ordering::SeqCst);
        Ok(())
    }

    /// Claim an explicitly supplied id for a new component.
    ///
    /// Fails with `DuplicateId` while another component of the tree holds it.
    pub fn claim(&self, id: ComponentId) -> KernelResult<()> {
        let mut claims = self.claims();
        if claims.contains(&id) {
            return Err(KernelError::DuplicateId { id });
        }
        self.reserve(id)?;
        claims.insert(id);
        Ok(())
    }

    /// Give up a claim after its component left the tree.
    pub fn release(&self, id: ComponentId) {
        self.claims().remove(&id);
    }

    pub fn is_claimed(&self, id: ComponentId) -> bool {
        self.claims().contains(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn ids_are_strictly_increasing() {
        let ids = IdAllocator::new();
        let a = ids.next();
        let b = ids.next();
        assert_eq!(a.get(), 0);
        assert_eq!(b.get(), 1);
        assert_eq!(ids.current(), 2);
    }

    #[test]
    fn resume_from_counter() {
        let ids = IdAllocator::starting_at(40);
        assert_eq!(ids.next().get(), 40);
    }

    #[test]
    fn reserve_skips_explicit_ids() {
        let ids = IdAllocator::new();
        ids.reserve(ComponentId::new(9)).unwrap();
        assert_eq!(ids.next().get(), 10);
        // Reserving a lower id never moves the counter back.
        ids.reserve(ComponentId::new(2)).unwrap();
        assert_eq!(ids.next().get(), 11);
    }

    #[test]
    fn claims_reject_live_ids_until_released() {
        let ids = IdAllocator::new();
        let a = ids.next();
        assert!(ids.is_claimed(a));
        assert!(matches!(ids.claim(a), Err(KernelError::DuplicateId { id }) if id == a));

        ids.claim(ComponentId::new(7)).unwrap();
        assert_eq!(ids.current(), 8);
        ids.release(ComponentId::new(7));
        assert!(!ids.is_claimed(ComponentId::new(7)));
        ids.claim(ComponentId::new(7)).unwrap();
        // Released ids are never issued again by the counter.
        assert_eq!(ids.next().get(), 8);
    }

    #[test]
    fn largest_id_cannot_be_claimed() {
        let ids = IdAllocator::new();
        let max = ComponentId::new(u64::MAX);
        assert!(matches!(ids.reserve(max), Err(KernelError::InvalidArg { .. })));
        assert!(matches!(ids.claim(max), Err(KernelError::InvalidArg { .. })));
        assert!(!ids.is_claimed(max));
        assert_eq!(ids.current(), 0);
    }

    #[test]
    fn concurrent_allocation_is_unique() {
        let ids = Arc::new(IdAllocator::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let ids = Arc::clone(&ids);
                std::thread::spawn(move || (0..250).map(|_| ids.next()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id));
            }
        }
        assert_eq!(seen.len(), 1000);
        assert_eq!(ids.current(), 1000);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn never_reissues_a_reserved_or_issued_id(
                start in 0u64..1000,
                reserved in proptest::collection::vec(0u64..2000, 0..20),
            ) {
                let ids = IdAllocator::starting_at(start);
                let mut issued = Vec::new();
                for r in &reserved {
                    ids.reserve(ComponentId::new(*r)).unwrap();
                    issued.push(ids.next().get());
                }
                for (i, id) in issued.iter().enumerate() {
                    prop_assert!(*id >= start);
                    prop_assert!(*id > reserved[i]);
                    if i > 0 {
                        prop_assert!(*id > issued[i - 1]);
                    }
                }
            }
        }
    }
}
