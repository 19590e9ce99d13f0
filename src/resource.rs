//! Allocation accounting for geometries and materials.
//!
//! Every geometry and material created by the factory carries a
//! [`ResourceToken`] issued by a [`ResourceLedger`]. Releasing the owner
//! releases the token exactly once; the ledger keeps the running totals so
//! callers can check that a mount/unmount cycle is balanced.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

/// Unique identifier for an allocated geometry or material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(pub u64);

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Geometry,
    Material,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Geometry => f.write_str("geometry"),
            ResourceKind::Material => f.write_str("material"),
        }
    }
}

/// Running totals of allocations and releases.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceCounts {
    pub geometries_allocated: usize,
    pub geometries_released: usize,
    pub materials_allocated: usize,
    pub materials_released: usize,
}

impl ResourceCounts {
    /// Number of resources allocated but not yet released.
    pub fn outstanding(&self) -> usize {
        (self.geometries_allocated - self.geometries_released)
            + (self.materials_allocated - self.materials_released)
    }

    pub fn is_balanced(&self) -> bool {
        self.geometries_allocated == self.geometries_released
            && self.materials_allocated == self.materials_released
    }
}

/// Shared allocation ledger. Cloning shares the same counters.
#[derive(Debug, Clone, Default)]
pub struct ResourceLedger {
    counts: Rc<Cell<ResourceCounts>>,
    next_id: Rc<Cell<u64>>,
}

impl ResourceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counts(&self) -> ResourceCounts {
        self.counts.get()
    }

    /// Issue a token for a freshly allocated resource.
    pub fn allocate(&self, kind: ResourceKind) -> ResourceToken {
        let id = ResourceId(self.next_id.get() + 1);
        self.next_id.set(id.0);

        let mut counts = self.counts.get();
        match kind {
            ResourceKind::Geometry => counts.geometries_allocated += 1,
            ResourceKind::Material => counts.materials_allocated += 1,
        }
        self.counts.set(counts);

        ResourceToken {
            id,
            kind,
            ledger: self.clone(),
            released: false,
        }
    }

    fn record_release(&self, kind: ResourceKind) {
        let mut counts = self.counts.get();
        match kind {
            ResourceKind::Geometry => counts.geometries_released += 1,
            ResourceKind::Material => counts.materials_released += 1,
        }
        self.counts.set(counts);
    }
}

/// Proof of allocation held by a geometry or material.
pub struct ResourceToken {
    id: ResourceId,
    kind: ResourceKind,
    ledger: ResourceLedger,
    released: bool,
}

impl ResourceToken {
    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Release the token. Returns false (and records nothing) if it was
    /// already released.
    pub fn release(&mut self) -> bool {
        if self.released {
            log::warn!("{} {} released twice; ignoring", self.kind, self.id);
            return false;
        }
        self.released = true;
        self.ledger.record_release(self.kind);
        true
    }
}

impl fmt::Debug for ResourceToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceToken")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("released", &self.released)
            .finish()
    }
}

impl Drop for ResourceToken {
    fn drop(&mut self) {
        if !self.released {
            log::warn!("{} {} dropped without being released", self.kind, self.id);
        }
    }
}

/// Uniform release capability shared by every allocated resource.
pub trait Releasable {
    fn release(&mut self);
    fn is_released(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_and_release() {
        let ledger = ResourceLedger::new();
        let mut geometry = ledger.allocate(ResourceKind::Geometry);
        let mut material = ledger.allocate(ResourceKind::Material);

        assert_ne!(geometry.id(), material.id());
        assert_eq!(ledger.counts().outstanding(), 2);

        assert!(geometry.release());
        assert!(material.release());
        assert!(ledger.counts().is_balanced());
    }

    #[test]
    fn test_double_release_is_not_counted() {
        let ledger = ResourceLedger::new();
        let mut token = ledger.allocate(ResourceKind::Geometry);

        assert!(token.release());
        assert!(!token.release());

        let counts = ledger.counts();
        assert_eq!(counts.geometries_allocated, 1);
        assert_eq!(counts.geometries_released, 1);
    }

    #[test]
    fn test_clones_share_counts() {
        let ledger = ResourceLedger::new();
        let other = ledger.clone();
        let mut token = other.allocate(ResourceKind::Material);
        assert_eq!(ledger.counts().materials_allocated, 1);
        token.release();
        assert!(ledger.counts().is_balanced());
    }
}
