// Authoritative object registry and the object server loops

mod server;
mod stats;

pub use server::ObjectServer;
pub use stats::{RegistryStats, StatsSnapshot};

use crate::object::{utime_now, Object, ObjectId, ObjectSet};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, info};


/// Result of merging one incoming object revision
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MergeOutcome {
    /// First revision seen for this id
    Inserted,
    /// Strictly newer than the stored revision
    Replaced,
    /// Not newer than the stored revision; dropped
    Stale,
}

/// Registry maintains the authoritative id -> object map.
///
/// Mutation happens only through [`ObjectRegistry::on_delta`]. Objects are
/// never removed.
pub struct ObjectRegistry {
    objects: DashMap<ObjectId, Object>,
    stats: RegistryStats,
    verbose: bool,
}

impl ObjectRegistry {
    pub fn new() -> Self {
        Self::with_verbose(false)
    }

    /// Create a registry that logs every merge decision at info level
    pub fn with_verbose(verbose: bool) -> Self {
        Self {
            objects: DashMap::new(),
            stats: RegistryStats::new(),
            verbose,
        }
    }

    /// Merge every object of an add/update set using last-writer-wins.
    ///
    /// Returns one outcome per object, in order.
    pub fn on_delta(&self, delta: &ObjectSet) -> Vec<MergeOutcome> {
        delta
            .objects
            .iter()
            .map(|object| self.merge_object(object.clone()))
            .collect()
    }

    fn merge_object(&self, object: Object) -> MergeOutcome {
        let id = object.id;
        let utime = object.utime;

        // Entry guard keeps compare-and-replace atomic per id
        let outcome = match self.objects.entry(id) {
            Entry::Vacant(slot) => {
                slot.insert(object);
                MergeOutcome::Inserted
            }
            Entry::Occupied(mut slot) => {
                if utime > slot.get().utime {
                    slot.insert(object);
                    MergeOutcome::Replaced
                } else {
                    MergeOutcome::Stale
                }
            }
        };

        self.stats.record_merge(outcome);

        if self.verbose {
            info!(id = id, utime = utime, outcome = ?outcome, "Merged object update");
        } else {
            debug!(id = id, utime = utime, outcome = ?outcome, "Merged object update");
        }

        outcome
    }

    /// Get a copy of the stored revision of an object
    pub fn get(&self, id: ObjectId) -> Option<Object> {
        self.objects.get(&id).map(|entry| entry.value().clone())
    }

    /// Materialize every object into a set stamped with the current time.
    ///
    /// Objects are ordered by id so consecutive snapshots of an unchanged
    /// registry list objects in the same order.
    pub fn snapshot(&self) -> ObjectSet {
        let mut objects: Vec<Object> = self
            .objects
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        objects.sort_by_key(|object| object.id);

        ObjectSet::snapshot(objects, utime_now())
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn stats(&self) -> &RegistryStats {
        &self.stats
    }
}

impl Default for ObjectRegistry {
    fn default() -> Self {
        Self::new()
    }
}
