use crate::object::{Object, ObjectId, ObjectSet, Pose};
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::debug;

/// Notification sent after a new snapshot has been installed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CacheUpdate {
    pub utime: i64,
    pub object_count: usize,
}

/// Closest object found by [`ReplicaCache::get_nearest`]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NearestObject {
    pub id: ObjectId,
    pub distance: f64,
}

struct CacheState {
    objects: ObjectSet,
    pose: Option<Pose>,
}

/// Most recently received snapshot plus the owning agent's latest pose.
///
/// Every read and write holds the same lock for its full duration,
/// including the copy handed back to the caller. Notifications are sent
/// only after the lock is released, so subscribers may query the cache
/// from their handlers.
pub struct ReplicaCache {
    state: Mutex<CacheState>,
    search_radius: f64,
    update_tx: broadcast::Sender<CacheUpdate>,
}

impl ReplicaCache {
    pub fn new(search_radius: f64) -> Self {
        let (update_tx, _) = broadcast::channel(16);

        Self {
            state: Mutex::new(CacheState {
                objects: ObjectSet::default(),
                pose: None,
            }),
            search_radius,
            update_tx,
        }
    }

    /// Replace the cached snapshot wholesale. Nothing from the previous
    /// snapshot survives.
    pub fn on_snapshot(&self, snapshot: ObjectSet) {
        let update = CacheUpdate {
            utime: snapshot.utime,
            object_count: snapshot.len(),
        };

        {
            let mut state = self.state.lock();
            state.objects = snapshot;
        }

        debug!(utime = update.utime, objects = update.object_count, "Installed object snapshot");

        // No subscribers is fine
        let _ = self.update_tx.send(update);
    }

    /// Store the owning agent's latest pose
    pub fn on_pose(&self, pose: Pose) {
        self.state.lock().pose = Some(pose);
    }

    /// Find an object by id with a sequential scan
    pub fn get_by_id(&self, id: ObjectId) -> Option<Object> {
        let state = self.state.lock();
        state.objects.objects.iter().find(|object| object.id == id).cloned()
    }

    /// Find the object closest to (x, y, z) within the search radius.
    ///
    /// Objects at or beyond the radius never match. Among equally close
    /// objects the first in snapshot order wins.
    pub fn get_nearest(&self, x: f64, y: f64, z: f64) -> Option<NearestObject> {
        let state = self.state.lock();

        let mut best: Option<NearestObject> = None;
        let mut min_distance = self.search_radius;

        for object in &state.objects.objects {
            let distance = object.distance_to(x, y, z);
            if distance < min_distance {
                min_distance = distance;
                best = Some(NearestObject {
                    id: object.id,
                    distance,
                });
            }
        }

        best
    }

    /// Copy of every cached object, in snapshot order
    pub fn objects(&self) -> Vec<Object> {
        self.state.lock().objects.objects.clone()
    }

    /// Timestamp of the cached snapshot (0 before the first one arrives)
    pub fn snapshot_utime(&self) -> i64 {
        self.state.lock().objects.utime
    }

    pub fn pose(&self) -> Option<Pose> {
        self.state.lock().pose.clone()
    }

    pub fn search_radius(&self) -> f64 {
        self.search_radius
    }

    /// Subscribe to snapshot installation notifications
    pub fn subscribe(&self) -> broadcast::Receiver<CacheUpdate> {
        self.update_tx.subscribe()
    }
}
