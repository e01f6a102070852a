use crate::bus::{MessageBus, Subscription};
use crate::config::ReplicaConfig;
use crate::object::{new_id, utime_now, Object, ObjectId, ObjectSet, Pose};
use crate::protocol::{self, ProtocolError, OBJECT_ADD_SUBJECT, OBJECT_LIST_SUBJECT, POSE_SUBJECT};
use crate::replica::cache::{CacheUpdate, NearestObject, ReplicaCache};
use anyhow::Context;
use futures::StreamExt;
use std::fmt;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Errors returned by replica write operations
#[derive(Debug)]
pub enum ClientError {
    /// The id is not in the cached snapshot
    ObjectNotFound(ObjectId),
    Protocol(ProtocolError),
    /// The bus rejected the publish
    Transport(anyhow::Error),
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::ObjectNotFound(id) => write!(f, "no object with id {} in cache", id),
            ClientError::Protocol(e) => write!(f, "failed to encode object update: {}", e),
            ClientError::Transport(e) => write!(f, "failed to publish object update: {:#}", e),
        }
    }
}

impl std::error::Error for ClientError {}

impl From<ProtocolError> for ClientError {
    fn from(e: ProtocolError) -> Self {
        ClientError::Protocol(e)
    }
}

/// Replica of the object set plus the write API.
///
/// Reads are answered from the last snapshot received. Writes are
/// fire-and-forget: they publish a one-object delta and return without
/// waiting for the server; the change becomes visible once it comes back
/// in a later snapshot.
pub struct ObjectClient {
    cache: Arc<ReplicaCache>,
    bus: Arc<dyn MessageBus>,
    update_subject: String,
    listeners: Vec<JoinHandle<()>>,
}

impl ObjectClient {
    /// Subscribe to the snapshot and pose subjects.
    ///
    /// Subscription failure is a startup error.
    pub async fn connect(bus: Arc<dyn MessageBus>, config: ReplicaConfig) -> anyhow::Result<Self> {
        let cache = Arc::new(ReplicaCache::new(config.search_radius));

        let object_lists = bus
            .subscribe(OBJECT_LIST_SUBJECT)
            .await
            .context("Failed to subscribe to object list")?;
        let poses = bus
            .subscribe(POSE_SUBJECT)
            .await
            .context("Failed to subscribe to pose")?;

        let listeners = vec![
            tokio::spawn(run_object_list_listener(Arc::clone(&cache), object_lists)),
            tokio::spawn(run_pose_listener(Arc::clone(&cache), poses)),
        ];

        info!(
            search_radius = config.search_radius,
            update_subject = %config.update_subject,
            "Object client connected"
        );

        Ok(Self {
            cache,
            bus,
            update_subject: config.update_subject,
            listeners,
        })
    }

    pub fn cache(&self) -> &Arc<ReplicaCache> {
        &self.cache
    }

    /// Submit an object that may not exist yet.
    ///
    /// Assigns a fresh id when `object.id <= 0` and returns the id used.
    pub async fn add(&self, mut object: Object) -> Result<ObjectId, ClientError> {
        if object.id <= 0 {
            object.id = new_id();
        }

        let id = object.id;
        let utime = object.utime;
        self.publish(OBJECT_ADD_SUBJECT, ObjectSet::delta(object, utime))
            .await?;

        Ok(id)
    }

    /// Publish a new revision of an object, stamped with the current time.
    ///
    /// If the object already carries a `utime` at or past the local clock
    /// (a writer whose clock runs ahead stamped it), the revision is stamped
    /// `object.utime + 1` instead, so the edit still wins the server's
    /// strictly-newer merge.
    pub async fn update(&self, mut object: Object) -> Result<(), ClientError> {
        let utime = utime_now().max(object.utime.saturating_add(1));
        object.utime = utime;

        self.publish(&self.update_subject, ObjectSet::delta(object, utime))
            .await
    }

    /// Move an object to (x, y, z)
    pub async fn update_position(
        &self,
        mut object: Object,
        x: f64,
        y: f64,
        z: f64,
    ) -> Result<(), ClientError> {
        object.position = [x, y, z];
        self.update(object).await
    }

    /// Move a cached object to (x, y, z)
    pub async fn update_position_by_id(
        &self,
        id: ObjectId,
        x: f64,
        y: f64,
        z: f64,
    ) -> Result<(), ClientError> {
        let object = self.get_by_id(id).ok_or(ClientError::ObjectNotFound(id))?;
        self.update_position(object, x, y, z).await
    }

    /// Move a cached object by (dx, dy, dz)
    pub async fn move_by_id(
        &self,
        id: ObjectId,
        dx: f64,
        dy: f64,
        dz: f64,
    ) -> Result<(), ClientError> {
        let object = self.get_by_id(id).ok_or(ClientError::ObjectNotFound(id))?;
        let [x, y, z] = object.position;
        self.update_position(object, x + dx, y + dy, z + dz).await
    }

    pub fn get_by_id(&self, id: ObjectId) -> Option<Object> {
        self.cache.get_by_id(id)
    }

    pub fn get_nearest(&self, x: f64, y: f64, z: f64) -> Option<NearestObject> {
        self.cache.get_nearest(x, y, z)
    }

    pub fn objects(&self) -> Vec<Object> {
        self.cache.objects()
    }

    pub fn pose(&self) -> Option<Pose> {
        self.cache.pose()
    }

    /// Subscribe to snapshot installation notifications
    pub fn subscribe(&self) -> broadcast::Receiver<CacheUpdate> {
        self.cache.subscribe()
    }

    async fn publish(&self, subject: &str, delta: ObjectSet) -> Result<(), ClientError> {
        let payload = protocol::encode_object_set(&delta)?;

        self.bus
            .publish(subject, payload)
            .await
            .map_err(ClientError::Transport)?;

        if let Some(object) = delta.objects.first() {
            debug!(subject = %subject, id = object.id, utime = object.utime, "Published object delta");
        }

        Ok(())
    }
}

impl Drop for ObjectClient {
    fn drop(&mut self) {
        for listener in &self.listeners {
            listener.abort();
        }
    }
}

async fn run_object_list_listener(cache: Arc<ReplicaCache>, mut object_lists: Subscription) {
    while let Some(message) = object_lists.next().await {
        match protocol::decode_object_set(&message.payload) {
            Ok(snapshot) => cache.on_snapshot(snapshot),
            Err(e) => {
                warn!(subject = %message.subject, error = %e, "Ignoring undecodable object list");
            }
        }
    }

    warn!("Object list subscription ended");
}

async fn run_pose_listener(cache: Arc<ReplicaCache>, mut poses: Subscription) {
    while let Some(message) = poses.next().await {
        match protocol::decode_pose(&message.payload) {
            Ok(pose) => cache.on_pose(pose),
            Err(e) => {
                warn!(subject = %message.subject, error = %e, "Ignoring undecodable pose");
            }
        }
    }

    warn!("Pose subscription ended");
}
