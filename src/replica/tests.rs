use super::*;
use crate::bus::{LocalBus, MessageBus, Subscription};
use crate::config::ReplicaConfig;
use crate::object::{utime_now, Object, ObjectId, ObjectSet, ObjectType, Pose};
use crate::protocol::{
    self, update_subject, WireMessage, OBJECT_ADD_SUBJECT, OBJECT_LIST_SUBJECT,
    OBJECT_UPDATES_PATTERN, OBJECT_UPDATE_SUBJECT, POSE_SUBJECT,
};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;

fn object_at(id: ObjectId, x: f64, y: f64, z: f64) -> Object {
    let mut object = Object::new(ObjectType::Table, format!("table_{}", id));
    object.id = id;
    object.position = [x, y, z];
    object
}

fn snapshot_of(objects: Vec<Object>) -> ObjectSet {
    ObjectSet::snapshot(objects, 1_000)
}

async fn next_delta(updates: &mut Subscription) -> (String, ObjectSet) {
    let message = tokio::time::timeout(Duration::from_secs(1), updates.next())
        .await
        .expect("timed out waiting for delta")
        .expect("subscription ended");
    let set = protocol::decode_object_set(&message.payload).unwrap();
    (message.subject, set)
}

async fn wait_for<F: Fn() -> bool>(condition: F) {
    for _ in 0..100 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met in time");
}

// ── ReplicaCache ──────────────────────────────────────────────────────────────

#[test]
fn test_empty_cache_misses() {
    let cache = ReplicaCache::new(20.0);
    assert!(cache.get_by_id(1).is_none());
    assert!(cache.get_nearest(0.0, 0.0, 0.0).is_none());
    assert!(cache.objects().is_empty());
    assert!(cache.pose().is_none());
    assert_eq!(cache.snapshot_utime(), 0);
}

#[test]
fn test_get_by_id_returns_copy() {
    let cache = ReplicaCache::new(20.0);
    cache.on_snapshot(snapshot_of(vec![object_at(1, 0.0, 0.0, 0.0), object_at(2, 5.0, 0.0, 0.0)]));

    let mut copy = cache.get_by_id(2).unwrap();
    assert_eq!(copy.position, [5.0, 0.0, 0.0]);

    // Mutating the copy does not touch the cache
    copy.position = [9.0, 9.0, 9.0];
    assert_eq!(cache.get_by_id(2).unwrap().position, [5.0, 0.0, 0.0]);
}

#[test]
fn test_snapshot_replacement_is_total() {
    let cache = ReplicaCache::new(20.0);
    cache.on_snapshot(snapshot_of(vec![object_at(1, 0.0, 0.0, 0.0), object_at(2, 1.0, 0.0, 0.0)]));
    cache.on_snapshot(ObjectSet::snapshot(vec![object_at(3, 10.0, 0.0, 0.0)], 2_000));

    assert!(cache.get_by_id(1).is_none());
    assert!(cache.get_by_id(2).is_none());
    assert!(cache.get_by_id(3).is_some());
    assert_eq!(cache.objects().len(), 1);
    assert_eq!(cache.snapshot_utime(), 2_000);

    // The nearest query sees only the new snapshot
    let nearest = cache.get_nearest(0.0, 0.0, 0.0).unwrap();
    assert_eq!(nearest.id, 3);
}

#[test]
fn test_get_nearest_within_radius() {
    let cache = ReplicaCache::new(20.0);
    cache.on_snapshot(snapshot_of(vec![
        object_at(1, 0.0, 0.0, 0.0),
        object_at(2, 5.0, 0.0, 0.0),
        object_at(3, 25.0, 0.0, 0.0),
    ]));

    let nearest = cache.get_nearest(1.0, 0.0, 0.0).unwrap();
    assert_eq!(nearest.id, 1);
    assert_eq!(nearest.distance, 1.0);

    // 25-unit object is outside the 20-unit radius
    assert!(cache.get_nearest(100.0, 0.0, 0.0).is_none());
}

#[test]
fn test_get_nearest_excludes_objects_on_the_radius() {
    let cache = ReplicaCache::new(20.0);
    cache.on_snapshot(snapshot_of(vec![object_at(1, 20.0, 0.0, 0.0)]));

    assert!(cache.get_nearest(0.0, 0.0, 0.0).is_none());
}

#[test]
fn test_get_nearest_tie_goes_to_first_in_scan_order() {
    let cache = ReplicaCache::new(20.0);
    cache.on_snapshot(snapshot_of(vec![
        object_at(7, 2.0, 0.0, 0.0),
        object_at(3, -2.0, 0.0, 0.0),
    ]));

    let nearest = cache.get_nearest(0.0, 0.0, 0.0).unwrap();
    assert_eq!(nearest.id, 7);
    assert_eq!(nearest.distance, 2.0);
}

#[test]
fn test_custom_search_radius() {
    let cache = ReplicaCache::new(1.0);
    cache.on_snapshot(snapshot_of(vec![object_at(1, 2.0, 0.0, 0.0)]));

    assert_eq!(cache.search_radius(), 1.0);
    assert!(cache.get_nearest(0.0, 0.0, 0.0).is_none());
    assert!(cache.get_nearest(1.5, 0.0, 0.0).is_some());
}

#[test]
fn test_pose_is_kept_apart_from_objects() {
    let cache = ReplicaCache::new(20.0);
    let pose = Pose {
        utime: 5,
        position: [1.0, 2.0, 3.0],
        ..Default::default()
    };

    cache.on_pose(pose.clone());
    cache.on_snapshot(snapshot_of(vec![]));

    assert_eq!(cache.pose(), Some(pose));
    assert!(cache.objects().is_empty());
}

#[test]
fn test_notification_handler_can_query_cache() {
    let cache = ReplicaCache::new(20.0);
    let mut rx = cache.subscribe();

    cache.on_snapshot(snapshot_of(vec![object_at(1, 0.0, 0.0, 0.0)]));

    let update = rx.try_recv().unwrap();
    assert_eq!(update.object_count, 1);
    assert_eq!(update.utime, 1_000);

    // Lock is already released when the notification is observed
    assert!(cache.get_by_id(1).is_some());
}

// ── ObjectClient ──────────────────────────────────────────────────────────────

async fn connect(bus: &LocalBus, config: ReplicaConfig) -> ObjectClient {
    let bus: Arc<dyn MessageBus> = Arc::new(bus.clone());
    ObjectClient::connect(bus, config).await.unwrap()
}

#[tokio::test]
async fn test_add_assigns_distinct_ids() {
    let bus = LocalBus::new();
    let mut updates = bus.subscribe(OBJECT_UPDATES_PATTERN).await.unwrap();
    let client = connect(&bus, ReplicaConfig::default()).await;

    let first = client.add(Object::new(ObjectType::Chair, "Chair")).await.unwrap();
    let second = client.add(Object::new(ObjectType::Chair, "Chair")).await.unwrap();

    assert!(first > 0);
    assert!(second > 0);
    assert_ne!(first, second);

    let (subject, delta) = next_delta(&mut updates).await;
    assert_eq!(subject, OBJECT_ADD_SUBJECT);
    assert_eq!(delta.len(), 1);
    assert_eq!(delta.objects[0].id, first);
    assert_eq!(delta.utime, delta.objects[0].utime);
}

#[tokio::test]
async fn test_add_keeps_caller_id() {
    let bus = LocalBus::new();
    let mut updates = bus.subscribe(OBJECT_UPDATES_PATTERN).await.unwrap();
    let client = connect(&bus, ReplicaConfig::default()).await;

    let id = client.add(object_at(10, 1.0, 0.0, 0.0)).await.unwrap();
    assert_eq!(id, 10);

    let (_, delta) = next_delta(&mut updates).await;
    assert_eq!(delta.objects[0].id, 10);
}

#[tokio::test]
async fn test_update_stamps_newer_utime() {
    let bus = LocalBus::new();
    let mut updates = bus.subscribe(OBJECT_UPDATES_PATTERN).await.unwrap();
    let client = connect(&bus, ReplicaConfig::default()).await;

    let mut object = object_at(10, 1.0, 0.0, 0.0);
    object.utime = 5;
    client.update(object).await.unwrap();

    let (subject, delta) = next_delta(&mut updates).await;
    assert_eq!(subject, OBJECT_UPDATE_SUBJECT);
    assert!(delta.objects[0].utime > 5);
    assert_eq!(delta.utime, delta.objects[0].utime);
}

#[tokio::test]
async fn test_update_uses_current_time_for_past_revisions() {
    let bus = LocalBus::new();
    let mut updates = bus.subscribe(OBJECT_UPDATES_PATTERN).await.unwrap();
    let client = connect(&bus, ReplicaConfig::default()).await;

    let mut object = object_at(10, 1.0, 0.0, 0.0);
    object.utime = 1;
    let before = utime_now();
    client.update(object).await.unwrap();
    let after = utime_now();

    let (_, delta) = next_delta(&mut updates).await;
    assert!(delta.utime >= before && delta.utime <= after);
}

#[tokio::test]
async fn test_update_outruns_revision_from_clock_ahead_writer() {
    let bus = LocalBus::new();
    let mut updates = bus.subscribe(OBJECT_UPDATES_PATTERN).await.unwrap();
    let client = connect(&bus, ReplicaConfig::default()).await;

    // Stamped by a writer one hour ahead of us
    let mut object = object_at(10, 1.0, 0.0, 0.0);
    object.utime = utime_now() + 3_600_000_000;
    let ahead = object.utime;
    client.update(object).await.unwrap();

    let (_, delta) = next_delta(&mut updates).await;
    assert_eq!(delta.objects[0].utime, ahead + 1);
}

#[tokio::test]
async fn test_update_uses_configured_subject() {
    let bus = LocalBus::new();
    let mut updates = bus.subscribe(OBJECT_UPDATES_PATTERN).await.unwrap();
    let config = ReplicaConfig {
        update_subject: update_subject("viewer"),
        ..Default::default()
    };
    let client = connect(&bus, config).await;

    client
        .update_position(object_at(4, 0.0, 0.0, 0.0), 1.0, 2.0, 3.0)
        .await
        .unwrap();

    let (subject, delta) = next_delta(&mut updates).await;
    assert_eq!(subject, "objects.update.viewer");
    assert_eq!(delta.objects[0].position, [1.0, 2.0, 3.0]);
}

#[tokio::test]
async fn test_by_id_writes_use_cached_copy() {
    let bus = LocalBus::new();
    let mut updates = bus.subscribe(OBJECT_UPDATES_PATTERN).await.unwrap();
    let client = connect(&bus, ReplicaConfig::default()).await;

    client
        .cache()
        .on_snapshot(snapshot_of(vec![object_at(8, 1.0, 1.0, 1.0)]));

    client.move_by_id(8, 1.0, -1.0, 0.5).await.unwrap();
    let (_, moved) = next_delta(&mut updates).await;
    assert_eq!(moved.objects[0].position, [2.0, 0.0, 1.5]);

    client.update_position_by_id(8, 7.0, 7.0, 7.0).await.unwrap();
    let (_, placed) = next_delta(&mut updates).await;
    assert_eq!(placed.objects[0].position, [7.0, 7.0, 7.0]);

    // The cache is untouched until the server broadcasts again
    assert_eq!(client.get_by_id(8).unwrap().position, [1.0, 1.0, 1.0]);
}

#[tokio::test]
async fn test_by_id_write_on_unknown_id_fails() {
    let bus = LocalBus::new();
    let client = connect(&bus, ReplicaConfig::default()).await;

    match client.move_by_id(404, 1.0, 0.0, 0.0).await {
        Err(ClientError::ObjectNotFound(404)) => {}
        other => panic!("Expected ObjectNotFound, got {:?}", other),
    }
    assert!(client.update_position_by_id(404, 0.0, 0.0, 0.0).await.is_err());
}

#[tokio::test]
async fn test_listeners_install_snapshots_and_pose() {
    let bus = LocalBus::new();
    let client = connect(&bus, ReplicaConfig::default()).await;

    let snapshot = snapshot_of(vec![object_at(1, 0.0, 0.0, 0.0)]);
    bus.publish(OBJECT_LIST_SUBJECT, protocol::encode_object_set(&snapshot).unwrap())
        .await
        .unwrap();

    let pose = Pose {
        utime: 9,
        ..Default::default()
    };
    bus.publish(POSE_SUBJECT, protocol::encode(&WireMessage::Pose(pose.clone())).unwrap())
        .await
        .unwrap();

    wait_for(|| client.get_by_id(1).is_some() && client.pose().is_some()).await;
    assert_eq!(client.pose(), Some(pose));
}

#[tokio::test]
async fn test_undecodable_snapshot_keeps_previous_cache() {
    let bus = LocalBus::new();
    let client = connect(&bus, ReplicaConfig::default()).await;
    let mut rx = client.subscribe();

    let snapshot = snapshot_of(vec![object_at(1, 0.0, 0.0, 0.0)]);
    bus.publish(OBJECT_LIST_SUBJECT, b"garbage".to_vec()).await.unwrap();
    bus.publish(OBJECT_LIST_SUBJECT, protocol::encode_object_set(&snapshot).unwrap())
        .await
        .unwrap();

    // Only the valid snapshot produces a notification
    let update = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(update.object_count, 1);
    assert!(client.get_by_id(1).is_some());
}
