// Object data model, identifiers and agent pose

pub mod id;
mod pose;

pub use id::{new_id, IdGenerator};
pub use pose::Pose;

use chrono::Utc;
use serde::{Deserialize, Serialize};


/// Object identifier. Assigned ids are strictly positive.
pub type ObjectId = i64;

/// Identity quaternion (w, x, y, z)
pub const IDENTITY_ORIENTATION: [f64; 4] = [1.0, 0.0, 0.0, 0.0];

/// Current wall clock time in microseconds since the Unix epoch
pub fn utime_now() -> i64 {
    Utc::now().timestamp_micros()
}

/// Category of a physical object in the environment
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectType {
    #[default]
    Unknown,
    Table,
    Chair,
    Trashcan,
    Bed,
    Fridge,
    Microwave,
    Tv,
    ElevatorDoor,
    Laptop,
    WaterFountain,
}

impl ObjectType {
    /// Model name used by renderers to pick a mesh
    pub fn name(&self) -> &'static str {
        match self {
            ObjectType::Unknown => "default",
            ObjectType::Table => "table",
            ObjectType::Chair => "chair",
            ObjectType::Trashcan => "trashcan",
            ObjectType::Bed => "bed",
            ObjectType::Fridge => "fridge",
            ObjectType::Microwave => "microwave",
            ObjectType::Tv => "tv",
            ObjectType::ElevatorDoor => "elevator_door",
            ObjectType::Laptop => "laptop",
            ObjectType::WaterFountain => "water_fountain",
        }
    }
}

/// A single revision of a physical object (table, door, pallet, ...).
///
/// Objects are plain values: every read from a cache and every write onto
/// the bus works on a copy. `utime` is the revision number used for
/// last-writer-wins merging.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Object {
    /// Unique id; `<= 0` means not yet assigned
    pub id: ObjectId,

    /// Microsecond timestamp of this revision
    pub utime: i64,

    /// Position in the local frame
    pub position: [f64; 3],

    /// Unit quaternion (w, x, y, z)
    pub orientation: [f64; 4],

    pub bounding_box_min: [f64; 3],
    pub bounding_box_max: [f64; 3],

    pub object_type: ObjectType,

    /// Free-form display name
    pub label: String,
}

impl Object {
    /// Create an unassigned object stamped with the current time
    pub fn new(object_type: ObjectType, label: impl Into<String>) -> Self {
        Self {
            id: 0,
            utime: utime_now(),
            position: [0.0; 3],
            orientation: IDENTITY_ORIENTATION,
            bounding_box_min: [0.0; 3],
            bounding_box_max: [0.0; 3],
            object_type,
            label: label.into(),
        }
    }

    /// True once an id has been assigned
    pub fn is_assigned(&self) -> bool {
        self.id > 0
    }

    /// A bounding box is valid only if no axis is degenerate
    pub fn has_valid_bounding_box(&self) -> bool {
        self.bounding_box_min
            .iter()
            .zip(self.bounding_box_max.iter())
            .all(|(min, max)| max != min)
    }

    /// Euclidean distance from this object's position to (x, y, z)
    pub fn distance_to(&self, x: f64, y: f64, z: f64) -> f64 {
        let dx = self.position[0] - x;
        let dy = self.position[1] - y;
        let dz = self.position[2] - z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// An ordered collection of objects stamped with the time it was assembled.
///
/// Deltas carry exactly one object; snapshots carry every object the
/// aggregator knows about.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectSet {
    pub utime: i64,
    pub objects: Vec<Object>,
}

impl ObjectSet {
    /// One-object set used on the add/update subjects
    pub fn delta(object: Object, utime: i64) -> Self {
        Self {
            utime,
            objects: vec![object],
        }
    }

    /// Full set used on the snapshot subject
    pub fn snapshot(objects: Vec<Object>, utime: i64) -> Self {
        Self { utime, objects }
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}
