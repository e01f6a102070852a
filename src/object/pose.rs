use serde::{Deserialize, Serialize};

/// Most recent pose of the agent that owns a replica.
///
/// Cached alongside the object snapshot for context; never merged into
/// the object set.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub utime: i64,
    pub position: [f64; 3],
    pub velocity: [f64; 3],
    /// Unit quaternion (w, x, y, z)
    pub orientation: [f64; 4],
    pub rotation_rate: [f64; 3],
    pub accel: [f64; 3],
}
