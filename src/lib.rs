// Object data model and identifier generation
pub mod object;

// Subjects and wire format
pub mod protocol;

// Message bus abstraction (NATS and in-process)
pub mod bus;

// Aggregator: authoritative registry and broadcast loop
pub mod registry;

// Replica: snapshot cache and client API
pub mod replica;

// Configuration
pub mod config;

pub use object::{new_id, utime_now, Object, ObjectId, ObjectSet, ObjectType, Pose};
pub use registry::{MergeOutcome, ObjectRegistry, ObjectServer};
pub use replica::{ClientError, NearestObject, ObjectClient, ReplicaCache};
