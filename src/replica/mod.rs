// Replica-side snapshot cache and client API

mod cache;
mod client;

pub use cache::{CacheUpdate, NearestObject, ReplicaCache};
pub use client::{ClientError, ObjectClient};

#[cfg(test)]
mod tests;
