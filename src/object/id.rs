//! Best-effort unique object ids.
//!
//! An id is the current microsecond timestamp shifted left by 8 bits with a
//! random disambiguator in the low byte. Ids are coarsely time-ordered and
//! need no coordination between processes; collisions across processes are
//! possible and are not detected. Within a process, ids are strictly
//! increasing.

use super::{utime_now, ObjectId};
use rand::Rng;
use std::sync::atomic::{AtomicI64, Ordering};

/// Clears the top nibble so the shifted timestamp stays positive, and the
/// low byte reserved for the disambiguator.
const TIME_MASK: i64 = 0x0fff_ffff_ffff_ff00;

const DISAMBIGUATOR_BITS: u32 = 8;
const DISAMBIGUATOR_RANGE: i64 = 1 << DISAMBIGUATOR_BITS;

static GLOBAL_GENERATOR: IdGenerator = IdGenerator::new();

/// Generate a new id from the process-wide generator
pub fn new_id() -> ObjectId {
    GLOBAL_GENERATOR.next_id()
}

/// Id generator that never hands out the same id twice in one process
pub struct IdGenerator {
    last: AtomicI64,
}

impl IdGenerator {
    pub const fn new() -> Self {
        Self {
            last: AtomicI64::new(0),
        }
    }

    /// Generate the next id from the clock and a random disambiguator
    pub fn next_id(&self) -> ObjectId {
        let noise = rand::thread_rng().gen_range(0..DISAMBIGUATOR_RANGE);
        self.next_from(utime_now(), noise)
    }

    fn next_from(&self, utime: i64, noise: i64) -> ObjectId {
        let candidate = candidate_id(utime, noise);

        // Bump past the last issued id if the clock did not move forward
        let mut last = self.last.load(Ordering::SeqCst);
        loop {
            let id = if candidate > last { candidate } else { last + 1 };
            match self
                .last
                .compare_exchange_weak(last, id, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return id,
                Err(actual) => last = actual,
            }
        }
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

fn candidate_id(utime: i64, noise: i64) -> ObjectId {
    let id = ((utime << DISAMBIGUATOR_BITS) & TIME_MASK) + (noise & (DISAMBIGUATOR_RANGE - 1));
    id.max(1)
}
