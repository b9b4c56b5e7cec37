//! # Record Identifiers and Protocol Constants
//!
//! Records are keyed by [ULIDs](https://github.com/ulid/spec) rendered in
//! Crockford Base32:
//!
//! - 26 characters, always ([`RECORD_ID_LEN`])
//! - lexicographic order equals creation order (48-bit millisecond prefix)
//! - 80 random bits per millisecond
//!
//! The store needs identifiers that are *never* reissued after a delete, so
//! [`RecordIdGenerator`] is backed by `ferroid`'s monotonic ULID generator
//! driven by a [`MonotonicClock`]. Within one millisecond the random part is
//! incremented instead of redrawn, which keeps issued identifiers strictly
//! increasing for the lifetime of the generator. When a millisecond runs out
//! of random room the generator reports [`IdGenStatus::Pending`] and the
//! caller yields before asking again.

use crate::{Error, Result};
use ferroid::{
    base32::Base32UlidExt,
    generator::LockMonoUlidGenerator,
    id::ULID,
    rand::{RandSource, ThreadRandom},
    time::{MonotonicClock, TimeSource},
};

pub use ferroid::generator::IdGenStatus;

/// The identifier type behind every record.
pub type RecordId = ULID;

/// Length of an encoded [`RecordId`].
pub const RECORD_ID_LEN: usize = 26;

/// Request header that carries the shared secret unless configured otherwise.
pub const DEFAULT_TOKEN_HEADER: &str = "x-auth-token";

/// Issues strictly increasing ULIDs.
pub struct RecordIdGenerator<T = MonotonicClock, R = ThreadRandom>
where
    T: TimeSource<u128>,
    R: RandSource<u128>,
{
    inner: LockMonoUlidGenerator<RecordId, T, R>,
}

impl RecordIdGenerator {
    pub fn new() -> Self {
        Self::with_sources(MonotonicClock::default(), ThreadRandom)
    }
}

impl Default for RecordIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, R> RecordIdGenerator<T, R>
where
    T: TimeSource<u128>,
    R: RandSource<u128>,
{
    pub fn with_sources(time: T, rng: R) -> Self {
        Self {
            inner: LockMonoUlidGenerator::new(time, rng),
        }
    }

    /// Polls for the next identifier.
    ///
    /// `Pending` means the current millisecond is exhausted; yield and retry.
    pub fn try_next_id(&self) -> Result<IdGenStatus<RecordId>> {
        self.inner
            .try_next_id()
            .map_err(|err| Error::internal(format!("record id generator failed: {err}")))
    }
}

impl<T, R> core::fmt::Debug for RecordIdGenerator<T, R>
where
    T: TimeSource<u128>,
    R: RandSource<u128>,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RecordIdGenerator").finish_non_exhaustive()
    }
}

/// Crockford Base32 rendering of a [`RecordId`].
pub fn encode(id: &RecordId) -> String {
    id.encode().to_string()
}
