//! Type-safe wrappers for routing primitives.
//!
//! These newtypes keep hour stamps, moduli, bucket indexes, and shard
//! identifiers from being mixed up even though several of them share the
//! same underlying integer representation.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};

/// An hour-granularity timestamp in the conventional `YYYYMMDDHH` shape,
/// e.g. `2024042816` for 2024-04-28 16:00 UTC.
///
/// # Ordering, not calendars
///
/// Hour stamps are compared and adjusted as plain integers. `next()` adds
/// one and `back(3)` subtracts three with no carry into the day or month,
/// so intermediate values such as `2024042825` can and do occur in range
/// bookkeeping. That is intentional: routing only relies on the values
/// being totally ordered and monotonic with real time, and stored data was
/// partitioned under exactly this arithmetic. Changing it to calendar
/// arithmetic would re-route history.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct HourStamp(pub u64);

impl HourStamp {
    /// Create an hour stamp from a raw value.
    #[inline]
    pub const fn new(value: u64) -> Self {
        HourStamp(value)
    }

    /// Get the raw u64 value.
    #[inline]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// The current UTC hour as an hour stamp.
    pub fn now() -> Self {
        use chrono::{Datelike, Timelike};
        let t = chrono::Utc::now();
        let year = t.year().max(0) as u64;
        HourStamp(year * 1_000_000 + t.month() as u64 * 10_000 + t.day() as u64 * 100 + t.hour() as u64)
    }

    /// Create an hour stamp from an externally supplied integer, rejecting
    /// non-positive values.
    pub fn from_raw(value: i64) -> Result<Self> {
        if value <= 0 {
            return Err(Error::InvalidArgument(format!(
                "hour stamp must be positive, got {value}"
            )));
        }
        Ok(HourStamp(value as u64))
    }

    /// The stamp one hour later, as a plain integer increment.
    #[inline]
    pub const fn next(self) -> Self {
        HourStamp(self.0.saturating_add(1))
    }

    /// The stamp `hours` earlier, as a plain integer decrement.
    #[inline]
    pub const fn back(self, hours: u64) -> Self {
        HourStamp(self.0.saturating_sub(hours))
    }
}

impl From<u64> for HourStamp {
    fn from(value: u64) -> Self {
        HourStamp(value)
    }
}

impl From<HourStamp> for u64 {
    fn from(stamp: HourStamp) -> Self {
        stamp.0
    }
}

impl fmt::Display for HourStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The bucket count of a partition range.
///
/// Every range hashes usernames into `0..modulus` buckets, one shard per
/// bucket. Zero is rejected at construction so the hash step can never
/// divide by zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Modulus(u32);

impl Modulus {
    /// Create a modulus, rejecting zero.
    pub fn new(value: u32) -> Result<Self> {
        if value == 0 {
            return Err(Error::InvalidArgument(
                "modulus must be at least 1".to_string(),
            ));
        }
        Ok(Modulus(value))
    }

    /// Get the raw u32 value.
    #[inline]
    pub const fn value(self) -> u32 {
        self.0
    }
}

impl Default for Modulus {
    /// The stock two-bucket layout from [`crate::constants::DEFAULT_MODULUS`].
    fn default() -> Self {
        Modulus(crate::constants::DEFAULT_MODULUS)
    }
}

impl From<Modulus> for u32 {
    fn from(modulus: Modulus) -> Self {
        modulus.0
    }
}

impl fmt::Display for Modulus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A hash bucket index within a partition range, always `< modulus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct BucketIndex(pub u32);

impl BucketIndex {
    /// Create a bucket index from a raw value.
    #[inline]
    pub const fn new(value: u32) -> Self {
        BucketIndex(value)
    }

    /// Get the raw u32 value.
    #[inline]
    pub const fn value(self) -> u32 {
        self.0
    }
}

impl From<u32> for BucketIndex {
    fn from(value: u32) -> Self {
        BucketIndex(value)
    }
}

impl From<BucketIndex> for u32 {
    fn from(idx: BucketIndex) -> Self {
        idx.0
    }
}

impl fmt::Display for BucketIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A shard identifier: the start stamp of its partition range plus its
/// bucket index.
///
/// Rendered as the token `r{range_start}h{bucket}`, e.g. `r2024042816h0`.
/// The token doubles as the shard's database name and as its key in the
/// persisted connection map, so `Display` and `FromStr` must stay exact
/// mirrors of each other.
///
/// # Usage
///
/// ```
/// use timeshard::types::{BucketIndex, HourStamp, ShardId};
///
/// let shard = ShardId::new(HourStamp::new(2024042816), BucketIndex::new(0));
/// assert_eq!(shard.to_string(), "r2024042816h0");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ShardId {
    /// Start stamp of the owning partition range.
    range_start: HourStamp,
    /// Bucket index within that range.
    bucket: BucketIndex,
}

impl ShardId {
    /// Create a shard identifier.
    #[inline]
    pub const fn new(range_start: HourStamp, bucket: BucketIndex) -> Self {
        Self {
            range_start,
            bucket,
        }
    }

    /// Start stamp of the owning partition range.
    #[inline]
    pub const fn range_start(self) -> HourStamp {
        self.range_start
    }

    /// Bucket index within the owning range.
    #[inline]
    pub const fn bucket(self) -> BucketIndex {
        self.bucket
    }
}

impl fmt::Display for ShardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}h{}", self.range_start, self.bucket)
    }
}

impl FromStr for ShardId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let malformed = || Error::InvalidArgument(format!("malformed shard id {s:?}"));
        let rest = s.strip_prefix('r').ok_or_else(malformed)?;
        let (start, bucket) = rest.split_once('h').ok_or_else(malformed)?;
        let start: u64 = start.parse().map_err(|_| malformed())?;
        let bucket: u32 = bucket.parse().map_err(|_| malformed())?;
        Ok(ShardId::new(HourStamp::new(start), BucketIndex::new(bucket)))
    }
}

// Shard ids key JSON maps, so they serialize as their string token.

impl Serialize for ShardId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ShardId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let token = String::deserialize(deserializer)?;
        token.parse().map_err(serde::de::Error::custom)
    }
}
