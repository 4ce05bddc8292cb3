//! The partition table: an append-only sequence of date ranges.
//!
//! Each range owns every row whose origin stamp falls inside it, inclusive
//! on both ends. Ranges are contiguous in hour stamps and strictly
//! ascending; the last range is open (no end yet) and absorbs everything
//! from its start up to the current hour. Growth never rewrites history:
//! expansion closes the open range and appends a new one, so a date that
//! routed somewhere yesterday routes there forever.

use crate::error::{DateRangeViolation, Error, Result};
use crate::types::{BucketIndex, HourStamp, Modulus, ShardId};

/// One date range and the bucket count its rows hash under.
///
/// `end == None` marks the open range. A closed range covers the inclusive
/// interval `[start, end]`; the open range covers `[start, now]` for
/// whatever "now" is at lookup time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionRange {
    start: HourStamp,
    end: Option<HourStamp>,
    modulus: Modulus,
}

impl PartitionRange {
    /// A closed range covering `[start, end]`.
    pub fn closed(start: HourStamp, end: HourStamp, modulus: Modulus) -> Self {
        Self {
            start,
            end: Some(end),
            modulus,
        }
    }

    /// An open range starting at `start`.
    pub fn open(start: HourStamp, modulus: Modulus) -> Self {
        Self {
            start,
            end: None,
            modulus,
        }
    }

    #[inline]
    pub fn start(&self) -> HourStamp {
        self.start
    }

    #[inline]
    pub fn end(&self) -> Option<HourStamp> {
        self.end
    }

    #[inline]
    pub fn modulus(&self) -> Modulus {
        self.modulus
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.end.is_none()
    }

    /// The shards of this range, one per bucket, in bucket order.
    ///
    /// Shard ids are derived from the range rather than stored, which keeps
    /// "one shard per bucket" true by construction.
    pub fn shard_ids(&self) -> impl Iterator<Item = ShardId> {
        let start = self.start;
        (0..self.modulus.value()).map(move |b| ShardId::new(start, BucketIndex::new(b)))
    }

    /// Whether `date` falls in this range, treating an open end as `now`.
    pub fn contains(&self, date: HourStamp, now: HourStamp) -> bool {
        date >= self.start && date <= self.end.unwrap_or(now)
    }
}

/// The ordered, contiguous sequence of partition ranges.
///
/// Structural invariants, enforced on every construction path:
///
/// - starts strictly ascending;
/// - adjacent ranges meet exactly: `end + 1 == next start`;
/// - every range but the last is closed, and a closed range covers at
///   least its own start hour;
/// - a non-empty table ends in the open range.
///
/// An empty table is the pre-initiation state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PartitionTable {
    ranges: Vec<PartitionRange>,
}

impl PartitionTable {
    /// The empty table.
    pub fn empty() -> Self {
        Self { ranges: Vec::new() }
    }

    /// The table of a freshly initiated deployment: a single open range.
    pub fn initial(start: HourStamp, modulus: Modulus) -> Self {
        Self {
            ranges: vec![PartitionRange::open(start, modulus)],
        }
    }

    /// Build a table from explicit ranges, rejecting any invariant
    /// violation as corrupt.
    pub fn from_ranges(ranges: Vec<PartitionRange>) -> Result<Self> {
        Self::validate(&ranges)?;
        Ok(Self { ranges })
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    #[inline]
    pub fn ranges(&self) -> &[PartitionRange] {
        &self.ranges
    }

    /// The open range, if the table is non-empty.
    pub fn open_range(&self) -> Option<&PartitionRange> {
        self.ranges.last().filter(|r| r.is_open())
    }

    /// Every shard id reachable from the table, in range then bucket order.
    pub fn shard_ids(&self) -> impl Iterator<Item = ShardId> + '_ {
        self.ranges.iter().flat_map(|r| r.shard_ids())
    }

    /// A new table with the open range closed at `close_at` and a fresh
    /// open range appended.
    ///
    /// Policy checks (same-hour collisions, "is now really now") belong to
    /// the caller; this only guarantees the result is structurally valid.
    pub fn grow(
        &self,
        close_at: HourStamp,
        new_start: HourStamp,
        new_modulus: Modulus,
    ) -> Result<Self> {
        let open = self.open_range().ok_or_else(|| {
            Error::CorruptMetadata("cannot grow a table with no open range".to_string())
        })?;
        let mut ranges = self.ranges.clone();
        let last = ranges
            .last_mut()
            .ok_or_else(|| Error::CorruptMetadata("cannot grow an empty table".to_string()))?;
        *last = PartitionRange::closed(open.start(), close_at, open.modulus());
        ranges.push(PartitionRange::open(new_start, new_modulus));
        Self::from_ranges(ranges)
    }

    /// Find the range covering `origin`.
    ///
    /// Dates after the newest boundary can only belong to the open range,
    /// so that case returns directly; everything else is a binary search by
    /// inclusive interval containment. Exhausting the search means the
    /// table has a gap, which is metadata corruption rather than caller
    /// error.
    pub fn locate_range(&self, origin: HourStamp, now: HourStamp) -> Result<&PartitionRange> {
        let (first, last) = match (self.ranges.first(), self.ranges.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return Err(Error::EmptyMetadata),
        };
        if origin > now {
            return Err(Error::DateOutOfRange {
                date: origin,
                reason: DateRangeViolation::InFuture,
            });
        }
        if origin < first.start() {
            return Err(Error::DateOutOfRange {
                date: origin,
                reason: DateRangeViolation::PredatesDeployment,
            });
        }
        if origin > last.start() {
            return Ok(last);
        }

        let mut lo = 0;
        let mut hi = self.ranges.len();
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let range = &self.ranges[mid];
            if origin < range.start() {
                hi = mid;
            } else if origin > range.end().unwrap_or(now) {
                lo = mid + 1;
            } else {
                return Ok(range);
            }
        }
        Err(Error::CorruptMetadata(format!(
            "no partition range covers {origin}"
        )))
    }

    fn validate(ranges: &[PartitionRange]) -> Result<()> {
        for (i, range) in ranges.iter().enumerate() {
            let is_last = i + 1 == ranges.len();
            match range.end() {
                None if !is_last => {
                    return Err(Error::CorruptMetadata(format!(
                        "range starting {} is open but not last",
                        range.start()
                    )));
                }
                Some(end) if end < range.start() => {
                    return Err(Error::CorruptMetadata(format!(
                        "range starting {} ends before it starts ({end})",
                        range.start()
                    )));
                }
                Some(_) if is_last => {
                    return Err(Error::CorruptMetadata(format!(
                        "last range starting {} is closed; tables end in an open range",
                        range.start()
                    )));
                }
                _ => {}
            }
            if let Some(next) = ranges.get(i + 1) {
                // end() is Some here: the open-but-not-last arm above ran first.
                let end = range.end().unwrap_or(range.start());
                if end.next() != next.start() {
                    return Err(Error::CorruptMetadata(format!(
                        "ranges are not contiguous: {} ends {end}, next starts {}",
                        range.start(),
                        next.start()
                    )));
                }
            }
        }
        Ok(())
    }
}
