use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::config::BookingRules;
use crate::types::{DailyAvailability, DayOccupancy};

/// A signed guest delta over the half-open date range `[from, to)`.
///
/// Positive deltas block capacity (create, extend), negative deltas release
/// it (cancel, shrink). A single operation may carry several deltas; they are
/// merged per date before any write is planned.
#[derive(Debug, Clone, Copy)]
pub struct RangeDelta {
    /// First affected date.
    pub from: NaiveDate,
    /// First date past the affected range (checkout day, untouched).
    pub to: NaiveDate,
    /// Guests to add (positive) or remove (negative) on each date.
    pub guests: i32,
}

impl RangeDelta {
    /// A delta that blocks `guests` of capacity over `[from, to)`.
    pub fn block(from: NaiveDate, to: NaiveDate, guests: i32) -> Self {
        Self { from, to, guests }
    }

    /// A delta that releases `guests` of capacity over `[from, to)`.
    pub fn release(from: NaiveDate, to: NaiveDate, guests: i32) -> Self {
        Self {
            from,
            to,
            guests: -guests,
        }
    }
}

/// One planned ledger write, carrying the revision observed at read time so
/// the store can reject it if the row has moved on since.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayWrite {
    /// Create a row for a date the ledger has never seen.
    Insert {
        /// Date of the new row.
        date: NaiveDate,
        /// Occupied guests to record.
        guests: i32,
    },
    /// Overwrite an existing row, conditional on its revision.
    Update {
        /// Date of the row.
        date: NaiveDate,
        /// New occupied-guest count.
        guests: i32,
        /// Revision the row had when the snapshot was read.
        expected_revision: i64,
    },
}

/// Derives a dense availability calendar from sparse ledger rows.
pub struct AvailabilityCalculator {
    rules: BookingRules,
}

impl AvailabilityCalculator {
    /// Creates a calculator for the given rules.
    pub fn new(rules: BookingRules) -> Self {
        Self { rules }
    }

    /// Computes remaining capacity for every date in `[from, to)`.
    ///
    /// `rows` must be the ledger rows within the range, sorted by date. The
    /// result is a merge of that sparse sequence with the full date range:
    /// strictly increasing dates, no gaps, with unbooked dates reported at
    /// full capacity.
    pub fn calendar(
        &self,
        rows: &[DayOccupancy],
        from: NaiveDate,
        to: NaiveDate,
    ) -> Vec<DailyAvailability> {
        let max = self.rules.max_capacity;
        let mut rows = rows.iter().peekable();
        from.iter_days()
            .take_while(|date| *date < to)
            .map(|date| {
                let occupied = rows
                    .next_if(|row| row.date == date)
                    .map(|row| row.guests)
                    .unwrap_or(0);
                DailyAvailability {
                    date,
                    availability: max - occupied,
                }
            })
            .collect()
    }
}

/// Folds a set of range deltas into occupied guests per date, starting from a
/// ledger snapshot. Dates that end up untouched and unbooked are absent.
pub fn occupancy_after(
    snapshot: &[DayOccupancy],
    deltas: &[RangeDelta],
) -> BTreeMap<NaiveDate, i32> {
    let mut occupancy: BTreeMap<NaiveDate, i32> =
        snapshot.iter().map(|row| (row.date, row.guests)).collect();
    for delta in deltas {
        for date in delta.from.iter_days().take_while(|d| *d < delta.to) {
            *occupancy.entry(date).or_insert(0) += delta.guests;
        }
    }
    occupancy
}

/// Plans the versioned ledger writes that apply `deltas` on top of `snapshot`.
///
/// Overlapping deltas are merged so each affected date gets exactly one
/// write. Rows are created on a date's first positive delta; a release
/// against a date with no row is a no-op (the row never existed, there is
/// nothing to give back). Rows reaching zero are kept rather than deleted.
pub fn plan_writes(snapshot: &[DayOccupancy], deltas: &[RangeDelta]) -> Vec<DayWrite> {
    let stored: BTreeMap<NaiveDate, &DayOccupancy> =
        snapshot.iter().map(|row| (row.date, row)).collect();

    let mut delta_by_date: BTreeMap<NaiveDate, i32> = BTreeMap::new();
    for delta in deltas {
        for date in delta.from.iter_days().take_while(|d| *d < delta.to) {
            *delta_by_date.entry(date).or_insert(0) += delta.guests;
        }
    }

    let mut writes = Vec::with_capacity(delta_by_date.len());
    for (date, delta) in delta_by_date {
        if delta == 0 {
            continue;
        }
        match stored.get(&date) {
            Some(row) => {
                let guests = row.guests + delta;
                debug_assert!(guests >= 0, "ledger underflow on {date}");
                writes.push(DayWrite::Update {
                    date,
                    guests,
                    expected_revision: row.revision,
                });
            }
            None if delta > 0 => writes.push(DayWrite::Insert { date, guests: delta }),
            None => {}
        }
    }
    writes
}
