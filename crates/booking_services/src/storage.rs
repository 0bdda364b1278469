use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::availability::DayWrite;
use crate::types::{BookingError, DayOccupancy, Reservation};

/// Errors reported by a [`BookingStore`].
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A row written by this operation changed since it was read. The whole
    /// operation can safely be retried from scratch.
    #[error("concurrent modification detected")]
    Conflict,

    /// The backing store failed.
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl From<StorageError> for BookingError {
    fn from(error: StorageError) -> Self {
        match error {
            StorageError::Conflict => BookingError::ConcurrentModification,
            StorageError::Backend(source) => BookingError::Storage(source),
        }
    }
}

/// The reservation-table side of a commit.
#[derive(Debug, Clone)]
pub enum ReservationWrite {
    /// Persist a new reservation.
    Insert(Reservation),
    /// Overwrite an existing reservation's fields.
    Update(Reservation),
    /// Remove a reservation.
    Delete(Uuid),
}

/// Persistence contract for the availability ledger and the reservations it
/// covers.
///
/// Reads return the latest committed state. `commit` is the only mutation
/// path: it applies every planned day write and the reservation write as one
/// atomic unit, and must fail with [`StorageError::Conflict`] without
/// applying anything if any updated row's revision no longer matches, if an
/// inserted date has appeared in the meantime, or if a written reservation
/// has been deleted underneath the operation.
#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Ledger rows for dates in `[from, to)`, sorted by date.
    async fn occupancy_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DayOccupancy>, StorageError>;

    /// Loads a reservation by id.
    async fn reservation(&self, id: Uuid) -> Result<Option<Reservation>, StorageError>;

    /// Atomically applies the planned ledger writes and the reservation
    /// write; all or nothing.
    async fn commit(
        &self,
        days: Vec<DayWrite>,
        reservation: ReservationWrite,
    ) -> Result<(), StorageError>;
}

/// In-process [`BookingStore`] with the same optimistic-concurrency semantics
/// as the database-backed store. Used by tests and local runs.
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    days: BTreeMap<NaiveDate, StoredDay>,
    reservations: HashMap<Uuid, Reservation>,
}

#[derive(Clone, Copy)]
struct StoredDay {
    guests: i32,
    revision: i64,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MemoryInner::default()),
        }
    }

    /// Committed occupied-guest count for a date, zero if the date has no row.
    pub async fn occupied_on(&self, date: NaiveDate) -> i32 {
        let inner = self.inner.lock().await;
        inner.days.get(&date).map(|day| day.guests).unwrap_or(0)
    }
}

#[async_trait]
impl BookingStore for MemoryStore {
    async fn occupancy_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DayOccupancy>, StorageError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .days
            .range(from..to)
            .map(|(date, day)| DayOccupancy {
                date: *date,
                guests: day.guests,
                revision: day.revision,
            })
            .collect())
    }

    async fn reservation(&self, id: Uuid) -> Result<Option<Reservation>, StorageError> {
        let inner = self.inner.lock().await;
        Ok(inner.reservations.get(&id).cloned())
    }

    async fn commit(
        &self,
        days: Vec<DayWrite>,
        reservation: ReservationWrite,
    ) -> Result<(), StorageError> {
        let mut inner = self.inner.lock().await;

        // Validate every write against current state before touching anything
        // so a conflict leaves no partial batch behind.
        for write in &days {
            match *write {
                DayWrite::Insert { date, .. } => {
                    if inner.days.contains_key(&date) {
                        return Err(StorageError::Conflict);
                    }
                }
                DayWrite::Update {
                    date,
                    expected_revision,
                    ..
                } => match inner.days.get(&date) {
                    Some(day) if day.revision == expected_revision => {}
                    _ => return Err(StorageError::Conflict),
                },
            }
        }
        match &reservation {
            ReservationWrite::Insert(_) => {}
            ReservationWrite::Update(updated) => {
                if !inner.reservations.contains_key(&updated.id) {
                    return Err(StorageError::Conflict);
                }
            }
            ReservationWrite::Delete(id) => {
                if !inner.reservations.contains_key(id) {
                    return Err(StorageError::Conflict);
                }
            }
        }

        for write in days {
            match write {
                DayWrite::Insert { date, guests } => {
                    inner.days.insert(date, StoredDay { guests, revision: 0 });
                }
                DayWrite::Update { date, guests, .. } => {
                    let day = inner.days.get_mut(&date).expect("validated above");
                    day.guests = guests;
                    day.revision += 1;
                }
            }
        }
        match reservation {
            ReservationWrite::Insert(created) => {
                inner.reservations.insert(created.id, created);
            }
            ReservationWrite::Update(updated) => {
                inner.reservations.insert(updated.id, updated);
            }
            ReservationWrite::Delete(id) => {
                inner.reservations.remove(&id);
            }
        }
        Ok(())
    }
}
