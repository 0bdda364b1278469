use std::sync::Arc;
use std::time::Duration;

use chrono::{Days, Months, NaiveDate, Utc};
use rand::Rng;
use uuid::Uuid;

use crate::availability::{self, AvailabilityCalculator, RangeDelta};
use crate::config::BookingRules;
use crate::storage::{BookingStore, ReservationWrite};
use crate::types::{BookingError, BookingRequest, DailyAvailability, EditOutcome, Reservation};
use crate::validator::BookingValidator;

/// How many times an operation is re-run from scratch when the ledger changes
/// underneath it before the conflict surfaces to the caller.
const MAX_ATTEMPTS: u32 = 10;

/// Booking operations for the campsite.
///
/// Each mutating operation reads an occupancy snapshot, validates against it,
/// plans versioned ledger writes, and commits them together with the
/// reservation write as one atomic batch. A commit-time conflict restarts the
/// whole operation, validation included, up to [`MAX_ATTEMPTS`] times.
pub struct BookingService {
    store: Arc<dyn BookingStore>,
    rules: BookingRules,
    validator: BookingValidator,
    calculator: AvailabilityCalculator,
}

impl BookingService {
    /// Creates a booking service over the given store and rules.
    pub fn new(store: Arc<dyn BookingStore>, rules: BookingRules) -> Self {
        Self {
            store,
            rules,
            validator: BookingValidator::new(rules),
            calculator: AvailabilityCalculator::new(rules),
        }
    }

    /// Fetches a stored booking.
    pub async fn get(&self, id: Uuid) -> Result<Reservation, BookingError> {
        self.store
            .reservation(id)
            .await?
            .ok_or(BookingError::NotFound(id))
    }

    /// Remaining capacity for every date in `[from, to)`.
    ///
    /// Omitted bounds default to the bookable window: from the earliest
    /// allowed arrival up to the booking horizon. An explicitly supplied
    /// range is validated with the non-booking rule set.
    pub async fn availability(
        &self,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<DailyAvailability>, BookingError> {
        let today = today();
        let explicit = from.is_some() || to.is_some();
        let from = from.unwrap_or_else(|| {
            today + Days::new(u64::from(self.rules.min_days_ahead_of_arrival))
        });
        let to = to.unwrap_or_else(|| today + Months::new(self.rules.months_up_to_booking));
        if explicit {
            self.validator.validate_dates(from, to, false, today)?;
        }

        let rows = self.store.occupancy_between(from, to).await?;
        Ok(self.calculator.calendar(&rows, from, to))
    }

    /// Books the campsite, returning the new reservation's id.
    pub async fn create(&self, request: &BookingRequest) -> Result<Uuid, BookingError> {
        let mut attempt = 1;
        loop {
            match self.try_create(request).await {
                Err(BookingError::ConcurrentModification) if attempt < MAX_ATTEMPTS => {
                    log::debug!("create conflicted on attempt {attempt}, retrying");
                    attempt += 1;
                    backoff(attempt).await;
                }
                outcome => return outcome,
            }
        }
    }

    /// Changes an existing booking's dates, guest count, or contact fields.
    pub async fn edit(
        &self,
        id: Uuid,
        request: &BookingRequest,
    ) -> Result<EditOutcome, BookingError> {
        let mut attempt = 1;
        loop {
            match self.try_edit(id, request).await {
                Err(BookingError::ConcurrentModification) if attempt < MAX_ATTEMPTS => {
                    log::debug!("edit of {id} conflicted on attempt {attempt}, retrying");
                    attempt += 1;
                    backoff(attempt).await;
                }
                outcome => return outcome,
            }
        }
    }

    /// Cancels a booking, releasing every day it occupied.
    pub async fn cancel(&self, id: Uuid) -> Result<(), BookingError> {
        let mut attempt = 1;
        loop {
            match self.try_cancel(id).await {
                Err(BookingError::ConcurrentModification) if attempt < MAX_ATTEMPTS => {
                    log::debug!("cancel of {id} conflicted on attempt {attempt}, retrying");
                    attempt += 1;
                    backoff(attempt).await;
                }
                outcome => return outcome,
            }
        }
    }

    async fn try_create(&self, request: &BookingRequest) -> Result<Uuid, BookingError> {
        let today = today();
        self.validator.validate_request(
            request.from_day,
            request.to_day,
            request.guests,
            true,
            today,
        )?;

        let snapshot = self
            .store
            .occupancy_between(request.from_day, request.to_day)
            .await?;
        let occupancy = availability::occupancy_after(&snapshot, &[]);
        self.validator.check_capacity(
            &occupancy,
            request.from_day,
            request.to_day,
            request.guests,
        )?;

        let writes = availability::plan_writes(
            &snapshot,
            &[RangeDelta::block(
                request.from_day,
                request.to_day,
                request.guests,
            )],
        );
        let reservation = Reservation::from_request(Uuid::new_v4(), request);
        let id = reservation.id;
        self.store
            .commit(writes, ReservationWrite::Insert(reservation))
            .await?;
        log::info!(
            "booked {id}: {} to {} for {} guest(s)",
            request.from_day,
            request.to_day,
            request.guests
        );
        Ok(id)
    }

    async fn try_edit(
        &self,
        id: Uuid,
        request: &BookingRequest,
    ) -> Result<EditOutcome, BookingError> {
        let today = today();
        let stored = self.get(id).await?;
        self.validator
            .validate_not_past(stored.from_day, "edit", today)?;
        self.validator.validate_request(
            request.from_day,
            request.to_day,
            request.guests,
            true,
            today,
        )?;

        let updated = Reservation::from_request(id, request);

        // Any widening axis means more capacity pressure somewhere: give the
        // whole stored range back first, then book the new range as if it
        // were fresh, so the booking cannot collide with itself.
        let widening = request.from_day < stored.from_day
            || request.to_day > stored.to_day
            || request.guests > stored.guests;
        if widening {
            let release = RangeDelta::release(stored.from_day, stored.to_day, stored.guests);
            let snapshot = self
                .store
                .occupancy_between(
                    stored.from_day.min(request.from_day),
                    stored.to_day.max(request.to_day),
                )
                .await?;
            let occupancy = availability::occupancy_after(&snapshot, &[release]);
            self.validator.check_capacity(
                &occupancy,
                request.from_day,
                request.to_day,
                request.guests,
            )?;

            let writes = availability::plan_writes(
                &snapshot,
                &[
                    release,
                    RangeDelta::block(request.from_day, request.to_day, request.guests),
                ],
            );
            self.store
                .commit(writes, ReservationWrite::Update(updated))
                .await?;
            log::info!("rebooked {id} over a wider range or more guests");
            return Ok(EditOutcome::Modified);
        }

        // Narrowing only: release exactly the days and guests dropped. No
        // capacity re-check; pressure cannot increase.
        let mut deltas = Vec::new();
        if stored.from_day < request.from_day {
            deltas.push(RangeDelta::release(
                stored.from_day,
                request.from_day,
                stored.guests,
            ));
        }
        if request.to_day < stored.to_day {
            deltas.push(RangeDelta::release(
                request.to_day,
                stored.to_day,
                stored.guests,
            ));
        }
        if stored.guests > request.guests {
            deltas.push(RangeDelta::release(
                request.from_day,
                request.to_day,
                stored.guests - request.guests,
            ));
        }

        if deltas.is_empty() {
            // Dates and guests unchanged; only contact fields can differ.
            if stored.same_contact(request) {
                return Ok(EditOutcome::Unchanged);
            }
            self.store
                .commit(Vec::new(), ReservationWrite::Update(updated))
                .await?;
            return Ok(EditOutcome::Modified);
        }

        let snapshot = self
            .store
            .occupancy_between(stored.from_day, stored.to_day)
            .await?;
        let writes = availability::plan_writes(&snapshot, &deltas);
        self.store
            .commit(writes, ReservationWrite::Update(updated))
            .await?;
        log::info!("shrank {id} to {} to {}", request.from_day, request.to_day);
        Ok(EditOutcome::Modified)
    }

    async fn try_cancel(&self, id: Uuid) -> Result<(), BookingError> {
        let today = today();
        let stored = self.get(id).await?;
        self.validator
            .validate_not_past(stored.from_day, "cancel", today)?;

        let snapshot = self
            .store
            .occupancy_between(stored.from_day, stored.to_day)
            .await?;
        let writes = availability::plan_writes(
            &snapshot,
            &[RangeDelta::release(
                stored.from_day,
                stored.to_day,
                stored.guests,
            )],
        );
        self.store
            .commit(writes, ReservationWrite::Delete(id))
            .await?;
        log::info!("cancelled {id}");
        Ok(())
    }
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Short jittered pause between conflict retries. Not needed for
/// correctness, but it keeps contending operations from re-colliding in
/// lockstep.
async fn backoff(attempt: u32) {
    let jitter = rand::rng().random_range(2..=10);
    tokio::time::sleep(Duration::from_millis(u64::from(attempt * jitter))).await;
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::availability::DayWrite;
    use crate::storage::{MemoryStore, StorageError};
    use crate::types::DayOccupancy;

    fn day(offset: u64) -> NaiveDate {
        today() + Days::new(offset)
    }

    fn request(from: NaiveDate, to: NaiveDate, guests: i32) -> BookingRequest {
        BookingRequest {
            from_day: from,
            to_day: to,
            guests,
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            email: "ada@example.com".into(),
        }
    }

    fn service() -> (Arc<BookingService>, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let service = Arc::new(BookingService::new(store.clone(), BookingRules::default()));
        (service, store)
    }

    #[tokio::test]
    async fn create_blocks_every_occupied_day() {
        let (service, store) = service();
        let id = service
            .create(&request(day(2), day(5), 4))
            .await
            .expect("booking should succeed");

        assert_eq!(store.occupied_on(day(2)).await, 4);
        assert_eq!(store.occupied_on(day(3)).await, 4);
        assert_eq!(store.occupied_on(day(4)).await, 4);
        // Checkout day stays free.
        assert_eq!(store.occupied_on(day(5)).await, 0);

        let stored = service.get(id).await.unwrap();
        assert_eq!(stored.guests, 4);
    }

    #[tokio::test]
    async fn cancel_restores_occupancy_exactly() {
        let (service, store) = service();
        let untouched = service.create(&request(day(2), day(3), 2)).await.unwrap();
        let id = service.create(&request(day(2), day(5), 4)).await.unwrap();

        service.cancel(id).await.unwrap();

        assert_eq!(store.occupied_on(day(2)).await, 2);
        assert_eq!(store.occupied_on(day(3)).await, 0);
        assert_eq!(store.occupied_on(day(4)).await, 0);
        assert!(matches!(
            service.get(id).await,
            Err(BookingError::NotFound(_))
        ));
        assert!(service.get(untouched).await.is_ok());
    }

    #[tokio::test]
    async fn full_campsite_rejects_further_bookings() {
        let (service, _) = service();
        service.create(&request(day(2), day(5), 10)).await.unwrap();

        let result = service.create(&request(day(3), day(4), 1)).await;
        assert!(matches!(result, Err(BookingError::NoAvailability { .. })));
    }

    #[tokio::test]
    async fn create_rejects_rule_violations_before_any_mutation() {
        let (service, store) = service();

        // Stay too long.
        let result = service.create(&request(day(2), day(6), 2)).await;
        assert!(matches!(result, Err(BookingError::RuleViolation(_))));
        // No lead time.
        let result = service.create(&request(day(0), day(2), 2)).await;
        assert!(matches!(result, Err(BookingError::RuleViolation(_))));
        // Too many guests.
        let result = service.create(&request(day(2), day(3), 11)).await;
        assert!(matches!(result, Err(BookingError::RuleViolation(_))));

        assert_eq!(store.occupied_on(day(2)).await, 0);
    }

    #[tokio::test]
    async fn narrowing_edit_releases_only_dropped_days() {
        let (service, store) = service();
        let id = service.create(&request(day(2), day(4), 3)).await.unwrap();

        let outcome = service.edit(id, &request(day(2), day(3), 3)).await.unwrap();

        assert_eq!(outcome, EditOutcome::Modified);
        assert_eq!(store.occupied_on(day(2)).await, 3);
        assert_eq!(store.occupied_on(day(3)).await, 0);
        let stored = service.get(id).await.unwrap();
        assert_eq!(stored.to_day, day(3));
    }

    #[tokio::test]
    async fn narrowing_edit_on_every_axis_touches_only_freed_capacity() {
        let (service, store) = service();
        let id = service.create(&request(day(2), day(5), 5)).await.unwrap();

        // Later arrival, earlier departure, fewer guests in one edit.
        service.edit(id, &request(day(3), day(4), 2)).await.unwrap();

        assert_eq!(store.occupied_on(day(2)).await, 0);
        assert_eq!(store.occupied_on(day(3)).await, 2);
        assert_eq!(store.occupied_on(day(4)).await, 0);
    }

    #[tokio::test]
    async fn widening_edit_moves_the_arrival_earlier() {
        let (service, store) = service();
        let id = service.create(&request(day(2), day(4), 3)).await.unwrap();

        service.edit(id, &request(day(1), day(4), 3)).await.unwrap();

        assert_eq!(store.occupied_on(day(1)).await, 3);
        assert_eq!(store.occupied_on(day(2)).await, 3);
        assert_eq!(store.occupied_on(day(3)).await, 3);
        let stored = service.get(id).await.unwrap();
        assert_eq!(stored.from_day, day(1));
    }

    #[tokio::test]
    async fn widening_edit_does_not_collide_with_its_own_booking() {
        let (service, store) = service();
        // The campsite is completely full over the stored range; extending
        // must still work because the old range is released first.
        let id = service.create(&request(day(2), day(4), 10)).await.unwrap();

        service
            .edit(id, &request(day(2), day(5), 10))
            .await
            .expect("extension should not conflict with itself");

        assert_eq!(store.occupied_on(day(2)).await, 10);
        assert_eq!(store.occupied_on(day(3)).await, 10);
        assert_eq!(store.occupied_on(day(4)).await, 10);
    }

    #[tokio::test]
    async fn widening_edit_respects_other_bookings() {
        let (service, store) = service();
        let id = service.create(&request(day(2), day(3), 2)).await.unwrap();
        service.create(&request(day(2), day(3), 8)).await.unwrap();

        // One more guest would overcommit the day.
        let result = service.edit(id, &request(day(2), day(3), 3)).await;

        assert!(matches!(result, Err(BookingError::NoAvailability { .. })));
        assert_eq!(store.occupied_on(day(2)).await, 10);
        let stored = service.get(id).await.unwrap();
        assert_eq!(stored.guests, 2);
    }

    #[tokio::test]
    async fn contact_only_edit_skips_the_ledger() {
        let (service, store) = service();
        let id = service.create(&request(day(2), day(4), 3)).await.unwrap();

        let same = service.edit(id, &request(day(2), day(4), 3)).await.unwrap();
        assert_eq!(same, EditOutcome::Unchanged);

        let mut renamed = request(day(2), day(4), 3);
        renamed.email = "countess@example.com".into();
        let changed = service.edit(id, &renamed).await.unwrap();
        assert_eq!(changed, EditOutcome::Modified);

        assert_eq!(store.occupied_on(day(2)).await, 3);
        let stored = service.get(id).await.unwrap();
        assert_eq!(stored.email, "countess@example.com");
    }

    #[tokio::test]
    async fn operations_on_unknown_bookings_fail() {
        let (service, _) = service();
        let id = Uuid::new_v4();

        assert!(matches!(
            service.get(id).await,
            Err(BookingError::NotFound(_))
        ));
        assert!(matches!(
            service.cancel(id).await,
            Err(BookingError::NotFound(_))
        ));
        assert!(matches!(
            service.edit(id, &request(day(2), day(3), 1)).await,
            Err(BookingError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn started_stays_can_no_longer_be_changed() {
        let (service, store) = service();
        // Seed a booking that started yesterday directly in the store; the
        // service itself would never accept it.
        let stale = Reservation::from_request(
            Uuid::new_v4(),
            &request(today() - Days::new(1), day(1), 2),
        );
        store
            .commit(Vec::new(), ReservationWrite::Insert(stale.clone()))
            .await
            .unwrap();

        assert!(matches!(
            service.cancel(stale.id).await,
            Err(BookingError::Expired("cancel"))
        ));
        assert!(matches!(
            service.edit(stale.id, &request(day(2), day(3), 2)).await,
            Err(BookingError::Expired("edit"))
        ));
    }

    #[tokio::test]
    async fn availability_on_an_empty_ledger_is_all_free() {
        let (service, _) = service();
        let calendar = service
            .availability(Some(day(1)), Some(day(4)))
            .await
            .unwrap();

        assert_eq!(calendar.len(), 3);
        assert!(calendar.iter().all(|entry| entry.availability == 10));
        assert_eq!(calendar[0].date, day(1));
    }

    #[tokio::test]
    async fn availability_defaults_to_the_bookable_window() {
        let (service, _) = service();
        let calendar = service.availability(None, None).await.unwrap();

        let expected_from = day(1);
        let expected_to = today() + Months::new(1);
        let expected_len = (expected_to - expected_from).num_days() as usize;
        assert_eq!(calendar.len(), expected_len);
        assert_eq!(calendar[0].date, expected_from);
    }

    #[tokio::test]
    async fn availability_reflects_bookings_and_reads_idempotently() {
        let (service, _) = service();
        service.create(&request(day(2), day(4), 6)).await.unwrap();

        let first = service.availability(Some(day(1)), Some(day(5))).await.unwrap();
        let second = service.availability(Some(day(1)), Some(day(5))).await.unwrap();
        assert_eq!(first, second);

        let remaining: Vec<i32> = first.iter().map(|entry| entry.availability).collect();
        assert_eq!(remaining, vec![10, 4, 4, 10]);
    }

    #[tokio::test]
    async fn availability_rejects_an_invalid_explicit_range() {
        let (service, _) = service();
        let result = service.availability(Some(day(4)), Some(day(2))).await;
        assert!(matches!(result, Err(BookingError::RuleViolation(_))));
    }

    #[tokio::test]
    async fn concurrent_creates_for_a_full_day_admit_exactly_one() {
        let (service, store) = service();

        let mut handles = Vec::new();
        for _ in 0..5 {
            let service = service.clone();
            handles.push(tokio::spawn(async move {
                service.create(&request(day(2), day(3), 10)).await
            }));
        }

        let mut successes = 0;
        let mut capacity_failures = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => successes += 1,
                Err(BookingError::NoAvailability { .. }) => capacity_failures += 1,
                Err(other) => panic!("unexpected outcome: {other}"),
            }
        }

        assert_eq!(successes, 1);
        assert_eq!(capacity_failures, 4);
        assert_eq!(store.occupied_on(day(2)).await, 10);
    }

    #[tokio::test]
    async fn concurrent_bookings_never_overcommit_a_day() {
        let (service, store) = service();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let service = service.clone();
            handles.push(tokio::spawn(async move {
                service.create(&request(day(2), day(4), 3)).await
            }));
        }

        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                successes += 1;
            }
        }

        // Three bookings of 3 fit under capacity 10; the rest must be turned
        // away, and the committed total must respect the cap.
        assert_eq!(successes, 3);
        assert_eq!(store.occupied_on(day(2)).await, 9);
        assert_eq!(store.occupied_on(day(3)).await, 9);
    }

    /// A store whose commits always conflict, to observe the retry budget.
    struct AlwaysConflicting {
        commits: AtomicU32,
    }

    #[async_trait]
    impl BookingStore for AlwaysConflicting {
        async fn occupancy_between(
            &self,
            _from: NaiveDate,
            _to: NaiveDate,
        ) -> Result<Vec<DayOccupancy>, StorageError> {
            Ok(Vec::new())
        }

        async fn reservation(&self, _id: Uuid) -> Result<Option<Reservation>, StorageError> {
            Ok(None)
        }

        async fn commit(
            &self,
            _days: Vec<DayWrite>,
            _reservation: ReservationWrite,
        ) -> Result<(), StorageError> {
            self.commits.fetch_add(1, Ordering::SeqCst);
            Err(StorageError::Conflict)
        }
    }

    #[tokio::test]
    async fn exhausted_retries_surface_the_conflict() {
        let store = Arc::new(AlwaysConflicting {
            commits: AtomicU32::new(0),
        });
        let service = BookingService::new(store.clone(), BookingRules::default());

        let result = service.create(&request(day(2), day(3), 2)).await;

        assert!(matches!(result, Err(BookingError::ConcurrentModification)));
        assert_eq!(store.commits.load(Ordering::SeqCst), MAX_ATTEMPTS);
    }
}
