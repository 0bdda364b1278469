use async_trait::async_trait;
use booking_services::availability::DayWrite;
use booking_services::storage::{BookingStore, ReservationWrite, StorageError};
use booking_services::types::{DayOccupancy, Reservation};
use chrono::NaiveDate;
use sqlx::{PgPool, Row};
use uuid::Uuid;

/// PostgreSQL-backed [`BookingStore`].
///
/// Conflict detection maps the revision tokens onto a `revision` column:
/// every update is conditional on the revision observed at read time
/// (`WHERE date = $_ AND revision = $_`), so a row changed by a concurrent
/// writer updates zero rows and the transaction rolls back as a conflict.
/// Inserts rely on the primary key on `date` the same way: a duplicate key
/// means another writer created the row first.
pub struct PgBookingStore {
    pool: PgPool,
}

impl PgBookingStore {
    /// Creates a store over the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BookingStore for PgBookingStore {
    async fn occupancy_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DayOccupancy>, StorageError> {
        let rows = sqlx::query(
            r#"
            SELECT date, occupied_guests, revision
            FROM day_occupancy
            WHERE date >= $1 AND date < $2
            ORDER BY date
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        Ok(rows
            .into_iter()
            .map(|row| DayOccupancy {
                date: row.get("date"),
                guests: row.get("occupied_guests"),
                revision: row.get("revision"),
            })
            .collect())
    }

    async fn reservation(&self, id: Uuid) -> Result<Option<Reservation>, StorageError> {
        let row = sqlx::query(
            r#"
            SELECT id, from_day, to_day, guests, first_name, last_name, email
            FROM reservation
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        Ok(row.map(|row| Reservation {
            id: row.get("id"),
            from_day: row.get("from_day"),
            to_day: row.get("to_day"),
            guests: row.get("guests"),
            first_name: row.get("first_name"),
            last_name: row.get("last_name"),
            email: row.get("email"),
        }))
    }

    async fn commit(
        &self,
        days: Vec<DayWrite>,
        reservation: ReservationWrite,
    ) -> Result<(), StorageError> {
        // Dropping the transaction on any early return rolls everything back,
        // so a conflict never leaves a partial batch behind.
        let mut tx = self.pool.begin().await.map_err(backend)?;

        for write in days {
            match write {
                DayWrite::Insert { date, guests } => {
                    sqlx::query(
                        "INSERT INTO day_occupancy (date, occupied_guests) VALUES ($1, $2)",
                    )
                    .bind(date)
                    .bind(guests)
                    .execute(&mut *tx)
                    .await
                    .map_err(commit_error)?;
                }
                DayWrite::Update {
                    date,
                    guests,
                    expected_revision,
                } => {
                    let result = sqlx::query(
                        r#"
                        UPDATE day_occupancy
                        SET occupied_guests = $1, revision = revision + 1
                        WHERE date = $2 AND revision = $3
                        "#,
                    )
                    .bind(guests)
                    .bind(date)
                    .bind(expected_revision)
                    .execute(&mut *tx)
                    .await
                    .map_err(commit_error)?;

                    if result.rows_affected() == 0 {
                        return Err(StorageError::Conflict);
                    }
                }
            }
        }

        match reservation {
            ReservationWrite::Insert(created) => {
                sqlx::query(
                    r#"
                    INSERT INTO reservation (
                        id, from_day, to_day, guests, first_name, last_name, email
                    ) VALUES ($1, $2, $3, $4, $5, $6, $7)
                    "#,
                )
                .bind(created.id)
                .bind(created.from_day)
                .bind(created.to_day)
                .bind(created.guests)
                .bind(&created.first_name)
                .bind(&created.last_name)
                .bind(&created.email)
                .execute(&mut *tx)
                .await
                .map_err(commit_error)?;
            }
            ReservationWrite::Update(updated) => {
                let result = sqlx::query(
                    r#"
                    UPDATE reservation
                    SET from_day = $1, to_day = $2, guests = $3,
                        first_name = $4, last_name = $5, email = $6
                    WHERE id = $7
                    "#,
                )
                .bind(updated.from_day)
                .bind(updated.to_day)
                .bind(updated.guests)
                .bind(&updated.first_name)
                .bind(&updated.last_name)
                .bind(&updated.email)
                .bind(updated.id)
                .execute(&mut *tx)
                .await
                .map_err(commit_error)?;

                if result.rows_affected() == 0 {
                    return Err(StorageError::Conflict);
                }
            }
            ReservationWrite::Delete(id) => {
                let result = sqlx::query("DELETE FROM reservation WHERE id = $1")
                    .bind(id)
                    .execute(&mut *tx)
                    .await
                    .map_err(commit_error)?;

                if result.rows_affected() == 0 {
                    return Err(StorageError::Conflict);
                }
            }
        }

        tx.commit().await.map_err(commit_error)
    }
}

fn backend(error: sqlx::Error) -> StorageError {
    StorageError::Backend(error.into())
}

/// A duplicate-key failure inside a commit means a concurrent writer got to
/// the row first; everything else is a backend fault.
fn commit_error(error: sqlx::Error) -> StorageError {
    match &error {
        sqlx::Error::Database(db) if db.is_unique_violation() => StorageError::Conflict,
        _ => StorageError::Backend(error.into()),
    }
}
