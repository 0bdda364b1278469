use sqlx::{PgPool, Row};

/// Creates a connection pool to the PostgreSQL database.
pub async fn create_connection_pool() -> Result<PgPool, sqlx::Error> {
    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "postgres://localhost/campsite_booking".to_string());

    PgPool::connect(&database_url).await
}

/// Tests the database connection by executing a simple query.
pub async fn test_connection(pool: &PgPool) -> Result<(), sqlx::Error> {
    let row = sqlx::query("SELECT 1 as test").fetch_one(pool).await?;

    let test_value: i32 = row.get("test");
    println!(
        "✅ Database connection successful! Test value: {}",
        test_value
    );

    Ok(())
}

/// Creates the booking tables if they do not exist yet.
///
/// `day_occupancy` is the availability ledger: one row per calendar date that
/// has ever been booked, with a revision column compared on every update for
/// optimistic-conflict detection.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS day_occupancy (
            date DATE PRIMARY KEY,
            occupied_guests INTEGER NOT NULL CHECK (occupied_guests >= 0),
            revision BIGINT NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS reservation (
            id UUID PRIMARY KEY,
            from_day DATE NOT NULL,
            to_day DATE NOT NULL,
            guests INTEGER NOT NULL CHECK (guests >= 1),
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            email TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
