use chrono::{DateTime, Utc};

use crate::models::{Pagination, RowVersion, TimeRecord};

pub async fn next_id<'e, E: sqlx::PgExecutor<'e>>(executor: E) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT nextval(pg_get_serial_sequence('time_records', 'id'))")
        .fetch_one(executor)
        .await
}

pub async fn create<'e, E: sqlx::PgExecutor<'e>>(
    executor: E,
    record: &TimeRecord,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO time_records (id, person_id, start_date_time, end_date_time, row_version)
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(record.id)
    .bind(record.person_id)
    .bind(record.start_date_time)
    .bind(record.end_date_time)
    .bind(record.row_version)
    .execute(executor)
    .await?;
    Ok(result.rows_affected())
}

pub async fn exists<'e, E: sqlx::PgExecutor<'e>>(executor: E, id: i64) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM time_records WHERE id = $1 AND NOT is_deleted)",
    )
    .bind(id)
    .fetch_one(executor)
    .await
}

pub async fn exists_overlapping<'e, E: sqlx::PgExecutor<'e>>(
    executor: E,
    person_id: i64,
    exclude: Option<i64>,
    instant: DateTime<Utc>,
) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(
             SELECT 1 FROM time_records
             WHERE person_id = $1
               AND NOT is_deleted
               AND ($2::BIGINT IS NULL OR id <> $2)
               AND start_date_time <= $3
               AND (end_date_time IS NULL OR end_date_time > $3))",
    )
    .bind(person_id)
    .bind(exclude)
    .bind(instant)
    .fetch_one(executor)
    .await
}

pub async fn exists_starting_within<'e, E: sqlx::PgExecutor<'e>>(
    executor: E,
    person_id: i64,
    exclude: Option<i64>,
    from: DateTime<Utc>,
    until: Option<DateTime<Utc>>,
) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(
             SELECT 1 FROM time_records
             WHERE person_id = $1
               AND NOT is_deleted
               AND ($2::BIGINT IS NULL OR id <> $2)
               AND start_date_time >= $3
               AND ($4::TIMESTAMPTZ IS NULL OR start_date_time < $4))",
    )
    .bind(person_id)
    .bind(exclude)
    .bind(from)
    .bind(until)
    .fetch_one(executor)
    .await
}

pub async fn find_by_id<'e, E: sqlx::PgExecutor<'e>>(
    executor: E,
    id: i64,
) -> Result<Option<TimeRecord>, sqlx::Error> {
    sqlx::query_as::<_, TimeRecord>("SELECT * FROM time_records WHERE id = $1 AND NOT is_deleted")
        .bind(id)
        .fetch_optional(executor)
        .await
}

pub async fn list<'e, E: sqlx::PgExecutor<'e>>(
    executor: E,
) -> Result<Vec<TimeRecord>, sqlx::Error> {
    sqlx::query_as::<_, TimeRecord>("SELECT * FROM time_records WHERE NOT is_deleted ORDER BY id")
        .fetch_all(executor)
        .await
}

pub async fn list_page<'e, E: sqlx::PgExecutor<'e>>(
    executor: E,
    page: Pagination,
    person_id: Option<i64>,
) -> Result<Vec<TimeRecord>, sqlx::Error> {
    sqlx::query_as::<_, TimeRecord>(
        "SELECT * FROM time_records
         WHERE NOT is_deleted AND ($1::BIGINT IS NULL OR person_id = $1)
         ORDER BY id LIMIT $2 OFFSET $3",
    )
    .bind(person_id)
    .bind(page.limit())
    .bind(page.offset())
    .fetch_all(executor)
    .await
}

pub async fn count<'e, E: sqlx::PgExecutor<'e>>(
    executor: E,
    person_id: Option<i64>,
) -> Result<i64, sqlx::Error> {
    let row: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM time_records
         WHERE NOT is_deleted AND ($1::BIGINT IS NULL OR person_id = $1)",
    )
    .bind(person_id)
    .fetch_one(executor)
    .await?;
    Ok(row.0)
}

/// Version-guarded update. Zero rows means the expected version is stale.
pub async fn update<'e, E: sqlx::PgExecutor<'e>>(
    executor: E,
    record: &TimeRecord,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE time_records
         SET start_date_time = $3, end_date_time = $4, row_version = row_version + 1
         WHERE id = $1 AND row_version = $2 AND NOT is_deleted",
    )
    .bind(record.id)
    .bind(record.row_version)
    .bind(record.start_date_time)
    .bind(record.end_date_time)
    .execute(executor)
    .await?;
    Ok(result.rows_affected())
}

pub async fn soft_delete<'e, E: sqlx::PgExecutor<'e>>(
    executor: E,
    id: i64,
    expected: Option<RowVersion>,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE time_records SET is_deleted = TRUE, row_version = row_version + 1
         WHERE id = $1 AND NOT is_deleted AND ($2::BIGINT IS NULL OR row_version = $2)",
    )
    .bind(id)
    .bind(expected)
    .execute(executor)
    .await?;
    Ok(result.rows_affected())
}
