use uuid::Uuid;

use crate::models::{Pagination, Person, RowVersion};

pub async fn next_id<'e, E: sqlx::PgExecutor<'e>>(executor: E) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT nextval(pg_get_serial_sequence('persons', 'id'))")
        .fetch_one(executor)
        .await
}

pub async fn create<'e, E: sqlx::PgExecutor<'e>>(
    executor: E,
    person: &Person,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO persons (id, name, user_id, company_id, is_default, row_version)
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(person.id)
    .bind(person.name.trim())
    .bind(person.user_id)
    .bind(person.company_id)
    .bind(person.is_default)
    .bind(person.row_version)
    .execute(executor)
    .await?;
    Ok(result.rows_affected())
}

pub async fn exists<'e, E: sqlx::PgExecutor<'e>>(executor: E, id: i64) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM persons WHERE id = $1 AND NOT is_deleted)")
        .bind(id)
        .fetch_one(executor)
        .await
}

pub async fn exists_name<'e, E: sqlx::PgExecutor<'e>>(
    executor: E,
    exclude: Option<i64>,
    name: &str,
) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(
             SELECT 1 FROM persons
             WHERE NOT is_deleted
               AND ($1::BIGINT IS NULL OR id <> $1)
               AND lower(btrim(name)) = lower(btrim($2)))",
    )
    .bind(exclude)
    .bind(name)
    .fetch_one(executor)
    .await
}

pub async fn find_by_id<'e, E: sqlx::PgExecutor<'e>>(
    executor: E,
    id: i64,
) -> Result<Option<Person>, sqlx::Error> {
    sqlx::query_as::<_, Person>("SELECT * FROM persons WHERE id = $1 AND NOT is_deleted")
        .bind(id)
        .fetch_optional(executor)
        .await
}

pub async fn find_by_user_id<'e, E: sqlx::PgExecutor<'e>>(
    executor: E,
    user_id: Uuid,
) -> Result<Option<Person>, sqlx::Error> {
    sqlx::query_as::<_, Person>("SELECT * FROM persons WHERE user_id = $1 AND NOT is_deleted")
        .bind(user_id)
        .fetch_optional(executor)
        .await
}

pub async fn find_default<'e, E: sqlx::PgExecutor<'e>>(
    executor: E,
) -> Result<Option<Person>, sqlx::Error> {
    sqlx::query_as::<_, Person>(
        "SELECT * FROM persons WHERE is_default AND NOT is_deleted ORDER BY id LIMIT 1",
    )
    .fetch_optional(executor)
    .await
}

pub async fn list<'e, E: sqlx::PgExecutor<'e>>(executor: E) -> Result<Vec<Person>, sqlx::Error> {
    sqlx::query_as::<_, Person>("SELECT * FROM persons WHERE NOT is_deleted ORDER BY id")
        .fetch_all(executor)
        .await
}

pub async fn list_by_company<'e, E: sqlx::PgExecutor<'e>>(
    executor: E,
    company_id: i64,
) -> Result<Vec<Person>, sqlx::Error> {
    sqlx::query_as::<_, Person>(
        "SELECT * FROM persons WHERE company_id = $1 AND NOT is_deleted ORDER BY id",
    )
    .bind(company_id)
    .fetch_all(executor)
    .await
}

pub async fn list_page<'e, E: sqlx::PgExecutor<'e>>(
    executor: E,
    page: Pagination,
) -> Result<Vec<Person>, sqlx::Error> {
    sqlx::query_as::<_, Person>(
        "SELECT * FROM persons WHERE NOT is_deleted ORDER BY id LIMIT $1 OFFSET $2",
    )
    .bind(page.limit())
    .bind(page.offset())
    .fetch_all(executor)
    .await
}

pub async fn count<'e, E: sqlx::PgExecutor<'e>>(executor: E) -> Result<i64, sqlx::Error> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM persons WHERE NOT is_deleted")
        .fetch_one(executor)
        .await?;
    Ok(row.0)
}

/// Version-guarded update. Zero rows means the expected version is stale.
pub async fn update<'e, E: sqlx::PgExecutor<'e>>(
    executor: E,
    person: &Person,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE persons SET name = $3, company_id = $4, row_version = row_version + 1
         WHERE id = $1 AND row_version = $2 AND NOT is_deleted",
    )
    .bind(person.id)
    .bind(person.row_version)
    .bind(person.name.trim())
    .bind(person.company_id)
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
        "UPDATE persons SET is_deleted = TRUE, row_version = row_version + 1
         WHERE id = $1 AND NOT is_deleted AND ($2::BIGINT IS NULL OR row_version = $2)",
    )
    .bind(id)
    .bind(expected)
    .execute(executor)
    .await?;
    Ok(result.rows_affected())
}
