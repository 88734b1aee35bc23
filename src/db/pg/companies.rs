use crate::models::Company;

pub async fn next_id<'e, E: sqlx::PgExecutor<'e>>(executor: E) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT nextval(pg_get_serial_sequence('companies', 'id'))")
        .fetch_one(executor)
        .await
}

pub async fn create<'e, E: sqlx::PgExecutor<'e>>(
    executor: E,
    company: &Company,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("INSERT INTO companies (id, name) VALUES ($1, $2)")
        .bind(company.id)
        .bind(&company.name)
        .execute(executor)
        .await?;
    Ok(result.rows_affected())
}

pub async fn exists<'e, E: sqlx::PgExecutor<'e>>(executor: E, id: i64) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM companies WHERE id = $1)")
        .bind(id)
        .fetch_one(executor)
        .await
}

pub async fn find_by_id<'e, E: sqlx::PgExecutor<'e>>(
    executor: E,
    id: i64,
) -> Result<Option<Company>, sqlx::Error> {
    sqlx::query_as::<_, Company>("SELECT * FROM companies WHERE id = $1")
        .bind(id)
        .fetch_optional(executor)
        .await
}

pub async fn find_first<'e, E: sqlx::PgExecutor<'e>>(
    executor: E,
) -> Result<Option<Company>, sqlx::Error> {
    sqlx::query_as::<_, Company>("SELECT * FROM companies ORDER BY id LIMIT 1")
        .fetch_optional(executor)
        .await
}

pub async fn list<'e, E: sqlx::PgExecutor<'e>>(executor: E) -> Result<Vec<Company>, sqlx::Error> {
    sqlx::query_as::<_, Company>("SELECT * FROM companies ORDER BY id")
        .fetch_all(executor)
        .await
}

pub async fn update<'e, E: sqlx::PgExecutor<'e>>(
    executor: E,
    company: &Company,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("UPDATE companies SET name = $2 WHERE id = $1")
        .bind(company.id)
        .bind(&company.name)
        .execute(executor)
        .await?;
    Ok(result.rows_affected())
}
