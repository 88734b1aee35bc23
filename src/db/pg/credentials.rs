use uuid::Uuid;

use crate::models::Credential;

pub async fn create<'e, E: sqlx::PgExecutor<'e>>(
    executor: E,
    credential: &Credential,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO users (id, email, password_hash, role, created_at)
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(credential.id)
    .bind(&credential.email)
    .bind(&credential.password_hash)
    .bind(&credential.role)
    .bind(credential.created_at)
    .execute(executor)
    .await?;
    Ok(result.rows_affected())
}

pub async fn find_by_email<'e, E: sqlx::PgExecutor<'e>>(
    executor: E,
    email: &str,
) -> Result<Option<Credential>, sqlx::Error> {
    sqlx::query_as::<_, Credential>("SELECT * FROM users WHERE lower(email) = lower($1)")
        .bind(email)
        .fetch_optional(executor)
        .await
}

pub async fn delete<'e, E: sqlx::PgExecutor<'e>>(executor: E, id: Uuid) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected())
}
