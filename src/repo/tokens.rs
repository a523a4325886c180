use chrono::{DateTime, Utc};
use sqlx::PgExecutor;
use uuid::Uuid;

// ---

/// Record a refresh token as spent. Returns `false` if it already was.
pub async fn blacklist<'e, E>(
    db: E,
    jti: Uuid,
    user_id: i64,
    expires_at: DateTime<Utc>,
) -> Result<bool, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    // ---
    let result = sqlx::query(
        r#"
        INSERT INTO token_blacklist (jti, user_id, expires_at)
        VALUES ($1, $2, $3)
        ON CONFLICT (jti) DO NOTHING
        "#,
    )
    .bind(jti)
    .bind(user_id)
    .bind(expires_at)
    .execute(db)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Drop entries whose token could no longer be presented anyway.
pub async fn purge_expired<'e, E>(db: E) -> Result<u64, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    // ---
    let result = sqlx::query("DELETE FROM token_blacklist WHERE expires_at < NOW()")
        .execute(db)
        .await?;
    Ok(result.rows_affected())
}
