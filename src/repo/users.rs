use sqlx::PgExecutor;

use crate::models::{Role, User};

const USER_COLUMNS: &str = "id, email, username, password_hash, role, is_active, created_at";

// ---

pub async fn find_by_id<'e, E>(db: E, id: i64) -> Result<Option<User>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    // ---
    sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
        .bind(id)
        .fetch_optional(db)
        .await
}

/// Lookup by the already-normalized address.
pub async fn find_by_email<'e, E>(db: E, email: &str) -> Result<Option<User>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    // ---
    sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
        .bind(email)
        .fetch_optional(db)
        .await
}

/// Lock the user row for a read-modify-write.
pub async fn find_for_update<'e, E>(db: E, id: i64) -> Result<Option<User>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    // ---
    sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE id = $1 FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(db)
    .await
}

/// True when another account (not `except_id`) already uses `email`.
pub async fn email_taken<'e, E>(
    db: E,
    email: &str,
    except_id: Option<i64>,
) -> Result<bool, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    // ---
    sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS (SELECT 1 FROM users WHERE email = $1 AND id IS DISTINCT FROM $2)",
    )
    .bind(email)
    .bind(except_id)
    .fetch_one(db)
    .await
}

/// True when another account (not `except_id`) already uses `username`.
pub async fn username_taken<'e, E>(
    db: E,
    username: &str,
    except_id: Option<i64>,
) -> Result<bool, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    // ---
    sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS (SELECT 1 FROM users WHERE username = $1 AND id IS DISTINCT FROM $2)",
    )
    .bind(username)
    .bind(except_id)
    .fetch_one(db)
    .await
}

/// Insert an account. `password_hash` is `None` for Google-only accounts.
pub async fn insert<'e, E>(
    db: E,
    email: &str,
    username: &str,
    password_hash: Option<&str>,
    role: Role,
) -> Result<User, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    // ---
    sqlx::query_as::<_, User>(&format!(
        r#"
        INSERT INTO users (email, username, password_hash, role)
        VALUES ($1, $2, $3, $4)
        RETURNING {USER_COLUMNS}
        "#
    ))
    .bind(email)
    .bind(username)
    .bind(password_hash)
    .bind(role.as_str())
    .fetch_one(db)
    .await
}

/// Persist username, email and password hash of `user`.
pub async fn update_profile<'e, E>(db: E, user: &User) -> Result<User, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    // ---
    sqlx::query_as::<_, User>(&format!(
        r#"
        UPDATE users
           SET username = $2, email = $3, password_hash = $4
         WHERE id = $1
        RETURNING {USER_COLUMNS}
        "#
    ))
    .bind(user.id)
    .bind(&user.username)
    .bind(&user.email)
    .bind(&user.password_hash)
    .fetch_one(db)
    .await
}
