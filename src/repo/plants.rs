use sqlx::PgExecutor;

use crate::models::{NewPlant, Plant};

const PLANT_COLUMNS: &str = "id, name, location, plant_type, user_id, created_at, updated_at";

// ---

pub async fn list<'e, E>(db: E, user_id: i64) -> Result<Vec<Plant>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    // ---
    sqlx::query_as::<_, Plant>(&format!(
        "SELECT {PLANT_COLUMNS} FROM plants WHERE user_id = $1 ORDER BY id"
    ))
    .bind(user_id)
    .fetch_all(db)
    .await
}

pub async fn get<'e, E>(db: E, id: i64, user_id: i64) -> Result<Option<Plant>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    // ---
    sqlx::query_as::<_, Plant>(&format!(
        "SELECT {PLANT_COLUMNS} FROM plants WHERE id = $1 AND user_id = $2"
    ))
    .bind(id)
    .bind(user_id)
    .fetch_optional(db)
    .await
}

pub async fn get_for_update<'e, E>(
    db: E,
    id: i64,
    user_id: i64,
) -> Result<Option<Plant>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    // ---
    sqlx::query_as::<_, Plant>(&format!(
        "SELECT {PLANT_COLUMNS} FROM plants WHERE id = $1 AND user_id = $2 FOR UPDATE"
    ))
    .bind(id)
    .bind(user_id)
    .fetch_optional(db)
    .await
}

/// True when `plant_id` exists and belongs to `user_id`.
pub async fn is_owned<'e, E>(db: E, plant_id: i64, user_id: i64) -> Result<bool, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    // ---
    sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS (SELECT 1 FROM plants WHERE id = $1 AND user_id = $2)",
    )
    .bind(plant_id)
    .bind(user_id)
    .fetch_one(db)
    .await
}

pub async fn insert<'e, E>(db: E, user_id: i64, new: &NewPlant) -> Result<Plant, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    // ---
    sqlx::query_as::<_, Plant>(&format!(
        r#"
        INSERT INTO plants (name, location, plant_type, user_id)
        VALUES ($1, $2, $3, $4)
        RETURNING {PLANT_COLUMNS}
        "#
    ))
    .bind(&new.name)
    .bind(&new.location)
    .bind(new.plant_type.as_str())
    .bind(user_id)
    .fetch_one(db)
    .await
}

pub async fn update<'e, E>(db: E, plant: &Plant) -> Result<Plant, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    // ---
    sqlx::query_as::<_, Plant>(&format!(
        r#"
        UPDATE plants
           SET name = $2, location = $3, plant_type = $4, updated_at = NOW()
         WHERE id = $1
        RETURNING {PLANT_COLUMNS}
        "#
    ))
    .bind(plant.id)
    .bind(&plant.name)
    .bind(&plant.location)
    .bind(plant.plant_type.as_str())
    .fetch_one(db)
    .await
}

/// Returns `false` when nothing owned by `user_id` matched.
pub async fn delete<'e, E>(db: E, id: i64, user_id: i64) -> Result<bool, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    // ---
    let result = sqlx::query("DELETE FROM plants WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user_id)
        .execute(db)
        .await?;
    Ok(result.rows_affected() > 0)
}
