use sqlx::{PgExecutor, Postgres, QueryBuilder};

use crate::models::{Item, NewItem};

const ITEM_SELECT: &str = r#"
    SELECT i.id, i.plant_id, i.name, i.description, i.created_at
      FROM items i
      JOIN plants p ON p.id = i.plant_id
"#;

// ---

pub async fn list<'e, E>(
    db: E,
    user_id: i64,
    plant_id: Option<i64>,
) -> Result<Vec<Item>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    // ---
    let mut qb = QueryBuilder::<Postgres>::new(ITEM_SELECT);
    qb.push(" WHERE p.user_id = ").push_bind(user_id);
    if let Some(plant_id) = plant_id {
        qb.push(" AND i.plant_id = ").push_bind(plant_id);
    }
    qb.push(" ORDER BY i.id");

    qb.build_query_as::<Item>().fetch_all(db).await
}

pub async fn get<'e, E>(db: E, id: i64, user_id: i64) -> Result<Option<Item>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    // ---
    sqlx::query_as::<_, Item>(&format!("{ITEM_SELECT} WHERE i.id = $1 AND p.user_id = $2"))
        .bind(id)
        .bind(user_id)
        .fetch_optional(db)
        .await
}

pub async fn get_for_update<'e, E>(
    db: E,
    id: i64,
    user_id: i64,
) -> Result<Option<Item>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    // ---
    sqlx::query_as::<_, Item>(&format!(
        "{ITEM_SELECT} WHERE i.id = $1 AND p.user_id = $2 FOR UPDATE OF i"
    ))
    .bind(id)
    .bind(user_id)
    .fetch_optional(db)
    .await
}

pub async fn is_owned<'e, E>(db: E, item_id: i64, user_id: i64) -> Result<bool, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    // ---
    sqlx::query_scalar::<_, bool>(
        r#"
        SELECT EXISTS (
            SELECT 1
              FROM items i
              JOIN plants p ON p.id = i.plant_id
             WHERE i.id = $1 AND p.user_id = $2
        )
        "#,
    )
    .bind(item_id)
    .bind(user_id)
    .fetch_one(db)
    .await
}

pub async fn insert<'e, E>(db: E, new: &NewItem) -> Result<Item, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    // ---
    sqlx::query_as::<_, Item>(
        r#"
        INSERT INTO items (plant_id, name, description)
        VALUES ($1, $2, $3)
        RETURNING id, plant_id, name, description, created_at
        "#,
    )
    .bind(new.plant_id)
    .bind(&new.name)
    .bind(&new.description)
    .fetch_one(db)
    .await
}

pub async fn update<'e, E>(db: E, item: &Item) -> Result<Item, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    // ---
    sqlx::query_as::<_, Item>(
        r#"
        UPDATE items
           SET plant_id = $2, name = $3, description = $4
         WHERE id = $1
        RETURNING id, plant_id, name, description, created_at
        "#,
    )
    .bind(item.id)
    .bind(item.plant_id)
    .bind(&item.name)
    .bind(&item.description)
    .fetch_one(db)
    .await
}

pub async fn delete<'e, E>(db: E, id: i64, user_id: i64) -> Result<bool, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    // ---
    let result = sqlx::query(
        r#"
        DELETE FROM items i
         USING plants p
         WHERE i.id = $1 AND p.id = i.plant_id AND p.user_id = $2
        "#,
    )
    .bind(id)
    .bind(user_id)
    .execute(db)
    .await?;
    Ok(result.rows_affected() > 0)
}
