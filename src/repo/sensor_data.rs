use sqlx::{PgExecutor, Postgres, QueryBuilder};

use crate::filter::{PageRequest, SensorDataFilter};
use crate::models::{NewSensorData, SensorData};

const READING_FROM: &str = r#"
      FROM sensor_data sd
      JOIN sensors s ON s.id = sd.sensor_id
      JOIN plants p ON p.id = s.plant_id
      LEFT JOIN items i ON i.id = sd.item_id
"#;

const READING_COLUMNS: &str = r#"
    SELECT sd.id, sd.sensor_id, s.name AS sensor_name, p.name AS plant_name,
           sd.item_id, i.name AS item_name, sd.timestamp,
           sd.items_scanned, sd.items_processed, sd.items_discarded,
           sd.processed_with_errors, sd.current_weight_kg,
           sd.category_a, sd.category_b, sd.category_c, sd.category_d,
           sd.created_at, sd.updated_at
"#;

// ---

fn select(filter: &SensorDataFilter, user_id: i64) -> QueryBuilder<'static, Postgres> {
    // ---
    let mut qb = QueryBuilder::new(READING_COLUMNS);
    qb.push(READING_FROM);
    filter.push_predicates(&mut qb, user_id);
    qb.push(" ORDER BY sd.timestamp DESC, sd.id DESC");
    qb
}

pub async fn count<'e, E>(
    db: E,
    user_id: i64,
    filter: &SensorDataFilter,
) -> Result<i64, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    // ---
    let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*)");
    qb.push(READING_FROM);
    filter.push_predicates(&mut qb, user_id);
    qb.build_query_scalar::<i64>().fetch_one(db).await
}

pub async fn list_page<'e, E>(
    db: E,
    user_id: i64,
    filter: &SensorDataFilter,
    page: PageRequest,
) -> Result<Vec<SensorData>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    // ---
    let mut qb = select(filter, user_id);
    qb.push(" LIMIT ").push_bind(page.page_size);
    qb.push(" OFFSET ").push_bind(page.offset());
    qb.build_query_as::<SensorData>().fetch_all(db).await
}

/// Every matching reading, newest first. Used by the metrics endpoint.
pub async fn list_all<'e, E>(
    db: E,
    user_id: i64,
    filter: &SensorDataFilter,
) -> Result<Vec<SensorData>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    // ---
    select(filter, user_id)
        .build_query_as::<SensorData>()
        .fetch_all(db)
        .await
}

pub async fn get<'e, E>(db: E, id: i64, user_id: i64) -> Result<Option<SensorData>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    // ---
    sqlx::query_as::<_, SensorData>(&format!(
        "{READING_COLUMNS} {READING_FROM} WHERE p.user_id = $2 AND sd.id = $1"
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
) -> Result<Option<SensorData>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    // ---
    sqlx::query_as::<_, SensorData>(&format!(
        "{READING_COLUMNS} {READING_FROM} WHERE p.user_id = $2 AND sd.id = $1 FOR UPDATE OF sd"
    ))
    .bind(id)
    .bind(user_id)
    .fetch_optional(db)
    .await
}

/// Insert a reading and return its id. `timestamp` falls back to `NOW()`.
pub async fn insert<'e, E>(db: E, new: &NewSensorData) -> Result<i64, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    // ---
    sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO sensor_data (
            sensor_id, item_id, timestamp,
            items_scanned, items_processed, items_discarded, processed_with_errors,
            current_weight_kg, category_a, category_b, category_c, category_d
        ) VALUES ($1, $2, COALESCE($3, NOW()), $4, $5, $6, $7, $8, $9, $10, $11, $12)
        RETURNING id
        "#,
    )
    .bind(new.sensor_id)
    .bind(new.item_id)
    .bind(new.timestamp)
    .bind(new.items_scanned)
    .bind(new.items_processed)
    .bind(new.items_discarded)
    .bind(new.processed_with_errors)
    .bind(&new.current_weight_kg)
    .bind(new.category_a)
    .bind(new.category_b)
    .bind(new.category_c)
    .bind(new.category_d)
    .fetch_one(db)
    .await
}

pub async fn update<'e, E>(db: E, data: &SensorData) -> Result<(), sqlx::Error>
where
    E: PgExecutor<'e>,
{
    // ---
    sqlx::query(
        r#"
        UPDATE sensor_data
           SET sensor_id = $2, item_id = $3, timestamp = $4,
               items_scanned = $5, items_processed = $6, items_discarded = $7,
               processed_with_errors = $8, current_weight_kg = $9,
               category_a = $10, category_b = $11, category_c = $12, category_d = $13,
               updated_at = NOW()
         WHERE id = $1
        "#,
    )
    .bind(data.id)
    .bind(data.sensor_id)
    .bind(data.item_id)
    .bind(data.timestamp)
    .bind(data.items_scanned)
    .bind(data.items_processed)
    .bind(data.items_discarded)
    .bind(data.processed_with_errors)
    .bind(&data.current_weight_kg)
    .bind(data.category_a)
    .bind(data.category_b)
    .bind(data.category_c)
    .bind(data.category_d)
    .execute(db)
    .await?;
    Ok(())
}

pub async fn delete<'e, E>(db: E, id: i64, user_id: i64) -> Result<bool, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    // ---
    let result = sqlx::query(
        r#"
        DELETE FROM sensor_data sd
         USING sensors s, plants p
         WHERE sd.id = $1 AND s.id = sd.sensor_id AND p.id = s.plant_id AND p.user_id = $2
        "#,
    )
    .bind(id)
    .bind(user_id)
    .execute(db)
    .await?;
    Ok(result.rows_affected() > 0)
}
