use sqlx::{PgExecutor, Postgres, QueryBuilder};

use crate::models::{NewSensor, Sensor};

const SENSOR_SELECT: &str = r#"
    SELECT s.id, s.name, s.plant_id, s.location_type, s.is_active,
           s.installed_at, s.last_maintenance
      FROM sensors s
      JOIN plants p ON p.id = s.plant_id
"#;

// ---

/// Optional narrowing for the sensor list.
#[derive(Debug, Default, Clone, Copy)]
pub struct SensorListFilter {
    pub plant_id: Option<i64>,
    pub is_active: Option<bool>,
}

pub async fn list<'e, E>(
    db: E,
    user_id: i64,
    filter: SensorListFilter,
) -> Result<Vec<Sensor>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    // ---
    let mut qb = QueryBuilder::<Postgres>::new(SENSOR_SELECT);
    qb.push(" WHERE p.user_id = ").push_bind(user_id);
    if let Some(plant_id) = filter.plant_id {
        qb.push(" AND s.plant_id = ").push_bind(plant_id);
    }
    if let Some(is_active) = filter.is_active {
        qb.push(" AND s.is_active = ").push_bind(is_active);
    }
    qb.push(" ORDER BY s.id");

    qb.build_query_as::<Sensor>().fetch_all(db).await
}

pub async fn get<'e, E>(db: E, id: i64, user_id: i64) -> Result<Option<Sensor>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    // ---
    sqlx::query_as::<_, Sensor>(&format!(
        "{SENSOR_SELECT} WHERE s.id = $1 AND p.user_id = $2"
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
) -> Result<Option<Sensor>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    // ---
    sqlx::query_as::<_, Sensor>(&format!(
        "{SENSOR_SELECT} WHERE s.id = $1 AND p.user_id = $2 FOR UPDATE OF s"
    ))
    .bind(id)
    .bind(user_id)
    .fetch_optional(db)
    .await
}

/// Plant of `sensor_id` when the sensor belongs to `user_id`.
pub async fn owned_plant<'e, E>(
    db: E,
    sensor_id: i64,
    user_id: i64,
) -> Result<Option<i64>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    // ---
    sqlx::query_scalar::<_, i64>(
        r#"
        SELECT s.plant_id
          FROM sensors s
          JOIN plants p ON p.id = s.plant_id
         WHERE s.id = $1 AND p.user_id = $2
        "#,
    )
    .bind(sensor_id)
    .bind(user_id)
    .fetch_optional(db)
    .await
}

pub async fn insert<'e, E>(db: E, new: &NewSensor) -> Result<Sensor, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    // ---
    sqlx::query_as::<_, Sensor>(
        r#"
        INSERT INTO sensors (name, plant_id, location_type, is_active, last_maintenance)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, name, plant_id, location_type, is_active, installed_at, last_maintenance
        "#,
    )
    .bind(&new.name)
    .bind(new.plant_id)
    .bind(new.location_type.as_str())
    .bind(new.is_active)
    .bind(new.last_maintenance)
    .fetch_one(db)
    .await
}

/// Persist the mutable fields; `plant_id` never changes after creation.
pub async fn update<'e, E>(db: E, sensor: &Sensor) -> Result<Sensor, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    // ---
    sqlx::query_as::<_, Sensor>(
        r#"
        UPDATE sensors
           SET name = $2, location_type = $3, is_active = $4, last_maintenance = $5
         WHERE id = $1
        RETURNING id, name, plant_id, location_type, is_active, installed_at, last_maintenance
        "#,
    )
    .bind(sensor.id)
    .bind(&sensor.name)
    .bind(sensor.location_type.as_str())
    .bind(sensor.is_active)
    .bind(sensor.last_maintenance)
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
        DELETE FROM sensors s
         USING plants p
         WHERE s.id = $1 AND p.id = s.plant_id AND p.user_id = $2
        "#,
    )
    .bind(id)
    .bind(user_id)
    .execute(db)
    .await?;
    Ok(result.rows_affected() > 0)
}
