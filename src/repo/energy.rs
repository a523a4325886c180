use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use sqlx::{PgExecutor, Postgres, QueryBuilder};

use crate::filter::{EnergyFilter, PageRequest};
use crate::models::{DailyEnergy, EnergyConsumption, SensorEnergyCost};

const ENERGY_FROM: &str = r#"
      FROM energy_consumption e
      JOIN sensors s ON s.id = e.sensor_id
      JOIN plants p ON p.id = e.plant_id
"#;

const ENERGY_COLUMNS: &str = r#"
    SELECT e.id, e.sensor_id, s.name AS sensor_name, e.plant_id, p.name AS plant_name,
           e.timestamp, e.energy_kwh, e.cost, e.created_at, e.updated_at
"#;

// ---

/// Column values for an insert or update, with the plant already derived
/// from the sensor.
#[derive(Debug)]
pub struct EnergyRow<'a> {
    pub sensor_id: i64,
    pub plant_id: i64,
    pub timestamp: Option<DateTime<Utc>>,
    pub energy_kwh: &'a BigDecimal,
    pub cost: Option<&'a BigDecimal>,
}

pub async fn count<'e, E>(
    db: E,
    user_id: i64,
    filter: &EnergyFilter,
) -> Result<i64, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    // ---
    let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*)");
    qb.push(ENERGY_FROM);
    filter.push_predicates(&mut qb, user_id);
    qb.build_query_scalar::<i64>().fetch_one(db).await
}

pub async fn list_page<'e, E>(
    db: E,
    user_id: i64,
    filter: &EnergyFilter,
    page: PageRequest,
) -> Result<Vec<EnergyConsumption>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    // ---
    let mut qb = QueryBuilder::<Postgres>::new(ENERGY_COLUMNS);
    qb.push(ENERGY_FROM);
    filter.push_predicates(&mut qb, user_id);
    qb.push(" ORDER BY e.timestamp DESC, e.id DESC");
    qb.push(" LIMIT ").push_bind(page.page_size);
    qb.push(" OFFSET ").push_bind(page.offset());
    qb.build_query_as::<EnergyConsumption>().fetch_all(db).await
}

/// Sums per calendar day in `tz`, oldest day first.
pub async fn daily<'e, E>(
    db: E,
    user_id: i64,
    filter: &EnergyFilter,
    tz: Tz,
) -> Result<Vec<DailyEnergy>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    // ---
    let mut qb = QueryBuilder::<Postgres>::new("SELECT (e.timestamp AT TIME ZONE ");
    qb.push_bind(tz.name());
    qb.push(
        r#")::date AS date,
               SUM(e.energy_kwh) AS energy_kwh,
               COALESCE(SUM(e.cost), 0.00) AS cost"#,
    );
    qb.push(ENERGY_FROM);
    filter.push_predicates(&mut qb, user_id);
    qb.push(" GROUP BY 1 ORDER BY 1");
    qb.build_query_as::<DailyEnergy>().fetch_all(db).await
}

/// Sums per sensor, ordered by sensor id.
pub async fn by_sensor<'e, E>(
    db: E,
    user_id: i64,
    filter: &EnergyFilter,
) -> Result<Vec<SensorEnergyCost>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    // ---
    let mut qb = QueryBuilder::<Postgres>::new(
        r#"
        SELECT e.sensor_id AS sensor, s.name AS sensor_name,
               SUM(e.energy_kwh) AS energy_kwh,
               COALESCE(SUM(e.cost), 0.00) AS cost"#,
    );
    qb.push(ENERGY_FROM);
    filter.push_predicates(&mut qb, user_id);
    qb.push(" GROUP BY e.sensor_id, s.name ORDER BY e.sensor_id");
    qb.build_query_as::<SensorEnergyCost>().fetch_all(db).await
}

pub async fn get<'e, E>(
    db: E,
    id: i64,
    user_id: i64,
) -> Result<Option<EnergyConsumption>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    // ---
    sqlx::query_as::<_, EnergyConsumption>(&format!(
        "{ENERGY_COLUMNS} {ENERGY_FROM} WHERE p.user_id = $2 AND e.id = $1"
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
) -> Result<Option<EnergyConsumption>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    // ---
    sqlx::query_as::<_, EnergyConsumption>(&format!(
        "{ENERGY_COLUMNS} {ENERGY_FROM} WHERE p.user_id = $2 AND e.id = $1 FOR UPDATE OF e"
    ))
    .bind(id)
    .bind(user_id)
    .fetch_optional(db)
    .await
}

pub async fn insert<'e, E>(db: E, row: &EnergyRow<'_>) -> Result<i64, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    // ---
    sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO energy_consumption (sensor_id, plant_id, timestamp, energy_kwh, cost)
        VALUES ($1, $2, COALESCE($3, NOW()), $4, $5)
        RETURNING id
        "#,
    )
    .bind(row.sensor_id)
    .bind(row.plant_id)
    .bind(row.timestamp)
    .bind(row.energy_kwh)
    .bind(row.cost)
    .fetch_one(db)
    .await
}

pub async fn update<'e, E>(db: E, id: i64, row: &EnergyRow<'_>) -> Result<(), sqlx::Error>
where
    E: PgExecutor<'e>,
{
    // ---
    sqlx::query(
        r#"
        UPDATE energy_consumption
           SET sensor_id = $2, plant_id = $3, timestamp = COALESCE($4, timestamp),
               energy_kwh = $5, cost = $6, updated_at = NOW()
         WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(row.sensor_id)
    .bind(row.plant_id)
    .bind(row.timestamp)
    .bind(row.energy_kwh)
    .bind(row.cost)
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
        DELETE FROM energy_consumption e
         USING plants p
         WHERE e.id = $1 AND p.id = e.plant_id AND p.user_id = $2
        "#,
    )
    .bind(id)
    .bind(user_id)
    .execute(db)
    .await?;
    Ok(result.rows_affected() > 0)
}
