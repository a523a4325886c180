//! Database schema management for `plantwatch-backend`.
//!
//! Ensures required tables and indexes exist before serving requests.
//! Applied once on startup from `main.rs` (EMBP: single gateway call).

use anyhow::Result;
use sqlx::PgPool;

// ---

/// Tables in dependency order. Ownership flows users -> plants -> sensors ->
/// sensor_data/energy_consumption, and plants -> items.
const TABLES: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id            BIGSERIAL PRIMARY KEY,
        email         TEXT        NOT NULL UNIQUE,
        username      TEXT        NOT NULL UNIQUE,
        password_hash TEXT,
        role          TEXT        NOT NULL DEFAULT 'user'
                      CHECK (role IN ('admin', 'user')),
        is_active     BOOLEAN     NOT NULL DEFAULT TRUE,
        created_at    TIMESTAMPTZ NOT NULL DEFAULT NOW()
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS plants (
        id          BIGSERIAL PRIMARY KEY,
        name        TEXT        NOT NULL,
        location    TEXT        NOT NULL,
        plant_type  TEXT        NOT NULL
                    CHECK (plant_type IN ('recycling', 'manufacturing')),
        user_id     BIGINT      NOT NULL REFERENCES users (id) ON DELETE CASCADE,
        created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS sensors (
        id               BIGSERIAL PRIMARY KEY,
        name             TEXT        NOT NULL,
        plant_id         BIGINT      NOT NULL REFERENCES plants (id) ON DELETE CASCADE,
        location_type    TEXT        NOT NULL
                         CHECK (location_type IN ('input', 'conveyer_belt', 'weighing_machine',
                                                  'output_conveyer', 'output_weighing')),
        is_active        BOOLEAN     NOT NULL DEFAULT TRUE,
        installed_at     TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        last_maintenance TIMESTAMPTZ
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS items (
        id          BIGSERIAL PRIMARY KEY,
        plant_id    BIGINT      NOT NULL REFERENCES plants (id) ON DELETE CASCADE,
        name        TEXT        NOT NULL,
        description TEXT,
        created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS sensor_data (
        id                    BIGSERIAL PRIMARY KEY,
        sensor_id             BIGINT        NOT NULL REFERENCES sensors (id) ON DELETE CASCADE,
        item_id               BIGINT        REFERENCES items (id) ON DELETE SET NULL,
        timestamp             TIMESTAMPTZ   NOT NULL DEFAULT NOW(),
        items_scanned         INTEGER       NOT NULL DEFAULT 0 CHECK (items_scanned >= 0),
        items_processed       INTEGER       NOT NULL DEFAULT 0 CHECK (items_processed >= 0),
        items_discarded       INTEGER       NOT NULL DEFAULT 0 CHECK (items_discarded >= 0),
        processed_with_errors INTEGER       NOT NULL DEFAULT 0 CHECK (processed_with_errors >= 0),
        current_weight_kg     NUMERIC(10,2),
        category_a            INTEGER       NOT NULL DEFAULT 0 CHECK (category_a >= 0),
        category_b            INTEGER       NOT NULL DEFAULT 0 CHECK (category_b >= 0),
        category_c            INTEGER       NOT NULL DEFAULT 0 CHECK (category_c >= 0),
        category_d            INTEGER       NOT NULL DEFAULT 0 CHECK (category_d >= 0),
        created_at            TIMESTAMPTZ   NOT NULL DEFAULT NOW(),
        updated_at            TIMESTAMPTZ   NOT NULL DEFAULT NOW()
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS energy_consumption (
        id          BIGSERIAL PRIMARY KEY,
        sensor_id   BIGINT        NOT NULL REFERENCES sensors (id) ON DELETE CASCADE,
        plant_id    BIGINT        NOT NULL REFERENCES plants (id) ON DELETE CASCADE,
        timestamp   TIMESTAMPTZ   NOT NULL DEFAULT NOW(),
        energy_kwh  NUMERIC(10,2) NOT NULL,
        cost        NUMERIC(10,2),
        created_at  TIMESTAMPTZ   NOT NULL DEFAULT NOW(),
        updated_at  TIMESTAMPTZ   NOT NULL DEFAULT NOW()
    );
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS token_blacklist (
        jti            UUID PRIMARY KEY,
        user_id        BIGINT      NOT NULL REFERENCES users (id) ON DELETE CASCADE,
        expires_at     TIMESTAMPTZ NOT NULL,
        blacklisted_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    );
    "#,
];

const INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_plants_user_id ON plants (user_id);",
    "CREATE INDEX IF NOT EXISTS idx_sensors_plant_id ON sensors (plant_id);",
    "CREATE INDEX IF NOT EXISTS idx_items_plant_id ON items (plant_id);",
    "CREATE INDEX IF NOT EXISTS idx_sensor_data_sensor_ts ON sensor_data (sensor_id, timestamp DESC);",
    "CREATE INDEX IF NOT EXISTS idx_sensor_data_item_id ON sensor_data (item_id);",
    "CREATE INDEX IF NOT EXISTS idx_energy_sensor_ts ON energy_consumption (sensor_id, timestamp DESC);",
    "CREATE INDEX IF NOT EXISTS idx_energy_plant_id ON energy_consumption (plant_id);",
];

/// Create or update the database schema (idempotent).
///
/// Safe to call on every startup; no-op if objects already exist.
///
/// Errors are propagated if any SQL execution fails.
pub async fn create_schema(pool: &PgPool) -> Result<()> {
    // ---
    let mut tx = pool.begin().await?;

    for ddl in TABLES.iter().chain(INDEXES) {
        sqlx::query(*ddl).execute(&mut *tx).await?;
    }

    tx.commit().await?;
    tracing::info!(
        "Schema ready ({} tables, {} indexes)",
        TABLES.len(),
        INDEXES.len()
    );
    Ok(())
}
