use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ApiResult, Violations};

use super::{count, datetime, decimal, nullable, pk};

/// One reading as stored, joined with the display names of its sensor,
/// plant and item.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SensorData {
    // ---
    pub id: i64,
    #[serde(rename = "sensor")]
    pub sensor_id: i64,
    pub sensor_name: String,
    pub plant_name: String,
    #[serde(rename = "item")]
    pub item_id: Option<i64>,
    pub item_name: Option<String>,
    pub timestamp: DateTime<Utc>,

    pub items_scanned: i32,
    pub items_processed: i32,
    pub items_discarded: i32,
    pub processed_with_errors: i32,

    pub current_weight_kg: Option<BigDecimal>,

    pub category_a: i32,
    pub category_b: i32,
    pub category_c: i32,
    pub category_d: i32,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Serialized form of a reading, including the derived totals.
#[derive(Debug, Serialize)]
pub struct SensorDataView {
    #[serde(flatten)]
    pub data: SensorData,
    pub total_processed: i64,
    pub total_output: i64,
}

impl SensorData {
    pub fn total_processed(&self) -> i64 {
        i64::from(self.items_processed) + i64::from(self.processed_with_errors)
    }

    pub fn total_output(&self) -> i64 {
        [self.category_a, self.category_b, self.category_c, self.category_d]
            .iter()
            .map(|&c| i64::from(c))
            .sum()
    }

    pub fn into_view(self) -> SensorDataView {
        SensorDataView {
            total_processed: self.total_processed(),
            total_output: self.total_output(),
            data: self,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SensorDataPayload {
    pub sensor: Option<Value>,
    #[serde(default, deserialize_with = "nullable")]
    pub item: Option<Option<Value>>,
    pub timestamp: Option<Value>,
    pub items_scanned: Option<Value>,
    pub items_processed: Option<Value>,
    pub items_discarded: Option<Value>,
    pub processed_with_errors: Option<Value>,
    #[serde(default, deserialize_with = "nullable")]
    pub current_weight_kg: Option<Option<Value>>,
    pub category_a: Option<Value>,
    pub category_b: Option<Value>,
    pub category_c: Option<Value>,
    pub category_d: Option<Value>,
}

#[derive(Debug)]
pub struct NewSensorData {
    pub sensor_id: i64,
    pub item_id: Option<i64>,
    /// `None` means "now".
    pub timestamp: Option<DateTime<Utc>>,
    pub items_scanned: i32,
    pub items_processed: i32,
    pub items_discarded: i32,
    pub processed_with_errors: i32,
    pub current_weight_kg: Option<BigDecimal>,
    pub category_a: i32,
    pub category_b: i32,
    pub category_c: i32,
    pub category_d: i32,
}

/// Validated count fields; `None` where absent.
struct Counts {
    items_scanned: Option<i32>,
    items_processed: Option<i32>,
    items_discarded: Option<i32>,
    processed_with_errors: Option<i32>,
    category_a: Option<i32>,
    category_b: Option<i32>,
    category_c: Option<i32>,
    category_d: Option<i32>,
}

fn assign<T>(target: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *target = value;
    }
}

impl SensorDataPayload {
    fn counts(&self, v: &mut Violations) -> Counts {
        // ---
        let mut field = |name: &str, value: &Option<Value>| {
            value.as_ref().and_then(|value| count(v, name, value))
        };
        Counts {
            items_scanned: field("items_scanned", &self.items_scanned),
            items_processed: field("items_processed", &self.items_processed),
            items_discarded: field("items_discarded", &self.items_discarded),
            processed_with_errors: field("processed_with_errors", &self.processed_with_errors),
            category_a: field("category_a", &self.category_a),
            category_b: field("category_b", &self.category_b),
            category_c: field("category_c", &self.category_c),
            category_d: field("category_d", &self.category_d),
        }
    }

    fn weight(&self, v: &mut Violations) -> Option<Option<BigDecimal>> {
        self.current_weight_kg.as_ref().map(|value| {
            value
                .as_ref()
                .and_then(|value| decimal(v, "current_weight_kg", value))
        })
    }

    fn item(&self, v: &mut Violations) -> Option<Option<i64>> {
        self.item
            .as_ref()
            .map(|value| value.as_ref().and_then(|value| pk(v, "item", value)))
    }

    pub fn into_new(self, tz: Tz) -> ApiResult<NewSensorData> {
        // ---
        let mut v = Violations::new();
        v.require("sensor", &self.sensor);

        let sensor_id = self.sensor.as_ref().and_then(|s| pk(&mut v, "sensor", s));
        let item_id = self.item(&mut v).flatten();
        let timestamp = self
            .timestamp
            .as_ref()
            .and_then(|value| datetime(&mut v, "timestamp", value, tz));
        let counts = self.counts(&mut v);
        let current_weight_kg = self.weight(&mut v).flatten();

        let new_data = sensor_id.map(|sensor_id| NewSensorData {
            sensor_id,
            item_id,
            timestamp,
            items_scanned: counts.items_scanned.unwrap_or(0),
            items_processed: counts.items_processed.unwrap_or(0),
            items_discarded: counts.items_discarded.unwrap_or(0),
            processed_with_errors: counts.processed_with_errors.unwrap_or(0),
            current_weight_kg,
            category_a: counts.category_a.unwrap_or(0),
            category_b: counts.category_b.unwrap_or(0),
            category_c: counts.category_c.unwrap_or(0),
            category_d: counts.category_d.unwrap_or(0),
        });
        v.conclude(new_data)
    }

    /// Copy the supplied fields onto `data`. Changed `sensor`/`item`
    /// references still have to be checked for ownership by the caller.
    pub fn apply_to(self, data: &mut SensorData, tz: Tz) -> ApiResult<()> {
        // ---
        let mut v = Violations::new();
        let sensor_id = self.sensor.as_ref().and_then(|s| pk(&mut v, "sensor", s));
        let item_id = self.item(&mut v);
        let timestamp = self
            .timestamp
            .as_ref()
            .and_then(|value| datetime(&mut v, "timestamp", value, tz));
        let counts = self.counts(&mut v);
        let current_weight_kg = self.weight(&mut v);
        v.finish()?;

        assign(&mut data.sensor_id, sensor_id);
        assign(&mut data.item_id, item_id);
        assign(&mut data.timestamp, timestamp);
        assign(&mut data.items_scanned, counts.items_scanned);
        assign(&mut data.items_processed, counts.items_processed);
        assign(&mut data.items_discarded, counts.items_discarded);
        assign(&mut data.processed_with_errors, counts.processed_with_errors);
        assign(&mut data.current_weight_kg, current_weight_kg);
        assign(&mut data.category_a, counts.category_a);
        assign(&mut data.category_b, counts.category_b);
        assign(&mut data.category_c, counts.category_c);
        assign(&mut data.category_d, counts.category_d);
        Ok(())
    }
}
