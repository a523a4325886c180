use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ApiResult, Violations};

use super::{datetime, decimal, nullable, pk};

/// An energy log entry joined with its sensor and plant names.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct EnergyConsumption {
    // ---
    pub id: i64,
    #[serde(rename = "sensor")]
    pub sensor_id: i64,
    pub sensor_name: String,
    #[serde(rename = "plant")]
    pub plant_id: i64,
    pub plant_name: String,
    pub timestamp: DateTime<Utc>,
    pub energy_kwh: BigDecimal,
    pub cost: Option<BigDecimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Energy and cost summed over one calendar day.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DailyEnergy {
    pub date: NaiveDate,
    pub energy_kwh: BigDecimal,
    pub cost: BigDecimal,
}

/// Energy and cost summed per sensor.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SensorEnergyCost {
    pub sensor: i64,
    pub sensor_name: String,
    pub energy_kwh: BigDecimal,
    pub cost: BigDecimal,
}

/// Writable energy fields. `plant` is accepted only to be checked against the
/// sensor's plant; the stored plant always follows the sensor.
#[derive(Debug, Default, Deserialize)]
pub struct EnergyPayload {
    pub sensor: Option<Value>,
    pub plant: Option<Value>,
    pub timestamp: Option<Value>,
    pub energy_kwh: Option<Value>,
    #[serde(default, deserialize_with = "nullable")]
    pub cost: Option<Option<Value>>,
}

#[derive(Debug)]
pub struct NewEnergyConsumption {
    pub sensor_id: i64,
    /// Plant named by the client, if any.
    pub claimed_plant_id: Option<i64>,
    /// `None` means "now".
    pub timestamp: Option<DateTime<Utc>>,
    pub energy_kwh: BigDecimal,
    pub cost: Option<BigDecimal>,
}

impl EnergyPayload {
    pub fn into_new(self, tz: Tz) -> ApiResult<NewEnergyConsumption> {
        // ---
        let mut v = Violations::new();
        v.require("sensor", &self.sensor);
        v.require("energy_kwh", &self.energy_kwh);

        let sensor_id = self.sensor.as_ref().and_then(|s| pk(&mut v, "sensor", s));
        let claimed_plant_id = self.plant.as_ref().and_then(|p| pk(&mut v, "plant", p));
        let timestamp = self
            .timestamp
            .as_ref()
            .and_then(|value| datetime(&mut v, "timestamp", value, tz));
        let energy_kwh = self
            .energy_kwh
            .as_ref()
            .and_then(|value| decimal(&mut v, "energy_kwh", value));
        let cost = self
            .cost
            .flatten()
            .and_then(|value| decimal(&mut v, "cost", &value));

        let new_log = sensor_id
            .zip(energy_kwh)
            .map(|(sensor_id, energy_kwh)| NewEnergyConsumption {
                sensor_id,
                claimed_plant_id,
                timestamp,
                energy_kwh,
                cost,
            });
        v.conclude(new_log)
    }

    /// Copy the supplied fields onto `log` and return the plant the client
    /// named, if any. A changed sensor still has to be checked for ownership.
    pub fn apply_to(self, log: &mut EnergyConsumption, tz: Tz) -> ApiResult<Option<i64>> {
        // ---
        let mut v = Violations::new();
        let sensor_id = self.sensor.as_ref().and_then(|s| pk(&mut v, "sensor", s));
        let claimed_plant_id = self.plant.as_ref().and_then(|p| pk(&mut v, "plant", p));
        let timestamp = self
            .timestamp
            .as_ref()
            .and_then(|value| datetime(&mut v, "timestamp", value, tz));
        let energy_kwh = self
            .energy_kwh
            .as_ref()
            .and_then(|value| decimal(&mut v, "energy_kwh", value));
        let cost = self
            .cost
            .map(|value| value.and_then(|value| decimal(&mut v, "cost", &value)));
        v.finish()?;

        if let Some(sensor_id) = sensor_id {
            log.sensor_id = sensor_id;
        }
        if let Some(timestamp) = timestamp {
            log.timestamp = timestamp;
        }
        if let Some(energy_kwh) = energy_kwh {
            log.energy_kwh = energy_kwh;
        }
        if let Some(cost) = cost {
            log.cost = cost;
        }
        Ok(claimed_plant_id)
    }
}
