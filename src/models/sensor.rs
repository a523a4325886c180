use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ApiResult, Violations};

use super::{boolean, choice, datetime, nullable, pk, text};

choice_enum!(LocationType {
    Input => "input",
    ConveyerBelt => "conveyer_belt",
    WeighingMachine => "weighing_machine",
    OutputConveyer => "output_conveyer",
    OutputWeighing => "output_weighing",
});

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Sensor {
    // ---
    pub id: i64,
    pub name: String,
    #[serde(rename = "plant")]
    pub plant_id: i64,
    #[sqlx(try_from = "String")]
    pub location_type: LocationType,
    pub is_active: bool,
    pub installed_at: DateTime<Utc>,
    pub last_maintenance: Option<DateTime<Utc>>,
}

/// Writable sensor fields. `plant` is only honoured on create.
#[derive(Debug, Default, Deserialize)]
pub struct SensorPayload {
    pub name: Option<String>,
    pub plant: Option<Value>,
    pub location_type: Option<String>,
    pub is_active: Option<Value>,
    #[serde(default, deserialize_with = "nullable")]
    pub last_maintenance: Option<Option<Value>>,
}

#[derive(Debug)]
pub struct NewSensor {
    pub name: String,
    pub plant_id: i64,
    pub location_type: LocationType,
    pub is_active: bool,
    pub last_maintenance: Option<DateTime<Utc>>,
}

impl SensorPayload {
    pub fn into_new(self, tz: Tz) -> ApiResult<NewSensor> {
        // ---
        let mut v = Violations::new();
        v.require("name", &self.name);
        v.require("plant", &self.plant);
        v.require("location_type", &self.location_type);

        let name = text(&mut v, "name", self.name);
        let plant_id = self.plant.as_ref().and_then(|p| pk(&mut v, "plant", p));
        let location_type = choice(&mut v, "location_type", self.location_type);
        let is_active = match &self.is_active {
            Some(value) => boolean(&mut v, "is_active", value),
            None => Some(true),
        };
        let last_maintenance = self
            .last_maintenance
            .flatten()
            .and_then(|value| datetime(&mut v, "last_maintenance", &value, tz));

        let new_sensor = name
            .zip(plant_id)
            .zip(location_type)
            .zip(is_active)
            .map(|(((name, plant_id), location_type), is_active)| NewSensor {
                name,
                plant_id,
                location_type,
                is_active,
                last_maintenance,
            });
        v.conclude(new_sensor)
    }

    /// Copy the supplied fields onto `sensor`; absent fields are untouched and
    /// `plant` is ignored.
    pub fn apply_to(self, sensor: &mut Sensor, tz: Tz) -> ApiResult<()> {
        // ---
        let mut v = Violations::new();
        let name = text(&mut v, "name", self.name);
        let location_type = choice(&mut v, "location_type", self.location_type);
        let is_active = self
            .is_active
            .as_ref()
            .and_then(|value| boolean(&mut v, "is_active", value));
        let last_maintenance = self.last_maintenance.map(|value| {
            value.and_then(|value| datetime(&mut v, "last_maintenance", &value, tz))
        });
        v.finish()?;

        if let Some(name) = name {
            sensor.name = name;
        }
        if let Some(location_type) = location_type {
            sensor.location_type = location_type;
        }
        if let Some(is_active) = is_active {
            sensor.is_active = is_active;
        }
        if let Some(last_maintenance) = last_maintenance {
            sensor.last_maintenance = last_maintenance;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::error::ApiError;
    use chrono::TimeZone;
    use serde_json::json;

    fn sample_sensor() -> Sensor {
        // ---
        Sensor {
            id: 4,
            name: "Belt scanner".into(),
            plant_id: 2,
            location_type: LocationType::ConveyerBelt,
            is_active: true,
            installed_at: Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap(),
            last_maintenance: Some(Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap()),
        }
    }

    #[test]
    fn test_new_sensor_requires_plant() {
        // ---
        let payload: SensorPayload = serde_json::from_value(json!({
            "name": "Input gate",
            "location_type": "input"
        }))
        .unwrap();

        match payload.into_new(chrono_tz::UTC).unwrap_err() {
            ApiError::Validation(errors) => {
                assert_eq!(errors["plant"], vec!["This field is required."])
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_new_sensor_defaults_to_active() {
        // ---
        let payload: SensorPayload = serde_json::from_value(json!({
            "name": "Output scale",
            "plant": "2",
            "location_type": "output_weighing",
            "last_maintenance": "2024-07-01T10:00:00"
        }))
        .unwrap();

        let new_sensor = payload.into_new(chrono_tz::UTC).unwrap();
        assert_eq!(new_sensor.plant_id, 2);
        assert!(new_sensor.is_active);
        assert_eq!(new_sensor.location_type, LocationType::OutputWeighing);
        assert_eq!(
            new_sensor.last_maintenance,
            Some(Utc.with_ymd_and_hms(2024, 7, 1, 10, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_apply_keeps_plant_and_clears_maintenance() {
        // ---
        let payload: SensorPayload = serde_json::from_value(json!({
            "plant": 99,
            "is_active": false,
            "last_maintenance": null
        }))
        .unwrap();

        let mut sensor = sample_sensor();
        payload.apply_to(&mut sensor, chrono_tz::UTC).unwrap();

        assert_eq!(sensor.plant_id, 2);
        assert!(!sensor.is_active);
        assert_eq!(sensor.last_maintenance, None);
    }

    #[test]
    fn test_location_type_round_trips_through_text() {
        // ---
        let parsed: LocationType = "weighing_machine".parse().unwrap();
        assert_eq!(parsed, LocationType::WeighingMachine);
        assert_eq!(parsed.as_str(), "weighing_machine");
        assert!("forklift".parse::<LocationType>().is_err());
    }
}
